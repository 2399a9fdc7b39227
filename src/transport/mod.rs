//! HTTP transport shared by the carrier client and webhook delivery.
//!
//! This module provides:
//! - Request and response value types ([`HttpRequest`], [`HttpResponse`])
//! - The client abstraction ([`HttpClient`])
//! - The production client ([`ReqwestClient`])

mod client;
mod error;
mod request;


pub use client::ReqwestClient;
pub use error::HttpError;
pub use request::{HttpClient, HttpRequest, HttpResponse};
