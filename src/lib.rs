//! fax-relay: outbound fax delivery pipeline
//!
//! A library for sending faxes through a carrier API, retrying failed
//! attempts through a delayed queue, and reporting every outcome to the
//! caller's webhook.

pub mod carrier;
pub mod config;
pub mod message;
pub mod pipeline;
pub mod queue;
pub mod time;
pub mod transport;
