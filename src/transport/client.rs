//! Production HTTP client implementation using reqwest.

use std::time::Duration;

use super::{HttpClient, HttpError, HttpRequest, HttpResponse};

/// Production HTTP client using reqwest.
///
/// Thin wrapper around `reqwest::Client`; clones share one connection pool.
///
/// # Example
///
/// ```no_run
/// use fax_relay::transport::{HttpClient, HttpRequest, ReqwestClient};
/// use std::time::Duration;
/// use url::Url;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ReqwestClient::with_timeout(Duration::from_secs(30))?;
/// let url = Url::parse("https://app.example.com/fax-events")?;
/// let request = HttpRequest::post(url).with_json_body(r#"{"fax_id":"a"}"#);
/// let response = client.request(request).await?;
/// println!("Status: {}", response.status);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    inner: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a new HTTP client with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: reqwest::Client::new(),
        }
    }

    /// Creates a client whose requests fail with [`HttpError::Timeout`]
    /// after `timeout`.
    ///
    /// Redirects are not followed; a 3xx response is returned as is.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Connection`] if the TLS backend cannot be initialized.
    pub fn with_timeout(timeout: Duration) -> Result<Self, HttpError> {
        let inner = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| HttpError::Connection(Box::new(e)))?;
        Ok(Self { inner })
    }

    /// Creates an HTTP client from an existing reqwest client.
    #[must_use]
    pub const fn from_client(client: reqwest::Client) -> Self {
        Self { inner: client }
    }
}

impl Default for ReqwestClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for ReqwestClient {
    async fn request(&self, req: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut builder = self.inner.request(req.method, req.url.as_str());

        for (name, value) in &req.headers {
            builder = builder.header(name, value);
        }

        if let Some(body) = req.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                HttpError::Timeout
            } else if e.is_builder() {
                HttpError::InvalidUrl(e.to_string())
            } else {
                HttpError::Connection(Box::new(e))
            }
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    HttpError::Timeout
                } else {
                    HttpError::Connection(Box::new(e))
                }
            })?
            .to_vec();

        Ok(HttpResponse::new(status, headers, body))
    }
}
