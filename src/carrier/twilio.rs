//! Twilio Programmable Fax carrier.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use http::header::{ACCEPT, AUTHORIZATION};
use http::HeaderValue;
use serde::Deserialize;
use url::Url;

use crate::transport::{HttpClient, HttpError, HttpRequest, HttpResponse};

use super::{Carrier, CarrierError, CarrierStatus, JobHandle, SubmitRequest};

/// Account credentials for the Twilio REST API.
#[derive(Clone, PartialEq, Eq)]
pub struct TwilioCredentials {
    /// Account SID (`AC...`)
    pub account_sid: String,
    /// Auth token
    pub auth_token: String,
}

impl TwilioCredentials {
    /// Creates credentials from an account SID and auth token.
    #[must_use]
    pub fn new(account_sid: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
        }
    }

    /// HTTP Basic `Authorization` header value.
    fn authorization(&self) -> Result<HeaderValue, CarrierError> {
        let encoded = BASE64.encode(format!("{}:{}", self.account_sid, self.auth_token));
        let mut value = HeaderValue::from_str(&format!("Basic {encoded}"))
            .map_err(|e| HttpError::InvalidUrl(format!("unusable credentials: {e}")))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Debug for TwilioCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwilioCredentials")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"<redacted>")
            .finish()
    }
}

/// Fax resource as returned by the Fax API.
///
/// Only the fields the pipeline reads; everything else is ignored.
#[derive(Debug, Deserialize)]
struct FaxResource {
    sid: String,
    status: CarrierStatus,
}

/// [`Carrier`] backed by the Twilio Programmable Fax REST API.
///
/// - Submit: `POST {base}/Faxes` with `From`, `To`, `MediaUrl`, `StoreMedia`, `Ttl`
/// - Status: `GET {base}/Faxes/{sid}`
#[derive(Debug)]
pub struct TwilioCarrier<H> {
    client: H,
    credentials: TwilioCredentials,
    from: String,
    base_url: Url,
}

impl<H> TwilioCarrier<H> {
    /// Production API root.
    pub const DEFAULT_BASE_URL: &'static str = "https://fax.twilio.com/v1/";

    /// Creates a carrier that sends from `from` using `credentials`.
    ///
    /// `base_url` is the API root; a trailing slash is added if missing so
    /// resource paths resolve beneath it.
    #[must_use]
    pub fn new(
        client: H,
        credentials: TwilioCredentials,
        from: impl Into<String>,
        mut base_url: Url,
    ) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Self {
            client,
            credentials,
            from: from.into(),
            base_url,
        }
    }

    /// Returns the configured API root.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the sending fax number.
    #[must_use]
    pub fn from_number(&self) -> &str {
        &self.from
    }

    fn resource_url(&self, path: &str) -> Result<Url, CarrierError> {
        self.base_url
            .join(path)
            .map_err(|e| HttpError::InvalidUrl(format!("{}{path}: {e}", self.base_url)).into())
    }
}

impl<H: HttpClient> TwilioCarrier<H> {
    async fn call(&self, request: HttpRequest) -> Result<FaxResource, CarrierError> {
        let request = request
            .with_header(AUTHORIZATION, self.credentials.authorization()?)
            .with_header(ACCEPT, HeaderValue::from_static("application/json"));

        let response = self.client.request(request).await?;
        parse_fax(&response)
    }
}

fn parse_fax(response: &HttpResponse) -> Result<FaxResource, CarrierError> {
    if !response.is_success() {
        return Err(CarrierError::Api {
            status: response.status,
            body: response.body_text().map(ToString::to_string),
        });
    }

    serde_json::from_slice(&response.body).map_err(CarrierError::Decode)
}

impl<H: HttpClient> Carrier for TwilioCarrier<H> {
    async fn submit(&self, request: &SubmitRequest) -> Result<JobHandle, CarrierError> {
        let ttl = request.ttl_minutes.to_string();
        let store_media = if request.store_media { "true" } else { "false" };

        let http_request = HttpRequest::post(self.resource_url("Faxes")?).with_form_body([
            ("From", self.from.as_str()),
            ("To", request.to.as_str()),
            ("MediaUrl", request.media_url.as_str()),
            ("StoreMedia", store_media),
            ("Ttl", ttl.as_str()),
        ]);

        let fax = self.call(http_request).await?;
        tracing::debug!(sid = %fax.sid, status = %fax.status, "Carrier accepted fax");
        Ok(JobHandle::new(fax.sid))
    }

    async fn fetch_status(&self, handle: &JobHandle) -> Result<CarrierStatus, CarrierError> {
        let url = self.resource_url(&format!("Faxes/{handle}"))?;
        let fax = self.call(HttpRequest::get(url)).await?;
        Ok(fax.status)
    }
}
