/*
[INPUT]:  HTTP configuration (base URL, timeouts), credentials, endpoint path and params
[OUTPUT]: Signed POST requests and classified, decoded responses
[POS]:    HTTP layer - core client implementation
[UPDATE]: When changing signing flow, response classification or client options
*/

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use crate::http::signature::RequestSigner;
use crate::http::{BitstampError, Result};

/// Base URL for the Bitstamp REST API
pub const API_BASE_URL: &str = "https://www.bitstamp.net/api/v2";

/// Form parameters of a signed request
pub type Params = BTreeMap<String, String>;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Hold a lock from nonce generation until the response is read, so
    /// concurrent callers reach the exchange in nonce order.
    pub serialize_requests: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            serialize_requests: false,
        }
    }
}

/// Credentials for authenticated requests
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub api_key: String,
    pub api_secret: String,
}

impl Credentials {
    pub fn new(
        client_id: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// `{"status": "error", "reason": ..., "code": ...}`
#[derive(Debug, Deserialize)]
struct StatusEnvelope {
    status: Option<String>,
    #[serde(default)]
    reason: Option<Value>,
    #[serde(default)]
    code: Option<Value>,
}

/// Main HTTP client for the Bitstamp API
#[derive(Debug)]
pub struct BitstampClient {
    http_client: Client,
    base_url: String,
    signer: RequestSigner,
    serial: Option<Mutex<()>>,
}

impl BitstampClient {
    /// Create a new client with default configuration
    pub fn new(credentials: Credentials) -> Result<Self> {
        Self::with_config(credentials, ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(credentials: Credentials, config: ClientConfig) -> Result<Self> {
        Self::with_config_and_base_url(credentials, config, API_BASE_URL)
    }

    /// Create a client pointed at another API root (test servers, proxies)
    pub fn with_config_and_base_url(
        credentials: Credentials,
        config: ClientConfig,
        base_url: &str,
    ) -> Result<Self> {
        Url::parse(base_url)?;

        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            signer: RequestSigner::new(credentials),
            serial: config.serialize_requests.then(|| Mutex::new(())),
        })
    }

    pub fn credentials(&self) -> &Credentials {
        self.signer.credentials()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build full URL for an endpoint path such as `/balance/`
    fn endpoint_url(&self, path: &str) -> Result<Url> {
        Ok(Url::parse(&format!("{}{}", self.base_url, path))?)
    }

    /// Sign, submit and decode one request.
    ///
    /// Performs exactly one round trip; retrying is left to the caller.
    pub async fn execute<T: DeserializeOwned>(&self, path: &str, params: Params) -> Result<T> {
        let (value, body) = self.round_trip(path, params).await?;
        serde_json::from_value(value).map_err(|err| BitstampError::malformed(err, body))
    }

    /// Like [`execute`](Self::execute) but returns the classified body untyped
    pub async fn execute_raw(&self, path: &str, params: Params) -> Result<Value> {
        self.round_trip(path, params).await.map(|(value, _)| value)
    }

    async fn round_trip(&self, path: &str, mut params: Params) -> Result<(Value, String)> {
        let url = self.endpoint_url(path)?;

        let _serial = match &self.serial {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let nonce = self.signer.next_nonce();
        let signature = self.signer.sign(&nonce)?;
        params.insert("key".to_string(), self.credentials().api_key.clone());
        params.insert("signature".to_string(), signature);
        params.insert("nonce".to_string(), nonce.clone());

        debug!(path, nonce = %nonce, "sending signed request");

        let response = self
            .http_client
            .post(url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(encode_form(&params))
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        debug!(path, status = status.as_u16(), bytes = body.len(), "response received");

        let value = classify_response(&body)?;
        Ok((value, body))
    }
}

fn encode_form(params: &Params) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter())
        .finish()
}

/// Apply the error classification to a response body, first match wins:
/// empty body, undecodable body, `error` key, `status == "error"` envelope.
pub fn classify_response(body: &str) -> Result<Value> {
    if body.is_empty() {
        return Err(BitstampError::EmptyResponse);
    }

    let value: Value =
        serde_json::from_str(body).map_err(|err| BitstampError::malformed(err, body))?;

    if let Some(object) = value.as_object() {
        if let Some(error) = object.get("error") {
            return Err(BitstampError::api_message(value_to_string(error)));
        }

        if let Ok(envelope) = StatusEnvelope::deserialize(&value)
            && envelope.status.as_deref() == Some("error")
        {
            return Err(BitstampError::api_status(
                envelope.reason.as_ref().map(value_to_string),
                envelope.code.as_ref().map(value_to_string),
            ));
        }
    }

    Ok(value)
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
