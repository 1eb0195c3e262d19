/*
[INPUT]:  API credentials and the wall clock
[OUTPUT]: Strictly increasing nonces and HMAC-SHA256 request signatures
[POS]:    HTTP layer - request signing for authenticated endpoints
[UPDATE]: When changing signing algorithm or nonce format
*/

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::http::client::Credentials;
use crate::http::{BitstampError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Produces nonces from wall-clock nanoseconds.
///
/// The exchange rejects a nonce that is not greater than the previous one,
/// so each value is `max(now, last + 1)`: strictly increasing even when the
/// clock stalls or steps backwards.
#[derive(Debug, Default)]
pub struct NonceGenerator {
    last: AtomicU64,
}

impl NonceGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        let now = unix_nanos();
        let previous = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);
        now.max(previous.saturating_add(1))
    }
}

fn unix_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Signs requests with the account's client id, key and secret
#[derive(Debug)]
pub struct RequestSigner {
    credentials: Credentials,
    nonces: NonceGenerator,
}

impl RequestSigner {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            nonces: NonceGenerator::new(),
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Next nonce, formatted as a base-10 integer
    pub fn next_nonce(&self) -> String {
        self.nonces.next().to_string()
    }

    /// Uppercase hex HMAC-SHA256 of `nonce || client_id || api_key`, keyed by the secret
    pub fn sign(&self, nonce: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.credentials.api_secret.as_bytes())
            .map_err(|err| BitstampError::Config(format!("invalid api secret: {err}")))?;
        mac.update(nonce.as_bytes());
        mac.update(self.credentials.client_id.as_bytes());
        mac.update(self.credentials.api_key.as_bytes());
        Ok(hex::encode_upper(mac.finalize().into_bytes()))
    }
}
