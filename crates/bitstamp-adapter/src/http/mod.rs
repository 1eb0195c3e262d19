/*
[INPUT]:  HTTP client configuration, credentials and API endpoints
[OUTPUT]: HTTP responses and typed API results
[POS]:    HTTP layer - REST API communication
[UPDATE]: When adding new endpoints or changing client behavior
*/

pub mod account;
pub mod client;
pub mod error;
pub mod market;
pub mod signature;

pub use error::{BitstampError, Result};
pub use signature::{NonceGenerator, RequestSigner};

pub use client::{API_BASE_URL, BitstampClient, ClientConfig, Credentials, Params, classify_response};
