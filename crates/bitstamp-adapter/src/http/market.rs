/*
[INPUT]:  Currency pair identifiers
[OUTPUT]: Market data (ticker, order book)
[POS]:    HTTP layer - market data endpoints (signed like every other call)
[UPDATE]: When adding new market endpoints or changing response format
*/

use crate::http::client::Params;
use crate::http::{BitstampClient, Result};
use crate::types::{OrderBook, Ticker};

impl BitstampClient {
    /// Query the ticker for a pair
    ///
    /// POST /ticker/{pair}/
    pub async fn ticker(&self, pair: &str) -> Result<Ticker> {
        let endpoint = format!("/ticker/{}/", pair.to_lowercase());
        self.execute(&endpoint, Params::new()).await
    }

    /// Query the order book for a pair
    ///
    /// POST /order_book/{pair}/
    pub async fn order_book(&self, pair: &str) -> Result<OrderBook> {
        let endpoint = format!("/order_book/{}/", pair.to_lowercase());
        self.execute(&endpoint, Params::new()).await
    }
}
