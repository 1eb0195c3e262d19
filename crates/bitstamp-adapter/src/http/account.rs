/*
[INPUT]:  Order parameters, order ids and withdrawal targets
[OUTPUT]: Balances, order confirmations, open orders and transaction history
[POS]:    HTTP layer - account and trading endpoints (require signed requests)
[UPDATE]: When adding new account endpoints or changing order flow
*/

use serde_json::Value;

use crate::http::client::Params;
use crate::http::{BitstampClient, BitstampError, Result};
use crate::types::{AccountBalance, CancelledOrder, OpenOrder, OrderResult, UserTransaction};

/// Decimal places used for amounts of market orders and withdrawals
const DEFAULT_AMOUNT_PRECISION: usize = 8;

fn format_fixed(value: f64, precision: usize) -> String {
    format!("{value:.precision$}")
}

impl BitstampClient {
    /// Query account balances
    ///
    /// POST /balance/
    pub async fn account_balance(&self) -> Result<AccountBalance> {
        self.execute("/balance/", Params::new()).await
    }

    /// Place a limit buy order
    ///
    /// POST /buy/{pair}/
    pub async fn buy_limit_order(
        &self,
        pair: &str,
        amount: f64,
        price: f64,
        amount_precision: usize,
        price_precision: usize,
    ) -> Result<OrderResult> {
        let endpoint = format!("/buy/{}/", pair.to_lowercase());
        let params = limit_params(amount, price, amount_precision, price_precision);
        self.execute(&endpoint, params).await
    }

    /// Place a market buy order
    ///
    /// POST /buy/market/{pair}/
    pub async fn buy_market_order(&self, pair: &str, amount: f64) -> Result<OrderResult> {
        let endpoint = format!("/buy/market/{}/", pair.to_lowercase());
        self.execute(&endpoint, market_params(amount)).await
    }

    /// Place a limit sell order
    ///
    /// POST /sell/{pair}/
    pub async fn sell_limit_order(
        &self,
        pair: &str,
        amount: f64,
        price: f64,
        amount_precision: usize,
        price_precision: usize,
    ) -> Result<OrderResult> {
        let endpoint = format!("/sell/{}/", pair.to_lowercase());
        let params = limit_params(amount, price, amount_precision, price_precision);
        self.execute(&endpoint, params).await
    }

    /// Place a market sell order
    ///
    /// POST /sell/market/{pair}/
    pub async fn sell_market_order(&self, pair: &str, amount: f64) -> Result<OrderResult> {
        let endpoint = format!("/sell/market/{}/", pair.to_lowercase());
        self.execute(&endpoint, market_params(amount)).await
    }

    /// Cancel an open order
    ///
    /// POST /cancel_order/
    pub async fn cancel_order(&self, order_id: i64) -> Result<CancelledOrder> {
        let mut params = Params::new();
        params.insert("id".to_string(), order_id.to_string());
        self.execute("/cancel_order/", params).await
    }

    /// List open orders across all pairs
    ///
    /// POST /open_orders/all/
    pub async fn open_orders(&self) -> Result<Vec<OpenOrder>> {
        self.execute("/open_orders/all/", Params::new()).await
    }

    /// Cancel every open order
    ///
    /// POST /cancel_all_orders/
    pub async fn cancel_all_orders(&self) -> Result<bool> {
        self.execute("/cancel_all_orders/", Params::new()).await
    }

    /// Transaction history, newest first
    ///
    /// POST /user_transactions/
    pub async fn user_transactions(&self) -> Result<Vec<UserTransaction>> {
        self.execute("/user_transactions/", Params::new()).await
    }

    /// Withdraw litecoin to an address
    ///
    /// POST /ltc_withdrawal/
    pub async fn withdraw_litecoin(&self, address: &str, amount: f64) -> Result<Value> {
        let mut params = market_params(amount);
        params.insert("address".to_string(), address.to_string());
        let value = self.execute_raw("/ltc_withdrawal/", params).await?;
        if let Some(status) = value.get("status")
            && !status.is_string()
        {
            return Err(BitstampError::malformed(
                format!("unexpected withdrawal status {status}"),
                value.to_string(),
            ));
        }
        Ok(value)
    }
}

fn limit_params(amount: f64, price: f64, amount_precision: usize, price_precision: usize) -> Params {
    let mut params = Params::new();
    params.insert("amount".to_string(), format_fixed(amount, amount_precision));
    params.insert("price".to_string(), format_fixed(price, price_precision));
    params
}

fn market_params(amount: f64) -> Params {
    let mut params = Params::new();
    params.insert(
        "amount".to_string(),
        format_fixed(amount, DEFAULT_AMOUNT_PRECISION),
    );
    params
}
