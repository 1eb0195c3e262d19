/*
[INPUT]:  API schema definitions and serde requirements
[OUTPUT]: Typed Rust structs with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use std::collections::BTreeMap;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use super::enums::{OrderSide, UserTransactionType};
use super::numeric::{self, Float};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    #[serde(deserialize_with = "numeric::deserialize_f64")]
    pub last: f64,
    #[serde(deserialize_with = "numeric::deserialize_f64")]
    pub high: f64,
    #[serde(deserialize_with = "numeric::deserialize_f64")]
    pub low: f64,
    #[serde(deserialize_with = "numeric::deserialize_f64")]
    pub vwap: f64,
    #[serde(deserialize_with = "numeric::deserialize_f64")]
    pub volume: f64,
    #[serde(deserialize_with = "numeric::deserialize_f64")]
    pub bid: f64,
    #[serde(deserialize_with = "numeric::deserialize_f64")]
    pub ask: f64,
    pub timestamp: String,
    #[serde(deserialize_with = "numeric::deserialize_f64")]
    pub open: f64,
}

/// One `[price, amount]` entry of the order book
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderBookLevel(
    #[serde(deserialize_with = "numeric::deserialize_f64")] pub f64,
    #[serde(deserialize_with = "numeric::deserialize_f64")] pub f64,
);

impl OrderBookLevel {
    pub fn price(&self) -> f64 {
        self.0
    }

    pub fn amount(&self) -> f64 {
        self.1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    pub timestamp: String,
    pub bids: Vec<OrderBookLevel>,
    pub asks: Vec<OrderBookLevel>,
}

/// Result of a buy or sell order, limit or market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    #[serde(deserialize_with = "numeric::deserialize_i64")]
    pub id: i64,
    pub datetime: String,
    #[serde(rename = "type")]
    pub order_type: OrderSide,
    #[serde(deserialize_with = "numeric::deserialize_f64")]
    pub price: f64,
    #[serde(deserialize_with = "numeric::deserialize_f64")]
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenOrder {
    #[serde(deserialize_with = "numeric::deserialize_i64")]
    pub id: i64,
    pub datetime: String,
    #[serde(rename = "type")]
    pub order_type: OrderSide,
    #[serde(deserialize_with = "numeric::deserialize_f64")]
    pub price: f64,
    #[serde(deserialize_with = "numeric::deserialize_f64")]
    pub amount: f64,
    #[serde(default)]
    pub currency_pair: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelledOrder {
    #[serde(deserialize_with = "numeric::deserialize_i64")]
    pub id: i64,
    #[serde(deserialize_with = "numeric::deserialize_f64")]
    pub price: f64,
    #[serde(deserialize_with = "numeric::deserialize_f64")]
    pub amount: f64,
    #[serde(rename = "type")]
    pub order_type: OrderSide,
}

/// Entry of `/user_transactions/`. Numbers arrive both quoted and bare,
/// intermingled within one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTransaction {
    pub datetime: String,
    #[serde(deserialize_with = "numeric::deserialize_i64")]
    pub id: i64,
    #[serde(rename = "type")]
    pub transaction_type: UserTransactionType,
    #[serde(default, deserialize_with = "numeric::deserialize_f64")]
    pub usd: f64,
    #[serde(default, deserialize_with = "numeric::deserialize_f64")]
    pub eur: f64,
    #[serde(default, deserialize_with = "numeric::deserialize_f64")]
    pub btc: f64,
    #[serde(default, deserialize_with = "numeric::deserialize_f64")]
    pub xrp: f64,
    #[serde(default, deserialize_with = "numeric::deserialize_f64")]
    pub ltc: f64,
    #[serde(default, deserialize_with = "numeric::deserialize_f64")]
    pub eth: f64,
    #[serde(default, deserialize_with = "numeric::deserialize_f64")]
    pub btc_usd: f64,
    #[serde(default, deserialize_with = "numeric::deserialize_f64")]
    pub usd_btc: f64,
    #[serde(default, deserialize_with = "numeric::deserialize_f64")]
    pub fee: f64,
    #[serde(default, deserialize_with = "numeric::deserialize_option_i64")]
    pub order_id: Option<i64>,
}

/// Account balances keyed by currency (`btc`, `usd`, ...) or pair for fees.
///
/// The exchange sends a flat object of `<currency>_<kind>` keys; this type
/// regroups them by kind.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AccountBalance {
    pub balance: BTreeMap<String, f64>,
    pub reserved: BTreeMap<String, f64>,
    pub available: BTreeMap<String, f64>,
    pub fee: BTreeMap<String, f64>,
}

impl<'de> Deserialize<'de> for AccountBalance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let flat: BTreeMap<String, Float> = BTreeMap::deserialize(deserializer)?;
        let mut balance = AccountBalance::default();

        for (key, Float(value)) in flat {
            let mut split = key.split('_');
            let (Some(currency), Some(kind), None) = (split.next(), split.next(), split.next())
            else {
                return Err(de::Error::custom(format!("could not identify key '{key}'")));
            };

            let target = match kind {
                "balance" => &mut balance.balance,
                "reserved" => &mut balance.reserved,
                "available" => &mut balance.available,
                "fee" => &mut balance.fee,
                other => {
                    return Err(de::Error::custom(format!(
                        "could not identify key postfix '{other}'"
                    )));
                }
            };
            target.insert(currency.to_string(), value);
        }

        Ok(balance)
    }
}
