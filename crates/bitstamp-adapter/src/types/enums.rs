/*
[INPUT]:  Integer codes sent by the exchange, quoted or bare
[OUTPUT]: Typed order side and transaction type enums
[POS]:    Data layer - enum definitions for API communication
[UPDATE]: When the exchange documents new codes
*/

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::numeric::Integer;

/// Order side as returned by order endpoints (`type` field)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn code(self) -> i64 {
        match self {
            OrderSide::Buy => 0,
            OrderSide::Sell => 1,
        }
    }
}

impl<'de> Deserialize<'de> for OrderSide {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Integer::deserialize(deserializer)?.0 {
            0 => Ok(OrderSide::Buy),
            1 => Ok(OrderSide::Sell),
            other => Err(serde::de::Error::custom(format!("unknown order type {other}"))),
        }
    }
}

impl Serialize for OrderSide {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.code())
    }
}

/// Kind of entry in the user transaction history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserTransactionType {
    Deposit,
    Withdrawal,
    MarketTrade,
    SubAccountTransfer,
    Other(i64),
}

impl UserTransactionType {
    pub fn code(self) -> i64 {
        match self {
            UserTransactionType::Deposit => 0,
            UserTransactionType::Withdrawal => 1,
            UserTransactionType::MarketTrade => 2,
            UserTransactionType::SubAccountTransfer => 14,
            UserTransactionType::Other(code) => code,
        }
    }
}

impl From<i64> for UserTransactionType {
    fn from(code: i64) -> Self {
        match code {
            0 => UserTransactionType::Deposit,
            1 => UserTransactionType::Withdrawal,
            2 => UserTransactionType::MarketTrade,
            14 => UserTransactionType::SubAccountTransfer,
            other => UserTransactionType::Other(other),
        }
    }
}

impl fmt::Display for UserTransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserTransactionType::Deposit => f.write_str("Deposit"),
            UserTransactionType::Withdrawal => f.write_str("Withdrawal"),
            UserTransactionType::MarketTrade => f.write_str("MarketTrade"),
            UserTransactionType::SubAccountTransfer => f.write_str("SubAccountTransfer"),
            UserTransactionType::Other(_) => Ok(()),
        }
    }
}

impl<'de> Deserialize<'de> for UserTransactionType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Integer::deserialize(deserializer).map(|code| UserTransactionType::from(code.0))
    }
}

impl Serialize for UserTransactionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_side_tolerant() {
        let buy: OrderSide = serde_json::from_str("\"0\"").unwrap();
        let sell: OrderSide = serde_json::from_str("1").unwrap();
        assert_eq!(buy, OrderSide::Buy);
        assert_eq!(sell, OrderSide::Sell);
        assert!(serde_json::from_str::<OrderSide>("2").is_err());
    }

    #[test]
    fn test_transaction_type_display() {
        let kind: UserTransactionType = serde_json::from_str("\"2\"").unwrap();
        assert_eq!(kind, UserTransactionType::MarketTrade);
        assert_eq!(kind.to_string(), "MarketTrade");

        let unknown: UserTransactionType = serde_json::from_str("33").unwrap();
        assert_eq!(unknown, UserTransactionType::Other(33));
        assert_eq!(unknown.to_string(), "");
    }

    #[test]
    fn test_sub_account_transfer_code() {
        let transfer: UserTransactionType = serde_json::from_str("\"14\"").unwrap();
        assert_eq!(transfer, UserTransactionType::SubAccountTransfer);
        assert_eq!(transfer.to_string(), "SubAccountTransfer");

        let sequential: UserTransactionType = serde_json::from_str("\"3\"").unwrap();
        assert_eq!(sequential, UserTransactionType::Other(3));
        assert_eq!(sequential.to_string(), "");
    }
}
