//! Typed provider response envelope
//!
//! VTpass answers every purchase with the same outer document and a
//! family-specific `content.transactions` block. Field names here follow the
//! provider's wire format and must not leak past the mapper.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

/// Outer response document, generic over the family's detail block.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "D: Deserialize<'de>"))]
pub struct RawResponse<D> {
    #[serde(default, deserialize_with = "lenient_string")]
    pub code: Option<String>,
    #[serde(default)]
    pub content: Option<RawContent<D>>,
    /// Some deliveries (webhooks, older sandbox builds) put the detail block
    /// at the top level instead of under `content`.
    #[serde(default)]
    pub transactions: Option<D>,
    #[serde(default)]
    pub response_description: Option<String>,
    #[serde(default, rename = "requestId", deserialize_with = "lenient_string")]
    pub request_id: Option<String>,
    #[serde(default)]
    pub amount: Option<RawAmount>,
    #[serde(default)]
    pub transaction_date: Option<RawTransactionDate>,
    /// Token, PIN or receipt text returned with the purchase
    #[serde(default)]
    pub purchased_code: Option<String>,
    /// Education result-checker PINs
    #[serde(default)]
    pub cards: Option<Vec<RawCard>>,
    /// Education registration tokens
    #[serde(default)]
    pub tokens: Option<Vec<String>>,
}

impl<D> RawResponse<D> {
    /// The transaction detail block, wherever the provider put it.
    pub fn details(&self) -> Option<&D> {
        self.content
            .as_ref()
            .and_then(|content| content.transactions.as_ref())
            .or(self.transactions.as_ref())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "D: Deserialize<'de>"))]
pub struct RawContent<D> {
    #[serde(default)]
    pub transactions: Option<D>,
}

/// Status fields every detail block carries.
pub trait TransactionDetails {
    fn status(&self) -> Option<&str>;
    fn transaction_id(&self) -> Option<&str>;
}

/// Detail block reduced to the fields needed for a status update.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusDetails {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "transactionId", deserialize_with = "lenient_string")]
    pub transaction_id: Option<String>,
}

impl TransactionDetails for StatusDetails {
    fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }
}

/// Detail block shared by data, airtime, education and TV purchases.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductDetails {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
    /// Phone, smartcard or profile the purchase was applied to
    #[serde(default, deserialize_with = "lenient_string")]
    pub unique_element: Option<String>,
    /// Per-item amount some services report instead of a top-level amount
    #[serde(default)]
    pub amount: Option<RawAmount>,
    #[serde(default, rename = "transactionId", deserialize_with = "lenient_string")]
    pub transaction_id: Option<String>,
}

impl TransactionDetails for ProductDetails {
    fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }
}

/// Accepts `"123"` or `123` for identifier fields the provider types loosely.
pub fn lenient_string<'de, De>(deserializer: De) -> Result<Option<String>, De::Error>
where
    De: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(Option::<Loose>::deserialize(deserializer)?.map(|value| match value {
        Loose::Text(text) => text,
        Loose::Int(number) => number.to_string(),
        Loose::Float(number) => number.to_string(),
    }))
}

/// A number the provider may send as an integer, a float or a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Int(i64),
    Float(f64),
    Text(String),
}

impl RawAmount {
    /// Exact decimal value, or `None` for non-finite or unparsable input.
    pub fn to_decimal(&self) -> Option<BigDecimal> {
        match self {
            RawAmount::Int(value) => Some(BigDecimal::from(*value)),
            // Display prints the shortest string that round-trips the float.
            RawAmount::Float(value) if value.is_finite() => {
                BigDecimal::from_str(&value.to_string()).ok()
            }
            RawAmount::Float(_) => None,
            RawAmount::Text(text) => BigDecimal::from_str(text.trim().replace(',', "").as_str()).ok(),
        }
    }
}

impl fmt::Display for RawAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawAmount::Int(value) => write!(f, "{}", value),
            RawAmount::Float(value) => write!(f, "{}", value),
            RawAmount::Text(text) => f.write_str(text),
        }
    }
}

/// `{"date": "...", "timezone": "..."}` or a bare date string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawTransactionDate {
    Structured { date: String },
    Plain(String),
}

impl RawTransactionDate {
    pub fn as_str(&self) -> &str {
        match self {
            RawTransactionDate::Structured { date } => date,
            RawTransactionDate::Plain(date) => date,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCard {
    #[serde(default, alias = "Serial")]
    pub serial: Option<String>,
    #[serde(alias = "Pin")]
    pub pin: String,
}
