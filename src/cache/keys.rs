//! Type-safe cache key builders

use crate::bills::BillFamily;
use std::fmt;

pub const VERSION: &str = "v1";

pub mod bills {
    use super::*;

    pub const NAMESPACE: &str = "bills";

    /// Key for a settled transaction, addressable by request id or provider
    /// transaction id.
    #[derive(Debug, Clone)]
    pub struct TransactionKey {
        pub family: BillFamily,
        pub id: String,
    }

    impl TransactionKey {
        pub fn new(family: BillFamily, id: impl Into<String>) -> Self {
            Self {
                family,
                id: id.into(),
            }
        }
    }

    impl fmt::Display for TransactionKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(
                f,
                "{}:{}:{}:txn:{}",
                VERSION,
                NAMESPACE,
                self.family.as_str(),
                self.id
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::bills::TransactionKey;
    use crate::bills::BillFamily;

    #[test]
    fn transaction_key_is_namespaced_per_family() {
        assert_eq!(
            TransactionKey::new(BillFamily::Electricity, "req-1").to_string(),
            "v1:bills:electricity:txn:req-1"
        );
        assert_eq!(
            TransactionKey::new(BillFamily::Tv, "TX-9").to_string(),
            "v1:bills:tv:txn:TX-9"
        );
    }
}
