//! Read-through cache in front of a transaction store

use crate::bills::{BillFamily, BillRecord};
use crate::cache::keys::bills::TransactionKey;
use crate::cache::Cache;
use crate::database::error::DbResult;
use crate::database::repository::{Insertion, TransactionRepository};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Serves terminal records from the cache. Pending records are never cached
/// since they are still expected to change.
pub struct CachedTransactionRepository<R: BillRecord> {
    inner: Arc<dyn TransactionRepository<R>>,
    cache: Arc<dyn Cache<R>>,
    family: BillFamily,
    ttl: Duration,
}

impl<R: BillRecord> CachedTransactionRepository<R> {
    pub fn new(
        inner: Arc<dyn TransactionRepository<R>>,
        cache: Arc<dyn Cache<R>>,
        family: BillFamily,
        ttl: Duration,
    ) -> Self {
        Self {
            inner,
            cache,
            family,
            ttl,
        }
    }

    async fn remember(&self, record: &R) {
        if !record.status().is_terminal() {
            return;
        }

        let meta = record.meta();
        let mut keys = vec![TransactionKey::new(self.family, meta.request_id.clone())];
        if !meta.transaction_id.is_empty() {
            keys.push(TransactionKey::new(self.family, meta.transaction_id.clone()));
        }

        for key in keys {
            if let Err(e) = self.cache.set(&key.to_string(), record, Some(self.ttl)).await {
                warn!(key = %key, error = %e, "Failed to cache transaction");
            }
        }
    }
}

#[async_trait]
impl<R: BillRecord> TransactionRepository<R> for CachedTransactionRepository<R> {
    async fn save(&self, record: &R) -> DbResult<R> {
        let stored = self.inner.save(record).await?;
        self.remember(&stored).await;
        Ok(stored)
    }

    async fn insert_if_absent(&self, record: &R) -> DbResult<Insertion<R>> {
        let insertion = self.inner.insert_if_absent(record).await?;
        if let Insertion::Existing(stored) = &insertion {
            self.remember(stored).await;
        }
        Ok(insertion)
    }

    async fn get_by_id(&self, id: &str) -> DbResult<R> {
        let key = TransactionKey::new(self.family, id).to_string();
        match self.cache.get(&key).await {
            Ok(Some(record)) => {
                debug!(key = %key, "Transaction served from cache");
                return Ok(record);
            }
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Cache read failed, using store"),
        }

        let record = self.inner.get_by_id(id).await?;
        self.remember(&record).await;
        Ok(record)
    }

    async fn list_by_user(&self, user_identifier: &str) -> DbResult<Vec<R>> {
        self.inner.list_by_user(user_identifier).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bills::types::TransactionStatus;
    use crate::bills::{AirtimePurchase, AirtimeService, AirtimeTransaction, BillService};
    use crate::cache::CacheResult;
    use crate::database::memory::InMemoryTransactionRepository;
    use bigdecimal::BigDecimal;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MapCache {
        entries: Mutex<HashMap<String, AirtimeTransaction>>,
    }

    #[async_trait]
    impl Cache<AirtimeTransaction> for MapCache {
        async fn get(&self, key: &str) -> CacheResult<Option<AirtimeTransaction>> {
            Ok(self.entries.lock().await.get(key).cloned())
        }

        async fn set(
            &self,
            key: &str,
            value: &AirtimeTransaction,
            _ttl: Option<Duration>,
        ) -> CacheResult<()> {
            self.entries
                .lock()
                .await
                .insert(key.to_string(), value.clone());
            Ok(())
        }
    }

    fn request() -> AirtimePurchase {
        AirtimePurchase {
            request_id: "cache-1".to_string(),
            network: "mtn".to_string(),
            phone: "08031234567".to_string(),
            email: None,
            amount: BigDecimal::from(100),
        }
    }

    #[tokio::test]
    async fn only_terminal_records_are_cached() {
        let cache = Arc::new(MapCache::default());
        let repo = CachedTransactionRepository::<AirtimeTransaction>::new(
            Arc::new(InMemoryTransactionRepository::new()),
            cache.clone(),
            BillFamily::Airtime,
            Duration::from_secs(60),
        );

        repo.save(&AirtimeService::pending_record(&request()))
            .await
            .unwrap();
        assert!(cache.entries.lock().await.is_empty());

        let mut success = AirtimeService::pending_record(&request());
        success.meta.status = TransactionStatus::Success;
        success.meta.transaction_id = "TX-C".to_string();
        repo.save(&success).await.unwrap();

        let entries = cache.entries.lock().await;
        assert!(entries.contains_key("v1:bills:airtime:txn:cache-1"));
        assert!(entries.contains_key("v1:bills:airtime:txn:TX-C"));
    }

    #[tokio::test]
    async fn cache_hit_skips_store() {
        let cache = Arc::new(MapCache::default());
        let mut cached = AirtimeService::pending_record(&request());
        cached.meta.status = TransactionStatus::Success;
        cache
            .set("v1:bills:airtime:txn:cache-1", &cached, None)
            .await
            .unwrap();

        // The store is empty, so a hit can only come from the cache.
        let repo = CachedTransactionRepository::<AirtimeTransaction>::new(
            Arc::new(InMemoryTransactionRepository::new()),
            cache,
            BillFamily::Airtime,
            Duration::from_secs(60),
        );
        let record = repo.get_by_id("cache-1").await.unwrap();
        assert_eq!(record.meta.status, TransactionStatus::Success);
    }
}
