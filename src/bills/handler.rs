//! Purchase orchestration shared by every bill family
//!
//! A purchase moves through received → dispatched → mapped → persisted. The
//! pending record is written before the provider is called, and the provider
//! call, mapping and final write run in a detached task so a dropped client
//! connection cannot lose a provider answer.

use super::mapper::{derive_status, require_details, transaction_id, MappingError};
use super::types::{BillRecord, StatusUpdate, TransactionStatus};
use super::{BillFamily, BillService};
use crate::database::repository::{Insertion, TransactionRepository};
use crate::error::{
    AppError, AppErrorKind, AppResult, DomainError, ExternalError, ValidationError,
};
use crate::logging::mask_identifier;
use crate::providers::{provider_error, BillProvider};
use crate::services::notification::PurchaseNotifier;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Result of a purchase attempt. A failed purchase still carries the
/// persisted record so the caller can reconcile against it later.
#[derive(Debug, Clone)]
pub struct PurchaseOutcome<R> {
    pub record: R,
    /// Why the purchase failed, when it failed during this call
    pub failure: Option<AppError>,
    /// The request id was already known; the provider was not called
    pub replayed: bool,
}

pub struct PurchaseHandler<S: BillService> {
    provider: Arc<dyn BillProvider<S>>,
    store: Arc<dyn TransactionRepository<S::Record>>,
    notifier: Option<Arc<PurchaseNotifier>>,
}

impl<S: BillService> PurchaseHandler<S> {
    pub fn new(
        provider: Arc<dyn BillProvider<S>>,
        store: Arc<dyn TransactionRepository<S::Record>>,
    ) -> Self {
        Self {
            provider,
            store,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<PurchaseNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn family(&self) -> BillFamily {
        S::FAMILY
    }

    pub async fn purchase(&self, request: S::Request) -> AppResult<PurchaseOutcome<S::Record>> {
        let family = S::FAMILY;

        if let Err(e) = S::validate(&request) {
            warn!(family = %family, error = ?e, "Purchase rejected by validation");
            return Err(e.into());
        }

        let request_id = S::request_id(&request).to_string();
        info!(
            family = %family,
            request_id = %request_id,
            user = %mask_identifier(&S::user_identifier(&request)),
            "Purchase received"
        );

        // Only the caller that creates the row dispatches; everyone else
        // gets the stored record, pending or settled.
        if let Insertion::Existing(stored) =
            self.store.insert_if_absent(&S::pending_record(&request)).await?
        {
            ensure_same_purchase::<S>(&stored, &request)?;
            info!(
                family = %family,
                request_id = %request_id,
                status = %stored.status(),
                "Request id already known, replaying stored record"
            );
            return Ok(PurchaseOutcome {
                record: stored,
                failure: None,
                replayed: true,
            });
        }

        let provider = self.provider.clone();
        let store = self.store.clone();
        let notifier = self.notifier.clone();
        let task = tokio::spawn(async move { settle::<S>(provider, store, notifier, request).await });

        let (record, failure) = task.await.map_err(|e| {
            error!(family = %family, request_id = %request_id, error = %e, "Purchase task aborted");
            AppError::internal(format!("purchase task failed: {}", e))
        })??;

        Ok(PurchaseOutcome {
            record,
            failure,
            replayed: false,
        })
    }

    /// Look up by request id or provider transaction id.
    pub async fn get(&self, id: &str) -> AppResult<S::Record> {
        Ok(self.store.get_by_id(id).await?)
    }

    pub async fn list(&self, user_identifier: &str) -> AppResult<Vec<S::Record>> {
        if user_identifier.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "user".to_string(),
            }
            .into());
        }
        Ok(self.store.list_by_user(user_identifier.trim()).await?)
    }

    /// Ask the provider for the current status of a pending purchase.
    pub async fn requery(&self, id: &str) -> AppResult<S::Record> {
        let stored = self.store.get_by_id(id).await?;
        if stored.status().is_terminal() {
            return Ok(stored);
        }

        let request_id = stored.request_id().to_string();
        let name = self.provider.name();
        let raw = self
            .provider
            .requery(&request_id)
            .await
            .map_err(|e| provider_error(name, e))?;

        let details = require_details(&raw).map_err(|e| malformed(name, e))?;
        let update = StatusUpdate {
            request_id,
            status: derive_status(&raw, details).map_err(|e| malformed(name, e))?,
            transaction_id: Some(transaction_id(details)).filter(|id| !id.is_empty()),
        };

        self.apply(stored, &update).await
    }

    /// Apply a provider-pushed status change. Unknown request ids yield `None`.
    pub async fn apply_status_update(&self, update: &StatusUpdate) -> AppResult<Option<S::Record>> {
        let stored = match self.store.get_by_id(&update.request_id).await {
            Ok(record) => record,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        self.apply(stored, update).await.map(Some)
    }

    async fn apply(&self, stored: S::Record, update: &StatusUpdate) -> AppResult<S::Record> {
        let was_terminal = stored.status().is_terminal();

        let mut incoming = stored.clone();
        let meta = incoming.meta_mut();
        meta.status = update.status;
        if let Some(transaction_id) = &update.transaction_id {
            meta.transaction_id = transaction_id.clone();
        }
        meta.updated_at = Utc::now();

        let saved = self.store.save(&incoming).await?;
        info!(
            family = %S::FAMILY,
            request_id = %saved.request_id(),
            status = %saved.status(),
            "Status update applied"
        );

        if !was_terminal && saved.status().is_terminal() {
            if let Some(notifier) = &self.notifier {
                notifier.notify(S::FAMILY, &saved).await;
            }
        }

        Ok(saved)
    }
}

/// Dispatch, map and persist. Runs detached from the inbound request.
async fn settle<S: BillService>(
    provider: Arc<dyn BillProvider<S>>,
    store: Arc<dyn TransactionRepository<S::Record>>,
    notifier: Option<Arc<PurchaseNotifier>>,
    request: S::Request,
) -> AppResult<(S::Record, Option<AppError>)> {
    let family = S::FAMILY;
    let request_id = S::request_id(&request);
    let name = provider.name();

    info!(family = %family, request_id = %request_id, provider = name, "Purchase dispatched");

    let (candidate, failure) = match provider.purchase(&request).await {
        Ok(raw) => match S::map(&raw, &request) {
            Ok(record) => {
                info!(
                    family = %family,
                    request_id = %request_id,
                    status = %record.status(),
                    "Provider response mapped"
                );
                (record, None)
            }
            Err(e) => {
                warn!(family = %family, request_id = %request_id, error = %e, "Provider response could not be mapped");
                (S::failed_record(&request), Some(malformed(name, e)))
            }
        },
        Err(e) => {
            warn!(family = %family, request_id = %request_id, error = %e, "Provider call failed");
            (S::failed_record(&request), Some(provider_error(name, e)))
        }
    };

    let stored = store.save(&candidate).await.map_err(|e| {
        error!(family = %family, request_id = %request_id, error = %e, "Failed to persist purchase outcome");
        AppError::from(e)
    })?;

    info!(
        family = %family,
        request_id = %request_id,
        status = %stored.status(),
        transaction_id = %stored.meta().transaction_id,
        "Purchase persisted"
    );

    if stored.status().is_terminal() {
        if let Some(notifier) = &notifier {
            notifier.notify(family, &stored).await;
        }
    }

    Ok((stored, failure))
}

fn malformed(provider: &str, err: MappingError) -> AppError {
    AppError::new(AppErrorKind::External(ExternalError::MalformedResponse {
        provider: provider.to_string(),
        message: err.to_string(),
    }))
}

/// A reused request id must belong to the same customer and amount.
fn ensure_same_purchase<S: BillService>(stored: &S::Record, request: &S::Request) -> AppResult<()> {
    let meta = stored.meta();
    let request_id = S::request_id(request);

    if meta.user_identifier != S::user_identifier(request) {
        return Err(AppError::new(AppErrorKind::Domain(DomainError::DuplicateRequest {
            request_id: request_id.to_string(),
            reason: "it belongs to a different customer".to_string(),
        })));
    }

    if !meta.status.is_terminal() && &meta.amount != S::requested_amount(request) {
        return Err(AppError::new(AppErrorKind::Domain(DomainError::DuplicateRequest {
            request_id: request_id.to_string(),
            reason: format!("it is in progress for amount {}", meta.amount),
        })));
    }

    Ok(())
}

/// Family-erased view used by the webhook endpoint, which does not know in
/// advance which family a pushed update belongs to.
#[async_trait]
pub trait StatusUpdateTarget: Send + Sync {
    fn family(&self) -> BillFamily;

    /// The resulting status, or `None` when this family has no such request id.
    async fn apply_status_update(
        &self,
        update: &StatusUpdate,
    ) -> AppResult<Option<TransactionStatus>>;
}

#[async_trait]
impl<S: BillService> StatusUpdateTarget for PurchaseHandler<S> {
    fn family(&self) -> BillFamily {
        S::FAMILY
    }

    async fn apply_status_update(
        &self,
        update: &StatusUpdate,
    ) -> AppResult<Option<TransactionStatus>> {
        Ok(PurchaseHandler::<S>::apply_status_update(self, update)
            .await?
            .map(|record| record.status()))
    }
}
