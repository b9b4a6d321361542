//! HTTP surface: one route group per bill family, plus users and webhooks

pub mod bills;
pub mod users;
pub mod webhooks;

use crate::bills::{
    AirtimeService, BillService, DataService, EducationService, ElectricityService,
    PurchaseHandler, StatusUpdateTarget, TvService,
};
use crate::database::repository::{TransactionRepository, UserRepository};
use crate::database::TransactionStores;
use crate::providers::BillProvider;
use crate::services::PurchaseNotifier;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// The five family handlers, each wired to its own store.
#[derive(Clone)]
pub struct BillHandlers {
    pub electricity: Arc<PurchaseHandler<ElectricityService>>,
    pub data: Arc<PurchaseHandler<DataService>>,
    pub airtime: Arc<PurchaseHandler<AirtimeService>>,
    pub education: Arc<PurchaseHandler<EducationService>>,
    pub tv: Arc<PurchaseHandler<TvService>>,
}

impl BillHandlers {
    /// Wire every family to one provider client that serves them all.
    pub fn new<P>(
        provider: Arc<P>,
        stores: &TransactionStores,
        notifier: Option<Arc<PurchaseNotifier>>,
    ) -> Self
    where
        P: BillProvider<ElectricityService>
            + BillProvider<DataService>
            + BillProvider<AirtimeService>
            + BillProvider<EducationService>
            + BillProvider<TvService>
            + 'static,
    {
        fn handler<S: BillService>(
            provider: Arc<dyn BillProvider<S>>,
            store: Arc<dyn TransactionRepository<S::Record>>,
            notifier: &Option<Arc<PurchaseNotifier>>,
        ) -> Arc<PurchaseHandler<S>> {
            let handler = PurchaseHandler::new(provider, store);
            Arc::new(match notifier {
                Some(notifier) => handler.with_notifier(notifier.clone()),
                None => handler,
            })
        }

        Self {
            electricity: handler::<ElectricityService>(
                provider.clone(),
                stores.electricity.clone(),
                &notifier,
            ),
            data: handler::<DataService>(
                provider.clone(),
                stores.data.clone(),
                &notifier,
            ),
            airtime: handler::<AirtimeService>(
                provider.clone(),
                stores.airtime.clone(),
                &notifier,
            ),
            education: handler::<EducationService>(
                provider.clone(),
                stores.education.clone(),
                &notifier,
            ),
            tv: handler::<TvService>(
                provider,
                stores.tv.clone(),
                &notifier,
            ),
        }
    }

    /// Every family, for updates that do not say which family they belong to
    pub fn status_targets(&self) -> Vec<Arc<dyn StatusUpdateTarget>> {
        vec![
            self.electricity.clone() as Arc<dyn StatusUpdateTarget>,
            self.data.clone() as Arc<dyn StatusUpdateTarget>,
            self.airtime.clone() as Arc<dyn StatusUpdateTarget>,
            self.education.clone() as Arc<dyn StatusUpdateTarget>,
            self.tv.clone() as Arc<dyn StatusUpdateTarget>,
        ]
    }
}

/// POST {base}, GET {base}/transactions, GET {base}/{id}, POST {base}/{id}/requery
fn family_routes<S: BillService>(handler: Arc<PurchaseHandler<S>>) -> Router {
    let base = S::FAMILY.route_base();

    Router::new()
        .route(base, post(bills::purchase::<S>))
        .route(&format!("{}/transactions", base), get(bills::list::<S>))
        .route(&format!("{}/{{id}}", base), get(bills::get_one::<S>))
        .route(&format!("{}/{{id}}/requery", base), post(bills::requery::<S>))
        .with_state(handler)
}

/// Build the API router. Health routes and middleware layers are added by
/// the binary.
pub fn router(
    bills: BillHandlers,
    users: Arc<dyn UserRepository>,
    webhook_secret: Option<String>,
) -> Router {
    let webhook_state = Arc::new(webhooks::WebhookState {
        targets: bills.status_targets(),
        secret: webhook_secret,
    });

    Router::new()
        .merge(family_routes(bills.electricity))
        .merge(family_routes(bills.data))
        .merge(family_routes(bills.airtime))
        .merge(family_routes(bills.education))
        .merge(family_routes(bills.tv))
        .merge(users::routes(users))
        .merge(webhooks::routes(webhook_state))
}
