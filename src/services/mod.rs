//! Services layered on top of the purchase flow

pub mod notification;

pub use notification::PurchaseNotifier;
