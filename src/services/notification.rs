use crate::bills::{BillFamily, BillRecord, TransactionStatus};
use crate::database::repository::{Message, MessageSink};
use crate::logging::mask_identifier;
use std::sync::Arc;
use tracing::{info, warn};

/// Queues a customer message whenever a purchase settles.
///
/// Delivery is best effort: a failed write is logged and never fails the
/// purchase that triggered it.
pub struct PurchaseNotifier {
    sink: Arc<dyn MessageSink>,
}

impl PurchaseNotifier {
    pub fn new(sink: Arc<dyn MessageSink>) -> Self {
        Self { sink }
    }

    pub async fn notify<R: BillRecord>(&self, family: BillFamily, record: &R) {
        let message = build_message(family, record);
        let recipient = mask_identifier(&message.recipient);

        match self.sink.create_message(&message).await {
            Ok(()) => info!(
                family = %family,
                request_id = %record.request_id(),
                recipient = %recipient,
                "Purchase notification queued"
            ),
            Err(e) => warn!(
                family = %family,
                request_id = %record.request_id(),
                recipient = %recipient,
                error = %e,
                "Failed to queue purchase notification"
            ),
        }
    }
}

fn build_message<R: BillRecord>(family: BillFamily, record: &R) -> Message {
    let meta = record.meta();
    let outcome = match meta.status {
        TransactionStatus::Success => "successful",
        TransactionStatus::Failed => "failed",
        TransactionStatus::Pending => "pending",
    };

    let mut body = format!(
        "Your {} purchase ({}) of {} is {}. Request ID: {}.",
        family, meta.product_descriptor, meta.amount, outcome, meta.request_id
    );
    if !meta.transaction_id.is_empty() {
        body.push_str(&format!(" Transaction ID: {}.", meta.transaction_id));
    }

    Message::new(
        meta.user_identifier.clone(),
        format!("{} purchase {}", family, outcome),
        body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bills::{AirtimePurchase, AirtimeService, BillService};
    use crate::database::memory::InMemoryMessageSink;
    use bigdecimal::BigDecimal;

    #[tokio::test]
    async fn queues_message_for_settled_purchase() {
        let sink = Arc::new(InMemoryMessageSink::new());
        let notifier = PurchaseNotifier::new(sink.clone());

        let mut record = AirtimeService::pending_record(&AirtimePurchase {
            request_id: "air-9".to_string(),
            network: "mtn".to_string(),
            phone: "08031234567".to_string(),
            email: Some("ada@example.com".to_string()),
            amount: BigDecimal::from(100),
        });
        record.meta.status = TransactionStatus::Success;
        record.meta.transaction_id = "TX-9".to_string();

        notifier.notify(BillFamily::Airtime, &record).await;

        let messages = sink.messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].recipient, "ada@example.com");
        assert_eq!(messages[0].subject, "airtime purchase successful");
        assert!(messages[0].body.contains("Transaction ID: TX-9"));
    }
}
