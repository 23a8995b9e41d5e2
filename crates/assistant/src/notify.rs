use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use rentdesk_core::domain::booking::{BookingRequest, DocumentRef};
use rentdesk_core::domain::user::{AdminDirectory, UserId};

use crate::blocks::{admin_booking_summary, admin_relay_message, wish_notification, MessageTemplate};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("delivery to {recipient} failed: {message}")]
    Delivery { recipient: UserId, message: String },
    #[error("no administrators are configured")]
    NoRecipients,
}

/// Per-recipient outcome of one fan-out.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub delivered: Vec<UserId>,
    pub failed: Vec<(UserId, String)>,
}

impl DeliveryReport {
    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Outbound side of the transport: sends one rendered message or one stored document.
#[async_trait]
pub trait MessageDelivery: Send + Sync {
    async fn send_message(&self, recipient: UserId, message: &MessageTemplate) -> Result<(), NotifyError>;
    async fn send_document(
        &self,
        recipient: UserId,
        document: &DocumentRef,
        caption: &str,
    ) -> Result<(), NotifyError>;
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn booking_submitted(&self, request: &BookingRequest) -> Result<DeliveryReport, NotifyError>;
    async fn wish_received(
        &self,
        user_id: UserId,
        display_name: &str,
        username: Option<&str>,
        wish: &str,
    ) -> Result<DeliveryReport, NotifyError>;
    async fn admin_reply(&self, recipient: UserId, text: &str) -> Result<(), NotifyError>;
}

/// Delivers notifications to every administrator. A failing recipient is logged and skipped.
pub struct AdminFanout<D> {
    delivery: D,
    admins: AdminDirectory,
}

impl<D> AdminFanout<D>
where
    D: MessageDelivery,
{
    pub fn new(delivery: D, admins: AdminDirectory) -> Self {
        Self { delivery, admins }
    }

    pub fn delivery(&self) -> &D {
        &self.delivery
    }

    async fn deliver_to_admin(&self, admin: UserId, request: &BookingRequest) -> Result<(), NotifyError> {
        self.delivery.send_message(admin, &admin_booking_summary(request)).await?;
        for (slot, document) in request.documents.attached() {
            self.delivery.send_document(admin, document, slot.label()).await?;
        }
        Ok(())
    }

    fn ensure_recipients(&self) -> Result<(), NotifyError> {
        if self.admins.is_empty() {
            tracing::warn!(event_name = "notify.no_admins", "no administrators configured");
            return Err(NotifyError::NoRecipients);
        }
        Ok(())
    }
}

#[async_trait]
impl<D> NotificationSink for AdminFanout<D>
where
    D: MessageDelivery,
{
    async fn booking_submitted(&self, request: &BookingRequest) -> Result<DeliveryReport, NotifyError> {
        self.ensure_recipients()?;

        let mut report = DeliveryReport::default();
        for admin in self.admins.ids() {
            match self.deliver_to_admin(admin, request).await {
                Ok(()) => report.delivered.push(admin),
                Err(error) => {
                    tracing::warn!(
                        event_name = "notify.booking.admin_failed",
                        request_id = %request.id,
                        admin_id = %admin,
                        error = %error,
                        "failed to notify administrator"
                    );
                    report.failed.push((admin, error.to_string()));
                }
            }
        }

        tracing::info!(
            event_name = "notify.booking.completed",
            request_id = %request.id,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "booking notification fan-out finished"
        );
        Ok(report)
    }

    async fn wish_received(
        &self,
        user_id: UserId,
        display_name: &str,
        username: Option<&str>,
        wish: &str,
    ) -> Result<DeliveryReport, NotifyError> {
        self.ensure_recipients()?;

        let message = wish_notification(&format!("{display_name} (id {user_id})"), username, wish);
        let mut report = DeliveryReport::default();
        for admin in self.admins.ids() {
            match self.delivery.send_message(admin, &message).await {
                Ok(()) => report.delivered.push(admin),
                Err(error) => {
                    tracing::warn!(
                        event_name = "notify.wish.admin_failed",
                        user_id = %user_id,
                        admin_id = %admin,
                        error = %error,
                        "failed to forward wish"
                    );
                    report.failed.push((admin, error.to_string()));
                }
            }
        }
        Ok(report)
    }

    async fn admin_reply(&self, recipient: UserId, text: &str) -> Result<(), NotifyError> {
        self.delivery.send_message(recipient, &admin_relay_message(text)).await
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivered {
    Message(MessageTemplate),
    Document { document: DocumentRef, caption: String },
}

/// Records everything it is asked to send. Recipients marked as failing get an error instead.
#[derive(Default)]
pub struct RecordingDelivery {
    sent: Mutex<HashMap<UserId, Vec<Delivered>>>,
    failing: Mutex<HashSet<UserId>>,
}

impl RecordingDelivery {
    pub fn fail_for(&self, recipient: UserId) {
        match self.failing.lock() {
            Ok(mut failing) => failing.insert(recipient),
            Err(poisoned) => poisoned.into_inner().insert(recipient),
        };
    }

    pub fn sent_to(&self, recipient: UserId) -> Vec<Delivered> {
        match self.sent.lock() {
            Ok(sent) => sent.get(&recipient).cloned().unwrap_or_default(),
            Err(poisoned) => poisoned.into_inner().get(&recipient).cloned().unwrap_or_default(),
        }
    }

    fn is_failing(&self, recipient: UserId) -> bool {
        match self.failing.lock() {
            Ok(failing) => failing.contains(&recipient),
            Err(poisoned) => poisoned.into_inner().contains(&recipient),
        }
    }

    fn record(&self, recipient: UserId, item: Delivered) -> Result<(), NotifyError> {
        if self.is_failing(recipient) {
            return Err(NotifyError::Delivery {
                recipient,
                message: "recipient unreachable".to_string(),
            });
        }
        match self.sent.lock() {
            Ok(mut sent) => sent.entry(recipient).or_default().push(item),
            Err(poisoned) => poisoned.into_inner().entry(recipient).or_default().push(item),
        }
        Ok(())
    }
}

#[async_trait]
impl MessageDelivery for RecordingDelivery {
    async fn send_message(&self, recipient: UserId, message: &MessageTemplate) -> Result<(), NotifyError> {
        self.record(recipient, Delivered::Message(message.clone()))
    }

    async fn send_document(
        &self,
        recipient: UserId,
        document: &DocumentRef,
        caption: &str,
    ) -> Result<(), NotifyError> {
        self.record(
            recipient,
            Delivered::Document { document: document.clone(), caption: caption.to_string() },
        )
    }
}

#[async_trait]
impl<T> MessageDelivery for std::sync::Arc<T>
where
    T: MessageDelivery + ?Sized,
{
    async fn send_message(&self, recipient: UserId, message: &MessageTemplate) -> Result<(), NotifyError> {
        (**self).send_message(recipient, message).await
    }

    async fn send_document(
        &self,
        recipient: UserId,
        document: &DocumentRef,
        caption: &str,
    ) -> Result<(), NotifyError> {
        (**self).send_document(recipient, document, caption).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use rentdesk_core::domain::booking::{
        BookingDraft, BookingRequest, BookingRequestId, DocumentRef, DocumentSlot,
    };
    use rentdesk_core::domain::user::{AdminDirectory, UserId};
    use rentdesk_core::domain::vehicle::VehicleId;

    use super::{AdminFanout, Delivered, NotificationSink, NotifyError, RecordingDelivery};

    fn request() -> BookingRequest {
        let mut request = BookingRequest::new(
            BookingRequestId("R-1".to_string()),
            BookingDraft {
                requester_id: UserId(42),
                requester_name: "Ivan".to_string(),
                vehicle_id: VehicleId("car1".to_string()),
                vehicle_name: "Kia Rio".to_string(),
                start_date: NaiveDate::from_ymd_opt(2024, 6, 1).expect("date"),
                end_date: NaiveDate::from_ymd_opt(2024, 6, 4).expect("date"),
                total_price: Decimal::new(9000, 0),
                pawn_price: Decimal::new(15000, 0),
            },
            Utc::now(),
        )
        .expect("request");
        request.documents.set(DocumentSlot::PassportMain, DocumentRef("doc-1".to_string()));
        request.documents.set(DocumentSlot::LicenseBack, DocumentRef("doc-4".to_string()));
        request
    }

    #[tokio::test]
    async fn one_failing_admin_does_not_block_others() {
        let delivery = Arc::new(RecordingDelivery::default());
        delivery.fail_for(UserId(1));
        let fanout = AdminFanout::new(delivery.clone(), AdminDirectory::new([UserId(1), UserId(2)]));

        let report = fanout.booking_submitted(&request()).await.expect("fan-out");

        assert_eq!(report.delivered, vec![UserId(2)]);
        assert_eq!(report.failed.len(), 1);
        assert!(!report.all_delivered());

        let sent = delivery.sent_to(UserId(2));
        assert_eq!(sent.len(), 3);
        assert!(matches!(&sent[0], Delivered::Message(message) if message.has_action("admin_reply_R-1")));
        assert!(matches!(
            &sent[2],
            Delivered::Document { document, .. } if document == &DocumentRef("doc-4".to_string())
        ));
    }

    #[tokio::test]
    async fn empty_admin_list_is_reported() {
        let fanout = AdminFanout::new(RecordingDelivery::default(), AdminDirectory::default());

        let result = fanout.wish_received(UserId(42), "Ivan", None, "Ducati").await;

        assert_eq!(result, Err(NotifyError::NoRecipients));
    }

    #[tokio::test]
    async fn wish_carries_sender_contact_link() {
        let delivery = Arc::new(RecordingDelivery::default());
        let fanout = AdminFanout::new(delivery.clone(), AdminDirectory::new([UserId(1)]));

        let report = fanout.wish_received(UserId(42), "Ivan", Some("ivan_rides"), "Ducati").await.expect("wish");

        assert!(report.all_delivered());
        let sent = delivery.sent_to(UserId(1));
        assert!(matches!(
            &sent[..],
            [Delivered::Message(message)]
                if message.text.contains("Ivan (id 42)")
                    && message.text.contains("https://t.me/ivan_rides")
                    && message.text.contains("Ducati")
        ));
    }

    #[tokio::test]
    async fn admin_reply_reaches_requester() {
        let delivery = Arc::new(RecordingDelivery::default());
        let fanout = AdminFanout::new(delivery.clone(), AdminDirectory::new([UserId(1)]));

        fanout.admin_reply(UserId(42), "See you tomorrow at 10").await.expect("relay");

        let sent = delivery.sent_to(UserId(42));
        assert!(matches!(&sent[0], Delivered::Message(message) if message.text.contains("See you tomorrow")));
    }
}
