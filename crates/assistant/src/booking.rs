use std::sync::Arc;

use thiserror::Error;

use rentdesk_core::clock::Clock;
use rentdesk_core::contact::extract_contact;
use rentdesk_core::domain::booking::{
    BookingDraft, BookingRequest, BookingRequestId, DocumentRef, DocumentSlot,
};
use rentdesk_core::errors::DomainError;
use rentdesk_db::repositories::{BookingRequestRepository, RepositoryError};

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("booking request `{0}` was not found")]
    NotFound(BookingRequestId),
    #[error("booking request `{id}` is incomplete: missing {missing:?}")]
    Incomplete { id: BookingRequestId, missing: Vec<String> },
    #[error("booking request `{0}` was already submitted")]
    AlreadySubmitted(BookingRequestId),
    #[error(transparent)]
    InvalidDraft(#[from] DomainError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Creates booking requests and fills them in step by step. Requests are only reachable by id.
pub struct BookingRequestAggregator {
    repository: Arc<dyn BookingRequestRepository>,
    clock: Arc<dyn Clock>,
}

impl BookingRequestAggregator {
    pub fn new(repository: Arc<dyn BookingRequestRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    pub async fn create(&self, draft: BookingDraft) -> Result<BookingRequest, BookingError> {
        let request = BookingRequest::new(BookingRequestId::generate(), draft, self.clock.now())?;
        self.repository.save(request.clone()).await?;

        tracing::info!(
            event_name = "booking.request.created",
            request_id = %request.id,
            user_id = %request.requester_id,
            vehicle_id = %request.vehicle_id,
            total_days = request.total_days(),
            "booking request created"
        );
        Ok(request)
    }

    pub async fn get(&self, id: &BookingRequestId) -> Result<Option<BookingRequest>, BookingError> {
        Ok(self.repository.find_by_id(id).await?)
    }

    pub async fn attach_document(
        &self,
        id: &BookingRequestId,
        slot: DocumentSlot,
        document: DocumentRef,
    ) -> Result<BookingRequest, BookingError> {
        let mut request = self.open_request(id).await?;
        request.documents.set(slot, document);
        self.repository.save(request.clone()).await?;

        tracing::info!(
            event_name = "booking.document.attached",
            request_id = %id,
            slot = ?slot,
            "document attached"
        );
        Ok(request)
    }

    /// Never fails on the text itself: anything the extractor cannot classify is kept verbatim
    /// as the phone.
    pub async fn attach_contact(
        &self,
        id: &BookingRequestId,
        raw_text: &str,
    ) -> Result<BookingRequest, BookingError> {
        let mut request = self.open_request(id).await?;
        let contact = extract_contact(raw_text);
        if contact.is_empty() {
            tracing::warn!(
                event_name = "booking.contact.empty",
                request_id = %id,
                "contact text yielded neither username nor phone"
            );
        }
        request.apply_contact(contact);
        self.repository.save(request.clone()).await?;

        tracing::info!(
            event_name = "booking.contact.attached",
            request_id = %id,
            has_username = request.telegram_username.is_some(),
            has_phone = request.phone_number.is_some(),
            "contact attached"
        );
        Ok(request)
    }

    /// Marks a complete request as handed over. Succeeds once per request.
    pub async fn submit(&self, id: &BookingRequestId) -> Result<BookingRequest, BookingError> {
        let mut request = self.open_request(id).await?;
        let missing = request.missing_fields();
        if !missing.is_empty() {
            return Err(BookingError::Incomplete { id: id.clone(), missing });
        }

        request.submitted_at = Some(self.clock.now());
        self.repository.save(request.clone()).await?;

        tracing::info!(event_name = "booking.request.submitted", request_id = %id, "booking request submitted");
        Ok(request)
    }

    async fn open_request(&self, id: &BookingRequestId) -> Result<BookingRequest, BookingError> {
        let Some(request) = self.repository.find_by_id(id).await? else {
            tracing::warn!(event_name = "booking.request.not_found", request_id = %id, "unknown booking request");
            return Err(BookingError::NotFound(id.clone()));
        };
        if request.is_submitted() {
            return Err(BookingError::AlreadySubmitted(id.clone()));
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use rentdesk_core::clock::FixedClock;
    use rentdesk_core::domain::booking::{BookingDraft, BookingRequestId, DocumentRef, DocumentSlot};
    use rentdesk_core::domain::user::UserId;
    use rentdesk_core::domain::vehicle::VehicleId;
    use rentdesk_db::repositories::InMemoryBookingRequestRepository;

    use super::{BookingError, BookingRequestAggregator};

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    fn aggregator() -> BookingRequestAggregator {
        BookingRequestAggregator::new(
            Arc::new(InMemoryBookingRequestRepository::default()),
            Arc::new(FixedClock::new(date("2024-05-30"))),
        )
    }

    fn draft() -> BookingDraft {
        BookingDraft {
            requester_id: UserId(42),
            requester_name: "Ivan Petrov".to_string(),
            vehicle_id: VehicleId("car1".to_string()),
            vehicle_name: "Kia Rio".to_string(),
            start_date: date("2024-06-01"),
            end_date: date("2024-06-04"),
            total_price: Decimal::new(9000, 0),
            pawn_price: Decimal::new(15000, 0),
        }
    }

    #[tokio::test]
    async fn created_request_computes_total_days() {
        let request = aggregator().create(draft()).await.expect("create");

        assert_eq!(request.total_days(), 3);
        assert!(!request.id.as_str().is_empty());
    }

    #[tokio::test]
    async fn unknown_request_is_not_found() {
        let aggregator = aggregator();
        let missing = BookingRequestId("missing".to_string());

        let result = aggregator
            .attach_document(&missing, DocumentSlot::PassportMain, DocumentRef("file-1".to_string()))
            .await;

        assert!(matches!(result, Err(BookingError::NotFound(_))));
        assert!(aggregator.get(&missing).await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn unrecognised_contact_is_kept_verbatim() {
        let aggregator = aggregator();
        let request = aggregator.create(draft()).await.expect("create");

        let updated = aggregator.attach_contact(&request.id, "  звоните вечером  ").await.expect("contact");

        assert_eq!(updated.phone_number.as_deref(), Some("звоните вечером"));
        assert!(updated.telegram_username.is_none());
    }

    #[tokio::test]
    async fn submit_requires_all_fields_and_happens_once() {
        let aggregator = aggregator();
        let request = aggregator.create(draft()).await.expect("create");

        let incomplete = aggregator.submit(&request.id).await;
        assert!(matches!(incomplete, Err(BookingError::Incomplete { ref missing, .. }) if missing.len() == 5));

        for (index, slot) in DocumentSlot::ALL.into_iter().enumerate() {
            aggregator
                .attach_document(&request.id, slot, DocumentRef(format!("file-{index}")))
                .await
                .expect("attach");
        }
        aggregator.attach_contact(&request.id, "@ivan_2024 +7 999 123-45-67").await.expect("contact");

        let submitted = aggregator.submit(&request.id).await.expect("submit");
        assert!(submitted.is_submitted());
        assert_eq!(submitted.documents.get(DocumentSlot::LicenseBack), Some(&DocumentRef("file-3".to_string())));

        assert!(matches!(aggregator.submit(&request.id).await, Err(BookingError::AlreadySubmitted(_))));
    }
}
