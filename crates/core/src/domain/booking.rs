use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::user::UserId;
use crate::domain::vehicle::VehicleId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BookingRequestId(pub String);

impl BookingRequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookingRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSlot {
    PassportMain,
    PassportRegistration,
    LicenseFront,
    LicenseBack,
}

impl DocumentSlot {
    pub const ALL: [DocumentSlot; 4] =
        [Self::PassportMain, Self::PassportRegistration, Self::LicenseFront, Self::LicenseBack];

    pub fn label(&self) -> &'static str {
        match self {
            Self::PassportMain => "passport main page",
            Self::PassportRegistration => "passport registration page",
            Self::LicenseFront => "driving license front",
            Self::LicenseBack => "driving license back",
        }
    }
}

/// Opaque transport reference to an uploaded photo or document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef(pub String);

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingDocuments {
    pub passport_main: Option<DocumentRef>,
    pub passport_registration: Option<DocumentRef>,
    pub license_front: Option<DocumentRef>,
    pub license_back: Option<DocumentRef>,
}

impl BookingDocuments {
    pub fn get(&self, slot: DocumentSlot) -> Option<&DocumentRef> {
        match slot {
            DocumentSlot::PassportMain => self.passport_main.as_ref(),
            DocumentSlot::PassportRegistration => self.passport_registration.as_ref(),
            DocumentSlot::LicenseFront => self.license_front.as_ref(),
            DocumentSlot::LicenseBack => self.license_back.as_ref(),
        }
    }

    pub fn set(&mut self, slot: DocumentSlot, document: DocumentRef) {
        let target = match slot {
            DocumentSlot::PassportMain => &mut self.passport_main,
            DocumentSlot::PassportRegistration => &mut self.passport_registration,
            DocumentSlot::LicenseFront => &mut self.license_front,
            DocumentSlot::LicenseBack => &mut self.license_back,
        };
        *target = Some(document);
    }

    pub fn missing(&self) -> Vec<DocumentSlot> {
        DocumentSlot::ALL.into_iter().filter(|slot| self.get(*slot).is_none()).collect()
    }

    pub fn attached(&self) -> impl Iterator<Item = (DocumentSlot, &DocumentRef)> {
        DocumentSlot::ALL.into_iter().filter_map(|slot| self.get(slot).map(|doc| (slot, doc)))
    }
}

/// Best-effort contact details parsed from one line of free text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub username: Option<String>,
    pub phone: Option<String>,
}

impl ContactInfo {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.phone.is_none()
    }
}

/// Everything needed to open a request once a vehicle and range are chosen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookingDraft {
    pub requester_id: UserId,
    pub requester_name: String,
    pub vehicle_id: VehicleId,
    pub vehicle_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_price: Decimal,
    pub pawn_price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub id: BookingRequestId,
    pub requester_id: UserId,
    pub requester_name: String,
    pub vehicle_id: VehicleId,
    pub vehicle_name: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    pub total_price: Decimal,
    pub pawn_price: Decimal,
    pub documents: BookingDocuments,
    pub telegram_username: Option<String>,
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl BookingRequest {
    pub fn new(
        id: BookingRequestId,
        draft: BookingDraft,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if draft.end_date < draft.start_date {
            return Err(DomainError::InvariantViolation(format!(
                "booking end {} is before start {}",
                draft.end_date, draft.start_date
            )));
        }

        Ok(Self {
            id,
            requester_id: draft.requester_id,
            requester_name: draft.requester_name,
            vehicle_id: draft.vehicle_id,
            vehicle_name: draft.vehicle_name,
            start_date: draft.start_date,
            end_date: draft.end_date,
            total_price: draft.total_price,
            pawn_price: draft.pawn_price,
            documents: BookingDocuments::default(),
            telegram_username: None,
            phone_number: None,
            created_at,
            submitted_at: None,
        })
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    pub fn total_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }

    pub fn grand_total(&self) -> Decimal {
        self.total_price + self.pawn_price
    }

    pub fn apply_contact(&mut self, contact: ContactInfo) {
        self.telegram_username = contact.username;
        self.phone_number = contact.phone;
    }

    pub fn has_contact(&self) -> bool {
        self.telegram_username.is_some() || self.phone_number.is_some()
    }

    pub fn missing_fields(&self) -> Vec<String> {
        let mut missing: Vec<String> =
            self.documents.missing().into_iter().map(|slot| slot.label().to_string()).collect();
        if !self.has_contact() {
            missing.push("contact".to_string());
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }

    /// `https://t.me/<username>` when a username is known, otherwise the phone.
    pub fn contact_link(&self) -> Option<String> {
        match (&self.telegram_username, &self.phone_number) {
            (Some(username), _) => Some(format!("https://t.me/{username}")),
            (None, Some(phone)) => Some(phone.clone()),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use crate::domain::user::UserId;
    use crate::domain::vehicle::VehicleId;

    use super::{
        BookingDraft, BookingRequest, BookingRequestId, ContactInfo, DocumentRef, DocumentSlot,
    };

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    fn draft(start: &str, end: &str) -> BookingDraft {
        BookingDraft {
            requester_id: UserId(42),
            requester_name: "Ivan".to_string(),
            vehicle_id: VehicleId("car1".to_string()),
            vehicle_name: "Kia Rio".to_string(),
            start_date: date(start),
            end_date: date(end),
            total_price: Decimal::new(9000, 0),
            pawn_price: Decimal::new(15000, 0),
        }
    }

    #[test]
    fn total_days_is_derived_from_range() {
        let request =
            BookingRequest::new(BookingRequestId::generate(), draft("2024-06-01", "2024-06-04"), Utc::now())
                .expect("valid request");

        assert_eq!(request.total_days(), 3);
        assert_eq!(request.grand_total(), Decimal::new(24000, 0));
    }

    #[test]
    fn end_before_start_is_rejected() {
        let result =
            BookingRequest::new(BookingRequestId::generate(), draft("2024-06-04", "2024-06-01"), Utc::now());

        assert!(result.is_err());
    }

    #[test]
    fn generated_ids_do_not_collide() {
        let first = BookingRequestId::generate();
        let second = BookingRequestId::generate();

        assert_ne!(first, second);
    }

    #[test]
    fn completeness_requires_all_documents_and_one_contact() {
        let mut request =
            BookingRequest::new(BookingRequestId::generate(), draft("2024-06-01", "2024-06-02"), Utc::now())
                .expect("valid request");
        assert_eq!(request.missing_fields().len(), 5);

        for (index, slot) in DocumentSlot::ALL.into_iter().enumerate() {
            request.documents.set(slot, DocumentRef(format!("file-{index}")));
        }
        assert!(!request.is_complete());
        assert_eq!(request.missing_fields(), vec!["contact".to_string()]);

        request.apply_contact(ContactInfo { username: None, phone: Some("+79991234567".to_string()) });
        assert!(request.is_complete());
        assert_eq!(request.contact_link().as_deref(), Some("+79991234567"));

        request.apply_contact(ContactInfo { username: Some("ivan_2024".to_string()), phone: None });
        assert_eq!(request.contact_link().as_deref(), Some("https://t.me/ivan_2024"));
    }

    #[test]
    fn documents_are_addressable_by_slot() {
        let mut request =
            BookingRequest::new(BookingRequestId::generate(), draft("2024-06-01", "2024-06-02"), Utc::now())
                .expect("valid request");
        request.documents.set(DocumentSlot::LicenseFront, DocumentRef("photo-7".to_string()));

        assert_eq!(
            request.documents.get(DocumentSlot::LicenseFront),
            Some(&DocumentRef("photo-7".to_string()))
        );
        assert_eq!(request.documents.attached().count(), 1);
        assert_eq!(request.documents.missing().len(), 3);
    }
}
