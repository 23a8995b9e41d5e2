use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::booking::DocumentSlot;
use crate::domain::user::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConversationState {
    Default,
    AwaitingWishes,
    AwaitingPassportPhoto,
    AwaitingPassportRegistration,
    AwaitingDrivingLicenseFrontPhoto,
    AwaitingDrivingLicenseBackPhoto,
    AwaitingContactInfo,
    /// A requester whose completed request is waiting for an administrator.
    RequestSubmitted,
    /// An administrator whose next text is relayed to a requester.
    AdminReplyingToUser,
}

impl ConversationState {
    /// States that accept the same inputs as `Default`.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Default | Self::RequestSubmitted)
    }

    /// The document slot this state is waiting for, if any.
    pub fn awaited_document(&self) -> Option<DocumentSlot> {
        match self {
            Self::AwaitingPassportPhoto => Some(DocumentSlot::PassportMain),
            Self::AwaitingPassportRegistration => Some(DocumentSlot::PassportRegistration),
            Self::AwaitingDrivingLicenseFrontPhoto => Some(DocumentSlot::LicenseFront),
            Self::AwaitingDrivingLicenseBackPhoto => Some(DocumentSlot::LicenseBack),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationEvent {
    WishesRequested,
    TextReceived,
    DocumentReceived,
    BookingCommitted,
    AdminReplyRequested,
    CancelRequested,
}

/// Facts the assistant gathered before asking for a transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConversationContext {
    pub missing_booking_fields: Vec<String>,
    pub is_admin: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationAction {
    PromptForWishes,
    RecordWish,
    NotifyWish,
    OpenBookingRequest,
    AttachDocument(DocumentSlot),
    PromptForDocument(DocumentSlot),
    PromptForContact,
    CaptureContact,
    SubmitBookingRequest,
    PromptForAdminReply,
    RelayAdminReply,
    ClearConversationData,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: ConversationState,
    pub to: ConversationState,
    pub event: ConversationEvent,
    pub actions: Vec<ConversationAction>,
}

pub const WISHES_KEY: &str = "wishes";
pub const REPLYING_TO_KEY: &str = "replying_to";
pub const REPLY_USER_KEY: &str = "reply_user_id";

/// Per-user conversation entry: state, a small data bag and the last time it was touched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub user_id: UserId,
    pub state: ConversationState,
    pub data: BTreeMap<String, Value>,
    pub last_activity: DateTime<Utc>,
}

impl ConversationRecord {
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self { user_id, state: ConversationState::Default, data: BTreeMap::new(), last_activity: now }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    pub fn set_data(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    pub fn data_i64(&self, key: &str) -> Option<i64> {
        self.data.get(key).and_then(Value::as_i64)
    }

    pub fn remove_data(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Appends to a list entry, replacing any non-list value stored under the same key.
    pub fn push_data(&mut self, key: &str, value: impl Into<Value>) {
        let entry = self.data.entry(key.to_string()).or_insert_with(|| Value::Array(Vec::new()));
        if !entry.is_array() {
            *entry = Value::Array(Vec::new());
        }
        if let Value::Array(items) = entry {
            items.push(value.into());
        }
    }

    pub fn data_list(&self, key: &str) -> Vec<String> {
        self.data
            .get(key)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::booking::DocumentSlot;
    use crate::domain::user::UserId;

    use super::{ConversationRecord, ConversationState, WISHES_KEY};

    #[test]
    fn new_record_starts_in_default() {
        let record = ConversationRecord::new(UserId(5), Utc::now());

        assert_eq!(record.state, ConversationState::Default);
        assert!(record.data.is_empty());
    }

    #[test]
    fn wish_list_accumulates_text() {
        let mut record = ConversationRecord::new(UserId(5), Utc::now());
        record.push_data(WISHES_KEY, "child seat");
        record.push_data(WISHES_KEY, "delivery to the airport");

        assert_eq!(
            record.data_list(WISHES_KEY),
            vec!["child seat".to_string(), "delivery to the airport".to_string()]
        );
    }

    #[test]
    fn push_replaces_scalar_values() {
        let mut record = ConversationRecord::new(UserId(5), Utc::now());
        record.set_data(WISHES_KEY, "legacy");
        record.push_data(WISHES_KEY, "helmet");

        assert_eq!(record.data_list(WISHES_KEY), vec!["helmet".to_string()]);
    }

    #[test]
    fn awaited_documents_follow_collection_order() {
        assert_eq!(ConversationState::AwaitingPassportPhoto.awaited_document(), Some(DocumentSlot::PassportMain));
        assert_eq!(
            ConversationState::AwaitingDrivingLicenseBackPhoto.awaited_document(),
            Some(DocumentSlot::LicenseBack)
        );
        assert_eq!(ConversationState::AwaitingContactInfo.awaited_document(), None);
        assert!(ConversationState::RequestSubmitted.is_idle());
        assert!(!ConversationState::AdminReplyingToUser.is_idle());
    }
}
