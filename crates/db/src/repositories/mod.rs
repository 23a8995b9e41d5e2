use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use rentdesk_core::conversation::ConversationRecord;
use rentdesk_core::domain::booking::{BookingRequest, BookingRequestId};
use rentdesk_core::domain::session::Session;
use rentdesk_core::domain::user::UserId;

pub mod memory;

pub use memory::{
    InMemoryBookingRequestRepository, InMemoryConversationStateRepository,
    InMemorySessionRepository,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Per-user conversation entries. `get_or_create` resolves concurrent first contacts to one
/// shared entry.
#[async_trait]
pub trait ConversationStateRepository: Send + Sync {
    async fn get_or_create(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<ConversationRecord, RepositoryError>;
    async fn find(&self, user_id: UserId) -> Result<Option<ConversationRecord>, RepositoryError>;
    async fn save(&self, record: ConversationRecord) -> Result<(), RepositoryError>;
    async fn delete(&self, user_id: UserId) -> Result<bool, RepositoryError>;
    /// Drops entries whose last activity is before `cutoff`; returns how many were removed.
    async fn evict_idle(&self, cutoff: DateTime<Utc>) -> Result<usize, RepositoryError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn get_or_create(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Session, RepositoryError>;
    async fn find(&self, user_id: UserId) -> Result<Option<Session>, RepositoryError>;
    async fn save(&self, session: Session) -> Result<(), RepositoryError>;
    async fn delete(&self, user_id: UserId) -> Result<bool, RepositoryError>;
    async fn evict_idle(&self, cutoff: DateTime<Utc>) -> Result<usize, RepositoryError>;
}

#[async_trait]
pub trait BookingRequestRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: &BookingRequestId,
    ) -> Result<Option<BookingRequest>, RepositoryError>;
    async fn save(&self, request: BookingRequest) -> Result<(), RepositoryError>;
}
