use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use rentdesk_core::conversation::ConversationRecord;
use rentdesk_core::domain::booking::{BookingRequest, BookingRequestId};
use rentdesk_core::domain::session::Session;
use rentdesk_core::domain::user::UserId;

use super::{
    BookingRequestRepository, ConversationStateRepository, RepositoryError, SessionRepository,
};

#[derive(Default)]
pub struct InMemoryConversationStateRepository {
    records: RwLock<HashMap<UserId, ConversationRecord>>,
}

#[async_trait::async_trait]
impl ConversationStateRepository for InMemoryConversationStateRepository {
    async fn get_or_create(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<ConversationRecord, RepositoryError> {
        if let Some(record) = self.records.read().await.get(&user_id) {
            return Ok(record.clone());
        }
        let mut records = self.records.write().await;
        Ok(records.entry(user_id).or_insert_with(|| ConversationRecord::new(user_id, now)).clone())
    }

    async fn find(&self, user_id: UserId) -> Result<Option<ConversationRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.get(&user_id).cloned())
    }

    async fn save(&self, record: ConversationRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        records.insert(record.user_id, record);
        Ok(())
    }

    async fn delete(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        let mut records = self.records.write().await;
        Ok(records.remove(&user_id).is_some())
    }

    async fn evict_idle(&self, cutoff: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| record.last_activity >= cutoff);
        Ok(before - records.len())
    }
}

#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<UserId, Session>>,
}

#[async_trait::async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn get_or_create(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Session, RepositoryError> {
        if let Some(session) = self.sessions.read().await.get(&user_id) {
            return Ok(session.clone());
        }
        let mut sessions = self.sessions.write().await;
        Ok(sessions.entry(user_id).or_insert_with(|| Session::new(user_id, now)).clone())
    }

    async fn find(&self, user_id: UserId) -> Result<Option<Session>, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&user_id).cloned())
    }

    async fn save(&self, session: Session) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.user_id, session);
        Ok(())
    }

    async fn delete(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.remove(&user_id).is_some())
    }

    async fn evict_idle(&self, cutoff: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.last_activity >= cutoff);
        Ok(before - sessions.len())
    }
}

#[derive(Default)]
pub struct InMemoryBookingRequestRepository {
    requests: RwLock<HashMap<String, BookingRequest>>,
}

#[async_trait::async_trait]
impl BookingRequestRepository for InMemoryBookingRequestRepository {
    async fn find_by_id(
        &self,
        id: &BookingRequestId,
    ) -> Result<Option<BookingRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(requests.get(&id.0).cloned())
    }

    async fn save(&self, request: BookingRequest) -> Result<(), RepositoryError> {
        let mut requests = self.requests.write().await;
        requests.insert(request.id.0.clone(), request);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, NaiveDate, Utc};
    use rust_decimal::Decimal;

    use rentdesk_core::conversation::{ConversationRecord, ConversationState};
    use rentdesk_core::domain::booking::{BookingDraft, BookingRequest, BookingRequestId};
    use rentdesk_core::domain::user::UserId;
    use rentdesk_core::domain::vehicle::VehicleId;

    use crate::repositories::{
        BookingRequestRepository, ConversationStateRepository, InMemoryBookingRequestRepository,
        InMemoryConversationStateRepository, InMemorySessionRepository, SessionRepository,
    };

    #[tokio::test]
    async fn in_memory_booking_repo_round_trip() {
        let repo = InMemoryBookingRequestRepository::default();
        let request = BookingRequest::new(
            BookingRequestId("R-1".to_string()),
            BookingDraft {
                requester_id: UserId(7),
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

        repo.save(request.clone()).await.expect("save request");
        let found = repo.find_by_id(&request.id).await.expect("find request");

        assert_eq!(found, Some(request));
        assert_eq!(repo.find_by_id(&BookingRequestId("missing".to_string())).await.expect("find"), None);
    }

    #[tokio::test]
    async fn concurrent_get_or_create_shares_one_entry() {
        let repo = Arc::new(InMemoryConversationStateRepository::default());
        let first_seen = Utc::now();

        let mut handles = Vec::new();
        for offset in 0..16 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.get_or_create(UserId(1), first_seen + Duration::seconds(offset)).await
            }));
        }

        let mut activities = Vec::new();
        for handle in handles {
            activities.push(handle.await.expect("join").expect("record").last_activity);
        }

        assert!(activities.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[tokio::test]
    async fn conversation_state_survives_save_and_delete_resets() {
        let repo = InMemoryConversationStateRepository::default();
        let mut record = repo.get_or_create(UserId(5), Utc::now()).await.expect("record");
        record.state = ConversationState::AwaitingContactInfo;
        repo.save(record).await.expect("save");

        let found = repo.find(UserId(5)).await.expect("find").expect("present");
        assert_eq!(found.state, ConversationState::AwaitingContactInfo);

        assert!(repo.delete(UserId(5)).await.expect("delete"));
        let fresh = repo.get_or_create(UserId(5), Utc::now()).await.expect("record");
        assert_eq!(fresh.state, ConversationState::Default);
    }

    #[tokio::test]
    async fn evict_idle_drops_only_stale_entries() {
        let now = Utc::now();
        let conversations = InMemoryConversationStateRepository::default();
        conversations.save(ConversationRecord::new(UserId(1), now - Duration::hours(3))).await.expect("save");
        conversations.save(ConversationRecord::new(UserId(2), now)).await.expect("save");

        let sessions = InMemorySessionRepository::default();
        sessions.get_or_create(UserId(1), now - Duration::hours(3)).await.expect("session");
        sessions.get_or_create(UserId(2), now).await.expect("session");

        let cutoff = now - Duration::hours(1);
        assert_eq!(conversations.evict_idle(cutoff).await.expect("evict"), 1);
        assert_eq!(sessions.evict_idle(cutoff).await.expect("evict"), 1);
        assert!(conversations.find(UserId(1)).await.expect("find").is_none());
        assert!(sessions.find(UserId(2)).await.expect("find").is_some());
    }
}
