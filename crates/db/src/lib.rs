pub mod availability;
pub mod repositories;

pub use availability::{
    AvailabilityPersistence, AvailabilityStore, AvailabilityStoreError, InMemoryAvailabilityPersistence,
    JsonFileAvailability, ReconcileReport,
};
pub use repositories::{
    BookingRequestRepository, ConversationStateRepository, InMemoryBookingRequestRepository,
    InMemoryConversationStateRepository, InMemorySessionRepository, RepositoryError,
    SessionRepository,
};
