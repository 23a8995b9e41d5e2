pub mod audit;
pub mod calendar;
pub mod clock;
pub mod config;
pub mod contact;
pub mod conversation;
pub mod domain;
pub mod errors;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use calendar::{render_month, CalendarAction, CalendarGrid, CalendarMode, DayStatus};
pub use clock::{Clock, FixedClock, SystemClock};
pub use contact::extract_contact;
pub use conversation::{
    BookingFlow, ConversationAction, ConversationContext, ConversationEngine, ConversationEvent,
    ConversationRecord, ConversationState,
};
pub use domain::availability::{AvailabilitySnapshot, VehicleAvailability, DEFAULT_HORIZON_DAYS};
pub use domain::booking::{
    BookingDraft, BookingRequest, BookingRequestId, ContactInfo, DocumentRef, DocumentSlot,
};
pub use domain::session::Session;
pub use domain::user::{AdminDirectory, UserId};
pub use domain::vehicle::{Fleet, RentalQuote, Vehicle, VehicleId, VehicleKind};
pub use errors::{ApplicationError, DomainError, InterfaceError};
