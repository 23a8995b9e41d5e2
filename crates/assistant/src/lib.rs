//! Booking assistant - conversation handling for the rental desk
//!
//! This crate turns inbound transport events into replies:
//! - **Events** (`events`) - inbound event model, `EventDispatcher` and handler trait
//! - **Assistant** (`assistant`) - `BookingAssistant`, the per-user booking conversation
//! - **Booking** (`booking`) - `BookingRequestAggregator`, request creation and completion
//! - **Notify** (`notify`) - administrator fan-out for submitted requests, wishes and replies
//! - **Blocks** (`blocks`) - reply templates: text plus keyboard rows of action buttons
//!
//! # Architecture
//!
//! ```text
//! Transport → EventDispatcher → BookingAssistant → ConversationEngine (core)
//!                                      ↓                 ↓
//!                           AvailabilityStore (db)   NotificationSink → admins
//!                                      ↓
//!                               MessageTemplate ← reply
//! ```
//!
//! The transport itself is not part of this crate: it feeds `InboundEvent`s in and delivers
//! the returned `MessageTemplate`s through its own `MessageDelivery` implementation.

pub mod assistant;
pub mod blocks;
pub mod booking;
pub mod events;
pub mod locks;
pub mod notify;

pub use assistant::{AssistantError, AssistantServices, BookingAssistant, EvictionReport};
pub use blocks::{Button, MessageBuilder, MessageTemplate};
pub use booking::{BookingError, BookingRequestAggregator};
pub use events::{
    DispatchError, EventContext, EventDispatcher, EventHandler, HandlerResult, InboundEvent,
    InboundEventType, InboundKind,
};
pub use locks::KeyedLocks;
pub use notify::{
    AdminFanout, Delivered, DeliveryReport, MessageDelivery, NotificationSink, NotifyError,
    RecordingDelivery,
};
