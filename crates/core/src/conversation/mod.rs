pub mod engine;
pub mod states;

pub use engine::{BookingFlow, ConversationEngine, ConversationFlow, ConversationTransitionError};
pub use states::{
    ConversationAction, ConversationContext, ConversationEvent, ConversationRecord,
    ConversationState, TransitionOutcome,
};
