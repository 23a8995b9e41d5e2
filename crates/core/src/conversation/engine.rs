use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::conversation::states::{
    ConversationAction, ConversationContext, ConversationEvent, ConversationState, TransitionOutcome,
};
use crate::domain::booking::DocumentSlot;

pub trait ConversationFlow {
    fn initial_state(&self) -> ConversationState;
    fn transition(
        &self,
        current: &ConversationState,
        event: &ConversationEvent,
        context: &ConversationContext,
    ) -> Result<TransitionOutcome, ConversationTransitionError>;
}

/// Vehicle booking: wishes, document collection and contact capture, plus the administrator
/// reply loop.
#[derive(Clone, Debug, Default)]
pub struct BookingFlow;

impl ConversationFlow for BookingFlow {
    fn initial_state(&self) -> ConversationState {
        ConversationState::Default
    }

    fn transition(
        &self,
        current: &ConversationState,
        event: &ConversationEvent,
        context: &ConversationContext,
    ) -> Result<TransitionOutcome, ConversationTransitionError> {
        transition_booking(current, event, context)
    }
}

pub struct ConversationEngine<F> {
    flow: F,
}

impl<F> ConversationEngine<F>
where
    F: ConversationFlow,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_state(&self) -> ConversationState {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: &ConversationState,
        event: &ConversationEvent,
        context: &ConversationContext,
    ) -> Result<TransitionOutcome, ConversationTransitionError> {
        self.flow.transition(current, event, context)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: &ConversationState,
        event: &ConversationEvent,
        context: &ConversationContext,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, ConversationTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(current, event, context);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        audit,
                        "conversation.transition_applied",
                        AuditCategory::Conversation,
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", format!("{:?}", outcome.from))
                    .with_metadata("to", format!("{:?}", outcome.to))
                    .with_metadata("event", format!("{:?}", outcome.event)),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        audit,
                        "conversation.transition_rejected",
                        AuditCategory::Conversation,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

impl Default for ConversationEngine<BookingFlow> {
    fn default() -> Self {
        Self::new(BookingFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConversationTransitionError {
    #[error("missing required fields before transition from {state:?}: {missing_fields:?}")]
    MissingRequiredFields { state: ConversationState, missing_fields: Vec<String> },
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: ConversationState, event: ConversationEvent },
    #[error("only administrators may reply to requests (state {state:?})")]
    NotAdministrator { state: ConversationState },
}

fn transition_booking(
    current: &ConversationState,
    event: &ConversationEvent,
    context: &ConversationContext,
) -> Result<TransitionOutcome, ConversationTransitionError> {
    use ConversationAction::{
        AttachDocument, CaptureContact, ClearConversationData, NotifyWish, OpenBookingRequest,
        PromptForAdminReply, PromptForContact, PromptForDocument, PromptForWishes, RecordWish,
        RelayAdminReply, SubmitBookingRequest,
    };
    use ConversationEvent::{
        AdminReplyRequested, BookingCommitted, CancelRequested, DocumentReceived, TextReceived,
        WishesRequested,
    };
    use ConversationState::{
        AdminReplyingToUser, AwaitingContactInfo, AwaitingDrivingLicenseBackPhoto,
        AwaitingDrivingLicenseFrontPhoto, AwaitingPassportPhoto, AwaitingPassportRegistration,
        AwaitingWishes, Default, RequestSubmitted,
    };

    let (to, actions) = match (current, event) {
        (_, CancelRequested) => (Default, vec![ClearConversationData]),
        (state, WishesRequested) if state.is_idle() => (AwaitingWishes, vec![PromptForWishes]),
        (AwaitingWishes, TextReceived) => (Default, vec![RecordWish, NotifyWish]),
        (AdminReplyingToUser, BookingCommitted) => {
            return Err(ConversationTransitionError::InvalidTransition {
                state: *current,
                event: event.clone(),
            });
        }
        (_, BookingCommitted) => {
            if !context.missing_booking_fields.is_empty() {
                return Err(ConversationTransitionError::MissingRequiredFields {
                    state: *current,
                    missing_fields: context.missing_booking_fields.clone(),
                });
            }
            (
                AwaitingPassportPhoto,
                vec![OpenBookingRequest, PromptForDocument(DocumentSlot::PassportMain)],
            )
        }
        (AwaitingPassportPhoto, DocumentReceived) => (
            AwaitingPassportRegistration,
            vec![
                AttachDocument(DocumentSlot::PassportMain),
                PromptForDocument(DocumentSlot::PassportRegistration),
            ],
        ),
        (AwaitingPassportRegistration, DocumentReceived) => (
            AwaitingDrivingLicenseFrontPhoto,
            vec![
                AttachDocument(DocumentSlot::PassportRegistration),
                PromptForDocument(DocumentSlot::LicenseFront),
            ],
        ),
        (AwaitingDrivingLicenseFrontPhoto, DocumentReceived) => (
            AwaitingDrivingLicenseBackPhoto,
            vec![
                AttachDocument(DocumentSlot::LicenseFront),
                PromptForDocument(DocumentSlot::LicenseBack),
            ],
        ),
        (AwaitingDrivingLicenseBackPhoto, DocumentReceived) => (
            AwaitingContactInfo,
            vec![AttachDocument(DocumentSlot::LicenseBack), PromptForContact],
        ),
        (AwaitingContactInfo, TextReceived) => {
            (RequestSubmitted, vec![CaptureContact, SubmitBookingRequest])
        }
        (_, AdminReplyRequested) => {
            if !context.is_admin {
                return Err(ConversationTransitionError::NotAdministrator { state: *current });
            }
            (AdminReplyingToUser, vec![PromptForAdminReply])
        }
        (AdminReplyingToUser, TextReceived) => (Default, vec![RelayAdminReply, ClearConversationData]),
        _ => {
            return Err(ConversationTransitionError::InvalidTransition {
                state: *current,
                event: event.clone(),
            });
        }
    };

    Ok(TransitionOutcome { from: *current, to, event: event.clone(), actions })
}

#[cfg(test)]
mod tests {
    use crate::audit::{AuditContext, InMemoryAuditSink};
    use crate::conversation::engine::{BookingFlow, ConversationEngine, ConversationTransitionError};
    use crate::conversation::states::{
        ConversationAction, ConversationContext, ConversationEvent, ConversationState,
    };
    use crate::domain::booking::DocumentSlot;
    use crate::domain::user::UserId;

    fn engine() -> ConversationEngine<BookingFlow> {
        ConversationEngine::default()
    }

    #[test]
    fn booking_flow_collects_documents_then_contact() {
        let engine = engine();
        let context = ConversationContext::default();
        let mut state = engine.initial_state();

        let outcome = engine.apply(&state, &ConversationEvent::BookingCommitted, &context).expect("commit");
        assert_eq!(outcome.to, ConversationState::AwaitingPassportPhoto);
        assert!(outcome.actions.contains(&ConversationAction::OpenBookingRequest));
        state = outcome.to;

        let expected = [
            (ConversationState::AwaitingPassportRegistration, DocumentSlot::PassportMain),
            (ConversationState::AwaitingDrivingLicenseFrontPhoto, DocumentSlot::PassportRegistration),
            (ConversationState::AwaitingDrivingLicenseBackPhoto, DocumentSlot::LicenseFront),
            (ConversationState::AwaitingContactInfo, DocumentSlot::LicenseBack),
        ];
        for (next, slot) in expected {
            let outcome =
                engine.apply(&state, &ConversationEvent::DocumentReceived, &context).expect("document");
            assert_eq!(outcome.to, next);
            assert_eq!(outcome.actions[0], ConversationAction::AttachDocument(slot));
            state = outcome.to;
        }

        let outcome = engine.apply(&state, &ConversationEvent::TextReceived, &context).expect("contact");
        assert_eq!(outcome.to, ConversationState::RequestSubmitted);
        assert_eq!(
            outcome.actions,
            vec![ConversationAction::CaptureContact, ConversationAction::SubmitBookingRequest]
        );
    }

    #[test]
    fn passport_photo_always_advances_to_registration() {
        let outcome = engine()
            .apply(
                &ConversationState::AwaitingPassportPhoto,
                &ConversationEvent::DocumentReceived,
                &ConversationContext::default(),
            )
            .expect("document");

        assert_eq!(outcome.to, ConversationState::AwaitingPassportRegistration);
    }

    #[test]
    fn documents_outside_collection_are_rejected() {
        for state in [
            ConversationState::Default,
            ConversationState::AwaitingWishes,
            ConversationState::AwaitingContactInfo,
            ConversationState::RequestSubmitted,
        ] {
            let result =
                engine().apply(&state, &ConversationEvent::DocumentReceived, &ConversationContext::default());
            assert!(matches!(result, Err(ConversationTransitionError::InvalidTransition { .. })));
        }
    }

    #[test]
    fn wishes_round_trip_back_to_default() {
        let engine = engine();
        let context = ConversationContext::default();

        let outcome = engine
            .apply(&ConversationState::RequestSubmitted, &ConversationEvent::WishesRequested, &context)
            .expect("wishes");
        assert_eq!(outcome.to, ConversationState::AwaitingWishes);

        let outcome = engine.apply(&outcome.to, &ConversationEvent::TextReceived, &context).expect("text");
        assert_eq!(outcome.to, ConversationState::Default);
        assert_eq!(outcome.actions, vec![ConversationAction::RecordWish, ConversationAction::NotifyWish]);

        assert!(engine
            .apply(&ConversationState::AwaitingPassportPhoto, &ConversationEvent::WishesRequested, &context)
            .is_err());
    }

    #[test]
    fn commit_requires_vehicle_and_range() {
        let context = ConversationContext {
            missing_booking_fields: vec!["rental_end_date".to_string()],
            is_admin: false,
        };

        let error = engine()
            .apply(&ConversationState::Default, &ConversationEvent::BookingCommitted, &context)
            .expect_err("missing range should block commit");

        assert!(matches!(
            error,
            ConversationTransitionError::MissingRequiredFields { ref missing_fields, .. }
                if missing_fields == &vec!["rental_end_date".to_string()]
        ));
    }

    #[test]
    fn admin_reply_is_gated_on_admin_membership() {
        let engine = engine();
        let not_admin = ConversationContext::default();
        let admin = ConversationContext { is_admin: true, ..ConversationContext::default() };

        assert!(matches!(
            engine.apply(&ConversationState::Default, &ConversationEvent::AdminReplyRequested, &not_admin),
            Err(ConversationTransitionError::NotAdministrator { .. })
        ));

        let outcome = engine
            .apply(&ConversationState::Default, &ConversationEvent::AdminReplyRequested, &admin)
            .expect("admin reply");
        assert_eq!(outcome.to, ConversationState::AdminReplyingToUser);

        let outcome = engine.apply(&outcome.to, &ConversationEvent::TextReceived, &admin).expect("relay");
        assert_eq!(outcome.to, ConversationState::Default);
        assert_eq!(outcome.actions[0], ConversationAction::RelayAdminReply);
    }

    #[test]
    fn cancel_returns_to_default_from_anywhere() {
        let outcome = engine()
            .apply(
                &ConversationState::AwaitingDrivingLicenseFrontPhoto,
                &ConversationEvent::CancelRequested,
                &ConversationContext::default(),
            )
            .expect("cancel");

        assert_eq!(outcome.to, ConversationState::Default);
    }

    #[test]
    fn audit_records_applied_and_rejected_transitions() {
        let sink = InMemoryAuditSink::default();
        let audit = AuditContext::new(None, Some(UserId(9)), "evt-9", "conversation-engine");
        let engine = engine();
        let context = ConversationContext::default();

        let _ = engine.apply_with_audit(
            &ConversationState::AwaitingPassportPhoto,
            &ConversationEvent::DocumentReceived,
            &context,
            &sink,
            &audit,
        );
        let _ = engine.apply_with_audit(
            &ConversationState::Default,
            &ConversationEvent::TextReceived,
            &context,
            &sink,
            &audit,
        );

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "conversation.transition_applied");
        assert_eq!(events[0].metadata.get("to").map(String::as_str), Some("AwaitingPassportRegistration"));
        assert_eq!(events[1].event_type, "conversation.transition_rejected");
        assert_eq!(events[1].user_id, Some(UserId(9)));
    }
}
