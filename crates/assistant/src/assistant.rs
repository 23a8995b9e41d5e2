use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use thiserror::Error;

use rentdesk_core::audit::{AuditContext, AuditSink};
use rentdesk_core::calendar::{render_month, CalendarAction, CalendarError};
use rentdesk_core::clock::Clock;
use rentdesk_core::conversation::states::{REPLYING_TO_KEY, REPLY_USER_KEY, WISHES_KEY};
use rentdesk_core::conversation::{
    BookingFlow, ConversationAction, ConversationContext, ConversationEngine, ConversationEvent,
    ConversationRecord, ConversationState, ConversationTransitionError,
};
use rentdesk_core::domain::booking::{BookingDraft, BookingRequest, BookingRequestId, DocumentRef};
use rentdesk_core::domain::session::Session;
use rentdesk_core::domain::user::{AdminDirectory, UserId};
use rentdesk_core::domain::vehicle::{Fleet, Vehicle, VehicleId, VehicleKind};
use rentdesk_core::errors::{ApplicationError, DomainError};
use rentdesk_db::availability::{AvailabilityStore, AvailabilityStoreError};
use rentdesk_db::repositories::{
    BookingRequestRepository, ConversationStateRepository, InMemoryBookingRequestRepository,
    InMemoryConversationStateRepository, InMemorySessionRepository, RepositoryError,
    SessionRepository,
};

use crate::blocks::{
    access_denied_message, admin_contact_message, admin_reply_prompt, booking_incomplete_message,
    calendar_message, cancelled_message, contact_prompt, day_unavailable_message, document_prompt,
    error_message, pick_vehicle_first_message, price_summary, range_unavailable_message,
    reply_sent_message, request_not_found_message, request_submitted_message, vehicle_card,
    vehicle_menu, wish_recorded_message, wishes_prompt, MessageTemplate, ADMIN_REPLY_PREFIX,
    ADMIN_SHOW_PHONE_PREFIX, CANCEL_ACTION, GO_BOOKING_ACTION, NOOP_ACTION, PRICE_ACTION,
    VEHICLE_ACTION_PREFIX, WISHES_ACTION,
};
use crate::booking::{BookingError, BookingRequestAggregator};
use crate::events::{EventContext, EventHandler, HandlerResult, InboundEvent, InboundEventType, InboundKind};
use crate::locks::KeyedLocks;
use crate::notify::NotificationSink;

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Booking(#[from] BookingError),
    #[error(transparent)]
    Availability(#[from] AvailabilityStoreError),
    #[error(transparent)]
    Transition(#[from] ConversationTransitionError),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("user {0} has no booking request in progress")]
    NoActiveBooking(UserId),
}

impl AssistantError {
    pub fn into_application(self) -> ApplicationError {
        match self {
            Self::Repository(error) => ApplicationError::Persistence(error.to_string()),
            Self::Availability(error) => ApplicationError::Persistence(error.to_string()),
            Self::Booking(BookingError::Repository(error)) => {
                ApplicationError::Persistence(error.to_string())
            }
            Self::Booking(BookingError::InvalidDraft(error)) | Self::Domain(error) => {
                ApplicationError::Domain(error)
            }
            Self::Booking(error) => {
                ApplicationError::Domain(DomainError::InvariantViolation(error.to_string()))
            }
            Self::Transition(error) => ApplicationError::Domain(DomainError::from(error)),
            Self::Calendar(error) => {
                ApplicationError::Domain(DomainError::InvariantViolation(error.to_string()))
            }
            Self::NoActiveBooking(user_id) => ApplicationError::Domain(
                DomainError::InvariantViolation(format!("user {user_id} has no booking in progress")),
            ),
        }
    }
}

/// Collaborators the assistant is wired with.
pub struct AssistantServices {
    pub fleet: Fleet,
    pub admins: AdminDirectory,
    pub availability: Arc<AvailabilityStore>,
    pub conversations: Arc<dyn ConversationStateRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub booking_requests: Arc<dyn BookingRequestRepository>,
    pub notifications: Arc<dyn NotificationSink>,
    pub audit: Arc<dyn AuditSink>,
    pub clock: Arc<dyn Clock>,
}

impl AssistantServices {
    /// In-memory conversation, session and request stores around the given collaborators.
    pub fn in_memory(
        fleet: Fleet,
        admins: AdminDirectory,
        availability: Arc<AvailabilityStore>,
        notifications: Arc<dyn NotificationSink>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            fleet,
            admins,
            availability,
            conversations: Arc::new(InMemoryConversationStateRepository::default()),
            sessions: Arc::new(InMemorySessionRepository::default()),
            booking_requests: Arc::new(InMemoryBookingRequestRepository::default()),
            notifications,
            audit,
            clock,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EvictionReport {
    pub conversations: usize,
    pub sessions: usize,
    pub locks: usize,
}

/// Working copy of one user's state for the duration of a single event.
struct Turn<'a> {
    event: &'a InboundEvent,
    ctx: &'a EventContext,
    record: ConversationRecord,
    session: Session,
    target: Option<BookingRequest>,
}

impl Turn<'_> {
    fn text(&self) -> &str {
        match &self.event.kind {
            InboundKind::Text(text) => text.as_str(),
            _ => "",
        }
    }

    fn document(&self) -> Option<&DocumentRef> {
        match &self.event.kind {
            InboundKind::Photo(document) | InboundKind::Document(document) => Some(document),
            _ => None,
        }
    }
}

/// Drives one booking conversation per user: vehicle and date selection, document and contact
/// collection, hand-over to administrators and the administrator reply loop.
pub struct BookingAssistant {
    fleet: Fleet,
    admins: AdminDirectory,
    availability: Arc<AvailabilityStore>,
    conversations: Arc<dyn ConversationStateRepository>,
    sessions: Arc<dyn SessionRepository>,
    bookings: BookingRequestAggregator,
    notifications: Arc<dyn NotificationSink>,
    engine: ConversationEngine<BookingFlow>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    user_locks: KeyedLocks<UserId>,
}

impl BookingAssistant {
    pub fn new(services: AssistantServices) -> Self {
        Self {
            bookings: BookingRequestAggregator::new(services.booking_requests, Arc::clone(&services.clock)),
            fleet: services.fleet,
            admins: services.admins,
            availability: services.availability,
            conversations: services.conversations,
            sessions: services.sessions,
            notifications: services.notifications,
            engine: ConversationEngine::default(),
            audit: services.audit,
            clock: services.clock,
            user_locks: KeyedLocks::new(),
        }
    }

    pub fn bookings(&self) -> &BookingRequestAggregator {
        &self.bookings
    }

    pub async fn conversation_state(&self, user_id: UserId) -> Result<ConversationState, AssistantError> {
        Ok(self
            .conversations
            .find(user_id)
            .await?
            .map(|record| record.state)
            .unwrap_or(ConversationState::Default))
    }

    pub async fn session(&self, user_id: UserId) -> Result<Option<Session>, AssistantError> {
        Ok(self.sessions.find(user_id).await?)
    }

    /// Processes one event. Events of the same user are handled one at a time; the user's
    /// state is only saved when the whole event succeeded.
    pub async fn handle(
        &self,
        event: &InboundEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, AssistantError> {
        let _guard = self.user_locks.lock(&event.user_id).await;

        let now = self.clock.now();
        let mut record = self.conversations.get_or_create(event.user_id, now).await?;
        let mut session = self.sessions.get_or_create(event.user_id, now).await?;
        record.touch(now);
        session.touch(now);

        let mut turn = Turn { event, ctx, record, session, target: None };
        let result = match &event.kind {
            InboundKind::Action(token) => self.on_action(&mut turn, token.trim()).await?,
            InboundKind::Text(_) => self.on_text(&mut turn).await?,
            InboundKind::Photo(_) | InboundKind::Document(_) => self.on_document(&mut turn).await?,
        };

        self.conversations.save(turn.record).await?;
        self.sessions.save(turn.session).await?;
        Ok(result)
    }

    /// Like [`BookingAssistant::handle`], but failures become a user-facing reply.
    pub async fn respond(&self, event: &InboundEvent, ctx: &EventContext) -> HandlerResult {
        match self.handle(event, ctx).await {
            Ok(result) => result,
            Err(error) => {
                tracing::error!(
                    event_name = "assistant.event.failed",
                    correlation_id = %ctx.correlation_id,
                    user_id = %event.user_id,
                    error = %error,
                    "event handling failed"
                );
                let error = error.into_application().into_interface(ctx.correlation_id.clone());
                HandlerResult::Responded(error_message(error.user_message(), error.correlation_id()))
            }
        }
    }

    /// Drops conversation and session entries idle for longer than `max_idle`.
    pub async fn evict_idle(&self, max_idle: Duration) -> Result<EvictionReport, AssistantError> {
        let cutoff = self.clock.now() - max_idle;
        let report = EvictionReport {
            conversations: self.conversations.evict_idle(cutoff).await?,
            sessions: self.sessions.evict_idle(cutoff).await?,
            locks: self.user_locks.prune(),
        };
        if report.conversations > 0 || report.sessions > 0 {
            tracing::info!(
                event_name = "assistant.evict_idle",
                conversations = report.conversations,
                sessions = report.sessions,
                locks = report.locks,
                "evicted idle users"
            );
        }
        Ok(report)
    }

    async fn on_action(&self, turn: &mut Turn<'_>, token: &str) -> Result<HandlerResult, AssistantError> {
        if CalendarAction::is_calendar_token(token) {
            return match token.parse::<CalendarAction>() {
                Ok(action) => self.on_calendar(turn, action).await,
                Err(error) => {
                    tracing::warn!(
                        event_name = "assistant.calendar.bad_token",
                        correlation_id = %turn.ctx.correlation_id,
                        user_id = %turn.event.user_id,
                        error = %error,
                        "ignoring malformed calendar token"
                    );
                    Ok(HandlerResult::Ignored)
                }
            };
        }

        if let Some(vehicle_id) = token.strip_prefix(VEHICLE_ACTION_PREFIX) {
            return Ok(self.select_vehicle(turn, vehicle_id));
        }
        if let Some(request_id) = token.strip_prefix(ADMIN_SHOW_PHONE_PREFIX) {
            return self.show_contact(turn, request_id).await;
        }
        if let Some(request_id) = token.strip_prefix(ADMIN_REPLY_PREFIX) {
            return self.start_admin_reply(turn, request_id).await;
        }

        match token {
            PRICE_ACTION => self.open_start_calendar(turn).await,
            GO_BOOKING_ACTION => self.commit_booking(turn).await,
            WISHES_ACTION => self.run(turn, ConversationEvent::WishesRequested, wishes_prompt()).await,
            CANCEL_ACTION => {
                let result = self.run(turn, ConversationEvent::CancelRequested, cancelled_message()).await?;
                turn.session.clear_range();
                turn.session.current_booking_request_id = None;
                Ok(result)
            }
            NOOP_ACTION => Ok(HandlerResult::Ignored),
            other => match other.parse::<VehicleKind>() {
                Ok(kind) => {
                    Ok(HandlerResult::Responded(vehicle_menu(kind, self.fleet.by_kind(kind))))
                }
                Err(_) => {
                    tracing::debug!(
                        event_name = "assistant.action.unknown",
                        correlation_id = %turn.ctx.correlation_id,
                        token = other,
                        "ignoring unknown action token"
                    );
                    Ok(HandlerResult::Ignored)
                }
            },
        }
    }

    async fn on_text(&self, turn: &mut Turn<'_>) -> Result<HandlerResult, AssistantError> {
        match turn.record.state {
            ConversationState::AwaitingContactInfo if turn.text().trim().is_empty() => {
                tracing::info!(
                    event_name = "assistant.contact.blank",
                    correlation_id = %turn.ctx.correlation_id,
                    user_id = %turn.event.user_id,
                    "blank contact, prompting again"
                );
                Ok(HandlerResult::Responded(contact_prompt()))
            }
            ConversationState::AwaitingWishes
            | ConversationState::AwaitingContactInfo
            | ConversationState::AdminReplyingToUser => {
                self.run(turn, ConversationEvent::TextReceived, MessageTemplate::default()).await
            }
            state => {
                tracing::debug!(
                    event_name = "assistant.text.ignored",
                    correlation_id = %turn.ctx.correlation_id,
                    user_id = %turn.event.user_id,
                    state = ?state,
                    "text outside a text-expecting state"
                );
                Ok(HandlerResult::Ignored)
            }
        }
    }

    async fn on_document(&self, turn: &mut Turn<'_>) -> Result<HandlerResult, AssistantError> {
        if turn.record.state.awaited_document().is_none() {
            tracing::warn!(
                event_name = "assistant.document.ignored",
                correlation_id = %turn.ctx.correlation_id,
                user_id = %turn.event.user_id,
                state = ?turn.record.state,
                "document received with no booking in progress"
            );
            return Ok(HandlerResult::Ignored);
        }
        self.run(turn, ConversationEvent::DocumentReceived, MessageTemplate::default()).await
    }

    fn select_vehicle(&self, turn: &mut Turn<'_>, vehicle_id: &str) -> HandlerResult {
        let Some(vehicle) = self.fleet.get(&VehicleId(vehicle_id.to_string())) else {
            tracing::warn!(
                event_name = "assistant.vehicle.unknown",
                correlation_id = %turn.ctx.correlation_id,
                vehicle_id = vehicle_id,
                "unknown vehicle selected"
            );
            return HandlerResult::Ignored;
        };
        turn.session.select_vehicle(vehicle.id.clone(), vehicle.kind);
        HandlerResult::Responded(vehicle_card(vehicle))
    }

    fn selected_vehicle(&self, session: &Session) -> Option<&Vehicle> {
        session.selected_vehicle_id.as_ref().and_then(|id| self.fleet.get(id))
    }

    async fn open_start_calendar(&self, turn: &mut Turn<'_>) -> Result<HandlerResult, AssistantError> {
        let Some(vehicle) = self.selected_vehicle(&turn.session) else {
            return Ok(HandlerResult::Responded(pick_vehicle_first_message()));
        };
        turn.session.clear_range();
        let today = self.clock.today();
        self.render_calendar(vehicle, today.year(), today.month(), None).await
    }

    async fn render_calendar(
        &self,
        vehicle: &Vehicle,
        year: i32,
        month: u32,
        anchor: Option<NaiveDate>,
    ) -> Result<HandlerResult, AssistantError> {
        let snapshot = self.availability.availability(&vehicle.id, self.availability.horizon_days()).await;
        let grid = render_month(year, month as i32, &snapshot, anchor, self.clock.today())?;
        Ok(HandlerResult::Responded(calendar_message(&grid, vehicle)))
    }

    async fn on_calendar(
        &self,
        turn: &mut Turn<'_>,
        action: CalendarAction,
    ) -> Result<HandlerResult, AssistantError> {
        let Some(vehicle) = self.selected_vehicle(&turn.session) else {
            return Ok(HandlerResult::Responded(pick_vehicle_first_message()));
        };

        match action {
            CalendarAction::Start(date) => self.pick_start(turn, vehicle, date).await,
            CalendarAction::End(date) => self.pick_end(turn, vehicle, date).await,
            CalendarAction::Today => {
                let today = self.clock.today();
                if turn.session.rental_start_date.is_some() {
                    self.pick_end(turn, vehicle, today).await
                } else {
                    self.pick_start(turn, vehicle, today).await
                }
            }
            CalendarAction::Prev { .. } | CalendarAction::Next { .. } => {
                let Some((year, month)) = action.target_month() else {
                    return Ok(ignore_navigation(turn, &action, "year overflow"));
                };
                match self.render_calendar(vehicle, year, month, action.anchor()).await {
                    Err(AssistantError::Calendar(error)) => {
                        Ok(ignore_navigation(turn, &action, &error.to_string()))
                    }
                    other => other,
                }
            }
            CalendarAction::Reset => {
                turn.session.clear_range();
                let today = self.clock.today();
                self.render_calendar(vehicle, today.year(), today.month(), None).await
            }
            CalendarAction::Unavailable => Ok(HandlerResult::Responded(day_unavailable_message())),
            CalendarAction::UnavailableRange => {
                Ok(HandlerResult::Responded(range_unavailable_message()))
            }
        }
    }

    async fn pick_start(
        &self,
        turn: &mut Turn<'_>,
        vehicle: &Vehicle,
        date: NaiveDate,
    ) -> Result<HandlerResult, AssistantError> {
        let snapshot = self.availability.availability(&vehicle.id, self.availability.horizon_days()).await;
        if date < self.clock.today() || !snapshot.is_available(date) {
            return Ok(HandlerResult::Responded(day_unavailable_message()));
        }

        turn.session.rental_start_date = Some(date);
        turn.session.rental_end_date = None;
        self.render_calendar(vehicle, date.year(), date.month(), Some(date)).await
    }

    async fn pick_end(
        &self,
        turn: &mut Turn<'_>,
        vehicle: &Vehicle,
        date: NaiveDate,
    ) -> Result<HandlerResult, AssistantError> {
        let Some(start) = turn.session.rental_start_date else {
            return self.render_calendar(vehicle, date.year(), date.month(), None).await;
        };

        let snapshot = self.availability.availability(&vehicle.id, self.availability.horizon_days()).await;
        if date < start || !snapshot.range_available(start, date) {
            tracing::info!(
                event_name = "assistant.calendar.range_rejected",
                correlation_id = %turn.ctx.correlation_id,
                vehicle_id = %vehicle.id,
                start = %start,
                end = %date,
                "selected range is no longer available"
            );
            return Ok(HandlerResult::Responded(range_unavailable_message()));
        }

        let quote = vehicle.quote(start, date)?;
        turn.session.rental_end_date = Some(date);
        Ok(HandlerResult::Responded(price_summary(vehicle, start, date, &quote)))
    }

    async fn commit_booking(&self, turn: &mut Turn<'_>) -> Result<HandlerResult, AssistantError> {
        let mut missing = turn.session.missing_booking_fields();
        if let (Some(vehicle), Some((start, end))) =
            (self.selected_vehicle(&turn.session), turn.session.selected_range())
        {
            let snapshot =
                self.availability.availability(&vehicle.id, self.availability.horizon_days()).await;
            if !snapshot.range_available(start, end) {
                missing.push("rental_end_date".to_string());
            }
        } else if turn.session.selected_vehicle_id.is_some() && missing.is_empty() {
            missing.push("selected_vehicle_id".to_string());
        }

        let context = ConversationContext { missing_booking_fields: missing, is_admin: self.is_admin(turn) };
        match self.transition(turn, ConversationEvent::BookingCommitted, &context).await {
            Ok(reply) => Ok(HandlerResult::Responded(reply.unwrap_or_default())),
            Err(AssistantError::Transition(ConversationTransitionError::MissingRequiredFields {
                missing_fields,
                ..
            })) => Ok(HandlerResult::Responded(booking_incomplete_message(&missing_fields))),
            Err(error) => Err(error),
        }
    }

    async fn show_contact(&self, turn: &mut Turn<'_>, request_id: &str) -> Result<HandlerResult, AssistantError> {
        if !self.is_admin(turn) {
            tracing::warn!(
                event_name = "assistant.admin.denied",
                correlation_id = %turn.ctx.correlation_id,
                user_id = %turn.event.user_id,
                "non-administrator requested contact details"
            );
            return Ok(HandlerResult::Responded(access_denied_message()));
        }
        match self.bookings.get(&BookingRequestId(request_id.to_string())).await? {
            Some(request) => Ok(HandlerResult::Responded(admin_contact_message(&request))),
            None => Ok(HandlerResult::Responded(request_not_found_message())),
        }
    }

    async fn start_admin_reply(
        &self,
        turn: &mut Turn<'_>,
        request_id: &str,
    ) -> Result<HandlerResult, AssistantError> {
        let is_admin = self.is_admin(turn);
        if is_admin {
            match self.bookings.get(&BookingRequestId(request_id.to_string())).await? {
                Some(request) => turn.target = Some(request),
                None => return Ok(HandlerResult::Responded(request_not_found_message())),
            }
        }

        let context = ConversationContext { missing_booking_fields: Vec::new(), is_admin };
        match self.transition(turn, ConversationEvent::AdminReplyRequested, &context).await {
            Ok(reply) => Ok(HandlerResult::Responded(reply.unwrap_or_default())),
            Err(AssistantError::Transition(ConversationTransitionError::NotAdministrator { .. })) => {
                Ok(HandlerResult::Responded(access_denied_message()))
            }
            Err(error) => Err(error),
        }
    }

    /// Runs a transition that needs no extra guard facts; `fallback` is the reply when the
    /// actions produce none.
    async fn run(
        &self,
        turn: &mut Turn<'_>,
        event: ConversationEvent,
        fallback: MessageTemplate,
    ) -> Result<HandlerResult, AssistantError> {
        let context = ConversationContext { missing_booking_fields: Vec::new(), is_admin: self.is_admin(turn) };
        let reply = self.transition(turn, event, &context).await?;
        Ok(HandlerResult::Responded(reply.unwrap_or(fallback)))
    }

    /// Applies the transition, performs its actions and only then moves the user to the new
    /// state. Returns the last reply any action produced.
    async fn transition(
        &self,
        turn: &mut Turn<'_>,
        event: ConversationEvent,
        context: &ConversationContext,
    ) -> Result<Option<MessageTemplate>, AssistantError> {
        let audit = AuditContext::new(
            turn.session.current_booking_request_id.clone(),
            Some(turn.event.user_id),
            turn.ctx.correlation_id.clone(),
            if context.is_admin { "admin" } else { "user" },
        );
        let outcome = self.engine.apply_with_audit(
            &turn.record.state,
            &event,
            context,
            self.audit.as_ref(),
            &audit,
        )?;

        let mut reply = None;
        for action in &outcome.actions {
            if let Some(message) = self.perform(turn, action).await? {
                reply = Some(message);
            }
        }

        tracing::info!(
            event_name = "assistant.transition",
            correlation_id = %turn.ctx.correlation_id,
            user_id = %turn.event.user_id,
            from = ?outcome.from,
            to = ?outcome.to,
            "conversation advanced"
        );
        turn.record.state = outcome.to;
        Ok(reply)
    }

    async fn perform(
        &self,
        turn: &mut Turn<'_>,
        action: &ConversationAction,
    ) -> Result<Option<MessageTemplate>, AssistantError> {
        match action {
            ConversationAction::PromptForWishes => Ok(Some(wishes_prompt())),
            ConversationAction::RecordWish => {
                let wish = turn.text().trim().to_string();
                turn.record.push_data(WISHES_KEY, wish);
                Ok(None)
            }
            ConversationAction::NotifyWish => {
                let wish = turn.text().trim();
                if let Err(error) = self
                    .notifications
                    .wish_received(
                        turn.event.user_id,
                        &turn.event.display_name,
                        turn.event.username.as_deref(),
                        wish,
                    )
                    .await
                {
                    tracing::warn!(
                        event_name = "assistant.wish.notify_failed",
                        correlation_id = %turn.ctx.correlation_id,
                        user_id = %turn.event.user_id,
                        error = %error,
                        "wish notification failed"
                    );
                }
                Ok(Some(wish_recorded_message()))
            }
            ConversationAction::OpenBookingRequest => {
                self.open_booking_request(turn).await?;
                Ok(None)
            }
            ConversationAction::AttachDocument(slot) => {
                let request_id = self.active_request(turn)?;
                let Some(document) = turn.document().cloned() else {
                    return Ok(None);
                };
                self.bookings.attach_document(&request_id, *slot, document).await?;
                Ok(None)
            }
            ConversationAction::PromptForDocument(slot) => Ok(Some(document_prompt(*slot))),
            ConversationAction::PromptForContact => Ok(Some(contact_prompt())),
            ConversationAction::CaptureContact => {
                let request_id = self.active_request(turn)?;
                self.bookings.attach_contact(&request_id, turn.text()).await?;
                Ok(None)
            }
            ConversationAction::SubmitBookingRequest => {
                let request_id = self.active_request(turn)?;
                let request = self.bookings.submit(&request_id).await?;
                self.notify_admins(turn, &request).await;
                turn.session.current_booking_request_id = None;
                turn.session.clear_range();
                Ok(Some(request_submitted_message()))
            }
            ConversationAction::PromptForAdminReply => {
                let Some(request) = turn.target.take() else {
                    return Ok(None);
                };
                turn.record.set_data(REPLYING_TO_KEY, request.id.to_string());
                turn.record.set_data(REPLY_USER_KEY, request.requester_id.0);
                Ok(Some(admin_reply_prompt(&request)))
            }
            ConversationAction::RelayAdminReply => {
                let Some(recipient) = turn.record.data_i64(REPLY_USER_KEY).map(UserId) else {
                    tracing::warn!(
                        event_name = "assistant.admin_reply.no_target",
                        correlation_id = %turn.ctx.correlation_id,
                        user_id = %turn.event.user_id,
                        "administrator reply has no recipient"
                    );
                    return Ok(Some(reply_sent_message(false)));
                };
                let delivered = match self.notifications.admin_reply(recipient, turn.text().trim()).await {
                    Ok(()) => true,
                    Err(error) => {
                        tracing::warn!(
                            event_name = "assistant.admin_reply.failed",
                            correlation_id = %turn.ctx.correlation_id,
                            user_id = %turn.event.user_id,
                            recipient = %recipient,
                            error = %error,
                            "administrator reply was not delivered"
                        );
                        false
                    }
                };
                Ok(Some(reply_sent_message(delivered)))
            }
            ConversationAction::ClearConversationData => {
                turn.record.remove_data(REPLYING_TO_KEY);
                turn.record.remove_data(REPLY_USER_KEY);
                Ok(None)
            }
        }
    }

    async fn open_booking_request(&self, turn: &mut Turn<'_>) -> Result<(), AssistantError> {
        let vehicle = self
            .selected_vehicle(&turn.session)
            .ok_or(AssistantError::NoActiveBooking(turn.event.user_id))?;
        let (start, end) =
            turn.session.selected_range().ok_or(AssistantError::NoActiveBooking(turn.event.user_id))?;
        let quote = vehicle.quote(start, end)?;

        let request = self
            .bookings
            .create(BookingDraft {
                requester_id: turn.event.user_id,
                requester_name: turn.event.display_name.clone(),
                vehicle_id: vehicle.id.clone(),
                vehicle_name: vehicle.name.clone(),
                start_date: start,
                end_date: end,
                total_price: quote.total_price,
                pawn_price: quote.pawn_price,
            })
            .await?;
        turn.session.current_booking_request_id = Some(request.id);
        Ok(())
    }

    async fn notify_admins(&self, turn: &Turn<'_>, request: &BookingRequest) {
        match self.notifications.booking_submitted(request).await {
            Ok(report) if !report.all_delivered() => {
                tracing::warn!(
                    event_name = "assistant.booking.partial_delivery",
                    correlation_id = %turn.ctx.correlation_id,
                    request_id = %request.id,
                    failed = report.failed.len(),
                    "some administrators were not notified"
                );
            }
            Ok(_) => {}
            Err(error) => {
                tracing::error!(
                    event_name = "assistant.booking.notify_failed",
                    correlation_id = %turn.ctx.correlation_id,
                    request_id = %request.id,
                    error = %error,
                    "booking request could not be handed to administrators"
                );
            }
        }
    }

    fn active_request(&self, turn: &Turn<'_>) -> Result<BookingRequestId, AssistantError> {
        turn.session
            .current_booking_request_id
            .clone()
            .ok_or(AssistantError::NoActiveBooking(turn.event.user_id))
    }

    fn is_admin(&self, turn: &Turn<'_>) -> bool {
        self.admins.is_admin(turn.event.user_id)
    }
}

fn ignore_navigation(turn: &Turn<'_>, action: &CalendarAction, reason: &str) -> HandlerResult {
    tracing::warn!(
        event_name = "assistant.calendar.out_of_range",
        correlation_id = %turn.ctx.correlation_id,
        user_id = %turn.event.user_id,
        token = %action,
        reason,
        "ignoring navigation outside the calendar"
    );
    HandlerResult::Ignored
}

#[async_trait]
impl EventHandler for BookingAssistant {
    fn event_types(&self) -> Vec<InboundEventType> {
        InboundEventType::ALL.to_vec()
    }

    async fn handle(
        &self,
        event: &InboundEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, AssistantError> {
        Ok(self.respond(event, ctx).await)
    }
}
