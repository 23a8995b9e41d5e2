use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use rentdesk_core::domain::booking::DocumentRef;
use rentdesk_core::domain::user::UserId;

use crate::assistant::AssistantError;
use crate::blocks::MessageTemplate;

/// One inbound update from the messaging transport, already attributed to a user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundEvent {
    pub user_id: UserId,
    pub display_name: String,
    pub username: Option<String>,
    pub kind: InboundKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundKind {
    Text(String),
    Photo(DocumentRef),
    Document(DocumentRef),
    /// Button tap carrying an action token.
    Action(String),
}

impl InboundEvent {
    pub fn new(user_id: UserId, display_name: impl Into<String>, kind: InboundKind) -> Self {
        Self { user_id, display_name: display_name.into(), username: None, kind }
    }

    pub fn text(user_id: UserId, display_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(user_id, display_name, InboundKind::Text(text.into()))
    }

    pub fn action(user_id: UserId, display_name: impl Into<String>, token: impl Into<String>) -> Self {
        Self::new(user_id, display_name, InboundKind::Action(token.into()))
    }

    pub fn photo(user_id: UserId, display_name: impl Into<String>, reference: impl Into<String>) -> Self {
        Self::new(user_id, display_name, InboundKind::Photo(DocumentRef(reference.into())))
    }

    pub fn document(
        user_id: UserId,
        display_name: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self::new(user_id, display_name, InboundKind::Document(DocumentRef(reference.into())))
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn event_type(&self) -> InboundEventType {
        match self.kind {
            InboundKind::Text(_) => InboundEventType::Text,
            InboundKind::Photo(_) => InboundEventType::Photo,
            InboundKind::Document(_) => InboundEventType::Document,
            InboundKind::Action(_) => InboundEventType::Action,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InboundEventType {
    Text,
    Photo,
    Document,
    Action,
}

impl InboundEventType {
    pub const ALL: [InboundEventType; 4] = [Self::Text, Self::Photo, Self::Document, Self::Action];
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl EventContext {
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self { correlation_id: correlation_id.into() }
    }

    pub fn generate() -> Self {
        Self::new(Uuid::new_v4().simple().to_string())
    }
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(MessageTemplate),
    Processed,
    Ignored,
}

impl HandlerResult {
    pub fn message(&self) -> Option<&MessageTemplate> {
        match self {
            Self::Responded(message) => Some(message),
            Self::Processed | Self::Ignored => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] AssistantError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_types(&self) -> Vec<InboundEventType>;
    async fn handle(
        &self,
        event: &InboundEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, AssistantError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<InboundEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.register_shared(Arc::new(handler));
    }

    /// Registers one handler for every event type it declares; later registrations win.
    pub fn register_shared(&mut self, handler: Arc<dyn EventHandler>) {
        for event_type in handler.event_types() {
            self.handlers.insert(event_type, Arc::clone(&handler));
        }
    }

    pub async fn dispatch(
        &self,
        event: &InboundEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&event.event_type()) else {
            tracing::debug!(
                event_name = "dispatch.unhandled",
                correlation_id = %ctx.correlation_id,
                event_type = ?event.event_type(),
                "no handler registered"
            );
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(event, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use rentdesk_core::domain::user::UserId;

    use crate::assistant::AssistantError;
    use crate::blocks::MessageTemplate;

    use super::{
        EventContext, EventDispatcher, EventHandler, HandlerResult, InboundEvent, InboundEventType,
    };

    #[derive(Default)]
    struct EchoText {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EventHandler for EchoText {
        fn event_types(&self) -> Vec<InboundEventType> {
            vec![InboundEventType::Text]
        }

        async fn handle(
            &self,
            event: &InboundEvent,
            ctx: &EventContext,
        ) -> Result<HandlerResult, AssistantError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(HandlerResult::Responded(MessageTemplate::text(format!(
                "{}:{}",
                ctx.correlation_id,
                event.display_name
            ))))
        }
    }

    #[tokio::test]
    async fn dispatch_routes_by_event_type() {
        let handler = Arc::new(EchoText::default());
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register_shared(handler.clone());

        let result = dispatcher
            .dispatch(&InboundEvent::text(UserId(1), "Ivan", "hello"), &EventContext::new("corr-1"))
            .await
            .expect("dispatch");

        assert_eq!(result.message().map(|message| message.text.as_str()), Some("corr-1:Ivan"));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.handler_count(), 1);
    }

    #[tokio::test]
    async fn unregistered_event_types_are_ignored() {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(EchoText::default());

        let result = dispatcher
            .dispatch(&InboundEvent::photo(UserId(1), "Ivan", "file-1"), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Ignored);
    }

    #[test]
    fn generated_contexts_are_distinct() {
        assert_ne!(EventContext::generate(), EventContext::generate());
    }
}
