use std::sync::Arc;
use std::time::Instant;

use rentdesk_assistant::{
    AdminFanout, AssistantServices, BookingAssistant, Delivered, EventContext, HandlerResult,
    InboundEvent, RecordingDelivery,
};
use rentdesk_core::audit::InMemoryAuditSink;
use rentdesk_core::config::AppConfig;
use rentdesk_core::conversation::ConversationState;
use rentdesk_core::domain::user::{AdminDirectory, UserId};
use rentdesk_core::domain::vehicle::{Fleet, Vehicle, VehicleId, VehicleKind};
use rentdesk_db::{AvailabilityStore, InMemoryAvailabilityPersistence};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::commands::{load_config, CommandContext, CommandResult, EXIT_SMOKE};

const SMOKE_ADMIN: UserId = UserId(1);
const SMOKE_CUSTOMER: UserId = UserId(2);
const SMOKE_NAME: &str = "Smoke Tester";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SmokeStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: SmokeStatus,
    elapsed_ms: u64,
    message: String,
}

#[derive(Debug, Serialize)]
struct SmokeReport {
    command: &'static str,
    status: SmokeStatus,
    summary: String,
    total_elapsed_ms: u64,
    checks: Vec<SmokeCheck>,
}

#[derive(Clone, Copy, Debug)]
enum SmokeStep {
    AvailabilityReconcile,
    CalendarRender,
    BookingConversation,
    AdminNotification,
    AdminReplyRelay,
    IdleEviction,
}

impl SmokeStep {
    const ALL: [SmokeStep; 6] = [
        Self::AvailabilityReconcile,
        Self::CalendarRender,
        Self::BookingConversation,
        Self::AdminNotification,
        Self::AdminReplyRelay,
        Self::IdleEviction,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::AvailabilityReconcile => "availability_reconcile",
            Self::CalendarRender => "calendar_render",
            Self::BookingConversation => "booking_conversation",
            Self::AdminNotification => "admin_notification",
            Self::AdminReplyRelay => "admin_reply_relay",
            Self::IdleEviction => "idle_eviction",
        }
    }
}

pub fn run(ctx: &CommandContext) -> CommandResult {
    let started = Instant::now();
    let mut checks = Vec::new();

    let config = match timed_check(|| load_config("smoke", ctx)) {
        Ok((elapsed_ms, config)) => {
            checks.push(SmokeCheck {
                name: "config_validation",
                status: SmokeStatus::Pass,
                elapsed_ms,
                message: "configuration loaded and validated".to_string(),
            });
            config
        }
        Err((elapsed_ms, failure)) => {
            checks.push(SmokeCheck {
                name: "config_validation",
                status: SmokeStatus::Fail,
                elapsed_ms,
                message: failure.output,
            });
            checks.extend(SmokeStep::ALL.iter().map(|step| skipped(step.name())));
            return finalize_report(checks, started.elapsed().as_millis() as u64);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            let mut steps = SmokeStep::ALL.iter();
            if let Some(first) = steps.next() {
                checks.push(SmokeCheck {
                    name: first.name(),
                    status: SmokeStatus::Fail,
                    elapsed_ms: 0,
                    message: format!("failed to initialize async runtime: {error}"),
                });
            }
            checks.extend(steps.map(|step| skipped(step.name())));
            return finalize_report(checks, started.elapsed().as_millis() as u64);
        }
    };

    runtime.block_on(async {
        let mut desk = SmokeDesk::new(&config, ctx).await;
        let mut failed = false;
        for step in SmokeStep::ALL {
            if failed {
                checks.push(skipped(step.name()));
                continue;
            }
            let step_started = Instant::now();
            let outcome = desk.run(step).await;
            let elapsed_ms = step_started.elapsed().as_millis() as u64;
            failed = outcome.is_err();
            checks.push(match outcome {
                Ok(message) => SmokeCheck { name: step.name(), status: SmokeStatus::Pass, elapsed_ms, message },
                Err(message) => SmokeCheck { name: step.name(), status: SmokeStatus::Fail, elapsed_ms, message },
            });
        }
    });

    finalize_report(checks, started.elapsed().as_millis() as u64)
}

/// An assistant over in-memory stores, with a recording delivery standing in for the transport.
struct SmokeDesk {
    fleet: Fleet,
    store: Arc<AvailabilityStore>,
    assistant: BookingAssistant,
    delivery: Arc<RecordingDelivery>,
    idle_ttl: Option<chrono::Duration>,
    request_id: Option<String>,
}

impl SmokeDesk {
    async fn new(config: &AppConfig, ctx: &CommandContext) -> Self {
        let fleet = if config.fleet.vehicles.is_empty() { demo_fleet() } else { config.fleet() };
        let clock = ctx.clock();
        let store = Arc::new(
            AvailabilityStore::open(
                Arc::new(InMemoryAvailabilityPersistence::default()),
                Arc::clone(&clock),
                config.storage.horizon_days,
            )
            .await,
        );
        let admins = AdminDirectory::new([SMOKE_ADMIN]);
        let delivery = Arc::new(RecordingDelivery::default());

        let assistant = BookingAssistant::new(AssistantServices::in_memory(
            fleet.clone(),
            admins.clone(),
            Arc::clone(&store),
            Arc::new(AdminFanout::new(Arc::clone(&delivery), admins)),
            Arc::new(InMemoryAuditSink::default()),
            clock,
        ));

        Self { fleet, store, assistant, delivery, idle_ttl: config.session.idle_ttl(), request_id: None }
    }

    async fn run(&mut self, step: SmokeStep) -> Result<String, String> {
        match step {
            SmokeStep::AvailabilityReconcile => self.reconcile().await,
            SmokeStep::CalendarRender => self.calendar().await,
            SmokeStep::BookingConversation => self.booking().await,
            SmokeStep::AdminNotification => self.notification(),
            SmokeStep::AdminReplyRelay => self.relay().await,
            SmokeStep::IdleEviction => self.evict().await,
        }
    }

    fn vehicle(&self) -> Result<&Vehicle, String> {
        self.fleet.iter().next().ok_or_else(|| "fleet is empty".to_string())
    }

    async fn send(&self, event: InboundEvent) -> Result<HandlerResult, String> {
        self.assistant
            .handle(&event, &EventContext::new("smoke"))
            .await
            .map_err(|error| error.to_string())
    }

    async fn reconcile(&mut self) -> Result<String, String> {
        let report = self.store.reconcile(&self.fleet.ids()).await.map_err(|error| error.to_string())?;
        if report.vehicles_materialized != self.fleet.len() {
            return Err(format!(
                "expected {} vehicle(s) materialized, got {}",
                self.fleet.len(),
                report.vehicles_materialized
            ));
        }
        Ok(format!("{} vehicle(s), {} day(s) populated", self.fleet.len(), report.days_added))
    }

    async fn calendar(&mut self) -> Result<String, String> {
        let vehicle = self.vehicle()?.id.clone();
        self.send(InboundEvent::action(SMOKE_CUSTOMER, SMOKE_NAME, format!("vehicle_{vehicle}"))).await?;
        let calendar = self.send(InboundEvent::action(SMOKE_CUSTOMER, SMOKE_NAME, "price")).await?;

        let today_token = format!("cal_start_{}", self.store.today().format("%Y-%m-%d"));
        match calendar.message() {
            Some(message) if message.has_action(&today_token) => {
                Ok(format!("start calendar for {vehicle} offers {today_token}"))
            }
            _ => Err(format!("start calendar for {vehicle} is missing {today_token}")),
        }
    }

    async fn booking(&mut self) -> Result<String, String> {
        let today = self.store.today();
        let end = today.succ_opt().ok_or_else(|| "calendar overflow".to_string())?;

        for token in [
            format!("cal_start_{}", today.format("%Y-%m-%d")),
            format!("cal_end_{}", end.format("%Y-%m-%d")),
            "go_booking".to_string(),
        ] {
            self.send(InboundEvent::action(SMOKE_CUSTOMER, SMOKE_NAME, token)).await?;
        }
        for index in 1..=4 {
            self.send(InboundEvent::photo(SMOKE_CUSTOMER, SMOKE_NAME, format!("smoke-photo-{index}"))).await?;
        }
        self.send(InboundEvent::text(SMOKE_CUSTOMER, SMOKE_NAME, "@smoke_tester +7 999 000-00-00")).await?;

        let state = self
            .assistant
            .conversation_state(SMOKE_CUSTOMER)
            .await
            .map_err(|error| error.to_string())?;
        if state != ConversationState::RequestSubmitted {
            return Err(format!("conversation ended in {state:?}, expected RequestSubmitted"));
        }
        Ok("request submitted after 4 documents and a contact".to_string())
    }

    fn notification(&mut self) -> Result<String, String> {
        let inbox = self.delivery.sent_to(SMOKE_ADMIN);
        let documents = inbox.iter().filter(|item| matches!(item, Delivered::Document { .. })).count();
        self.request_id = inbox.iter().find_map(|item| match item {
            Delivered::Message(message) => message
                .actions()
                .find_map(|action| action.strip_prefix("admin_reply_"))
                .map(str::to_string),
            Delivered::Document { .. } => None,
        });

        match &self.request_id {
            Some(request_id) if documents == 4 => {
                Ok(format!("administrator received request {request_id} with {documents} document(s)"))
            }
            _ => Err(format!("administrator inbox has {} item(s), {documents} document(s)", inbox.len())),
        }
    }

    async fn relay(&mut self) -> Result<String, String> {
        let request_id = self.request_id.clone().ok_or_else(|| "no request to reply to".to_string())?;
        self.send(InboundEvent::action(SMOKE_ADMIN, "Admin", format!("admin_reply_{request_id}"))).await?;
        self.send(InboundEvent::text(SMOKE_ADMIN, "Admin", "smoke reply")).await?;

        let relayed = self.delivery.sent_to(SMOKE_CUSTOMER).iter().any(|item| {
            matches!(item, Delivered::Message(message) if message.text.contains("smoke reply"))
        });
        if relayed {
            Ok("administrator reply reached the customer".to_string())
        } else {
            Err("administrator reply was not relayed".to_string())
        }
    }

    async fn evict(&mut self) -> Result<String, String> {
        let Some(ttl) = self.idle_ttl else {
            return Ok("idle eviction disabled (session.idle_ttl_secs = 0)".to_string());
        };
        let report = self.assistant.evict_idle(ttl).await.map_err(|error| error.to_string())?;
        if report.conversations > 0 || report.sessions > 0 {
            return Err(format!(
                "fresh conversations were evicted with ttl {}s",
                ttl.num_seconds()
            ));
        }
        Ok(format!("no state idle longer than {}s; {} lock(s) kept", ttl.num_seconds(), report.locks))
    }
}

fn demo_fleet() -> Fleet {
    Fleet::new(vec![Vehicle {
        id: VehicleId("smoke-car".to_string()),
        name: "Smoke Car".to_string(),
        kind: VehicleKind::Auto,
        description: String::new(),
        daily_price: Decimal::new(1000, 0),
        pawn_price: Decimal::new(5000, 0),
    }])
}

fn timed_check<T, E>(check: impl FnOnce() -> Result<T, E>) -> Result<(u64, T), (u64, E)> {
    let started = Instant::now();
    match check() {
        Ok(value) => Ok((started.elapsed().as_millis() as u64, value)),
        Err(error) => Err((started.elapsed().as_millis() as u64, error)),
    }
}

fn skipped(name: &'static str) -> SmokeCheck {
    SmokeCheck {
        name,
        status: SmokeStatus::Skipped,
        elapsed_ms: 0,
        message: "skipped due previous failure".to_string(),
    }
}

fn finalize_report(checks: Vec<SmokeCheck>, total_elapsed_ms: u64) -> CommandResult {
    let passed = checks.iter().filter(|check| check.status == SmokeStatus::Pass).count();
    let total = checks.len();
    let failed = checks.iter().any(|check| check.status == SmokeStatus::Fail);

    let report = SmokeReport {
        command: "smoke",
        status: if failed { SmokeStatus::Fail } else { SmokeStatus::Pass },
        summary: format!("smoke: {passed}/{total} checks passed in {total_elapsed_ms}ms"),
        total_elapsed_ms,
        checks,
    };

    let human = report.summary.clone();
    let machine = serde_json::to_string(&report).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"smoke\",\"status\":\"fail\",\"summary\":\"serialization failed\",\"error\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    });

    CommandResult {
        exit_code: if failed { EXIT_SMOKE } else { 0 },
        output: format!("{human}\n{machine}"),
    }
}
