use chrono::NaiveDate;
use serde::Serialize;

use rentdesk_core::calendar::{CalendarAction, CalendarCell, CalendarGrid, CalendarMode, DayStatus};
use rentdesk_core::domain::booking::{BookingRequest, DocumentSlot};
use rentdesk_core::domain::vehicle::{RentalQuote, Vehicle, VehicleKind};

/// Token for buttons that only label something; the assistant ignores it.
pub const NOOP_ACTION: &str = "noop";
pub const PRICE_ACTION: &str = "price";
pub const GO_BOOKING_ACTION: &str = "go_booking";
pub const WISHES_ACTION: &str = "wishes";
pub const CANCEL_ACTION: &str = "cancel";
pub const VEHICLE_ACTION_PREFIX: &str = "vehicle_";
pub const ADMIN_REPLY_PREFIX: &str = "admin_reply_";
pub const ADMIN_SHOW_PHONE_PREFIX: &str = "admin_show_phone_";

const DISPLAY_DATE: &str = "%d.%m.%Y";
const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];
const WEEKDAYS: [&str; 7] = ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Button {
    pub label: String,
    pub action: String,
}

impl Button {
    pub fn new(action: impl Into<String>, label: impl Into<String>) -> Self {
        Self { label: label.into(), action: action.into() }
    }

    pub fn noop(label: impl Into<String>) -> Self {
        Self::new(NOOP_ACTION, label)
    }
}

/// Rendering instruction handed back to the transport: text plus rows of buttons.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keyboard: Vec<Vec<Button>>,
}

impl MessageTemplate {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), keyboard: Vec::new() }
    }

    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.keyboard.iter().flatten().map(|button| button.action.as_str())
    }

    pub fn has_action(&self, action: &str) -> bool {
        self.actions().any(|candidate| candidate == action)
    }
}

pub struct MessageBuilder {
    lines: Vec<String>,
    keyboard: Vec<Vec<Button>>,
}

impl MessageBuilder {
    pub fn new(first_line: impl Into<String>) -> Self {
        Self { lines: vec![first_line.into()], keyboard: Vec::new() }
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    pub fn blank(self) -> Self {
        self.line("")
    }

    pub fn row<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut RowBuilder),
    {
        let mut builder = RowBuilder::default();
        build(&mut builder);
        if !builder.buttons.is_empty() {
            self.keyboard.push(builder.buttons);
        }
        self
    }

    pub fn rows(mut self, rows: impl IntoIterator<Item = Vec<Button>>) -> Self {
        self.keyboard.extend(rows.into_iter().filter(|row| !row.is_empty()));
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { text: self.lines.join("\n"), keyboard: self.keyboard }
    }
}

#[derive(Default)]
pub struct RowBuilder {
    buttons: Vec<Button>,
}

impl RowBuilder {
    pub fn button(&mut self, action: impl Into<String>, label: impl Into<String>) -> &mut Self {
        self.buttons.push(Button::new(action, label));
        self
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DISPLAY_DATE).to_string()
}

fn month_title(year: i32, month: u32) -> String {
    let name = MONTH_NAMES.get(month.saturating_sub(1) as usize).copied().unwrap_or("?");
    format!("{name} {year}")
}

/// Keyboard rows for a rendered month: navigation, weekday header, weeks, optional start
/// reminder and the footer action.
pub fn calendar_keyboard(grid: &CalendarGrid) -> Vec<Vec<Button>> {
    let mut rows = Vec::with_capacity(grid.weeks.len() + 4);
    rows.push(vec![
        Button::new(grid.prev.to_string(), "◀"),
        Button::noop(month_title(grid.year, grid.month)),
        Button::new(grid.next.to_string(), "▶"),
    ]);
    rows.push(WEEKDAYS.iter().map(|day| Button::noop(*day)).collect());

    for week in &grid.weeks {
        rows.push(
            week.iter()
                .map(|cell| match cell {
                    CalendarCell::Padding => Button::noop("·"),
                    CalendarCell::Day(day) => {
                        let marker = match day.status {
                            DayStatus::TodayStart => "🎯",
                            DayStatus::Start | DayStatus::ValidEnd => "✅",
                            DayStatus::Unavailable | DayStatus::InvalidEnd => "❌",
                        };
                        Button::new(day.action.to_string(), format!("{marker} {}", day.date.format("%-d")))
                    }
                })
                .collect(),
        );
    }

    if let CalendarMode::PickEnd { start } = grid.mode {
        rows.push(vec![Button::noop(format!("Start: {}", format_date(start)))]);
    }
    let footer_label = match grid.footer {
        CalendarAction::Reset => "🔄 Reset",
        _ => "🎯 Today",
    };
    rows.push(vec![Button::new(grid.footer.to_string(), footer_label)]);
    rows
}

pub fn calendar_message(grid: &CalendarGrid, vehicle: &Vehicle) -> MessageTemplate {
    let builder = match grid.mode {
        CalendarMode::PickStart => MessageBuilder::new(format!("🗓 Pick the START date for {}", vehicle.name))
            .blank()
            .line("✅ available  🎯 today  ❌ not available")
            .line("Rentals start from one day."),
        CalendarMode::PickEnd { start } => {
            MessageBuilder::new(format!("🗓 Pick the END date for {}", vehicle.name))
                .blank()
                .line(format!("Start: {}", format_date(start)))
                .line("✅ can end here  ❌ booked or breaks the range")
        }
    };
    builder.rows(calendar_keyboard(grid)).build()
}

pub fn vehicle_menu<'a>(kind: VehicleKind, vehicles: impl Iterator<Item = &'a Vehicle>) -> MessageTemplate {
    let title = match kind {
        VehicleKind::Auto => "Pick a car and I will calculate the price.",
        VehicleKind::Moto => "Pick a motorbike and I will calculate the price.",
    };
    let rows: Vec<Vec<Button>> = vehicles
        .map(|vehicle| {
            vec![Button::new(
                format!("{VEHICLE_ACTION_PREFIX}{}", vehicle.id),
                format!("{} · {}/day", vehicle.name, vehicle.daily_price),
            )]
        })
        .collect();

    MessageBuilder::new(title)
        .rows(rows)
        .row(|row| {
            row.button(WISHES_ACTION, "What would you like to ride next?");
        })
        .build()
}

pub fn vehicle_card(vehicle: &Vehicle) -> MessageTemplate {
    let mut builder = MessageBuilder::new(format!("Great choice: {}", vehicle.name));
    if !vehicle.description.trim().is_empty() {
        builder = builder.blank().line(vehicle.description.trim());
    }
    builder
        .blank()
        .line(format!("Daily price: {}", vehicle.daily_price))
        .line(format!("Deposit: {}", vehicle.pawn_price))
        .row(|row| {
            row.button(PRICE_ACTION, "Choose dates and price");
        })
        .row(|row| {
            row.button(CANCEL_ACTION, "Back");
        })
        .build()
}

pub fn price_summary(vehicle: &Vehicle, start: NaiveDate, end: NaiveDate, quote: &RentalQuote) -> MessageTemplate {
    let duration = if quote.billable_days == 1 {
        "1 day".to_string()
    } else {
        format!("{} days", quote.billable_days)
    };

    MessageBuilder::new("🎉 Price calculation")
        .blank()
        .line(format!("Vehicle: {}", vehicle.name))
        .line(format!("Start: {}", format_date(start)))
        .line(format!("End: {}", format_date(end)))
        .line(format!("Duration: {duration}"))
        .line(format!("Price: {}", quote.total_price))
        .line(format!("Deposit: {}", quote.pawn_price))
        .row(|row| {
            row.button(GO_BOOKING_ACTION, "Book");
        })
        .row(|row| {
            row.button(CalendarAction::Reset.to_string(), "🔄 Pick other dates");
        })
        .build()
}

pub fn document_prompt(slot: DocumentSlot) -> MessageTemplate {
    let header = match slot {
        DocumentSlot::PassportMain => "📝 To draw up the rental contract I need your documents.",
        DocumentSlot::PassportRegistration => "✅ Got it.",
        DocumentSlot::LicenseFront => "✅ Passport received.",
        DocumentSlot::LicenseBack => "✅ Got it.",
    };
    MessageBuilder::new(header)
        .blank()
        .line(format!("Please send a photo or scan of your {}.", slot.label()))
        .row(|row| {
            row.button(CANCEL_ACTION, "Cancel booking");
        })
        .build()
}

pub fn contact_prompt() -> MessageTemplate {
    MessageBuilder::new("✅ Documents received.")
        .blank()
        .line("Finally, send your contact: a Telegram username (@name) or a phone number.")
        .build()
}

pub fn request_submitted_message() -> MessageTemplate {
    MessageBuilder::new("🎉 Your request has been sent.")
        .blank()
        .line("An administrator will contact you shortly to confirm the booking.")
        .build()
}

pub fn wishes_prompt() -> MessageTemplate {
    MessageTemplate::text("Tell me in your next message what you would like to ride next time.")
}

pub fn wish_recorded_message() -> MessageTemplate {
    MessageTemplate::text("Thank you! Your wish has been passed on.")
}

pub fn cancelled_message() -> MessageTemplate {
    MessageTemplate::text("Cancelled. You can start over at any time.")
}

pub fn admin_reply_prompt(request: &BookingRequest) -> MessageTemplate {
    MessageBuilder::new(format!("✍️ Type your reply to {} (request {}).", request.requester_name, request.id))
        .row(|row| {
            row.button(CANCEL_ACTION, "Cancel");
        })
        .build()
}

pub fn admin_contact_message(request: &BookingRequest) -> MessageTemplate {
    let mut builder = MessageBuilder::new(format!("Contact for request {}", request.id));
    if let Some(username) = &request.telegram_username {
        builder = builder.line(format!("Telegram: @{username} (https://t.me/{username})"));
    }
    if let Some(phone) = &request.phone_number {
        builder = builder.line(format!("Phone: {phone}"));
    }
    if !request.has_contact() {
        builder = builder.line("No contact details were captured.");
    }
    builder.build()
}

/// Summary sent to every administrator when a request is handed over.
pub fn admin_booking_summary(request: &BookingRequest) -> MessageTemplate {
    let contact = request.contact_link().unwrap_or_else(|| "not provided".to_string());
    let username = request.telegram_username.as_deref().map(|name| format!("@{name}"));
    let contact_details = match (username, &request.phone_number) {
        (Some(username), Some(phone)) => format!("{username}, {phone}"),
        (Some(username), None) => username,
        (None, Some(phone)) => phone.clone(),
        (None, None) => "not provided".to_string(),
    };

    MessageBuilder::new("🆕 New booking request")
        .blank()
        .line(format!("Request: {}", request.id))
        .line(format!("Customer: {} (id {})", request.requester_name, request.requester_id))
        .line(format!("Contact: {contact_details}"))
        .line(format!("Link: {contact}"))
        .line(format!("Vehicle: {}", request.vehicle_name))
        .line(format!(
            "Dates: {} – {}",
            format_date(request.start_date()),
            format_date(request.end_date())
        ))
        .line(format!("Days: {}", request.total_days()))
        .line(format!("Price: {}", request.total_price))
        .line(format!("Deposit: {}", request.pawn_price))
        .line(format!("Total: {}", request.grand_total()))
        .line(format!("Created: {}", request.created_at.format("%d.%m.%Y %H:%M UTC")))
        .row(|row| {
            row.button(format!("{ADMIN_REPLY_PREFIX}{}", request.id), "✍️ Reply");
            row.button(format!("{ADMIN_SHOW_PHONE_PREFIX}{}", request.id), "📞 Contact");
        })
        .build()
}

pub fn wish_notification(sender: &str, username: Option<&str>, wish: &str) -> MessageTemplate {
    let mut builder = MessageBuilder::new(format!("💡 Wish from {sender}"));
    if let Some(username) = username.map(str::trim).filter(|name| !name.is_empty()) {
        let username = username.trim_start_matches('@');
        builder = builder.line(format!("Telegram: @{username} (https://t.me/{username})"));
    }
    builder.blank().line(wish).build()
}

pub fn admin_relay_message(text: &str) -> MessageTemplate {
    MessageBuilder::new("📨 Message from the administrator").blank().line(text).build()
}

pub fn kind_menu() -> MessageTemplate {
    MessageBuilder::new("What would you like to rent?")
        .row(|row| {
            row.button(VehicleKind::Auto.as_str(), "🚗 Car");
            row.button(VehicleKind::Moto.as_str(), "🏍 Motorbike");
        })
        .build()
}

pub fn pick_vehicle_first_message() -> MessageTemplate {
    let mut message = kind_menu();
    message.text = format!("Pick a vehicle first.\n\n{}", message.text);
    message
}

pub fn day_unavailable_message() -> MessageTemplate {
    MessageTemplate::text("❌ This day is already booked. Please pick another one.")
}

pub fn range_unavailable_message() -> MessageTemplate {
    MessageTemplate::text("❌ The range would cross a booked day. Please pick an earlier end date.")
}

pub fn booking_incomplete_message(missing: &[String]) -> MessageTemplate {
    let mut builder = MessageBuilder::new("Before booking please choose:");
    for field in missing {
        let label = match field.as_str() {
            "selected_vehicle_id" => "a vehicle",
            "rental_start_date" => "a start date",
            "rental_end_date" => "an end date",
            other => other,
        };
        builder = builder.line(format!("• {label}"));
    }
    builder.build()
}

pub fn request_not_found_message() -> MessageTemplate {
    MessageTemplate::text("That booking request could not be found.")
}

pub fn access_denied_message() -> MessageTemplate {
    MessageTemplate::text("⛔ This action is available to administrators only.")
}

pub fn reply_sent_message(delivered: bool) -> MessageTemplate {
    if delivered {
        MessageTemplate::text("✅ Reply sent.")
    } else {
        MessageTemplate::text("⚠️ The reply could not be delivered.")
    }
}

pub fn error_message(summary: &str, correlation_id: &str) -> MessageTemplate {
    MessageBuilder::new(format!("⚠️ {summary}")).line(format!("Reference: {correlation_id}")).build()
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use rentdesk_core::calendar::render_month;
    use rentdesk_core::domain::availability::AvailabilitySnapshot;
    use rentdesk_core::domain::booking::{BookingDraft, BookingRequest, BookingRequestId, ContactInfo};
    use rentdesk_core::domain::user::UserId;
    use rentdesk_core::domain::vehicle::VehicleId;

    use super::{admin_booking_summary, calendar_keyboard, MessageBuilder, NOOP_ACTION};

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    #[test]
    fn message_builder_joins_lines_and_skips_empty_rows() {
        let message = MessageBuilder::new("first")
            .line("second")
            .row(|row| {
                row.button("a", "A").button("b", "B");
            })
            .row(|_| {})
            .build();

        assert_eq!(message.text, "first\nsecond");
        assert_eq!(message.keyboard.len(), 1);
        assert!(message.has_action("b"));
    }

    #[test]
    fn calendar_keyboard_has_navigation_header_and_full_weeks() {
        let today = date("2024-06-08");
        let grid = render_month(2024, 6, &AvailabilitySnapshot::all_free(today, 100), None, today)
            .expect("render");

        let rows = calendar_keyboard(&grid);

        assert_eq!(rows[0][0].action, "cal_prev_2024_6_null");
        assert_eq!(rows[0][2].action, "cal_next_2024_6_null");
        assert_eq!(rows[1].len(), 7);
        assert!(rows[2..rows.len() - 1].iter().all(|week| week.len() == 7));
        assert_eq!(rows[2][0].action, NOOP_ACTION);
        assert_eq!(rows.last().map(|row| row[0].action.as_str()), Some("cal_today"));
        assert!(rows.iter().flatten().any(|button| button.action == "cal_start_2024-06-08"
            && button.label.starts_with("🎯")));
    }

    #[test]
    fn admin_summary_carries_reply_and_contact_buttons() {
        let mut request = BookingRequest::new(
            BookingRequestId("R-9".to_string()),
            BookingDraft {
                requester_id: UserId(7),
                requester_name: "Ivan".to_string(),
                vehicle_id: VehicleId("car1".to_string()),
                vehicle_name: "Kia Rio".to_string(),
                start_date: date("2024-06-01"),
                end_date: date("2024-06-04"),
                total_price: Decimal::new(9000, 0),
                pawn_price: Decimal::new(15000, 0),
            },
            Utc::now(),
        )
        .expect("request");
        request.apply_contact(ContactInfo { username: Some("ivan_2024".to_string()), phone: None });

        let message = admin_booking_summary(&request);

        assert!(message.text.contains("https://t.me/ivan_2024"));
        assert!(message.text.contains("01.06.2024 – 04.06.2024"));
        assert!(message.text.contains("Total: 24000"));
        assert!(message.has_action("admin_reply_R-9"));
        assert!(message.has_action("admin_show_phone_R-9"));
    }
}
