use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use thiserror::Error;

const DATE_FORMAT: &str = "%Y-%m-%d";
const PREFIX: &str = "cal_";

/// Action token carried by a calendar button and round-tripped by the transport.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CalendarAction {
    Start(NaiveDate),
    End(NaiveDate),
    Prev { year: i32, month: u32, anchor: Option<NaiveDate> },
    Next { year: i32, month: u32, anchor: Option<NaiveDate> },
    Today,
    Reset,
    Unavailable,
    UnavailableRange,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CalendarTokenError {
    #[error("`{0}` is not a calendar token")]
    NotCalendar(String),
    #[error("unknown calendar action in `{0}`")]
    UnknownAction(String),
    #[error("invalid date in calendar token `{0}`")]
    InvalidDate(String),
    #[error("invalid year or month in calendar token `{0}`")]
    InvalidMonth(String),
}

impl CalendarAction {
    pub fn is_calendar_token(token: &str) -> bool {
        token.starts_with(PREFIX)
    }

    /// Month a navigation token leads to, with year roll-over.
    pub fn target_month(&self) -> Option<(i32, u32)> {
        match self {
            Self::Prev { year, month, .. } => shift_month(*year, *month as i32 - 1),
            Self::Next { year, month, .. } => shift_month(*year, *month as i32 + 1),
            _ => None,
        }
    }

    pub fn anchor(&self) -> Option<NaiveDate> {
        match self {
            Self::Prev { anchor, .. } | Self::Next { anchor, .. } => *anchor,
            _ => None,
        }
    }
}

/// Normalizes a possibly out-of-range month: 0 is December of the previous year, 13 is January
/// of the next one. `None` when the year would overflow.
pub fn shift_month(year: i32, month: i32) -> Option<(i32, u32)> {
    let zero_based = month.checked_sub(1)?;
    let year = year.checked_add(zero_based.div_euclid(12))?;
    let month = zero_based.rem_euclid(12) as u32 + 1;
    Some((year, month))
}

impl fmt::Display for CalendarAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start(date) => write!(f, "{PREFIX}start_{}", date.format(DATE_FORMAT)),
            Self::End(date) => write!(f, "{PREFIX}end_{}", date.format(DATE_FORMAT)),
            Self::Prev { year, month, anchor } => {
                write!(f, "{PREFIX}prev_{year}_{month}_{}", format_anchor(*anchor))
            }
            Self::Next { year, month, anchor } => {
                write!(f, "{PREFIX}next_{year}_{month}_{}", format_anchor(*anchor))
            }
            Self::Today => write!(f, "{PREFIX}today"),
            Self::Reset => write!(f, "{PREFIX}reset"),
            Self::Unavailable => write!(f, "{PREFIX}unavailable"),
            Self::UnavailableRange => write!(f, "{PREFIX}unavailable_range"),
        }
    }
}

fn format_anchor(anchor: Option<NaiveDate>) -> String {
    anchor.map(|date| date.format(DATE_FORMAT).to_string()).unwrap_or_else(|| "null".to_string())
}

impl FromStr for CalendarAction {
    type Err = CalendarTokenError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let Some(rest) = token.strip_prefix(PREFIX) else {
            return Err(CalendarTokenError::NotCalendar(token.to_string()));
        };

        match rest {
            "reset" => return Ok(Self::Reset),
            "unavailable" => return Ok(Self::Unavailable),
            "unavailable_range" => return Ok(Self::UnavailableRange),
            _ => {}
        }
        if rest == "today" || rest.starts_with("today_") {
            return Ok(Self::Today);
        }
        if let Some(date) = rest.strip_prefix("start_") {
            return parse_date(token, date).map(Self::Start);
        }
        if let Some(date) = rest.strip_prefix("end_") {
            return parse_date(token, date).map(Self::End);
        }
        if let Some(args) = rest.strip_prefix("prev_") {
            let (year, month, anchor) = parse_navigation(token, args)?;
            return Ok(Self::Prev { year, month, anchor });
        }
        if let Some(args) = rest.strip_prefix("next_") {
            let (year, month, anchor) = parse_navigation(token, args)?;
            return Ok(Self::Next { year, month, anchor });
        }

        Err(CalendarTokenError::UnknownAction(token.to_string()))
    }
}

fn parse_date(token: &str, value: &str) -> Result<NaiveDate, CalendarTokenError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| CalendarTokenError::InvalidDate(token.to_string()))
}

fn parse_navigation(
    token: &str,
    args: &str,
) -> Result<(i32, u32, Option<NaiveDate>), CalendarTokenError> {
    let mut parts = args.splitn(3, '_');
    let (Some(year), Some(month), Some(anchor)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(CalendarTokenError::InvalidMonth(token.to_string()));
    };

    let year = year.parse::<i32>().map_err(|_| CalendarTokenError::InvalidMonth(token.to_string()))?;
    let month = month
        .parse::<u32>()
        .ok()
        .filter(|month| (1..=12).contains(month))
        .ok_or_else(|| CalendarTokenError::InvalidMonth(token.to_string()))?;
    if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
        return Err(CalendarTokenError::InvalidMonth(token.to_string()));
    }
    let anchor = match anchor {
        "null" => None,
        value => Some(parse_date(token, value)?),
    };

    Ok((year, month, anchor))
}
