use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::booking::BookingRequestId;
use crate::domain::user::UserId;
use crate::domain::vehicle::{VehicleId, VehicleKind};

/// Per-user working memory for the booking in progress. Not persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub selected_vehicle_id: Option<VehicleId>,
    pub selected_vehicle_kind: Option<VehicleKind>,
    pub rental_start_date: Option<NaiveDate>,
    pub rental_end_date: Option<NaiveDate>,
    pub current_booking_request_id: Option<BookingRequestId>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            selected_vehicle_id: None,
            selected_vehicle_kind: None,
            rental_start_date: None,
            rental_end_date: None,
            current_booking_request_id: None,
            last_activity: now,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    /// Switching vehicles drops any range picked for the previous one.
    pub fn select_vehicle(&mut self, id: VehicleId, kind: VehicleKind) {
        if self.selected_vehicle_id.as_ref() != Some(&id) {
            self.clear_range();
        }
        self.selected_vehicle_id = Some(id);
        self.selected_vehicle_kind = Some(kind);
    }

    pub fn clear_range(&mut self) {
        self.rental_start_date = None;
        self.rental_end_date = None;
    }

    pub fn selected_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        match (self.rental_start_date, self.rental_end_date) {
            (Some(start), Some(end)) if end >= start => Some((start, end)),
            _ => None,
        }
    }

    /// Fields that must be present before a booking can be committed.
    pub fn missing_booking_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.selected_vehicle_id.is_none() {
            missing.push("selected_vehicle_id".to_string());
        }
        if self.rental_start_date.is_none() {
            missing.push("rental_start_date".to_string());
        }
        match (self.rental_start_date, self.rental_end_date) {
            (_, None) => missing.push("rental_end_date".to_string()),
            (Some(start), Some(end)) if end < start => missing.push("rental_end_date".to_string()),
            _ => {}
        }
        missing
    }
}
