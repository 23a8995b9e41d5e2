use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

/// Rolling number of days past today that every known vehicle keeps populated.
pub const DEFAULT_HORIZON_DAYS: u32 = 100;

/// Per-vehicle grid of calendar days to a free flag.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VehicleAvailability {
    days: BTreeMap<NaiveDate, bool>,
}

impl VehicleAvailability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_days(days: impl IntoIterator<Item = (NaiveDate, bool)>) -> Self {
        Self { days: days.into_iter().collect() }
    }

    /// Fills every missing day in `[today, today + horizon_days]` as free and returns how many
    /// entries were added. Existing entries, past ones included, are left untouched.
    pub fn ensure_horizon(&mut self, today: NaiveDate, horizon_days: u32) -> usize {
        let mut added = 0;
        for date in today.iter_days().take(horizon_days as usize + 1) {
            if let Entry::Vacant(entry) = self.days.entry(date) {
                entry.insert(true);
                added += 1;
            }
        }
        added
    }

    pub fn get(&self, date: NaiveDate) -> Option<bool> {
        self.days.get(&date).copied()
    }

    /// Returns whether the stored flag changed.
    pub fn set(&mut self, date: NaiveDate, available: bool) -> bool {
        self.days.insert(date, available) != Some(available)
    }

    /// `[today, today + days_ahead)`; days outside the stored grid read as free.
    pub fn window(&self, today: NaiveDate, days_ahead: u32) -> AvailabilitySnapshot {
        AvailabilitySnapshot::from_days(
            today
                .iter_days()
                .take(days_ahead as usize)
                .map(|date| (date, self.get(date).unwrap_or(true))),
        )
    }

    pub fn days(&self) -> impl Iterator<Item = (NaiveDate, bool)> + '_ {
        self.days.iter().map(|(date, available)| (*date, *available))
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// Read-only view of one vehicle's availability handed to the calendar renderer.
///
/// Dates absent from the snapshot are treated as unavailable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AvailabilitySnapshot {
    days: BTreeMap<NaiveDate, bool>,
}

impl AvailabilitySnapshot {
    pub fn from_days(days: impl IntoIterator<Item = (NaiveDate, bool)>) -> Self {
        Self { days: days.into_iter().collect() }
    }

    pub fn all_free(today: NaiveDate, days_ahead: u32) -> Self {
        Self::from_days(today.iter_days().take(days_ahead as usize).map(|date| (date, true)))
    }

    pub fn get(&self, date: NaiveDate) -> Option<bool> {
        self.days.get(&date).copied()
    }

    pub fn is_available(&self, date: NaiveDate) -> bool {
        self.get(date).unwrap_or(false)
    }

    /// Every day of the inclusive range `[start, end]` is available.
    pub fn range_available(&self, start: NaiveDate, end: NaiveDate) -> bool {
        if end < start {
            return false;
        }
        start.iter_days().take_while(|date| *date <= end).all(|date| self.is_available(date))
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.days.keys().copied()
    }

    pub fn days(&self) -> impl Iterator<Item = (NaiveDate, bool)> + '_ {
        self.days.iter().map(|(date, available)| (*date, *available))
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{AvailabilitySnapshot, VehicleAvailability, DEFAULT_HORIZON_DAYS};

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    #[test]
    fn ensure_horizon_covers_inclusive_range_once() {
        let today = date("2024-06-01");
        let mut grid = VehicleAvailability::new();

        assert_eq!(grid.ensure_horizon(today, DEFAULT_HORIZON_DAYS), 101);
        assert_eq!(grid.ensure_horizon(today, DEFAULT_HORIZON_DAYS), 0);
        assert_eq!(grid.get(date("2024-09-09")), Some(true));
        assert_eq!(grid.get(date("2024-09-10")), None);
    }

    #[test]
    fn ensure_horizon_keeps_existing_flags_and_past_days() {
        let today = date("2024-06-10");
        let mut grid = VehicleAvailability::from_days([
            (date("2024-06-01"), false),
            (date("2024-06-12"), false),
        ]);

        let added = grid.ensure_horizon(today, 5);

        assert_eq!(added, 5);
        assert_eq!(grid.get(date("2024-06-01")), Some(false));
        assert_eq!(grid.get(date("2024-06-12")), Some(false));
        assert_eq!(grid.len(), 7);
    }

    #[test]
    fn window_is_half_open_and_fills_gaps_as_free() {
        let today = date("2024-06-01");
        let grid = VehicleAvailability::from_days([(date("2024-06-02"), false)]);

        let window = grid.window(today, 3);

        assert_eq!(window.len(), 3);
        assert_eq!(window.get(date("2024-06-01")), Some(true));
        assert_eq!(window.get(date("2024-06-02")), Some(false));
        assert_eq!(window.get(date("2024-06-04")), None);
    }

    #[test]
    fn set_reports_changes_only() {
        let mut grid = VehicleAvailability::new();

        assert!(grid.set(date("2024-06-01"), false));
        assert!(!grid.set(date("2024-06-01"), false));
        assert!(grid.set(date("2024-06-01"), true));
    }

    #[test]
    fn snapshot_treats_absent_days_as_unavailable() {
        let snapshot = AvailabilitySnapshot::all_free(date("2024-06-01"), 2);

        assert!(snapshot.is_available(date("2024-06-02")));
        assert!(!snapshot.is_available(date("2024-06-03")));
        assert!(!snapshot.is_available(date("2024-05-31")));
    }

    #[test]
    fn range_availability_is_inclusive_and_monotonic() {
        let snapshot = AvailabilitySnapshot::from_days([
            (date("2024-06-08"), true),
            (date("2024-06-09"), true),
            (date("2024-06-10"), false),
            (date("2024-06-11"), true),
        ]);
        let start = date("2024-06-08");

        assert!(snapshot.range_available(start, start));
        assert!(snapshot.range_available(start, date("2024-06-09")));
        assert!(!snapshot.range_available(start, date("2024-06-10")));
        assert!(!snapshot.range_available(start, date("2024-06-11")));
        assert!(!snapshot.range_available(date("2024-06-09"), start));

        let valid_ends: Vec<_> = snapshot
            .dates()
            .filter(|end| snapshot.range_available(start, *end))
            .collect();
        for end in &valid_ends {
            for shorter in start.iter_days().take_while(|day| day <= end) {
                assert!(snapshot.range_available(start, shorter));
            }
        }
    }
}
