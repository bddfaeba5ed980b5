//! Per-date, per-category minute totals for closed sessions.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::types::{Category, DayTotals};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyAggregates {
    days: BTreeMap<NaiveDate, DayTotals>,
}

impl DailyAggregates {
    pub(crate) fn from_map(days: BTreeMap<NaiveDate, DayTotals>) -> Self {
        DailyAggregates { days }
    }

    /// Totals for `date`; zeros when nothing was recorded.
    pub fn get(&self, date: NaiveDate) -> DayTotals {
        self.days.get(&date).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &DayTotals)> {
        self.days.iter()
    }

    pub fn as_map(&self) -> &BTreeMap<NaiveDate, DayTotals> {
        &self.days
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub(crate) fn add(&mut self, date: NaiveDate, category: Category, minutes: f64) {
        *self.days.entry(date).or_default().slot_mut(category) += minutes;
    }

    /// Decrements, clamping at zero. Returns how far below zero the value
    /// would have gone (0.0 when no clamping happened).
    pub(crate) fn subtract(&mut self, date: NaiveDate, category: Category, minutes: f64) -> f64 {
        let Some(totals) = self.days.get_mut(&date) else {
            return minutes.max(0.0);
        };
        let slot = totals.slot_mut(category);
        let remaining = *slot - minutes;
        if remaining < 0.0 {
            *slot = 0.0;
            -remaining
        } else {
            *slot = remaining;
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn test_unknown_date_is_zero() {
        let daily = DailyAggregates::default();
        assert_eq!(daily.get(day(1)), DayTotals::default());
    }

    #[test]
    fn test_add_accumulates_per_category() {
        let mut daily = DailyAggregates::default();
        daily.add(day(1), Category::Study, 30.0);
        daily.add(day(1), Category::Study, 15.0);
        daily.add(day(1), Category::Game, 10.0);
        daily.add(day(2), Category::Other, 5.0);

        let totals = daily.get(day(1));
        assert_eq!(totals.study, 45.0);
        assert_eq!(totals.game, 10.0);
        assert_eq!(totals.other, 0.0);
        assert_eq!(daily.get(day(2)).other, 5.0);
    }

    #[test]
    fn test_subtract_exact() {
        let mut daily = DailyAggregates::default();
        daily.add(day(1), Category::Study, 30.0);
        assert_eq!(daily.subtract(day(1), Category::Study, 20.0), 0.0);
        assert_eq!(daily.get(day(1)).study, 10.0);
    }

    #[test]
    fn test_subtract_clamps_at_zero() {
        let mut daily = DailyAggregates::default();
        daily.add(day(1), Category::Game, 10.0);
        let deficit = daily.subtract(day(1), Category::Game, 25.0);
        assert_eq!(deficit, 15.0);
        assert_eq!(daily.get(day(1)).game, 0.0);
    }

    #[test]
    fn test_subtract_unknown_date_leaves_cache_untouched() {
        let mut daily = DailyAggregates::default();
        assert_eq!(daily.subtract(day(4), Category::Other, 5.0), 5.0);
        assert!(daily.is_empty());
    }
}
