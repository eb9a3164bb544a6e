//! Two independent customer taxonomies.
//!
//! [`FrequencySegment`] drives message personalization and is computed from the
//! spacing of purchases. [`PopulationSegment`] feeds portfolio dashboards and
//! is computed from purchase count and recency. They are not interchangeable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Classification by mean number of days between consecutive purchases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrequencySegment {
    /// mean gap ≤ 7 days
    VeryFrequent,
    /// ≤ 15 days
    Frequent,
    /// ≤ 30 days
    Regular,
    /// ≤ 60 days
    Occasional,
    /// > 60 days
    Rare,
    /// fewer than two purchases
    FirstPurchase,
}

impl FrequencySegment {
    pub fn from_mean_gap(mean_gap_days: Option<f64>) -> Self {
        match mean_gap_days {
            None => FrequencySegment::FirstPurchase,
            Some(days) if days <= 7.0 => FrequencySegment::VeryFrequent,
            Some(days) if days <= 15.0 => FrequencySegment::Frequent,
            Some(days) if days <= 30.0 => FrequencySegment::Regular,
            Some(days) if days <= 60.0 => FrequencySegment::Occasional,
            Some(_) => FrequencySegment::Rare,
        }
    }

    /// Classify ascending purchase timestamps.
    pub fn classify(purchase_dates: &[DateTime<Utc>]) -> Self {
        Self::from_mean_gap(mean_gap_days(purchase_dates))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FrequencySegment::VeryFrequent => "very_frequent",
            FrequencySegment::Frequent => "frequent",
            FrequencySegment::Regular => "regular",
            FrequencySegment::Occasional => "occasional",
            FrequencySegment::Rare => "rare",
            FrequencySegment::FirstPurchase => "first_purchase",
        }
    }
}

impl core::fmt::Display for FrequencySegment {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mean of consecutive gaps in (fractional) days; `None` below two purchases.
pub fn mean_gap_days(purchase_dates: &[DateTime<Utc>]) -> Option<f64> {
    if purchase_dates.len() < 2 {
        return None;
    }

    let total_millis: f64 = purchase_dates
        .windows(2)
        .map(|w| (w[1] - w[0]).num_milliseconds().abs() as f64)
        .sum();

    Some(total_millis / MILLIS_PER_DAY / (purchase_dates.len() - 1) as f64)
}

/// Portfolio bucket by purchase count and recency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopulationSegment {
    New,
    Inactive,
    Vip,
    Frequent,
    Regular,
    Occasional,
}

impl PopulationSegment {
    pub const INACTIVE_AFTER_DAYS: i64 = 90;

    pub fn classify(
        total_purchases: u64,
        last_purchase: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        let Some(last) = last_purchase else {
            return PopulationSegment::New;
        };

        if (now - last).num_days() > Self::INACTIVE_AFTER_DAYS {
            return PopulationSegment::Inactive;
        }

        match total_purchases {
            n if n >= 10 => PopulationSegment::Vip,
            n if n >= 5 => PopulationSegment::Frequent,
            n if n >= 2 => PopulationSegment::Regular,
            _ => PopulationSegment::Occasional,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn spaced(gaps: &[Duration]) -> Vec<DateTime<Utc>> {
        let mut at = start();
        let mut dates = vec![at];
        for gap in gaps {
            at += *gap;
            dates.push(at);
        }
        dates
    }

    #[test]
    fn fewer_than_two_purchases_is_first_purchase() {
        assert_eq!(FrequencySegment::classify(&[]), FrequencySegment::FirstPurchase);
        assert_eq!(FrequencySegment::classify(&[start()]), FrequencySegment::FirstPurchase);
    }

    #[test]
    fn boundaries_are_inclusive() {
        let exactly_seven = spaced(&[Duration::days(7)]);
        assert_eq!(mean_gap_days(&exactly_seven), Some(7.0));
        assert_eq!(FrequencySegment::classify(&exactly_seven), FrequencySegment::VeryFrequent);

        // 7.1 days
        let just_over = spaced(&[Duration::minutes(7 * 1440 + 144)]);
        assert_eq!(FrequencySegment::classify(&just_over), FrequencySegment::Frequent);

        assert_eq!(FrequencySegment::from_mean_gap(Some(15.0)), FrequencySegment::Frequent);
        assert_eq!(FrequencySegment::from_mean_gap(Some(30.0)), FrequencySegment::Regular);
        assert_eq!(FrequencySegment::from_mean_gap(Some(60.0)), FrequencySegment::Occasional);
        assert_eq!(FrequencySegment::from_mean_gap(Some(60.5)), FrequencySegment::Rare);
    }

    #[test]
    fn ten_and_three_day_averages() {
        let ten = spaced(&[Duration::days(8), Duration::days(12)]);
        assert_eq!(FrequencySegment::classify(&ten), FrequencySegment::Frequent);

        let three = spaced(&[Duration::days(3), Duration::days(3), Duration::days(3)]);
        assert_eq!(FrequencySegment::classify(&three), FrequencySegment::VeryFrequent);
    }

    #[test]
    fn population_segments() {
        let now = start();
        let recent = Some(now - Duration::days(5));

        assert_eq!(PopulationSegment::classify(0, None, now), PopulationSegment::New);
        assert_eq!(
            PopulationSegment::classify(12, Some(now - Duration::days(91)), now),
            PopulationSegment::Inactive
        );
        assert_eq!(
            PopulationSegment::classify(12, Some(now - Duration::days(90)), now),
            PopulationSegment::Vip
        );
        assert_eq!(PopulationSegment::classify(5, recent, now), PopulationSegment::Frequent);
        assert_eq!(PopulationSegment::classify(2, recent, now), PopulationSegment::Regular);
        assert_eq!(PopulationSegment::classify(1, recent, now), PopulationSegment::Occasional);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: a constant whole-day spacing classifies by that spacing.
        #[test]
        fn constant_spacing_matches_thresholds(days in 0i64..120, n in 2usize..8) {
            let gaps = vec![Duration::days(days); n - 1];
            let expected = FrequencySegment::from_mean_gap(Some(days as f64));
            prop_assert_eq!(FrequencySegment::classify(&spaced(&gaps)), expected);
        }
    }
}
