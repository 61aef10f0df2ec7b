//! Data models for the outlet task manager.
//!
//! JSON field names are camelCase; the database columns they map to are snake_case.

mod assignment;
mod invitation;
mod outlet;
mod report;
mod schedule;
mod staff;
mod task;
mod user;

pub use assignment::*;
pub use invitation::*;
pub use outlet::*;
pub use report::*;
pub use schedule::*;
pub use staff::*;
pub use task::*;
pub use user::*;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

/// A date supplied by a client, either as a calendar date or a full timestamp.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DateInput {
    Timestamp(DateTime<FixedOffset>),
    Date(NaiveDate),
}

impl DateInput {
    /// Resolve to an instant. Plain dates mean the start of that local day
    /// in `tz`, which is later than midnight where a DST gap skips it.
    pub fn resolve(&self, tz: Tz) -> DateTime<Utc> {
        match self {
            DateInput::Timestamp(ts) => ts.with_timezone(&Utc),
            DateInput::Date(date) => {
                let midnight = date.and_time(chrono::NaiveTime::MIN);
                (0..24)
                    .map(|hour| midnight + chrono::Duration::hours(hour))
                    .find_map(|local| tz.from_local_datetime(&local).earliest())
                    .map(|local| local.with_timezone(&Utc))
                    .unwrap_or_else(|| midnight.and_utc())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_input_accepts_both_shapes() {
        let date: DateInput = serde_json::from_str("\"2024-03-05\"").unwrap();
        assert_eq!(
            date,
            DateInput::Date(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap())
        );

        let ts: DateInput = serde_json::from_str("\"2024-03-05T10:30:00+08:00\"").unwrap();
        assert!(matches!(ts, DateInput::Timestamp(_)));
    }

    #[test]
    fn test_plain_date_resolves_to_local_midnight() {
        let date = DateInput::Date(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        let resolved = date.resolve(chrono_tz::Asia::Singapore);
        assert_eq!(resolved.to_rfc3339(), "2024-03-04T16:00:00+00:00");
        assert_eq!(
            resolved.with_timezone(&chrono_tz::Asia::Singapore).date_naive(),
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
        );
    }

    #[test]
    fn test_plain_date_inside_dst_gap_stays_on_that_day() {
        // Santiago skips from 00:00 to 01:00 on 2022-09-11.
        let day = NaiveDate::from_ymd_opt(2022, 9, 11).unwrap();
        let tz = chrono_tz::America::Santiago;
        let resolved = DateInput::Date(day).resolve(tz);

        let local = resolved.with_timezone(&tz);
        assert_eq!(local.date_naive(), day);
        assert_eq!(local.naive_local().time(), chrono::NaiveTime::from_hms_opt(1, 0, 0).unwrap());
    }
}
