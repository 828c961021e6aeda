use chrono::{Days, NaiveDate, NaiveTime};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::hr::error::HrError;
use crate::model::schedule::{
    DEFAULT_GRACE_MINUTES, DEFAULT_WORK_DAYS, WorkSchedule, normalize_weekday,
};

/// The schedule effective on `date`: latest `effective_from` among the
/// slices covering it. `None` means no obligation that day.
pub fn resolve_for_date(schedules: &[WorkSchedule], date: NaiveDate) -> Option<&WorkSchedule> {
    schedules
        .iter()
        .filter(|s| s.covers(date))
        .max_by_key(|s| s.effective_from)
}

/// Schedule fields as an admin sends them. Missing fields take the defaults
/// (Mon-Fri 09:00-17:00, grace 10, overtime on).
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ScheduleInput {
    #[schema(example = json!([1, 2, 3, 4, 5]))]
    pub work_days: Option<Vec<u8>>,
    #[schema(example = "09:00")]
    pub start_time: Option<String>,
    #[schema(example = "17:00")]
    pub end_time: Option<String>,
    pub grace_minutes: Option<u32>,
    pub overtime_enabled: Option<bool>,
    /// Defaults to today.
    #[schema(example = "2026-01-01", format = "date", value_type = Option<String>)]
    pub effective_from: Option<NaiveDate>,
}

/// A validated schedule ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleDraft {
    pub work_days: Vec<u8>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub grace_minutes: u32,
    pub overtime_enabled: bool,
    pub effective_from: NaiveDate,
}

impl ScheduleInput {
    /// True when the request carries no schedule fields at all.
    pub fn is_empty(&self) -> bool {
        self.work_days.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.grace_minutes.is_none()
            && self.overtime_enabled.is_none()
            && self.effective_from.is_none()
    }

    pub fn into_draft(self, today: NaiveDate) -> Result<ScheduleDraft, HrError> {
        let mut work_days: Vec<u8> = match self.work_days {
            Some(days) => days.into_iter().map(normalize_weekday).collect(),
            None => DEFAULT_WORK_DAYS.to_vec(),
        };
        if let Some(bad) = work_days.iter().find(|d| !(1..=7).contains(*d)) {
            return Err(HrError::Invalid(format!("Invalid work day: {}", bad)));
        }
        work_days.sort_unstable();
        work_days.dedup();

        let start_time = parse_time(self.start_time.as_deref(), "09:00")?;
        let end_time = parse_time(self.end_time.as_deref(), "17:00")?;

        // overnight shifts are not supported
        if end_time <= start_time {
            return Err(HrError::Invalid(
                "end_time must be after start_time".to_string(),
            ));
        }

        Ok(ScheduleDraft {
            work_days,
            start_time,
            end_time,
            grace_minutes: self.grace_minutes.unwrap_or(DEFAULT_GRACE_MINUTES),
            overtime_enabled: self.overtime_enabled.unwrap_or(true),
            effective_from: self.effective_from.unwrap_or(today),
        })
    }
}

fn parse_time(value: Option<&str>, default: &str) -> Result<NaiveTime, HrError> {
    let raw = value.unwrap_or(default).trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| HrError::Invalid(format!("Invalid time: {}", raw)))
}

/// What happens to the currently open slice when a new one starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorSchedule {
    /// No open slice.
    Untouched,
    /// Set `effective_to` the day before the new slice.
    Close { id: u64, effective_to: NaiveDate },
    /// Open slice starts the same day; the new one supersedes it.
    Supersede { id: u64 },
}

/// Decides how a new slice starting `new_from` fits behind `open`, keeping
/// the slices non-overlapping with at most one open.
pub fn plan_schedule_change(
    open: Option<&WorkSchedule>,
    new_from: NaiveDate,
) -> Result<PriorSchedule, HrError> {
    let Some(open) = open else {
        return Ok(PriorSchedule::Untouched);
    };

    if new_from < open.effective_from {
        return Err(HrError::Invalid(format!(
            "effective_from must not be before {}",
            open.effective_from
        )));
    }
    if new_from == open.effective_from {
        return Ok(PriorSchedule::Supersede { id: open.id });
    }

    let effective_to = new_from
        .checked_sub_days(Days::new(1))
        .ok_or_else(|| HrError::Invalid("effective_from out of range".to_string()))?;

    Ok(PriorSchedule::Close {
        id: open.id,
        effective_to,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn slice(id: u64, from: NaiveDate, to: Option<NaiveDate>) -> WorkSchedule {
        WorkSchedule {
            id,
            client_id: 1,
            employee_id: 1,
            work_days: Json(vec![1, 2, 3, 4, 5]),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            grace_minutes: 10,
            overtime_enabled: true,
            effective_from: from,
            effective_to: to,
        }
    }

    #[test]
    fn resolves_slice_covering_the_date() {
        let slices = [
            slice(1, date(2026, 1, 1), Some(date(2026, 2, 28))),
            slice(2, date(2026, 3, 1), None),
        ];
        assert_eq!(resolve_for_date(&slices, date(2026, 2, 28)).unwrap().id, 1);
        assert_eq!(resolve_for_date(&slices, date(2026, 3, 1)).unwrap().id, 2);
        assert_eq!(resolve_for_date(&slices, date(2030, 1, 1)).unwrap().id, 2);
    }

    #[test]
    fn date_before_any_slice_has_no_schedule() {
        let slices = [slice(1, date(2026, 1, 1), None)];
        assert!(resolve_for_date(&slices, date(2025, 12, 31)).is_none());
        assert!(resolve_for_date(&[], date(2026, 1, 1)).is_none());
    }

    #[test]
    fn latest_effective_from_wins() {
        let slices = [slice(1, date(2026, 1, 1), None), slice(2, date(2026, 2, 1), None)];
        assert_eq!(resolve_for_date(&slices, date(2026, 2, 10)).unwrap().id, 2);
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let draft = ScheduleInput::default().into_draft(date(2026, 3, 2)).unwrap();
        assert_eq!(draft.work_days, vec![1, 2, 3, 4, 5]);
        assert_eq!(draft.start_time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(draft.end_time, NaiveTime::from_hms_opt(17, 0, 0).unwrap());
        assert_eq!(draft.grace_minutes, 10);
        assert!(draft.overtime_enabled);
        assert_eq!(draft.effective_from, date(2026, 3, 2));
    }

    #[test]
    fn sunday_zero_becomes_seven() {
        let input = ScheduleInput {
            work_days: Some(vec![0, 6, 6]),
            ..Default::default()
        };
        assert_eq!(input.into_draft(date(2026, 3, 2)).unwrap().work_days, vec![6, 7]);
    }

    #[test]
    fn rejects_bad_days_and_overnight_shifts() {
        let bad_day = ScheduleInput {
            work_days: Some(vec![8]),
            ..Default::default()
        };
        assert!(bad_day.into_draft(date(2026, 3, 2)).is_err());

        let overnight = ScheduleInput {
            start_time: Some("22:00".into()),
            end_time: Some("06:00".into()),
            ..Default::default()
        };
        assert!(overnight.into_draft(date(2026, 3, 2)).is_err());

        let garbage = ScheduleInput {
            start_time: Some("9am".into()),
            ..Default::default()
        };
        assert!(garbage.into_draft(date(2026, 3, 2)).is_err());
    }

    #[test]
    fn accepts_seconds_in_times() {
        let input = ScheduleInput {
            start_time: Some("08:30:00".into()),
            ..Default::default()
        };
        let draft = input.into_draft(date(2026, 3, 2)).unwrap();
        assert_eq!(draft.start_time, NaiveTime::from_hms_opt(8, 30, 0).unwrap());
    }

    #[test]
    fn new_slice_closes_open_one_the_day_before() {
        let open = slice(4, date(2026, 1, 1), None);
        assert_eq!(
            plan_schedule_change(Some(&open), date(2026, 3, 1)).unwrap(),
            PriorSchedule::Close {
                id: 4,
                effective_to: date(2026, 2, 28)
            }
        );
    }

    #[test]
    fn same_day_slice_supersedes() {
        let open = slice(4, date(2026, 3, 1), None);
        assert_eq!(
            plan_schedule_change(Some(&open), date(2026, 3, 1)).unwrap(),
            PriorSchedule::Supersede { id: 4 }
        );
    }

    #[test]
    fn backdating_before_open_slice_is_rejected() {
        let open = slice(4, date(2026, 3, 1), None);
        assert!(plan_schedule_change(Some(&open), date(2026, 2, 1)).is_err());
        assert_eq!(
            plan_schedule_change(None, date(2026, 2, 1)).unwrap(),
            PriorSchedule::Untouched
        );
    }

    #[test]
    fn empty_input_detected() {
        assert!(ScheduleInput::default().is_empty());
        let input = ScheduleInput {
            overtime_enabled: Some(false),
            ..Default::default()
        };
        assert!(!input.is_empty());
    }
}
