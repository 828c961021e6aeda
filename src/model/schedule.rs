use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use utoipa::ToSchema;

pub const DEFAULT_WORK_DAYS: [u8; 5] = [1, 2, 3, 4, 5];
pub const DEFAULT_GRACE_MINUTES: u32 = 10;

/// One time slice of an employee's working pattern.
///
/// `effective_to = None` marks the open (current) slice; an employee has at
/// most one of those and slices never overlap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct WorkSchedule {
    pub id: u64,
    pub client_id: u64,
    pub employee_id: u64,
    /// ISO weekdays, 1 = Monday .. 7 = Sunday.
    pub work_days: Json<Vec<u8>>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub grace_minutes: u32,
    pub overtime_enabled: bool,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
}

impl WorkSchedule {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.effective_from <= date && self.effective_to.is_none_or(|to| to >= date)
    }

    pub fn is_work_day(&self, date: NaiveDate) -> bool {
        self.work_days.contains(&iso_weekday(date))
    }
}

/// 1 = Monday .. 7 = Sunday.
pub fn iso_weekday(date: NaiveDate) -> u8 {
    date.weekday().number_from_monday() as u8
}

/// Clients that count Sunday as day 0 send it that way; stored sets use 7.
pub fn normalize_weekday(day: u8) -> u8 {
    if day == 0 { 7 } else { day }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleView {
    pub work_days: Vec<u8>,
    #[schema(example = "09:00", value_type = String)]
    pub start_time: String,
    #[schema(example = "17:00", value_type = String)]
    pub end_time: String,
    pub grace_minutes: u32,
    pub overtime_enabled: bool,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub effective_from: NaiveDate,
    #[schema(example = "2026-06-30", format = "date", value_type = String, nullable = true)]
    pub effective_to: Option<NaiveDate>,
}

impl From<&WorkSchedule> for ScheduleView {
    fn from(s: &WorkSchedule) -> Self {
        Self {
            work_days: s.work_days.0.clone(),
            start_time: s.start_time.format("%H:%M").to_string(),
            end_time: s.end_time.format("%H:%M").to_string(),
            grace_minutes: s.grace_minutes,
            overtime_enabled: s.overtime_enabled,
            effective_from: s.effective_from,
            effective_to: s.effective_to,
        }
    }
}
