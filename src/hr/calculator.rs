use chrono::NaiveDateTime;

use crate::model::attendance::AttendanceStatus;
use crate::model::schedule::WorkSchedule;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttendanceMetrics {
    pub total_minutes: u32,
    pub late_minutes: u32,
    pub early_leave_minutes: u32,
    pub overtime_minutes: u32,
    pub status: AttendanceStatus,
}

/// Whole minutes from `from` to `to`, truncated, never negative.
fn minutes_between(from: NaiveDateTime, to: NaiveDateTime) -> u32 {
    (to - from).num_minutes().max(0) as u32
}

/// Derives the day's metrics. `None` until check-in, check-out and a
/// schedule are all known.
///
/// Scheduled start and end are taken on the calendar date of check-in.
/// Grace only shields lateness; early leave and overtime use the raw end.
pub fn compute(
    check_in: Option<NaiveDateTime>,
    check_out: Option<NaiveDateTime>,
    schedule: Option<&WorkSchedule>,
) -> Option<AttendanceMetrics> {
    let (check_in, check_out, schedule) = (check_in?, check_out?, schedule?);

    let day = check_in.date();
    let scheduled_start = day.and_time(schedule.start_time);
    let scheduled_end = day.and_time(schedule.end_time);

    let total_minutes = minutes_between(check_in, check_out);
    let late_minutes =
        minutes_between(scheduled_start, check_in).saturating_sub(schedule.grace_minutes);
    let early_leave_minutes = minutes_between(check_out, scheduled_end);
    let overtime_minutes = if schedule.overtime_enabled {
        minutes_between(scheduled_end, check_out)
    } else {
        0
    };

    let status = if late_minutes > 0 {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Normal
    };

    Some(AttendanceMetrics {
        total_minutes,
        late_minutes,
        early_leave_minutes,
        overtime_minutes,
        status,
    })
}

/// Metrics for a check-out with no schedule in effect: worked time only.
pub fn unscheduled(check_in: NaiveDateTime, check_out: NaiveDateTime) -> AttendanceMetrics {
    AttendanceMetrics {
        total_minutes: minutes_between(check_in, check_out),
        late_minutes: 0,
        early_leave_minutes: 0,
        overtime_minutes: 0,
        status: AttendanceStatus::Normal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use sqlx::types::Json;

    fn schedule(grace: u32, overtime: bool) -> WorkSchedule {
        WorkSchedule {
            id: 1,
            client_id: 1,
            employee_id: 1,
            work_days: Json(vec![1, 2, 3, 4, 5]),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            grace_minutes: grace,
            overtime_enabled: overtime,
            effective_from: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            effective_to: None,
        }
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn missing_inputs_are_not_computable() {
        let s = schedule(10, true);
        assert!(compute(None, Some(at(17, 0, 0)), Some(&s)).is_none());
        assert!(compute(Some(at(9, 0, 0)), None, Some(&s)).is_none());
        assert!(compute(Some(at(9, 0, 0)), Some(at(17, 0, 0)), None).is_none());
    }

    #[test]
    fn grace_shields_small_lateness() {
        let s = schedule(10, true);
        let m = compute(Some(at(9, 7, 0)), Some(at(17, 0, 0)), Some(&s)).unwrap();
        assert_eq!(m.late_minutes, 0);
        assert_eq!(m.status, AttendanceStatus::Normal);

        let m = compute(Some(at(9, 25, 0)), Some(at(17, 0, 0)), Some(&s)).unwrap();
        assert_eq!(m.late_minutes, 15);
        assert_eq!(m.status, AttendanceStatus::Late);
    }

    #[test]
    fn overtime_respects_flag() {
        let m = compute(Some(at(9, 0, 0)), Some(at(17, 45, 0)), Some(&schedule(10, true))).unwrap();
        assert_eq!(m.overtime_minutes, 45);

        let m = compute(Some(at(9, 0, 0)), Some(at(17, 45, 0)), Some(&schedule(10, false))).unwrap();
        assert_eq!(m.overtime_minutes, 0);
    }

    #[test]
    fn early_leave_ignores_grace() {
        let m = compute(Some(at(9, 0, 0)), Some(at(16, 55, 0)), Some(&schedule(10, true))).unwrap();
        assert_eq!(m.early_leave_minutes, 5);
        assert_eq!(m.overtime_minutes, 0);
    }

    #[test]
    fn check_out_before_check_in_is_zero() {
        let m = compute(Some(at(12, 0, 0)), Some(at(11, 0, 0)), Some(&schedule(10, true))).unwrap();
        assert_eq!(m.total_minutes, 0);
    }

    #[test]
    fn fractional_minutes_truncate() {
        let m = compute(Some(at(9, 0, 0)), Some(at(9, 1, 59)), Some(&schedule(10, true))).unwrap();
        assert_eq!(m.total_minutes, 1);
    }

    #[test]
    fn full_day_scenario() {
        let m = compute(Some(at(9, 5, 0)), Some(at(17, 30, 0)), Some(&schedule(10, true))).unwrap();
        assert_eq!(
            m,
            AttendanceMetrics {
                total_minutes: 505,
                late_minutes: 0,
                early_leave_minutes: 0,
                overtime_minutes: 30,
                status: AttendanceStatus::Normal,
            }
        );
    }

    #[test]
    fn unscheduled_day_counts_only_worked_time() {
        let m = unscheduled(at(10, 0, 0), at(12, 30, 0));
        assert_eq!(m.total_minutes, 150);
        assert_eq!(m.late_minutes + m.overtime_minutes + m.early_leave_minutes, 0);
        assert_eq!(m.status, AttendanceStatus::Normal);
    }
}
