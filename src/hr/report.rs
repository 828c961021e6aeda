use chrono::{Months, NaiveDate};
use serde::Serialize;
use utoipa::ToSchema;

use crate::hr::error::HrError;
use crate::model::attendance::{AttendanceDay, AttendanceRecord};

/// First and last day of a `YYYY-MM` month.
pub fn month_bounds(month: &str) -> Result<(NaiveDate, NaiveDate), HrError> {
    let invalid = || HrError::Invalid("month (YYYY-MM) required".to_string());

    let (year, mon) = month.trim().split_once('-').ok_or_else(invalid)?;
    if year.len() != 4 || mon.len() != 2 {
        return Err(invalid());
    }
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let mon: u32 = mon.parse().map_err(|_| invalid())?;

    let first = NaiveDate::from_ymd_opt(year, mon, 1).ok_or_else(invalid)?;
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|d| d.pred_opt())
        .ok_or_else(invalid)?;

    Ok((first, last))
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySummary {
    pub days_present: u32,
    pub total_work_minutes: u64,
    pub total_late_minutes: u64,
    pub total_overtime_minutes: u64,
    pub total_early_leave_minutes: u64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "month": "2026-03",
    "employeeId": 7,
    "summary": {
        "daysPresent": 1,
        "totalWorkMinutes": 505,
        "totalLateMinutes": 0,
        "totalOvertimeMinutes": 30,
        "totalEarlyLeaveMinutes": 0
    },
    "days": [{
        "workDate": "2026-03-02",
        "checkIn": "2026-03-02T09:05:00",
        "checkOut": "2026-03-02T17:30:00",
        "totalMinutes": 505,
        "lateMinutes": 0,
        "earlyLeaveMinutes": 0,
        "overtimeMinutes": 30,
        "status": "normal"
    }]
}))]
pub struct MonthlyReport {
    pub month: String,
    pub employee_id: u64,
    pub summary: MonthlySummary,
    pub days: Vec<AttendanceDay>,
}

/// Days with a check-in count as present; minute totals sum every row.
pub fn summarize(records: &[AttendanceRecord]) -> MonthlySummary {
    records
        .iter()
        .fold(MonthlySummary::default(), |mut acc, r| {
            if r.check_in.is_some() {
                acc.days_present += 1;
            }
            acc.total_work_minutes += u64::from(r.total_minutes);
            acc.total_late_minutes += u64::from(r.late_minutes);
            acc.total_overtime_minutes += u64::from(r.overtime_minutes);
            acc.total_early_leave_minutes += u64::from(r.early_leave_minutes);
            acc
        })
}

pub fn monthly_report(month: &str, employee_id: u64, records: &[AttendanceRecord]) -> MonthlyReport {
    MonthlyReport {
        month: month.trim().to_string(),
        employee_id,
        summary: summarize(records),
        days: records.iter().map(AttendanceDay::from).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::AttendanceStatus;
    use chrono::Datelike;

    fn record(day: u32, total: u32, late: u32, checked_in: bool) -> AttendanceRecord {
        let date = NaiveDate::from_ymd_opt(2026, 3, day).unwrap();
        AttendanceRecord {
            id: u64::from(day),
            client_id: 1,
            employee_id: 7,
            work_date: date,
            check_in: checked_in.then(|| date.and_hms_opt(9, 0, 0).unwrap()),
            check_in_lat: None,
            check_in_lng: None,
            device_info: None,
            check_out: None,
            check_out_lat: None,
            check_out_lng: None,
            total_minutes: total,
            late_minutes: late,
            early_leave_minutes: 0,
            overtime_minutes: 5,
            status: AttendanceStatus::Normal,
        }
    }

    #[test]
    fn month_bounds_cover_whole_month() {
        let (first, last) = month_bounds("2026-02").unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2026, 2, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2026, 2, 28).unwrap());

        let (_, last) = month_bounds("2028-02").unwrap();
        assert_eq!(last.day(), 29);

        let (_, last) = month_bounds("2026-12").unwrap();
        assert_eq!(last, NaiveDate::from_ymd_opt(2026, 12, 31).unwrap());
    }

    #[test]
    fn malformed_months_are_rejected() {
        for bad in ["", "2026", "2026-13", "2026-1", "26-01", "abcd-ef"] {
            assert!(month_bounds(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn summary_counts_checked_in_days() {
        let records = [record(2, 480, 0, true), record(3, 450, 15, true), record(4, 0, 0, false)];
        let summary = summarize(&records);
        assert_eq!(
            summary,
            MonthlySummary {
                days_present: 2,
                total_work_minutes: 930,
                total_late_minutes: 15,
                total_overtime_minutes: 15,
                total_early_leave_minutes: 0,
            }
        );
    }

    #[test]
    fn report_serializes_camel_case() {
        let report = monthly_report("2026-03", 7, &[record(2, 480, 0, true)]);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["employeeId"], 7);
        assert_eq!(value["summary"]["daysPresent"], 1);
        assert_eq!(value["days"][0]["workDate"], "2026-03-02");
        assert_eq!(value["days"][0]["status"], "normal");
    }
}
