use chrono::NaiveDateTime;
use tracing::info;

use crate::hr::calculator::{self, AttendanceMetrics};
use crate::hr::error::HrError;
use crate::hr::geofence::{self, GeoPoint};
use crate::hr::schedule::resolve_for_date;
use crate::hr::store::{AttendanceStore, CheckOut, NewCheckIn};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::tenant::TenantId;

/// Where an employee's day stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Absent,
    CheckedIn,
    CheckedOut,
}

impl SessionState {
    pub fn of(record: Option<&AttendanceRecord>) -> Self {
        match record {
            None => SessionState::Absent,
            Some(r) if r.check_out.is_some() => SessionState::CheckedOut,
            Some(r) if r.check_in.is_some() => SessionState::CheckedIn,
            Some(_) => SessionState::Absent,
        }
    }

    pub fn can_check_in(self) -> Result<(), HrError> {
        match self {
            SessionState::Absent => Ok(()),
            _ => Err(HrError::AlreadyCheckedIn),
        }
    }

    pub fn can_check_out(self) -> Result<(), HrError> {
        match self {
            SessionState::CheckedIn => Ok(()),
            SessionState::Absent => Err(HrError::NotCheckedIn),
            SessionState::CheckedOut => Err(HrError::AlreadyCheckedOut),
        }
    }
}

/// Body of a check-in or check-out request.
#[derive(Debug, Clone, Default)]
pub struct Punch {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub device_info: Option<String>,
}

impl Punch {
    fn point(&self) -> Result<GeoPoint, HrError> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Ok(GeoPoint {
                latitude,
                longitude,
            }),
            _ => Err(HrError::GpsRequired),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckedIn {
    pub at: NaiveDateTime,
    pub clinic_name: String,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckedOut {
    pub at: NaiveDateTime,
    pub metrics: AttendanceMetrics,
}

/// Drives the per-day check-in/check-out transitions for one tenant.
pub struct AttendanceSession<'a, S: AttendanceStore + ?Sized> {
    store: &'a S,
    tenant: TenantId,
}

impl<'a, S: AttendanceStore + ?Sized> AttendanceSession<'a, S> {
    pub fn new(store: &'a S, tenant: TenantId) -> Self {
        Self { store, tenant }
    }

    /// `absent -> checked-in`. The work date is the calendar date of `now`.
    pub async fn check_in(
        &self,
        employee_id: u64,
        punch: &Punch,
        now: NaiveDateTime,
    ) -> Result<CheckedIn, HrError> {
        let today = now.date();

        let existing = self
            .store
            .attendance_for_date(self.tenant, employee_id, today)
            .await?;
        SessionState::of(existing.as_ref()).can_check_in()?;

        let point = punch.point()?;
        let clinics = self.store.clinic_locations(self.tenant).await?;
        let hit = geofence::evaluate(point, &clinics)?;

        if self.store.credential_count(self.tenant, employee_id).await? == 0 {
            return Err(HrError::NoBiometric);
        }

        let schedules = self
            .store
            .schedules_for_employee(self.tenant, employee_id)
            .await?;
        let status = match resolve_for_date(&schedules, today) {
            Some(s) if !s.is_work_day(today) => AttendanceStatus::Weekend,
            _ => AttendanceStatus::Incomplete,
        };

        self.store
            .insert_check_in(
                self.tenant,
                &NewCheckIn {
                    employee_id,
                    work_date: today,
                    at: now,
                    latitude: point.latitude,
                    longitude: point.longitude,
                    device_info: punch.device_info.clone(),
                    status,
                },
            )
            .await?;

        info!(
            employee_id,
            clinic_id = hit.clinic.clinic_id,
            distance = hit.distance,
            %status,
            "Checked in"
        );

        Ok(CheckedIn {
            at: now,
            clinic_name: hit.clinic.name.clone(),
            status,
        })
    }

    /// `checked-in -> checked-out`. Metrics use the schedule effective on
    /// the record's work date.
    pub async fn check_out(
        &self,
        employee_id: u64,
        punch: &Punch,
        now: NaiveDateTime,
    ) -> Result<CheckedOut, HrError> {
        let record = self
            .store
            .attendance_for_date(self.tenant, employee_id, now.date())
            .await?;
        SessionState::of(record.as_ref()).can_check_out()?;

        let (record, check_in) = match record {
            Some(r) => match r.check_in {
                Some(at) => (r, at),
                None => return Err(HrError::NotCheckedIn),
            },
            None => return Err(HrError::NotCheckedIn),
        };

        let point = punch.point()?;
        let clinics = self.store.clinic_locations(self.tenant).await?;
        geofence::evaluate(point, &clinics)?;

        let schedules = self
            .store
            .schedules_for_employee(self.tenant, employee_id)
            .await?;
        let schedule = resolve_for_date(&schedules, record.work_date);

        let metrics = calculator::compute(Some(check_in), Some(now), schedule)
            .unwrap_or_else(|| calculator::unscheduled(check_in, now));

        self.store
            .record_check_out(
                self.tenant,
                &CheckOut {
                    record_id: record.id,
                    at: now,
                    latitude: point.latitude,
                    longitude: point.longitude,
                    metrics,
                },
            )
            .await?;

        info!(
            employee_id,
            total = metrics.total_minutes,
            late = metrics.late_minutes,
            overtime = metrics.overtime_minutes,
            status = %metrics.status,
            "Checked out"
        );

        Ok(CheckedOut { at: now, metrics })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hr::memory::MemoryStore;
    use crate::model::clinic::ClinicLocation;
    use crate::model::schedule::WorkSchedule;
    use chrono::{NaiveDate, NaiveTime};
    use sqlx::types::Json;

    const TENANT: TenantId = TenantId::new(1);
    const EMPLOYEE: u64 = 7;
    const LAT: f64 = 31.95;
    const LNG: f64 = 35.91;

    fn clinic() -> ClinicLocation {
        ClinicLocation {
            clinic_id: 1,
            name: "Main Clinic".into(),
            latitude: LAT,
            longitude: LNG,
            allowed_radius_meters: 100,
        }
    }

    fn office_hours() -> WorkSchedule {
        WorkSchedule {
            id: 1,
            client_id: TENANT.get(),
            employee_id: EMPLOYEE,
            work_days: Json(vec![1, 2, 3, 4, 5]),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            grace_minutes: 10,
            overtime_enabled: true,
            effective_from: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            effective_to: None,
        }
    }

    fn store() -> MemoryStore {
        MemoryStore::default()
            .with_clinic(TENANT, clinic())
            .with_schedule(office_hours())
            .with_credential(TENANT, EMPLOYEE)
    }

    fn at_centre() -> Punch {
        Punch {
            latitude: Some(LAT),
            longitude: Some(LNG),
            device_info: Some("Pixel 8".into()),
        }
    }

    fn far_away() -> Punch {
        Punch {
            latitude: Some(LAT + 0.01),
            longitude: Some(LNG),
            device_info: None,
        }
    }

    /// 2026-03-02 is a Monday.
    fn monday(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn state_guards() {
        assert!(SessionState::Absent.can_check_in().is_ok());
        assert!(matches!(
            SessionState::CheckedIn.can_check_in(),
            Err(HrError::AlreadyCheckedIn)
        ));
        assert!(matches!(
            SessionState::Absent.can_check_out(),
            Err(HrError::NotCheckedIn)
        ));
        assert!(matches!(
            SessionState::CheckedOut.can_check_out(),
            Err(HrError::AlreadyCheckedOut)
        ));
    }

    #[actix_web::test]
    async fn full_day() {
        let store = store();
        let session = AttendanceSession::new(&store, TENANT);

        let checked_in = session
            .check_in(EMPLOYEE, &at_centre(), monday(9, 5))
            .await
            .unwrap();
        assert_eq!(checked_in.status, AttendanceStatus::Incomplete);
        assert_eq!(checked_in.clinic_name, "Main Clinic");

        let checked_out = session
            .check_out(EMPLOYEE, &at_centre(), monday(17, 30))
            .await
            .unwrap();
        assert_eq!(checked_out.metrics.total_minutes, 505);
        assert_eq!(checked_out.metrics.late_minutes, 0);
        assert_eq!(checked_out.metrics.overtime_minutes, 30);
        assert_eq!(checked_out.metrics.status, AttendanceStatus::Normal);

        let row = store.attendance.lock().unwrap()[0].clone();
        assert_eq!(row.status, AttendanceStatus::Normal);
        assert_eq!(row.total_minutes, 505);
        assert_eq!(row.device_info.as_deref(), Some("Pixel 8"));
    }

    #[actix_web::test]
    async fn transitions_are_guarded() {
        let store = store();
        let session = AttendanceSession::new(&store, TENANT);

        assert!(matches!(
            session.check_out(EMPLOYEE, &at_centre(), monday(8, 0)).await,
            Err(HrError::NotCheckedIn)
        ));

        session
            .check_in(EMPLOYEE, &at_centre(), monday(9, 0))
            .await
            .unwrap();
        assert!(matches!(
            session.check_in(EMPLOYEE, &at_centre(), monday(9, 1)).await,
            Err(HrError::AlreadyCheckedIn)
        ));

        session
            .check_out(EMPLOYEE, &at_centre(), monday(17, 0))
            .await
            .unwrap();
        assert!(matches!(
            session.check_out(EMPLOYEE, &at_centre(), monday(17, 5)).await,
            Err(HrError::AlreadyCheckedOut)
        ));
    }

    #[actix_web::test]
    async fn check_out_without_check_in_ignores_location() {
        let store = store();
        let session = AttendanceSession::new(&store, TENANT);

        assert!(matches!(
            session.check_out(EMPLOYEE, &far_away(), monday(17, 0)).await,
            Err(HrError::NotCheckedIn)
        ));
    }

    #[actix_web::test]
    async fn outside_fence_is_rejected() {
        let store = store();
        let session = AttendanceSession::new(&store, TENANT);

        assert!(matches!(
            session.check_in(EMPLOYEE, &far_away(), monday(9, 0)).await,
            Err(HrError::OutsideRange { limit: 100, .. })
        ));
        assert!(store.attendance.lock().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn missing_coordinates() {
        let store = store();
        let session = AttendanceSession::new(&store, TENANT);

        assert!(matches!(
            session.check_in(EMPLOYEE, &Punch::default(), monday(9, 0)).await,
            Err(HrError::GpsRequired)
        ));
    }

    #[actix_web::test]
    async fn biometric_registration_required() {
        let store = MemoryStore::default()
            .with_clinic(TENANT, clinic())
            .with_schedule(office_hours());
        let session = AttendanceSession::new(&store, TENANT);

        assert!(matches!(
            session.check_in(EMPLOYEE, &at_centre(), monday(9, 0)).await,
            Err(HrError::NoBiometric)
        ));
    }

    #[actix_web::test]
    async fn tenant_without_locations() {
        let store = MemoryStore::default().with_credential(TENANT, EMPLOYEE);
        let session = AttendanceSession::new(&store, TENANT);

        assert!(matches!(
            session.check_in(EMPLOYEE, &at_centre(), monday(9, 0)).await,
            Err(HrError::NoClinicLocation)
        ));
    }

    #[actix_web::test]
    async fn saturday_check_in_is_weekend() {
        let store = store();
        let session = AttendanceSession::new(&store, TENANT);
        let saturday = NaiveDate::from_ymd_opt(2026, 3, 7)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();

        let checked_in = session
            .check_in(EMPLOYEE, &at_centre(), saturday)
            .await
            .unwrap();
        assert_eq!(checked_in.status, AttendanceStatus::Weekend);
    }

    #[actix_web::test]
    async fn late_arrival_marks_late() {
        let store = store();
        let session = AttendanceSession::new(&store, TENANT);

        session
            .check_in(EMPLOYEE, &at_centre(), monday(9, 25))
            .await
            .unwrap();
        let out = session
            .check_out(EMPLOYEE, &at_centre(), monday(17, 0))
            .await
            .unwrap();
        assert_eq!(out.metrics.late_minutes, 15);
        assert_eq!(out.metrics.status, AttendanceStatus::Late);
    }

    #[actix_web::test]
    async fn no_schedule_records_worked_time_only() {
        let store = MemoryStore::default()
            .with_clinic(TENANT, clinic())
            .with_credential(TENANT, EMPLOYEE);
        let session = AttendanceSession::new(&store, TENANT);

        let checked_in = session
            .check_in(EMPLOYEE, &at_centre(), monday(9, 0))
            .await
            .unwrap();
        assert_eq!(checked_in.status, AttendanceStatus::Incomplete);

        let out = session
            .check_out(EMPLOYEE, &at_centre(), monday(12, 0))
            .await
            .unwrap();
        assert_eq!(out.metrics.total_minutes, 180);
        assert_eq!(out.metrics.status, AttendanceStatus::Normal);
    }

    #[actix_web::test]
    async fn other_tenants_clinics_do_not_count() {
        let store = MemoryStore::default()
            .with_clinic(TenantId::new(2), clinic())
            .with_credential(TENANT, EMPLOYEE);
        let session = AttendanceSession::new(&store, TENANT);

        assert!(matches!(
            session.check_in(EMPLOYEE, &at_centre(), monday(9, 0)).await,
            Err(HrError::NoClinicLocation)
        ));
    }

    /// Serves a fixed view of the day's record, as a request that read it
    /// before a concurrent punch committed would see it.
    struct StaleReads {
        inner: MemoryStore,
        seen: Option<AttendanceRecord>,
    }

    #[async_trait::async_trait]
    impl AttendanceStore for StaleReads {
        async fn clinic_locations(&self, tenant: TenantId) -> Result<Vec<ClinicLocation>, HrError> {
            self.inner.clinic_locations(tenant).await
        }

        async fn schedules_for_employee(
            &self,
            tenant: TenantId,
            employee_id: u64,
        ) -> Result<Vec<WorkSchedule>, HrError> {
            self.inner.schedules_for_employee(tenant, employee_id).await
        }

        async fn credential_count(&self, tenant: TenantId, employee_id: u64) -> Result<u64, HrError> {
            self.inner.credential_count(tenant, employee_id).await
        }

        async fn attendance_for_date(
            &self,
            _tenant: TenantId,
            _employee_id: u64,
            _work_date: chrono::NaiveDate,
        ) -> Result<Option<AttendanceRecord>, HrError> {
            Ok(self.seen.clone())
        }

        async fn insert_check_in(&self, tenant: TenantId, check_in: &NewCheckIn) -> Result<(), HrError> {
            self.inner.insert_check_in(tenant, check_in).await
        }

        async fn record_check_out(&self, tenant: TenantId, check_out: &CheckOut) -> Result<(), HrError> {
            self.inner.record_check_out(tenant, check_out).await
        }
    }

    #[actix_web::test]
    async fn concurrent_check_in_loses_at_insert() {
        let store = store();
        AttendanceSession::new(&store, TENANT)
            .check_in(EMPLOYEE, &at_centre(), monday(9, 0))
            .await
            .unwrap();

        let racing = StaleReads { inner: store, seen: None };
        let result = AttendanceSession::new(&racing, TENANT)
            .check_in(EMPLOYEE, &at_centre(), monday(9, 1))
            .await;
        assert!(matches!(result, Err(HrError::AlreadyCheckedIn)));
        assert_eq!(racing.inner.attendance.lock().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn concurrent_check_out_loses_at_update() {
        let store = store();
        AttendanceSession::new(&store, TENANT)
            .check_in(EMPLOYEE, &at_centre(), monday(9, 0))
            .await
            .unwrap();
        let open = store.attendance.lock().unwrap()[0].clone();

        let racing = StaleReads { inner: store, seen: Some(open) };
        let session = AttendanceSession::new(&racing, TENANT);
        session
            .check_out(EMPLOYEE, &at_centre(), monday(17, 0))
            .await
            .unwrap();

        let second = session.check_out(EMPLOYEE, &at_centre(), monday(18, 0)).await;
        assert!(matches!(second, Err(HrError::AlreadyCheckedOut)));

        let row = racing.inner.attendance.lock().unwrap()[0].clone();
        assert_eq!(row.check_out, Some(monday(17, 0)));
        assert_eq!(row.total_minutes, 480);
    }
}
