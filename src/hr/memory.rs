//! In-memory stand-in for the HR tables, used by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::types::Json;

use crate::hr::error::HrError;
use crate::hr::store::{
    AttendanceStore, ChallengeStore, CheckOut, CredentialStore, NewCheckIn, NewCredential,
};
use crate::model::attendance::AttendanceRecord;
use crate::model::challenge::{ChallengePurpose, StoredChallenge};
use crate::model::clinic::ClinicLocation;
use crate::model::credential::BiometricCredential;
use crate::model::schedule::WorkSchedule;
use crate::model::tenant::TenantId;

#[derive(Default)]
pub struct MemoryStore {
    pub clinics: Mutex<Vec<(TenantId, ClinicLocation)>>,
    pub schedules: Mutex<Vec<WorkSchedule>>,
    pub attendance: Mutex<Vec<AttendanceRecord>>,
    pub credentials: Mutex<Vec<BiometricCredential>>,
    pub challenges: Mutex<HashMap<(u64, ChallengePurpose), StoredChallenge>>,
}

impl MemoryStore {
    pub fn with_clinic(self, tenant: TenantId, clinic: ClinicLocation) -> Self {
        self.clinics.lock().unwrap().push((tenant, clinic));
        self
    }

    pub fn with_schedule(self, schedule: WorkSchedule) -> Self {
        self.schedules.lock().unwrap().push(schedule);
        self
    }

    pub fn with_credential(self, tenant: TenantId, employee_id: u64) -> Self {
        let mut creds = self.credentials.lock().unwrap();
        let id = creds.len() as u64 + 1;
        creds.push(BiometricCredential {
            id,
            client_id: tenant.get(),
            employee_id,
            credential_id: format!("cred-{id}"),
            public_key: "{}".into(),
            counter: 0,
            transports: Json(vec!["internal".into()]),
            device_name: "Test device".into(),
        });
        drop(creds);
        self
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn clinic_locations(&self, tenant: TenantId) -> Result<Vec<ClinicLocation>, HrError> {
        Ok(self
            .clinics
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| *t == tenant)
            .map(|(_, c)| c.clone())
            .collect())
    }

    async fn schedules_for_employee(
        &self,
        tenant: TenantId,
        employee_id: u64,
    ) -> Result<Vec<WorkSchedule>, HrError> {
        Ok(self
            .schedules
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.client_id == tenant.get() && s.employee_id == employee_id)
            .cloned()
            .collect())
    }

    async fn credential_count(&self, tenant: TenantId, employee_id: u64) -> Result<u64, HrError> {
        Ok(self
            .credentials
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.client_id == tenant.get() && c.employee_id == employee_id)
            .count() as u64)
    }

    async fn attendance_for_date(
        &self,
        tenant: TenantId,
        employee_id: u64,
        work_date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, HrError> {
        Ok(self
            .attendance
            .lock()
            .unwrap()
            .iter()
            .find(|r| {
                r.client_id == tenant.get()
                    && r.employee_id == employee_id
                    && r.work_date == work_date
            })
            .cloned())
    }

    async fn insert_check_in(
        &self,
        tenant: TenantId,
        check_in: &NewCheckIn,
    ) -> Result<(), HrError> {
        let mut rows = self.attendance.lock().unwrap();
        if rows
            .iter()
            .any(|r| r.employee_id == check_in.employee_id && r.work_date == check_in.work_date)
        {
            return Err(HrError::AlreadyCheckedIn);
        }

        let id = rows.len() as u64 + 1;
        rows.push(AttendanceRecord {
            id,
            client_id: tenant.get(),
            employee_id: check_in.employee_id,
            work_date: check_in.work_date,
            check_in: Some(check_in.at),
            check_in_lat: Some(check_in.latitude),
            check_in_lng: Some(check_in.longitude),
            device_info: check_in.device_info.clone(),
            check_out: None,
            check_out_lat: None,
            check_out_lng: None,
            total_minutes: 0,
            late_minutes: 0,
            early_leave_minutes: 0,
            overtime_minutes: 0,
            status: check_in.status,
        });
        Ok(())
    }

    async fn record_check_out(
        &self,
        tenant: TenantId,
        check_out: &CheckOut,
    ) -> Result<(), HrError> {
        let mut rows = self.attendance.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|r| {
                r.id == check_out.record_id && r.client_id == tenant.get() && r.check_out.is_none()
            })
            .ok_or(HrError::AlreadyCheckedOut)?;

        let m = check_out.metrics;
        row.check_out = Some(check_out.at);
        row.check_out_lat = Some(check_out.latitude);
        row.check_out_lng = Some(check_out.longitude);
        row.total_minutes = m.total_minutes;
        row.late_minutes = m.late_minutes;
        row.early_leave_minutes = m.early_leave_minutes;
        row.overtime_minutes = m.overtime_minutes;
        row.status = m.status;
        Ok(())
    }
}

#[async_trait]
impl ChallengeStore for MemoryStore {
    async fn issue(&self, challenge: &StoredChallenge) -> Result<(), HrError> {
        self.challenges.lock().unwrap().insert(
            (challenge.employee_id, challenge.purpose),
            challenge.clone(),
        );
        Ok(())
    }

    async fn live(
        &self,
        employee_id: u64,
        purpose: ChallengePurpose,
        now: NaiveDateTime,
    ) -> Result<Option<StoredChallenge>, HrError> {
        let mut map = self.challenges.lock().unwrap();
        if map
            .get(&(employee_id, purpose))
            .is_some_and(|c| !c.is_live(now))
        {
            map.remove(&(employee_id, purpose));
        }
        Ok(map.get(&(employee_id, purpose)).cloned())
    }

    async fn discard(
        &self,
        employee_id: u64,
        purpose: ChallengePurpose,
        challenge: &str,
    ) -> Result<bool, HrError> {
        let mut map = self.challenges.lock().unwrap();
        match map.get(&(employee_id, purpose)) {
            Some(c) if c.challenge == challenge => {
                map.remove(&(employee_id, purpose));
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn credentials(
        &self,
        tenant: TenantId,
        employee_id: u64,
    ) -> Result<Vec<BiometricCredential>, HrError> {
        Ok(self
            .credentials
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.client_id == tenant.get() && c.employee_id == employee_id)
            .cloned()
            .collect())
    }

    async fn insert_credential(
        &self,
        tenant: TenantId,
        credential: &NewCredential,
    ) -> Result<(), HrError> {
        let mut creds = self.credentials.lock().unwrap();
        let id = creds.len() as u64 + 1;
        creds.push(BiometricCredential {
            id,
            client_id: tenant.get(),
            employee_id: credential.employee_id,
            credential_id: credential.credential_id.clone(),
            public_key: credential.passkey.clone(),
            counter: credential.counter,
            transports: Json(credential.transports.clone()),
            device_name: credential.device_name.clone(),
        });
        Ok(())
    }

    async fn advance_counter(
        &self,
        credential_row_id: u64,
        counter: u32,
        passkey: &str,
    ) -> Result<bool, HrError> {
        let mut creds = self.credentials.lock().unwrap();
        match creds
            .iter_mut()
            .find(|c| c.id == credential_row_id && c.counter <= counter)
        {
            Some(c) => {
                c.counter = counter;
                c.public_key = passkey.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hr::calculator::AttendanceMetrics;
    use crate::model::attendance::AttendanceStatus;

    const TENANT: TenantId = TenantId::new(1);

    fn nine_am() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn check_in() -> NewCheckIn {
        NewCheckIn {
            employee_id: 7,
            work_date: nine_am().date(),
            at: nine_am(),
            latitude: 31.95,
            longitude: 35.91,
            device_info: None,
            status: AttendanceStatus::Incomplete,
        }
    }

    fn check_out(record_id: u64) -> CheckOut {
        CheckOut {
            record_id,
            at: nine_am() + chrono::Duration::hours(8),
            latitude: 31.95,
            longitude: 35.91,
            metrics: AttendanceMetrics {
                total_minutes: 480,
                late_minutes: 0,
                early_leave_minutes: 0,
                overtime_minutes: 0,
                status: AttendanceStatus::Normal,
            },
        }
    }

    #[actix_web::test]
    async fn second_insert_for_the_day_is_already_checked_in() {
        let store = MemoryStore::default();
        store.insert_check_in(TENANT, &check_in()).await.unwrap();

        let again = store.insert_check_in(TENANT, &check_in()).await;
        assert!(matches!(again, Err(HrError::AlreadyCheckedIn)));
        assert_eq!(store.attendance.lock().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn closed_record_is_already_checked_out() {
        let store = MemoryStore::default();
        store.insert_check_in(TENANT, &check_in()).await.unwrap();
        let id = store.attendance.lock().unwrap()[0].id;

        store.record_check_out(TENANT, &check_out(id)).await.unwrap();
        let again = store.record_check_out(TENANT, &check_out(id)).await;
        assert!(matches!(again, Err(HrError::AlreadyCheckedOut)));
    }

    #[actix_web::test]
    async fn counter_only_advances() {
        let store = MemoryStore::default().with_credential(TENANT, 7);
        let id = store.credentials.lock().unwrap()[0].id;

        assert!(store.advance_counter(id, 5, "five").await.unwrap());
        assert_eq!(store.credentials.lock().unwrap()[0].counter, 5);

        assert!(!store.advance_counter(id, 3, "three").await.unwrap());
        let cred = store.credentials.lock().unwrap()[0].clone();
        assert_eq!(cred.counter, 5);
        assert_eq!(cred.public_key, "five");
    }
}

