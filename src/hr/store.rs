use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::MySqlPool;
use sqlx::types::Json;

use crate::hr::calculator::AttendanceMetrics;
use crate::hr::error::HrError;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::challenge::{ChallengePurpose, StoredChallenge};
use crate::model::clinic::ClinicLocation;
use crate::model::credential::BiometricCredential;
use crate::model::schedule::WorkSchedule;
use crate::model::tenant::TenantId;
use crate::utils::db_utils::is_duplicate_key;

/// First check-in of the day.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCheckIn {
    pub employee_id: u64,
    pub work_date: NaiveDate,
    pub at: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
    pub device_info: Option<String>,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckOut {
    pub record_id: u64,
    pub at: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
    pub metrics: AttendanceMetrics,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCredential {
    pub employee_id: u64,
    pub credential_id: String,
    pub passkey: String,
    pub counter: u32,
    pub transports: Vec<String>,
    pub device_name: String,
}

/// Everything the attendance session needs from persistence.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Clinics with a configured location, in listing (id) order.
    async fn clinic_locations(&self, tenant: TenantId) -> Result<Vec<ClinicLocation>, HrError>;

    async fn schedules_for_employee(
        &self,
        tenant: TenantId,
        employee_id: u64,
    ) -> Result<Vec<WorkSchedule>, HrError>;

    async fn credential_count(&self, tenant: TenantId, employee_id: u64) -> Result<u64, HrError>;

    async fn attendance_for_date(
        &self,
        tenant: TenantId,
        employee_id: u64,
        work_date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, HrError>;

    /// Fails with `AlreadyCheckedIn` when the day already has a record.
    async fn insert_check_in(&self, tenant: TenantId, check_in: &NewCheckIn)
    -> Result<(), HrError>;

    /// Fails with `AlreadyCheckedOut` when the record is already closed.
    async fn record_check_out(&self, tenant: TenantId, check_out: &CheckOut)
    -> Result<(), HrError>;
}

/// Short-lived WebAuthn challenges, one per (employee, purpose).
#[async_trait]
pub trait ChallengeStore: Send + Sync {
    /// Replaces any challenge already held for the pair.
    async fn issue(&self, challenge: &StoredChallenge) -> Result<(), HrError>;

    /// The unexpired challenge for the pair; expired rows are dropped.
    async fn live(
        &self,
        employee_id: u64,
        purpose: ChallengePurpose,
        now: NaiveDateTime,
    ) -> Result<Option<StoredChallenge>, HrError>;

    /// Deletes the pair's challenge only if it still holds `challenge`.
    /// Returns whether this call removed it.
    async fn discard(
        &self,
        employee_id: u64,
        purpose: ChallengePurpose,
        challenge: &str,
    ) -> Result<bool, HrError>;
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn credentials(
        &self,
        tenant: TenantId,
        employee_id: u64,
    ) -> Result<Vec<BiometricCredential>, HrError>;

    async fn insert_credential(
        &self,
        tenant: TenantId,
        credential: &NewCredential,
    ) -> Result<(), HrError>;

    /// Stores the new counter and passkey state unless the stored counter
    /// is already higher. Returns whether the row moved.
    async fn advance_counter(
        &self,
        credential_row_id: u64,
        counter: u32,
        passkey: &str,
    ) -> Result<bool, HrError>;
}

// Only an open record can be closed; zero rows means someone else closed it.
const RECORD_CHECK_OUT: &str = r#"
    UPDATE hr_attendance
    SET check_out = ?, check_out_lat = ?, check_out_lng = ?,
        total_minutes = ?, late_minutes = ?, early_leave_minutes = ?,
        overtime_minutes = ?, status = ?
    WHERE id = ? AND client_id = ? AND check_out IS NULL
"#;

const ADVANCE_COUNTER: &str = "UPDATE hr_biometric_credentials SET counter = ?, public_key = ? \
     WHERE id = ? AND counter <= ?";

/// MySQL backed store for the HR tables.
#[derive(Clone)]
pub struct MySqlHrStore {
    pool: MySqlPool,
}

impl MySqlHrStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

pub(crate) const ATTENDANCE_COLUMNS: &str = "id, client_id, employee_id, work_date, check_in, check_in_lat, \
     check_in_lng, device_info, check_out, check_out_lat, check_out_lng, total_minutes, \
     late_minutes, early_leave_minutes, overtime_minutes, status";

#[async_trait]
impl AttendanceStore for MySqlHrStore {
    async fn clinic_locations(&self, tenant: TenantId) -> Result<Vec<ClinicLocation>, HrError> {
        let rows = sqlx::query_as::<_, ClinicLocation>(
            r#"
            SELECT id AS clinic_id, name, latitude, longitude, allowed_radius_meters
            FROM clinics
            WHERE client_id = ? AND latitude IS NOT NULL AND longitude IS NOT NULL
            ORDER BY id
            "#,
        )
        .bind(tenant.get())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn schedules_for_employee(
        &self,
        tenant: TenantId,
        employee_id: u64,
    ) -> Result<Vec<WorkSchedule>, HrError> {
        let rows = sqlx::query_as::<_, WorkSchedule>(
            r#"
            SELECT id, client_id, employee_id, work_days, start_time, end_time,
                   grace_minutes, overtime_enabled, effective_from, effective_to
            FROM hr_work_schedules
            WHERE client_id = ? AND employee_id = ?
            ORDER BY effective_from
            "#,
        )
        .bind(tenant.get())
        .bind(employee_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn credential_count(&self, tenant: TenantId, employee_id: u64) -> Result<u64, HrError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM hr_biometric_credentials WHERE client_id = ? AND employee_id = ?",
        )
        .bind(tenant.get())
        .bind(employee_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }

    async fn attendance_for_date(
        &self,
        tenant: TenantId,
        employee_id: u64,
        work_date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, HrError> {
        let sql = format!(
            "SELECT {} FROM hr_attendance WHERE client_id = ? AND employee_id = ? AND work_date = ?",
            ATTENDANCE_COLUMNS
        );

        let row = sqlx::query_as::<_, AttendanceRecord>(&sql)
            .bind(tenant.get())
            .bind(employee_id)
            .bind(work_date)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn insert_check_in(
        &self,
        tenant: TenantId,
        check_in: &NewCheckIn,
    ) -> Result<(), HrError> {
        let result = sqlx::query(
            r#"
            INSERT INTO hr_attendance
                (client_id, employee_id, work_date, check_in, check_in_lat, check_in_lng,
                 device_info, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(tenant.get())
        .bind(check_in.employee_id)
        .bind(check_in.work_date)
        .bind(check_in.at)
        .bind(check_in.latitude)
        .bind(check_in.longitude)
        .bind(&check_in.device_info)
        .bind(check_in.status.as_ref())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            // unique (employee_id, work_date)
            Err(e) if is_duplicate_key(&e) => Err(HrError::AlreadyCheckedIn),
            Err(e) => Err(e.into()),
        }
    }

    async fn record_check_out(
        &self,
        tenant: TenantId,
        check_out: &CheckOut,
    ) -> Result<(), HrError> {
        let m = &check_out.metrics;
        let result = sqlx::query(RECORD_CHECK_OUT)
        .bind(check_out.at)
        .bind(check_out.latitude)
        .bind(check_out.longitude)
        .bind(m.total_minutes)
        .bind(m.late_minutes)
        .bind(m.early_leave_minutes)
        .bind(m.overtime_minutes)
        .bind(m.status.as_ref())
        .bind(check_out.record_id)
        .bind(tenant.get())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(HrError::AlreadyCheckedOut);
        }
        Ok(())
    }
}

#[async_trait]
impl ChallengeStore for MySqlHrStore {
    async fn issue(&self, challenge: &StoredChallenge) -> Result<(), HrError> {
        sqlx::query(
            r#"
            INSERT INTO hr_webauthn_challenges
                (employee_id, purpose, challenge, state, created_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                challenge = VALUES(challenge),
                state = VALUES(state),
                created_at = VALUES(created_at),
                expires_at = VALUES(expires_at)
            "#,
        )
        .bind(challenge.employee_id)
        .bind(challenge.purpose.as_ref())
        .bind(&challenge.challenge)
        .bind(&challenge.state)
        .bind(challenge.created_at)
        .bind(challenge.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn live(
        &self,
        employee_id: u64,
        purpose: ChallengePurpose,
        now: NaiveDateTime,
    ) -> Result<Option<StoredChallenge>, HrError> {
        sqlx::query(
            "DELETE FROM hr_webauthn_challenges WHERE employee_id = ? AND purpose = ? AND expires_at <= ?",
        )
        .bind(employee_id)
        .bind(purpose.as_ref())
        .bind(now)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, StoredChallenge>(
            r#"
            SELECT employee_id, purpose, challenge, state, created_at, expires_at
            FROM hr_webauthn_challenges
            WHERE employee_id = ? AND purpose = ? AND expires_at > ?
            "#,
        )
        .bind(employee_id)
        .bind(purpose.as_ref())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn discard(
        &self,
        employee_id: u64,
        purpose: ChallengePurpose,
        challenge: &str,
    ) -> Result<bool, HrError> {
        let result = sqlx::query(
            "DELETE FROM hr_webauthn_challenges WHERE employee_id = ? AND purpose = ? AND challenge = ?",
        )
        .bind(employee_id)
        .bind(purpose.as_ref())
        .bind(challenge)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CredentialStore for MySqlHrStore {
    async fn credentials(
        &self,
        tenant: TenantId,
        employee_id: u64,
    ) -> Result<Vec<BiometricCredential>, HrError> {
        let rows = sqlx::query_as::<_, BiometricCredential>(
            r#"
            SELECT id, client_id, employee_id, credential_id, public_key, counter,
                   transports, device_name
            FROM hr_biometric_credentials
            WHERE client_id = ? AND employee_id = ?
            ORDER BY id
            "#,
        )
        .bind(tenant.get())
        .bind(employee_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn insert_credential(
        &self,
        tenant: TenantId,
        credential: &NewCredential,
    ) -> Result<(), HrError> {
        let result = sqlx::query(
            r#"
            INSERT INTO hr_biometric_credentials
                (client_id, employee_id, credential_id, public_key, counter, transports, device_name)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(tenant.get())
        .bind(credential.employee_id)
        .bind(&credential.credential_id)
        .bind(&credential.passkey)
        .bind(credential.counter)
        .bind(Json(&credential.transports))
        .bind(&credential.device_name)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(HrError::Invalid(
                "Credential already registered".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn advance_counter(
        &self,
        credential_row_id: u64,
        counter: u32,
        passkey: &str,
    ) -> Result<bool, HrError> {
        let result = sqlx::query(ADVANCE_COUNTER)
        .bind(counter)
        .bind(passkey)
        .bind(credential_row_id)
        .bind(counter)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = include_str!("../../schema.sql");

    #[test]
    fn check_out_only_touches_open_records() {
        assert!(RECORD_CHECK_OUT.contains("check_out IS NULL"));
        assert!(RECORD_CHECK_OUT.contains("client_id = ?"));
    }

    #[test]
    fn counter_update_never_moves_backward() {
        assert!(ADVANCE_COUNTER.contains("counter <= ?"));
        assert_eq!(ADVANCE_COUNTER.matches('?').count(), 4);
    }

    #[test]
    fn one_attendance_row_per_employee_day() {
        assert!(SCHEMA.contains("UNIQUE KEY uq_hr_attendance_day (employee_id, work_date)"));
        assert!(SCHEMA.contains("PRIMARY KEY (employee_id, purpose)"));
    }
}
