use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{Duration, NaiveDateTime};
use serde_json::Value;
use tracing::warn;
use webauthn_rs::prelude::*;

use crate::hr::challenge::{ChallengeLedger, check_counter};
use crate::hr::error::HrError;
use crate::hr::store::{ChallengeStore, CredentialStore, NewCredential};
use crate::model::challenge::ChallengePurpose;
use crate::model::credential::BiometricCredential;
use crate::model::employee::HrEmployee;
use crate::model::tenant::TenantId;

/// Relying-party side of the platform authenticator ceremonies.
pub struct BiometricCeremony {
    webauthn: Webauthn,
    challenge_ttl: Duration,
}

impl BiometricCeremony {
    pub fn new(
        rp_id: &str,
        rp_origin: &str,
        rp_name: &str,
        challenge_ttl_secs: i64,
    ) -> anyhow::Result<Self> {
        let origin = Url::parse(rp_origin)?;
        let webauthn = WebauthnBuilder::new(rp_id, &origin)?
            .rp_name(rp_name)
            .build()?;

        Ok(Self {
            webauthn,
            challenge_ttl: Duration::seconds(challenge_ttl_secs),
        })
    }

    fn ledger<'a, S: ChallengeStore + ?Sized>(&self, store: &'a S) -> ChallengeLedger<'a, S> {
        ChallengeLedger::new(store, self.challenge_ttl)
    }

    /// Registration options for `employee`; previously registered
    /// authenticators are excluded.
    pub async fn register_options<S>(
        &self,
        store: &S,
        tenant: TenantId,
        employee: &HrEmployee,
        now: NaiveDateTime,
    ) -> Result<Value, HrError>
    where
        S: ChallengeStore + CredentialStore + ?Sized,
    {
        let existing: Vec<CredentialID> = store
            .credentials(tenant, employee.id)
            .await?
            .iter()
            .filter_map(|c| serde_json::from_str::<Passkey>(&c.public_key).ok())
            .map(|p| p.cred_id().clone())
            .collect();
        let exclude = if existing.is_empty() {
            None
        } else {
            Some(existing)
        };

        let (options, state) = self
            .webauthn
            .start_passkey_registration(
                user_handle(employee.id),
                &employee.username,
                &employee.full_name,
                exclude,
            )
            .map_err(internal)?;

        let options = serde_json::to_value(&options).map_err(internal)?;
        let state = serde_json::to_string(&state).map_err(internal)?;

        self.ledger(store)
            .issue(
                employee.id,
                ChallengePurpose::Register,
                challenge_of(&options)?,
                state,
                now,
            )
            .await?;

        Ok(options)
    }

    /// Verifies the attestation in `body` and stores the new credential.
    pub async fn register_verify<S>(
        &self,
        store: &S,
        tenant: TenantId,
        employee_id: u64,
        body: &Value,
        now: NaiveDateTime,
    ) -> Result<(), HrError>
    where
        S: ChallengeStore + CredentialStore + ?Sized,
    {
        let ledger = self.ledger(store);
        let supplied = client_challenge(body).ok_or(HrError::ChallengeExpired)?;
        let stored = ledger
            .consume(employee_id, ChallengePurpose::Register, &supplied, now)
            .await?;

        let state: PasskeyRegistration = serde_json::from_str(&stored.state).map_err(internal)?;
        let response: RegisterPublicKeyCredential =
            serde_json::from_value(body.clone()).map_err(|_| HrError::VerificationFailed)?;

        let passkey = self
            .webauthn
            .finish_passkey_registration(&response, &state)
            .map_err(|e| {
                warn!(error = ?e, employee_id, "Passkey registration rejected");
                HrError::VerificationFailed
            })?;

        ledger.finish(&stored).await?;

        let credential = NewCredential {
            employee_id,
            credential_id: credential_id_string(passkey.cred_id())?,
            passkey: serde_json::to_string(&passkey).map_err(internal)?,
            counter: 0,
            transports: transports_of(body),
            device_name: body
                .get("deviceName")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .unwrap_or("Unknown")
                .to_string(),
        };
        store.insert_credential(tenant, &credential).await
    }

    /// Assertion options over every credential the employee registered.
    pub async fn authenticate_options<S>(
        &self,
        store: &S,
        tenant: TenantId,
        employee_id: u64,
        now: NaiveDateTime,
    ) -> Result<Value, HrError>
    where
        S: ChallengeStore + CredentialStore + ?Sized,
    {
        let credentials = store.credentials(tenant, employee_id).await?;
        if credentials.is_empty() {
            return Err(HrError::NoBiometric);
        }

        let passkeys = credentials
            .iter()
            .map(|c| serde_json::from_str::<Passkey>(&c.public_key))
            .collect::<Result<Vec<_>, _>>()
            .map_err(internal)?;

        let (options, state) = self
            .webauthn
            .start_passkey_authentication(&passkeys)
            .map_err(internal)?;

        let options = serde_json::to_value(&options).map_err(internal)?;
        let state = serde_json::to_string(&state).map_err(internal)?;

        self.ledger(store)
            .issue(
                employee_id,
                ChallengePurpose::Authenticate,
                challenge_of(&options)?,
                state,
                now,
            )
            .await?;

        Ok(options)
    }

    /// Verifies an assertion and moves the credential's counter forward.
    pub async fn authenticate_verify<S>(
        &self,
        store: &S,
        tenant: TenantId,
        employee_id: u64,
        body: &Value,
        now: NaiveDateTime,
    ) -> Result<(), HrError>
    where
        S: ChallengeStore + CredentialStore + ?Sized,
    {
        let ledger = self.ledger(store);
        let supplied = client_challenge(body).ok_or(HrError::ChallengeExpired)?;
        let stored = ledger
            .consume(employee_id, ChallengePurpose::Authenticate, &supplied, now)
            .await?;

        let credential_id = body
            .get("id")
            .and_then(Value::as_str)
            .ok_or(HrError::CredentialNotFound)?;
        let credential = store
            .credentials(tenant, employee_id)
            .await?
            .into_iter()
            .find(|c| c.credential_id == credential_id)
            .ok_or(HrError::CredentialNotFound)?;

        let state: PasskeyAuthentication =
            serde_json::from_str(&stored.state).map_err(internal)?;
        let response: PublicKeyCredential =
            serde_json::from_value(body.clone()).map_err(|_| HrError::VerificationFailed)?;

        let result = self
            .webauthn
            .finish_passkey_authentication(&response, &state)
            .map_err(|e| {
                warn!(error = ?e, employee_id, "Passkey assertion rejected");
                HrError::VerificationFailed
            })?;

        ledger.finish(&stored).await?;

        let mut passkey: Passkey =
            serde_json::from_str(&credential.public_key).map_err(internal)?;
        passkey.update_credential(&result);
        let passkey = serde_json::to_string(&passkey).map_err(internal)?;

        persist_counter(store, &credential, result.counter(), &passkey).await
    }
}

/// Writes the verifier-reported counter as the credential's new high-water
/// mark. A concurrent assertion that already stored a higher counter wins.
async fn persist_counter<S: CredentialStore + ?Sized>(
    store: &S,
    credential: &BiometricCredential,
    reported: u32,
    passkey: &str,
) -> Result<(), HrError> {
    let counter = check_counter(credential.counter, reported)?;
    if store
        .advance_counter(credential.id, counter, passkey)
        .await?
    {
        Ok(())
    } else {
        Err(HrError::VerificationFailed)
    }
}

/// Browsers key users by an opaque handle; ours is the employee id.
fn user_handle(employee_id: u64) -> Uuid {
    Uuid::from_u64_pair(0, employee_id)
}

fn internal<E: std::fmt::Display>(e: E) -> HrError {
    HrError::Internal(e.to_string())
}

/// `publicKey.challenge` of serialized creation/request options.
fn challenge_of(options: &Value) -> Result<String, HrError> {
    options
        .pointer("/publicKey/challenge")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| HrError::Internal("options carry no challenge".to_string()))
}

/// The challenge the authenticator signed, read from `clientDataJSON`.
fn client_challenge(body: &Value) -> Option<String> {
    let encoded = body.pointer("/response/clientDataJSON")?.as_str()?;
    let raw = URL_SAFE_NO_PAD.decode(encoded.trim_end_matches('=')).ok()?;
    let client_data: Value = serde_json::from_slice(&raw).ok()?;
    client_data
        .get("challenge")?
        .as_str()
        .map(|c| c.trim_end_matches('=').to_string())
}

fn credential_id_string(id: &CredentialID) -> Result<String, HrError> {
    match serde_json::to_value(id).map_err(internal)? {
        Value::String(s) => Ok(s),
        other => Err(HrError::Internal(format!(
            "unexpected credential id encoding: {}",
            other
        ))),
    }
}

fn transports_of(body: &Value) -> Vec<String> {
    body.pointer("/response/transports")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::CredentialEncoding;
    use crate::hr::memory::MemoryStore;
    use chrono::{NaiveDate, Utc};
    use serde_json::json;

    const TENANT: TenantId = TenantId::new(1);

    fn ceremony() -> BiometricCeremony {
        BiometricCeremony::new(
            "clinic.example.com",
            "https://clinic.example.com",
            "MedLoop HR",
            300,
        )
        .unwrap()
    }

    fn employee() -> HrEmployee {
        HrEmployee {
            id: 7,
            client_id: TENANT.get(),
            full_name: "Lina Haddad".into(),
            username: "lina".into(),
            password: String::new(),
            password_encoding: CredentialEncoding::Hashed,
            phone: None,
            email: None,
            status: "active".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn body_with_challenge(challenge: &str) -> Value {
        let client_data = json!({
            "type": "webauthn.create",
            "challenge": challenge,
            "origin": "https://clinic.example.com",
        });
        json!({
            "id": "abc",
            "response": {
                "clientDataJSON": URL_SAFE_NO_PAD.encode(client_data.to_string()),
                "transports": ["internal", "hybrid"],
            },
            "deviceName": "iPhone",
        })
    }

    #[test]
    fn reads_challenge_from_client_data() {
        let body = body_with_challenge("q1w2e3");
        assert_eq!(client_challenge(&body).as_deref(), Some("q1w2e3"));
        assert_eq!(client_challenge(&json!({})), None);
        assert_eq!(transports_of(&body), vec!["internal", "hybrid"]);
        assert!(transports_of(&json!({})).is_empty());
    }

    #[test]
    fn user_handle_is_stable() {
        assert_eq!(user_handle(7), user_handle(7));
        assert_ne!(user_handle(7), user_handle(8));
    }

    #[actix_web::test]
    async fn register_options_store_the_issued_challenge() {
        let store = MemoryStore::default();
        let options = ceremony()
            .register_options(&store, TENANT, &employee(), now())
            .await
            .unwrap();

        let issued = challenge_of(&options).unwrap();
        let map = store.challenges.lock().unwrap();
        let stored = map.get(&(7, ChallengePurpose::Register)).unwrap();
        assert_eq!(stored.challenge, issued);
        assert_eq!(stored.expires_at, now() + Duration::seconds(300));
    }

    #[actix_web::test]
    async fn verify_with_stale_challenge_fails() {
        let store = MemoryStore::default();
        let ceremony = ceremony();
        ceremony
            .register_options(&store, TENANT, &employee(), now())
            .await
            .unwrap();

        let result = ceremony
            .register_verify(&store, TENANT, 7, &body_with_challenge("stale"), now())
            .await;
        assert!(matches!(result, Err(HrError::ChallengeExpired)));
    }

    #[actix_web::test]
    async fn authenticate_options_need_a_credential() {
        let store = MemoryStore::default();
        let result = ceremony()
            .authenticate_options(&store, TENANT, 7, now())
            .await;
        assert!(matches!(result, Err(HrError::NoBiometric)));
    }

    #[actix_web::test]
    async fn unknown_credential_is_reported() {
        let store = MemoryStore::default();
        let ceremony = ceremony();
        let stored = ChallengeLedger::new(&store, Duration::minutes(5))
            .issue(7, ChallengePurpose::Authenticate, "abc123".into(), "{}".into(), now())
            .await
            .unwrap();

        let result = ceremony
            .authenticate_verify(&store, TENANT, 7, &body_with_challenge(&stored.challenge), now())
            .await;
        assert!(matches!(result, Err(HrError::CredentialNotFound)));
    }

    fn stored_credential(store: &MemoryStore) -> BiometricCredential {
        store.credentials.lock().unwrap()[0].clone()
    }

    #[actix_web::test]
    async fn successful_assertion_persists_reported_counter() {
        let store = MemoryStore::default().with_credential(TENANT, 7);
        let credential = stored_credential(&store);

        persist_counter(&store, &credential, 5, "{\"v\":5}").await.unwrap();

        let after = stored_credential(&store);
        assert_eq!(after.counter, 5);
        assert_eq!(after.public_key, "{\"v\":5}");
    }

    #[actix_web::test]
    async fn replayed_assertion_cannot_rewind_counter() {
        let store = MemoryStore::default().with_credential(TENANT, 7);
        let snapshot = stored_credential(&store);
        persist_counter(&store, &snapshot, 5, "{}").await.unwrap();

        // read before the first assertion landed, so the local check passes
        let result = persist_counter(&store, &snapshot, 3, "{}").await;
        assert!(matches!(result, Err(HrError::VerificationFailed)));
        assert_eq!(stored_credential(&store).counter, 5);

        let fresh = stored_credential(&store);
        let result = persist_counter(&store, &fresh, 5, "{}").await;
        assert!(matches!(result, Err(HrError::VerificationFailed)));
        assert_eq!(stored_credential(&store).counter, 5);
    }
}
