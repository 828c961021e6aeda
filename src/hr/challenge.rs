use chrono::{Duration, NaiveDateTime};

use crate::hr::error::HrError;
use crate::hr::store::ChallengeStore;
use crate::model::challenge::{ChallengePurpose, StoredChallenge};

/// Issues and consumes one-shot WebAuthn challenges.
pub struct ChallengeLedger<'a, S: ChallengeStore + ?Sized> {
    store: &'a S,
    ttl: Duration,
}

impl<'a, S: ChallengeStore + ?Sized> ChallengeLedger<'a, S> {
    pub fn new(store: &'a S, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Stores `challenge` for the pair, replacing whatever was there.
    pub async fn issue(
        &self,
        employee_id: u64,
        purpose: ChallengePurpose,
        challenge: String,
        state: String,
        now: NaiveDateTime,
    ) -> Result<StoredChallenge, HrError> {
        let stored = StoredChallenge {
            employee_id,
            purpose,
            challenge,
            state,
            created_at: now,
            expires_at: now + self.ttl,
        };
        self.store.issue(&stored).await?;

        tracing::debug!(employee_id, purpose = %purpose, "WebAuthn challenge issued");
        Ok(stored)
    }

    /// The live challenge for the pair, provided the client echoed the same
    /// value. Missing, expired and mismatched challenges all read as expired.
    pub async fn consume(
        &self,
        employee_id: u64,
        purpose: ChallengePurpose,
        supplied: &str,
        now: NaiveDateTime,
    ) -> Result<StoredChallenge, HrError> {
        match self.store.live(employee_id, purpose, now).await? {
            Some(stored) if stored.is_live(now) && stored.challenge == supplied => Ok(stored),
            _ => Err(HrError::ChallengeExpired),
        }
    }

    /// Deletes a challenge after the verifier accepted it. Losing a race
    /// with a concurrent verification reads as expired.
    pub async fn finish(&self, stored: &StoredChallenge) -> Result<(), HrError> {
        if self
            .store
            .discard(stored.employee_id, stored.purpose, &stored.challenge)
            .await?
        {
            Ok(())
        } else {
            Err(HrError::ChallengeExpired)
        }
    }
}

/// Signature counters only move forward. Authenticators that do not count
/// report 0 every time, which is accepted while the stored value is 0.
pub fn check_counter(stored: u32, reported: u32) -> Result<u32, HrError> {
    if reported > stored || (stored == 0 && reported == 0) {
        Ok(reported)
    } else {
        Err(HrError::VerificationFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hr::memory::MemoryStore;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    #[actix_web::test]
    async fn consume_then_finish_is_one_shot() {
        let store = MemoryStore::default();
        let ledger = ChallengeLedger::new(&store, Duration::minutes(5));

        ledger
            .issue(7, ChallengePurpose::Register, "abc".into(), "{}".into(), now())
            .await
            .unwrap();

        let stored = ledger
            .consume(7, ChallengePurpose::Register, "abc", now())
            .await
            .unwrap();
        ledger.finish(&stored).await.unwrap();

        assert!(matches!(
            ledger.consume(7, ChallengePurpose::Register, "abc", now()).await,
            Err(HrError::ChallengeExpired)
        ));
        assert!(matches!(
            ledger.finish(&stored).await,
            Err(HrError::ChallengeExpired)
        ));
    }

    #[actix_web::test]
    async fn reissue_invalidates_previous_challenge() {
        let store = MemoryStore::default();
        let ledger = ChallengeLedger::new(&store, Duration::minutes(5));

        ledger
            .issue(7, ChallengePurpose::Register, "old".into(), "{}".into(), now())
            .await
            .unwrap();
        ledger
            .issue(7, ChallengePurpose::Register, "new".into(), "{}".into(), now())
            .await
            .unwrap();

        assert!(matches!(
            ledger.consume(7, ChallengePurpose::Register, "old", now()).await,
            Err(HrError::ChallengeExpired)
        ));
        assert!(
            ledger
                .consume(7, ChallengePurpose::Register, "new", now())
                .await
                .is_ok()
        );
    }

    #[actix_web::test]
    async fn purposes_are_independent() {
        let store = MemoryStore::default();
        let ledger = ChallengeLedger::new(&store, Duration::minutes(5));

        ledger
            .issue(7, ChallengePurpose::Register, "reg".into(), "{}".into(), now())
            .await
            .unwrap();
        ledger
            .issue(7, ChallengePurpose::Authenticate, "auth".into(), "{}".into(), now())
            .await
            .unwrap();

        assert!(
            ledger
                .consume(7, ChallengePurpose::Register, "reg", now())
                .await
                .is_ok()
        );
        assert!(
            ledger
                .consume(7, ChallengePurpose::Authenticate, "auth", now())
                .await
                .is_ok()
        );
    }

    #[actix_web::test]
    async fn expired_challenge_is_rejected() {
        let store = MemoryStore::default();
        let ledger = ChallengeLedger::new(&store, Duration::minutes(5));

        ledger
            .issue(7, ChallengePurpose::Authenticate, "abc".into(), "{}".into(), now())
            .await
            .unwrap();

        let later = now() + Duration::minutes(5);
        assert!(matches!(
            ledger
                .consume(7, ChallengePurpose::Authenticate, "abc", later)
                .await,
            Err(HrError::ChallengeExpired)
        ));
    }

    #[test]
    fn counter_never_moves_backward() {
        assert_eq!(check_counter(0, 0).unwrap(), 0);
        assert_eq!(check_counter(4, 5).unwrap(), 5);
        assert!(check_counter(5, 5).is_err());
        assert!(check_counter(5, 3).is_err());
        assert!(check_counter(5, 0).is_err());
    }
}
