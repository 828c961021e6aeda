use chrono::NaiveDateTime;
use serde::Serialize;
use strum_macros::{AsRefStr, Display, EnumString};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChallengePurpose {
    Register,
    Authenticate,
}

impl TryFrom<String> for ChallengePurpose {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct StoredChallenge {
    pub employee_id: u64,
    #[sqlx(try_from = "String")]
    pub purpose: ChallengePurpose,
    /// base64url challenge handed to the browser.
    pub challenge: String,
    /// Serialized ceremony state the verifier needs to finish.
    pub state: String,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

impl StoredChallenge {
    pub fn is_live(&self, now: NaiveDateTime) -> bool {
        self.expires_at > now
    }
}
