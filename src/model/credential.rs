use serde::Serialize;
use sqlx::types::Json;

/// A registered platform authenticator.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BiometricCredential {
    pub id: u64,
    pub client_id: u64,
    pub employee_id: u64,
    /// base64url, as the browser reports it.
    pub credential_id: String,
    /// Serialized `webauthn_rs::prelude::Passkey`; carries the COSE public key.
    #[serde(skip)]
    pub public_key: String,
    /// Signature counter high-water mark.
    pub counter: u32,
    pub transports: Json<Vec<String>>,
    pub device_name: String,
}
