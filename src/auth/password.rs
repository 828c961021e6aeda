use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        rand_core::{OsRng, RngCore},
    },
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use strum_macros::{AsRefStr, Display, EnumString};

/// How a stored password column is encoded. Decided when the row is
/// written; rows imported from the legacy system are `Plain` until reset.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum CredentialEncoding {
    Plain,
    Hashed,
}

impl TryFrom<String> for CredentialEncoding {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    Ok(argon2.hash_password(password.as_bytes(), &salt)?.to_string())
}

/// Checks `candidate` against a stored value using the encoding recorded
/// alongside it.
pub fn verify_password(candidate: &str, stored: &str, encoding: CredentialEncoding) -> bool {
    match encoding {
        CredentialEncoding::Plain => !stored.is_empty() && candidate == stored,
        CredentialEncoding::Hashed => {
            let Ok(parsed) = PasswordHash::new(stored) else {
                return false;
            };
            Argon2::default()
                .verify_password(candidate.as_bytes(), &parsed)
                .is_ok()
        }
    }
}

/// Random one-time password handed back to an admin (8 base64url chars).
pub fn generate_password() -> String {
    let mut bytes = [0u8; 6];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_round_trip() {
        let hash = hash_password("s3cret").unwrap();
        assert!(verify_password("s3cret", &hash, CredentialEncoding::Hashed));
        assert!(!verify_password("S3cret", &hash, CredentialEncoding::Hashed));
    }

    #[test]
    fn encoding_tag_decides_the_check() {
        let hash = hash_password("s3cret").unwrap();
        // a hash read as plain text never matches the password it encodes
        assert!(!verify_password("s3cret", &hash, CredentialEncoding::Plain));
        assert!(verify_password("legacy", "legacy", CredentialEncoding::Plain));
        assert!(!verify_password("legacy", "legacy", CredentialEncoding::Hashed));
    }

    #[test]
    fn empty_plain_value_never_matches() {
        assert!(!verify_password("", "", CredentialEncoding::Plain));
    }

    #[test]
    fn generated_passwords_are_short_and_url_safe() {
        let pw = generate_password();
        assert_eq!(pw.len(), 8);
        assert!(pw.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(pw, generate_password());
    }

    #[test]
    fn encoding_names() {
        assert_eq!(CredentialEncoding::Hashed.as_ref(), "hashed");
        assert_eq!(
            CredentialEncoding::try_from("plain".to_string()).unwrap(),
            CredentialEncoding::Plain
        );
    }
}
