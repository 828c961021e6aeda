use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Patient {
    pub id: u64,
    pub client_id: u64,
    pub full_name: String,
    pub phone: String,
    pub notes: Option<String>,
    pub username: String,
    pub has_access: bool,
    pub created_at: DateTime<Utc>,
}

/// Portal login derived from the phone number: `p` followed by its digits.
pub fn make_username(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    format!("p{digits}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_keeps_only_digits() {
        assert_eq!(make_username("+962 79-123 4567"), "p962791234567");
        assert_eq!(make_username(""), "p");
    }
}
