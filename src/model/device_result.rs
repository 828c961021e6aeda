use chrono::{DateTime, Utc};
use serde::Serialize;

/// A reading pushed by a device, possibly linked to a patient.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DeviceResult {
    pub id: String,
    pub client_id: u64,
    pub device_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    pub patient_identifier: String,
    pub test_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_name: Option<String>,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_range: Option<String>,
    pub is_abnormal: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_message: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_patient_id: Option<u64>,
    #[sqlx(rename = "patient_name")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_patient_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Ways an incoming identifier can point at a patient, tried in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatientLookup<'a> {
    Id(u64),
    Phone(&'a str),
    FullName(&'a str),
}

impl PatientLookup<'_> {
    pub fn column(&self) -> &'static str {
        match self {
            PatientLookup::Id(_) => "id",
            PatientLookup::Phone(_) => "phone",
            PatientLookup::FullName(_) => "full_name",
        }
    }
}

/// Numeric identifiers are tried as patient ids first, then every
/// identifier is tried as a phone number and finally as a full name.
pub fn lookup_order(identifier: &str) -> Vec<PatientLookup<'_>> {
    let mut order = Vec::with_capacity(3);
    if let Ok(id) = identifier.parse::<u64>() {
        order.push(PatientLookup::Id(id));
    }
    order.push(PatientLookup::Phone(identifier));
    order.push(PatientLookup::FullName(identifier));
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_identifier_tries_id_first() {
        assert_eq!(
            lookup_order("1042"),
            vec![
                PatientLookup::Id(1042),
                PatientLookup::Phone("1042"),
                PatientLookup::FullName("1042"),
            ]
        );
    }

    #[test]
    fn text_identifier_skips_id() {
        let order = lookup_order("Sami Khalil");
        assert_eq!(order.len(), 2);
        assert_eq!(order[0].column(), "phone");
        assert_eq!(order[1].column(), "full_name");
    }
}
