//! Request and response bodies for the HTTP API.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rollcall_core::{FacePolicy, Role, RoleFields, UserRecord};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{RegistryError, RegistryResult};

/// `POST /register-user`. Every field is optional at the JSON level so that
/// missing values surface as validation errors rather than parse failures.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterUser {
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub image: Option<String>,
    pub dob: Option<String>,
    pub usn: Option<String>,
    /// Accepts a JSON string or number; kept as text.
    #[serde(default, deserialize_with = "text_or_number")]
    pub cgpa: Option<String>,
    pub department: Option<String>,
    pub designation: Option<String>,
}

/// `POST /identify-user`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentifyUser {
    pub image: Option<String>,
}

/// `GET /search-user` query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    pub name: Option<String>,
    pub usn: Option<String>,
    pub department: Option<String>,
    pub designation: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct IdentifyResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub users: Vec<UserSummary>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub version: &'static str,
    pub records: usize,
    pub face_policy: FacePolicy,
    pub match_threshold: f32,
}

/// What identification reveals: the role-appropriate fields, never the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cgpa: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub designation: Option<String>,
}

impl From<&UserRecord> for UserProfile {
    fn from(record: &UserRecord) -> Self {
        let summary = UserSummary::from(record);
        Self {
            name: summary.name,
            role: summary.role,
            dob: summary.dob,
            usn: summary.usn,
            cgpa: summary.cgpa,
            department: summary.department,
            designation: summary.designation,
        }
    }
}

/// Search result row: every field, absent ones as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub dob: Option<String>,
    pub usn: Option<String>,
    pub cgpa: Option<String>,
    pub department: Option<String>,
    pub designation: Option<String>,
}

impl From<&UserRecord> for UserSummary {
    fn from(record: &UserRecord) -> Self {
        let mut summary = Self {
            id: record.id.clone(),
            name: record.name.clone(),
            role: record.role(),
            dob: None,
            usn: None,
            cgpa: None,
            department: None,
            designation: None,
        };
        match &record.fields {
            RoleFields::Student { dob, usn, cgpa } => {
                summary.dob = Some(dob.clone());
                summary.usn = Some(usn.clone());
                summary.cgpa = Some(cgpa.clone());
            }
            RoleFields::Staff { department, designation } => {
                summary.department = Some(department.clone());
                summary.designation = Some(designation.clone());
            }
        }
        summary
    }
}

fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TextOrNumber {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<TextOrNumber>::deserialize(deserializer)?.map(|v| match v {
        TextOrNumber::Text(s) => s,
        TextOrNumber::Number(n) => n.to_string(),
    }))
}

/// Decode a `data:<mime>;base64,<payload>` image string to raw bytes.
///
/// Everything up to the first comma is discarded; a string without a comma
/// is taken as bare base64.
pub fn decode_image_payload(payload: &str) -> RegistryResult<Vec<u8>> {
    let encoded = payload.split_once(',').map_or(payload, |(_, data)| data);
    if encoded.is_empty() {
        return Err(RegistryError::Validation("Image payload is empty.".into()));
    }
    STANDARD
        .decode(encoded)
        .map_err(|e| RegistryError::Validation(format!("Image is not valid base64: {e}")))
}
