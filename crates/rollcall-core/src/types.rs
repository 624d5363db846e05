//! Registry data model: descriptors, roles, and enrolled user records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("descriptor length mismatch: {left} vs {right}")]
pub struct DimensionMismatch {
    pub left: usize,
    pub right: usize,
}

/// Fixed-length face descriptor produced by an embedding provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptor {
    pub values: Vec<f32>,
}

impl Descriptor {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Euclidean distance to another descriptor of the same length.
    pub fn euclidean_distance(&self, other: &Descriptor) -> Result<f32, DimensionMismatch> {
        if self.values.len() != other.values.len() {
            return Err(DimensionMismatch {
                left: self.values.len(),
                right: other.values.len(),
            });
        }

        Ok(self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt())
    }

    /// Little-endian f32 encoding used for persistence.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    /// Inverse of [`to_le_bytes`](Self::to_le_bytes). Returns `None` when the
    /// byte length is not a multiple of four.
    pub fn from_le_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() % 4 != 0 {
            return None;
        }
        let values = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Some(Self { values })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid role '{0}': expected 'student' or 'staff'")]
pub struct InvalidRole(pub String);

/// Enrolled user role. Determines which field group a record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Staff => "staff",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = InvalidRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "staff" => Ok(Role::Staff),
            other => Err(InvalidRole(other.to_string())),
        }
    }
}

/// Role-specific field group. Only the group matching the role exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum RoleFields {
    Student {
        dob: String,
        usn: String,
        /// Grade-point value exactly as enrolled.
        cgpa: String,
    },
    Staff {
        department: String,
        designation: String,
    },
}

impl RoleFields {
    pub fn role(&self) -> Role {
        match self {
            RoleFields::Student { .. } => Role::Student,
            RoleFields::Staff { .. } => Role::Staff,
        }
    }

    pub fn usn(&self) -> Option<&str> {
        match self {
            RoleFields::Student { usn, .. } => Some(usn),
            RoleFields::Staff { .. } => None,
        }
    }

    pub fn department(&self) -> Option<&str> {
        match self {
            RoleFields::Staff { department, .. } => Some(department),
            RoleFields::Student { .. } => None,
        }
    }

    pub fn designation(&self) -> Option<&str> {
        match self {
            RoleFields::Staff { designation, .. } => Some(designation),
            RoleFields::Student { .. } => None,
        }
    }
}

/// An enrolled user together with its reference descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub fields: RoleFields,
    pub descriptor: Descriptor,
    /// RFC 3339 enrollment timestamp.
    pub created_at: String,
}

impl UserRecord {
    pub fn role(&self) -> Role {
        self.fields.role()
    }
}
