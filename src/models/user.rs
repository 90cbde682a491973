// src/models/user.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role carried in the session credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

impl Role {
    /// Unknown roles get the least privileged role.
    pub fn from_claim(role: &str) -> Self {
        match role.trim().to_ascii_lowercase().as_str() {
            "instructor" => Role::Instructor,
            "admin" => Role::Admin,
            _ => Role::Student,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Instructor => "instructor",
            Role::Admin => "admin",
        }
    }

    /// Whether this role may see quiz answer keys.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Instructor | Role::Admin)
    }
}

/// The authenticated caller, resolved from a verified bearer token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}
