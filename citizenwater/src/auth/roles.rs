//! User roles

use serde::{Deserialize, Serialize};
use std::fmt;

/// Roles carried in tokens, ordered by privilege
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[derive(Default)]
pub enum UserRole {
    /// Registered citizen scientist
    #[default]
    Citizen,
    /// May adjust, reset and delete reward records
    Admin,
}

impl UserRole {
    pub fn is_admin(self) -> bool {
        self >= UserRole::Admin
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Citizen => write!(f, "CITIZEN"),
            UserRole::Admin => write!(f, "ADMIN"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ordering() {
        assert!(UserRole::Admin > UserRole::Citizen);
        assert!(UserRole::Admin.is_admin());
        assert!(!UserRole::Citizen.is_admin());
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&UserRole::Citizen).unwrap(), "\"CITIZEN\"");
        let role: UserRole = serde_json::from_str("\"ADMIN\"").unwrap();
        assert_eq!(role, UserRole::Admin);
    }
}
