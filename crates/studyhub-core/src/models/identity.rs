use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use super::material::Material;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Student,
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "student" | "user" => Ok(UserRole::Student),
            _ => Err(anyhow::anyhow!("Invalid role: {}", s)),
        }
    }
}

impl Display for UserRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::Student => write!(f, "student"),
        }
    }
}

/// The authenticated caller, as vouched for by the token issuer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: UserRole,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn is_owner_or_admin(&self, material: &Material) -> bool {
        self.user_id == material.uploaded_by || self.is_admin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn owned_by(owner: Uuid) -> Material {
        Material {
            id: Uuid::new_v4(),
            course: "CSE".into(),
            semester: None,
            subject: "DBMS".into(),
            description: None,
            original_name: "notes.pdf".into(),
            stored_reference: "materials/a.pdf".into(),
            mime_type: "application/pdf".into(),
            size_bytes: 1,
            uploaded_by: owner,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn owner_or_admin() {
        let owner = Uuid::new_v4();
        let material = owned_by(owner);

        let as_owner = Identity { user_id: owner, role: UserRole::Student };
        let as_admin = Identity { user_id: Uuid::new_v4(), role: UserRole::Admin };
        let stranger = Identity { user_id: Uuid::new_v4(), role: UserRole::Student };

        assert!(as_owner.is_owner_or_admin(&material));
        assert!(as_admin.is_owner_or_admin(&material));
        assert!(!stranger.is_owner_or_admin(&material));
    }

    #[test]
    fn parses_roles() {
        assert_eq!("Admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!("user".parse::<UserRole>().unwrap(), UserRole::Student);
        assert!("root".parse::<UserRole>().is_err());
    }
}
