use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub phone: String,
    pub name: String,
    pub age: i64,
    pub gender: String,
    pub is_admin: bool,
    pub created_at: String,
    pub last_login_at: String,
}

impl User {
    pub fn role_label(&self) -> &'static str {
        if self.is_admin {
            "Admin"
        } else {
            "User"
        }
    }
}

/// Row shown in the admin user list.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserSummary {
    pub phone: String,
    pub name: String,
    pub age: i64,
    pub gender: String,
    pub is_admin: bool,
    pub created_at: String,
    pub last_login_at: String,
    pub activity_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub const ALL: [Gender; 3] = [Gender::Male, Gender::Female, Gender::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Male" => Ok(Gender::Male),
            "Female" => Ok(Gender::Female),
            "Other" => Ok(Gender::Other),
            _ => Err(()),
        }
    }
}
