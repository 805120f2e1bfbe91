use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Marketplace user identifier. Numeric so conversation pairs can be ordered.
pub type UserId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

impl Role {
    /// Instructors and admins may message many users at once.
    #[must_use]
    pub const fn can_broadcast(self) -> bool {
        matches!(self, Self::Instructor | Self::Admin)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Instructor => "instructor",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Self::Student),
            "instructor" => Ok(Self::Instructor),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Public profile fields of a marketplace user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub role: Role,
}

/// The lightweight slice of a profile shown next to a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtherUser {
    pub id: UserId,
    pub name: String,
    pub avatar_url: Option<String>,
}

impl From<&UserProfile> for OtherUser {
    fn from(profile: &UserProfile) -> Self {
        Self { id: profile.id, name: profile.name.clone(), avatar_url: profile.avatar_url.clone() }
    }
}
