use super::traits::Model;
use crate::constants;
use campus_learn::{FromPgRow, PgEnum};
use serde::{Deserialize, Serialize};

/// Ordered: a higher level holds every privilege of the lower ones.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, PgEnum,
)]
#[serde(try_from = "i32", into = "i32")]
pub enum AccessLevel {
    #[default]
    Student = 1,
    Tutor = 2,
    Admin = 3,
}

impl AccessLevel {
    pub fn name(&self) -> &'static str {
        match self {
            AccessLevel::Student => "Student",
            AccessLevel::Tutor => "Tutor",
            AccessLevel::Admin => "Admin",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, FromPgRow)]
pub struct User {
    pub user_id: i64,
    pub email: String,
    pub name: String,
    pub surname: String,
    pub access_level: AccessLevel,
    pub time_created: i64,
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.name, self.surname).trim().to_string()
    }

    /// `None` when there is nowhere to send mail.
    pub fn email_address(&self) -> Option<&str> {
        match self.email.trim() {
            "" => None,
            s => Some(s),
        }
    }
}

impl Model for User {
    fn table_name() -> &'static str {
        constants::USER_TABLE_NAME
    }
    fn id_column() -> &'static str {
        "user_id"
    }
}

/// The authenticated identity behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: i64,
    pub access: AccessLevel,
}

impl Caller {
    pub fn new(user_id: i64, access: AccessLevel) -> Self {
        Self { user_id, access }
    }
    pub fn is_tutor(&self) -> bool {
        self.access >= AccessLevel::Tutor
    }
    pub fn is_admin(&self) -> bool {
        self.access >= AccessLevel::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::TryFrom;

    #[test]
    fn access_levels_are_ordered() {
        assert!(AccessLevel::Admin > AccessLevel::Tutor);
        assert!(AccessLevel::Tutor > AccessLevel::Student);
        assert!(Caller::new(1, AccessLevel::Admin).is_tutor());
        assert!(!Caller::new(1, AccessLevel::Student).is_tutor());
        assert!(AccessLevel::try_from(4).is_err());
    }

    #[test]
    fn blank_email_means_no_address() {
        let mut user = User {
            name: "Ada".into(),
            surname: "".into(),
            email: "  ".into(),
            ..Default::default()
        };
        assert_eq!(user.email_address(), None);
        assert_eq!(user.display_name(), "Ada");
        user.email = "ada@campus.test".into();
        assert_eq!(user.email_address(), Some("ada@campus.test"));
    }
}
