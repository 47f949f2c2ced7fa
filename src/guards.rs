use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProfileError;

/// Mine registration details stored alongside an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MineProfile {
    pub mine_name: String,
    pub mine_type: String,
    pub mine_state: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Registration form as submitted, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Registration {
    pub email: String,
    pub mine_name: String,
    pub mine_type: String,
    pub mine_state: String,
}

/// InputGuard: rejects incomplete registrations before anything is written.
pub struct InputGuard;

impl InputGuard {
    pub fn validate_registration(r: &Registration) -> Result<(), ProfileError> {
        let fields = [
            ("mine_name", &r.mine_name),
            ("mine_type", &r.mine_type),
            ("mine_state", &r.mine_state),
            ("email", &r.email),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(ProfileError::MissingField(name));
            }
        }
        let email = r.email.trim();
        match email.split_once('@') {
            Some((user, domain)) if !user.is_empty() && !domain.is_empty() => Ok(()),
            _ => Err(ProfileError::InvalidEmail),
        }
    }

    /// Validate and trim into a stored profile.
    pub fn admit(r: &Registration, now: DateTime<Utc>) -> Result<MineProfile, ProfileError> {
        Self::validate_registration(r)?;
        Ok(MineProfile {
            mine_name: r.mine_name.trim().to_string(),
            mine_type: r.mine_type.trim().to_string(),
            mine_state: r.mine_state.trim().to_string(),
            email: r.email.trim().to_string(),
            created_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reg() -> Registration {
        Registration {
            email: "ops@mine.example".into(),
            mine_name: " Jharia North ".into(),
            mine_type: "Coal".into(),
            mine_state: "Jharkhand".into(),
        }
    }

    #[test]
    fn test_complete_registration_is_admitted() {
        let p = InputGuard::admit(&reg(), Utc::now()).unwrap();
        assert_eq!(p.mine_name, "Jharia North");
    }

    #[test]
    fn test_blank_fields_rejected() {
        let mut r = reg();
        r.mine_state = "   ".into();
        assert_eq!(
            InputGuard::validate_registration(&r),
            Err(ProfileError::MissingField("mine_state"))
        );
        assert_eq!(
            InputGuard::validate_registration(&Registration::default()),
            Err(ProfileError::MissingField("mine_name"))
        );
    }

    #[test]
    fn test_bad_email_rejected() {
        let mut r = reg();
        r.email = "not-an-address".into();
        assert_eq!(InputGuard::validate_registration(&r), Err(ProfileError::InvalidEmail));
        r.email = "@mine.example".into();
        assert_eq!(InputGuard::validate_registration(&r), Err(ProfileError::InvalidEmail));
    }
}
