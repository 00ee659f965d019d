use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shelfmark_auth::Role;
use shelfmark_core::{DocumentId, DomainError, DomainResult, timestamp};

use crate::{Extra, non_blank, strip_reserved};

/// Stored user document. The email is the external key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Sign-up request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewUser {
    pub email: Option<String>,
    pub name: Option<String>,
    pub image: Option<String>,
    pub role: Option<String>,
    pub extra: Extra,
}

const RESERVED: &[&str] = &["_id", "email", "name", "image", "role", "createdAt"];

impl User {
    /// Validate a sign-up and build the stored user.
    ///
    /// A missing role falls back to `default_role`; a present one must name a
    /// known role.
    pub fn register(input: NewUser, default_role: Role, now: DateTime<Utc>) -> DomainResult<User> {
        let email = non_blank(input.email)
            .ok_or_else(|| DomainError::invalid_input("email is required"))?;
        let role = match non_blank(input.role) {
            Some(raw) => parse_role(&raw)?,
            None => default_role,
        };

        Ok(User {
            id: DocumentId::new(),
            email,
            name: non_blank(input.name),
            image: non_blank(input.image),
            role,
            created_at: now,
            extra: strip_reserved(input.extra, RESERVED),
        })
    }
}

pub fn parse_role(raw: &str) -> DomainResult<Role> {
    raw.parse::<Role>()
        .map_err(|e| DomainError::invalid_input(e.to_string()))
}

/// Profile fields a user may change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub image: Option<String>,
}

impl ProfileUpdate {
    /// At least one of the two fields must be present.
    pub fn new(name: Option<String>, image: Option<String>) -> DomainResult<Self> {
        let update = Self {
            name: non_blank(name),
            image: non_blank(image),
        };
        if update.name.is_none() && update.image.is_none() {
            return Err(DomainError::invalid_input("name or image is required"));
        }
        Ok(update)
    }

    /// Fields to merge into the stored document.
    pub fn into_fields(self) -> Extra {
        let mut fields = Extra::new();
        if let Some(name) = self.name {
            fields.insert("name".into(), name.into());
        }
        if let Some(image) = self.image {
            fields.insert("image".into(), image.into());
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(email: &str) -> NewUser {
        NewUser {
            email: Some(email.into()),
            name: Some("Ada".into()),
            ..Default::default()
        }
    }

    #[test]
    fn missing_role_uses_default() {
        let user = User::register(signup("ada@example.com"), Role::Buyer, Utc::now()).unwrap();
        assert_eq!(user.role, Role::Buyer);

        let user =
            User::register(signup("ada@example.com"), Role::Librarian, Utc::now()).unwrap();
        assert_eq!(user.role, Role::Librarian);
    }

    #[test]
    fn explicit_role_is_parsed() {
        let mut input = signup("ada@example.com");
        input.role = Some("Librarian".into());
        let user = User::register(input, Role::Buyer, Utc::now()).unwrap();
        assert_eq!(user.role, Role::Librarian);
    }

    #[test]
    fn unknown_role_is_invalid_input() {
        let mut input = signup("ada@example.com");
        input.role = Some("superuser".into());
        assert!(matches!(
            User::register(input, Role::Buyer, Utc::now()),
            Err(DomainError::InvalidInput(_))
        ));
    }

    #[test]
    fn email_is_required() {
        let input = NewUser::default();
        assert!(matches!(
            User::register(input, Role::Buyer, Utc::now()),
            Err(DomainError::InvalidInput(_))
        ));
    }

    #[test]
    fn extra_fields_survive_but_cannot_override_identity() {
        let mut input = signup("ada@example.com");
        input.extra.insert("phone".into(), "555".into());
        input.extra.insert("_id".into(), "spoofed".into());

        let user = User::register(input, Role::Buyer, Utc::now()).unwrap();
        assert_eq!(user.extra.get("phone").and_then(|v| v.as_str()), Some("555"));
        assert!(!user.extra.contains_key("_id"));
    }

    #[test]
    fn profile_update_needs_a_field() {
        assert!(ProfileUpdate::new(None, Some(" ".into())).is_err());

        let fields = ProfileUpdate::new(Some("Ada L".into()), None)
            .unwrap()
            .into_fields();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["name"], "Ada L");
    }
}
