use std::sync::Arc;

use serde_json::Value;

use shelfmark_auth::Role;
use shelfmark_core::{DomainError, timestamp};
use shelfmark_library::user::parse_role;
use shelfmark_library::{NewUser, ProfileUpdate, User};

use super::{ServiceResult, decode_all, parse_id};
use crate::store::{
    Collection, DocumentStore, Filter, InsertOutcome, UpdateResult, from_document, to_document,
};

/// Result of a sign-up.
#[derive(Debug, Clone, PartialEq)]
pub enum UserCreation {
    Created(User),
    /// A user with that email was already registered; nothing was written.
    AlreadyExists(User),
}

#[derive(Clone)]
pub struct UsersRepository {
    store: Arc<dyn DocumentStore>,
    default_role: Role,
}

impl UsersRepository {
    pub fn new(store: Arc<dyn DocumentStore>, default_role: Role) -> Self {
        Self {
            store,
            default_role,
        }
    }

    /// Register a user unless the email is taken.
    pub async fn create(&self, input: NewUser) -> ServiceResult<UserCreation> {
        let user = User::register(input, self.default_role, timestamp::now())?;
        let filter = by_email(&user.email);

        match self
            .store
            .insert_if_absent(Collection::Users, &filter, to_document(&user)?)
            .await?
        {
            InsertOutcome::Inserted(_) => Ok(UserCreation::Created(user)),
            InsertOutcome::Existing(doc) => Ok(UserCreation::AlreadyExists(from_document(doc)?)),
        }
    }

    pub async fn list(&self) -> ServiceResult<Vec<User>> {
        let docs = self.store.find(Collection::Users, &Filter::new(), None).await?;
        Ok(decode_all(docs)?)
    }

    pub async fn role_of(&self, email: &str) -> ServiceResult<Option<Role>> {
        Ok(self.find_by_email(email).await?.map(|user| user.role))
    }

    pub async fn profile(&self, email: &str) -> ServiceResult<User> {
        self.find_by_email(email)
            .await?
            .ok_or_else(|| DomainError::not_found("user").into())
    }

    pub async fn update_profile(
        &self,
        email: &str,
        update: ProfileUpdate,
    ) -> ServiceResult<UpdateResult> {
        let result = self
            .store
            .update_one(Collection::Users, &by_email(email), update.into_fields())
            .await?;
        if result.matched == 0 {
            return Err(DomainError::not_found("user").into());
        }
        Ok(result)
    }

    /// Change a user's role. The role must be one of the known roles.
    pub async fn set_role(&self, id: &str, raw_role: &str) -> ServiceResult<UpdateResult> {
        let id = parse_id(id)?;
        let role = parse_role(raw_role)?;

        let mut set = serde_json::Map::new();
        set.insert("role".into(), Value::String(role.as_str().into()));

        let result = self
            .store
            .update_one(Collection::Users, &Filter::by_id(&id), set)
            .await?;
        if result.matched == 0 {
            return Err(DomainError::not_found("user").into());
        }
        Ok(result)
    }

    async fn find_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        let doc = self
            .store
            .find_one(Collection::Users, &by_email(email))
            .await?;
        Ok(doc.map(from_document).transpose()?)
    }
}

fn by_email(email: &str) -> Filter {
    Filter::new().eq("email", email)
}
