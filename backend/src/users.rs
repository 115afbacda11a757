use std::sync::Arc;

use chrono::{DateTime, Utc};
use draw_core::UserId;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::store::{RecordStore, Table};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// The part of a user another participant may see. `name` is absent when the
/// account was removed after the draw.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct PublicProfile {
    pub id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

pub struct UserRepository {
    table: Table<User>,
}

impl UserRepository {
    pub fn new(store: Arc<dyn RecordStore<User>>) -> Self {
        Self {
            table: Table::new(store),
        }
    }

    pub async fn create(&self, name: &str, email: &str) -> ApiResult<User> {
        let name = name.trim();
        let email = email.trim().to_lowercase();
        if name.is_empty() {
            return Err(ApiError::Validation("name required".into()));
        }
        if !valid_email(&email) {
            return Err(ApiError::Validation("a valid email is required".into()));
        }

        let user = self
            .table
            .mutate(|users| {
                if users.records.iter().any(|u| u.email == email) {
                    return Err(ApiError::Conflict("email already registered".into()));
                }
                let user = User {
                    id: users.next_id(),
                    name: name.to_string(),
                    email: email.clone(),
                    created_at: Utc::now(),
                };
                users.records.push(user.clone());
                Ok(user)
            })
            .await?;

        tracing::info!(user_id = user.id, "user registered");
        Ok(user)
    }

    pub async fn find(&self, user_id: UserId) -> ApiResult<User> {
        self.table
            .read()
            .await?
            .records
            .into_iter()
            .find(|u| u.id == user_id)
            .ok_or(ApiError::NotFound("user"))
    }

    pub async fn list_all(&self) -> ApiResult<Vec<User>> {
        Ok(self.table.read().await?.records)
    }

    /// Changes the given fields of a user's profile. Blank values count as
    /// absent; at least one field must remain.
    pub async fn update(
        &self,
        user_id: UserId,
        name: Option<&str>,
        email: Option<&str>,
    ) -> ApiResult<User> {
        let name = name.map(str::trim).filter(|n| !n.is_empty());
        let email = email
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty());
        if name.is_none() && email.is_none() {
            return Err(ApiError::Validation("nothing to update".into()));
        }
        if email.as_deref().is_some_and(|e| !valid_email(e)) {
            return Err(ApiError::Validation("a valid email is required".into()));
        }

        let user = self
            .table
            .mutate(|users| {
                if let Some(email) = &email {
                    if users
                        .records
                        .iter()
                        .any(|u| u.id != user_id && &u.email == email)
                    {
                        return Err(ApiError::Conflict("email already registered".into()));
                    }
                }
                let user = users
                    .records
                    .iter_mut()
                    .find(|u| u.id == user_id)
                    .ok_or(ApiError::NotFound("user"))?;
                if let Some(name) = name {
                    user.name = name.to_string();
                }
                if let Some(email) = email {
                    user.email = email;
                }
                Ok(user.clone())
            })
            .await?;

        tracing::info!(user_id, "user profile updated");
        Ok(user)
    }

    pub async fn delete(&self, user_id: UserId) -> ApiResult<()> {
        self.table
            .mutate(|users| {
                let before = users.records.len();
                users.records.retain(|u| u.id != user_id);
                if users.records.len() == before {
                    return Err(ApiError::NotFound("user"));
                }
                Ok(())
            })
            .await?;

        tracing::info!(user_id, "user deleted");
        Ok(())
    }

    pub async fn public_profile(&self, user_id: UserId) -> ApiResult<PublicProfile> {
        let name = match self.find(user_id).await {
            Ok(user) => Some(user.name),
            Err(ApiError::NotFound(_)) => None,
            Err(err) => return Err(err),
        };
        Ok(PublicProfile { id: user_id, name })
    }
}

fn valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}
