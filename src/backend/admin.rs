// Privileged reads. The bearer token is verified first and the caller's role is read with the
// service credential, so these work even where row-level security would hide the rows.
use log::info;
use serde_json::Value;

use super::{BackendClient, Credential};
use crate::error::{Error, Result};
use crate::session::Role;

#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
}

impl BackendClient {
    pub async fn verify_caller(&self, token: Option<&str>) -> Result<Caller> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(Error::MissingToken)?;
        let user = self
            .user_for_token(token)
            .await
            .map_err(|_| Error::InvalidToken)?;
        let role = self
            .fetch_profile(Credential::Service, &user.id)
            .await?
            .map(|profile| profile.role)
            .unwrap_or_default();
        Ok(Caller {
            user_id: user.id,
            role,
        })
    }

    /// Owner or master only.
    pub async fn character_by_user(&self, token: Option<&str>, user_id: &str) -> Result<Option<Value>> {
        if user_id.trim().is_empty() {
            return Err(Error::BadRequest("missing user_id".to_string()));
        }
        let caller = self.verify_caller(token).await?;
        if caller.user_id != user_id && caller.role != Role::Master {
            return Err(Error::Forbidden);
        }
        self.latest_character(Credential::Service, user_id).await
    }

    pub async fn admin_characters(&self, token: Option<&str>) -> Result<Vec<Value>> {
        let caller = self.verify_caller(token).await?;
        if caller.role != Role::Master {
            return Err(Error::Forbidden);
        }
        let rows = self.list_characters(Credential::Service).await?;
        info!("Listed {} characters for master {}", rows.len(), caller.user_id);
        Ok(rows)
    }
}
