// Table access through the REST endpoint. Row-level security applies unless the
// service credential is used.
use reqwest::Method;
use serde_json::Value;

use super::{BackendClient, Credential};
use crate::error::Result;
use crate::session::Profile;

const PROFILES: &str = "/rest/v1/profiles";
const CHARACTERS: &str = "/rest/v1/characters";
const ROSTER_SELECT: &str = "*,profiles:profiles(id,email,role)";

impl BackendClient {
    pub async fn fetch_profile(
        &self,
        credential: Credential<'_>,
        user_id: &str,
    ) -> Result<Option<Profile>> {
        let request = self
            .request(Method::GET, PROFILES, credential)?
            .query(&[("id", format!("eq.{}", user_id)), ("select", "*".to_string())]);
        let profiles: Vec<Profile> = Self::send_json(request).await?;
        Ok(profiles.into_iter().next())
    }

    pub async fn insert_profile(&self, credential: Credential<'_>, profile: &Profile) -> Result<Profile> {
        let request = self
            .request(Method::POST, PROFILES, credential)?
            .header("Prefer", "return=representation")
            .json(&[profile]);
        let rows: Vec<Profile> = Self::send_json(request).await?;
        Ok(rows.into_iter().next().unwrap_or_else(|| profile.clone()))
    }

    pub async fn upsert_profile(&self, credential: Credential<'_>, profile: &Profile) -> Result<Profile> {
        let request = self
            .request(Method::POST, PROFILES, credential)?
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&[profile]);
        let rows: Vec<Profile> = Self::send_json(request).await?;
        Ok(rows.into_iter().next().unwrap_or_else(|| profile.clone()))
    }

    /// Most recently updated character owned by `owner_id`.
    pub async fn latest_character(
        &self,
        credential: Credential<'_>,
        owner_id: &str,
    ) -> Result<Option<Value>> {
        let request = self
            .request(Method::GET, CHARACTERS, credential)?
            .query(&[
                ("user_id", format!("eq.{}", owner_id)),
                ("select", "*".to_string()),
                ("order", "updated_at.desc".to_string()),
                ("limit", "1".to_string()),
            ]);
        let rows: Vec<Value> = Self::send_json(request).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn upsert_character(&self, credential: Credential<'_>, row: &Value) -> Result<Value> {
        let request = self
            .request(Method::POST, CHARACTERS, credential)?
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&[row]);
        let rows: Vec<Value> = Self::send_json(request).await?;
        Ok(rows.into_iter().next().unwrap_or_else(|| row.clone()))
    }

    pub async fn list_characters(&self, credential: Credential<'_>) -> Result<Vec<Value>> {
        let request = self
            .request(Method::GET, CHARACTERS, credential)?
            .query(&[("select", ROSTER_SELECT), ("order", "updated_at.desc")]);
        Self::send_json(request).await
    }
}
