//! HTTP client for the hosted backend: auth, table access and object storage.

pub mod admin;
pub mod auth;
pub mod rest;
pub mod storage;

use log::debug;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::settings::Settings;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Which key signs a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential<'a> {
    Anon,
    User(&'a str),
    /// Bypasses row-level security. Only available when a service key is configured.
    Service,
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
    anon_key: String,
    service_key: Option<String>,
    bucket: String,
    signed_url_expiry: u64,
}

impl BackendClient {
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(BackendClient {
            http,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            anon_key: anon_key.trim().to_string(),
            service_key: None,
            bucket: crate::settings::DEFAULT_BUCKET.to_string(),
            signed_url_expiry: 60,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings
            .backend_url
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(Error::NotConfigured("backend URL"))?;
        let anon_key = settings
            .anon_key
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(Error::NotConfigured("anon key"))?;
        let mut client = BackendClient::new(base_url, anon_key)?;
        client.service_key = settings
            .service_role_key
            .clone()
            .filter(|v| !v.trim().is_empty());
        client.bucket = settings.storage_bucket.clone();
        client.signed_url_expiry = settings.signed_url_expiry_secs;
        Ok(client)
    }

    pub fn with_service_key(mut self, key: impl Into<String>) -> Self {
        self.service_key = Some(key.into());
        self
    }

    pub fn has_service_key(&self) -> bool {
        self.service_key.is_some()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    pub(crate) fn request(
        &self,
        method: Method,
        path: &str,
        credential: Credential<'_>,
    ) -> Result<RequestBuilder> {
        let (apikey, bearer) = match credential {
            Credential::Anon => (self.anon_key.as_str(), self.anon_key.as_str()),
            Credential::User(token) => (self.anon_key.as_str(), token),
            Credential::Service => {
                let key = self
                    .service_key
                    .as_deref()
                    .ok_or(Error::NotConfigured("service role key"))?;
                (key, key)
            }
        };
        debug!("{} {}", method, path);
        Ok(self
            .http
            .request(method, self.url(path))
            .header("apikey", apikey)
            .bearer_auth(bearer))
    }

    pub(crate) async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T> {
        let response = check(builder.send().await?).await?;
        Ok(response.json::<T>().await?)
    }
}

// Turns a non-success answer into `Error::Backend` carrying the service's own message.
pub(crate) async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Backend {
        status: status.as_u16(),
        message: extract_error_message(&body),
    })
}

pub fn extract_error_message(body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error_description", "msg", "error"] {
            if let Some(Value::String(message)) = map.get(key) {
                if !message.trim().is_empty() {
                    return message.clone();
                }
            }
        }
    }
    let body = body.trim();
    if body.is_empty() {
        "Request failed".to_string()
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_service_fields() {
        assert_eq!(
            extract_error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(extract_error_message(r#"{"message":"JWT expired"}"#), "JWT expired");
        assert_eq!(extract_error_message("  gateway down "), "gateway down");
        assert_eq!(extract_error_message(""), "Request failed");
    }

    #[test]
    fn settings_without_keys_are_rejected() {
        let settings = Settings::default();
        assert!(matches!(
            BackendClient::from_settings(&settings),
            Err(Error::NotConfigured(_))
        ));
    }

    #[test]
    fn service_requests_need_a_key() {
        let client = BackendClient::new("https://db.example.com/", "anon").unwrap();
        assert_eq!(client.url("/rest/v1/profiles"), "https://db.example.com/rest/v1/profiles");
        assert!(client
            .request(Method::GET, "/rest/v1/profiles", Credential::Service)
            .is_err());
        assert!(client
            .with_service_key("secret")
            .request(Method::GET, "/rest/v1/profiles", Credential::Service)
            .is_ok());
    }
}
