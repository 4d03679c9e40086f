//! Avatar storage: upload, public and signed URLs, and display-time resolution.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{debug, warn};
use reqwest::{Method, Url};
use serde::Deserialize;
use serde_json::json;

use super::{BackendClient, Credential, check};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl Upload {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Upload {
            bytes,
            content_type: content_type.into(),
        }
    }

    /// Accepts `data:<mime>;base64,<payload>` or bare base64.
    pub fn from_base64(input: &str, default_type: &str) -> Result<Self> {
        let input = input.trim();
        let (content_type, payload) = match input.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest
                    .split_once(',')
                    .ok_or_else(|| Error::BadRequest("malformed data URL".to_string()))?;
                let mime = header.strip_suffix(";base64").unwrap_or(header);
                let mime = if mime.is_empty() { default_type } else { mime };
                (mime.to_string(), payload)
            }
            None => (default_type.to_string(), input),
        };
        let payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        Ok(Upload::new(STANDARD.decode(payload)?, content_type))
    }
}

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

pub fn sanitize_object_name(file_name: &str) -> String {
    let name: String = file_name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    if name.is_empty() { "avatar".to_string() } else { name }
}

pub fn object_path(user_id: &str, file_name: &str, unix_millis: i64) -> String {
    format!("{}/{}-{}", user_id, unix_millis, sanitize_object_name(file_name))
}

/// Object path inside `bucket` for a public or signed storage URL.
pub fn object_path_from_url(url: &str, bucket: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let segments: Vec<&str> = url.path_segments()?.collect();
    let position = segments.iter().position(|segment| *segment == bucket)?;
    let rest = &segments[position + 1..];
    if rest.is_empty() {
        None
    } else {
        Some(rest.join("/"))
    }
}

fn is_policy_rejection(error: &Error) -> bool {
    match error {
        Error::Backend { status, message } => {
            matches!(status, 400 | 401 | 403)
                && message.to_lowercase().contains("row-level security")
        }
        _ => false,
    }
}

impl BackendClient {
    pub fn public_url(&self, path: &str) -> String {
        self.url(&format!("/storage/v1/object/public/{}/{}", self.bucket, path))
    }

    async fn put_object(&self, credential: Credential<'_>, path: &str, upload: &Upload) -> Result<()> {
        let request = self
            .request(
                Method::POST,
                &format!("/storage/v1/object/{}/{}", self.bucket, path),
                credential,
            )?
            .header("x-upsert", "true")
            .header("content-type", upload.content_type.as_str())
            .body(upload.bytes.clone());
        check(request.send().await?).await?;
        Ok(())
    }

    /// Uploads an avatar and returns its object path. A storage policy rejection is retried with
    /// the service credential when one is configured.
    pub async fn upload_avatar(
        &self,
        token: &str,
        user_id: &str,
        file_name: &str,
        upload: &Upload,
    ) -> Result<String> {
        let path = object_path(user_id, file_name, chrono::Utc::now().timestamp_millis());
        match self.put_object(Credential::User(token), &path, upload).await {
            Ok(()) => {}
            Err(e) if is_policy_rejection(&e) && self.has_service_key() => {
                warn!("Storage policy rejected upload, retrying privileged: {}", e);
                self.put_object(Credential::Service, &path, upload).await?;
            }
            Err(e) => return Err(e),
        }
        debug!("Uploaded avatar to {}", path);
        Ok(path)
    }

    pub async fn signed_url(&self, credential: Credential<'_>, path: &str, expires_in: Option<u64>) -> Result<String> {
        let request = self
            .request(
                Method::POST,
                &format!("/storage/v1/object/sign/{}/{}", self.bucket, path),
                credential,
            )?
            .json(&json!({ "expiresIn": expires_in.unwrap_or(self.signed_url_expiry) }));
        let signed: SignedUrlResponse = Self::send_json(request).await?;
        if signed.signed_url.starts_with("http") {
            Ok(signed.signed_url)
        } else {
            let relative = signed.signed_url.trim_start_matches('/');
            Ok(self.url(&format!("/storage/v1/{}", relative)))
        }
    }

    /// URL usable right now for `stored`. Public buckets answer the HEAD directly; private ones
    /// need a fresh signed URL.
    pub async fn resolve_avatar(&self, credential: Credential<'_>, stored: &str) -> Result<String> {
        let reachable = match self.http().head(stored).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("HEAD {} failed: {}", stored, e);
                false
            }
        };
        if reachable {
            return Ok(stored.to_string());
        }
        let path = object_path_from_url(stored, &self.bucket)
            .ok_or_else(|| Error::BadRequest(format!("not a storage URL: {}", stored)))?;
        self.signed_url(credential, &path, None).await
    }

    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = check(self.http().get(url).send().await?).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_urls_are_decoded_with_their_type() {
        let upload = Upload::from_base64("data:image/png;base64,aGVs\nbG8=", "image/jpeg").unwrap();
        assert_eq!(upload.bytes, b"hello");
        assert_eq!(upload.content_type, "image/png");
    }

    #[test]
    fn bare_base64_uses_the_default_type() {
        let upload = Upload::from_base64("aGVsbG8=", "image/jpeg").unwrap();
        assert_eq!(upload.content_type, "image/jpeg");
        assert!(Upload::from_base64("data:image/png;base64", "image/png").is_err());
        assert!(Upload::from_base64("***", "image/png").is_err());
    }

    #[test]
    fn object_paths_are_namespaced_by_owner() {
        assert_eq!(
            object_path("u1", "my face.png", 1_700_000_000_000),
            "u1/1700000000000-my_face.png"
        );
        assert_eq!(sanitize_object_name("  "), "avatar");
    }

    #[test]
    fn object_path_is_found_after_the_bucket() {
        let url = "https://db.example.com/storage/v1/object/public/characters/u1/17-face.png";
        assert_eq!(
            object_path_from_url(url, "characters").as_deref(),
            Some("u1/17-face.png")
        );
        assert_eq!(object_path_from_url("https://db.example.com/other/x.png", "characters"), None);
        assert_eq!(object_path_from_url("not a url", "characters"), None);
    }

    #[test]
    fn only_policy_errors_trigger_the_retry() {
        let rls = Error::Backend {
            status: 403,
            message: "new row violates row-level security policy".to_string(),
        };
        assert!(is_policy_rejection(&rls));
        assert!(!is_policy_rejection(&Error::Forbidden));
    }
}
