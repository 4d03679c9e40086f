use log::{info, warn};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{BackendClient, Credential, check};
use crate::error::{Error, Result, is_refresh_token_error};
use crate::session::{Identity, Profile, Role, Session};

const PROFILE_ATTEMPTS: u32 = 3;
const PROFILE_RETRY_STEP: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self, now_secs: i64) -> Session {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| now_secs + secs));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            user_id: self.user.id,
            email: self.user.email,
            expires_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn(Identity),
    /// The service wants the address confirmed before a password sign-in succeeds.
    ConfirmationRequired { email: String },
}

fn is_confirmation_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("not confirmed") || message.contains("confirm")
}

impl BackendClient {
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let request = self
            .request(Method::POST, "/auth/v1/token", Credential::Anon)?
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email.trim(), "password": password }));
        let token: TokenResponse = Self::send_json(request).await?;
        Ok(token.into_session(chrono::Utc::now().timestamp()))
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<Session> {
        let request = self
            .request(Method::POST, "/auth/v1/token", Credential::Anon)?
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }));
        let token: TokenResponse = Self::send_json(request).await?;
        Ok(token.into_session(chrono::Utc::now().timestamp()))
    }

    pub async fn user_for_token(&self, token: &str) -> Result<AuthUser> {
        let request = self.request(Method::GET, "/auth/v1/user", Credential::User(token))?;
        match Self::send_json(request).await {
            Err(Error::Backend { status: 401 | 403, .. }) => Err(Error::InvalidToken),
            other => other,
        }
    }

    pub async fn sign_out(&self, token: &str) -> Result<()> {
        let request = self.request(Method::POST, "/auth/v1/logout", Credential::User(token))?;
        check(request.send().await?).await?;
        Ok(())
    }

    pub async fn sign_up(&self, email: &str, password: &str, role: Role) -> Result<SignUpOutcome> {
        let email = email.trim();
        let request = self
            .request(Method::POST, "/auth/v1/signup", Credential::Anon)?
            .json(&json!({ "email": email, "password": password, "data": { "role": role } }));
        check(request.send().await?).await?;
        info!("Registered {} as {}", email, role);

        let session = match self.sign_in(email, password).await {
            Ok(session) => session,
            Err(Error::Backend { message, .. }) if is_confirmation_message(&message) => {
                return Ok(SignUpOutcome::ConfirmationRequired {
                    email: email.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        let profile = Profile {
            id: session.user_id.clone(),
            email: Some(email.to_string()),
            role,
            created_at: None,
        };
        let profile = self
            .upsert_profile(Credential::User(&session.access_token), &profile)
            .await?;
        Ok(SignUpOutcome::SignedIn(Identity::new(session, Some(profile))))
    }

    /// Profile rows are created by a trigger shortly after sign-up, so a missing row is retried
    /// a few times before giving up. The caller treats `None` as a player.
    pub async fn profile_with_retry(&self, session: &Session) -> Option<Profile> {
        for attempt in 1..=PROFILE_ATTEMPTS {
            match self
                .fetch_profile(Credential::User(&session.access_token), &session.user_id)
                .await
            {
                Ok(Some(profile)) => return Some(profile),
                Ok(None) => {}
                Err(e) => warn!("Profile fetch attempt {} failed: {}", attempt, e),
            }
            if attempt < PROFILE_ATTEMPTS {
                tokio::time::sleep(PROFILE_RETRY_STEP * attempt).await;
            }
        }
        None
    }

    pub async fn sign_in_identity(&self, email: &str, password: &str) -> Result<Identity> {
        let session = self.sign_in(email, password).await?;
        let profile = self.profile_with_retry(&session).await;
        Ok(Identity::new(session, profile))
    }

    // Refreshes an expired session. A rejected refresh token ends the session.
    pub async fn ensure_fresh(&self, identity: &Identity) -> Result<Identity> {
        if !identity.session.is_expired_now() {
            return Ok(identity.clone());
        }
        match self.refresh(&identity.session.refresh_token).await {
            Ok(session) => Ok(Identity::new(session, identity.profile.clone())),
            Err(Error::Backend { message, .. }) if is_refresh_token_error(&message) => {
                warn!("Refresh token rejected: {}", message);
                Err(Error::SessionExpired)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_response_computes_expiry() {
        let token: TokenResponse = serde_json::from_str(
            r#"{"access_token":"a","refresh_token":"r","expires_in":3600,
                "user":{"id":"u1","email":"nami@example.com"}}"#,
        )
        .unwrap();
        let session = token.into_session(1_000);
        assert_eq!(session.expires_at, Some(4_600));
        assert_eq!(session.user_id, "u1");
        assert_eq!(session.email.as_deref(), Some("nami@example.com"));
    }

    #[test]
    fn confirmation_messages_are_recognised() {
        assert!(is_confirmation_message("Email not confirmed"));
        assert!(!is_confirmation_message("Invalid login credentials"));
    }
}
