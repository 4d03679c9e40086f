// Identity context passed to every store operation.
use serde::{Deserialize, Serialize};
use strum_macros::Display;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    #[strum(to_string = "player")]
    Player,
    #[strum(to_string = "master")]
    Master,
}

impl Role {
    // Unknown role strings are treated as the unprivileged role.
    pub fn parse(value: &str) -> Role {
        if value.trim().eq_ignore_ascii_case("master") {
            Role::Master
        } else {
            Role::Player
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Player => "Giocatore",
            Role::Master => "Master",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: String,
    pub email: Option<String>,
    /// Unix seconds.
    pub expires_at: Option<i64>,
}

impl Session {
    pub fn is_expired(&self, now_secs: i64) -> bool {
        // A small margin avoids sending a token that dies in flight.
        self.expires_at.is_some_and(|at| at - 30 <= now_secs)
    }

    pub fn is_expired_now(&self) -> bool {
        self.is_expired(chrono::Utc::now().timestamp())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub session: Session,
    pub profile: Option<Profile>,
}

impl Identity {
    pub fn new(session: Session, profile: Option<Profile>) -> Self {
        Identity { session, profile }
    }

    pub fn user_id(&self) -> &str {
        &self.session.user_id
    }

    pub fn token(&self) -> &str {
        &self.session.access_token
    }

    pub fn email(&self) -> Option<&str> {
        self.profile
            .as_ref()
            .and_then(|p| p.email.as_deref())
            .or(self.session.email.as_deref())
    }

    pub fn role(&self) -> Role {
        self.profile.as_ref().map(|p| p.role).unwrap_or_default()
    }

    pub fn is_master(&self) -> bool {
        self.role() == Role::Master
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(expires_at: Option<i64>) -> Session {
        Session {
            access_token: "token".to_string(),
            refresh_token: "refresh".to_string(),
            user_id: "u1".to_string(),
            email: Some("crew@example.com".to_string()),
            expires_at,
        }
    }

    #[test]
    fn missing_profile_means_player() {
        let identity = Identity::new(session(None), None);
        assert_eq!(identity.role(), Role::Player);
        assert!(!identity.is_master());
        assert_eq!(identity.email(), Some("crew@example.com"));
    }

    #[test]
    fn master_profile_is_privileged() {
        let profile = Profile {
            id: "u1".to_string(),
            email: None,
            role: Role::parse("Master"),
            created_at: None,
        };
        assert!(Identity::new(session(None), Some(profile)).is_master());
    }

    #[test]
    fn expiry_uses_a_margin() {
        assert!(!session(None).is_expired(1_000));
        assert!(session(Some(1_020)).is_expired(1_000));
        assert!(!session(Some(1_100)).is_expired(1_000));
    }

    #[test]
    fn roles_serialize_lowercase() {
        assert_eq!(serde_json::to_value(Role::Master).unwrap(), "master");
        assert_eq!(Role::parse("admin"), Role::Player);
    }
}
