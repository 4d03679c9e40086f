use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

// Application-level errors. The calculator never produces any of these; they come from the
// hosted services, the local cache and the exporters around it.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Local cache error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] pdfium_render::prelude::PdfiumError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Logger error: {0}")]
    Logger(#[from] log::SetLoggerError),

    #[error("Thread join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Backend not configured: missing {0}")]
    NotConfigured(&'static str),

    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Missing access token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Session expired, please sign in again")]
    SessionExpired,

    #[error("Forbidden")]
    Forbidden,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Cannot create profile: authenticated user does not match payload user_id")]
    ProfileMismatch,
}

impl Error {
    // True when the remote service could not be reached at all, as opposed to answering
    // with an error. Only those failures are eligible for the offline cache.
    pub fn is_unreachable(&self) -> bool {
        match self {
            Error::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }

    pub fn requires_sign_in(&self) -> bool {
        match self {
            Error::SessionExpired | Error::InvalidToken | Error::MissingToken => true,
            Error::Backend { message, .. } => is_refresh_token_error(message),
            _ => false,
        }
    }
}

impl From<String> for Error {
    fn from(error: String) -> Self {
        Error::BadRequest(error)
    }
}

pub fn is_refresh_token_error(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("refresh token") || message.contains("invalid refresh")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_token_messages_force_sign_in() {
        let error = Error::Backend {
            status: 400,
            message: "Invalid Refresh Token: Already Used".to_string(),
        };
        assert!(error.requires_sign_in());
        assert!(Error::SessionExpired.requires_sign_in());
        assert!(!Error::Forbidden.requires_sign_in());
    }

    #[test]
    fn backend_answers_are_not_unreachable() {
        let error = Error::Backend {
            status: 500,
            message: "boom".to_string(),
        };
        assert!(!error.is_unreachable());
    }
}
