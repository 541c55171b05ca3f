use thiserror::Error;

/// Failure of a call from the client to the proxy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// The proxy answered with a non-success status.
    #[error("{message}")]
    Http { status: u16, message: String },

    /// The request never got an answer.
    #[error("Connection error: {0}")]
    Transport(String),

    /// The answer could not be understood.
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Message sent by the proxy, if there was one.
    pub fn proxy_message(&self) -> Option<&str> {
        match self {
            Self::Http { message, .. } => Some(message),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}
