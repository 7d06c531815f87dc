use poise::serenity_prelude as serenity;
use thiserror::Error;

/// How a network-level failure should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    Timeout,
    /// Connection refused/reset/aborted and similar conditions that may clear up.
    Temporary,
    Other,
}

/// Vendor-neutral Discord failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscordError {
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("network error ({kind:?}): {message}")]
    Network {
        kind: NetworkErrorKind,
        message: String,
    },

    #[error("invalid snowflake '{value}'")]
    InvalidId { value: String },

    #[error("{message}")]
    Other { message: String },
}

impl DiscordError {
    pub fn status(&self) -> Option<u16> {
        match self {
            DiscordError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        DiscordError::Other {
            message: message.into(),
        }
    }
}

impl From<serenity::Error> for DiscordError {
    fn from(err: serenity::Error) -> Self {
        let message = err.to_string();

        if let serenity::Error::Http(http_err) = &err {
            if let Some(status) = http_err.status_code() {
                return DiscordError::Status {
                    status: status.as_u16(),
                    message,
                };
            }
        }

        let mut source: Option<&(dyn std::error::Error + 'static)> = Some(&err);
        while let Some(current) = source {
            if let Some(req) = current.downcast_ref::<reqwest::Error>() {
                return classify_reqwest(req, message);
            }
            if let Some(io) = current.downcast_ref::<std::io::Error>() {
                return classify_io(io, message);
            }
            source = current.source();
        }

        DiscordError::Other { message }
    }
}

impl From<reqwest::Error> for DiscordError {
    fn from(err: reqwest::Error) -> Self {
        let message = err.to_string();
        if let Some(status) = err.status() {
            return DiscordError::Status {
                status: status.as_u16(),
                message,
            };
        }
        classify_reqwest(&err, message)
    }
}

fn classify_reqwest(err: &reqwest::Error, message: String) -> DiscordError {
    let kind = if err.is_timeout() {
        NetworkErrorKind::Timeout
    } else if err.is_connect() || err.is_request() {
        NetworkErrorKind::Temporary
    } else {
        NetworkErrorKind::Other
    };
    DiscordError::Network { kind, message }
}

fn classify_io(err: &std::io::Error, message: String) -> DiscordError {
    use std::io::ErrorKind;
    let kind = match err.kind() {
        ErrorKind::TimedOut => NetworkErrorKind::Timeout,
        ErrorKind::ConnectionRefused
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::Interrupted
        | ErrorKind::WouldBlock
        | ErrorKind::BrokenPipe
        | ErrorKind::UnexpectedEof => NetworkErrorKind::Temporary,
        _ => NetworkErrorKind::Other,
    };
    DiscordError::Network { kind, message }
}
