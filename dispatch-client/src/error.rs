use std::fmt;

#[derive(Debug)]
pub enum AppError {
    InvalidCommand(String),
    UnknownOffer(String),
    Anyhow(anyhow::Error),
}

impl AppError {
    /// Text shown to the mechanic. Internal failures are logged, not echoed.
    pub fn user_message(&self) -> String {
        match self {
            AppError::InvalidCommand(msg) => msg.clone(),
            AppError::UnknownOffer(target) => format!("No pending offer {}", target),
            AppError::Anyhow(err) => {
                tracing::error!("Command failed: {:#}", err);
                "Something went wrong, see the log".to_string()
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InvalidCommand(msg) => write!(f, "invalid command: {}", msg),
            AppError::UnknownOffer(target) => write!(f, "unknown offer: {}", target),
            AppError::Anyhow(err) => write!(f, "{:#}", err),
        }
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Anyhow(err.into())
    }
}
