use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("{operation} failed{}: {message}", status_suffix(.status))]
    ExternalCall {
        operation: &'static str,
        status: Option<u16>,
        message: String,
    },
}

impl VerifyError {
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        VerifyError::Configuration(msg.into())
    }

    pub fn external<S: Into<String>>(operation: &'static str, status: Option<u16>, msg: S) -> Self {
        VerifyError::ExternalCall {
            operation,
            status,
            message: msg.into(),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|code| format!(" with status {}", code))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, VerifyError>;
