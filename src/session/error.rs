use crate::storage::StorageError;
use log::error;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("http error: {0}")]
    Transport(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("request rejected ({status}): {detail}")]
    Status { status: u16, detail: String },
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Transport(e.to_string())
    }
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

/// 动作失败：固定的提示文案 + 底层错误
#[derive(Debug)]
pub struct ActionFailure {
    pub message: &'static str,
    pub error: ApiError,
}

impl ActionFailure {
    pub fn new(message: &'static str, error: ApiError) -> Self {
        error!("{}: {}", message, error);
        Self { message, error }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.error.is_unauthorized()
    }
}

impl std::fmt::Display for ActionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.message, self.error)
    }
}

pub type ActionResult<T> = Result<T, ActionFailure>;
