//! Unified application error model and mapping helpers.
//! A single enum covers every failure the HTTP layer can report; each variant
//! carries the message serialized into the `{"error": ...}` envelope and maps
//! to exactly one status code. Authorization failures never echo the resolved
//! path and never distinguish "exists but denied" from "does not exist".

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::fsops::FsError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    BadRequest { message: String },
    NotAllowed { message: String },
    FeatureDisabled { message: String },
    NotFound { message: String },
    Conflict { message: String },
    Io { message: String },
    Internal { message: String },
}

impl AppError {
    pub fn message(&self) -> &str {
        match self {
            AppError::BadRequest { message }
            | AppError::NotAllowed { message }
            | AppError::FeatureDisabled { message }
            | AppError::NotFound { message }
            | AppError::Conflict { message }
            | AppError::Io { message }
            | AppError::Internal { message } => message.as_str(),
        }
    }

    pub fn bad_request<S: Into<String>>(msg: S) -> Self { AppError::BadRequest { message: msg.into() } }
    pub fn not_allowed<S: Into<String>>(msg: S) -> Self { AppError::NotAllowed { message: msg.into() } }
    pub fn feature_disabled<S: Into<String>>(msg: S) -> Self { AppError::FeatureDisabled { message: msg.into() } }
    pub fn not_found<S: Into<String>>(msg: S) -> Self { AppError::NotFound { message: msg.into() } }
    pub fn conflict<S: Into<String>>(msg: S) -> Self { AppError::Conflict { message: msg.into() } }
    pub fn io<S: Into<String>>(msg: S) -> Self { AppError::Io { message: msg.into() } }
    pub fn internal<S: Into<String>>(msg: S) -> Self { AppError::Internal { message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::BadRequest { .. } => 400,
            AppError::NotAllowed { .. } => 403,
            AppError::FeatureDisabled { .. } => 403,
            AppError::NotFound { .. } => 404,
            AppError::Conflict { .. } => 409,
            AppError::Io { .. } => 500,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<FsError> for AppError {
    fn from(err: FsError) -> Self {
        match err {
            FsError::NotFound => AppError::not_found("Not found"),
            FsError::NotADirectory => AppError::not_found("Directory not found"),
            FsError::IsDirectory => AppError::bad_request("Is a directory"),
            FsError::AlreadyExists => AppError::conflict("Already exists"),
            FsError::SeparatorInName => {
                AppError::bad_request("name must not contain path separators")
            }
            FsError::Io(e) => AppError::io(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(AppError::bad_request("oops").http_status(), 400);
        assert_eq!(AppError::not_allowed("no").http_status(), 403);
        assert_eq!(AppError::feature_disabled("off").http_status(), 403);
        assert_eq!(AppError::not_found("missing").http_status(), 404);
        assert_eq!(AppError::conflict("dup").http_status(), 409);
        assert_eq!(AppError::io("io").http_status(), 500);
        assert_eq!(AppError::internal("panic").http_status(), 500);
    }

    #[test]
    fn fs_error_mapping() {
        assert_eq!(AppError::from(FsError::NotFound).http_status(), 404);
        assert_eq!(AppError::from(FsError::AlreadyExists).http_status(), 409);
        assert_eq!(AppError::from(FsError::IsDirectory).http_status(), 400);
        assert_eq!(AppError::from(FsError::SeparatorInName).http_status(), 400);
        let io = FsError::Io(std::io::Error::other("disk"));
        assert_eq!(AppError::from(io).http_status(), 500);
    }

    #[test]
    fn messages_do_not_leak_paths() {
        let e = AppError::not_allowed("Path not allowed");
        assert_eq!(e.message(), "Path not allowed");
        assert!(!e.message().contains('/'));
    }
}
