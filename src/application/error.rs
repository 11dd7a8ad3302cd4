use std::error::Error as StdError;

use thiserror::Error;

use crate::{
    application::repos::RepoError, cache::SettingsError, domain::error::DomainError,
    infra::error::InfraError,
};

/// Error message chain captured for reporting at the binary edge.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self { source, messages }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Validation(_)
            | AppError::Domain(_)
            | AppError::Settings(SettingsError::InvalidPath { .. })
            | AppError::Settings(SettingsError::SettingNotFound { .. }) => 2,
            AppError::Infra(InfraError::Configuration { .. }) => 78,
            AppError::Infra(InfraError::Database { .. })
            | AppError::Repo(_)
            | AppError::Settings(SettingsError::Store(_)) => 69,
            AppError::Infra(InfraError::Io(_) | InfraError::Telemetry(_)) | AppError::Unexpected(_) => {
                1
            }
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::from_error("application::error::AppError", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_walks_source_chain() {
        let error = AppError::from(SettingsError::from(RepoError::Timeout));
        let report = error.report();
        assert_eq!(report.messages.first().map(String::as_str), Some("database timeout"));
        assert_eq!(error.exit_code(), 69);
    }

    #[test]
    fn caller_mistakes_exit_with_usage_code() {
        let error = AppError::from(SettingsError::InvalidPath {
            path: "AI".to_string(),
        });
        assert_eq!(error.exit_code(), 2);
    }
}
