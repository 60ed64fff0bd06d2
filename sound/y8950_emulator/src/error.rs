//! Errors raised while creating or configuring a chip

use std::collections::TryReserveError;

use thiserror::Error;

/// Failure to build a chip or one of its collaborators
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to allocate emulator memory: {0}")]
    Allocation(#[from] TryReserveError),

    #[error("invalid chip configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_from() {
        let mut v: Vec<u8> = Vec::new();
        let err: Error = v.try_reserve(usize::MAX).unwrap_err().into();
        assert!(matches!(err, Error::Allocation(_)));
        assert!(err.to_string().starts_with("failed to allocate"));
    }

    #[test]
    fn test_config_message() {
        let err = Error::config("rate must be non-zero");
        assert_eq!(
            err.to_string(),
            "invalid chip configuration: rate must be non-zero"
        );
    }
}
