//! Crate error type.
//!
//! [`enum@Error`] separates bad input ([`Error::InvalidConfig`]), geometry that cannot be
//! meshed ([`Error::DegenerateDomain`]) and failures of the worker threads
//! ([`Error::Communication`]) from I/O errors.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("degenerate domain: {0}")]
    DegenerateDomain(String),

    #[error("worker communication failed: {0}")]
    Communication(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Returns `true` for failures caused by a peer worker going away rather than by the
    /// worker reporting it.
    pub fn is_communication(&self) -> bool {
        matches!(self, Error::Communication(_))
    }
}

impl From<String> for Error {
    fn from(message: String) -> Self {
        Error::Other(message)
    }
}

impl From<&str> for Error {
    fn from(message: &str) -> Self {
        Error::Other(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_messages_become_other() {
        let owned: Error = format!("{} samples", 3).into();
        assert!(matches!(owned, Error::Other(ref m) if m == "3 samples"));
        let borrowed: Error = "late worker".into();
        assert_eq!(borrowed.to_string(), "late worker");
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "vp.bin");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_communication());
    }

    #[test]
    fn communication_errors_are_flagged() {
        assert!(Error::Communication("gone".into()).is_communication());
        assert!(!Error::InvalidConfig("hmin".into()).is_communication());
    }

    #[test]
    fn display_includes_category() {
        let err = Error::DegenerateDomain("empty box".into());
        assert_eq!(err.to_string(), "degenerate domain: empty box");
    }
}
