//! Error types for RavenHost
//!
//! A single error enum covers every subsystem. Fatal boot errors (volume,
//! engine, front end) propagate to the process supervisor; recoverable
//! conditions are logged at the call site and never surface here.

/// Application-specific error types
#[derive(thiserror::Error, Debug)]
pub enum RavenHostError {
    #[error("volume error: {0}")]
    Volume(String),

    #[error("storage engine error: {0}")]
    Engine(String),

    #[error("front-end error: {0}")]
    FrontEnd(String),

    #[error("membership error: {0}")]
    Membership(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, RavenHostError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RavenHostError::Volume("mount failed".to_string());
        assert_eq!(format!("{}", err), "volume error: mount failed");

        let err = RavenHostError::IllegalState("node is not running".to_string());
        assert_eq!(format!("{}", err), "illegal state: node is not running");

        let err = RavenHostError::Engine("write stall".to_string());
        assert_eq!(format!("{}", err), "storage engine error: write stall");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: RavenHostError = io_err.into();
        assert!(matches!(err, RavenHostError::Io(_)));
    }
}
