use thiserror::Error;

/// Error type shared by every stage of the detection pipeline
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OutlierError {
    /// Malformed dataset or construction parameters (empty, ragged, non-finite, zero sizes)
    #[error("InvalidInput: {0}")]
    InvalidInput(String),
    /// A query parameter violates its contract (k too large, final count above candidates, ...)
    #[error("ParameterOutOfRange: {0}")]
    ParameterOutOfRange(String),
    /// Arrow IPC parsing or encoding failed
    #[error("ArrowError: {0}")]
    ArrowError(String),
    /// Reading an input file failed
    #[error("IoError: {0}")]
    Io(String),
}

impl OutlierError {
    pub(crate) fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub(crate) fn out_of_range(msg: impl Into<String>) -> Self {
        Self::ParameterOutOfRange(msg.into())
    }
}

impl From<csv::Error> for OutlierError {
    fn from(err: csv::Error) -> Self {
        Self::Io(format!("csv: {}", err))
    }
}

impl From<std::io::Error> for OutlierError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OutlierError::InvalidInput("test error".to_string());
        assert_eq!(err.to_string(), "InvalidInput: test error");

        let err = OutlierError::ParameterOutOfRange("k too large".to_string());
        assert_eq!(err.to_string(), "ParameterOutOfRange: k too large");

        let err = OutlierError::ArrowError("arrow test".to_string());
        assert_eq!(err.to_string(), "ArrowError: arrow test");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<OutlierError>();
        assert_sync::<OutlierError>();
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.csv");
        let err: OutlierError = io.into();
        assert!(matches!(err, OutlierError::Io(_)));
        assert!(err.to_string().contains("missing.csv"));
    }
}
