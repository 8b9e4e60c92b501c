use std::fmt;
use std::io;

/// Failure taxonomy for a ping run. Permission and resolution failures are
/// fatal; a timeout is recovered per attempt by the session loop.
#[derive(Debug)]
pub enum PingError {
    Permission(io::Error),
    Resolution { host: String, reason: String },
    Timeout { seconds: u64 },
    Io(io::Error),
}

impl PingError {
    /// A blocking-task join failure is an internal fault, not a property of
    /// the hostname or the network.
    pub fn from_join_error(err: tokio::task::JoinError) -> Self {
        PingError::Io(io::Error::other(err))
    }
}

impl fmt::Display for PingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PingError::Permission(e) => {
                write!(f, "ICMP ping requires root privileges (raw socket): {}", e)
            }
            PingError::Resolution { host, reason } => {
                write!(f, "invalid hostname '{}': {}", host, reason)
            }
            PingError::Timeout { seconds } => {
                write!(f, "no reply within {} seconds", seconds)
            }
            PingError::Io(e) => write!(f, "socket I/O error: {}", e),
        }
    }
}

impl std::error::Error for PingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PingError::Permission(e) | PingError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for PingError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::PermissionDenied {
            PingError::Permission(err)
        } else {
            PingError::Io(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_is_classified() {
        let err = PingError::from(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, PingError::Permission(_)));
        assert!(err.to_string().contains("root privileges"));
    }

    #[test]
    fn test_other_io_errors_stay_io() {
        let err = PingError::from(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert!(matches!(err, PingError::Io(_)));
    }

    #[tokio::test]
    async fn test_join_failure_is_internal_not_resolution() {
        let join_err = tokio::spawn(async { panic!("worker died") })
            .await
            .unwrap_err();
        let err = PingError::from_join_error(join_err);
        assert!(matches!(err, PingError::Io(_)));
        assert!(!err.to_string().contains("hostname"));
    }
}
