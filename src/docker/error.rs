use thiserror::Error;

/// Failures surfaced by the Docker client adapter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DockerError {
    /// Daemon unreachable, or the connection dropped mid-request/stream.
    #[error("Docker connection error: {0}")]
    Connection(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A statistics report could not be decoded or lacks a required counter.
    #[error("Malformed stats sample: {0}")]
    MalformedSample(String),

    #[error("Docker daemon returned {status}: {message}")]
    Daemon { status: u16, message: String },
}

impl DockerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DockerError::NotFound(_))
    }
}

impl From<bollard::errors::Error> for DockerError {
    fn from(err: bollard::errors::Error) -> Self {
        use bollard::errors::Error as BollardError;

        match err {
            BollardError::DockerResponseServerError { status_code: 404, message } => {
                DockerError::NotFound(message)
            }
            BollardError::DockerResponseServerError { status_code, message } => {
                DockerError::Daemon { status: status_code, message }
            }
            BollardError::JsonDataError { message, .. } => DockerError::MalformedSample(message),
            BollardError::JsonSerdeError { err } => DockerError::MalformedSample(err.to_string()),
            other => DockerError::Connection(other.to_string()),
        }
    }
}
