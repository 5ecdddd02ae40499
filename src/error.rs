use thiserror::Error;

use crate::runtime::SubsystemError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("XR runtime is not available on this platform")]
    RuntimeUnavailable,
    #[error("XR initialization finished without an active loader")]
    LoaderUnavailable,
    #[error("XR loader is active but its subsystems failed to start: {0}")]
    SubsystemStartFailure(#[from] SubsystemError),
    #[error("No camera is available to apply the display mode to")]
    RenderTargetUnavailable,
    #[error("XR initialization gave up after {attempts} attempts")]
    RetryBudgetExhausted {
        attempts: u32,
        #[source]
        last: Box<SessionError>,
    },
}

impl SessionError {
    /// Whether the automatic retry policy may act on this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SessionError::RuntimeUnavailable
                | SessionError::LoaderUnavailable
                | SessionError::SubsystemStartFailure(_)
        )
    }

    /// The failure that caused this error, looking through [`SessionError::RetryBudgetExhausted`].
    pub fn root_cause(&self) -> &SessionError {
        match self {
            SessionError::RetryBudgetExhausted { last, .. } => last.root_cause(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
