use crate::state::StepStatus;
use crate::store::StoreError;
use thiserror::Error;
use uuid::Uuid;

pub type WorkflowResult<T> = std::result::Result<T, WorkflowError>;

/// Boundary category for a [`WorkflowError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Internal,
}

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("unknown workflow type: {0}")]
    UnknownWorkflow(String),

    #[error("execution {0} not found")]
    ExecutionNotFound(Uuid),

    #[error("step {step} not found in execution {execution_id}")]
    StepNotFound { execution_id: Uuid, step: String },

    #[error("step {step} is {actual}, expected {expected}")]
    InvalidState {
        step: String,
        expected: StepStatus,
        actual: StepStatus,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::UnknownWorkflow(_)
            | WorkflowError::ExecutionNotFound(_)
            | WorkflowError::StepNotFound { .. } => ErrorKind::NotFound,
            WorkflowError::InvalidState { .. } => ErrorKind::InvalidState,
            WorkflowError::Store(StoreError::NotFound(_)) => ErrorKind::NotFound,
            WorkflowError::Store(_) => ErrorKind::Internal,
        }
    }
}
