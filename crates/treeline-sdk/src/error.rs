use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ledger error: {0}")]
    Ledger(#[from] treeline_ledger::LedgerError),

    #[error("reference error: {0}")]
    Ref(#[from] treeline_refs::RefError),

    #[error("release preparation failed: {0}")]
    ReleasePrep(#[from] treeline_refs::ReleasePrepError),

    #[error("propagation error: {0}")]
    Propagate(#[from] treeline_propagate::PropagateError),
}

pub type SdkResult<T> = Result<T, SdkError>;
