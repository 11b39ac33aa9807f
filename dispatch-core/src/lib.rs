pub mod carrier;
pub mod order;
pub mod warehouse;

/// Error taxonomy for the waybill and shipment core.
///
/// Variants are grouped by how callers are expected to react:
/// terminal input problems (`InvalidArgument`, `AlreadyExists`,
/// `NotFound`), terminal carrier rejections (`AuthError`,
/// `ValidationError`, `Decode`), retryable carrier trouble
/// (`RateLimited`, `Transient`), setup problems (`Configuration`),
/// and soft failures handled by degrading (`CarrierDegraded`).
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Carrier rejected credentials: {0}")]
    AuthError(String),

    /// Carrier rejected the payload semantics. The carrier's remark is
    /// preserved verbatim for operator diagnosis.
    #[error("Carrier validation failure: {0}")]
    ValidationError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Transient carrier failure: {0}")]
    Transient(String),

    #[error("Carrier not configured: {0}")]
    Configuration(String),

    /// Recognized soft failure (e.g. insufficient wallet balance).
    /// Callers degrade to a locally-tracked record instead of aborting.
    #[error("Carrier degraded: {0}")]
    CarrierDegraded(String),

    #[error("Carrier response did not match the expected shape: {0}")]
    Decode(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    /// Whether a bounded retry is worth attempting.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DispatchError::RateLimited(_) | DispatchError::Transient(_)
        )
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;
