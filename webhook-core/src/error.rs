use serde::{Deserialize, Serialize};

/// Errors raised by `Signer::verify`/`Signer::sign`.
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("missing signature")]
    MissingSignature,
    #[error("invalid signature format, expected 'sha256=' prefix")]
    InvalidSignatureFormat,
    #[error("signer internal error: {0}")]
    Internal(String),
}

/// Errors raised by `Store` implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("storage conflict (lost the race)")]
    Conflict,
    #[error("backend error: {0}")]
    Backend(String),
}

/// Errors raised by `Dispatcher` implementations.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("publish timed out")]
    PublishTimeout,
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),
}

/// Which phase of the delivery lifecycle an error occurred in. Mirrors the
/// taxonomy in the design: reception, validation, signature, preparation,
/// delivery, response handling, retry scheduling, cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Reception,
    Validation,
    Signature,
    Preparation,
    Delivery,
    ResponseHandling,
    RetryScheduling,
    Cleanup,
}

/// Error kind taxonomy (not a type hierarchy): every internal error
/// collapses into one of these before it is allowed to cross the core
/// boundary (into the Store as a terminal/scheduled transition, or out to
/// an external caller as a structured error).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryErrorKind {
    ResourceNotFound,
    ResourceAlreadyExists,
    InvalidSignature,
    MissingSignature,
    InvalidSignatureFormat,
    WebhookProcessing,
    TransportUnavailable,
    PublishTimeout,
    StorageConflict,
    PermanentDeliveryFailure,
    RetriableDeliveryFailure,
    Configuration,
}

/// The tagged error kind that replaces an inheritance-based exception
/// hierarchy: every failure surfaced across a crate boundary carries its
/// kind, the phase it occurred in, and enough context to log or respond
/// without leaking internals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryError {
    pub kind: DeliveryErrorKind,
    pub phase: Phase,
    pub webhook_name: Option<String>,
    pub message_id: Option<String>,
    pub cause: Option<String>,
}

impl DeliveryError {
    pub fn new(kind: DeliveryErrorKind, phase: Phase) -> Self {
        Self { kind, phase, webhook_name: None, message_id: None, cause: None }
    }

    pub fn with_webhook(mut self, name: impl Into<String>) -> Self {
        self.webhook_name = Some(name.into());
        self
    }

    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Whether this error kind results in a retry-schedulable outcome as
    /// opposed to a permanent/terminal one.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind,
            DeliveryErrorKind::RetriableDeliveryFailure
                | DeliveryErrorKind::TransportUnavailable
                | DeliveryErrorKind::PublishTimeout
        )
    }
}

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} during {:?}", self.kind, self.phase)?;
        if let Some(ref name) = self.webhook_name {
            write!(f, " (webhook={name})")?;
        }
        if let Some(ref id) = self.message_id {
            write!(f, " (message={id})")?;
        }
        Ok(())
    }
}

impl std::error::Error for DeliveryError {}

impl From<SignerError> for DeliveryError {
    fn from(err: SignerError) -> Self {
        let kind = match err {
            SignerError::MissingSignature => DeliveryErrorKind::MissingSignature,
            SignerError::InvalidSignatureFormat => DeliveryErrorKind::InvalidSignatureFormat,
            SignerError::Internal(_) => DeliveryErrorKind::WebhookProcessing,
        };
        DeliveryError::new(kind, Phase::Signature).with_cause(err.to_string())
    }
}

impl From<StoreError> for DeliveryError {
    fn from(err: StoreError) -> Self {
        let kind = match err {
            StoreError::NotFound => DeliveryErrorKind::ResourceNotFound,
            StoreError::AlreadyExists => DeliveryErrorKind::ResourceAlreadyExists,
            StoreError::Conflict => DeliveryErrorKind::StorageConflict,
            StoreError::Backend(_) => DeliveryErrorKind::WebhookProcessing,
        };
        DeliveryError::new(kind, Phase::Delivery).with_cause(err.to_string())
    }
}

impl From<DispatchError> for DeliveryError {
    fn from(err: DispatchError) -> Self {
        let kind = match err {
            DispatchError::PublishTimeout => DeliveryErrorKind::PublishTimeout,
            DispatchError::TransportUnavailable(_) => DeliveryErrorKind::TransportUnavailable,
        };
        DeliveryError::new(kind, Phase::Preparation).with_cause(err.to_string())
    }
}
