use thiserror::Error;

/// Failure taxonomy for relay operations.
///
/// None of these are fatal: HTTP callers get a 400 with the message in a
/// machine-readable `error` field, socket callers get a logged warning and
/// no protocol-level error (breaking the event stream over a bad payload
/// would take down an otherwise healthy dashboard connection).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelayError {
    /// A required identifier was absent from an externally supplied payload.
    /// The field name is interpolated into the Portuguese message the
    /// storefront clients already expect.
    #[error("{0} é obrigatório")]
    MissingField(&'static str),

    /// The requested funnel stage is not one of the fixed checkout stages.
    #[error("etapa de funil desconhecida: {0}")]
    UnknownStage(String),

    /// The operation referenced a connection no longer in the registry.
    /// Disconnect races are expected; callers treat this as a no-op.
    #[error("conexão desconhecida")]
    UnknownConnection,
}
