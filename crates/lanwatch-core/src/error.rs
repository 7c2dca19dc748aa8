use thiserror::Error;

/// Returned when a starter tag is not one of `manual`, `scheduler`, `api`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown scan starter: {0} (expected manual, scheduler, or api)")]
pub struct ParseStarterError(pub String);
