use thiserror::Error;

use crate::traits::CollaboratorError;

/// Failures that abort a reconciliation run.
///
/// Skips (no target, ambiguous match, size conflict) are decisions, not errors;
/// see [`crate::matcher::MatchDecision`].
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Invalid version string format: {0}")]
    InvalidVersionFormat(String),
    #[error("Malformed query response: {0}")]
    MalformedResponse(String),
    #[error("Could not encode payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}
