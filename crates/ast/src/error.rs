//! Template tree error types

use thiserror::Error;

/// Tree operation result type
pub type AstResult<T> = Result<T, AstError>;

/// Template tree errors
#[derive(Debug, Error)]
pub enum AstError {
    #[error("Node not found: {0}")]
    NodeNotFound(u32),

    #[error("Node cannot have children")]
    NotAContainer,
}
