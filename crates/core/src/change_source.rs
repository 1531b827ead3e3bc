//! Change source: supplies the raw text (usually a diff) a review session
//! is seeded with.

use async_trait::async_trait;

use crate::error::ChangeSourceError;

#[async_trait]
pub trait ChangeSource: Send + Sync {
    /// A short name for logs (e.g., "git").
    fn name(&self) -> &str;

    /// Return the pending changes as text. An empty string means there is
    /// nothing to review.
    async fn changes(&self) -> Result<String, ChangeSourceError>;
}
