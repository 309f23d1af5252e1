use thiserror::Error;

/// Failure of a single transition.
///
/// Cleanup has always run by the time one of these reaches the caller.
#[derive(Debug, Error)]
pub enum IllusoryError {
    /// A lifecycle hook failed or its future resolved to an error.
    #[error("{hook} hook failed")]
    Hook {
        hook: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl IllusoryError {
    /// Name of the hook that failed.
    pub fn hook(&self) -> &'static str {
        match self {
            Self::Hook { hook, .. } => hook,
        }
    }
}
