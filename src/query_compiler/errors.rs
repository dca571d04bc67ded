use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompileError {
    #[error("Node '{alias}' has neither a table descriptor nor a sub-query (resolve the object type through the catalog first)")]
    MissingTableDescriptor { alias: String },
    #[error("Invalid graph mode: {0}")]
    InvalidGraphMode(String),
    #[error("Join configuration error: {0}")]
    JoinConfigurationError(String),
    #[error("Link type unresolved: {0}")]
    LinkTypeUnresolved(String),
    #[error("Keyword `{0}` is missing from the dialect table")]
    UnresolvedKeyword(String),
    #[error("Node id {0} does not belong to this graph")]
    UnknownNode(usize),
}

/// Helper for creating compile errors with context
impl CompileError {
    /// Create a JoinConfigurationError naming the two participating aliases
    pub fn join_error_with_context(
        message: impl Into<String>,
        prev_alias: &str,
        next_alias: &str,
    ) -> Self {
        CompileError::JoinConfigurationError(format!(
            "{}\n  Context: joining '{}' to '{}'",
            message.into(),
            prev_alias,
            next_alias
        ))
    }

    /// Create a LinkTypeUnresolved error with context information
    pub fn link_error_with_context(message: impl Into<String>, context: impl Into<String>) -> Self {
        CompileError::LinkTypeUnresolved(format!(
            "{}\n  Context: {}",
            message.into(),
            context.into()
        ))
    }
}
