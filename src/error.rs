use thiserror::Error;

/// Main error type for GraphMem
#[derive(Error, Debug)]
pub enum GraphmemError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed caller input, rejected before any storage call
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A named entity does not exist in the store
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    /// MCP protocol errors
    #[error("MCP protocol error: {0}")]
    McpProtocol(String),
}

/// Convenient Result type using GraphmemError
pub type Result<T> = std::result::Result<T, GraphmemError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphmemError::InvalidInput("Entity name cannot be empty".to_string());
        assert!(err.to_string().contains("Invalid input"));
        assert!(err.to_string().contains("Entity name cannot be empty"));
    }

    #[test]
    fn test_error_from_rusqlite() {
        let rusqlite_err = rusqlite::Error::InvalidQuery;
        let err: GraphmemError = rusqlite_err.into();
        assert!(matches!(err, GraphmemError::Database(_)));
    }

    #[test]
    fn test_entity_not_found_names_entity() {
        let err = GraphmemError::EntityNotFound("Alice".to_string());
        assert_eq!(err.to_string(), "Entity not found: Alice");
    }
}
