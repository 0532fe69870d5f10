//! The main Error type for wpcraft

use crate::{ErrorKind, ErrorStatus};
use std::fmt;

/// The unified error type for all wpcraft operations.
///
/// This error type provides:
/// - `kind`: What type of error occurred
/// - `message`: Human-readable description
/// - `status`: Whether the error is retryable
/// - `operation`: What operation caused the error
/// - `context`: Key-value pairs for debugging
/// - `source`: The underlying error (if any)
///
/// # Example
///
/// ```rust
/// use wpcraft_error::{Error, ErrorKind, ErrorStatus};
///
/// let err = Error::new(ErrorKind::CommandTimeout, "docker compose up did not finish")
///     .with_operation("docker::compose_up")
///     .with_status(ErrorStatus::Temporary)
///     .with_context("project", "wordpress")
///     .with_context("timeout_secs", "120");
///
/// assert_eq!(err.kind(), ErrorKind::CommandTimeout);
/// assert!(err.status().is_retryable());
/// ```
pub struct Error {
    kind: ErrorKind,
    message: String,
    status: ErrorStatus,
    operation: &'static str,
    context: Vec<(&'static str, String)>,
    source: Option<anyhow::Error>,
}

impl Error {
    /// Create a new error with the given kind and message
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let status = if kind.is_retryable() {
            ErrorStatus::Temporary
        } else {
            ErrorStatus::Permanent
        };

        Self {
            kind,
            message: message.into(),
            status,
            operation: "",
            context: Vec::new(),
            source: None,
        }
    }

    // =========================================================================
    // Getters
    // =========================================================================

    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the error status
    pub fn status(&self) -> ErrorStatus {
        self.status
    }

    /// Get the operation that caused this error
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Get the context key-value pairs
    pub fn context(&self) -> &[(&'static str, String)] {
        &self.context
    }

    /// Get the source error (if any)
    pub fn source_ref(&self) -> Option<&anyhow::Error> {
        self.source.as_ref()
    }

    // =========================================================================
    // Builders (chainable)
    // =========================================================================

    /// Set the error status
    pub fn with_status(mut self, status: ErrorStatus) -> Self {
        self.status = status;
        self
    }

    /// Mark as temporary (retryable)
    pub fn temporary(mut self) -> Self {
        self.status = ErrorStatus::Temporary;
        self
    }

    /// Mark as permanent (not retryable)
    pub fn permanent(mut self) -> Self {
        self.status = ErrorStatus::Permanent;
        self
    }

    /// Set the operation that caused this error.
    ///
    /// If an operation was already set, the previous one is moved to context
    /// as "called" to preserve the call chain.
    pub fn with_operation(mut self, operation: &'static str) -> Self {
        if !self.operation.is_empty() {
            self.context.push(("called", self.operation.to_string()));
        }
        self.operation = operation;
        self
    }

    /// Add context to the error
    pub fn with_context(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.context.push((key, value.into()));
        self
    }

    /// Set the source error.
    ///
    /// # Panics (debug only)
    /// Panics in debug mode if source was already set.
    pub fn set_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        debug_assert!(self.source.is_none(), "source error already set");
        self.source = Some(source.into());
        self
    }

    // =========================================================================
    // Status mutations
    // =========================================================================

    /// Mark as persistent after failed retries
    pub fn persist(mut self) -> Self {
        self.status = self.status.persist();
        self
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        self.status.is_retryable()
    }
}

// =============================================================================
// Display - compact, single-line format for logs
// =============================================================================

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) at {}", self.kind, self.status, self.operation)?;

        if !self.context.is_empty() {
            write!(f, ", context {{ ")?;
            for (i, (key, value)) in self.context.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}: {}", key, value)?;
            }
            write!(f, " }}")?;
        }

        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }

        Ok(())
    }
}

// =============================================================================
// Debug - verbose, multi-line format for debugging
// =============================================================================

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({}) at {}", self.kind, self.status, self.operation)?;

        if !self.message.is_empty() {
            writeln!(f)?;
            writeln!(f, "    Message: {}", self.message)?;
        }

        if !self.context.is_empty() {
            writeln!(f)?;
            writeln!(f, "    Context:")?;
            for (key, value) in &self.context {
                writeln!(f, "        {}: {}", key, value)?;
            }
        }

        if let Some(source) = &self.source {
            writeln!(f)?;
            writeln!(f, "    Source: {:?}", source)?;
        }

        Ok(())
    }
}

// =============================================================================
// std::error::Error implementation
// =============================================================================

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// =============================================================================
// Convenient From implementations (be careful not to leak raw errors!)
// =============================================================================

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::FileNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::IoFailed,
        };
        Error::new(kind, err.to_string())
            .with_operation("io")
            .set_source(err)
    }
}

// =============================================================================
// Convenience constructors
// =============================================================================

impl Error {
    /// Create an Unexpected error
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, message)
    }

    /// Create an Unsupported error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unsupported, message)
    }

    /// Create a ConfigInvalid error for a specific field
    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(ErrorKind::ConfigInvalid, format!("{}: {}", field, reason.into()))
            .with_context("field", field)
    }

    /// Create an InferenceFailed error
    pub fn inference_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InferenceFailed, message)
    }

    /// Create a ToolNotFound error
    pub fn tool_not_found(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(ErrorKind::ToolNotFound, format!("tool '{}' is not available", name))
            .with_context("tool", name)
    }

    /// Create a ContainerNotFound error
    pub fn container_not_found(container: impl Into<String>) -> Self {
        let container = container.into();
        Self::new(ErrorKind::ContainerNotFound, format!("container '{}' not found", container))
            .with_context("container", container)
    }

    /// Create a CommandFailed error
    pub fn command_failed(program: impl Into<String>, reason: impl Into<String>) -> Self {
        let program = program.into();
        Self::new(ErrorKind::CommandFailed, reason).with_context("program", program)
    }

    /// Create a CommandTimeout error
    pub fn command_timeout(program: impl Into<String>, secs: u64) -> Self {
        let program = program.into();
        Self::new(
            ErrorKind::CommandTimeout,
            format!("'{}' timed out after {} seconds", program, secs),
        )
        .with_context("program", program)
        .with_context("timeout_secs", secs.to_string())
    }

    /// Create an IterationLimitExceeded error
    pub fn iteration_limit(max: usize) -> Self {
        Self::new(
            ErrorKind::IterationLimitExceeded,
            format!("agent stopped after {} iterations without a final answer", max),
        )
        .with_context("max_iterations", max.to_string())
    }

    /// Create a ParseFailed error
    pub fn parse_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseFailed, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::new(ErrorKind::ContainerNotFound, "container 'wordpress_app' not found");
        assert_eq!(err.kind(), ErrorKind::ContainerNotFound);
        assert_eq!(err.message(), "container 'wordpress_app' not found");
        assert_eq!(err.status(), ErrorStatus::Permanent);
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::new(ErrorKind::InferenceFailed, "timeout")
            .with_operation("executor::invoke")
            .with_context("agent", "MySQLAgent")
            .with_context("iteration", "3");

        assert_eq!(err.operation(), "executor::invoke");
        assert_eq!(err.context().len(), 2);
        assert_eq!(err.context()[0], ("agent", "MySQLAgent".to_string()));
    }

    #[test]
    fn test_operation_chaining() {
        let err = Error::new(ErrorKind::IoFailed, "write failed")
            .with_operation("compose::write")
            .with_operation("orchestrator::create_compose_file");

        assert_eq!(err.operation(), "orchestrator::create_compose_file");
        assert_eq!(err.context().len(), 1);
        assert_eq!(err.context()[0], ("called", "compose::write".to_string()));
    }

    #[test]
    fn test_temporary_status() {
        let err = Error::new(ErrorKind::RateLimited, "slow down");
        assert!(err.is_retryable());

        let err = Error::new(ErrorKind::ConfigInvalid, "bad port");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_persist() {
        let err = Error::new(ErrorKind::NetworkFailed, "connection refused").temporary();
        assert!(err.is_retryable());

        let err = err.persist();
        assert!(!err.is_retryable());
        assert_eq!(err.status(), ErrorStatus::Persistent);
    }

    #[test]
    fn test_display() {
        let err = Error::new(ErrorKind::InferenceFailed, "model unavailable")
            .with_operation("provider::complete")
            .with_context("model", "claude-sonnet-4")
            .with_context("attempt", "3");

        let display = format!("{}", err);
        assert!(display.contains("InferenceFailed"));
        assert!(display.contains("temporary"));
        assert!(display.contains("provider::complete"));
        assert!(display.contains("model: claude-sonnet-4"));
    }

    #[test]
    fn test_convenience_constructors() {
        let err = Error::container_not_found("wordpress_mysql");
        assert_eq!(err.kind(), ErrorKind::ContainerNotFound);
        assert!(err.message().contains("wordpress_mysql"));

        let err = Error::command_timeout("docker", 120);
        assert_eq!(err.kind(), ErrorKind::CommandTimeout);
        assert!(err.message().contains("120 seconds"));

        let err = Error::config_invalid("wordpress.port", "must not be 0");
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
        assert_eq!(err.message(), "wordpress.port: must not be 0");

        let err = Error::iteration_limit(15);
        assert_eq!(err.kind(), ErrorKind::IterationLimitExceeded);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "config.yaml");
        let err = Error::from(io_err);
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
        assert_eq!(err.operation(), "io");
        assert!(err.source_ref().is_some());
    }

    #[test]
    fn test_set_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "broken pipe");
        let err = Error::new(ErrorKind::CommandFailed, "docker exited early").set_source(io_err);

        assert!(err.source_ref().is_some());
        assert!(format!("{:?}", err).contains("Source"));
    }
}
