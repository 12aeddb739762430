//! Enhanced error handling for krai-cli
//!
//! Provides helpful error messages with context and suggestions for common issues.

use anyhow::Result;
use colored::Colorize;

/// Trait for adding helpful context and suggestions to errors
pub trait EnhancedError<T> {
    /// Add context with helpful suggestions
    fn context_with_help(self, msg: &str, help: &[&str]) -> Result<T>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> EnhancedError<T> for Result<T, E> {
    fn context_with_help(self, msg: &str, help: &[&str]) -> Result<T> {
        self.map_err(|e| {
            let mut error_msg = format!("{}\n\n{}", msg.red().bold(), e);

            if !help.is_empty() {
                error_msg.push_str(&format!("\n\n{}", "Possible solutions:".yellow().bold()));
                for (i, h) in help.iter().enumerate() {
                    error_msg.push_str(&format!("\n  {}. {}", i + 1, h));
                }
            }

            anyhow::anyhow!(error_msg)
        })
    }
}

/// Common error messages and help text
pub mod helpers {
    /// Document not found error help
    pub const DOCUMENT_NOT_FOUND_HELP: &[&str] = &[
        "Check that the document id is correct (use 'krai status <id>')",
        "Verify the document was actually ingested: 'krai ingest <file>'",
        "Check storage connectivity in the config file",
    ];

    /// Manufacturer pattern lookup error help
    pub const PATTERN_NOT_FOUND_HELP: &[&str] = &[
        "Create a pattern set from an existing manufacturer: 'krai create-patterns --name <M> --based-on <existing>'",
        "Create one interactively: 'krai create-patterns --name <M> --interactive'",
        "List currently registered manufacturers: 'krai list-patterns'",
    ];

    /// Storage connection error help
    pub const STORAGE_CONNECTION_HELP: &[&str] = &[
        "Verify the database url is correct in the config file",
        "Check network connectivity if using a remote libSQL/Turso database",
        "Try a local database: set database.url = \"file:./krai.db\"",
        "Validate the config file: 'krai config check'",
    ];

    /// Configuration error help
    pub const CONFIG_ERROR_HELP: &[&str] = &[
        "Check the config file at ~/.config/krai/config.toml",
        "Verify all required fields are present",
        "Use 'krai config check' to validate configuration",
    ];

    /// Invalid input error help
    pub const INVALID_INPUT_HELP: &[&str] = &[
        "Check input format and data types",
        "Use --help to see valid options",
    ];

    /// Format enhanced error message
    pub fn format_error_message(error: &str, context: &str, help: &[&str]) -> String {
        use colored::Colorize;

        let mut msg = format!("{}\n\n{}", context.red().bold(), error);

        if !help.is_empty() {
            msg.push_str(&format!("\n\n{}", "Possible solutions:".yellow().bold()));
            for (i, h) in help.iter().enumerate() {
                msg.push_str(&format!("\n  {}. {}", i + 1, h));
            }
        }

        msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enhanced_error_contains_help() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));

        let enhanced = result.context_with_help("Operation failed", &["Solution 1", "Solution 2"]);

        assert!(enhanced.is_err());
        let error_str = enhanced.unwrap_err().to_string();
        assert!(error_str.contains("Possible solutions:"));
        assert!(error_str.contains("Solution 1"));
        assert!(error_str.contains("Solution 2"));
    }

    #[test]
    fn enhanced_error_without_help() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));

        let enhanced = result.context_with_help("Operation failed", &[]);

        assert!(enhanced.is_err());
        let error_str = enhanced.unwrap_err().to_string();
        assert!(error_str.contains("Operation failed"));
        assert!(!error_str.contains("Possible solutions:"));
    }

    #[test]
    fn format_error_message_lists_numbered_solutions() {
        let formatted = helpers::format_error_message(
            "Test error",
            "Operation failed",
            &["Solution 1", "Solution 2"],
        );

        assert!(formatted.contains("Operation failed"));
        assert!(formatted.contains("Test error"));
        assert!(formatted.contains("1. Solution 1"));
        assert!(formatted.contains("2. Solution 2"));
    }
}
