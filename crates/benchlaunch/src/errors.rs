use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning a manifest and a set of overrides into a launched command
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Failed to parse document: {0}")]
    ParseError(String),

    #[error("Parameter '{name}' expects a value of type {expected}, got '{value}'")]
    TypeMismatch {
        name: String,
        expected: String,
        value: String,
    },

    #[error("Command template references unknown parameter '{0}'")]
    UnresolvedPlaceholder(String),

    #[error("Missing required parameter '{0}': provide it with -P {0}=<value>")]
    MissingParameter(String),

    #[error("Parameter '{0}' is not declared by the entry point")]
    UnknownParameter(String),

    #[error("Entry point '{0}' not found in manifest")]
    UnknownEntryPoint(String),

    #[error("Invalid parameter override '{0}': expected key=value")]
    InvalidOverride(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Subprocess exited with status: {0}")]
    SubprocessFailed(i32),
}

/// Result type for launch operations
pub type LaunchResult<T> = Result<T, LaunchError>;

impl From<serde_yaml::Error> for LaunchError {
    fn from(err: serde_yaml::Error) -> Self {
        match err.location() {
            Some(loc) => LaunchError::ParseError(format!(
                "{} (line {}, column {})",
                err,
                loc.line(),
                loc.column()
            )),
            None => LaunchError::ParseError(err.to_string()),
        }
    }
}

pub mod util {
    use super::*;
    use std::path::Path;

    /// Check if a file exists, returning a FileNotFound error if it doesn't
    pub fn ensure_file_exists<P: AsRef<Path>>(path: P) -> LaunchResult<()> {
        let path_ref = path.as_ref();
        if !path_ref.is_file() {
            return Err(LaunchError::FileNotFound(path_ref.to_path_buf()));
        }
        Ok(())
    }

    /// Read a document from disk after checking it exists
    pub fn read_document<P: AsRef<Path>>(path: P) -> LaunchResult<String> {
        ensure_file_exists(&path)?;
        Ok(std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_error_carries_location() {
        let err: serde_yaml::Error =
            serde_yaml::from_str::<serde_yaml::Value>("a: [1, 2\nb: 3").unwrap_err();
        let err = LaunchError::from(err);
        match err {
            LaunchError::ParseError(msg) => assert!(msg.contains("line")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_file() {
        let err = util::read_document("/definitely/not/here.yml").unwrap_err();
        assert!(matches!(err, LaunchError::FileNotFound(_)));
    }
}
