use std::path::PathBuf;

use thiserror::Error;

use crate::tabs::TabId;

/// Application-wide result type alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// I/O errors from filesystem operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Terminal initialization or rendering errors.
    #[error("Terminal error: {0}")]
    Terminal(String),

    /// Invalid path provided by the user.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// A directory vanished or could not be listed.
    #[error("Directory unreadable: {path}: {reason}")]
    DirectoryUnreadable { path: PathBuf, reason: String },

    /// A file could not be read back from disk.
    #[error("Cannot read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    /// The host bridge reported that a write did not complete.
    #[error("Write did not complete: {0}")]
    WriteFailed(PathBuf),

    /// Native watcher failures.
    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// Settings store (de)serialization failures.
    #[error("Settings error: {0}")]
    Settings(#[from] serde_json::Error),

    /// A tab id that is not (or no longer) open.
    #[error("No open tab with id {0}")]
    TabNotFound(TabId),

    /// An untitled buffer was saved without a target path.
    #[error("No path to save to")]
    NoSavePath,

    /// Save-as onto a path that another tab already owns.
    #[error("Already open in another tab: {0}")]
    PathAlreadyOpen(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Io(_)));
        assert!(app_err.to_string().contains("file not found"));
    }

    #[test]
    fn terminal_error_display() {
        let err = AppError::Terminal("failed to enter raw mode".into());
        assert_eq!(err.to_string(), "Terminal error: failed to enter raw mode");
    }

    #[test]
    fn directory_unreadable_display() {
        let err = AppError::DirectoryUnreadable {
            path: PathBuf::from("/proj/gone"),
            reason: "not found".into(),
        };
        assert_eq!(err.to_string(), "Directory unreadable: /proj/gone: not found");
    }

    #[test]
    fn tab_not_found_display() {
        let err = AppError::TabNotFound(TabId(7));
        assert_eq!(err.to_string(), "No open tab with id 7");
    }

    #[test]
    fn json_error_conversion() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let app_err: AppError = json_err.into();
        assert!(matches!(app_err, AppError::Settings(_)));
    }
}
