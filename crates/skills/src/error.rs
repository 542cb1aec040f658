use std::path::PathBuf;

use serde::Serialize;

/// Coarse classification of a skill operation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Traversal,
    Execution,
    Timeout,
    PartialSuccess,
}

/// Failures reported by registry, sandbox and creation operations.
///
/// None of these abort a conversation: callers render them into the
/// tool-result payload.
#[derive(thiserror::Error, Debug)]
pub enum SkillError {
    #[error("Invalid skill name: '{0}'. Skill names must not contain '/', '\\', or '..'")]
    InvalidName(String),

    #[error("Invalid file path")]
    InvalidPath,

    #[error("Skill '{0}' not found in skills folder")]
    SkillNotFound(String),

    #[error("Skill '{0}' already exists")]
    SkillExists(String),

    #[error("SKILL.MD not found for skill '{0}'")]
    DocNotFound(String),

    #[error("File '{file_path}' not found in skill '{skill_name}'")]
    FileNotFound { skill_name: String, file_path: String },

    #[error("Path traversal detected: cannot access files outside skill folder")]
    Traversal,

    #[error("Writing to '{0}' is not allowed (hidden files and the venv are protected)")]
    Forbidden(String),

    #[error("'{0}' is too large (>1MB)")]
    TooLarge(String),

    #[error("Cannot read '{0}': invalid UTF-8")]
    NotUtf8(String),

    #[error("Skill '{0}' does not have a venv. Cannot execute script.")]
    RuntimeMissing(String),

    #[error("Skills folder not found at path: {}", .0.display())]
    RootMissing(PathBuf),

    #[error("Skills folder path is not a directory: {}", .0.display())]
    RootNotDir(PathBuf),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl SkillError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidName(_) | Self::InvalidPath | Self::Forbidden(_) | Self::SkillExists(_) => {
                ErrorKind::Validation
            }
            Self::SkillNotFound(_)
            | Self::DocNotFound(_)
            | Self::FileNotFound { .. }
            | Self::RootMissing(_)
            | Self::RootNotDir(_) => ErrorKind::NotFound,
            Self::Traversal => ErrorKind::Traversal,
            Self::TooLarge(_) | Self::NotUtf8(_) | Self::RuntimeMissing(_) | Self::Io { .. } => {
                ErrorKind::Execution
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, SkillError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_skill() {
        let err = SkillError::RuntimeMissing("calc".into());
        assert_eq!(err.to_string(), "Skill 'calc' does not have a venv. Cannot execute script.");
        assert_eq!(err.kind(), ErrorKind::Execution);
    }

    #[test]
    fn traversal_has_its_own_kind() {
        assert_eq!(SkillError::Traversal.kind(), ErrorKind::Traversal);
        assert_eq!(
            SkillError::InvalidName("../x".into()).kind(),
            ErrorKind::Validation
        );
    }
}
