use std::io;

use crate::group_path::GroupPathError;
use crate::item_string::ItemStringError;
use crate::reader::SyntaxError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreErrorCode {
    Io,
    MalformedProfile,
    ProfileNotFound,
    UnrecognizedFormat,
    InvalidGroupPath,
    OrphanReferenceDetected,
    GroupNotFound,
    GroupExists,
    InvalidInput,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code:?}: {message}")]
pub struct CoreError {
    pub code: CoreErrorCode,
    pub message: String,
}

impl CoreError {
    pub fn new(code: CoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn io(context: impl AsRef<str>, err: io::Error) -> Self {
        Self::new(CoreErrorCode::Io, format!("{}: {err}", context.as_ref()))
    }
}

impl From<SyntaxError> for CoreError {
    fn from(err: SyntaxError) -> Self {
        Self::new(CoreErrorCode::MalformedProfile, err.to_string())
    }
}

impl From<ItemStringError> for CoreError {
    fn from(err: ItemStringError) -> Self {
        Self::new(CoreErrorCode::UnrecognizedFormat, err.to_string())
    }
}

impl From<GroupPathError> for CoreError {
    fn from(err: GroupPathError) -> Self {
        Self::new(CoreErrorCode::InvalidGroupPath, err.to_string())
    }
}
