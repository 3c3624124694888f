//! Raw layout: any file path is an artifact and its own identity.

use crate::constants::RAW_LAYOUT;
use crate::{StorageError, StorageResult};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawCoordinates {
    pub path: String,
}

impl fmt::Display for RawCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

pub fn parse_coordinates(path: &str) -> StorageResult<RawCoordinates> {
    let path = path.trim_matches('/');
    if path.is_empty() {
        return Err(StorageError::MalformedCoordinates {
            layout: RAW_LAYOUT,
            path: path.to_owned(),
            reason: "the repository root is not an artifact".into(),
        });
    }
    Ok(RawCoordinates {
        path: path.to_owned(),
    })
}
