// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run tag validation

use thiserror::Error;

/// Tags must stay below this many bytes.
pub const MAX_TAG_LEN: usize = 30;

/// Why a tag was rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TagError {
    #[error("tag is {0} bytes, must be under {MAX_TAG_LEN}")]
    TooLong(usize),
    #[error("tag contains non-printable byte 0x{0:02x}")]
    NotPrintable(u8),
}

/// Check that a tag is short and printable.
///
/// Rejected tags are logged by the caller, never raised to handlers.
pub fn validate_tag(tag: &str) -> Result<(), TagError> {
    if tag.len() >= MAX_TAG_LEN {
        return Err(TagError::TooLong(tag.len()));
    }
    if let Some(b) = tag.bytes().find(|&b| b < 0x20) {
        return Err(TagError::NotPrintable(b));
    }
    Ok(())
}

#[cfg(test)]
#[path = "tag_tests.rs"]
mod tests;
