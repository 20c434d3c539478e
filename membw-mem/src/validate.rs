//! Post-run copy validation

use std::fmt;

use thiserror::Error;

use crate::element::StreamElement;

/// Which part of the destination failed the check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// Elements covered by a partition, expected to equal the source
    Copied,
    /// Trailing elements no worker touches, expected to keep their initial value
    Untouched,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Copied => f.write_str("copied"),
            Region::Untouched => f.write_str("untouched"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("validation failed in {region} region at index {index}: expected {expected}, found {found}")]
pub struct ValidationError {
    pub region: Region,
    pub index: usize,
    pub expected: f64,
    pub found: f64,
}

/// Checks that `dst[..processed]` equals `src[..processed]` and that the rest
/// of `dst` still holds `untouched`.
pub fn validate_copy<T: StreamElement>(
    src: &[T],
    dst: &[T],
    processed: usize,
    untouched: T,
) -> Result<(), ValidationError> {
    debug_assert_eq!(src.len(), dst.len());
    let processed = processed.min(dst.len());

    if let Some(index) = (0..processed).find(|&i| dst[i] != src[i]) {
        return Err(ValidationError {
            region: Region::Copied,
            index,
            expected: src[index].to_f64(),
            found: dst[index].to_f64(),
        });
    }

    if let Some(offset) = dst[processed..].iter().position(|&x| x != untouched) {
        let index = processed + offset;
        return Err(ValidationError {
            region: Region::Untouched,
            index,
            expected: untouched.to_f64(),
            found: dst[index].to_f64(),
        });
    }

    log::debug!(
        "validated {} copied and {} untouched elements",
        processed,
        dst.len() - processed
    );
    Ok(())
}
