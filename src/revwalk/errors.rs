//! Error type for revision walking.

use std::fmt;

use crate::odb::ObjectError;

/// Errors from configuring or running a revision walk.
#[derive(Debug)]
#[non_exhaustive]
pub enum RevWalkError {
    /// Object access or parse failure.
    Object(ObjectError),
    /// API misuse, e.g. combining a merge-base filter with a tree filter.
    IllegalState { detail: String },
}

impl RevWalkError {
    /// Builds an illegal-state error.
    #[inline]
    pub fn illegal_state(detail: impl Into<String>) -> Self {
        Self::IllegalState {
            detail: detail.into(),
        }
    }
}

impl fmt::Display for RevWalkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object(err) => write!(f, "{err}"),
            Self::IllegalState { detail } => write!(f, "illegal state: {detail}"),
        }
    }
}

impl std::error::Error for RevWalkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Object(err) => Some(err),
            Self::IllegalState { .. } => None,
        }
    }
}

impl From<ObjectError> for RevWalkError {
    fn from(err: ObjectError) -> Self {
        Self::Object(err)
    }
}
