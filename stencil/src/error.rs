//! Error types surfaced by the save/load/delta engines.
//!
//! Only invariant violations that make a result unusable are represented
//! here. Schema drift encountered during a layout refresh (a property that
//! no longer exists, a type that changed kind) is not an error: it is
//! logged via `tracing::warn!` and the affected subtree is dropped. See
//! [`crate::refresh`].

use std::fmt;

/// Errors returned by [`crate::save`], [`crate::load`] and [`crate::delta`].
#[derive(Debug)]
pub enum TemplateError {
	/// No [`Structure`](crate::structure::Structure) is registered under this id.
	UnknownStruct(crate::ids::StructId),
	/// The byte blob ended before a value's fixed-size payload could be read.
	UnexpectedEndOfData,
	/// A string payload was not valid UTF-8.
	InvalidUtf8,
	/// Two tag sequences being merged/diffed belong to incompatible structures
	/// (neither is a super-struct of the other).
	IncompatibleStructures { lower: crate::ids::StructId, higher: crate::ids::StructId },
}

impl fmt::Display for TemplateError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TemplateError::UnknownStruct(id) => write!(f, "no structure registered for id {id:#010X}"),
			TemplateError::UnexpectedEndOfData => write!(f, "byte blob ended before payload was fully read"),
			TemplateError::InvalidUtf8 => write!(f, "string payload was not valid UTF-8"),
			TemplateError::IncompatibleStructures { lower, higher } => write!(
				f,
				"structure {higher:#010X} is not derived from {lower:#010X}; cannot merge/diff"
			),
		}
	}
}

impl std::error::Error for TemplateError {}

pub type Result<T> = std::result::Result<T, TemplateError>;
