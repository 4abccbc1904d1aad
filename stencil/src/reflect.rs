//! The seam between plain Rust types and the registry.

use std::sync::Arc;

use crate::ids::StructId;
use crate::registry::Registry;
use crate::structure::Structure;

/// Implemented by every `#[derive(Reflected)]` type. Hand-writing an impl is
/// supported (and is exactly what the derive macro expands to) for types
/// whose layout needs to be described manually.
pub trait Reflected: Sized + 'static {
	/// Stable id for this type, conventionally `fnv1a_32(stringify!(Self))`.
	fn struct_id() -> StructId;

	/// Builds this type's [`Structure`] description. Called exactly once,
	/// by [`Reflected::register`], and cached in the process-wide registry
	/// from then on.
	fn build_structure() -> Structure;

	/// Registers this type's structure if it is not already present. Safe
	/// to call repeatedly (e.g. once per translation unit that uses the
	/// type); idempotent rather than `Registry::register`'s register-once
	/// semantics.
	fn register() {
		if Registry::get(Self::struct_id()).is_none() {
			Registry::register(Self::build_structure());
		}
	}

	/// Looks up this type's registered structure, registering it on first
	/// use if necessary.
	fn structure() -> Arc<Structure> {
		Self::register();
		Registry::get(Self::struct_id()).expect("just registered")
	}
}
