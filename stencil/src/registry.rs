//! Process-wide type registry.
//!
//! Registration happens once, early (typically from each type's
//! `#[derive(Reflected)]`-generated static initialiser calling
//! [`Registry::register`]), after which lookups dominate and contention is
//! effectively nil. Under the `editor-reflection` feature the catalog also
//! exposes [`Registry::replace`], which publishes a mutated layout for a
//! `StructId` already in use; [`crate::refresh`] is what keeps previously
//! saved templates coherent with the new layout afterwards.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use crate::ids::StructId;
use crate::structure::Structure;

type Map = HashMap<StructId, Arc<Structure>, nohash_hasher::BuildNoHashHasher<StructId>>;

/// The process-wide structure catalog.
pub struct Registry {
	structures: RwLock<Map>,
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

impl Registry {
	fn global() -> &'static Registry {
		REGISTRY.get_or_init(|| Registry { structures: RwLock::new(Map::default()) })
	}

	/// Registers a structure. Panics if a structure is already registered
	/// under the same id; use [`Registry::replace`] (requires
	/// `editor-reflection`) to update a live definition instead.
	pub fn register(structure: Structure) {
		let registry = Self::global();
		let mut map = registry.structures.write().expect("registry lock poisoned");
		let id = structure.id;
		let previous = map.insert(id, Arc::new(structure));
		assert!(previous.is_none(), "structure {id:#010X} registered twice");
	}

	/// Looks up a structure by id, returning an owned handle (a cheap
	/// refcount bump) so callers never hold the registry lock past the call.
	pub fn get(id: StructId) -> Option<Arc<Structure>> {
		Self::global().structures.read().expect("registry lock poisoned").get(&id).cloned()
	}

	/// Looks up a structure by id and hands a reference to `f` while the
	/// read lock is held.
	pub fn with<R>(id: StructId, f: impl FnOnce(Option<&Structure>) -> R) -> R {
		let guard = Self::global().structures.read().expect("registry lock poisoned");
		f(guard.get(&id).map(|s| s.as_ref()))
	}

	/// Publishes a new layout for a `StructId` that may already have
	/// in-flight [`DataTemplate`](crate::data_template::DataTemplate)
	/// instances built against its previous shape. Callers are expected to
	/// run [`crate::refresh::refresh_after_layout_changed`] on any such
	/// templates afterwards.
	#[cfg(feature = "editor-reflection")]
	pub fn replace(structure: Structure) {
		let registry = Self::global();
		let id = structure.id;
		registry.structures.write().expect("registry lock poisoned").insert(id, Arc::new(structure));
		tracing::info!(struct_id = %format!("{id:#010X}"), "published updated structure layout");
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn dummy(id: StructId, name: &'static str) -> Structure {
		Structure::new(id, name, None, 0, vec![])
	}

	#[test]
	fn register_then_lookup_round_trips() {
		let id = crate::ids::fnv1a_32("RegistryRoundTripProbe");
		Registry::register(dummy(id, "RegistryRoundTripProbe"));
		Registry::with(id, |s| assert_eq!(s.expect("just registered").name, "RegistryRoundTripProbe"));
	}

	#[test]
	fn unknown_id_resolves_to_none() {
		Registry::with(0xABCD_1234, |s| assert!(s.is_none()));
	}
}
