//! The external collaborator that turns live object references into
//! portable [`ObjectId`]s and back.
//!
//! Stencil never owns an object graph or a lifetime/GC story; it only
//! reflects `#[derive(Reflected)]` types into tags and bytes. Anything of
//! `FieldKind::ObjectRef` is opaque to the engine and resolved entirely
//! through whatever [`ObjectSolver`] the caller supplies to save/load.

use crate::ids::ObjectId;

/// Resolves object references during save (pointer/handle -> id) and load
/// (id -> pointer/handle). A minimal in-memory solver backed by a `Vec` is
/// provided for tests and simple embeddings; real hosts (an asset manager,
/// an ECS world) are expected to provide their own.
pub trait ObjectSolver {
	/// Returns the id to save for a live reference, or
	/// [`crate::ids::NULL_OBJECT_ID`] if the reference is empty.
	fn id_for(&self, raw_ptr: usize) -> ObjectId;

	/// Resolves a saved id back into a live reference (as an opaque
	/// `usize`, to be reinterpreted by the caller's own glue), or `None`
	/// if the id no longer resolves to anything live.
	fn resolve(&self, id: ObjectId) -> Option<usize>;
}

/// A trivial solver for tests and small embeddings: assigns ids in
/// insertion order and resolves by index.
#[derive(Default)]
pub struct TableObjectSolver {
	table: std::cell::RefCell<Vec<usize>>,
}

impl ObjectSolver for TableObjectSolver {
	fn id_for(&self, raw_ptr: usize) -> ObjectId {
		if raw_ptr == 0 {
			return crate::ids::NULL_OBJECT_ID;
		}
		let mut table = self.table.borrow_mut();
		if let Some(index) = table.iter().position(|&p| p == raw_ptr) {
			return index as ObjectId;
		}
		table.push(raw_ptr);
		(table.len() - 1) as ObjectId
	}

	fn resolve(&self, id: ObjectId) -> Option<usize> {
		if id == crate::ids::NULL_OBJECT_ID {
			return None;
		}
		self.table.borrow().get(id as usize).copied()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn null_pointer_resolves_to_null_id() {
		let solver = TableObjectSolver::default();
		assert_eq!(solver.id_for(0), crate::ids::NULL_OBJECT_ID);
	}

	#[test]
	fn same_pointer_yields_same_id() {
		let solver = TableObjectSolver::default();
		let a = solver.id_for(0x1000);
		let b = solver.id_for(0x1000);
		assert_eq!(a, b);
		assert_eq!(solver.resolve(a), Some(0x1000));
	}
}
