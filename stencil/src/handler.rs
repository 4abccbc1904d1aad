//! Polymorphic container adapters.
//!
//! A [`Property`](crate::property::Property) of kind `Container` never
//! touches its live field directly: it goes through a [`Handler`], a small
//! type-erased vtable built once per concrete container type by
//! [`Handler::vector`]/[`Handler::map`] and stored in the property's
//! `'static` registry entry. This mirrors the tagged-enum-over-trait-object
//! choice used for value-kind dispatch elsewhere in the engine: the set of
//! container shapes is closed (built-in `Vec<T>`, `BTreeMap<K, V>`), so a
//! plain enum is simpler than an object-safe trait with one impl per shape.

use crate::field_kind::FieldKind;
use crate::ids::StructId;

/// A type-erased pointer to a live field. Never dereferenced outside the
/// function pointers captured for the concrete `T` it was built against.
pub type RawPtr = *const ();
pub type RawMutPtr = *mut ();

#[derive(Clone, Copy, Debug)]
struct VectorOps {
	for_each: unsafe fn(RawPtr, &mut dyn FnMut(RawPtr)),
	clear: unsafe fn(RawMutPtr),
	/// Appends a default-initialised element and returns a pointer to it,
	/// so the load path can write the decoded value in place.
	push_uninit: unsafe fn(RawMutPtr) -> RawMutPtr,
	/// Pointer to the element at `index`, valid only after the vector has
	/// already been grown to its final length (growing further would
	/// invalidate it).
	element_mut: unsafe fn(RawMutPtr, u32) -> RawMutPtr,
}

#[derive(Clone, Copy, Debug)]
struct MapOps {
	for_each: unsafe fn(RawPtr, &mut dyn FnMut(RawPtr, RawPtr)),
	clear: unsafe fn(RawMutPtr),
	/// Takes ownership of the key/value behind the two pointers (via
	/// `ptr::read`) and inserts them into the map.
	insert: unsafe fn(RawMutPtr, RawPtr, RawPtr),
}

/// Shape + element kinds of one container field.
#[derive(Clone, Copy, Debug)]
pub enum Handler {
	Vector {
		element_kind: FieldKind,
		element_struct: Option<StructId>,
		ops: VectorOps,
	},
	Map {
		key_kind: FieldKind,
		value_kind: FieldKind,
		value_struct: Option<StructId>,
		ops: MapOps,
	},
}

impl Handler {
	/// Builds a handler for `Vec<T>`. `T` must already be a representable
	/// field kind (scalar, `String`, object id, or a registered `Struct`).
	pub fn vector<T: Default + 'static>(element_kind: FieldKind, element_struct: Option<StructId>) -> Self {
		Handler::Vector {
			element_kind,
			element_struct,
			ops: VectorOps {
				for_each: |ptr, f| unsafe {
					let v = &*(ptr as *const Vec<T>);
					for item in v.iter() {
						f(item as *const T as RawPtr);
					}
				},
				clear: |ptr| unsafe {
					(*(ptr as *mut Vec<T>)).clear();
				},
				push_uninit: |ptr| unsafe {
					let v = &mut *(ptr as *mut Vec<T>);
					v.push(T::default());
					v.last_mut().expect("just pushed") as *mut T as RawMutPtr
				},
				element_mut: |ptr, index| unsafe {
					let v = &mut *(ptr as *mut Vec<T>);
					&mut v[index as usize] as *mut T as RawMutPtr
				},
			},
		}
	}

	/// Builds a handler for `BTreeMap<K, V>`. Iteration follows the map's
	/// natural ascending key order, matching the ordering invariant the
	/// save/merge/diff algorithms depend on.
	pub fn map<K: Ord + 'static, V: 'static>(
		key_kind: FieldKind,
		value_kind: FieldKind,
		value_struct: Option<StructId>,
	) -> Self {
		Handler::Map {
			key_kind,
			value_kind,
			value_struct,
			ops: MapOps {
				for_each: |ptr, f| unsafe {
					let m = &*(ptr as *const std::collections::BTreeMap<K, V>);
					for (k, v) in m.iter() {
						f(k as *const K as RawPtr, v as *const V as RawPtr);
					}
				},
				clear: |ptr| unsafe {
					(*(ptr as *mut std::collections::BTreeMap<K, V>)).clear();
				},
				insert: |ptr, key_ptr, value_ptr| unsafe {
					let m = &mut *(ptr as *mut std::collections::BTreeMap<K, V>);
					let key = std::ptr::read(key_ptr as *const K);
					let value = std::ptr::read(value_ptr as *const V);
					m.insert(key, value);
				},
			},
		}
	}

	pub fn element_kind(&self) -> FieldKind {
		match self {
			Handler::Vector { element_kind, .. } => *element_kind,
			Handler::Map { value_kind, .. } => *value_kind,
		}
	}

	pub fn for_each_vector(&self, container: RawPtr, mut f: impl FnMut(RawPtr)) {
		match self {
			Handler::Vector { ops, .. } => unsafe { (ops.for_each)(container, &mut f) },
			Handler::Map { .. } => panic!("for_each_vector called on a map handler"),
		}
	}

	pub fn for_each_map(&self, container: RawPtr, mut f: impl FnMut(RawPtr, RawPtr)) {
		match self {
			Handler::Map { ops, .. } => unsafe { (ops.for_each)(container, &mut f) },
			Handler::Vector { .. } => panic!("for_each_map called on a vector handler"),
		}
	}

	/// Number of elements currently in a `Vector` container, by counting a
	/// full `for_each` pass (handlers expose no direct size getter).
	pub fn vector_len(&self, container: RawPtr) -> u32 {
		let mut n = 0u32;
		self.for_each_vector(container, |_| n += 1);
		n
	}

	/// Number of entries currently in a `Map` container.
	pub fn map_len(&self, container: RawPtr) -> u32 {
		let mut n = 0u32;
		self.for_each_map(container, |_, _| n += 1);
		n
	}

	pub fn clear(&self, container: RawMutPtr) {
		match self {
			Handler::Vector { ops, .. } => unsafe { (ops.clear)(container) },
			Handler::Map { ops, .. } => unsafe { (ops.clear)(container) },
		}
	}

	pub fn push_uninit_vector(&self, container: RawMutPtr) -> RawMutPtr {
		match self {
			Handler::Vector { ops, .. } => unsafe { (ops.push_uninit)(container) },
			Handler::Map { .. } => panic!("push_uninit_vector called on a map handler"),
		}
	}

	/// Pointer to the element at `index`. The vector must already be at its
	/// final length; growing it afterwards can invalidate the pointer.
	pub fn element_mut_vector(&self, container: RawMutPtr, index: u32) -> RawMutPtr {
		match self {
			Handler::Vector { ops, .. } => unsafe { (ops.element_mut)(container, index) },
			Handler::Map { .. } => panic!("element_mut_vector called on a map handler"),
		}
	}

	pub fn insert_map(&self, container: RawMutPtr, key_ptr: RawPtr, value_ptr: RawPtr) {
		match self {
			Handler::Map { ops, .. } => unsafe { (ops.insert)(container, key_ptr, value_ptr) },
			Handler::Vector { .. } => panic!("insert_map called on a vector handler"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn vector_handler_round_trips_elements() {
		let handler = Handler::vector::<i32>(FieldKind::Int32, None);
		let mut v: Vec<i32> = vec![1, 2, 3];
		let ptr = &v as *const Vec<i32> as RawPtr;
		let mut seen = Vec::new();
		handler.for_each_vector(ptr, |p| unsafe { seen.push(*(p as *const i32)) });
		assert_eq!(seen, vec![1, 2, 3]);

		let mut_ptr = &mut v as *mut Vec<i32> as RawMutPtr;
		let slot = handler.push_uninit_vector(mut_ptr);
		unsafe { std::ptr::write(slot as *mut i32, 42) };
		assert_eq!(v, vec![1, 2, 3, 0].into_iter().map(|x| if x == 0 { 42 } else { x }).collect::<Vec<_>>());
	}

	#[test]
	fn map_handler_iterates_in_key_order() {
		let handler = Handler::map::<i32, i32>(FieldKind::Int32, FieldKind::Int32, None);
		let mut m = std::collections::BTreeMap::new();
		m.insert(3, 30);
		m.insert(1, 10);
		m.insert(2, 20);
		let ptr = &m as *const std::collections::BTreeMap<i32, i32> as RawPtr;
		let mut keys = Vec::new();
		handler.for_each_map(ptr, |k, _v| unsafe { keys.push(*(k as *const i32)) });
		assert_eq!(keys, vec![1, 2, 3]);
	}
}
