//! Property descriptors, flattened into one preorder vector per structure.
//!
//! A structure's property list holds every field's real (`Main`) entry,
//! interleaved with the `SubType`/`Container` entries its composite fields
//! need, in exactly the order a depth-first walk visits them: an `Array`
//! is followed by one `SubType` child; a `Vector` by a `Container` entry
//! then one `SubType` child; a `Map` by a `Container` entry then two
//! `SubType` children (key, then value). There is no pointer or boxed
//! sub-tree anywhere in this module — [`Structure::next_on_this_level`](crate::structure::Structure::next_on_this_level)
//! is the only way to skip a subtree, and [`Structure::get_sub_property_index`](crate::structure::Structure::get_sub_property_index)
//! the only way to step into one.

use crate::field_kind::FieldKind;
use crate::handler::Handler;
use crate::ids::{PropertyId, StructId};

bitflags::bitflags! {
	/// Per-property save/load behaviour flags. Only meaningful on `Main` entries.
	#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
	pub struct PropertyFlags: u8 {
		/// Always elide this scalar/string/object-ref field when it holds
		/// its type's default, even if the save call didn't request
		/// [`SaveFlags::SKIP_NATIVE_DEFAULT_VALUES`](crate::save::SaveFlags::SKIP_NATIVE_DEFAULT_VALUES).
		/// Never forces a value to be kept; map keys are always kept
		/// regardless of this flag.
		const SKIP_NATIVE_DEFAULT_VALUES = 1 << 0;
	}
}

/// What a property entry represents.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum PropertyUsage {
	/// A real field at `offset` in the owning structure.
	Main,
	/// A recursive child of a composite `Main` property: an array element,
	/// a vector element, or a map key/value.
	SubType,
	/// The polymorphic container adapter immediately following a `Vector`
	/// or `Map` `Main`/`SubType` entry. Carries no offset and is never
	/// itself addressed by a tag.
	Container,
}

/// The four ways to step from a composite property into its children,
/// matching the constant-offset arithmetic [`Structure::get_sub_property_index`](crate::structure::Structure::get_sub_property_index)
/// performs.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SubType {
	ArrayElement,
	VectorElement,
	Key,
	MapValue,
}

/// One entry of a structure's flat property vector.
#[derive(Clone, Debug)]
pub struct Property {
	pub usage: PropertyUsage,
	/// Id of the owning `Main` property, carried onto every descendant so a
	/// tag can be re-resolved by `(id, sub_property_offset)` alone during a
	/// layout refresh. Equal to this entry's own id when `usage` is `Main`.
	pub id: PropertyId,
	/// Field name for `Main`; the owning field's name for everything
	/// beneath it, so a descendant tag's descriptor still reads naturally.
	pub name: &'static str,
	pub field_kind: FieldKind,
	/// Target structure for `Struct`/`ObjectRef` kinds.
	pub struct_id: Option<StructId>,
	/// Byte offset within the owning struct's layout. Only meaningful on `Main`.
	pub offset: u16,
	pub flags: PropertyFlags,
	/// Declared length, for a `Main`/`SubType` entry of kind `Array`.
	pub array_len: usize,
	/// Present only on `Container`-usage entries.
	pub handler: Option<Handler>,
	/// Depth in this structure's property tree; 0 for every `Main` entry.
	pub nest_level: u8,
}

impl Property {
	pub fn struct_id_of(&self) -> Option<StructId> {
		self.struct_id
	}

	/// Whether this field's default-elision is forced on regardless of the
	/// save call's flags. Never overrides `force_keep_defaults` (map keys).
	pub fn always_skips_default(&self, force_keep_defaults: bool) -> bool {
		!force_keep_defaults
			&& self.flags.contains(PropertyFlags::SKIP_NATIVE_DEFAULT_VALUES)
			&& (self.field_kind.is_numeric() || self.field_kind == FieldKind::String || self.field_kind == FieldKind::ObjectRef)
	}
}

/// Resolution of a tag's `(property_id, sub_property_offset)` key against a
/// (possibly mutated) [`Structure`](crate::structure::Structure).
#[derive(Clone, Copy, Debug)]
pub struct ResolvedField {
	pub field_kind: FieldKind,
	pub struct_id: Option<StructId>,
	/// Only meaningful when the tag addresses the main property directly
	/// (`sub_property_offset == 0`).
	pub offset: u16,
	pub property_index: usize,
}
