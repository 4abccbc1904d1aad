//! The 16-byte bit-packed tag record emitted once per saved value.

use crate::field_kind::FieldKind;
use crate::ids::PropertyId;

/// How a tag's `property_index` should be interpreted when resolving the
/// owning [`Property`](crate::property::Property) during load/refresh/delta.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum PropertyUsage {
	/// Tag reflects a real field; `property_index` indexes the structure's
	/// property list directly.
	Main,
	/// Tag reflects a recursive composite child (array element, vector
	/// element, map key or map value); resolved jointly with
	/// `sub_property_offset` against the parent property.
	SubType,
	/// Tag was synthesised by a polymorphic container adapter and owns no
	/// property of its own.
	Handler,
}

/// A single 16-byte record in a [`DataTemplate`](crate::data_template::DataTemplate)'s
/// flat preorder tag vector.
///
/// Natural Rust layout (`u32` then `u64`) already packs to exactly 16 bytes
/// on every platform stencil targets; no `#[repr(packed)]` is required.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Tag {
	pub property_id: PropertyId,
	packed: u64,
}

const DATA_OFFSET_BITS: u32 = 16;
const ELEMENT_INDEX_BITS: u32 = 8;
const NEST_LEVEL_BITS: u32 = 7;
const IS_KEY_BITS: u32 = 1;
const FIELD_TYPE_BITS: u32 = 5;
const SUB_PROPERTY_OFFSET_BITS: u32 = 5;
const PROPERTY_INDEX_BITS: u32 = 14;
const FLAGS_BITS: u32 = 8;

const DATA_OFFSET_SHIFT: u32 = 0;
const ELEMENT_INDEX_SHIFT: u32 = DATA_OFFSET_SHIFT + DATA_OFFSET_BITS;
const NEST_LEVEL_SHIFT: u32 = ELEMENT_INDEX_SHIFT + ELEMENT_INDEX_BITS;
const IS_KEY_SHIFT: u32 = NEST_LEVEL_SHIFT + NEST_LEVEL_BITS;
const FIELD_TYPE_SHIFT: u32 = IS_KEY_SHIFT + IS_KEY_BITS;
const SUB_PROPERTY_OFFSET_SHIFT: u32 = FIELD_TYPE_SHIFT + FIELD_TYPE_BITS;
const PROPERTY_INDEX_SHIFT: u32 = SUB_PROPERTY_OFFSET_SHIFT + SUB_PROPERTY_OFFSET_BITS;
const FLAGS_SHIFT: u32 = PROPERTY_INDEX_SHIFT + PROPERTY_INDEX_BITS;

const fn mask(bits: u32) -> u64 {
	(1u64 << bits) - 1
}

/// Flags carried per-tag (bit 0: value was elided and defaults were skipped
/// for this subtree; higher bits reserved).
pub mod flags {
	pub const SKIPPED_DEFAULT: u8 = 1 << 0;
}

impl Tag {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		property_id: PropertyId,
		data_offset: u16,
		element_index: u8,
		nest_level: u8,
		is_key: bool,
		field_type: FieldKind,
		sub_property_offset: u8,
		property_index: u32,
		tag_flags: u8,
	) -> Self {
		assert!(nest_level as u64 <= mask(NEST_LEVEL_BITS), "nest_level overflows its 7-bit field");
		assert!(sub_property_offset as u64 <= mask(SUB_PROPERTY_OFFSET_BITS), "sub_property_offset overflows its 5-bit field");
		assert!(property_index as u64 <= mask(PROPERTY_INDEX_BITS), "property_index overflows its 14-bit field");

		let packed = (data_offset as u64) << DATA_OFFSET_SHIFT
			| (element_index as u64) << ELEMENT_INDEX_SHIFT
			| (nest_level as u64) << NEST_LEVEL_SHIFT
			| (is_key as u64) << IS_KEY_SHIFT
			| (field_type as u64) << FIELD_TYPE_SHIFT
			| (sub_property_offset as u64) << SUB_PROPERTY_OFFSET_SHIFT
			| (property_index as u64) << PROPERTY_INDEX_SHIFT
			| (tag_flags as u64) << FLAGS_SHIFT;

		Self { property_id, packed }
	}

	pub fn data_offset(&self) -> u16 {
		((self.packed >> DATA_OFFSET_SHIFT) & mask(DATA_OFFSET_BITS)) as u16
	}

	pub fn element_index(&self) -> u8 {
		((self.packed >> ELEMENT_INDEX_SHIFT) & mask(ELEMENT_INDEX_BITS)) as u8
	}

	pub fn nest_level(&self) -> u8 {
		((self.packed >> NEST_LEVEL_SHIFT) & mask(NEST_LEVEL_BITS)) as u8
	}

	pub fn is_key(&self) -> bool {
		(self.packed >> IS_KEY_SHIFT) & mask(IS_KEY_BITS) != 0
	}

	pub fn field_type(&self) -> FieldKind {
		let raw = ((self.packed >> FIELD_TYPE_SHIFT) & mask(FIELD_TYPE_BITS)) as u8;
		FieldKind::from_repr(raw).expect("tag packed an invalid field kind discriminant")
	}

	pub fn sub_property_offset(&self) -> u8 {
		((self.packed >> SUB_PROPERTY_OFFSET_SHIFT) & mask(SUB_PROPERTY_OFFSET_BITS)) as u8
	}

	pub fn property_index(&self) -> u32 {
		((self.packed >> PROPERTY_INDEX_SHIFT) & mask(PROPERTY_INDEX_BITS)) as u32
	}

	pub fn tag_flags(&self) -> u8 {
		((self.packed >> FLAGS_SHIFT) & mask(FLAGS_BITS)) as u8
	}

	pub fn usage(&self) -> PropertyUsage {
		if self.property_index() == crate::ids::SUPER_STRUCT_PROPERTY_INDEX {
			return PropertyUsage::Handler;
		}
		if self.sub_property_offset() > 0 {
			PropertyUsage::SubType
		} else {
			PropertyUsage::Main
		}
	}

	/// The packed `u64` half of this tag, for wire serialisation.
	pub fn raw_packed(&self) -> u64 {
		self.packed
	}

	/// Reconstructs a tag from its two already-decoded wire halves,
	/// trusting the caller (the archive reader) that `packed` was produced
	/// by a prior [`Tag::raw_packed`].
	pub fn from_raw(property_id: PropertyId, packed: u64) -> Self {
		Self { property_id, packed }
	}

	/// Whether this tag is the synthetic super-struct bridging pseudo-tag.
	pub fn is_super_struct(&self) -> bool {
		self.property_id == crate::ids::SUPER_STRUCT_PROPERTY_ID
			&& self.property_index() == crate::ids::SUPER_STRUCT_PROPERTY_INDEX
	}
}

impl std::fmt::Debug for Tag {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Tag")
			.field("property_id", &self.property_id)
			.field("data_offset", &self.data_offset())
			.field("element_index", &self.element_index())
			.field("nest_level", &self.nest_level())
			.field("is_key", &self.is_key())
			.field("field_type", &self.field_type())
			.field("sub_property_offset", &self.sub_property_offset())
			.field("property_index", &self.property_index())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tag_is_sixteen_bytes() {
		assert_eq!(std::mem::size_of::<Tag>(), 16);
	}

	#[test]
	fn round_trips_every_field() {
		let tag = Tag::new(1234, 4096, 7, 63, true, FieldKind::Map, 17, 9000, 0b101);
		assert_eq!(tag.property_id, 1234);
		assert_eq!(tag.data_offset(), 4096);
		assert_eq!(tag.element_index(), 7);
		assert_eq!(tag.nest_level(), 63);
		assert!(tag.is_key());
		assert_eq!(tag.field_type(), FieldKind::Map);
		assert_eq!(tag.sub_property_offset(), 17);
		assert_eq!(tag.property_index(), 9000);
		assert_eq!(tag.tag_flags(), 0b101);
	}

	#[test]
	fn super_struct_tag_is_recognised() {
		let tag = Tag::new(
			crate::ids::SUPER_STRUCT_PROPERTY_ID,
			0,
			0,
			0,
			false,
			FieldKind::Struct,
			0,
			crate::ids::SUPER_STRUCT_PROPERTY_INDEX,
			0,
		);
		assert!(tag.is_super_struct());
		assert_eq!(tag.usage(), PropertyUsage::Handler);
	}
}
