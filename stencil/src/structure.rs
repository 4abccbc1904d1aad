//! A structure's flat property vector, plus the index arithmetic and
//! validation that make it self-describing without any pointer or boxed
//! sub-tree.

use crate::field_kind::FieldKind;
use crate::ids::{PropertyId, StructId};
use crate::property::{Property, PropertyUsage, ResolvedField, SubType};
use crate::registry::Registry;

/// The reflected description of one `#[derive(Reflected)]` type: a name, an
/// optional super-struct to chain onto, and the flat preorder vector of
/// every field and its recursive children (see [`crate::property`]).
pub struct Structure {
	pub id: StructId,
	pub name: &'static str,
	/// Id of the structure this one extends, if any. Populated at
	/// registration time so merge/diff can bridge a derived structure's
	/// tag sequence onto its base's.
	pub super_struct: Option<StructId>,
	pub size: usize,
	properties: Vec<Property>,
}

impl Structure {
	pub fn new(id: StructId, name: &'static str, super_struct: Option<StructId>, size: usize, properties: Vec<Property>) -> Self {
		Self { id, name, super_struct, size, properties }
	}

	pub fn number_of_properties(&self) -> usize {
		self.properties.len()
	}

	pub fn get_property(&self, index: usize) -> Option<&Property> {
		self.properties.get(index)
	}

	pub fn add_property(&mut self, property: Property) {
		self.properties.push(property);
	}

	/// Index of the first property at or shallower than `index`'s own
	/// nesting level — i.e. the index one past `index`'s whole subtree.
	/// Mirrors [`DataTemplate::next_on_this_level`](crate::data_template::DataTemplate::next_on_this_level)
	/// exactly, over properties instead of tags.
	pub fn next_on_this_level(&self, index: usize) -> usize {
		let level = self.properties[index].nest_level;
		let mut i = index + 1;
		while i < self.properties.len() && self.properties[i].nest_level > level {
			i += 1;
		}
		i
	}

	/// Index of the `Main` property named `property_id`, by linear scan, or
	/// `None` if no such field exists.
	pub fn get_main_property_index(&self, property_id: PropertyId) -> Option<usize> {
		self.properties.iter().position(|p| p.usage == PropertyUsage::Main && p.id == property_id)
	}

	pub fn find_by_id(&self, property_id: PropertyId) -> Option<(usize, &Property)> {
		let index = self.get_main_property_index(property_id)?;
		Some((index, &self.properties[index]))
	}

	/// Constant-offset arithmetic from a composite property to one of its
	/// children, per the preorder layout `Array` (1 `SubType` child),
	/// `Vector` (1 `Container` entry + 1 `SubType` child) and `Map` (1
	/// `Container` entry + 2 `SubType` children) always produce.
	pub fn get_sub_property_index(&self, index: usize, sub: SubType) -> usize {
		match sub {
			SubType::ArrayElement => index + 1,
			SubType::VectorElement => index + 2,
			SubType::Key => index + 2,
			SubType::MapValue => self.next_on_this_level(index + 2),
		}
	}

	/// Byte size of the in-memory representation at `index`: recurses for
	/// `Struct` (the nested structure's own size) and `Array` (`len ×`
	/// element size); `Vector`/`Map`/`String`/`ObjectRef` report the size of
	/// their runtime placeholder, which doesn't depend on element/key/value type.
	pub fn native_field_size(&self, index: usize) -> usize {
		let Some(prop) = self.properties.get(index) else { return 0 };
		match prop.field_kind {
			FieldKind::Int8 | FieldKind::UInt8 => 1,
			FieldKind::Int16 | FieldKind::UInt16 => 2,
			FieldKind::Int32 | FieldKind::UInt32 | FieldKind::Float32 => 4,
			FieldKind::Int64 | FieldKind::UInt64 | FieldKind::Float64 => 8,
			FieldKind::String => std::mem::size_of::<String>(),
			FieldKind::ObjectRef => std::mem::size_of::<usize>(),
			FieldKind::Struct => prop.struct_id.and_then(Registry::get).map(|s| s.size).unwrap_or(0),
			FieldKind::Array => prop.array_len * self.native_field_size(index + 1),
			FieldKind::Vector => std::mem::size_of::<Vec<u8>>(),
			FieldKind::Map => std::mem::size_of::<std::collections::BTreeMap<u8, u8>>(),
		}
	}

	/// `true` iff `Main` properties appear in strictly increasing `offset`
	/// order and every `SubType`/`Container` entry is well-nested under
	/// exactly one `Main` property (the index delta between consecutive
	/// `Main` entries always equals `next_on_this_level`).
	pub fn validate(&self) -> bool {
		let mut last_offset: Option<u16> = None;
		let mut i = 0;
		while i < self.properties.len() {
			let prop = &self.properties[i];
			if prop.usage != PropertyUsage::Main || prop.nest_level != 0 {
				return false;
			}
			if let Some(prev) = last_offset {
				if prop.offset <= prev {
					return false;
				}
			}
			last_offset = Some(prop.offset);
			i = self.next_on_this_level(i);
		}
		true
	}

	/// Resolves a tag's `(property_id, sub_property_offset)` key against
	/// this (possibly mutated) structure. `sub_property_offset` is already
	/// the exact index delta from the owning `Main` property, so resolution
	/// is a single bounds-checked lookup. Returns `None` if the property no
	/// longer exists or the nesting is shallower than required;
	/// [`crate::refresh`] treats that as "drop this subtree".
	pub fn resolve(&self, property_id: PropertyId, sub_property_offset: u8) -> Option<ResolvedField> {
		let main_index = self.get_main_property_index(property_id)?;
		let index = main_index + sub_property_offset as usize;
		let prop = self.properties.get(index)?;
		Some(ResolvedField {
			field_kind: prop.field_kind,
			struct_id: prop.struct_id,
			offset: if sub_property_offset == 0 { prop.offset } else { 0 },
			property_index: index,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::field_kind::FieldKind;
	use crate::handler::Handler;
	use crate::property::PropertyFlags;

	fn main_prop(name: &'static str, field_kind: FieldKind, offset: u16) -> Property {
		Property {
			usage: PropertyUsage::Main,
			id: crate::ids::fnv1a_32(name),
			name,
			field_kind,
			struct_id: None,
			offset,
			flags: PropertyFlags::empty(),
			array_len: 0,
			handler: None,
			nest_level: 0,
		}
	}

	fn sample_structure() -> Structure {
		let mut properties = vec![main_prop("value", FieldKind::Int32, 0), main_prop("name", FieldKind::String, 4)];
		let tags_id = crate::ids::fnv1a_32("tags");
		properties.push(Property {
			usage: PropertyUsage::Main,
			id: tags_id,
			name: "tags",
			field_kind: FieldKind::Vector,
			struct_id: None,
			offset: 24,
			flags: PropertyFlags::empty(),
			array_len: 0,
			handler: None,
			nest_level: 0,
		});
		properties.push(Property {
			usage: PropertyUsage::Container,
			id: tags_id,
			name: "tags",
			field_kind: FieldKind::Vector,
			struct_id: None,
			offset: 0,
			flags: PropertyFlags::empty(),
			array_len: 0,
			handler: Some(Handler::vector::<i32>(FieldKind::Int32, None)),
			nest_level: 1,
		});
		properties.push(Property {
			usage: PropertyUsage::SubType,
			id: tags_id,
			name: "tags",
			field_kind: FieldKind::Int32,
			struct_id: None,
			offset: 0,
			flags: PropertyFlags::empty(),
			array_len: 0,
			handler: None,
			nest_level: 1,
		});
		Structure::new(crate::ids::fnv1a_32("Sample"), "Sample", None, 32, properties)
	}

	#[test]
	fn resolve_finds_main_property_by_id() {
		let s = sample_structure();
		let resolved = s.resolve(crate::ids::fnv1a_32("name"), 0).unwrap();
		assert_eq!(resolved.field_kind, FieldKind::String);
		assert_eq!(resolved.offset, 4);
	}

	#[test]
	fn resolve_descends_into_vector_element() {
		let s = sample_structure();
		let resolved = s.resolve(crate::ids::fnv1a_32("tags"), 2).unwrap();
		assert_eq!(resolved.field_kind, FieldKind::Int32);
	}

	#[test]
	fn resolve_returns_none_for_unknown_id() {
		let s = sample_structure();
		assert!(s.resolve(0xDEAD_BEEF, 0).is_none());
	}

	#[test]
	fn get_sub_property_index_matches_vector_layout() {
		let s = sample_structure();
		let vector_index = s.get_main_property_index(crate::ids::fnv1a_32("tags")).unwrap();
		assert_eq!(s.get_sub_property_index(vector_index, SubType::VectorElement), vector_index + 2);
	}

	#[test]
	fn validate_accepts_strictly_increasing_offsets() {
		assert!(sample_structure().validate());
	}

	#[test]
	fn validate_rejects_out_of_order_offsets() {
		let mut s = sample_structure();
		let Structure { properties, .. } = &mut s;
		properties.swap(0, 1);
		assert!(!s.validate());
	}
}
