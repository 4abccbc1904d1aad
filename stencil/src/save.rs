//! Live object -> [`DataTemplate`] traversal.
//!
//! A DFS preorder walk over a structure's flat property vector. Every
//! value, including composites, speculatively pushes its tag first and
//! recurses (or encodes) after; if nothing ends up written under it — a
//! composite with no non-default children, or a scalar whose value was
//! elided by `SKIP_NATIVE_DEFAULT_VALUES` — the speculative tag is popped
//! again. Map keys are always kept regardless of the skip-defaults flag: a
//! key is part of the map's shape, not a value subject to elision. Bytes
//! accumulate through a [`wire::ByteWriter`] so every write site shares one
//! place that tracks the running offset a tag's `data_offset` is stamped with.

use crate::data_template::DataTemplate;
use crate::field_kind::FieldKind;
use crate::handler::RawPtr;
use crate::ids::StructId;
use crate::property::SubType;
use crate::reflect::Reflected;
use crate::registry::Registry;
use crate::solver::ObjectSolver;
use crate::structure::Structure;
use crate::tag::Tag;
use crate::wire::ByteWriter;

bitflags::bitflags! {
	#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
	pub struct SaveFlags: u8 {
		/// Elide scalar/string/object-ref fields holding their type's
		/// default value, shrinking the template at the cost of relying on
		/// the loader default-constructing the field first.
		const SKIP_NATIVE_DEFAULT_VALUES = 1 << 0;
	}
}

/// Saves `value` into a fresh [`DataTemplate`].
pub fn save<T: Reflected>(value: &T, solver: &dyn ObjectSolver, flags: SaveFlags) -> DataTemplate {
	let structure = T::structure();
	let mut tags = Vec::new();
	let mut writer = ByteWriter::default();
	let ptr = value as *const T as RawPtr;
	save_fields(ptr, &structure, solver, flags, 0, &mut tags, &mut writer);
	DataTemplate { struct_id: T::struct_id(), tags, data: writer.buf }
}

fn save_fields(base_ptr: RawPtr, structure: &Structure, solver: &dyn ObjectSolver, flags: SaveFlags, nest_level: u8, tags: &mut Vec<Tag>, writer: &mut ByteWriter) {
	let mut index = 0;
	while index < structure.number_of_properties() {
		let prop = structure.get_property(index).expect("index in range");
		let field_ptr = unsafe { (base_ptr as *const u8).add(prop.offset as usize) as RawPtr };
		save_value(field_ptr, structure, index, index, 0, false, solver, flags, nest_level, tags, writer);
		index = structure.next_on_this_level(index);
	}
}

/// Saves one value (a `Main` property, or a nested element/key/value of a
/// composite). `main_index` is the index of the owning `Main` property;
/// `sub_property_offset` is always `index - main_index`. Returns whether
/// anything was actually written.
#[allow(clippy::too_many_arguments)]
fn save_value(
	ptr: RawPtr,
	structure: &Structure,
	index: usize,
	main_index: usize,
	element_index: u8,
	is_key: bool,
	solver: &dyn ObjectSolver,
	flags: SaveFlags,
	nest_level: u8,
	tags: &mut Vec<Tag>,
	writer: &mut ByteWriter,
) -> bool {
	let prop = structure.get_property(index).expect("valid property index");
	let main_id = structure.get_property(main_index).expect("valid main index").id;
	let sub_offset = (index - main_index) as u8;

	let tag_index = tags.len();
	tags.push(Tag::new(main_id, writer.offset() as u16, element_index, nest_level, is_key, prop.field_kind, sub_offset, index as u32, 0));

	let force_keep_defaults = is_key;
	let default_skippable = !force_keep_defaults && (flags.contains(SaveFlags::SKIP_NATIVE_DEFAULT_VALUES) || prop.always_skips_default(force_keep_defaults));

	let field_kind = prop.field_kind;
	let struct_id = prop.struct_id;
	let array_len = prop.array_len;

	let was_saved = match field_kind {
		FieldKind::ObjectRef => save_object_ref(ptr, struct_id.unwrap_or(crate::ids::WRONG_ID), solver, default_skippable, writer),
		FieldKind::Struct => save_struct(ptr, struct_id, solver, flags, nest_level, tags, writer),
		FieldKind::Array => save_array(ptr, structure, index, main_index, array_len, solver, flags, nest_level, tags, writer),
		FieldKind::Vector => save_vector(ptr, structure, index, main_index, solver, flags, nest_level, tags, writer),
		FieldKind::Map => save_map(ptr, structure, index, main_index, solver, flags, nest_level, tags, writer),
		_ => save_simple(ptr, field_kind, default_skippable, writer),
	};

	if !was_saved {
		tags.truncate(tag_index);
	}
	was_saved
}

fn save_simple(ptr: RawPtr, kind: FieldKind, skip_defaults: bool, writer: &mut ByteWriter) -> bool {
	macro_rules! write_scalar {
		($ty: ty) => {{
			let value = unsafe { *(ptr as *const $ty) };
			if skip_defaults && value == <$ty>::default() {
				false
			} else {
				writer.write(&value);
				true
			}
		}};
	}

	match kind {
		FieldKind::Int8 => write_scalar!(i8),
		FieldKind::Int16 => write_scalar!(i16),
		FieldKind::Int32 => write_scalar!(i32),
		FieldKind::Int64 => write_scalar!(i64),
		FieldKind::UInt8 => write_scalar!(u8),
		FieldKind::UInt16 => write_scalar!(u16),
		FieldKind::UInt32 => write_scalar!(u32),
		FieldKind::UInt64 => write_scalar!(u64),
		FieldKind::Float32 => write_scalar!(f32),
		FieldKind::Float64 => write_scalar!(f64),
		FieldKind::String => {
			let value = unsafe { &*(ptr as *const String) };
			if skip_defaults && value.is_empty() {
				false
			} else {
				writer.write_string(value);
				true
			}
		},
		_ => unreachable!("save_simple called with a composite or object-ref field kind"),
	}
}

/// Writes `(StructId, ObjectId)`, resolving the live reference through
/// `solver`. A null reference writes `NULL_OBJECT_ID` and the property's
/// declared struct id (`WRONG_ID` if unknown).
fn save_object_ref(ptr: RawPtr, declared_struct: StructId, solver: &dyn ObjectSolver, skip_defaults: bool, writer: &mut ByteWriter) -> bool {
	let raw = unsafe { *(ptr as *const usize) };
	let id = solver.id_for(raw);
	if skip_defaults && id == crate::ids::NULL_OBJECT_ID {
		return false;
	}
	writer.write(&declared_struct);
	writer.write(&id);
	true
}

fn save_struct(ptr: RawPtr, struct_id: Option<StructId>, solver: &dyn ObjectSolver, flags: SaveFlags, nest_level: u8, tags: &mut Vec<Tag>, writer: &mut ByteWriter) -> bool {
	let Some(struct_id) = struct_id else { return false };
	let nested = match Registry::get(struct_id) {
		Some(s) => s,
		None => {
			tracing::warn!(struct_id = %format!("{struct_id:#010X}"), "save: unknown nested structure, skipping subtree");
			return false;
		},
	};
	let before = tags.len();
	save_fields(ptr, &nested, solver, flags, nest_level + 1, tags, writer);
	tags.len() > before
}

#[allow(clippy::too_many_arguments)]
fn save_array(ptr: RawPtr, structure: &Structure, index: usize, main_index: usize, len: usize, solver: &dyn ObjectSolver, flags: SaveFlags, nest_level: u8, tags: &mut Vec<Tag>, writer: &mut ByteWriter) -> bool {
	let element_index_in_props = structure.get_sub_property_index(index, SubType::ArrayElement);
	let stride = structure.native_field_size(element_index_in_props);
	let mut any = false;
	for i in 0..len {
		let elem_ptr = unsafe { (ptr as *const u8).add(i * stride) as RawPtr };
		let saved = save_value(elem_ptr, structure, element_index_in_props, main_index, i.min(u8::MAX as usize) as u8, false, solver, flags, nest_level + 1, tags, writer);
		any |= saved;
	}
	any
}

/// Vector/Map tags always keep their length prefix and their own tag: an
/// empty container is distinct from an absent field and is never subject
/// to default elision.
#[allow(clippy::too_many_arguments)]
fn save_vector(ptr: RawPtr, structure: &Structure, index: usize, main_index: usize, solver: &dyn ObjectSolver, flags: SaveFlags, nest_level: u8, tags: &mut Vec<Tag>, writer: &mut ByteWriter) -> bool {
	let element_index_in_props = structure.get_sub_property_index(index, SubType::VectorElement);
	let handler_index = element_index_in_props - 1;
	let handler = structure.get_property(handler_index).and_then(|p| p.handler.as_ref()).expect("vector property carries a container entry");
	let len = handler.vector_len(ptr);
	assert!(len <= u16::MAX as u32, "vector exceeds the 16-bit length prefix");
	writer.write(&(len as u16));
	let mut element_index: u8 = 0;
	handler.for_each_vector(ptr, |elem_ptr| {
		save_value(elem_ptr, structure, element_index_in_props, main_index, element_index, false, solver, flags, nest_level + 1, tags, writer);
		element_index = element_index.saturating_add(1);
	});
	true
}

#[allow(clippy::too_many_arguments)]
fn save_map(ptr: RawPtr, structure: &Structure, index: usize, main_index: usize, solver: &dyn ObjectSolver, flags: SaveFlags, nest_level: u8, tags: &mut Vec<Tag>, writer: &mut ByteWriter) -> bool {
	let key_index = structure.get_sub_property_index(index, SubType::Key);
	let value_index = structure.get_sub_property_index(index, SubType::MapValue);
	let handler_index = key_index - 1;
	let handler = structure.get_property(handler_index).and_then(|p| p.handler.as_ref()).expect("map property carries a container entry");
	let len = handler.map_len(ptr);
	assert!(len <= u16::MAX as u32, "map exceeds the 16-bit length prefix");
	writer.write(&(len as u16));
	let mut element_index: u8 = 0;
	handler.for_each_map(ptr, |key_ptr, value_ptr| {
		// Keys are always kept regardless of elision; values follow the
		// normal rules.
		save_value(key_ptr, structure, key_index, main_index, element_index, true, solver, flags, nest_level + 1, tags, writer);
		save_value(value_ptr, structure, value_index, main_index, element_index, false, solver, flags, nest_level + 1, tags, writer);
		element_index = element_index.saturating_add(1);
	});
	true
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::property::{Property, PropertyFlags, PropertyUsage};
	use crate::solver::TableObjectSolver;

	struct Sample {
		value: i32,
		name: String,
	}

	impl Reflected for Sample {
		fn struct_id() -> StructId {
			crate::ids::fnv1a_32("save::tests::Sample")
		}

		fn build_structure() -> Structure {
			Structure::new(
				Self::struct_id(),
				"Sample",
				None,
				std::mem::size_of::<Sample>(),
				vec![
					Property {
						usage: PropertyUsage::Main,
						id: crate::ids::fnv1a_32("value"),
						name: "value",
						field_kind: FieldKind::Int32,
						struct_id: None,
						offset: std::mem::offset_of!(Sample, value) as u16,
						flags: PropertyFlags::SKIP_NATIVE_DEFAULT_VALUES,
						array_len: 0,
						handler: None,
						nest_level: 0,
					},
					Property {
						usage: PropertyUsage::Main,
						id: crate::ids::fnv1a_32("name"),
						name: "name",
						field_kind: FieldKind::String,
						struct_id: None,
						offset: std::mem::offset_of!(Sample, name) as u16,
						flags: PropertyFlags::empty(),
						array_len: 0,
						handler: None,
						nest_level: 0,
					},
				],
			)
		}
	}

	#[test]
	fn global_flag_elides_every_default_field() {
		let sample = Sample { value: 0, name: String::new() };
		let solver = TableObjectSolver::default();
		let dt = save(&sample, &solver, SaveFlags::SKIP_NATIVE_DEFAULT_VALUES);
		assert!(dt.tags.is_empty());
	}

	#[test]
	fn per_property_flag_elides_its_default_even_without_the_global_flag() {
		let sample = Sample { value: 0, name: String::new() };
		let solver = TableObjectSolver::default();
		let dt = save(&sample, &solver, SaveFlags::empty());
		// `value` is always-elide-on-default; `name` carries no such flag and
		// is kept even though it too holds its default.
		assert_eq!(dt.tags.len(), 1);
		assert_eq!(dt.tags[0].field_type(), FieldKind::String);
	}

	#[test]
	fn non_default_scalar_is_kept() {
		let sample = Sample { value: 7, name: "hi".into() };
		let solver = TableObjectSolver::default();
		let dt = save(&sample, &solver, SaveFlags::SKIP_NATIVE_DEFAULT_VALUES);
		assert_eq!(dt.tags.len(), 2);
	}
}
