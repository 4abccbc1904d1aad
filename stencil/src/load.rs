//! [`DataTemplate`] -> live object traversal.
//!
//! Index-driven rather than pointer-based: every recursive call receives
//! the index of its own tag and returns the index of the first tag past
//! its subtree, exactly mirroring [`DataTemplate::next_on_this_level`].
//! Fields whose tag is simply absent (elided by `SKIP_NATIVE_DEFAULT_VALUES`
//! at save time) are left at whatever the destination already held —
//! callers are expected to default-construct before loading into it.
//!
//! Structural drift (an unknown property, a field kind that no longer
//! matches, a map whose keys aren't ordered) is not fatal here: the
//! offending subtree is logged and skipped via `next_on_this_level`, and
//! loading continues with the rest of the template. Only a mismatched top-level
//! `struct_id` — not drift inside an otherwise-matching structure — aborts
//! the whole load.

use std::io::Cursor;

use crate::data_template::DataTemplate;
use crate::error::{Result, TemplateError};
use crate::field_kind::FieldKind;
use crate::handler::RawMutPtr;
use crate::ids::StructId;
use crate::property::SubType;
use crate::reflect::Reflected;
use crate::registry::Registry;
use crate::solver::ObjectSolver;
use crate::structure::Structure;
use crate::tag::Tag;
use crate::wire;

/// Loads `dt` into a freshly default-constructed `T`.
pub fn load<T: Reflected + Default>(dt: &DataTemplate, solver: &dyn ObjectSolver) -> Result<T> {
	if dt.struct_id != T::struct_id() {
		return Err(TemplateError::UnknownStruct(dt.struct_id));
	}
	let mut value = T::default();
	let structure = T::structure();
	let ptr = &mut value as *mut T as RawMutPtr;
	load_into::<T>(ptr, &structure, dt, solver);
	Ok(value)
}

/// Loads `dt` into an already-constructed `value`, leaving any field with
/// no corresponding tag untouched.
pub fn load_into<T: Reflected>(ptr: RawMutPtr, structure: &Structure, dt: &DataTemplate, solver: &dyn ObjectSolver) {
	let mut cursor = Cursor::new(dt.data.as_slice());
	let mut index = 0;
	while index < dt.tags.len() {
		index = load_field(ptr, structure, dt, index, &mut cursor, solver);
	}
}

/// Resolves `dt.tags[index]` against `structure` and loads it, or logs and
/// skips the subtree if it no longer resolves cleanly.
fn load_field(ptr: RawMutPtr, structure: &Structure, dt: &DataTemplate, index: usize, cursor: &mut Cursor<&[u8]>, solver: &dyn ObjectSolver) -> usize {
	let tag = dt.tags[index];
	let Some(main_index) = structure.get_main_property_index(tag.property_id) else {
		tracing::warn!(property_id = %format!("{:#010X}", tag.property_id), "load: unknown property, skipping");
		return dt.next_on_this_level(index);
	};
	let field_index = main_index + tag.sub_property_offset() as usize;
	let Some(prop) = structure.get_property(field_index) else {
		tracing::warn!(property_id = %format!("{:#010X}", tag.property_id), "load: sub-property index out of range, skipping");
		return dt.next_on_this_level(index);
	};
	if tag.field_type() != prop.field_kind {
		tracing::warn!(expected = ?prop.field_kind, found = ?tag.field_type(), "load: field kind mismatch, skipping");
		return dt.next_on_this_level(index);
	}
	let field_ptr = unsafe { (ptr as *mut u8).add(prop.offset as usize) as RawMutPtr };
	load_value(field_ptr, structure, field_index, main_index, tag, index, dt, cursor, solver)
}

#[allow(clippy::too_many_arguments)]
fn load_value(ptr: RawMutPtr, structure: &Structure, prop_index: usize, main_index: usize, tag: Tag, index: usize, dt: &DataTemplate, cursor: &mut Cursor<&[u8]>, solver: &dyn ObjectSolver) -> usize {
	cursor.set_position(tag.data_offset() as u64);
	let prop = structure.get_property(prop_index).expect("caller already validated this index");
	match prop.field_kind {
		FieldKind::Struct => load_struct(ptr, prop.struct_id, index, dt, cursor, solver),
		FieldKind::Array => load_array(ptr, structure, prop_index, main_index, prop.array_len, index, dt, cursor, solver),
		FieldKind::Vector => load_vector(ptr, structure, prop_index, main_index, index, dt, cursor, solver),
		FieldKind::Map => load_map(ptr, structure, prop_index, main_index, index, dt, cursor, solver),
		FieldKind::ObjectRef => {
			if load_object_ref(ptr, cursor, solver).is_err() {
				tracing::warn!("load: object reference payload truncated, leaving field untouched");
			}
			index + 1
		},
		_ => {
			if load_simple(ptr, prop.field_kind, cursor).is_err() {
				tracing::warn!(field_kind = ?prop.field_kind, "load: scalar payload truncated, leaving field untouched");
			}
			index + 1
		},
	}
}

fn load_simple(ptr: RawMutPtr, kind: FieldKind, cursor: &mut Cursor<&[u8]>) -> Result<()> {
	use wire::FromByteStream;

	macro_rules! read_scalar {
		($ty: ty) => {
			unsafe { std::ptr::write(ptr as *mut $ty, <$ty>::read(cursor)?) }
		};
	}

	match kind {
		FieldKind::Int8 => read_scalar!(i8),
		FieldKind::Int16 => read_scalar!(i16),
		FieldKind::Int32 => read_scalar!(i32),
		FieldKind::Int64 => read_scalar!(i64),
		FieldKind::UInt8 => read_scalar!(u8),
		FieldKind::UInt16 => read_scalar!(u16),
		FieldKind::UInt32 => read_scalar!(u32),
		FieldKind::UInt64 => read_scalar!(u64),
		FieldKind::Float32 => read_scalar!(f32),
		FieldKind::Float64 => read_scalar!(f64),
		FieldKind::String => {
			let value = wire::read_string(cursor)?;
			unsafe { std::ptr::write(ptr as *mut String, value) };
		},
		_ => unreachable!("load_simple called with a composite or object-ref field kind"),
	}
	Ok(())
}

/// Reads `(StructId, ObjectId)`; the struct id is only informative (the
/// solver is the authority on what the id resolves to) so it is consumed
/// from the stream and otherwise ignored.
fn load_object_ref(ptr: RawMutPtr, cursor: &mut Cursor<&[u8]>, solver: &dyn ObjectSolver) -> Result<()> {
	use wire::FromByteStream;
	let _declared_struct = StructId::read(cursor)?;
	let id = u64::read(cursor)?;
	let raw = solver.resolve(id).unwrap_or(0);
	unsafe { std::ptr::write(ptr as *mut usize, raw) };
	Ok(())
}

fn load_struct(ptr: RawMutPtr, struct_id: Option<StructId>, index: usize, dt: &DataTemplate, cursor: &mut Cursor<&[u8]>, solver: &dyn ObjectSolver) -> usize {
	let end = dt.next_on_this_level(index);
	let Some(struct_id) = struct_id else {
		tracing::warn!("load: struct field carries no target structure id, skipping subtree");
		return end;
	};
	let Some(nested) = Registry::get(struct_id) else {
		tracing::warn!(struct_id = %format!("{struct_id:#010X}"), "load: unknown nested structure, skipping subtree");
		return end;
	};
	let mut i = index + 1;
	while i < end {
		i = load_field(ptr, &nested, dt, i, cursor, solver);
	}
	end
}

#[allow(clippy::too_many_arguments)]
fn load_array(ptr: RawMutPtr, structure: &Structure, prop_index: usize, main_index: usize, len: usize, index: usize, dt: &DataTemplate, cursor: &mut Cursor<&[u8]>, solver: &dyn ObjectSolver) -> usize {
	let end = dt.next_on_this_level(index);
	let elem_index_in_props = structure.get_sub_property_index(prop_index, SubType::ArrayElement);
	let Some(elem_prop) = structure.get_property(elem_index_in_props) else {
		tracing::warn!("load: array carries no element descriptor, skipping subtree");
		return end;
	};
	let stride = structure.native_field_size(elem_index_in_props);
	let mut i = index + 1;
	while i < end {
		let tag = dt.tags[i];
		let elem_index = tag.element_index() as usize;
		if elem_index >= len || tag.field_type() != elem_prop.field_kind {
			tracing::warn!(element_index = tag.element_index(), len, "load: array element out of range or kind mismatch, skipping");
			i = dt.next_on_this_level(i);
			continue;
		}
		let elem_ptr = unsafe { (ptr as *mut u8).add(elem_index * stride) as RawMutPtr };
		i = load_value(elem_ptr, structure, elem_index_in_props, main_index, tag, i, dt, cursor, solver);
	}
	end
}

#[allow(clippy::too_many_arguments)]
fn load_vector(ptr: RawMutPtr, structure: &Structure, prop_index: usize, main_index: usize, index: usize, dt: &DataTemplate, cursor: &mut Cursor<&[u8]>, solver: &dyn ObjectSolver) -> usize {
	use wire::FromByteStream;
	let end = dt.next_on_this_level(index);
	let elem_index_in_props = structure.get_sub_property_index(prop_index, SubType::VectorElement);
	let handler_index = elem_index_in_props - 1;
	let Some(handler) = structure.get_property(handler_index).and_then(|p| p.handler.as_ref()) else {
		tracing::warn!("load: vector carries no container handler, skipping subtree");
		return end;
	};
	let Some(elem_prop) = structure.get_property(elem_index_in_props) else {
		tracing::warn!("load: vector carries no element descriptor, skipping subtree");
		return end;
	};
	handler.clear(ptr);
	let len = match u16::read(cursor) {
		Ok(len) => len as u32,
		Err(_) => {
			tracing::warn!("load: vector length prefix truncated, skipping subtree");
			return end;
		},
	};
	// Grow to the declared length first: elements elided by default-value
	// skipping leave their slot at this default, addressed later by
	// `element_index` rather than by push order.
	for _ in 0..len {
		handler.push_uninit_vector(ptr);
	}
	let mut i = index + 1;
	while i < end {
		let tag = dt.tags[i];
		if tag.element_index() as u32 >= len || tag.field_type() != elem_prop.field_kind {
			tracing::warn!(element_index = tag.element_index(), len, "load: vector element out of range or kind mismatch, skipping");
			i = dt.next_on_this_level(i);
			continue;
		}
		let slot = handler.element_mut_vector(ptr, tag.element_index() as u32);
		i = load_value(slot, structure, elem_index_in_props, main_index, tag, i, dt, cursor, solver);
	}
	end
}

#[allow(clippy::too_many_arguments)]
fn load_map(ptr: RawMutPtr, structure: &Structure, prop_index: usize, main_index: usize, index: usize, dt: &DataTemplate, cursor: &mut Cursor<&[u8]>, solver: &dyn ObjectSolver) -> usize {
	use wire::FromByteStream;
	let end = dt.next_on_this_level(index);
	let key_index_in_props = structure.get_sub_property_index(prop_index, SubType::Key);
	let value_index_in_props = structure.get_sub_property_index(prop_index, SubType::MapValue);
	let handler_index = key_index_in_props - 1;
	let Some(handler) = structure.get_property(handler_index).and_then(|p| p.handler.as_ref()) else {
		tracing::warn!("load: map carries no container handler, skipping subtree");
		return end;
	};
	let (Some(key_prop), Some(value_prop)) = (structure.get_property(key_index_in_props), structure.get_property(value_index_in_props)) else {
		tracing::warn!("load: map carries no key/value descriptor, skipping subtree");
		return end;
	};
	handler.clear(ptr);
	let declared_len = match u16::read(cursor) {
		Ok(len) => len as u32,
		Err(_) => {
			tracing::warn!("load: map length prefix truncated, skipping subtree");
			return end;
		},
	};
	let key_size = structure.native_field_size(key_index_in_props);
	let value_size = structure.native_field_size(value_index_in_props);

	let mut i = index + 1;
	let mut entries = 0u32;
	while i < end {
		let key_tag = dt.tags[i];
		if !key_tag.is_key() || key_tag.field_type() != key_prop.field_kind {
			tracing::warn!("load: map entry missing a well-formed key, skipping");
			i = dt.next_on_this_level(i);
			continue;
		}
		let mut key_buf = vec![0u8; key_size];
		i = load_value(key_buf.as_mut_ptr() as RawMutPtr, structure, key_index_in_props, main_index, key_tag, i, dt, cursor, solver);

		if i >= end {
			tracing::warn!("load: map stream ended after a key with no matching value, dropping trailing key");
			break;
		}
		let value_tag = dt.tags[i];
		if value_tag.field_type() != value_prop.field_kind {
			tracing::warn!("load: map value kind mismatch, skipping entry");
			i = dt.next_on_this_level(i);
			continue;
		}
		let mut value_buf = vec![0u8; value_size];
		i = load_value(value_buf.as_mut_ptr() as RawMutPtr, structure, value_index_in_props, main_index, value_tag, i, dt, cursor, solver);

		// `insert_map` takes ownership of the key/value via `ptr::read`; the
		// buffers themselves (plain bytes, no drop glue beyond their own
		// allocation) are freed normally below.
		handler.insert_map(ptr, key_buf.as_ptr() as _, value_buf.as_ptr() as _);
		entries += 1;
	}
	if entries != declared_len {
		tracing::warn!(declared = declared_len, found = entries, "load: map entry count does not match its length prefix");
	}
	end
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

	impl Default for Sample {
		fn default() -> Self {
			Sample { value: 0, name: String::new() }
		}
	}

	impl Reflected for Sample {
		fn struct_id() -> StructId {
			crate::ids::fnv1a_32("load::tests::Sample")
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
						flags: PropertyFlags::empty(),
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
	fn loads_known_fields() {
		let solver = TableObjectSolver::default();
		let sample = Sample { value: 7, name: "hi".into() };
		let dt = crate::save::save(&sample, &solver, crate::save::SaveFlags::empty());
		let loaded: Sample = load(&dt, &solver).unwrap();
		assert_eq!(loaded.value, 7);
		assert_eq!(loaded.name, "hi");
	}

	#[test]
	fn unknown_property_is_skipped_not_fatal() {
		let solver = TableObjectSolver::default();
		let mut dt = DataTemplate::new(Sample::struct_id());
		dt.tags.push(Tag::new(crate::ids::fnv1a_32("ghost_field"), 0, 0, 0, false, FieldKind::Int32, 0, 0, 0));
		dt.data.extend_from_slice(&99i32.to_le_bytes());
		dt.tags.push(Tag::new(crate::ids::fnv1a_32("value"), 4, 0, 0, false, FieldKind::Int32, 0, 0, 0));
		dt.data.extend_from_slice(&5i32.to_le_bytes());

		let loaded: Sample = load(&dt, &solver).unwrap();
		assert_eq!(loaded.value, 5);
	}

	#[test]
	fn mismatched_struct_id_is_rejected() {
		let solver = TableObjectSolver::default();
		let dt = DataTemplate::new(0xDEAD_BEEF);
		assert!(matches!(load::<Sample>(&dt, &solver), Err(TemplateError::UnknownStruct(_))));
	}
}
