//! Human-readable dumping of a [`DataTemplate`] via an injected writer.
//!
//! `JsonWriter` is the seam: stencil only ever calls it, it never owns an
//! output format. [`PlainJsonWriter`] is the one concrete implementation
//! shipped here, since an external-collaborator seam with zero callers
//! would be unobservable.

use std::io::Cursor;

use crate::data_template::DataTemplate;
use crate::field_kind::FieldKind;
use crate::property::{Property, SubType};
use crate::registry::Registry;
use crate::structure::Structure;
use crate::tag::Tag;
use crate::wire::FromByteStream;

/// Sink for a [`print`] traversal. Every method corresponds to one token
/// of a JSON-like stream; an implementation is free to target actual JSON,
/// a debug tree view, or anything else that can consume this shape.
pub trait JsonWriter {
	fn key(&mut self, key: &str);
	fn string(&mut self, value: &str);
	fn int(&mut self, value: i64);
	fn uint(&mut self, value: u64);
	fn double(&mut self, value: f64);
	fn start_object(&mut self);
	fn end_object(&mut self);
	fn start_array(&mut self);
	fn end_array(&mut self);
}

/// Writes an indented, human-readable JSON-like rendering into a `String`.
#[derive(Default)]
pub struct PlainJsonWriter {
	out: String,
	indent: usize,
	/// Tracks, per open object/array, whether a sibling has already been
	/// written (so we know whether to emit a separating comma).
	needs_comma: Vec<bool>,
}

impl PlainJsonWriter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn finish(self) -> String {
		self.out
	}

	fn newline_indent(&mut self) {
		self.out.push('\n');
		self.out.push_str(&"  ".repeat(self.indent));
	}

	fn separate(&mut self) {
		if let Some(last) = self.needs_comma.last_mut() {
			if *last {
				self.out.push(',');
			}
			*last = true;
		}
		self.newline_indent();
	}
}

impl JsonWriter for PlainJsonWriter {
	fn key(&mut self, key: &str) {
		self.separate();
		self.out.push('"');
		self.out.push_str(key);
		self.out.push_str("\": ");
	}

	fn string(&mut self, value: &str) {
		self.out.push('"');
		self.out.push_str(&value.replace('\\', "\\\\").replace('"', "\\\""));
		self.out.push('"');
	}

	fn int(&mut self, value: i64) {
		self.out.push_str(&value.to_string());
	}

	fn uint(&mut self, value: u64) {
		self.out.push_str(&value.to_string());
	}

	fn double(&mut self, value: f64) {
		self.out.push_str(&value.to_string());
	}

	fn start_object(&mut self) {
		self.out.push('{');
		self.indent += 1;
		self.needs_comma.push(false);
	}

	fn end_object(&mut self) {
		self.needs_comma.pop();
		self.indent -= 1;
		self.newline_indent();
		self.out.push('}');
	}

	fn start_array(&mut self) {
		self.out.push('[');
		self.indent += 1;
		self.needs_comma.push(false);
	}

	fn end_array(&mut self) {
		self.needs_comma.pop();
		self.indent -= 1;
		self.newline_indent();
		self.out.push(']');
	}
}

/// Composed key a tag renders under: `property_id/property_name/
/// property_type/nest_level/element_index/is_key`. Carries enough of the
/// tag's own identity that a dump stays legible even once two properties
/// share a name (an array element and its owning vector, say).
fn descriptor(tag: &Tag, name: &str) -> String {
	format!("{}/{}/{:?}/{}/{}/{}", tag.property_id, name, tag.field_type(), tag.nest_level(), tag.element_index(), tag.is_key())
}

/// Walks `dt` against its registered structure, writing the struct's own
/// identity followed by every field name, value and container shape to
/// `writer`. Unknown structures/properties (the same drift a layout
/// refresh would drop) are rendered as a `"<unresolved>"` marker rather
/// than aborting the whole dump.
pub fn print(dt: &DataTemplate, writer: &mut impl JsonWriter) {
	writer.start_object();
	let Some(structure) = Registry::get(dt.struct_id) else {
		writer.key("error");
		writer.string("unknown structure");
		writer.end_object();
		return;
	};
	writer.key("struct_id");
	writer.uint(dt.struct_id as u64);
	writer.key("struct_name");
	writer.string(structure.name);

	let mut cursor = Cursor::new(dt.data.as_slice());
	let mut index = 0;
	while index < dt.tags.len() {
		let tag = dt.tags[index];
		let name = structure.find_by_id(tag.property_id).map(|(_, p)| p.name).unwrap_or("<unresolved>");
		writer.key(&descriptor(&tag, name));
		index = print_value(dt, index, &structure, &mut cursor, writer);
	}
	writer.end_object();
}

fn print_value(dt: &DataTemplate, index: usize, structure: &Structure, cursor: &mut Cursor<&[u8]>, writer: &mut impl JsonWriter) -> usize {
	let tag = dt.tags[index];
	let prop_index = structure.find_by_id(tag.property_id).map(|(main_index, _)| main_index + tag.sub_property_offset() as usize);
	let prop = prop_index.and_then(|i| structure.get_property(i));
	match tag.field_type() {
		FieldKind::Int8 | FieldKind::Int16 | FieldKind::Int32 | FieldKind::Int64 => {
			writer.int(read_signed(tag.field_type(), cursor));
			index + 1
		},
		FieldKind::UInt8 | FieldKind::UInt16 | FieldKind::UInt32 | FieldKind::UInt64 => {
			writer.uint(read_unsigned(tag.field_type(), cursor));
			index + 1
		},
		FieldKind::Float32 => {
			writer.double(f32::read(cursor).unwrap_or_default() as f64);
			index + 1
		},
		FieldKind::Float64 => {
			writer.double(f64::read(cursor).unwrap_or_default());
			index + 1
		},
		FieldKind::String => {
			writer.string(&crate::wire::read_string(cursor).unwrap_or_default());
			index + 1
		},
		FieldKind::ObjectRef => {
			let _struct_id = u32::read(cursor).unwrap_or(crate::ids::WRONG_ID);
			writer.uint(u64::read(cursor).unwrap_or(crate::ids::NULL_OBJECT_ID));
			index + 1
		},
		FieldKind::Struct => {
			let end = dt.next_on_this_level(index);
			let nested_struct_id = prop.and_then(|p| p.struct_id_of());
			writer.start_object();
			if let Some(nested) = nested_struct_id.and_then(Registry::get) {
				let mut i = index + 1;
				while i < end {
					let inner_tag = dt.tags[i];
					let inner_name = nested.find_by_id(inner_tag.property_id).map(|(_, p)| p.name).unwrap_or("<unresolved>");
					writer.key(&descriptor(&inner_tag, inner_name));
					i = print_value(dt, i, &nested, cursor, writer);
				}
			}
			writer.end_object();
			end
		},
		FieldKind::Array => {
			let end = dt.next_on_this_level(index);
			writer.start_array();
			let nested_struct = element_struct_of(structure, prop_index);
			let mut i = index + 1;
			while i < end {
				i = print_array_element(dt, i, nested_struct, cursor, writer);
			}
			writer.end_array();
			end
		},
		FieldKind::Vector => {
			let end = dt.next_on_this_level(index);
			let len = u16::read(cursor).unwrap_or_default();
			writer.start_object();
			writer.key("length");
			writer.uint(len as u64);
			writer.key("elements");
			writer.start_array();
			let nested_struct = element_struct_of(structure, prop_index);
			let mut i = index + 1;
			while i < end {
				i = print_array_element(dt, i, nested_struct, cursor, writer);
			}
			writer.end_array();
			writer.end_object();
			end
		},
		FieldKind::Map => {
			let end = dt.next_on_this_level(index);
			let len = u16::read(cursor).unwrap_or_default();
			writer.start_object();
			writer.key("length");
			writer.uint(len as u64);
			let value_struct = value_struct_of(structure, prop_index);
			let mut i = index + 1;
			while i < end {
				let key_tag = dt.tags[i];
				debug_assert!(key_tag.is_key());
				let key_repr = read_key(key_tag.field_type(), cursor);
				i += 1;
				writer.key(&key_repr);
				i = print_array_element(dt, i, value_struct, cursor, writer);
			}
			writer.end_object();
			end
		},
	}
}

fn print_array_element(dt: &DataTemplate, index: usize, element_struct: Option<crate::ids::StructId>, cursor: &mut Cursor<&[u8]>, writer: &mut impl JsonWriter) -> usize {
	let tag = dt.tags[index];
	if tag.field_type() == FieldKind::Struct {
		let end = dt.next_on_this_level(index);
		writer.start_object();
		if let Some(nested) = element_struct.and_then(Registry::get) {
			let mut i = index + 1;
			while i < end {
				let inner_tag = dt.tags[i];
				let inner_name = nested.find_by_id(inner_tag.property_id).map(|(_, p)| p.name).unwrap_or("<unresolved>");
				writer.key(&descriptor(&inner_tag, inner_name));
				i = print_value(dt, i, &nested, cursor, writer);
			}
		}
		writer.end_object();
		end
	} else {
		print_value(dt, index, &Structure::new(0, "", None, 0, vec![]), cursor, writer)
	}
}

/// The element property's declared struct id, for an `Array`/`Vector`
/// `Main` property at `prop_index`.
fn element_struct_of(structure: &Structure, prop_index: Option<usize>) -> Option<crate::ids::StructId> {
	let prop_index = prop_index?;
	let kind = structure.get_property(prop_index)?.field_kind;
	let sub = match kind {
		FieldKind::Array => SubType::ArrayElement,
		FieldKind::Vector => SubType::VectorElement,
		_ => return None,
	};
	structure.get_property(structure.get_sub_property_index(prop_index, sub)).and_then(Property::struct_id_of)
}

/// The value property's declared struct id, for a `Map` `Main` property at
/// `prop_index`.
fn value_struct_of(structure: &Structure, prop_index: Option<usize>) -> Option<crate::ids::StructId> {
	let prop_index = prop_index?;
	if structure.get_property(prop_index)?.field_kind != FieldKind::Map {
		return None;
	}
	structure.get_property(structure.get_sub_property_index(prop_index, SubType::MapValue)).and_then(Property::struct_id_of)
}

fn read_signed(kind: FieldKind, cursor: &mut Cursor<&[u8]>) -> i64 {
	match kind {
		FieldKind::Int8 => i8::read(cursor).unwrap_or_default() as i64,
		FieldKind::Int16 => i16::read(cursor).unwrap_or_default() as i64,
		FieldKind::Int32 => i32::read(cursor).unwrap_or_default() as i64,
		FieldKind::Int64 => i64::read(cursor).unwrap_or_default(),
		_ => 0,
	}
}

fn read_unsigned(kind: FieldKind, cursor: &mut Cursor<&[u8]>) -> u64 {
	match kind {
		FieldKind::UInt8 => u8::read(cursor).unwrap_or_default() as u64,
		FieldKind::UInt16 => u16::read(cursor).unwrap_or_default() as u64,
		FieldKind::UInt32 => u32::read(cursor).unwrap_or_default() as u64,
		FieldKind::UInt64 | FieldKind::ObjectRef => u64::read(cursor).unwrap_or_default(),
		_ => 0,
	}
}

/// Renders a map key of any scalar kind as its JSON object key string,
/// consuming exactly the bytes its kind owns so the cursor stays in sync.
fn read_key(kind: FieldKind, cursor: &mut Cursor<&[u8]>) -> String {
	match kind {
		FieldKind::Int8 | FieldKind::Int16 | FieldKind::Int32 | FieldKind::Int64 => read_signed(kind, cursor).to_string(),
		FieldKind::UInt8 | FieldKind::UInt16 | FieldKind::UInt32 | FieldKind::UInt64 | FieldKind::ObjectRef => read_unsigned(kind, cursor).to_string(),
		FieldKind::Float32 => (f32::read(cursor).unwrap_or_default() as f64).to_string(),
		FieldKind::Float64 => f64::read(cursor).unwrap_or_default().to_string(),
		FieldKind::String => crate::wire::read_string(cursor).unwrap_or_default(),
		_ => "<unsupported key kind>".to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::field_kind::FieldKind;
	use crate::ids::fnv1a_32;
	use crate::property::{PropertyFlags, PropertyUsage};

	#[test]
	fn prints_a_flat_structure() {
		let struct_id = fnv1a_32("debug_print::tests::Flat");
		Registry::register(Structure::new(
			struct_id,
			"Flat",
			None,
			4,
			vec![Property {
				usage: PropertyUsage::Main,
				id: fnv1a_32("value"),
				name: "value",
				field_kind: FieldKind::Int32,
				struct_id: None,
				offset: 0,
				flags: PropertyFlags::empty(),
				array_len: 0,
				handler: None,
				nest_level: 0,
			}],
		));
		let mut dt = DataTemplate::new(struct_id);
		dt.tags.push(Tag::new(fnv1a_32("value"), 0, 0, 0, false, FieldKind::Int32, 0, 0, 0));
		dt.data.extend_from_slice(&7i32.to_le_bytes());

		let mut writer = PlainJsonWriter::new();
		print(&dt, &mut writer);
		let json = writer.finish();
		assert!(json.contains("\"struct_id\""));
		assert!(json.contains("\"struct_name\": \"Flat\""));
		assert!(json.contains("/value/Int32/0/0/false"));
		assert!(json.contains('7'));
	}
}
