//! Merge and diff over two [`DataTemplate`]s of the same (or
//! super/derived) structure.
//!
//! Both operations walk `lower` and `higher` one nesting level at a time,
//! matching each side's immediate children by a `(property_id,
//! sub_property_offset, is_key, element_index)` key — stable across
//! renames-as-remove-and-add, and already the identity a layout refresh
//! resolves tags by. Matching by an explicit sorted key gives a total
//! order that holds regardless of which structure version produced each
//! side's declaration order — the same ascending-key discipline the
//! `BTreeMap`-backed map handler already guarantees for its own entries.
//!
//! `merge(lower, higher)` yields `higher`, with any field `higher` left
//! untouched (no tag at that key) filled back in from `lower`.
//! `diff(lower, higher)` yields only the subtrees where `higher` disagrees
//! with `lower` — the complement of what `merge` fills back in.

use crate::data_template::DataTemplate;
use crate::error::{Result, TemplateError};
use crate::field_kind::FieldKind;
use crate::registry::Registry;
use crate::tag::Tag;

type Key = (u32, u8, bool, u8);

fn key_of(tag: &Tag) -> Key {
	(tag.property_id, tag.sub_property_offset(), tag.is_key(), tag.element_index())
}

/// Immediate children of the subtree starting at `level_start` (exclusive
/// of the level's own wrapping tag, if any): `(key, start, end)` triples,
/// sorted by key.
fn children(dt: &DataTemplate, start: usize, end: usize) -> Vec<(Key, usize, usize)> {
	let mut out = Vec::new();
	let mut i = start;
	while i < end {
		let child_end = dt.next_on_this_level(i);
		out.push((key_of(&dt.tags[i]), i, child_end));
		i = child_end;
	}
	out.sort_by_key(|&(key, ..)| key);
	out
}

/// A composite tag's own payload: empty for `Struct`/`Array` (they carry no
/// bytes of their own), the `u16` length prefix for `Vector`/`Map`. Merging
/// or diffing into a composite must re-emit this prefix before recursing,
/// or the loader's cursor desyncs the moment it steps past the composite.
fn composite_prefix_bytes(dt: &DataTemplate, tag_index: usize) -> &[u8] {
	let tag = dt.tags[tag_index];
	if !matches!(tag.field_type(), FieldKind::Vector | FieldKind::Map) {
		return &[];
	}
	let start = tag.data_offset() as usize;
	&dt.data[start..start + 2]
}

fn payload_range(dt: &DataTemplate, tag_index: usize) -> (usize, usize) {
	let start = dt.tags[tag_index].data_offset() as usize;
	let end = if tag_index + 1 < dt.tags.len() { dt.tags[tag_index + 1].data_offset() as usize } else { dt.data.len() };
	(start, end)
}

fn copy_subtree(src: &DataTemplate, start: usize, end: usize, out_tags: &mut Vec<Tag>, out_data: &mut Vec<u8>) {
	for i in start..end {
		let tag = src.tags[i];
		let (ps, pe) = payload_range(src, i);
		let new_offset = out_data.len() as u16;
		if pe > ps {
			out_data.extend_from_slice(&src.data[ps..pe]);
		}
		out_tags.push(Tag::new(
			tag.property_id,
			new_offset,
			tag.element_index(),
			tag.nest_level(),
			tag.is_key(),
			tag.field_type(),
			tag.sub_property_offset(),
			tag.property_index(),
			tag.tag_flags(),
		));
	}
}

/// Finds `higher`'s super-struct bridging subtree (if any) and returns the
/// `(start, end)` range of its *contents*, i.e. excluding the bridging tag
/// itself, which is where `lower`'s own top-level fields live when `higher`
/// belongs to a structure derived from `lower`'s.
fn super_struct_range(higher: &DataTemplate) -> Option<(usize, usize)> {
	let mut i = 0;
	while i < higher.tags.len() {
		let end = higher.next_on_this_level(i);
		if higher.tags[i].is_super_struct() {
			return Some((i + 1, end));
		}
		i = end;
	}
	None
}

fn is_derived_from(higher_struct: u32, lower_struct: u32) -> bool {
	if higher_struct == lower_struct {
		return true;
	}
	let mut current = higher_struct;
	while let Some(structure) = Registry::get(current) {
		match structure.super_struct {
			Some(parent) if parent == lower_struct => return true,
			Some(parent) => current = parent,
			None => return false,
		}
	}
	false
}

fn check_compatible(lower: &DataTemplate, higher: &DataTemplate) -> Result<()> {
	if is_derived_from(higher.struct_id, lower.struct_id) {
		Ok(())
	} else {
		Err(TemplateError::IncompatibleStructures { lower: lower.struct_id, higher: higher.struct_id })
	}
}

/// Produces `higher` with any of `lower`'s fields it left untouched filled
/// back in.
pub fn merge(lower: &DataTemplate, higher: &DataTemplate) -> Result<DataTemplate> {
	check_compatible(lower, higher)?;
	let mut out = DataTemplate::new(higher.struct_id);

	if lower.struct_id == higher.struct_id {
		merge_level(lower, 0, lower.tags.len(), higher, 0, higher.tags.len(), &mut out.tags, &mut out.data);
		return Ok(out);
	}

	// `higher` derives from `lower`'s structure: `lower`'s fields live
	// nested inside `higher`'s super-struct bridging tag.
	let (base_start, base_end) = super_struct_range(higher).unwrap_or((0, 0));
	let own_start = base_end;
	let own_end = higher.tags.len();

	// Re-emit the bridge tag itself, then the merged base fields under it,
	// then higher's own fields untouched by the base/merge distinction.
	if let Some(bridge_index) = (0..higher.tags.len()).find(|&i| higher.tags[i].is_super_struct()) {
		let bridge = higher.tags[bridge_index];
		out.tags.push(Tag::new(
			bridge.property_id,
			out.data.len() as u16,
			bridge.element_index(),
			bridge.nest_level(),
			bridge.is_key(),
			bridge.field_type(),
			bridge.sub_property_offset(),
			bridge.property_index(),
			bridge.tag_flags(),
		));
	}
	merge_level(lower, 0, lower.tags.len(), higher, base_start, base_end, &mut out.tags, &mut out.data);
	copy_subtree(higher, own_start, own_end, &mut out.tags, &mut out.data);

	Ok(out)
}

#[allow(clippy::too_many_arguments)]
fn merge_level(lower: &DataTemplate, lower_start: usize, lower_end: usize, higher: &DataTemplate, higher_start: usize, higher_end: usize, out_tags: &mut Vec<Tag>, out_data: &mut Vec<u8>) {
	let lower_children = children(lower, lower_start, lower_end);
	let higher_children = children(higher, higher_start, higher_end);

	let mut li = 0;
	let mut hi = 0;
	while li < lower_children.len() || hi < higher_children.len() {
		match (lower_children.get(li), higher_children.get(hi)) {
			(Some(&(lk, ls, le)), Some(&(hk, hs, he))) => {
				if lk == hk {
					if lower.tags[ls].field_type().is_composite() && higher.tags[hs].field_type().is_composite() {
						let tag = higher.tags[hs];
						out_tags.push(Tag::new(tag.property_id, out_data.len() as u16, tag.element_index(), tag.nest_level(), tag.is_key(), tag.field_type(), tag.sub_property_offset(), tag.property_index(), tag.tag_flags()));
						out_data.extend_from_slice(composite_prefix_bytes(higher, hs));
						merge_level(lower, ls + 1, le, higher, hs + 1, he, out_tags, out_data);
					} else {
						copy_subtree(higher, hs, he, out_tags, out_data);
					}
					li += 1;
					hi += 1;
				} else if lk < hk {
					copy_subtree(lower, ls, le, out_tags, out_data);
					li += 1;
				} else {
					copy_subtree(higher, hs, he, out_tags, out_data);
					hi += 1;
				}
			},
			(Some(&(_, ls, le)), None) => {
				copy_subtree(lower, ls, le, out_tags, out_data);
				li += 1;
			},
			(None, Some(&(_, hs, he))) => {
				copy_subtree(higher, hs, he, out_tags, out_data);
				hi += 1;
			},
			(None, None) => unreachable!(),
		}
	}
}

/// Produces a template containing only the subtrees where `higher`
/// disagrees with `lower` (added, removed, or changed fields). Applying
/// [`merge`] with `lower` as the base and this result as `higher` recovers
/// `higher` exactly.
pub fn diff(lower: &DataTemplate, higher: &DataTemplate) -> Result<DataTemplate> {
	check_compatible(lower, higher)?;
	let mut out = DataTemplate::new(higher.struct_id);
	diff_level(lower, 0, lower.tags.len(), higher, 0, higher.tags.len(), &mut out.tags, &mut out.data);
	Ok(out)
}

#[allow(clippy::too_many_arguments)]
fn diff_level(lower: &DataTemplate, lower_start: usize, lower_end: usize, higher: &DataTemplate, higher_start: usize, higher_end: usize, out_tags: &mut Vec<Tag>, out_data: &mut Vec<u8>) {
	let lower_children = children(lower, lower_start, lower_end);
	let higher_children = children(higher, higher_start, higher_end);

	let mut li = 0;
	let mut hi = 0;
	while li < lower_children.len() || hi < higher_children.len() {
		match (lower_children.get(li), higher_children.get(hi)) {
			(Some(&(lk, ls, le)), Some(&(hk, hs, he))) => {
				if lk == hk {
					let lower_bytes = subtree_bytes(lower, ls, le);
					let higher_bytes = subtree_bytes(higher, hs, he);
					if lower.tags[ls].field_type().is_composite() && higher.tags[hs].field_type().is_composite() {
						let mut nested_tags = Vec::new();
						let mut nested_data = Vec::new();
						diff_level(lower, ls + 1, le, higher, hs + 1, he, &mut nested_tags, &mut nested_data);
						if !nested_tags.is_empty() {
							let tag = higher.tags[hs];
							out_tags.push(Tag::new(tag.property_id, out_data.len() as u16, tag.element_index(), tag.nest_level(), tag.is_key(), tag.field_type(), tag.sub_property_offset(), tag.property_index(), tag.tag_flags()));
							out_data.extend_from_slice(composite_prefix_bytes(higher, hs));
							rebase_and_extend(out_tags, out_data, nested_tags, nested_data);
						}
						// if nested_tags is empty, nothing was written: the length
						// prefix is implicitly rolled back along with the tag.
					} else if lower_bytes != higher_bytes || higher.tags[hs].field_type() != lower.tags[ls].field_type() {
						copy_subtree(higher, hs, he, out_tags, out_data);
					}
					li += 1;
					hi += 1;
				} else if lk < hk {
					// Present in `lower`, absent from `higher`: no change to
					// report (removal is implicit in `higher` never
					// resaving this key; `merge` already fills it back in).
					li += 1;
				} else {
					copy_subtree(higher, hs, he, out_tags, out_data);
					hi += 1;
				}
			},
			(Some(_), None) => li += 1,
			(None, Some(&(_, hs, he))) => {
				copy_subtree(higher, hs, he, out_tags, out_data);
				hi += 1;
			},
			(None, None) => unreachable!(),
		}
	}
}

fn subtree_bytes(dt: &DataTemplate, start: usize, end: usize) -> Vec<u8> {
	let mut out = Vec::new();
	for i in start..end {
		let (s, e) = payload_range(dt, i);
		out.extend_from_slice(&dt.data[s..e]);
	}
	out
}

fn rebase_and_extend(out_tags: &mut Vec<Tag>, out_data: &mut Vec<u8>, nested_tags: Vec<Tag>, nested_data: Vec<u8>) {
	let base = out_data.len() as u16;
	for tag in nested_tags {
		out_tags.push(Tag::new(
			tag.property_id,
			tag.data_offset() + base,
			tag.element_index(),
			tag.nest_level(),
			tag.is_key(),
			tag.field_type(),
			tag.sub_property_offset(),
			tag.property_index(),
			tag.tag_flags(),
		));
	}
	out_data.extend_from_slice(&nested_data);
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::field_kind::FieldKind;
	use crate::ids::fnv1a_32;

	fn simple_dt(struct_id: u32, property: &str, value: i32) -> DataTemplate {
		let mut dt = DataTemplate::new(struct_id);
		dt.tags.push(Tag::new(fnv1a_32(property), 0, 0, 0, false, FieldKind::Int32, 0, 0, 0));
		dt.data.extend_from_slice(&value.to_le_bytes());
		dt
	}

	#[test]
	fn merge_fills_in_fields_higher_left_untouched() {
		let struct_id = fnv1a_32("delta::tests::Pair");
		let mut lower = simple_dt(struct_id, "a", 1);
		lower.tags.push(Tag::new(fnv1a_32("b"), 4, 0, 0, false, FieldKind::Int32, 0, 0, 0));
		lower.data.extend_from_slice(&2i32.to_le_bytes());

		let higher = simple_dt(struct_id, "a", 99);

		let merged = merge(&lower, &higher).unwrap();
		assert_eq!(merged.tags.len(), 2);
	}

	#[test]
	fn diff_reports_only_changed_fields() {
		let struct_id = fnv1a_32("delta::tests::Pair");
		let mut lower = simple_dt(struct_id, "a", 1);
		lower.tags.push(Tag::new(fnv1a_32("b"), 4, 0, 0, false, FieldKind::Int32, 0, 0, 0));
		lower.data.extend_from_slice(&2i32.to_le_bytes());

		let mut higher = simple_dt(struct_id, "a", 1);
		higher.tags.push(Tag::new(fnv1a_32("b"), 4, 0, 0, false, FieldKind::Int32, 0, 0, 0));
		higher.data.extend_from_slice(&55i32.to_le_bytes());

		let delta = diff(&lower, &higher).unwrap();
		assert_eq!(delta.tags.len(), 1);
		assert_eq!(delta.tags[0].property_id, fnv1a_32("b"));
	}

	#[test]
	fn incompatible_structures_are_rejected() {
		let a = DataTemplate::new(fnv1a_32("A"));
		let b = DataTemplate::new(fnv1a_32("B"));
		assert!(matches!(merge(&a, &b), Err(TemplateError::IncompatibleStructures { .. })));
	}

	fn vector_dt(struct_id: u32, property: &str, elements: &[i32]) -> DataTemplate {
		let mut dt = DataTemplate::new(struct_id);
		let id = fnv1a_32(property);
		dt.tags.push(Tag::new(id, 0, 0, 0, false, FieldKind::Vector, 0, 0, 0));
		dt.data.extend_from_slice(&(elements.len() as u16).to_le_bytes());
		for (i, value) in elements.iter().enumerate() {
			dt.tags.push(Tag::new(id, dt.data.len() as u16, i as u8, 1, false, FieldKind::Int32, 2, 0, 0));
			dt.data.extend_from_slice(&value.to_le_bytes());
		}
		dt
	}

	#[test]
	fn merge_preserves_vector_length_prefix_and_elements() {
		let struct_id = fnv1a_32("delta::tests::WithItems");
		let lower = vector_dt(struct_id, "items", &[10, 20]);
		let higher = vector_dt(struct_id, "items", &[10, 20, 30]);

		let merged = merge(&lower, &higher).unwrap();
		assert_eq!(merged.tags.len(), 4);
		let prefix_start = merged.tags[0].data_offset() as usize;
		let len = u16::from_le_bytes([merged.data[prefix_start], merged.data[prefix_start + 1]]);
		assert_eq!(len, 3);
	}

	#[test]
	fn diff_preserves_vector_length_prefix_when_contents_changed() {
		let struct_id = fnv1a_32("delta::tests::WithItems");
		let lower = vector_dt(struct_id, "items", &[10, 20]);
		let higher = vector_dt(struct_id, "items", &[10, 20, 30]);

		let delta = diff(&lower, &higher).unwrap();
		assert_eq!(delta.tags.len(), 2);
		let prefix_start = delta.tags[0].data_offset() as usize;
		let len = u16::from_le_bytes([delta.data[prefix_start], delta.data[prefix_start + 1]]);
		assert_eq!(len, 3);
	}
}
