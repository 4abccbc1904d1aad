//! Reconciling an already-saved [`DataTemplate`] with a structure whose
//! layout has since changed (only reachable behind `editor-reflection`,
//! since only [`crate::registry::Registry::replace`] can introduce the
//! mismatch this guards against).
//!
//! Every tag is re-resolved by `(property_id, sub_property_offset)` against
//! the *current* [`Structure`] of the same `StructId`. A tag whose
//! property vanished, whose nesting no longer exists, or whose resolved
//! field kind no longer matches what the tag itself claims, has its whole
//! subtree dropped and a warning logged; nothing else in the template is
//! disturbed.

use crate::data_template::DataTemplate;
use crate::registry::Registry;
use crate::tag::Tag;

/// Drops any subtree of `dt` that no longer resolves cleanly against the
/// current registered layout for `dt.struct_id`. Returns the number of
/// top-level tags dropped.
pub fn refresh_after_layout_changed(dt: &mut DataTemplate) -> usize {
	let Some(structure) = Registry::get(dt.struct_id) else {
		tracing::warn!(struct_id = %format!("{:#010X}", dt.struct_id), "refresh: structure no longer registered, dropping entire template");
		let dropped = dt.tags.len();
		dt.tags.clear();
		dt.data.clear();
		return dropped;
	};

	let mut kept_tags = Vec::with_capacity(dt.tags.len());
	let mut kept_data = Vec::with_capacity(dt.data.len());
	let mut dropped = 0usize;
	let mut index = 0usize;

	while index < dt.tags.len() {
		let end = dt.next_on_this_level(index);
		let tag = &dt.tags[index];

		let resolved = structure.resolve(tag.property_id, tag.sub_property_offset());
		let compatible = match resolved {
			Some(field) => field.field_kind == tag.field_type(),
			None => false,
		};

		if compatible {
			copy_subtree(dt, index, end, &mut kept_tags, &mut kept_data);
		} else {
			tracing::warn!(
				property_id = %format!("{:#010X}", tag.property_id),
				sub_property_offset = tag.sub_property_offset(),
				"refresh: property no longer resolves against current layout, dropping subtree",
			);
			dropped += 1;
		}
		index = end;
	}

	dt.tags = kept_tags;
	dt.data = kept_data;
	dropped
}

fn copy_subtree(dt: &DataTemplate, start: usize, end: usize, kept_tags: &mut Vec<Tag>, kept_data: &mut Vec<u8>) {
	for i in start..end {
		let tag = dt.tags[i];
		let payload_start = tag.data_offset() as usize;
		let payload_end = if i + 1 < dt.tags.len() { dt.tags[i + 1].data_offset() as usize } else { dt.data.len() };
		let new_offset = kept_data.len() as u16;
		if payload_end > payload_start {
			kept_data.extend_from_slice(&dt.data[payload_start..payload_end]);
		}
		let rebuilt = Tag::new(
			tag.property_id,
			new_offset,
			tag.element_index(),
			tag.nest_level(),
			tag.is_key(),
			tag.field_type(),
			tag.sub_property_offset(),
			tag.property_index(),
			tag.tag_flags(),
		);
		kept_tags.push(rebuilt);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::field_kind::FieldKind;
	use crate::ids::fnv1a_32;
	use crate::property::{Property, PropertyFlags, PropertyUsage};
	use crate::structure::Structure;

	fn register_v1() {
		static REGISTERED: std::sync::Once = std::sync::Once::new();
		REGISTERED.call_once(|| {
		Registry::register(Structure::new(
			fnv1a_32("refresh::tests::Shape"),
			"Shape",
			None,
			8,
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
		});
	}

	#[test]
	fn tag_for_removed_property_is_dropped() {
		register_v1();
		let struct_id = fnv1a_32("refresh::tests::Shape");
		let mut dt = DataTemplate::new(struct_id);
		dt.tags.push(Tag::new(fnv1a_32("removed_field"), 0, 0, 0, false, FieldKind::Int32, 0, 0, 0));
		dt.data.extend_from_slice(&42i32.to_le_bytes());

		let dropped = refresh_after_layout_changed(&mut dt);
		assert_eq!(dropped, 1);
		assert!(dt.tags.is_empty());
	}

	#[test]
	fn tag_for_surviving_property_is_kept() {
		register_v1();
		let struct_id = fnv1a_32("refresh::tests::Shape");
		let mut dt = DataTemplate::new(struct_id);
		dt.tags.push(Tag::new(fnv1a_32("value"), 0, 0, 0, false, FieldKind::Int32, 0, 0, 0));
		dt.data.extend_from_slice(&42i32.to_le_bytes());

		let dropped = refresh_after_layout_changed(&mut dt);
		assert_eq!(dropped, 0);
		assert_eq!(dt.tags.len(), 1);
	}
}
