//! The on-disk envelope wrapping one or more archived objects.
//!
//! `ObjectArchive` is the outer container: a flags word plus an ordered
//! list of `SingleObjectArchive` entries. An entry carries no flag of its
//! own; whether it holds a full save or a diff is read off
//! `base_archive_id` being unset, exactly as `object_archive.h`'s
//! `SingleObjectArchive` has no flags field and distinguishes the two only
//! by whether `base_archive_id_` names a real asset. Asset/file-system
//! resolution (turning a `base_archive_id` into another loaded
//! `ObjectArchive`) is out of scope; this only (de)serialises the envelope
//! and the templates it carries.

use std::io::Cursor;

use crate::data_template::DataTemplate;
use crate::delta;
use crate::error::Result;
use crate::ids::{AssetId, ObjectId};
use crate::tag::Tag;
use crate::wire::{self, FromByteStream, ToByteStream};

bitflags::bitflags! {
	/// Closed set of archive-wide flags. Mirrors `object_archive.h`'s
	/// `ObjectArchiveFlags`; there is no per-entry flag.
	#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
	pub struct ObjectArchiveFlags: u32 {
		/// The archive's templates were saved with default values included
		/// rather than elided by `SKIP_NATIVE_DEFAULT_VALUES`.
		const DEFAULT_DATA = 1 << 0;
	}
}

/// One archived object: its own id, a display name, and either a full
/// template or a diff against a base archive's copy of the same object.
/// `base_archive_id == NULL_OBJECT_ID` means "no base": `template` is a
/// full save, not a diff.
pub struct SingleObjectArchive {
	pub object_id: ObjectId,
	pub name: String,
	pub base_archive_id: AssetId,
	pub id_in_base_archive: ObjectId,
	pub template: DataTemplate,
}

impl SingleObjectArchive {
	/// Wraps an already-saved `template` with no base archive.
	pub fn full(object_id: ObjectId, name: impl Into<String>, template: DataTemplate) -> Self {
		Self {
			object_id,
			name: name.into(),
			base_archive_id: crate::ids::NULL_OBJECT_ID,
			id_in_base_archive: crate::ids::NULL_OBJECT_ID,
			template,
		}
	}

	/// Wraps `diff(base, current)` along with enough identity to locate
	/// `base` again at load time.
	pub fn diffed(object_id: ObjectId, name: impl Into<String>, base_archive_id: AssetId, id_in_base_archive: ObjectId, base: &DataTemplate, current: &DataTemplate) -> Result<Self> {
		let template = delta::diff(base, current)?;
		Ok(Self { object_id, name: name.into(), base_archive_id, id_in_base_archive, template })
	}

	/// Whether `template` is a diff against a base archive rather than a
	/// full save.
	pub fn is_diff(&self) -> bool {
		self.base_archive_id != crate::ids::NULL_OBJECT_ID
	}

	/// Recovers the full template this entry represents, applying
	/// [`delta::merge`] against `base` if this entry is a diff.
	pub fn resolve(&self, base: Option<&DataTemplate>) -> Result<DataTemplate> {
		if self.is_diff() {
			let base = base.expect("a diffed entry requires its base template");
			delta::merge(base, &self.template)
		} else {
			Ok(self.template.clone())
		}
	}

	pub fn write(&self, out: &mut Vec<u8>) {
		self.object_id.write(out);
		wire::write_string(out, &self.name);
		self.base_archive_id.write(out);
		self.id_in_base_archive.write(out);
		self.template.struct_id.write(out);
		(self.template.tags.len() as u32).write(out);
		for tag in &self.template.tags {
			tag.property_id.write(out);
			tag.raw_packed().write(out);
		}
		(self.template.data.len() as u32).write(out);
		wire::write_bytes(out, &self.template.data);
	}

	pub fn read(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
		let object_id = ObjectId::read(cursor)?;
		let name = wire::read_string(cursor)?;
		let base_archive_id = AssetId::read(cursor)?;
		let id_in_base_archive = ObjectId::read(cursor)?;
		let struct_id = u32::read(cursor)?;
		let tag_count = u32::read(cursor)? as usize;
		let mut tags = Vec::with_capacity(tag_count);
		for _ in 0..tag_count {
			let property_id = u32::read(cursor)?;
			let packed = u64::read(cursor)?;
			tags.push(Tag::from_raw(property_id, packed));
		}
		let data_len = u32::read(cursor)? as usize;
		let mut data = vec![0u8; data_len];
		std::io::Read::read_exact(cursor, &mut data).map_err(|_| crate::error::TemplateError::UnexpectedEndOfData)?;

		Ok(Self { object_id, name, base_archive_id, id_in_base_archive, template: DataTemplate { struct_id, tags, data } })
	}
}

/// The outer envelope: a flags word followed by an ordered list of entries.
/// Wire order (`write`/`read`) matches `object_archive.h`'s
/// `operator<<`/`operator>>`: flags, entry count, then each entry in turn.
#[derive(Default)]
pub struct ObjectArchive {
	pub flags: ObjectArchiveFlags,
	pub entries: Vec<SingleObjectArchive>,
}

impl ObjectArchive {
	pub fn write(&self, out: &mut Vec<u8>) {
		self.flags.bits().write(out);
		(self.entries.len() as u32).write(out);
		for entry in &self.entries {
			entry.write(out);
		}
	}

	pub fn read(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
		let flags = ObjectArchiveFlags::from_bits_truncate(u32::read(cursor)?);
		let count = u32::read(cursor)? as usize;
		let mut entries = Vec::with_capacity(count);
		for _ in 0..count {
			entries.push(SingleObjectArchive::read(cursor)?);
		}
		Ok(Self { flags, entries })
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::field_kind::FieldKind;

	fn sample_template(struct_id: u32, value: i32) -> DataTemplate {
		let mut template = DataTemplate::new(struct_id);
		template.tags.push(Tag::new(1, 0, 0, 0, false, FieldKind::Int32, 0, 0, 0));
		template.data.extend_from_slice(&value.to_le_bytes());
		template
	}

	#[test]
	fn full_entry_round_trips_through_bytes() {
		let archive = SingleObjectArchive::full(5, "player", sample_template(42, 7));

		let mut bytes = Vec::new();
		archive.write(&mut bytes);
		let mut cursor = Cursor::new(bytes.as_slice());
		let read_back = SingleObjectArchive::read(&mut cursor).unwrap();

		assert_eq!(read_back.object_id, 5);
		assert_eq!(read_back.name, "player");
		assert_eq!(read_back.template.struct_id, 42);
		assert_eq!(read_back.template.tags.len(), 1);
		assert!(!read_back.is_diff());
	}

	#[test]
	fn diffed_entry_is_detected_by_base_archive_id() {
		let base = sample_template(42, 1);
		let current = sample_template(42, 2);
		let entry = SingleObjectArchive::diffed(5, "player", 0xABCD, 3, &base, &current).unwrap();
		assert!(entry.is_diff());
		let resolved = entry.resolve(Some(&base)).unwrap();
		assert_eq!(resolved.tags.len(), 1);
	}

	#[test]
	fn envelope_round_trips_multiple_entries() {
		let archive = ObjectArchive {
			flags: ObjectArchiveFlags::DEFAULT_DATA,
			entries: vec![SingleObjectArchive::full(1, "a", sample_template(1, 10)), SingleObjectArchive::full(2, "b", sample_template(1, 20))],
		};

		let mut bytes = Vec::new();
		archive.write(&mut bytes);
		let mut cursor = Cursor::new(bytes.as_slice());
		let read_back = ObjectArchive::read(&mut cursor).unwrap();

		assert_eq!(read_back.flags, ObjectArchiveFlags::DEFAULT_DATA);
		assert_eq!(read_back.entries.len(), 2);
		assert_eq!(read_back.entries[1].name, "b");
	}
}
