//! A reflection-driven binary serialization core.
//!
//! Types opt in with `#[derive(Reflected)]` (or a hand-written
//! [`reflect::Reflected`] impl) and are registered once, process-wide, in
//! [`registry::Registry`]. From there:
//!
//! - [`save::save`] walks a live value into a [`data_template::DataTemplate`]
//!   — a flat preorder vector of 16-byte [`tag::Tag`]s plus a byte blob.
//! - [`load::load`]/[`load::load_into`] walk a template back into a value.
//! - [`refresh::refresh_after_layout_changed`] reconciles an already-saved
//!   template with a structure whose layout has since changed.
//! - [`delta::merge`]/[`delta::diff`] combine or compare two templates of
//!   the same (or a derived) structure.
//! - [`archive::SingleObjectArchive`] is the on-disk envelope around one
//!   archived object.
//! - [`debug_print::print`] dumps a template through an injected
//!   [`debug_print::JsonWriter`].

extern crate self as stencil;

pub mod archive;
pub mod data_template;
pub mod debug_print;
pub mod delta;
pub mod error;
pub mod field_kind;
pub mod handler;
pub mod ids;
pub mod load;
pub mod property;
pub mod reflect;
pub mod refresh;
pub mod registry;
pub mod save;
pub mod solver;
pub mod structure;
pub mod tag;
pub mod wire;

pub use data_template::DataTemplate;
pub use error::{Result, TemplateError};
pub use field_kind::FieldKind;
pub use reflect::Reflected;
pub use registry::Registry;
pub use save::SaveFlags;
pub use solver::ObjectSolver;
pub use structure::Structure;
pub use tag::Tag;

#[cfg(test)]
mod integration_tests {
	use super::*;
	use crate::solver::TableObjectSolver;
	use stencil_derive::Reflected;

	#[derive(Reflected, Default, Clone, PartialEq, Debug)]
	struct Address {
		street: String,
		number: u32,
	}

	#[derive(Reflected, Default, Clone, PartialEq, Debug)]
	struct Holder {
		#[reflect(skip_default)]
		id: i32,
		name: String,
		address: Address,
		scores: Vec<i32>,
		tags: std::collections::BTreeMap<u32, String>,
	}

	#[test]
	fn save_then_load_round_trips_a_nested_struct() {
		let solver = TableObjectSolver::default();
		let mut holder = Holder::default();
		holder.id = 7;
        holder.name = "warrior".into();
		holder.address = Address { street: "Elm".into(), number: 12 };
		holder.scores = vec![10, 20, 30];
		holder.tags.insert(1, "one".into());
		holder.tags.insert(2, "two".into());

		let dt = save::save(&holder, &solver, SaveFlags::SKIP_NATIVE_DEFAULT_VALUES);
		let loaded: Holder = load::load(&dt, &solver).unwrap();

		assert_eq!(loaded, holder);
	}

	#[test]
	fn empty_default_holder_saves_almost_nothing() {
		let solver = TableObjectSolver::default();
		let holder = Holder::default();
		let dt = save::save(&holder, &solver, SaveFlags::SKIP_NATIVE_DEFAULT_VALUES);
		// `id` is the only field flagged to skip defaults; every other
		// field is still written (empty string/vec/map still emit a tag
		// whose subtree happens to be empty... except containers pop their
		// own tag when they end up with zero children).
		assert!(dt.tags.len() <= 2);
	}
}
