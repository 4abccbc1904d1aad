use std::collections::BTreeMap;

use stencil::debug_print::{print, PlainJsonWriter};
use stencil::solver::TableObjectSolver;
use stencil::{delta, load, save, SaveFlags};
use stencil_derive::Reflected;

#[derive(Reflected, Default, Clone, PartialEq, Debug)]
struct Address {
	street: String,
	number: u32,
}

#[derive(Reflected, Default, Clone, PartialEq, Debug)]
struct Player {
	#[reflect(skip_default)]
	id: i32,
	name: String,
	address: Address,
	scores: Vec<i32>,
	inventory: BTreeMap<u32, String>,
}

fn main() {
	tracing_subscriber::fmt::init();

	let solver = TableObjectSolver::default();

	let mut base = Player::default();
	base.id = 1;
	base.name = "Lyra".into();
	base.address = Address { street: "Elm".into(), number: 12 };
	base.scores = vec![10, 20];

	let mut updated = base.clone();
	updated.scores.push(30);
	updated.inventory.insert(1, "torch".into());

	let base_template = save::save(&base, &solver, SaveFlags::SKIP_NATIVE_DEFAULT_VALUES);
	let updated_template = save::save(&updated, &solver, SaveFlags::SKIP_NATIVE_DEFAULT_VALUES);

	let mut writer = PlainJsonWriter::new();
	print(&updated_template, &mut writer);
	println!("{}", writer.finish());

	let diff = delta::diff(&base_template, &updated_template).expect("same structure");
	tracing::info!(tags = diff.tags.len(), "computed diff against base");

	let merged = delta::merge(&base_template, &diff).expect("same structure");
	let round_tripped: Player = load::load(&merged, &solver).expect("merged template matches Player layout");
	assert_eq!(round_tripped, updated);

	println!("round trip through diff+merge matched: {round_tripped:?}");
}
