//! The closed set of value kinds a property can hold.

use stencil_derive::FromRepr;

/// Discriminant stored (5 bits) in every [`Tag`](crate::tag::Tag).
///
/// Closed by design: adding a variant here is an engine-wide change, not an
/// extension point. New container/scalar behaviour is added through
/// [`crate::handler::Handler`], not through this enum.
#[derive(FromRepr, Copy, Clone, Eq, PartialEq, Debug, Hash)]
#[repr(u8)]
pub enum FieldKind {
	Int8 = 0,
	Int16 = 1,
	Int32 = 2,
	Int64 = 3,
	UInt8 = 4,
	UInt16 = 5,
	UInt32 = 6,
	UInt64 = 7,
	Float32 = 8,
	Float64 = 9,
	String = 10,
	ObjectRef = 11,
	Struct = 12,
	Array = 13,
	Vector = 14,
	Map = 15,
}

impl FieldKind {
	/// Fixed-size scalars that are copied by value and never recurse.
	pub const fn is_simple(self) -> bool {
		!matches!(self, FieldKind::String | FieldKind::Struct | FieldKind::Array | FieldKind::Vector | FieldKind::Map)
	}

	/// Kinds whose `SkipNativeDefaultValues` comparison is "equals zero".
	pub const fn is_numeric(self) -> bool {
		matches!(
			self,
			FieldKind::Int8
				| FieldKind::Int16 | FieldKind::Int32
				| FieldKind::Int64 | FieldKind::UInt8
				| FieldKind::UInt16 | FieldKind::UInt32
				| FieldKind::UInt64 | FieldKind::Float32
				| FieldKind::Float64
		)
	}

	/// Kinds that recurse into a nested subtree of tags (composite values).
	pub const fn is_composite(self) -> bool {
		matches!(self, FieldKind::Struct | FieldKind::Array | FieldKind::Vector | FieldKind::Map)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn simple_and_composite_partition_the_set() {
		for kind in [
			FieldKind::Int8,
			FieldKind::UInt64,
			FieldKind::Float64,
			FieldKind::String,
			FieldKind::ObjectRef,
			FieldKind::Struct,
			FieldKind::Array,
			FieldKind::Vector,
			FieldKind::Map,
		] {
			assert_ne!(kind.is_simple(), kind.is_composite() || kind == FieldKind::String || kind == FieldKind::ObjectRef);
		}
	}

	#[test]
	fn from_repr_round_trips() {
		assert_eq!(FieldKind::from_repr(15), Some(FieldKind::Map));
		assert_eq!(FieldKind::from_repr(16), None);
	}
}
