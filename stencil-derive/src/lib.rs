mod from_repr;
mod reflected;

use proc_macro::TokenStream;

/// Generates an `impl Reflected` for a plain struct with named fields,
/// deriving each field's flat `Property` entries (and any `SubType`/
/// `Container` children a composite field needs) from its Rust type.
///
/// Recognised field shapes: the ten scalar primitives, `String`, a fixed
/// size array `[T; N]`, `Vec<T>`, `BTreeMap<K, V>`, and any other type
/// (assumed to itself implement `Reflected`) as a nested struct field.
///
/// `#[reflect(object_ref)]` marks a `usize` field as an opaque object
/// reference resolved through an `ObjectSolver` instead of being saved by
/// value. `#[reflect(skip_default)]` elides the field from a saved
/// template when it holds its type's default value and the save call
/// requested `SKIP_NATIVE_DEFAULT_VALUES`. `#[reflect(extends = "Base")]`
/// on the struct itself chains it onto `Base` as a super-struct.
#[proc_macro_derive(Reflected, attributes(reflect))]
pub fn derive_reflected(input: TokenStream) -> TokenStream {
	reflected::derive(input).into()
}

#[proc_macro_derive(FromRepr)]
pub fn derive_from_repr(input: TokenStream) -> TokenStream {
	from_repr::derive(input).into()
}
