use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, GenericArgument, PathArguments, Type};

pub fn derive(tokens: proc_macro::TokenStream) -> TokenStream {
	let DeriveInput { ident, data, attrs, .. } = syn::parse(tokens).unwrap();

	let fields = match data {
		Data::Struct(data) => match data.fields {
			Fields::Named(fields) => fields.named,
			_ => panic!("#[derive(Reflected)] requires named fields"),
		},
		_ => panic!("#[derive(Reflected)] only supports structs"),
	};

	let super_struct = attrs
		.iter()
		.find(|attr| attr.path().is_ident("reflect"))
		.and_then(|attr| {
			let mut base = None;
			let _ = attr.parse_nested_meta(|meta| {
				if meta.path.is_ident("extends") {
					let value = meta.value()?;
					let lit: syn::LitStr = value.parse()?;
					base = Some(lit.parse::<Type>()?);
				}
				Ok(())
			});
			base
		})
		.map(|ty| quote! { Some(<#ty as ::stencil::reflect::Reflected>::struct_id()) })
		.unwrap_or(quote! { None });

	let mut property_entries = Vec::new();
	for field in &fields {
		let name = field.ident.as_ref().expect("named field");
		let name_str = name.to_string();
		let id_expr = quote!(::stencil::ids::fnv1a_32(#name_str));
		let offset_expr = quote!(::std::mem::offset_of!(#ident, #name) as u16);

		let flags = if has_flag(field, "skip_default") {
			quote!(::stencil::property::PropertyFlags::SKIP_NATIVE_DEFAULT_VALUES)
		} else {
			quote!(::stencil::property::PropertyFlags::empty())
		};

		if let Some(target) = object_ref_target(field) {
			let struct_id = target
				.map(|ty| quote! { Some(<#ty as ::stencil::reflect::Reflected>::struct_id()) })
				.unwrap_or(quote! { None });
			property_entries.push(main_property(
				&id_expr,
				&name_str,
				quote!(::stencil::field_kind::FieldKind::ObjectRef),
				struct_id,
				&offset_expr,
				&flags,
				quote!(0usize),
			));
			continue;
		}

		push_field_entries(&mut property_entries, &id_expr, &name_str, &field.ty, &offset_expr, &flags, 0);
	}

	let name_str = ident.to_string();

	quote! {
		impl ::stencil::reflect::Reflected for #ident {
			fn struct_id() -> ::stencil::ids::StructId {
				::stencil::ids::fnv1a_32(#name_str)
			}

			fn build_structure() -> ::stencil::structure::Structure {
				::stencil::structure::Structure::new(
					<Self as ::stencil::reflect::Reflected>::struct_id(),
					#name_str,
					#super_struct,
					::std::mem::size_of::<Self>(),
					vec![#(#property_entries),*],
				)
			}
		}
	}
}

#[allow(clippy::too_many_arguments)]
fn main_property(id_expr: &TokenStream, name_str: &str, field_kind: TokenStream, struct_id: TokenStream, offset_expr: &TokenStream, flags: &TokenStream, array_len: TokenStream) -> TokenStream {
	quote! {
		::stencil::property::Property {
			usage: ::stencil::property::PropertyUsage::Main,
			id: #id_expr,
			name: #name_str,
			field_kind: #field_kind,
			struct_id: #struct_id,
			offset: #offset_expr,
			flags: #flags,
			array_len: #array_len,
			handler: None,
			nest_level: 0,
		}
	}
}

fn sub_property(id_expr: &TokenStream, name_str: &str, field_kind: TokenStream, struct_id: TokenStream, nest_level: u8) -> TokenStream {
	quote! {
		::stencil::property::Property {
			usage: ::stencil::property::PropertyUsage::SubType,
			id: #id_expr,
			name: #name_str,
			field_kind: #field_kind,
			struct_id: #struct_id,
			offset: 0,
			flags: ::stencil::property::PropertyFlags::empty(),
			array_len: 0,
			handler: None,
			nest_level: #nest_level,
		}
	}
}

fn container_property(id_expr: &TokenStream, name_str: &str, field_kind: TokenStream, handler: TokenStream, nest_level: u8) -> TokenStream {
	quote! {
		::stencil::property::Property {
			usage: ::stencil::property::PropertyUsage::Container,
			id: #id_expr,
			name: #name_str,
			field_kind: #field_kind,
			struct_id: None,
			offset: 0,
			flags: ::stencil::property::PropertyFlags::empty(),
			array_len: 0,
			handler: Some(#handler),
			nest_level: #nest_level,
		}
	}
}

/// Appends the flat preorder entries for one field to `entries`: the `Main`
/// entry itself, followed by whatever `SubType`/`Container` children its
/// shape needs (a fixed array's element, a vector's handler and element, a
/// map's handler and key/value).
fn push_field_entries(entries: &mut Vec<TokenStream>, id_expr: &TokenStream, name_str: &str, ty: &Type, offset_expr: &TokenStream, flags: &TokenStream, nest_level: u8) {
	match ty {
		Type::Array(array) => {
			let elem_ty = &array.elem;
			let len_expr = &array.len;
			let (elem_kind, elem_struct) = leaf_kind_and_struct(elem_ty);
			entries.push(main_property(id_expr, name_str, quote!(::stencil::field_kind::FieldKind::Array), quote!(None), offset_expr, flags, quote!((#len_expr) as usize)));
			entries.push(sub_property(id_expr, name_str, elem_kind, elem_struct, nest_level + 1));
		},
		Type::Path(path) => {
			let segment = path.path.segments.last().expect("non-empty path");
			let name = segment.ident.to_string();
			match name.as_str() {
				"Vec" => {
					let inner = single_generic_arg(segment);
					let (elem_kind, elem_struct) = leaf_kind_and_struct(inner);
					let handler = quote!(::stencil::handler::Handler::vector::<#inner>(#elem_kind, #elem_struct));
					entries.push(main_property(id_expr, name_str, quote!(::stencil::field_kind::FieldKind::Vector), quote!(None), offset_expr, flags, quote!(0usize)));
					entries.push(container_property(id_expr, name_str, quote!(::stencil::field_kind::FieldKind::Vector), handler, nest_level + 1));
					entries.push(sub_property(id_expr, name_str, elem_kind, elem_struct, nest_level + 1));
				},
				"BTreeMap" => {
					let (key_ty, value_ty) = two_generic_args(segment);
					let (key_kind, key_struct) = leaf_kind_and_struct(key_ty);
					let (value_kind, value_struct) = leaf_kind_and_struct(value_ty);
					let handler = quote!(::stencil::handler::Handler::map::<#key_ty, #value_ty>(#key_kind, #value_kind, #value_struct));
					entries.push(main_property(id_expr, name_str, quote!(::stencil::field_kind::FieldKind::Map), quote!(None), offset_expr, flags, quote!(0usize)));
					entries.push(container_property(id_expr, name_str, quote!(::stencil::field_kind::FieldKind::Map), handler, nest_level + 1));
					entries.push(sub_property(id_expr, name_str, key_kind, key_struct, nest_level + 1));
					entries.push(sub_property(id_expr, name_str, value_kind, value_struct, nest_level + 1));
				},
				"i8" | "i16" | "i32" | "i64" | "u8" | "u16" | "u32" | "u64" | "f32" | "f64" | "String" => {
					let (kind, _) = leaf_kind_and_struct(ty);
					entries.push(main_property(id_expr, name_str, kind, quote!(None), offset_expr, flags, quote!(0usize)));
				},
				_ => {
					let (kind, struct_opt) = leaf_kind_and_struct(ty);
					entries.push(main_property(id_expr, name_str, kind, struct_opt, offset_expr, flags, quote!(0usize)));
				},
			}
		},
		_ => panic!("unsupported field type for #[derive(Reflected)]"),
	}
}

fn has_flag(field: &syn::Field, flag: &str) -> bool {
	field.attrs.iter().filter(|attr| attr.path().is_ident("reflect")).any(|attr| {
		let mut found = false;
		let _ = attr.parse_nested_meta(|meta| {
			if meta.path.is_ident(flag) {
				found = true;
			}
			Ok(())
		});
		found
	})
}

/// Looks for `#[reflect(object_ref)]` or `#[reflect(object_ref = "Target")]`.
/// Returns `None` if the field isn't marked as an object reference at all,
/// `Some(None)` for the bare form (declared pointee unknown, `WRONG_ID` at
/// runtime), `Some(Some(ty))` when a target type was named.
fn object_ref_target(field: &syn::Field) -> Option<Option<Type>> {
	let mut target = None;
	let mut present = false;
	for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("reflect")) {
		let _ = attr.parse_nested_meta(|meta| {
			if meta.path.is_ident("object_ref") {
				present = true;
				if let Ok(value) = meta.value() {
					let lit: syn::LitStr = value.parse()?;
					target = Some(lit.parse::<Type>()?);
				}
			}
			Ok(())
		});
	}
	present.then_some(target)
}

/// Classifies a leaf type (a container's element/key/value, or a fixed
/// array's element, never itself a container): primitive scalars,
/// `String`, or an assumed-`Reflected` user struct. Returns `(FieldKind
/// expr, Option<StructId> expr)`.
fn leaf_kind_and_struct(ty: &Type) -> (TokenStream, TokenStream) {
	let Type::Path(path) = ty else {
		panic!("unsupported element type in #[derive(Reflected)]");
	};
	let name = path.path.segments.last().expect("non-empty path").ident.to_string();
	let kind = match name.as_str() {
		"i8" => quote!(::stencil::field_kind::FieldKind::Int8),
		"i16" => quote!(::stencil::field_kind::FieldKind::Int16),
		"i32" => quote!(::stencil::field_kind::FieldKind::Int32),
		"i64" => quote!(::stencil::field_kind::FieldKind::Int64),
		"u8" => quote!(::stencil::field_kind::FieldKind::UInt8),
		"u16" => quote!(::stencil::field_kind::FieldKind::UInt16),
		"u32" => quote!(::stencil::field_kind::FieldKind::UInt32),
		"u64" => quote!(::stencil::field_kind::FieldKind::UInt64),
		"f32" => quote!(::stencil::field_kind::FieldKind::Float32),
		"f64" => quote!(::stencil::field_kind::FieldKind::Float64),
		"String" => quote!(::stencil::field_kind::FieldKind::String),
		_ => return (quote!(::stencil::field_kind::FieldKind::Struct), quote! { Some(<#ty as ::stencil::reflect::Reflected>::struct_id()) }),
	};
	(kind, quote!(None))
}

fn single_generic_arg(segment: &syn::PathSegment) -> &Type {
	let PathArguments::AngleBracketed(args) = &segment.arguments else {
		panic!("expected a generic argument");
	};
	match args.args.first().expect("at least one generic argument") {
		GenericArgument::Type(ty) => ty,
		_ => panic!("expected a type argument"),
	}
}

fn two_generic_args(segment: &syn::PathSegment) -> (&Type, &Type) {
	let PathArguments::AngleBracketed(args) = &segment.arguments else {
		panic!("expected generic arguments");
	};
	let mut iter = args.args.iter().filter_map(|arg| match arg {
		GenericArgument::Type(ty) => Some(ty),
		_ => None,
	});
	let key = iter.next().expect("key type argument");
	let value = iter.next().expect("value type argument");
	(key, value)
}
