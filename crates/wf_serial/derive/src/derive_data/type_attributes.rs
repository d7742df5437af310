use proc_macro2::Span;
use syn::meta::ParseNestedMeta;
use syn::{Attribute, LitStr, Path, Type};

use super::{parse_bool, parse_lit_str};
use crate::MODEL_ATTRIBUTE_NAME;

/// `dynamic(name = "..", ty = T [, rename = "..", exclude])`
pub(crate) struct DynamicMember {
    pub name: LitStr,
    pub ty: Type,
    pub rename: Option<LitStr>,
    pub exclude: bool,
}

/// `property(name = "..", ty = T, get = path [, set = path, rename = "..", include, exclude])`
pub(crate) struct PropertyMember {
    pub name: LitStr,
    pub ty: Type,
    pub get: Path,
    pub set: Option<Path>,
    pub rename: Option<LitStr>,
    pub include: bool,
    pub exclude: bool,
}

/// Attributes applied to the type itself.
#[derive(Default)]
pub(crate) struct TypeAttributes {
    pub type_path: Option<LitStr>,
    pub no_default: bool,
    pub callbacks: bool,
    pub custom: bool,
    /// Only meaningful with the `auto_register` feature.
    pub auto_register: Option<Span>,
    pub as_collection: bool,
    /// Enums only.
    pub as_string: bool,
    pub dynamic: Vec<DynamicMember>,
    pub properties: Vec<PropertyMember>,
}

impl TypeAttributes {
    pub fn parse_attrs(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut this = Self::default();
        for attr in attrs {
            if attr.path().is_ident(MODEL_ATTRIBUTE_NAME) {
                attr.parse_nested_meta(|meta| this.parse_meta(meta))?;
            }
        }
        Ok(this)
    }

    fn parse_meta(&mut self, meta: ParseNestedMeta) -> syn::Result<()> {
        let path = &meta.path;
        if path.is_ident("type_path") {
            self.type_path = Some(parse_lit_str(&meta)?);
        } else if path.is_ident("no_default") {
            self.no_default = true;
        } else if path.is_ident("callbacks") {
            self.callbacks = true;
        } else if path.is_ident("custom") {
            self.custom = true;
        } else if path.is_ident("auto_register") {
            self.auto_register = Some(path.segments[0].ident.span());
        } else if path.is_ident("as_collection") {
            self.as_collection = parse_bool(&meta)?;
        } else if path.is_ident("as_string") {
            self.as_string = parse_bool(&meta)?;
        } else if path.is_ident("dynamic") {
            self.dynamic.push(DynamicMember::parse(&meta)?);
        } else if path.is_ident("property") {
            self.properties.push(PropertyMember::parse(&meta)?);
        } else {
            return Err(meta.error("unsupported `model` type attribute"));
        }
        Ok(())
    }
}

impl DynamicMember {
    fn parse(meta: &ParseNestedMeta) -> syn::Result<Self> {
        let mut name = None;
        let mut ty = None;
        let mut rename = None;
        let mut exclude = false;

        meta.parse_nested_meta(|inner| {
            if inner.path.is_ident("name") {
                name = Some(parse_lit_str(&inner)?);
            } else if inner.path.is_ident("ty") {
                ty = Some(inner.value()?.parse()?);
            } else if inner.path.is_ident("rename") {
                rename = Some(parse_lit_str(&inner)?);
            } else if inner.path.is_ident("exclude") {
                exclude = true;
            } else {
                return Err(inner.error("expected `name`, `ty`, `rename` or `exclude`"));
            }
            Ok(())
        })?;

        Ok(Self {
            name: name.ok_or_else(|| meta.error("dynamic property needs `name = \"..\"`"))?,
            ty: ty.ok_or_else(|| meta.error("dynamic property needs `ty = Type`"))?,
            rename,
            exclude,
        })
    }
}

impl PropertyMember {
    fn parse(meta: &ParseNestedMeta) -> syn::Result<Self> {
        let mut name = None;
        let mut ty = None;
        let mut get = None;
        let mut set = None;
        let mut rename = None;
        let mut include = false;
        let mut exclude = false;

        meta.parse_nested_meta(|inner| {
            let path = &inner.path;
            if path.is_ident("name") {
                name = Some(parse_lit_str(&inner)?);
            } else if path.is_ident("ty") {
                ty = Some(inner.value()?.parse()?);
            } else if path.is_ident("get") {
                get = Some(inner.value()?.parse()?);
            } else if path.is_ident("set") {
                set = Some(inner.value()?.parse()?);
            } else if path.is_ident("rename") {
                rename = Some(parse_lit_str(&inner)?);
            } else if path.is_ident("include") {
                include = true;
            } else if path.is_ident("exclude") {
                exclude = true;
            } else {
                return Err(inner.error(
                    "expected `name`, `ty`, `get`, `set`, `rename`, `include` or `exclude`",
                ));
            }
            Ok(())
        })?;

        Ok(Self {
            name: name.ok_or_else(|| meta.error("property needs `name = \"..\"`"))?,
            ty: ty.ok_or_else(|| meta.error("property needs `ty = Type`"))?,
            get: get.ok_or_else(|| meta.error("property needs `get = path`"))?,
            set,
            rename,
            include,
            exclude,
        })
    }
}
