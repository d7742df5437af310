use alloc::boxed::Box;
use alloc::vec::Vec;
use core::any::{TypeId, type_name};
use core::fmt;
use std::sync::OnceLock;

use crate::model::{Model, Shared, SharedAny, TypedModel};
use crate::value::{MemberType, Shape, Value, ValueError};

// -----------------------------------------------------------------------------
// MemberGroup

/// How a member is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberGroup {
    /// A value held in the model's [`PropertyBag`](crate::model::PropertyBag).
    DynamicProperty,
    /// A getter/setter pair.
    Property,
    /// A plain struct field.
    Field,
    /// The items of a model serialized as a collection.
    RootCollection,
    /// The entries of a model serialized as a dictionary.
    RootDictionary,
    /// A single value standing for the whole root.
    SimpleRootValue,
}

impl MemberGroup {
    #[inline]
    pub const fn is_root(self) -> bool {
        matches!(
            self,
            MemberGroup::RootCollection | MemberGroup::RootDictionary | MemberGroup::SimpleRootValue
        )
    }
}

// -----------------------------------------------------------------------------
// Flags

bitflags::bitflags! {
    /// Declaration-time member flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MemberFlags: u8 {
        /// Never serialized.
        const EXCLUDED = 1 << 0;
        /// Derived from other state; skipped unless `INCLUDED`.
        const CALCULATED = 1 << 1;
        /// Serialize even though `CALCULATED`.
        const INCLUDED = 1 << 2;
    }
}

/// Member-level representation choices. `None` defers to modifiers and type
/// defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepresentationHints {
    pub as_collection: Option<bool>,
    pub as_dictionary: Option<bool>,
    pub enum_as_string: Option<bool>,
    pub parse: Option<bool>,
}

// -----------------------------------------------------------------------------
// MemberInfo

type Getter = Box<dyn Fn(&dyn Model) -> Value + Send + Sync>;
type Setter = Box<dyn Fn(&mut dyn Model, Value) -> Result<(), ValueError> + Send + Sync>;

enum MemberAccess {
    Stored { get: Getter, set: Option<Setter> },
    Dynamic {
        default: fn() -> Value,
        normalize: fn(Value) -> Result<Value, ValueError>,
    },
}

fn owner<M: Model>(model: &dyn Model) -> &M {
    match model.downcast_ref::<M>() {
        Some(model) => model,
        None => panic!(
            "member accessor of `{}` used on a different model type",
            type_name::<M>()
        ),
    }
}

fn owner_mut<M: Model>(model: &mut dyn Model) -> &mut M {
    match model.downcast_mut::<M>() {
        Some(model) => model,
        None => panic!(
            "member accessor of `{}` used on a different model type",
            type_name::<M>()
        ),
    }
}

/// The static description of one member.
pub struct MemberInfo {
    name: &'static str,
    serialization_name: &'static str,
    group: MemberGroup,
    shape: fn() -> Shape,
    type_name: &'static str,
    flags: MemberFlags,
    hints: RepresentationHints,
    access: MemberAccess,
}

impl MemberInfo {
    fn new<F: MemberType>(name: &'static str, group: MemberGroup, access: MemberAccess) -> Self {
        Self {
            name,
            serialization_name: name,
            group,
            shape: F::shape,
            type_name: type_name::<F>(),
            flags: MemberFlags::empty(),
            hints: RepresentationHints::default(),
            access,
        }
    }

    /// A struct field of model `M`.
    ///
    /// ```
    /// # use wf_serial::model::{MemberGroup, MemberInfo};
    /// # #[derive(wf_serial::Model, Default)]
    /// # struct Person { name: String }
    /// let info = MemberInfo::field::<Person, String>("name", |p| &p.name, |p| &mut p.name);
    /// assert_eq!(info.group(), MemberGroup::Field);
    /// ```
    pub fn field<M: Model, F: MemberType>(
        name: &'static str,
        get: fn(&M) -> &F,
        get_mut: fn(&mut M) -> &mut F,
    ) -> Self {
        let access = MemberAccess::Stored {
            get: Box::new(move |model: &dyn Model| -> Value { get(owner::<M>(model)).to_value() }),
            set: Some(Box::new(
                move |model: &mut dyn Model, value: Value| -> Result<(), ValueError> {
                    *get_mut(owner_mut::<M>(model)) = F::from_value(value)?;
                    Ok(())
                },
            )),
        };
        Self::new::<F>(name, MemberGroup::Field, access)
    }

    /// A getter/setter property of model `M`. Without a setter the property
    /// is calculated.
    pub fn property<M: Model, F: MemberType>(
        name: &'static str,
        get: fn(&M) -> F,
        set: Option<fn(&mut M, F)>,
    ) -> Self {
        let calculated = set.is_none();
        let access = MemberAccess::Stored {
            get: Box::new(move |model: &dyn Model| -> Value { get(owner::<M>(model)).to_value() }),
            set: set.map(|set| -> Setter {
                Box::new(
                    move |model: &mut dyn Model, value: Value| -> Result<(), ValueError> {
                        set(owner_mut::<M>(model), F::from_value(value)?);
                        Ok(())
                    },
                )
            }),
        };
        let info = Self::new::<F>(name, MemberGroup::Property, access);
        if calculated {
            info.with_flags(MemberFlags::CALCULATED)
        } else {
            info
        }
    }

    /// A dynamic property of type `F`, stored in the model's property bag.
    pub fn dynamic<F: MemberType + Default>(name: &'static str) -> Self {
        let default: fn() -> Value = || F::default().to_value();
        let normalize: fn(Value) -> Result<Value, ValueError> =
            |value| F::from_value(value).map(|v| v.to_value());
        let access = MemberAccess::Dynamic { default, normalize };
        Self::new::<F>(name, MemberGroup::DynamicProperty, access)
    }

    pub fn with_serialization_name(mut self, name: &'static str) -> Self {
        self.serialization_name = name;
        self
    }

    pub fn with_flags(mut self, flags: MemberFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn with_hints(mut self, hints: RepresentationHints) -> Self {
        self.hints = hints;
        self
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn serialization_name(&self) -> &'static str {
        self.serialization_name
    }

    #[inline]
    pub fn group(&self) -> MemberGroup {
        self.group
    }

    #[inline]
    pub fn shape(&self) -> Shape {
        (self.shape)()
    }

    /// The Rust type name of the member.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[inline]
    pub fn flags(&self) -> MemberFlags {
        self.flags
    }

    #[inline]
    pub fn hints(&self) -> &RepresentationHints {
        &self.hints
    }

    /// Whether the member is written by default, before modifiers are asked.
    pub fn is_serialized(&self) -> bool {
        !self.flags.contains(MemberFlags::EXCLUDED)
            && (!self.flags.contains(MemberFlags::CALCULATED)
                || self.flags.contains(MemberFlags::INCLUDED))
    }

    /// Whether a value can be stored back.
    pub fn is_writable(&self) -> bool {
        match &self.access {
            MemberAccess::Stored { set, .. } => set.is_some(),
            MemberAccess::Dynamic { .. } => true,
        }
    }

    /// Reads the member from `model`, which must be the declaring type.
    ///
    /// # Panics
    ///
    /// Panics if `model` is not the declaring type, or if it is a dynamic
    /// property and the model has no property bag.
    pub fn read(&self, model: &dyn Model) -> Value {
        match &self.access {
            MemberAccess::Stored { get, .. } => get(model),
            MemberAccess::Dynamic { default, .. } => match model.property_bag() {
                Some(bag) => bag.get(self.name).cloned().unwrap_or_else(default),
                None => panic!(
                    "dynamic property `{}` declared on a model without a property bag",
                    self.name
                ),
            },
        }
    }

    /// Stores `value` into `model`. Read-only members ignore the call.
    ///
    /// # Panics
    ///
    /// Same conditions as [`read`](Self::read).
    pub fn write(&self, model: &mut dyn Model, value: Value) -> Result<(), ValueError> {
        match &self.access {
            MemberAccess::Stored { set: Some(set), .. } => set(model, value),
            MemberAccess::Stored { set: None, .. } => Ok(()),
            MemberAccess::Dynamic { normalize, .. } => {
                let value = normalize(value)?;
                match model.property_bag_mut() {
                    Some(bag) => {
                        bag.set_value(self.name, value);
                        Ok(())
                    }
                    None => panic!(
                        "dynamic property `{}` declared on a model without a property bag",
                        self.name
                    ),
                }
            }
        }
    }
}

impl fmt::Debug for MemberInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberInfo")
            .field("name", &self.name)
            .field("serialization_name", &self.serialization_name)
            .field("group", &self.group)
            .field("type_name", &self.type_name)
            .field("flags", &self.flags)
            .field("hints", &self.hints)
            .finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// ModelInfo

/// The static description of a model type.
///
/// Usually produced by `#[derive(Model)]`; it can also be assembled by hand
/// with the builder methods and stored in a [`ModelInfoCell`].
pub struct ModelInfo {
    type_id: TypeId,
    type_path: &'static str,
    type_name: &'static str,
    base: Option<fn() -> &'static ModelInfo>,
    members: Vec<MemberInfo>,
    items: Option<&'static str>,
    items_by_default: bool,
    create: Option<fn() -> SharedAny>,
}

impl ModelInfo {
    /// Starts a descriptor for `M`. The short type name is the last path segment.
    pub fn new<M: TypedModel>(type_path: &'static str) -> Self {
        let type_name = type_path.rsplit("::").next().unwrap_or(type_path);
        Self {
            type_id: TypeId::of::<M>(),
            type_path,
            type_name,
            base: None,
            members: Vec::new(),
            items: None,
            items_by_default: false,
            create: None,
        }
    }

    /// Declares `B` as the embedded base model.
    pub fn with_base<B: TypedModel>(mut self) -> Self {
        let base: fn() -> &'static ModelInfo = B::type_info;
        self.base = Some(base);
        self
    }

    pub fn with_member(mut self, member: MemberInfo) -> Self {
        self.members.push(member);
        self
    }

    /// Names the list or map member that holds the model's items.
    pub fn with_items(mut self, member: &'static str) -> Self {
        self.items = Some(member);
        self
    }

    /// Whether the model is serialized as its items when nothing else decides.
    pub fn with_items_by_default(mut self, enabled: bool) -> Self {
        self.items_by_default = enabled;
        self
    }

    /// Lets the engine create instances through `Default`.
    pub fn with_default<M: TypedModel + Default>(mut self) -> Self {
        let create: fn() -> SharedAny = || Shared::new(M::default()).to_any();
        self.create = Some(create);
        self
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    #[inline]
    pub fn type_path(&self) -> &'static str {
        self.type_path
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[inline]
    pub fn base(&self) -> Option<&'static ModelInfo> {
        self.base.map(|base| base())
    }

    /// Members declared on this type, excluding base members.
    #[inline]
    pub fn members(&self) -> &[MemberInfo] {
        &self.members
    }

    pub fn member(&self, name: &str) -> Option<&MemberInfo> {
        self.members.iter().find(|member| member.name == name)
    }

    #[inline]
    pub fn items(&self) -> Option<&'static str> {
        self.items
    }

    #[inline]
    pub fn items_by_default(&self) -> bool {
        self.items_by_default
    }

    /// Returns `true` if `self` is `other` or has it in its base chain.
    pub fn is_subtype_of(&self, other: &ModelInfo) -> bool {
        let mut current = Some(self);
        while let Some(info) = current {
            if info.type_id == other.type_id {
                return true;
            }
            current = info.base();
        }
        false
    }

    /// Creates a default instance, if the type allows it.
    pub fn create_instance(&self) -> Option<SharedAny> {
        self.create.map(|create| create())
    }
}

impl fmt::Debug for ModelInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelInfo")
            .field("type_path", &self.type_path)
            .field("base", &self.base().map(ModelInfo::type_path))
            .field("members", &self.members)
            .field("items", &self.items)
            .finish_non_exhaustive()
    }
}

/// Lazily built storage for a non-generic model's [`ModelInfo`].
pub struct ModelInfoCell(OnceLock<ModelInfo>);

impl ModelInfoCell {
    #[inline]
    pub const fn new() -> Self {
        Self(OnceLock::new())
    }

    /// Returns the descriptor, building it with `f` on first use.
    ///
    /// `f` must not call back into the same cell; nested shapes go through
    /// function pointers for that reason.
    #[inline]
    pub fn get_or_init(&'static self, f: impl FnOnce() -> ModelInfo) -> &'static ModelInfo {
        self.0.get_or_init(f)
    }
}

// -----------------------------------------------------------------------------
// EnumInfo

/// The static description of a fieldless enum.
#[derive(Debug)]
pub struct EnumInfo {
    type_path: &'static str,
    variants: &'static [&'static str],
    as_string: bool,
}

impl EnumInfo {
    pub const fn new(type_path: &'static str, variants: &'static [&'static str]) -> Self {
        Self {
            type_path,
            variants,
            as_string: false,
        }
    }

    /// Serialize by name unless a member or modifier decides otherwise.
    pub const fn with_as_string(mut self, as_string: bool) -> Self {
        self.as_string = as_string;
        self
    }

    #[inline]
    pub fn type_path(&self) -> &'static str {
        self.type_path
    }

    pub fn type_name(&self) -> &'static str {
        self.type_path.rsplit("::").next().unwrap_or(self.type_path)
    }

    /// Serialized variant names, in declaration order.
    #[inline]
    pub fn variants(&self) -> &'static [&'static str] {
        self.variants
    }

    #[inline]
    pub fn as_string(&self) -> bool {
        self.as_string
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.variants.iter().position(|variant| *variant == name)
    }
}

/// A fieldless enum usable as a member, usually via `#[derive(ModelEnum)]`.
pub trait EnumType: MemberType + Copy {
    fn enum_info() -> &'static EnumInfo;
}
