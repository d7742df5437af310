//! The member catalog.
//!
//! Classifying members walks a model's base chain and checks every member's
//! flags. The result never changes for a type, so it is computed once per
//! type, published atomically, and shared by every later operation.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::TypeId;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use wf_utils::TypeIdMap;
use wf_utils::hash::HashSet;

use crate::model::{MemberGroup, MemberInfo, Model, ModelInfo, TypedModel};
use crate::value::{Value, ValueError};

// -----------------------------------------------------------------------------
// CatalogMember

/// One member of a flattened catalog entry.
#[derive(Debug, Clone, Copy)]
pub struct CatalogMember {
    info: &'static MemberInfo,
    owner: &'static ModelInfo,
    depth: usize,
}

impl CatalogMember {
    #[inline]
    pub fn info(&self) -> &'static MemberInfo {
        self.info
    }

    /// The model type that declares the member.
    #[inline]
    pub fn owner(&self) -> &'static ModelInfo {
        self.owner
    }

    /// Number of base hops from the cataloged type to the declaring type.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Reads the member from an instance of the cataloged type.
    pub fn read(&self, model: &dyn Model) -> Value {
        self.info.read(base_of(model, self.depth))
    }

    /// Writes the member into an instance of the cataloged type.
    pub fn write(&self, model: &mut dyn Model, value: Value) -> Result<(), ValueError> {
        self.info.write(base_of_mut(model, self.depth), value)
    }
}

fn base_of(mut model: &dyn Model, depth: usize) -> &dyn Model {
    for _ in 0..depth {
        model = match model.base() {
            Some(base) => base,
            None => panic!(
                "`{}` declares a base model but `Model::base` returned `None`",
                model.model_info().type_path()
            ),
        };
    }
    model
}

fn base_of_mut(mut model: &mut dyn Model, depth: usize) -> &mut dyn Model {
    for _ in 0..depth {
        let type_path = model.model_info().type_path();
        model = match model.base_mut() {
            Some(base) => base,
            None => panic!("`{type_path}` declares a base model but `Model::base_mut` returned `None`"),
        };
    }
    model
}

// -----------------------------------------------------------------------------
// CatalogEntry

/// The cached member classification of one model type.
///
/// Members are ordered base first, each level in declaration order. A member
/// redeclared by a derived type under the same group and name replaces the
/// base one in place.
#[derive(Debug)]
pub struct CatalogEntry {
    info: &'static ModelInfo,
    chain: Vec<TypeId>,
    members: Vec<CatalogMember>,
    serialized: Vec<usize>,
    items: Option<usize>,
}

impl CatalogEntry {
    /// Flattens the base chain of `info`.
    ///
    /// # Panics
    ///
    /// Panics if two serialized members share a serialization name, if a
    /// serialization name starts with `$`, or if the declared items member
    /// does not exist. Names starting with `$` are kept for element framing.
    pub fn build(info: &'static ModelInfo) -> Self {
        let mut levels = Vec::new();
        let mut current = Some(info);
        while let Some(level) = current {
            levels.push(level);
            current = level.base();
        }

        let mut members: Vec<CatalogMember> = Vec::new();
        for (depth, level) in levels.iter().enumerate().rev() {
            for member in level.members() {
                let entry = CatalogMember {
                    info: member,
                    owner: level,
                    depth,
                };
                match members.iter_mut().find(|existing| {
                    existing.info.group() == member.group() && existing.info.name() == member.name()
                }) {
                    Some(existing) => *existing = entry,
                    None => members.push(entry),
                }
            }
        }

        let serialized: Vec<usize> = (0..members.len())
            .filter(|&index| members[index].info.is_serialized())
            .collect();

        let mut names: HashSet<&str> = HashSet::default();
        for &index in &serialized {
            let name = members[index].info.serialization_name();
            assert!(
                !name.starts_with('$'),
                "`{}` member `{name}` uses the reserved `$` prefix",
                info.type_path()
            );
            assert!(
                names.insert(name),
                "`{}` has two serialized members named `{name}`",
                info.type_path()
            );
        }

        let items = levels.iter().find_map(|level| level.items()).map(|name| {
            match members.iter().position(|member| member.info.name() == name) {
                Some(index) => index,
                None => panic!(
                    "`{}` names `{name}` as its items member but declares no such member",
                    info.type_path()
                ),
            }
        });

        Self {
            info,
            chain: levels.iter().map(|level| level.type_id()).collect(),
            members,
            serialized,
            items,
        }
    }

    #[inline]
    pub fn info(&self) -> &'static ModelInfo {
        self.info
    }

    /// Every member, excluded ones included.
    #[inline]
    pub fn members(&self) -> &[CatalogMember] {
        &self.members
    }

    /// Members that survive declaration-time exclusion.
    pub fn members_to_serialize(&self) -> impl ExactSizeIterator<Item = &CatalogMember> {
        self.serialized.iter().map(|&index| &self.members[index])
    }

    pub fn member(&self, name: &str) -> Option<&CatalogMember> {
        self.members.iter().find(|member| member.info.name() == name)
    }

    /// The list or map member holding the model's items.
    #[inline]
    pub fn items_member(&self) -> Option<&CatalogMember> {
        self.items.map(|index| &self.members[index])
    }

    pub fn names_in(&self, group: MemberGroup) -> impl Iterator<Item = &'static str> + '_ {
        self.members
            .iter()
            .filter(move |member| member.info.group() == group)
            .map(|member| member.info.name())
    }

    #[inline]
    pub fn dynamic_property_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.names_in(MemberGroup::DynamicProperty)
    }

    #[inline]
    pub fn property_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.names_in(MemberGroup::Property)
    }

    #[inline]
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.names_in(MemberGroup::Field)
    }

    /// Whether `type_id` is the cataloged type or one of its bases.
    #[inline]
    pub fn depends_on(&self, type_id: TypeId) -> bool {
        self.chain.contains(&type_id)
    }
}

// -----------------------------------------------------------------------------
// MemberCatalog

/// A thread-safe cache of [`CatalogEntry`]s keyed by model type.
///
/// Lookups take a read lock. A miss builds the entry without holding any lock
/// and publishes it under the write lock only if no other thread got there
/// first, so every caller ends up with the same `Arc`.
#[derive(Default)]
pub struct MemberCatalog {
    entries: RwLock<TypeIdMap<Arc<CatalogEntry>>>,
    published: AtomicUsize,
}

impl MemberCatalog {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn read(&self) -> RwLockReadGuard<'_, TypeIdMap<Arc<CatalogEntry>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn write(&self) -> RwLockWriteGuard<'_, TypeIdMap<Arc<CatalogEntry>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the entry of `info`, building and publishing it on first use.
    pub fn entry(&self, info: &'static ModelInfo) -> Arc<CatalogEntry> {
        if let Some(entry) = self.read().get(&info.type_id()) {
            return entry.clone();
        }

        let built = Arc::new(CatalogEntry::build(info));

        self.write()
            .get_or_insert(info.type_id(), || {
                self.published.fetch_add(1, Ordering::Relaxed);
                log::debug!(
                    "cataloged `{}` with {} members",
                    info.type_path(),
                    built.members.len()
                );
                built
            })
            .clone()
    }

    /// The members to serialize for `info`, after declaration-time exclusion.
    pub fn members_to_serialize(&self, info: &'static ModelInfo) -> Vec<CatalogMember> {
        self.entry(info).members_to_serialize().copied().collect()
    }

    /// The group of member `name` on `info`.
    ///
    /// # Panics
    ///
    /// Panics if the type has no member with that name.
    pub fn member_group(&self, info: &'static ModelInfo, name: &str) -> MemberGroup {
        match self.entry(info).member(name) {
            Some(member) => member.info.group(),
            None => panic!("`{}` has no member named `{name}`", info.type_path()),
        }
    }

    /// Builds the entry of `info` ahead of time.
    #[inline]
    pub fn warmup(&self, info: &'static ModelInfo) {
        self.entry(info);
    }

    #[inline]
    pub fn warmup_type<T: TypedModel>(&self) {
        self.warmup(T::type_info());
    }

    /// Drops the entry of `type_id` and of every type deriving from it.
    ///
    /// Operations already holding an entry keep using it.
    pub fn invalidate(&self, type_id: TypeId) {
        self.write().retain(|_, entry| !entry.depends_on(type_id));
    }

    pub fn invalidate_all(&self) {
        self.write().clear();
    }

    /// How many entries were ever published.
    #[inline]
    pub fn published_entries(&self) -> usize {
        self.published.load(Ordering::Relaxed)
    }

    /// Number of cached entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.read().len()
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;
    use alloc::vec::Vec;
    use std::thread;

    use super::{CatalogEntry, MemberCatalog};
    use crate::model::{MemberGroup, Model, PropertyBag, TypedModel};

    #[derive(crate::Model, Default)]
    struct Entity {
        id: u32,
        #[model(exclude)]
        revision: u32,
    }

    #[derive(crate::Model, Default)]
    #[model(dynamic(name = "Notes", ty = String))]
    #[model(property(name = "Title", ty = String, get = Self::title))]
    #[model(property(name = "Summary", ty = String, get = Self::title, include))]
    struct Document {
        #[model(base)]
        entity: Entity,
        #[model(bag)]
        bag: PropertyBag,
        #[model(rename = "Body")]
        body: String,
    }

    impl Document {
        fn title(&self) -> String {
            self.body.lines().next().unwrap_or_default().into()
        }
    }

    #[test]
    fn base_members_come_first() {
        let entry = CatalogEntry::build(Document::type_info());
        let names: Vec<_> = entry.members().iter().map(|m| m.info().name()).collect();
        assert_eq!(names, ["id", "revision", "Notes", "Title", "Summary", "body"]);

        let id = entry.member("id").unwrap();
        assert_eq!(id.depth(), 1);
        assert_eq!(id.owner().type_path(), Entity::type_info().type_path());
    }

    #[test]
    fn exclusion_keeps_member_in_full_listing() {
        let entry = CatalogEntry::build(Document::type_info());
        let serialized: Vec<_> = entry
            .members_to_serialize()
            .map(|m| m.info().serialization_name())
            .collect();

        assert_eq!(serialized, ["id", "Notes", "Summary", "Body"]);
        assert!(entry.member("revision").is_some());
        assert!(entry.member("Title").is_some());
    }

    #[test]
    fn groups_are_classified() {
        let catalog = MemberCatalog::new();
        let info = Document::type_info();
        assert_eq!(catalog.member_group(info, "Notes"), MemberGroup::DynamicProperty);
        assert_eq!(catalog.member_group(info, "Title"), MemberGroup::Property);
        assert_eq!(catalog.member_group(info, "body"), MemberGroup::Field);

        let entry = catalog.entry(info);
        assert_eq!(entry.dynamic_property_names().collect::<Vec<_>>(), ["Notes"]);
        assert_eq!(entry.property_names().count(), 2);
        assert_eq!(entry.field_names().count(), 3);
    }

    #[derive(crate::Model, Default)]
    struct Impostor {
        #[model(rename = "$id")]
        id: u32,
    }

    #[test]
    #[should_panic(expected = "member `$id` uses the reserved `$` prefix")]
    fn framing_names_are_reserved() {
        CatalogEntry::build(Impostor::type_info());
    }

    #[test]
    #[should_panic(expected = "has no member named `missing`")]
    fn unknown_member_group_panics() {
        MemberCatalog::new().member_group(Document::type_info(), "missing");
    }

    #[test]
    fn members_read_through_base_chain() {
        let mut doc = Document {
            entity: Entity { id: 7, revision: 1 },
            body: "Heading\ntext".into(),
            ..Default::default()
        };
        let entry = CatalogEntry::build(Document::type_info());

        let id = entry.member("id").unwrap();
        assert_eq!(id.read(&doc), crate::value::Value::UInt(7));
        id.write(&mut doc, crate::value::Value::UInt(9)).unwrap();
        assert_eq!(doc.entity.id, 9);

        let title = entry.member("Title").unwrap();
        assert_eq!(title.read(&doc), crate::value::Value::from("Heading"));

        let notes = entry.member("Notes").unwrap();
        notes
            .write(&mut doc, crate::value::Value::from("draft"))
            .unwrap();
        assert_eq!(doc.property_bag().unwrap().get_as::<String>("Notes").unwrap(), "draft");
    }

    #[test]
    fn concurrent_warmup_publishes_once() {
        let catalog = MemberCatalog::new();

        let entries: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| catalog.entry(Document::type_info())))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for entry in &entries {
            assert!(Arc::ptr_eq(entry, &entries[0]));
        }
        assert_eq!(catalog.published_entries(), 1);
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn invalidating_a_base_drops_derived_entries() {
        let catalog = MemberCatalog::new();
        catalog.warmup_type::<Document>();
        catalog.warmup_type::<Entity>();
        assert_eq!(catalog.len(), 2);

        catalog.invalidate(Entity::type_info().type_id());
        assert_eq!(catalog.len(), 0);

        catalog.warmup_type::<Document>();
        assert_eq!(catalog.published_entries(), 3);
    }
}
