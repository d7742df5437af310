use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;

use super::{MemberValue, SerializationServices, Serializer};
use crate::backend::{Backend, BinaryBackend, JsonBackend};
use crate::config::{DEFAULT_MAX_DEPTH, SerializationConfiguration};
use crate::context::SerializationContext;
use crate::error::{DecodeError, SerializeError};
use crate::model::{
    CustomSerialization, Model, PropertyBag, SerializationCallbacks, Shared, SharedAny,
    TypedModel, WeakShared,
};
use crate::modifier::{ModifierError, SerializerModifier};
use crate::value::{Culture, MemberType, Shape, Value, ValueError};

// -----------------------------------------------------------------------------
// Models

#[derive(crate::Model, Default)]
struct Node {
    name: String,
    children: Vec<Shared<Node>>,
}

impl Node {
    fn shared(name: &str, children: Vec<Shared<Node>>) -> Shared<Node> {
        Shared::new(Node {
            name: name.into(),
            children,
        })
    }
}

#[derive(crate::Model, Default)]
struct Tag {
    label: String,
}

#[derive(crate::Model, Default)]
struct Post {
    title: String,
    tags: Vec<Shared<Tag>>,
    pinned: Option<Shared<Tag>>,
}

#[derive(crate::Model, Default)]
struct Folder {
    name: String,
    parent: WeakShared<Folder>,
    children: Vec<Shared<Folder>>,
}

#[derive(crate::Model, Default)]
struct Person {
    name: String,
    age: u32,
    #[model(exclude)]
    secret: String,
}

#[derive(crate::ModelEnum, Clone, Copy, Debug, Default, PartialEq)]
enum Priority {
    #[default]
    Low,
    High,
}

#[derive(crate::Model, Default)]
struct Task {
    priority: Priority,
    #[model(as_string)]
    level: Priority,
}

#[derive(crate::Model, Default)]
struct Measure {
    #[model(parse)]
    ratio: f64,
    count: u32,
}

#[derive(crate::Model, Default)]
#[model(dynamic(name = "Notes", ty = String))]
struct Memo {
    #[model(bag)]
    bag: PropertyBag,
    body: String,
}

#[derive(crate::Model, Default)]
struct Entity {
    id: u32,
}

#[derive(crate::Model, Default)]
struct Article {
    #[model(base)]
    entity: Entity,
    title: String,
}

#[derive(crate::Model, Default)]
struct Shelf {
    #[model(items)]
    books: Vec<String>,
    label: String,
}

#[derive(crate::Model, Default)]
struct Library {
    #[model(base)]
    shelf: Shelf,
    city: String,
}

#[derive(crate::Model, Default)]
#[model(custom)]
struct Point {
    x: i32,
    y: i32,
}

impl CustomSerialization for Point {
    fn shape(&self) -> Shape {
        Shape::Text
    }

    fn save(&self) -> Result<Value, ValueError> {
        Ok(Value::String(alloc::format!("{};{}", self.x, self.y)))
    }

    fn load(&mut self, value: Value) -> Result<(), ValueError> {
        let text = String::from_value(value)?;
        let invalid = || ValueError::InvalidText {
            text: text.clone(),
            target: "Point",
        };
        let (x, y) = text.split_once(';').ok_or_else(invalid)?;
        self.x = x.parse().map_err(|_| invalid())?;
        self.y = y.parse().map_err(|_| invalid())?;
        Ok(())
    }
}

#[derive(crate::Model, Default)]
struct Plot {
    origin: Shared<Point>,
}

#[derive(crate::Model, Default)]
#[model(callbacks)]
struct Tracked {
    value: i64,
    #[model(ignore)]
    started: AtomicUsize,
    #[model(ignore)]
    finished: AtomicUsize,
    #[model(ignore)]
    restored: bool,
}

impl SerializationCallbacks for Tracked {
    fn start_serialization(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    fn finish_serialization(&self) {
        self.finished.fetch_add(1, Ordering::Relaxed);
    }

    fn finish_deserialization(&mut self) {
        self.restored = true;
    }
}

#[derive(crate::Model, Default)]
struct Circle {
    radius: f64,
}

#[derive(crate::Model, Default)]
struct Holder {
    content: Option<SharedAny>,
}

// -----------------------------------------------------------------------------
// Helpers

fn json_serializer() -> Serializer<JsonBackend> {
    Serializer::new(JsonBackend::new(), SerializationServices::new())
}

fn write<T: TypedModel>(serializer: &mut Serializer<JsonBackend>, root: &Shared<T>) -> Vec<u8> {
    let mut out = Vec::new();
    let report = serializer.serialize(root, &mut out).unwrap();
    assert!(report.is_complete(), "{:?}", report.failures);
    out
}

fn write_json<T: TypedModel>(
    serializer: &mut Serializer<JsonBackend>,
    root: &Shared<T>,
) -> serde_json::Value {
    serde_json::from_slice(&write(serializer, root)).unwrap()
}

fn bytes(json: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&json).unwrap()
}

// -----------------------------------------------------------------------------
// Graph shape and identity

#[test]
fn tree_round_trips() {
    let root = Node::shared(
        "root",
        vec![
            Node::shared("a", vec![Node::shared("a1", Vec::new())]),
            Node::shared("b", Vec::new()),
        ],
    );

    let mut serializer = json_serializer();
    let out = write(&mut serializer, &root);
    let back = serializer.deserialize::<Node>(out.as_slice()).unwrap();
    assert!(back.is_complete());

    let root = back.value.read();
    assert_eq!(root.name, "root");
    assert_eq!(root.children.len(), 2);
    assert_eq!(root.children[0].read().children[0].read().name, "a1");
    assert_eq!(root.children[1].read().name, "b");
}

#[test]
fn shared_instance_is_written_once() {
    let tag = Shared::new(Tag {
        label: "rust".into(),
    });
    let post = Shared::new(Post {
        title: "hello".into(),
        tags: vec![tag.clone(), tag.clone()],
        pinned: Some(tag),
    });

    let mut serializer = json_serializer();
    let json = write_json(&mut serializer, &post);
    assert_eq!(json["$type"], Post::type_info().type_path());
    assert_eq!(json["$id"], 1);
    assert_eq!(json["tags"][0]["label"], "rust");
    assert_eq!(json["tags"][0]["$id"], 2);
    assert_eq!(json["tags"][1], json!({ "$ref": 2 }));
    assert_eq!(json["pinned"], json!({ "$ref": 2 }));

    let back = serializer.deserialize::<Post>(bytes(json).as_slice()).unwrap();
    let post = back.value.read();
    assert!(post.tags[0].ptr_eq(&post.tags[1]));
    assert!(post.tags[0].ptr_eq(post.pinned.as_ref().unwrap()));
}

#[test]
fn cycle_through_weak_parent_round_trips() {
    let root = Shared::new(Folder {
        name: "root".into(),
        ..Default::default()
    });
    let child = Shared::new(Folder {
        name: "child".into(),
        parent: root.downgrade(),
        children: Vec::new(),
    });
    root.write().children.push(child);

    let mut serializer = json_serializer();
    let json = write_json(&mut serializer, &root);
    assert_eq!(json["children"][0]["parent"], json!({ "$ref": 1 }));

    let back = serializer.deserialize::<Folder>(bytes(json).as_slice()).unwrap();
    assert!(back.is_complete());
    let child = back.value.read().children[0].clone();
    assert_eq!(child.read().name, "child");
    let parent = child.read().parent.upgrade().unwrap();
    assert!(parent.ptr_eq(&back.value));
}

#[test]
fn graph_round_trips_through_binary() {
    let tag = Shared::new(Tag {
        label: "shared".into(),
    });
    let post = Shared::new(Post {
        title: "binary".into(),
        tags: vec![tag.clone()],
        pinned: Some(tag),
    });

    let mut serializer = Serializer::new(BinaryBackend::new(), SerializationServices::new());
    let mut out = Vec::new();
    serializer.serialize(&post, &mut out).unwrap();
    assert!(out.starts_with(crate::backend::MAGIC));

    let back = serializer.deserialize::<Post>(out.as_slice()).unwrap();
    assert!(back.is_complete());
    let post = back.value.read();
    assert_eq!(post.title, "binary");
    assert!(post.tags[0].ptr_eq(post.pinned.as_ref().unwrap()));
}

// -----------------------------------------------------------------------------
// Failures

#[test]
fn bad_member_is_recorded_and_skipped() {
    let json = json!({
        "$type": Person::type_info().type_path(),
        "$id": 1,
        "name": 5,
        "age": 42,
    });

    let mut serializer = json_serializer();
    let back = serializer.deserialize::<Person>(bytes(json).as_slice()).unwrap();
    assert!(!back.is_complete());
    assert_eq!(back.failures.len(), 1);
    assert_eq!(back.failures[0].member, "name");
    assert_eq!(back.failures[0].model_type, Person::type_info().type_path());

    let person = back.value.read();
    assert_eq!(person.age, 42);
    assert_eq!(person.name, "");
}

#[test]
fn absent_members_keep_their_defaults() {
    let json = json!({ "$type": Person::type_info().type_path(), "age": 7 });

    let mut serializer = json_serializer();
    let back = serializer.deserialize::<Person>(bytes(json).as_slice()).unwrap();
    assert!(back.is_complete());
    assert_eq!(back.value.read().age, 7);
    assert_eq!(back.value.read().name, "");
}

#[test]
fn malformed_documents_are_backend_errors() {
    let mut serializer = json_serializer();
    let err = serializer.deserialize::<Person>(&b"{ not json"[..]).unwrap_err();
    assert!(matches!(err, SerializeError::Backend(_)));

    let mut serializer = Serializer::new(BinaryBackend::new(), SerializationServices::new());
    let err = serializer.deserialize::<Person>(&b"NOPE\x00\x01"[..]).unwrap_err();
    assert!(matches!(err, SerializeError::Backend(_)));
}

#[test]
fn unknown_reference_aborts() {
    let json = json!({
        "$type": Node::type_info().type_path(),
        "$id": 1,
        "name": "root",
        "children": [{ "$ref": 7 }],
    });

    let mut serializer = json_serializer();
    let err = serializer.deserialize::<Node>(bytes(json).as_slice()).unwrap_err();
    assert!(matches!(err, SerializeError::UnknownReference(id) if id.get() == 7));
}

#[test]
fn depth_limit_aborts_and_leaves_the_serializer_usable() {
    let mut chain = Node::shared("leaf", Vec::new());
    for depth in 0..4 {
        chain = Node::shared(&alloc::format!("level{depth}"), vec![chain]);
    }

    let config = SerializationConfiguration::default().with_max_depth(3);
    let mut serializer = Serializer::with_configuration(
        JsonBackend::new(),
        SerializationServices::new(),
        config,
    );
    let err = serializer.serialize(&chain, Vec::new()).unwrap_err();
    assert!(matches!(
        err,
        SerializeError::DepthExceeded { max: 3, type_path } if type_path == Node::type_info().type_path()
    ));

    let shallow = Node::shared("top", vec![Node::shared("leaf", Vec::new())]);
    assert!(serializer.serialize(&shallow, Vec::new()).is_ok());
}

fn chain(len: usize) -> Shared<Node> {
    let mut node = Node::shared("0", Vec::new());
    for depth in 1..len {
        node = Node::shared(&alloc::format!("{depth}"), vec![node]);
    }
    node
}

fn chain_len(root: &Shared<Node>) -> usize {
    let mut len = 1;
    let mut node = root.clone();
    loop {
        let next = node.read().children.first().cloned();
        match next {
            Some(child) => {
                len += 1;
                node = child;
            }
            None => return len,
        }
    }
}

fn on_large_stack(f: impl FnOnce() + Send + 'static) {
    std::thread::Builder::new()
        .stack_size(256 * 1024 * 1024)
        .spawn(f)
        .unwrap()
        .join()
        .unwrap();
}

/// Chains up to the default depth limit survive both directions; one more
/// model is rejected.
fn deep_chains_round_trip<B: Backend>(backend: B) {
    let mut serializer = Serializer::new(backend, SerializationServices::new());

    for len in [DEFAULT_MAX_DEPTH - 1, DEFAULT_MAX_DEPTH] {
        let mut out = Vec::new();
        let report = serializer.serialize(&chain(len), &mut out).unwrap();
        assert!(report.is_complete(), "{:?}", report.failures);

        let back = serializer.deserialize::<Node>(out.as_slice()).unwrap();
        assert!(back.is_complete(), "{:?}", back.failures);
        assert_eq!(chain_len(&back.value), len);
        assert_eq!(back.value.read().name, alloc::format!("{}", len - 1));
    }

    let err = serializer
        .serialize(&chain(DEFAULT_MAX_DEPTH + 1), Vec::new())
        .unwrap_err();
    assert!(matches!(err, SerializeError::DepthExceeded { max, .. } if max == DEFAULT_MAX_DEPTH));
}

#[test]
fn deep_chains_round_trip_through_json() {
    on_large_stack(|| deep_chains_round_trip(JsonBackend::new()));
}

#[test]
fn deep_chains_round_trip_through_binary() {
    on_large_stack(|| deep_chains_round_trip(BinaryBackend::new()));
}

#[test]
fn root_of_another_type_is_rejected() {
    let json = json!({ "$type": "nowhere::Ghost", "$id": 1 });

    let mut serializer = json_serializer();
    let err = serializer.deserialize_any(bytes(json.clone()).as_slice()).unwrap_err();
    assert!(matches!(err, SerializeError::UnknownRootType(path) if path == "nowhere::Ghost"));

    let err = serializer.deserialize::<Person>(bytes(json).as_slice()).unwrap_err();
    assert!(matches!(err, SerializeError::UnknownRootType(_)));
}

// -----------------------------------------------------------------------------
// Modifiers

struct Shout;

impl SerializerModifier for Shout {
    fn serialize_member(
        &self,
        _ctx: &SerializationContext<'_>,
        member: &mut MemberValue,
    ) -> Result<(), ModifierError> {
        if member.name == "name"
            && let Value::String(text) = &mut member.value
        {
            *text = text.to_uppercase();
        }
        Ok(())
    }

    fn deserialize_member(
        &self,
        _ctx: &SerializationContext<'_>,
        member: &mut MemberValue,
    ) -> Result<(), ModifierError> {
        if member.name == "name"
            && let Value::String(text) = &mut member.value
        {
            text.push('!');
        }
        Ok(())
    }
}

#[test]
fn modifiers_rewrite_values_in_both_directions() {
    let mut serializer = json_serializer();
    serializer
        .services()
        .register_modifier::<Person>(Arc::new(Shout));

    let person = Shared::new(Person {
        name: "alice".into(),
        age: 30,
        secret: String::new(),
    });
    let json = write_json(&mut serializer, &person);
    assert_eq!(json["name"], "ALICE");

    let back = serializer.deserialize::<Person>(bytes(json).as_slice()).unwrap();
    assert_eq!(back.value.read().name, "ALICE!");
}

struct SkipAge;

impl SerializerModifier for SkipAge {
    fn should_ignore_member(
        &self,
        _ctx: &SerializationContext<'_>,
        _model: &dyn Model,
        member: &MemberValue,
    ) -> bool {
        member.name == "age"
    }
}

#[test]
fn ignored_and_excluded_members_are_not_written() {
    let mut serializer = json_serializer();
    serializer
        .services()
        .register_modifier::<Person>(Arc::new(SkipAge));

    let person = Shared::new(Person {
        name: "bob".into(),
        age: 50,
        secret: "hunter2".into(),
    });
    let json = write_json(&mut serializer, &person);
    assert_eq!(json["name"], "bob");
    assert!(json.get("age").is_none());
    assert!(json.get("secret").is_none());
}

struct Collection(Option<bool>);

impl SerializerModifier for Collection {
    fn should_serialize_as_collection(
        &self,
        _ctx: &SerializationContext<'_>,
        _member: Option<&MemberValue>,
    ) -> Option<bool> {
        self.0
    }
}

#[test]
fn derived_modifier_overrides_base_collection_choice() {
    let library = Shared::new(Library {
        shelf: Shelf {
            books: vec!["Dune".into(), "Emma".into()],
            label: "fiction".into(),
        },
        city: "Oslo".into(),
    });

    let mut serializer = json_serializer();
    serializer
        .services()
        .register_modifier::<Shelf>(Arc::new(Collection(Some(true))));

    let json = write_json(&mut serializer, &library);
    assert_eq!(json["books"], json!(["Dune", "Emma"]));
    assert!(json.get("label").is_none());
    assert!(json.get("city").is_none());

    let back = serializer.deserialize::<Library>(bytes(json).as_slice()).unwrap();
    assert_eq!(back.value.read().shelf.books, ["Dune", "Emma"]);

    serializer
        .services()
        .register_modifier::<Library>(Arc::new(Collection(Some(false))));
    let json = write_json(&mut serializer, &library);
    assert_eq!(json["label"], "fiction");
    assert_eq!(json["city"], "Oslo");
}

struct Counting {
    serializing: AtomicUsize,
    deserialized: AtomicUsize,
}

impl SerializerModifier for Counting {
    fn on_serializing(
        &self,
        _ctx: &SerializationContext<'_>,
        _model: &dyn Model,
    ) -> Result<(), ModifierError> {
        self.serializing.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn on_deserialized(
        &self,
        _ctx: &SerializationContext<'_>,
        _model: &mut dyn Model,
    ) -> Result<(), ModifierError> {
        self.deserialized.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[test]
fn base_members_and_base_modifiers_apply_to_derived_types() {
    let counting = Arc::new(Counting {
        serializing: AtomicUsize::new(0),
        deserialized: AtomicUsize::new(0),
    });
    let mut serializer = json_serializer();
    serializer
        .services()
        .register_modifier::<Entity>(counting.clone());

    let article = Shared::new(Article {
        entity: Entity { id: 9 },
        title: "news".into(),
    });
    let json = write_json(&mut serializer, &article);
    assert_eq!(json["id"], 9);
    assert_eq!(json["title"], "news");
    assert_eq!(counting.serializing.load(Ordering::Relaxed), 1);

    let back = serializer.deserialize::<Article>(bytes(json).as_slice()).unwrap();
    assert_eq!(back.value.read().entity.id, 9);
    assert_eq!(counting.deserialized.load(Ordering::Relaxed), 1);
}

struct Failing;

impl SerializerModifier for Failing {
    fn on_serializing(
        &self,
        _ctx: &SerializationContext<'_>,
        _model: &dyn Model,
    ) -> Result<(), ModifierError> {
        Err("refused".into())
    }
}

#[test]
fn modifier_errors_abort_the_operation() {
    let mut serializer = json_serializer();
    serializer
        .services()
        .register_modifier::<Person>(Arc::new(Failing));

    let err = serializer
        .serialize(&Shared::new(Person::default()), Vec::new())
        .unwrap_err();
    assert!(matches!(err, SerializeError::Modifier(_)));
    assert_eq!(err.to_string(), "refused");
}

// -----------------------------------------------------------------------------
// Representation

#[test]
fn enums_follow_member_hint_then_configuration() {
    let task = Shared::new(Task {
        priority: Priority::High,
        level: Priority::High,
    });

    let mut serializer = json_serializer();
    let json = write_json(&mut serializer, &task);
    assert_eq!(json["priority"], 1);
    assert_eq!(json["level"], "High");

    let back = serializer.deserialize::<Task>(bytes(json).as_slice()).unwrap();
    assert_eq!(back.value.read().priority, Priority::High);
    assert_eq!(back.value.read().level, Priority::High);

    serializer.configuration_mut().enum_as_string = true;
    let json = write_json(&mut serializer, &task);
    assert_eq!(json["priority"], "High");
}

#[test]
fn unknown_enum_name_is_a_member_failure() {
    let json = json!({
        "$type": Task::type_info().type_path(),
        "priority": 0,
        "level": "Urgent",
    });

    let mut serializer = json_serializer();
    let back = serializer.deserialize::<Task>(bytes(json).as_slice()).unwrap();
    assert_eq!(back.failures.len(), 1);
    assert_eq!(back.failures[0].member, "level");
    assert!(matches!(
        &back.failures[0].reason,
        DecodeError::Value(ValueError::UnknownVariant { name, .. }) if name == "Urgent"
    ));
}

#[test]
fn parsed_scalars_use_the_configured_culture() {
    let config = SerializationConfiguration::default().with_culture(Culture::new("de", ','));
    let mut serializer =
        Serializer::with_configuration(JsonBackend::new(), SerializationServices::new(), config);

    let measure = Shared::new(Measure {
        ratio: 1.5,
        count: 3,
    });
    let json = write_json(&mut serializer, &measure);
    assert_eq!(json["ratio"], "1,5");
    assert_eq!(json["count"], 3);

    let back = serializer.deserialize::<Measure>(bytes(json).as_slice()).unwrap();
    assert!(back.is_complete());
    assert_eq!(back.value.read().ratio, 1.5);
}

#[test]
fn dynamic_properties_live_in_the_bag() {
    let mut memo = Memo {
        body: "text".into(),
        ..Default::default()
    };
    memo.bag.set("Notes", String::from("draft"));
    let memo = Shared::new(memo);

    let mut serializer = json_serializer();
    let json = write_json(&mut serializer, &memo);
    assert_eq!(json["Notes"], "draft");

    let back = serializer.deserialize::<Memo>(bytes(json).as_slice()).unwrap();
    let memo = back.value.read();
    assert_eq!(memo.bag.get_as::<String>("Notes").as_deref(), Some("draft"));
    assert_eq!(memo.body, "text");
}

#[test]
fn custom_models_write_a_single_value() {
    let plot = Shared::new(Plot {
        origin: Shared::new(Point { x: 3, y: -4 }),
    });

    let mut serializer = json_serializer();
    let json = write_json(&mut serializer, &plot);
    assert_eq!(json["origin"]["Value"], "3;-4");
    assert_eq!(json["origin"]["$type"], Point::type_info().type_path());

    let back = serializer.deserialize::<Plot>(bytes(json).as_slice()).unwrap();
    let origin = back.value.read().origin.clone();
    assert_eq!((origin.read().x, origin.read().y), (3, -4));
}

#[test]
fn callbacks_run_around_each_operation() {
    let tracked = Shared::new(Tracked {
        value: 11,
        ..Default::default()
    });

    let mut serializer = json_serializer();
    let out = write(&mut serializer, &tracked);
    assert_eq!(tracked.read().started.load(Ordering::Relaxed), 1);
    assert_eq!(tracked.read().finished.load(Ordering::Relaxed), 1);

    let back = serializer.deserialize::<Tracked>(out.as_slice()).unwrap();
    assert_eq!(back.value.read().value, 11);
    assert!(back.value.read().restored);
}

// -----------------------------------------------------------------------------
// Roots and polymorphism

#[test]
fn collections_round_trip_as_root_values() {
    let mut serializer = json_serializer();

    let mut out = Vec::new();
    serializer.serialize_value(&vec![1i64, 2, 3], &mut out).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(json, json!({ "Items": [1, 2, 3] }));
    let back = serializer.deserialize_value::<Vec<i64>>(out.as_slice()).unwrap();
    assert_eq!(back.value, [1, 2, 3]);

    let mut scores = BTreeMap::new();
    scores.insert(String::from("ada"), 3u32);
    scores.insert(String::from("bob"), 5u32);
    let mut out = Vec::new();
    serializer.serialize_value(&scores, &mut out).unwrap();
    let back = serializer
        .deserialize_value::<BTreeMap<String, u32>>(out.as_slice())
        .unwrap();
    assert_eq!(back.value, scores);

    let mut out = Vec::new();
    serializer.serialize_value(&7u32, &mut out).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(json, json!({ "Value": 7 }));
}

#[test]
fn polymorphic_members_resolve_through_the_registry() {
    let holder = Shared::new(Holder {
        content: Some(SharedAny::new(Circle { radius: 2.0 })),
    });

    let mut serializer = json_serializer();
    serializer.services().register_model::<Circle>();
    let out = write(&mut serializer, &holder);

    let back = serializer.deserialize::<Holder>(out.as_slice()).unwrap();
    assert!(back.is_complete());
    let content = back.value.read().content.clone().unwrap();
    let circle = content.downcast::<Circle>().unwrap();
    assert_eq!(circle.read().radius, 2.0);

    let mut unregistered = json_serializer();
    let back = unregistered.deserialize::<Holder>(out.as_slice()).unwrap();
    assert_eq!(back.failures.len(), 1);
    assert_eq!(back.failures[0].member, "content");
    assert!(matches!(back.failures[0].reason, DecodeError::UnknownType(_)));
    assert!(back.value.read().content.is_none());
}

#[test]
fn untyped_root_resolves_through_the_registry() {
    let mut serializer = json_serializer();
    serializer.services().register_model::<Circle>();

    let out = write(&mut serializer, &Shared::new(Circle { radius: 0.5 }));
    let back = serializer.deserialize_any(out.as_slice()).unwrap();
    assert!(back.value.is::<Circle>());
    assert_eq!(back.value.downcast::<Circle>().unwrap().read().radius, 0.5);
}
