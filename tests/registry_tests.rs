//! Type Registry Tests
//!
//! Registers shapes read straight out of encoded announcements.

use rstest::rstest;

use wire_schemas::wire::DEFAULT_MAX_DEPTH;
use wire_schemas::{
    Announcement, BuildConfig, CodecError, CommandScheme, CommandSchemeDecl, Decl, Encode, Field,
    ObjectAnnouncement, RegistryError, SchemeDecl, Shape, TypeId, TypeRegistry, View, WireConfig,
    WireView,
};

/// A struct chain `depth` shapes deep, ending in `Bool`
fn nested_struct(depth: usize) -> Shape {
    let mut shape = Shape::Bool;
    for _ in 1..depth {
        shape = Shape::Struct(vec![Field::new("inner", shape)]);
    }
    shape
}

fn chat() -> CommandScheme {
    let users = SchemeDecl::new("users")
        .object("User", [Decl::String, Decl::structure([("name", Decl::String)])])
        .build();
    let decl = CommandSchemeDecl::new("chat")
        .command(
            "Send",
            Decl::structure([("to", Decl::reference(&users, "User")), ("text", Decl::String)]),
        )
        .command("Ping", Decl::Void);
    CommandScheme::try_from(&decl).unwrap()
}

#[test]
fn test_view_and_owned_shape_share_an_id() {
    let scheme = chat();
    let bytes = scheme.to_wire();
    let root = WireView::new(&bytes).unwrap();
    let send = root.field("commands").unwrap().elem(0).unwrap().field("shape").unwrap();

    let mut registry = TypeRegistry::new();
    let from_view = registry.update("chat", "Send", &send).unwrap();
    let from_shape = registry
        .update_shape("chat", "Send", &scheme.command("Send").unwrap().shape)
        .unwrap();

    assert_eq!(from_view, TypeId::new(0, 0, 0));
    assert_eq!(from_view, from_shape);
    assert_eq!(registry.version_count(0, 0), Some(1));
    assert_eq!(registry.get(from_view).unwrap(), &scheme.commands[0].shape);
}

#[test]
fn test_register_announcement_is_idempotent() {
    let announcement = Announcement::from(chat());
    let mut registry = TypeRegistry::new();

    let first = registry.register_announcement(&announcement).unwrap();
    let second = registry.register_announcement(&announcement).unwrap();
    assert_eq!(first, second);

    // users.User has two versions, then chat.Send and chat.Ping
    assert_eq!(
        first,
        vec![
            TypeId::new(0, 0, 0),
            TypeId::new(0, 0, 1),
            TypeId::new(1, 0, 0),
            TypeId::new(1, 1, 0),
        ]
    );
    assert_eq!(registry.names(TypeId::new(1, 1, 0)), Some(("chat", "Ping")));
    assert_eq!(registry.get(TypeId::new(1, 1, 0)).unwrap(), &Shape::Void);
}

#[test]
fn test_versions_follow_submission_order() {
    let mut registry = TypeRegistry::new();
    let shapes = [
        Shape::Bool,
        Shape::Struct(vec![Field::new("a", Shape::Bool)]),
        Shape::Struct(vec![Field::new("b", Shape::Bool)]),
        Shape::Struct(vec![Field::new("a", Shape::Bool)]),
        Shape::List(Box::new(Shape::Int { signed: true, bits: 32 })),
    ];
    let versions: Vec<usize> = shapes
        .iter()
        .map(|shape| registry.update_shape("s", "Obj", shape).unwrap().version)
        .collect();

    assert_eq!(versions, vec![0, 1, 2, 1, 3]);
    for (version, shape) in [(0, &shapes[0]), (1, &shapes[1]), (2, &shapes[2]), (3, &shapes[4])] {
        assert_eq!(registry.get(TypeId::new(0, 0, version)).unwrap(), shape);
    }
}

#[test]
fn test_object_announcement_populates_dependencies() {
    let dep = SchemeDecl::new("dep").object("Obj", [Decl::Bool]).build();
    let root = SchemeDecl::new("root")
        .object("Holder", [Decl::optional(Decl::reference(&dep, "Obj"))])
        .build();
    let announcement =
        Announcement::from(ObjectAnnouncement::build(&root, &BuildConfig::default()).unwrap());

    let mut registry = TypeRegistry::new();
    registry.register_announcement(&announcement).unwrap();
    assert_eq!(registry.lookup("root", "Holder"), Some((0, 0)));
    assert_eq!(registry.lookup("dep", "Obj"), Some((1, 0)));
    assert_eq!(registry.object_count(1), Some(1));
}

#[test]
fn test_depth_limit_counts_shape_levels() {
    let mut registry = TypeRegistry::new();
    let deepest = nested_struct(DEFAULT_MAX_DEPTH);
    let id = registry.update_shape("s", "Deep", &deepest).unwrap();
    assert_eq!(registry.update_shape("s", "Deep", &deepest).unwrap(), id);
    assert_eq!(registry.get(id).unwrap(), &deepest);

    assert_eq!(
        registry
            .update_shape("s", "Deep", &nested_struct(DEFAULT_MAX_DEPTH + 1))
            .unwrap_err(),
        RegistryError::Codec(CodecError::DepthExceeded(DEFAULT_MAX_DEPTH))
    );
    assert_eq!(registry.version_count(0, 0), Some(1));
}

#[rstest]
#[case(TypeId::new(2, 0, 0), RegistryError::SchemeNotDefined(2))]
#[case(TypeId::new(0, 1, 0), RegistryError::ObjectNotDefined { scheme: 0, name: 1 })]
#[case(TypeId::new(0, 0, 1), RegistryError::VersionNotDefined { scheme: 0, name: 0, version: 1 })]
fn test_get_unknown_id(#[case] id: TypeId, #[case] expected: RegistryError) {
    let mut registry = TypeRegistry::new();
    registry.update_shape("s", "Obj", &Shape::String).unwrap();
    assert_eq!(registry.get(id).unwrap_err(), expected);
}

#[test]
fn test_limits_reject_before_registration() {
    let mut registry = TypeRegistry::with_limits(WireConfig {
        max_depth: 64,
        max_payload: 8,
    });
    let shape = Shape::Enum(vec!["red".to_string(), "green".to_string(), "blue".to_string()]);
    assert!(matches!(
        registry.update_shape("s", "Color", &shape),
        Err(RegistryError::Codec(CodecError::PayloadTooLarge { max: 8, .. }))
    ));
    assert_eq!(registry.scheme_count(), 0);

    let mut registry = TypeRegistry::new();
    let garbage = [0xffu8, 0, 0];
    assert!(matches!(
        registry.update_bytes("s", "Obj", &garbage),
        Err(RegistryError::Codec(CodecError::UnknownKind(0xff)))
    ));
    assert_eq!(registry.scheme_count(), 0);
}
