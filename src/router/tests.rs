use super::{PathArgs, RouteError, Router};

#[test]
fn test_first_match_wins() {
    let mut router = Router::new();
    router.add_route(r"/items/special$", "special").unwrap();
    router.add_route(r"/items/([^/]+)$", "item").unwrap();
    router.add_route(r"/items/special$", "special").unwrap();

    assert_eq!(router.route("/items/special").unwrap().handler_name.as_ref(), "special");
    assert_eq!(router.route("/items/42").unwrap().handler_name.as_ref(), "item");
    assert_eq!(router.len(), 2);
}

#[test]
fn test_registration_order_beats_specificity() {
    let mut router = Router::new();
    router.add_route(r"/items", "prefix").unwrap();
    router.add_route(r"/items/(\d+)$", "item").unwrap();

    // Patterns are anchored at the start only, so the broad prefix shadows the
    // more specific route registered after it.
    assert_eq!(router.route("/items/42").unwrap().handler_name.as_ref(), "prefix");
}

#[test]
fn test_anchored_at_start() {
    let mut router = Router::new();
    router.add_route(r"/echo", "echo").unwrap();
    assert!(router.route("/echo").is_some());
    assert!(router.route("/echoes").is_some());
    assert!(router.route("/api/echo").is_none());
}

#[test]
fn test_named_groups() {
    let mut router = Router::new();
    router
        .add_route(r"/hotels/(?P<hotel_id>.*)/info", "hotel")
        .unwrap();
    let m = router.route("/hotels/1234/info").unwrap();
    assert_eq!(m.path_args.get("hotel_id"), Some("1234"));
    assert_eq!(m.path_args.to_map().len(), 1);
    assert_eq!(
        serde_json::to_value(&m.path_args).unwrap(),
        serde_json::json!({"hotel_id": "1234"})
    );
}

#[test]
fn test_positional_groups() {
    let mut router = Router::new();
    router.add_route(r"/restaurants/(.*)/info", "restaurant").unwrap();
    let m = router.route("/restaurants/5678/info").unwrap();
    assert_eq!(m.path_args.nth(0), Some("5678"));
    assert_eq!(m.path_args.get("0"), None);
    assert_eq!(
        serde_json::to_value(&m.path_args).unwrap(),
        serde_json::json!(["5678"])
    );
}

#[test]
fn test_optional_groups() {
    let mut router = Router::new();
    router.add_route(r"/a(/(\d+))?$", "a").unwrap();
    let m = router.route("/a").unwrap();
    match m.path_args {
        PathArgs::Positional(values) => {
            assert_eq!(values.len(), 2);
            assert!(values.iter().all(Option::is_none));
        }
        other => panic!("unexpected args: {other:?}"),
    }

    let mut router = Router::new();
    router.add_route(r"/b(/(?P<id>\d+))?$", "b").unwrap();
    let m = router.route("/b").unwrap();
    assert_eq!(m.path_args, PathArgs::Named(Default::default()));
}

#[test]
fn test_no_groups() {
    let mut router = Router::new();
    router.add_route(r"/health$", "health").unwrap();
    let m = router.route("/health").unwrap();
    assert_eq!(m.path_args, PathArgs::Empty);
    assert!(m.path_args.is_empty());
}

#[test]
fn test_no_match() {
    let mut router = Router::new();
    router.add_route(r"/known$", "known").unwrap();
    assert!(router.route("/some/nonexistent/path").is_none());
    assert!(Router::new().route("/").is_none());
}

#[test]
fn test_invalid_pattern() {
    let mut router = Router::new();
    let err = router.add_route(r"/broken/(", "broken").unwrap_err();
    assert!(matches!(err, RouteError::InvalidPattern { .. }));
    assert!(router.is_empty());
}

#[test]
fn test_replacing_route_keeps_position() {
    let mut router = Router::new();
    router.add_route(r"/x", "first").unwrap();
    router.add_route(r"/y", "second").unwrap();
    router.add_route(r"/x", "replaced").unwrap();
    assert_eq!(
        router.routes(),
        vec![
            ("/x".to_string(), "replaced".to_string()),
            ("/y".to_string(), "second".to_string())
        ]
    );
}

#[test]
fn test_alternation_is_anchored() {
    let mut router = Router::new();
    router.add_route(r"/a|/b", "ab").unwrap();
    assert!(router.route("/b").is_some());
    assert!(router.route("/x/b").is_none());
}
