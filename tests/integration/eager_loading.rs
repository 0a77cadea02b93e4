#![allow(missing_docs)]

use std::sync::Once;

use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;
use unitable::runtime::{CallStats, Item, MemoryError, MemoryExecutor};
use unitable::{
    compile, Config, DeclarationSource, EagerLoader, EagerSpec, EntityDeclaration, Registry,
    RelationshipCache,
};

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("unitable::runtime=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

fn row(value: Value) -> Item {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn blog() -> Registry {
    compile(
        &DeclarationSource::Inline(vec![
            EntityDeclaration::new("User").has_many("Post").belongs_to_many("Role"),
            EntityDeclaration::new("Post").belongs_to("User").has_many("Comment"),
            EntityDeclaration::new("Comment").belongs_to("Post"),
            EntityDeclaration::new("Role"),
            EntityDeclaration::new("RoleUser"),
        ]),
        &Config::default(),
    )
}

fn seeded(registry: &Registry) -> MemoryExecutor {
    let store = MemoryExecutor::default();
    let table = registry.layout.table_name.as_str();
    for id in ["u1", "u2"] {
        store.put(table, row(json!({"pk": format!("USER#{id}"), "sk": format!("USER#{id}"), "id": id})));
    }
    for (id, user) in [("p1", "u1"), ("p2", "u1"), ("p3", "u2")] {
        let post = json!({"id": id, "userId": user, "title": format!("post {id}")});
        let mut child = row(post.clone());
        child.insert("pk".into(), json!(format!("USER#{user}")));
        child.insert("sk".into(), json!(format!("POST#{id}")));
        store.put(table, child);
        let mut entity = row(post);
        entity.insert("pk".into(), json!(format!("POST#{id}")));
        entity.insert("sk".into(), json!(format!("POST#{id}")));
        store.put(table, entity);
    }
    for (id, post) in [("c1", "p1"), ("c2", "p1"), ("c3", "p3")] {
        store.put(
            table,
            row(json!({"pk": format!("POST#{post}"), "sk": format!("COMMENT#{id}"), "id": id, "postId": post})),
        );
    }

    store.put(table, row(json!({"pk": "ROLE#admin", "sk": "ROLE#admin", "id": "admin"})));
    let roles = registry
        .model("User")
        .and_then(|m| m.relationship("roles"))
        .and_then(|r| r.index)
        .and_then(|n| registry.index(n))
        .expect("roles index");
    let mut pivot = row(json!({"pk": "USER#u1", "sk": "ROLE#admin"}));
    pivot.insert(roles.partition_key.clone(), json!("USER#u1"));
    pivot.insert(roles.sort_key.clone(), json!("ROLE#admin"));
    store.put(table, pivot);
    store.reset_stats();
    store
}

fn posts(ids: &[&str], user: &str) -> Vec<Item> {
    ids.iter()
        .map(|id| row(json!({"id": id, "userId": user})))
        .collect()
}

#[tokio::test]
async fn siblings_share_one_batch_get_for_owners() {
    init_tracing();
    let registry = blog();
    let store = seeded(&registry);
    let loader = EagerLoader::new(&registry, &store);
    let mut cache = RelationshipCache::new();

    let mut instances = posts(&["p1", "p2"], "u1");
    instances.extend(posts(&["p3"], "u2"));
    let post = registry.model("Post").expect("post");
    let loaded = loader
        .load_many(post, &instances, &EagerSpec::parse(["user"]), &mut cache)
        .await
        .expect("load");

    assert_eq!(
        store.stats(),
        CallStats {
            point_get: 0,
            range_query: 0,
            batch_get: 1
        }
    );
    let owners: Vec<&Value> = loaded.iter().map(|p| &p["user"]["id"]).collect();
    assert_eq!(owners, [&json!("u1"), &json!("u1"), &json!("u2")]);
    assert_eq!(cache.hits(), 3);
}

#[tokio::test]
async fn absent_foreign_key_makes_no_calls() {
    init_tracing();
    let registry = blog();
    let store = seeded(&registry);
    let loader = EagerLoader::new(&registry, &store);
    let mut cache = RelationshipCache::new();

    let post = registry.model("Post").expect("post");
    let orphans = vec![row(json!({"id": "p8"})), row(json!({"id": "p9", "userId": null}))];
    let loaded = loader
        .load_many(post, &orphans, &[EagerSpec::new("user")], &mut cache)
        .await
        .expect("load");
    assert!(loaded.iter().all(|p| p["user"].is_null()));
    assert_eq!(store.stats().total(), 0);
}

#[tokio::test]
async fn dangling_owners_are_not_refetched_one_by_one() {
    init_tracing();
    let registry = blog();
    let store = seeded(&registry);
    let loader = EagerLoader::new(&registry, &store);
    let mut cache = RelationshipCache::new();

    let mut instances = posts(&["p4", "p5", "p6"], "ghost");
    instances.extend(posts(&["p1"], "u1"));
    let post = registry.model("Post").expect("post");
    let loaded = loader
        .load_many(post, &instances, &[EagerSpec::new("user")], &mut cache)
        .await
        .expect("load");

    assert_eq!(
        store.stats(),
        CallStats {
            point_get: 0,
            range_query: 0,
            batch_get: 1
        }
    );
    assert!(loaded[..3].iter().all(|p| p["user"].is_null()));
    assert_eq!(loaded[3]["user"]["id"], json!("u1"));
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn has_many_prefetch_runs_one_query_per_parent() {
    init_tracing();
    let registry = blog();
    let store = seeded(&registry);
    let loader = EagerLoader::new(&registry, &store);
    let mut cache = RelationshipCache::new();

    let user = registry.model("User").expect("user");
    let users = vec![row(json!({"id": "u1"})), row(json!({"id": "u2"}))];
    let loaded = loader
        .load_many(user, &users, &EagerSpec::parse(["posts"]), &mut cache)
        .await
        .expect("load");

    assert_eq!(store.stats().range_query, 2);
    assert_eq!(store.stats().total(), 2);
    assert_eq!(loaded[0]["posts"].as_array().map(Vec::len), Some(2));
    assert_eq!(loaded[1]["posts"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn nested_paths_load_level_by_level() {
    init_tracing();
    let registry = blog();
    let store = seeded(&registry);
    let loader = EagerLoader::new(&registry, &store);
    let mut cache = RelationshipCache::new();

    let user = registry.model("User").expect("user");
    let users = vec![row(json!({"id": "u1"})), row(json!({"id": "u2"}))];
    let loaded = loader
        .load_many(user, &users, &EagerSpec::parse(["posts.comments"]), &mut cache)
        .await
        .expect("load");

    let first_posts = loaded[0]["posts"].as_array().expect("posts array");
    assert_eq!(first_posts[0]["id"], "p1");
    assert_eq!(first_posts[0]["comments"].as_array().map(Vec::len), Some(2));
    assert_eq!(first_posts[1]["comments"].as_array().map(Vec::len), Some(0));
    let second_posts = loaded[1]["posts"].as_array().expect("posts array");
    assert_eq!(second_posts[0]["comments"][0]["id"], "c3");
    assert_eq!(store.stats().range_query, 5);
}

#[tokio::test]
async fn many_to_many_loads_through_pivot_rows() {
    init_tracing();
    let registry = blog();
    let store = seeded(&registry);
    let loader = EagerLoader::new(&registry, &store);
    let mut cache = RelationshipCache::new();

    let user = registry.model("User").expect("user");
    let loaded = loader
        .load(user, &row(json!({"id": "u1"})), &[EagerSpec::new("roles")], &mut cache)
        .await
        .expect("load");
    assert_eq!(loaded["roles"], json!([{"pk": "ROLE#admin", "sk": "ROLE#admin", "id": "admin"}]));
    assert_eq!(store.stats().range_query, 1);
    assert_eq!(store.stats().batch_get, 1);
}

#[tokio::test]
async fn cache_is_reused_across_calls() {
    init_tracing();
    let registry = blog();
    let store = seeded(&registry);
    let loader = EagerLoader::new(&registry, &store);
    let mut cache = RelationshipCache::new();

    let post = registry.model("Post").expect("post");
    let instance = row(json!({"id": "p1", "userId": "u1"}));
    let specs = [EagerSpec::new("user")];
    loader.load(post, &instance, &specs, &mut cache).await.expect("first load");
    let again = loader.load(post, &instance, &specs, &mut cache).await.expect("second load");
    assert_eq!(again["user"]["id"], "u1");
    assert_eq!(store.stats().point_get, 1);
    assert_eq!(cache.hits(), 1);
}

#[tokio::test]
async fn unknown_relationship_merges_null() {
    init_tracing();
    let registry = blog();
    let store = seeded(&registry);
    let loader = EagerLoader::new(&registry, &store);
    let mut cache = RelationshipCache::new();

    let user = registry.model("User").expect("user");
    let loaded = loader
        .load(user, &row(json!({"id": "u1"})), &[EagerSpec::new("followers")], &mut cache)
        .await
        .expect("load");
    assert!(loaded["followers"].is_null());
    assert_eq!(store.stats().total(), 0);
}

#[tokio::test]
async fn executor_errors_propagate() {
    init_tracing();
    let registry = blog();
    let store = seeded(&registry);
    let loader = EagerLoader::new(&registry, &store);
    let mut cache = RelationshipCache::new();

    store.fail_next("throttled");
    let post = registry.model("Post").expect("post");
    let err = loader
        .load_many(post, &posts(&["p1", "p2"], "u1"), &[EagerSpec::new("user")], &mut cache)
        .await
        .expect_err("batch get fails");
    assert_eq!(err, MemoryError::Injected("throttled".into()));
    assert!(cache.is_empty());
}
