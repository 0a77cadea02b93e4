#![allow(missing_docs)]

use std::fs;

use tempfile::tempdir;
use unitable::schema::WarningKind;
use unitable::{compile, compile_configured, Config, DeclarationSource};

#[test]
fn compiles_a_declaration_directory() {
    let dir = tempdir().expect("tempdir");
    fs::write(
        dir.path().join("user.json"),
        r#"{
            "name": "User",
            "attributes": [
                { "name": "email", "unique": true, "validation": "required|email" },
                { "name": "age", "cast": "integer" }
            ],
            "relationships": { "hasMany": ["Post"] },
            "traits": { "timestamps": true }
        }"#,
    )
    .expect("write user");
    fs::write(
        dir.path().join("post.toml"),
        r#"
        name = "Post"

        [[relationships.belongsTo]]
        model = "User"
        name = "author"
        foreignKey = "authorId"
        "#,
    )
    .expect("write post");

    let config = Config {
        discovery_path: Some(dir.path().to_path_buf()),
        ..Config::default()
    };
    let registry = compile_configured(&config);
    assert!(registry.warnings.is_empty(), "{:?}", registry.warnings);
    assert_eq!(registry.models.len(), 2);

    let user = registry.model("User").expect("user");
    assert!(user.attribute("createdAt").is_some());
    assert_eq!(user.attribute("age").map(|a| a.storage_type.code()), Some("N"));
    assert!(user.attribute("email").and_then(|a| a.index).is_some());

    let post = registry.model("Post").expect("post");
    let author = post.relationship("author").expect("author relationship");
    assert_eq!(author.foreign_key, "authorId");
    assert_eq!(author.local_key, "id");
    assert!(author.index.is_some());
}

#[test]
fn bad_files_become_warnings() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("ok.json"), r#"{ "name": "User" }"#).expect("write ok");
    fs::write(dir.path().join("typo.json"), r#"{ "name": "Post", "relations": {} }"#)
        .expect("write typo");

    let registry = compile(
        &DeclarationSource::Directory(dir.path().to_path_buf()),
        &Config::default(),
    );
    assert_eq!(registry.models.len(), 1);
    assert_eq!(registry.warnings.len(), 1);
    assert_eq!(registry.warnings[0].kind, WarningKind::InvalidDeclaration);
}

#[test]
fn unreadable_directory_yields_empty_registry() {
    let dir = tempdir().expect("tempdir");
    let registry = compile(
        &DeclarationSource::Directory(dir.path().join("missing")),
        &Config::default(),
    );
    assert!(registry.is_empty());
    assert_eq!(registry.warnings.len(), 1);
    assert_eq!(registry.warnings[0].kind, WarningKind::DiscoveryFailed);
    assert!(registry.validate().success);
}

#[test]
fn configuration_loads_from_toml_file() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("unitable.toml");
    fs::write(
        &path,
        r#"
        keyDelimiter = "|"
        maxIndexCount = 2
        consolidation = "first_pattern"
        "#,
    )
    .expect("write config");
    let config = Config::load(&path).expect("config loads");
    assert_eq!(config.key_delimiter, "|");
    assert_eq!(config.max_index_count, 2);
    assert_eq!(config, Config { key_delimiter: "|".into(), max_index_count: 2, ..Config::legacy() });
}
