//! Selection, lookup and catalog behavior through the engine.

mod common;

use std::sync::Arc;

use asupersync::Cx;
use common::{T0, blog_db, blog_engine, block_on, post_row, unwrap_outcome, user_row};
use sqlrecord::prelude::*;

fn titles(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.get("title").and_then(Value::as_str).map(str::to_string))
        .collect()
}

fn seed_posts(db: &common::MemoryDb) {
    for (title, views) in [("hello", 3), ("help", 10), ("world", 7)] {
        db.seed("post", post_row(1, title).with("views", views));
    }
    db.seed("post", post_row(1, "hidden").with("views", 99).with("deleted_at", T0));
}

#[test]
fn select_filters_soft_deleted_by_default() {
    let db = blog_db();
    let engine = blog_engine(&db);
    seed_posts(&db);

    block_on(async {
        let cx = Cx::for_testing();
        let all = unwrap_outcome(engine.all(&cx, "Post").await).unwrap();
        assert_eq!(titles(&all), vec!["hello", "help", "world"]);
    });
}

#[test]
fn explicit_marker_condition_reaches_soft_deleted() {
    let db = blog_db();
    let engine = blog_engine(&db);
    seed_posts(&db);

    block_on(async {
        let cx = Cx::for_testing();
        let filter = Conditions::new().compare("deleted_at", Operator::Gt, 0);
        let deleted = unwrap_outcome(engine.select(&cx, "Post", &filter, None).await).unwrap();
        assert_eq!(titles(&deleted), vec!["hidden"]);
    });
}

#[test]
fn select_with_operators_and_ordering() {
    let db = blog_db();
    let engine = blog_engine(&db);
    seed_posts(&db);

    block_on(async {
        let cx = Cx::for_testing();
        let filter = Conditions::new()
            .compare_str("views", ">=", 5)
            .unwrap()
            .compare("title", Operator::NotLike, "%ld");
        let order = OrderBy::desc("views");
        let rows = unwrap_outcome(engine.select(&cx, "Post", &filter, Some(&order)).await).unwrap();
        assert_eq!(titles(&rows), vec!["help"]);

        let filter = Conditions::new().compare("title", Operator::Like, "hel%");
        let order = OrderBy::desc("views").then("title", Direction::Asc);
        let rows = unwrap_outcome(engine.select(&cx, "Post", &filter, Some(&order)).await).unwrap();
        assert_eq!(titles(&rows), vec!["help", "hello"]);
    });

    assert!(db.statements().contains(
        &"SELECT * FROM post WHERE deleted_at = ? AND title LIKE ? ORDER BY views DESC, title ASC"
            .to_string()
    ));
}

#[test]
fn invalid_operator_text_is_rejected() {
    let err = Conditions::new().compare_str("views", "=>", 5).unwrap_err();
    assert_eq!(err, Error::InvalidOperator("=>".into()));
}

#[test]
fn unknown_filter_and_sort_fields_are_dropped() {
    let db = blog_db();
    let engine = blog_engine(&db);
    seed_posts(&db);

    block_on(async {
        let cx = Cx::for_testing();
        let filter = Conditions::new().eq("color", "red");
        let order = OrderBy::asc("popularity");
        let rows = unwrap_outcome(engine.select(&cx, "Post", &filter, Some(&order)).await).unwrap();
        assert_eq!(rows.len(), 3);
    });

    assert!(
        db.statements()
            .contains(&"SELECT * FROM post WHERE deleted_at = ?".to_string())
    );
}

#[test]
fn find_by_unknown_field_is_schema_error() {
    let db = blog_db();
    let engine = blog_engine(&db);

    block_on(async {
        let cx = Cx::for_testing();
        match engine.find_by(&cx, "Post", "color", "red").await {
            Outcome::Err(err) => assert!(err.is_schema(), "got {err}"),
            other => panic!("expected schema error, got {other:?}"),
        }
    });
    assert_eq!(db.count("SELECT"), 0);
}

#[test]
fn find_by_returns_first_match() {
    let db = blog_db();
    let engine = blog_engine(&db);
    db.seed("user", user_row("ada"));
    db.seed("user", user_row("ada"));

    block_on(async {
        let cx = Cx::for_testing();
        let user = unwrap_outcome(engine.find_by(&cx, "User", "name", "ada").await)
            .unwrap()
            .unwrap();
        assert_eq!(user.id(), Some(&Value::Int(1)));
    });
}

#[test]
fn find_or_create_inserts_once() {
    let db = blog_db();
    let engine = blog_engine(&db);

    block_on(async {
        let cx = Cx::for_testing();
        let filter = Conditions::new()
            .eq("title", "X")
            .compare("views", Operator::Gt, 100);

        let first = unwrap_outcome(engine.find_or_create(&cx, "Post", &filter).await)
            .unwrap()
            .expect("created");
        let second = unwrap_outcome(engine.find_or_create(&cx, "Post", &filter).await)
            .unwrap()
            .expect("found");

        assert_eq!(first.id(), second.id());
        assert_eq!(second.get("title"), Some(&Value::Text("X".into())));
        assert_eq!(second.get("views"), Some(&Value::Null));
    });

    assert_eq!(db.count("INSERT"), 1);
    assert_eq!(db.rows("post").len(), 1);
}

#[test]
fn get_fields_lists_columns_in_order() {
    let db = blog_db();
    let engine = blog_engine(&db);

    block_on(async {
        let cx = Cx::for_testing();
        let fields = unwrap_outcome(engine.get_fields(&cx, "Tag").await).unwrap();
        assert_eq!(fields, vec!["id", "label"]);
    });
}

#[test]
fn catalog_introspects_each_table_once() {
    let db = blog_db();
    let engine = blog_engine(&db);
    seed_posts(&db);

    block_on(async {
        let cx = Cx::for_testing();
        unwrap_outcome(engine.all(&cx, "Post").await).unwrap();
        unwrap_outcome(engine.all(&cx, "Post").await).unwrap();
        unwrap_outcome(engine.find(&cx, "Post", 1).await).unwrap();
    });

    // post, plus user for the belongs_to lookups.
    assert_eq!(db.count("DESCRIBE post"), 1);
    assert_eq!(db.count("DESCRIBE user"), 1);
    assert_eq!(engine.catalog().introspections(), 2);
    assert_eq!(engine.catalog().cached_tables(), vec!["post", "user"]);
}

#[test]
fn engines_can_share_a_catalog() {
    let db = blog_db();
    let first = blog_engine(&db);
    let second = blog_engine(&db).with_catalog(Arc::clone(first.catalog()));

    block_on(async {
        let cx = Cx::for_testing();
        unwrap_outcome(first.get_fields(&cx, "Tag").await).unwrap();
        unwrap_outcome(second.get_fields(&cx, "Tag").await).unwrap();
    });
    assert_eq!(db.count("DESCRIBE"), 1);
}

#[test]
fn table_prefix_routes_to_prefixed_tables() {
    let db = blog_db();
    db.create_table("acme_tag", &[("id", "int(11)"), ("label", "varchar(64)")]);
    db.seed("tag", Row::new().with("label", "global"));
    let engine = blog_engine(&db);
    let tenant = engine.with_table_prefix("acme_").unwrap();
    assert_eq!(tenant.table_for("Tag").unwrap(), "acme_tag");
    assert_eq!(engine.table_for("Tag").unwrap(), "tag");

    block_on(async {
        let cx = Cx::for_testing();
        let tag = unwrap_outcome(
            tenant
                .create(&cx, "Tag", &Properties::new().with("label", "local"))
                .await,
        )
        .unwrap()
        .unwrap();
        assert_eq!(tag.table(), "acme_tag");

        let mut tags = unwrap_outcome(tenant.all(&cx, "Tag").await).unwrap();
        assert_eq!(tags.len(), 1);
        unwrap_outcome(tenant.update_property(&cx, &mut tags[0], "label", "renamed").await)
            .unwrap();
    });

    assert_eq!(db.rows("tag")[0].get("label"), Some(&Value::Text("global".into())));
    assert_eq!(
        db.rows("acme_tag")[0].get("label"),
        Some(&Value::Text("renamed".into()))
    );
}

#[test]
fn unusable_table_prefix_is_rejected() {
    let db = blog_db();
    let engine = blog_engine(&db);
    assert!(matches!(
        engine.with_table_prefix("acme; DROP"),
        Err(Error::Config(_))
    ));
}
