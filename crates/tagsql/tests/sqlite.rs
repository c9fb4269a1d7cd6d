#![cfg(feature = "sqlite")]

use rusqlite::{Connection, params};
use std::collections::BTreeSet;
use tagsql::{
    cache::{KeyValueTagIdCache, MemoryKeyValueStore, MemoryTagIdCache, TagIdCache},
    config::{Dialect, TagSqlConfig},
    db::{FromRow, Row, RowDecodeError, SqliteExecutor, TagRepository},
    prelude::*,
    tag::NewTag,
};

///
/// Doc
///

#[derive(Debug, Eq, PartialEq)]
struct Doc {
    id: i64,
}

impl FromRow for Doc {
    fn from_row(row: &Row) -> Result<Self, RowDecodeError> {
        Ok(Self {
            id: row.try_get("id")?,
        })
    }
}

fn connection() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE documents (
             id INTEGER PRIMARY KEY,
             created_at INTEGER NOT NULL
         );
         CREATE TABLE tags (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             key TEXT NOT NULL,
             value TEXT,
             type TEXT NOT NULL DEFAULT 'default'
         );
         CREATE UNIQUE INDEX tags_key_value ON tags (key, COALESCE(value, ''));
         CREATE TABLE entity_tags (
             entity_id INTEGER NOT NULL,
             tag_id INTEGER NOT NULL,
             UNIQUE (entity_id, tag_id)
         );",
    )
    .unwrap();

    conn
}

fn config() -> TagSqlConfig {
    TagSqlConfig {
        dialect: Dialect::Sqlite,
        ..TagSqlConfig::default()
    }
}

fn repository(conn: &Connection) -> TagRepository<SqliteExecutor<'_>, MemoryTagIdCache> {
    let repo = TagRepository::new(SqliteExecutor::new(conn), MemoryTagIdCache::new(), config())
        .unwrap();
    repo.init_cache().unwrap();

    repo
}

fn insert_docs(conn: &Connection, ids: impl IntoIterator<Item = i64>) {
    for id in ids {
        conn.execute(
            "INSERT INTO documents (id, created_at) VALUES (?1, ?2)",
            params![id, 1_000 + id],
        )
        .unwrap();
    }
}

fn create(repo: &TagRepository<SqliteExecutor<'_>, MemoryTagIdCache>, raw: &[&str]) {
    let tags = raw
        .iter()
        .map(|raw| NewTag::from(Tag::parse(raw)))
        .collect::<Vec<_>>();
    repo.create_tags(&tags).unwrap();
}

fn ids(page: &Page<Doc>) -> Vec<i64> {
    page.items.iter().map(|doc| doc.id).collect()
}

fn association_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM entity_tags", [], |row| row.get(0))
        .unwrap()
}

//
// filtering
//

#[test]
fn meta_and_not_selects_exactly_one_entity() {
    let conn = connection();
    let repo = repository(&conn);
    create(&repo, &["color:red", "size:large"]);
    insert_docs(&conn, 1..=3);

    let red = Tag::meta("color", "red");
    let large = Tag::meta("size", "large");
    repo.add_tag_to_entity(1, &red).unwrap();
    repo.add_tag_to_entity(2, &red).unwrap();
    repo.add_tag_to_entity(2, &large).unwrap();
    repo.add_tag_to_entity(3, &large).unwrap();

    let filter = Filter::and(
        Filter::meta("color", "red"),
        Filter::not(Filter::meta("size", "large")),
    );
    let page = repo
        .list_entities::<Doc>(&filter, PageSpec::first(20))
        .unwrap();

    assert_eq!(ids(&page), vec![1]);
    assert_eq!(page.total, 1);
}

#[test]
fn true_matches_untagged_entities() {
    let conn = connection();
    let repo = repository(&conn);
    create(&repo, &["archived"]);
    insert_docs(&conn, 1..=3);
    repo.add_tag_to_entity(2, &Tag::bare("archived")).unwrap();

    let all = repo
        .list_entities::<Doc>(&Filter::True, PageSpec::first(20))
        .unwrap();
    let not_archived = repo
        .list_entities::<Doc>(&Filter::not(Filter::tag("archived")), PageSpec::first(20))
        .unwrap();

    assert_eq!(ids(&all), vec![3, 2, 1]);
    assert_eq!(ids(&not_archived), vec![3, 1]);
}

#[test]
fn bare_key_matches_every_tag_in_its_family() {
    let conn = connection();
    let repo = repository(&conn);
    create(&repo, &["person:alice", "person:bob", "place:home"]);
    insert_docs(&conn, 1..=4);
    repo.add_tag_to_entity(1, &Tag::meta("person", "alice")).unwrap();
    repo.add_tag_to_entity(2, &Tag::meta("person", "bob")).unwrap();
    repo.add_tag_to_entity(3, &Tag::meta("place", "home")).unwrap();

    let people = repo
        .list_entities::<Doc>(&Filter::tag("person"), PageSpec::first(20))
        .unwrap();
    let nobody = repo
        .list_entities::<Doc>(&Filter::not(Filter::tag("person")), PageSpec::first(20))
        .unwrap();
    let unknown_family = repo
        .list_entities::<Doc>(&Filter::tag("animal"), PageSpec::first(20))
        .unwrap();

    assert_eq!(ids(&people), vec![2, 1]);
    assert_eq!(ids(&nobody), vec![4, 3]);
    assert!(unknown_family.is_empty());
    assert_eq!(unknown_family.total, 0);
}

#[test]
fn unknown_meta_tag_is_rejected() {
    let conn = connection();
    let repo = repository(&conn);

    let err = repo
        .list_entities::<Doc>(&Filter::meta("person", "zoe"), PageSpec::first(20))
        .expect_err("unknown meta tag must fail");

    assert!(err.is_unknown_tag());
    assert_eq!(err.status_code(), 400);
}

//
// ordering and pagination
//

#[test]
fn pages_carry_the_full_total() {
    let conn = connection();
    let repo = repository(&conn);
    insert_docs(&conn, 1..=137);

    let mut page_spec = PageSpec::first(20);
    let mut seen = Vec::new();
    let mut sizes = Vec::new();
    loop {
        let page = repo.list_entities::<Doc>(&Filter::True, page_spec).unwrap();
        if page.is_empty() {
            break;
        }

        assert_eq!(page.total, 137);
        sizes.push(page.len());
        seen.extend(ids(&page));
        page_spec = page_spec.next();
    }

    assert_eq!(sizes.len(), 7);
    assert_eq!(sizes.last(), Some(&17));
    assert_eq!(seen, (1..=137).rev().collect::<Vec<_>>());
}

#[test]
fn empty_page_past_the_end_has_zero_total() {
    let conn = connection();
    let repo = repository(&conn);
    insert_docs(&conn, 1..=3);

    let page = repo
        .list_entities::<Doc>(&Filter::True, PageSpec::new(20, 40))
        .unwrap();

    assert!(page.is_empty());
    assert_eq!(page.total, 0);
}

#[test]
fn sort_directives_choose_the_order() {
    let conn = connection();
    let repo = repository(&conn);
    insert_docs(&conn, 1..=5);

    let oldest = repo
        .list_entities::<Doc>(&Filter::sort("oldest"), PageSpec::first(20))
        .unwrap();
    let newest = repo
        .list_entities::<Doc>(
            &Filter::and(Filter::sort("oldest"), Filter::sort("newest")),
            PageSpec::first(20),
        )
        .unwrap();
    let random = repo
        .list_entities::<Doc>(&Filter::sort("random"), PageSpec::first(20))
        .unwrap();

    assert_eq!(ids(&oldest), vec![1, 2, 3, 4, 5]);
    assert_eq!(ids(&newest), vec![5, 4, 3, 2, 1]);
    assert_eq!(
        ids(&random).into_iter().collect::<BTreeSet<_>>(),
        (1..=5).collect::<BTreeSet<_>>()
    );
    assert_eq!(random.total, 5);
}

//
// associations
//

#[test]
fn add_and_remove_are_idempotent() {
    let conn = connection();
    let repo = repository(&conn);
    create(&repo, &["archived"]);
    insert_docs(&conn, [1]);
    let archived = Tag::bare("archived");

    assert!(repo.add_tag_to_entity(1, &archived).unwrap());
    assert!(!repo.add_tag_to_entity(1, &archived).unwrap());
    assert_eq!(association_count(&conn), 1);

    assert!(repo.remove_tag_from_entity(1, &archived).unwrap());
    assert!(!repo.remove_tag_from_entity(1, &archived).unwrap());
    assert!(!repo.remove_tag_from_entity(1, &Tag::bare("ghost")).unwrap());
    assert_eq!(association_count(&conn), 0);
}

#[test]
fn attach_parses_creates_and_associates() {
    let conn = connection();
    let repo = repository(&conn);
    insert_docs(&conn, 1..=2);

    assert!(repo.attach_tag(1, " person : alice ", TagType::default()).unwrap());
    assert!(repo.attach_tag(2, "person:alice", TagType::default()).unwrap());
    assert!(!repo.attach_tag(2, "person:alice", TagType::default()).unwrap());

    let tags = repo.tags_for_entity(2).unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].record.tag(), Tag::meta("person", "alice"));
    assert_eq!(tags[0].usage_count, 2);
}

//
// tags
//

#[test]
fn create_tags_returns_only_new_records() {
    let conn = connection();
    let repo = repository(&conn);

    let first = repo
        .create_tags(&[
            NewTag::from(Tag::bare("archived")),
            NewTag::new(Tag::meta("camera", "x100"), TagType::meta()),
        ])
        .unwrap();
    let second = repo
        .create_tags(&[
            NewTag::from(Tag::bare("archived")),
            NewTag::from(Tag::meta("camera", "x200")),
        ])
        .unwrap();

    // RETURNING row order is unspecified
    let camera = first
        .iter()
        .find(|record| record.key == "camera")
        .expect("camera tag was created");
    assert_eq!(first.len(), 2);
    assert_eq!(camera.tag_type, TagType::meta());
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].tag(), Tag::meta("camera", "x200"));

    for record in first.iter().chain(&second) {
        assert_eq!(repo.cache().lookup(&record.signature()), Ok(record.id));
    }
}

#[test]
fn tags_created_during_warm_up_survive_it() {
    let conn = connection();
    let repo = TagRepository::new(SqliteExecutor::new(&conn), MemoryTagIdCache::new(), config())
        .unwrap();

    let created = repo
        .create_tags(&[NewTag::from(Tag::bare("archived"))])
        .unwrap();
    assert_eq!(created.len(), 1);

    // a warm-up that read the store before the tag existed
    repo.cache().init(Vec::new()).unwrap();
    insert_docs(&conn, [1]);
    repo.add_tag_to_entity(1, &Tag::bare("archived")).unwrap();

    let page = repo
        .list_entities::<Doc>(&Filter::tag("archived"), PageSpec::first(20))
        .unwrap();
    assert_eq!(ids(&page), vec![1]);
}

#[test]
fn list_tags_orders_by_usage_and_matches_substrings() {
    let conn = connection();
    let repo = repository(&conn);
    create(&repo, &["person:alice", "person:bob", "personal", "place:home"]);
    insert_docs(&conn, 1..=3);
    for id in 1..=3 {
        repo.add_tag_to_entity(id, &Tag::meta("person", "bob")).unwrap();
    }
    repo.add_tag_to_entity(1, &Tag::meta("person", "alice")).unwrap();

    let by_key = repo.list_tags(&Tag::bare("PERS"), PageSpec::first(10)).unwrap();
    let signatures = by_key
        .items
        .iter()
        .map(|tag| tag.record.signature().to_string())
        .collect::<Vec<_>>();

    assert_eq!(by_key.total, 3);
    assert_eq!(signatures, vec!["person:bob", "person:alice", "personal"]);
    assert_eq!(by_key.items[0].usage_count, 3);
    assert_eq!(by_key.items[2].usage_count, 0);

    let by_value = repo
        .list_tags(&Tag::meta("person", "LI"), PageSpec::first(10))
        .unwrap();
    assert_eq!(by_value.total, 1);
    assert_eq!(by_value.items[0].record.tag(), Tag::meta("person", "alice"));

    let second_page = repo.list_tags(&Tag::bare("p"), PageSpec::new(2, 2)).unwrap();
    assert_eq!(second_page.total, 4);
    assert_eq!(second_page.len(), 2);
}

#[test]
fn list_tags_treats_like_metacharacters_literally() {
    let conn = connection();
    let repo = repository(&conn);
    create(&repo, &["discount:50%", "discount:500", "snake_case", "snakecase"]);

    let percent = repo
        .list_tags(&Tag::meta("discount", "50%"), PageSpec::first(10))
        .unwrap();
    let underscore = repo
        .list_tags(&Tag::bare("e_c"), PageSpec::first(10))
        .unwrap();

    assert_eq!(percent.total, 1);
    assert_eq!(percent.items[0].record.value.as_deref(), Some("50%"));
    assert_eq!(underscore.total, 1);
    assert_eq!(underscore.items[0].record.key, "snake_case");
}

#[test]
fn tags_for_entity_reports_global_usage() {
    let conn = connection();
    let repo = repository(&conn);
    create(&repo, &["archived", "color:red", "color:blue"]);
    insert_docs(&conn, 1..=3);
    repo.add_tag_to_entity(1, &Tag::bare("archived")).unwrap();
    repo.add_tag_to_entity(1, &Tag::meta("color", "red")).unwrap();
    repo.add_tag_to_entity(2, &Tag::meta("color", "red")).unwrap();
    repo.add_tag_to_entity(3, &Tag::meta("color", "red")).unwrap();

    let tags = repo.tags_for_entity(1).unwrap();
    let summary = tags
        .iter()
        .map(|tag| (tag.record.signature().to_string(), tag.usage_count))
        .collect::<Vec<_>>();

    assert_eq!(
        summary,
        vec![("archived".to_string(), 1), ("color:red".to_string(), 3)]
    );
    assert!(repo.tags_for_entity(99).unwrap().is_empty());
}

//
// cache backends
//

#[test]
fn key_value_cache_drives_the_same_queries() {
    let conn = connection();
    conn.execute_batch(
        "INSERT INTO tags (key, value) VALUES ('color', 'red'), ('size', 'large');
         INSERT INTO documents (id, created_at) VALUES (1, 10), (2, 20);
         INSERT INTO entity_tags (entity_id, tag_id) VALUES (1, 1), (2, 1), (2, 2);",
    )
    .unwrap();

    let cache = KeyValueTagIdCache::new(MemoryKeyValueStore::new(), "tag:");
    let repo = TagRepository::new(SqliteExecutor::new(&conn), cache, config()).unwrap();
    assert_eq!(repo.init_cache().unwrap(), 2);

    let page = repo
        .list_entities::<Doc>(
            &Filter::and(
                Filter::meta("color", "red"),
                Filter::not(Filter::meta("size", "large")),
            ),
            PageSpec::first(20),
        )
        .unwrap();

    assert_eq!(ids(&page), vec![1]);
    assert_eq!(
        repo.cache().store().len(),
        2,
        "entries are written under the configured prefix"
    );
}
