//! Open, write, commit, reopen: auto-generated identifiers on disk.

use std::collections::HashSet;

use acervo_core::{Error, IndexConfig, RecordId};
use acervo_fts::{CloseStatus, IdentityStrategy, Indexer, Searcher};
use proptest::prelude::*;

use crate::common::{Person, Product, TestIndex, product};

#[test]
fn test_round_trip_through_new_searcher() {
    let index = TestIndex::new();
    let people = vec![
        Person {
            age: Some(42),
            ..Person::new("João", "São Paulo")
        },
        Person::new("Maria das Graças", "Belo Horizonte"),
        Person::new("Antônio", "Porto Alegre"),
    ];

    let mut indexer = Indexer::<Person>::open(index.path(), true).unwrap();
    assert!(indexer.is_new_index());
    let ids: Vec<RecordId> = people.iter().map(|p| indexer.add(p).unwrap()).collect();
    indexer.commit().unwrap();

    let searcher = Searcher::<Person>::open(index.path()).unwrap();
    assert_eq!(searcher.num_docs(), 3);
    for (id, person) in ids.iter().zip(&people) {
        let found = searcher.get_by_id(*id).unwrap();
        assert_eq!(found.id, Some(*id));
        assert_eq!(found.without_id(), *person);
    }
}

#[test]
fn test_get_document_returns_stored_strings() {
    let index = TestIndex::new();
    let mut indexer = Indexer::<Person>::open(index.path(), true).unwrap();
    let id = indexer
        .add(&Person {
            age: Some(7),
            ..Person::new("Lia", "Recife")
        })
        .unwrap();
    indexer.commit().unwrap();

    let doc = Searcher::<Person>::open(index.path())
        .unwrap()
        .get_document(id)
        .unwrap();
    assert_eq!(doc.get_first("#id"), Some(id.to_string().as_str()));
    assert_eq!(doc.get_first("age"), Some("7"));
    assert_eq!(doc.get_first("city"), Some("Recife"));
}

#[test]
fn test_uncommitted_writes_are_invisible() {
    let index = TestIndex::new();
    let mut indexer = Indexer::<Person>::open(index.path(), true).unwrap();
    let id = indexer.add(&Person::new("Lia", "Recife")).unwrap();

    let searcher = Searcher::<Person>::open(index.path()).unwrap();
    assert!(searcher.get_by_id(id).unwrap_err().is_not_found());
    assert_eq!(indexer.pending_operations(), 1);
}

#[test]
fn test_remove_then_commit_is_not_found() {
    let index = TestIndex::new();
    let mut indexer = Indexer::<Person>::open(index.path(), true).unwrap();
    let gone = indexer.add(&Person::new("Lia", "Recife")).unwrap();
    let kept = indexer.add(&Person::new("Caio", "Natal")).unwrap();
    indexer.commit().unwrap();

    indexer.remove(gone).unwrap();
    indexer.commit().unwrap();

    let searcher = Searcher::<Person>::open(index.path()).unwrap();
    let err = searcher.get_by_id(gone).unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    assert!(!err.is_retryable());
    assert_eq!(searcher.get_by_id(kept).unwrap().name, "Caio");
}

#[test]
fn test_remove_of_unknown_id_is_harmless() {
    let index = TestIndex::new();
    let mut indexer = Indexer::<Person>::open(index.path(), true).unwrap();
    indexer.add(&Person::new("Lia", "Recife")).unwrap();
    indexer.remove(RecordId::new()).unwrap();
    indexer.commit().unwrap();

    assert_eq!(Searcher::<Person>::open(index.path()).unwrap().num_docs(), 1);
}

#[test]
fn test_refresh_replaces_whole_document() {
    let index = TestIndex::new();
    let mut indexer = Indexer::<Person>::open(index.path(), true).unwrap();
    let id = indexer
        .add(&Person {
            age: Some(30),
            ..Person::new("Lia", "Recife")
        })
        .unwrap();
    indexer.commit().unwrap();

    // No age: the stored age survives the refresh.
    indexer.refresh(&Person::new("Lia", "Olinda"), id).unwrap();
    indexer.commit().unwrap();

    let searcher = Searcher::<Person>::open(index.path()).unwrap();
    assert_eq!(searcher.num_docs(), 1);
    let found = searcher.get_by_id(id).unwrap();
    assert_eq!(found.city, "Olinda");
    assert_eq!(found.age, Some(30));
    assert_eq!(searcher.search("recife", &["city"]).unwrap().len(), 0);
    assert_eq!(searcher.search("olinda", &["city"]).unwrap().len(), 1);
}

#[test]
fn test_reopen_existing_index() {
    let index = TestIndex::new();
    let first = {
        let mut indexer = Indexer::<Person>::open(index.path(), true).unwrap();
        let id = indexer.add(&Person::new("Lia", "Recife")).unwrap();
        assert!(matches!(indexer.close().unwrap(), CloseStatus::Closed));
        id
    };

    let mut indexer = Indexer::<Person>::open(index.path(), true).unwrap();
    assert!(!indexer.is_new_index());
    let second = indexer.add(&Person::new("Caio", "Natal")).unwrap();
    indexer.commit().unwrap();

    let searcher = Searcher::<Person>::open(index.path()).unwrap();
    assert_eq!(searcher.num_docs(), 2);
    assert!(searcher.get_by_id(first).is_ok());
    assert!(searcher.get_by_id(second).is_ok());
}

#[test]
fn test_drop_commits_buffered_work() {
    let index = TestIndex::new();
    let id = {
        let mut indexer = Indexer::<Person>::open(index.path(), true).unwrap();
        indexer.add(&Person::new("Lia", "Recife")).unwrap()
    };

    let searcher = Searcher::<Person>::open(index.path()).unwrap();
    assert_eq!(searcher.get_by_id(id).unwrap().name, "Lia");
}

#[test]
fn test_second_indexer_on_same_path_fails() {
    let index = TestIndex::new();
    let _writer = Indexer::<Person>::open(index.path(), true).unwrap();
    let err = Indexer::<Person>::open(index.path(), true).unwrap_err();
    assert!(matches!(err, Error::Engine(_)));
}

#[test]
fn test_other_strategy_on_existing_index_is_incompatible() {
    let index = TestIndex::new();
    {
        let mut indexer = Indexer::<Product>::open(index.path(), true).unwrap();
        indexer.add(&product("SKU-1", "Café torrado", 19.9)).unwrap();
        indexer.close().unwrap();
    }

    let err = Indexer::<Product>::open(index.path(), false).unwrap_err();
    assert!(matches!(err, Error::IncompatibleIndex { .. }));
}

#[test]
fn test_searcher_requires_existing_index() {
    let index = TestIndex::new();
    let err = Searcher::<Person>::open(index.path()).unwrap_err();
    assert!(matches!(err, Error::IncompatibleIndex { .. }));
}

#[test]
fn test_open_with_config_from_toml() {
    let index = TestIndex::new();
    let config = IndexConfig::from_toml_str(
        r#"
        writer_memory_bytes = 20000000
        merge_on_commit = false
        default_conjunction = "and"
        "#,
    )
    .unwrap();

    let mut indexer =
        Indexer::<Person>::open_with(index.path(), IdentityStrategy::AutoGenerated, &config)
            .unwrap();
    indexer.add(&Person::new("Lia", "Rio de Janeiro")).unwrap();
    indexer.add(&Person::new("Caio", "Rio Branco")).unwrap();
    indexer.commit().unwrap();

    let searcher = Searcher::<Person>::open_with(index.path(), &config).unwrap();
    assert_eq!(searcher.search("rio janeiro", &["city"]).unwrap().len(), 1);
}

#[test]
fn test_invalid_config_is_rejected() {
    let index = TestIndex::new();
    let config = IndexConfig {
        max_results: 0,
        ..Default::default()
    };
    let err = Indexer::<Person>::open_with(index.path(), IdentityStrategy::AutoGenerated, &config)
        .unwrap_err();
    assert!(matches!(err, Error::Config { .. }));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn test_generated_identifiers_are_distinct(count in 1usize..40) {
        let mut indexer = Indexer::<Person>::in_memory(IdentityStrategy::AutoGenerated).unwrap();
        let ids: HashSet<RecordId> = (0..count)
            .map(|i| indexer.add(&Person::new(&format!("pessoa {i}"), "Manaus")).unwrap())
            .collect();
        prop_assert_eq!(ids.len(), count);
        prop_assert!(ids.iter().all(|id| !id.is_nil()));
    }
}
