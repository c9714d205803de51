//! Key-field identity: verbatim keys, delete and upsert by key.

use acervo_core::{Error, KeyValues, RecordId};
use acervo_fts::{IdentityStrategy, Indexer, Searcher};

use crate::common::{Municipality, Person, Product, TestIndex, municipality, product};

fn sku(value: &str) -> KeyValues {
    KeyValues::new().with("sku", value)
}

#[test]
fn test_add_returns_nil_identifier() {
    let index = TestIndex::new();
    let mut indexer = Indexer::<Product>::open(index.path(), false).unwrap();
    assert_eq!(indexer.strategy(), IdentityStrategy::KeyFields);

    let id = indexer.add(&product("SKU-1", "Café torrado", 19.9)).unwrap();
    assert_eq!(id, RecordId::nil());
}

#[test]
fn test_keys_match_verbatim() {
    let index = TestIndex::new();
    let mut indexer = Indexer::<Product>::open(index.path(), false).unwrap();
    let original = product("Cx-12/B.Rev 2", "Caixa organizadora", 45.0);
    indexer.add(&original).unwrap();
    indexer.commit().unwrap();

    let searcher = Searcher::<Product>::open(index.path()).unwrap();
    assert_eq!(searcher.get_by_key(&sku("Cx-12/B.Rev 2")).unwrap(), original);

    for near_miss in ["cx-12/b.rev 2", "Cx-12/B.Rev", "Cx", "Cx-12/B.Rev 2 "] {
        let err = searcher.get_by_key(&sku(near_miss)).unwrap_err();
        assert!(err.is_not_found(), "{near_miss:?} should not match");
    }
}

#[test]
fn test_key_field_is_searchable_only_verbatim() {
    let index = TestIndex::new();
    let mut indexer = Indexer::<Product>::open(index.path(), false).unwrap();
    indexer.add(&product("AB-1", "Açúcar mascavo", 12.5)).unwrap();
    indexer.commit().unwrap();

    let searcher = Searcher::<Product>::open(index.path()).unwrap();
    assert_eq!(searcher.search("acucar", &["description"]).unwrap().len(), 1);
    assert_eq!(searcher.search("ab", &["sku"]).unwrap().len(), 0);
}

#[test]
fn test_remove_key_then_commit() {
    let index = TestIndex::new();
    let mut indexer = Indexer::<Product>::open(index.path(), false).unwrap();
    indexer.add(&product("SKU-1", "Café torrado", 19.9)).unwrap();
    indexer.add(&product("SKU-2", "Café moído", 21.9)).unwrap();
    indexer.commit().unwrap();

    indexer.remove_key(&sku("SKU-1")).unwrap();
    indexer.commit().unwrap();

    let searcher = Searcher::<Product>::open(index.path()).unwrap();
    assert!(searcher.get_by_key(&sku("SKU-1")).unwrap_err().is_not_found());
    assert_eq!(searcher.get_by_key(&sku("SKU-2")).unwrap().price, 21.9);
}

#[test]
fn test_composite_key() {
    let index = TestIndex::new();
    let mut indexer = Indexer::<Municipality>::open(index.path(), false).unwrap();
    indexer.add(&municipality("SP", "3550308", "São Paulo")).unwrap();
    indexer.add(&municipality("SP", "3509502", "Campinas")).unwrap();
    indexer.add(&municipality("MG", "3550308", "Fictícia")).unwrap();
    indexer.commit().unwrap();

    let key = KeyValues::new().with("state", "SP").with("code", "3550308");
    indexer.remove_key(&key).unwrap();
    indexer.commit().unwrap();

    let searcher = Searcher::<Municipality>::open(index.path()).unwrap();
    assert_eq!(searcher.num_docs(), 2);
    assert!(searcher.get_by_key(&key).unwrap_err().is_not_found());
    let other_state = KeyValues::new().with("state", "MG").with("code", "3550308");
    assert_eq!(searcher.get_by_key(&other_state).unwrap().name, "Fictícia");
}

#[test]
fn test_partial_key_is_rejected() {
    let index = TestIndex::new();
    let mut indexer = Indexer::<Municipality>::open(index.path(), false).unwrap();
    let err = indexer
        .remove_key(&KeyValues::new().with("state", "SP"))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidKey { .. }));
}

#[test]
fn test_replace_upserts() {
    let index = TestIndex::new();
    let mut indexer = Indexer::<Product>::open(index.path(), false).unwrap();
    indexer.replace(&product("SKU-1", "Café torrado", 19.9)).unwrap();
    indexer.replace(&product("SKU-2", "Chá mate", 8.5)).unwrap();
    indexer.commit().unwrap();

    let mut cheaper = product("SKU-1", "Café torrado em grãos", 17.9);
    cheaper.stock = 0;
    indexer.replace(&cheaper).unwrap();
    indexer.commit().unwrap();

    let searcher = Searcher::<Product>::open(index.path()).unwrap();
    assert_eq!(searcher.num_docs(), 2);
    assert_eq!(searcher.get_by_key(&sku("SKU-1")).unwrap(), cheaper);
}

#[test]
fn test_strategy_mismatch_both_ways() {
    let keyed_index = TestIndex::new();
    let mut keyed = Indexer::<Product>::open(keyed_index.path(), false).unwrap();
    let err = keyed.remove(RecordId::new()).unwrap_err();
    assert!(matches!(err, Error::StrategyMismatch { operation: "remove", .. }));
    assert!(!err.is_retryable());

    let auto_index = TestIndex::new();
    let mut auto = Indexer::<Product>::open(auto_index.path(), true).unwrap();
    let err = auto.remove_key(&sku("SKU-1")).unwrap_err();
    assert!(matches!(err, Error::StrategyMismatch { operation: "remove_key", .. }));
}

#[test]
fn test_key_fields_without_keys_rejected_at_open() {
    let index = TestIndex::new();
    let err = Indexer::<Person>::open(index.path(), false).unwrap_err();
    assert!(matches!(err, Error::Config { .. }));
}
