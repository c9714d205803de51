//! Ranked multi-field search and record reconstruction.

use acervo_core::Error;
use acervo_fts::{Indexer, Searcher};

use crate::common::{Person, RawReading, Reading, TestIndex};

fn people_index() -> TestIndex {
    let index = TestIndex::new();
    let mut indexer = Indexer::<Person>::open(index.path(), true).unwrap();
    for person in [
        Person::new("João", "São Paulo"),
        Person::new("Paulo Freire", "Recife"),
        Person::new("Ana Lúcia", "São José dos Campos"),
        Person::new("Pedro", "São Paulo de Olivença"),
        Person::new("Marta", "Curitiba"),
    ] {
        indexer.add(&person).unwrap();
    }
    indexer.commit().unwrap();
    index
}

#[test]
fn test_search_is_scoped_to_requested_fields() {
    let index = TestIndex::new();
    let mut indexer = Indexer::<Person>::open(index.path(), true).unwrap();
    indexer.add(&Person::new("João", "São Paulo")).unwrap();
    indexer.commit().unwrap();

    let searcher = Searcher::<Person>::open(index.path()).unwrap();
    let found: Vec<Person> = searcher
        .search("Paulo", &["city"])
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "João");
    assert_eq!(found[0].city, "São Paulo");

    assert_eq!(searcher.search("Paulo", &["name"]).unwrap().count(), 0);
}

#[test]
fn test_search_across_fields() {
    let index = people_index();
    let searcher = Searcher::<Person>::open(index.path()).unwrap();

    let cities = searcher.search("paulo", &["city"]).unwrap();
    assert_eq!(cities.len(), 2);

    let names: Vec<String> = searcher
        .search("paulo", &["name", "city"])
        .unwrap()
        .map(|person| person.unwrap().name)
        .collect();
    assert_eq!(names.len(), 3);
    assert!(names.contains(&"Paulo Freire".to_string()));
    assert!(!names.contains(&"Marta".to_string()));
}

#[test]
fn test_scores_never_increase() {
    let index = people_index();
    let searcher = Searcher::<Person>::open(index.path()).unwrap();

    let run = || -> Vec<(f32, String)> {
        searcher
            .search("são paulo", &["name", "city"])
            .unwrap()
            .scored()
            .map(|(score, person)| (score, person.unwrap().city))
            .collect()
    };

    let first = run();
    assert!(first.len() >= 3);
    assert!(first.windows(2).all(|pair| pair[0].0 >= pair[1].0));
    assert_eq!(first, run());
}

#[test]
fn test_query_is_accent_and_case_insensitive() {
    let index = people_index();
    let searcher = Searcher::<Person>::open(index.path()).unwrap();

    assert_eq!(searcher.search("JOAO", &["name"]).unwrap().len(), 1);
    assert_eq!(searcher.search("joão", &["name"]).unwrap().len(), 1);
    assert_eq!(searcher.search("CURITIBA", &["city"]).unwrap().len(), 1);
}

#[test]
fn test_stop_words_alone_match_nothing() {
    let index = people_index();
    let searcher = Searcher::<Person>::open(index.path()).unwrap();
    assert_eq!(searcher.search("dos de", &["city"]).unwrap().len(), 0);
}

#[test]
fn test_results_are_one_shot() {
    let index = people_index();
    let searcher = Searcher::<Person>::open(index.path()).unwrap();

    let mut results = searcher.search("paulo", &["city"]).unwrap();
    let total = results.len();
    assert_eq!(total, 2);

    assert!(results.next().unwrap().is_ok());
    assert_eq!(results.len(), total - 1);
    assert_eq!(results.by_ref().count(), total - 1);
    assert!(results.next().is_none());
}

#[test]
fn test_bad_input_is_distinguishable() {
    let index = people_index();
    let searcher = Searcher::<Person>::open(index.path()).unwrap();

    let unknown = searcher.search("paulo", &["email"]).err().unwrap();
    assert!(matches!(unknown, Error::UnknownField { ref field } if field == "email"));

    let malformed = searcher.search("nickname:paulo", &["name"]).err().unwrap();
    assert!(matches!(malformed, Error::BadQuery { .. }));

    for err in [unknown, malformed] {
        assert!(err.is_bad_query());
        assert!(!err.is_not_found());
        assert!(!err.is_retryable());
    }
}

#[test]
fn test_conversion_failure_is_per_item() {
    let index = TestIndex::new();
    let mut indexer = Indexer::<RawReading>::open(index.path(), true).unwrap();
    for (station, celsius) in [("Mirante de Santana", "21.5"), ("Santana do Parnaíba", "n/d")] {
        indexer
            .add(&RawReading {
                station: station.to_string(),
                celsius: celsius.to_string(),
            })
            .unwrap();
    }
    indexer.commit().unwrap();

    let searcher = Searcher::<Reading>::open(index.path()).unwrap();
    let results: Vec<_> = searcher.search("santana", &["station"]).unwrap().collect();
    assert_eq!(results.len(), 2);

    let parsed: Vec<&Reading> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0].station, "Mirante de Santana");
    assert!((parsed[0].celsius - 21.5).abs() < f64::EPSILON);

    let failed = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    let Error::ConversionFailure {
        field,
        type_name,
        value,
        ..
    } = failed
    else {
        unreachable!("expected a conversion failure, got {failed:?}");
    };
    assert_eq!(field, "celsius");
    assert_eq!(*type_name, "f64");
    assert_eq!(value, "n/d");
}
