use chrono::NaiveDate;
use mtgindex::db::{init_db, DefinitionChange, Repository, StoreError};
use mtgindex::domain::{
    BenchmarkDefinition, CardId, CriteriaSet, Criterion, EvaluationType, Operator, Weighting,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

async fn setup_repo() -> (Repository, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    (Repository::new(pool), temp_dir)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn two_drops() -> BenchmarkDefinition {
    BenchmarkDefinition::new(
        "two_drops",
        CriteriaSet::new(vec![Criterion::new("convertedManaCost", Operator::Eq, 2.0)]),
    )
}

fn ids(list: &[&str]) -> BTreeSet<CardId> {
    list.iter().map(|s| CardId::new(*s)).collect()
}

fn prices(list: &[(&str, f64)]) -> HashMap<CardId, f64> {
    list.iter().map(|(id, p)| (CardId::new(*id), *p)).collect()
}

#[tokio::test]
async fn test_create_get_and_exists() {
    let (repo, _temp) = setup_repo().await;
    assert!(!repo.exists("two_drops").await.unwrap());

    let definition = two_drops()
        .with_evaluation_type(EvaluationType::Foil)
        .with_weighting(Weighting::Price);
    let created = repo.create(&definition).await.unwrap();
    assert!(created.constituents.is_empty());

    assert!(repo.exists("two_drops").await.unwrap());
    let stored = repo.get("two_drops").await.unwrap().unwrap();
    assert_eq!(stored.definition(), definition);
    assert!(repo.get("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_create_twice_is_already_exists() {
    let (repo, _temp) = setup_repo().await;
    assert_ok!(repo.create(&two_drops()).await);

    let err = assert_err!(repo.create(&two_drops()).await);
    assert!(matches!(err, StoreError::AlreadyExists(name) if name == "two_drops"));
}

#[tokio::test]
async fn test_replace_constituents_is_wholesale_and_idempotent() {
    let (repo, _temp) = setup_repo().await;
    repo.create(&two_drops()).await.unwrap();

    repo.replace_constituents("two_drops", &ids(&["a", "b"]))
        .await
        .unwrap();
    assert_eq!(repo.constituents("two_drops").await.unwrap(), ids(&["a", "b"]));

    repo.replace_constituents("two_drops", &ids(&["a"])).await.unwrap();
    repo.replace_constituents("two_drops", &ids(&["a"])).await.unwrap();
    assert_eq!(repo.constituents("two_drops").await.unwrap(), ids(&["a"]));
}

#[tokio::test]
async fn test_replace_constituents_unknown_benchmark() {
    let (repo, _temp) = setup_repo().await;
    let err = assert_err!(repo.replace_constituents("ghost", &ids(&["a"])).await);
    assert!(matches!(err, StoreError::UnknownBenchmark(_)));
    assert!(repo.constituents("ghost").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_date_leaves_series_unchanged() {
    let (repo, _temp) = setup_repo().await;
    repo.create(&two_drops()).await.unwrap();

    assert_ok!(
        repo.append_index_point("two_drops", date(2024, 3, 1), 1000.0)
            .await
    );
    let err = assert_err!(
        repo.append_index_point("two_drops", date(2024, 3, 1), 1010.0)
            .await
    );
    assert!(matches!(err, StoreError::DuplicateDate { .. }));

    let series = repo.index_series("two_drops").await.unwrap();
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].level, 1000.0);
}

#[tokio::test]
async fn test_append_to_unknown_benchmark() {
    let (repo, _temp) = setup_repo().await;
    let err = assert_err!(
        repo.append_index_point("ghost", date(2024, 3, 1), 1000.0)
            .await
    );
    assert!(matches!(err, StoreError::UnknownBenchmark(_)));
}

#[tokio::test]
async fn test_series_is_ordered_by_date() {
    let (repo, _temp) = setup_repo().await;
    repo.create(&two_drops()).await.unwrap();

    repo.append_index_point("two_drops", date(2024, 3, 2), 1010.0)
        .await
        .unwrap();
    repo.append_index_point("two_drops", date(2024, 3, 1), 1000.0)
        .await
        .unwrap();

    let series = repo.index_series("two_drops").await.unwrap();
    let dates: Vec<NaiveDate> = series.iter().map(|p| p.date).collect();
    assert_eq!(dates, vec![date(2024, 3, 1), date(2024, 3, 2)]);

    let latest = repo.latest_index("two_drops").await.unwrap().unwrap();
    assert_eq!(latest.date, date(2024, 3, 2));
    assert_eq!(latest.level, 1010.0);
}

#[tokio::test]
async fn test_failed_valuation_does_not_store_snapshot() {
    let (repo, _temp) = setup_repo().await;
    repo.create(&two_drops()).await.unwrap();

    repo.append_valuation(
        "two_drops",
        date(2024, 3, 1),
        1000.0,
        &prices(&[("a", 4.0)]),
    )
    .await
    .unwrap();
    let err = assert_err!(
        repo.append_valuation(
            "two_drops",
            date(2024, 3, 1),
            1200.0,
            &prices(&[("a", 9.0)]),
        )
        .await
    );
    assert!(matches!(err, StoreError::DuplicateDate { .. }));

    let previous = repo
        .last_known_prices_before("two_drops", date(2024, 3, 2))
        .await
        .unwrap();
    assert_eq!(previous, prices(&[("a", 4.0)]));
}

#[tokio::test]
async fn test_last_known_prices_are_strictly_before() {
    let (repo, _temp) = setup_repo().await;
    repo.create(&two_drops()).await.unwrap();

    repo.store_price_snapshot("two_drops", date(2024, 3, 1), &prices(&[("a", 4.0)]))
        .await
        .unwrap();
    repo.store_price_snapshot(
        "two_drops",
        date(2024, 3, 3),
        &prices(&[("a", 5.0), ("b", 1.5)]),
    )
    .await
    .unwrap();

    assert!(repo
        .last_known_prices_before("two_drops", date(2024, 3, 1))
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        repo.last_known_prices_before("two_drops", date(2024, 3, 3))
            .await
            .unwrap(),
        prices(&[("a", 4.0)])
    );
    assert_eq!(
        repo.last_known_prices_before("two_drops", date(2024, 3, 10))
            .await
            .unwrap(),
        prices(&[("a", 5.0), ("b", 1.5)])
    );
}

#[tokio::test]
async fn test_last_known_prices_carry_across_gaps() {
    let (repo, _temp) = setup_repo().await;
    repo.create(&two_drops()).await.unwrap();

    repo.store_price_snapshot(
        "two_drops",
        date(2024, 3, 1),
        &prices(&[("a", 4.0), ("b", 2.0)]),
    )
    .await
    .unwrap();
    repo.store_price_snapshot("two_drops", date(2024, 3, 2), &prices(&[("a", 4.5)]))
        .await
        .unwrap();

    let previous = repo
        .last_known_prices_before("two_drops", date(2024, 3, 3))
        .await
        .unwrap();
    assert_eq!(previous, prices(&[("a", 4.5), ("b", 2.0)]));
}

#[tokio::test]
async fn test_unvalued_dates_upsert() {
    let (repo, _temp) = setup_repo().await;
    repo.create(&two_drops()).await.unwrap();

    repo.record_unvalued("two_drops", date(2024, 3, 1), "feed empty")
        .await
        .unwrap();
    repo.record_unvalued("two_drops", date(2024, 3, 1), "no priced constituents")
        .await
        .unwrap();

    let unvalued = repo.unvalued_dates("two_drops").await.unwrap();
    assert_eq!(unvalued.len(), 1);
    assert_eq!(unvalued[0].reason, "no priced constituents");
}

#[tokio::test]
async fn test_valuing_a_date_clears_its_unvalued_record() {
    let (repo, _temp) = setup_repo().await;
    repo.create(&two_drops()).await.unwrap();

    repo.record_unvalued("two_drops", date(2024, 3, 1), "no priced constituents")
        .await
        .unwrap();
    repo.append_index_point("two_drops", date(2024, 3, 1), 1000.0)
        .await
        .unwrap();

    assert!(repo.unvalued_dates("two_drops").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_drop_removes_everything_and_is_idempotent() {
    let (repo, _temp) = setup_repo().await;
    repo.create(&two_drops()).await.unwrap();
    repo.replace_constituents("two_drops", &ids(&["a"])).await.unwrap();
    repo.append_valuation(
        "two_drops",
        date(2024, 3, 1),
        1000.0,
        &prices(&[("a", 4.0)]),
    )
    .await
    .unwrap();
    repo.record_unvalued("two_drops", date(2024, 3, 2), "no priced constituents")
        .await
        .unwrap();

    assert!(repo.drop_benchmark("two_drops").await.unwrap());
    assert!(!repo.drop_benchmark("two_drops").await.unwrap());

    assert!(!repo.exists("two_drops").await.unwrap());
    assert!(repo.constituents("two_drops").await.unwrap().is_empty());
    assert!(repo.index_series("two_drops").await.unwrap().is_empty());
    assert!(repo.unvalued_dates("two_drops").await.unwrap().is_empty());
    assert!(repo
        .last_known_prices_before("two_drops", date(2024, 4, 1))
        .await
        .unwrap()
        .is_empty());

    // A recreated benchmark starts with an empty series.
    repo.create(&two_drops()).await.unwrap();
    assert!(repo.latest_index("two_drops").await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_definition() {
    let (repo, _temp) = setup_repo().await;
    repo.create(&two_drops()).await.unwrap();

    let changed = BenchmarkDefinition::new(
        "two_drops",
        CriteriaSet::new(vec![Criterion::new("convertedManaCost", Operator::Le, 2.0)]),
    )
    .with_weighting(Weighting::Price);
    repo.update_definition(&changed).await.unwrap();
    assert_eq!(repo.get("two_drops").await.unwrap().unwrap().definition(), changed);

    let ghost = BenchmarkDefinition::new("ghost", CriteriaSet::any());
    let err = assert_err!(repo.update_definition(&ghost).await);
    assert!(matches!(err, StoreError::UnknownBenchmark(_)));
}

#[tokio::test]
async fn test_list_summaries() {
    let (repo, _temp) = setup_repo().await;
    repo.create(&two_drops()).await.unwrap();
    repo.create(&BenchmarkDefinition::new("any", CriteriaSet::any()))
        .await
        .unwrap();
    repo.replace_constituents("two_drops", &ids(&["a", "b"]))
        .await
        .unwrap();
    repo.append_index_point("two_drops", date(2024, 3, 1), 1000.0)
        .await
        .unwrap();
    repo.append_index_point("two_drops", date(2024, 3, 2), 990.0)
        .await
        .unwrap();

    let summaries = repo.list().await.unwrap();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].name, "any");
    assert_eq!(summaries[0].constituent_count, 0);
    assert!(summaries[0].latest.is_none());

    assert_eq!(summaries[1].name, "two_drops");
    assert_eq!(summaries[1].constituent_count, 2);
    let latest = summaries[1].latest.unwrap();
    assert_eq!(latest.date, date(2024, 3, 2));
    assert_eq!(latest.level, 990.0);
}

#[tokio::test]
async fn test_version_marker_round_trip() {
    let (repo, _temp) = setup_repo().await;
    assert!(repo.version_marker().await.unwrap().is_none());

    repo.commit_version_marker("v1", "f1").await.unwrap();
    repo.commit_version_marker("v2", "f2").await.unwrap();

    let marker = repo.version_marker().await.unwrap().unwrap();
    assert_eq!(marker.catalog_version, "v2");
    assert_eq!(marker.criteria_fingerprint, "f2");
}

#[tokio::test]
async fn test_save_benchmark_creates_updates_and_replaces_together() {
    let (repo, _temp) = setup_repo().await;

    let change = repo
        .save_benchmark(&two_drops(), &ids(&["a", "b"]))
        .await
        .unwrap();
    assert_eq!(change, DefinitionChange::Created);
    assert_eq!(repo.constituents("two_drops").await.unwrap(), ids(&["a", "b"]));

    let change = repo.save_benchmark(&two_drops(), &ids(&["a"])).await.unwrap();
    assert_eq!(change, DefinitionChange::Unchanged);
    assert_eq!(repo.constituents("two_drops").await.unwrap(), ids(&["a"]));

    let priced = two_drops().with_weighting(Weighting::Price);
    let change = repo.save_benchmark(&priced, &ids(&["a"])).await.unwrap();
    assert_eq!(change, DefinitionChange::Updated);
    assert_eq!(repo.get("two_drops").await.unwrap().unwrap().definition(), priced);
}

#[tokio::test]
async fn test_concurrent_writers_do_not_hit_lock_errors() {
    let (repo, _temp) = setup_repo().await;
    let repo = Arc::new(repo);

    let mut handles = Vec::new();
    for n in 0..8 {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            let name = format!("bench_{}", n);
            let definition = BenchmarkDefinition::new(name.clone(), CriteriaSet::any());
            for day in 1..=5 {
                let members = ids(&["a", "b", "c"]);
                repo.save_benchmark(&definition, &members).await?;
                repo.append_valuation(
                    &name,
                    date(2024, 3, day),
                    1000.0 + day as f64,
                    &prices(&[("a", 1.0), ("b", 2.0)]),
                )
                .await?;
                repo.record_unvalued(&name, date(2024, 4, day), "no priced constituents")
                    .await?;
            }
            Ok::<_, StoreError>(())
        }));
    }

    for handle in handles {
        assert_ok!(handle.await.unwrap());
    }
    let summaries = repo.list().await.unwrap();
    assert_eq!(summaries.len(), 8);
    assert!(summaries.iter().all(|s| s.constituent_count == 3));
}
