//! Trait contract tests for PluginStore and ScoreStore.
//!
//! Every check runs against the in-memory fakes and the SurrealDB
//! implementations. Any conforming implementation must pass these.

use chrono::{Duration, Utc};
use plugin_health_state::fakes::{MemoryPluginStore, MemoryScoreStore};
use plugin_health_state::{
    Plugin, PluginStore, ProbeResult, ProbeStatus, Score, ScoreResult, ScoreStore,
    SurrealPluginStore, SurrealScoreStore,
};

fn plugin(name: &str) -> Plugin {
    Plugin::new(
        name,
        "1.0",
        Some(format!("https://github.com/jenkinsci/{name}-plugin")),
        Some(Utc::now() - Duration::days(30)),
    )
}

fn score(plugin: &str, age_days: i64, value: f32) -> Score {
    Score::new(
        plugin,
        Utc::now() - Duration::days(age_days),
        [ScoreResult::new("deprecation", value, 0.8, vec![], 1).unwrap()],
    )
}

// ===========================================================================
// PluginStore contract
// ===========================================================================

async fn plugin_save_and_find(store: &dyn PluginStore) {
    let p = plugin("mailer").merge(ProbeResult::success("scm", "The plugin SCM link is valid.", 1));
    store.save_plugin(&p).await.unwrap();

    let found = store.find_plugin("mailer").await.unwrap().unwrap();
    assert_eq!(found.name, "mailer");
    assert_eq!(found.scm, p.scm);
    assert_eq!(
        found.release_timestamp.map(|t| t.timestamp()),
        p.release_timestamp.map(|t| t.timestamp())
    );
    let record = found.record("scm").unwrap();
    assert_eq!(record.status, ProbeStatus::Success);
    assert_eq!(record.message, "The plugin SCM link is valid.");
    assert_eq!(record.timestamp, p.record("scm").unwrap().timestamp);
}

async fn plugin_find_missing(store: &dyn PluginStore) {
    assert!(store.find_plugin("nope").await.unwrap().is_none());
}

async fn plugin_save_replaces(store: &dyn PluginStore) {
    let first = plugin("git");
    store.save_plugin(&first).await.unwrap();

    let second = first.merge(ProbeResult::success("jenkinsfile", "Jenkinsfile found", 1));
    store.save_plugin(&second).await.unwrap();

    let all = store.list_plugins().await.unwrap();
    let gits: Vec<_> = all.iter().filter(|p| p.name == "git").collect();
    assert_eq!(gits.len(), 1);
    assert!(gits[0].record("jenkinsfile").is_some());
}

async fn plugin_list_sorted(store: &dyn PluginStore) {
    for name in ["zeta", "alpha", "mid"] {
        store.save_plugin(&plugin(name)).await.unwrap();
    }
    let names: Vec<String> = store
        .list_plugins()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["alpha", "mid", "zeta"]);
}

#[tokio::test]
async fn memory_plugin_store_contract() {
    plugin_save_and_find(&MemoryPluginStore::new()).await;
    plugin_find_missing(&MemoryPluginStore::new()).await;
    plugin_save_replaces(&MemoryPluginStore::new()).await;
    plugin_list_sorted(&MemoryPluginStore::new()).await;
}

#[tokio::test]
async fn surreal_plugin_store_contract() {
    plugin_save_and_find(&SurrealPluginStore::in_memory().await.unwrap()).await;
    plugin_find_missing(&SurrealPluginStore::in_memory().await.unwrap()).await;
    plugin_save_replaces(&SurrealPluginStore::in_memory().await.unwrap()).await;
    plugin_list_sorted(&SurrealPluginStore::in_memory().await.unwrap()).await;
}

// ===========================================================================
// ScoreStore contract
// ===========================================================================

async fn score_latest_is_newest(store: &dyn ScoreStore) {
    let old = score("mailer", 5, 0.0);
    let new = score("mailer", 1, 100.0);
    store.save_score(&new).await.unwrap();
    store.save_score(&old).await.unwrap();

    let latest = store.latest_score("mailer").await.unwrap().unwrap();
    assert_eq!(latest.id(), new.id());
    assert_eq!(latest.value(), 100);
    assert_eq!(latest.result("deprecation").map(|r| r.weight()), Some(0.8));
}

async fn score_latest_missing(store: &dyn ScoreStore) {
    assert!(store.latest_score("mailer").await.unwrap().is_none());
    assert!(store.latest_scores().await.unwrap().is_empty());
}

async fn score_history_newest_first(store: &dyn ScoreStore) {
    let scores = [score("git", 3, 10.0), score("git", 1, 30.0), score("git", 2, 20.0)];
    for s in &scores {
        store.save_score(s).await.unwrap();
    }
    let values: Vec<u8> = store
        .score_history("git")
        .await
        .unwrap()
        .iter()
        .map(|s| s.value())
        .collect();
    assert_eq!(values, vec![30, 20, 10]);
}

async fn score_latest_per_plugin(store: &dyn ScoreStore) {
    store.save_score(&score("b", 2, 10.0)).await.unwrap();
    store.save_score(&score("b", 1, 20.0)).await.unwrap();
    store.save_score(&score("a", 1, 50.0)).await.unwrap();

    let latest = store.latest_scores().await.unwrap();
    let pairs: Vec<(String, u8)> = latest
        .iter()
        .map(|s| (s.plugin().to_string(), s.value()))
        .collect();
    assert_eq!(pairs, vec![("a".to_string(), 50), ("b".to_string(), 20)]);
}

#[tokio::test]
async fn memory_score_store_contract() {
    score_latest_is_newest(&MemoryScoreStore::new()).await;
    score_latest_missing(&MemoryScoreStore::new()).await;
    score_history_newest_first(&MemoryScoreStore::new()).await;
    score_latest_per_plugin(&MemoryScoreStore::new()).await;
}

#[tokio::test]
async fn surreal_score_store_contract() {
    score_latest_is_newest(&SurrealScoreStore::in_memory().await.unwrap()).await;
    score_latest_missing(&SurrealScoreStore::in_memory().await.unwrap()).await;
    score_history_newest_first(&SurrealScoreStore::in_memory().await.unwrap()).await;
    score_latest_per_plugin(&SurrealScoreStore::in_memory().await.unwrap()).await;
}

#[tokio::test]
async fn memory_score_store_counts_saves() {
    let store = MemoryScoreStore::new();
    store.save_score(&score("a", 1, 1.0)).await.unwrap();
    store.save_score(&score("b", 1, 1.0)).await.unwrap();
    assert_eq!(store.saved_count(), 2);
}
