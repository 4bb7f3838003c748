//! Integration tests for the harvester
//!
//! These tests run the full orchestrator against a wiremock directory API
//! and check the end-to-end behaviors: dedup across overlapping searches,
//! credential failover, quota-exhaustion suspension, resume from
//! checkpoint, and interrupt safety.

use creator_atlas::checkpoint::{CheckpointStore, RunCheckpoint};
use creator_atlas::config::{
    ApiConfig, CategoryEntry, CityEntry, Config, CredentialEntry, HarvestConfig, OutputConfig,
    QuotaConfig,
};
use creator_atlas::crawler::Orchestrator;
use creator_atlas::AtlasError;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a config pointed at the mock server with one city and the given
/// category terms
fn test_config(base_url: &str, dir: &Path, tokens: &[&str], categories: &[&str]) -> Config {
    Config {
        harvest: HarvestConfig {
            target_count: 100,
            max_results_per_search: 50,
            min_subscribers: 1000,
            max_description_length: 500,
            workers: 1,
            checkpoint_interval: 1,
            published_after: None,
        },
        quota: QuotaConfig {
            daily_budget: 10_000,
            window_hours: 24,
            search_cost: 100,
            detail_cost: 1,
            rate_limit_ms: 1,
            max_retries: 2,
            backoff_base_ms: 10,
        },
        api: ApiConfig {
            base_url: base_url.to_string(),
            timeout_secs: 5,
        },
        output: OutputConfig {
            csv_path: dir.join("channels.csv").display().to_string(),
            checkpoint_path: dir.join("checkpoint.json").display().to_string(),
        },
        credential: tokens
            .iter()
            .enumerate()
            .map(|(i, token)| CredentialEntry {
                id: format!("key-{}", i + 1),
                token: token.to_string(),
            })
            .collect(),
        category: categories
            .iter()
            .map(|term| CategoryEntry {
                term: term.to_string(),
                display: format!("Display {}", term),
                niche: term.to_string(),
                cities: vec![],
            })
            .collect(),
        city: vec![CityEntry {
            name: "Mumbai".to_string(),
            country: "India".to_string(),
        }],
    }
}

fn search_body(ids: &[&str], next_page: Option<&str>) -> serde_json::Value {
    let items: Vec<_> = ids
        .iter()
        .map(|id| json!({"id": id, "title": format!("Channel {}", id)}))
        .collect();
    match next_page {
        Some(token) => json!({"items": items, "next_page": token}),
        None => json!({"items": items}),
    }
}

fn detail_body(id: &str, subscribers: u64, views: u64) -> serde_json::Value {
    json!({
        "id": id,
        "title": format!("Channel {}", id),
        "description": "A test channel",
        "subscribers": subscribers,
        "views": views,
        "videos": 100,
        "created_at": "2015-06-01T00:00:00Z"
    })
}

async fn mount_detail(server: &MockServer, id: &str, subscribers: u64, views: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/channels/{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail_body(id, subscribers, views)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_harvest_with_dedup_and_threshold() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // Two overlapping searches: UC2 appears in both, UC3 is below threshold
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("query", "Mumbai beauty"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(search_body(&["UC1", "UC2", "UC3"], None)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("query", "Mumbai makeup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(&["UC2", "UC4"], None)))
        .mount(&server)
        .await;

    mount_detail(&server, "UC1", 5000, 250).await;
    mount_detail(&server, "UC2", 20_000, 1_000).await;
    mount_detail(&server, "UC3", 50, 10).await; // below min_subscribers
    mount_detail(&server, "UC4", 3000, 150).await;

    let config = test_config(&server.uri(), dir.path(), &["tok-1"], &["beauty", "makeup"]);
    let csv_path = config.output.csv_path.clone();
    let checkpoint_path = config.output.checkpoint_path.clone();

    let orchestrator = Orchestrator::new(config, "hash".to_string(), true).unwrap();
    let summary = orchestrator.run().await.unwrap();

    // UC1, UC2, UC4 accepted; UC3 rejected; UC2 only once
    assert_eq!(summary.accepted, 3);
    assert_eq!(summary.tasks_done, 2);
    assert!(!summary.interrupted);

    let csv = std::fs::read_to_string(&csv_path).unwrap();
    // One row for UC2 despite appearing in both searches; match on the
    // channel_id field, not the substring (the title also contains "UC2")
    assert_eq!(csv.lines().filter(|l| l.starts_with("UC2,")).count(), 1);
    assert!(!csv.contains("UC3"));
    // views/subscribers * 100 = 5% for UC1
    assert!(csv.contains("5.00"));

    let checkpoint = CheckpointStore::new(&checkpoint_path)
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.accepted_count, 3);
    assert!(checkpoint
        .completed_tasks
        .contains(&"beauty::Mumbai".to_string()));
    assert!(checkpoint
        .completed_tasks
        .contains(&"makeup::Mumbai".to_string()));
    // The rejected channel is still marked seen
    assert!(checkpoint.seen_ids.contains(&"UC3".to_string()));
}

#[tokio::test]
async fn test_search_follows_continuation_tokens() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // Page-2 mock first: it is more specific
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("page", "tok-page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(&["UC3"], None)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(search_body(&["UC1", "UC2"], Some("tok-page-2"))),
        )
        .mount(&server)
        .await;

    for id in ["UC1", "UC2", "UC3"] {
        mount_detail(&server, id, 5000, 250).await;
    }

    let mut config = test_config(&server.uri(), dir.path(), &["tok-1"], &["beauty"]);
    config.harvest.max_results_per_search = 3;

    let orchestrator = Orchestrator::new(config, "hash".to_string(), true).unwrap();
    let summary = orchestrator.run().await.unwrap();

    assert_eq!(summary.accepted, 3);
}

#[tokio::test]
async fn test_quota_failover_to_second_credential() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // Credential 1 is out of quota upstream; credential 2 works
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("key", "tok-1"))
        .respond_with(ResponseTemplate::new(403).set_body_json(
            json!({"error": {"reason": "quotaExceeded", "message": "Quota exceeded"}}),
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("key", "tok-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(&["UC1"], None)))
        .mount(&server)
        .await;
    mount_detail(&server, "UC1", 5000, 250).await;

    let config = test_config(&server.uri(), dir.path(), &["tok-1", "tok-2"], &["beauty"]);
    let orchestrator = Orchestrator::new(config, "hash".to_string(), true).unwrap();
    let summary = orchestrator.run().await.unwrap();

    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.tasks_done, 1);
}

#[tokio::test]
async fn test_all_credentials_invalid_is_fatal() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let config = test_config(&server.uri(), dir.path(), &["bad-1", "bad-2"], &["beauty"]);
    let orchestrator = Orchestrator::new(config, "hash".to_string(), true).unwrap();

    match orchestrator.run().await {
        Err(AtlasError::NoUsableCredentials(_)) => {}
        other => panic!("expected NoUsableCredentials, got {:?}", other.map(|s| s.accepted)),
    }
}

#[tokio::test]
async fn test_transient_search_failure_marks_task_failed_after_retry_pass() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = test_config(&server.uri(), dir.path(), &["tok-1"], &["beauty"]);
    let checkpoint_path = config.output.checkpoint_path.clone();

    let orchestrator = Orchestrator::new(config, "hash".to_string(), true).unwrap();
    let summary = orchestrator.run().await.unwrap();

    // The run completes without records; the task is recorded as failed
    assert_eq!(summary.accepted, 0);
    assert_eq!(summary.tasks_failed, 1);

    let checkpoint = CheckpointStore::new(&checkpoint_path)
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.failed_tasks, vec!["beauty::Mumbai".to_string()]);
}

#[tokio::test]
async fn test_resume_does_not_reissue_completed_searches() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // The completed task's search must never be issued again
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("query", "Mumbai beauty"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(&["UC9"], None)))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("query", "Mumbai tech"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(&["UC2"], None)))
        .expect(1)
        .mount(&server)
        .await;
    mount_detail(&server, "UC2", 5000, 250).await;

    let config = test_config(&server.uri(), dir.path(), &["tok-1"], &["beauty", "tech"]);
    let checkpoint_path = config.output.checkpoint_path.clone();

    // Seed a checkpoint from a prior "run"
    let mut prior = RunCheckpoint {
        accepted_count: 1,
        completed_tasks: vec!["beauty::Mumbai".to_string()],
        seen_ids: vec!["UC1".to_string()],
        records: vec![creator_atlas::ChannelRecord {
            channel_id: "UC1".to_string(),
            title: "Channel UC1".to_string(),
            description: String::new(),
            subscriber_count: 5000,
            view_count: 250,
            video_count: 100,
            created_at: "2015-06-01T00:00:00Z".to_string(),
            engagement_rate: 5.0,
            category: "Display beauty".to_string(),
            niche: "beauty".to_string(),
            city: "Mumbai".to_string(),
            country: "India".to_string(),
            source_query: "Mumbai beauty".to_string(),
            collected_at: "2026-01-01T00:00:00Z".to_string(),
        }],
        config_hash: "hash".to_string(),
        ..Default::default()
    };
    CheckpointStore::new(&checkpoint_path)
        .save(&mut prior)
        .unwrap();

    let orchestrator = Orchestrator::new(config, "hash".to_string(), false).unwrap();
    let summary = orchestrator.run().await.unwrap();

    // Prior record restored plus the one new accept
    assert_eq!(summary.accepted, 2);
    assert_eq!(summary.tasks_done, 2);

    let checkpoint = CheckpointStore::new(&checkpoint_path)
        .load()
        .unwrap()
        .unwrap();
    assert!(checkpoint.seen_ids.contains(&"UC1".to_string()));
    assert!(checkpoint.seen_ids.contains(&"UC2".to_string()));
}

#[tokio::test]
async fn test_resume_with_smaller_plan_keeps_prior_completed_tasks() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("query", "Mumbai music"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(&["UC1"], None)))
        .mount(&server)
        .await;
    mount_detail(&server, "UC1", 5000, 250).await;

    // The prior run covered three categories; the new config only has one
    let config = test_config(&server.uri(), dir.path(), &["tok-1"], &["music"]);
    let checkpoint_path = config.output.checkpoint_path.clone();

    let mut prior = RunCheckpoint {
        completed_tasks: vec![
            "beauty::Mumbai".to_string(),
            "tech::Mumbai".to_string(),
            "food::Mumbai".to_string(),
        ],
        config_hash: "old-hash".to_string(),
        ..Default::default()
    };
    CheckpointStore::new(&checkpoint_path)
        .save(&mut prior)
        .unwrap();

    let orchestrator = Orchestrator::new(config, "new-hash".to_string(), false).unwrap();
    let summary = orchestrator.run().await.unwrap();
    assert_eq!(summary.accepted, 1);

    // New progress is persisted and the old plan's completed ids survive
    let checkpoint = CheckpointStore::new(&checkpoint_path)
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.records.len(), 1);
    for id in ["music::Mumbai", "beauty::Mumbai", "tech::Mumbai", "food::Mumbai"] {
        assert!(
            checkpoint.completed_tasks.contains(&id.to_string()),
            "missing completed task {}",
            id
        );
    }
}

#[tokio::test]
async fn test_transient_detail_failure_leaves_channel_unseen() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(&["UC1", "UC2"], None)))
        .mount(&server)
        .await;
    // UC1's detail endpoint is broken; UC2 is fine
    Mock::given(method("GET"))
        .and(path("/channels/UC1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_detail(&server, "UC2", 5000, 250).await;

    let config = test_config(&server.uri(), dir.path(), &["tok-1"], &["beauty"]);
    let checkpoint_path = config.output.checkpoint_path.clone();

    let orchestrator = Orchestrator::new(config, "hash".to_string(), true).unwrap();
    let summary = orchestrator.run().await.unwrap();

    // The broken candidate is skipped without failing the task
    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.tasks_done, 1);

    let checkpoint = CheckpointStore::new(&checkpoint_path)
        .load()
        .unwrap()
        .unwrap();
    assert!(checkpoint.seen_ids.contains(&"UC2".to_string()));
    // A later overlapping search may still retry the fetch
    assert!(!checkpoint.seen_ids.contains(&"UC1".to_string()));
}

#[tokio::test]
async fn test_corrupt_checkpoint_refuses_to_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let config = test_config(&server.uri(), dir.path(), &["tok-1"], &["beauty"]);
    std::fs::write(&config.output.checkpoint_path, "{ definitely not json").unwrap();

    match Orchestrator::new(config, "hash".to_string(), false) {
        Err(AtlasError::Checkpoint(_)) => {}
        Ok(_) => panic!("expected corrupt checkpoint to be fatal"),
        Err(e) => panic!("unexpected error: {}", e),
    }
}

#[tokio::test]
async fn test_global_quota_exhaustion_suspends_instead_of_failing() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(&["UC1"], None)))
        .mount(&server)
        .await;
    mount_detail(&server, "UC1", 5000, 250).await;

    // Budget covers exactly one search (plus its detail); the second task
    // finds every credential drained and must suspend, not error
    let mut config = test_config(&server.uri(), dir.path(), &["tok-1"], &["beauty", "tech"]);
    config.quota.daily_budget = 101;
    let checkpoint_path = config.output.checkpoint_path.clone();

    let orchestrator = Orchestrator::new(config, "hash".to_string(), true).unwrap();
    let shutdown = orchestrator.shutdown_handle();
    let handle = tokio::spawn(orchestrator.run());

    // The run must still be suspended after a generous wait
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!handle.is_finished(), "orchestrator errored instead of suspending");

    // A graceful stop drains the suspension and saves progress
    shutdown.send(true).unwrap();
    let summary = handle.await.unwrap().unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.accepted, 1);

    let checkpoint = CheckpointStore::new(&checkpoint_path)
        .load()
        .unwrap()
        .unwrap();
    assert!(checkpoint
        .completed_tasks
        .contains(&"beauty::Mumbai".to_string()));
    // The suspended task was never completed
    assert!(!checkpoint
        .completed_tasks
        .contains(&"tech::Mumbai".to_string()));
}

#[tokio::test]
async fn test_interrupt_mid_task_keeps_prior_progress() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("query", "Mumbai beauty"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(&["UC1"], None)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("query", "Mumbai tech"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(search_body(&["UC2", "UC3", "UC4", "UC5", "UC6"], None)),
        )
        .mount(&server)
        .await;

    mount_detail(&server, "UC1", 5000, 250).await;
    // Slow detail fetches on the second task give the interrupt a window
    for id in ["UC2", "UC3", "UC4", "UC5", "UC6"] {
        Mock::given(method("GET"))
            .and(path(format!("/channels/{}", id)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(detail_body(id, 5000, 250))
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;
    }

    let config = test_config(&server.uri(), dir.path(), &["tok-1"], &["beauty", "tech"]);
    let checkpoint_path = config.output.checkpoint_path.clone();

    let orchestrator = Orchestrator::new(config, "hash".to_string(), true).unwrap();
    let shutdown = orchestrator.shutdown_handle();
    let handle = tokio::spawn(orchestrator.run());

    // Let the first task finish and the second get partway through
    tokio::time::sleep(Duration::from_millis(700)).await;
    shutdown.send(true).unwrap();
    let summary = handle.await.unwrap().unwrap();

    assert!(summary.interrupted);

    let checkpoint = CheckpointStore::new(&checkpoint_path)
        .load()
        .unwrap()
        .unwrap();
    // Everything completed before the interrupt is in the checkpoint
    assert!(checkpoint
        .completed_tasks
        .contains(&"beauty::Mumbai".to_string()));
    // The interrupted task is not marked done
    assert!(!checkpoint
        .completed_tasks
        .contains(&"tech::Mumbai".to_string()));
    // No partial rows: every persisted record parses back fully formed
    for record in &checkpoint.records {
        assert!(!record.channel_id.is_empty());
        assert!(!record.collected_at.is_empty());
    }
    assert!(checkpoint.accepted_count >= 1);
}
