mod common;

use std::path::Path;
use std::sync::Arc;

use app_sync::app::{write_install_marker, App, InstallMarker};
use app_sync::registry::AppRegistry;
use app_sync::status::StatusAggregator;
use app_sync::supervisor::{ProcessRecord, ProcessSupervisor};
use app_sync::ErrorKind;
use chrono::Utc;
use common::{build_app, options, process, wait_for_update, FakeRepo, FakeSupervisor};
use tokio::sync::Semaphore;

async fn mark_installed(app: &App, commit: &str) {
    std::fs::create_dir_all(app.local_folder()).unwrap();
    let marker = InstallMarker {
        commit: commit.to_string(),
        branch: app.branch().to_string(),
        installed_at: Utc::now(),
    };
    write_install_marker(app.local_folder(), &marker).await.unwrap();
}

struct Fleet {
    aggregator: StatusAggregator,
    supervisor: Arc<FakeSupervisor>,
    apps: Vec<Arc<App>>,
}

/// Apps `ids` on one repository at `head`, all installed at `installed`.
async fn fleet(
    dir: &Path,
    ids: &[&str],
    repo: &Arc<FakeRepo>,
    installed: &str,
    processes: Vec<ProcessRecord>,
) -> Fleet {
    let supervisor = Arc::new(FakeSupervisor::with_processes(processes));
    let mut apps = Vec::new();
    for id in ids {
        let mut opts = options(id, "acme/widgets", "*", dir);
        opts.port = 4000;
        let app = build_app(opts, repo, &supervisor);
        mark_installed(&app, installed).await;
        apps.push(app);
    }

    let registry = Arc::new(AppRegistry::from_apps(apps.clone()).unwrap());
    let dyn_supervisor: Arc<dyn ProcessSupervisor> = supervisor.clone();
    Fleet {
        aggregator: StatusAggregator::new(registry, dyn_supervisor),
        supervisor,
        apps,
    }
}

#[tokio::test]
async fn current_app_reports_status_without_update() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Arc::new(FakeRepo::new("abc", &[("index.js", "")]));
    let fleet = fleet(
        dir.path(),
        &["svc1"],
        &repo,
        "abc",
        vec![process("svc1:0", "online", 52_428_800, 3.0)],
    )
    .await;

    let statuses = fleet.aggregator.list_statuses().await.unwrap();
    assert_eq!(statuses.len(), 1);
    let status = &statuses[0];
    assert_eq!(status.id, "svc1");
    assert_eq!(status.status, "online");
    assert_eq!(status.route, "* ⇨ 4000");
    assert_eq!(status.repository, "widgets:master");
    assert_eq!(status.resources.memory, "52.4 MB");
    assert_eq!(status.resources.cpu, 3.0);
    assert_eq!(status.version.local.as_deref(), Some("abc"));
    assert_eq!(status.version.repository, "abc");

    let json = serde_json::to_value(status).unwrap();
    assert_eq!(
        json["version"],
        serde_json::json!({ "local": "abc", "repository": "abc" })
    );

    assert_eq!(repo.get_calls(), 0);
    assert!(!fleet.apps[0].is_downloading());
}

#[tokio::test]
async fn outdated_app_triggers_exactly_one_update() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Arc::new(FakeRepo::new("def", &[("index.js", "")]));
    let fleet = fleet(
        dir.path(),
        &["svc1"],
        &repo,
        "abc",
        vec![process("svc1:0", "online", 52_428_800, 3.0)],
    )
    .await;

    let statuses = fleet.aggregator.list_statuses().await.unwrap();
    let status = &statuses[0];
    assert_eq!(status.status, "online, updating to vdef");
    assert!(status.version.is_downloading);
    assert_eq!(status.version.repository, "def");
    let json = serde_json::to_value(status).unwrap();
    assert_eq!(json["version"]["isDownloading"], true);

    wait_for_update(&fleet.apps[0]).await;
    assert_eq!(repo.get_calls(), 1);
    assert_eq!(fleet.supervisor.started_names(), vec!["svc1"]);

    // Installed now, so the next pass is quiet.
    let statuses = fleet.aggregator.list_statuses().await.unwrap();
    assert_eq!(statuses[0].status, "online");
    assert_eq!(statuses[0].version.local.as_deref(), Some("def"));
    assert_eq!(repo.get_calls(), 1);
}

#[tokio::test]
async fn concurrent_pass_during_update_does_not_trigger_another() {
    let dir = tempfile::tempdir().unwrap();
    let gate = Arc::new(Semaphore::new(0));
    let repo = Arc::new(
        FakeRepo::new("0123456789abcdef0123456789abcdef01234567", &[("index.js", "")]).gated(Arc::clone(&gate)),
    );
    let fleet = fleet(
        dir.path(),
        &["svc1"],
        &repo,
        "abc",
        vec![process("svc1:0", "online", 1024, 0.5)],
    )
    .await;

    let (first, second) = tokio::join!(
        fleet.aggregator.list_statuses(),
        fleet.aggregator.list_statuses()
    );
    let third = fleet.aggregator.list_statuses().await.unwrap();
    for statuses in [first.unwrap(), second.unwrap(), third] {
        assert_eq!(
            statuses[0].status,
            "online, updating to v0123456789abcdef0123456789abcdef01234567"
        );
        assert_eq!(
            statuses[0].version.repository,
            "0123456789abcdef0123456789abcdef01234567"
        );
        assert!(statuses[0].version.is_downloading);
    }

    gate.add_permits(1);
    wait_for_update(&fleet.apps[0]).await;
    assert_eq!(repo.get_calls(), 1);
    assert_eq!(fleet.supervisor.started_names().len(), 1);
}

#[tokio::test]
async fn output_is_sorted_and_deduplicated_for_any_process_order() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Arc::new(FakeRepo::new("abc", &[]));
    let records = [
        process("beta:0", "online", 10, 0.0),
        process("alpha:0", "online", 20, 0.0),
        process("beta:1", "errored", 30, 0.0),
        process("gamma", "stopped", 40, 0.0),
        process("alpha:1", "online", 50, 0.0),
    ];

    let orders: [[usize; 5]; 4] = [
        [0, 1, 2, 3, 4],
        [4, 3, 2, 1, 0],
        [2, 0, 4, 1, 3],
        [3, 4, 1, 2, 0],
    ];
    for order in orders {
        let processes: Vec<ProcessRecord> = order.iter().map(|i| records[*i].clone()).collect();
        let first_beta = processes
            .iter()
            .find(|p| p.name.starts_with("beta"))
            .map(|p| p.status.clone())
            .unwrap();
        let fleet = fleet(
            dir.path(),
            &["gamma", "alpha", "beta"],
            &repo,
            "abc",
            processes,
        )
        .await;

        let statuses = fleet.aggregator.list_statuses().await.unwrap();
        let ids: Vec<&str> = statuses.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "beta", "gamma"]);

        let beta = statuses.iter().find(|s| s.id == "beta").unwrap();
        assert_eq!(beta.status, first_beta);
    }
}

#[tokio::test]
async fn processes_of_unknown_apps_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Arc::new(FakeRepo::new("abc", &[]));
    let fleet = fleet(
        dir.path(),
        &["svc1"],
        &repo,
        "abc",
        vec![
            process("stranger:0", "online", 1, 0.0),
            process("svc1:0", "online", 1, 0.0),
            process(":0", "online", 1, 0.0),
        ],
    )
    .await;

    let statuses = fleet.aggregator.list_statuses().await.unwrap();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].id, "svc1");
}

#[tokio::test]
async fn failed_version_inquiry_drops_only_that_record() {
    let dir = tempfile::tempdir().unwrap();
    let healthy = Arc::new(FakeRepo::new("abc", &[]));
    let broken = Arc::new(FakeRepo::unreachable());
    let supervisor = Arc::new(FakeSupervisor::with_processes(vec![
        process("ok:0", "online", 1, 0.0),
        process("down:0", "online", 1, 0.0),
    ]));

    let ok = build_app(options("ok", "acme/widgets", "*", dir.path()), &healthy, &supervisor);
    mark_installed(&ok, "abc").await;
    let down = build_app(options("down", "acme/widgets", "*", dir.path()), &broken, &supervisor);

    let registry = Arc::new(AppRegistry::from_apps(vec![ok, down]).unwrap());
    let dyn_supervisor: Arc<dyn ProcessSupervisor> = supervisor.clone();
    let aggregator = StatusAggregator::new(registry, dyn_supervisor);

    let statuses = aggregator.list_statuses().await.unwrap();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].id, "ok");

    let err = aggregator.get_status("down").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::VersionInquiry);
}

#[tokio::test]
async fn failing_process_listing_fails_the_call() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Arc::new(FakeRepo::new("abc", &[]));
    let supervisor = Arc::new(FakeSupervisor::broken());
    let app = build_app(options("svc1", "acme/widgets", "*", dir.path()), &repo, &supervisor);
    let registry = Arc::new(AppRegistry::from_apps(vec![app]).unwrap());
    let dyn_supervisor: Arc<dyn ProcessSupervisor> = supervisor.clone();
    let aggregator = StatusAggregator::new(registry, dyn_supervisor);

    let err = aggregator.list_statuses().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SupervisorUnavailable);
}

#[tokio::test]
async fn single_status_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Arc::new(FakeRepo::new("abc", &[]));
    let fleet = fleet(
        dir.path(),
        &["svc1", "idle"],
        &repo,
        "abc",
        vec![
            process("svc1:0", "online", 2048, 1.5),
            process("svc1:1", "errored", 0, 0.0),
        ],
    )
    .await;

    let status = fleet.aggregator.get_status("svc1").await.unwrap();
    assert_eq!(status.id, "svc1");
    assert_eq!(status.status, "online");
    assert_eq!(status.resources.memory, "2.05 kB");

    let err = fleet.aggregator.get_status("nope").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AppNotFound);

    let err = fleet.aggregator.get_status("idle").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Process);
}

#[tokio::test]
async fn duplicate_app_ids_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Arc::new(FakeRepo::new("abc", &[]));
    let supervisor = Arc::new(FakeSupervisor::default());
    let a = build_app(options("svc1", "acme/widgets", "*", dir.path()), &repo, &supervisor);
    let b = build_app(options("svc1", "acme/other", "*/b", dir.path()), &repo, &supervisor);

    let err = AppRegistry::from_apps(vec![a, b]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}
