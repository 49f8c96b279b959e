//! Tests for GenealogyService over JSON and in-memory snapshot stores

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use genealogy::application::services::GenealogyService;
use genealogy::application::{ApplicationError, ApplicationResult};
use genealogy::config::Settings;
use genealogy::domain::{
    DomainError, NewDistributor, Rank, RankLadder, Snapshot, Status, TreeOptions,
};
use genealogy::infrastructure::di::ServiceContainer;
use genealogy::infrastructure::traits::{EnvironmentEditor, RealFileSystem, SnapshotStore};
use genealogy::infrastructure::{JsonSnapshotStore, MemorySnapshotStore};
use genealogy::util::testing;

/// Store that loads from memory but refuses every save.
struct ReadOnlyStore {
    inner: MemorySnapshotStore,
}

impl SnapshotStore for ReadOnlyStore {
    fn load(&self) -> ApplicationResult<Snapshot> {
        self.inner.load()
    }

    fn save(&self, _snapshot: &Snapshot) -> ApplicationResult<()> {
        Err(ApplicationError::OperationFailed {
            context: "save snapshot".to_string(),
            source: "store is read-only".into(),
        })
    }

    fn location(&self) -> String {
        "read-only".to_string()
    }
}

const NETWORK: &str = "tests/resources/snapshots/network.json";
const CYCLE: &str = "tests/resources/snapshots/cycle.json";

/// Copy a fixture into a temp dir so tests can write to it.
fn snapshot_copy(fixture: &str) -> (TempDir, PathBuf) {
    testing::init_test_setup();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");
    fs::copy(fixture, &path).unwrap();
    (dir, path)
}

fn json_store(path: &Path) -> Arc<JsonSnapshotStore> {
    Arc::new(JsonSnapshotStore::new(Arc::new(RealFileSystem), path))
}

fn loaded_service(path: &Path) -> GenealogyService {
    let mut service = GenealogyService::new(
        json_store(path),
        RankLadder::default(),
        TreeOptions::default(),
    );
    service.refresh().expect("refresh");
    service
}

// ============================================================
// Loading
// ============================================================

#[test]
fn given_json_snapshot_when_refreshing_then_builds_tree() {
    let (_dir, path) = snapshot_copy(NETWORK);
    let mut service = GenealogyService::new(
        json_store(&path),
        RankLadder::default(),
        TreeOptions::default(),
    );

    let summary = service.refresh().unwrap();

    assert!(summary.converged);
    assert_eq!(summary.roots, 1);
    assert_eq!(service.tree().len(), 8);
    assert_eq!(service.tree().root().unwrap().id, "A");
}

#[test]
fn given_stored_derived_fields_when_refreshing_then_recomputes_them() {
    let (_dir, path) = snapshot_copy(NETWORK);
    let service = loaded_service(&path);

    let h = service.tree().find_node_by_id("H").unwrap();
    assert_eq!(h.recruits, 0);
    assert_eq!(h.rank, Rank::LOWEST);
}

#[test]
fn given_missing_file_when_refreshing_then_snapshot_not_found() {
    testing::init_test_setup();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.json");
    let mut service = GenealogyService::new(
        json_store(&path),
        RankLadder::default(),
        TreeOptions::default(),
    );

    let result = service.refresh();

    assert!(matches!(result, Err(ApplicationError::SnapshotNotFound(p)) if p == path));
}

#[test]
fn given_malformed_json_when_refreshing_then_invalid_snapshot() {
    testing::init_test_setup();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ \"distributors\": [ { \"id\": ").unwrap();
    let mut service = GenealogyService::new(
        json_store(&path),
        RankLadder::default(),
        TreeOptions::default(),
    );

    let err = service.refresh().unwrap_err();

    assert!(matches!(err, ApplicationError::InvalidSnapshot { .. }));
    assert!(err.is_data_error());
}

#[test]
fn given_cyclic_snapshot_when_refreshing_then_integrity_error() {
    let (_dir, path) = snapshot_copy(CYCLE);
    let mut service = GenealogyService::new(
        json_store(&path),
        RankLadder::default(),
        TreeOptions::default(),
    );

    let err = service.refresh().unwrap_err();

    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::CycleDetected(_))
    ));
    assert!(err.is_data_error());
    assert!(service.tree().is_empty());
}

// ============================================================
// Aggregates
// ============================================================

#[test]
fn given_network_when_computing_stats_then_totals_include_customer_purchases() {
    let (_dir, path) = snapshot_copy(NETWORK);
    let service = loaded_service(&path);

    let stats = service.stats();

    assert_eq!(stats.total_distributors, 8);
    assert_eq!(stats.active, 7);
    assert_eq!(stats.inactive, 1);
    assert_eq!(stats.customers, 2);
    assert_eq!(stats.total_volume, 265.0);
    assert_eq!(stats.depth, 3);
    assert_eq!(stats.rank_histogram.len(), 6);
    assert_eq!(stats.rank_histogram[&Rank(0)], 8);
    assert_eq!(stats.rank_histogram[&Rank(5)], 0);
}

#[test]
fn given_network_when_computing_group_volume_then_sums_downline() {
    let (_dir, path) = snapshot_copy(NETWORK);
    let service = loaded_service(&path);

    assert_eq!(service.group_volume("A"), Some(265.0));
    assert_eq!(service.group_volume("B"), Some(150.0));
    assert_eq!(service.group_volume("D"), Some(60.0));
    assert_eq!(service.group_volume("nobody"), None);
}

#[test]
fn given_network_when_computing_all_group_volumes_then_matches_single_lookups() {
    let (_dir, path) = snapshot_copy(NETWORK);
    let service = loaded_service(&path);

    let volumes = service.group_volumes();

    assert_eq!(volumes.len(), 8);
    for (id, volume) in &volumes {
        assert_eq!(Some(*volume), service.group_volume(id), "group volume of {id}");
    }
}

#[test]
fn given_sponsor_lineage_when_walking_chain_then_nearest_first() {
    let (_dir, path) = snapshot_copy(NETWORK);
    let service = loaded_service(&path);

    let chain: Vec<&str> = service
        .sponsor_chain("E")
        .iter()
        .map(|d| d.id.as_str())
        .collect();

    assert_eq!(chain, vec!["D", "B", "A"]);
    assert!(service.sponsor_chain("A").is_empty());
}

#[test]
fn given_network_when_listing_summaries_then_one_row_per_distributor() {
    let (_dir, path) = snapshot_copy(NETWORK);
    let service = loaded_service(&path);

    let rows = service.summaries();

    assert_eq!(rows.len(), 8);
    assert_eq!(rows[0].id, "A");
    assert_eq!(rows[0].group_volume, 265.0);
    assert_eq!(rows[0].rank_name, "Level 0");
    assert_eq!(rows[2].status, Status::Inactive);
}

// ============================================================
// Mutation
// ============================================================

#[test]
fn given_json_store_when_adding_distributor_then_persists_snapshot() {
    let (_dir, path) = snapshot_copy(NETWORK);
    let mut service = loaded_service(&path);

    let id = service
        .add_distributor(
            NewDistributor {
                name: "Ivy".into(),
                personal_volume: 5.0,
                ..NewDistributor::default()
            },
            "C",
        )
        .unwrap();

    let reloaded = loaded_service(&path);
    let ivy = reloaded.tree().find_node_by_id(&id).expect("persisted");
    assert_eq!(ivy.name, "Ivy");
    assert_eq!(ivy.placement_id.as_deref(), Some("C"));
    assert_eq!(reloaded.tree().len(), 9);
    assert!(!path.with_extension("json.tmp").exists());
}

#[test]
fn given_unknown_parent_when_adding_distributor_then_store_unchanged() {
    let (_dir, path) = snapshot_copy(NETWORK);
    let before = fs::read_to_string(&path).unwrap();
    let mut service = loaded_service(&path);

    let result = service.add_distributor(NewDistributor::default(), "nobody");

    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::UnknownDistributor(_)))
    ));
    assert_eq!(fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn given_memory_store_when_applying_snapshot_then_replaces_state() {
    testing::init_test_setup();
    let network: Snapshot =
        serde_json::from_str(&fs::read_to_string(NETWORK).unwrap()).unwrap();
    let store = Arc::new(MemorySnapshotStore::new(network));
    let mut service =
        GenealogyService::new(store.clone(), RankLadder::default(), TreeOptions::default());
    service.refresh().unwrap();
    assert_eq!(service.tree().len(), 8);

    service.apply_snapshot(Snapshot::default()).unwrap();

    assert!(service.tree().is_empty());
    // a pushed snapshot does not write back to the store
    assert_eq!(store.current().distributors.len(), 8);
}

#[test]
fn given_memory_store_when_adding_distributor_then_saves_records() {
    testing::init_test_setup();
    let network: Snapshot =
        serde_json::from_str(&fs::read_to_string(NETWORK).unwrap()).unwrap();
    let store = Arc::new(MemorySnapshotStore::new(network));
    let mut service =
        GenealogyService::new(store.clone(), RankLadder::default(), TreeOptions::default());
    service.refresh().unwrap();

    let id = service
        .add_distributor(NewDistributor::default(), "A")
        .unwrap();

    let saved = store.current();
    assert_eq!(saved.distributors.len(), 9);
    let record = saved.distributors.iter().find(|d| d.id == id).unwrap();
    assert_eq!(record.parent_id.as_deref(), Some("A"));
}

#[test]
fn given_failing_store_when_adding_distributor_then_restores_previous_state() {
    testing::init_test_setup();
    let network: Snapshot =
        serde_json::from_str(&fs::read_to_string(NETWORK).unwrap()).unwrap();
    let store = Arc::new(ReadOnlyStore {
        inner: MemorySnapshotStore::new(network),
    });
    let mut service = GenealogyService::new(store, RankLadder::default(), TreeOptions::default());
    service.refresh().unwrap();

    let result = service.add_distributor(NewDistributor::default(), "A");

    assert!(matches!(
        result,
        Err(ApplicationError::OperationFailed { .. })
    ));
    assert_eq!(service.tree().len(), 8);
    assert_eq!(service.tree().records().distributors.len(), 8);
    assert_eq!(service.tree().find_node_by_id("A").unwrap().recruits, 2);
}

// ============================================================
// Container wiring
// ============================================================

#[test]
fn given_container_with_settings_when_creating_service_then_reads_configured_snapshot() {
    let (_dir, path) = snapshot_copy(NETWORK);
    let settings = Settings {
        snapshot_path: path.clone(),
        ..Settings::default()
    };
    let container = ServiceContainer::new(settings);

    let mut service = container.genealogy_service().unwrap();
    service.refresh().unwrap();

    assert_eq!(container.store.location(), path.display().to_string());
    assert_eq!(service.tree().len(), 8);
}

#[test]
fn given_invalid_ladder_in_settings_when_creating_service_then_config_error() {
    testing::init_test_setup();
    let mut settings = Settings::default();
    settings.ranks.levels.clear();
    let container = ServiceContainer::with_deps(
        settings,
        Arc::new(RealFileSystem),
        Arc::new(MemorySnapshotStore::default()),
        Arc::new(EnvironmentEditor),
    );

    let result = container.genealogy_service();

    assert!(matches!(result, Err(ApplicationError::Config { .. })));
}
