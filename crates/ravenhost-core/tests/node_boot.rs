// End-to-end boot sequence: mount -> start -> reconcile -> stop -> unmount,
// against the real RocksDB engine and the local volume backend.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use ravenhost_api::model::{
    ClusterMemberBuilder, REPLICATION_DESTINATIONS_KEY, REPLICATION_ENDPOINT, SERVICE_ENDPOINT,
};
use ravenhost_common::Result;
use ravenhost_core::EndpointResolver;
use ravenhost_core::service::engine::{NodeConfig, RocksEngineFactory, StorageEngine};
use ravenhost_core::service::lifecycle::{
    FrontEnd, FrontEndFactory, NodeLifecycleController, NodeState,
};
use ravenhost_core::service::topology::ReplicationTopologyController;
use ravenhost_core::service::volume::{LocalVolumeService, VolumeManager, VolumeManagerConfig};

struct NoopFrontEnd;

#[async_trait]
impl FrontEnd for NoopFrontEnd {
    async fn start(&mut self) -> Result<()> {
        Ok(())
    }

    async fn dispose(&mut self) {}
}

struct NoopFrontEndFactory;

#[async_trait]
impl FrontEndFactory for NoopFrontEndFactory {
    async fn create(
        &self,
        _config: &NodeConfig,
        _engine: Arc<dyn StorageEngine>,
    ) -> Result<Box<dyn FrontEnd>> {
        Ok(Box::new(NoopFrontEnd))
    }
}

#[tokio::test]
async fn boot_reconcile_shutdown_round_trip() {
    let root = tempfile::tempdir().unwrap();

    // Volume attach.
    let volume = VolumeManager::new(
        Arc::new(LocalVolumeService::new(root.path())),
        VolumeManagerConfig {
            container_name: "raven".to_string(),
            blob_name: "node-1.vhd".to_string(),
            cache_path: root.path().join("cache"),
            cache_size_mb: 64,
        },
    );
    let data_directory = volume.mount().unwrap();
    assert!(data_directory.ends_with(std::path::MAIN_SEPARATOR));

    // Node start on the mounted volume.
    let node_config = NodeConfig {
        data_directory,
        port: 8080,
        bind_address: "127.0.0.1".to_string(),
    };
    let lifecycle = Arc::new(NodeLifecycleController::new(
        Arc::new(RocksEngineFactory),
        Arc::new(NoopFrontEndFactory),
    ));
    lifecycle.start(&node_config).await.unwrap();
    assert_eq!(lifecycle.current_state().await, NodeState::Running);

    // Initial reconcile against a three-member snapshot.
    let members = vec![
        ClusterMemberBuilder::new("10.0.0.1:8080")
            .endpoint(SERVICE_ENDPOINT, "10.0.0.1", 8080)
            .endpoint(REPLICATION_ENDPOINT, "10.0.0.1", 8081)
            .build(),
        ClusterMemberBuilder::new("10.0.0.2:8080")
            .endpoint(SERVICE_ENDPOINT, "10.0.0.2", 8080)
            .endpoint(REPLICATION_ENDPOINT, "10.0.0.2", 8081)
            .build(),
        ClusterMemberBuilder::new("10.0.0.3:8080")
            .endpoint(SERVICE_ENDPOINT, "10.0.0.3", 8080)
            .build(),
    ];
    let topology =
        ReplicationTopologyController::new(lifecycle.clone(), EndpointResolver::new(8080));
    topology.reconcile(&members, "10.0.0.1:8080").await.unwrap();

    // The destination set landed on disk, excluding self and the peer
    // without a replication endpoint.
    let engine = lifecycle.engine_handle().await.unwrap();
    let bytes = engine.get(REPLICATION_DESTINATIONS_KEY).unwrap().unwrap();
    let envelope: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(
        envelope["document"]["Destinations"],
        serde_json::json!([{"Url": "http://10.0.0.2:8080/"}])
    );
    drop(engine);

    // Shutdown: stop is idempotent, unmount is best-effort.
    lifecycle.stop().await;
    assert_eq!(lifecycle.current_state().await, NodeState::Stopped);
    lifecycle.stop().await;

    assert!(volume.try_unmount());
    assert!(!volume.try_unmount());
}
