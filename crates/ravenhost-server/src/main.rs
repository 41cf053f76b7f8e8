//! RavenHost node entry point
//!
//! Boot sequence: configuration -> logging -> volume mount -> node start ->
//! initial topology reconcile -> membership event loop. Shutdown stops the
//! node and best-effort unmounts the volume. Fatal boot errors propagate to
//! the supervisor; the platform restarts the instance.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use ravenhost_api::model::{ClusterMemberBuilder, REPLICATION_ENDPOINT, SERVICE_ENDPOINT};
use ravenhost_core::service::engine::{NodeConfig, RocksEngineFactory};
use ravenhost_core::{
    Configuration, EndpointResolver, FileMembershipService, MembershipService,
    NodeLifecycleController, ReplicationTopologyController, VolumeManager, VolumeManagerConfig,
    local_ip,
};
use ravenhost_core::service::volume::LocalVolumeService;
use ravenhost_server::frontend::HttpFrontEndFactory;
use ravenhost_server::startup;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let configuration = Configuration::new()?;
    let _logging_guard = startup::init_logging(&configuration)?;

    info!("ravenhost starting");

    // Local member identity: explicit override or the local service address.
    let service_port = configuration.service_port()?;
    let replication_port = configuration.replication_port()?;
    let member_id = configuration
        .member_id()
        .unwrap_or_else(|| format!("{}:{}", local_ip(), service_port));
    let self_address = member_id
        .split(':')
        .next()
        .unwrap_or("127.0.0.1")
        .to_string();
    let self_member = ClusterMemberBuilder::new(member_id.clone())
        .endpoint(SERVICE_ENDPOINT, self_address.clone(), service_port)
        .endpoint(REPLICATION_ENDPOINT, self_address, replication_port)
        .build();
    info!("local member: {}", member_id);

    // Attach the durable volume; failure here aborts boot.
    let volume = VolumeManager::new(
        Arc::new(LocalVolumeService::new(configuration.volume_root())),
        VolumeManagerConfig {
            container_name: configuration.container_name(),
            blob_name: format!("{}.vhd", member_id.replace(':', "-")),
            cache_path: configuration.cache_path(),
            cache_size_mb: configuration.cache_size_mb()?,
        },
    );
    let data_directory = volume.mount()?;

    // Start the node on the mounted volume.
    let node_config = NodeConfig {
        data_directory,
        port: service_port,
        bind_address: configuration.bind_address(),
    };
    let lifecycle = Arc::new(NodeLifecycleController::new(
        Arc::new(RocksEngineFactory),
        Arc::new(HttpFrontEndFactory),
    ));
    if let Err(e) = lifecycle.start(&node_config).await {
        volume.try_unmount();
        return Err(e.into());
    }

    // Membership and topology. Subscribe before the refresh task starts so
    // no change event is missed between the initial reconcile and the loop.
    let membership = match FileMembershipService::new(&configuration, self_member) {
        Ok(membership) => membership,
        Err(e) => {
            lifecycle.stop().await;
            volume.try_unmount();
            return Err(e.into());
        }
    };
    let mut events = membership.subscribe();
    if let Err(e) = membership.start().await {
        lifecycle.stop().await;
        volume.try_unmount();
        return Err(e.into());
    }

    let topology = Arc::new(ReplicationTopologyController::new(
        lifecycle.clone(),
        EndpointResolver::new(service_port),
    ));

    if let Err(e) = topology
        .reconcile(&membership.current_members(), &membership.self_id())
        .await
    {
        error!("initial topology reconcile failed: {}", e);
        membership.stop().await;
        lifecycle.stop().await;
        volume.try_unmount();
        return Err(e.into());
    }

    // Event loop: each notification is handled to completion before the next
    // one is read, so reconciliations never overlap. A failed reconcile is
    // logged and retried implicitly on the next membership event.
    let mut shutdown_rx = startup::wait_for_shutdown_signal();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("shutdown signal received");
                break;
            }
            event = events.recv() => match event {
                Ok(event) if event.affects_topology() => {
                    if let Err(e) = topology
                        .reconcile(&membership.current_members(), &membership.self_id())
                        .await
                    {
                        error!("topology reconcile failed: {}", e);
                    }
                }
                Ok(event) => {
                    debug!("membership event: {}", event.change_type);
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    // Full recompute converges regardless of missed events.
                    warn!("missed {} membership events, reconciling from current snapshot", missed);
                    if let Err(e) = topology
                        .reconcile(&membership.current_members(), &membership.self_id())
                        .await
                    {
                        error!("topology reconcile failed: {}", e);
                    }
                }
                Err(broadcast::error::RecvError::Closed) => {
                    warn!("membership event stream closed");
                    break;
                }
            }
        }
    }

    membership.stop().await;
    lifecycle.stop().await;
    if !volume.try_unmount() {
        warn!("volume unmount failed; continuing shutdown");
    }

    info!("ravenhost stopped");
    Ok(())
}
