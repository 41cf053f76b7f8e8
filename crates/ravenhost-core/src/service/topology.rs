// Replication topology reconciliation
// Keeps the node's persisted replication configuration consistent with
// current cluster membership

use std::sync::Arc;

use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use ravenhost_api::model::{
    ClusterMember, DEBUG_DOC_KEY, DebugDocument, REPLICATION_DESTINATIONS_KEY,
    ReplicationDestination, ReplicationDocument,
};
use ravenhost_common::{RavenHostError, Result};

use super::endpoint::EndpointResolver;
use super::engine::TransactionInformation;
use super::lifecycle::NodeLifecycleController;

/// Recomputes and republishes the replication destination set from cluster
/// membership.
///
/// Every reconciliation recomputes the full set from the given snapshot and
/// overwrites the persisted entry; there is no diffing, so the persisted
/// state converges to the current truth no matter how many membership
/// changes were missed or coalesced.
pub struct ReplicationTopologyController {
    lifecycle: Arc<NodeLifecycleController>,
    resolver: EndpointResolver,
    // The delete/put/commit replace is only safe under a single writer.
    write_guard: Mutex<()>,
}

impl ReplicationTopologyController {
    pub fn new(lifecycle: Arc<NodeLifecycleController>, resolver: EndpointResolver) -> Self {
        Self {
            lifecycle,
            resolver,
            write_guard: Mutex::new(()),
        }
    }

    /// Recompute the destination set from `members` and persist it through
    /// the running node. Requires a running node; any failure constructing or
    /// committing the write propagates to the caller, which owns retry
    /// policy (in practice: the next membership event).
    pub async fn reconcile(&self, members: &[ClusterMember], self_id: &str) -> Result<()> {
        let _guard = self.write_guard.lock().await;

        let engine = self.lifecycle.engine_handle().await.ok_or_else(|| {
            RavenHostError::IllegalState("cannot reconcile topology: node is not running".into())
        })?;

        if members.len() < 2 {
            // Standalone node: register our own address under the debug key
            // so the instance stays discoverable without peers.
            let endpoint = members
                .iter()
                .find(|m| m.id == self_id)
                .and_then(|m| m.service_endpoint())
                .ok_or_else(|| {
                    RavenHostError::Membership(format!(
                        "local member '{}' has no service endpoint",
                        self_id
                    ))
                })?;

            let document = DebugDocument {
                url: self.resolver.resolve(endpoint),
            };
            info!("standalone cluster, registering self: {}", document.url);

            let txn = TransactionInformation::new();
            engine.put(
                DEBUG_DOC_KEY,
                None,
                serde_json::to_value(&document)?,
                json!({}),
                &txn,
            )?;
            engine.commit(txn.id)?;
            return Ok(());
        }

        let mut destinations = Vec::new();
        for member in members.iter().filter(|m| m.id != self_id) {
            match member.replication_endpoint() {
                Some(endpoint) => destinations.push(ReplicationDestination {
                    url: self.resolver.resolve(endpoint),
                }),
                None => {
                    // Not an error; surface what the member does advertise.
                    warn!("member {} has no replication endpoint, skipping", member.id);
                    for (role, endpoint) in &member.endpoints {
                        info!("member {} endpoint {}: {}", member.id, role, endpoint);
                    }
                }
            }
        }

        let document = ReplicationDocument { destinations };
        debug!(
            "publishing replication destinations: {}",
            serde_json::to_string(&document)?
        );

        let txn = TransactionInformation::new();
        engine.delete(REPLICATION_DESTINATIONS_KEY, None, &txn)?;
        engine.put(
            REPLICATION_DESTINATIONS_KEY,
            None,
            serde_json::to_value(&document)?,
            json!({}),
            &txn,
        )?;
        engine.commit(txn.id)?;

        info!(
            "replication topology updated: {} destinations",
            document.destinations.len()
        );
        Ok(())
    }
}
