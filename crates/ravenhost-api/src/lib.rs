//! RavenHost API - Shared data model
//!
//! Cluster member descriptors and the persisted document shapes written by
//! the replication topology reconciler.

pub mod model;

pub use model::{
    ClusterMember, ClusterMemberBuilder, DebugDocument, MemberEndpoint, ReplicationDestination,
    ReplicationDocument,
};
pub use model::{
    DEBUG_DOC_KEY, REPLICATION_DESTINATIONS_KEY, REPLICATION_ENDPOINT, SERVICE_ENDPOINT,
};
