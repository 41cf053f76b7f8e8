//! RavenHost Core - Node lifecycle and replication topology
//!
//! This crate provides:
//! - Volume attachment with rollback-safe boot sequencing
//! - Node lifecycle control (storage engine + front end as one unit)
//! - Replication topology reconciliation driven by membership changes
//! - Peer endpoint resolution
//! - Membership service seam with a file-based implementation

pub mod model;
pub mod service;

// Re-export commonly used types
pub use model::Configuration;
pub use service::endpoint::EndpointResolver;
pub use service::lifecycle::{NodeLifecycleController, NodeState};
pub use service::membership::{FileMembershipService, MembershipService};
pub use service::topology::ReplicationTopologyController;
pub use service::volume::{VolumeManager, VolumeManagerConfig};

// Re-export common functions
pub use ravenhost_common::local_ip;
