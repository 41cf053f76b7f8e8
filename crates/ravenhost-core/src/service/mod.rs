// Core services for node orchestration and topology reconciliation

pub mod endpoint;
pub mod engine;
pub mod lifecycle;
pub mod membership;
pub mod topology;
pub mod volume;

// Re-export commonly used types
pub use lifecycle::NodeLifecycleController;
pub use topology::ReplicationTopologyController;
