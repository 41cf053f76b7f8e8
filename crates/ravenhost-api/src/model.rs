// Data model shared between the membership, lifecycle, and topology services

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Named endpoint role for client-facing traffic.
pub const SERVICE_ENDPOINT: &str = "service";

/// Named endpoint role for peer-to-peer replication traffic.
pub const REPLICATION_ENDPOINT: &str = "replication";

/// Configuration-entry key for the standalone self-registration document.
pub const DEBUG_DOC_KEY: &str = "debug";

/// Configuration-entry key for the replication destination set.
pub const REPLICATION_DESTINATIONS_KEY: &str = "Raven/Replication/Destinations";

/// A network endpoint advertised by a cluster member for a named role.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberEndpoint {
    pub address: String,
    pub port: u16,
}

impl std::fmt::Display for MemberEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// A cluster member as reported by the membership service.
///
/// Membership data is supplied entirely by the external membership service
/// and never mutated by this system. The endpoint map is ordered so that
/// diagnostic output is deterministic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMember {
    /// Opaque member identity
    pub id: String,
    /// Named role ("service", "replication") to network endpoint
    pub endpoints: BTreeMap<String, MemberEndpoint>,
}

impl ClusterMember {
    pub fn endpoint(&self, role: &str) -> Option<&MemberEndpoint> {
        self.endpoints.get(role)
    }

    pub fn service_endpoint(&self) -> Option<&MemberEndpoint> {
        self.endpoint(SERVICE_ENDPOINT)
    }

    pub fn replication_endpoint(&self) -> Option<&MemberEndpoint> {
        self.endpoint(REPLICATION_ENDPOINT)
    }
}

/// Builder pattern for creating ClusterMember instances
pub struct ClusterMemberBuilder {
    id: String,
    endpoints: BTreeMap<String, MemberEndpoint>,
}

impl ClusterMemberBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            endpoints: BTreeMap::new(),
        }
    }

    pub fn endpoint(mut self, role: &str, address: impl Into<String>, port: u16) -> Self {
        self.endpoints.insert(
            role.to_string(),
            MemberEndpoint {
                address: address.into(),
                port,
            },
        );
        self
    }

    pub fn build(self) -> ClusterMember {
        ClusterMember {
            id: self.id,
            endpoints: self.endpoints,
        }
    }
}

/// One replication peer inside the persisted destination document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationDestination {
    #[serde(rename = "Url")]
    pub url: String,
}

/// Persisted value of the "Raven/Replication/Destinations" entry.
///
/// The field names are part of the persisted layout and must not change.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationDocument {
    #[serde(rename = "Destinations")]
    pub destinations: Vec<ReplicationDestination>,
}

/// Persisted value of the "debug" self-registration entry written when the
/// node has no peers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugDocument {
    #[serde(rename = "Url")]
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_builder() {
        let member = ClusterMemberBuilder::new("10.0.0.1:8080")
            .endpoint(SERVICE_ENDPOINT, "10.0.0.1", 8080)
            .endpoint(REPLICATION_ENDPOINT, "10.0.0.1", 8081)
            .build();

        assert_eq!(member.id, "10.0.0.1:8080");
        assert_eq!(member.service_endpoint().unwrap().port, 8080);
        assert_eq!(member.replication_endpoint().unwrap().port, 8081);
        assert!(member.endpoint("metrics").is_none());
    }

    #[test]
    fn test_replication_document_layout() {
        let doc = ReplicationDocument {
            destinations: vec![
                ReplicationDestination {
                    url: "http://10.0.0.2:8080/".to_string(),
                },
                ReplicationDestination {
                    url: "http://10.0.0.3:8080/".to_string(),
                },
            ],
        };

        let json = serde_json::to_string(&doc).unwrap();
        assert_eq!(
            json,
            r#"{"Destinations":[{"Url":"http://10.0.0.2:8080/"},{"Url":"http://10.0.0.3:8080/"}]}"#
        );
    }

    #[test]
    fn test_debug_document_layout() {
        let doc = DebugDocument {
            url: "http://10.0.0.1:8080/".to_string(),
        };

        let json = serde_json::to_string(&doc).unwrap();
        assert_eq!(json, r#"{"Url":"http://10.0.0.1:8080/"}"#);
    }

    #[test]
    fn test_endpoint_display() {
        let endpoint = MemberEndpoint {
            address: "10.0.0.1".to_string(),
            port: 8081,
        };
        assert_eq!(endpoint.to_string(), "10.0.0.1:8081");
    }
}
