// Peer URL resolution

use ravenhost_api::model::MemberEndpoint;

/// Resolves a member's advertised endpoint into a fully qualified peer URL.
///
/// Pure function over membership data. The port baked into every URL is the
/// LOCAL node's configured service port, not the port the remote member
/// reports for that role; all deployed instances share one service port, so
/// the two coincide in practice.
#[derive(Clone, Debug)]
pub struct EndpointResolver {
    service_port: u16,
}

impl EndpointResolver {
    pub fn new(service_port: u16) -> Self {
        Self { service_port }
    }

    /// Build `http://{address}:{port}/` for the given endpoint.
    pub fn resolve(&self, endpoint: &MemberEndpoint) -> String {
        format!("http://{}:{}/", endpoint.address, self.service_port)
    }
}
