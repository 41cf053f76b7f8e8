// Cluster membership seam
// Change events, the membership service contract, and the file-based lookup

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use ravenhost_api::model::{ClusterMember, ClusterMemberBuilder, REPLICATION_ENDPOINT};
use ravenhost_common::Result;

use crate::model::Configuration;

/// Type of membership event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MembershipChangeType {
    /// A new member joined the cluster
    MemberJoin,
    /// A member left the cluster
    MemberLeave,
    /// Periodic liveness probe from the membership source
    StatusCheck,
}

impl std::fmt::Display for MembershipChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MembershipChangeType::MemberJoin => write!(f, "MEMBER_JOIN"),
            MembershipChangeType::MemberLeave => write!(f, "MEMBER_LEAVE"),
            MembershipChangeType::StatusCheck => write!(f, "STATUS_CHECK"),
        }
    }
}

/// Membership event delivered to subscribers
#[derive(Clone, Debug)]
pub struct MembershipEvent {
    pub change_type: MembershipChangeType,
    /// The affected member; `None` for status checks
    pub member: Option<ClusterMember>,
    pub timestamp: i64,
}

impl MembershipEvent {
    pub fn member_join(member: ClusterMember) -> Self {
        Self {
            change_type: MembershipChangeType::MemberJoin,
            member: Some(member),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn member_leave(member: ClusterMember) -> Self {
        Self {
            change_type: MembershipChangeType::MemberLeave,
            member: Some(member),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn status_check() -> Self {
        Self {
            change_type: MembershipChangeType::StatusCheck,
            member: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Whether this event can change the replication topology.
    pub fn affects_topology(&self) -> bool {
        matches!(
            self.change_type,
            MembershipChangeType::MemberJoin | MembershipChangeType::MemberLeave
        )
    }
}

/// Broadcasts membership events to subscribers. One subscriber (the boot
/// loop) consumes events to completion, so handlers never overlap.
pub struct MembershipEventPublisher {
    broadcast_tx: broadcast::Sender<MembershipEvent>,
}

impl MembershipEventPublisher {
    pub fn new(queue_size: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(queue_size);
        Self { broadcast_tx }
    }

    pub fn publish(&self, event: MembershipEvent) {
        match event.change_type {
            MembershipChangeType::StatusCheck => debug!("membership status check"),
            _ => {
                let member = event
                    .member
                    .as_ref()
                    .map(|m| m.id.as_str())
                    .unwrap_or("<unknown>");
                info!("membership event: {} for {}", event.change_type, member);
            }
        }
        // No subscribers yet is fine; events before the loop starts are
        // covered by the initial reconcile.
        let _ = self.broadcast_tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MembershipEvent> {
        self.broadcast_tx.subscribe()
    }
}

/// Membership service contract consumed by the boot loop and reconciler.
pub trait MembershipService: Send + Sync {
    /// Current member list, in the order reported by the membership source.
    fn current_members(&self) -> Vec<ClusterMember>;

    /// Identity of the local member.
    fn self_id(&self) -> String;

    fn subscribe(&self) -> broadcast::Receiver<MembershipEvent>;
}

const EVENT_QUEUE_SIZE: usize = 256;

/// File-based membership service.
///
/// Reads cluster members from a `cluster.conf`-style file, one member per
/// line as `address:port` with an optional `?replication_port=NNNN` suffix,
/// and polls the file on an interval, publishing join/leave events for
/// every difference and a status check each cycle.
pub struct FileMembershipService {
    conf_path: String,
    default_port: u16,
    refresh_interval: Duration,
    self_member: ClusterMember,
    members: Arc<RwLock<Vec<ClusterMember>>>,
    publisher: Arc<MembershipEventPublisher>,
    running: Arc<AtomicBool>,
}

impl FileMembershipService {
    pub fn new(config: &Configuration, self_member: ClusterMember) -> Result<Self> {
        Ok(Self {
            conf_path: config.cluster_conf_path(),
            default_port: config.service_port()?,
            refresh_interval: config.membership_refresh_interval()?,
            self_member,
            members: Arc::new(RwLock::new(Vec::new())),
            publisher: Arc::new(MembershipEventPublisher::new(EVENT_QUEUE_SIZE)),
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Parse one member line.
    /// Format: `address:port?replication_port=NNNN`, or bare `address`
    /// (default port). Lines without a replication_port parameter produce a
    /// member with no replication endpoint.
    fn parse_member(line: &str, default_port: u16) -> Option<ClusterMember> {
        let parts: Vec<&str> = line.split('?').collect();
        let addr_part = parts.first()?;

        let (address, port) = if addr_part.contains(':') {
            let addr_parts: Vec<&str> = addr_part.split(':').collect();
            if addr_parts.len() != 2 {
                return None;
            }
            let port = addr_parts[1].parse::<u16>().ok()?;
            (addr_parts[0].to_string(), port)
        } else {
            (addr_part.to_string(), default_port)
        };

        let id = format!("{}:{}", address, port);
        let mut builder = ClusterMemberBuilder::new(id).endpoint(
            ravenhost_api::model::SERVICE_ENDPOINT,
            address.clone(),
            port,
        );

        if parts.len() > 1 {
            for param in parts[1].split('&') {
                let kv: Vec<&str> = param.split('=').collect();
                if kv.len() == 2 && kv[0].trim() == "replication_port" {
                    if let Ok(replication_port) = kv[1].trim().parse::<u16>() {
                        builder =
                            builder.endpoint(REPLICATION_ENDPOINT, address.clone(), replication_port);
                    }
                }
            }
        }

        Some(builder.build())
    }

    /// Read the member file, skipping blank lines and comments.
    fn read_conf(path: &str) -> Vec<String> {
        let path = Path::new(path);
        if !path.exists() {
            warn!("cluster config file not found: {}", path.display());
            return vec![];
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                error!("failed to open cluster config file: {}", e);
                return vec![];
            }
        };

        let reader = BufReader::new(file);
        reader
            .lines()
            .map_while(|line| line.ok())
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .collect()
    }

    /// Load the current snapshot from the file, guaranteeing the local
    /// member is present.
    fn load_snapshot(
        conf_path: &str,
        self_member: &ClusterMember,
        default_port: u16,
    ) -> Vec<ClusterMember> {
        let mut members: Vec<ClusterMember> = Self::read_conf(conf_path)
            .iter()
            .filter_map(|line| Self::parse_member(line, default_port))
            .collect();

        if !members.iter().any(|m| m.id == self_member.id) {
            members.insert(0, self_member.clone());
        }

        members
    }

    /// Replace the stored member list with `snapshot`, publishing join/leave
    /// events for every difference. Snapshot order is preserved so that
    /// downstream reconciliation is deterministic.
    fn apply_snapshot(
        members: &RwLock<Vec<ClusterMember>>,
        publisher: &MembershipEventPublisher,
        snapshot: Vec<ClusterMember>,
    ) {
        let previous = {
            let mut guard = members.write().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *guard, snapshot.clone())
        };

        for member in &snapshot {
            if !previous.iter().any(|m| m.id == member.id) {
                publisher.publish(MembershipEvent::member_join(member.clone()));
            }
        }
        for member in previous {
            if !snapshot.iter().any(|m| m.id == member.id) {
                publisher.publish(MembershipEvent::member_leave(member));
            }
        }
    }

    /// Load the initial member list and start the background refresh task.
    pub async fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        info!("starting file-based membership service: {}", self.conf_path);

        let initial = Self::load_snapshot(&self.conf_path, &self.self_member, self.default_port);
        info!("loaded {} cluster members", initial.len());
        *self.members.write().unwrap_or_else(|e| e.into_inner()) = initial;

        let members = self.members.clone();
        let publisher = self.publisher.clone();
        let running = self.running.clone();
        let conf_path = self.conf_path.clone();
        let self_member = self.self_member.clone();
        let default_port = self.default_port;
        let interval = self.refresh_interval;

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }

                let snapshot = Self::load_snapshot(&conf_path, &self_member, default_port);
                Self::apply_snapshot(&members, &publisher, snapshot);
                publisher.publish(MembershipEvent::status_check());
            }
            debug!("membership refresh task stopped");
        });

        Ok(())
    }

    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        info!("stopped file-based membership service");
    }
}

impl MembershipService for FileMembershipService {
    fn current_members(&self) -> Vec<ClusterMember> {
        self.members
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn self_id(&self) -> String {
        self.self_member.id.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<MembershipEvent> {
        self.publisher.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use ravenhost_api::model::SERVICE_ENDPOINT;

    #[test]
    fn test_parse_member_with_replication_port() {
        let member =
            FileMembershipService::parse_member("192.168.1.1:8080?replication_port=9090", 8080)
                .unwrap();
        assert_eq!(member.id, "192.168.1.1:8080");
        assert_eq!(member.endpoint(SERVICE_ENDPOINT).unwrap().port, 8080);
        assert_eq!(member.replication_endpoint().unwrap().port, 9090);
    }

    #[test]
    fn test_parse_member_without_replication_port() {
        let member = FileMembershipService::parse_member("192.168.1.1:8080", 8080).unwrap();
        assert_eq!(member.id, "192.168.1.1:8080");
        assert!(member.replication_endpoint().is_none());
    }

    #[test]
    fn test_parse_member_default_port() {
        let member = FileMembershipService::parse_member("192.168.1.1", 8848).unwrap();
        assert_eq!(member.id, "192.168.1.1:8848");
    }

    #[test]
    fn test_parse_member_invalid() {
        assert!(FileMembershipService::parse_member("1:2:3", 8080).is_none());
        assert!(FileMembershipService::parse_member("host:notaport", 8080).is_none());
    }

    #[test]
    fn test_read_conf_skips_comments_and_blanks() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "10.0.0.1:8080").unwrap();
        writeln!(file, "  10.0.0.2:8080?replication_port=9090  ").unwrap();

        let lines = FileMembershipService::read_conf(file.path().to_str().unwrap());
        assert_eq!(
            lines,
            vec![
                "10.0.0.1:8080".to_string(),
                "10.0.0.2:8080?replication_port=9090".to_string()
            ]
        );
    }

    #[test]
    fn test_load_snapshot_inserts_self() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "10.0.0.2:8080").unwrap();

        let self_member = ClusterMemberBuilder::new("10.0.0.1:8080")
            .endpoint(SERVICE_ENDPOINT, "10.0.0.1", 8080)
            .build();

        let members = FileMembershipService::load_snapshot(
            file.path().to_str().unwrap(),
            &self_member,
            8080,
        );

        assert_eq!(members.len(), 2);
        assert_eq!(members[0].id, "10.0.0.1:8080");
        assert_eq!(members[1].id, "10.0.0.2:8080");
    }

    #[test]
    fn test_apply_snapshot_publishes_join_and_leave() {
        let members = RwLock::new(vec![
            FileMembershipService::parse_member("10.0.0.1:8080", 8080).unwrap(),
            FileMembershipService::parse_member("10.0.0.2:8080", 8080).unwrap(),
        ]);
        let publisher = MembershipEventPublisher::new(16);
        let mut receiver = publisher.subscribe();

        // 10.0.0.2 leaves, 10.0.0.3 joins.
        let snapshot = vec![
            FileMembershipService::parse_member("10.0.0.1:8080", 8080).unwrap(),
            FileMembershipService::parse_member("10.0.0.3:8080", 8080).unwrap(),
        ];
        FileMembershipService::apply_snapshot(&members, &publisher, snapshot);

        let first = receiver.try_recv().unwrap();
        assert_eq!(first.change_type, MembershipChangeType::MemberJoin);
        assert_eq!(first.member.unwrap().id, "10.0.0.3:8080");

        let second = receiver.try_recv().unwrap();
        assert_eq!(second.change_type, MembershipChangeType::MemberLeave);
        assert_eq!(second.member.unwrap().id, "10.0.0.2:8080");

        assert!(receiver.try_recv().is_err());

        let stored = members.read().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].id, "10.0.0.3:8080");
    }

    #[test]
    fn test_apply_snapshot_unchanged_publishes_nothing() {
        let snapshot = vec![FileMembershipService::parse_member("10.0.0.1:8080", 8080).unwrap()];
        let members = RwLock::new(snapshot.clone());
        let publisher = MembershipEventPublisher::new(16);
        let mut receiver = publisher.subscribe();

        FileMembershipService::apply_snapshot(&members, &publisher, snapshot);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_event_kinds() {
        let member = FileMembershipService::parse_member("10.0.0.1:8080", 8080).unwrap();

        assert!(MembershipEvent::member_join(member.clone()).affects_topology());
        assert!(MembershipEvent::member_leave(member).affects_topology());
        assert!(!MembershipEvent::status_check().affects_topology());
    }
}
