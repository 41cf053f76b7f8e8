// Application configuration wrapper
// Read once at startup; the core never touches it again at runtime

use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment};

use ravenhost_common::{RavenHostError, Result};

/// Application configuration wrapper
///
/// Provides typed access to configuration values for the volume, node, and
/// cluster services. Values come from `conf/ravenhost.toml` with
/// `ravenhost.*` environment overrides; every getter carries a default so a
/// bare environment still boots.
#[derive(Clone, Debug)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    /// Load configuration from the config file and environment.
    pub fn new() -> Result<Self> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("ravenhost")
                    .separator(".")
                    .try_parsing(true),
            )
            .add_source(config::File::with_name("conf/ravenhost").required(false))
            .build()
            .map_err(|e| RavenHostError::Config(e.to_string()))?;

        Ok(Self { config })
    }

    /// Create a configuration from an already-built Config instance
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Port of the client-facing service endpoint
    pub fn service_port(&self) -> Result<u16> {
        Self::port_value(
            self.config.get_int("ravenhost.server.port").unwrap_or(8080),
            "ravenhost.server.port",
        )
    }

    /// Port advertised for peer-to-peer replication traffic
    pub fn replication_port(&self) -> Result<u16> {
        Self::port_value(
            self.config
                .get_int("ravenhost.server.replication-port")
                .unwrap_or(8081),
            "ravenhost.server.replication-port",
        )
    }

    fn port_value(raw: i64, key: &str) -> Result<u16> {
        raw.try_into()
            .map_err(|_| RavenHostError::Config(format!("{} out of range: {}", key, raw)))
    }

    /// Address the front end binds to
    pub fn bind_address(&self) -> String {
        self.config
            .get_string("ravenhost.server.bind-address")
            .unwrap_or_else(|_| "0.0.0.0".to_string())
    }

    /// Explicit member identity override; defaults to the local service address
    pub fn member_id(&self) -> Option<String> {
        self.config.get_string("ravenhost.member.id").ok()
    }

    /// Name of the backing volume container
    pub fn container_name(&self) -> String {
        self.config
            .get_string("ravenhost.volume.container")
            .unwrap_or_else(|_| "raven".to_string())
    }

    /// Root directory the local volume service keeps its containers under
    pub fn volume_root(&self) -> PathBuf {
        PathBuf::from(
            self.config
                .get_string("ravenhost.volume.root")
                .unwrap_or_else(|_| "data/volumes".to_string()),
        )
    }

    /// Local read-cache directory for the mounted volume
    pub fn cache_path(&self) -> PathBuf {
        PathBuf::from(
            self.config
                .get_string("ravenhost.volume.cache-path")
                .unwrap_or_else(|_| "data/cache".to_string()),
        )
    }

    /// Maximum size of the local read cache, in megabytes
    pub fn cache_size_mb(&self) -> Result<u64> {
        let raw = self
            .config
            .get_int("ravenhost.volume.cache-size-mb")
            .unwrap_or(512);
        raw.try_into().map_err(|_| {
            RavenHostError::Config(format!(
                "ravenhost.volume.cache-size-mb out of range: {}",
                raw
            ))
        })
    }

    /// Path of the cluster member list file
    pub fn cluster_conf_path(&self) -> String {
        self.config
            .get_string("ravenhost.cluster.conf")
            .unwrap_or_else(|_| "conf/cluster.conf".to_string())
    }

    /// How often the member list file is re-read
    pub fn membership_refresh_interval(&self) -> Result<Duration> {
        let raw = self
            .config
            .get_int("ravenhost.cluster.refresh-interval-secs")
            .unwrap_or(10);
        let secs: u64 = raw.try_into().map_err(|_| {
            RavenHostError::Config(format!(
                "ravenhost.cluster.refresh-interval-secs out of range: {}",
                raw
            ))
        })?;
        Ok(Duration::from_secs(secs))
    }

    /// Directory log files are written to
    pub fn log_dir(&self) -> String {
        self.config
            .get_string("ravenhost.logs.path")
            .unwrap_or_else(|_| "logs".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Configuration {
        let config = Config::builder()
            .set_default("ravenhost.server.port", 9090)
            .unwrap()
            .set_default("ravenhost.volume.container", "testdrives")
            .unwrap()
            .build()
            .unwrap();
        Configuration::from_config(config)
    }

    #[test]
    fn test_configured_values() {
        let config = test_config();
        assert_eq!(config.service_port().unwrap(), 9090);
        assert_eq!(config.container_name(), "testdrives");
    }

    #[test]
    fn test_defaults() {
        let config = Configuration::from_config(Config::builder().build().unwrap());
        assert_eq!(config.service_port().unwrap(), 8080);
        assert_eq!(config.replication_port().unwrap(), 8081);
        assert_eq!(config.container_name(), "raven");
        assert_eq!(config.cache_size_mb().unwrap(), 512);
        assert_eq!(config.cluster_conf_path(), "conf/cluster.conf");
        assert_eq!(
            config.membership_refresh_interval().unwrap(),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let config = Config::builder()
            .set_default("ravenhost.server.port", 99999)
            .unwrap()
            .set_default("ravenhost.server.replication-port", -1)
            .unwrap()
            .set_default("ravenhost.volume.cache-size-mb", -512)
            .unwrap()
            .set_default("ravenhost.cluster.refresh-interval-secs", -10)
            .unwrap()
            .build()
            .unwrap();
        let config = Configuration::from_config(config);

        assert!(matches!(
            config.service_port(),
            Err(RavenHostError::Config(_))
        ));
        assert!(matches!(
            config.replication_port(),
            Err(RavenHostError::Config(_))
        ));
        assert!(matches!(
            config.cache_size_mb(),
            Err(RavenHostError::Config(_))
        ));
        assert!(matches!(
            config.membership_refresh_interval(),
            Err(RavenHostError::Config(_))
        ));
    }
}
