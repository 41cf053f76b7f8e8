// Durable volume attachment with a local read cache

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;

use tracing::{debug, info, warn};

use ravenhost_common::{RavenHostError, Result, ensure_trailing_separator};

/// External volume service contract.
pub trait VolumeService: Send + Sync {
    /// Initialize the bounded local read cache.
    fn initialize_cache(&self, path: &Path, size_mb: u64) -> Result<()>;

    /// Ensure the backing container exists.
    fn create_container_if_absent(&self, name: &str) -> Result<()>;

    /// Set the container access policy.
    fn set_public_access(&self, name: &str) -> Result<()>;

    /// Create the backing volume blob. Fails when the volume already exists;
    /// callers treat any failure here as non-fatal.
    fn create_volume(&self, container: &str, blob: &str, size_mb: u64) -> Result<()>;

    /// Attach the volume and return the mount path. With `force`, a stale
    /// lock left by a previous owner is broken.
    fn mount(&self, container: &str, blob: &str, cache_size_mb: u64, force: bool)
    -> Result<PathBuf>;

    /// Detach the volume.
    fn unmount(&self) -> Result<()>;
}

/// Identity and cache sizing of the one volume a node keeps mounted.
#[derive(Clone, Debug)]
pub struct VolumeManagerConfig {
    pub container_name: String,
    pub blob_name: String,
    pub cache_path: PathBuf,
    pub cache_size_mb: u64,
}

/// Sequences volume attachment and best-effort detachment.
///
/// Mount is forced: a stale lock held by a previous owner is broken. That
/// deliberately favors availability of a single owner over strict mutual
/// exclusion and is acceptable only because cluster orchestration runs at
/// most one active instance per volume at a time. This is an assumption,
/// not an enforced invariant.
pub struct VolumeManager {
    service: Arc<dyn VolumeService>,
    config: VolumeManagerConfig,
}

impl VolumeManager {
    pub fn new(service: Arc<dyn VolumeService>, config: VolumeManagerConfig) -> Self {
        Self { service, config }
    }

    /// Attach the volume: cache init, container create-if-absent, access
    /// policy, volume create (non-fatal when it already exists), then forced
    /// mount. Returns a path guaranteed to end with the path separator.
    /// Synchronous and blocking; any failure except the create-volume step
    /// propagates and aborts boot.
    pub fn mount(&self) -> Result<String> {
        let cache_path = self.config.cache_path.clone();
        self.service
            .initialize_cache(&cache_path, self.config.cache_size_mb)?;

        self.service
            .create_container_if_absent(&self.config.container_name)?;
        self.service.set_public_access(&self.config.container_name)?;

        if let Err(e) = self.service.create_volume(
            &self.config.container_name,
            &self.config.blob_name,
            self.config.cache_size_mb,
        ) {
            warn!("volume creation skipped: {}", e);
        }

        let path = self.service.mount(
            &self.config.container_name,
            &self.config.blob_name,
            self.config.cache_size_mb,
            true,
        )?;

        let path = ensure_trailing_separator(&path.to_string_lossy());
        info!("volume mounted at {}", path);
        Ok(path)
    }

    /// Best-effort detach. Never fails shutdown: any error is logged and
    /// reported as `false`.
    pub fn try_unmount(&self) -> bool {
        match self.service.unmount() {
            Ok(()) => {
                info!("volume unmounted");
                true
            }
            Err(e) => {
                warn!("volume unmount failed: {}", e);
                false
            }
        }
    }
}

const LOCK_FILE_NAME: &str = ".volume-lock";

/// Directory-backed volume service for local deployments and tests.
///
/// Containers are directories under a root, volumes are directories inside a
/// container, and ownership is a lock file inside the volume directory. The
/// cache size is advisory; the local backend does not enforce it.
pub struct LocalVolumeService {
    root: PathBuf,
    mounted: Mutex<Option<PathBuf>>,
}

impl LocalVolumeService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            mounted: Mutex::new(None),
        }
    }

    fn volume_dir(&self, container: &str, blob: &str) -> PathBuf {
        self.root.join(container).join(blob)
    }
}

impl VolumeService for LocalVolumeService {
    fn initialize_cache(&self, path: &Path, size_mb: u64) -> Result<()> {
        fs::create_dir_all(path)?;
        debug!(
            "local cache initialized at {} ({} MB)",
            path.display(),
            size_mb
        );
        Ok(())
    }

    fn create_container_if_absent(&self, name: &str) -> Result<()> {
        fs::create_dir_all(self.root.join(name))?;
        Ok(())
    }

    fn set_public_access(&self, name: &str) -> Result<()> {
        // Local directories carry no access policy.
        debug!("container {} access policy unchanged (local backend)", name);
        Ok(())
    }

    fn create_volume(&self, container: &str, blob: &str, _size_mb: u64) -> Result<()> {
        let dir = self.volume_dir(container, blob);
        if dir.exists() {
            return Err(RavenHostError::Volume(format!(
                "volume already exists: {}",
                dir.display()
            )));
        }
        fs::create_dir_all(&dir)?;
        Ok(())
    }

    fn mount(
        &self,
        container: &str,
        blob: &str,
        _cache_size_mb: u64,
        force: bool,
    ) -> Result<PathBuf> {
        let dir = self.volume_dir(container, blob);
        if !dir.exists() {
            return Err(RavenHostError::Volume(format!(
                "volume does not exist: {}",
                dir.display()
            )));
        }

        let lock_path = dir.join(LOCK_FILE_NAME);
        if lock_path.exists() {
            if !force {
                return Err(RavenHostError::Volume(format!(
                    "volume is locked by another owner: {}",
                    dir.display()
                )));
            }
            warn!("breaking stale volume lock: {}", lock_path.display());
            fs::remove_file(&lock_path)?;
        }

        fs::write(&lock_path, std::process::id().to_string())?;
        *self.mounted.lock().unwrap_or_else(|e| e.into_inner()) = Some(lock_path);
        Ok(dir)
    }

    fn unmount(&self) -> Result<()> {
        let lock_path = self
            .mounted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or_else(|| RavenHostError::Volume("no volume is mounted".to_string()))?;

        fs::remove_file(&lock_path)?;
        Ok(())
    }
}
