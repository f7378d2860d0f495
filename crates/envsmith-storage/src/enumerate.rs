//! Drive enumeration port.
//!
//! Platform-specific paths enter the planner only through this port;
//! the core never probes hardware itself.

use crate::models::{DriveInfo, DriveType};

/// Abstract drive enumerator.
pub trait DriveEnumerator: Send + Sync {
    /// List candidate drives. Implementations should not filter; the
    /// analyzer applies suitability rules itself.
    fn list(&self) -> Vec<DriveInfo>;
}

/// Enumerator over a fixed, caller-supplied drive list.
///
/// Used by tests and by configuration-driven deployments where the
/// operator declares the available drives.
#[derive(Debug, Clone, Default)]
pub struct StaticDrives {
    drives: Vec<DriveInfo>,
}

impl StaticDrives {
    /// Wrap a drive list.
    #[must_use]
    pub fn new(drives: Vec<DriveInfo>) -> Self {
        Self { drives }
    }
}

impl DriveEnumerator for StaticDrives {
    fn list(&self) -> Vec<DriveInfo> {
        self.drives.clone()
    }
}

/// A mount point to probe with `statvfs`.
#[cfg(unix)]
#[derive(Debug, Clone)]
pub struct MountSpec {
    /// Filesystem path of the mount.
    pub path: std::path::PathBuf,
    /// Whether this mount holds the operating system.
    pub is_system: bool,
    /// Filesystem name to report.
    pub filesystem: String,
    /// Kind of drive behind the mount.
    pub drive_type: DriveType,
    /// Device path hint (for SSD/NVMe detection).
    pub device: Option<String>,
}

/// Unix enumerator probing declared mount points via `statvfs`.
#[cfg(unix)]
#[derive(Debug, Clone)]
pub struct StatvfsDrives {
    mounts: Vec<MountSpec>,
}

#[cfg(unix)]
impl StatvfsDrives {
    /// Probe the given mounts.
    #[must_use]
    pub fn new(mounts: Vec<MountSpec>) -> Self {
        Self { mounts }
    }

    /// Probe only the root filesystem.
    #[must_use]
    pub fn root_only() -> Self {
        Self::new(vec![MountSpec {
            path: std::path::PathBuf::from("/"),
            is_system: true,
            filesystem: "unknown".to_string(),
            drive_type: DriveType::Fixed,
            device: None,
        }])
    }
}

#[cfg(unix)]
impl DriveEnumerator for StatvfsDrives {
    fn list(&self) -> Vec<DriveInfo> {
        self.mounts
            .iter()
            .filter_map(|mount| {
                let stat = rustix::fs::statvfs(&mount.path).ok()?;
                let block = stat.f_frsize.max(1);
                let total_bytes = stat.f_blocks * block;
                let available_bytes = stat.f_bavail * block;
                let read_only = stat
                    .f_flag
                    .contains(rustix::fs::StatVfsMountFlags::RDONLY);

                Some(DriveInfo {
                    mount: mount.path.display().to_string(),
                    total_bytes,
                    available_bytes,
                    used_bytes: total_bytes.saturating_sub(available_bytes),
                    filesystem: mount.filesystem.clone(),
                    drive_type: mount.drive_type,
                    is_system_drive: mount.is_system,
                    is_read_only: read_only,
                    device: mount.device.clone(),
                    performance_score: 0.0,
                })
            })
            .collect()
    }
}
