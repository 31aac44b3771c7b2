//! Host resource probes used by migration pre-flight checks.

use std::path::Path;
use sysinfo::{Disks, System};
use tracing::debug;

/// Free space on the disk holding `path`, in bytes. Falls back to the
/// largest available disk when no mount point is a prefix of the path.
pub fn free_disk_space(path: &Path) -> u64 {
    let disks = Disks::new_with_refreshed_list();
    let mut best_match: Option<(usize, u64)> = None;
    let mut largest = 0u64;

    for disk in disks.list() {
        let available = disk.available_space();
        largest = largest.max(available);
        let mount = disk.mount_point();
        if path.starts_with(mount) {
            let depth = mount.components().count();
            if best_match.map_or(true, |(d, _)| depth > d) {
                best_match = Some((depth, available));
            }
        }
    }

    let free = best_match.map_or(largest, |(_, a)| a);
    debug!("free disk space for {}: {} bytes", path.display(), free);
    free
}

/// Currently available memory in bytes.
pub fn available_memory() -> u64 {
    let mut system = System::new();
    system.refresh_memory();
    system.available_memory()
}
