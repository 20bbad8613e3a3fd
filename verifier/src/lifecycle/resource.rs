//! Run-scoped cleanup of mounts and scratch directories.
//!
//! Every acquired resource is registered in a [`CleanupRegistry`] and handed
//! back as a [`ResourceGuard`]. The guard releases its resource when dropped
//! or explicitly; the registry can also be drained from the interrupt
//! handler and at exit. Whichever path gets there first performs the
//! release; the others find nothing left to do.

use super::mount::{MountedVolume, detach};
use crate::command::CommandExecutor;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tempfile::TempDir;

/// Something that must be undone once inspection ends.
#[derive(Debug)]
pub enum Resource {
    /// An attached disk image.
    Mount(MountedVolume),
    /// A scratch directory holding extracted content.
    Directory(TempDir),
}

impl Resource {
    fn release(self, executor: &dyn CommandExecutor) {
        match self {
            Self::Mount(volume) => {
                detach(executor, &volume);
            }
            Self::Directory(dir) => {
                let path = dir.path().display().to_string();
                if let Err(err) = dir.close() {
                    warn!("failed to remove scratch directory {path}: {err}");
                }
            }
        }
    }
}

/// Resources awaiting release, keyed by registration id.
#[derive(Debug, Default)]
pub struct CleanupRegistry {
    pending: Mutex<BTreeMap<u64, Resource>>,
    next_id: AtomicU64,
}

impl CleanupRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `resource` and returns its id.
    pub fn register(&self, resource: Resource) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(id, resource);
        id
    }

    /// Releases the resource registered as `id`.
    ///
    /// Returns `false` when it was already released.
    pub fn release(&self, id: u64, executor: &dyn CommandExecutor) -> bool {
        // Take the resource out before releasing so the lock is not held
        // across external tool calls.
        let taken = self.lock().remove(&id);
        match taken {
            Some(resource) => {
                resource.release(executor);
                true
            }
            None => false,
        }
    }

    /// Releases every pending resource. Returns how many were released.
    pub fn release_all(&self, executor: &dyn CommandExecutor) -> usize {
        let drained = std::mem::take(&mut *self.lock());
        let count = drained.len();
        for resource in drained.into_values() {
            resource.release(executor);
        }
        if count > 0 {
            debug!("released {count} pending resource(s)");
        }
        count
    }

    /// Number of resources not yet released.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<u64, Resource>> {
        // A panic elsewhere must not stop cleanup.
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases one registered resource on drop or on [`ResourceGuard::release`].
pub struct ResourceGuard<'a> {
    registry: &'a CleanupRegistry,
    executor: &'a dyn CommandExecutor,
    id: u64,
    root: Utf8PathBuf,
}

impl<'a> ResourceGuard<'a> {
    /// Registers `resource` and guards it. `root` is where its content can
    /// be read.
    pub fn register(
        registry: &'a CleanupRegistry,
        executor: &'a dyn CommandExecutor,
        resource: Resource,
        root: Utf8PathBuf,
    ) -> Self {
        let id = registry.register(resource);
        Self {
            registry,
            executor,
            id,
            root,
        }
    }

    /// Directory holding the resource's content.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Releases the resource now.
    pub fn release(self) {
        // Drop performs the release.
        drop(self);
    }
}

impl Drop for ResourceGuard<'_> {
    fn drop(&mut self) {
        self.registry.release(self.id, self.executor);
    }
}

impl std::fmt::Debug for ResourceGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceGuard")
            .field("id", &self.id)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ExpectedCall, StubExecutor, success_output};

    fn scratch() -> (Resource, Utf8PathBuf) {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp path");
        (Resource::Directory(dir), path)
    }

    #[test]
    fn release_is_idempotent() {
        let registry = CleanupRegistry::new();
        let executor = StubExecutor::new(Vec::new());
        let (resource, path) = scratch();

        let id = registry.register(resource);
        assert!(path.exists());
        assert!(registry.release(id, &executor));
        assert!(!path.exists());
        assert!(!registry.release(id, &executor));
        assert_eq!(registry.release_all(&executor), 0);
    }

    #[test]
    fn guard_releases_on_drop() {
        let registry = CleanupRegistry::new();
        let executor = StubExecutor::new(Vec::new());
        let (resource, path) = scratch();
        {
            let guard = ResourceGuard::register(&registry, &executor, resource, path.clone());
            assert_eq!(guard.root(), path.as_path());
            assert_eq!(registry.pending(), 1);
        }
        assert_eq!(registry.pending(), 0);
        assert!(!path.exists());
    }

    #[test]
    fn mount_is_detached_exactly_once() {
        let registry = CleanupRegistry::new();
        let executor = StubExecutor::new(vec![ExpectedCall::new(
            "hdiutil",
            &["detach", "/dev/disk4"],
            Ok(success_output()),
        )]);
        let volume = MountedVolume {
            device: "/dev/disk4".to_owned(),
            mount_point: Utf8PathBuf::from("/Volumes/Formula"),
        };

        let guard = ResourceGuard::register(
            &registry,
            &executor,
            Resource::Mount(volume),
            Utf8PathBuf::from("/Volumes/Formula"),
        );
        // An interrupt drains the registry before the guard goes out of scope.
        assert_eq!(registry.release_all(&executor), 1);
        guard.release();

        executor.assert_finished();
    }

    #[test]
    fn release_all_drains_everything() {
        let registry = CleanupRegistry::new();
        let executor = StubExecutor::new(Vec::new());
        let (first, first_path) = scratch();
        let (second, second_path) = scratch();
        registry.register(first);
        registry.register(second);

        assert_eq!(registry.release_all(&executor), 2);
        assert!(!first_path.exists());
        assert!(!second_path.exists());
        assert_eq!(registry.pending(), 0);
    }
}
