//! Artefact lifecycle: discover, acquire, release.
//!
//! Acquisition turns an artefact into a readable root: a mounted disk image,
//! an extracted bundle, an empty scratch directory for package payloads, or
//! the installer file itself when the collector queries it directly.

pub mod discovery;
pub mod extraction;
pub mod interrupt;
pub mod mount;
pub mod resource;

use crate::artefact::{Artefact, ArtefactKind};
use crate::command::CommandExecutor;
use crate::error::{Result, VerifyError};
use camino::{Utf8Path, Utf8PathBuf};
use extraction::ArchiveExtractor;
use log::debug;
use resource::{CleanupRegistry, Resource, ResourceGuard};

/// A readable view of an artefact, released when dropped.
#[derive(Debug)]
pub struct Acquired<'a> {
    root: Utf8PathBuf,
    guard: Option<ResourceGuard<'a>>,
}

impl Acquired<'_> {
    /// Where the artefact's content can be read.
    ///
    /// For a disk image this is the mount point; for a bundle tarball or a
    /// Linux package it is a scratch directory; otherwise it is the
    /// installer itself.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Releases the underlying resource now.
    pub fn release(self) {
        if let Some(guard) = self.guard {
            guard.release();
        }
    }
}

/// Acquires `artefact` for inspection.
///
/// # Errors
///
/// Returns [`VerifyError::ExternalTool`] when a disk image cannot be
/// attached, [`VerifyError::Extraction`] when a bundle tarball cannot be
/// unpacked, and [`VerifyError::Io`] when no scratch directory can be
/// created.
pub fn acquire<'a>(
    artefact: &Artefact,
    executor: &'a dyn CommandExecutor,
    registry: &'a CleanupRegistry,
    extractor: &dyn ArchiveExtractor,
) -> Result<Acquired<'a>> {
    match artefact.kind() {
        ArtefactKind::Dmg => {
            let volume = mount::attach(executor, artefact.path())?;
            let root = volume.mount_point.clone();
            let guard =
                ResourceGuard::register(registry, executor, Resource::Mount(volume), root.clone());
            Ok(Acquired {
                root,
                guard: Some(guard),
            })
        }
        ArtefactKind::AppTarball => {
            let guard = scratch(registry, executor)?;
            let root = guard.root().to_owned();
            debug!("extracting {} into {root}", artefact.path());
            extractor
                .extract(artefact.path().as_std_path(), root.as_std_path())
                .map_err(|source| VerifyError::Extraction {
                    path: artefact.path().to_owned(),
                    source,
                })?;
            Ok(Acquired {
                root,
                guard: Some(guard),
            })
        }
        ArtefactKind::Deb | ArtefactKind::Rpm => {
            let guard = scratch(registry, executor)?;
            Ok(Acquired {
                root: guard.root().to_owned(),
                guard: Some(guard),
            })
        }
        ArtefactKind::Msi | ArtefactKind::Exe => Ok(Acquired {
            root: artefact.path().to_owned(),
            guard: None,
        }),
    }
}

fn scratch<'a>(
    registry: &'a CleanupRegistry,
    executor: &'a dyn CommandExecutor,
) -> Result<ResourceGuard<'a>> {
    let dir = tempfile::Builder::new().prefix("shipcheck-").tempdir()?;
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).map_err(|path| {
        VerifyError::Io(std::io::Error::other(format!(
            "scratch directory {} is not valid UTF-8",
            path.display()
        )))
    })?;
    Ok(ResourceGuard::register(
        registry,
        executor,
        Resource::Directory(dir),
        root,
    ))
}
