//! Platform fact collectors.
//!
//! A collector reads one acquired artefact and reports what it declares as
//! [`ObservedFacts`](crate::facts::ObservedFacts). Collectors never judge
//! the facts; the validator does. The signing checks for the artefact run
//! afterwards and add their findings to the [`Inspection`].

pub mod linux;
pub mod macos;
pub mod nsis;
pub mod windows;

use crate::artefact::{Artefact, ArtefactKind};
use crate::command::CommandExecutor;
use crate::error::Result;
use crate::facts::Inspection;
use crate::requirement::RequirementModel;
use crate::signing::{self, SigningEnvironment};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;

/// Everything a collector may consult besides the artefact itself.
#[derive(Clone, Copy)]
pub struct InspectionContext<'a> {
    /// Declared expectations; some collectors only look for what is required.
    pub requirement: &'a RequirementModel,
    /// Runs platform tools.
    pub executor: &'a dyn CommandExecutor,
    /// Which signing checks are enabled.
    pub signing: &'a SigningEnvironment,
}

/// Collects facts from `artefact`, whose content is readable at `root`, and
/// runs its signing checks.
///
/// # Errors
///
/// Returns the first error that prevents collection or an enabled signing
/// check from completing.
pub fn inspect(
    ctx: &InspectionContext<'_>,
    artefact: &Artefact,
    root: &Utf8Path,
) -> Result<Inspection> {
    let (facts, subject): (_, Utf8PathBuf) = match artefact.kind() {
        ArtefactKind::Dmg | ArtefactKind::AppTarball => {
            let app = macos::find_app(root)?;
            (macos::collect(ctx, artefact, &app)?, app)
        }
        ArtefactKind::Msi => (
            windows::collect(ctx.executor, artefact.path())?,
            artefact.path().to_owned(),
        ),
        ArtefactKind::Exe => (
            nsis::collect(ctx.requirement, artefact.path())?,
            artefact.path().to_owned(),
        ),
        ArtefactKind::Deb | ArtefactKind::Rpm => (
            linux::collect(ctx, artefact, root)?,
            artefact.path().to_owned(),
        ),
    };
    debug!("collected facts from {}", artefact.display_name());

    let diagnostics = signing::verify(
        ctx.executor,
        ctx.signing,
        ctx.requirement,
        artefact,
        &subject,
    )?;
    Ok(Inspection { facts, diagnostics })
}
