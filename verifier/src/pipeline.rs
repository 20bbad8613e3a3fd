//! Verification run orchestration.
//!
//! Each artefact goes through acquire, collect, validate and release in turn.
//! A failure that ends one artefact's inspection is recorded in its report
//! and the run moves on to the next artefact.

use crate::artefact::Artefact;
use crate::collect::{self, InspectionContext};
use crate::command::CommandExecutor;
use crate::error::{Result, VerifyError};
use crate::lifecycle::{self, extraction::ArchiveExtractor, resource::CleanupRegistry};
use crate::output::write_line;
use crate::requirement::RequirementModel;
use crate::signing::SigningEnvironment;
use crate::validate;
use log::{info, warn};
use shipcheck_common::{Diagnostic, has_errors};
use std::io::Write;

/// Collaborators shared by every artefact in a run.
pub struct Verifier<'a> {
    /// Declared expectations.
    pub requirement: &'a RequirementModel,
    /// Runs platform tools.
    pub executor: &'a dyn CommandExecutor,
    /// Tracks mounts and scratch directories until they are released.
    pub registry: &'a CleanupRegistry,
    /// Unpacks bundle tarballs.
    pub extractor: &'a dyn ArchiveExtractor,
    /// Which signing checks are enabled.
    pub signing: &'a SigningEnvironment,
}

impl Verifier<'_> {
    /// Inspects one artefact and returns every finding.
    ///
    /// The acquired resource is released before this returns, whether or
    /// not inspection succeeded.
    ///
    /// # Errors
    ///
    /// Returns the error that prevented the artefact from being inspected.
    pub fn verify(&self, artefact: &Artefact) -> Result<Vec<Diagnostic>> {
        let acquired =
            lifecycle::acquire(artefact, self.executor, self.registry, self.extractor)?;
        let ctx = InspectionContext {
            requirement: self.requirement,
            executor: self.executor,
            signing: self.signing,
        };
        let inspection = collect::inspect(&ctx, artefact, acquired.root());
        acquired.release();

        let inspection = inspection?;
        let mut diagnostics = validate::validate(self.requirement, &inspection.facts);
        diagnostics.extend(inspection.diagnostics);
        Ok(diagnostics)
    }

    /// Checks the configuration, then inspects every artefact unless the
    /// configuration conflicts with itself.
    pub fn run(&self, artefacts: &[Artefact], progress: &mut dyn Write, quiet: bool) -> RunReport {
        let requirement_diagnostics = validate::validate_requirements(self.requirement);
        if has_errors(&requirement_diagnostics) {
            warn!("the packaging config contradicts itself; no artefact was inspected");
            return RunReport {
                requirement_diagnostics,
                artefacts: Vec::new(),
            };
        }
        RunReport {
            requirement_diagnostics,
            artefacts: self.verify_all(artefacts, progress, quiet),
        }
    }

    /// Inspects every artefact in order.
    ///
    /// Prints one progress line per artefact to `progress` unless `quiet`.
    pub fn verify_all(
        &self,
        artefacts: &[Artefact],
        progress: &mut dyn Write,
        quiet: bool,
    ) -> Vec<ArtefactReport> {
        artefacts
            .iter()
            .map(|artefact| {
                if !quiet {
                    write_line(
                        progress,
                        format!("Inspecting {} ({})...", artefact.display_name(), artefact.kind()),
                    );
                }
                let outcome = match self.verify(artefact) {
                    Ok(diagnostics) => {
                        info!(
                            "{}: {} finding(s)",
                            artefact.display_name(),
                            diagnostics.len()
                        );
                        Outcome::Inspected(diagnostics)
                    }
                    Err(err) => {
                        warn!("could not inspect {}: {err}", artefact.display_name());
                        Outcome::Failed(err)
                    }
                };
                ArtefactReport {
                    artefact: artefact.clone(),
                    outcome,
                }
            })
            .collect()
    }
}

/// How one artefact's inspection ended.
#[derive(Debug)]
pub enum Outcome {
    /// The artefact was inspected; these are its findings.
    Inspected(Vec<Diagnostic>),
    /// The artefact could not be inspected.
    Failed(VerifyError),
}

/// Result of inspecting one artefact.
#[derive(Debug)]
pub struct ArtefactReport {
    /// The inspected artefact.
    pub artefact: Artefact,
    /// How inspection ended.
    pub outcome: Outcome,
}

impl ArtefactReport {
    /// Returns `true` when the artefact failed inspection or has an error
    /// finding.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        match &self.outcome {
            Outcome::Inspected(diagnostics) => has_errors(diagnostics),
            Outcome::Failed(_) => true,
        }
    }
}

/// Everything a run found.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Findings about the configuration itself.
    pub requirement_diagnostics: Vec<Diagnostic>,
    /// One report per artefact, in inspection order.
    pub artefacts: Vec<ArtefactReport>,
}

impl RunReport {
    /// Returns `true` when any finding is an error or any artefact failed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        has_errors(&self.requirement_diagnostics)
            || self.artefacts.iter().any(ArtefactReport::has_errors)
    }

    /// Process exit code for the run: `1` on any error, else `0`.
    ///
    /// # Examples
    ///
    /// ```
    /// use shipcheck_verifier::pipeline::RunReport;
    ///
    /// assert_eq!(RunReport::default().exit_code(), 0);
    /// ```
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(self.has_errors())
    }

    /// Counts error and warning findings, including failed inspections as
    /// errors.
    #[must_use]
    pub fn counts(&self) -> (usize, usize) {
        let mut failed = 0;
        let mut findings: Vec<&Diagnostic> = self.requirement_diagnostics.iter().collect();
        for report in &self.artefacts {
            match &report.outcome {
                Outcome::Inspected(diagnostics) => findings.extend(diagnostics),
                Outcome::Failed(_) => failed += 1,
            }
        }
        let errors = findings.iter().filter(|d| d.is_error()).count();
        (errors + failed, findings.len() - errors)
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
