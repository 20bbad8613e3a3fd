//! Disk-image attach and detach through `hdiutil`.

use crate::command::{CommandExecutor, run_checked};
use crate::error::{Result, VerifyError};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use shipcheck_common::PlistDocument;

/// An attached, read-only disk image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountedVolume {
    /// Device node of the attached image, e.g. `/dev/disk4`.
    pub device: String,
    /// Where the image's file system is mounted.
    pub mount_point: Utf8PathBuf,
}

/// Attaches `dmg` without opening a Finder window or auto-opening its
/// contents.
///
/// # Errors
///
/// Returns [`VerifyError::ExternalTool`] when `hdiutil` fails and
/// [`VerifyError::Document`] or [`VerifyError::BundleLayout`] when its
/// output does not name a device and mount point.
pub fn attach(executor: &dyn CommandExecutor, dmg: &Utf8Path) -> Result<MountedVolume> {
    let output = run_checked(
        executor,
        "hdiutil",
        &[
            "attach",
            "-nobrowse",
            "-readonly",
            "-noautoopen",
            "-plist",
            dmg.as_str(),
        ],
    )?;
    let volume = parse_attach_output(dmg, &output)?;
    debug!("attached {dmg} at {} ({})", volume.mount_point, volume.device);
    Ok(volume)
}

/// Reads the device and mount point from `hdiutil attach -plist` output.
///
/// The device is the first `dev-entry` (the whole image); the mount point is
/// the first entity that reports one.
///
/// # Errors
///
/// Returns [`VerifyError::Document`] for unparseable output and
/// [`VerifyError::BundleLayout`] when no device or mount point is listed.
pub fn parse_attach_output(dmg: &Utf8Path, output: &str) -> Result<MountedVolume> {
    let document_error = |source| VerifyError::Document {
        path: dmg.to_owned(),
        source,
    };
    let document = PlistDocument::parse(output).map_err(document_error)?;
    let entities = document
        .root()
        .array("system-entities")
        .map_err(document_error)?
        .map(|array| array.child_dicts())
        .transpose()
        .map_err(document_error)?
        .unwrap_or_default();

    let mut device = None;
    let mut mount_point = None;
    for entity in entities {
        if device.is_none() {
            device = entity.scalar("dev-entry").map_err(document_error)?;
        }
        if mount_point.is_none() {
            mount_point = entity.scalar("mount-point").map_err(document_error)?;
        }
    }

    let layout = |reason: &str| VerifyError::BundleLayout {
        path: dmg.to_owned(),
        reason: reason.to_owned(),
    };
    Ok(MountedVolume {
        device: device.ok_or_else(|| layout("hdiutil attach reported no device"))?,
        mount_point: mount_point
            .map(Utf8PathBuf::from)
            .ok_or_else(|| layout("hdiutil attach reported no mount point"))?,
    })
}

/// Detaches `volume`, escalating until one attempt succeeds: the device,
/// the device with `-force`, the mount point, then the mount point with
/// `-force`.
///
/// Returns `true` once an attempt succeeds. Failure is logged, never raised.
pub fn detach(executor: &dyn CommandExecutor, volume: &MountedVolume) -> bool {
    let device = volume.device.as_str();
    let mount_point = volume.mount_point.as_str();
    let attempts: [&[&str]; 4] = [
        &["detach", device],
        &["detach", "-force", device],
        &["detach", mount_point],
        &["detach", "-force", mount_point],
    ];
    for args in attempts {
        match executor.run("hdiutil", args) {
            Ok(output) if output.status.success() => {
                debug!("detached {mount_point} with hdiutil {}", args.join(" "));
                return true;
            }
            Ok(output) => debug!(
                "hdiutil {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Err(err) => debug!("hdiutil {} failed: {err}", args.join(" ")),
        }
    }
    warn!("could not detach {mount_point} ({device}); detach it manually");
    false
}
