// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! `.app` packaging via `ditto` and `hdiutil`.

ZIP archives are produced with `ditto` rather than a pure-Rust zip
writer because `ditto` preserves resource forks and extended
attributes. Notarized apps distributed in a zip that loses those
attributes fail Gatekeeper on the user's machine.
*/

use {
    crate::error::{AppleReleaseError, Result},
    duct::cmd,
    std::path::Path,
};

/// Derive the `ditto` arguments for archiving `src` into `dest`.
pub fn ditto_args(src: &Path, dest: &Path) -> Vec<String> {
    vec![
        "-c".to_string(),
        "-k".to_string(),
        "--sequesterRsrc".to_string(),
        "--keepParent".to_string(),
        src.display().to_string(),
        dest.display().to_string(),
    ]
}

/// Create a macOS-preserving ZIP archive of an `.app`.
pub fn create_zip(src: &Path, dest: &Path) -> Result<()> {
    if which::which("ditto").is_err() {
        return Err(AppleReleaseError::ToolNotFound {
            tool: "ditto",
            hint: "this tool is required for ZIP packaging on macOS",
        });
    }

    let output = cmd("ditto", ditto_args(src, dest))
        .stderr_to_stdout()
        .stdout_capture()
        .unchecked()
        .run()?;

    if !output.status.success() {
        return Err(AppleReleaseError::ExternalTool(format!(
            "failed to create ZIP archive: {}",
            String::from_utf8_lossy(&output.stdout).trim()
        )));
    }

    Ok(())
}

/// Derive the `hdiutil` arguments for imaging `src` into `dest`.
pub fn hdiutil_args(src: &Path, dest: &Path, volume_name: &str) -> Vec<String> {
    vec![
        "create".to_string(),
        "-volname".to_string(),
        volume_name.to_string(),
        "-srcfolder".to_string(),
        src.display().to_string(),
        "-ov".to_string(),
        "-format".to_string(),
        "UDZO".to_string(),
        dest.display().to_string(),
    ]
}

/// Create a compressed (UDZO) DMG disk image containing an `.app`.
pub fn create_dmg(src: &Path, dest: &Path, volume_name: &str) -> Result<()> {
    if which::which("hdiutil").is_err() {
        return Err(AppleReleaseError::ToolNotFound {
            tool: "hdiutil",
            hint: "this tool is required for DMG packaging on macOS",
        });
    }

    let output = cmd("hdiutil", hdiutil_args(src, dest, volume_name))
        .stderr_to_stdout()
        .stdout_capture()
        .unchecked()
        .run()?;

    if !output.status.success() {
        return Err(AppleReleaseError::ExternalTool(format!(
            "failed to create DMG image: {}",
            String::from_utf8_lossy(&output.stdout).trim()
        )));
    }

    Ok(())
}
