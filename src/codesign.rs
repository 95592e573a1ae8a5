// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Interface to `codesign` and keychain identity lookup. */

use {
    crate::error::{AppleReleaseError, Result},
    duct::cmd,
    once_cell::sync::Lazy,
    regex::Regex,
    slog::debug,
    std::path::Path,
};

/// Matches lines of `security find-identity -v -p codesigning` output:
/// `  N) <hex hash> "<identity string>"`.
static IDENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*\d+\)\s+[0-9A-Fa-f]+\s+"(.+)""#).expect("invalid identity regex"));

/// Parse the quoted identity names out of `security find-identity` output.
pub fn parse_identities(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| IDENTITY_RE.captures(line))
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Check whether the configured identity is among the available ones.
///
/// On mismatch the error lists every available identity and the command
/// to reproduce the listing.
pub fn validate_identity(configured: &str, available: &[String]) -> Result<()> {
    if available.iter().any(|id| id == configured) {
        return Ok(());
    }

    if available.is_empty() {
        return Err(AppleReleaseError::Precondition(format!(
            "signing identity {:?} not found in keychain — no valid signing identities are installed\nrun: security find-identity -v -p codesigning",
            configured
        )));
    }

    let mut message = format!(
        "signing identity {:?} not found in keychain\navailable identities:\n",
        configured
    );
    for id in available {
        message.push_str(&format!("  - {}\n", id));
    }
    message.push_str("run: security find-identity -v -p codesigning");

    Err(AppleReleaseError::Precondition(message))
}

/// Query the keychain and confirm the configured identity exists.
pub fn check_identity_in_keychain(configured: &str) -> Result<()> {
    if which::which("security").is_err() {
        return Err(AppleReleaseError::ToolNotFound {
            tool: "security",
            hint: "this tool requires macOS",
        });
    }

    let output = cmd("security", &["find-identity", "-v", "-p", "codesigning"])
        .stderr_to_stdout()
        .stdout_capture()
        .unchecked()
        .run()?;

    let combined = String::from_utf8_lossy(&output.stdout);

    if !output.status.success() {
        return Err(AppleReleaseError::ExternalTool(format!(
            "failed to list signing identities: {}",
            combined.trim()
        )));
    }

    validate_identity(configured, &parse_identities(&combined))
}

/// Represents an invocation of `codesign` to sign an `.app` bundle.
#[derive(Clone, Debug)]
pub struct CodesignInvocation {
    pub identity: String,

    /// Include `--options runtime`. Apple requires the hardened runtime
    /// before the notary service accepts a submission.
    pub hardened_runtime: bool,
}

impl CodesignInvocation {
    /// Derive the arguments for signing `app_path` in place.
    pub fn arguments(&self, app_path: &Path) -> Vec<String> {
        let mut args = vec!["--deep".to_string(), "--force".to_string()];

        if self.hardened_runtime {
            args.push("--options".to_string());
            args.push("runtime".to_string());
        }

        args.push("--sign".to_string());
        args.push(self.identity.clone());
        args.push(app_path.display().to_string());

        args
    }

    /// Run `codesign`, returning its combined output.
    pub fn run(&self, app_path: &Path, logger: &slog::Logger) -> Result<String> {
        require_codesign()?;

        let output = cmd("codesign", self.arguments(app_path))
            .stderr_to_stdout()
            .stdout_capture()
            .unchecked()
            .run()?;

        let combined = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(logger, "{}", combined);

        if !output.status.success() {
            return Err(map_sign_failure(&combined, app_path));
        }

        Ok(combined)
    }
}

/// Verify an existing signature with `--verify --deep --strict`.
pub fn verify_signature(app_path: &Path, logger: &slog::Logger) -> Result<String> {
    require_codesign()?;

    let output = cmd(
        "codesign",
        &[
            "--verify",
            "--deep",
            "--strict",
            &app_path.display().to_string(),
        ],
    )
    .stderr_to_stdout()
    .stdout_capture()
    .unchecked()
    .run()?;

    let combined = String::from_utf8_lossy(&output.stdout).into_owned();
    debug!(logger, "{}", combined);

    if !output.status.success() {
        return Err(AppleReleaseError::ExternalTool(format!(
            "signature verification failed for {}: {}",
            app_path.display(),
            combined.trim()
        )));
    }

    Ok(combined)
}

fn require_codesign() -> Result<()> {
    if which::which("codesign").is_err() {
        return Err(AppleReleaseError::ToolNotFound {
            tool: "codesign",
            hint: "install Xcode Command Line Tools with: xcode-select --install",
        });
    }

    Ok(())
}

fn map_sign_failure(output: &str, app_path: &Path) -> AppleReleaseError {
    if output.contains("resource fork, Finder information, or similar detritus") {
        return AppleReleaseError::ExternalTool(format!(
            "codesign failed due to extended attributes — remove them with: xattr -cr {}",
            app_path.display()
        ));
    }

    AppleReleaseError::ExternalTool(format!("codesign failed: {}", output.trim()))
}
