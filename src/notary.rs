// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Apple notarization tooling.

Notarization uploads a payload to Apple, waits for the scan verdict,
and on success staples the issued ticket to the `.app` so Gatekeeper
can verify it offline. This module wraps the three command line tools
involved: `xcrun notarytool` for submission, `xcrun stapler` for
stapling, and `spctl` for the final Gatekeeper assessment.
*/

use {
    crate::error::{AppleReleaseError, Result},
    duct::cmd,
    once_cell::sync::Lazy,
    regex::Regex,
    slog::debug,
    std::path::Path,
};

/// Matches the submission UUID in notarytool output (`id: <uuid>`).
static SUBMISSION_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"id:\s*([0-9a-fA-F-]{36})").expect("invalid submission id regex"));

/// Derive the arguments for `xcrun notarytool submit`.
///
/// `--wait` blocks until Apple returns a terminal status, which can
/// take up to roughly an hour.
pub fn submit_args(zip_path: &Path, apple_id: &str, team_id: &str, password: &str) -> Vec<String> {
    vec![
        "notarytool".to_string(),
        "submit".to_string(),
        zip_path.display().to_string(),
        "--apple-id".to_string(),
        apple_id.to_string(),
        "--team-id".to_string(),
        team_id.to_string(),
        "--password".to_string(),
        password.to_string(),
        "--wait".to_string(),
    ]
}

/// Submit a ZIP to the notary service and wait for the verdict.
///
/// Returns the combined tool output on success.
pub fn submit(
    zip_path: &Path,
    apple_id: &str,
    team_id: &str,
    password: &str,
    logger: &slog::Logger,
) -> Result<String> {
    require_xcrun()?;

    let output = cmd("xcrun", submit_args(zip_path, apple_id, team_id, password))
        .stderr_to_stdout()
        .stdout_capture()
        .unchecked()
        .run()?;

    let combined = String::from_utf8_lossy(&output.stdout).into_owned();
    debug!(logger, "{}", combined);

    if !output.status.success() {
        return Err(map_submit_failure(&combined));
    }

    Ok(combined)
}

/// Extract the submission UUID from notarytool output.
pub fn parse_submission_id(output: &str) -> Option<String> {
    SUBMISSION_ID_RE
        .captures(output)
        .map(|caps| caps[1].to_string())
}

fn map_submit_failure(output: &str) -> AppleReleaseError {
    if output.contains("Unable to authenticate") {
        return AppleReleaseError::ExternalTool(
            "notarytool authentication failed — verify apple_id, team_id, and password (use an app-specific password from appleid.apple.com)"
                .to_string(),
        );
    }

    if output.contains("status: Invalid") || output.contains("Invalid") {
        let hint = match parse_submission_id(output) {
            Some(id) => format!(" — run: xcrun notarytool log {} to view details", id),
            None => String::new(),
        };
        return AppleReleaseError::ExternalTool(format!("Apple rejected the submission{}", hint));
    }

    AppleReleaseError::ExternalTool(format!("notarytool submit failed: {}", output.trim()))
}

/// Staple the notarization ticket to the `.app`.
pub fn staple(app_path: &Path, logger: &slog::Logger) -> Result<String> {
    require_xcrun()?;

    let output = cmd(
        "xcrun",
        &["stapler", "staple", &app_path.display().to_string()],
    )
    .stderr_to_stdout()
    .stdout_capture()
    .unchecked()
    .run()?;

    let combined = String::from_utf8_lossy(&output.stdout).into_owned();
    debug!(logger, "{}", combined);

    if !output.status.success() {
        if combined.contains("Could not find ticket") {
            return Err(AppleReleaseError::ExternalTool(
                "stapling failed — the notarization ticket was not found; ensure notarytool submission succeeded"
                    .to_string(),
            ));
        }
        return Err(AppleReleaseError::ExternalTool(format!(
            "stapler staple failed: {}",
            combined.trim()
        )));
    }

    Ok(combined)
}

/// Verify the app passes Gatekeeper assessment.
pub fn assess(app_path: &Path, logger: &slog::Logger) -> Result<String> {
    if which::which("spctl").is_err() {
        return Err(AppleReleaseError::ToolNotFound {
            tool: "spctl",
            hint: "this tool is required for Gatekeeper verification on macOS",
        });
    }

    let output = cmd(
        "spctl",
        &[
            "--assess",
            "--type",
            "execute",
            "--verbose",
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
        if combined.contains("rejected") {
            return Err(AppleReleaseError::ExternalTool(
                "Gatekeeper rejected the app — it may not be properly signed or notarized"
                    .to_string(),
            ));
        }
        return Err(AppleReleaseError::ExternalTool(format!(
            "spctl assess failed: {}",
            combined.trim()
        )));
    }

    Ok(combined)
}

fn require_xcrun() -> Result<()> {
    if which::which("xcrun").is_err() {
        return Err(AppleReleaseError::ToolNotFound {
            tool: "xcrun",
            hint: "install Xcode Command Line Tools with: xcode-select --install",
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_args_shape() {
        let args = submit_args(
            Path::new("dist/MyApp-notarize.zip"),
            "jane@example.com",
            "TEAM1234",
            "secret",
        );

        assert_eq!(
            args,
            vec![
                "notarytool",
                "submit",
                "dist/MyApp-notarize.zip",
                "--apple-id",
                "jane@example.com",
                "--team-id",
                "TEAM1234",
                "--password",
                "secret",
                "--wait",
            ]
        );
    }

    #[test]
    fn parse_submission_id_from_output() {
        let output = "Conducting pre-submission checks...\n  id: 12345678-abcd-ef01-2345-67890abcdef0\n  status: Accepted\n";
        assert_eq!(
            parse_submission_id(output).unwrap(),
            "12345678-abcd-ef01-2345-67890abcdef0"
        );
    }

    #[test]
    fn parse_submission_id_absent() {
        assert!(parse_submission_id("nothing to see").is_none());
    }

    #[test]
    fn authentication_failure_maps_to_password_hint() {
        let err = map_submit_failure("Error: Unable to authenticate");
        assert!(err.to_string().contains("app-specific password"));
    }

    #[test]
    fn invalid_submission_names_log_command() {
        let output = "  id: 12345678-abcd-ef01-2345-67890abcdef0\n  status: Invalid\n";
        let err = map_submit_failure(output);

        let message = err.to_string();
        assert!(message.contains("rejected"));
        assert!(message.contains("xcrun notarytool log 12345678-abcd-ef01-2345-67890abcdef0"));
    }

    #[test]
    fn other_failure_keeps_output() {
        let err = map_submit_failure("network down");
        assert!(err.to_string().contains("notarytool submit failed"));
    }
}
