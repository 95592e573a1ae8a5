// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Homebrew cask generation.

The cask is a Ruby file that `brew` evaluates on the user's machine, so
every templated field is sanitized against anything able to close a
double-quoted Ruby string literal or begin interpolation. The forbidden
set (`"`, `\`, CR, LF, `#{`) is the minimum sufficient set; none of the
characters can be relaxed individually without reopening an escape.
*/

use {
    crate::error::{AppleReleaseError, Result},
    sha2::{Digest, Sha256},
    std::path::{Path, PathBuf},
};

/// Fields rendered into the cask file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CaskData {
    /// Cask token/identifier, e.g. `myapp`.
    pub token: String,

    /// Bare version without the `v` prefix, e.g. `1.2.3`.
    pub version: String,

    /// Hex-encoded SHA-256 of the downloaded archive.
    pub sha256: String,

    /// Direct download URL of the archive.
    pub url: String,

    /// Human-readable application name.
    pub name: String,

    /// Short description.
    pub desc: String,

    /// Homepage URL.
    pub homepage: String,

    /// `.app` bundle name, e.g. `MyApp.app`.
    pub app_name: String,

    /// Optional SPDX license identifier.
    pub license: String,
}

/// Reject values that could escape a double-quoted Ruby string.
pub fn validate_cask_field(name: &str, value: &str) -> Result<()> {
    if value.contains('"') || value.contains('\\') || value.contains('\n') || value.contains('\r') {
        return Err(AppleReleaseError::Validation(format!(
            "invalid {}: must not contain double quotes, backslashes, or newlines",
            name
        )));
    }

    if value.contains("#{") {
        return Err(AppleReleaseError::Validation(format!(
            "invalid {}: must not contain Ruby interpolation sequences",
            name
        )));
    }

    Ok(())
}

/// Render the cask Ruby file.
pub fn render_cask(data: &CaskData) -> Result<String> {
    let fields = [
        ("token", &data.token),
        ("version", &data.version),
        ("url", &data.url),
        ("name", &data.name),
        ("desc", &data.desc),
        ("homepage", &data.homepage),
        ("app_name", &data.app_name),
        ("license", &data.license),
    ];
    for (name, value) in &fields {
        validate_cask_field(name, value)?;
    }

    let mut out = format!(
        "cask \"{}\" do\n  version \"{}\"\n  sha256 \"{}\"\n\n  url \"{}\"\n  name \"{}\"\n  desc \"{}\"\n  homepage \"{}\"\n",
        data.token, data.version, data.sha256, data.url, data.name, data.desc, data.homepage
    );

    if !data.license.is_empty() {
        out.push_str(&format!("\n  license \"{}\"\n", data.license));
    }

    out.push_str(&format!("\n  app \"{}\"\nend\n", data.app_name));

    Ok(out)
}

/// Construct the GitHub release asset download URL.
pub fn build_asset_url(owner: &str, repo: &str, tag: &str, filename: &str) -> String {
    format!(
        "https://github.com/{}/{}/releases/download/{}/{}",
        owner,
        repo,
        tag,
        escape_path_segment(filename)
    )
}

/// Percent-encode a URL path segment. Conservative: everything outside
/// the RFC 3986 unreserved set is encoded.
fn escape_path_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());

    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }

    out
}

/// Select the archive the cask should download: the first `.zip`, else
/// the first `.dmg`.
pub fn select_package(packages: &[PathBuf]) -> Result<&PathBuf> {
    for extension in &["zip", "dmg"] {
        if let Some(package) = packages
            .iter()
            .find(|p| p.extension().map(|e| e == *extension) == Some(true))
        {
            return Ok(package);
        }
    }

    Err(AppleReleaseError::Precondition(
        "no .zip or .dmg package found for Homebrew cask — ensure archive formats include zip or dmg"
            .to_string(),
    ))
}

/// Compute the SHA-256 of a file by streaming it through the digest.
/// Returns lowercase hex.
pub fn compute_sha256(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();

    std::io::copy(&mut file, &mut hasher)?;

    Ok(hex::encode(hasher.finalize()))
}
