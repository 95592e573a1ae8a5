// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Declarative release configuration.

The configuration is a YAML file with one section per pipeline concern.
Loading is strict: unknown keys are an error, by design, so that
removed or misspelled fields surface visibly instead of being silently
ignored. String values may embed `env(NAME)` fragments which are
expanded tolerantly before decoding (see [crate::envsubst]).
*/

use {
    crate::{
        envsubst,
        error::{AppleReleaseError, Result},
    },
    serde::{Deserialize, Serialize},
    serde_yaml::Value,
    std::path::{Component, Path, PathBuf},
};

/// Largest config file accepted, in bytes.
const MAX_CONFIG_SIZE: u64 = 1024 * 1024;

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// Complete release configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub project: ProjectConfig,
    pub build: BuildConfig,
    pub sign: SignConfig,
    pub notarize: NotarizeConfig,
    pub archive: ArchiveConfig,
    pub release: ReleaseConfig,
    pub homebrew: HomebrewConfig,
}

/// Project-level settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Human-readable project name. Becomes a component of the output
    /// directory, so it must be a local path component.
    pub name: String,

    /// Xcode scheme to archive.
    pub scheme: String,

    /// Explicit `.xcworkspace` or `.xcodeproj` path. Autodetected when
    /// empty.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub workspace: String,
}

/// Build settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Xcode build configuration, typically `Release`.
    pub configuration: String,
}

/// Code signing settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SignConfig {
    /// Signing identity as it appears in the keychain, e.g.
    /// `Developer ID Application: Your Name (TEAM_ID)`.
    pub identity: String,
}

/// Apple notarization credentials.
///
/// The app-specific password inevitably lives in memory as a plain
/// string for handing to `notarytool`. Reference it via `env(...)`
/// substitution rather than hardcoding it in the config file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotarizeConfig {
    pub apple_id: String,
    pub team_id: String,
    pub password: String,
}

/// Archive packaging settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveConfig {
    /// Formats to produce. Any of `dmg`, `zip`, `app`.
    pub formats: Vec<String>,

    #[serde(skip_serializing_if = "is_default")]
    pub dmg: DmgConfig,

    #[serde(skip_serializing_if = "is_default")]
    pub zip: ZipConfig,
}

/// DMG-specific settings. Parsed for config compatibility; cosmetic
/// styling is not applied.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DmgConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub background: String,

    #[serde(skip_serializing_if = "is_default")]
    pub icon_size: u32,
}

/// ZIP-specific settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ZipConfig {
    #[serde(skip_serializing_if = "is_default")]
    pub compression_level: u32,
}

/// Release publication settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReleaseConfig {
    pub github: GitHubConfig,
}

/// GitHub release destination.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GitHubConfig {
    pub owner: String,
    pub repo: String,
    pub draft: bool,
}

/// Homebrew cask settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HomebrewConfig {
    #[serde(skip_serializing_if = "is_default")]
    pub tap: TapConfig,

    #[serde(skip_serializing_if = "is_default")]
    pub official: OfficialConfig,

    pub cask: CaskConfig,
}

/// Custom tap repository the generated cask is committed to.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TapConfig {
    pub owner: String,
    pub name: String,
    pub token: String,
}

impl TapConfig {
    /// Whether any tap field is set. When one is, all are required.
    pub fn is_configured(&self) -> bool {
        !self.owner.is_empty() || !self.name.is_empty() || !self.token.is_empty()
    }
}

/// Official Homebrew tap settings. Accepted for config compatibility;
/// the official-tap PR workflow is not part of this tool.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OfficialConfig {
    pub enabled: bool,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub token: String,

    pub auto_merge: bool,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assignees: Vec<String>,
}

/// Cask metadata rendered into the generated Ruby file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaskConfig {
    pub name: String,
    pub desc: String,
    pub homepage: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub license: String,
}

/// Load and parse a configuration file.
///
/// The file must be a regular file (symlinks to regular files are
/// followed) of at most 1 MiB. Relative paths that lexically escape the
/// working directory are rejected; absolute paths are accepted
/// anywhere. YAML is parsed into a value tree, `env(NAME)` fragments
/// are expanded in value leaves, and the tree is then decoded strictly
/// into [Config].
pub fn load_config(path: &Path) -> Result<Config> {
    if path.as_os_str().is_empty() {
        return Err(AppleReleaseError::Config(
            "config file path is required".to_string(),
        ));
    }

    let cwd = std::env::current_dir()?;
    let resolved = validate_config_path(path, &cwd)?;
    let data = read_config_file(&resolved)?;

    let mut tree: Value = serde_yaml::from_str(&data)?;
    if tree.is_null() {
        return Err(AppleReleaseError::Config(
            "failed to parse config: empty document".to_string(),
        ));
    }

    envsubst::substitute_tree(&mut tree)?;

    let config: Config = serde_yaml::from_value(tree)?;

    Ok(config)
}

/// Save a configuration to a file with owner-only permissions, since
/// resolved configs may contain secrets.
pub fn save_config(path: &Path, config: &Config) -> Result<()> {
    let data = serde_yaml::to_string(config)?;

    write_owner_only(path, data.as_bytes())?;

    Ok(())
}

#[cfg(unix)]
fn write_owner_only(path: &Path, data: &[u8]) -> std::io::Result<()> {
    use std::{io::Write, os::unix::fs::OpenOptionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(data)
}

#[cfg(not(unix))]
fn write_owner_only(path: &Path, data: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, data)
}

/// Validate a config path against the working directory.
///
/// Relative paths are resolved against `cwd` and must not lexically
/// escape it. Absolute paths are allowed to point anywhere.
fn validate_config_path(path: &Path, cwd: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }

    if lexically_escapes(path) {
        return Err(AppleReleaseError::Config(
            "invalid config path: path traversal detected".to_string(),
        ));
    }

    Ok(cwd.join(path))
}

/// Whether a relative path's `..` components lexically climb above its
/// starting directory.
fn lexically_escapes(path: &Path) -> bool {
    let mut depth: i64 = 0;

    for component in path.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return true;
                }
            }
            _ => return true,
        }
    }

    false
}

fn read_config_file(path: &Path) -> Result<String> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        AppleReleaseError::Config(format!("failed to access config file: {}", e))
    })?;

    if !metadata.is_file() {
        return Err(AppleReleaseError::Config(
            "config path is not a regular file".to_string(),
        ));
    }

    if metadata.len() > MAX_CONFIG_SIZE {
        return Err(AppleReleaseError::Config(
            "config file too large: maximum size is 1MB".to_string(),
        ));
    }

    let data = std::fs::read_to_string(path)
        .map_err(|e| AppleReleaseError::Config(format!("failed to read config file: {}", e)))?;

    Ok(data)
}

/// Configuration with example values, written by `init`.
pub fn example_config() -> Config {
    Config {
        project: ProjectConfig {
            name: "MyApp".to_string(),
            scheme: "MyApp".to_string(),
            workspace: String::new(),
        },
        build: BuildConfig {
            configuration: "Release".to_string(),
        },
        sign: SignConfig {
            identity: "Developer ID Application: Your Name (TEAM_ID)".to_string(),
        },
        notarize: NotarizeConfig {
            apple_id: "env(APPLE_ID)".to_string(),
            team_id: "env(APPLE_TEAM_ID)".to_string(),
            password: "env(APPLE_APP_SPECIFIC_PASSWORD)".to_string(),
        },
        archive: ArchiveConfig {
            formats: vec!["dmg".to_string(), "zip".to_string()],
            dmg: DmgConfig::default(),
            zip: ZipConfig::default(),
        },
        release: ReleaseConfig {
            github: GitHubConfig {
                owner: "yourname".to_string(),
                repo: "myapp".to_string(),
                draft: false,
            },
        },
        homebrew: HomebrewConfig {
            tap: TapConfig {
                owner: "yourname".to_string(),
                name: "homebrew-tap".to_string(),
                token: "env(HOMEBREW_TAP_TOKEN)".to_string(),
            },
            official: OfficialConfig::default(),
            cask: CaskConfig {
                name: "myapp".to_string(),
                desc: "My awesome macOS application".to_string(),
                homepage: "https://github.com/yourname/myapp".to_string(),
                license: "MIT".to_string(),
            },
        },
    }
}
