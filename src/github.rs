// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Minimal GitHub REST v3 client.

Only the endpoints the pipeline needs: create a release, upload a
release asset, and read/create/update a file via the Contents API (for
tap commits). The client is deliberately thin; callers match on error
message substrings (`already_exists`, `404`) to produce actionable
messages, so failures embed the raw API status and body.

The [GitHubApi] trait exists so tests can substitute a fake that
records calls; production code constructs [GitHubClient] lazily when
the context has no injected client.
*/

use {
    crate::error::{AppleReleaseError, Result},
    serde::{Deserialize, Serialize},
    std::{path::Path, time::Duration},
};

/// HTTP user agent string.
pub const USER_AGENT: &str = "apple-release (https://crates.io/crates/apple-release)";

const API_ROOT: &str = "https://api.github.com";
const UPLOAD_ROOT: &str = "https://uploads.github.com";

/// Overall timeout applied to every request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Request body for creating a release.
#[derive(Clone, Debug, Serialize)]
pub struct NewRelease {
    pub tag_name: String,
    pub name: String,
    pub draft: bool,
}

/// The subset of a release response the pipeline consumes.
#[derive(Clone, Debug, Deserialize)]
pub struct Release {
    pub id: u64,
    pub html_url: String,
}

/// The subset of a Contents API response the pipeline consumes.
#[derive(Clone, Debug, Deserialize)]
pub struct RepositoryFile {
    /// Blob SHA of the current file content. Used as a compare-and-swap
    /// token when updating.
    pub sha: String,
}

/// GitHub operations the pipeline performs.
pub trait GitHubApi {
    fn create_release(&self, owner: &str, repo: &str, release: &NewRelease) -> Result<Release>;

    fn upload_release_asset(
        &self,
        owner: &str,
        repo: &str,
        release_id: u64,
        asset_path: &Path,
        content_type: &str,
    ) -> Result<()>;

    fn get_file_contents(&self, owner: &str, repo: &str, path: &str) -> Result<RepositoryFile>;

    fn create_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        message: &str,
        content: &[u8],
    ) -> Result<()>;

    fn update_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        message: &str,
        content: &[u8],
        sha: &str,
    ) -> Result<()>;
}

/// Token-authenticated client against the real GitHub API.
pub struct GitHubClient {
    client: reqwest::blocking::Client,
    token: String,
}

impl GitHubClient {
    pub fn new(token: &str) -> Result<Self> {
        if token.is_empty() {
            return Err(AppleReleaseError::RemoteApi(
                "GitHub token is required".to_string(),
            ));
        }

        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            token: token.to_string(),
        })
    }

    fn request(
        &self,
        builder: reqwest::blocking::RequestBuilder,
    ) -> Result<reqwest::blocking::Response> {
        let response = builder
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github.v3+json")
            .send()?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().unwrap_or_default();
        Err(AppleReleaseError::RemoteApi(format!(
            "GitHub API error {}: {}",
            status.as_u16(),
            body.trim()
        )))
    }
}

#[derive(Serialize)]
struct ContentsRequest<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

impl GitHubApi for GitHubClient {
    fn create_release(&self, owner: &str, repo: &str, release: &NewRelease) -> Result<Release> {
        let url = format!("{}/repos/{}/{}/releases", API_ROOT, owner, repo);

        let response = self.request(self.client.post(&url).json(release))?;

        Ok(response.json::<Release>()?)
    }

    fn upload_release_asset(
        &self,
        owner: &str,
        repo: &str,
        release_id: u64,
        asset_path: &Path,
        content_type: &str,
    ) -> Result<()> {
        let name = asset_path
            .file_name()
            .ok_or_else(|| {
                AppleReleaseError::Precondition(format!(
                    "asset path has no file name: {}",
                    asset_path.display()
                ))
            })?
            .to_string_lossy()
            .into_owned();

        let data = std::fs::read(asset_path)?;

        let url = format!(
            "{}/repos/{}/{}/releases/{}/assets",
            UPLOAD_ROOT, owner, repo, release_id
        );

        self.request(
            self.client
                .post(&url)
                .query(&[("name", name.as_str())])
                .header("Content-Type", content_type)
                .body(data),
        )?;

        Ok(())
    }

    fn get_file_contents(&self, owner: &str, repo: &str, path: &str) -> Result<RepositoryFile> {
        let url = format!("{}/repos/{}/{}/contents/{}", API_ROOT, owner, repo, path);

        let response = self.request(self.client.get(&url))?;

        Ok(response.json::<RepositoryFile>()?)
    }

    fn create_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        message: &str,
        content: &[u8],
    ) -> Result<()> {
        let url = format!("{}/repos/{}/{}/contents/{}", API_ROOT, owner, repo, path);

        self.request(self.client.put(&url).json(&ContentsRequest {
            message,
            content: base64::encode(content),
            sha: None,
        }))?;

        Ok(())
    }

    fn update_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        message: &str,
        content: &[u8],
        sha: &str,
    ) -> Result<()> {
        let url = format!("{}/repos/{}/{}/contents/{}", API_ROOT, owner, repo, path);

        self.request(self.client.put(&url).json(&ContentsRequest {
            message,
            content: base64::encode(content),
            sha: Some(sha),
        }))?;

        Ok(())
    }
}

/// Read the release-publishing token from the environment.
pub fn github_token_from_env() -> Option<String> {
    match std::env::var("GITHUB_TOKEN") {
        Ok(token) if !token.is_empty() => Some(token),
        _ => None,
    }
}

/// MIME content type for a release asset, by extension.
pub fn content_type_for_asset(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("zip") => "application/zip",
        Some("dmg") => "application/x-apple-diskimage",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_by_extension() {
        assert_eq!(
            content_type_for_asset(Path::new("MyApp-v1.0.0.zip")),
            "application/zip"
        );
        assert_eq!(
            content_type_for_asset(Path::new("MyApp-v1.0.0.dmg")),
            "application/x-apple-diskimage"
        );
        assert_eq!(
            content_type_for_asset(Path::new("MyApp.app")),
            "application/octet-stream"
        );
    }

    #[test]
    fn client_requires_token() {
        assert!(GitHubClient::new("").is_err());
        assert!(GitHubClient::new("ghp_sometoken").is_ok());
    }

    #[test]
    fn new_release_serialization() {
        let release = NewRelease {
            tag_name: "v1.0.0".to_string(),
            name: "MyApp v1.0.0".to_string(),
            draft: true,
        };

        let value = serde_json::to_value(&release).unwrap();
        assert_eq!(value["tag_name"], "v1.0.0");
        assert_eq!(value["name"], "MyApp v1.0.0");
        assert_eq!(value["draft"], true);
    }

    #[test]
    fn contents_request_omits_sha_on_create() {
        let request = ContentsRequest {
            message: "Add myapp 1.2.3",
            content: base64::encode(b"cask"),
            sha: None,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("sha").is_none());
    }
}
