// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Package the stapled `.app` into the configured archive formats.

use {
    crate::{
        context::Context,
        error::{AppleReleaseError, Result},
        packaging,
        pipeline::Pipe,
        validate::{all_one_of, required_slice},
    },
    slog::info,
    std::path::{Path, PathBuf},
};

const VALID_FORMATS: &[&str] = &["dmg", "zip", "app"];

/// Validates the `archive` section.
pub struct CheckPipe;

impl Pipe for CheckPipe {
    fn name(&self) -> &'static str {
        "validating archive configuration"
    }

    fn run(&self, ctx: &mut Context) -> Result<()> {
        let cfg = &ctx.config.archive;

        required_slice(&cfg.formats, "archive.formats")?;
        all_one_of(&cfg.formats, VALID_FORMATS, "archive.formats")?;

        Ok(())
    }
}

fn package_path(output_dir: &Path, app_name: &str, version: &str, extension: &str) -> PathBuf {
    output_dir.join(format!("{}-{}.{}", app_name, version, extension))
}

/// Produces the configured packages and appends them to the artifact
/// list.
pub struct ArchivePipe;

impl Pipe for ArchivePipe {
    fn name(&self) -> &'static str {
        "packaging archives"
    }

    fn run(&self, ctx: &mut Context) -> Result<()> {
        if ctx.artifacts.app_path.as_os_str().is_empty() {
            return Err(AppleReleaseError::Precondition(
                "no .app found to package — ensure the build step completed successfully"
                    .to_string(),
            ));
        }

        let app_path = ctx.artifacts.app_path.clone();
        let output_dir = ctx.artifacts.build_output_dir.clone();
        let version = ctx.version.clone();

        let app_base = app_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let app_name = app_base.strip_suffix(".app").unwrap_or(&app_base).to_string();

        for format in ctx.config.archive.formats.clone() {
            match format.as_str() {
                "zip" => {
                    let output_path = package_path(&output_dir, &app_name, &version, "zip");
                    info!(ctx.logger, "creating ZIP: {}", output_path.display());

                    packaging::create_zip(&app_path, &output_path)?;

                    ctx.artifacts.packages.push(output_path);
                }
                "dmg" => {
                    let output_path = package_path(&output_dir, &app_name, &version, "dmg");
                    let volume_name = format!("{} {}", app_name, version);
                    info!(ctx.logger, "creating DMG: {}", output_path.display());

                    packaging::create_dmg(&app_path, &output_path, &volume_name)?;

                    ctx.artifacts.packages.push(output_path);
                }
                "app" => {
                    // Already present in the output directory.
                    info!(ctx.logger, "app bundle: {}", app_path.display());
                    ctx.artifacts.packages.push(app_path.clone());
                }
                _ => {}
            }
        }

        Ok(())
    }
}
