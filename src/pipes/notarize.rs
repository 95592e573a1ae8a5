// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Notarize the signed `.app` and staple the ticket.

use {
    crate::{
        context::Context,
        envsubst::check_resolved,
        error::{skip, AppleReleaseError, Result},
        notary, packaging,
        pipeline::Pipe,
        validate::required_string,
    },
    slog::{info, warn},
    std::path::{Path, PathBuf},
};

/// Validates the `notarize` section.
pub struct CheckPipe;

impl Pipe for CheckPipe {
    fn name(&self) -> &'static str {
        "validating notarization configuration"
    }

    fn run(&self, ctx: &mut Context) -> Result<()> {
        if ctx.skip_notarize {
            return Err(skip("notarization skipped via --skip-notarize"));
        }

        let cfg = &ctx.config.notarize;

        check_resolved(&cfg.apple_id, "notarize.apple_id")?;
        check_resolved(&cfg.team_id, "notarize.team_id")?;
        check_resolved(&cfg.password, "notarize.password")?;

        required_string(&cfg.apple_id, "notarize.apple_id")?;
        required_string(&cfg.team_id, "notarize.team_id")?;
        required_string(&cfg.password, "notarize.password")?;

        Ok(())
    }
}

/// Path of the temporary submission ZIP, alongside the other build
/// products.
pub(crate) fn notarize_zip_path(output_dir: &Path, app_path: &Path) -> PathBuf {
    let app_name = app_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let app_name = app_name.strip_suffix(".app").unwrap_or(&app_name);

    output_dir.join(format!("{}-notarize.zip", app_name))
}

/// Submits the `.app` to Apple, waits for the verdict, staples the
/// ticket, and verifies the Gatekeeper assessment.
pub struct NotarizePipe;

impl Pipe for NotarizePipe {
    fn name(&self) -> &'static str {
        "notarizing application"
    }

    fn run(&self, ctx: &mut Context) -> Result<()> {
        if ctx.skip_notarize {
            return Err(skip("notarization skipped via --skip-notarize"));
        }

        if ctx.artifacts.app_path.as_os_str().is_empty() {
            return Err(AppleReleaseError::Precondition(
                "no .app found to notarize — ensure the build and sign steps completed successfully"
                    .to_string(),
            ));
        }

        let app_path = ctx.artifacts.app_path.clone();
        let apple_id = ctx.config.notarize.apple_id.clone();
        let team_id = ctx.config.notarize.team_id.clone();
        let password = ctx.config.notarize.password.clone();

        let zip_path = notarize_zip_path(&ctx.artifacts.build_output_dir, &app_path);

        info!(ctx.logger, "creating temporary ZIP for notarization submission");
        packaging::create_zip(&app_path, &zip_path)?;

        info!(
            ctx.logger,
            "submitting to Apple notary service (this may take several minutes)"
        );
        notary::submit(&zip_path, &apple_id, &team_id, &password, &ctx.logger)?;

        info!(ctx.logger, "stapling notarization ticket");
        notary::staple(&app_path, &ctx.logger)?;

        info!(ctx.logger, "verifying Gatekeeper assessment");
        notary::assess(&app_path, &ctx.logger)?;

        if let Err(err) = std::fs::remove_file(&zip_path) {
            warn!(
                ctx.logger,
                "failed to remove temp ZIP {}: {}",
                zip_path.display(),
                err
            );
        }

        info!(ctx.logger, "notarization complete: {}", app_path.display());
        Ok(())
    }
}
