// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Code sign the built `.app` bundle.

use {
    crate::{
        codesign::{self, CodesignInvocation},
        context::Context,
        error::{AppleReleaseError, Result},
        pipeline::Pipe,
        validate::required_string,
    },
    slog::info,
};

/// Validates the `sign` section.
pub struct CheckPipe;

impl Pipe for CheckPipe {
    fn name(&self) -> &'static str {
        "validating signing configuration"
    }

    fn run(&self, ctx: &mut Context) -> Result<()> {
        required_string(&ctx.config.sign.identity, "sign.identity")?;

        Ok(())
    }
}

/// Whether to sign with the hardened runtime. Apple requires it before
/// the notary service accepts a submission, so it tracks whether
/// notarization will actually run.
pub(crate) fn hardened_runtime(skip_notarize: bool, apple_id: &str) -> bool {
    !skip_notarize && !apple_id.is_empty()
}

/// Signs the `.app` in place and verifies the signature.
pub struct SignPipe;

impl Pipe for SignPipe {
    fn name(&self) -> &'static str {
        "signing application"
    }

    fn run(&self, ctx: &mut Context) -> Result<()> {
        if ctx.artifacts.app_path.as_os_str().is_empty() {
            return Err(AppleReleaseError::Precondition(
                "no .app found to sign — ensure the build step completed successfully".to_string(),
            ));
        }

        let identity = ctx.config.sign.identity.clone();
        let app_path = ctx.artifacts.app_path.clone();

        info!(ctx.logger, "validating signing identity: {}", identity);
        codesign::check_identity_in_keychain(&identity)?;

        let hardened = hardened_runtime(ctx.skip_notarize, &ctx.config.notarize.apple_id);
        if hardened {
            info!(
                ctx.logger,
                "hardened runtime enabled (required for notarization)"
            );
        }

        info!(ctx.logger, "signing {}", app_path.display());
        CodesignInvocation {
            identity,
            hardened_runtime: hardened,
        }
        .run(&app_path, &ctx.logger)?;

        info!(ctx.logger, "verifying signature");
        codesign::verify_signature(&app_path, &ctx.logger)?;

        info!(ctx.logger, "signed and verified: {}", app_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::testutil};

    #[test]
    fn check_requires_identity() {
        let mut config = testutil::valid_config();
        config.sign.identity.clear();

        let mut ctx = testutil::test_context(config);
        let err = CheckPipe.run(&mut ctx).unwrap_err();
        assert_eq!(err.to_string(), "sign.identity is required");
    }

    #[test]
    fn hardened_runtime_tracks_notarization() {
        assert!(hardened_runtime(false, "jane@example.com"));
        assert!(!hardened_runtime(true, "jane@example.com"));
        assert!(!hardened_runtime(false, ""));
        assert!(!hardened_runtime(true, ""));
    }

    #[test]
    fn sign_requires_app_path() {
        let mut ctx = testutil::test_context(testutil::valid_config());

        let err = SignPipe.run(&mut ctx).unwrap_err();
        assert!(err.to_string().contains("no .app found to sign"));
    }
}
