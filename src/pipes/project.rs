// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Project configuration checks.

use {
    crate::{
        context::Context,
        envsubst::check_resolved,
        error::Result,
        pipeline::Pipe,
        validate::{required_local_path, required_string},
    },
    slog::debug,
};

/// Validates the `project` section.
pub struct CheckPipe;

impl Pipe for CheckPipe {
    fn name(&self) -> &'static str {
        "validating project configuration"
    }

    fn run(&self, ctx: &mut Context) -> Result<()> {
        let cfg = &ctx.config.project;

        check_resolved(&cfg.name, "project.name")?;
        check_resolved(&cfg.scheme, "project.scheme")?;

        required_string(&cfg.name, "project.name")?;
        // The name becomes part of the output directory path.
        required_local_path(&cfg.name, "project.name")?;

        required_string(&cfg.scheme, "project.scheme")?;

        debug!(ctx.logger, "project configuration validated");
        Ok(())
    }
}
