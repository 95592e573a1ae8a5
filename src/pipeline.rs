// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! The pipe contract and the pipeline runner.

A pipe is a named, stateless step. The runner invokes each pipe in
registration order; a skip error is logged and execution continues, any
other error stops the run and is wrapped with the pipe's name so the
operator sees which stage failed.

Two registries exist: validation pipes, which read configuration only,
and execution pipes, which produce artifacts. `check` runs only the
former; `build` and `release` run both, and never start execution when
validation failed.
*/

use {
    crate::{
        context::Context,
        error::{AppleReleaseError, Result},
        pipes,
    },
    slog::{debug, info},
    std::time::Instant,
};

/// A discrete pipeline step.
///
/// Pipes are stateless values; all state lives on the [Context]. A pipe
/// signals an intentional non-run by returning [crate::error::skip].
pub trait Pipe {
    /// Human-readable name, used in logs and error wrapping.
    fn name(&self) -> &'static str;

    /// Execute the step against the shared context.
    fn run(&self, ctx: &mut Context) -> Result<()>;
}

/// Configuration checks, in the order they run.
pub fn validation_pipes() -> Vec<Box<dyn Pipe>> {
    vec![
        Box::new(pipes::project::CheckPipe),
        Box::new(pipes::build::CheckPipe),
        Box::new(pipes::sign::CheckPipe),
        Box::new(pipes::notarize::CheckPipe),
        Box::new(pipes::archive::CheckPipe),
        Box::new(pipes::release::CheckPipe),
        Box::new(pipes::homebrew::CheckPipe),
    ]
}

/// Artifact-producing pipes, in the order they run.
pub fn execution_pipes() -> Vec<Box<dyn Pipe>> {
    vec![
        Box::new(pipes::build::BuildPipe),
        Box::new(pipes::sign::SignPipe),
        Box::new(pipes::notarize::NotarizePipe),
        Box::new(pipes::archive::ArchivePipe),
        Box::new(pipes::release::ReleasePipe),
        Box::new(pipes::homebrew::HomebrewPipe),
    ]
}

/// Run a list of pipes in order.
pub fn run_pipes(ctx: &mut Context, pipes: &[Box<dyn Pipe>]) -> Result<()> {
    for pipe in pipes {
        info!(ctx.logger, "running {}", pipe.name());
        let start = Instant::now();

        match pipe.run(ctx) {
            Ok(()) => {
                debug!(
                    ctx.logger,
                    "{} finished in {}ms",
                    pipe.name(),
                    start.elapsed().as_millis()
                );
            }
            Err(err) if err.is_skip() => {
                info!(ctx.logger, "skipping: {}", err);
            }
            Err(err) => {
                return Err(AppleReleaseError::PipeFailed {
                    pipe: pipe.name().to_string(),
                    source: Box::new(err),
                });
            }
        }
    }

    Ok(())
}

/// Run the validation stage only.
pub fn run_validation(ctx: &mut Context) -> Result<()> {
    run_pipes(ctx, &validation_pipes())
}

/// Run the execution stage only.
pub fn run_execution(ctx: &mut Context) -> Result<()> {
    run_pipes(ctx, &execution_pipes())
}

/// Run validation then execution. Execution is not attempted when
/// validation fails.
pub fn run_all(ctx: &mut Context) -> Result<()> {
    run_validation(ctx)?;
    run_execution(ctx)
}
