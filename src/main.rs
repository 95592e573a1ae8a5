// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command line interface for the release pipeline.

use {
    apple_release::{
        config,
        context::Context,
        error::Result,
        gitinfo, logging, pipeline,
    },
    clap::{App, AppSettings, Arg, SubCommand},
    slog::info,
    std::{
        path::Path,
        time::{Duration, Instant},
    },
};

const DEFAULT_CONFIG_PATH: &str = ".apple-release.yml";

const BUILD_ABOUT: &str = "\
Build and archive the Xcode project.

Validates configuration, archives with xcodebuild, extracts the .app,
signs it, optionally notarizes it, and packages it into the configured
archive formats. Publishing is skipped.
";

const RELEASE_ABOUT: &str = "\
Run the complete release process.

Builds, signs, notarizes, and packages the application, then creates a
GitHub release with the archives attached and commits a Homebrew cask
to the configured tap.
";

const SNAPSHOT_ABOUT: &str = "\
Build a test release with snapshot versioning.

Behaves like build, but does not require a git tag: when none exists a
timestamped snapshot version is generated instead.
";

/// Option flags applied to the context before the pipeline runs.
#[derive(Clone, Copy, Debug, Default)]
struct PipelineOptions {
    skip_publish: bool,
    skip_notarize: bool,
    clean: bool,
}

fn main_impl() -> Result<()> {
    let app = App::new("apple-release")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .version(env!("CARGO_PKG_VERSION"))
        .about("Build, sign, notarize, and publish Developer ID macOS applications")
        .arg(
            Arg::with_name("config")
                .long("config")
                .takes_value(true)
                .default_value(DEFAULT_CONFIG_PATH)
                .global(true)
                .help("Config file path"),
        )
        .arg(
            Arg::with_name("debug")
                .long("debug")
                .global(true)
                .help("Enable debug output, including external tool output"),
        )
        .subcommand(
            SubCommand::with_name("check").about("Validate the configuration file"),
        )
        .subcommand(
            SubCommand::with_name("init").about("Generate an example configuration file"),
        )
        .subcommand(
            SubCommand::with_name("build")
                .about("Build, sign, and package without publishing")
                .long_about(BUILD_ABOUT)
                .arg(
                    Arg::with_name("clean")
                        .long("clean")
                        .help("Remove dist/ before building"),
                )
                .arg(
                    Arg::with_name("skip-notarize")
                        .long("skip-notarize")
                        .help("Skip notarization (for quick local pipeline validation)"),
                ),
        )
        .subcommand(
            SubCommand::with_name("release")
                .about("Full release process including GitHub and Homebrew")
                .long_about(RELEASE_ABOUT)
                .arg(
                    Arg::with_name("clean")
                        .long("clean")
                        .help("Remove dist/ before building"),
                ),
        )
        .subcommand(
            SubCommand::with_name("snapshot")
                .about("Test release with snapshot versioning")
                .long_about(SNAPSHOT_ABOUT)
                .arg(
                    Arg::with_name("clean")
                        .long("clean")
                        .help("Remove dist/ before building"),
                )
                .arg(
                    Arg::with_name("skip-notarize")
                        .long("skip-notarize")
                        .help("Skip notarization (for quick local pipeline validation)"),
                ),
        );

    let matches = app.get_matches();

    let logger = logging::default_logger(matches.is_present("debug"));
    let config_path = matches
        .value_of("config")
        .unwrap_or(DEFAULT_CONFIG_PATH)
        .to_string();

    match matches.subcommand() {
        ("check", Some(_)) => command_check(&logger, Path::new(&config_path)),
        ("init", Some(_)) => command_init(&logger),
        ("build", Some(args)) => {
            let version = gitinfo::resolve_version()?;
            info!(logger, "version: {}", version);

            run_pipeline_command(
                &logger,
                Path::new(&config_path),
                "build",
                version,
                PipelineOptions {
                    skip_publish: true,
                    skip_notarize: args.is_present("skip-notarize"),
                    clean: args.is_present("clean"),
                },
            )
        }
        ("release", Some(args)) => {
            let version = gitinfo::resolve_version()?;
            info!(logger, "version: {}", version);

            run_pipeline_command(
                &logger,
                Path::new(&config_path),
                "release",
                version,
                PipelineOptions {
                    skip_publish: false,
                    skip_notarize: false,
                    clean: args.is_present("clean"),
                },
            )
        }
        ("snapshot", Some(args)) => {
            let version = snapshot_version(&logger);

            run_pipeline_command(
                &logger,
                Path::new(&config_path),
                "snapshot",
                version,
                PipelineOptions {
                    skip_publish: true,
                    skip_notarize: args.is_present("skip-notarize"),
                    clean: args.is_present("clean"),
                },
            )
        }
        _ => unreachable!("clap rejects unknown subcommands"),
    }
}

fn command_check(logger: &slog::Logger, config_path: &Path) -> Result<()> {
    info!(logger, "loading configuration");
    let config = config::load_config(config_path)?;
    info!(logger, "configuration loaded successfully");

    let mut ctx = Context::new(config, logger.clone());
    pipeline::run_validation(&mut ctx)?;

    info!(logger, "configuration is valid");
    Ok(())
}

fn command_init(logger: &slog::Logger) -> Result<()> {
    let config_path = Path::new(DEFAULT_CONFIG_PATH);

    if config_path.exists() {
        info!(
            logger,
            "configuration file {} already exists",
            config_path.display()
        );
        return Ok(());
    }

    config::save_config(config_path, &config::example_config())?;

    info!(
        logger,
        "example configuration created: {}",
        config_path.display()
    );
    info!(logger, "edit this file to match your project requirements");
    Ok(())
}

/// Resolve a snapshot version: the latest tag with a `-snapshot`
/// suffix, or a timestamp when no tags exist.
fn snapshot_version(logger: &slog::Logger) -> String {
    match gitinfo::resolve_version() {
        Ok(version) => {
            let version = format!("{}-snapshot", version);
            info!(logger, "version: {}", version);
            version
        }
        Err(_) => {
            let version = format!(
                "snapshot-{}",
                chrono::Local::now().format("%Y%m%d%H%M%S")
            );
            info!(logger, "no git tags found, using snapshot version: {}", version);
            version
        }
    }
}

fn run_pipeline_command(
    logger: &slog::Logger,
    config_path: &Path,
    command: &str,
    version: String,
    options: PipelineOptions,
) -> Result<()> {
    info!(logger, "loading configuration");
    let config = config::load_config(config_path)?;

    info!(logger, "resolving git state");
    let git = gitinfo::resolve_git_info()?;
    info!(
        logger,
        "commit {} branch {:?} tag {:?} dirty {}",
        git.short_commit,
        git.branch,
        git.tag,
        git.dirty
    );

    let mut ctx = Context::new(config, logger.clone());
    ctx.version = version;
    ctx.git = git;
    ctx.clean = options.clean;
    ctx.skip_publish = options.skip_publish;
    ctx.skip_notarize = options.skip_notarize;

    if ctx.clean {
        info!(logger, "cleaning distribution directory");
        if Path::new("dist").exists() {
            std::fs::remove_dir_all("dist")?;
        }
    }

    let start = Instant::now();
    pipeline::run_all(&mut ctx)?;
    let elapsed = start.elapsed();

    print_artifact_summary(&ctx);
    info!(
        logger,
        "{} succeeded after {}",
        command,
        format_duration(elapsed)
    );
    Ok(())
}

fn print_artifact_summary(ctx: &Context) {
    let logger = &ctx.logger;

    info!(
        logger,
        "build complete for {} {}", ctx.config.project.name, ctx.version
    );

    if !ctx.artifacts.app_path.as_os_str().is_empty() {
        info!(logger, "  app: {}", ctx.artifacts.app_path.display());
    }

    for package in &ctx.artifacts.packages {
        info!(logger, "  package: {}", package.display());
    }

    if !ctx.artifacts.release_url.is_empty() {
        info!(logger, "  release: {}", ctx.artifacts.release_url);
    }

    if !ctx.artifacts.homebrew_cask_path.as_os_str().is_empty() {
        info!(
            logger,
            "  cask: {}",
            ctx.artifacts.homebrew_cask_path.display()
        );
    }

    info!(
        logger,
        "artifacts in: {}",
        ctx.artifacts.build_output_dir.display()
    );
}

/// `523ms` under a second, `5s` under a minute, `1m32s` beyond.
fn format_duration(duration: Duration) -> String {
    if duration < Duration::from_secs(1) {
        return format!("{}ms", duration.as_millis());
    }

    let total_seconds = duration.as_secs();
    if total_seconds < 60 {
        return format!("{}s", total_seconds);
    }

    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    if seconds == 0 {
        format!("{}m", minutes)
    } else {
        format!("{}m{}s", minutes, seconds)
    }
}

fn main() {
    let exit_code = match main_impl() {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("Error: {}", err);
            1
        }
    };

    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_format_humanely() {
        assert_eq!(format_duration(Duration::from_millis(523)), "523ms");
        assert_eq!(format_duration(Duration::from_secs(5)), "5s");
        assert_eq!(format_duration(Duration::from_secs(92)), "1m32s");
        assert_eq!(format_duration(Duration::from_secs(120)), "2m");
    }
}
