// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Logger construction for the CLI.

use slog::Drain;

/// A drain that renders records as goreleaser-style bullets:
///
/// ```text
///   * running building project
///     ! skipping Foo: not a regular file
///   x build failed
/// ```
pub struct BulletDrain;

fn render_line(level: slog::Level, msg: &str) -> String {
    match level {
        slog::Level::Critical | slog::Level::Error => format!("  x {}", msg),
        slog::Level::Warning => format!("    ! {}", msg),
        slog::Level::Info => format!("  * {}", msg),
        _ => format!("      {}", msg),
    }
}

impl Drain for BulletDrain {
    type Ok = ();
    type Err = std::io::Error;

    fn log(
        &self,
        record: &slog::Record,
        _values: &slog::OwnedKVList,
    ) -> Result<Self::Ok, Self::Err> {
        println!("{}", render_line(record.level(), &format!("{}", record.msg())));
        Ok(())
    }
}

/// Construct the CLI logger.
///
/// Normal mode uses [BulletDrain] filtered to info level. Debug mode
/// uses a compact terminal drain that shows everything, including the
/// combined output of external tools.
pub fn default_logger(debug: bool) -> slog::Logger {
    if debug {
        let decorator = slog_term::TermDecorator::new().build();
        let drain = slog_term::CompactFormat::new(decorator).build();
        let drain = std::sync::Mutex::new(drain).fuse();

        slog::Logger::root(drain, slog::o!())
    } else {
        let drain = BulletDrain.filter_level(slog::Level::Info).ignore_res();

        slog::Logger::root(drain, slog::o!())
    }
}
