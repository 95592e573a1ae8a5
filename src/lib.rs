// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Release automation for Developer ID signed macOS applications.

This crate drives the full release lifecycle of a macOS `.app`: build an
`.xcarchive` with `xcodebuild`, re-sign the extracted application with
`codesign`, notarize it with `notarytool` and staple the ticket, package
it into `.zip` and `.dmg` archives, publish the archives as GitHub
release assets, and commit a Homebrew cask to a tap repository.

The work is organized as a pipeline of *pipes*. Each pipe is a discrete,
named step implementing [pipeline::Pipe]. Pipes run strictly in order
and communicate only through the shared [context::Artifacts] record on
the [context::Context]. A pipe can elect not to run by returning a skip
error, which the pipeline treats as success-with-continuation rather
than failure.

The pipeline is split into two stages:

* A *validation* stage that reads configuration only and reports
  field-level problems before any external tool runs.
* An *execution* stage (Build → Sign → Notarize → Archive → Release →
  Homebrew) that produces and publishes artifacts.

Configuration comes from a declarative YAML file. String values may
reference environment variables with `env(NAME)` fragments; expansion
is tolerant (a missing variable is left verbatim) so that commands which
do not need a given secret still work, and the validation stage reports
exactly which field references an unset variable.

All interaction with Apple tooling happens by invoking the command line
tools (`xcodebuild`, `codesign`, `security`, `xcrun`, `spctl`, `ditto`,
`hdiutil`). This crate deliberately does not reimplement any of them:
its value is the composition contract between the stages and the
actionable errors it surfaces when a stage fails.
*/

pub mod cask;
pub mod codesign;
pub mod config;
pub mod context;
pub mod envsubst;
pub mod error;
pub mod github;
pub mod gitinfo;
pub mod logging;
pub mod notary;
pub mod packaging;
pub mod pipeline;
pub mod pipes;
pub mod validate;
pub mod xcodebuild;

#[cfg(test)]
pub mod testutil;

pub use crate::error::{AppleReleaseError, Result};
