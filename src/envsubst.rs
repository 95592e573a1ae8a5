// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Tolerant environment variable substitution for configuration values.

Configuration strings may embed `env(NAME)` fragments. Expansion happens
on the parsed YAML value tree before strict decoding so that later
validation can report *which field* still references an unset variable.

Expansion is tolerant: a fragment naming an unset variable is left
verbatim. [check_resolved] is the deferred, field-level complement that
turns a leftover fragment into an actionable error. The split exists so
that e.g. a local build works without notarization credentials being
set, while a release run still fails with a precise message.
*/

use {
    crate::error::{AppleReleaseError, Result},
    once_cell::sync::Lazy,
    regex::Regex,
    serde_yaml::Value,
};

/// Matches `env(NAME)` fragments. NAME is anything up to the closing paren.
static ENV_VAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"env\(([^)]+)\)").expect("invalid env var regex"));

/// Control characters that must not be injected into configuration
/// values. Newlines and tabs are permitted for multiline secrets.
static DISALLOWED_CONTROL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new("[\\x00-\\x08\\x0b\\x0c\\x0e-\\x1f\\x7f]").expect("invalid control char regex")
});

/// Expand `env(NAME)` fragments in all value leaves of a YAML tree.
///
/// Mapping keys are never rewritten. Missing variables leave the
/// fragment intact.
pub fn substitute_tree(value: &mut Value) -> Result<()> {
    match value {
        Value::String(s) => {
            *s = expand_string(s)?;
        }
        Value::Sequence(seq) => {
            for item in seq.iter_mut() {
                substitute_tree(item)?;
            }
        }
        Value::Mapping(map) => {
            for (_key, item) in map.iter_mut() {
                substitute_tree(item)?;
            }
        }
        _ => {}
    }

    Ok(())
}

/// Expand `env(NAME)` fragments in a single string.
///
/// Concatenation is supported: `prefix-env(A)-env(B)-suffix` expands
/// every fragment independently. Errors when a resolved value contains
/// disallowed control characters.
pub fn expand_string(input: &str) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut last = 0;

    for caps in ENV_VAR_RE.captures_iter(input) {
        let whole = caps.get(0).expect("capture group 0 always present");
        let name = &caps[1];

        out.push_str(&input[last..whole.start()]);

        match std::env::var_os(name) {
            Some(value) => {
                let value = value.to_string_lossy();
                if DISALLOWED_CONTROL_RE.is_match(&value) {
                    return Err(AppleReleaseError::EnvDisallowedControlChars(name.to_string()));
                }
                out.push_str(&value);
            }
            // Left unresolved; check_resolved reports it later.
            None => out.push_str(whole.as_str()),
        }

        last = whole.end();
    }

    out.push_str(&input[last..]);

    Ok(out)
}

/// Verify that a config value no longer contains `env(...)` references.
///
/// Called by check pipes after their skip guards, so that a skipped pipe
/// never blocks on its own unset credentials. The error names both the
/// field path and the variable.
pub fn check_resolved(value: &str, field: &str) -> Result<()> {
    if let Some(caps) = ENV_VAR_RE.captures(value) {
        return Err(AppleReleaseError::UnresolvedEnvVar {
            field: field.to_string(),
            name: caps[1].to_string(),
        });
    }

    Ok(())
}
