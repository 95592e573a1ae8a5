// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Field-level validation helpers shared by the check pipes.

use {
    crate::error::{AppleReleaseError, Result},
    std::path::{Component, Path},
};

/// Validate that a string field is not empty.
pub fn required_string(value: &str, field: &str) -> Result<()> {
    if value.is_empty() {
        return Err(AppleReleaseError::Validation(format!("{} is required", field)));
    }

    Ok(())
}

/// Validate that a list field has at least one item.
pub fn required_slice(values: &[String], field: &str) -> Result<()> {
    if values.is_empty() {
        return Err(AppleReleaseError::Validation(format!(
            "{} requires at least one item",
            field
        )));
    }

    Ok(())
}

/// Validate that every item of a list is in the allowed set.
pub fn all_one_of(values: &[String], allowed: &[&str], field: &str) -> Result<()> {
    for value in values {
        if !allowed.contains(&value.as_str()) {
            return Err(AppleReleaseError::Validation(format!(
                "invalid {}: {}",
                field, value
            )));
        }
    }

    Ok(())
}

/// Whether a path is lexically local: relative, non-empty, and without
/// `.` or `..` components. Values that become path components of the
/// output directory must satisfy this so configuration or git tags
/// cannot traverse outside `dist/`.
pub fn is_local_path(path: &str) -> bool {
    if path.is_empty() {
        return false;
    }

    let path = Path::new(path);
    if path.is_absolute() {
        return false;
    }

    path.components()
        .all(|c| matches!(c, Component::Normal(_)))
}

/// Validate that a field value is a local path, with a traversal-naming error.
pub fn required_local_path(value: &str, field: &str) -> Result<()> {
    if !is_local_path(value) {
        return Err(AppleReleaseError::Validation(format!(
            "{} contains a path traversal or absolute path: {:?}",
            field, value
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_string_rejects_empty() {
        assert!(required_string("", "project.name").is_err());
        assert!(required_string("MyApp", "project.name").is_ok());

        let err = required_string("", "sign.identity").unwrap_err();
        assert_eq!(err.to_string(), "sign.identity is required");
    }

    #[test]
    fn required_slice_rejects_empty() {
        assert!(required_slice(&[], "archive.formats").is_err());
        assert!(required_slice(&["zip".to_string()], "archive.formats").is_ok());
    }

    #[test]
    fn all_one_of_names_offending_value() {
        let values = vec!["zip".to_string(), "tar".to_string()];
        let err = all_one_of(&values, &["dmg", "zip", "app"], "archive.formats").unwrap_err();
        assert_eq!(err.to_string(), "invalid archive.formats: tar");
    }

    #[test]
    fn local_path_rules() {
        assert!(is_local_path("MyApp"));
        assert!(is_local_path("MyApp.xcworkspace"));
        assert!(is_local_path("sub/dir"));
        assert!(!is_local_path(""));
        assert!(!is_local_path("/tmp/x.xcworkspace"));
        assert!(!is_local_path("../evil"));
        assert!(!is_local_path("a/../../b"));
        assert!(!is_local_path("."));
    }

    #[test]
    fn required_local_path_names_field() {
        let err = required_local_path("../evil", "project.name").unwrap_err();
        assert!(err.to_string().contains("project.name"));
        assert!(err.to_string().contains("../evil"));
    }
}
