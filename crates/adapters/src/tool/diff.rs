// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unified diff parsing and validation.
//!
//! The runtime uses this to enforce the diff-only invariant: a result
//! claiming `output_kind = diff` must carry a non-empty diff that parses
//! and stays inside the task's path allow-list.

use serde::{Deserialize, Serialize};

/// What a parsed diff touches.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiffStats {
    pub files: Vec<String>,
    pub added_lines: u64,
    pub removed_lines: u64,
    pub hunks: u64,
}

/// Evidence of diff validation, carried on the tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffValidation {
    pub is_valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub files_checked: Vec<String>,
}

impl DiffValidation {
    pub fn ok(files_checked: Vec<String>) -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            files_checked,
        }
    }

    pub fn rejected(errors: Vec<String>) -> Self {
        Self {
            is_valid: false,
            errors,
            warnings: Vec::new(),
            files_checked: Vec::new(),
        }
    }
}

/// Extract the path from a `+++ b/...` or `--- a/...` header line.
fn header_path(line: &str) -> Option<&str> {
    let rest = line
        .strip_prefix("+++ ")
        .or_else(|| line.strip_prefix("--- "))?;
    let rest = rest.trim_end();
    if rest == "/dev/null" {
        return None;
    }
    let rest = rest
        .strip_prefix("a/")
        .or_else(|| rest.strip_prefix("b/"))
        .unwrap_or(rest);
    // Header may carry a trailing tab + timestamp.
    Some(rest.split('\t').next().unwrap_or(rest))
}

/// Parse a unified diff. Returns `None` when the text is empty or carries
/// no file headers and no hunks.
pub fn parse_unified_diff(diff: &str) -> Option<DiffStats> {
    if diff.trim().is_empty() {
        return None;
    }
    let mut stats = DiffStats::default();
    let mut saw_header = false;
    for line in diff.lines() {
        if line.starts_with("diff --git") {
            saw_header = true;
            continue;
        }
        if line.starts_with("+++ ") || line.starts_with("--- ") {
            saw_header = true;
            if line.starts_with("+++ ") {
                if let Some(path) = header_path(line) {
                    if !stats.files.iter().any(|f| f == path) {
                        stats.files.push(path.to_string());
                    }
                }
            }
            continue;
        }
        if line.starts_with("@@") {
            stats.hunks += 1;
            continue;
        }
        if stats.hunks > 0 {
            if line.starts_with('+') {
                stats.added_lines += 1;
            } else if line.starts_with('-') {
                stats.removed_lines += 1;
            }
        }
    }
    if !saw_header || stats.hunks == 0 {
        return None;
    }
    Some(stats)
}

/// Whether `path` falls under any allow-list prefix. An empty allow-list
/// means no restriction.
fn path_allowed(path: &str, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    allowed.iter().any(|prefix| {
        path == prefix
            || path.starts_with(&format!("{}/", prefix.trim_end_matches('/')))
    })
}

/// Validate a diff against the task's path constraints.
pub fn validate_diff(
    diff: &str,
    allowed_paths: &[String],
    forbidden_paths: &[String],
) -> DiffValidation {
    let Some(stats) = parse_unified_diff(diff) else {
        return DiffValidation::rejected(vec![
            "diff is empty or not a parseable unified diff".to_string(),
        ]);
    };

    let mut errors = Vec::new();
    for file in &stats.files {
        if !path_allowed(file, allowed_paths) {
            errors.push(format!("path outside allow-list: {file}"));
        }
        if forbidden_paths
            .iter()
            .any(|p| file == p || file.starts_with(&format!("{}/", p.trim_end_matches('/'))))
        {
            errors.push(format!("path is forbidden: {file}"));
        }
    }

    if errors.is_empty() {
        DiffValidation::ok(stats.files)
    } else {
        DiffValidation {
            is_valid: false,
            errors,
            warnings: Vec::new(),
            files_checked: stats.files,
        }
    }
}

#[cfg(test)]
#[path = "diff_tests.rs"]
mod tests;
