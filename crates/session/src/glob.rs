// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wildcard expansion for artifact source paths.
//!
//! Sources containing `*` are expanded against the filesystem; `**` spans
//! any number of path components. The wildcard-free base of a pattern
//! decides how much of each match's directory is reproduced under the
//! destination.

use std::path::PathBuf;

use crate::error::UploadError;

/// A source path is a pattern iff it contains `*`.
pub(crate) fn has_wildcard(path: &str) -> bool {
    path.contains('*')
}

/// The base directory of a wildcard pattern, always `""` or ending in `/`.
///
/// Take the pattern up to the first `*`, drop the (possibly partial)
/// component it sits in, then drop one more whole component. A match's
/// destination keeps everything below this base, so the last literal
/// directory before the wildcard reappears under the destination:
/// `src/hello/*.txt` has base `src/` and lands matches under `hello/`.
pub(crate) fn wildcard_base(pattern: &str) -> &str {
    let cut = pattern.find('*').unwrap_or(pattern.len());
    let Some(dir_end) = pattern[..cut].rfind('/') else {
        return "";
    };
    match pattern[..dir_end].rfind('/') {
        Some(i) => &pattern[..i + 1],
        None => "",
    }
}

/// Expand a pattern against the filesystem, lexicographically sorted.
///
/// Unreadable matches are skipped; only the pattern itself can error.
pub(crate) fn expand(pattern: &str) -> Result<Vec<PathBuf>, UploadError> {
    let paths = glob::glob(pattern).map_err(|e| UploadError::Pattern {
        pattern: pattern.to_string(),
        message: e.msg.to_string(),
    })?;
    let mut matches: Vec<PathBuf> = paths.filter_map(Result::ok).collect();
    matches.sort();
    Ok(matches)
}

/// Join two path fragments with `/`, ignoring empty fragments.
pub(crate) fn join_slash(a: &str, b: &str) -> String {
    match (a.is_empty(), b.is_empty()) {
        (true, _) => b.to_string(),
        (_, true) => a.to_string(),
        _ => format!("{}/{}", a.trim_end_matches('/'), b),
    }
}

#[cfg(test)]
#[path = "glob_tests.rs"]
mod tests;
