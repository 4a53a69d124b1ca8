// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Qualified name handling
//!
//! Catalog names are `.`-separated. A name is rooted when it is fully
//! qualified from the top level; any trailing run of segments forms a valid
//! unrooted suffix. The persistent name index stores one row per suffix
//! depth so a rooted lookup is a single probe.

/// Qualifier separator
pub const QUALIFIER: char = '.';

/// Split a name into its segments
pub fn segments(name: &str) -> Vec<&str> {
    name.split(QUALIFIER).collect()
}

/// Number of segments in a name
pub fn depth(name: &str) -> usize {
    if name.is_empty() {
        0
    } else {
        name.matches(QUALIFIER).count() + 1
    }
}

/// Qualify `name` under `qualifier`
pub fn qualify(qualifier: &str, name: &str) -> String {
    if qualifier.is_empty() {
        name.to_string()
    } else {
        format!("{}{}{}", qualifier, QUALIFIER, name)
    }
}

/// Every suffix of a rooted name, deepest first
///
/// `"A.B.C"` yields `["A.B.C", "B.C", "C"]`. Each suffix is stored in the
/// name index at its own depth.
pub fn suffixes(name: &str) -> Vec<&str> {
    let mut result = vec![name];
    let mut rest = name;
    while let Some(pos) = rest.find(QUALIFIER) {
        rest = &rest[pos + 1..];
        result.push(rest);
    }
    result
}

/// Whether `candidate`'s rooted name ends in `suffix` on a segment boundary
pub fn matches_suffix(candidate: &str, suffix: &str, case_sensitive: bool) -> bool {
    let (candidate_cmp, suffix_cmp);
    let (candidate, suffix) = if case_sensitive {
        (candidate, suffix)
    } else {
        candidate_cmp = candidate.to_lowercase();
        suffix_cmp = suffix.to_lowercase();
        (candidate_cmp.as_str(), suffix_cmp.as_str())
    };
    if candidate == suffix {
        return true;
    }
    candidate
        .strip_suffix(suffix)
        .map_or(false, |rest| rest.ends_with(QUALIFIER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth() {
        assert_eq!(depth(""), 0);
        assert_eq!(depth("C"), 1);
        assert_eq!(depth("A.B.C"), 3);
    }

    #[test]
    fn test_suffixes_deepest_first() {
        assert_eq!(suffixes("A.B.C"), vec!["A.B.C", "B.C", "C"]);
        assert_eq!(suffixes("C"), vec!["C"]);
    }

    #[test]
    fn test_qualify() {
        assert_eq!(qualify("A.B", "C"), "A.B.C");
        assert_eq!(qualify("", "C"), "C");
    }

    #[test]
    fn test_matches_suffix_respects_boundaries() {
        assert!(matches_suffix("A.B.C", "B.C", true));
        assert!(matches_suffix("A.B.C", "A.B.C", true));
        // "C" ends "A.BC" but not on a segment boundary.
        assert!(!matches_suffix("A.BC", "C", true));
        assert!(matches_suffix("A.b.c", "B.C", false));
        assert!(!matches_suffix("A.b.c", "B.C", true));
    }
}
