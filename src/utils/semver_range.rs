//! npm-style semver range checks.
//!
//! The `semver` crate parses Cargo-flavoured requirements (comma separated
//! comparators, no `||`). npm ranges are rewritten into that shape before
//! parsing: `||` alternatives are checked one by one, space separated
//! comparators are joined with commas and hyphen ranges become a
//! `>=lo, <=hi` pair.

use semver::VersionReq;

const OPERATOR_CHARS: &[char] = &['<', '>', '=', '~', '^'];

/// Returns `true` if `input` is a usable npm version range.
///
/// ```
/// use vite_plugin_registry::utils::semver_range::is_valid_range;
///
/// assert!(is_valid_range("^4.0.0"));
/// assert!(is_valid_range("^3.0.0 || ^4.0.0"));
/// assert!(!is_valid_range("workspace:*"));
/// ```
pub fn is_valid_range(input: &str) -> bool {
    let input = input.trim();
    if input.is_empty() {
        return false;
    }
    input
        .split("||")
        .all(|alternative| is_valid_comparator_set(alternative.trim()))
}

fn is_valid_comparator_set(set: &str) -> bool {
    if set.is_empty() {
        return false;
    }

    if let Some((low, high)) = set.split_once(" - ") {
        return is_valid_bound(low.trim()) && is_valid_bound(high.trim());
    }

    let comparators = join_operators(set);
    if comparators.is_empty() {
        return false;
    }
    VersionReq::parse(&comparators.join(", ")).is_ok()
}

/// Re-attaches operators written with a space before the version
/// (`>= 1.0.0`) and drops a `v` prefix from versions.
fn join_operators(set: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut pending = String::new();

    for token in set.split_whitespace() {
        if token.chars().all(|c| OPERATOR_CHARS.contains(&c)) {
            pending.push_str(token);
            continue;
        }
        let op_len = token.len() - token.trim_start_matches(OPERATOR_CHARS).len();
        let (op, version) = token.split_at(op_len);
        let version = version.strip_prefix('v').unwrap_or(version);
        out.push(format!("{}{}{}", pending, op, version));
        pending.clear();
    }

    if !pending.is_empty() {
        // Dangling operator without a version.
        out.push(pending);
    }
    out
}

/// A hyphen-range bound: a full or partial version, wildcards allowed at the end.
fn is_valid_bound(bound: &str) -> bool {
    let bound = bound.strip_prefix('v').unwrap_or(bound);
    let concrete: Vec<&str> = bound
        .split('.')
        .take_while(|part| !matches!(*part, "x" | "X" | "*"))
        .collect();
    if concrete.is_empty() {
        return bound == "*" || bound.eq_ignore_ascii_case("x");
    }
    VersionReq::parse(&format!(">={}", concrete.join("."))).is_ok()
}
