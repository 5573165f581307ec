//! Assessment name and version validation and ordering.

use regex::Regex;
use std::cmp::Ordering;
use std::sync::OnceLock;

fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

/// Returns true if `name` is a valid assessment name.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    static NAME: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&NAME, r"^[A-Za-z][A-Za-z0-9_.-]*$").is_some_and(|re| re.is_match(name))
}

/// Returns true if `version` is dotted numeric with an optional suffix,
/// e.g. `1`, `1.2.0`, `2.0.0-rc.1`, `1.0+build.5`.
#[must_use]
pub fn is_valid_version(version: &str) -> bool {
    static VERSION: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&VERSION, r"^\d+(\.\d+)*([-+][0-9A-Za-z.-]+)?$").is_some_and(|re| re.is_match(version))
}

fn split_version(version: &str) -> (Vec<u64>, Option<&str>) {
    let (core, suffix) = match version.find(['-', '+']) {
        Some(i) => (&version[..i], Some(&version[i..])),
        None => (version, None),
    };
    let parts = core
        .split('.')
        .map(|p| p.parse::<u64>().unwrap_or(0))
        .collect();
    (parts, suffix)
}

/// Orders versions numerically by component.
///
/// Missing components count as zero. A pre-release (`-…`) sorts before the
/// plain release. Remaining ties fall back to string order, so the result
/// is only `Equal` for identical strings.
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let (a_parts, a_suffix) = split_version(a);
    let (b_parts, b_suffix) = split_version(b);
    let width = a_parts.len().max(b_parts.len());

    for i in 0..width {
        let x = a_parts.get(i).copied().unwrap_or(0);
        let y = b_parts.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => {}
            other => return other,
        }
    }

    let pre = |s: Option<&str>| s.is_some_and(|s| s.starts_with('-'));
    match (pre(a_suffix), pre(b_suffix)) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.cmp(b),
    }
}
