//! Display-name normalization and duplicate naming.
//!
//! # Invariants
//! - Stored names are trimmed and never blank.
//! - A duplicate is named `<base> (copy)`, then `<base> (copy 2)`, ... with
//!   the first free suffix among its new siblings.

use once_cell::sync::Lazy;
use regex::Regex;

static COPY_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<base>.*?) \(copy(?: (?P<index>\d+))?\)$").expect("valid copy suffix regex")
});

/// Trims `value`; returns `None` when nothing is left.
pub fn normalize_name(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

/// Strips an existing copy suffix so copies of copies share one base.
pub fn copy_base(name: &str) -> &str {
    COPY_SUFFIX_RE
        .captures(name)
        .and_then(|captures| captures.name("base"))
        .map_or(name, |base| base.as_str())
}

/// Returns the first free copy name for `source` among `siblings`.
pub fn next_copy_name<'a>(source: &str, siblings: impl IntoIterator<Item = &'a str>) -> String {
    let base = copy_base(source);
    let mut taken = Vec::new();
    for sibling in siblings {
        let Some(captures) = COPY_SUFFIX_RE.captures(sibling) else {
            continue;
        };
        if captures.name("base").map(|m| m.as_str()) != Some(base) {
            continue;
        }
        let index = match captures.name("index") {
            Some(index) => index.as_str().parse::<u32>().unwrap_or(0),
            None => 1,
        };
        taken.push(index);
    }

    let mut candidate = 1;
    while taken.contains(&candidate) {
        candidate += 1;
    }
    if candidate == 1 {
        format!("{base} (copy)")
    } else {
        format!("{base} (copy {candidate})")
    }
}
