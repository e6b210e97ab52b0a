//! MQTT wildcard subsumption (spec §4.1 step 1, §8 invariant 1).
//!
//! A filter `F'` "covers" `F` when every topic matched by `F` is also
//! matched by `F'` — e.g. `a/+/c` covers `a/b/c` but not `a/b/c/d`, and
//! `a/#` covers both. Segment-by-segment comparison with `+` matching
//! exactly one segment and `#` matching any trailing suffix (and only
//! legal as the final segment per the MQTT spec).

pub fn segments(filter: &str) -> impl Iterator<Item = &str> {
    filter.split('/')
}

/// True if `candidate` (`F'`) covers `other` (`F`): every topic matched by
/// `other` is also matched by `candidate`.
pub fn covers(candidate: &str, other: &str) -> bool {
    if candidate == other {
        return true;
    }
    let mut cand = segments(candidate);
    let mut oth = segments(other);
    loop {
        match (cand.next(), oth.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => continue,
            (Some(c), Some(o)) if c == o => continue,
            (Some(_), Some(_)) => return false,
            (None, None) => return true,
            // candidate ran out before other (and didn't end in `#`): no coverage.
            (None, Some(_)) => return false,
            // other ran out before candidate: candidate is more specific, no coverage.
            (Some(_), None) => return false,
        }
    }
}

/// Whether a literal `topic` matches a subscription `filter` (for dispatch,
/// not filter-to-filter subsumption).
pub fn matches(filter: &str, topic: &str) -> bool {
    let mut f = segments(filter);
    let mut t = segments(topic);
    loop {
        match (f.next(), t.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => continue,
            (Some(fs), Some(ts)) if fs == ts => continue,
            (Some(_), Some(_)) => return false,
            (None, None) => return true,
            (None, Some(_)) | (Some(_), None) => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_filters_cover_each_other() {
        assert!(covers("a/b/c", "a/b/c"));
    }

    #[test]
    fn plus_wildcard_covers_single_segment() {
        assert!(covers("a/+/c", "a/b/c"));
        assert!(!covers("a/+/c", "a/b/c/d"));
    }

    #[test]
    fn hash_wildcard_covers_any_suffix() {
        assert!(covers("a/#", "a/b/c"));
        assert!(covers("a/#", "a"));
        assert!(!covers("a/b/#", "a/c"));
    }

    #[test]
    fn more_specific_does_not_cover_more_general() {
        assert!(!covers("a/b/c", "a/+/c"));
        assert!(!covers("a/b/c", "a/#"));
    }

    #[test]
    fn literal_topic_matching() {
        assert!(matches("spark/+/status", "spark/dev1/status"));
        assert!(matches("spark/#", "spark/dev1/status/detail"));
        assert!(!matches("spark/+/status", "spark/dev1/status/detail"));
    }
}
