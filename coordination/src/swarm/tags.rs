//! Tag-naming contract (§4.4.6). Pure string functions, deliberately
//! free of any executor/retry/verify logic so the naming rules can be
//! tested in isolation and bit-stably.

/// `T-{op}-{i}` for map-like operations; `T-reduce` (no index) for reduce.
pub fn base_tag(swarm_tag: &str, op: &str, item_index: Option<usize>) -> String {
    match item_index {
        Some(i) => format!("{swarm_tag}-{op}-{i}"),
        None => format!("{swarm_tag}-{op}"),
    }
}

/// Applies a verify-retry suffix to a base tag: `v=None` leaves it
/// untouched (first verify attempt), `v=Some(k)` appends `-vr{k}`.
pub fn with_verify_retry(base: &str, verify_retry: Option<u32>) -> String {
    match verify_retry {
        None => base.to_string(),
        Some(v) => format!("{base}-vr{v}"),
    }
}

/// Appends an error-retry suffix. `-vr` must always precede `-er` within one
/// verify attempt, which holds automatically as long as callers apply
/// `with_verify_retry` before this.
pub fn with_error_retry(tag: &str, error_retry: u32) -> String {
    format!("{tag}-er{error_retry}")
}

/// Verifier tag = worker tag + `-verifier`.
pub fn verifier_tag(worker_tag: &str) -> String {
    format!("{worker_tag}-verifier")
}

/// BestOf candidate tag. `base` is `None` for a standalone `bestOf` call
/// (the `-{op}-{i}` segment is omitted per §4.4.6).
pub fn bestof_candidate_tag(base: Option<&str>, candidate_index: usize) -> String {
    match base {
        Some(b) => format!("{b}-bestof-cand-{candidate_index}"),
        None => format!("bestof-cand-{candidate_index}"),
    }
}

/// BestOf judge tag, mirroring `bestof_candidate_tag`'s base handling.
pub fn bestof_judge_tag(base: Option<&str>) -> String {
    match base {
        Some(b) => format!("{b}-bestof-judge"),
        None => "bestof-judge".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_m3_tags() {
        let base = base_tag("T", "map", Some(0));
        assert_eq!(base, "T-map-0");
        let vr1 = with_verify_retry(&base, Some(1));
        assert_eq!(vr1, "T-map-0-vr1");
        assert_eq!(verifier_tag(&base), "T-map-0-verifier");
        assert_eq!(verifier_tag(&vr1), "T-map-0-vr1-verifier");
    }

    #[test]
    fn scenario_m4_error_retry_under_verify() {
        let base = base_tag("T", "map", Some(0));
        let vr1 = with_verify_retry(&base, Some(1));
        let er1 = with_error_retry(&vr1, 1);
        assert_eq!(er1, "T-map-0-vr1-er1");
    }

    #[test]
    fn error_retry_without_verify() {
        let base = base_tag("T", "map", Some(0));
        assert_eq!(with_error_retry(&base, 1), "T-map-0-er1");
    }

    #[test]
    fn bestof_tags_for_map_item() {
        let base = base_tag("T", "map", Some(2));
        assert_eq!(bestof_candidate_tag(Some(&base), 3), "T-map-2-bestof-cand-3");
        assert_eq!(bestof_judge_tag(Some(&base)), "T-map-2-bestof-judge");
    }

    #[test]
    fn bestof_tags_standalone_omit_op_segment() {
        assert_eq!(bestof_candidate_tag(None, 0), "bestof-cand-0");
        assert_eq!(bestof_judge_tag(None), "bestof-judge");
    }

    #[test]
    fn reduce_tag_has_no_index() {
        assert_eq!(base_tag("T", "reduce", None), "T-reduce");
    }
}
