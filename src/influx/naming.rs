//! Mapping of the dot-delimited metric namespace onto measurements.

/// Split a metric name into `(measurement, field_prefix)`.
///
/// The last dot-delimited segment becomes the field prefix; everything before
/// it, with dots turned into `_`, is the measurement. A name without dots is
/// a measurement with an empty prefix. Empty segments are kept as-is.
///
/// ```text
/// "a"       -> ("a", "")
/// "a.b"     -> ("a", "b")
/// "a.b.c"   -> ("a_b", "c")
/// "a.b.c.d" -> ("a_b_c", "d")
/// ```
pub fn split(name: &str) -> (String, String) {
    match name.rsplit_once('.') {
        None => (name.to_string(), String::new()),
        Some((head, tail)) => (head.replace('.', "_"), tail.to_string()),
    }
}

/// `prefix_name`, or just `name` when there is no prefix.
pub fn field_name(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}_{name}")
    }
}

/// Ensure a non-empty measurement prefix ends with `_`.
pub fn normalize_prefix(prefix: &str) -> String {
    if prefix.is_empty() || prefix.ends_with('_') {
        prefix.to_string()
    } else {
        format!("{prefix}_")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(name: &str) -> (String, String) {
        split(name)
    }

    #[test]
    fn split_by_dot_count() {
        assert_eq!(s("a"), ("a".into(), "".into()));
        assert_eq!(s("a.b"), ("a".into(), "b".into()));
        assert_eq!(s("a.b.c"), ("a_b".into(), "c".into()));
        assert_eq!(s("a.b.c.d"), ("a_b_c".into(), "d".into()));
    }

    #[test]
    fn sibling_names_share_a_measurement() {
        assert_eq!(s("endpoint.reqs").0, s("endpoint.latency").0);
        assert_eq!(s("endpoint.reqs").1, "reqs");
        assert_eq!(s("endpoint.latency").1, "latency");
    }

    #[test]
    fn degenerate_names_fall_out_of_the_split() {
        assert_eq!(s(""), ("".into(), "".into()));
        assert_eq!(s(".a"), ("".into(), "a".into()));
        assert_eq!(s("a."), ("a".into(), "".into()));
        assert_eq!(s("a..b"), ("a_".into(), "b".into()));
    }

    #[test]
    fn field_names() {
        assert_eq!(field_name("", "x"), "x");
        assert_eq!(field_name("p", "x"), "p_x");
        assert_eq!(field_name(&field_name("reqs", "meter"), "m1"), "reqs_meter_m1");
    }

    #[test]
    fn prefix_gets_trailing_underscore() {
        assert_eq!(normalize_prefix(""), "");
        assert_eq!(normalize_prefix("namespace"), "namespace_");
        assert_eq!(normalize_prefix("namespace_"), "namespace_");
    }
}
