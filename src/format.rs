const UNITS: [(u64, &str); 3] = [(1_000_000_000, "b"), (1_000_000, "m"), (1_000, "k")];

/// Compact vote and subscriber counts: `2340` becomes `2.3k`. One decimal,
/// truncated rather than rounded, and dropped when it is zero.
pub fn abbreviate_number(value: i64) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let magnitude = value.unsigned_abs();
    for (unit, suffix) in UNITS {
        if magnitude >= unit {
            let whole = magnitude / unit;
            let tenth = (magnitude % unit) * 10 / unit;
            return if tenth == 0 {
                format!("{sign}{whole}{suffix}")
            } else {
                format!("{sign}{whole}.{tenth}{suffix}")
            };
        }
    }
    format!("{sign}{magnitude}")
}
