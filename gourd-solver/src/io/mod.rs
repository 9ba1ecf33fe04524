//! Problem and solution file formats.

pub mod cip;
pub mod sol;

/// Canonical number rendering shared by the writers so written files re-read byte-identically.
pub(crate) fn fmt_num(value: f64) -> String {
    if value >= 1e20 {
        "+inf".to_owned()
    } else if value <= -1e20 {
        "-inf".to_owned()
    } else if value == value.trunc() && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

pub(crate) fn parse_num(text: &str) -> Option<f64> {
    match text.trim() {
        "+inf" | "inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        other => other.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_round_trip_through_rendering() {
        for value in [0.0, -3.0, 2.5, 1e14, -0.125, f64::INFINITY, f64::NEG_INFINITY] {
            let rendered = fmt_num(value);
            assert_eq!(Some(value), parse_num(&rendered), "value {value}");
            assert_eq!(rendered, fmt_num(parse_num(&rendered).unwrap()));
        }
    }
}
