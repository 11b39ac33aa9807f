/// Round a monetary amount to 2 decimal places.
pub fn round2(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Format a monetary amount the way the carrier wire format expects it:
/// rounded to 2 decimals, no trailing ".00" noise for whole amounts.
pub fn amount_string(amount: f64) -> String {
    let rounded = round2(amount);
    if (rounded - rounded.trunc()).abs() < f64::EPSILON {
        format!("{}", rounded as i64)
    } else {
        format!("{:.2}", rounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(599.999), 600.0);
        assert_eq!(round2(10.004), 10.0);
        assert_eq!(round2(1.239), 1.24);
    }

    #[test]
    fn test_amount_string() {
        assert_eq!(amount_string(599.0), "599");
        assert_eq!(amount_string(599.5), "599.50");
        assert_eq!(amount_string(0.0), "0");
    }
}
