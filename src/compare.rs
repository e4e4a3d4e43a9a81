//! Pass/fail decision for one executed case.

/// Type label whose values are compared numerically.
pub const NUMBER_TYPE: &str = "Number";

/// Decimal places kept when comparing numbers.
pub const DECIMAL_PLACES: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    /// The evaluator reported a different type label.
    TypeMismatch,
    /// The evaluator reported no type label at all.
    MissingType,
    ValueMismatch,
}

impl Verdict {
    pub fn is_pass(self) -> bool {
        self == Verdict::Pass
    }
}

pub fn compare(
    expected_output: &str,
    expected_output_type: &str,
    actual_output: &str,
    actual_output_type: Option<&str>,
) -> bool {
    judge(
        expected_output,
        expected_output_type,
        actual_output,
        actual_output_type,
    )
    .is_pass()
}

pub fn judge(
    expected_output: &str,
    expected_output_type: &str,
    actual_output: &str,
    actual_output_type: Option<&str>,
) -> Verdict {
    let Some(actual_type) = actual_output_type else {
        return Verdict::MissingType;
    };
    if actual_type != expected_output_type {
        return Verdict::TypeMismatch;
    }
    let equal = if expected_output_type == NUMBER_TYPE {
        numbers_equal(expected_output, actual_output)
    } else {
        expected_output == actual_output
    };
    if equal {
        Verdict::Pass
    } else {
        Verdict::ValueMismatch
    }
}

fn numbers_equal(expected: &str, actual: &str) -> bool {
    match (canonical_number(expected), canonical_number(actual)) {
        (Some(e), Some(a)) => e == a,
        // Not numbers after all: only identical text matches
        _ => expected == actual,
    }
}

/// Canonical text of a number rounded to [`DECIMAL_PLACES`].
///
/// Rounding happens on the shortest decimal expansion of the parsed `f64`,
/// so magnitudes beyond 1e15 keep all their integer digits.
pub fn canonical_number(text: &str) -> Option<String> {
    let value: f64 = text.parse().ok()?;
    if !value.is_finite() {
        return Some(value.to_string());
    }
    Some(round_decimal(&value.to_string(), DECIMAL_PLACES))
}

/// Rounds a plain decimal string half away from zero and drops trailing
/// fractional zeros. `-0` comes out as `0`.
fn round_decimal(repr: &str, places: usize) -> String {
    let (negative, magnitude) = match repr.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, repr),
    };
    let (int_part, frac_part) = magnitude.split_once('.').unwrap_or((magnitude, ""));
    let mut int_digits: Vec<u8> = int_part.bytes().map(|b| b - b'0').collect();
    let mut frac_digits: Vec<u8> = frac_part.bytes().map(|b| b - b'0').collect();

    let round_up = frac_digits.len() > places && frac_digits[places] >= 5;
    frac_digits.truncate(places);
    if round_up {
        let mut carry = true;
        for d in frac_digits.iter_mut().rev().chain(int_digits.iter_mut().rev()) {
            if *d == 9 {
                *d = 0;
            } else {
                *d += 1;
                carry = false;
                break;
            }
        }
        if carry {
            int_digits.insert(0, 1);
        }
    }
    while frac_digits.last() == Some(&0) {
        frac_digits.pop();
    }
    while int_digits.len() > 1 && int_digits[0] == 0 {
        int_digits.remove(0);
    }
    if int_digits.is_empty() {
        int_digits.push(0);
    }

    let is_zero = frac_digits.is_empty() && int_digits.iter().all(|&d| d == 0);
    let mut out = String::with_capacity(int_digits.len() + frac_digits.len() + 2);
    if negative && !is_zero {
        out.push('-');
    }
    out.extend(int_digits.iter().map(|&d| char::from(b'0' + d)));
    if !frac_digits.is_empty() {
        out.push('.');
        out.extend(frac_digits.iter().map(|&d| char::from(b'0' + d)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_noise_is_absorbed() {
        let actual = (0.1_f64 + 0.2).to_string();
        assert_eq!(actual, "0.30000000000000004");
        assert!(compare("0.3", "Number", &actual, Some("Number")));
        assert!(compare("0.30000000000000004", "Number", &actual, Some("Number")));
    }

    #[test]
    fn type_label_must_match() {
        assert_eq!(judge("5", "Number", "5", Some("String")), Verdict::TypeMismatch);
        assert_eq!(judge("5", "Number", "5", None), Verdict::MissingType);
    }

    #[test]
    fn non_numbers_compare_exactly() {
        assert!(compare("abc", "String", "abc", Some("String")));
        assert!(!compare("abc", "String", "abc ", Some("String")));
        assert!(!compare("True", "Boolean", "true", Some("Boolean")));
        assert!(!compare("0.3", "String", "0.30", Some("String")));
    }

    #[test]
    fn number_forms_are_normalised() {
        assert!(compare("7", "Number", "7.0", Some("Number")));
        assert!(compare("1e3", "Number", "1000", Some("Number")));
        assert!(compare("0", "Number", "-0", Some("Number")));
        assert!(!compare("7", "Number", "8", Some("Number")));
    }

    #[test]
    fn unparsable_numbers_fall_back_to_text() {
        assert!(compare("abc", "Number", "abc", Some("Number")));
        assert!(!compare("7", "Number", "seven", Some("Number")));
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(round_decimal("0.0000000000000005", 15), "0.000000000000001");
        assert_eq!(round_decimal("-0.0000000000000005", 15), "-0.000000000000001");
        assert_eq!(round_decimal("0.0000000000000004", 15), "0");
        assert_eq!(round_decimal("-0.0000000000000004", 15), "0");
        assert_eq!(round_decimal("9.9999999999999999", 15), "10");
        assert_eq!(round_decimal("12.50", 15), "12.5");
    }

    #[test]
    fn large_magnitudes_keep_integer_digits() {
        assert_eq!(canonical_number("1e20").as_deref(), Some("100000000000000000000"));
        assert!(compare("1e20", "Number", "100000000000000000000", Some("Number")));
        assert!(!compare("1e20", "Number", "2e20", Some("Number")));
        assert_eq!(
            canonical_number("123456789.123456789012").as_deref(),
            Some("123456789.12345679")
        );
    }

    #[test]
    fn non_finite_values() {
        assert!(compare("inf", "Number", "inf", Some("Number")));
        assert!(compare("NaN", "Number", "NaN", Some("Number")));
        assert!(!compare("inf", "Number", "-inf", Some("Number")));
    }
}
