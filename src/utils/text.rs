//! Fixed-width text helpers shared by bank files and government reports.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::domain::round2;

/// Upper-cases and strips accents; anything outside `[A-Z0-9 ]` becomes a space.
pub fn fold_upper(s: &str) -> String {
    let folded: String = s
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' | 'Á' | 'À' | 'Ä' | 'Â' => 'A',
            'é' | 'è' | 'ë' | 'ê' | 'É' | 'È' | 'Ë' | 'Ê' => 'E',
            'í' | 'ì' | 'ï' | 'î' | 'Í' | 'Ì' | 'Ï' | 'Î' => 'I',
            'ó' | 'ò' | 'ö' | 'ô' | 'Ó' | 'Ò' | 'Ö' | 'Ô' => 'O',
            'ú' | 'ù' | 'ü' | 'û' | 'Ú' | 'Ù' | 'Ü' | 'Û' => 'U',
            'ñ' | 'Ñ' => 'N',
            c if c.is_ascii_alphanumeric() => c.to_ascii_uppercase(),
            _ => ' ',
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Left-aligned, space padded, truncated to `width` characters.
pub fn pad_right(s: &str, width: usize) -> String {
    let truncated: String = s.chars().take(width).collect();
    format!("{truncated:<width$}")
}

/// Right-aligned, zero padded. Returns `None` if the value does not fit.
pub fn pad_zeros(digits: &str, width: usize) -> Option<String> {
    if digits.len() > width {
        return None;
    }
    Some(format!("{digits:0>width$}"))
}

/// Amount in cents as an unsigned integer (`1234.5` -> `123450`).
pub fn cents(amount: Decimal) -> Option<u64> {
    (round2(amount) * Decimal::ONE_HUNDRED).trunc().to_u64()
}

/// Two decimals with a comma separator, as used in Venezuelan CSV books.
pub fn decimal_comma(amount: Decimal) -> String {
    format!("{:.2}", round2(amount)).replace('.', ",")
}

/// Two decimals with a dot separator.
pub fn decimal_dot(amount: Decimal) -> String {
    format!("{:.2}", round2(amount))
}

/// Escapes the five XML special characters.
pub fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Quotes a CSV field when it contains the separator, quotes or line breaks.
pub fn csv_field(s: &str, separator: char) -> String {
    if s.contains(separator) || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn folds_accents_and_punctuation() {
        assert_eq!(fold_upper("José Ñúñez-Peña"), "JOSE NUNEZ PENA");
        assert_eq!(fold_upper("  maría   de los ángeles "), "MARIA DE LOS ANGELES");
    }

    #[test]
    fn pads_and_truncates() {
        assert_eq!(pad_right("ABC", 5), "ABC  ");
        assert_eq!(pad_right("ABCDEFG", 3), "ABC");
        assert_eq!(pad_zeros("42", 5).as_deref(), Some("00042"));
        assert_eq!(pad_zeros("123456", 5), None);
    }

    #[test]
    fn converts_to_cents() {
        assert_eq!(cents(dec!(1234.5)), Some(123450));
        assert_eq!(cents(dec!(0.005)), Some(1));
        assert_eq!(cents(dec!(-1)), None);
    }

    #[test]
    fn formats_decimals() {
        assert_eq!(decimal_comma(dec!(1234.5)), "1234,50");
        assert_eq!(decimal_dot(dec!(7)), "7.00");
    }

    #[test]
    fn escapes_xml_and_csv() {
        assert_eq!(xml_escape("A&B <C>"), "A&amp;B &lt;C&gt;");
        assert_eq!(csv_field("a;b", ';'), "\"a;b\"");
        assert_eq!(csv_field("plain", ';'), "plain");
    }
}
