//! Text normalization for scraped price and rating fields.
//!
//! Source pages use Turkish number formatting: `.` as the thousands
//! separator and `,` as the decimal separator ("1.234,56 TL").

use std::sync::OnceLock;

use regex::Regex;

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").unwrap())
}

/// Normalize a scraped price fragment to a decimal value.
///
/// Strips markup, the currency suffix and separators, then converts the
/// decimal comma. Unparseable input yields 0.0, which callers treat as
/// "drop this row".
pub fn clean_and_parse_price(raw: &str) -> f64 {
    let text = tag_re().replace_all(raw, "");
    let text = text
        .trim()
        .replace("TL", "")
        .replace('\u{a0}', "")
        .replace(' ', "")
        .replace('.', "")
        .replace(',', ".");
    text.parse::<f64>().unwrap_or(0.0)
}

/// Extract the digits of a string as an integer ("1.204 Değerlendirme" -> 1204).
pub fn digits_only(raw: &str) -> Option<u32> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Parse a comma-decimal rating text ("4,6" -> 4.6).
pub fn parse_decimal_comma(raw: &str) -> Option<f64> {
    let text = raw.trim().replace(',', ".");
    if text.is_empty() {
        return None;
    }
    text.parse().ok()
}

/// Derive a stable product id slug from a display name.
pub fn slugify_product_id(name: &str) -> String {
    let slug: String = name
        .to_lowercase()
        .replace(' ', "_")
        .chars()
        .take(25)
        .collect();
    slug.trim_matches('_').to_string()
}
