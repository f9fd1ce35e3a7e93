//! Best-effort star-state heuristics.
//!
//! Marketplaces render per-review star ratings as rows of icon elements
//! whose "filled" state is encoded in whatever their frontend framework
//! emits this month: class name fragments, inline fill/color styles, SVG
//! fill attributes or aria labels. None of this is a contract, so the
//! detection lives here as an isolated, fixture-tested heuristic that is
//! expected to need maintenance as the target markup drifts.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Selector};

/// Class fragments that mark a filled star.
const FILLED_CLASS_HINTS: &[&str] = &["fill", "active", "selected", "checked", "full"];

/// Inline-style fragments that mark a filled star.
const FILLED_STYLE_HINTS: &[&str] = &[
    "color", "fill", "rgb", "#", "opacity: 1", "opacity:1", "gold", "orange", "ffa500", "ffd700",
];

/// Aria-label fragments that mark a filled star (Turkish UIs included).
const FILLED_LABEL_HINTS: &[&str] = &["dolu", "filled", "full"];

fn width_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"width:\s*(\d+(?:\.\d+)?)%").unwrap())
}

/// Whether an element is rendered at all.
pub fn is_visible(el: &ElementRef) -> bool {
    let style = el.value().attr("style").unwrap_or("").to_lowercase();
    !(style.contains("display: none")
        || style.contains("display:none")
        || style.contains("visibility: hidden")
        || style.contains("visibility:hidden"))
}

/// Classify a single star element as filled.
pub fn is_filled_star(el: &ElementRef) -> bool {
    if !is_visible(el) {
        return false;
    }

    let class = el.value().attr("class").unwrap_or("").to_lowercase();
    if FILLED_CLASS_HINTS.iter().any(|k| class.contains(k)) {
        return true;
    }

    let style = el.value().attr("style").unwrap_or("").to_lowercase();
    if FILLED_STYLE_HINTS.iter().any(|k| style.contains(k)) {
        return true;
    }

    if let Some(fill) = el.value().attr("fill") {
        let fill = fill.to_lowercase();
        if !fill.is_empty() && fill != "none" && fill != "transparent" {
            return true;
        }
    }

    // SVG stars usually carry the state on an inner path
    let path_sel = Selector::parse("path").unwrap();
    for path in el.select(&path_sel) {
        if let Some(fill) = path.value().attr("fill") {
            let fill = fill.to_lowercase();
            if !fill.is_empty() && fill != "none" && fill != "transparent" {
                return true;
            }
        }
        let path_style = path.value().attr("style").unwrap_or("").to_lowercase();
        if path_style.contains("fill") && !path_style.contains("none") {
            return true;
        }
    }

    let label = el.value().attr("aria-label").unwrap_or("").to_lowercase();
    if FILLED_LABEL_HINTS.iter().any(|k| label.contains(k)) {
        return true;
    }

    // Last resort: a literal star glyph inside a non-trivial element
    let html = el.html();
    if (html.contains('★') || html.contains('⭐')) && html.len() > 10 {
        return true;
    }

    false
}

/// Count filled stars among the elements matching `star_selector` inside
/// a container, and accept the count as a rating only when it is 1-5.
pub fn count_filled(container: &ElementRef, star_selector: &Selector) -> Option<u8> {
    let filled = container
        .select(star_selector)
        .filter(is_filled_star)
        .count();
    rating_from_count(filled)
}

/// A star count is a usable rating only in the 1-5 domain.
pub fn rating_from_count(filled: usize) -> Option<u8> {
    if (1..=5).contains(&filled) {
        Some(filled as u8)
    } else {
        None
    }
}

/// Fractional star value from a partial-star element's width style
/// ("width: 60%" -> 0.6). Used where a marketplace renders the aggregate
/// rating as a clipped star row instead of a number.
pub fn style_width_fraction(style: &str) -> Option<f64> {
    width_re()
        .captures(style)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(|pct| pct / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn first_el(html: &str, sel: &str) -> bool {
        let doc = Html::parse_fragment(html);
        let selector = Selector::parse(sel).unwrap();
        let el = doc.select(&selector).next().unwrap();
        is_filled_star(&el)
    }

    #[test]
    fn class_name_hints() {
        assert!(first_el(r#"<div class="star star-filled"></div>"#, "div"));
        assert!(first_el(r#"<span class="icon active"></span>"#, "span"));
        assert!(!first_el(r#"<div class="star star-empty"></div>"#, "div"));
    }

    #[test]
    fn inline_style_hints() {
        assert!(first_el(r#"<div style="color: #ffa500"></div>"#, "div"));
        assert!(!first_el(r#"<div style="margin: 2px"></div>"#, "div"));
    }

    #[test]
    fn svg_fill_probing() {
        assert!(first_el(
            r#"<div><svg><path fill="#FFD700" d="M0 0"/></svg></div>"#,
            "div"
        ));
        assert!(!first_el(
            r#"<div><svg><path fill="none" d="M0 0"/></svg></div>"#,
            "div"
        ));
    }

    #[test]
    fn hidden_stars_never_count() {
        assert!(!first_el(
            r#"<div class="star-filled" style="display: none"></div>"#,
            "div"
        ));
    }

    #[test]
    fn aria_label_hints() {
        assert!(first_el(r#"<div aria-label="dolu yıldız"></div>"#, "div"));
    }

    #[test]
    fn counting_rejects_out_of_domain_values() {
        assert_eq!(rating_from_count(0), None);
        assert_eq!(rating_from_count(4), Some(4));
        assert_eq!(rating_from_count(6), None);
    }

    #[test]
    fn trendyol_style_full_stars() {
        // Trendyol marks filled stars with a "full" class
        let doc = Html::parse_fragment(
            r#"<div id="c">
                <div class="star-w full"></div>
                <div class="star-w full"></div>
                <div class="star-w full"></div>
                <div class="star-w"></div>
                <div class="star-w"></div>
            </div>"#,
        );
        let container_sel = Selector::parse("#c").unwrap();
        let star_sel = Selector::parse("div[class*='star-w']").unwrap();
        let container = doc.select(&container_sel).next().unwrap();
        assert_eq!(count_filled(&container, &star_sel), Some(3));
    }

    #[test]
    fn pazarama_partial_star_width() {
        assert_eq!(style_width_fraction("width: 60%"), Some(0.6));
        assert_eq!(style_width_fraction("width:37.5%;"), Some(0.375));
        assert_eq!(style_width_fraction("height: 10px"), None);
    }
}
