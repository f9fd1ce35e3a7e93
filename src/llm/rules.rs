//! Deterministic rule-based answers.
//!
//! Keyword routing over the question: price, rating, seller and
//! comparison questions each get a templated Turkish answer grounded in
//! the product context. This is both the no-API-key mode and the
//! fallback when the remote service errors.

use async_trait::async_trait;

use super::{ChatMessage, TextGenerator};
use crate::analytics::ProductContext;

const PRICE_KEYWORDS: &[&str] = &["en ucuz", "fiyat", "ucuz", "ne kadar", "kaç para"];
const RATING_KEYWORDS: &[&str] = &["puan", "yorum", "memnun", "değerlendirme", "rating", "yıldız"];
const SELLER_KEYWORDS: &[&str] = &["satıcı", "vendor", "nerede", "nereden", "hangi site"];
const COMPARE_KEYWORDS: &[&str] = &["karşılaştır", "fark", "hangi", "hangisi", "öner"];

pub struct RuleBasedResponder;

#[async_trait]
impl TextGenerator for RuleBasedResponder {
    async fn generate(
        &self,
        context: &ProductContext,
        question: &str,
        _history: &[ChatMessage],
    ) -> anyhow::Result<String> {
        Ok(answer(context, question))
    }
}

/// Route the question to a templated answer.
pub fn answer(context: &ProductContext, question: &str) -> String {
    let q = question.to_lowercase();

    if PRICE_KEYWORDS.iter().any(|k| q.contains(k)) {
        price_answer(context)
    } else if RATING_KEYWORDS.iter().any(|k| q.contains(k)) {
        rating_answer(context)
    } else if SELLER_KEYWORDS.iter().any(|k| q.contains(k)) {
        seller_answer(context)
    } else if COMPARE_KEYWORDS.iter().any(|k| q.contains(k)) {
        comparison_answer(context)
    } else {
        general_answer(context)
    }
}

fn price_answer(context: &ProductContext) -> String {
    let mut answer = format!(
        "Şu anda en ucuz teklif {} / {} tarafından {} TL fiyatla sunuluyor.",
        context.cheapest.site,
        context.cheapest.seller_display(),
        context.cheapest.price,
    );
    if let Some(suggestion) = &context.price_suggestion {
        answer.push_str(&format!(
            " Dinamik fiyat modeline göre önerilen satış fiyatı ise {} TL (en düşük rakip {} TL).",
            suggestion.suggested_price, suggestion.min_competitor_price,
        ));
    }

    let others: Vec<String> = context
        .offers
        .iter()
        .skip(1)
        .take(3)
        .map(|o| format!("{} / {}: {} TL", o.site, o.seller_display(), o.price))
        .collect();
    if !others.is_empty() {
        answer.push_str(&format!("\n\nDiğer teklifler: {}", others.join(", ")));
    }
    answer
}

fn rating_answer(context: &ProductContext) -> String {
    let Some(best) = &context.best_rated else {
        return "Bu ürün için henüz puan verisi bulunmuyor.".to_string();
    };

    let mut answer = format!(
        "En yüksek puanlı teklif {} / {}. Ortalama puan {} ve toplam yorum sayısı {}.",
        best.site,
        best.seller_display(),
        best.rating.unwrap_or(0.0),
        best.review_count.unwrap_or(0),
    );
    if let Some(analysis) = &context.keyword_analysis {
        answer.push_str(&format!(
            " Yüksek puanlı (4-5 yıldız) yorum sayısı: {}. Düşük puanlı (1-2 yıldız) yorum sayısı: {}.",
            analysis.high_review_count, analysis.low_review_count,
        ));
    }
    answer
}

fn seller_answer(context: &ProductContext) -> String {
    let mut answer = format!("{} için mevcut satıcılar:\n", context.product_name);
    for offer in context.offers.iter().take(5) {
        answer.push_str(&format!(
            "- {} / {}: {} TL",
            offer.site,
            offer.seller_display(),
            offer.price
        ));
        if let Some(rating) = offer.rating {
            answer.push_str(&format!(
                " (Puan: {}, Yorum: {})",
                rating,
                offer.review_count.unwrap_or(0)
            ));
        }
        answer.push('\n');
    }
    answer
}

fn comparison_answer(context: &ProductContext) -> String {
    let mut answer = format!(
        "{} için:\n✅ En ucuz: {} / {} - {} TL\n",
        context.product_name,
        context.cheapest.site,
        context.cheapest.seller_display(),
        context.cheapest.price,
    );
    if let Some(best) = &context.best_rated {
        answer.push_str(&format!(
            "⭐ En yüksek puanlı: {} / {} - {} puan ({} yorum)\n",
            best.site,
            best.seller_display(),
            best.rating.unwrap_or(0.0),
            best.review_count.unwrap_or(0),
        ));
    }
    if let Some(suggestion) = &context.price_suggestion {
        answer.push_str(&format!("💡 Önerilen fiyat: {} TL", suggestion.suggested_price));
    }
    answer
}

fn general_answer(context: &ProductContext) -> String {
    let mut answer = format!(
        "{} için şu an en ucuz teklif {} / {} ile {} TL.",
        context.product_name,
        context.cheapest.site,
        context.cheapest.seller_display(),
        context.cheapest.price,
    );
    if let Some(best) = &context.best_rated {
        answer.push_str(&format!(
            " En yüksek puanlı satıcı ise {} / {} ({} puan, {} yorum).",
            best.site,
            best.seller_display(),
            best.rating.unwrap_or(0.0),
            best.review_count.unwrap_or(0),
        ));
    }
    if let Some(suggestion) = &context.price_suggestion {
        answer.push_str(&format!(
            " Önerilen satış fiyatı: {} TL.",
            suggestion.suggested_price
        ));
    }
    answer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{OfferSummary, PriceSuggestion};
    use crate::models::MarketplaceId;

    fn context() -> ProductContext {
        let cheapest = OfferSummary {
            site: MarketplaceId::Hepsiburada,
            vendor_name: "Hepsiburada".to_string(),
            seller_nickname: None,
            price: 199.9,
            rating: Some(4.2),
            review_count: Some(320),
        };
        let pricier = OfferSummary {
            site: MarketplaceId::N11,
            vendor_name: "N11".to_string(),
            seller_nickname: Some("ABC Store".to_string()),
            price: 215.0,
            rating: Some(4.7),
            review_count: Some(80),
        };
        ProductContext {
            product_id: "p1".to_string(),
            product_name: "Güneş Kremi".to_string(),
            category: Some("Gunes Kremi".to_string()),
            cheapest: cheapest.clone(),
            best_rated: Some(pricier.clone()),
            price_suggestion: Some(PriceSuggestion {
                product_id: "p1".to_string(),
                min_competitor_price: 199.9,
                suggested_price: 209.9,
                margin_pct: 5.0,
            }),
            offers: vec![cheapest, pricier],
            keyword_analysis: None,
        }
    }

    #[test]
    fn price_questions_get_the_cheapest_offer() {
        let answer = answer(&context(), "Bu ürünün fiyatı ne kadar?");
        assert!(answer.contains("199.9"));
        assert!(answer.contains("Hepsiburada"));
        assert!(answer.contains("209.9"));
    }

    #[test]
    fn rating_questions_get_the_best_rated_seller() {
        let answer = answer(&context(), "En yüksek puanlı satıcı kim?");
        assert!(answer.contains("N11 (ABC Store)"));
        assert!(answer.contains("4.7"));
    }

    #[test]
    fn seller_questions_list_offers() {
        let answer = answer(&context(), "Hangi sitelerde satılıyor, nereden alayım?");
        assert!(answer.contains("- hepsiburada"));
        assert!(answer.contains("- n11"));
    }

    #[test]
    fn unmatched_questions_get_the_general_summary() {
        let answer = answer(&context(), "merhaba");
        assert!(answer.contains("en ucuz teklif"));
    }

    #[test]
    fn answers_are_deterministic() {
        let a = answer(&context(), "fiyat?");
        let b = answer(&context(), "fiyat?");
        assert_eq!(a, b);
    }
}
