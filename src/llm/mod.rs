//! Chat text-generation boundary.
//!
//! The pipeline treats answer generation as an opaque service: it gets a
//! product context, a question and the running history, and returns a
//! string. A deterministic rule-based responder is always available and
//! serves as the fallback whenever the remote service is unconfigured or
//! fails.

mod rules;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analytics::ProductContext;
use crate::config::ChatSettings;

pub use rules::RuleBasedResponder;

/// One message of the running conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Opaque text generation over a product context.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        context: &ProductContext,
        question: &str,
        history: &[ChatMessage],
    ) -> anyhow::Result<String>;
}

/// Pick the configured generator: remote HTTP service when an endpoint
/// and key are present, the rule-based responder otherwise.
pub fn generator_from_settings(settings: &ChatSettings) -> Box<dyn TextGenerator> {
    match (&settings.api_url, &settings.api_key) {
        (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => {
            Box::new(HttpTextGenerator::new(url.clone(), key.clone()))
        }
        _ => Box::new(RuleBasedResponder),
    }
}

/// Remote generateContent-style REST endpoint.
pub struct HttpTextGenerator {
    client: Client,
    api_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl HttpTextGenerator {
    pub fn new(api_url: String, api_key: String) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_url,
            api_key,
        }
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(
        &self,
        context: &ProductContext,
        question: &str,
        history: &[ChatMessage],
    ) -> anyhow::Result<String> {
        let prompt = build_prompt(context, question, history);
        debug!("Sending {} prompt chars to text service", prompt.len());

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&self.api_url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let body: GenerateResponse = response.json().await?;
        let answer = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text.trim().to_string())
            .filter(|t| !t.is_empty());

        match answer {
            Some(text) => Ok(text),
            None => {
                warn!("Text service returned no candidates");
                anyhow::bail!("empty response from text service")
            }
        }
    }
}

/// Assemble the grounded prompt: product facts, price suggestion,
/// keyword analysis, the last ten history turns and the question.
pub(crate) fn build_prompt(
    context: &ProductContext,
    question: &str,
    history: &[ChatMessage],
) -> String {
    let mut prompt = String::from(
        "Sen bir e-ticaret ürün danışmanısın. Kullanıcıya ürün bilgilerine göre \
         yardımcı oluyorsun. Önceki konuşmayı dikkate al, bağlamı koru ve doğal \
         bir sohbet akışı sağla. Türkçe, samimi ve yardımcı ol.\n\nÜRÜN BİLGİLERİ:\n",
    );

    prompt.push_str(&format!(
        "- Ürün: {} ({})\n- En ucuz teklif: {} / {} - {} TL\n",
        context.product_name,
        context.product_id,
        context.cheapest.site,
        context.cheapest.seller_display(),
        context.cheapest.price,
    ));
    if let Some(best) = &context.best_rated {
        prompt.push_str(&format!(
            "- En yüksek puanlı: {} / {} - {} puan\n",
            best.site,
            best.seller_display(),
            best.rating.unwrap_or(0.0),
        ));
    }
    if let Some(suggestion) = &context.price_suggestion {
        prompt.push_str(&format!(
            "- Önerilen fiyat: {} TL (en düşük rakip: {} TL)\n",
            suggestion.suggested_price, suggestion.min_competitor_price,
        ));
    }
    if let Some(analysis) = &context.keyword_analysis {
        let words: Vec<&str> = analysis
            .high_keywords
            .iter()
            .take(5)
            .map(|k| k.word.as_str())
            .collect();
        prompt.push_str(&format!(
            "- Yorum analizi: {} yüksek puanlı, {} düşük puanlı yorum; öne çıkan kelimeler: {}\n",
            analysis.high_review_count,
            analysis.low_review_count,
            words.join(", "),
        ));
    }

    if !history.is_empty() {
        prompt.push_str("\nÖnceki Konuşma Geçmişi:\n");
        for message in history.iter().rev().take(10).rev() {
            let speaker = if message.role == "user" {
                "Kullanıcı"
            } else {
                "Danışman"
            };
            prompt.push_str(&format!("{}: {}\n", speaker, message.content));
        }
    }

    prompt.push_str(&format!(
        "\nŞİMDİKİ SORU: {}\n\nSadece verilen ürün bilgilerine dayanarak cevap ver, varsayım yapma.",
        question
    ));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::OfferSummary;
    use crate::models::MarketplaceId;

    fn context() -> ProductContext {
        ProductContext {
            product_id: "p1".to_string(),
            product_name: "Güneş Kremi".to_string(),
            category: None,
            cheapest: OfferSummary {
                site: MarketplaceId::Hepsiburada,
                vendor_name: "Hepsiburada".to_string(),
                seller_nickname: None,
                price: 199.9,
                rating: Some(4.6),
                review_count: Some(1200),
            },
            best_rated: None,
            price_suggestion: None,
            offers: Vec::new(),
            keyword_analysis: None,
        }
    }

    #[test]
    fn prompt_contains_grounding_and_question() {
        let prompt = build_prompt(&context(), "En ucuzu nerede?", &[]);
        assert!(prompt.contains("Güneş Kremi"));
        assert!(prompt.contains("199.9"));
        assert!(prompt.contains("En ucuzu nerede?"));
    }

    #[test]
    fn prompt_keeps_only_the_recent_history() {
        let history: Vec<ChatMessage> = (0..15)
            .map(|i| ChatMessage {
                role: "user".to_string(),
                content: format!("mesaj {}", i),
            })
            .collect();
        let prompt = build_prompt(&context(), "soru", &history);
        assert!(!prompt.contains("mesaj 4"));
        assert!(prompt.contains("mesaj 5"));
        assert!(prompt.contains("mesaj 14"));
    }

    #[test]
    fn unconfigured_chat_uses_the_rule_based_responder() {
        let generator = generator_from_settings(&ChatSettings::default());
        // Just ensure the fallback path produces an answer
        let rt = tokio::runtime::Runtime::new().unwrap();
        let answer = rt
            .block_on(generator.generate(&context(), "fiyat nedir?", &[]))
            .unwrap();
        assert!(answer.contains("Hepsiburada"));
    }
}
