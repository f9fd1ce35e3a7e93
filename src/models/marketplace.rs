//! Supported marketplace identifiers.

use serde::{Deserialize, Serialize};

/// One of the supported e-commerce marketplaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketplaceId {
    Hepsiburada,
    Trendyol,
    N11,
    Pttavm,
    Pazarama,
}

impl MarketplaceId {
    /// All marketplaces, in canonical task-expansion order.
    pub fn all() -> &'static [MarketplaceId] {
        &[
            MarketplaceId::Hepsiburada,
            MarketplaceId::Trendyol,
            MarketplaceId::N11,
            MarketplaceId::Pttavm,
            MarketplaceId::Pazarama,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketplaceId::Hepsiburada => "hepsiburada",
            MarketplaceId::Trendyol => "trendyol",
            MarketplaceId::N11 => "n11",
            MarketplaceId::Pttavm => "pttavm",
            MarketplaceId::Pazarama => "pazarama",
        }
    }

    /// Domain suffix the redirect resolver waits for.
    pub fn domain(&self) -> &'static str {
        match self {
            MarketplaceId::Hepsiburada => "hepsiburada.com",
            MarketplaceId::Trendyol => "trendyol.com",
            MarketplaceId::N11 => "n11.com",
            MarketplaceId::Pttavm => "pttavm.com",
            MarketplaceId::Pazarama => "pazarama.com",
        }
    }

    /// Whether an aggregator seller row belongs to this marketplace.
    ///
    /// Vendor display names on the aggregator are free text ("Hepsiburada",
    /// "N11 Mağaza", ...), so this matches on keywords in the name and, as
    /// a fallback, on the outbound link.
    pub fn matches_vendor(&self, vendor_name: &str, link: &str) -> bool {
        let vendor = vendor_name.to_lowercase();
        let link = link.to_lowercase();
        match self {
            MarketplaceId::Hepsiburada => {
                vendor.contains("hepsiburada")
                    || (vendor.contains("hepsi") && vendor.contains("burada"))
                    || link.contains("hepsiburada")
            }
            MarketplaceId::Trendyol => vendor.contains("trendyol") || link.contains("trendyol.com"),
            MarketplaceId::N11 => vendor.contains("n11") || link.contains("n11.com"),
            MarketplaceId::Pttavm => {
                vendor.contains("pttavm") || vendor.contains("ptt") || link.contains("pttavm.com")
            }
            MarketplaceId::Pazarama => vendor.contains("pazarama") || link.contains("pazarama.com"),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "hepsiburada" => Some(MarketplaceId::Hepsiburada),
            "trendyol" => Some(MarketplaceId::Trendyol),
            "n11" => Some(MarketplaceId::N11),
            "pttavm" => Some(MarketplaceId::Pttavm),
            "pazarama" => Some(MarketplaceId::Pazarama),
            _ => None,
        }
    }
}

impl std::fmt::Display for MarketplaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MarketplaceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            format!(
                "unknown marketplace '{}'. Valid options: hepsiburada, trendyol, n11, pttavm, pazarama",
                s
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_matching_is_keyword_based() {
        let hb = MarketplaceId::Hepsiburada;
        assert!(hb.matches_vendor("Hepsiburada", ""));
        assert!(hb.matches_vendor("HepsiBurada Mağaza", ""));
        assert!(hb.matches_vendor("Bilinmiyor", "https://www.akakce.com/c/?r=hepsiburada"));
        assert!(!hb.matches_vendor("Trendyol", "https://ty.example"));

        let n11 = MarketplaceId::N11;
        assert!(n11.matches_vendor("N11 Mağaza", ""));
        assert!(!n11.matches_vendor("Pazarama", ""));
    }

    #[test]
    fn serde_roundtrip_uses_lowercase_names() {
        let json = serde_json::to_string(&MarketplaceId::Pttavm).unwrap();
        assert_eq!(json, "\"pttavm\"");
        let back: MarketplaceId = serde_json::from_str("\"trendyol\"").unwrap();
        assert_eq!(back, MarketplaceId::Trendyol);
    }
}
