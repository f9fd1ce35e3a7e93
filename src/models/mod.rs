//! Data models for pricewatch.

mod marketplace;
mod offer;
mod target;

pub use marketplace::MarketplaceId;
pub use offer::{MarketplaceDetail, Offer, OfferKey, RawSellerEntry, ReviewEntry};
pub use target::ProductTarget;
