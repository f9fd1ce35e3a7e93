//! Shared utility functions.

mod text;

pub use text::{clean_and_parse_price, digits_only, parse_decimal_comma, slugify_product_id};
