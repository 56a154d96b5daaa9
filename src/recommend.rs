//! Related-product scoring.
//!
//! Heuristic, not ranking science: same category +5, each shared tag +2,
//! each keyword-pairing hit +10. Ties break on product id so repeated calls
//! over the same catalog return the same order.

use crate::models::Product;
use std::collections::HashMap;

/// Seed keyword -> keywords it pairs well with, both matched as
/// case-insensitive substrings of the product names.
const KEYWORD_PAIRINGS: &[(&str, &[&str])] = &[
    ("bread", &["butter", "jam", "egg", "cheese"]),
    ("butter", &["bread", "paneer"]),
    ("milk", &["cereal", "cookie", "biscuit", "horlicks"]),
    ("tea", &["biscuit", "rusk", "sugar"]),
    ("coffee", &["sugar", "cookie"]),
    ("pasta", &["sauce", "cheese", "oregano"]),
    ("chips", &["dip", "salsa", "cola"]),
    ("rice", &["dal", "ghee", "pickle"]),
    ("paneer", &["masala", "butter", "cream"]),
    ("egg", &["bread", "cheese", "mayonnaise"]),
    ("atta", &["ghee", "jaggery"]),
    ("noodles", &["sauce", "ketchup"]),
];

/// Affinity of `candidate` to `seed`. Zero means unrelated.
pub fn score(seed: &Product, candidate: &Product) -> u32 {
    let mut total = 0;
    if seed.category.eq_ignore_ascii_case(&candidate.category) {
        total += 5;
    }
    for tag in &seed.tags {
        if candidate.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            total += 2;
        }
    }
    let seed_name = seed.name.to_lowercase();
    let candidate_name = candidate.name.to_lowercase();
    for (keyword, pairs) in KEYWORD_PAIRINGS {
        if !seed_name.contains(keyword) {
            continue;
        }
        for pair in *pairs {
            if candidate_name.contains(pair) {
                total += 10;
            }
        }
    }
    total
}

/// Top-`limit` products related to the seed, best first, zero scores dropped.
pub fn related_products<'a>(seed: &Product, catalog: &'a [Product], limit: usize) -> Vec<&'a Product> {
    let mut scored: Vec<(&Product, u32)> = catalog
        .iter()
        .filter(|p| p.id != seed.id)
        .map(|p| (p, score(seed, p)))
        .filter(|(_, s)| *s > 0)
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.id.cmp(&b.0.id)));
    scored.into_iter().take(limit).map(|(p, _)| p).collect()
}

/// Cart-level recommendations: per-item scores summed across the cart,
/// skipping anything already in it.
pub fn cart_recommendations<'a>(
    cart_product_ids: &[String],
    catalog: &'a [Product],
    limit: usize,
) -> Vec<&'a Product> {
    let mut combined: HashMap<&str, u32> = HashMap::new();
    for id in cart_product_ids {
        let Some(seed) = catalog.iter().find(|p| &p.id == id) else {
            continue;
        };
        for candidate in catalog {
            if cart_product_ids.contains(&candidate.id) {
                continue;
            }
            let s = score(seed, candidate);
            if s > 0 {
                *combined.entry(candidate.id.as_str()).or_default() += s;
            }
        }
    }
    let mut scored: Vec<(&str, u32)> = combined.into_iter().collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    scored
        .into_iter()
        .take(limit)
        .filter_map(|(id, _)| catalog.iter().find(|p| p.id == id))
        .collect()
}
