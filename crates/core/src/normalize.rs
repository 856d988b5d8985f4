use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::message::{EntityKind, NormalizedMessage};

/// Characters preserved during cleaning because the entity patterns need them.
/// Everything else that is not alphanumeric collapses to whitespace.
const ENTITY_CHARS: [char; 5] = ['@', '.', '#', '+', '-'];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Minimum length for a bare token to count as an order number.
    pub order_number_min_len: usize,
    /// Minimum digit count for a separator-tolerant phone candidate.
    pub phone_min_digits: usize,
    /// Product names recognized as product-mention entities.
    pub product_lexicon: Vec<String>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            order_number_min_len: 5,
            phone_min_digits: 10,
            product_lexicon: vec![
                "iphone".to_string(),
                "laptop".to_string(),
                "tablet".to_string(),
                "headphones".to_string(),
                "watch".to_string(),
            ],
        }
    }
}

/// Lower-cases, collapses whitespace, strips noise, and extracts structured
/// entities from free text. Pure and infallible: absence of a match is an
/// empty sequence, never an error.
#[derive(Clone, Debug)]
pub struct Normalizer {
    config: NormalizerConfig,
    order_context: Regex,
    email: Regex,
    phone: Regex,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(NormalizerConfig::default())
    }
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self {
            config,
            order_context: Regex::new(r"order\s*(?:#|number)?\s*([a-z0-9][a-z0-9-]*)")
                .expect("order pattern compiles"),
            email: Regex::new(r"[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}")
                .expect("email pattern compiles"),
            phone: Regex::new(r"\d(?:[-.]?\d)+").expect("phone pattern compiles"),
        }
    }

    pub fn normalize(&self, raw: &str) -> NormalizedMessage {
        let cleaned_text = clean(raw);
        let mut entities: BTreeMap<EntityKind, Vec<String>> = BTreeMap::new();

        let order_numbers = self.extract_order_numbers(&cleaned_text);
        if !order_numbers.is_empty() {
            entities.insert(EntityKind::OrderNumber, order_numbers);
        }

        let emails: Vec<String> =
            self.email.find_iter(&cleaned_text).map(|found| found.as_str().to_string()).collect();
        if !emails.is_empty() {
            entities.insert(EntityKind::Email, emails);
        }

        let phones = self.extract_phones(&cleaned_text);
        if !phones.is_empty() {
            entities.insert(EntityKind::Phone, phones);
        }

        let products: Vec<String> = self
            .config
            .product_lexicon
            .iter()
            .filter(|product| cleaned_text.contains(product.as_str()))
            .cloned()
            .collect();
        if !products.is_empty() {
            entities.insert(EntityKind::Product, products);
        }

        NormalizedMessage { cleaned_text, entities }
    }

    fn extract_order_numbers(&self, cleaned_text: &str) -> Vec<String> {
        let mut found = Vec::new();

        // Explicit "order #NNN" / "order number NNN" context wins first.
        for captures in self.order_context.captures_iter(cleaned_text) {
            if let Some(group) = captures.get(1) {
                let candidate = group.as_str().trim_matches('-');
                if candidate.chars().any(|c| c.is_ascii_digit()) {
                    push_unique(&mut found, candidate);
                }
            }
        }

        // Bare alphanumeric tokens of sufficient length with at least one digit.
        for token in cleaned_text.split_whitespace() {
            let token = token.trim_start_matches('#').trim_matches(|c: char| c == '.' || c == '-');
            if token.len() >= self.config.order_number_min_len
                && token.chars().all(|c| c.is_ascii_alphanumeric())
                && token.chars().any(|c| c.is_ascii_digit())
            {
                push_unique(&mut found, token);
            }
        }

        found
    }

    fn extract_phones(&self, cleaned_text: &str) -> Vec<String> {
        let mut found = Vec::new();
        for candidate in self.phone.find_iter(cleaned_text) {
            let digit_count = candidate.as_str().chars().filter(|c| c.is_ascii_digit()).count();
            if digit_count >= self.config.phone_min_digits {
                push_unique(&mut found, candidate.as_str());
            }
        }
        found
    }
}

fn clean(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    for character in raw.to_lowercase().chars() {
        if character.is_alphanumeric() || ENTITY_CHARS.contains(&character) {
            cleaned.push(character);
        } else {
            cleaned.push(' ');
        }
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn push_unique(values: &mut Vec<String>, candidate: &str) {
    if !candidate.is_empty() && !values.iter().any(|existing| existing == candidate) {
        values.push(candidate.to_string());
    }
}
