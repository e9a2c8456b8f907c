//! Ingredient text normalization.
//!
//! Turns a free-text ingredient list (e.g. "2 cups Sugar, Melted Butter") into
//! canonical lower-case tokens (`["sugar", "butter"]`) that can be looked up in
//! the knowledge base.

use std::collections::HashSet;
use std::sync::LazyLock;

/// Tokens shorter than this (in chars) are dropped as punctuation debris.
pub const MIN_TOKEN_LEN: usize = 3;

/// Characters that separate list entries.
const SEPARATORS: &[char] = &[
    '(', ')', '[', ']', '{', '}', ':', ';', '*', ',', '\n', '\r',
];

/// Characters that can make up a leading quantity ("1", "1/2", "2.5", "2-3", "½").
fn is_quantity_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '/' | '.' | '-' | '½' | '⅓' | '⅔' | '¼' | '¾' | '⅛')
}

/// Unit and measurement words, sorted longest first so "tablespoons" wins over "tb".
static UNITS_SORTED: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    let mut units = UNITS_RAW.to_vec();
    units.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    units
});

const UNITS_RAW: &[&str] = &[
    // Volume - US
    "fluid ounces",
    "fluid ounce",
    "tablespoons",
    "tablespoon",
    "teaspoons",
    "teaspoon",
    "gallons",
    "gallon",
    "quarts",
    "quart",
    "pints",
    "pint",
    "cups",
    "cup",
    "tbsp",
    "tbs",
    "tsp",
    "fl oz",
    "gal",
    "qt",
    "pt",
    // Volume - Metric
    "milliliters",
    "milliliter",
    "liters",
    "liter",
    "litres",
    "litre",
    "ml",
    "l",
    // Weight
    "ounces",
    "ounce",
    "pounds",
    "lbs",
    "lb",
    "oz",
    "kilograms",
    "kilogram",
    "grams",
    "gram",
    "kg",
    "mg",
    "g",
    // Count
    "packages",
    "package",
    "handfuls",
    "handful",
    "pinches",
    "pinch",
    "slices",
    "slice",
    "sticks",
    "stick",
    "cans",
    "can",
    "jars",
    "jar",
    "pcs",
    "pkg",
    "qty",
    "x",
];

/// Noise words removed wherever they appear as a whole word.
pub const DEFAULT_STOP_WORDS: &[&str] = &[
    "serves",
    "serving",
    "filling",
    "pound",
    "grated",
    "melted",
    "large",
    "medium",
    "small",
    "of",
    "and",
    "or",
    "chopped",
    "diced",
    "minced",
    "sliced",
    "softened",
    "sifted",
    "beaten",
    "optional",
    "organic",
    "contains",
    "ingredients",
    "less",
    "than",
];

static DEFAULT_NORMALIZER: LazyLock<Normalizer> = LazyLock::new(Normalizer::new);

/// Configurable normalizer. Use [`normalize`] for the default configuration.
#[derive(Debug, Clone)]
pub struct Normalizer {
    stop_words: HashSet<String>,
    min_token_len: usize,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    /// Normalizer with [`DEFAULT_STOP_WORDS`] and [`MIN_TOKEN_LEN`].
    pub fn new() -> Self {
        Self::with_stop_words(DEFAULT_STOP_WORDS.iter().copied())
    }

    /// Normalizer with a custom stop-word set.
    pub fn with_stop_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            stop_words: words
                .into_iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
            min_token_len: MIN_TOKEN_LEN,
        }
    }

    pub fn min_token_len(mut self, len: usize) -> Self {
        self.min_token_len = len;
        self
    }

    /// Normalize free text into ordered ingredient tokens.
    pub fn normalize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let separated: String = lowered
            .chars()
            .map(|c| if SEPARATORS.contains(&c) { ',' } else { c })
            .collect();

        separated
            .split(',')
            .filter_map(|raw| self.normalize_token(raw))
            .collect()
    }

    fn normalize_token(&self, raw: &str) -> Option<String> {
        let stripped = strip_leading_measure(raw.trim());

        let token = stripped
            .split_whitespace()
            .filter(|word| !self.stop_words.contains(*word))
            .collect::<Vec<_>>()
            .join(" ");
        let token = token.trim_matches(|c: char| c.is_whitespace() || c == '.');

        if token.chars().count() < self.min_token_len || !token.chars().any(char::is_alphabetic) {
            return None;
        }
        Some(token.to_string())
    }
}

/// Normalize with the default stop words.
pub fn normalize(text: &str) -> Vec<String> {
    DEFAULT_NORMALIZER.normalize(text)
}

/// Product memory key for a normalized token sequence.
pub fn cache_key(tokens: &[String]) -> String {
    tokens.join(", ")
}

/// Strip quantities and units anchored at the start of a token.
///
/// A quantity or unit is only removed when something follows it, so "2 cloves"
/// keeps "cloves" but "2 cans chickpeas" becomes "chickpeas".
fn strip_leading_measure(mut s: &str) -> &str {
    loop {
        let before = s;

        let quantity_end = s
            .char_indices()
            .find(|(_, c)| !is_quantity_char(*c))
            .map(|(i, _)| i)
            .unwrap_or(s.len());
        if quantity_end > 0 {
            let rest = s[quantity_end..].trim_start();
            if !rest.is_empty() {
                s = rest;
            }
        }

        if let Some(rest) = strip_unit(s) {
            if !rest.is_empty() {
                s = rest;
            }
        }

        if s == before {
            return s;
        }
    }
}

/// Remove a unit word at the start of `s`, respecting word boundaries.
fn strip_unit(s: &str) -> Option<&str> {
    for &unit in UNITS_SORTED.iter() {
        if let Some(after) = s.strip_prefix(unit) {
            if after.is_empty() || after.starts_with(|c: char| c.is_whitespace() || c == '.') {
                return Some(after.trim_start_matches('.').trim_start());
            }
        }
    }
    None
}
