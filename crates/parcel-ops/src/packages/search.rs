use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use super::domain::{Package, Tipo};

/// Counter search input as typed by the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    #[serde(default)]
    pub free_text: String,
    #[serde(default)]
    pub include_inactive: bool,
}

impl SearchQuery {
    pub fn text(free_text: impl Into<String>) -> Self {
        Self {
            free_text: free_text.into(),
            include_inactive: false,
        }
    }

    pub fn including_inactive(mut self) -> Self {
        self.include_inactive = true;
        self
    }
}

/// First page of matches plus the size of the whole match set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub shown: Vec<Package>,
    pub total_matched: usize,
}

impl SearchResults {
    pub fn has_more(&self) -> bool {
        self.total_matched > self.shown.len()
    }
}

/// Lowercases and strips diacritics so `"López"` and `"lopez"` compare equal.
pub fn fold(text: &str) -> String {
    text.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whitespace-separated, folded, non-empty search tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(fold).collect()
}

/// Every token must occur somewhere in `haystack`.
pub(crate) fn contains_all(haystack: &str, tokens: &[String]) -> bool {
    let haystack = fold(haystack);
    tokens.iter().all(|token| haystack.contains(token.as_str()))
}

/// Packages a counter search can return: never carrier-bound items, only
/// active ones unless asked, and each name must contain every token.
/// Snapshot order is preserved.
pub fn matching<'a>(
    snapshot: &'a [Package],
    query: &SearchQuery,
) -> impl Iterator<Item = &'a Package> + 'a {
    let tokens = tokenize(&query.free_text);
    let include_inactive = query.include_inactive;
    snapshot
        .iter()
        .filter(|package| package.tipo != Tipo::Envio)
        .filter(move |package| include_inactive || package.is_active())
        .filter(move |package| contains_all(&package.nombre_lower, &tokens))
}

pub fn search(snapshot: &[Package], query: &SearchQuery, display_limit: usize) -> SearchResults {
    let mut shown = Vec::new();
    let mut total_matched = 0;
    for package in matching(snapshot, query) {
        if shown.len() < display_limit {
            shown.push(package.clone());
        }
        total_matched += 1;
    }
    SearchResults {
        shown,
        total_matched,
    }
}
