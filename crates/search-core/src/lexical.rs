//! Keyword-overlap scoring.
//!
//! A query term counts as found when it occurs as a substring anywhere in
//! the lower-cased, space-joined searchable fields of a record. This is a
//! containment check, not token matching: `an` matches `analyst`, which
//! overstates overlap for short terms.

use common::Searchable;

/// Lower-cased whitespace terms of a query, parsed once per request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryTerms {
    terms: Vec<String>,
}

impl QueryTerms {
    pub fn parse(query: &str) -> Self {
        let lowered = query.to_lowercase();
        Self {
            terms: lowered.split_whitespace().map(ToOwned::to_owned).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(String::as_str)
    }

    /// Fraction of terms contained in `haystack`, which must already be
    /// lower-cased. Repeated terms count once per occurrence in the query.
    pub fn score_haystack(&self, haystack: &str) -> f32 {
        if self.terms.is_empty() {
            return 0.0;
        }
        let matches = self
            .terms
            .iter()
            .filter(|term| haystack.contains(term.as_str()))
            .count();
        matches as f32 / self.terms.len() as f32
    }

    pub fn score<R: Searchable>(&self, record: &R) -> f32 {
        if self.terms.is_empty() {
            return 0.0;
        }
        self.score_haystack(&haystack(record))
    }
}

/// Lower-cased searchable text of a record.
pub fn haystack<R: Searchable>(record: &R) -> String {
    record.searchable_fields().join(" ").to_lowercase()
}

pub fn keyword_score<R: Searchable>(query: &str, record: &R) -> f32 {
    QueryTerms::parse(query).score(record)
}
