//! Keyword-driven choice between searching one collection and both.

use common::SourceTag;
use serde::Serialize;

const CUSTOMER_KEYWORDS: &[&str] = &[
    "customer",
    "client",
    "person",
    "income",
    "occupation",
    "credit",
    "address",
    "email",
    "phone",
    "engineer",
    "manager",
    "salary",
    "earning",
];

const POLICY_KEYWORDS: &[&str] = &[
    "policy",
    "insurance",
    "premium",
    "coverage",
    "claim",
    "auto",
    "home",
    "life",
    "health",
    "business",
    "deductible",
    "renew",
    "active",
    "cancelled",
    "expired",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Single(SourceTag),
    Unified,
}

impl Route {
    pub fn sources(self) -> Vec<SourceTag> {
        match self {
            Self::Single(tag) => vec![tag],
            Self::Unified => SourceTag::ALL.to_vec(),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Single(tag) => tag.bucket_name(),
            Self::Unified => "unified",
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryRouter {
    customer: Vec<String>,
    policy: Vec<String>,
}

impl Default for QueryRouter {
    fn default() -> Self {
        Self::new(CUSTOMER_KEYWORDS, POLICY_KEYWORDS)
    }
}

impl QueryRouter {
    pub fn new(customer: &[&str], policy: &[&str]) -> Self {
        let lower = |words: &[&str]| words.iter().map(|w| w.to_lowercase()).collect();
        Self {
            customer: lower(customer),
            policy: lower(policy),
        }
    }

    /// Substring containment on the lower-cased query, the same test the
    /// lexical scorer uses.
    pub fn route(&self, query: &str) -> Route {
        let query = query.to_lowercase();
        let hits = |words: &[String]| words.iter().any(|w| query.contains(w.as_str()));
        let route = match (hits(&self.customer), hits(&self.policy)) {
            (true, false) => Route::Single(SourceTag::Customer),
            (false, true) => Route::Single(SourceTag::Policy),
            _ => Route::Unified,
        };
        tracing::debug!(route = route.label(), "routed query");
        route
    }
}
