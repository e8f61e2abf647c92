//! Attribute filters, applied inside the index query where the index
//! supports it and re-checked on fetched candidates before scoring.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{CustomerRecord, InsuranceRecord, PolicyRecord, SourceTag};

/// One payload constraint an index can evaluate while it searches. Field
/// names are dotted paths into the stored record.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexCondition {
    /// Payload text equal to one of `values`. Indexes compare exactly, so
    /// the usual spellings of a case-insensitive value are listed.
    OneOf {
        field: &'static str,
        values: Vec<String>,
    },
    Range {
        field: &'static str,
        min: Option<f64>,
        max: Option<f64>,
    },
}

impl IndexCondition {
    fn text(field: &'static str, value: Option<&str>) -> Option<Self> {
        let value = value?;
        let mut values = vec![
            value.to_string(),
            value.to_ascii_lowercase(),
            value.to_ascii_uppercase(),
            title_case(value),
        ];
        values.sort();
        values.dedup();
        Some(Self::OneOf { field, values })
    }

    fn range(field: &'static str, min: Option<f64>, max: Option<f64>) -> Option<Self> {
        (min.is_some() || max.is_some()).then_some(Self::Range { field, min, max })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct CustomerFilter {
    pub min_income: Option<f64>,
    pub max_income: Option<f64>,
    pub min_credit_score: Option<u32>,
    pub customer_segment: Option<String>,
    pub state: Option<String>,
}

impl CustomerFilter {
    pub fn matches(&self, customer: &CustomerRecord) -> bool {
        self.min_income.is_none_or(|min| customer.annual_income >= min)
            && self.max_income.is_none_or(|max| customer.annual_income <= max)
            && self
                .min_credit_score
                .is_none_or(|min| customer.credit_score >= min)
            && same_text(
                self.customer_segment.as_deref(),
                &customer.metadata.customer_segment,
            )
            && same_text(self.state.as_deref(), &customer.address.state)
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn index_conditions(&self) -> Vec<IndexCondition> {
        [
            IndexCondition::range("annual_income", self.min_income, self.max_income),
            IndexCondition::range(
                "credit_score",
                self.min_credit_score.map(f64::from),
                None,
            ),
            IndexCondition::text(
                "metadata.customer_segment",
                self.customer_segment.as_deref(),
            ),
            IndexCondition::text("address.state", self.state.as_deref()),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct PolicyFilter {
    pub policy_type: Option<String>,
    pub status: Option<String>,
    pub min_premium: Option<f64>,
    pub max_premium: Option<f64>,
    pub min_coverage: Option<f64>,
    pub payment_frequency: Option<String>,
}

impl PolicyFilter {
    pub fn matches(&self, policy: &PolicyRecord) -> bool {
        same_text(self.policy_type.as_deref(), &policy.policy_type)
            && same_text(self.status.as_deref(), &policy.status)
            && self.min_premium.is_none_or(|min| policy.annual_premium >= min)
            && self.max_premium.is_none_or(|max| policy.annual_premium <= max)
            && self
                .min_coverage
                .is_none_or(|min| policy.coverage_amount >= min)
            && same_text(self.payment_frequency.as_deref(), &policy.payment_frequency)
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn index_conditions(&self) -> Vec<IndexCondition> {
        [
            IndexCondition::text("policy_type", self.policy_type.as_deref()),
            IndexCondition::text("status", self.status.as_deref()),
            IndexCondition::range("annual_premium", self.min_premium, self.max_premium),
            IndexCondition::range("coverage_amount", self.min_coverage, None),
            IndexCondition::text("payment_frequency", self.payment_frequency.as_deref()),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Filter for one or both collections. A customer filter never rejects a
/// policy record and vice versa.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RecordFilter {
    #[default]
    Any,
    Customer(CustomerFilter),
    Policy(PolicyFilter),
    Both {
        customer: CustomerFilter,
        policy: PolicyFilter,
    },
}

impl RecordFilter {
    pub fn is_any(&self) -> bool {
        match self {
            Self::Any => true,
            Self::Customer(c) => c.is_empty(),
            Self::Policy(p) => p.is_empty(),
            Self::Both { customer, policy } => customer.is_empty() && policy.is_empty(),
        }
    }

    pub fn matches_customer(&self, customer: &CustomerRecord) -> bool {
        match self {
            Self::Customer(filter) | Self::Both { customer: filter, .. } => {
                filter.matches(customer)
            }
            Self::Any | Self::Policy(_) => true,
        }
    }

    pub fn matches_policy(&self, policy: &PolicyRecord) -> bool {
        match self {
            Self::Policy(filter) | Self::Both { policy: filter, .. } => filter.matches(policy),
            Self::Any | Self::Customer(_) => true,
        }
    }

    /// Conditions for the collection behind `source`; filters aimed at the
    /// other collection contribute nothing.
    pub fn index_conditions(&self, source: SourceTag) -> Vec<IndexCondition> {
        match (self, source) {
            (Self::Customer(filter) | Self::Both { customer: filter, .. }, SourceTag::Customer) => {
                filter.index_conditions()
            }
            (Self::Policy(filter) | Self::Both { policy: filter, .. }, SourceTag::Policy) => {
                filter.index_conditions()
            }
            _ => Vec::new(),
        }
    }

    pub fn matches(&self, record: &InsuranceRecord) -> bool {
        match record {
            InsuranceRecord::Customer(c) => self.matches_customer(c),
            InsuranceRecord::Policy(p) => self.matches_policy(p),
        }
    }
}

fn same_text(expected: Option<&str>, actual: &str) -> bool {
    expected.is_none_or(|e| e.eq_ignore_ascii_case(actual))
}

fn title_case(value: &str) -> String {
    let mut chars = value.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
    })
}
