//! Customer profile and insurance policy documents as stored in the two
//! collections. Fields missing from a stored payload deserialize to their
//! defaults so partially populated documents still rank.

use std::borrow::Cow;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Searchable, SourceTag};

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(default)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(default)]
pub struct CustomerMetadata {
    pub customer_segment: String,
    pub preferred_contact: String,
    pub marketing_opt_in: bool,
    pub paperless_billing: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct CustomerRecord {
    pub customer_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub occupation: String,
    pub annual_income: f64,
    pub credit_score: u32,
    pub marital_status: String,
    pub address: Address,
    pub metadata: CustomerMetadata,
}

impl Searchable for CustomerRecord {
    fn id(&self) -> &str {
        &self.customer_id
    }

    fn source_tag(&self) -> SourceTag {
        SourceTag::Customer
    }

    fn searchable_fields(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Borrowed(self.first_name.as_str()),
            Cow::Borrowed(self.last_name.as_str()),
            Cow::Borrowed(self.occupation.as_str()),
            Cow::Borrowed(self.email.as_str()),
            Cow::Borrowed(self.address.city.as_str()),
            Cow::Borrowed(self.address.state.as_str()),
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct PolicyRecord {
    pub policy_id: String,
    pub customer_id: String,
    pub policy_number: String,
    pub policy_type: String,
    pub status: String,
    pub annual_premium: f64,
    pub coverage_amount: f64,
    pub deductible: f64,
    pub payment_frequency: String,
    pub start_date: String,
    pub end_date: String,
    pub term_months: u32,
    pub auto_renew: bool,
    pub agent_id: String,
}

impl Searchable for PolicyRecord {
    fn id(&self) -> &str {
        &self.policy_id
    }

    fn source_tag(&self) -> SourceTag {
        SourceTag::Policy
    }

    fn searchable_fields(&self) -> Vec<Cow<'_, str>> {
        let mut fields = vec![
            Cow::Borrowed(self.policy_type.as_str()),
            Cow::Borrowed(self.policy_number.as_str()),
            Cow::Borrowed(self.status.as_str()),
            Cow::Borrowed(self.payment_frequency.as_str()),
            Cow::Borrowed(self.customer_id.as_str()),
        ];
        if self.auto_renew {
            fields.push(Cow::Borrowed("auto"));
            fields.push(Cow::Borrowed("renew"));
        }
        fields
    }
}

/// A record from either collection, so a single engine instance can rank
/// both sources against each other.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InsuranceRecord {
    Customer(CustomerRecord),
    Policy(PolicyRecord),
}

impl Searchable for InsuranceRecord {
    fn id(&self) -> &str {
        match self {
            Self::Customer(c) => c.id(),
            Self::Policy(p) => p.id(),
        }
    }

    fn source_tag(&self) -> SourceTag {
        match self {
            Self::Customer(_) => SourceTag::Customer,
            Self::Policy(_) => SourceTag::Policy,
        }
    }

    fn searchable_fields(&self) -> Vec<Cow<'_, str>> {
        match self {
            Self::Customer(c) => c.searchable_fields(),
            Self::Policy(p) => p.searchable_fields(),
        }
    }
}

impl From<CustomerRecord> for InsuranceRecord {
    fn from(value: CustomerRecord) -> Self {
        Self::Customer(value)
    }
}

impl From<PolicyRecord> for InsuranceRecord {
    fn from(value: PolicyRecord) -> Self {
        Self::Policy(value)
    }
}
