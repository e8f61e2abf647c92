use common::{
    CustomerFilter, CustomerRecord, IndexCondition, InsuranceRecord, PolicyFilter, PolicyRecord,
    RecordFilter, SourceTag,
};

/// Attribute predicate applied to fetched candidates before they are scored.
pub trait RecordPredicate<R>: Send + Sync {
    fn accepts(&self, record: &R) -> bool;

    /// True when the predicate accepts every record, letting the engine keep
    /// the unfiltered over-fetch factor.
    fn is_any(&self) -> bool {
        false
    }

    /// Conditions the index behind `source` can apply while it searches.
    /// Whatever is not expressed here is still enforced by `accepts`.
    fn index_conditions(&self, _source: SourceTag) -> Vec<IndexCondition> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl<R> RecordPredicate<R> for AcceptAll {
    fn accepts(&self, _record: &R) -> bool {
        true
    }

    fn is_any(&self) -> bool {
        true
    }
}

impl RecordPredicate<InsuranceRecord> for RecordFilter {
    fn accepts(&self, record: &InsuranceRecord) -> bool {
        self.matches(record)
    }

    fn is_any(&self) -> bool {
        Self::is_any(self)
    }

    fn index_conditions(&self, source: SourceTag) -> Vec<IndexCondition> {
        Self::index_conditions(self, source)
    }
}

impl RecordPredicate<CustomerRecord> for CustomerFilter {
    fn accepts(&self, record: &CustomerRecord) -> bool {
        self.matches(record)
    }

    fn is_any(&self) -> bool {
        self.is_empty()
    }

    fn index_conditions(&self, _source: SourceTag) -> Vec<IndexCondition> {
        Self::index_conditions(self)
    }
}

impl RecordPredicate<PolicyRecord> for PolicyFilter {
    fn accepts(&self, record: &PolicyRecord) -> bool {
        self.matches(record)
    }

    fn is_any(&self) -> bool {
        self.is_empty()
    }

    fn index_conditions(&self, _source: SourceTag) -> Vec<IndexCondition> {
        Self::index_conditions(self)
    }
}
