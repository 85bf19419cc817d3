//! Privacy redaction for people who may still be alive.

use crate::config::default_privacy_cutoff;
use crate::types::{DateField, Record};
use chrono::NaiveDate;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedactionStats {
    pub fields_redacted: usize,
    pub records_excluded: usize,
}

pub struct Redactor {
    cutoff: NaiveDate,
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new(default_privacy_cutoff())
    }
}

impl Redactor {
    pub fn new(cutoff: NaiveDate) -> Self {
        Self { cutoff }
    }

    pub fn cutoff(&self) -> NaiveDate {
        self.cutoff
    }

    fn after_cutoff(&self, field: &Option<DateField>) -> bool {
        field
            .as_ref()
            .and_then(DateField::as_date)
            .is_some_and(|date| date > self.cutoff)
    }

    /// Null every date strictly after the cutoff; returns how many were nulled.
    pub fn redact_fields(&self, record: &mut Record) -> usize {
        let mut redacted = 0;
        for field in record.date_fields_mut() {
            if self.after_cutoff(field) {
                *field = None;
                redacted += 1;
            }
        }
        redacted
    }

    /// Whether the person was born strictly after the cutoff.
    pub fn is_sensitive_person(&self, record: &Record) -> bool {
        self.after_cutoff(&record.date_birth)
    }

    /// Drop sensitive people and redact the remaining records.
    ///
    /// Exclusion is decided on the birth date as it was before redaction,
    /// since redaction nulls exactly the birth dates that trigger it.
    pub fn apply(&self, records: Vec<Record>) -> (Vec<Record>, RedactionStats) {
        let mut stats = RedactionStats::default();
        let mut kept = Vec::with_capacity(records.len());

        for (index, mut record) in records.into_iter().enumerate() {
            if self.is_sensitive_person(&record) {
                debug!(row = index, "Excluding record born after privacy cutoff");
                stats.records_excluded += 1;
                continue;
            }
            stats.fields_redacted += self.redact_fields(&mut record);
            kept.push(record);
        }

        (kept, stats)
    }
}
