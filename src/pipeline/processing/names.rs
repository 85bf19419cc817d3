//! Surname canonicalization against the static variant table.

use crate::error::{EtlError, Result};
use crate::types::{Record, Variations};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Canonical surname → known alternate spellings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct VariantTable {
    variants: BTreeMap<String, Vec<String>>,
}

impl VariantTable {
    /// Load the JSON asset (`{"Canonical": ["Alt", ...]}`).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            EtlError::InvalidVariantTable(format!("failed to read '{}': {}", path.display(), e))
        })?;
        let table: VariantTable = serde_json::from_str(&content)?;
        table.validate()?;
        info!(
            "Loaded {} canonical surnames from {}",
            table.variants.len(),
            path.display()
        );
        Ok(table)
    }

    pub fn from_map(variants: BTreeMap<String, Vec<String>>) -> Result<Self> {
        let table = Self { variants };
        table.validate()?;
        Ok(table)
    }

    /// Every alternate must belong to exactly one canonical name and must not
    /// itself be a canonical name, otherwise the reverse lookup is ambiguous.
    fn validate(&self) -> Result<()> {
        let mut owner: HashMap<&str, &str> = HashMap::new();
        for (canonical, alternates) in &self.variants {
            for alternate in alternates {
                if alternate == canonical {
                    continue;
                }
                if self.variants.contains_key(alternate) {
                    return Err(EtlError::InvalidVariantTable(format!(
                        "'{}' is listed as a variant of '{}' but is itself canonical",
                        alternate, canonical
                    )));
                }
                if let Some(previous) = owner.insert(alternate.as_str(), canonical.as_str()) {
                    if previous != canonical {
                        return Err(EtlError::InvalidVariantTable(format!(
                            "'{}' is listed under both '{}' and '{}'",
                            alternate, previous, canonical
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn variants_of(&self, canonical: &str) -> Option<&[String]> {
        self.variants.get(canonical).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    fn reverse_lookup(&self) -> HashMap<String, String> {
        let mut lookup = HashMap::new();
        for (canonical, alternates) in &self.variants {
            lookup.insert(canonical.clone(), canonical.clone());
            for alternate in alternates {
                lookup.insert(alternate.clone(), canonical.clone());
            }
        }
        lookup
    }
}

/// Remove transcription marks (parentheses and `?`) from a surname.
pub fn strip_editorial_marks(surname: &str) -> String {
    surname.chars().filter(|c| !matches!(c, '(' | ')' | '?')).collect()
}

/// Latest known date per surname: birth, else death, else first marriage.
pub fn latest_dates_by_surname(records: &[Record]) -> HashMap<String, NaiveDate> {
    let mut latest: HashMap<String, NaiveDate> = HashMap::new();
    for record in records {
        let Some(name) = record.last_name.as_deref() else {
            continue;
        };
        let date = record
            .birth_date()
            .or_else(|| record.death_date())
            .or_else(|| record.date_marriage_1.as_ref().and_then(|d| d.as_date()));
        let Some(date) = date else {
            continue;
        };
        latest
            .entry(name.to_string())
            .and_modify(|current| {
                if date > *current {
                    *current = date;
                }
            })
            .or_insert(date);
    }
    latest
}

/// Edit-distance similarity in `0.0..=1.0`, compared by characters.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    1.0 - previous[b.len()] as f64 / longest as f64
}

struct LatestSpelling {
    latest: HashMap<String, NaiveDate>,
    cutoff: f64,
}

impl LatestSpelling {
    /// Among similar spellings seen in the data, the one with the latest date.
    fn best_match(&self, surname: &str) -> Option<&str> {
        self.latest
            .iter()
            .filter(|(name, _)| similarity(surname, name) >= self.cutoff)
            .max_by(|(a_name, a_date), (b_name, b_date)| {
                a_date.cmp(b_date).then_with(|| a_name.cmp(b_name))
            })
            .map(|(name, _)| name.as_str())
    }

    /// Follow best matches to a fixed point. Each step moves to a strictly
    /// later (date, name) pair, so this terminates.
    fn settle(&self, surname: &str) -> Option<String> {
        let mut current = self.best_match(surname)?.to_string();
        while let Some(next) = self.best_match(&current) {
            if next == current {
                break;
            }
            current = next.to_string();
        }
        Some(current)
    }
}

/// Canonicalizes surnames and annotates their known variants.
pub struct NameNormalizer {
    table: VariantTable,
    reverse: HashMap<String, String>,
    fallback: Option<LatestSpelling>,
}

impl NameNormalizer {
    pub fn new(table: VariantTable) -> Self {
        let reverse = table.reverse_lookup();
        debug!("Built surname reverse lookup with {} spellings", reverse.len());
        Self {
            table,
            reverse,
            fallback: None,
        }
    }

    /// Surnames missing from the table resolve to the latest similar
    /// spelling found in `latest` (see [`latest_dates_by_surname`]).
    ///
    /// The match is followed until it settles, so a chain such as
    /// `Hueber → Huber → Hubert` ends at `Hubert` and canonicalizing the
    /// result again leaves it unchanged.
    pub fn with_latest_spelling_fallback(
        mut self,
        latest: HashMap<String, NaiveDate>,
        cutoff: f64,
    ) -> Self {
        self.fallback = Some(LatestSpelling { latest, cutoff });
        self
    }

    pub fn canonicalize(&self, surname: &str) -> String {
        let cleaned = strip_editorial_marks(surname);
        if let Some(canonical) = self.reverse.get(&cleaned) {
            return canonical.clone();
        }
        if let Some(fallback) = &self.fallback {
            if let Some(settled) = fallback.settle(&cleaned) {
                return self.reverse.get(&settled).cloned().unwrap_or(settled);
            }
        }
        cleaned
    }

    /// Alternate spellings of a canonical surname, if it is a table key.
    pub fn variations(&self, canonical: &str) -> Option<Variations> {
        self.table
            .variants_of(canonical)
            .map(|alternates| Variations(alternates.to_vec()))
    }

    /// Write `last_name_normed`; returns whether the spelling changed.
    pub fn normalize_record(&self, record: &mut Record) -> bool {
        let Some(surname) = record.last_name.as_deref() else {
            record.last_name_normed = None;
            return false;
        };
        let canonical = self.canonicalize(surname);
        let changed = canonical != surname;
        record.last_name_normed = Some(canonical);
        changed
    }

    /// Write `last_name_variations` from the canonicalized surname.
    pub fn annotate_record(&self, record: &mut Record) {
        record.last_name_variations = record
            .last_name_normed
            .as_deref()
            .and_then(|canonical| self.variations(canonical));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DateField;

    fn table() -> VariantTable {
        let mut map = BTreeMap::new();
        map.insert(
            "Bettinger".to_string(),
            vec!["Pettinger".to_string(), "Pöttinger".to_string()],
        );
        VariantTable::from_map(map).unwrap()
    }

    fn person(last_name: &str, birth: (i32, u32, u32)) -> Record {
        Record {
            last_name: Some(last_name.to_string()),
            date_birth: Some(DateField::Parsed(
                NaiveDate::from_ymd_opt(birth.0, birth.1, birth.2).unwrap(),
            )),
            ..Default::default()
        }
    }

    #[test]
    fn test_canonicalize_same_and_variant() {
        let normalizer = NameNormalizer::new(table());
        assert_eq!(normalizer.canonicalize("Bettinger"), "Bettinger");
        assert_eq!(normalizer.canonicalize("Pöttinger"), "Bettinger");
        assert_eq!(normalizer.canonicalize("Huber"), "Huber");
    }

    #[test]
    fn test_canonicalize_strips_marks() {
        let normalizer = NameNormalizer::new(table());
        assert_eq!(normalizer.canonicalize("(Pettinger)?"), "Bettinger");
        assert_eq!(normalizer.canonicalize("Huber?"), "Huber");
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        let normalizer = NameNormalizer::new(table());
        let once = normalizer.canonicalize("Pettinger");
        assert_eq!(normalizer.canonicalize(&once), once);
    }

    #[test]
    fn test_annotate_variations() {
        let normalizer = NameNormalizer::new(table());
        let mut record = person("Pöttinger", (1765, 1, 1));
        assert!(normalizer.normalize_record(&mut record));
        normalizer.annotate_record(&mut record);
        assert_eq!(record.last_name_normed.as_deref(), Some("Bettinger"));
        assert_eq!(
            record.last_name_variations,
            Some(Variations(vec!["Pettinger".to_string(), "Pöttinger".to_string()]))
        );

        let mut unique = person("Huber", (1800, 1, 1));
        assert!(!normalizer.normalize_record(&mut unique));
        normalizer.annotate_record(&mut unique);
        assert_eq!(unique.last_name_variations, None);
    }

    #[test]
    fn test_record_without_surname() {
        let normalizer = NameNormalizer::new(table());
        let mut record = Record::default();
        normalizer.normalize_record(&mut record);
        normalizer.annotate_record(&mut record);
        assert_eq!(record.last_name_normed, None);
        assert_eq!(record.last_name_variations, None);
    }

    #[test]
    fn test_latest_dates_by_surname() {
        let records = vec![
            person("Bettinger", (1795, 1, 1)),
            person("Bettinger", (1800, 1, 1)),
            person("Pöttinger", (1765, 1, 1)),
            Record {
                last_name: Some("Undated".to_string()),
                ..Default::default()
            },
        ];

        let latest = latest_dates_by_surname(&records);
        let mut expected = HashMap::new();
        expected.insert("Bettinger".to_string(), NaiveDate::from_ymd_opt(1800, 1, 1).unwrap());
        expected.insert("Pöttinger".to_string(), NaiveDate::from_ymd_opt(1765, 1, 1).unwrap());
        assert_eq!(latest, expected);
    }

    #[test]
    fn test_latest_spelling_fallback() {
        let records = vec![
            person("Hueber", (1720, 1, 1)),
            person("Huber", (1810, 1, 1)),
            person("Maier", (1900, 1, 1)),
        ];
        let normalizer = NameNormalizer::new(VariantTable::default())
            .with_latest_spelling_fallback(latest_dates_by_surname(&records), 0.8);

        assert_eq!(normalizer.canonicalize("Hueber"), "Huber");
        assert_eq!(normalizer.canonicalize("Maier"), "Maier");
        assert_eq!(normalizer.canonicalize("Zach"), "Zach");
    }

    #[test]
    fn test_latest_spelling_fallback_is_idempotent() {
        let records = vec![
            person("Hueber", (1720, 1, 1)),
            person("Huber", (1810, 1, 1)),
            person("Hubert", (1900, 1, 1)),
            person("Pettinger", (1905, 1, 1)),
            person("Pettinge", (1700, 1, 1)),
        ];
        let normalizer = NameNormalizer::new(table())
            .with_latest_spelling_fallback(latest_dates_by_surname(&records), 0.8);

        // Hueber is not similar to Hubert, but reaches it through Huber
        assert!(similarity("Hueber", "Hubert") < 0.8);
        assert_eq!(normalizer.canonicalize("Hueber"), "Hubert");
        // a fuzzy match onto a table alternate ends at its canonical name
        assert_eq!(normalizer.canonicalize("Pettinge"), "Bettinger");

        for name in ["Hueber", "Huber", "Hubert", "Pettinge", "Zach"] {
            let once = normalizer.canonicalize(name);
            assert_eq!(normalizer.canonicalize(&once), once, "{}", name);
        }
    }

    #[test]
    fn test_similarity() {
        assert_eq!(similarity("Huber", "Huber"), 1.0);
        assert!((similarity("Hueber", "Huber") - (1.0 - 1.0 / 6.0)).abs() < 1e-9);
        assert!(similarity("Bettinger", "Maier") < 0.5);
        assert_eq!(similarity("", ""), 1.0);
    }

    #[test]
    fn test_rejects_ambiguous_table() {
        let mut map = BTreeMap::new();
        map.insert("Bettinger".to_string(), vec!["Pettinger".to_string()]);
        map.insert("Bödinger".to_string(), vec!["Pettinger".to_string()]);
        assert!(matches!(
            VariantTable::from_map(map),
            Err(EtlError::InvalidVariantTable(_))
        ));

        let mut map = BTreeMap::new();
        map.insert("Bettinger".to_string(), vec!["Huber".to_string()]);
        map.insert("Huber".to_string(), vec!["Hueber".to_string()]);
        assert!(matches!(
            VariantTable::from_map(map),
            Err(EtlError::InvalidVariantTable(_))
        ));
    }
}
