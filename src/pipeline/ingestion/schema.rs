//! Column layout of the ancestry export.
//!
//! The export's header row is not trusted for names: columns are matched
//! positionally against the table below and renamed to their canonical names.

use crate::error::{EtlError, Result};
use crate::types::{Record, APPENDED_COLUMNS};
use csv::StringRecord;

/// Export columns in file order.
pub const EXPORT_COLUMNS: &[(&str, &str)] = &[
    ("#REFN", "reference"),
    ("NAME", "full_name"),
    ("FATH.NAME", "father_name"),
    ("FATH.#REFN", "father_reference"),
    ("MOTH.NAME", "mother_name"),
    ("MOTH.#REFN", "mother_reference"),
    ("_UID", "id"),
    ("SURN", "last_name"),
    ("GIVN", "first_name"),
    ("SEX", "gender"),
    ("BIRT.PLAC", "birth_place"),
    ("OCCU", "occupation"),
    ("SOUR", "source"),
    ("CHAN.DATE", "date_changed"),
    ("CHAN.DATE.TIME", "time_changed"),
    ("BIRT.DATE", "date_birth"),
    ("DEAT.DATE", "date_death"),
    ("NOTE", "note"),
    ("DEAT.PLAC", "death_place"),
    ("NOTE.2", "note_2"),
    ("SOUR.2", "source_2"),
    ("_UID.2", "id_2"),
    ("_UID.3", "id_3"),
    ("OCCU.NOTE", "occupation_note"),
    ("MARR.SPOU.NAME.1", "spouse_1_name"),
    ("MARR.SPOU.#REFN.1", "spouse_1_reference"),
    ("FAM.HUSB.1", "husband_1_family_reference"),
    ("FAM.WIFE.1", "wife_1_family_reference"),
    ("MARR.DATE.1", "date_marriage_1"),
    ("MARR.PLAC.1", "location_marriage_1"),
    ("FAM.CHIL.1", "child_1_family_reference"),
    ("FAM.MARR.1", "fam_marr_1"),
    ("FAM._STAT.1", "family_1_status"),
    ("FAM._MARR.1", "fam_marr_12"),
    ("MARR.SPOU.NAME.2", "spouse_2_name"),
    ("MARR.SPOU.#REFN.2", "spouse_2_reference"),
    ("FAM.HUSB.2", "husband_2_family_reference"),
    ("FAM.WIFE.2", "wife_2_family_reference"),
    ("MARR.DATE.2", "date_marriage_2"),
    ("MARR.PLAC.2", "location_marriage_2"),
    ("FAM.CHIL.2", "child_2_family_reference"),
    ("FAM.MARR.2", "fam_marr_2"),
    ("FAM._STAT.2", "family_2_status"),
    ("FAM._MARR.2", "fam_marr_22"),
    ("MARR.SPOU.NAME.3", "spouse_3_name"),
    ("MARR.SPOU.#REFN.3", "spouse_3_reference"),
    ("FAM.HUSB.3", "husband_3_family_reference"),
    ("FAM.WIFE.3", "wife_3_family_reference"),
    ("MARR.DATE.3", "date_marriage_3"),
    ("MARR.PLAC.3", "location_marriage_3"),
    ("FAM.CHIL.3", "child_3_family_reference"),
    ("FAM.MARR.3", "fam_marr_3"),
    ("FAM._STAT.3", "family_3_status"),
    ("FAM._MARR.3", "fam_marr_32"),
    ("MARR.SPOU.NAME.4", "spouse_4_name"),
    ("MARR.SPOU.#REFN.4", "spouse_4_reference"),
    ("FAM.HUSB.4", "husband_4_family_reference"),
    ("FAM.WIFE.4", "wife_4_family_reference"),
    ("MARR.DATE.4", "date_marriage_4"),
    ("MARR.PLAC.4", "location_marriage_4"),
    ("FAM.CHIL.4", "child_4_family_reference"),
    ("FAM.MARR.4", "fam_marr_4"),
    ("FAM._STAT.4", "family_4_status"),
    ("FAM._MARR.4", "fam_marr_42"),
    ("OBJE.FILE.1", "file_1"),
    ("OBJE.TITL.1", "file_1_title"),
];

/// Canonical names followed by the pipeline's appended columns.
pub fn output_header() -> Vec<&'static str> {
    EXPORT_COLUMNS
        .iter()
        .map(|(_, canonical)| *canonical)
        .chain(APPENDED_COLUMNS.iter().copied())
        .collect()
}

/// Zips export rows against a declared column list to build records.
#[derive(Debug, Clone)]
pub struct FieldMapper {
    header: StringRecord,
}

impl Default for FieldMapper {
    fn default() -> Self {
        Self::new(EXPORT_COLUMNS)
    }
}

impl FieldMapper {
    /// `columns` pairs each export key with its canonical name; only the
    /// canonical names are used, since the export header is not trusted.
    pub fn new(columns: &[(&'static str, &'static str)]) -> Self {
        let header = StringRecord::from(
            columns.iter().map(|&(_, canonical)| canonical).collect::<Vec<_>>(),
        );
        Self { header }
    }

    /// Build a record from one data row; `row` is the 1-based line number
    /// used in error messages.
    pub fn map_row(&self, row: usize, fields: &StringRecord) -> Result<Record> {
        if fields.len() != self.header.len() {
            return Err(EtlError::MalformedInput {
                row,
                message: format!(
                    "expected {} fields, found {}",
                    self.header.len(),
                    fields.len()
                ),
            });
        }

        fields
            .deserialize(Some(&self.header))
            .map_err(|e| EtlError::MalformedInput {
                row,
                message: e.to_string(),
            })
    }
}
