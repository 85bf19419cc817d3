use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::VARIATIONS_SEPARATOR;

/// A date column as it moves through the pipeline: the raw export text until
/// the cleaning stage replaces it with an exact calendar date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateField {
    Raw(String),
    Parsed(NaiveDate),
}

impl DateField {
    /// The parsed date, if this field has been cleaned.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            DateField::Parsed(date) => Some(*date),
            DateField::Raw(_) => None,
        }
    }
}

impl From<NaiveDate> for DateField {
    fn from(date: NaiveDate) -> Self {
        DateField::Parsed(date)
    }
}

impl Serialize for DateField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DateField::Parsed(date) => serializer.collect_str(&date.format("%Y-%m-%d")),
            DateField::Raw(raw) => serializer.serialize_str(raw),
        }
    }
}

impl<'de> Deserialize<'de> for DateField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(DateField::Raw)
    }
}

/// Known alternate spellings of a canonical surname, written as one cell.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Variations(pub Vec<String>);

impl Variations {
    pub fn joined(&self) -> String {
        self.0.join(VARIATIONS_SEPARATOR)
    }
}

impl Serialize for Variations {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.joined())
    }
}

/// A resolved place: coordinates plus the gazetteer's address string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
}

/// One person from the ancestry export.
///
/// Field order is the output column order: the canonical export columns
/// first, then the columns appended by the pipeline stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub reference: Option<String>,
    pub full_name: Option<String>,
    pub father_name: Option<String>,
    pub father_reference: Option<String>,
    pub mother_name: Option<String>,
    pub mother_reference: Option<String>,
    pub id: Option<String>,
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    pub gender: Option<String>,
    pub birth_place: Option<String>,
    pub occupation: Option<String>,
    pub source: Option<String>,
    pub date_changed: Option<String>,
    pub time_changed: Option<String>,
    pub date_birth: Option<DateField>,
    pub date_death: Option<DateField>,
    pub note: Option<String>,
    pub death_place: Option<String>,
    pub note_2: Option<String>,
    pub source_2: Option<String>,
    pub id_2: Option<String>,
    pub id_3: Option<String>,
    pub occupation_note: Option<String>,
    pub spouse_1_name: Option<String>,
    pub spouse_1_reference: Option<String>,
    pub husband_1_family_reference: Option<String>,
    pub wife_1_family_reference: Option<String>,
    pub date_marriage_1: Option<DateField>,
    pub location_marriage_1: Option<String>,
    pub child_1_family_reference: Option<String>,
    pub fam_marr_1: Option<String>,
    pub family_1_status: Option<String>,
    pub fam_marr_12: Option<String>,
    pub spouse_2_name: Option<String>,
    pub spouse_2_reference: Option<String>,
    pub husband_2_family_reference: Option<String>,
    pub wife_2_family_reference: Option<String>,
    pub date_marriage_2: Option<DateField>,
    pub location_marriage_2: Option<String>,
    pub child_2_family_reference: Option<String>,
    pub fam_marr_2: Option<String>,
    pub family_2_status: Option<String>,
    pub fam_marr_22: Option<String>,
    pub spouse_3_name: Option<String>,
    pub spouse_3_reference: Option<String>,
    pub husband_3_family_reference: Option<String>,
    pub wife_3_family_reference: Option<String>,
    pub date_marriage_3: Option<DateField>,
    pub location_marriage_3: Option<String>,
    pub child_3_family_reference: Option<String>,
    pub fam_marr_3: Option<String>,
    pub family_3_status: Option<String>,
    pub fam_marr_32: Option<String>,
    pub spouse_4_name: Option<String>,
    pub spouse_4_reference: Option<String>,
    pub husband_4_family_reference: Option<String>,
    pub wife_4_family_reference: Option<String>,
    pub date_marriage_4: Option<DateField>,
    pub location_marriage_4: Option<String>,
    pub child_4_family_reference: Option<String>,
    pub fam_marr_4: Option<String>,
    pub family_4_status: Option<String>,
    pub fam_marr_42: Option<String>,
    pub file_1: Option<String>,
    pub file_1_title: Option<String>,

    // Appended by the pipeline
    #[serde(default, skip_deserializing)]
    pub last_name_normed: Option<String>,
    #[serde(default, skip_deserializing)]
    pub last_name_variations: Option<Variations>,
    #[serde(default, skip_deserializing)]
    pub latitude: Option<f64>,
    #[serde(default, skip_deserializing)]
    pub longitude: Option<f64>,
    #[serde(default, skip_deserializing)]
    pub place: Option<String>,
    #[serde(default, skip_deserializing)]
    pub year_birth: Option<i32>,
    #[serde(default, skip_deserializing)]
    pub year_death: Option<i32>,
}

/// Columns the pipeline appends after the canonical export columns.
pub const APPENDED_COLUMNS: &[&str] = &[
    "last_name_normed",
    "last_name_variations",
    "latitude",
    "longitude",
    "place",
    "year_birth",
    "year_death",
];

impl Record {
    /// The six date columns, birth first.
    pub fn date_fields_mut(&mut self) -> [&mut Option<DateField>; 6] {
        [
            &mut self.date_birth,
            &mut self.date_death,
            &mut self.date_marriage_1,
            &mut self.date_marriage_2,
            &mut self.date_marriage_3,
            &mut self.date_marriage_4,
        ]
    }

    pub fn birth_date(&self) -> Option<NaiveDate> {
        self.date_birth.as_ref().and_then(DateField::as_date)
    }

    pub fn death_date(&self) -> Option<NaiveDate> {
        self.date_death.as_ref().and_then(DateField::as_date)
    }

    /// Place-bearing columns in lookup priority order.
    pub fn place_fields(&self) -> [&Option<String>; 6] {
        [
            &self.birth_place,
            &self.death_place,
            &self.location_marriage_1,
            &self.location_marriage_2,
            &self.location_marriage_3,
            &self.location_marriage_4,
        ]
    }

    /// First populated place column, or `None` if the record has no place.
    pub fn first_place(&self) -> Option<&str> {
        self.place_fields()
            .into_iter()
            .filter_map(|p| p.as_deref())
            .find(|p| !p.trim().is_empty())
    }

    /// Fill the location columns from a geocode result (or clear them).
    pub fn set_location(&mut self, location: Option<&GeoLocation>) {
        self.latitude = location.map(|l| l.latitude);
        self.longitude = location.map(|l| l.longitude);
        self.place = location.map(|l| l.address.clone());
    }

    /// Derive the year columns from the current birth/death dates.
    pub fn set_years(&mut self) {
        self.year_birth = self.birth_date().map(|d| d.year());
        self.year_death = self.death_date().map(|d| d.year());
    }
}
