// Ancestry pipeline: ingestion, processing, and hand-off to the sinks

pub mod ingestion;
pub mod processing;

use crate::app::ports::RecordSink;
use crate::config::NamesConfig;
use crate::error::Result;
use crate::observability::metrics;
use crate::types::Record;
use processing::{
    clean_record, latest_dates_by_surname, GeocodeResolver, NameNormalizer, Redactor,
    ResolverStats, VariantTable,
};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

/// Result of a complete pipeline run
#[derive(Debug, Default, Clone, Serialize)]
pub struct PipelineResult {
    pub total_records: usize,
    pub written_records: usize,
    pub excluded_records: usize,
    pub fields_redacted: usize,
    pub surnames_changed: usize,
    pub places_unresolved: usize,
    pub geocode_timeouts: usize,
    pub geocode_cache_hits: usize,
    pub geocode_provider_calls: usize,
}

impl PipelineResult {
    fn record_geocode_stats(&mut self, stats: ResolverStats) {
        self.geocode_cache_hits = stats.cache_hits;
        self.geocode_provider_calls = stats.provider_calls;
        self.geocode_timeouts = stats.timeouts;
    }
}

/// Runs clean → canonicalize → annotate → geocode → redact → exclude.
pub struct Pipeline {
    variants: VariantTable,
    names: NamesConfig,
    resolver: GeocodeResolver,
    redactor: Redactor,
}

impl Pipeline {
    pub fn new(
        variants: VariantTable,
        names: NamesConfig,
        resolver: GeocodeResolver,
        redactor: Redactor,
    ) -> Self {
        Self {
            variants,
            names,
            resolver,
            redactor,
        }
    }

    /// Write the geocode cache back to its file.
    pub fn persist_cache(&mut self) -> Result<()> {
        self.resolver.cache_mut().persist()
    }

    fn name_normalizer(&self, records: &[Record]) -> NameNormalizer {
        let normalizer = NameNormalizer::new(self.variants.clone());
        if self.names.fuzzy_fallback {
            let latest = latest_dates_by_surname(records);
            debug!("Surname fallback uses {} dated spellings", latest.len());
            normalizer.with_latest_spelling_fallback(latest, self.names.similarity_cutoff)
        } else {
            normalizer
        }
    }

    /// Transform the full record sequence. Structural errors abort the run;
    /// geocoder timeouts leave the record without a location.
    #[instrument(skip_all, fields(records = records.len()))]
    pub async fn process(&mut self, records: Vec<Record>) -> Result<(Vec<Record>, PipelineResult)> {
        let mut result = PipelineResult {
            total_records: records.len(),
            ..Default::default()
        };
        metrics::records::read(records.len());

        info!("🧹 Cleaning dates and surnames...");
        let cleaned = records
            .into_iter()
            .map(clean_record)
            .collect::<Result<Vec<_>>>()?;

        info!("🔤 Normalizing surnames...");
        let names = self.name_normalizer(&cleaned);
        let mut normalized = cleaned;
        for record in normalized.iter_mut() {
            if names.normalize_record(record) {
                result.surnames_changed += 1;
                metrics::records::surname_canonicalized();
            }
            names.annotate_record(record);
        }

        info!("🌍 Geocoding places...");
        let total = normalized.len();
        for (i, record) in normalized.iter_mut().enumerate() {
            let place = record.first_place().map(str::to_string);
            match self.resolver.resolve(place.as_deref()).await {
                Ok(location) => {
                    if location.is_none() && place.is_some() {
                        result.places_unresolved += 1;
                    }
                    record.set_location(location.as_ref());
                }
                Err(e) if e.is_recoverable() => {
                    warn!("Leaving record {} without location: {}", i, e);
                    result.places_unresolved += 1;
                    record.set_location(None);
                }
                Err(e) => return Err(e),
            }
            if (i + 1) % 100 == 0 {
                debug!("Geocoded {}/{} records", i + 1, total);
            }
        }
        result.record_geocode_stats(self.resolver.stats());

        info!("🔒 Redacting records after {}...", self.redactor.cutoff());
        let (mut kept, stats) = self.redactor.apply(normalized);
        for record in kept.iter_mut() {
            record.set_years();
        }
        result.excluded_records = stats.records_excluded;
        result.fields_redacted = stats.fields_redacted;
        result.written_records = kept.len();
        metrics::records::excluded(stats.records_excluded);
        metrics::records::fields_redacted(stats.fields_redacted);

        info!(
            "✅ Processed {} records ({} excluded, {} dates redacted, {} places unresolved)",
            result.total_records,
            result.excluded_records,
            result.fields_redacted,
            result.places_unresolved
        );
        Ok((kept, result))
    }

    /// Process the records and hand the result to every sink in order.
    pub async fn run(
        &mut self,
        records: Vec<Record>,
        sinks: &mut [Box<dyn RecordSink>],
    ) -> Result<PipelineResult> {
        let started = std::time::Instant::now();
        let (records, result) = self.process(records).await?;

        for sink in sinks.iter_mut() {
            info!("💾 Writing {} records to {} sink", records.len(), sink.name());
            sink.write(&records)?;
        }

        metrics::pipeline_duration(started.elapsed().as_secs_f64());
        Ok(result)
    }
}
