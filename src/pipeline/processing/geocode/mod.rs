//! Place name → coordinates, memoized in a persistent cache.

pub mod cache;

pub use cache::GeocodeCache;

use crate::app::ports::GeocoderPort;
use crate::config::GeocoderConfig;
use crate::error::{EtlError, Result};
use crate::observability::metrics;
use crate::types::GeoLocation;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

static OUTSIDE_PARENS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)\(").expect("valid outside regex"));
static INSIDE_PARENS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((.*?)\)").expect("valid inside regex"));

/// Lookup strings for a place, most specific first.
///
/// `Outer (Inner)` yields the full string, then `Outer`, then `Inner`.
pub fn candidates(place: &str) -> Vec<String> {
    let place = place.trim();
    let mut result = vec![place.to_string()];

    if let Some(inside) = INSIDE_PARENS.captures(place) {
        if let Some(outside) = OUTSIDE_PARENS.captures(place) {
            let outer = outside[1].trim();
            if !outer.is_empty() {
                result.push(outer.to_string());
            }
        }
        let inner = inside[1].trim();
        if !inner.is_empty() {
            result.push(inner.to_string());
        }
    }

    result
}

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Appended to every query, e.g. "Griesbach, Germany"
    pub country: String,
    pub language: String,
    pub retry_backoff: Duration,
    pub max_retries_per_candidate: u32,
}

impl From<&GeocoderConfig> for ResolverSettings {
    fn from(config: &GeocoderConfig) -> Self {
        Self {
            country: config.country.clone(),
            language: config.language.clone(),
            retry_backoff: config.retry_backoff(),
            max_retries_per_candidate: config.max_retries_per_candidate,
        }
    }
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self::from(&GeocoderConfig::default())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverStats {
    pub cache_hits: usize,
    pub provider_calls: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub timeouts: usize,
}

/// Resolves places through the cache first and the provider second.
pub struct GeocodeResolver {
    geocoder: Arc<dyn GeocoderPort>,
    cache: GeocodeCache,
    settings: ResolverSettings,
    stats: ResolverStats,
}

impl GeocodeResolver {
    pub fn new(
        geocoder: Arc<dyn GeocoderPort>,
        cache: GeocodeCache,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            geocoder,
            cache,
            settings,
            stats: ResolverStats::default(),
        }
    }

    pub fn stats(&self) -> ResolverStats {
        self.stats
    }

    pub fn cache_mut(&mut self) -> &mut GeocodeCache {
        &mut self.cache
    }

    /// Resolve one place.
    ///
    /// Candidates are tried in order until one resolves; a timed-out
    /// candidate is re-queued after the backoff, at most
    /// `max_retries_per_candidate` times. Returns `GeocoderTimeout` only when
    /// nothing resolved and some candidate ran out of retries. Misses are not
    /// cached.
    #[instrument(skip(self))]
    pub async fn resolve(&mut self, place: Option<&str>) -> Result<Option<GeoLocation>> {
        let Some(place) = place.map(str::trim).filter(|p| !p.is_empty()) else {
            return Ok(None);
        };

        if let Some(hit) = self.cache.get(place) {
            self.stats.cache_hits += 1;
            metrics::geocode::cache_hit();
            debug!("Cache hit");
            return Ok(Some(hit.clone()));
        }

        let mut queue: VecDeque<(String, u32)> =
            candidates(place).into_iter().map(|c| (c, 0)).collect();
        let mut exhausted_timeout = false;

        while let Some((candidate, attempt)) = queue.pop_front() {
            let query = format!("{}, {}", candidate, self.settings.country);
            self.stats.provider_calls += 1;
            metrics::geocode::provider_call();

            match self.geocoder.geocode(&query, &self.settings.language).await {
                Ok(Some(location)) => {
                    debug!(candidate = %candidate, "Resolved");
                    self.cache.put(place, location.clone());
                    self.stats.resolved += 1;
                    return Ok(Some(location));
                }
                Ok(None) => {
                    debug!(candidate = %candidate, "No match");
                }
                Err(EtlError::GeocoderTimeout { .. }) => {
                    self.stats.timeouts += 1;
                    metrics::geocode::timeout();
                    if attempt < self.settings.max_retries_per_candidate {
                        warn!(
                            candidate = %candidate,
                            "Geocoder timed out, retrying in {:?}",
                            self.settings.retry_backoff
                        );
                        tokio::time::sleep(self.settings.retry_backoff).await;
                        queue.push_back((candidate, attempt + 1));
                    } else {
                        warn!(candidate = %candidate, "Geocoder timed out, giving up on candidate");
                        exhausted_timeout = true;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        self.stats.unresolved += 1;
        metrics::geocode::unresolved();
        if exhausted_timeout {
            Err(EtlError::GeocoderTimeout {
                query: place.to_string(),
            })
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    enum Reply {
        Found(f64),
        NotFound,
        Timeout,
        Down,
    }

    /// Replays scripted replies, then keeps answering `fallback`.
    struct ScriptedGeocoder {
        replies: Mutex<VecDeque<Reply>>,
        fallback: Option<f64>,
        queries: Mutex<Vec<String>>,
    }

    impl ScriptedGeocoder {
        fn new(replies: Vec<Reply>, fallback: Option<f64>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                fallback,
                queries: Mutex::new(Vec::new()),
            })
        }

        fn queries(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    fn location(coord: f64) -> GeoLocation {
        GeoLocation {
            latitude: coord,
            longitude: coord,
            address: "Test".to_string(),
        }
    }

    #[async_trait]
    impl GeocoderPort for ScriptedGeocoder {
        async fn geocode(&self, query: &str, _language: &str) -> Result<Option<GeoLocation>> {
            self.queries.lock().unwrap().push(query.to_string());
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(Reply::Found(coord)) => Ok(Some(location(coord))),
                Some(Reply::NotFound) => Ok(None),
                Some(Reply::Timeout) => Err(EtlError::GeocoderTimeout {
                    query: query.to_string(),
                }),
                Some(Reply::Down) => Err(EtlError::GeocoderUnavailable("503".to_string())),
                None => Ok(self.fallback.map(location)),
            }
        }
    }

    fn settings() -> ResolverSettings {
        ResolverSettings {
            retry_backoff: Duration::ZERO,
            ..Default::default()
        }
    }

    fn resolver(geocoder: Arc<ScriptedGeocoder>) -> GeocodeResolver {
        GeocodeResolver::new(geocoder, GeocodeCache::in_memory(), settings())
    }

    #[test]
    fn test_candidates_simple() {
        assert_eq!(candidates("Griesbach"), vec!["Griesbach"]);
    }

    #[test]
    fn test_candidates_inside_outside() {
        assert_eq!(
            candidates("Poigham (Karpfham)"),
            vec!["Poigham (Karpfham)", "Poigham", "Karpfham"]
        );
    }

    #[test]
    fn test_candidates_unbalanced_parens() {
        assert_eq!(candidates("Weng (bei"), vec!["Weng (bei"]);
        assert_eq!(candidates(" (Karpfham) "), vec!["(Karpfham)", "Karpfham"]);
    }

    #[tokio::test]
    async fn test_null_place_never_calls_provider() {
        let geocoder = ScriptedGeocoder::new(vec![], Some(14.333));
        let mut resolver = resolver(geocoder.clone());

        assert_eq!(resolver.resolve(None).await.unwrap(), None);
        assert_eq!(resolver.resolve(Some("")).await.unwrap(), None);
        assert_eq!(resolver.resolve(Some("   ")).await.unwrap(), None);
        assert!(geocoder.queries().is_empty());
        assert!(resolver.cache.is_empty());
    }

    #[tokio::test]
    async fn test_query_format() {
        let geocoder = ScriptedGeocoder::new(vec![], Some(14.333));
        let mut resolver = resolver(geocoder.clone());

        resolver.resolve(Some(" München ")).await.unwrap();
        assert_eq!(geocoder.queries(), vec!["München, Germany"]);
        assert!(resolver.cache.get("München").is_some());
    }

    #[tokio::test]
    async fn test_exit_on_location() {
        let geocoder = ScriptedGeocoder::new(vec![Reply::NotFound, Reply::Found(14.333)], None);
        let mut resolver = resolver(geocoder.clone());

        let found = resolver.resolve(Some("Poigham (Karpfham)")).await.unwrap();
        assert_eq!(found, Some(location(14.333)));
        assert_eq!(
            geocoder.queries(),
            vec!["Poigham (Karpfham), Germany", "Poigham, Germany"]
        );
        // keyed by the original string, not the candidate that matched
        assert!(resolver.cache.get("Poigham (Karpfham)").is_some());
        assert!(resolver.cache.get("Poigham").is_none());
    }

    #[tokio::test]
    async fn test_retry_on_timeout() {
        let geocoder = ScriptedGeocoder::new(vec![Reply::Timeout, Reply::Found(14.333)], None);
        let mut resolver = resolver(geocoder.clone());

        let found = resolver.resolve(Some("Griesbach")).await.unwrap();
        assert_eq!(found, Some(location(14.333)));
        assert_eq!(geocoder.queries().len(), 2);
        assert_eq!(resolver.stats().timeouts, 1);
    }

    #[tokio::test]
    async fn test_timed_out_candidate_goes_to_back_of_queue() {
        let geocoder = ScriptedGeocoder::new(
            vec![Reply::Timeout, Reply::NotFound, Reply::NotFound, Reply::Found(1.0)],
            None,
        );
        let mut resolver = resolver(geocoder.clone());

        resolver.resolve(Some("Poigham (Karpfham)")).await.unwrap();
        assert_eq!(
            geocoder.queries(),
            vec![
                "Poigham (Karpfham), Germany",
                "Poigham, Germany",
                "Karpfham, Germany",
                "Poigham (Karpfham), Germany",
            ]
        );
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let geocoder = ScriptedGeocoder::new(
            vec![Reply::Timeout, Reply::Timeout, Reply::Timeout],
            Some(1.0),
        );
        let mut resolver = resolver(geocoder.clone());

        let err = resolver.resolve(Some("Weng")).await.unwrap_err();
        assert!(matches!(err, EtlError::GeocoderTimeout { .. }));
        assert_eq!(geocoder.queries().len(), 2);
        assert!(resolver.cache.is_empty());
    }

    #[tokio::test]
    async fn test_miss_is_not_cached() {
        let geocoder = ScriptedGeocoder::new(vec![], None);
        let mut resolver = resolver(geocoder.clone());

        assert_eq!(resolver.resolve(Some("Atlantis")).await.unwrap(), None);
        assert_eq!(resolver.resolve(Some("Atlantis")).await.unwrap(), None);
        assert_eq!(geocoder.queries().len(), 2);
        assert!(resolver.cache.is_empty());
        assert_eq!(resolver.stats().unresolved, 2);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_provider() {
        let geocoder = ScriptedGeocoder::new(vec![], Some(14.333));
        let mut cache = GeocodeCache::in_memory();
        cache.put("Griesbach", location(12.333));
        let mut resolver = GeocodeResolver::new(geocoder.clone(), cache, settings());

        let found = resolver.resolve(Some("Griesbach")).await.unwrap();
        assert_eq!(found, Some(location(12.333)));
        assert!(geocoder.queries().is_empty());
        assert_eq!(resolver.stats().cache_hits, 1);
    }

    #[tokio::test]
    async fn test_unavailable_propagates() {
        let geocoder = ScriptedGeocoder::new(vec![Reply::Down], Some(1.0));
        let mut resolver = resolver(geocoder);

        let err = resolver.resolve(Some("Weng")).await.unwrap_err();
        assert!(matches!(err, EtlError::GeocoderUnavailable(_)));
    }
}
