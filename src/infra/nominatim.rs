use crate::app::ports::GeocoderPort;
use crate::config::GeocoderConfig;
use crate::error::{EtlError, Result};
use crate::infra::rate_limiter::RateLimiter;
use crate::types::GeoLocation;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

/// Gazetteer backed by the Nominatim search API.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
    limiter: RateLimiter,
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            limiter: RateLimiter::new(config.requests_per_minute),
        })
    }

    fn map_transport_error(query: &str, e: reqwest::Error) -> EtlError {
        if e.is_timeout() {
            EtlError::GeocoderTimeout {
                query: query.to_string(),
            }
        } else {
            EtlError::GeocoderUnavailable(e.to_string())
        }
    }
}

/// Take the best (first) hit of a Nominatim search response.
fn first_location(body: &[u8]) -> Result<Option<GeoLocation>> {
    let places: Vec<NominatimPlace> = serde_json::from_slice(body)
        .map_err(|e| EtlError::GeocoderUnavailable(format!("unexpected response body: {}", e)))?;

    let Some(place) = places.into_iter().next() else {
        return Ok(None);
    };
    let latitude: f64 = place
        .lat
        .parse()
        .map_err(|_| EtlError::GeocoderUnavailable(format!("bad latitude '{}'", place.lat)))?;
    let longitude: f64 = place
        .lon
        .parse()
        .map_err(|_| EtlError::GeocoderUnavailable(format!("bad longitude '{}'", place.lon)))?;

    Ok(Some(GeoLocation {
        latitude,
        longitude,
        address: place.display_name,
    }))
}

#[async_trait]
impl GeocoderPort for NominatimGeocoder {
    #[instrument(skip(self))]
    async fn geocode(&self, query: &str, language: &str) -> Result<Option<GeoLocation>> {
        self.limiter.acquire().await;

        let url = format!("{}/search", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("q", query),
                ("format", "jsonv2"),
                ("limit", "1"),
                ("accept-language", language),
            ])
            .send()
            .await
            .map_err(|e| Self::map_transport_error(query, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(EtlError::GeocoderUnavailable(format!(
                "provider responded with status {}",
                status.as_u16()
            )));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| Self::map_transport_error(query, e))?;
        let location = first_location(&body)?;
        debug!(found = location.is_some(), "Nominatim lookup finished");
        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_location_takes_first_hit() {
        let body = br#"[
            {"place_id": 1, "lat": "48.4516", "lon": "13.1898", "display_name": "Griesbach im Rottal, Bayern, Deutschland"},
            {"place_id": 2, "lat": "50.0", "lon": "10.0", "display_name": "Griesbach, Somewhere"}
        ]"#;
        let location = first_location(body).unwrap().unwrap();
        assert_eq!(location.latitude, 48.4516);
        assert_eq!(location.longitude, 13.1898);
        assert_eq!(location.address, "Griesbach im Rottal, Bayern, Deutschland");
    }

    #[test]
    fn test_empty_result_is_no_match() {
        assert_eq!(first_location(b"[]").unwrap(), None);
    }

    #[test]
    fn test_garbage_body_is_unavailable() {
        let err = first_location(b"<html>rate limited</html>").unwrap_err();
        assert!(matches!(err, EtlError::GeocoderUnavailable(_)));
    }

    #[test]
    fn test_new_trims_base_url() {
        let config = GeocoderConfig {
            base_url: "http://localhost:8080/".to_string(),
            ..Default::default()
        };
        let geocoder = NominatimGeocoder::new(&config).unwrap();
        assert_eq!(geocoder.base_url, "http://localhost:8080");
    }
}
