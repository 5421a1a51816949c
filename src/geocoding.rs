//! Reverse geocoding: coordinate to human-readable place name.
//!
//! [`ReverseGeocodeService`] tries each configured [`ReverseGeocoder`] in
//! order, bounding every attempt with a timeout. When none of them answer it
//! falls back to [`Location::fallback_name`], so callers always get a name.

use crate::models::Location;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Geocoder returned no address")]
    NoAddress,

    #[error("Geocoder rejected the request: {0}")]
    Rejected(String),
}

/// Something that can describe a coordinate.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<String, GeocodeError>;
}

#[derive(Deserialize)]
struct NominatimReverse {
    display_name: Option<String>,
    error: Option<String>,
}

/// Public OpenStreetMap Nominatim instance (or a compatible one).
///
/// Nominatim asks for at most one request per second and an identifying
/// User-Agent; pin moves are user-paced so no extra throttling is applied.
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    fn name(&self) -> &'static str {
        "nominatim"
    }

    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<String, GeocodeError> {
        let url = format!("{}/reverse", self.base_url);
        let body = self
            .client
            .get(url)
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<NominatimReverse>()
            .await?;

        if let Some(err) = body.error {
            return Err(GeocodeError::Rejected(err));
        }
        body.display_name
            .filter(|name| !name.trim().is_empty())
            .ok_or(GeocodeError::NoAddress)
    }
}

/// Ordered chain of reverse geocoders with a per-attempt timeout.
#[derive(Clone)]
pub struct ReverseGeocodeService {
    providers: Vec<Arc<dyn ReverseGeocoder>>,
    timeout: Duration,
}

impl ReverseGeocodeService {
    pub fn new(providers: Vec<Arc<dyn ReverseGeocoder>>, timeout: Duration) -> Self {
        Self { providers, timeout }
    }

    /// Best available name for the coordinate. Never fails.
    pub async fn display_name(&self, latitude: f64, longitude: f64) -> String {
        for provider in &self.providers {
            match tokio::time::timeout(self.timeout, provider.reverse(latitude, longitude)).await {
                Ok(Ok(name)) if !name.trim().is_empty() => {
                    debug!("{} resolved ({}, {}) to {}", provider.name(), latitude, longitude, name);
                    return name;
                }
                Ok(Ok(_)) => warn!("{} returned an empty address", provider.name()),
                Ok(Err(e)) => warn!("{} reverse geocode failed: {}", provider.name(), e),
                Err(_) => warn!(
                    "{} reverse geocode timed out after {:?}",
                    provider.name(),
                    self.timeout
                ),
            }
        }

        Location::fallback_name(latitude, longitude)
    }

    /// Reverse-geocodes a coordinate into a candidate [`Location`].
    pub async fn locate(&self, latitude: f64, longitude: f64) -> Location {
        let name = self.display_name(latitude, longitude).await;
        Location::new(name, latitude, longitude)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers every coordinate with the same name, after an optional delay.
    pub struct FixedGeocoder {
        pub answer: Result<String, ()>,
        pub delay: Duration,
        pub calls: AtomicUsize,
    }

    impl FixedGeocoder {
        pub fn answering(name: &str) -> Self {
            Self {
                answer: Ok(name.to_string()),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing() -> Self {
            Self {
                answer: Err(()),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn slow(name: &str, delay: Duration) -> Self {
            Self {
                delay,
                ..Self::answering(name)
            }
        }
    }

    #[async_trait]
    impl ReverseGeocoder for FixedGeocoder {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn reverse(&self, _latitude: f64, _longitude: f64) -> Result<String, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.answer.clone().map_err(|_| GeocodeError::NoAddress)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FixedGeocoder;
    use super::*;
    use std::sync::atomic::Ordering;

    fn service(providers: Vec<Arc<dyn ReverseGeocoder>>) -> ReverseGeocodeService {
        ReverseGeocodeService::new(providers, Duration::from_millis(50))
    }

    #[tokio::test]
    async fn first_answer_wins() {
        let primary = Arc::new(FixedGeocoder::answering("Quezon City, Metro Manila, Philippines"));
        let secondary = Arc::new(FixedGeocoder::answering("unused"));
        let svc = service(vec![primary.clone(), secondary.clone()]);

        let name = svc.display_name(14.676, 121.0437).await;

        assert_eq!(name, "Quezon City, Metro Manila, Philippines");
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failure_moves_on_to_next_provider() {
        let svc = service(vec![
            Arc::new(FixedGeocoder::failing()),
            Arc::new(FixedGeocoder::answering("Makati, Metro Manila, Philippines")),
        ]);

        assert_eq!(
            svc.display_name(14.5547, 121.0244).await,
            "Makati, Metro Manila, Philippines"
        );
    }

    #[tokio::test]
    async fn timeouts_fall_back_to_coordinates() {
        let svc = service(vec![Arc::new(FixedGeocoder::slow(
            "too late",
            Duration::from_secs(5),
        ))]);

        let location = svc.locate(14.5995, 120.9842).await;

        assert_eq!(location.display_name, "Lat: 14.599500, Lng: 120.984200");
        assert_eq!(location.latitude, 14.5995);
    }

    #[tokio::test]
    async fn no_providers_still_produces_a_name() {
        let svc = service(Vec::new());
        assert_eq!(
            svc.display_name(-1.5, 2.25).await,
            "Lat: -1.500000, Lng: 2.250000"
        );
    }
}
