//! User location resolution for Ulat PH.
//!
//! A location starts as a raw coordinate (IP geolocation, a configured manual
//! point, a moved map pin, or a place search) and becomes authoritative only
//! once [`LocationResolver::validate_and_commit`] has checked it against the
//! [`ServiceArea`]. Only committed locations reach the [`LocationStore`].

use crate::geocoding::ReverseGeocodeService;
use crate::models::{Coordinates, Location};
use async_trait::async_trait;
use ipgeolocate::{Locator, Service};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeolocationError {
    /// Detection is switched off and no manual coordinate is configured.
    #[error("Location access is disabled")]
    Denied,

    #[error("Location unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Cached location is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Device position source.
#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn locate(&self) -> Result<Coordinates, GeolocationError>;
}

/// Persistence for the single "last known location" value.
pub trait LocationStore: Send {
    fn load(&self) -> Result<Option<Location>, StoreError>;
    fn save(&self, location: &Location) -> Result<(), StoreError>;
}

/// Resolves the user's approximate location via IP geolocation.
///
/// Uses the [IpApi](https://ip-api.com/) service. An empty `ip` asks the
/// service about the address the request comes from.
pub struct IpGeolocator {
    ip: String,
}

impl IpGeolocator {
    pub fn new(ip: impl Into<String>) -> Self {
        Self { ip: ip.into() }
    }
}

#[async_trait]
impl Geolocator for IpGeolocator {
    async fn locate(&self) -> Result<Coordinates, GeolocationError> {
        let loc = Locator::get(&self.ip, Service::IpApi).await.map_err(|e| {
            error!("Error using geolocation service: {}", e);
            GeolocationError::Unavailable(e.to_string())
        })?;

        let lat = loc.latitude.parse::<f64>();
        let lon = loc.longitude.parse::<f64>();
        match (lat, lon) {
            (Ok(lat), Ok(lon)) => {
                let coords = Coordinates::new(lat, lon);
                if !coords.is_valid() {
                    return Err(GeolocationError::Unavailable(format!(
                        "service returned out-of-range coordinates ({}, {})",
                        lat, lon
                    )));
                }
                info!("Geolocation successful - ({}, {})", lat, lon);
                Ok(coords)
            }
            _ => Err(GeolocationError::Unavailable(format!(
                "unparsable coordinates ({}, {})",
                loc.latitude, loc.longitude
            ))),
        }
    }
}

/// A fixed, user-configured coordinate.
pub struct ManualGeolocator {
    coords: Coordinates,
}

impl ManualGeolocator {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            coords: Coordinates::new(latitude, longitude),
        }
    }
}

#[async_trait]
impl Geolocator for ManualGeolocator {
    async fn locate(&self) -> Result<Coordinates, GeolocationError> {
        if self.coords.is_valid() {
            Ok(self.coords)
        } else {
            Err(GeolocationError::Unavailable(
                "configured manual coordinate is out of range".to_string(),
            ))
        }
    }
}

/// Stand-in when the user has turned detection off.
pub struct DeniedGeolocator;

#[async_trait]
impl Geolocator for DeniedGeolocator {
    async fn locate(&self) -> Result<Coordinates, GeolocationError> {
        Err(GeolocationError::Denied)
    }
}

/// Where the app accepts locations. A name is inside the area when it
/// contains any keyword, ignoring case. An empty keyword list accepts
/// everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceArea {
    keywords: Vec<String>,
}

impl ServiceArea {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn contains(&self, display_name: &str) -> bool {
        if self.keywords.is_empty() {
            return true;
        }
        let name = display_name.to_lowercase();
        self.keywords.iter().any(|k| name.contains(k.as_str()))
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

/// How the session's starting location was obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum InitialLocation {
    /// Restored from the cache; trusted as-is.
    Cached(Location),
    /// Freshly geolocated and named; still needs validation.
    Located(Location),
    /// Geolocation failed or was refused. Terminal for this session.
    Unavailable(GeolocationError),
}

/// Picks the starting location: the cached value if there is one, otherwise
/// a geolocated and reverse-geocoded candidate. Never fails.
pub async fn resolve_initial_location(
    cached: Option<Location>,
    geolocator: &dyn Geolocator,
    geocoding: &ReverseGeocodeService,
) -> InitialLocation {
    if let Some(location) = cached {
        debug!("Using cached location {}", location.display_name);
        return InitialLocation::Cached(location);
    }

    match geolocator.locate().await {
        Ok(coords) => {
            let candidate = geocoding.locate(coords.latitude, coords.longitude).await;
            InitialLocation::Located(candidate)
        }
        Err(e) => {
            warn!("Initial location unavailable: {}", e);
            InitialLocation::Unavailable(e)
        }
    }
}

/// Sequence number handed out when a pin move or place search starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PinTicket(u64);

/// Result of offering a candidate location to the resolver.
#[derive(Debug, Clone, PartialEq)]
pub enum Commit {
    /// Inside the service area; now current and cached.
    Accepted(Location),
    /// Outside the service area; the previous location stays.
    Reverted { kept: Location, rejected: Location },
    /// Outside the service area and there was nothing to fall back to.
    NoLocation { rejected: Location },
    /// A newer request already committed; this answer was ignored.
    Stale,
}

impl Commit {
    /// The location in force after this commit, if any.
    pub fn current(&self) -> Option<&Location> {
        match self {
            Commit::Accepted(loc) => Some(loc),
            Commit::Reverted { kept, .. } => Some(kept),
            Commit::NoLocation { .. } | Commit::Stale => None,
        }
    }
}

/// Owns the session's authoritative [`Location`] and its cache.
pub struct LocationResolver {
    store: Box<dyn LocationStore>,
    area: ServiceArea,
    current: Option<Location>,
    issued: u64,
    committed: u64,
}

impl LocationResolver {
    pub fn new(store: Box<dyn LocationStore>, area: ServiceArea) -> Self {
        Self {
            store,
            area,
            current: None,
            issued: 0,
            committed: 0,
        }
    }

    /// Reads the cached location once. A broken cache counts as empty.
    pub fn load_cached(&self) -> Option<Location> {
        match self.store.load() {
            Ok(cached) => cached,
            Err(e) => {
                warn!("Ignoring unreadable location cache: {}", e);
                None
            }
        }
    }

    pub fn current(&self) -> Option<&Location> {
        self.current.as_ref()
    }

    pub fn service_area(&self) -> &ServiceArea {
        &self.area
    }

    /// Adopts a cached location without re-validating or re-saving it.
    pub fn restore(&mut self, location: Location) {
        info!("Restored cached location {}", location.display_name);
        self.current = Some(location);
    }

    /// Starts a pin move or place search. Answers are committed through
    /// [`commit_pin`](Self::commit_pin) with the returned ticket.
    pub fn issue_ticket(&mut self) -> PinTicket {
        self.issued += 1;
        PinTicket(self.issued)
    }

    /// Applies the service-area check to `candidate`.
    ///
    /// Accepted candidates are written to the store first and become current
    /// only if that write succeeds. Rejected candidates touch nothing.
    pub fn validate_and_commit(
        &mut self,
        candidate: Location,
        previous: Option<Location>,
    ) -> Result<Commit, StoreError> {
        if !candidate.coordinates().is_valid() || !self.area.contains(&candidate.display_name) {
            info!(
                "Rejected location outside service area: {}",
                candidate.display_name
            );
            return Ok(match previous {
                Some(kept) => Commit::Reverted {
                    kept,
                    rejected: candidate,
                },
                None => Commit::NoLocation {
                    rejected: candidate,
                },
            });
        }

        self.store.save(&candidate)?;
        info!(
            "Committed location {} ({}, {})",
            candidate.display_name, candidate.latitude, candidate.longitude
        );
        self.current = Some(candidate.clone());
        Ok(Commit::Accepted(candidate))
    }

    /// Commits the answer to a pin move unless a newer move already committed.
    pub fn commit_pin(
        &mut self,
        ticket: PinTicket,
        candidate: Location,
    ) -> Result<Commit, StoreError> {
        if ticket.0 < self.committed {
            debug!(
                "Dropping stale geocode answer #{} (latest committed #{})",
                ticket.0, self.committed
            );
            return Ok(Commit::Stale);
        }

        let previous = self.current.clone();
        let commit = self.validate_and_commit(candidate, previous)?;
        if matches!(commit, Commit::Accepted(_)) {
            self.committed = ticket.0;
        }
        Ok(commit)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// In-memory store whose contents stay observable after it is boxed.
    #[derive(Clone, Default)]
    pub struct MemoryStore {
        pub saved: Arc<Mutex<Option<Location>>>,
        pub writes: Arc<Mutex<usize>>,
    }

    impl MemoryStore {
        pub fn with(location: Location) -> Self {
            let store = Self::default();
            *store.saved.lock().unwrap() = Some(location);
            store
        }

        pub fn snapshot(&self) -> Option<Location> {
            self.saved.lock().unwrap().clone()
        }

        pub fn write_count(&self) -> usize {
            *self.writes.lock().unwrap()
        }
    }

    impl LocationStore for MemoryStore {
        fn load(&self) -> Result<Option<Location>, StoreError> {
            Ok(self.snapshot())
        }

        fn save(&self, location: &Location) -> Result<(), StoreError> {
            *self.saved.lock().unwrap() = Some(location.clone());
            *self.writes.lock().unwrap() += 1;
            Ok(())
        }
    }

    pub fn metro_manila() -> ServiceArea {
        ServiceArea::new(["metro manila"])
    }
}
