// src/geolocation.rs
//
// Turns device coordinates into a display label through a layered fallback
// chain: primary geocoder (paid, circuit-broken on auth/billing denial) ->
// secondary reverse lookup (unauthenticated) -> raw coordinates flagged for
// manual entry. A check action must always end with a usable label, so every
// stage degrades instead of failing the caller.

use async_trait::async_trait;
use reqwest::header::ACCEPT_LANGUAGE;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::model::Coordinates;

// Constants
pub const NOMINATIM_REVERSE_URL: &str = "https://nominatim.openstreetmap.org/reverse";
pub const GOOGLE_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";
pub const DEFAULT_GPS_TIMEOUT_SECS: u64 = 10;
pub const MANUAL_ENTRY_LABEL: &str = "Manual entry required";

/// Fallback position when device access is denied; the label is forced to
/// manual entry so the coordinates are never presented as a real fix.
pub const DEFAULT_FALLBACK_COORDS: Coordinates = Coordinates {
    latitude: 13.7563,
    longitude: 100.5018,
};

// --- Error Type ---

#[derive(Error, Debug)]
pub enum GeoError {
    #[error("Device position access denied or timed out")]
    GpsDenied,

    #[error("Geocoding provider rejected credentials or billing state")]
    ProviderAuthDenied,

    #[error("Geocoding provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("No resolution found for the given coordinates")]
    NoResolutionFound,

    #[error("HTTP request failed")]
    Request(#[from] reqwest::Error),

    #[error("URL parsing error")]
    UrlParse(#[from] url::ParseError),
}

// --- Provider Seams ---

#[derive(Debug, Clone, Copy)]
pub struct PositionOptions {
    pub timeout: Duration,
    pub high_accuracy: bool,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_GPS_TIMEOUT_SECS),
            high_accuracy: true,
        }
    }
}

/// One-shot device position acquisition. Implementations must respect the
/// timeout in `opts`; the resolver additionally bounds the wait so a
/// misbehaving source can never hang a check action.
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn current_position(&self, opts: &PositionOptions) -> Result<Coordinates, GeoError>;
}

/// Reverse geocoding: coordinates to a display label.
/// `Ok(None)` means the provider answered with zero results, which is not an
/// error. `Err(ProviderAuthDenied)` trips the session breaker.
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    async fn reverse(&self, coords: Coordinates) -> Result<Option<String>, GeoError>;
}

// --- Resolver Session (breaker + staleness) ---

/// Per-working-period mutable resolver state. Injected, never global, so
/// concurrent sessions cannot cross-contaminate each other's breaker.
///
/// The breaker has no automatic reset: once the primary provider reports an
/// auth/billing denial, every later resolution in this session skips it.
/// The generation counter implements last-committed-wins for superseded
/// resolutions (e.g. a correction pin dragged while a lookup is in flight).
#[derive(Debug, Default)]
pub struct ResolverSession {
    primary_broken: AtomicBool,
    issued: AtomicU64,
    committed: AtomicU64,
}

impl ResolverSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn primary_broken(&self) -> bool {
        self.primary_broken.load(Ordering::Acquire)
    }

    pub fn mark_primary_broken(&self) {
        if !self.primary_broken.swap(true, Ordering::AcqRel) {
            warn!("Primary geocoder marked broken for the remainder of this session");
        }
    }

    /// Starts a resolution attempt; the returned generation must be committed
    /// for the result to count.
    pub fn begin(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Returns false when a newer resolution already committed, in which case
    /// the caller must discard its result.
    pub fn try_commit(&self, generation: u64) -> bool {
        let prev = self.committed.fetch_max(generation, Ordering::AcqRel);
        prev < generation
    }
}

// --- Resolution Result ---

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLocation {
    pub label: String,
    pub coords: Coordinates,
    /// Set when no provider produced a name and the label is only a stand-in
    /// (raw coordinates or the manual-entry marker).
    pub manual_entry_required: bool,
}

impl ResolvedLocation {
    pub fn coordinates_fallback(coords: Coordinates) -> Self {
        Self {
            label: format!("{:.6}, {:.6}", coords.latitude, coords.longitude),
            coords,
            manual_entry_required: true,
        }
    }

    pub fn manual_entry() -> Self {
        Self {
            label: MANUAL_ENTRY_LABEL.to_string(),
            coords: DEFAULT_FALLBACK_COORDS,
            manual_entry_required: true,
        }
    }
}

// --- Secondary Provider: Nominatim Reverse Lookup ---

#[derive(Debug, Clone, Deserialize)]
pub struct NominatimAddress {
    pub road: Option<String>,
    pub suburb: Option<String>,
    pub neighbourhood: Option<String>,
    pub city: Option<String>,
    pub town: Option<String>,
    pub province: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NominatimResponse {
    pub display_name: Option<String>,
    pub address: Option<NominatimAddress>,
}

/// Unauthenticated reverse geocoder used when the primary is skipped, broken
/// or empty-handed. Builds a short label preferring road, then district,
/// then city components, falling back to the full display name.
#[derive(Clone)]
pub struct NominatimClient {
    http_client: Client,
    base_url: String,
    language: String,
}

impl NominatimClient {
    pub fn new(language: &str) -> Result<Self, GeoError> {
        Self::with_base_url(NOMINATIM_REVERSE_URL, language)
    }

    pub fn with_base_url(base_url: &str, language: &str) -> Result<Self, GeoError> {
        let http_client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.to_string(),
            language: language.to_string(),
        })
    }

    fn short_label(response: &NominatimResponse) -> Option<String> {
        let addr = response.address.as_ref()?;
        let mut parts: Vec<String> = Vec::new();
        if let Some(road) = &addr.road {
            parts.push(road.clone());
        }
        if let Some(district) = addr.suburb.as_ref().or(addr.neighbourhood.as_ref()) {
            parts.push(district.clone());
        }
        if let Some(city) = addr
            .city
            .as_ref()
            .or(addr.town.as_ref())
            .or(addr.province.as_ref())
        {
            parts.push(city.clone());
        }
        if parts.is_empty() {
            response.display_name.clone()
        } else {
            Some(parts.join(", "))
        }
    }
}

#[async_trait]
impl GeocodeProvider for NominatimClient {
    async fn reverse(&self, coords: Coordinates) -> Result<Option<String>, GeoError> {
        let mut url = Url::parse(&self.base_url)?;
        url.query_pairs_mut()
            .append_pair("format", "jsonv2")
            .append_pair("lat", &coords.latitude.to_string())
            .append_pair("lon", &coords.longitude.to_string());

        debug!("Nominatim reverse lookup: {}", url);
        let response = self
            .http_client
            .get(url)
            .header(ACCEPT_LANGUAGE, &self.language)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            warn!("Nominatim returned {}: {}", status, body);
            return Err(GeoError::ProviderUnavailable(format!(
                "status {}: {}",
                status, body
            )));
        }

        let parsed = response.json::<NominatimResponse>().await?;
        Ok(Self::short_label(&parsed))
    }
}

// --- Primary Provider: Authenticated Geocoder ---

#[derive(Debug, Clone, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    error_message: Option<String>,
}

/// Keyed geocoding API client. An auth/billing denial is surfaced as
/// `ProviderAuthDenied` so the caller can stop spending calls on it.
#[derive(Clone)]
pub struct GoogleGeocoder {
    http_client: Client,
    base_url: String,
    api_key: String,
}

impl GoogleGeocoder {
    pub fn new(api_key: &str) -> Result<Self, GeoError> {
        Self::with_base_url(GOOGLE_GEOCODE_URL, api_key)
    }

    pub fn with_base_url(base_url: &str, api_key: &str) -> Result<Self, GeoError> {
        let http_client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl GeocodeProvider for GoogleGeocoder {
    async fn reverse(&self, coords: Coordinates) -> Result<Option<String>, GeoError> {
        let mut url = Url::parse(&self.base_url)?;
        url.query_pairs_mut()
            .append_pair(
                "latlng",
                &format!("{},{}", coords.latitude, coords.longitude),
            )
            .append_pair("key", &self.api_key);

        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        if status == StatusCode::FORBIDDEN || status == StatusCode::UNAUTHORIZED {
            return Err(GeoError::ProviderAuthDenied);
        }
        if !status.is_success() {
            return Err(GeoError::ProviderUnavailable(format!("status {}", status)));
        }

        let parsed = response.json::<GeocodeResponse>().await?;
        match parsed.status.as_str() {
            "OK" => Ok(parsed.results.first().map(|r| r.formatted_address.clone())),
            "ZERO_RESULTS" => Ok(None),
            "REQUEST_DENIED" | "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" => {
                warn!(
                    "Primary geocoder denied request: {}",
                    parsed.error_message.unwrap_or_default()
                );
                Err(GeoError::ProviderAuthDenied)
            }
            other => Err(GeoError::ProviderUnavailable(format!(
                "provider status {}",
                other
            ))),
        }
    }
}

// --- Resolver Pipeline ---

pub struct GeoResolver {
    position_source: Option<Arc<dyn PositionSource>>,
    primary: Option<Arc<dyn GeocodeProvider>>,
    secondary: Arc<dyn GeocodeProvider>,
    position_options: PositionOptions,
}

impl GeoResolver {
    pub fn new(
        position_source: Option<Arc<dyn PositionSource>>,
        primary: Option<Arc<dyn GeocodeProvider>>,
        secondary: Arc<dyn GeocodeProvider>,
    ) -> Self {
        Self {
            position_source,
            primary,
            secondary,
            position_options: PositionOptions::default(),
        }
    }

    pub fn with_position_options(mut self, options: PositionOptions) -> Self {
        self.position_options = options;
        self
    }

    /// Acquires device coordinates then resolves them. GPS denial or timeout
    /// falls back to the default coordinate pair with manual entry forced;
    /// the check action itself is never blocked.
    pub async fn acquire_and_resolve(&self, session: &ResolverSession) -> ResolvedLocation {
        let coords = match &self.position_source {
            Some(source) => {
                let wait = tokio::time::timeout(
                    self.position_options.timeout,
                    source.current_position(&self.position_options),
                )
                .await;
                match wait {
                    Ok(Ok(coords)) => coords,
                    Ok(Err(e)) => {
                        warn!("GPS access denied: {}", e);
                        return ResolvedLocation::manual_entry();
                    }
                    Err(_) => {
                        warn!(
                            "GPS acquisition timed out after {:?}",
                            self.position_options.timeout
                        );
                        return ResolvedLocation::manual_entry();
                    }
                }
            }
            None => {
                warn!("No position source configured; forcing manual entry");
                return ResolvedLocation::manual_entry();
            }
        };

        self.resolve(session, coords)
            .await
            .unwrap_or_else(|| ResolvedLocation::coordinates_fallback(coords))
    }

    /// Resolves given coordinates through the provider chain. Returns `None`
    /// when a newer resolution committed first (last-committed-wins); the
    /// stale result must be discarded by the caller.
    pub async fn resolve(
        &self,
        session: &ResolverSession,
        coords: Coordinates,
    ) -> Option<ResolvedLocation> {
        let generation = session.begin();
        let resolved = self.resolve_label(session, coords).await;

        if session.try_commit(generation) {
            Some(resolved)
        } else {
            info!(
                "Discarding stale resolution (generation {}) superseded by a newer commit",
                generation
            );
            None
        }
    }

    async fn resolve_label(
        &self,
        session: &ResolverSession,
        coords: Coordinates,
    ) -> ResolvedLocation {
        // Primary geocoder, unless configured out or circuit-broken.
        if let Some(primary) = &self.primary {
            if session.primary_broken() {
                debug!("Skipping primary geocoder: breaker open");
            } else {
                match primary.reverse(coords).await {
                    Ok(Some(label)) => {
                        return ResolvedLocation {
                            label,
                            coords,
                            manual_entry_required: false,
                        };
                    }
                    Ok(None) => {
                        debug!("Primary geocoder returned zero results");
                    }
                    Err(GeoError::ProviderAuthDenied) => {
                        session.mark_primary_broken();
                    }
                    Err(e) => {
                        warn!("Primary geocoder failed: {}", e);
                    }
                }
            }
        }

        // Secondary, unauthenticated reverse lookup.
        match self.secondary.reverse(coords).await {
            Ok(Some(label)) => {
                return ResolvedLocation {
                    label,
                    coords,
                    manual_entry_required: false,
                };
            }
            Ok(None) => {
                debug!("Secondary geocoder returned zero results");
            }
            Err(e) => {
                warn!("Secondary geocoder failed: {}", e);
            }
        }

        // No provider produced a name; present raw coordinates and flag the
        // result for manual editing.
        ResolvedLocation::coordinates_fallback(coords)
    }
}
