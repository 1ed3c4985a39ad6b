//! Geocoding, elevation lookup, and the fly-to camera animation.
//!
//! Location search uses OpenStreetMap Nominatim; elevation comes from the
//! Open Elevation API. A fly-to first fetches the destination elevation, then
//! cruises the camera along the great circle with eased altitude, suspending
//! the navigation systems until it lands.

use bevy::prelude::*;
use glam::{DVec3, Quat};
use serde::Deserialize;

use crate::async_runtime::TaskSpawner;
use crate::coords::{EARTH_RADIUS, geodetic_to_ecef, slerp_dvec3, smootherstep, surface_distance};
use crate::floating_origin::FloatingOriginCamera;
use crate::sim::NavCamera;

/// User agent for API requests.
const USER_AGENT: &str = "geowalk/0.1 (https://github.com/envisio/geowalk)";

/// Throttle duration between geocoding requests (per Nominatim usage policy).
pub const GEOCODING_THROTTLE_SECS: f64 = 5.0;

/// Height above the destination ground at which a fly-to lands, in meters.
const ARRIVAL_HEIGHT: f64 = 50.0;

/// Shortest and longest fly-to durations in seconds.
const MIN_FLIGHT_SECS: f32 = 2.0;
const MAX_FLIGHT_SECS: f32 = 8.0;

/// Shared HTTP client for the geo services.
#[derive(Resource)]
pub struct HttpClient(pub reqwest::Client);

/// Plugin for geocoding, elevation, and fly-to.
pub struct GeoPlugin;

impl Plugin for GeoPlugin {
    fn build(&self, app: &mut App) {
        let client = HttpClient(
            reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .build()
                .expect("failed to create HTTP client"),
        );

        app.insert_resource(client)
            .init_resource::<GeocodingState>()
            .init_resource::<FlyToState>()
            .init_resource::<FlyToAnimation>()
            .add_systems(
                Update,
                (poll_geocoding_results, poll_fly_to, update_fly_to_animation),
            );
    }
}

/// Run condition: no fly-to animation is in progress.
///
/// The simulation tick and the screen-space controller are both suspended
/// while the camera is being flown.
pub fn fly_to_not_active(anim: Res<FlyToAnimation>) -> bool {
    !anim.is_active()
}

// ============================================================================
// Geocoding
// ============================================================================

/// A geocoding search result.
#[derive(Debug, Clone)]
pub struct GeocodingResult {
    pub display_name: String,
    pub lat: f64,
    pub lon: f64,
}

/// State for the location search.
#[derive(Resource)]
pub struct GeocodingState {
    pub search_text: String,
    pub results: Vec<GeocodingResult>,
    pub is_loading: bool,
    /// Elapsed time (in seconds) since start when the last request was made.
    pub last_request_time: Option<f64>,
    pub error: Option<String>,
    result_rx: async_channel::Receiver<Result<Vec<GeocodingResult>, String>>,
    result_tx: async_channel::Sender<Result<Vec<GeocodingResult>, String>>,
}

impl Default for GeocodingState {
    fn default() -> Self {
        let (result_tx, result_rx) = async_channel::bounded(1);
        Self {
            search_text: String::new(),
            results: Vec::new(),
            is_loading: false,
            last_request_time: None,
            error: None,
            result_rx,
            result_tx,
        }
    }
}

impl GeocodingState {
    /// Start an async geocoding request, honoring the request throttle.
    pub fn start_request(
        &mut self,
        current_time: f64,
        client: &HttpClient,
        spawner: &TaskSpawner<'_, '_>,
    ) {
        let can_request = self
            .last_request_time
            .is_none_or(|t| current_time - t >= GEOCODING_THROTTLE_SECS);

        if !can_request || self.is_loading || self.search_text.trim().is_empty() {
            return;
        }

        self.is_loading = true;
        self.error = None;
        self.last_request_time = Some(current_time);

        let query = self.search_text.clone();
        let tx = self.result_tx.clone();
        let client = client.0.clone();

        spawner.spawn(async move {
            let result = fetch_geocoding_results(&client, &query).await;
            let _ = tx.send(result).await;
        });
    }
}

/// Poll for geocoding results from the background task.
#[allow(clippy::needless_pass_by_value)]
fn poll_geocoding_results(mut geocoding_state: ResMut<GeocodingState>) {
    while let Ok(result) = geocoding_state.result_rx.try_recv() {
        geocoding_state.is_loading = false;
        match result {
            Ok(results) => {
                geocoding_state.results = results;
                geocoding_state.error = None;
            }
            Err(e) => {
                geocoding_state.results.clear();
                geocoding_state.error = Some(e);
            }
        }
    }
}

// ============================================================================
// Fly-to
// ============================================================================

/// State for pending fly-to requests.
///
/// A fly-to first fetches the destination elevation; the animation starts
/// once the result arrives.
#[derive(Resource)]
pub struct FlyToState {
    pending: Option<PendingFlyTo>,
    /// Error from the last elevation fetch, if any.
    pub error: Option<String>,
    elevation_rx: async_channel::Receiver<Result<f64, String>>,
    elevation_tx: async_channel::Sender<Result<f64, String>>,
}

struct PendingFlyTo {
    lat: f64,
    lon: f64,
}

impl Default for FlyToState {
    fn default() -> Self {
        let (elevation_tx, elevation_rx) = async_channel::bounded(1);
        Self {
            pending: None,
            error: None,
            elevation_rx,
            elevation_tx,
        }
    }
}

impl FlyToState {
    /// Returns true if a fly-to is waiting for elevation data.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Request a fly-to; replaces any pending request.
    pub fn request(
        &mut self,
        lat: f64,
        lon: f64,
        client: &HttpClient,
        spawner: &TaskSpawner<'_, '_>,
    ) {
        self.pending = Some(PendingFlyTo { lat, lon });
        self.error = None;

        let tx = self.elevation_tx.clone();
        let client = client.0.clone();

        spawner.spawn(async move {
            let result = fetch_elevation(&client, lat, lon).await;
            let _ = tx.send(result).await;
        });
    }
}

/// An in-flight fly-to animation.
struct FlyToPhase {
    /// Departure position (ECEF).
    from: DVec3,
    /// Arrival position (ECEF).
    to: DVec3,
    /// Peak altitude added mid-cruise, in meters.
    cruise_boost: f64,
    duration: f32,
    elapsed: f32,
}

/// The fly-to animation, if one is active.
#[derive(Resource, Default)]
pub struct FlyToAnimation {
    phase: Option<FlyToPhase>,
}

impl FlyToAnimation {
    pub fn is_active(&self) -> bool {
        self.phase.is_some()
    }

    /// Animation progress in 0..=1, or `None` when idle.
    pub fn progress(&self) -> Option<f32> {
        self.phase
            .as_ref()
            .map(|p| (p.elapsed / p.duration).clamp(0.0, 1.0))
    }

    /// Begin an animation from the current camera position.
    fn begin(&mut self, from: DVec3, to: DVec3) {
        let distance = surface_distance(from, to);
        // Longer hops climb higher and take longer.
        let cruise_boost = (distance * 0.2).clamp(0.0, 2_000_000.0);
        let duration = (distance / 1_500_000.0) as f32;
        let duration = duration.clamp(MIN_FLIGHT_SECS, MAX_FLIGHT_SECS);
        self.phase = Some(FlyToPhase {
            from,
            to,
            cruise_boost,
            duration,
            elapsed: 0.0,
        });
    }
}

/// Poll for elevation results and start the pending fly-to.
#[allow(clippy::needless_pass_by_value)]
fn poll_fly_to(
    mut fly_to_state: ResMut<FlyToState>,
    mut animation: ResMut<FlyToAnimation>,
    camera_query: Query<&FloatingOriginCamera>,
) {
    while let Ok(result) = fly_to_state.elevation_rx.try_recv() {
        let Some(pending) = fly_to_state.pending.take() else {
            continue;
        };

        match result {
            Ok(elevation) => {
                fly_to_state.error = None;
                let Ok(camera) = camera_query.single() else {
                    tracing::debug!("Dropping fly-to: no camera available");
                    continue;
                };
                let destination = geodetic_to_ecef(
                    pending.lat,
                    pending.lon,
                    elevation + ARRIVAL_HEIGHT,
                );
                animation.begin(camera.position, destination);
            }
            Err(e) => {
                tracing::warn!("Fly-to elevation lookup failed: {e}");
                fly_to_state.error = Some(e);
            }
        }
    }
}

/// Advance the fly-to animation and move the camera along the arc.
#[allow(clippy::needless_pass_by_value)]
fn update_fly_to_animation(
    time: Res<Time>,
    mut animation: ResMut<FlyToAnimation>,
    mut query: Query<(&mut FloatingOriginCamera, &mut Transform, &mut NavCamera)>,
) {
    let Some(phase) = animation.phase.as_mut() else {
        return;
    };
    let Ok((mut camera, mut transform, mut nav)) = query.single_mut() else {
        return;
    };

    phase.elapsed += time.delta_secs();
    let t = smootherstep(f64::from((phase.elapsed / phase.duration).clamp(0.0, 1.0)));

    // Great-circle track with radius interpolation plus a mid-cruise climb.
    let track = slerp_dvec3(phase.from.normalize(), phase.to.normalize(), t);
    let from_radius = phase.from.length();
    let to_radius = phase.to.length();
    let climb = phase.cruise_boost * (t * std::f64::consts::PI).sin();
    let radius = from_radius + (to_radius - from_radius) * t + climb;
    let radius = radius.max(EARTH_RADIUS + 1.0);

    let old_up = camera.position.normalize_or_zero().as_vec3();
    camera.position = track * radius;

    // Carry the facing with the change in local up so the view stays level.
    let new_up = camera.position.normalize_or_zero().as_vec3();
    let rotation = Quat::from_rotation_arc(old_up, new_up);
    nav.direction = (rotation * nav.direction).normalize();
    transform.look_to(nav.direction, new_up);

    if phase.elapsed >= phase.duration {
        animation.phase = None;
        tracing::info!("Fly-to complete");
    }
}

// ============================================================================
// HTTP requests
// ============================================================================

/// Fetch geocoding results from the Nominatim API.
async fn fetch_geocoding_results(
    client: &reqwest::Client,
    query: &str,
) -> Result<Vec<GeocodingResult>, String> {
    #[derive(Debug, Deserialize)]
    struct NominatimPlace {
        display_name: String,
        lat: String,
        lon: String,
    }

    let url = format!(
        "https://nominatim.openstreetmap.org/search?q={}&format=json&limit=5",
        urlencoding::encode(query)
    );

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| format!("Request failed: {e}"))?;

    if !response.status().is_success() {
        return Err(format!("HTTP {}", response.status()));
    }

    let places: Vec<NominatimPlace> = response
        .json()
        .await
        .map_err(|e| format!("Failed to parse response: {e}"))?;

    let results = places
        .into_iter()
        .filter_map(|place| {
            Some(GeocodingResult {
                display_name: place.display_name,
                lat: place.lat.parse().ok()?,
                lon: place.lon.parse().ok()?,
            })
        })
        .collect();

    Ok(results)
}

/// Fetch elevation from the Open Elevation API.
async fn fetch_elevation(client: &reqwest::Client, lat: f64, lon: f64) -> Result<f64, String> {
    #[derive(Debug, Deserialize)]
    struct Response {
        results: Vec<Entry>,
    }

    #[derive(Debug, Deserialize)]
    struct Entry {
        elevation: f64,
    }

    let url = format!("https://api.open-elevation.com/api/v1/lookup?locations={lat},{lon}");

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| format!("Elevation request failed: {e}"))?;

    if !response.status().is_success() {
        return Err(format!("Elevation HTTP {}", response.status()));
    }

    let data: Response = response
        .json()
        .await
        .map_err(|e| format!("Failed to parse elevation response: {e}"))?;

    data.results
        .first()
        .map(|r| r.elevation)
        .ok_or_else(|| "No elevation data returned".to_string())
}
