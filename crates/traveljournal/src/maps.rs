//! Coordinates, navigation links, and route planning.
//!
//! Routes come from a [`RouteProvider`]. The HTTP implementation,
//! [`DirectionsClient`], speaks the Google Directions response format. When
//! no provider is configured, or the provider fails, [`plan_route`] falls
//! back to a straight line between the two points.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::MapsConfig;
use crate::error::{Error, Result};

/// A latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Degrees north.
    pub latitude: f64,
    /// Degrees east.
    pub longitude: f64,
}

impl Coordinates {
    /// Create a coordinate pair.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl FromStr for Coordinates {
    type Err = Error;

    /// Parse `"<lat>,<lng>"`. Whitespace around either number is allowed.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidCoordinates {
            value: s.to_string(),
        };

        let mut parts = s.split(',');
        let (Some(lat), Some(lng), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };

        let latitude: f64 = lat.trim().parse().map_err(|_| invalid())?;
        let longitude: f64 = lng.trim().parse().map_err(|_| invalid())?;
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(invalid());
        }

        Ok(Self::new(latitude, longitude))
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

/// External navigation link to `destination`.
#[must_use]
pub fn directions_url(host: &str, destination: &Coordinates) -> String {
    format!("https://{host}/maps/dir/?api=1&destination={destination}")
}

/// Decode an encoded polyline into points.
///
/// # Errors
///
/// Returns an error if the input ends in the middle of a value or the running
/// position leaves the `i64` range.
pub fn decode_polyline(encoded: &str) -> Result<Vec<Coordinates>> {
    let bytes = encoded.as_bytes();
    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;
    let mut points = Vec::new();
    let overflow = || Error::InvalidCoordinates {
        value: encoded.to_string(),
    };

    while index < bytes.len() {
        lat = lat
            .checked_add(next_delta(bytes, &mut index, encoded)?)
            .ok_or_else(overflow)?;
        lng = lng
            .checked_add(next_delta(bytes, &mut index, encoded)?)
            .ok_or_else(overflow)?;
        #[allow(clippy::cast_precision_loss)]
        points.push(Coordinates::new(lat as f64 / 1e5, lng as f64 / 1e5));
    }

    Ok(points)
}

fn next_delta(bytes: &[u8], index: &mut usize, encoded: &str) -> Result<i64> {
    let mut result: i64 = 0;
    let mut shift = 0;
    loop {
        let Some(&byte) = bytes.get(*index) else {
            return Err(Error::InvalidCoordinates {
                value: encoded.to_string(),
            });
        };
        *index += 1;

        let chunk = i64::from(byte) - 63;
        if !(0..64).contains(&chunk) || shift > 60 {
            return Err(Error::InvalidCoordinates {
                value: encoded.to_string(),
            });
        }
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk < 0x20 {
            break;
        }
    }

    Ok(if result & 1 == 1 {
        !(result >> 1)
    } else {
        result >> 1
    })
}

/// A route returned by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    /// Points along the route.
    pub path: Vec<Coordinates>,
    /// Human-readable distance.
    pub distance: Option<String>,
    /// Human-readable duration.
    pub duration: Option<String>,
}

/// Source of routes between two points.
#[async_trait]
pub trait RouteProvider: Send + Sync + fmt::Debug {
    /// Find a route. `Ok(None)` means the provider found no route.
    async fn route(&self, origin: Coordinates, destination: Coordinates) -> Result<Option<Route>>;
}

/// The route to display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutePlan {
    /// Points to draw.
    pub path: Vec<Coordinates>,
    /// Human-readable distance, when known.
    pub distance: Option<String>,
    /// Human-readable duration, when known.
    pub duration: Option<String>,
    /// Whether this is the two-point fallback.
    pub straight_line: bool,
}

impl RoutePlan {
    /// The fallback line from `origin` to `destination`.
    #[must_use]
    pub fn straight(origin: Coordinates, destination: Coordinates) -> Self {
        Self {
            path: vec![origin, destination],
            distance: None,
            duration: None,
            straight_line: true,
        }
    }
}

/// Plan a route, falling back to a straight line when the provider is
/// missing, fails, or returns nothing usable.
pub async fn plan_route(
    provider: Option<&dyn RouteProvider>,
    origin: Coordinates,
    destination: Coordinates,
) -> RoutePlan {
    let Some(provider) = provider else {
        debug!("No route provider configured, using straight line");
        return RoutePlan::straight(origin, destination);
    };

    match provider.route(origin, destination).await {
        Ok(Some(route)) if !route.path.is_empty() => RoutePlan {
            path: route.path,
            distance: route.distance,
            duration: route.duration,
            straight_line: false,
        },
        Ok(_) => {
            debug!(%origin, %destination, "No route found, using straight line");
            RoutePlan::straight(origin, destination)
        }
        Err(e) => {
            warn!(%origin, %destination, error = %e, "Route request failed, using straight line");
            RoutePlan::straight(origin, destination)
        }
    }
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    routes: Vec<DirectionsRoute>,
}

#[derive(Debug, Deserialize)]
struct DirectionsRoute {
    overview_polyline: Polyline,
    #[serde(default)]
    legs: Vec<Leg>,
}

#[derive(Debug, Deserialize)]
struct Polyline {
    points: String,
}

#[derive(Debug, Deserialize)]
struct Leg {
    distance: Option<TextValue>,
    duration: Option<TextValue>,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    text: String,
}

/// Interpret a directions response body.
///
/// # Errors
///
/// Returns an error for malformed JSON, a failing status, or a bad polyline.
pub fn parse_directions(body: &str) -> Result<Option<Route>> {
    let response: DirectionsResponse = serde_json::from_str(body)?;
    match response.status.as_str() {
        "OK" => {}
        "ZERO_RESULTS" => return Ok(None),
        _ => {
            return Err(Error::Directions {
                status: response.status,
            })
        }
    }

    let Some(route) = response.routes.into_iter().next() else {
        return Ok(None);
    };
    let path = decode_polyline(&route.overview_polyline.points)?;
    let leg = route.legs.into_iter().next();

    Ok(Some(Route {
        path,
        distance: leg
            .as_ref()
            .and_then(|l| l.distance.as_ref())
            .map(|d| d.text.clone()),
        duration: leg.and_then(|l| l.duration).map(|d| d.text),
    }))
}

/// HTTP directions provider.
#[derive(Debug, Clone)]
pub struct DirectionsClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    mode: String,
}

impl DirectionsClient {
    /// Build a client from configuration. Returns `None` without an API key.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &MapsConfig, timeout: Duration) -> Result<Option<Self>> {
        let Some(api_key) = config.api_key.as_deref().filter(|k| !k.trim().is_empty()) else {
            return Ok(None);
        };

        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Some(Self {
            http,
            endpoint: config.directions_endpoint.clone(),
            api_key: api_key.to_string(),
            mode: config.travel_mode.clone(),
        }))
    }
}

#[async_trait]
impl RouteProvider for DirectionsClient {
    async fn route(&self, origin: Coordinates, destination: Coordinates) -> Result<Option<Route>> {
        debug!(%origin, %destination, mode = %self.mode, "Requesting directions");
        let body = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("origin", origin.to_string()),
                ("destination", destination.to_string()),
                ("key", self.api_key.clone()),
                ("mode", self.mode.clone()),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_directions(&body)
    }
}
