use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::geo::Coordinate;

/// Used whenever the device position cannot be read.
pub const FALLBACK_POSITION: Coordinate = Coordinate {
    latitude: 47.3769,
    longitude: 8.5417,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Error)]
pub enum LocateError {
    #[error("permission denied")]
    Denied,
    #[error("position unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn current_position(&self) -> Result<Coordinate, LocateError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionOrigin {
    Device,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub coordinate: Coordinate,
    pub origin: PositionOrigin,
}

/// One best-effort position read. Denial, errors and timeouts all resolve to
/// [`FALLBACK_POSITION`]; this never fails.
pub async fn locate_or_fallback(source: &dyn PositionSource, limit: Duration) -> Position {
    match timeout(limit, source.current_position()).await {
        Ok(Ok(coordinate)) => {
            info!(
                lat = coordinate.latitude,
                lng = coordinate.longitude,
                "device position acquired"
            );
            Position {
                coordinate,
                origin: PositionOrigin::Device,
            }
        }
        Ok(Err(err)) => {
            warn!("geolocation failed, using fallback: {err}");
            fallback()
        }
        Err(_) => {
            warn!(timeout_ms = limit.as_millis() as u64, "geolocation timed out, using fallback");
            fallback()
        }
    }
}

fn fallback() -> Position {
    Position {
        coordinate: FALLBACK_POSITION,
        origin: PositionOrigin::Fallback,
    }
}
