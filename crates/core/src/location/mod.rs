//! Contract with the device's position source.

use std::time::Duration;

use geo::Point;
use tokio::sync::mpsc;

/// One sample from the position provider.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocationFix {
    /// `x` is longitude, `y` is latitude, both in degrees
    pub point: Point,
    /// Radius of uncertainty in meters
    pub accuracy: f64,
    /// When the fix was taken, in milliseconds since the epoch
    pub timestamp: i64,
}

impl LocationFix {
    pub fn new(lat: f64, lon: f64, accuracy: f64, timestamp: i64) -> Self {
        Self {
            point: Point::new(lon, lat),
            accuracy,
            timestamp,
        }
    }
}

/// Coarse quality band of a fix, shown to the player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum FixQuality {
    Good,
    Fair,
    Poor,
    Rejected,
}

impl FixQuality {
    const GOOD_METERS: f64 = 20.0;
    const FAIR_METERS: f64 = 50.0;

    pub fn classify(accuracy: f64, max_accuracy: f64) -> Self {
        if !accuracy.is_finite() || accuracy < 0.0 || accuracy > max_accuracy {
            FixQuality::Rejected
        } else if accuracy <= Self::GOOD_METERS {
            FixQuality::Good
        } else if accuracy <= Self::FAIR_METERS {
            FixQuality::Fair
        } else {
            FixQuality::Poor
        }
    }

    pub fn is_accepted(self) -> bool {
        self != FixQuality::Rejected
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("location unavailable")]
    PositionUnavailable,

    #[error("timed out waiting for a location fix")]
    Timeout,
}

/// What a subscriber asks the provider for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocationOptions {
    pub high_accuracy: bool,
    /// How long to wait for a fix before reporting [`ProviderError::Timeout`]
    pub timeout: Duration,
    /// Oldest cached fix the provider may hand back; zero means always fresh
    pub maximum_age: Duration,
}

impl LocationOptions {
    pub fn fresh(timeout: Duration) -> Self {
        Self {
            high_accuracy: true,
            timeout,
            maximum_age: Duration::ZERO,
        }
    }
}

pub type LocationSample = Result<LocationFix, ProviderError>;

/// A live stream of samples. Dropping it releases the provider.
#[derive(Debug)]
pub struct LocationSubscription {
    receiver: mpsc::Receiver<LocationSample>,
}

impl LocationSubscription {
    /// Create a subscription and the sender a provider feeds it through.
    /// Providers should stop once `Sender::is_closed` reports true.
    pub fn channel(buffer: usize) -> (mpsc::Sender<LocationSample>, Self) {
        let (sender, receiver) = mpsc::channel(buffer);
        (sender, Self { receiver })
    }

    /// The next sample, or `None` once the provider has gone away.
    pub async fn next(&mut self) -> Option<LocationSample> {
        self.receiver.recv().await
    }
}

pub trait GeolocationProvider: Send + Sync {
    fn watch(&self, options: LocationOptions) -> LocationSubscription;
}
