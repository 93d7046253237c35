//! Fixes typed (or piped) on stdin, one `lat,lon,accuracy` per line.

use std::time::Duration;

use manhunt_core::{
    clock::{Clock, SystemClock},
    location::{GeolocationProvider, LocationFix, LocationOptions, LocationSample, LocationSubscription, ProviderError},
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc::Sender,
};

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseFixError {
    #[error("expected `lat,lon,accuracy`")]
    Shape,

    #[error("`{0}` is not a number")]
    Number(String),
}

/// Parse `lat,lon,accuracy`. Blank lines and `#` comments yield `None`.
pub fn parse_fix(line: &str, now: i64) -> Result<Option<LocationFix>, ParseFixError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let fields = line
        .split(',')
        .map(|field| {
            let field = field.trim();
            field
                .parse::<f64>()
                .map_err(|_| ParseFixError::Number(field.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let [lat, lon, accuracy] = fields[..] else {
        return Err(ParseFixError::Shape);
    };
    Ok(Some(LocationFix::new(lat, lon, accuracy, now)))
}

#[derive(Clone, Copy, Debug, Default)]
pub struct StdinProvider;

impl GeolocationProvider for StdinProvider {
    fn watch(&self, options: LocationOptions) -> LocationSubscription {
        let (sender, subscription) = LocationSubscription::channel(16);
        tokio::spawn(read_fixes(sender, options.timeout));
        subscription
    }
}

async fn read_fixes(sender: Sender<LocationSample>, timeout: Duration) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let next = tokio::select! {
            line = tokio::time::timeout(timeout, lines.next_line()) => line,
            () = sender.closed() => break,
        };

        let sample = match next {
            Err(_) => Err(ProviderError::Timeout),
            Ok(Ok(None)) => {
                tracing::info!("stdin closed, no more fixes");
                break;
            }
            Ok(Ok(Some(line))) => match parse_fix(&line, SystemClock.now_ms()) {
                Ok(Some(fix)) => Ok(fix),
                Ok(None) => continue,
                Err(error) => {
                    tracing::warn!(%error, line = %line, "ignoring unreadable fix");
                    continue;
                }
            },
            Ok(Err(error)) => {
                tracing::warn!(%error, "failed to read stdin");
                Err(ProviderError::PositionUnavailable)
            }
        };

        if sender.send(sample).await.is_err() {
            break;
        }
    }
}
