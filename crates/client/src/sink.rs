use manhunt_core::render::{Marker, MarkerKind, MarkerSink};

/// Writes marker commands to the log instead of a map.
#[derive(Debug, Default)]
pub struct LogSink;

impl LogSink {
    fn describe(marker: &Marker) -> String {
        let who = match marker.kind {
            MarkerKind::Own => "you",
            MarkerKind::Opponent => "opponent",
        };
        format!(
            "{who} {} [{}] at {:.6},{:.6} ±{:.0}m",
            marker.label,
            marker.role,
            marker.position.y(),
            marker.position.x(),
            marker.accuracy_m
        )
    }
}

impl MarkerSink for LogSink {
    fn add_marker(&mut self, marker: &Marker) {
        tracing::info!(id = %marker.id, "+ {}", Self::describe(marker));
    }

    fn update_marker(&mut self, marker: &Marker) {
        tracing::debug!(id = %marker.id, "~ {}", Self::describe(marker));
    }

    fn remove_marker(&mut self, id: &str) {
        tracing::info!(id, "- marker removed");
    }
}
