//! Visual encodings the map frontend styles markers with.
//!
//! Nothing here draws anything; these are the numbers and labels the
//! browser side binds to circle radius, color, tooltips, and the slider
//! caption.

use super::buckets::TimeFilter;
use super::compute::StationTraffic;

/// Radius in pixels for the busiest station, matching the original map's
/// scale range.
pub const DEFAULT_MAX_RADIUS: f64 = 25.0;

/// Square-root scale from traffic totals to marker radii: domain
/// `[0, domain_max]`, range `[0, range_max]`.
#[derive(Debug, Clone, Copy)]
pub struct RadiusScale {
    domain_max: f64,
    range_max: f64,
}

impl RadiusScale {
    pub fn new(domain_max: usize, range_max: f64) -> Self {
        Self {
            domain_max: domain_max as f64,
            range_max,
        }
    }

    /// Scale sized to the busiest station in the batch, with the default
    /// pixel range.
    pub fn from_traffic(rows: &[StationTraffic]) -> Self {
        let busiest = rows.iter().map(|r| r.total_traffic).max().unwrap_or(0);
        Self::new(busiest, DEFAULT_MAX_RADIUS)
    }

    /// Maps a traffic total to `range_max * sqrt(total / domain_max)`.
    /// A zero domain (no traffic anywhere) pins every radius to 0.
    pub fn radius(&self, total_traffic: usize) -> f64 {
        if self.domain_max == 0.0 {
            return 0.0;
        }
        self.range_max * (total_traffic as f64 / self.domain_max).sqrt()
    }
}

/// Display text for a filter: `"any time"`, or a 12-hour clock label like
/// `"8:05 AM"` (the slider caption contract).
pub fn minute_label(filter: TimeFilter) -> String {
    match filter {
        TimeFilter::AllDay => "any time".to_string(),
        TimeFilter::Around(m) => {
            let hour = m / 60;
            let minute = m % 60;
            let (hour12, meridiem) = match hour {
                0 => (12, "AM"),
                1..=11 => (hour, "AM"),
                12 => (12, "PM"),
                _ => (hour - 12, "PM"),
            };
            format!("{hour12}:{minute:02} {meridiem}")
        }
    }
}

/// Marker tooltip line, byte-for-byte the original map's title text.
pub fn tooltip(row: &StationTraffic) -> String {
    format!(
        "{} trips  —  {} departures, {} arrivals",
        row.total_traffic, row.departures, row.arrivals
    )
}
