use super::buckets::{MinuteBuckets, TimeFilter};
use crate::stations::Station;
use serde::Serialize;
use std::collections::HashMap;

/// A station enriched with traffic counts for one filter window.
///
/// Always produced by [`compute_station_traffic`]; the counts are never
/// updated in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationTraffic {
    pub short_name: String,
    pub name: Option<String>,
    pub lon: f64,
    pub lat: f64,
    pub departures: usize,
    pub arrivals: usize,
    pub total_traffic: usize,
}

impl StationTraffic {
    /// Share of this station's traffic that is outbound: 1.0 means all
    /// departures, 0.0 all arrivals, 0.5 for a station with no traffic
    /// (the neutral color midpoint).
    pub fn departure_ratio(&self) -> f64 {
        if self.total_traffic == 0 {
            0.5
        } else {
            self.departures as f64 / self.total_traffic as f64
        }
    }
}

/// Re-derives per-station traffic for one time filter.
///
/// Filtered departures are grouped by `start_station_id` and filtered
/// arrivals by `end_station_id`; each input station picks up its counts,
/// defaulting to zero when no trip touched it. Pure function of its
/// arguments: the station list is left untouched and calling it twice
/// gives identical output.
pub fn compute_station_traffic(
    stations: &[Station],
    buckets: &MinuteBuckets,
    filter: TimeFilter,
) -> Vec<StationTraffic> {
    let mut departures: HashMap<&str, usize> = HashMap::new();
    for t in buckets.departures_within(filter) {
        *departures.entry(t.start_station_id.as_str()).or_insert(0) += 1;
    }

    let mut arrivals: HashMap<&str, usize> = HashMap::new();
    for t in buckets.arrivals_within(filter) {
        *arrivals.entry(t.end_station_id.as_str()).or_insert(0) += 1;
    }

    stations
        .iter()
        .map(|station| {
            let id = station.short_name.as_str();
            let d = departures.get(id).copied().unwrap_or(0);
            let a = arrivals.get(id).copied().unwrap_or(0);

            StationTraffic {
                short_name: station.short_name.clone(),
                name: station.name.clone(),
                lon: station.lon,
                lat: station.lat,
                departures: d,
                arrivals: a,
                total_traffic: d + a,
            }
        })
        .collect()
}
