//! Per-minute traffic aggregation.
//!
//! [`MinuteBuckets`] partitions the trip dataset into 1440 minute-of-day
//! slots once at load time; [`compute_station_traffic`] then re-derives
//! per-station departure/arrival counts for any [`TimeFilter`] on demand.
//! There is no other aggregation state: every slider position is a fresh
//! pure computation over the immutable buckets.

pub mod buckets;
pub mod compute;
pub mod encoding;

pub use buckets::{MINUTES_PER_DAY, MinuteBuckets, TimeFilter, WINDOW_HALF_WIDTH};
pub use compute::{StationTraffic, compute_station_traffic};
pub use encoding::{DEFAULT_MAX_RADIUS, RadiusScale, minute_label, tooltip};
