//! Trip record ingestion.
//!
//! Monthly trip exports are CSV with one row per rental. The exports carry
//! extra columns (`ride_id`, `rideable_type`, station names, rider type);
//! header-driven deserialization picks out the four fields the aggregation
//! needs and ignores the rest.

use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Timelike};
use flate2::read::GzDecoder;
use serde::de::{self, Deserialize, Deserializer};
use std::io::Read;
use std::path::Path;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// One bike rental: where and when it started, where and when it ended.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Trip {
    pub start_station_id: String,
    pub end_station_id: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub started_at: NaiveDateTime,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub ended_at: NaiveDateTime,
}

impl Trip {
    /// Minute-of-day the rental began, 0..=1439.
    pub fn start_minute(&self) -> u16 {
        minute_of_day(&self.started_at)
    }

    /// Minute-of-day the rental ended, 0..=1439.
    pub fn end_minute(&self) -> u16 {
        minute_of_day(&self.ended_at)
    }
}

/// Minutes since local midnight for a wall-clock timestamp.
///
/// Always in 0..=1439: the clock fields themselves bound it, so a trip that
/// crosses midnight simply yields a small end minute.
pub fn minute_of_day(ts: &NaiveDateTime) -> u16 {
    (ts.hour() * 60 + ts.minute()) as u16
}

/// Reads trip rows from any CSV source. Rows that fail to deserialize are
/// hard errors; the csv crate's message carries the record position.
pub fn parse_trips_csv<R: Read>(reader: R) -> Result<Vec<Trip>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut trips = Vec::new();

    for result in rdr.deserialize() {
        let trip: Trip = result?;
        trips.push(trip);
    }

    Ok(trips)
}

/// Parses an in-memory trips document, transparently decompressing gzip
/// bodies. Sniffing the magic bytes instead of trusting a file extension
/// covers downloads served compressed under a `.csv` name.
pub fn parse_trips_slice(bytes: &[u8]) -> Result<Vec<Trip>> {
    if bytes.starts_with(&GZIP_MAGIC) {
        parse_trips_csv(GzDecoder::new(bytes))
    } else {
        parse_trips_csv(bytes)
    }
}

/// Loads trips from a local file, plain or gzipped.
pub fn read_trips(path: &Path) -> Result<Vec<Trip>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("opening trips file {}", path.display()))?;
    parse_trips_slice(&bytes).with_context(|| format!("reading trips from {}", path.display()))
}

/// Exports write timestamps as `2024-03-01 08:05:23.1230` but ISO `T`
/// separators show up in some months; fractional seconds are optional in
/// both shapes.
fn parse_timestamp(s: &str) -> chrono::ParseResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let s: &str = Deserialize::deserialize(deserializer)?;
    parse_timestamp(s).map_err(de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    const SAMPLE_CSV: &str = "\
ride_id,rideable_type,started_at,ended_at,start_station_name,start_station_id,end_station_name,end_station_id,member_casual
AB12,classic_bike,2024-03-01 08:05:14,2024-03-01 08:20:02,Ames St,A32000,Main St,B32012,member
CD34,electric_bike,2024-03-01 23:55:40.123,2024-03-02 00:10:05.456,Main St,B32012,Ames St,A32000,casual
";

    #[test]
    fn test_parse_trips_with_extra_columns() {
        let trips = parse_trips_csv(SAMPLE_CSV.as_bytes()).unwrap();

        assert_eq!(trips.len(), 2);
        assert_eq!(trips[0].start_station_id, "A32000");
        assert_eq!(trips[0].end_station_id, "B32012");
        assert_eq!(
            trips[0].started_at,
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(8, 5, 14)
                .unwrap()
        );
    }

    #[test]
    fn test_parse_fractional_seconds() {
        let trips = parse_trips_csv(SAMPLE_CSV.as_bytes()).unwrap();
        assert_eq!(trips[1].started_at.second(), 40);
        assert_eq!(trips[1].start_minute(), 23 * 60 + 55);
    }

    #[test]
    fn test_parse_iso_t_separator() {
        let csv = "start_station_id,end_station_id,started_at,ended_at\n\
                   A1,B2,2024-03-01T08:05:14,2024-03-01T08:20:02\n";
        let trips = parse_trips_csv(csv.as_bytes()).unwrap();
        assert_eq!(trips[0].start_minute(), 485);
    }

    #[test]
    fn test_malformed_timestamp_is_an_error() {
        let csv = "start_station_id,end_station_id,started_at,ended_at\n\
                   A1,B2,03/01/2024 8:05,2024-03-01 08:20:02\n";
        assert!(parse_trips_csv(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let csv = "start_station_id,started_at,ended_at\n\
                   A1,2024-03-01 08:05:14,2024-03-01 08:20:02\n";
        assert!(parse_trips_csv(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_headers_only_yields_no_trips() {
        let csv = "start_station_id,end_station_id,started_at,ended_at\n";
        let trips = parse_trips_csv(csv.as_bytes()).unwrap();
        assert!(trips.is_empty());
    }

    #[test]
    fn test_minute_of_day_bounds() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(minute_of_day(&d.and_hms_opt(0, 0, 0).unwrap()), 0);
        assert_eq!(minute_of_day(&d.and_hms_opt(8, 5, 59).unwrap()), 485);
        assert_eq!(minute_of_day(&d.and_hms_opt(23, 59, 59).unwrap()), 1439);
    }

    #[test]
    fn test_parse_slice_sniffs_gzip() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(SAMPLE_CSV.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        let trips = parse_trips_slice(&compressed).unwrap();
        assert_eq!(trips.len(), 2);

        // same document uncompressed parses identically
        let plain = parse_trips_slice(SAMPLE_CSV.as_bytes()).unwrap();
        assert_eq!(plain.len(), 2);
        assert_eq!(plain[0].start_station_id, trips[0].start_station_id);
    }

    #[test]
    fn test_read_trips_gzip_file() {
        // deliberately misnamed: the sniff must win over the extension
        let path = std::env::temp_dir().join("bikeflow_test_trips.csv");

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(SAMPLE_CSV.as_bytes()).unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        let trips = read_trips(&path).unwrap();
        assert_eq!(trips.len(), 2);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_read_trips_missing_file() {
        let err = read_trips(Path::new("/nonexistent/trips.csv")).unwrap_err();
        assert!(err.to_string().contains("trips.csv"));
    }
}
