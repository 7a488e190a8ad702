use crate::trips::Trip;
use anyhow::Result;

/// Slots in one day of minute buckets.
pub const MINUTES_PER_DAY: usize = 1440;

/// Half-width of the minute window: a filter at minute `m` covers `m ± 60`.
pub const WINDOW_HALF_WIDTH: i32 = 60;

/// Time-of-day filter applied to every traffic query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFilter {
    /// No filtering; every trip in the dataset counts.
    AllDay,
    /// Only trips within ±60 minutes of this minute-of-day, wrapping
    /// across midnight.
    Around(u16),
}

impl TimeFilter {
    /// Parses the slider contract: `-1` selects any time, `0..=1439`
    /// selects a minute-of-day.
    pub fn from_slider(raw: i32) -> Result<Self> {
        match raw {
            -1 => Ok(TimeFilter::AllDay),
            m if (0..MINUTES_PER_DAY as i32).contains(&m) => Ok(TimeFilter::Around(m as u16)),
            _ => Err(anyhow::anyhow!(
                "minute must be -1 (any time) or 0..=1439, got {raw}"
            )),
        }
    }
}

/// The trip dataset partitioned by minute-of-day.
///
/// Two fixed arrays of 1440 slots hold, per minute, the trips that started
/// (departures) or ended (arrivals) in that minute. Built once after the
/// CSV loads and never mutated; every query walks the slots it needs and
/// re-derives counts from scratch.
#[derive(Debug)]
pub struct MinuteBuckets {
    trips: Vec<Trip>,
    // Index lists into `trips`, so each trip is stored once and appears in
    // exactly one departure slot and one arrival slot.
    departures: Vec<Vec<u32>>,
    arrivals: Vec<Vec<u32>>,
}

impl MinuteBuckets {
    pub fn from_trips(trips: Vec<Trip>) -> Self {
        let mut departures = vec![Vec::new(); MINUTES_PER_DAY];
        let mut arrivals = vec![Vec::new(); MINUTES_PER_DAY];

        for (i, trip) in trips.iter().enumerate() {
            departures[trip.start_minute() as usize].push(i as u32);
            arrivals[trip.end_minute() as usize].push(i as u32);
        }

        Self {
            trips,
            departures,
            arrivals,
        }
    }

    pub fn trip_count(&self) -> usize {
        self.trips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }

    /// Trips that started in exactly this minute.
    pub fn departures_at(&self, minute: u16) -> impl Iterator<Item = &Trip> {
        self.departures[minute as usize]
            .iter()
            .map(|&i| &self.trips[i as usize])
    }

    /// Trips that ended in exactly this minute.
    pub fn arrivals_at(&self, minute: u16) -> impl Iterator<Item = &Trip> {
        self.arrivals[minute as usize]
            .iter()
            .map(|&i| &self.trips[i as usize])
    }

    /// Trips that started inside the filter window, bucket order then
    /// insertion order.
    pub fn departures_within(&self, filter: TimeFilter) -> Vec<&Trip> {
        self.window(&self.departures, filter)
    }

    /// Trips that ended inside the filter window, bucket order then
    /// insertion order.
    pub fn arrivals_within(&self, filter: TimeFilter) -> Vec<&Trip> {
        self.window(&self.arrivals, filter)
    }

    fn window(&self, buckets: &[Vec<u32>], filter: TimeFilter) -> Vec<&Trip> {
        match filter {
            TimeFilter::AllDay => buckets
                .iter()
                .flatten()
                .map(|&i| &self.trips[i as usize])
                .collect(),
            TimeFilter::Around(minute) => {
                let minute = minute as i32;
                // 121 slots: the minute itself plus 60 on each side, with
                // rem_euclid wrapping the scan across midnight.
                (-WINDOW_HALF_WIDTH..=WINDOW_HALF_WIDTH)
                    .map(|offset| (minute + offset).rem_euclid(MINUTES_PER_DAY as i32) as usize)
                    .flat_map(|slot| buckets[slot].iter())
                    .map(|&i| &self.trips[i as usize])
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn trip(start_id: &str, end_id: &str, start: (u32, u32), end: (u32, u32)) -> Trip {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        Trip {
            start_station_id: start_id.to_string(),
            end_station_id: end_id.to_string(),
            started_at: day.and_hms_opt(start.0, start.1, 0).unwrap(),
            ended_at: day.and_hms_opt(end.0, end.1, 30).unwrap(),
        }
    }

    #[test]
    fn test_each_trip_lands_in_one_departure_and_one_arrival_slot() {
        let buckets = MinuteBuckets::from_trips(vec![trip("A", "B", (8, 5), (8, 20))]);

        assert_eq!(buckets.departures_at(485).count(), 1);
        assert_eq!(buckets.arrivals_at(500).count(), 1);

        // nowhere else
        let departure_total: usize = (0..MINUTES_PER_DAY as u16)
            .map(|m| buckets.departures_at(m).count())
            .sum();
        let arrival_total: usize = (0..MINUTES_PER_DAY as u16)
            .map(|m| buckets.arrivals_at(m).count())
            .sum();
        assert_eq!(departure_total, 1);
        assert_eq!(arrival_total, 1);
    }

    #[test]
    fn test_all_day_returns_every_trip() {
        let trips = vec![
            trip("A", "B", (0, 0), (0, 30)),
            trip("B", "A", (12, 0), (12, 45)),
            trip("A", "C", (23, 59), (0, 20)),
        ];
        let buckets = MinuteBuckets::from_trips(trips);

        assert_eq!(buckets.departures_within(TimeFilter::AllDay).len(), 3);
        assert_eq!(buckets.arrivals_within(TimeFilter::AllDay).len(), 3);
        assert_eq!(buckets.trip_count(), 3);
    }

    #[test]
    fn test_window_is_exactly_121_slots() {
        // one departure in every minute of the day
        let trips: Vec<Trip> = (0..MINUTES_PER_DAY as u32)
            .map(|m| trip("A", "B", (m / 60, m % 60), (m / 60, m % 60)))
            .collect();
        let buckets = MinuteBuckets::from_trips(trips);

        for minute in [0u16, 300, 719, 1439] {
            assert_eq!(
                buckets
                    .departures_within(TimeFilter::Around(minute))
                    .len(),
                121,
                "window at minute {minute}"
            );
        }
    }

    #[test]
    fn test_window_wraps_at_midnight() {
        let trips = vec![
            trip("A", "B", (23, 55), (0, 5)),  // start 1435, end 5
            trip("B", "A", (0, 10), (0, 40)),  // start 10
            trip("C", "A", (1, 2), (1, 30)),   // start 62, outside m=0 window
            trip("D", "A", (22, 58), (23, 30)), // start 1378, outside m=0 window
        ];
        let buckets = MinuteBuckets::from_trips(trips);

        let around_midnight = buckets.departures_within(TimeFilter::Around(0));
        let ids: Vec<&str> = around_midnight
            .iter()
            .map(|t| t.start_station_id.as_str())
            .collect();

        // bucket order: slots 1380..=1439 come before 0..=60
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[test]
    fn test_window_upper_edge_wraps() {
        let trips = vec![
            trip("A", "B", (22, 59), (23, 10)), // 1379, inside m=1439 window
            trip("B", "A", (22, 58), (23, 10)), // 1378, outside
            trip("C", "A", (0, 59), (1, 10)),   // 59, inside (wrapped)
            trip("D", "A", (1, 0), (1, 10)),    // 60, outside
        ];
        let buckets = MinuteBuckets::from_trips(trips);

        let ids: Vec<&str> = buckets
            .departures_within(TimeFilter::Around(1439))
            .iter()
            .map(|t| t.start_station_id.as_str())
            .collect();

        assert_eq!(ids, vec!["A", "C"]);
    }

    #[test]
    fn test_within_bucket_insertion_order_kept() {
        let trips = vec![
            trip("first", "X", (9, 0), (9, 30)),
            trip("second", "X", (9, 0), (9, 31)),
            trip("third", "X", (9, 0), (9, 32)),
        ];
        let buckets = MinuteBuckets::from_trips(trips);

        let ids: Vec<&str> = buckets
            .departures_within(TimeFilter::Around(540))
            .iter()
            .map(|t| t.start_station_id.as_str())
            .collect();

        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_empty_dataset() {
        let buckets = MinuteBuckets::from_trips(Vec::new());

        assert!(buckets.is_empty());
        assert!(buckets.departures_within(TimeFilter::AllDay).is_empty());
        assert!(buckets.arrivals_within(TimeFilter::Around(720)).is_empty());
    }

    #[test]
    fn test_time_filter_from_slider() {
        assert_eq!(TimeFilter::from_slider(-1).unwrap(), TimeFilter::AllDay);
        assert_eq!(TimeFilter::from_slider(0).unwrap(), TimeFilter::Around(0));
        assert_eq!(
            TimeFilter::from_slider(1439).unwrap(),
            TimeFilter::Around(1439)
        );
        assert!(TimeFilter::from_slider(1440).is_err());
        assert!(TimeFilter::from_slider(-2).is_err());
    }
}
