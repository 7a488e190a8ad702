//! GeoJSON interchange with the map frontend.
//!
//! Inbound: the published bike-lane layers (one document per city), merged
//! into a single collection the map can draw as line layers. Outbound: the
//! station markers, one Point feature per station carrying the traffic
//! counts and visual encodings as properties.

use anyhow::{Context, Result};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value};

use crate::traffic::{RadiusScale, StationTraffic, tooltip};

/// Parses a GeoJSON document into a feature collection. Bare `Feature` and
/// `Geometry` documents are wrapped into a one-element collection.
pub fn parse_feature_collection(bytes: &[u8]) -> Result<FeatureCollection> {
    let text = std::str::from_utf8(bytes).context("GeoJSON document is not UTF-8")?;

    let collection = match text.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(fc) => fc,
        GeoJson::Feature(feature) => FeatureCollection {
            bbox: None,
            features: vec![feature],
            foreign_members: None,
        },
        GeoJson::Geometry(geometry) => FeatureCollection {
            bbox: None,
            features: vec![Feature::from(geometry)],
            foreign_members: None,
        },
    };

    Ok(collection)
}

/// Merges lane layers from several publishers into one collection, tagging
/// every feature with the `source` it came from so the frontend can still
/// style the cities separately.
pub fn merge_lane_collections(layers: Vec<(&str, FeatureCollection)>) -> FeatureCollection {
    let mut features = Vec::new();

    for (source, collection) in layers {
        for mut feature in collection.features {
            feature.set_property("source", source);
            features.push(feature);
        }
    }

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// One Point feature per station, `[lon, lat]` coordinates, with the
/// counts, departure ratio, scaled radius, and tooltip text as properties.
/// This is the whole data contract the marker layer renders from.
pub fn stations_to_geojson(rows: &[StationTraffic], scale: &RadiusScale) -> FeatureCollection {
    let features = rows
        .iter()
        .map(|row| {
            let mut feature = Feature::from(Geometry::new(Value::Point(vec![row.lon, row.lat])));

            feature.set_property("short_name", row.short_name.clone());
            if let Some(name) = &row.name {
                feature.set_property("name", name.clone());
            }
            feature.set_property("departures", row.departures as u64);
            feature.set_property("arrivals", row.arrivals as u64);
            feature.set_property("total_traffic", row.total_traffic as u64);
            feature.set_property("departure_ratio", row.departure_ratio());
            feature.set_property("radius", scale.radius(row.total_traffic));
            feature.set_property("tooltip", tooltip(row));

            feature
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}
