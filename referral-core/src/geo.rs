//! Geographic view: markers for geocoded patients.

use serde::{Deserialize, Serialize};

use crate::{Coordinates, PatientRecord};

/// Santiago de Chile, shown when no patient has coordinates.
pub const DEFAULT_MAP_CENTER: Coordinates = Coordinates {
    lat: -33.4489,
    lng: -70.6693,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MapMarker {
    pub patient_id: String,
    pub label: String,
    pub commune: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub coordinates: Coordinates,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl GeoBounds {
    pub fn center(&self) -> Coordinates {
        Coordinates {
            lat: (self.south + self.north) / 2.0,
            lng: (self.west + self.east) / 2.0,
        }
    }
}

/// One marker per record with resolved coordinates, in input order.
pub fn markers(records: &[PatientRecord]) -> Vec<MapMarker> {
    records
        .iter()
        .filter_map(|record| {
            let coordinates = record.coordinates()?;
            Some(MapMarker {
                patient_id: record.id.clone(),
                label: record.name.clone(),
                commune: record.commune.clone(),
                photo_url: record.photo_url.clone(),
                coordinates,
            })
        })
        .collect()
}

/// Smallest box holding every marker.
pub fn bounds(markers: &[MapMarker]) -> Option<GeoBounds> {
    let first = markers.first()?.coordinates;
    let start = GeoBounds {
        south: first.lat,
        west: first.lng,
        north: first.lat,
        east: first.lng,
    };
    Some(markers.iter().fold(start, |acc, marker| {
        let c = marker.coordinates;
        GeoBounds {
            south: acc.south.min(c.lat),
            west: acc.west.min(c.lng),
            north: acc.north.max(c.lat),
            east: acc.east.max(c.lng),
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_records;

    #[test]
    fn only_geocoded_records_become_markers() {
        let records = parse_records(
            r#"[{"id":"1","name":"Ana","commune":"Las Condes","locationDetails":{"lat":-33.41,"lng":-70.58}},
                {"id":"2","name":"Beto","commune":"Providencia"},
                {"id":"3","name":"Carla","commune":"Valparaíso","locationDetails":{"lat":-33.05,"lng":-71.62}}]"#,
        )
        .unwrap();

        let found = markers(&records);
        let ids: Vec<_> = found.iter().map(|m| m.patient_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);

        let b = bounds(&found).unwrap();
        assert_eq!(b.south, -33.41);
        assert_eq!(b.north, -33.05);
        assert_eq!(b.west, -71.62);
        assert_eq!(b.east, -70.58);
    }

    #[test]
    fn no_markers_means_no_bounds() {
        assert!(bounds(&[]).is_none());
    }
}
