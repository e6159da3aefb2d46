use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};

/// `[lat, lng]` in degrees, matching the upstream feed's pair encoding.
pub type Coord = [f64; 2];

/// Minimum number of vertices for a polygon ring.
pub const MIN_RING_VERTICES: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Space {
    #[serde(deserialize_with = "deserialize_space_id")]
    pub id: String,
    pub coords: Vec<Coord>,
    pub occupied: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    pub name: String,
    pub coords: Vec<Coord>,
    pub spaces: Vec<Space>,
}

impl Lot {
    pub fn total_spaces(&self) -> usize {
        self.spaces.len()
    }

    pub fn occupied_spaces(&self) -> usize {
        self.spaces.iter().filter(|space| space.occupied).count()
    }

    pub fn space(&self, id: &str) -> Option<&Space> {
        self.spaces.iter().find(|space| space.id == id)
    }
}

/// One complete poll result. Always replaced wholesale, never merged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LotSnapshot {
    lots: Vec<Lot>,
}

impl LotSnapshot {
    pub fn new(lots: Vec<Lot>) -> Self {
        Self { lots }
    }

    /// Decode and validate a `/data` response body.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_slice(bytes)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn lots(&self) -> &[Lot] {
        &self.lots
    }

    pub fn len(&self) -> usize {
        self.lots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    pub fn lot(&self, name: &str) -> Option<&Lot> {
        self.lots.iter().find(|lot| lot.name == name)
    }

    pub fn total_spaces(&self) -> usize {
        self.lots.iter().map(Lot::total_spaces).sum()
    }

    /// Reject payloads that decode but cannot be drawn, or whose lots and
    /// spaces cannot be told apart by name and id.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        let mut lot_names = HashSet::with_capacity(self.lots.len());
        for (index, lot) in self.lots.iter().enumerate() {
            if lot.name.trim().is_empty() {
                return Err(SnapshotError::BlankLotName { index });
            }
            if !lot_names.insert(lot.name.as_str()) {
                return Err(SnapshotError::DuplicateLotName {
                    lot: lot.name.clone(),
                });
            }
            if lot.coords.len() < MIN_RING_VERTICES {
                return Err(SnapshotError::DegenerateBoundary {
                    lot: lot.name.clone(),
                    vertices: lot.coords.len(),
                });
            }
            check_coords(&lot.name, &lot.coords)?;

            let mut space_ids = HashSet::with_capacity(lot.spaces.len());
            for (space_index, space) in lot.spaces.iter().enumerate() {
                if space.id.trim().is_empty() {
                    return Err(SnapshotError::BlankSpaceId {
                        lot: lot.name.clone(),
                        index: space_index,
                    });
                }
                if !space_ids.insert(space.id.as_str()) {
                    return Err(SnapshotError::DuplicateSpaceId {
                        lot: lot.name.clone(),
                        space: space.id.clone(),
                    });
                }
                if space.coords.len() < MIN_RING_VERTICES {
                    return Err(SnapshotError::DegenerateSpace {
                        lot: lot.name.clone(),
                        space: space.id.clone(),
                        vertices: space.coords.len(),
                    });
                }
                check_coords(&lot.name, &space.coords)?;
            }
        }
        Ok(())
    }
}

fn check_coords(lot: &str, coords: &[Coord]) -> Result<(), SnapshotError> {
    for &[lat, lng] in coords {
        let valid = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng);
        if !valid {
            return Err(SnapshotError::InvalidCoord {
                lot: lot.to_string(),
                lat,
                lng,
            });
        }
    }
    Ok(())
}

/// Reasons a `/data` payload is refused.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("payload does not match the lot schema: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("lot #{index} has a blank name")]
    BlankLotName { index: usize },

    #[error("lot {lot:?} boundary has {vertices} vertices, expected at least 3")]
    DegenerateBoundary { lot: String, vertices: usize },

    #[error("lot name {lot:?} appears more than once")]
    DuplicateLotName { lot: String },

    #[error("lot {lot:?} space #{index} has a blank id")]
    BlankSpaceId { lot: String, index: usize },

    #[error("lot {lot:?} space {space:?} has {vertices} vertices, expected at least 3")]
    DegenerateSpace {
        lot: String,
        space: String,
        vertices: usize,
    },

    #[error("lot {lot:?} lists space id {space:?} more than once")]
    DuplicateSpaceId { lot: String, space: String },

    #[error("lot {lot:?} has an out-of-range coordinate [{lat}, {lng}]")]
    InvalidCoord { lot: String, lat: f64, lng: f64 },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSpaceId {
    Text(String),
    Number(u64),
}

/// The live feed writes numeric ids; both forms are stored as text.
fn deserialize_space_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawSpaceId::deserialize(deserializer)? {
        RawSpaceId::Text(id) => id,
        RawSpaceId::Number(id) => id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::{Lot, LotSnapshot, SnapshotError};

    const STADIUM: &str = r#"[
        {
            "name": "Stadium Parking Lot",
            "coords": [[38.030907, -78.511921], [38.031354, -78.51128], [38.031283, -78.511202], [38.030836, -78.511848]],
            "spaces": [
                {"id": 0, "coords": [[38.0309, -78.5119], [38.0310, -78.5118], [38.0309, -78.5117]], "occupied": true},
                {"id": "B-2", "coords": [[38.0309, -78.5119], [38.0310, -78.5118], [38.0309, -78.5117]], "occupied": false}
            ]
        },
        {
            "name": "Overflow",
            "coords": [[38.0, -78.5], [38.1, -78.5], [38.1, -78.4]],
            "spaces": []
        }
    ]"#;

    #[test]
    fn parses_feed_with_numeric_and_text_ids() {
        let snapshot = LotSnapshot::from_json_slice(STADIUM.as_bytes()).expect("valid feed");

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.total_spaces(), 2);
        let stadium = snapshot.lot("Stadium Parking Lot").expect("stadium lot");
        assert_eq!(stadium.spaces[0].id, "0");
        assert_eq!(stadium.spaces[1].id, "B-2");
        assert_eq!(stadium.occupied_spaces(), 1);
        assert!(stadium.space("B-2").is_some_and(|space| !space.occupied));
        assert!(snapshot.lot("Overflow").is_some_and(|lot| lot.spaces.is_empty()));
    }

    #[test]
    fn empty_array_is_a_valid_snapshot() {
        let snapshot = LotSnapshot::from_json_slice(b"[]").expect("empty feed");
        assert!(snapshot.is_empty());
    }

    #[test]
    fn rejects_missing_fields_instead_of_defaulting() {
        let payload = r#"[{"name": "A", "coords": [[0,0],[0,1],[1,1]]}]"#;
        let err = LotSnapshot::from_json_slice(payload.as_bytes()).expect_err("spaces missing");
        assert!(matches!(err, SnapshotError::Decode(_)));

        let payload = r#"[{"name": "A", "coords": [[0,0],[0,1],[1,1]],
            "spaces": [{"id": "1", "coords": [[0,0],[0,1],[1,1]]}]}]"#;
        let err = LotSnapshot::from_json_slice(payload.as_bytes()).expect_err("occupied missing");
        assert!(matches!(err, SnapshotError::Decode(_)));
    }

    #[test]
    fn rejects_wrongly_typed_values() {
        let cases = [
            r#"{"name": "A"}"#,
            r#"[{"name": "A", "coords": [[0,0,0],[0,1],[1,1]], "spaces": []}]"#,
            r#"[{"name": "A", "coords": [[0,0],[0,1],[1,1]],
                "spaces": [{"id": "1", "coords": [[0,0],[0,1],[1,1]], "occupied": "yes"}]}]"#,
            r#"[{"name": "A", "coords": [[0,0],[0,1],[1,1]],
                "spaces": [{"id": -4, "coords": [[0,0],[0,1],[1,1]], "occupied": true}]}]"#,
            r#"[{"name": "A", "coords": [[0,0],[0,1],[1,1]],
                "spaces": [{"id": true, "coords": [[0,0],[0,1],[1,1]], "occupied": true}]}]"#,
        ];

        for payload in cases {
            let err = LotSnapshot::from_json_slice(payload.as_bytes())
                .expect_err("payload should be rejected");
            assert!(matches!(err, SnapshotError::Decode(_)), "{payload}: {err}");
        }
    }

    #[test]
    fn rejects_geometry_that_cannot_be_drawn() {
        let payload = r#"[{"name": "A", "coords": [[0,0],[0,1]], "spaces": []}]"#;
        assert!(matches!(
            LotSnapshot::from_json_slice(payload.as_bytes()),
            Err(SnapshotError::DegenerateBoundary { vertices: 2, .. })
        ));

        let payload = r#"[{"name": "A", "coords": [[0,0],[0,1],[1,1]],
            "spaces": [{"id": "9", "coords": [[0,0]], "occupied": true}]}]"#;
        assert!(matches!(
            LotSnapshot::from_json_slice(payload.as_bytes()),
            Err(SnapshotError::DegenerateSpace { ref space, .. }) if space == "9"
        ));

        let payload = r#"[{"name": "A", "coords": [[0,0],[95,1],[1,1]], "spaces": []}]"#;
        assert!(matches!(
            LotSnapshot::from_json_slice(payload.as_bytes()),
            Err(SnapshotError::InvalidCoord { .. })
        ));
    }

    #[test]
    fn rejects_blank_identifiers() {
        let payload = r#"[{"name": "  ", "coords": [[0,0],[0,1],[1,1]], "spaces": []}]"#;
        assert!(matches!(
            LotSnapshot::from_json_slice(payload.as_bytes()),
            Err(SnapshotError::BlankLotName { index: 0 })
        ));

        let payload = r#"[{"name": "A", "coords": [[0,0],[0,1],[1,1]],
            "spaces": [{"id": "", "coords": [[0,0],[0,1],[1,1]], "occupied": true}]}]"#;
        assert!(matches!(
            LotSnapshot::from_json_slice(payload.as_bytes()),
            Err(SnapshotError::BlankSpaceId { index: 0, .. })
        ));
    }

    #[test]
    fn rejects_duplicate_lot_names_and_space_ids() {
        let payload = r#"[
            {"name": "A", "coords": [[0,0],[0,1],[1,1]], "spaces": []},
            {"name": "A", "coords": [[0,0],[0,1],[1,1]], "spaces": []}]"#;
        assert!(matches!(
            LotSnapshot::from_json_slice(payload.as_bytes()),
            Err(SnapshotError::DuplicateLotName { ref lot }) if lot == "A"
        ));

        // 7 and "7" are the same id once stored as text.
        let payload = r#"[{"name": "A", "coords": [[0,0],[0,1],[1,1]], "spaces": [
            {"id": 7, "coords": [[0,0],[0,1],[1,1]], "occupied": true},
            {"id": "7", "coords": [[0,0],[0,1],[1,1]], "occupied": false}]}]"#;
        assert!(matches!(
            LotSnapshot::from_json_slice(payload.as_bytes()),
            Err(SnapshotError::DuplicateSpaceId { ref space, .. }) if space == "7"
        ));

        let payload = r#"[
            {"name": "A", "coords": [[0,0],[0,1],[1,1]], "spaces": [
                {"id": 1, "coords": [[0,0],[0,1],[1,1]], "occupied": true}]},
            {"name": "B", "coords": [[0,0],[0,1],[1,1]], "spaces": [
                {"id": 1, "coords": [[0,0],[0,1],[1,1]], "occupied": true}]}]"#;
        assert!(LotSnapshot::from_json_slice(payload.as_bytes()).is_ok());
    }

    #[test]
    fn coordinates_survive_a_serialize_parse_cycle_exactly() {
        let lat = 38.030984068965516_f64;
        let lng = -78.51158565517241_f64;
        let snapshot = LotSnapshot::new(vec![Lot {
            name: "A".to_string(),
            coords: vec![[lat, lng], [lat, 0.0], [0.0, lng]],
            spaces: Vec::new(),
        }]);

        let json = serde_json::to_vec(&snapshot).expect("serialize snapshot");
        let parsed = LotSnapshot::from_json_slice(&json).expect("parse snapshot");

        assert_eq!(parsed, snapshot);
        assert_eq!(parsed.lots()[0].coords[0][0].to_bits(), lat.to_bits());
    }

    #[test]
    fn serializes_back_to_feed_shape() {
        let snapshot = LotSnapshot::from_json_slice(STADIUM.as_bytes()).expect("valid feed");
        let value = serde_json::to_value(&snapshot).expect("serialize snapshot");

        assert!(value.is_array());
        assert_eq!(value[0]["name"], "Stadium Parking Lot");
        assert_eq!(value[0]["spaces"][0]["id"], "0");
        assert_eq!(value[0]["spaces"][0]["occupied"], true);
    }
}
