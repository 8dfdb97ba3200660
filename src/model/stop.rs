//! Bus stops and their shelter/pole categorization.

use std::fmt;

use serde_json::{json, Map, Value};

use crate::model::geojson::{Feature, Geometry};
use crate::overpass::api_model::{Element, ElementKind};

/// One `highway=bus_stop` node with the tags the stop map renders.
#[derive(Debug, Clone)]
pub struct Stop {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    pub name: Option<String>,
    pub shelter: Option<String>,
    pub pole: Option<String>,
    pub lit: Option<String>,
    pub bench: Option<String>,
    pub bin: Option<String>,
    /// Route relations that reference this node, filled by the association
    /// step. Stays empty when nothing references the stop.
    pub routes: Vec<i64>,
}

impl Stop {
    /// `None` for anything that isn't a node with coordinates.
    pub fn from_element(element: &Element) -> Option<Stop> {
        if element.kind != ElementKind::Node {
            return None;
        }

        Some(Stop {
            id: element.id,
            lat: element.lat?,
            lon: element.lon?,
            name: element.tag("name").map(str::to_string),
            shelter: element.tag("shelter").map(str::to_string),
            pole: element.tag("pole").map(str::to_string),
            lit: element.tag("lit").map(str::to_string),
            bench: element.tag("bench").map(str::to_string),
            bin: element.tag("bin").map(str::to_string),
            routes: Vec::new(),
        })
    }

    pub fn category(&self) -> StopCategory {
        StopCategory::from_tags(self.shelter.as_deref(), self.pole.as_deref())
    }

    pub fn to_feature(&self) -> Feature {
        let properties = json!({
            "id": self.id,
            "name": self.name,
            "shelter": self.shelter,
            "pole": self.pole,
            "lit": self.lit,
            "bench": self.bench,
            "bin": self.bin,
            "category": self.category().to_string(),
            "routes": self.routes,
        });
        let properties: Map<String, Value> = properties.as_object().cloned().unwrap_or_default();

        Feature::new(
            Geometry::Point {
                coordinates: [self.lon, self.lat],
            },
            properties,
        )
    }
}

/// The eight shelter×pole buckets the stop map renders separately. Display
/// names keep the numbered labels the site's data files use.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StopCategory {
    ShelterYesPoleNone,
    ShelterNonePoleSign,
    ShelterNonePoleTotem,
    ShelterNonePoleFlag,
    ShelterYesPoleSign,
    ShelterYesPoleTotem,
    ShelterYesPoleFlag,
    ShelterNonePoleNone,
}

/// What kind of marker a `pole` tag value describes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum PoleKind {
    Totem,
    Flag,
    Sign,
    None,
}

impl PoleKind {
    /// Pole values come in combinations like `totem;traffic_sign`, so this
    /// matches by substring. First match wins: totem and flag outrank the
    /// plain sign values they are usually combined with.
    fn from_tag(pole: Option<&str>) -> PoleKind {
        let pole = pole.unwrap_or("");
        if pole.contains("totem") {
            PoleKind::Totem
        } else if pole.contains("flag") {
            PoleKind::Flag
        } else if pole.contains("yes") || pole.contains("traffic_sign") {
            PoleKind::Sign
        } else {
            PoleKind::None
        }
    }
}

impl StopCategory {
    /// Numbered order of the output files.
    pub const ALL: [StopCategory; 8] = [
        StopCategory::ShelterYesPoleNone,
        StopCategory::ShelterNonePoleSign,
        StopCategory::ShelterNonePoleTotem,
        StopCategory::ShelterNonePoleFlag,
        StopCategory::ShelterYesPoleSign,
        StopCategory::ShelterYesPoleTotem,
        StopCategory::ShelterYesPoleFlag,
        StopCategory::ShelterNonePoleNone,
    ];

    /// Total and deterministic: every tag combination lands in exactly one
    /// bucket. Combinations no rule matches (a `shelter=no` stop with an
    /// unrecognized pole value, say) fall into the unequipped default.
    pub fn from_tags(shelter: Option<&str>, pole: Option<&str>) -> StopCategory {
        let sheltered = shelter == Some("yes");

        match (sheltered, PoleKind::from_tag(pole)) {
            (true, PoleKind::None) => StopCategory::ShelterYesPoleNone,
            (false, PoleKind::Sign) => StopCategory::ShelterNonePoleSign,
            (false, PoleKind::Totem) => StopCategory::ShelterNonePoleTotem,
            (false, PoleKind::Flag) => StopCategory::ShelterNonePoleFlag,
            (true, PoleKind::Sign) => StopCategory::ShelterYesPoleSign,
            (true, PoleKind::Totem) => StopCategory::ShelterYesPoleTotem,
            (true, PoleKind::Flag) => StopCategory::ShelterYesPoleFlag,
            (false, PoleKind::None) => StopCategory::ShelterNonePoleNone,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StopCategory::ShelterYesPoleNone => "1_shelter_yes_pole_none",
            StopCategory::ShelterNonePoleSign => "2_shelter_none_pole_sign",
            StopCategory::ShelterNonePoleTotem => "3_shelter_none_pole_totem",
            StopCategory::ShelterNonePoleFlag => "4_shelter_none_pole_flag",
            StopCategory::ShelterYesPoleSign => "5_shelter_yes_pole_sign",
            StopCategory::ShelterYesPoleTotem => "6_shelter_yes_pole_totem",
            StopCategory::ShelterYesPoleFlag => "7_shelter_yes_pole_flag",
            StopCategory::ShelterNonePoleNone => "8_shelter_none_pole_none",
        }
    }
}

impl fmt::Display for StopCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tag_combination_lands_in_exactly_one_bucket() {
        let shelters = [None, Some("yes"), Some("no"), Some("covered")];
        let poles = [
            None,
            Some("yes"),
            Some("no"),
            Some("traffic_sign"),
            Some("totem"),
            Some("totem;traffic_sign"),
            Some("traffic_sign;totem"),
            Some("flag"),
            Some("flag;traffic_sign"),
            Some("weird_value"),
        ];

        for shelter in shelters {
            for pole in poles {
                let category = StopCategory::from_tags(shelter, pole);
                assert!(
                    StopCategory::ALL.contains(&category),
                    "({shelter:?}, {pole:?}) mapped outside the 8 buckets"
                );
                // Deterministic on repeat.
                assert_eq!(category, StopCategory::from_tags(shelter, pole));
            }
        }
    }

    #[test]
    fn shelter_and_pole_rules_match_the_site_buckets() {
        assert_eq!(
            StopCategory::from_tags(Some("yes"), None),
            StopCategory::ShelterYesPoleNone
        );
        assert_eq!(
            StopCategory::from_tags(None, Some("traffic_sign")),
            StopCategory::ShelterNonePoleSign
        );
        assert_eq!(
            StopCategory::from_tags(None, Some("totem;traffic_sign")),
            StopCategory::ShelterNonePoleTotem
        );
        assert_eq!(
            StopCategory::from_tags(None, Some("flag;traffic_sign")),
            StopCategory::ShelterNonePoleFlag
        );
        assert_eq!(
            StopCategory::from_tags(Some("yes"), Some("yes")),
            StopCategory::ShelterYesPoleSign
        );
        assert_eq!(
            StopCategory::from_tags(Some("yes"), Some("traffic_sign;totem")),
            StopCategory::ShelterYesPoleTotem
        );
        assert_eq!(
            StopCategory::from_tags(Some("yes"), Some("flag")),
            StopCategory::ShelterYesPoleFlag
        );
        assert_eq!(
            StopCategory::from_tags(None, None),
            StopCategory::ShelterNonePoleNone
        );
    }

    #[test]
    fn unmatched_combinations_fall_into_the_default_bucket() {
        assert_eq!(
            StopCategory::from_tags(Some("no"), Some("granite_obelisk")),
            StopCategory::ShelterNonePoleNone
        );
        assert_eq!(
            StopCategory::from_tags(Some("covered"), None),
            StopCategory::ShelterNonePoleNone
        );
    }

    #[test]
    fn labels_keep_the_numbered_file_names() {
        assert_eq!(
            StopCategory::ShelterYesPoleSign.to_string(),
            "5_shelter_yes_pole_sign"
        );
        assert_eq!(
            StopCategory::ShelterNonePoleNone.label(),
            "8_shelter_none_pole_none"
        );
    }
}
