use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::distance_km;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedPlace {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl NamedPlace {
    pub fn new(name: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.to_string(),
            latitude,
            longitude,
            aliases: Vec::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|alias| alias.to_string()).collect();
        self
    }

    fn answers_to(&self, lowered: &str) -> bool {
        self.name.to_lowercase() == lowered
            || self
                .aliases
                .iter()
                .any(|alias| alias.to_lowercase() == lowered)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NearestPlace<'a> {
    pub name: &'a str,
    pub distance_km: f64,
}

/// Read-only list of named places used for city lookups and reverse lookups.
///
/// List order matters: when two places are exactly equally far away the one
/// listed first wins, which keeps labels stable between renders.
#[derive(Debug, Clone, Default)]
pub struct Gazetteer {
    places: Vec<NamedPlace>,
}

static SWISS: Lazy<Arc<Gazetteer>> = Lazy::new(|| Arc::new(Gazetteer::new(swiss_places())));

impl Gazetteer {
    pub fn new(places: Vec<NamedPlace>) -> Self {
        Self { places }
    }

    /// Shared handle to the compiled-in Swiss table.
    pub fn swiss() -> Arc<Gazetteer> {
        SWISS.clone()
    }

    pub fn places(&self) -> &[NamedPlace] {
        &self.places
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }

    /// Case-insensitive exact match on name or alias.
    pub fn resolve(&self, city: &str) -> Option<&NamedPlace> {
        let lowered = city.trim().to_lowercase();
        if lowered.is_empty() {
            return None;
        }
        self.places.iter().find(|place| place.answers_to(&lowered))
    }

    pub fn nearest_place(&self, lat: f64, lng: f64) -> Option<&str> {
        self.nearest_place_with_distance(lat, lng)
            .map(|nearest| nearest.name)
    }

    pub fn nearest_place_with_distance(&self, lat: f64, lng: f64) -> Option<NearestPlace<'_>> {
        let mut best: Option<NearestPlace<'_>> = None;
        for place in &self.places {
            let distance = distance_km(lat, lng, place.latitude, place.longitude);
            // Strict comparison keeps the first of equal candidates.
            let closer = match &best {
                Some(current) => distance < current.distance_km,
                None => true,
            };
            if closer {
                best = Some(NearestPlace {
                    name: &place.name,
                    distance_km: distance,
                });
            }
        }
        best
    }
}

fn swiss_places() -> Vec<NamedPlace> {
    vec![
        NamedPlace::new("Zürich", 47.3769, 8.5417).with_aliases(&["Zurich", "Zuerich"]),
        NamedPlace::new("Genève", 46.2044, 6.1432).with_aliases(&["Geneva", "Genf", "Geneve"]),
        NamedPlace::new("Basel", 47.5596, 7.5886).with_aliases(&["Bâle"]),
        NamedPlace::new("Bern", 46.9480, 7.4474).with_aliases(&["Berne"]),
        NamedPlace::new("Lausanne", 46.5197, 6.6323),
        NamedPlace::new("Winterthur", 47.5001, 8.7502),
        NamedPlace::new("Luzern", 47.0502, 8.3093).with_aliases(&["Lucerne"]),
        NamedPlace::new("St. Gallen", 47.4245, 9.3767)
            .with_aliases(&["St Gallen", "Sankt Gallen"]),
        NamedPlace::new("Lugano", 46.0037, 8.9511),
        NamedPlace::new("Biel/Bienne", 47.1368, 7.2467).with_aliases(&["Biel", "Bienne"]),
        NamedPlace::new("Thun", 46.7580, 7.6280),
        NamedPlace::new("Fribourg", 46.8065, 7.1620).with_aliases(&["Freiburg"]),
        NamedPlace::new("Schaffhausen", 47.6970, 8.6340),
        NamedPlace::new("Chur", 46.8499, 9.5329),
        NamedPlace::new("Neuchâtel", 46.9900, 6.9293).with_aliases(&["Neuchatel"]),
        NamedPlace::new("Sion", 46.2331, 7.3606).with_aliases(&["Sitten"]),
        NamedPlace::new("Zug", 47.1662, 8.5155),
        NamedPlace::new("Aarau", 47.3925, 8.0442),
        NamedPlace::new("Solothurn", 47.2088, 7.5323),
        NamedPlace::new("Baden", 47.4733, 8.3059),
        NamedPlace::new("Olten", 47.3520, 7.9070),
        NamedPlace::new("Rapperswil", 47.2267, 8.8184),
        NamedPlace::new("Montreux", 46.4312, 6.9107),
        NamedPlace::new("Locarno", 46.1709, 8.7995),
        NamedPlace::new("Bellinzona", 46.1946, 9.0175),
        NamedPlace::new("Interlaken", 46.6863, 7.8632),
        NamedPlace::new("Zermatt", 46.0207, 7.7491),
        NamedPlace::new("Davos", 46.8027, 9.8360),
        NamedPlace::new("St. Moritz", 46.4908, 9.8355).with_aliases(&["St Moritz"]),
        NamedPlace::new("Grindelwald", 46.6242, 8.0414),
        NamedPlace::new("Engelberg", 46.8211, 8.4013),
        NamedPlace::new("Kreuzlingen", 47.6500, 9.1750),
        NamedPlace::new("Frauenfeld", 47.5536, 8.8987),
        NamedPlace::new("Yverdon-les-Bains", 46.7785, 6.6411).with_aliases(&["Yverdon"]),
        NamedPlace::new("Vevey", 46.4628, 6.8419),
        NamedPlace::new("Nyon", 46.3833, 6.2398),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_zurich_coordinate_resolves_to_zurich() {
        let gazetteer = Gazetteer::swiss();
        assert_eq!(gazetteer.nearest_place(47.3769, 8.5417), Some("Zürich"));
        let nearest = gazetteer
            .nearest_place_with_distance(47.3769, 8.5417)
            .expect("non-empty table");
        assert_eq!(nearest.distance_km, 0.0);
    }

    #[test]
    fn ties_go_to_the_first_listed_place() {
        let gazetteer = Gazetteer::new(vec![
            NamedPlace::new("West", 47.0, 7.9),
            NamedPlace::new("East", 47.0, 8.1),
        ]);
        assert_eq!(gazetteer.nearest_place(47.0, 8.0), Some("West"));

        let flipped = Gazetteer::new(vec![
            NamedPlace::new("East", 47.0, 8.1),
            NamedPlace::new("West", 47.0, 7.9),
        ]);
        assert_eq!(flipped.nearest_place(47.0, 8.0), Some("East"));
    }

    #[test]
    fn empty_table_has_no_nearest_place() {
        assert_eq!(Gazetteer::default().nearest_place(47.0, 8.0), None);
    }

    #[test]
    fn resolve_is_case_insensitive_and_knows_aliases() {
        let gazetteer = Gazetteer::swiss();
        assert_eq!(gazetteer.resolve("bern").map(|p| p.name.as_str()), Some("Bern"));
        assert_eq!(gazetteer.resolve("ZÜRICH").map(|p| p.name.as_str()), Some("Zürich"));
        assert_eq!(gazetteer.resolve("Geneva").map(|p| p.name.as_str()), Some("Genève"));
        assert!(gazetteer.resolve("Bernese Oberland").is_none());
        assert!(gazetteer.resolve("  ").is_none());
    }
}
