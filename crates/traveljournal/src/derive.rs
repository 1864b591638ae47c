//! Pure projections over a record snapshot.
//!
//! Every function here is synchronous and side-effect free apart from
//! logging. Dependents call them again whenever the live view publishes a new
//! snapshot.

use serde::Serialize;
use tracing::warn;

use crate::maps::Coordinates;
use crate::record::Record;

/// Keep records whose name contains `query`, ignoring case.
///
/// A blank query keeps everything.
#[must_use]
pub fn text_filter(records: &[Record], query: &str) -> Vec<Record> {
    if query.trim().is_empty() {
        return records.to_vec();
    }

    let needle = query.to_lowercase();
    records
        .iter()
        .filter(|r| r.name.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

/// Keep records explicitly marked favorite.
#[must_use]
pub fn favorite_filter(records: &[Record]) -> Vec<Record> {
    records
        .iter()
        .filter(|r| r.is_favorite == Some(true))
        .cloned()
        .collect()
}

/// Record counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Tally {
    /// All records.
    pub total: usize,
    /// Favorite records.
    pub favorites: usize,
}

/// Count all and favorite records.
#[must_use]
pub fn tally(records: &[Record]) -> Tally {
    Tally {
        total: records.len(),
        favorites: records.iter().filter(|r| r.is_favorite == Some(true)).count(),
    }
}

/// A titled group of records for list display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    /// Section heading.
    pub title: String,
    /// Records in display order.
    pub records: Vec<Record>,
}

/// Group records under one heading. No records means no sections.
#[must_use]
pub fn sectioned(title: &str, records: Vec<Record>) -> Vec<Section> {
    if records.is_empty() {
        return Vec::new();
    }
    vec![Section {
        title: title.to_string(),
        records,
    }]
}

/// A map pin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    /// Record key.
    pub id: String,
    /// Record name.
    pub name: String,
    /// Parsed position.
    pub position: Coordinates,
}

/// Build map markers, skipping records whose coordinates do not parse.
#[must_use]
pub fn markers(records: &[Record]) -> Vec<Marker> {
    records
        .iter()
        .filter_map(|r| match r.position() {
            Ok(position) => Some(Marker {
                id: r.id.clone(),
                name: r.name.clone(),
                position,
            }),
            Err(e) => {
                warn!(id = %r.id, coordinates = %r.coordinates, error = %e, "Skipping marker");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, name: &str, coordinates: &str, favorite: Option<bool>) -> Record {
        Record {
            id: id.to_string(),
            name: name.to_string(),
            coordinates: coordinates.to_string(),
            accuracy: Some("5 m".to_string()),
            is_favorite: favorite,
        }
    }

    fn bali() -> Vec<Record> {
        vec![
            record("a", "Kuta Beach", "-8.7180,115.1686", Some(true)),
            record("b", "Borobudur", "-7.6079,110.2038", None),
        ]
    }

    #[test]
    fn test_text_filter_is_case_insensitive_subset() {
        let records = bali();
        let kept = text_filter(&records, "BEACH");

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "Kuta Beach");
        assert!(kept.iter().all(|k| records.contains(k)));
    }

    #[test]
    fn test_text_filter_empty_query_is_identity() {
        let records = bali();
        assert_eq!(text_filter(&records, ""), records);
        assert_eq!(text_filter(&records, "   "), records);
    }

    #[test]
    fn test_text_filter_no_match() {
        assert!(text_filter(&bali(), "paris").is_empty());
    }

    #[test]
    fn test_favorite_filter_needs_explicit_true() {
        let records = vec![
            record("a", "A", "1,1", Some(true)),
            record("b", "B", "2,2", Some(false)),
            record("c", "C", "3,3", None),
        ];
        let kept = favorite_filter(&records);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "a");
    }

    #[test]
    fn test_kuta_borobudur_scenario() {
        let records = bali();

        let favorites = favorite_filter(&records);
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].name, "Kuta Beach");

        let search = text_filter(&records, "boro");
        assert_eq!(search.len(), 1);
        assert_eq!(search[0].name, "Borobudur");

        assert_eq!(
            tally(&records),
            Tally {
                total: 2,
                favorites: 1
            }
        );
        assert_eq!(markers(&records).len(), 2);
    }

    #[test]
    fn test_sectioned_hides_empty() {
        assert!(sectioned("Favorites", Vec::new()).is_empty());

        let sections = sectioned("Favorites", favorite_filter(&bali()));
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "Favorites");
        assert_eq!(sections[0].records.len(), 1);
    }

    #[test]
    fn test_markers_skip_unparseable_but_filters_keep_it() {
        crate::logging::init_test_logging();
        let mut records = bali();
        records.push(record("c", "Broken Pin", "not-a-number,also-not", Some(true)));

        let pins = markers(&records);
        assert_eq!(pins.len(), 2);
        assert!(pins.iter().all(|m| m.id != "c"));

        assert_eq!(text_filter(&records, "broken").len(), 1);
        assert_eq!(favorite_filter(&records).len(), 2);
    }

    #[test]
    fn test_marker_position() {
        let pins = markers(&bali());
        assert!((pins[0].position.latitude - -8.718).abs() < 1e-9);
        assert!((pins[0].position.longitude - 115.1686).abs() < 1e-9);
    }
}
