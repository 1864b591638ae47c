//! Text and JSON rendering of derived views.

use std::fmt::Write as _;

use serde::Serialize;

use super::OutputFormat;
use crate::derive::{Marker, Section, Tally};
use crate::expense::{total, Expense};
use crate::maps::RoutePlan;
use crate::Result;

/// Shown when a list has no sections.
pub const EMPTY_LOCATIONS: &str = "No locations saved yet.";

/// Shown when a search has no results.
pub const NO_MATCHES: &str = "No locations match your search.";

/// Shown when the expense ledger is empty.
pub const EMPTY_EXPENSES: &str = "No expenses recorded yet.";

fn json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Render record sections. `empty` is printed when there are none.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn sections(sections: &[Section], format: OutputFormat, empty: &str) -> Result<String> {
    if format == OutputFormat::Json {
        return json(sections);
    }
    if sections.is_empty() {
        return Ok(format!("{empty}\n"));
    }

    let mut out = String::new();
    for section in sections {
        let _ = writeln!(out, "{} ({})", section.title, section.records.len());
        match format {
            OutputFormat::Table => {
                let name_width = section
                    .records
                    .iter()
                    .map(|r| r.name.chars().count())
                    .max()
                    .unwrap_or(0)
                    .max("NAME".len());
                let _ = writeln!(
                    out,
                    "{:<20}  {:<name_width$}  {:<24}  {:<10}  FAV",
                    "ID", "NAME", "COORDINATES", "ACCURACY"
                );
                for r in &section.records {
                    let _ = writeln!(
                        out,
                        "{:<20}  {:<name_width$}  {:<24}  {:<10}  {}",
                        r.id,
                        r.name,
                        r.coordinates,
                        r.accuracy.as_deref().unwrap_or("-"),
                        if r.favorite() { "*" } else { "" }
                    );
                }
            }
            OutputFormat::Plain | OutputFormat::Json => {
                for r in &section.records {
                    let star = if r.favorite() { " *" } else { "" };
                    let _ = writeln!(out, "  {}{star}", r.name);
                    let _ = writeln!(out, "    {}  [{}]", r.coordinates, r.id);
                }
            }
        }
        out.push('\n');
    }
    Ok(out)
}

/// Render record counts.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn tally(tally: &Tally, as_json: bool) -> Result<String> {
    if as_json {
        return json(tally);
    }
    Ok(format!(
        "Locations: {}\nFavorites: {}\n",
        tally.total, tally.favorites
    ))
}

/// Render map markers.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn markers(markers: &[Marker], format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return json(markers);
    }
    if markers.is_empty() {
        return Ok(format!("{EMPTY_LOCATIONS}\n"));
    }

    let mut out = String::new();
    for m in markers {
        let _ = writeln!(
            out,
            "{:>11.6} {:>11.6}  {}  [{}]",
            m.position.latitude, m.position.longitude, m.name, m.id
        );
    }
    Ok(out)
}

/// Render a directions link and an optional route plan.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn route(url: &str, plan: Option<&RoutePlan>, as_json: bool) -> Result<String> {
    if as_json {
        return json(&serde_json::json!({ "url": url, "plan": plan }));
    }

    let mut out = format!("{url}\n");
    if let Some(plan) = plan {
        if plan.straight_line {
            out.push_str("Route: straight line (no route available)\n");
        } else {
            let _ = writeln!(
                out,
                "Route: {} points, {}, {}",
                plan.path.len(),
                plan.distance.as_deref().unwrap_or("unknown distance"),
                plan.duration.as_deref().unwrap_or("unknown duration")
            );
        }
    }
    Ok(out)
}

/// Render the expense ledger with its total.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn expenses(expenses: &[Expense], format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return json(expenses);
    }
    if expenses.is_empty() {
        return Ok(format!("{EMPTY_EXPENSES}\n"));
    }

    let mut out = String::new();
    for e in expenses {
        let _ = writeln!(out, "{}  {:>12.2}  {}", e.date, e.amount, e.description);
    }
    let _ = writeln!(out, "{:<10}  {:>12.2}", "Total", total(expenses));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::{markers as derive_markers, sectioned};
    use crate::record::Record;

    fn kuta() -> Record {
        Record {
            id: "-Nabc".to_string(),
            name: "Kuta Beach".to_string(),
            coordinates: "-8.718,115.1686".to_string(),
            accuracy: Some("5 m".to_string()),
            is_favorite: Some(true),
        }
    }

    #[test]
    fn test_empty_sections_show_message() {
        let out = sections(&[], OutputFormat::Plain, EMPTY_LOCATIONS).unwrap();
        assert_eq!(out.trim(), EMPTY_LOCATIONS);
    }

    #[test]
    fn test_plain_sections() {
        let out = sections(
            &sectioned("Favorites", vec![kuta()]),
            OutputFormat::Plain,
            EMPTY_LOCATIONS,
        )
        .unwrap();
        assert!(out.starts_with("Favorites (1)\n"));
        assert!(out.contains("Kuta Beach *"));
        assert!(out.contains("[-Nabc]"));
    }

    #[test]
    fn test_table_sections_have_header() {
        let out = sections(
            &sectioned("Locations", vec![kuta()]),
            OutputFormat::Table,
            EMPTY_LOCATIONS,
        )
        .unwrap();
        assert!(out.contains("COORDINATES"));
        assert!(out.contains("5 m"));
    }

    #[test]
    fn test_json_sections() {
        let out = sections(
            &sectioned("Locations", vec![kuta()]),
            OutputFormat::Json,
            EMPTY_LOCATIONS,
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value[0]["title"], "Locations");
        assert_eq!(value[0]["records"][0]["isFavorite"], true);
    }

    #[test]
    fn test_tally_plain() {
        let out = tally(&Tally { total: 2, favorites: 1 }, false).unwrap();
        assert_eq!(out, "Locations: 2\nFavorites: 1\n");
    }

    #[test]
    fn test_markers_plain() {
        let out = markers(&derive_markers(&[kuta()]), OutputFormat::Plain).unwrap();
        assert!(out.contains("-8.718000"));
        assert!(out.contains("Kuta Beach"));
    }

    #[test]
    fn test_route_straight_line() {
        let plan = RoutePlan::straight(
            crate::maps::Coordinates::new(0.0, 0.0),
            crate::maps::Coordinates::new(1.0, 1.0),
        );
        let out = route("https://example.test", Some(&plan), false).unwrap();
        assert!(out.contains("straight line"));
    }

    #[test]
    fn test_expenses_total_line() {
        let list = vec![Expense {
            id: "a".to_string(),
            description: "Lunch".to_string(),
            amount: 12.5,
            date: "2026-10-17".to_string(),
        }];
        let out = expenses(&list, OutputFormat::Plain).unwrap();
        assert!(out.contains("Lunch"));
        assert!(out.lines().last().unwrap().contains("12.50"));
    }
}
