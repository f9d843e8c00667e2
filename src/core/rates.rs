//! Unit-cost rate table keyed by element category.
//!
//! Lookups never fail: a category that matches no entry resolves to the
//! default "Unclassified" rate.

use std::collections::{BTreeMap, HashMap};

/// Category name reported for elements without a matching rate.
pub const UNCLASSIFIED: &str = "Unclassified";

/// Unit cost applied to unclassified elements.
pub const DEFAULT_UNCLASSIFIED_RATE: f64 = 100.0;

/// Measure a category is priced by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    Volume,
    Area,
    Length,
    Count,
}

impl Measure {
    /// Unit label used in quantity strings.
    #[must_use]
    pub const fn unit(self) -> &'static str {
        match self {
            Self::Volume => "m³",
            Self::Area => "m²",
            Self::Length => "m",
            Self::Count => "ea",
        }
    }
}

/// One rate table entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Rate {
    /// Canonical category name.
    pub category: String,
    /// Currency per unit of `measure`.
    pub unit_cost: f64,
    /// Preferred measure for quantities of this category.
    pub measure: Measure,
}

/// Result of a rate lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateMatch<'a> {
    /// Canonical category, or [`UNCLASSIFIED`].
    pub category: &'a str,
    pub unit_cost: f64,
    pub measure: Measure,
    /// Whether a table entry matched.
    pub matched: bool,
}

const BUILTIN_RATES: &[(&str, f64, Measure)] = &[
    ("Wall", 180.0, Measure::Area),
    ("Curtain Wall", 650.0, Measure::Area),
    ("Door", 950.0, Measure::Count),
    ("Window", 720.0, Measure::Count),
    ("Floor", 120.0, Measure::Area),
    ("Slab", 145.0, Measure::Area),
    ("Roof", 160.0, Measure::Area),
    ("Ceiling", 75.0, Measure::Area),
    ("Column", 850.0, Measure::Volume),
    ("Beam", 780.0, Measure::Volume),
    ("Structural Framing", 780.0, Measure::Volume),
    ("Structural Foundation", 420.0, Measure::Volume),
    ("Footing", 420.0, Measure::Volume),
    ("Stair", 4500.0, Measure::Count),
    ("Railing", 210.0, Measure::Length),
    ("Furniture", 600.0, Measure::Count),
    ("Casework", 1100.0, Measure::Count),
    ("Plumbing Fixture", 1250.0, Measure::Count),
    ("Lighting Fixture", 320.0, Measure::Count),
    ("Mechanical Equipment", 5200.0, Measure::Count),
    ("Pipe", 95.0, Measure::Length),
    ("Duct", 110.0, Measure::Length),
];

/// Category-to-unit-cost table with a fallback rate.
#[derive(Debug, Clone)]
pub struct RateTable {
    entries: HashMap<String, Rate>,
    default_rate: f64,
}

impl RateTable {
    /// Table with the built-in construction rates.
    #[must_use]
    pub fn builtin() -> Self {
        let entries = BUILTIN_RATES
            .iter()
            .map(|(category, unit_cost, measure)| {
                (
                    normalize_key(category),
                    Rate {
                        category: (*category).to_string(),
                        unit_cost: *unit_cost,
                        measure: *measure,
                    },
                )
            })
            .collect();
        Self {
            entries,
            default_rate: DEFAULT_UNCLASSIFIED_RATE,
        }
    }

    /// Empty table that prices everything at `default_rate`.
    #[must_use]
    pub fn empty(default_rate: f64) -> Self {
        Self {
            entries: HashMap::new(),
            default_rate,
        }
    }

    /// Apply configured overrides. Known categories keep their measure;
    /// new categories are priced per item.
    #[must_use]
    pub fn with_overrides(
        mut self,
        overrides: &BTreeMap<String, f64>,
        default_rate: Option<f64>,
    ) -> Self {
        for (category, unit_cost) in overrides {
            let candidates = candidate_keys(category);
            let existing = candidates.iter().find(|k| self.entries.contains_key(*k)).cloned();
            if let Some(rate) = existing.and_then(|k| self.entries.get_mut(&k)) {
                rate.unit_cost = *unit_cost;
            } else {
                self.entries.insert(
                    normalize_key(category),
                    Rate {
                        category: category.trim().to_string(),
                        unit_cost: *unit_cost,
                        measure: Measure::Count,
                    },
                );
            }
        }
        if let Some(rate) = default_rate {
            self.default_rate = rate;
        }
        self
    }

    /// Rate applied to unrecognized categories.
    #[must_use]
    pub const fn default_rate(&self) -> f64 {
        self.default_rate
    }

    /// Number of known categories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the rate for a raw category name as it appears in a model.
    ///
    /// Matching is case-insensitive and ignores `Revit `/`Ifc` prefixes,
    /// an `IfcXxxStandardCase` suffix, and plural forms.
    #[must_use]
    pub fn lookup(&self, raw: &str) -> RateMatch<'_> {
        for key in candidate_keys(raw) {
            if let Some(rate) = self.entries.get(&key) {
                return RateMatch {
                    category: &rate.category,
                    unit_cost: rate.unit_cost,
                    measure: rate.measure,
                    matched: true,
                };
            }
        }
        RateMatch {
            category: UNCLASSIFIED,
            unit_cost: self.default_rate,
            measure: Measure::Count,
            matched: false,
        }
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Lowercase and collapse separators so "Plumbing_Fixtures" and
/// "plumbing fixtures" compare equal.
fn normalize_key(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn candidate_keys(raw: &str) -> Vec<String> {
    let mut base = normalize_key(raw);
    if let Some(rest) = base.strip_prefix("revit ") {
        base = rest.to_string();
    }
    if base.starts_with("ifc") && base.len() > 3 {
        base = base[3..].trim_start().to_string();
    }
    if let Some(rest) = base.strip_suffix("standardcase") {
        base = rest.trim_end().to_string();
    }

    let mut keys = vec![base.clone()];
    if let Some(stem) = base.strip_suffix("ies") {
        keys.push(format!("{stem}y"));
    }
    if let Some(stem) = base.strip_suffix("es") {
        keys.push(stem.to_string());
    }
    if let Some(stem) = base.strip_suffix('s') {
        keys.push(stem.to_string());
    }
    // IFC names run words together: "ifcplumbingfixture" vs "plumbing fixture".
    keys.push(base.replace(' ', ""));
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let table = RateTable::builtin();
        let m = table.lookup("WALL");
        assert!(m.matched);
        assert_eq!(m.category, "Wall");
        assert_eq!(m.measure, Measure::Area);
    }

    #[test]
    fn lookup_tolerates_plurals_and_prefixes() {
        let table = RateTable::builtin();
        assert_eq!(table.lookup("Walls").category, "Wall");
        assert_eq!(table.lookup("Revit Doors").category, "Door");
        assert_eq!(table.lookup("Stairs").category, "Stair");
        assert_eq!(table.lookup("Plumbing Fixtures").category, "Plumbing Fixture");
        assert_eq!(table.lookup("Structural_Framing").category, "Structural Framing");
    }

    #[test]
    fn lookup_understands_ifc_type_names() {
        let table = RateTable::builtin();
        assert_eq!(table.lookup("IfcWallStandardCase").category, "Wall");
        assert_eq!(table.lookup("IfcSlab").category, "Slab");
        assert_eq!(table.lookup("IfcDoor").category, "Door");
    }

    #[test]
    fn unknown_category_falls_back() {
        let table = RateTable::builtin();
        let m = table.lookup("Entourage");
        assert!(!m.matched);
        assert_eq!(m.category, UNCLASSIFIED);
        assert!((m.unit_cost - DEFAULT_UNCLASSIFIED_RATE).abs() < f64::EPSILON);
        assert_eq!(table.lookup("").category, UNCLASSIFIED);
    }

    #[test]
    fn overrides_replace_cost_but_keep_measure() {
        let mut overrides = BTreeMap::new();
        overrides.insert("walls".to_string(), 200.0);
        overrides.insert("Solar Panel".to_string(), 400.0);
        let table = RateTable::builtin().with_overrides(&overrides, Some(50.0));

        let wall = table.lookup("Wall");
        assert!((wall.unit_cost - 200.0).abs() < f64::EPSILON);
        assert_eq!(wall.measure, Measure::Area);

        let panel = table.lookup("solar panels");
        assert_eq!(panel.category, "Solar Panel");
        assert_eq!(panel.measure, Measure::Count);

        assert!((table.lookup("unknown").unit_cost - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_table_prices_everything_at_default() {
        let table = RateTable::empty(42.0);
        assert!(table.is_empty());
        assert!((table.lookup("Wall").unit_cost - 42.0).abs() < f64::EPSILON);
    }
}
