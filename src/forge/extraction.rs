//! Element extraction from a translated model.
//!
//! Reads the object tree and the property database of the first 3D view,
//! then maps every leaf object to an [`ElementRecord`]. The remote data is
//! fetched once into an [`ElementBatch`]; records are derived lazily from
//! the batch and can be re-derived any number of times.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::client::ForgeClient;
use crate::core::http::{DEFAULT_TIMEOUT, ensure_success, send_error};
use crate::core::models::{ElementRecord, Quantity, TranslationJob};
use crate::core::rates::{Measure, RateTable};
use crate::error::{BimcostError, Result};

static QUANTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(-?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?)\s*([A-Za-z]*)\s*(?:\^?\s*([23²³]))?").unwrap()
});

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct MetadataResponse {
    data: MetadataData,
}

#[derive(Debug, Deserialize)]
struct MetadataData {
    #[serde(default)]
    metadata: Vec<ViewMetadata>,
}

#[derive(Debug, Deserialize)]
struct ViewMetadata {
    guid: String,
    #[serde(default)]
    role: String,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    data: TreeData,
}

#[derive(Debug, Deserialize)]
struct TreeData {
    #[serde(default)]
    objects: Vec<TreeNode>,
}

/// Node of the model's object hierarchy.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeNode {
    pub objectid: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub objects: Vec<TreeNode>,
}

#[derive(Debug, Deserialize)]
struct PropertiesResponse {
    data: PropertiesData,
}

#[derive(Debug, Deserialize)]
struct PropertiesData {
    #[serde(default)]
    collection: Vec<PropertyEntry>,
}

/// Property groups for one object, as returned by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct PropertyEntry {
    pub objectid: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "externalId")]
    pub external_id: Option<String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

// =============================================================================
// Parsed Properties
// =============================================================================

/// The handful of properties that drive costing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementProperties {
    pub external_id: Option<String>,
    pub category: Option<String>,
    pub volume: Option<f64>,
    pub area: Option<f64>,
    pub length: Option<f64>,
}

impl ElementProperties {
    /// Pick the values of interest out of the grouped property map.
    #[must_use]
    pub fn from_entry(entry: &PropertyEntry) -> Self {
        let mut props = Self {
            external_id: entry.external_id.clone(),
            ..Self::default()
        };

        for group in entry.properties.values() {
            let Some(fields) = group.as_object() else {
                continue;
            };
            for (key, value) in fields {
                match key.as_str() {
                    "Category" => {
                        if let Some(s) = value.as_str() {
                            props.category.get_or_insert_with(|| strip_category(s));
                        }
                    }
                    "IfcClass" | "IFC Type" | "Type" | "Entity" => {
                        if let Some(s) = value.as_str().and_then(ifc_category) {
                            props.category.get_or_insert(s);
                        }
                    }
                    "Volume" => set_measure(&mut props.volume, value, 3),
                    "Area" => set_measure(&mut props.area, value, 2),
                    "Length" => set_measure(&mut props.length, value, 1),
                    _ => {}
                }
            }
        }
        props
    }

    /// Quantity for an element priced by `preferred`, falling back through
    /// volume, area, length, and finally a count of one. Counted categories
    /// are always one item.
    #[must_use]
    pub fn quantity(&self, preferred: Measure) -> Quantity {
        if preferred == Measure::Count {
            return Quantity::each();
        }
        let pick = |m: Measure| match m {
            Measure::Volume => self.volume,
            Measure::Area => self.area,
            Measure::Length => self.length,
            Measure::Count => None,
        };
        std::iter::once(preferred)
            .chain([Measure::Volume, Measure::Area, Measure::Length])
            .find_map(|m| pick(m).filter(|v| *v > 0.0).map(|v| Quantity::new(v, m.unit())))
            .unwrap_or_else(Quantity::each)
    }
}

fn set_measure(slot: &mut Option<f64>, value: &Value, dimension: i32) {
    if slot.is_none() {
        *slot = parse_measure(value, dimension);
    }
}

/// "Revit Walls" → "Walls".
fn strip_category(raw: &str) -> String {
    raw.trim()
        .strip_prefix("Revit ")
        .unwrap_or_else(|| raw.trim())
        .to_string()
}

/// "IfcWallStandardCase" → "WallStandardCase"; non-IFC names → `None`.
fn ifc_category(raw: &str) -> Option<String> {
    let rest = raw.trim().strip_prefix("Ifc")?;
    (!rest.is_empty()).then(|| rest.to_string())
}

/// Parse a measured value in metric base units.
///
/// Accepts bare numbers (assumed already in metres) and strings such as
/// "12.5 m^2", "3.2 m³", "5000 mm", "120 ft^2". `dimension` is the power the
/// length unit is raised to (1 length, 2 area, 3 volume).
#[must_use]
pub fn parse_measure(value: &Value, dimension: i32) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let caps = QUANTITY_RE.captures(s)?;
            let amount: f64 = caps.get(1)?.as_str().parse().ok()?;
            let unit = caps.get(2).map_or("", |m| m.as_str());
            let factor = unit_factor(unit)?;
            Some(amount * factor.powi(dimension))
        }
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Metres per unit for a length unit label.
fn unit_factor(unit: &str) -> Option<f64> {
    match unit.to_lowercase().as_str() {
        "" | "m" | "meter" | "meters" | "metre" | "metres" => Some(1.0),
        "mm" | "millimeter" | "millimeters" => Some(0.001),
        "cm" | "centimeter" | "centimeters" => Some(0.01),
        "ft" | "feet" | "foot" => Some(0.3048),
        "in" | "inch" | "inches" => Some(0.0254),
        _ => None,
    }
}

// =============================================================================
// Element Batch
// =============================================================================

/// Leaf object paired with its first-level category.
#[derive(Debug, Clone, PartialEq)]
struct Leaf {
    objectid: i64,
    name: String,
    tree_category: String,
}

/// Snapshot of one model's elements.
///
/// Immutable once built; re-extraction builds a new batch.
#[derive(Debug, Clone)]
pub struct ElementBatch {
    urn: String,
    leaves: Vec<Leaf>,
    properties: HashMap<i64, ElementProperties>,
}

impl ElementBatch {
    /// Build from the object tree and property collection.
    #[must_use]
    pub fn from_parts(urn: impl Into<String>, roots: &[TreeNode], entries: &[PropertyEntry]) -> Self {
        let mut leaves = Vec::new();
        for root in roots {
            // The tree root is the model; its children are categories.
            if root.objects.is_empty() {
                collect_leaves(root, &root.name, &mut leaves);
            }
            for category in &root.objects {
                collect_leaves(category, &category.name, &mut leaves);
            }
        }
        let properties = entries
            .iter()
            .map(|e| (e.objectid, ElementProperties::from_entry(e)))
            .collect();
        Self {
            urn: urn.into(),
            leaves,
            properties,
        }
    }

    #[must_use]
    pub fn urn(&self) -> &str {
        &self.urn
    }

    /// Number of leaf elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Lazily derive records in tree order. Calling again restarts from the
    /// first element and yields the same sequence.
    pub fn records<'a>(&'a self, rates: &'a RateTable) -> impl Iterator<Item = ElementRecord> + 'a {
        self.leaves.iter().map(move |leaf| {
            let props = self.properties.get(&leaf.objectid);
            let raw_category = props
                .and_then(|p| p.category.as_deref())
                .unwrap_or(&leaf.tree_category);
            let rate = rates.lookup(raw_category);
            let quantity = props.map_or_else(Quantity::each, |p| p.quantity(rate.measure));
            let element_id = props
                .and_then(|p| p.external_id.clone())
                .unwrap_or_else(|| leaf.objectid.to_string());
            ElementRecord::new(element_id, rate.category, leaf.name.clone(), quantity, rate.unit_cost)
        })
    }
}

fn collect_leaves(node: &TreeNode, category: &str, out: &mut Vec<Leaf>) {
    if node.objects.is_empty() {
        out.push(Leaf {
            objectid: node.objectid,
            name: node.name.clone(),
            tree_category: category.to_string(),
        });
        return;
    }
    for child in &node.objects {
        collect_leaves(child, category, out);
    }
}

// =============================================================================
// Remote Fetch
// =============================================================================

impl ForgeClient {
    /// Fetch the element data for a successfully translated model.
    ///
    /// # Errors
    ///
    /// - `NotReady` without any network call when the job is not `Success`
    /// - `ForgeApi` with status 202 while the property database is still
    ///   being prepared (retryable)
    /// - `Credential`, `Network`, `ParseResponse` otherwise
    pub async fn extract_elements(&self, job: &TranslationJob) -> Result<ElementBatch> {
        if !job.is_ready() {
            return Err(BimcostError::NotReady {
                urn: job.urn.clone(),
                status: job.status.to_string(),
            });
        }

        let urn = &job.urn;
        let bearer = self.tokens().bearer().await?;
        let base = format!("/modelderivative/v2/designdata/{urn}/metadata");

        let metadata: MetadataResponse = self.get_model_json(&base, &bearer, "metadata").await?;
        let view = metadata
            .data
            .metadata
            .iter()
            .find(|m| m.role.eq_ignore_ascii_case("3d"))
            .or_else(|| metadata.data.metadata.first())
            .ok_or_else(|| {
                BimcostError::ParseResponse(format!("model {urn} has no viewable to query"))
            })?;

        let tree: TreeResponse = self
            .get_model_json(&format!("{base}/{}", view.guid), &bearer, "object tree")
            .await?;
        let props: PropertiesResponse = self
            .get_model_json(&format!("{base}/{}/properties", view.guid), &bearer, "properties")
            .await?;

        let batch = ElementBatch::from_parts(urn.as_str(), &tree.data.objects, &props.data.collection);
        tracing::info!(urn = %urn, elements = batch.len(), "Extracted model elements");
        Ok(batch)
    }

    async fn get_model_json<T: DeserializeOwned>(
        &self,
        path: &str,
        bearer: &str,
        operation: &str,
    ) -> Result<T> {
        let response = self
            .http()
            .get(self.url(path))
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|e| send_error(&e, DEFAULT_TIMEOUT))?;

        if response.status().as_u16() == 202 {
            return Err(BimcostError::ForgeApi {
                operation: operation.to_string(),
                status_code: 202,
                message: "model data is still being prepared".to_string(),
            });
        }

        ensure_success(response, operation)
            .await?
            .json()
            .await
            .map_err(|e| BimcostError::ParseResponse(format!("{operation}: {e}")))
    }
}
