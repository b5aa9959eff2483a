//! Shaping of prediction service responses into display data.
//!
//! Everything here is pure: a [`PredictionResponse`] goes in, a
//! [`ShapedResults`] comes out, and the shaped value is rebuilt from scratch
//! every time a new response arrives.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Placeholder identifiers the service emits for blank inputs start with this
const EMPTY_INPUT_PREFIX: &str = "EMPTY_INPUT_";
const EMPTY_INPUT_DISPLAY: &str = "(Empty Input)";
const NOT_APPLICABLE: &str = "N/A";

/// Response body of the prediction service
///
/// `classification_results` keeps the key order of the JSON document, which
/// is the order compounds were submitted in. Regression entries and batch
/// errors are read leniently: a malformed entry degrades that one row, never
/// the whole response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictionResponse {
    #[serde(default)]
    pub classification_results: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regression_results: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_processing_errors: Option<Vec<BatchProcessingError>>,

    /// Set by the service when the whole batch failed
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<String>,
}

impl PredictionResponse {
    /// Batch-level error message, if the service reported one
    pub fn service_error(&self) -> Option<&str> {
        self.error.as_deref().filter(|message| !message.is_empty())
    }

    /// Regression output for one identifier, if the service sent an object
    pub fn regression(&self, identifier: &str) -> Option<RegressionEntry> {
        self.regression_results
            .as_ref()
            .and_then(|results| results.get(identifier))
            .and_then(RegressionEntry::from_value)
    }
}

/// AC50 regression output for one activator
///
/// Bounds that are missing or not numbers are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegressionEntry {
    pub median: Option<f64>,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
    pub error: Option<String>,
}

impl RegressionEntry {
    fn from_value(value: &Value) -> Option<RegressionEntry> {
        let fields = value.as_object()?;
        let number = |key: &str| fields.get(key).and_then(Value::as_f64);

        Some(RegressionEntry {
            median: number("regression_AC50_median"),
            lower_bound: number("regression_AC50_lower_bound"),
            upper_bound: number("regression_AC50_upper_bound"),
            error: fields.get("error").and_then(value_text),
        })
    }

    fn failure(&self) -> Option<&str> {
        self.error.as_deref().filter(|message| !message.is_empty())
    }

    fn range(&self) -> Option<Ac50Range> {
        Some(Ac50Range {
            median: self.median?,
            lower: self.lower_bound?,
            upper: self.upper_bound?,
        })
    }
}

/// One entry of `batch_processing_errors`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchProcessingError {
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub smiles: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub input_smiles: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<String>,
}

/// Accept any JSON value where text is expected; `null` reads as absent
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(|value| value_text(&value))
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        other => Some(label_text(other)),
    }
}

/// Modulator categories, declared in display priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Activator,
    Inhibitor,
    Decoy,
    Error,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Activator,
        Category::Inhibitor,
        Category::Decoy,
        Category::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Activator => "Activator",
            Category::Inhibitor => "Inhibitor",
            Category::Decoy => "Decoy",
            Category::Error => "Error",
        }
    }

    /// Exact match of a service label
    pub fn from_label(label: &str) -> Option<Category> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == label)
    }

    /// Bucket a label is counted in: exact match, then anything mentioning
    /// "error", then Decoy for whatever is left.
    pub fn bucket(label: &str) -> Category {
        Category::from_label(label).unwrap_or_else(|| {
            if label.to_lowercase().contains("error") {
                Category::Error
            } else {
                Category::Decoy
            }
        })
    }

    /// Sort rank of a label; unrecognized labels sort after every category
    fn rank(label: &str) -> usize {
        match Category::from_label(label) {
            Some(category) => category as usize,
            None if label.to_lowercase().contains("error") => Category::Error as usize,
            None => Category::ALL.len(),
        }
    }
}

/// Predicted AC50 median and confidence bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Ac50Range {
    pub median: f64,
    pub lower: f64,
    pub upper: f64,
}

impl Ac50Range {
    pub fn display(&self) -> String {
        format!(
            "Median: {:.2}; Range: [ {:.2} - {:.2} ]",
            round2(self.median),
            round2(self.lower),
            round2(self.upper)
        )
    }
}

/// One line of the results table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayRow {
    pub identifier: String,
    pub category: String,
    pub range_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_range: Option<Ac50Range>,
}

/// Number of compounds per category; empty buckets are never stored
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CategoryCounts(BTreeMap<Category, usize>);

impl CategoryCounts {
    pub fn get(&self, category: Category) -> usize {
        self.0.get(&category).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, usize)> + '_ {
        self.0.iter().map(|(category, count)| (*category, *count))
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> FromIterator<&'a str> for CategoryCounts {
    fn from_iter<I: IntoIterator<Item = &'a str>>(labels: I) -> Self {
        let mut counts = BTreeMap::new();
        for label in labels {
            *counts.entry(Category::bucket(label)).or_insert(0) += 1;
        }
        CategoryCounts(counts)
    }
}

/// Point of the activator AC50 range series, values rounded to 2 decimals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivatorRange {
    /// 1-based position among plotted activators
    pub index: usize,
    pub identifier: String,
    pub range: [f64; 2],
    pub median: f64,
}

/// Compound the service could not process, reported alongside the batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchError {
    pub input: String,
    pub error: String,
}

/// Everything derived from one prediction response
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShapedResults {
    pub rows: Vec<DisplayRow>,
    pub counts: CategoryCounts,
    pub activator_ranges: Vec<ActivatorRange>,
    pub batch_errors: Vec<BatchError>,
}

impl ShapedResults {
    /// Derive table rows, category counts and the activator series
    ///
    /// Rows are ordered Activator, Inhibitor, Decoy, error labels, then any
    /// other label; ties keep the order of the response.
    ///
    /// # Examples
    /// ```
    /// use pkm2pred::results::{PredictionResponse, ShapedResults};
    ///
    /// let response: PredictionResponse = serde_json::from_str(
    ///     r#"{"classification_results": {"CCO": "Decoy", "CCN": "Activator"}}"#,
    /// ).unwrap();
    /// let shaped = ShapedResults::from_response(&response);
    /// assert_eq!(shaped.rows[0].identifier, "CCN");
    /// assert_eq!(shaped.rows[0].range_text, "N/A");
    /// ```
    pub fn from_response(response: &PredictionResponse) -> ShapedResults {
        let labelled: Vec<(&String, String)> = response
            .classification_results
            .iter()
            .map(|(identifier, value)| (identifier, label_text(value)))
            .collect();

        let mut rows: Vec<DisplayRow> = labelled
            .iter()
            .map(|(identifier, label)| {
                let (range_text, raw_range) = range_for(label, response.regression(identifier));
                DisplayRow {
                    identifier: display_identifier(identifier),
                    category: label.clone(),
                    range_text,
                    raw_range,
                }
            })
            .collect();
        rows.sort_by_key(|row| Category::rank(&row.category));

        let counts: CategoryCounts = labelled
            .iter()
            .map(|(_, label)| label.as_str())
            .collect();

        let activator_ranges = rows
            .iter()
            .filter(|row| row.category == Category::Activator.as_str())
            .filter_map(|row| row.raw_range.map(|range| (row, range)))
            .enumerate()
            .map(|(position, (row, range))| ActivatorRange {
                index: position + 1,
                identifier: row.identifier.clone(),
                range: [round2(range.lower), round2(range.upper)],
                median: round2(range.median),
            })
            .collect();

        let batch_errors = response
            .batch_processing_errors
            .iter()
            .flatten()
            .map(|failure| BatchError {
                input: failure
                    .smiles
                    .clone()
                    .or_else(|| failure.input_smiles.clone())
                    .unwrap_or_else(|| "(unknown)".to_string()),
                error: failure.error.clone().unwrap_or_default(),
            })
            .collect();

        ShapedResults {
            rows,
            counts,
            activator_ranges,
            batch_errors,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.batch_errors.is_empty()
    }
}

fn label_text(value: &Value) -> String {
    match value {
        Value::String(label) => label.clone(),
        other => other.to_string(),
    }
}

fn display_identifier(identifier: &str) -> String {
    if identifier.starts_with(EMPTY_INPUT_PREFIX) {
        EMPTY_INPUT_DISPLAY.to_string()
    } else {
        identifier.to_string()
    }
}

fn range_for(label: &str, entry: Option<RegressionEntry>) -> (String, Option<Ac50Range>) {
    let entry = match entry {
        Some(entry) if label == Category::Activator.as_str() => entry,
        _ => return (NOT_APPLICABLE.to_string(), None),
    };

    if let Some(message) = entry.failure() {
        return (message.to_string(), None);
    }
    match entry.range() {
        Some(range) => (range.display(), Some(range)),
        None => (NOT_APPLICABLE.to_string(), None),
    }
}

/// Round to 2 decimals, halves away from zero
///
/// Both the range text and the plotted series go through this, so printed
/// and plotted values agree.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
