//! Canonical Definitions
//!
//! Feature, rule and experiment shapes as stored upstream, and the
//! read-only catalog mapping client keys to definition sets.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::walk::{resolve_saved_groups, resolve_saved_groups_in};
use crate::error::CatalogError;

/// Saved-group id to ordered member identifiers.
pub type IdLists = BTreeMap<String, Vec<String>>;

/// Feature key to definition. Ordered so serialized payloads are stable.
pub type FeatureMap = BTreeMap<String, FeatureDefinition>;

// == Feature Definition ==
/// A feature flag: its default value and ordered targeting rules.
///
/// Fields outside `defaultValue`/`rules` (project, tags, ...) are carried in
/// `extra` so lenient SDKs can receive them untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDefinition {
    #[serde(rename = "defaultValue", default)]
    pub default_value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Rule>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FeatureDefinition {
    pub fn new(default_value: Value) -> Self {
        Self {
            default_value,
            rules: None,
            extra: Map::new(),
        }
    }

    /// True when any rule carries a prerequisite marked as a gate.
    pub fn has_gating_prerequisite(&self) -> bool {
        self.rules
            .iter()
            .flatten()
            .any(Rule::has_gating_prerequisite)
    }

    /// Drops every field outside the strict feature shape.
    pub fn retain_strict_fields(&mut self) {
        self.extra.clear();
    }

    pub(crate) fn resolve_saved_groups(&mut self, id_lists: &IdLists) {
        resolve_saved_groups(&mut self.default_value, id_lists);
        for rule in self.rules.iter_mut().flatten() {
            resolve_saved_groups_in(&mut rule.0, id_lists);
        }
        resolve_saved_groups_in(&mut self.extra, id_lists);
    }
}

// == Rule ==
/// A single targeting rule, kept as an open field map so the scrubber can
/// prune it by key tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rule(Map<String, Value>);

impl Rule {
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn parent_conditions(&self) -> &[Value] {
        match self.0.get("parentConditions") {
            Some(Value::Array(conditions)) => conditions,
            _ => &[],
        }
    }

    pub fn has_parent_conditions(&self) -> bool {
        !self.parent_conditions().is_empty()
    }

    pub fn has_gating_prerequisite(&self) -> bool {
        self.parent_conditions()
            .iter()
            .any(|condition| condition.get("gate").is_some_and(is_truthy))
    }

    /// Keeps only the fields named in `allowed`.
    pub fn retain_keys(&mut self, allowed: &BTreeSet<&str>) {
        self.0.retain(|key, _| allowed.contains(key.as_str()));
    }
}

impl From<Map<String, Value>> for Rule {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

// == Experiment ==
/// An auto-applied experiment (visual editor or URL redirect).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    #[serde(rename = "changeType", default, skip_serializing_if = "Option::is_none")]
    pub change_type: Option<String>,
    #[serde(
        rename = "parentConditions",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_conditions: Option<Value>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Experiment {
    pub fn is_redirect(&self) -> bool {
        self.change_type.as_deref() == Some("redirect")
    }

    /// Only a non-empty array counts, matching [`Rule::parent_conditions`].
    pub fn has_parent_conditions(&self) -> bool {
        matches!(&self.parent_conditions, Some(Value::Array(conditions)) if !conditions.is_empty())
    }

    pub(crate) fn resolve_saved_groups(&mut self, id_lists: &IdLists) {
        if let Some(conditions) = self.parent_conditions.as_mut() {
            resolve_saved_groups(conditions, id_lists);
        }
        resolve_saved_groups_in(&mut self.fields, id_lists);
    }
}

// == Definition Set ==
/// Everything the canonical store publishes for one client key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefinitionSet {
    #[serde(default)]
    pub features: FeatureMap,
    #[serde(default)]
    pub experiments: Vec<Experiment>,
    #[serde(rename = "savedGroups", default)]
    pub id_lists: IdLists,
    #[serde(rename = "dateUpdated", default, skip_serializing_if = "Option::is_none")]
    pub date_updated: Option<String>,
}

// == Definition Catalog ==
/// Read-only lookup of definition sets by client key.
#[derive(Debug, Clone, Default)]
pub struct DefinitionCatalog {
    sets: HashMap<String, DefinitionSet>,
}

impl DefinitionCatalog {
    pub fn new(sets: HashMap<String, DefinitionSet>) -> Self {
        Self { sets }
    }

    /// Loads a `{ "<clientKey>": DefinitionSet }` JSON document.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        Ok(Self::new(serde_json::from_str(raw)?))
    }

    pub fn get(&self, client_key: &str) -> Option<&DefinitionSet> {
        self.sets.get(client_key)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// JavaScript-style truthiness, as SDKs evaluate the `gate` flag.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(value: Value) -> Rule {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_feature_keeps_unknown_fields_in_extra() {
        let feature: FeatureDefinition = serde_json::from_value(json!({
            "defaultValue": true,
            "project": "checkout",
            "rules": [{ "key": "r1", "force": false }]
        }))
        .unwrap();

        assert_eq!(feature.default_value, json!(true));
        assert_eq!(feature.extra.get("project"), Some(&json!("checkout")));
        assert_eq!(feature.rules.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_gating_detection_uses_truthiness() {
        assert!(rule(json!({ "parentConditions": [{ "id": "p", "gate": true }] }))
            .has_gating_prerequisite());
        assert!(rule(json!({ "parentConditions": [{ "id": "p", "gate": 1 }] }))
            .has_gating_prerequisite());
        assert!(!rule(json!({ "parentConditions": [{ "id": "p", "gate": false }] }))
            .has_gating_prerequisite());
        assert!(!rule(json!({ "parentConditions": [{ "id": "p" }] })).has_gating_prerequisite());
    }

    #[test]
    fn test_parent_conditions_must_be_a_non_empty_array() {
        assert!(!rule(json!({ "parentConditions": [] })).has_parent_conditions());
        assert!(!rule(json!({ "parentConditions": { "id": "p" } })).has_parent_conditions());
        assert!(rule(json!({ "parentConditions": [{ "id": "p" }] })).has_parent_conditions());
    }

    #[test]
    fn test_rule_retain_keys() {
        let mut r = rule(json!({ "key": "r1", "seed": "s", "coverage": 0.5 }));
        r.retain_keys(&BTreeSet::from(["key", "coverage"]));
        assert_eq!(r.fields().len(), 2);
        assert!(r.get("seed").is_none());
    }

    #[test]
    fn test_experiment_predicates() {
        let experiment: Experiment = serde_json::from_value(json!({
            "key": "exp",
            "changeType": "redirect",
            "parentConditions": []
        }))
        .unwrap();

        assert!(experiment.is_redirect());
        assert!(!experiment.has_parent_conditions());
        assert_eq!(experiment.fields.get("key"), Some(&json!("exp")));
    }

    #[test]
    fn test_experiment_tolerates_non_array_parent_conditions() {
        let experiments: Vec<Experiment> = serde_json::from_value(json!([
            { "key": "odd", "parentConditions": { "id": "p" } },
            { "key": "gated", "parentConditions": [{ "id": "p" }] }
        ]))
        .unwrap();

        assert!(!experiments[0].has_parent_conditions());
        assert_eq!(experiments[0].parent_conditions, Some(json!({ "id": "p" })));
        assert!(experiments[1].has_parent_conditions());
    }

    #[test]
    fn test_catalog_from_json() {
        let catalog = DefinitionCatalog::from_json(
            r#"{
                "sdk-abc": {
                    "features": { "dark-mode": { "defaultValue": false } },
                    "savedGroups": { "beta": ["u1"] }
                }
            }"#,
        )
        .unwrap();

        let set = catalog.get("sdk-abc").unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(set.features.contains_key("dark-mode"));
        assert!(set.experiments.is_empty());
        assert_eq!(set.id_lists["beta"], vec!["u1".to_string()]);
        assert!(catalog.get("sdk-missing").is_none());
    }

    #[test]
    fn test_catalog_rejects_malformed_json() {
        assert!(matches!(
            DefinitionCatalog::from_json("{ not json"),
            Err(CatalogError::Parse(_))
        ));
    }
}
