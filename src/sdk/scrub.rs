//! Payload Scrubber
//!
//! Reduces a canonical definition set to what an SDK with a given
//! capability set can safely parse.

use std::borrow::Cow;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::capability::{Capability, CapabilitySet};
use super::definitions::{DefinitionSet, Experiment, FeatureMap, IdLists};

// == Rule Key Tiers ==
/// Rule fields every SDK understands.
pub const STRICT_RULE_KEYS: &[&str] = &[
    "key",
    "variations",
    "weights",
    "coverage",
    "condition",
    "namespace",
    "force",
    "hashAttribute",
];

pub const BUCKETING_V2_RULE_KEYS: &[&str] = &[
    "hashVersion",
    "range",
    "ranges",
    "meta",
    "filters",
    "seed",
    "name",
    "phase",
];

pub const STICKY_BUCKETING_RULE_KEYS: &[&str] = &[
    "fallbackAttribute",
    "disableStickyBucketing",
    "bucketVersion",
    "minBucketVersion",
];

pub const PREREQUISITE_RULE_KEYS: &[&str] = &["parentConditions"];

/// Additional rule fields unlocked by each capability.
const RULE_KEY_TIERS: &[(Capability, &[&str])] = &[
    (Capability::BucketingV2, BUCKETING_V2_RULE_KEYS),
    (Capability::StickyBucketing, STICKY_BUCKETING_RULE_KEYS),
    (Capability::Prerequisites, PREREQUISITE_RULE_KEYS),
];

/// The strict rule keys plus every tier the capability set unlocks.
pub fn allowed_rule_keys(capabilities: CapabilitySet) -> BTreeSet<&'static str> {
    let unlocked = RULE_KEY_TIERS
        .iter()
        .filter(|(capability, _)| capabilities.contains(*capability))
        .flat_map(|(_, keys)| keys.iter());

    STRICT_RULE_KEYS.iter().chain(unlocked).copied().collect()
}

// == Feature Scrubbing ==
/// Produces the feature map an SDK with `capabilities` may receive.
///
/// Without prerequisite support, features gated on a prerequisite are
/// dropped and rules carrying parent conditions are removed. Field pruning
/// runs afterwards, unless the SDK unmarshals loosely.
pub fn scrub_features(
    features: &FeatureMap,
    capabilities: CapabilitySet,
    id_lists: &IdLists,
) -> FeatureMap {
    let mut scrubbed = features.clone();

    if !capabilities.supports_saved_group_references() {
        for feature in scrubbed.values_mut() {
            feature.resolve_saved_groups(id_lists);
        }
    }

    if !capabilities.supports_prerequisites() {
        scrubbed.retain(|_, feature| !feature.has_gating_prerequisite());
        for feature in scrubbed.values_mut() {
            if let Some(rules) = feature.rules.as_mut() {
                rules.retain(|rule| !rule.has_parent_conditions());
            }
        }
    }

    if capabilities.supports_loose_unmarshalling() {
        return scrubbed;
    }

    let allowed = allowed_rule_keys(capabilities);
    for feature in scrubbed.values_mut() {
        feature.retain_strict_fields();
        for rule in feature.rules.iter_mut().flatten() {
            rule.retain_keys(&allowed);
        }
    }

    scrubbed
}

// == Experiment Scrubbing ==
/// Produces the auto-experiment list an SDK with `capabilities` may receive.
///
/// Borrows the input when nothing needs to change.
pub fn scrub_experiments<'a>(
    experiments: &'a [Experiment],
    capabilities: CapabilitySet,
    id_lists: &IdLists,
) -> Cow<'a, [Experiment]> {
    let supports_prerequisites = capabilities.supports_prerequisites();
    let supports_redirects = capabilities.supports_redirects();

    let mut experiments = Cow::Borrowed(experiments);
    if !capabilities.supports_saved_group_references() {
        for experiment in experiments.to_mut().iter_mut() {
            experiment.resolve_saved_groups(id_lists);
        }
    }

    if supports_prerequisites && supports_redirects {
        return experiments;
    }

    experiments
        .iter()
        .filter(|experiment| supports_redirects || !experiment.is_redirect())
        .filter(|experiment| supports_prerequisites || !experiment.has_parent_conditions())
        .map(|experiment| {
            let mut experiment = experiment.clone();
            if !supports_prerequisites {
                experiment.parent_conditions = None;
            }
            experiment
        })
        .collect::<Vec<_>>()
        .into()
}

// == Id List Scrubbing ==
/// Id lists ship only to SDKs that resolve saved-group references
/// themselves. Everyone else already got memberships inlined.
pub fn scrub_id_lists(id_lists: &IdLists, capabilities: CapabilitySet) -> Option<&IdLists> {
    capabilities
        .supports_saved_group_references()
        .then_some(id_lists)
}

// == Payload ==
/// Body of `GET /api/features/{clientKey}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureApiResponse {
    #[serde(default)]
    pub features: FeatureMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiments: Option<Vec<Experiment>>,
    #[serde(rename = "savedGroups", default, skip_serializing_if = "Option::is_none")]
    pub saved_groups: Option<IdLists>,
    #[serde(
        rename = "encryptedFeatures",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub encrypted_features: Option<String>,
    #[serde(rename = "dateUpdated", default, skip_serializing_if = "Option::is_none")]
    pub date_updated: Option<String>,
}

impl FeatureApiResponse {
    pub fn from_features(features: FeatureMap) -> Self {
        Self {
            features,
            experiments: None,
            saved_groups: None,
            encrypted_features: None,
            date_updated: None,
        }
    }
}

/// Scrubs a whole definition set into the payload served to one SDK.
pub fn build_payload(
    definitions: &DefinitionSet,
    capabilities: CapabilitySet,
) -> FeatureApiResponse {
    let experiments = if definitions.experiments.is_empty() {
        None
    } else {
        Some(
            scrub_experiments(&definitions.experiments, capabilities, &definitions.id_lists)
                .into_owned(),
        )
    };

    FeatureApiResponse {
        features: scrub_features(&definitions.features, capabilities, &definitions.id_lists),
        experiments,
        saved_groups: scrub_id_lists(&definitions.id_lists, capabilities).cloned(),
        encrypted_features: None,
        date_updated: definitions.date_updated.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn features(value: Value) -> FeatureMap {
        serde_json::from_value(value).unwrap()
    }

    fn experiments(value: Value) -> Vec<Experiment> {
        serde_json::from_value(value).unwrap()
    }

    fn id_lists() -> IdLists {
        IdLists::from([("g1".to_string(), vec!["a".to_string(), "b".to_string()])])
    }

    fn caps(tags: &[&str]) -> CapabilitySet {
        CapabilitySet::from_tags(tags)
    }

    fn rule_keys(features: &FeatureMap, feature: &str) -> Vec<Vec<String>> {
        features[feature]
            .rules
            .iter()
            .flatten()
            .map(|rule| rule.fields().keys().cloned().collect())
            .collect()
    }

    #[test]
    fn test_allowed_rule_keys_by_tier() {
        let strict = allowed_rule_keys(CapabilitySet::empty());
        assert_eq!(strict.len(), STRICT_RULE_KEYS.len());

        let keys = allowed_rule_keys(caps(&["bucketingV2", "redirects"]));
        assert!(keys.contains("hashVersion"));
        assert!(!keys.contains("fallbackAttribute"));
        assert!(!keys.contains("parentConditions"));

        let keys = allowed_rule_keys(caps(&["stickyBucketing", "prerequisites"]));
        assert!(keys.contains("minBucketVersion"));
        assert!(keys.contains("parentConditions"));
        assert!(!keys.contains("seed"));
    }

    #[test]
    fn test_gated_feature_removed_for_empty_capabilities() {
        let input = features(json!({
            "gated": {
                "defaultValue": 1,
                "rules": [{
                    "key": "r1",
                    "parentConditions": [{ "id": "parent", "condition": { "value": true }, "gate": true }],
                    "hashVersion": 2
                }]
            },
            "plain": { "defaultValue": 2 }
        }));

        let scrubbed = scrub_features(&input, CapabilitySet::empty(), &IdLists::new());
        assert!(!scrubbed.contains_key("gated"));
        assert!(scrubbed.contains_key("plain"));
    }

    #[test]
    fn test_non_gating_prerequisite_rules_are_dropped() {
        let input = features(json!({
            "f": {
                "defaultValue": "off",
                "rules": [
                    { "key": "r1", "force": "on", "parentConditions": [{ "id": "p", "condition": {} }] },
                    { "key": "r2", "force": "beta" }
                ]
            }
        }));

        let scrubbed = scrub_features(&input, CapabilitySet::empty(), &IdLists::new());
        let rules = scrubbed["f"].rules.as_ref().unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].get("key"), Some(&json!("r2")));
    }

    #[test]
    fn test_prerequisites_capability_keeps_parent_conditions() {
        let input = features(json!({
            "f": {
                "defaultValue": 0,
                "rules": [{ "key": "r1", "parentConditions": [{ "id": "p", "gate": true }] }]
            }
        }));

        let scrubbed = scrub_features(&input, caps(&["prerequisites"]), &IdLists::new());
        assert_eq!(
            rule_keys(&scrubbed, "f"),
            vec![vec!["key".to_string(), "parentConditions".to_string()]]
        );
    }

    #[test]
    fn test_field_pruning_by_tier() {
        let input = features(json!({
            "f": {
                "defaultValue": 0,
                "project": "p1",
                "rules": [{
                    "key": "r1",
                    "coverage": 1,
                    "hashVersion": 2,
                    "seed": "abc",
                    "fallbackAttribute": "deviceId",
                    "somethingNew": true
                }]
            }
        }));

        let scrubbed = scrub_features(&input, caps(&["bucketingV2"]), &IdLists::new());
        assert!(scrubbed["f"].extra.is_empty());
        assert_eq!(
            rule_keys(&scrubbed, "f"),
            vec![vec![
                "coverage".to_string(),
                "hashVersion".to_string(),
                "key".to_string(),
                "seed".to_string()
            ]]
        );
    }

    #[test]
    fn test_loose_unmarshalling_skips_pruning_but_not_prerequisite_filtering() {
        let input = features(json!({
            "f": {
                "defaultValue": 0,
                "project": "p1",
                "rules": [
                    { "key": "r1", "somethingNew": true },
                    { "key": "r2", "parentConditions": [{ "id": "p" }] }
                ]
            }
        }));

        let scrubbed = scrub_features(&input, caps(&["looseUnmarshalling"]), &IdLists::new());
        assert_eq!(scrubbed["f"].extra.get("project"), Some(&json!("p1")));
        let rules = scrubbed["f"].rules.as_ref().unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].get("somethingNew"), Some(&json!(true)));
    }

    #[test]
    fn test_saved_groups_inlined_without_reference_support() {
        let input = features(json!({
            "f": {
                "defaultValue": false,
                "rules": [{ "key": "r1", "condition": { "id": { "$ingroup": "g1" } }, "force": true }]
            }
        }));

        let scrubbed = scrub_features(&input, CapabilitySet::empty(), &id_lists());
        let condition = scrubbed["f"].rules.as_ref().unwrap()[0].get("condition").cloned();
        assert_eq!(condition, Some(json!({ "id": { "$in": ["a", "b"] } })));

        // canonical input is never modified
        let original = input["f"].rules.as_ref().unwrap()[0].get("condition").cloned();
        assert_eq!(original, Some(json!({ "id": { "$ingroup": "g1" } })));
    }

    #[test]
    fn test_saved_group_references_left_for_capable_sdks() {
        let input = features(json!({
            "f": {
                "defaultValue": false,
                "rules": [{ "key": "r1", "condition": { "id": { "$ningroup": "g1" } } }]
            }
        }));

        let scrubbed = scrub_features(&input, caps(&["savedGroupReferences"]), &id_lists());
        assert_eq!(scrubbed, input);
    }

    #[test]
    fn test_rule_and_variation_order_preserved() {
        let input = features(json!({
            "f": {
                "defaultValue": "a",
                "rules": [
                    { "key": "z", "variations": ["c", "a", "b"] },
                    { "key": "a", "variations": ["b", "c"] }
                ]
            }
        }));

        let scrubbed = scrub_features(&input, CapabilitySet::empty(), &IdLists::new());
        let rules = scrubbed["f"].rules.as_ref().unwrap();
        assert_eq!(rules[0].get("key"), Some(&json!("z")));
        assert_eq!(rules[0].get("variations"), Some(&json!(["c", "a", "b"])));
        assert_eq!(rules[1].get("key"), Some(&json!("a")));
    }

    #[test]
    fn test_scrubbing_is_deterministic() {
        let input = features(json!({
            "b": { "defaultValue": 1, "rules": [{ "key": "r", "condition": { "x": { "$ingroup": "g1" } } }] },
            "a": { "defaultValue": 2 }
        }));

        let render = || {
            let scrubbed = scrub_features(&input, caps(&["bucketingV2"]), &id_lists());
            serde_json::to_string(&scrubbed).unwrap()
        };
        assert_eq!(render(), render());
    }

    #[test]
    fn test_experiments_fast_path_borrows() {
        let input = experiments(json!([
            { "key": "e1", "changeType": "redirect", "parentConditions": [{ "id": "p" }] }
        ]));

        let scrubbed = scrub_experiments(
            &input,
            caps(&["prerequisites", "redirects", "savedGroupReferences"]),
            &IdLists::new(),
        );
        assert!(matches!(scrubbed, Cow::Borrowed(_)));
        assert_eq!(scrubbed.as_ref(), input.as_slice());
    }

    #[test]
    fn test_redirect_experiments_dropped_without_support() {
        let input = experiments(json!([
            { "key": "e1", "changeType": "redirect" },
            { "key": "e2", "changeType": "visual" }
        ]));

        let scrubbed = scrub_experiments(&input, caps(&["prerequisites"]), &IdLists::new());
        assert_eq!(scrubbed.len(), 1);
        assert_eq!(scrubbed[0].fields.get("key"), Some(&json!("e2")));
    }

    #[test]
    fn test_prerequisite_experiments_dropped_and_field_stripped() {
        let input = experiments(json!([
            { "key": "e1", "parentConditions": [{ "id": "p" }] },
            { "key": "e2", "parentConditions": [] },
            { "key": "e3" },
            { "key": "e4", "parentConditions": "unexpected" }
        ]));

        let scrubbed = scrub_experiments(&input, caps(&["redirects"]), &IdLists::new());
        let keys: Vec<_> = scrubbed.iter().map(|e| e.fields["key"].clone()).collect();
        assert_eq!(keys, vec![json!("e2"), json!("e3"), json!("e4")]);
        assert!(scrubbed.iter().all(|e| e.parent_conditions.is_none()));
    }

    #[test]
    fn test_experiment_conditions_resolved_even_on_fast_path() {
        let input = experiments(json!([
            { "key": "e1", "condition": { "id": { "$ingroup": "g1" } } }
        ]));

        let capabilities = caps(&["prerequisites", "redirects"]);
        let scrubbed = scrub_experiments(&input, capabilities, &id_lists());
        assert_eq!(
            scrubbed[0].fields["condition"],
            json!({ "id": { "$in": ["a", "b"] } })
        );
    }

    #[test]
    fn test_id_lists_only_for_reference_capable_sdks() {
        let lists = id_lists();
        assert!(scrub_id_lists(&lists, CapabilitySet::empty()).is_none());
        assert_eq!(scrub_id_lists(&lists, caps(&["savedGroupReferences"])), Some(&lists));
    }

    #[test]
    fn test_build_payload() {
        let definitions: DefinitionSet = serde_json::from_value(json!({
            "features": { "f": { "defaultValue": true } },
            "experiments": [{ "key": "e1", "changeType": "redirect" }],
            "savedGroups": { "g1": ["a"] },
            "dateUpdated": "2024-01-01T00:00:00Z"
        }))
        .unwrap();

        let legacy = build_payload(&definitions, CapabilitySet::empty());
        assert_eq!(legacy.experiments, Some(vec![]));
        assert!(legacy.saved_groups.is_none());
        assert_eq!(legacy.date_updated.as_deref(), Some("2024-01-01T00:00:00Z"));

        let modern = build_payload(&definitions, CapabilitySet::all());
        assert_eq!(modern.experiments.map(|e| e.len()), Some(1));
        assert_eq!(modern.saved_groups, Some(definitions.id_lists.clone()));

        let empty = build_payload(&DefinitionSet::default(), CapabilitySet::empty());
        assert_eq!(serde_json::to_value(empty).unwrap(), json!({ "features": {} }));
    }
}
