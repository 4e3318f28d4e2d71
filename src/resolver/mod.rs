//! # Schema Resolver
//!
//! Bounded-depth expansion of `$ref` graphs. An expanded reference keeps
//! its `$ref` string and gains a sibling `resolved` object; references
//! whose target is already on the resolution stack are recorded as circular
//! and emitted verbatim so callers can stitch the cycle themselves. Output
//! is deterministic: property order is preserved from the canonical record.

use crate::ingest::model::ref_schema_name;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Options controlling one resolution call.
#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions {
    pub max_depth: usize,
    pub include_examples: bool,
    pub include_extensions: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self { max_depth: 5, include_examples: true, include_extensions: true }
    }
}

/// Result of one resolution call.
#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    /// The expanded schema body.
    pub schema: Value,
    /// Direct dependencies discovered during expansion, per owning schema.
    pub dependency_map: BTreeMap<String, Vec<String>>,
    /// Cycle paths such as `"User -> Profile -> User"`, in discovery order.
    pub circular_references: Vec<String>,
    /// References whose target is not in the catalog.
    pub unresolved_references: Vec<String>,
    /// True when expansion stopped at the depth cap somewhere.
    pub max_depth_reached: bool,
    /// Distinct schemas referenced anywhere below the root.
    pub total_dependencies: usize,
}

/// Reduce any accepted component-name spelling to the bare schema name:
/// `User`, `components/schemas/User`, `#/components/schemas/User`, and
/// `#/definitions/User` all become `User`.
pub fn normalize_component_name(raw: &str) -> &str {
    let trimmed = raw.trim();
    for prefix in
        ["#/components/schemas/", "components/schemas/", "#/definitions/", "definitions/"]
    {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            return rest;
        }
    }
    trimmed
}

/// Resolver over a schema catalog (name → canonical body).
pub struct SchemaResolver<'a> {
    catalog: &'a BTreeMap<String, Value>,
    options: ResolveOptions,
    dependency_map: BTreeMap<String, Vec<String>>,
    dependencies: BTreeSet<String>,
    circular: Vec<String>,
    unresolved: BTreeSet<String>,
    depth_reached: bool,
}

impl<'a> SchemaResolver<'a> {
    pub fn new(catalog: &'a BTreeMap<String, Value>, options: ResolveOptions) -> Self {
        Self {
            catalog,
            options,
            dependency_map: BTreeMap::new(),
            dependencies: BTreeSet::new(),
            circular: Vec::new(),
            unresolved: BTreeSet::new(),
            depth_reached: false,
        }
    }

    /// Resolve `name` to the configured depth. Returns `None` when the root
    /// schema is not in the catalog.
    pub fn resolve(mut self, name: &str) -> Option<ResolvedSchema> {
        let root = self.catalog.get(name)?;
        let mut stack = vec![name.to_string()];
        let schema = self.expand(root, 1, &mut stack);

        Some(ResolvedSchema {
            schema,
            dependency_map: self.dependency_map,
            circular_references: self.circular,
            unresolved_references: self.unresolved.into_iter().collect(),
            max_depth_reached: self.depth_reached,
            total_dependencies: self.dependencies.len(),
        })
    }

    /// Walk one value. `depth` counts expansions along the current path,
    /// with the root body at depth 1; a reference expands only while
    /// `depth < max_depth`.
    fn expand(&mut self, value: &Value, depth: usize, stack: &mut Vec<String>) -> Value {
        match value {
            Value::Object(map) => {
                if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                    return self.expand_ref(reference, map, depth, stack);
                }

                let mut out = Map::new();
                for (key, child) in map {
                    if !self.options.include_examples
                        && matches!(key.as_str(), "example" | "examples" | "default")
                    {
                        continue;
                    }
                    if !self.options.include_extensions && key.starts_with("x-") {
                        continue;
                    }
                    out.insert(key.clone(), self.expand(child, depth, stack));
                }
                Value::Object(out)
            }
            Value::Array(items) => {
                Value::Array(items.iter().map(|item| self.expand(item, depth, stack)).collect())
            }
            scalar => scalar.clone(),
        }
    }

    fn expand_ref(
        &mut self,
        reference: &str,
        original: &Map<String, Value>,
        depth: usize,
        stack: &mut Vec<String>,
    ) -> Value {
        let verbatim = || Value::Object(original.clone());

        let Some(target) = ref_schema_name(reference) else {
            // Non-schema pointer (parameters, responses, external): leave it
            // for the caller.
            self.unresolved.insert(reference.to_string());
            return verbatim();
        };

        if let Some(owner) = stack.last() {
            let entry = self.dependency_map.entry(owner.clone()).or_default();
            if !entry.iter().any(|d| d == target) {
                entry.push(target.to_string());
            }
        }
        self.dependencies.insert(target.to_string());

        if stack.iter().any(|s| s == target) {
            let mut path = stack.join(" -> ");
            path.push_str(" -> ");
            path.push_str(target);
            if !self.circular.contains(&path) {
                self.circular.push(path);
            }
            return verbatim();
        }

        let Some(body) = self.catalog.get(target) else {
            self.unresolved.insert(reference.to_string());
            return verbatim();
        };

        if depth >= self.options.max_depth {
            self.depth_reached = true;
            return verbatim();
        }

        stack.push(target.to_string());
        let resolved = self.expand(body, depth + 1, stack);
        stack.pop();

        let mut out = original.clone();
        out.insert("resolved".to_string(), resolved);
        Value::Object(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog(entries: &[(&str, Value)]) -> BTreeMap<String, Value> {
        entries.iter().map(|(name, body)| (name.to_string(), body.clone())).collect()
    }

    fn resolve(
        catalog: &BTreeMap<String, Value>,
        name: &str,
        options: ResolveOptions,
    ) -> ResolvedSchema {
        SchemaResolver::new(catalog, options).resolve(name).expect("root schema exists")
    }

    #[test]
    fn test_normalize_component_name() {
        assert_eq!(normalize_component_name("User"), "User");
        assert_eq!(normalize_component_name("components/schemas/User"), "User");
        assert_eq!(normalize_component_name("#/components/schemas/User"), "User");
        assert_eq!(normalize_component_name("#/definitions/User"), "User");
        assert_eq!(normalize_component_name("  User  "), "User");
    }

    #[test]
    fn test_simple_expansion_keeps_ref_and_adds_resolved() {
        let catalog = catalog(&[
            (
                "User",
                json!({
                    "type": "object",
                    "properties": {"profile": {"$ref": "#/components/schemas/Profile"}}
                }),
            ),
            ("Profile", json!({"type": "object", "properties": {"bio": {"type": "string"}}})),
        ]);

        let result = resolve(&catalog, "User", ResolveOptions::default());
        let profile = &result.schema["properties"]["profile"];
        assert_eq!(profile["$ref"], "#/components/schemas/Profile");
        assert_eq!(profile["resolved"]["type"], "object");
        assert!(result.circular_references.is_empty());
        assert!(!result.max_depth_reached);
        assert_eq!(result.total_dependencies, 1);
        assert_eq!(result.dependency_map["User"], vec!["Profile"]);
    }

    #[test]
    fn test_cycle_detected_and_contained() {
        let catalog = catalog(&[
            (
                "User",
                json!({
                    "type": "object",
                    "properties": {"profile": {"$ref": "#/components/schemas/Profile"}}
                }),
            ),
            (
                "Profile",
                json!({
                    "type": "object",
                    "properties": {"owner": {"$ref": "#/components/schemas/User"}}
                }),
            ),
        ]);

        let result = resolve(
            &catalog,
            "User",
            ResolveOptions { max_depth: 3, ..ResolveOptions::default() },
        );

        // Profile expands; its back-reference to User does not.
        let profile = &result.schema["properties"]["profile"];
        assert!(profile["resolved"].is_object());
        let owner = &profile["resolved"]["properties"]["owner"];
        assert_eq!(owner["$ref"], "#/components/schemas/User");
        assert!(owner.get("resolved").is_none());

        assert_eq!(result.circular_references, vec!["User -> Profile -> User"]);
        assert!(result.total_dependencies >= 1);
    }

    #[test]
    fn test_depth_cap_emits_bare_refs() {
        let catalog = catalog(&[
            ("A", json!({"properties": {"b": {"$ref": "#/components/schemas/B"}}})),
            ("B", json!({"properties": {"c": {"$ref": "#/components/schemas/C"}}})),
            ("C", json!({"properties": {"d": {"$ref": "#/components/schemas/D"}}})),
            ("D", json!({"properties": {"e": {"$ref": "#/components/schemas/E"}}})),
            ("E", json!({"type": "object"})),
        ]);

        let result = resolve(
            &catalog,
            "A",
            ResolveOptions { max_depth: 2, ..ResolveOptions::default() },
        );

        let b = &result.schema["properties"]["b"];
        assert!(b["resolved"].is_object(), "B should be expanded");
        let c = &b["resolved"]["properties"]["c"];
        assert_eq!(c["$ref"], "#/components/schemas/C");
        assert!(c.get("resolved").is_none(), "C must stay a bare reference");
        assert!(result.max_depth_reached);
    }

    #[test]
    fn test_self_reference() {
        let catalog = catalog(&[(
            "Node",
            json!({
                "type": "object",
                "properties": {"next": {"$ref": "#/components/schemas/Node"}}
            }),
        )]);

        let result = resolve(&catalog, "Node", ResolveOptions::default());
        assert_eq!(result.circular_references, vec!["Node -> Node"]);
        let next = &result.schema["properties"]["next"];
        assert!(next.get("resolved").is_none());
    }

    #[test]
    fn test_unresolved_reference_left_verbatim() {
        let catalog = catalog(&[(
            "User",
            json!({"properties": {"ghost": {"$ref": "#/components/schemas/Ghost"}}}),
        )]);

        let result = resolve(&catalog, "User", ResolveOptions::default());
        assert_eq!(
            result.unresolved_references,
            vec!["#/components/schemas/Ghost".to_string()]
        );
        assert_eq!(result.schema["properties"]["ghost"]["$ref"], "#/components/schemas/Ghost");
    }

    #[test]
    fn test_example_and_extension_stripping() {
        let catalog = catalog(&[(
            "User",
            json!({
                "type": "object",
                "example": {"id": "u1"},
                "x-table": "users",
                "properties": {
                    "id": {"type": "string", "default": "abc", "x-pii": true}
                }
            }),
        )]);

        let stripped = resolve(
            &catalog,
            "User",
            ResolveOptions { include_examples: false, include_extensions: false, max_depth: 5 },
        );
        assert!(stripped.schema.get("example").is_none());
        assert!(stripped.schema.get("x-table").is_none());
        assert!(stripped.schema["properties"]["id"].get("default").is_none());
        assert!(stripped.schema["properties"]["id"].get("x-pii").is_none());

        let kept = resolve(&catalog, "User", ResolveOptions::default());
        assert!(kept.schema.get("example").is_some());
        assert!(kept.schema.get("x-table").is_some());
    }

    #[test]
    fn test_round_trip_without_composition() {
        let body = json!({
            "type": "object",
            "required": ["id"],
            "properties": {
                "id": {"type": "string"},
                "age": {"type": "integer", "minimum": 0}
            }
        });
        let catalog = catalog(&[("Plain", body.clone())]);
        let result = resolve(&catalog, "Plain", ResolveOptions::default());
        assert_eq!(result.schema, body);
        assert_eq!(result.total_dependencies, 0);
    }

    #[test]
    fn test_missing_root_returns_none() {
        let catalog = catalog(&[]);
        assert!(SchemaResolver::new(&catalog, ResolveOptions::default())
            .resolve("Ghost")
            .is_none());
    }
}
