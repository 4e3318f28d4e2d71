//! Reference graph construction and classification.
//!
//! After the schema pass, every outbound `$ref` is classified as resolved
//! (target exists), unresolved (target missing — error) or circular (target
//! cycle reachable from source — warning). Circularity is detected by BFS
//! over the accumulating dependency graph: a reference `A → B` is circular
//! when `A` is reachable from `B`.

use crate::ingest::model::{IngestIssue, NormalizedEndpoint, NormalizedSchema};
use std::collections::{HashMap, HashSet, VecDeque};

/// Outcome of the reference resolution sub-pass.
#[derive(Debug, Default)]
pub struct Classification {
    pub errors: Vec<IngestIssue>,
    pub warnings: Vec<IngestIssue>,
}

/// Classify every schema-to-schema and endpoint-to-schema reference.
pub fn classify(
    schemas: &[NormalizedSchema],
    endpoints: &[NormalizedEndpoint],
) -> Classification {
    let known: HashSet<&str> = schemas.iter().map(|s| s.name.as_str()).collect();
    let graph: HashMap<&str, &[String]> =
        schemas.iter().map(|s| (s.name.as_str(), s.dependencies.as_slice())).collect();

    let mut out = Classification::default();

    for schema in schemas {
        for dep in &schema.dependencies {
            if !known.contains(dep.as_str()) {
                out.errors.push(IngestIssue::new(
                    format!("/components/schemas/{}", schema.name),
                    format!("Unresolved reference to '{dep}'"),
                ));
            } else if reachable(&graph, dep, &schema.name) {
                out.warnings.push(IngestIssue::new(
                    format!("/components/schemas/{}", schema.name),
                    format!("Circular reference: {} -> {}", schema.name, dep),
                ));
            }
        }
    }

    for endpoint in endpoints {
        for dep in endpoint.schema_dependencies() {
            if !known.contains(dep.as_str()) {
                out.errors.push(IngestIssue::new(
                    format!("/paths/{}/{}", endpoint.path, endpoint.method.to_lowercase()),
                    format!("Unresolved reference to '{dep}'"),
                ));
            }
        }
    }

    out
}

/// Invert the dependency sets into `used_by` on each schema.
pub fn fill_used_by(schemas: &mut [NormalizedSchema]) {
    let mut inbound: HashMap<String, Vec<String>> = HashMap::new();
    for schema in schemas.iter() {
        for dep in &schema.dependencies {
            inbound.entry(dep.clone()).or_default().push(schema.name.clone());
        }
    }
    for schema in schemas.iter_mut() {
        let mut users = inbound.remove(&schema.name).unwrap_or_default();
        users.sort();
        users.dedup();
        schema.used_by = users;
    }
}

/// BFS reachability: is `target` reachable from `start` along dependency
/// edges?
fn reachable(graph: &HashMap<&str, &[String]>, start: &str, target: &str) -> bool {
    if start == target {
        return true;
    }
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    queue.push_back(start);
    visited.insert(start);

    while let Some(node) = queue.pop_front() {
        if let Some(deps) = graph.get(node) {
            for dep in deps.iter() {
                if dep == target {
                    return true;
                }
                if visited.insert(dep.as_str()) {
                    queue.push_back(dep.as_str());
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(name: &str, deps: &[&str]) -> NormalizedSchema {
        NormalizedSchema {
            name: name.to_string(),
            schema_type: Some("object".to_string()),
            title: None,
            description: None,
            body: json!({"type": "object"}),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            used_by: Vec::new(),
            deprecated: false,
            extensions: Vec::new(),
        }
    }

    #[test]
    fn test_unresolved_reference_is_error() {
        let schemas = vec![schema("User", &["Missing"])];
        let result = classify(&schemas, &[]);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("Missing"));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_two_node_cycle_is_warning_on_both_edges() {
        let schemas = vec![schema("User", &["Profile"]), schema("Profile", &["User"])];
        let result = classify(&schemas, &[]);
        assert!(result.errors.is_empty());
        assert_eq!(result.warnings.len(), 2);
        assert!(result.warnings[0].message.contains("Circular reference"));
    }

    #[test]
    fn test_self_reference_is_circular() {
        let schemas = vec![schema("Node", &["Node"])];
        let result = classify(&schemas, &[]);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].message.contains("Node -> Node"));
    }

    #[test]
    fn test_long_cycle_detected() {
        let schemas =
            vec![schema("A", &["B"]), schema("B", &["C"]), schema("C", &["A"]), schema("D", &["A"])];
        let result = classify(&schemas, &[]);
        // Three edges participate in the A→B→C→A cycle; D→A does not.
        assert_eq!(result.warnings.len(), 3);
    }

    #[test]
    fn test_acyclic_chain_has_no_warnings() {
        let schemas = vec![schema("A", &["B"]), schema("B", &["C"]), schema("C", &[])];
        let result = classify(&schemas, &[]);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_fill_used_by_inverts_dependencies() {
        let mut schemas =
            vec![schema("User", &["Profile", "Address"]), schema("Profile", &["Address"]), schema("Address", &[])];
        fill_used_by(&mut schemas);

        assert!(schemas[0].used_by.is_empty());
        assert_eq!(schemas[1].used_by, vec!["User"]);
        assert_eq!(schemas[2].used_by, vec!["Profile", "User"]);
    }
}
