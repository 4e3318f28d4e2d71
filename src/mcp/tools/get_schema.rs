//! `getSchema` tool
//!
//! Resolve a named component schema with its transitive references,
//! bounded by depth, with cycle containment and usage cross-references.

use crate::mcp::error::McpError;
use crate::mcp::protocol::Tool;
use crate::mcp::validation::{get_schema_schema, GetSchemaArguments};
use crate::mcp::ServerState;
use crate::resolver::{normalize_component_name, ResolveOptions, SchemaResolver};
use crate::search::query::closest_terms;
use crate::storage::SchemaRepository;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;

/// Tool definition for resolving a schema
pub fn get_schema_tool() -> Tool {
    Tool::new(
        "getSchema",
        r#"Get a component schema with its transitive references resolved.

PURPOSE: Inspect one named schema from the ingested specification with
every $ref expanded in place, up to a configurable depth.

NAME FORMS: 'User', 'components/schemas/User',
'#/components/schemas/User' and '#/definitions/User' are equivalent.

RESOLUTION: An expanded reference keeps its $ref string and gains a
sibling 'resolved' object. References already being expanded on the
current path are reported in 'circularReferences' (as
"A -> B -> A" strings) and left unexpanded so the cycle can be stitched
by the caller. References beyond maxDepth stay unexpanded and
'metadata.maxDepthReached' is set.

OPTIONS: resolveDependencies=false returns the schema as stored;
includeExamples / includeExtensions strip example/default values and
x-* keys at every level.

RETURNS: the resolved schema, a per-schema dependency map, circular and
unresolved references, the endpoints using the schema, and resolution
metadata.

RELATED TOOLS: searchEndpoints (find endpoints), getExample (client code)."#,
        get_schema_schema(),
    )
}

/// Execute `getSchema`.
#[instrument(skip(state, args), fields(component = %args.component_name), name = "mcp_execute_get_schema")]
pub async fn execute_get_schema(
    state: &Arc<ServerState>,
    args: &GetSchemaArguments,
) -> Result<Value, McpError> {
    let started = std::time::Instant::now();
    let name = normalize_component_name(&args.component_name).to_string();

    let snapshot = state.search.snapshot().await;
    let Some(document_id) = snapshot.document_id else {
        return Err(McpError::ResourceNotFound {
            resource_type: "Schema".to_string(),
            name,
            similar: Vec::new(),
        });
    };

    let repository = SchemaRepository::new(state.pool.clone());
    let schemas = repository.list_all(document_id).await.map_err(McpError::from)?;
    let catalog: BTreeMap<String, Value> =
        schemas.iter().map(|s| (s.record.name.clone(), s.record.body.clone())).collect();

    if !catalog.contains_key(&name) {
        let names: std::collections::BTreeSet<String> =
            catalog.keys().map(|n| n.to_lowercase()).collect();
        let mut similar = closest_terms(&name.to_lowercase(), &names, 5);
        // Edit distance misses case-only and substring matches; add them.
        for candidate in catalog.keys() {
            if candidate.to_lowercase().contains(&name.to_lowercase())
                && !similar.contains(&candidate.to_lowercase())
            {
                similar.push(candidate.to_lowercase());
            }
        }
        similar.truncate(5);
        return Err(McpError::ResourceNotFound {
            resource_type: "Schema".to_string(),
            name,
            similar,
        });
    }

    let options = ResolveOptions {
        max_depth: if args.resolve_dependencies { args.max_depth } else { 1 },
        include_examples: args.include_examples,
        include_extensions: args.include_extensions,
    };
    let resolved =
        SchemaResolver::new(&catalog, options).resolve(&name).ok_or_else(|| {
            McpError::SchemaResolution {
                schema: name.clone(),
                message: "Schema disappeared during resolution".to_string(),
                cycle_path: Vec::new(),
            }
        })?;

    let used_in: Vec<Value> = snapshot
        .xref
        .usages_of(&name)
        .iter()
        .map(|usage| {
            json!({
                "endpoint": format!("{} {}", usage.method, usage.path),
                "context": usage.context.as_str(),
                "contentType": usage.content_type,
                "required": usage.required,
                "score": usage.score,
            })
        })
        .collect();

    // resolveDependencies=false walks nothing, so the depth cap is moot.
    let max_depth_reached = args.resolve_dependencies && resolved.max_depth_reached;

    Ok(json!({
        "name": name,
        "schema": resolved.schema,
        "dependencyMap": resolved.dependency_map,
        "circularReferences": resolved.circular_references,
        "unresolvedReferences": resolved.unresolved_references,
        "usedInEndpoints": used_in,
        "metadata": {
            "totalDependencies": resolved.total_dependencies,
            "maxDepthReached": max_depth_reached,
            "resolutionDepth": args.max_depth,
            "resolveDependencies": args.resolve_dependencies,
            "tookMs": started.elapsed().as_millis() as u64,
        }
    }))
}
