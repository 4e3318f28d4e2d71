//! Shared helpers for integration tests.
#![allow(dead_code)]

use apiscope::config::{AppConfig, DatabaseConfig};
use apiscope::mcp::ServerState;
use apiscope::startup;
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Config against a single-connection in-memory store.
pub fn memory_config() -> AppConfig {
    AppConfig {
        database: DatabaseConfig {
            url: "sqlite://:memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            auto_migrate: true,
            ..DatabaseConfig::default()
        },
        ..AppConfig::default()
    }
}

/// Write a JSON specification to a temp file.
pub fn spec_file(spec: &Value) -> NamedTempFile {
    let mut file = NamedTempFile::with_suffix(".json").expect("temp file");
    file.write_all(spec.to_string().as_bytes()).expect("write spec");
    file.flush().expect("flush spec");
    file
}

/// Build a server state with the given specification ingested and indexed.
pub async fn state_with_spec(spec: &Value) -> Arc<ServerState> {
    let state = startup::build_state(memory_config()).await.expect("state builds");
    let file = spec_file(spec);
    startup::ingest_and_index(&state, file.path()).await.expect("spec ingests");
    state
}

/// The users specification from the end-to-end scenarios: list, create,
/// and read endpoints plus a bearer-protected create.
pub fn users_spec() -> Value {
    json!({
        "openapi": "3.0.3",
        "info": {"title": "Users API", "version": "1.0.0"},
        "servers": [{"url": "https://api.example.com"}],
        "paths": {
            "/api/v1/users": {
                "get": {
                    "operationId": "listUsers",
                    "summary": "List users",
                    "tags": ["users"],
                    "responses": {
                        "200": {
                            "description": "ok",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "array",
                                        "items": {"$ref": "#/components/schemas/User"}
                                    }
                                }
                            }
                        }
                    }
                },
                "post": {
                    "operationId": "createUser",
                    "summary": "Create a user",
                    "tags": ["users"],
                    "security": [{"bearerAuth": []}],
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {"$ref": "#/components/schemas/User"}
                            }
                        }
                    },
                    "responses": {
                        "201": {
                            "description": "created",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/User"}
                                }
                            }
                        }
                    }
                }
            },
            "/api/v1/users/{id}": {
                "get": {
                    "operationId": "getUser",
                    "summary": "Get a user",
                    "tags": ["users"],
                    "parameters": [
                        {"name": "id", "in": "path", "required": true, "schema": {"type": "string"}}
                    ],
                    "responses": {
                        "200": {
                            "description": "ok",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/User"}
                                }
                            }
                        }
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "User": {
                    "type": "object",
                    "required": ["id", "email"],
                    "properties": {
                        "id": {"type": "string"},
                        "email": {"type": "string"},
                        "name": {"type": "string"}
                    }
                }
            },
            "securitySchemes": {
                "bearerAuth": {"type": "http", "scheme": "bearer"}
            }
        }
    })
}

/// Specification with a two-schema reference cycle.
pub fn cyclic_spec() -> Value {
    json!({
        "openapi": "3.0.3",
        "info": {"title": "Cyclic API", "version": "1.0.0"},
        "paths": {
            "/profiles": {"get": {"summary": "List profiles"}}
        },
        "components": {
            "schemas": {
                "User": {
                    "type": "object",
                    "properties": {"profile": {"$ref": "#/components/schemas/Profile"}}
                },
                "Profile": {
                    "type": "object",
                    "properties": {"owner": {"$ref": "#/components/schemas/User"}}
                }
            }
        }
    })
}

/// Specification with a five-schema reference chain A → B → C → D → E.
pub fn chain_spec() -> Value {
    json!({
        "openapi": "3.0.3",
        "info": {"title": "Chain API", "version": "1.0.0"},
        "paths": {
            "/chains": {"get": {"summary": "List chains"}}
        },
        "components": {
            "schemas": {
                "A": {"type": "object", "properties": {"b": {"$ref": "#/components/schemas/B"}}},
                "B": {"type": "object", "properties": {"c": {"$ref": "#/components/schemas/C"}}},
                "C": {"type": "object", "properties": {"d": {"$ref": "#/components/schemas/D"}}},
                "D": {"type": "object", "properties": {"e": {"$ref": "#/components/schemas/E"}}},
                "E": {"type": "object", "properties": {"leaf": {"type": "string"}}}
            }
        }
    })
}
