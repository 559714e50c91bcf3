//! Fixed JSON schemas for the MCP results the validator inspects
//!
//! Schemas are intentionally loose: they require the members the harness relies
//! on and leave everything else open for protocol extensions.

use jsonschema::Validator;
use serde_json::{json, Value};

/// Which result shape a schema describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Initialize,
    ToolsList,
    ToolsCall,
    ResourcesList,
    ResourcesRead,
    PromptsList,
    PromptsGet,
}

impl ResultKind {
    pub fn schema(self) -> Value {
        match self {
            ResultKind::Initialize => json!({
                "type": "object",
                "required": ["protocolVersion", "capabilities", "serverInfo"],
                "properties": {
                    "protocolVersion": {"type": "string"},
                    "capabilities": {"type": "object"},
                    "serverInfo": {
                        "type": "object",
                        "required": ["name", "version"],
                        "properties": {
                            "name": {"type": "string"},
                            "version": {"type": "string"}
                        }
                    },
                    "instructions": {"type": "string"}
                }
            }),
            ResultKind::ToolsList => json!({
                "type": "object",
                "required": ["tools"],
                "properties": {
                    "tools": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["name", "inputSchema"],
                            "properties": {
                                "name": {"type": "string"},
                                "description": {"type": "string"},
                                "inputSchema": {"type": "object"}
                            }
                        }
                    },
                    "nextCursor": {"type": "string"}
                }
            }),
            ResultKind::ToolsCall => json!({
                "type": "object",
                "required": ["content"],
                "properties": {
                    "content": {"type": "array"},
                    "isError": {"type": "boolean"}
                }
            }),
            ResultKind::ResourcesList => json!({
                "type": "object",
                "required": ["resources"],
                "properties": {
                    "resources": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["uri", "name"],
                            "properties": {
                                "uri": {"type": "string"},
                                "name": {"type": "string"},
                                "mimeType": {"type": "string"}
                            }
                        }
                    },
                    "nextCursor": {"type": "string"}
                }
            }),
            ResultKind::ResourcesRead => json!({
                "type": "object",
                "required": ["contents"],
                "properties": {
                    "contents": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["uri"],
                            "properties": {"uri": {"type": "string"}}
                        }
                    }
                }
            }),
            ResultKind::PromptsList => json!({
                "type": "object",
                "required": ["prompts"],
                "properties": {
                    "prompts": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["name"],
                            "properties": {
                                "name": {"type": "string"},
                                "arguments": {"type": "array"}
                            }
                        }
                    },
                    "nextCursor": {"type": "string"}
                }
            }),
            ResultKind::PromptsGet => json!({
                "type": "object",
                "required": ["messages"],
                "properties": {
                    "description": {"type": "string"},
                    "messages": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["role", "content"]
                        }
                    }
                }
            }),
        }
    }
}

/// Compiled validators for every result kind, built once per session
pub struct ResultSchemas {
    validators: Vec<(ResultKind, Validator)>,
}

impl ResultSchemas {
    pub fn new() -> Self {
        let kinds = [
            ResultKind::Initialize,
            ResultKind::ToolsList,
            ResultKind::ToolsCall,
            ResultKind::ResourcesList,
            ResultKind::ResourcesRead,
            ResultKind::PromptsList,
            ResultKind::PromptsGet,
        ];
        let validators = kinds
            .into_iter()
            .filter_map(|kind| match jsonschema::validator_for(&kind.schema()) {
                Ok(v) => Some((kind, v)),
                Err(e) => {
                    tracing::error!("Built-in schema for {:?} does not compile: {}", kind, e);
                    None
                }
            })
            .collect();
        Self { validators }
    }

    /// Validate `instance`, returning every schema error as text
    pub fn check(&self, kind: ResultKind, instance: &Value) -> Result<(), Vec<String>> {
        let Some((_, validator)) = self.validators.iter().find(|(k, _)| *k == kind) else {
            return Ok(());
        };
        let errors: Vec<String> = validator
            .iter_errors(instance)
            .map(|e| e.to_string())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Default for ResultSchemas {
    fn default() -> Self {
        Self::new()
    }
}
