use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use erpbridge_core::{BridgeError, BridgeResult, Domain};

use crate::templates::{Template, TEMPLATES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PromptArgument {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
    /// Enumerated values, when the argument is not free text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed: Option<&'static [&'static str]>,
}

/// Advertised shape of one prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptDescriptor {
    pub name: &'static str,
    pub domain: Domain,
    pub description: &'static str,
    pub arguments: &'static [PromptArgument],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedPrompt {
    pub name: String,
    pub text: String,
}

/// Compiled prompt templates.
pub struct PromptCatalog {
    env: Environment<'static>,
}

impl PromptCatalog {
    pub fn new() -> BridgeResult<Self> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_trim_blocks(true);
        for t in TEMPLATES {
            env.add_template(t.name, t.source).map_err(|e| {
                BridgeError::validation(format!("prompt template '{}' does not compile: {e}", t.name))
            })?;
        }
        Ok(Self { env })
    }

    pub fn list(&self) -> Vec<PromptDescriptor> {
        TEMPLATES
            .iter()
            .map(|t| PromptDescriptor {
                name: t.name,
                domain: t.domain,
                description: t.description,
                arguments: t.arguments,
            })
            .collect()
    }

    /// Validate `params` against the prompt's arguments and render it.
    pub fn render(&self, name: &str, params: &JsonValue) -> BridgeResult<RenderedPrompt> {
        let template = TEMPLATES
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| BridgeError::validation(format!("unknown prompt '{name}'")))?;
        let context = arguments(template, params)?;

        let text = self
            .env
            .get_template(template.name)
            .and_then(|t| t.render(&context))
            .map_err(|e| BridgeError::validation(format!("cannot render prompt '{name}': {e}")))?;
        debug!(prompt = name, "rendered prompt");
        Ok(RenderedPrompt {
            name: template.name.to_string(),
            text,
        })
    }
}

fn arguments(template: &Template, params: &JsonValue) -> BridgeResult<Map<String, JsonValue>> {
    let given = match params {
        JsonValue::Null => Map::new(),
        JsonValue::Object(map) => map.clone(),
        _ => {
            return Err(BridgeError::validation(format!(
                "arguments of prompt '{}' must be an object",
                template.name
            )));
        }
    };
    if let Some(unknown) = given
        .keys()
        .find(|k| !template.arguments.iter().any(|a| a.name == k.as_str()))
    {
        return Err(BridgeError::validation(format!(
            "prompt '{}' has no argument '{unknown}'",
            template.name
        )));
    }

    let mut context = Map::new();
    for arg in template.arguments {
        let value = match given.get(arg.name) {
            None | Some(JsonValue::Null) if arg.required => {
                return Err(BridgeError::validation(format!(
                    "prompt '{}' requires argument '{}'",
                    template.name, arg.name
                )));
            }
            None | Some(JsonValue::Null) => JsonValue::Null,
            Some(JsonValue::String(s)) if !s.trim().is_empty() => {
                if let Some(allowed) = arg.allowed.filter(|a| !a.contains(&s.as_str())) {
                    return Err(BridgeError::validation(format!(
                        "argument '{}' must be one of: {} (got '{s}')",
                        arg.name,
                        allowed.join(", ")
                    )));
                }
                JsonValue::String(s.trim().to_string())
            }
            Some(_) => {
                return Err(BridgeError::validation(format!(
                    "argument '{}' must be a non-empty string",
                    arg.name
                )));
            }
        };
        context.insert(arg.name.to_string(), value);
    }
    Ok(context)
}
