//! Placeholder substitution in plan values.

use handlebars::Handlebars;
use serde::Serialize;

/// Values available to `{{...}}` placeholders in a plan
#[derive(Debug, Clone, Serialize)]
pub struct RenderContext {
    /// Plan project name
    pub project: String,
    /// Target environment (dev, staging, prod, ...)
    pub environment: String,
    /// Target region
    pub region: String,
    /// Deployment bucket, when one was given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,
}

/// Strict, non-escaping renderer: an unknown placeholder is an error
pub struct PlanRenderer {
    registry: Handlebars<'static>,
    context: RenderContext,
}

impl PlanRenderer {
    /// Renderer bound to one context
    pub fn new(context: RenderContext) -> Self {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(handlebars::no_escape);
        Self { registry, context }
    }

    /// Context in use
    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    /// Substitute placeholders in one value
    pub fn render(&self, value: &str) -> std::result::Result<String, String> {
        if !value.contains("{{") {
            return Ok(value.to_string());
        }
        self.registry
            .render_template(value, &self.context)
            .map_err(|e| match e.reason() {
                handlebars::RenderErrorReason::MissingVariable(Some(name)) => {
                    format!("placeholder '{{{{{name}}}}}' has no value in '{value}'")
                }
                _ => format!("cannot render '{value}': {e}"),
            })
    }
}
