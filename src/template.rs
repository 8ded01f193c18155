//! Template engine: `{{name}}` substitution against a string-keyed map of
//! pure `fn(&Context) -> String` entries.
//!
//! DESIGN DECISION: string-keyed polymorphism, never a name-dispatch match
//! WHY: per the redesign notes, call sites must never branch on the
//! template name — adding a function is purely additive (`register`),
//! mirroring `domain_router.rs`'s keyword-table shape generalized from
//! scoring weights to renderer functions.

use std::collections::HashMap;
use std::sync::Arc;

use crate::atom::normalize_tag;
use crate::context::Context;

pub type TemplateFn = Arc<dyn Fn(&Context) -> String + Send + Sync>;

/// A name -> pure-function map, callers may extend via [`TemplateRegistry::register`]
/// before compiling (§6's `RegisterTemplate`). Names are case-sensitive.
#[derive(Clone)]
pub struct TemplateRegistry {
    functions: HashMap<String, TemplateFn>,
}

impl TemplateRegistry {
    /// Registers the initial set of eight functions from §4.5's table.
    pub fn with_defaults() -> Self {
        let mut registry = TemplateRegistry {
            functions: HashMap::new(),
        };
        registry.register("language", |ctx| {
            ctx.language.as_deref().map(normalize_tag).unwrap_or("unknown").to_string()
        });
        registry.register("shard_type", |ctx| {
            ctx.shard_type.as_deref().map(normalize_tag).unwrap_or("agent").to_string()
        });
        registry.register("operational_mode", |ctx| {
            ctx.operational_mode
                .as_deref()
                .map(normalize_tag)
                .unwrap_or("active")
                .to_string()
        });
        registry.register("campaign_phase", |ctx| {
            ctx.campaign_phase.as_deref().map(normalize_tag).unwrap_or("").to_string()
        });
        registry.register("intent_verb", |ctx| {
            ctx.intent_verb.as_deref().map(normalize_tag).unwrap_or("").to_string()
        });
        registry.register("frameworks", |ctx| {
            ctx.active_frameworks
                .iter()
                .map(|f| normalize_tag(f))
                .collect::<Vec<_>>()
                .join(", ")
        });
        registry.register("token_budget", |ctx| ctx.available_tokens().to_string());
        registry.register("world_states", |ctx| ctx.world_states().join(", "));
        registry
    }

    /// Registers (or replaces) the function for `name`.
    pub fn register(&mut self, name: impl Into<String>, f: impl Fn(&Context) -> String + Send + Sync + 'static) {
        self.functions.insert(name.into(), Arc::new(f));
    }

    /// Substitutes every `{{name}}` occurrence whose name is registered;
    /// unregistered names are left untouched (`TemplateError` is ignored,
    /// never raised, per §7). Fast path: returns a borrowed copy unchanged
    /// when the text contains no `{{` at all.
    pub fn substitute(&self, text: &str, ctx: &Context) -> String {
        if !text.contains("{{") {
            return text.to_string();
        }

        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after_open = &rest[start + 2..];
            match after_open.find("}}") {
                Some(end) => {
                    let name = &after_open[..end];
                    match self.functions.get(name) {
                        Some(f) => out.push_str(&f(ctx)),
                        None => {
                            out.push_str("{{");
                            out.push_str(name);
                            out.push_str("}}");
                        }
                    }
                    rest = &after_open[end + 2..];
                }
                None => {
                    // Unterminated `{{`: leave the remainder untouched.
                    out.push_str(&rest[start..]);
                    rest = "";
                    break;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Context {
        Context {
            shard_type: Some("/coder".to_string()),
            operational_mode: Some("/active".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn substitutes_registered_functions() {
        let registry = TemplateRegistry::with_defaults();
        let out = registry.substitute("You are a {{shard_type}} in {{operational_mode}} mode.", &ctx());
        assert_eq!(out, "You are a coder in active mode.");
    }

    #[test]
    fn fast_path_returns_text_unchanged_without_braces() {
        let registry = TemplateRegistry::with_defaults();
        let out = registry.substitute("no templates here", &ctx());
        assert_eq!(out, "no templates here");
    }

    #[test]
    fn unregistered_name_left_untouched() {
        let registry = TemplateRegistry::with_defaults();
        let out = registry.substitute("{{nope}}", &ctx());
        assert_eq!(out, "{{nope}}");
    }

    #[test]
    fn unterminated_braces_left_untouched() {
        let registry = TemplateRegistry::with_defaults();
        let out = registry.substitute("prefix {{shard_type", &ctx());
        assert_eq!(out, "prefix {{shard_type");
    }

    #[test]
    fn custom_registered_function_is_used() {
        let mut registry = TemplateRegistry::with_defaults();
        registry.register("shout", |_ctx| "LOUD".to_string());
        let out = registry.substitute("{{shout}}", &ctx());
        assert_eq!(out, "LOUD");
    }

    #[test]
    fn world_states_defaults_to_normal() {
        let registry = TemplateRegistry::with_defaults();
        let out = registry.substitute("{{world_states}}", &Context::default());
        assert_eq!(out, "normal");
    }
}
