//! Named prompt templates with deferred, variable-substituting rendering.

use crate::error::{AgentError, AgentResult};
use std::collections::HashMap;
use std::sync::Mutex;

/// Register-once, render-many-times template store.
///
/// Rendering substitutes `{{.var}}` placeholders; a missing variable leaves
/// the placeholder unchanged rather than failing the render.
#[derive(Default)]
pub struct PromptManager {
    templates: Mutex<HashMap<String, String>>,
}

impl PromptManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, template: impl Into<String>) -> AgentResult<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(AgentError::invalid_input("prompt template name must not be empty"));
        }
        self.templates.lock().unwrap().insert(name, template.into());
        Ok(())
    }

    pub fn render(&self, name: &str, variables: &HashMap<String, String>) -> AgentResult<String> {
        let templates = self.templates.lock().unwrap();
        let template = templates
            .get(name)
            .ok_or_else(|| AgentError::not_found(format!("prompt template '{name}'")))?;
        Ok(substitute(template, variables))
    }
}

fn substitute(template: &str, variables: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    loop {
        match rest.find("{{.") {
            None => {
                out.push_str(rest);
                break;
            }
            Some(start) => {
                out.push_str(&rest[..start]);
                let after_marker = &rest[start + 3..];
                match after_marker.find("}}") {
                    None => {
                        // Unterminated placeholder: emit the rest verbatim.
                        out.push_str(&rest[start..]);
                        break;
                    }
                    Some(end) => {
                        let var_name = &after_marker[..end];
                        match variables.get(var_name) {
                            Some(value) => out.push_str(value),
                            None => {
                                out.push_str("{{.");
                                out.push_str(var_name);
                                out.push_str("}}");
                            }
                        }
                        rest = &after_marker[end + 2..];
                    }
                }
            }
        }
    }
    out
}
