//! Prompt templates rendered with minijinja.
//!
//! Templates live next to this file under `prompts/` and are embedded at
//! compile time, so rendering never touches the filesystem.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;
use serde_json::Value;

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");
const CLASSIFY_TEMPLATE: &str = include_str!("prompts/classify.md");
const SYNTHESIZE_TEMPLATE: &str = include_str!("prompts/synthesize.md");
const EXPLAIN_TEMPLATE: &str = include_str!("prompts/explain.md");

/// One candidate offered to a classification query.
#[derive(Debug, Clone, Serialize)]
pub struct Choice<'a> {
    pub name: &'a str,
    pub description: &'a str,
}

/// Values interpolated into the built-in system prompt.
#[derive(Debug, Clone, Serialize)]
pub struct SystemPromptInputs {
    pub now: String,
    pub user: String,
    pub cwd: String,
    pub read_paths: String,
    pub write_paths: String,
    pub execute: String,
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.add_template("system", SYSTEM_TEMPLATE)
            .context("load system template")?;
        env.add_template("classify", CLASSIFY_TEMPLATE)
            .context("load classify template")?;
        env.add_template("synthesize", SYNTHESIZE_TEMPLATE)
            .context("load synthesize template")?;
        env.add_template("explain", EXPLAIN_TEMPLATE)
            .context("load explain template")?;
        Ok(Self { env })
    }

    pub fn render_system(&self, inputs: &SystemPromptInputs) -> Result<String> {
        let template = self.env.get_template("system")?;
        let rendered = template.render(inputs).context("render system prompt")?;
        Ok(rendered.trim().to_string())
    }

    /// Ask the model to pick one of `options` for `request`. `kind` names
    /// what is being picked ("skill", "tool") in the prompt text.
    pub fn render_classify(
        &self,
        kind: &str,
        request: &str,
        options: &[Choice<'_>],
    ) -> Result<String> {
        let template = self.env.get_template("classify")?;
        let rendered = template
            .render(context! {
                kind => kind,
                request => request.trim(),
                options => options,
            })
            .context("render classify prompt")?;
        Ok(rendered.trim().to_string())
    }

    pub fn render_synthesize(
        &self,
        name: &str,
        description: &str,
        schema: &Value,
        transcript: &str,
    ) -> Result<String> {
        let schema = serde_json::to_string_pretty(schema).context("serialize tool schema")?;
        let template = self.env.get_template("synthesize")?;
        let rendered = template
            .render(context! {
                name => name,
                description => description.trim(),
                schema => schema,
                transcript => transcript.trim(),
            })
            .context("render synthesize prompt")?;
        Ok(rendered.trim().to_string())
    }

    pub fn render_explain(&self, name: &str, description: &str, arguments: &str) -> Result<String> {
        let template = self.env.get_template("explain")?;
        let rendered = template
            .render(context! {
                name => name,
                description => description.trim(),
                arguments => arguments.trim(),
            })
            .context("render explain prompt")?;
        Ok(rendered.trim().to_string())
    }
}
