//! Tools: atomic capabilities a skill can invoke.
//!
//! A tool is described once at build time by a [`ToolDescriptor`]: a unique
//! name, a description shown to the model, a JSON Schema for its arguments,
//! the dependencies its handler needs and whether it has side effects. The
//! [`ToolRegistry`] compiles every schema up front so a broken descriptor
//! fails the build instead of the first invocation.
//!
//! Handlers never reach for global state. Whatever they need is handed to them
//! through [`ToolDeps`], which only exposes the kinds the descriptor declared.

pub mod calculate;
pub mod clock;
pub mod filesystem;
pub mod invoker;
pub mod shell;

use std::collections::BTreeSet;
use std::fmt;

use anyhow::{Context, Result};
use jsonschema::{Draft, Validator};
use serde_json::{Value, json};

use crate::error::EngineError;
use crate::io::completion::CompletionService;
use crate::io::config::Limits;
use crate::security::SecurityGate;

/// Whether invoking a tool changes anything outside the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Effect {
    /// Runs without confirmation.
    ReadOnly,
    /// Requires the user's confirmation before every call.
    #[default]
    SideEffecting,
}

/// A service a tool handler may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dependency {
    SecurityGate,
    Completion,
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dependency::SecurityGate => f.write_str("security gate"),
            Dependency::Completion => f.write_str("completion"),
        }
    }
}

/// Dependencies resolved for one invocation.
pub struct ToolDeps<'a> {
    tool: &'a str,
    declared: &'a [Dependency],
    gate: &'a SecurityGate,
    completion: &'a dyn CompletionService,
}

impl<'a> ToolDeps<'a> {
    pub fn new(
        tool: &'a str,
        declared: &'a [Dependency],
        gate: &'a SecurityGate,
        completion: &'a dyn CompletionService,
    ) -> Self {
        Self {
            tool,
            declared,
            gate,
            completion,
        }
    }

    pub fn gate(&self) -> Result<&'a SecurityGate> {
        self.require(Dependency::SecurityGate)?;
        Ok(self.gate)
    }

    pub fn completion(&self) -> Result<&'a dyn CompletionService> {
        self.require(Dependency::Completion)?;
        Ok(self.completion)
    }

    fn require(&self, kind: Dependency) -> Result<()> {
        if self.declared.contains(&kind) {
            return Ok(());
        }
        Err(EngineError::MissingDependency {
            tool: self.tool.to_string(),
            kind,
        }
        .into())
    }
}

/// What a handler produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub ok: bool,
    pub text: String,
}

impl ToolOutput {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            ok: true,
            text: text.into(),
        }
    }

    /// The action ran but did not succeed (e.g. non-zero exit status).
    pub fn failed(text: impl Into<String>) -> Self {
        Self {
            ok: false,
            text: text.into(),
        }
    }

    /// The security gate refused the action.
    pub fn denied(text: impl Into<String>) -> Self {
        Self::failed(text)
    }
}

/// Pre-execution permission verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    Granted,
    Denied(String),
}

/// The code behind a tool.
pub trait ToolHandler: Send + Sync {
    /// Decide whether `args` would be permitted, before the user is asked to
    /// confirm. Tools that touch nothing guarded keep the default.
    fn authorize(&self, _args: &Value, _deps: &ToolDeps<'_>) -> Result<Authorization> {
        Ok(Authorization::Granted)
    }

    /// Run the tool. Permission denials are returned as
    /// [`ToolOutput::denied`]; `Err` means the tool itself faulted.
    fn call(&self, args: &Value, deps: &ToolDeps<'_>) -> Result<ToolOutput>;
}

/// Registration record for a tool.
pub struct ToolDescriptor {
    name: String,
    description: String,
    schema: Value,
    effect: Effect,
    dependencies: Vec<Dependency>,
    handler: Box<dyn ToolHandler>,
}

impl ToolDescriptor {
    /// A side-effecting tool with no arguments and no dependencies.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: impl ToolHandler + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema: json!({"type": "object", "properties": {}}),
            effect: Effect::default(),
            dependencies: Vec::new(),
            handler: Box::new(handler),
        }
    }

    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }

    pub fn effect(mut self, effect: Effect) -> Self {
        self.effect = effect;
        self
    }

    pub fn depends_on(mut self, dependency: Dependency) -> Self {
        if !self.dependencies.contains(&dependency) {
            self.dependencies.push(dependency);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A registered tool with its compiled argument schema.
pub struct Tool {
    descriptor: ToolDescriptor,
    validator: Validator,
}

impl Tool {
    fn compile(descriptor: ToolDescriptor) -> Result<Self> {
        let validator = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(&descriptor.schema)
            .with_context(|| format!("compile argument schema of tool '{}'", descriptor.name))?;
        Ok(Self {
            descriptor,
            validator,
        })
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn description(&self) -> &str {
        &self.descriptor.description
    }

    pub fn schema(&self) -> &Value {
        &self.descriptor.schema
    }

    pub fn effect(&self) -> Effect {
        self.descriptor.effect
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.descriptor.dependencies
    }

    pub fn handler(&self) -> &dyn ToolHandler {
        self.descriptor.handler.as_ref()
    }

    /// True when the schema declares no properties, so there is nothing for
    /// the model to fill in.
    pub fn takes_no_arguments(&self) -> bool {
        self.schema()
            .get("properties")
            .and_then(Value::as_object)
            .is_none_or(|properties| properties.is_empty())
    }

    /// Check `args` against the compiled schema; all violations are joined.
    pub fn validate(&self, args: &Value) -> std::result::Result<(), String> {
        if self.validator.is_valid(args) {
            return Ok(());
        }
        let messages: Vec<String> = self
            .validator
            .iter_errors(args)
            .map(|err| err.to_string())
            .collect();
        Err(messages.join("; "))
    }
}

/// Immutable set of tools, in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|tool| tool.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tool> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[derive(Default)]
pub struct ToolRegistryBuilder {
    descriptors: Vec<ToolDescriptor>,
}

impl ToolRegistryBuilder {
    pub fn register(&mut self, descriptor: ToolDescriptor) -> &mut Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Compile every schema. Fails on the first duplicate name or invalid schema.
    pub fn build(self) -> Result<ToolRegistry> {
        let mut seen = BTreeSet::new();
        let mut tools = Vec::with_capacity(self.descriptors.len());
        for descriptor in self.descriptors {
            if !seen.insert(descriptor.name.clone()) {
                return Err(EngineError::DuplicateCapability {
                    kind: "tool",
                    name: descriptor.name,
                }
                .into());
            }
            tools.push(Tool::compile(descriptor)?);
        }
        Ok(ToolRegistry { tools })
    }
}

/// The tools shipped with the agent, configured from `limits`.
pub fn builtin(limits: &Limits) -> Vec<ToolDescriptor> {
    vec![
        filesystem::list_dir(),
        filesystem::read_file(limits.read_limit_bytes),
        filesystem::write_file(),
        filesystem::create_dir(),
        filesystem::delete_path(),
        shell::execute_command(limits.command_timeout(), limits.command_output_limit_bytes),
        clock::get_today(),
        calculate::calculate(),
    ]
}

/// Extract a required string argument.
pub(crate) fn str_arg<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .with_context(|| format!("missing string argument '{key}'"))
}
