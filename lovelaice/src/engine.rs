//! The orchestration engine: owns the registries and drives one turn from
//! instruction to streamed reply.

use anyhow::{Context as _, Result, anyhow};
use chrono::Local;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::cancel::CancelToken;
use crate::core::context::Context;
use crate::core::invocation::InvocationResult;
use crate::core::message::Message;
use crate::core::routing::RouteDecision;
use crate::error::EngineError;
use crate::io::completion::{CompletionService, TokenSink};
use crate::io::config::Limits;
use crate::io::interaction::UserInteraction;
use crate::io::prompt::{Choice, PromptEngine, SystemPromptInputs};
use crate::security::{SecurityGate, describe_paths};
use crate::skills::{self, Router, SkillDescriptor, SkillRegistry, SkillRegistryBuilder};
use crate::tools::invoker::Invoker;
use crate::tools::{self, Tool, ToolDescriptor, ToolRegistry, ToolRegistryBuilder};

/// Prior conversation carried from turn to turn (system prompt excluded).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    history: Vec<Message>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing messages, e.g. attached file contents.
    pub fn with_history(history: Vec<Message>) -> Self {
        Self { history }
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    fn archive(&mut self, turn: &[Message]) {
        self.history.extend_from_slice(turn);
    }
}

/// One instruction to process.
#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    pub instruction: String,
    /// Run this skill instead of classifying the instruction.
    pub skill: Option<String>,
}

impl TurnRequest {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            skill: None,
        }
    }

    pub fn with_skill(mut self, skill: impl Into<String>) -> Self {
        self.skill = Some(skill.into());
        self
    }
}

/// Result of a completed turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Skill that handled the turn.
    pub skill: String,
    pub decision: RouteDecision,
    /// Full context of the turn, system prompt included.
    pub context: Context,
    /// The last assistant message of the turn.
    pub reply: String,
}

pub struct Engine {
    completion: Box<dyn CompletionService>,
    interaction: Box<dyn UserInteraction>,
    gate: SecurityGate,
    prompts: PromptEngine,
    system_prompt: String,
    tools: ToolRegistry,
    skills: SkillRegistry,
    cancel: CancelToken,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn gate(&self) -> &SecurityGate {
        &self.gate
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn skills(&self) -> &SkillRegistry {
        &self.skills
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    fn router(&self) -> Router<'_> {
        Router {
            completion: self.completion.as_ref(),
            prompts: &self.prompts,
            cancel: &self.cancel,
        }
    }

    fn invoker(&self) -> Invoker<'_> {
        Invoker {
            completion: self.completion.as_ref(),
            interaction: self.interaction.as_ref(),
            gate: &self.gate,
            prompts: &self.prompts,
            cancel: &self.cancel,
        }
    }

    /// Ask the completion service to answer the conversation so far, stream
    /// the reply to `sink` and append it as an assistant message.
    pub fn reply(&self, context: &mut Context, sink: &mut TokenSink<'_>) -> Result<String> {
        self.cancel.checkpoint("before reply")?;
        let reply = self.completion.chat(context.messages(), sink)?;
        self.cancel.checkpoint("after reply")?;
        context.append(Message::assistant(reply.clone()));
        Ok(reply)
    }

    /// Pick the tool best suited to the latest request, if any.
    pub fn equip(&self, context: &Context) -> Result<Option<&Tool>> {
        let choices: Vec<Choice<'_>> = self
            .tools
            .iter()
            .map(|tool| Choice {
                name: tool.name(),
                description: tool.description(),
            })
            .collect();
        if choices.is_empty() {
            return Ok(None);
        }
        let decision = self.router().classify("tool", context, &choices)?;
        Ok(decision.matched().and_then(|name| self.tools.get(name)))
    }

    /// Invoke a registered tool with arguments synthesized from the context.
    pub fn invoke(&self, context: &mut Context, tool: &str) -> Result<InvocationResult> {
        let tool = self.tool(tool)?;
        self.invoker().invoke(context, tool, None)
    }

    /// Invoke a registered tool with explicit arguments.
    pub fn invoke_with(
        &self,
        context: &mut Context,
        tool: &str,
        args: Value,
    ) -> Result<InvocationResult> {
        let tool = self.tool(tool)?;
        self.invoker().invoke(context, tool, Some(args))
    }

    fn tool(&self, name: &str) -> Result<&Tool> {
        self.tools.get(name).ok_or_else(|| {
            EngineError::UnknownTool {
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Run one turn: route, execute the skill, archive the turn into
    /// `session`. On any error the session is left untouched.
    #[instrument(skip_all, fields(skill = ?request.skill))]
    pub fn run_turn(
        &self,
        session: &mut Session,
        request: TurnRequest,
        sink: &mut TokenSink<'_>,
    ) -> Result<TurnOutcome> {
        self.cancel.reset();
        let mut context = Context::seeded(&self.system_prompt, session.history());
        let turn_start = context.len();
        context.append(Message::user(request.instruction));

        let (decision, skill) = self
            .router()
            .route(&self.skills, &context, request.skill.as_deref())?;
        info!(skill = skill.name(), ?decision, "routed turn");

        skill.handler().run(&mut context, self, sink)?;
        self.cancel.checkpoint("after skill")?;

        let reply = context
            .last_assistant_since(turn_start)
            .map(|message| message.content().to_string())
            .ok_or_else(|| EngineError::NoReply {
                skill: skill.name().to_string(),
            })?;
        session.archive(&context.messages()[turn_start..]);
        debug!(messages = context.len(), history = session.len(), "turn complete");

        Ok(TurnOutcome {
            skill: skill.name().to_string(),
            decision,
            context,
            reply,
        })
    }
}

/// Assembles an [`Engine`]. Registration errors surface from [`build`].
///
/// [`build`]: EngineBuilder::build
#[derive(Default)]
pub struct EngineBuilder {
    completion: Option<Box<dyn CompletionService>>,
    interaction: Option<Box<dyn UserInteraction>>,
    gate: Option<SecurityGate>,
    system_prompt: Option<String>,
    tools: ToolRegistryBuilder,
    skills: SkillRegistryBuilder,
    cancel: CancelToken,
}

impl EngineBuilder {
    pub fn completion(mut self, completion: impl CompletionService + 'static) -> Self {
        self.completion = Some(Box::new(completion));
        self
    }

    pub fn interaction(mut self, interaction: impl UserInteraction + 'static) -> Self {
        self.interaction = Some(Box::new(interaction));
        self
    }

    /// Defaults to a gate that grants nothing.
    pub fn gate(mut self, gate: SecurityGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Replace the built-in system prompt.
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn tool(mut self, tool: ToolDescriptor) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn skill(mut self, skill: SkillDescriptor) -> Self {
        self.skills.register(skill);
        self
    }

    pub fn default_skill(mut self, name: impl Into<String>) -> Self {
        self.skills.default_skill(name);
        self
    }

    /// Share a cancellation token with the caller (e.g. a signal handler).
    pub fn cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Register the built-in tools and skills, with `chat` as the default.
    pub fn with_builtins(mut self, limits: &Limits) -> Self {
        for tool in tools::builtin(limits) {
            self.tools.register(tool);
        }
        for skill in skills::builtin::builtin() {
            self.skills.register(skill);
        }
        self.skills.default_skill(skills::builtin::CHAT);
        self
    }

    pub fn build(self) -> Result<Engine> {
        let completion = self
            .completion
            .ok_or_else(|| anyhow!("engine requires a completion service"))?;
        let interaction = self
            .interaction
            .ok_or_else(|| anyhow!("engine requires a user interaction surface"))?;
        let tools = self.tools.build()?;
        let skills = self.skills.build()?;
        let gate = self.gate.unwrap_or_else(SecurityGate::deny_all);
        let prompts = PromptEngine::new()?;
        let system_prompt = match self.system_prompt {
            Some(prompt) => prompt,
            None => default_system_prompt(&prompts, &gate)?,
        };
        debug!(tools = tools.len(), skills = skills.len(), "engine built");
        Ok(Engine {
            completion,
            interaction,
            gate,
            prompts,
            system_prompt,
            tools,
            skills,
            cancel: self.cancel,
        })
    }
}

fn default_system_prompt(prompts: &PromptEngine, gate: &SecurityGate) -> Result<String> {
    let scope = gate.scope();
    let cwd = std::env::current_dir().context("read working directory")?;
    prompts.render_system(&SystemPromptInputs {
        now: Local::now().format("%A, %B %-d, %Y %H:%M").to_string(),
        user: std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string()),
        cwd: cwd.display().to_string(),
        read_paths: describe_paths(&scope.read_paths),
        write_paths: describe_paths(&scope.write_paths),
        execute: scope.execute.describe(),
    })
}
