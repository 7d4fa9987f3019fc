//! Skills: the high-level workflows a turn is routed to.

pub mod builtin;

use std::collections::BTreeSet;

use anyhow::Result;
use tracing::{debug, instrument};

use crate::cancel::CancelToken;
use crate::core::context::Context;
use crate::core::message::Message;
use crate::core::routing::{RouteDecision, decide};
use crate::engine::Engine;
use crate::error::EngineError;
use crate::io::completion::{CompletionService, TokenSink};
use crate::io::prompt::{Choice, PromptEngine};

/// The body of a skill.
///
/// A handler reads the context, may invoke tools through the engine, and must
/// append at least one assistant message before returning.
pub trait SkillHandler {
    fn run(&self, context: &mut Context, engine: &Engine, sink: &mut TokenSink<'_>) -> Result<()>;
}

impl<F> SkillHandler for F
where
    F: Fn(&mut Context, &Engine, &mut TokenSink<'_>) -> Result<()>,
{
    fn run(&self, context: &mut Context, engine: &Engine, sink: &mut TokenSink<'_>) -> Result<()> {
        self(context, engine, sink)
    }
}

/// Registration record for a skill.
pub struct SkillDescriptor {
    name: String,
    description: String,
    handler: Box<dyn SkillHandler>,
}

impl SkillDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: impl SkillHandler + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            handler: Box::new(handler),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn handler(&self) -> &dyn SkillHandler {
        self.handler.as_ref()
    }
}

/// Immutable set of skills with one designated default.
pub struct SkillRegistry {
    skills: Vec<SkillDescriptor>,
    default: usize,
}

impl SkillRegistry {
    pub fn builder() -> SkillRegistryBuilder {
        SkillRegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&SkillDescriptor> {
        self.skills.iter().find(|skill| skill.name == name)
    }

    pub fn default_skill(&self) -> &SkillDescriptor {
        &self.skills[self.default]
    }

    pub fn iter(&self) -> impl Iterator<Item = &SkillDescriptor> {
        self.skills.iter()
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

#[derive(Default)]
pub struct SkillRegistryBuilder {
    skills: Vec<SkillDescriptor>,
    default: Option<String>,
}

impl SkillRegistryBuilder {
    pub fn register(&mut self, skill: SkillDescriptor) -> &mut Self {
        self.skills.push(skill);
        self
    }

    /// Designate the skill unmatched turns fall back to.
    pub fn default_skill(&mut self, name: impl Into<String>) -> &mut Self {
        self.default = Some(name.into());
        self
    }

    pub fn build(self) -> Result<SkillRegistry> {
        let mut seen = BTreeSet::new();
        for skill in &self.skills {
            if !seen.insert(skill.name.as_str()) {
                return Err(EngineError::DuplicateCapability {
                    kind: "skill",
                    name: skill.name.clone(),
                }
                .into());
            }
        }
        let default = self
            .default
            .as_deref()
            .and_then(|name| self.skills.iter().position(|skill| skill.name == name))
            .ok_or(EngineError::MissingDefaultSkill)?;
        Ok(SkillRegistry {
            skills: self.skills,
            default,
        })
    }
}

/// Picks skills (and tools) by asking the completion service to classify the
/// latest request.
pub struct Router<'a> {
    pub completion: &'a dyn CompletionService,
    pub prompts: &'a PromptEngine,
    pub cancel: &'a CancelToken,
}

impl Router<'_> {
    /// One classification query over `choices`.
    pub fn classify(
        &self,
        kind: &str,
        context: &Context,
        choices: &[Choice<'_>],
    ) -> Result<RouteDecision> {
        let request = context.last_user().map(Message::content).unwrap_or_default();
        let prompt = self.prompts.render_classify(kind, request, choices)?;
        self.cancel.checkpoint("before classification")?;
        let reply = self.completion.complete(&[Message::user(prompt)])?;
        self.cancel.checkpoint("after classification")?;
        let decision = decide(&reply, choices.iter().map(|choice| choice.name));
        debug!(kind, reply = reply.trim(), ?decision, "classified request");
        Ok(decision)
    }

    /// Choose the skill for this turn. An explicit `requested` name wins
    /// without a classification query; anything the model answers that is not
    /// a registered skill falls back to the default.
    #[instrument(skip_all, fields(requested = ?requested))]
    pub fn route<'s>(
        &self,
        skills: &'s SkillRegistry,
        context: &Context,
        requested: Option<&str>,
    ) -> Result<(RouteDecision, &'s SkillDescriptor)> {
        if let Some(name) = requested {
            let skill = skills.get(name).ok_or_else(|| EngineError::UnknownSkill {
                name: name.to_string(),
            })?;
            return Ok((RouteDecision::Matched(skill.name.clone()), skill));
        }

        let choices: Vec<Choice<'_>> = skills
            .iter()
            .map(|skill| Choice {
                name: &skill.name,
                description: &skill.description,
            })
            .collect();
        let decision = self.classify("skill", context, &choices)?;
        let skill = match decision.matched().and_then(|name| skills.get(name)) {
            Some(skill) => skill,
            None => {
                debug!(
                    ?decision,
                    fallback = skills.default_skill().name(),
                    "routing fell back to default skill"
                );
                skills.default_skill()
            }
        };
        Ok((decision, skill))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut Context, _: &Engine, _: &mut TokenSink<'_>) -> Result<()> {
        Ok(())
    }

    fn skill(name: &str) -> SkillDescriptor {
        SkillDescriptor::new(name, format!("{name} skill"), noop)
    }

    #[test]
    fn build_requires_registered_default() {
        let mut builder = SkillRegistry::builder();
        builder.register(skill("chat"));
        let err = builder.build().err().expect("missing default");
        assert_eq!(
            err.downcast_ref::<EngineError>(),
            Some(&EngineError::MissingDefaultSkill)
        );

        let mut builder = SkillRegistry::builder();
        builder.register(skill("chat")).default_skill("smalltalk");
        assert!(builder.build().is_err());
    }

    #[test]
    fn build_rejects_duplicate_names() {
        let mut builder = SkillRegistry::builder();
        builder
            .register(skill("chat"))
            .register(skill("chat"))
            .default_skill("chat");
        let err = builder.build().err().expect("duplicate");
        assert_eq!(
            err.downcast_ref::<EngineError>(),
            Some(&EngineError::DuplicateCapability {
                kind: "skill",
                name: "chat".to_string()
            })
        );
    }

    #[test]
    fn registry_exposes_default() {
        let mut builder = SkillRegistry::builder();
        builder
            .register(skill("basic"))
            .register(skill("chat"))
            .default_skill("chat");
        let registry = builder.build().expect("build");
        assert_eq!(registry.default_skill().name(), "chat");
        assert_eq!(registry.len(), 2);
        assert!(registry.get("basic").is_some());
    }
}
