//! The tool-invocation protocol.
//!
//! One call to [`Invoker::invoke`] goes through argument synthesis, schema
//! validation, dependency resolution, the authorization pre-check, the
//! confirmation gate (side-effecting tools only) and execution, then appends
//! exactly one observation to the context. Only fatal conditions (completion
//! service failure, interaction failure, cancellation) surface as `Err`;
//! everything else becomes an `ok:false` result the skill can react to.

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::{Authorization, Effect, Tool, ToolDeps};
use crate::cancel::CancelToken;
use crate::core::confirm::{Answer, render_arguments};
use crate::core::context::Context;
use crate::core::invocation::InvocationResult;
use crate::core::message::Message;
use crate::error::EngineError;
use crate::io::completion::CompletionService;
use crate::io::interaction::UserInteraction;
use crate::io::prompt::PromptEngine;
use crate::security::SecurityGate;

/// Borrowed view of the engine services a tool call needs.
pub struct Invoker<'a> {
    pub completion: &'a dyn CompletionService,
    pub interaction: &'a dyn UserInteraction,
    pub gate: &'a SecurityGate,
    pub prompts: &'a PromptEngine,
    pub cancel: &'a CancelToken,
}

impl Invoker<'_> {
    /// Run `tool` and append its observation to `context`.
    ///
    /// With `args == None` the arguments are synthesized from the context;
    /// explicit arguments skip synthesis but are still validated.
    #[instrument(skip_all, fields(tool = tool.name()))]
    pub fn invoke(
        &self,
        context: &mut Context,
        tool: &Tool,
        args: Option<Value>,
    ) -> Result<InvocationResult> {
        let result = self.run(context, tool, args)?;
        if result.ok {
            debug!("tool succeeded");
        } else {
            debug!(error = ?result.error, "tool did not succeed");
        }
        context.append(result.to_observation(tool.name()));
        Ok(result)
    }

    fn run(&self, context: &Context, tool: &Tool, args: Option<Value>) -> Result<InvocationResult> {
        self.cancel.checkpoint("before tool arguments")?;
        let args = match self.arguments(context, tool, args) {
            Ok(args) => args,
            Err(err) => match err.downcast_ref::<EngineError>() {
                Some(cause @ EngineError::ParameterSynthesis { .. }) => {
                    warn!(%cause, "argument synthesis failed");
                    return Ok(InvocationResult::failure(cause.to_string()));
                }
                _ => return Err(err),
            },
        };

        let deps = ToolDeps::new(tool.name(), tool.dependencies(), self.gate, self.completion);

        match tool.handler().authorize(&args, &deps) {
            Ok(Authorization::Granted) => {}
            Ok(Authorization::Denied(message)) => {
                info!(%message, "tool call denied before confirmation");
                return Ok(InvocationResult::failed_with_output(message));
            }
            Err(err) => return Ok(InvocationResult::failure(format!("{err:#}"))),
        }

        if tool.effect() == Effect::SideEffecting && !self.confirm(tool, &args)? {
            info!("user declined tool call");
            return Ok(InvocationResult::declined());
        }

        self.cancel.checkpoint("before tool execution")?;
        let outcome = tool.handler().call(&args, &deps);
        self.cancel.checkpoint("after tool execution")?;
        Ok(match outcome {
            Ok(output) if output.ok => InvocationResult::success(output.text),
            Ok(output) => InvocationResult::failed_with_output(output.text),
            Err(err) => InvocationResult::failure(format!("{err:#}")),
        })
    }

    fn arguments(&self, context: &Context, tool: &Tool, provided: Option<Value>) -> Result<Value> {
        let args = match provided {
            Some(args) => args,
            None if tool.takes_no_arguments() => Value::Object(Default::default()),
            None => self.synthesize(context, tool)?,
        };
        tool.validate(&args).map_err(|message| EngineError::ParameterSynthesis {
            tool: tool.name().to_string(),
            message,
        })?;
        Ok(args)
    }

    fn synthesize(&self, context: &Context, tool: &Tool) -> Result<Value> {
        let prompt = self.prompts.render_synthesize(
            tool.name(),
            tool.description(),
            tool.schema(),
            &context.transcript(),
        )?;
        let reply = self.completion.complete(&[Message::user(prompt)])?;
        self.cancel.checkpoint("after tool arguments")?;
        debug!(reply_bytes = reply.len(), "synthesized arguments");
        extract_json_object(&reply).map_err(|message| {
            EngineError::ParameterSynthesis {
                tool: tool.name().to_string(),
                message,
            }
            .into()
        })
    }

    /// Ask until the user says yes or no. Explanations loop back to the
    /// question.
    fn confirm(&self, tool: &Tool, args: &Value) -> Result<bool> {
        let title = format!("Run tool `{}`", tool.name());
        let detail = render_arguments(args);
        loop {
            self.cancel.checkpoint("before confirmation")?;
            let answer = self.interaction.ask(&title, &detail)?;
            self.cancel.checkpoint("after confirmation")?;
            match answer {
                Answer::Yes => return Ok(true),
                Answer::No => return Ok(false),
                Answer::Explain => {
                    let prompt =
                        self.prompts
                            .render_explain(tool.name(), tool.description(), &detail)?;
                    let explanation = self.completion.complete(&[Message::user(prompt)])?;
                    self.cancel.checkpoint("after explanation")?;
                    self.interaction.show(&explanation);
                }
            }
        }
    }
}

/// Pull the JSON object out of a model reply.
///
/// Code fences are dropped and the outermost `{...}` is parsed; anything but
/// a JSON object is rejected.
pub fn extract_json_object(reply: &str) -> std::result::Result<Value, String> {
    let unfenced: String = reply
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n");
    let (Some(start), Some(end)) = (unfenced.find('{'), unfenced.rfind('}')) else {
        return Err("reply contains no JSON object".to_string());
    };
    if end < start {
        return Err("reply contains no JSON object".to_string());
    }
    match serde_json::from_str::<Value>(&unfenced[start..=end]) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err("reply is not a JSON object".to_string()),
        Err(err) => Err(format!("reply is not valid JSON: {err}")),
    }
}
