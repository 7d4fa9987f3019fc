//! Skills shipped with the agent.

use anyhow::Result;
use tracing::debug;

use super::SkillDescriptor;
use crate::core::context::Context;
use crate::core::message::Message;
use crate::engine::Engine;
use crate::io::completion::TokenSink;

/// Name of the conversational fallback skill.
pub const CHAT: &str = "chat";

fn chat(context: &mut Context, engine: &Engine, sink: &mut TokenSink<'_>) -> Result<()> {
    engine.reply(context, sink)?;
    Ok(())
}

fn basic(context: &mut Context, engine: &Engine, sink: &mut TokenSink<'_>) -> Result<()> {
    match engine.equip(context)? {
        Some(tool) => {
            engine.invoke(context, tool.name())?;
        }
        None => {
            debug!("no tool matched, replying without one");
            context.append(Message::system(
                "No available tool fits this request. Tell the user what you can do instead.",
            ));
        }
    }
    engine.reply(context, sink)?;
    Ok(())
}

fn compute(context: &mut Context, engine: &Engine, sink: &mut TokenSink<'_>) -> Result<()> {
    engine.invoke(context, "calculate")?;
    engine.reply(context, sink)?;
    Ok(())
}

pub fn builtin() -> Vec<SkillDescriptor> {
    vec![
        SkillDescriptor::new(
            CHAT,
            "Casual conversation or questions that need no action on the user's machine.",
            chat,
        ),
        SkillDescriptor::new(
            "basic",
            "A request that one tool call can fulfil: listing, reading, writing, creating \
             or deleting files and directories, running a command, or checking the date.",
            basic,
        ),
        SkillDescriptor::new(
            "compute",
            "A calculation or arithmetic question with a numeric answer.",
            compute,
        ),
    ]
}
