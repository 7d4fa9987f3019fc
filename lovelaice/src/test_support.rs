//! Scripted doubles and fixtures for exercising the engine without a model
//! endpoint or a terminal.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, anyhow};

use crate::cancel::CancelToken;
use crate::core::confirm::Answer;
use crate::core::message::Message;
use crate::core::scope::{ExecutePolicy, SecurityScope};
use crate::engine::Engine;
use crate::io::completion::{CompletionService, TokenSink};
use crate::io::config::Limits;
use crate::io::interaction::UserInteraction;
use crate::security::SecurityGate;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct CompletionState {
    replies: VecDeque<String>,
    requests: Vec<Vec<Message>>,
    cancel_at: Option<(usize, CancelToken)>,
}

/// Completion service that answers with predetermined replies, in order.
///
/// Clones share state, so a test can keep a handle after moving one into the
/// engine. Running out of replies is an error.
#[derive(Clone, Default)]
pub struct ScriptedCompletion {
    state: Arc<Mutex<CompletionState>>,
}

impl ScriptedCompletion {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let state = CompletionState {
            replies: replies.into_iter().map(Into::into).collect(),
            ..CompletionState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Cancel `token` while serving request number `call` (0-based), as a
    /// Ctrl-C during that request would.
    pub fn cancel_at(self, call: usize, token: CancelToken) -> Self {
        lock(&self.state).cancel_at = Some((call, token));
        self
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        lock(&self.state).requests.clone()
    }

    pub fn calls(&self) -> usize {
        lock(&self.state).requests.len()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.state).replies.len()
    }
}

impl CompletionService for ScriptedCompletion {
    fn chat(&self, messages: &[Message], on_token: &mut TokenSink<'_>) -> Result<String> {
        let reply = {
            let mut state = lock(&self.state);
            let call = state.requests.len();
            state.requests.push(messages.to_vec());
            if let Some((_, token)) = state.cancel_at.as_ref().filter(|(at, _)| *at == call) {
                token.cancel();
            }
            state
                .replies
                .pop_front()
                .ok_or_else(|| anyhow!("no scripted reply left for request {call}"))?
        };
        for piece in reply.split_inclusive(' ') {
            on_token(piece);
        }
        Ok(reply)
    }
}

#[derive(Default)]
struct InteractionState {
    answers: VecDeque<Answer>,
    asked: Vec<(String, String)>,
    shown: Vec<String>,
}

/// User interaction that replays predetermined answers and records prompts.
#[derive(Clone, Default)]
pub struct ScriptedInteraction {
    state: Arc<Mutex<InteractionState>>,
}

impl ScriptedInteraction {
    pub fn new<I>(answers: I) -> Self
    where
        I: IntoIterator<Item = Answer>,
    {
        let state = InteractionState {
            answers: answers.into_iter().collect(),
            ..InteractionState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// `(title, detail)` of every confirmation request.
    pub fn asked(&self) -> Vec<(String, String)> {
        lock(&self.state).asked.clone()
    }

    /// Every text passed to `show`.
    pub fn shown(&self) -> Vec<String> {
        lock(&self.state).shown.clone()
    }
}

impl UserInteraction for ScriptedInteraction {
    fn ask(&self, title: &str, detail: &str) -> Result<Answer> {
        let mut state = lock(&self.state);
        state.asked.push((title.to_string(), detail.to_string()));
        state
            .answers
            .pop_front()
            .ok_or_else(|| anyhow!("unexpected confirmation request: {title}"))
    }

    fn show(&self, text: &str) {
        lock(&self.state).shown.push(text.to_string());
    }
}

/// Collects streamed reply fragments.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pieces: Vec<String>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, piece: &str) {
        self.pieces.push(piece.to_string());
    }

    pub fn pieces(&self) -> &[String] {
        &self.pieces
    }

    pub fn text(&self) -> String {
        self.pieces.concat()
    }
}

/// System prompt used by [`engine`], fixed so tests can assert on requests.
pub const TEST_SYSTEM_PROMPT: &str = "You are a test agent.";

/// Gate over explicit scope paths.
pub fn gate(read: &[&Path], write: &[&Path], execute: ExecutePolicy) -> SecurityGate {
    SecurityGate::new(SecurityScope {
        read_paths: read.iter().map(|p| p.to_path_buf()).collect(),
        write_paths: write.iter().map(|p| p.to_path_buf()).collect(),
        execute,
    })
}

/// Engine with the built-in tools and skills, default limits and the
/// [`TEST_SYSTEM_PROMPT`].
pub fn engine(
    completion: &ScriptedCompletion,
    interaction: &ScriptedInteraction,
    gate: SecurityGate,
) -> Engine {
    try_engine(completion, interaction, gate, CancelToken::new())
        .unwrap_or_else(|err| panic!("build test engine: {err:#}"))
}

/// Like [`engine`], sharing `cancel` with the caller.
pub fn try_engine(
    completion: &ScriptedCompletion,
    interaction: &ScriptedInteraction,
    gate: SecurityGate,
    cancel: CancelToken,
) -> Result<Engine> {
    Engine::builder()
        .completion(completion.clone())
        .interaction(interaction.clone())
        .gate(gate)
        .system_prompt(TEST_SYSTEM_PROMPT)
        .cancel_token(cancel)
        .with_builtins(&Limits::default())
        .build()
}
