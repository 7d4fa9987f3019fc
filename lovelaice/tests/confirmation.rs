//! Confirmation gate behavior for side-effecting tools, driven through
//! `Engine::invoke_with` so each test controls the arguments directly.

use std::fs;

use lovelaice::core::confirm::Answer;
use lovelaice::core::context::Context;
use lovelaice::core::message::Message;
use lovelaice::core::scope::ExecutePolicy;
use lovelaice::error::EngineError;
use lovelaice::test_support::{ScriptedCompletion, ScriptedInteraction, engine, gate};
use serde_json::json;

fn context() -> Context {
    let mut context = Context::new();
    context.append(Message::user("please do it"));
    context
}

#[test]
fn explanations_loop_until_the_user_declines() {
    let temp = tempfile::tempdir().expect("tempdir");
    let target = temp.path().join("out.txt");
    let completion = ScriptedCompletion::new(["It writes a file.", "Still writes a file."]);
    let interaction = ScriptedInteraction::new([Answer::Explain, Answer::Explain, Answer::No]);
    let engine = engine(
        &completion,
        &interaction,
        gate(&[temp.path()], &[temp.path()], ExecutePolicy::Deny),
    );

    let mut context = context();
    let result = engine
        .invoke_with(
            &mut context,
            "write_file",
            json!({"path": target.to_string_lossy(), "content": "hello"}),
        )
        .expect("invoke");

    assert!(result.is_declined());
    assert_eq!(result.error.as_deref(), Some("user declined"));
    assert!(!target.exists());
    assert_eq!(completion.calls(), 2);
    assert_eq!(interaction.asked().len(), 3);
    assert_eq!(
        interaction.shown(),
        ["It writes a file.", "Still writes a file."]
    );
    assert_eq!(
        context.last(),
        Some(&Message::system("Tool write_file failed: user declined"))
    );
}

#[test]
fn confirmation_shows_tool_and_arguments() {
    let temp = tempfile::tempdir().expect("tempdir");
    let target = temp.path().join("out.txt");
    let completion = ScriptedCompletion::new(Vec::<String>::new());
    let interaction = ScriptedInteraction::new([Answer::Yes]);
    let engine = engine(
        &completion,
        &interaction,
        gate(&[temp.path()], &[temp.path()], ExecutePolicy::Deny),
    );

    let result = engine
        .invoke_with(
            &mut context(),
            "write_file",
            json!({"path": target.to_string_lossy(), "content": "hello"}),
        )
        .expect("invoke");

    assert!(result.ok);
    assert_eq!(fs::read_to_string(&target).expect("read"), "hello");
    let asked = interaction.asked();
    assert_eq!(asked.len(), 1);
    assert_eq!(asked[0].0, "Run tool `write_file`");
    assert!(asked[0].1.contains(&format!("path: {}", target.display())));
    assert!(asked[0].1.contains("content: hello"));
    assert_eq!(completion.calls(), 0);
}

#[test]
fn read_only_tools_run_without_confirmation() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("a.txt"), "a").expect("write");
    let completion = ScriptedCompletion::new(Vec::<String>::new());
    let interaction = ScriptedInteraction::new([]);
    let engine = engine(
        &completion,
        &interaction,
        gate(&[temp.path()], &[], ExecutePolicy::Deny),
    );

    let mut context = context();
    let listed = engine
        .invoke_with(&mut context, "list_dir", json!({"path": temp.path().to_string_lossy()}))
        .expect("list");
    let computed = engine
        .invoke_with(&mut context, "calculate", json!({"expression": "2 ^ 10"}))
        .expect("calculate");

    assert!(listed.ok);
    assert_eq!(listed.output, "a.txt");
    assert_eq!(computed.output, "2 ^ 10 = 1024");
    assert!(interaction.asked().is_empty());
}

#[test]
fn write_outside_scope_is_denied_before_asking() {
    let temp = tempfile::tempdir().expect("tempdir");
    let inside = temp.path().join("inside");
    fs::create_dir(&inside).expect("mkdir");
    let outside = temp.path().join("outside.txt");
    let completion = ScriptedCompletion::new(Vec::<String>::new());
    let interaction = ScriptedInteraction::new([]);
    let engine = engine(
        &completion,
        &interaction,
        gate(&[&inside], &[&inside], ExecutePolicy::Deny),
    );

    let result = engine
        .invoke_with(
            &mut context(),
            "write_file",
            json!({"path": outside.to_string_lossy(), "content": "x"}),
        )
        .expect("invoke");

    assert!(!result.ok);
    assert!(!result.is_declined());
    assert_eq!(
        result.output,
        format!("Permission Denied: Cannot write to file at '{}'.", outside.display())
    );
    assert!(interaction.asked().is_empty());
    assert!(!outside.exists());
}

#[cfg(unix)]
#[test]
fn write_through_link_behind_missing_directory_is_denied() {
    let temp = tempfile::tempdir().expect("tempdir");
    let project = temp.path().join("project");
    let secret = temp.path().join("secret");
    fs::create_dir(&project).expect("mkdir");
    fs::create_dir(&secret).expect("mkdir");
    std::os::unix::fs::symlink(&secret, project.join("link")).expect("symlink");
    let completion = ScriptedCompletion::new(Vec::<String>::new());
    let interaction = ScriptedInteraction::new([Answer::Yes]);
    let engine = engine(
        &completion,
        &interaction,
        gate(&[&project], &[&project], ExecutePolicy::Deny),
    );

    let sneaky = project.join("missing").join("..").join("link").join("pwned.txt");
    let result = engine
        .invoke_with(
            &mut context(),
            "write_file",
            json!({"path": sneaky.to_string_lossy(), "content": "owned"}),
        )
        .expect("invoke");

    assert!(!result.ok);
    assert!(result.output.starts_with("Permission Denied: Cannot write to file"));
    assert!(interaction.asked().is_empty());
    assert!(!secret.join("pwned.txt").exists());
}

#[test]
fn invocations_record_observations_in_call_order() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = temp.path().join("notes");
    let file = dir.join("todo.txt");
    let completion = ScriptedCompletion::new(Vec::<String>::new());
    let interaction = ScriptedInteraction::new([Answer::Yes, Answer::Yes]);
    let engine = engine(
        &completion,
        &interaction,
        gate(&[temp.path()], &[temp.path()], ExecutePolicy::Deny),
    );

    let mut context = context();
    engine
        .invoke_with(&mut context, "create_dir", json!({"path": dir.to_string_lossy()}))
        .expect("create");
    engine
        .invoke_with(
            &mut context,
            "write_file",
            json!({"path": file.to_string_lossy(), "content": "milk"}),
        )
        .expect("write");

    let tail: Vec<&str> = context.messages()[1..].iter().map(Message::content).collect();
    assert_eq!(
        tail,
        [
            format!("Tool create_dir result: Directory '{}' created successfully.", dir.display()),
            format!("Tool write_file result: Successfully wrote 4 bytes to '{}'.", file.display()),
        ]
    );
    let titles: Vec<String> = interaction.asked().into_iter().map(|(title, _)| title).collect();
    assert_eq!(titles, ["Run tool `create_dir`", "Run tool `write_file`"]);
}

#[test]
fn explicit_arguments_are_validated() {
    let completion = ScriptedCompletion::new(Vec::<String>::new());
    let interaction = ScriptedInteraction::new([]);
    let engine = engine(&completion, &interaction, gate(&[], &[], ExecutePolicy::Deny));

    let result = engine
        .invoke_with(&mut context(), "calculate", json!({"expression": 42}))
        .expect("invoke");
    assert!(!result.ok);
    assert!(
        result
            .error
            .as_deref()
            .is_some_and(|e| e.starts_with("could not build arguments for tool 'calculate':"))
    );
}

#[test]
fn unknown_tool_is_an_engine_error() {
    let completion = ScriptedCompletion::new(Vec::<String>::new());
    let interaction = ScriptedInteraction::new([]);
    let engine = engine(&completion, &interaction, gate(&[], &[], ExecutePolicy::Deny));

    let err = engine
        .invoke_with(&mut context(), "launch_rocket", json!({}))
        .err()
        .expect("unknown tool");
    assert_eq!(
        err.downcast_ref::<EngineError>(),
        Some(&EngineError::UnknownTool {
            name: "launch_rocket".to_string()
        })
    );
}
