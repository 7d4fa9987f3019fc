//! `execute_command`: run a program with explicit arguments, no shell.

use std::process::Command;
use std::time::Duration;

use anyhow::Result;
use serde_json::{Value, json};
use tracing::info;

use super::{
    Authorization, Dependency, ToolDeps, ToolDescriptor, ToolHandler, ToolOutput, str_arg,
};
use crate::io::process::{CommandOutput, is_not_found, run_command_with_timeout};

struct ExecuteCommand {
    timeout: Duration,
    output_limit_bytes: usize,
}

/// Split `command` into the program and any arguments written inline, then
/// append the explicit `args`.
fn command_line(args: &Value) -> Result<(String, Vec<String>)> {
    let command = str_arg(args, "command")?;
    let mut tokens = command.split_whitespace().map(str::to_string);
    let program = tokens.next().unwrap_or_default();
    let mut argv: Vec<String> = tokens.collect();
    if let Some(extra) = args.get("args").and_then(Value::as_array) {
        argv.extend(extra.iter().filter_map(Value::as_str).map(str::to_string));
    }
    Ok((program, argv))
}

impl ToolHandler for ExecuteCommand {
    fn authorize(&self, args: &Value, deps: &ToolDeps<'_>) -> Result<Authorization> {
        let command = str_arg(args, "command")?;
        let gate = deps.gate()?;
        if gate.can_execute(command) {
            return Ok(Authorization::Granted);
        }
        Ok(Authorization::Denied(format!(
            "Permission Denied: The command '{}' is not allowed.\nAllowed commands: {}",
            command.trim(),
            gate.execute_policy().describe()
        )))
    }

    fn call(&self, args: &Value, deps: &ToolDeps<'_>) -> Result<ToolOutput> {
        if let Authorization::Denied(message) = self.authorize(args, deps)? {
            return Ok(ToolOutput::denied(message));
        }
        let (program, argv) = command_line(args)?;
        info!(program, args = ?argv, "executing command");

        let mut cmd = Command::new(&program);
        cmd.args(&argv);
        let output = match run_command_with_timeout(cmd, self.timeout, self.output_limit_bytes) {
            Ok(output) => output,
            Err(err) if is_not_found(&err) => {
                return Ok(ToolOutput::failed(format!(
                    "Error: Command '{program}' not found in system PATH."
                )));
            }
            Err(err) => return Err(err),
        };
        Ok(render(&output, self.timeout))
    }
}

fn render(output: &CommandOutput, timeout: Duration) -> ToolOutput {
    let sections: Vec<String> = [
        ("STDOUT", "stdout", &output.stdout),
        ("STDERR", "stderr", &output.stderr),
    ]
    .into_iter()
    .filter(|(_, _, capture)| !capture.is_blank())
    .map(|(title, stream, capture)| format!("--- {title} ---\n{}", capture.render(stream)))
    .collect();
    let body = if sections.is_empty() {
        "Command executed with no output.".to_string()
    } else {
        sections.join("\n\n")
    };

    if output.timed_out {
        return ToolOutput::failed(format!(
            "Command timed out after {} seconds and was killed.\n\n{body}",
            timeout.as_secs()
        ));
    }
    if output.status.success() {
        return ToolOutput::ok(body);
    }
    let status = match output.status.code() {
        Some(code) => format!("Command exited with code {code}."),
        None => "Command was terminated by a signal.".to_string(),
    };
    ToolOutput::failed(format!("{body}\n\n{status}"))
}

pub fn execute_command(timeout: Duration, output_limit_bytes: usize) -> ToolDescriptor {
    ToolDescriptor::new(
        "execute_command",
        "Executes a program with a list of arguments (no shell: pipes, globs and \
         redirections are not interpreted). The program must be allowed by the \
         execute scope.",
        ExecuteCommand {
            timeout,
            output_limit_bytes,
        },
    )
    .schema(json!({
        "type": "object",
        "properties": {
            "command": {"type": "string", "description": "Program to run, e.g. 'git'."},
            "args": {
                "type": "array",
                "items": {"type": "string"},
                "description": "Arguments passed to the program.",
            },
        },
        "required": ["command"],
        "additionalProperties": false,
    }))
    .depends_on(Dependency::SecurityGate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scope::{ExecutePolicy, SecurityScope};
    use crate::security::SecurityGate;
    use crate::test_support::ScriptedCompletion;

    fn run(policy: ExecutePolicy, args: Value) -> Result<ToolOutput> {
        let gate = SecurityGate::new(SecurityScope {
            execute: policy,
            ..SecurityScope::default()
        });
        let completion = ScriptedCompletion::new(Vec::<String>::new());
        let declared = [Dependency::SecurityGate];
        let deps = ToolDeps::new("execute_command", &declared, &gate, &completion);
        let handler = ExecuteCommand {
            timeout: Duration::from_secs(5),
            output_limit_bytes: 1024,
        };
        handler.call(&args, &deps)
    }

    #[test]
    fn splits_inline_arguments() {
        let (program, argv) =
            command_line(&json!({"command": "git log", "args": ["-n", "1"]})).expect("parse");
        assert_eq!(program, "git");
        assert_eq!(argv, ["log", "-n", "1"]);
    }

    #[test]
    fn command_outside_allow_list_is_denied() {
        let out = run(
            ExecutePolicy::allow_list(["git"]),
            json!({"command": "rm", "args": ["-rf", "/"]}),
        )
        .expect("call");
        assert!(!out.ok);
        assert_eq!(
            out.text,
            "Permission Denied: The command 'rm' is not allowed.\nAllowed commands: git"
        );
    }

    #[cfg(unix)]
    #[test]
    fn path_qualified_program_does_not_match_bare_name() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("tempdir");
        let fake = temp.path().join("git");
        std::fs::write(&fake, "#!/bin/sh\necho impostor ran\n").expect("write");
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        let command = fake.to_string_lossy().into_owned();

        let out = run(ExecutePolicy::allow_list(["git"]), json!({"command": command}))
            .expect("call");
        assert!(!out.ok);
        assert!(out.text.starts_with(&format!(
            "Permission Denied: The command '{command}' is not allowed."
        )));
        assert!(!out.text.contains("impostor ran"));
    }

    #[cfg(unix)]
    #[test]
    fn formats_stdout_and_stderr_sections() {
        let out = run(
            ExecutePolicy::AllowAll,
            json!({"command": "sh", "args": ["-c", "echo out; echo err >&2"]}),
        )
        .expect("call");
        assert_eq!(out, ToolOutput::ok("--- STDOUT ---\nout\n\n--- STDERR ---\nerr"));
    }

    #[cfg(unix)]
    #[test]
    fn silent_command_reports_no_output() {
        let out =
            run(ExecutePolicy::allow_list(["true"]), json!({"command": "true"})).expect("call");
        assert_eq!(out, ToolOutput::ok("Command executed with no output."));
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_not_ok() {
        let out = run(
            ExecutePolicy::AllowAll,
            json!({"command": "sh", "args": ["-c", "exit 4"]}),
        )
        .expect("call");
        assert!(!out.ok);
        assert!(out.text.ends_with("Command exited with code 4."));
    }

    #[test]
    fn missing_program_is_reported() {
        let out = run(
            ExecutePolicy::AllowAll,
            json!({"command": "lovelaice-definitely-missing-binary"}),
        )
        .expect("call");
        assert_eq!(
            out,
            ToolOutput::failed(
                "Error: Command 'lovelaice-definitely-missing-binary' not found in system PATH."
            )
        );
    }
}
