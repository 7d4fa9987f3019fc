//! Filesystem tools. Every path is checked against the security gate before
//! anything is touched.

use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Value, json};

use super::{
    Authorization, Dependency, Effect, ToolDeps, ToolDescriptor, ToolHandler, ToolOutput, str_arg,
};

#[derive(Debug, Clone, Copy)]
enum Access {
    Read,
    Write,
}

/// Gate check shared by all filesystem tools. `action` completes the denial
/// sentence, e.g. "read file".
fn check_path(
    args: &Value,
    deps: &ToolDeps<'_>,
    access: Access,
    action: &str,
) -> Result<Authorization> {
    let path = str_arg(args, "path")?;
    let gate = deps.gate()?;
    let allowed = match access {
        Access::Read => gate.can_read(path),
        Access::Write => gate.can_write(path),
    };
    if allowed {
        Ok(Authorization::Granted)
    } else {
        Ok(Authorization::Denied(format!(
            "Permission Denied: Cannot {action} at '{path}'."
        )))
    }
}

fn path_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "path": {"type": "string", "description": description},
        },
        "required": ["path"],
        "additionalProperties": false,
    })
}

struct ListDir;

impl ToolHandler for ListDir {
    fn authorize(&self, args: &Value, deps: &ToolDeps<'_>) -> Result<Authorization> {
        check_path(args, deps, Access::Read, "read directory")
    }

    fn call(&self, args: &Value, deps: &ToolDeps<'_>) -> Result<ToolOutput> {
        if let Authorization::Denied(message) = self.authorize(args, deps)? {
            return Ok(ToolOutput::denied(message));
        }
        let path = str_arg(args, "path")?;
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).with_context(|| format!("list directory '{path}'"))? {
            let entry = entry.with_context(|| format!("list directory '{path}'"))?;
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().is_ok_and(|t| t.is_dir()) {
                name.push('/');
            }
            entries.push(name);
        }
        if entries.is_empty() {
            return Ok(ToolOutput::ok("(empty directory)"));
        }
        entries.sort();
        Ok(ToolOutput::ok(entries.join("\n")))
    }
}

pub fn list_dir() -> ToolDescriptor {
    ToolDescriptor::new(
        "list_dir",
        "Lists the entries of a directory. Subdirectories end with '/'.",
        ListDir,
    )
    .schema(path_schema("Directory to list."))
    .effect(Effect::ReadOnly)
    .depends_on(Dependency::SecurityGate)
}

struct ReadFile {
    limit_bytes: usize,
}

impl ToolHandler for ReadFile {
    fn authorize(&self, args: &Value, deps: &ToolDeps<'_>) -> Result<Authorization> {
        check_path(args, deps, Access::Read, "read file")
    }

    fn call(&self, args: &Value, deps: &ToolDeps<'_>) -> Result<ToolOutput> {
        if let Authorization::Denied(message) = self.authorize(args, deps)? {
            return Ok(ToolOutput::denied(message));
        }
        let path = str_arg(args, "path")?;
        let file = fs::File::open(path).with_context(|| format!("read file '{path}'"))?;
        let total = file
            .metadata()
            .with_context(|| format!("read file '{path}'"))?
            .len();
        let mut buf = Vec::new();
        file.take(self.limit_bytes as u64)
            .read_to_end(&mut buf)
            .with_context(|| format!("read file '{path}'"))?;
        let mut text = String::from_utf8_lossy(&buf).into_owned();
        let dropped = total.saturating_sub(buf.len() as u64);
        if dropped > 0 {
            text.push_str(&format!("\n[truncated {dropped} bytes]"));
        }
        Ok(ToolOutput::ok(text))
    }
}

pub fn read_file(limit_bytes: usize) -> ToolDescriptor {
    ToolDescriptor::new(
        "read_file",
        "Reads the content of a text file.",
        ReadFile { limit_bytes },
    )
    .schema(path_schema("File to read."))
    .effect(Effect::ReadOnly)
    .depends_on(Dependency::SecurityGate)
}

struct WriteFile;

impl ToolHandler for WriteFile {
    fn authorize(&self, args: &Value, deps: &ToolDeps<'_>) -> Result<Authorization> {
        check_path(args, deps, Access::Write, "write to file")
    }

    fn call(&self, args: &Value, deps: &ToolDeps<'_>) -> Result<ToolOutput> {
        if let Authorization::Denied(message) = self.authorize(args, deps)? {
            return Ok(ToolOutput::denied(message));
        }
        let path = str_arg(args, "path")?;
        let content = str_arg(args, "content")?;
        if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        fs::write(path, content).with_context(|| format!("write file '{path}'"))?;
        Ok(ToolOutput::ok(format!(
            "Successfully wrote {} bytes to '{path}'.",
            content.len()
        )))
    }
}

pub fn write_file() -> ToolDescriptor {
    ToolDescriptor::new(
        "write_file",
        "Writes text to a file, creating parent directories. Overwrites an existing file.",
        WriteFile,
    )
    .schema(json!({
        "type": "object",
        "properties": {
            "path": {"type": "string", "description": "File to write."},
            "content": {"type": "string", "description": "Full new content of the file."},
        },
        "required": ["path", "content"],
        "additionalProperties": false,
    }))
    .depends_on(Dependency::SecurityGate)
}

struct CreateDir;

impl ToolHandler for CreateDir {
    fn authorize(&self, args: &Value, deps: &ToolDeps<'_>) -> Result<Authorization> {
        check_path(args, deps, Access::Write, "create directory")
    }

    fn call(&self, args: &Value, deps: &ToolDeps<'_>) -> Result<ToolOutput> {
        if let Authorization::Denied(message) = self.authorize(args, deps)? {
            return Ok(ToolOutput::denied(message));
        }
        let path = str_arg(args, "path")?;
        fs::create_dir_all(path).with_context(|| format!("create directory '{path}'"))?;
        Ok(ToolOutput::ok(format!("Directory '{path}' created successfully.")))
    }
}

pub fn create_dir() -> ToolDescriptor {
    ToolDescriptor::new(
        "create_dir",
        "Creates a directory and any missing parent directories.",
        CreateDir,
    )
    .schema(path_schema("Directory to create."))
    .depends_on(Dependency::SecurityGate)
}

struct DeletePath;

impl ToolHandler for DeletePath {
    fn authorize(&self, args: &Value, deps: &ToolDeps<'_>) -> Result<Authorization> {
        check_path(args, deps, Access::Write, "delete")
    }

    fn call(&self, args: &Value, deps: &ToolDeps<'_>) -> Result<ToolOutput> {
        if let Authorization::Denied(message) = self.authorize(args, deps)? {
            return Ok(ToolOutput::denied(message));
        }
        let path = str_arg(args, "path")?;
        let metadata =
            fs::symlink_metadata(path).with_context(|| format!("delete '{path}'"))?;
        if metadata.is_dir() {
            fs::remove_dir(path).with_context(|| format!("delete directory '{path}'"))?;
        } else {
            fs::remove_file(path).with_context(|| format!("delete file '{path}'"))?;
        }
        Ok(ToolOutput::ok(format!("Successfully deleted '{path}'.")))
    }
}

pub fn delete_path() -> ToolDescriptor {
    ToolDescriptor::new(
        "delete_path",
        "Deletes a file or an empty directory.",
        DeletePath,
    )
    .schema(path_schema("File or empty directory to delete."))
    .depends_on(Dependency::SecurityGate)
}
