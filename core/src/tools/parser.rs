//! Parser for tool calls embedded in model output.
//!
//! ```text
//! [[TOOL_CALL]]
//! name: write_file
//! args: path: notes.txt
//! content: "first line\nsecond line"
//! [[/TOOL_CALL]]
//! ```
//!
//! Arguments are line-oriented `key: value` pairs, optionally prefixed with
//! `args:`. A JSON object after `args:` is also accepted. Quoted values
//! support `\"`, `\\`, `\n` and `\t` and may span lines; an unquoted value
//! is continued by any following line that is not itself `key: value`.

use crate::error::{CoreError, CoreResult};
use crate::traits::ToolArgs;
use serde::Serialize;
use serde_json::Value;

pub const TOOL_CALL_OPEN: &str = "[[TOOL_CALL]]";
pub const TOOL_CALL_CLOSE: &str = "[[/TOOL_CALL]]";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub args: ToolArgs,
    pub raw_block: String,
    /// Filled in after execution.
    pub result: Option<String>,
}

/// Find and parse the first tool-call block in `output`.
///
/// `Ok(None)` when the output contains no block at all.
pub fn parse_tool_call(output: &str) -> CoreResult<Option<ToolInvocation>> {
    let Some(start) = output.find(TOOL_CALL_OPEN) else {
        return Ok(None);
    };
    let body_start = start + TOOL_CALL_OPEN.len();
    let Some(body_len) = output[body_start..].find(TOOL_CALL_CLOSE) else {
        return Err(CoreError::ToolParse(format!(
            "unterminated {TOOL_CALL_OPEN} block (missing {TOOL_CALL_CLOSE})"
        )));
    };
    let body = &output[body_start..body_start + body_len];
    let raw_block = output[start..body_start + body_len + TOOL_CALL_CLOSE.len()].to_string();

    let lines: Vec<&str> = body.lines().collect();
    let Some(name_idx) = lines.iter().position(|l| !l.trim().is_empty()) else {
        return Err(CoreError::ToolParse("empty tool call block".into()));
    };

    let name_line = lines[name_idx].trim();
    let Some(rest) = strip_prefix_ci(name_line, "name:") else {
        return Err(CoreError::ToolParse(format!(
            "expected 'name: <tool>' as the first line, found '{name_line}'"
        )));
    };

    // `name: read_file args: path: a.txt` on a single line.
    let (tool_name, inline_args) = match find_ci(rest, " args:") {
        Some(idx) => (rest[..idx].trim(), Some(rest[idx..].trim())),
        None => (rest.trim(), None),
    };
    if tool_name.is_empty() {
        return Err(CoreError::ToolParse("tool name is empty".into()));
    }

    let mut arg_lines: Vec<&str> = Vec::with_capacity(lines.len());
    arg_lines.extend(inline_args);
    arg_lines.extend(&lines[name_idx + 1..]);

    let args = parse_args(&arg_lines)?;

    Ok(Some(ToolInvocation {
        tool_name: tool_name.to_string(),
        args,
        raw_block,
        result: None,
    }))
}

fn parse_args(lines: &[&str]) -> CoreResult<ToolArgs> {
    let mut args = ToolArgs::new();
    let mut continuing: Option<String> = None;
    let mut i = 0;

    while i < lines.len() {
        let trimmed = lines[i].trim();
        if trimmed.is_empty() {
            i += 1;
            continue;
        }

        let line = strip_prefix_ci(trimmed, "args:").map_or(trimmed, str::trim_start);
        if line.is_empty() {
            continuing = None;
            i += 1;
            continue;
        }

        if line.starts_with('{') && line.len() < trimmed.len() {
            let object = read_json_object(lines, &mut i, line)?;
            for (key, value) in object {
                let value = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                args.insert(key, value);
            }
            continuing = None;
            i += 1;
            continue;
        }

        match split_key_value(line) {
            Some((key, value)) if value.starts_with('"') => {
                let value = read_quoted(lines, &mut i, &value[1..])?;
                args.insert(key.to_string(), value);
                continuing = None;
            }
            Some((key, value)) => {
                args.insert(key.to_string(), value.to_string());
                continuing = Some(key.to_string());
            }
            None => match continuing.as_ref().and_then(|k| args.get_mut(k)) {
                Some(value) => {
                    value.push('\n');
                    value.push_str(trimmed);
                }
                None => tracing::debug!(line = trimmed, "ignoring stray line in tool call"),
            },
        }
        i += 1;
    }

    Ok(args)
}

fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');
    valid.then(|| (key, value.trim()))
}

/// Read a double-quoted value starting just after the opening quote,
/// consuming further lines until the closing quote.
fn read_quoted(lines: &[&str], i: &mut usize, first: &str) -> CoreResult<String> {
    let mut out = String::new();
    let mut current = first;

    loop {
        let mut escaped = false;
        for c in current.chars() {
            if escaped {
                match c {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    '"' => out.push('"'),
                    '\\' => out.push('\\'),
                    other => {
                        out.push('\\');
                        out.push(other);
                    }
                }
                escaped = false;
                continue;
            }
            match c {
                '\\' => escaped = true,
                '"' => return Ok(out),
                c => out.push(c),
            }
        }
        if escaped {
            out.push('\\');
        }

        *i += 1;
        if *i >= lines.len() {
            return Err(CoreError::ToolParse("unterminated quoted value".into()));
        }
        out.push('\n');
        current = lines[*i];
    }
}

fn read_json_object(
    lines: &[&str],
    i: &mut usize,
    first: &str,
) -> CoreResult<serde_json::Map<String, Value>> {
    let mut buf = first.to_string();
    loop {
        if let Some(end) = balanced_end(&buf) {
            return serde_json::from_str(&buf[..end])
                .map_err(|e| CoreError::ToolParse(format!("invalid JSON arguments: {e}")));
        }
        *i += 1;
        if *i >= lines.len() {
            return Err(CoreError::ToolParse("unterminated JSON arguments".into()));
        }
        buf.push('\n');
        buf.push_str(lines[*i]);
    }
}

/// Byte index just past the brace closing the object that opens `text`.
fn balanced_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(idx + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_ascii_lowercase().find(&needle.to_ascii_lowercase())
}
