//! Base image extraction from a Dockerfile.
//!
//! Only what role classification needs: the image of the final `FROM`
//! stage, with `ARG` defaults declared before the first `FROM` expanded and
//! references to earlier stage aliases resolved to their image.

use std::collections::HashMap;

use tracing::trace;

/// One instruction after continuation joining.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DockerInstruction {
    /// Upper-cased keyword, e.g. `FROM`.
    keyword: String,
    args: String,
    /// Line the instruction starts on.
    line: usize,
}

/// Image the final build stage is based on, or `None` if there is no `FROM`.
pub fn base_image(content: &str) -> Option<String> {
    let mut global_args: HashMap<String, String> = HashMap::new();
    let mut stages: HashMap<String, String> = HashMap::new();
    let mut last: Option<String> = None;

    for instruction in parse_instructions(content) {
        match instruction.keyword.as_str() {
            "ARG" if last.is_none() => {
                for decl in instruction.args.split_whitespace() {
                    let (name, value) = decl.split_once('=').unwrap_or((decl, ""));
                    global_args.insert(name.to_string(), unquote(value).to_string());
                }
            }
            "FROM" => {
                let mut operands = instruction
                    .args
                    .split_whitespace()
                    .skip_while(|w| w.starts_with("--"));
                let Some(image) = operands.next() else {
                    continue;
                };
                let image = expand_args(image, &global_args);
                let image = stages.get(&image.to_ascii_lowercase()).cloned().unwrap_or(image);

                if let (Some(kw), Some(alias)) = (operands.next(), operands.next()) {
                    if kw.eq_ignore_ascii_case("AS") {
                        stages.insert(alias.to_ascii_lowercase(), image.clone());
                    }
                }
                trace!(line = instruction.line, image = %image, "build stage");
                last = Some(image);
            }
            _ => {}
        }
    }

    last.filter(|image| !image.is_empty())
}

/// Split into instructions, joining backslash continuations.
///
/// Blank and comment lines are skipped everywhere, including inside a
/// continuation, so they never end an instruction early.
fn parse_instructions(content: &str) -> Vec<DockerInstruction> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut start_line = 0usize;

    for (idx, raw) in content.lines().enumerate() {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if buf.is_empty() {
            start_line = idx + 1;
        } else {
            buf.push(' ');
        }
        if let Some(head) = trimmed.strip_suffix('\\') {
            buf.push_str(head.trim_end());
            continue;
        }
        buf.push_str(trimmed);
        out.extend(instruction(&buf, start_line));
        buf.clear();
    }

    // Trailing continuation with nothing after it.
    out.extend(instruction(&buf, start_line));
    out
}

fn instruction(text: &str, line: usize) -> Option<DockerInstruction> {
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let keyword = parts.next().unwrap_or_default().to_ascii_uppercase();
    if keyword.is_empty() {
        return None;
    }
    Some(DockerInstruction {
        keyword,
        args: parts.next().unwrap_or_default().trim().to_string(),
        line,
    })
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Expand `$NAME` and `${NAME}`. Unknown names expand to nothing.
fn expand_args(word: &str, args: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(word.len());
    let mut chars = word.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        let mut name = String::new();
        if chars.peek() == Some(&'{') {
            chars.next();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                name.push(c);
            }
            // ${NAME:-default}
            if let Some((var, default)) = name.split_once(":-") {
                match args.get(var).filter(|v| !v.is_empty()) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(default),
                }
                continue;
            }
        } else {
            while let Some(&c) = chars.peek() {
                if !(c.is_ascii_alphanumeric() || c == '_') {
                    break;
                }
                name.push(c);
                chars.next();
            }
        }

        if let Some(value) = args.get(&name) {
            out.push_str(value);
        }
    }
    out
}
