use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::warn;

/// Executables whose `-c` argument carries the real command.
const SHELL_EXECUTABLES: [&str; 2] = ["sh", "bash"];

/// A Docker command value before normalization.
///
/// Dockerfile CMD/ENTRYPOINT bodies arrive as text; image-config values
/// arrive as an optional list. Carrying the shape explicitly avoids any
/// runtime type probing.
#[derive(Debug, Clone)]
pub enum CommandInput<'a> {
    Absent,
    Text(&'a str),
    List(&'a [String]),
}

impl<'a> From<Option<&'a Vec<String>>> for CommandInput<'a> {
    fn from(value: Option<&'a Vec<String>>) -> Self {
        match value {
            Some(list) => CommandInput::List(list),
            None => CommandInput::Absent,
        }
    }
}

/// Canonical form of a Docker command value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedCommand {
    pub executable: String,
    pub args: Vec<String>,
    pub shell_form: bool,
    /// The real command when the executable is a POSIX shell invoked with
    /// `-c`. When set, `args` is canonicalized to `["-c", <shell_command>]`.
    pub shell_command: Option<String>,
}

impl NormalizedCommand {
    fn empty() -> Self {
        Self {
            executable: String::new(),
            args: Vec::new(),
            shell_form: false,
            shell_command: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.executable.is_empty() && self.args.is_empty()
    }

    pub fn from_text(text: &str) -> Self {
        normalize(CommandInput::Text(text))
    }

    pub fn from_list(list: &[String]) -> Self {
        normalize(CommandInput::List(list))
    }
}

impl fmt::Display for NormalizedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(shell) = &self.shell_command {
            return write!(f, "{} -c '{}'", self.executable, shell);
        }
        if self.args.is_empty() {
            return write!(f, "{}", self.executable);
        }
        write!(f, "{} {}", self.executable, self.args.join(" "))
    }
}

/// Result of parsing a string/list literal embedded inside a command value.
enum Parsed {
    Text(String),
    List(Vec<String>),
}

/// Convert any Docker command value into its canonical form.
///
/// Never fails: unparseable shell strings degrade to whitespace splitting,
/// unknown shapes normalize to the empty command.
pub fn normalize(input: CommandInput) -> NormalizedCommand {
    match input {
        CommandInput::Absent => NormalizedCommand::empty(),
        CommandInput::List(list) => normalize_list(list),
        CommandInput::Text(text) => normalize_text(text),
    }
}

fn normalize_list(list: &[String]) -> NormalizedCommand {
    if list.is_empty() {
        return NormalizedCommand::empty();
    }

    // A one-element list may wrap a stringified literal (seen in configs
    // rewritten by build tooling); unwrap it recursively.
    if list.len() == 1 {
        if let Some(parsed) = parse_literal(&list[0]) {
            return normalize_parsed(parsed);
        }
    }

    let executable = list[0].trim().to_string();
    let mut args: Vec<String> = list[1..].iter().map(|a| a.trim().to_string()).collect();
    let shell_command = extract_shell_command(&executable, &args);
    if let Some(shell) = &shell_command {
        args = vec!["-c".to_string(), shell.clone()];
    }

    NormalizedCommand {
        executable,
        args,
        shell_form: false,
        shell_command,
    }
}

fn normalize_text(text: &str) -> NormalizedCommand {
    let text = text.trim();
    if text.is_empty() {
        return NormalizedCommand::empty();
    }

    // Exec form written as text: `["echo", "hi"]`.
    if text.starts_with('[') && text.ends_with(']') {
        if let Some(parsed) = parse_literal(text) {
            return normalize_parsed(parsed);
        }
    }

    let parts = match shell_words::split(text) {
        Ok(parts) => parts,
        Err(e) => {
            warn!(command = text, error = %e, "shell tokenization failed, splitting on whitespace");
            text.split_whitespace().map(str::to_string).collect()
        }
    };

    let Some((executable, rest)) = parts.split_first() else {
        return NormalizedCommand::empty();
    };
    let executable = executable.clone();
    let mut args = rest.to_vec();
    let shell_command = extract_shell_command(&executable, &args);
    if let Some(shell) = &shell_command {
        args = vec!["-c".to_string(), shell.clone()];
    }

    NormalizedCommand {
        executable,
        args,
        shell_form: true,
        shell_command,
    }
}

fn normalize_parsed(parsed: Parsed) -> NormalizedCommand {
    match parsed {
        Parsed::Text(text) => normalize_text(&text),
        Parsed::List(list) => normalize_list(&list),
    }
}

/// The joined remainder when `executable` is a shell and the first arg is
/// `-c`, per the exec-form encoding of shell commands.
fn extract_shell_command(executable: &str, args: &[String]) -> Option<String> {
    let name = basename(executable);
    if SHELL_EXECUTABLES.contains(&name) && args.len() >= 2 && args[0] == "-c" {
        return Some(args[1..].join(" "));
    }
    None
}

fn basename(path: &str) -> &str {
    Path::new(path).file_name().and_then(|n| n.to_str()).unwrap_or(path)
}

/// Parse a JSON or Python-style string/list literal.
fn parse_literal(text: &str) -> Option<Parsed> {
    let text = text.trim();

    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(serde_json::Value::Array(items)) => {
            let mut list = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    serde_json::Value::String(s) => list.push(s),
                    other => list.push(other.to_string()),
                }
            }
            return Some(Parsed::List(list));
        }
        Ok(serde_json::Value::String(s)) => return Some(Parsed::Text(s)),
        _ => {}
    }

    // Python-style literals use single quotes, which serde_json rejects.
    if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
        return Some(Parsed::Text(text[1..text.len() - 1].to_string()));
    }
    if text.starts_with('[') && text.ends_with(']') {
        let inner = &text[1..text.len() - 1];
        let items = split_list_items(inner)?;
        return Some(Parsed::List(items));
    }

    None
}

/// Split `'a', 'b c'` on commas outside quotes, stripping item quotes.
fn split_list_items(inner: &str) -> Option<Vec<String>> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in inner.chars() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                } else {
                    current.push(ch);
                }
            }
            None => match ch {
                '\'' | '"' => quote = Some(ch),
                ',' => {
                    let item = current.trim().to_string();
                    if !item.is_empty() {
                        items.push(item);
                    }
                    current.clear();
                }
                _ => current.push(ch),
            },
        }
    }

    if quote.is_some() {
        return None;
    }
    let item = current.trim().to_string();
    if !item.is_empty() {
        items.push(item);
    }
    if items.is_empty() {
        return None;
    }
    Some(items)
}

/// Compare two normalized commands for equality.
///
/// With `ignore_path` set, executables and path-like args are compared by
/// basename, so `/usr/local/bin/python` matches `python`.
pub fn commands_equal(a: &NormalizedCommand, b: &NormalizedCommand, ignore_path: bool) -> bool {
    if a.executable.is_empty() && b.executable.is_empty() {
        return true;
    }

    let exec_a = if ignore_path { basename(&a.executable) } else { &a.executable };
    let exec_b = if ignore_path { basename(&b.executable) } else { &b.executable };
    if exec_a.trim() != exec_b.trim() {
        return false;
    }

    match (&a.shell_command, &b.shell_command) {
        (Some(sa), Some(sb)) => return sa.trim() == sb.trim(),
        (Some(_), None) | (None, Some(_)) => return false,
        (None, None) => {}
    }

    let args_a = normalize_args(&a.args, ignore_path);
    let args_b = normalize_args(&b.args, ignore_path);
    args_a == args_b
}

fn normalize_args(args: &[String], ignore_path: bool) -> Vec<String> {
    args.iter()
        .filter(|a| !a.is_empty())
        .map(|a| {
            let a = a.trim();
            if ignore_path && a.contains('/') {
                basename(a).to_string()
            } else {
                a.to_string()
            }
        })
        .collect()
}
