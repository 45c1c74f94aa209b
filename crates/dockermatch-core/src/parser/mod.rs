use crate::error::MatchError;
use crate::packages;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Dockerfile instruction keywords. Anything unrecognized parses as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstructionKind {
    From,
    Run,
    Cmd,
    Entrypoint,
    Copy,
    Add,
    Env,
    Arg,
    Label,
    Expose,
    Volume,
    Workdir,
    User,
    Stopsignal,
    Shell,
    Other,
}

impl InstructionKind {
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword.to_uppercase().as_str() {
            "FROM" => InstructionKind::From,
            "RUN" => InstructionKind::Run,
            "CMD" => InstructionKind::Cmd,
            "ENTRYPOINT" => InstructionKind::Entrypoint,
            "COPY" => InstructionKind::Copy,
            "ADD" => InstructionKind::Add,
            "ENV" => InstructionKind::Env,
            "ARG" => InstructionKind::Arg,
            "LABEL" => InstructionKind::Label,
            "EXPOSE" => InstructionKind::Expose,
            "VOLUME" => InstructionKind::Volume,
            "WORKDIR" => InstructionKind::Workdir,
            "USER" => InstructionKind::User,
            "STOPSIGNAL" => InstructionKind::Stopsignal,
            "SHELL" => InstructionKind::Shell,
            _ => InstructionKind::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InstructionKind::From => "FROM",
            InstructionKind::Run => "RUN",
            InstructionKind::Cmd => "CMD",
            InstructionKind::Entrypoint => "ENTRYPOINT",
            InstructionKind::Copy => "COPY",
            InstructionKind::Add => "ADD",
            InstructionKind::Env => "ENV",
            InstructionKind::Arg => "ARG",
            InstructionKind::Label => "LABEL",
            InstructionKind::Expose => "EXPOSE",
            InstructionKind::Volume => "VOLUME",
            InstructionKind::Workdir => "WORKDIR",
            InstructionKind::User => "USER",
            InstructionKind::Stopsignal => "STOPSIGNAL",
            InstructionKind::Shell => "SHELL",
            InstructionKind::Other => "OTHER",
        }
    }

    /// RUN/COPY/ADD produce file-system layers; everything else is
    /// metadata-only.
    pub fn creates_layer(&self) -> bool {
        matches!(
            self,
            InstructionKind::Run | InstructionKind::Copy | InstructionKind::Add
        )
    }
}

impl fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parsed Dockerfile instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerInstruction {
    pub kind: InstructionKind,
    /// Body after the keyword, with line continuations merged.
    pub raw: String,
    /// Tokenized arguments. RUN/LABEL/ENV keep the raw body as a single
    /// element to preserve quoting.
    pub args: Vec<String>,
    /// 1-based line of the instruction's first line.
    pub line_number: usize,
}

/// Structured view of a parsed Dockerfile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerfileAnalysis {
    pub base_image: String,
    /// Stage names from multi-stage `FROM ... AS <name>` instructions.
    pub stages: Vec<String>,
    pub instructions: Vec<DockerInstruction>,
    /// Lower-cased LABEL keys to unquoted values.
    pub labels: BTreeMap<String, String>,
}

impl DockerfileAnalysis {
    /// Layer-creating instructions paired with their index in the full
    /// instruction stream.
    pub fn layer_instructions(&self) -> Vec<(usize, &DockerInstruction)> {
        self.instructions
            .iter()
            .enumerate()
            .filter(|(_, inst)| inst.kind.creates_layer())
            .collect()
    }

    pub fn copy_instructions(&self) -> Vec<(usize, &DockerInstruction)> {
        self.instructions
            .iter()
            .enumerate()
            .filter(|(_, inst)| {
                matches!(inst.kind, InstructionKind::Copy | InstructionKind::Add)
            })
            .collect()
    }

    /// RUN instructions that invoke a package manager.
    pub fn package_commands(&self) -> Vec<&DockerInstruction> {
        self.instructions
            .iter()
            .filter(|inst| {
                inst.kind == InstructionKind::Run && packages::is_package_install(&inst.raw)
            })
            .collect()
    }

    /// Environment variables declared by ENV instructions, later wins.
    pub fn env_vars(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        for inst in &self.instructions {
            if inst.kind == InstructionKind::Env {
                for (key, value) in parse_env_pairs(&inst.raw) {
                    env.insert(key, value);
                }
            }
        }
        env
    }

    /// Exposed ports normalized to `N/proto` (tcp default).
    pub fn exposed_ports(&self) -> Vec<String> {
        let mut ports = Vec::new();
        for inst in &self.instructions {
            if inst.kind == InstructionKind::Expose {
                for arg in &inst.args {
                    if arg.contains('/') {
                        ports.push(arg.clone());
                    } else {
                        ports.push(format!("{}/tcp", arg));
                    }
                }
            }
        }
        ports
    }

    /// Volume paths from VOLUME instructions (JSON array or plain tokens).
    pub fn volumes(&self) -> Vec<String> {
        let mut volumes = Vec::new();
        for inst in &self.instructions {
            if inst.kind == InstructionKind::Volume {
                volumes.extend(parse_volume_body(&inst.raw));
            }
        }
        volumes
    }

    /// The effective working directory (last WORKDIR wins).
    pub fn last_workdir(&self) -> Option<&str> {
        self.instructions
            .iter()
            .rev()
            .find(|inst| inst.kind == InstructionKind::Workdir)
            .map(|inst| inst.raw.trim())
    }

    pub fn cmd(&self) -> Option<&DockerInstruction> {
        self.instructions
            .iter()
            .rev()
            .find(|inst| inst.kind == InstructionKind::Cmd)
    }

    pub fn entrypoint(&self) -> Option<&DockerInstruction> {
        self.instructions
            .iter()
            .rev()
            .find(|inst| inst.kind == InstructionKind::Entrypoint)
    }

    /// The `--platform=` value of the first FROM, if any.
    pub fn platform(&self) -> Option<&str> {
        let from = self
            .instructions
            .iter()
            .find(|inst| inst.kind == InstructionKind::From)?;
        from.raw
            .split_whitespace()
            .find_map(|token| token.strip_prefix("--platform="))
    }
}

/// Parse Dockerfile text into an ordered instruction stream.
///
/// Fails only on an empty stream or a missing FROM; unknown keywords
/// degrade to `Other`.
pub fn parse(content: &str) -> Result<DockerfileAnalysis, MatchError> {
    let instructions = parse_instructions(content);
    if instructions.is_empty() {
        return Err(MatchError::InvalidDockerfile(
            "no instructions found".into(),
        ));
    }

    let mut base_image = String::new();
    let mut stages = Vec::new();
    let mut labels = BTreeMap::new();

    for inst in &instructions {
        match inst.kind {
            InstructionKind::From => {
                let (image, stage) = parse_from_body(&inst.raw);
                if let Some(stage) = stage {
                    stages.push(stage);
                }
                if base_image.is_empty() {
                    base_image = image;
                }
            }
            InstructionKind::Label => parse_labels(&inst.raw, &mut labels),
            _ => {}
        }
    }

    if base_image.is_empty() {
        return Err(MatchError::NoBaseImage);
    }

    Ok(DockerfileAnalysis {
        base_image,
        stages,
        instructions,
        labels,
    })
}

fn parse_instructions(content: &str) -> Vec<DockerInstruction> {
    let mut instructions = Vec::new();
    let mut continuation = String::new();
    let mut line_start = 0;

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if continuation.is_empty() {
            line_start = i + 1;
        }

        if let Some(stripped) = trimmed.strip_suffix('\\') {
            continuation.push_str(stripped.trim_end());
            continuation.push(' ');
            continue;
        }

        let full_line = if continuation.is_empty() {
            trimmed.to_string()
        } else {
            continuation.push_str(trimmed);
            let joined = continuation.clone();
            continuation.clear();
            joined
        };

        if let Some(inst) = parse_single(&full_line, line_start) {
            instructions.push(inst);
        }
    }

    instructions
}

fn parse_single(content: &str, line_number: usize) -> Option<DockerInstruction> {
    let (keyword, body) = match content.split_once(char::is_whitespace) {
        Some((keyword, body)) => (keyword, body.trim()),
        None => (content, ""),
    };
    if keyword.is_empty() {
        return None;
    }

    let kind = InstructionKind::from_keyword(keyword);
    let args = parse_args(kind, body);

    Some(DockerInstruction {
        kind,
        raw: body.to_string(),
        args,
        line_number,
    })
}

fn parse_args(kind: InstructionKind, body: &str) -> Vec<String> {
    match kind {
        // Preserve quoting and `=` for kinds whose body is a command or
        // key/value list.
        InstructionKind::Run | InstructionKind::Label | InstructionKind::Env => {
            vec![body.to_string()]
        }
        InstructionKind::Copy
            if body.starts_with("--from=") || body.starts_with("--chown=") =>
        {
            body.split_whitespace().map(str::to_string).collect()
        }
        _ => body
            .split_whitespace()
            .map(|token| strip_quotes(token).to_string())
            .collect(),
    }
}

fn strip_quotes(token: &str) -> &str {
    let token = token.trim();
    if token.len() >= 2 {
        let bytes = token.as_bytes();
        if (bytes[0] == b'"' && bytes[token.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[token.len() - 1] == b'\'')
        {
            return &token[1..token.len() - 1];
        }
    }
    token
}

/// Split a FROM body into the image reference and optional stage name.
fn parse_from_body(body: &str) -> (String, Option<String>) {
    let tokens: Vec<&str> = body.split_whitespace().collect();
    let mut image = String::new();
    let mut stage = None;

    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        if token.starts_with("--") {
            i += 1;
            continue;
        }
        if token.eq_ignore_ascii_case("as") {
            if let Some(name) = tokens.get(i + 1) {
                stage = Some(name.to_string());
            }
            break;
        }
        if image.is_empty() {
            image = token.to_string();
        }
        i += 1;
    }

    (image, stage)
}

/// Parse a LABEL body in either `k=v [k2=v2 ...]` or `k v` form.
fn parse_labels(body: &str, labels: &mut BTreeMap<String, String>) {
    if body.contains('=') {
        let tokens = match shell_words::split(body) {
            Ok(tokens) => tokens,
            Err(_) => body.split_whitespace().map(str::to_string).collect(),
        };
        for token in tokens {
            if let Some((key, value)) = token.split_once('=') {
                labels.insert(
                    key.trim().to_lowercase(),
                    strip_quotes(value.trim()).to_string(),
                );
            }
        }
    } else {
        let tokens: Vec<&str> = body.split_whitespace().collect();
        if let Some((key, rest)) = tokens.split_first() {
            if !rest.is_empty() {
                labels.insert(
                    key.trim().to_lowercase(),
                    strip_quotes(rest.join(" ").trim()).to_string(),
                );
            }
        }
    }
}

/// Parse an ENV body in either `k=v [k2=v2 ...]` or `k v` form.
fn parse_env_pairs(body: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    if body.contains('=') {
        let tokens = match shell_words::split(body) {
            Ok(tokens) => tokens,
            Err(_) => body.split_whitespace().map(str::to_string).collect(),
        };
        for token in tokens {
            if let Some((key, value)) = token.split_once('=') {
                pairs.push((
                    key.trim().to_string(),
                    strip_quotes(value.trim()).to_string(),
                ));
            }
        }
    } else {
        let tokens: Vec<&str> = body.split_whitespace().collect();
        if let Some((key, rest)) = tokens.split_first() {
            if !rest.is_empty() {
                pairs.push((key.to_string(), strip_quotes(&rest.join(" ")).to_string()));
            }
        }
    }
    pairs
}

/// Parse a VOLUME body as a JSON array or whitespace-separated tokens.
fn parse_volume_body(body: &str) -> Vec<String> {
    let body = body.trim();
    if body.starts_with('[') {
        if let Ok(volumes) = serde_json::from_str::<Vec<String>>(body) {
            return volumes;
        }
    }
    body.split_whitespace()
        .map(|token| strip_quotes(token).to_string())
        .collect()
}
