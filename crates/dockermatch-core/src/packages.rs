use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Package managers recognized inside shell layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackageManager {
    #[serde(rename = "apt")]
    Apt,
    #[serde(rename = "apt-get")]
    AptGet,
    #[serde(rename = "pip")]
    Pip,
    #[serde(rename = "pip3")]
    Pip3,
    #[serde(rename = "npm")]
    Npm,
    #[serde(rename = "yarn")]
    Yarn,
    #[serde(rename = "dnf")]
    Dnf,
    #[serde(rename = "yum")]
    Yum,
    #[serde(rename = "apk")]
    Apk,
}

impl PackageManager {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageManager::Apt => "apt",
            PackageManager::AptGet => "apt-get",
            PackageManager::Pip => "pip",
            PackageManager::Pip3 => "pip3",
            PackageManager::Npm => "npm",
            PackageManager::Yarn => "yarn",
            PackageManager::Dnf => "dnf",
            PackageManager::Yum => "yum",
            PackageManager::Apk => "apk",
        }
    }

    /// All managers, in the order used for prefix matching.
    pub fn all() -> &'static [PackageManager] {
        &[
            PackageManager::Apt,
            PackageManager::AptGet,
            PackageManager::Pip,
            PackageManager::Pip3,
            PackageManager::Npm,
            PackageManager::Yarn,
            PackageManager::Dnf,
            PackageManager::Yum,
            PackageManager::Apk,
        ]
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A package-manager invocation extracted from a shell command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageCommand {
    pub manager: PackageManager,
    pub verb: String,
    pub packages: Vec<String>,
    pub version_constraints: BTreeMap<String, String>,
}

impl PackageCommand {
    /// Render back to a canonical install command. Parsing the result
    /// yields an equal `PackageCommand`, which is what makes package
    /// extraction round-trippable.
    pub fn to_command_string(&self) -> String {
        let mut out = format!("{} {}", self.manager, self.verb);
        for package in &self.packages {
            out.push(' ');
            match self.version_constraints.get(package) {
                Some(constraint) => out.push_str(&render_spec(self.manager, package, constraint)),
                None => out.push_str(package),
            }
        }
        out
    }
}

fn render_spec(manager: PackageManager, name: &str, constraint: &str) -> String {
    match manager {
        PackageManager::Npm | PackageManager::Yarn => format!("{}@{}", name, constraint),
        PackageManager::Pip | PackageManager::Pip3 => {
            if constraint.starts_with(">=")
                || constraint.starts_with("<=")
                || constraint.starts_with("!=")
                || constraint.starts_with("~=")
            {
                format!("{}{}", name, constraint)
            } else {
                format!("{}=={}", name, constraint)
            }
        }
        PackageManager::Apt | PackageManager::AptGet | PackageManager::Apk => {
            format!("{}={}", name, constraint)
        }
        PackageManager::Dnf | PackageManager::Yum => format!("{}-{}", name, constraint),
    }
}

/// Pattern table capturing the packages-region after the verb and flags.
/// Evaluated in order; the first match wins.
static PACKAGE_PATTERNS: Lazy<Vec<(PackageManager, &'static str, Regex)>> = Lazy::new(|| {
    let table: [(PackageManager, &str, &str); 9] = [
        (
            PackageManager::AptGet,
            "install",
            r"apt-get\s+install\s+(?:-\S+\s+)*([^;|&]+)",
        ),
        (
            PackageManager::Apt,
            "install",
            r"apt\s+install\s+(?:-\S+\s+)*([^;|&]+)",
        ),
        (
            PackageManager::Pip,
            "install",
            r"pip[23]?\s+install\s+(?:-\S+\s+)*([^;|&]+)",
        ),
        (
            PackageManager::Pip,
            "install",
            r"python[23]?\s+-m\s+pip\s+install\s+(?:-\S+\s+)*([^;|&]+)",
        ),
        (
            PackageManager::Yum,
            "install",
            r"yum\s+install\s+(?:-\S+\s+)*([^;|&]+)",
        ),
        (
            PackageManager::Dnf,
            "install",
            r"dnf\s+install\s+(?:-\S+\s+)*([^;|&]+)",
        ),
        (
            PackageManager::Apk,
            "add",
            r"apk\s+add\s+(?:-\S+\s+)*([^;|&]+)",
        ),
        (
            PackageManager::Npm,
            "install",
            r"npm\s+install\s+(?:-\S+\s+)*([^;|&]+)",
        ),
        (
            PackageManager::Yarn,
            "add",
            r"yarn\s+add\s+(?:-\S+\s+)*([^;|&]+)",
        ),
    ];
    table
        .into_iter()
        .map(|(manager, verb, pattern)| (manager, verb, Regex::new(pattern).unwrap()))
        .collect()
});

/// Quick check for RUN instructions that install packages. Broader than
/// the extraction table (includes gem) since it only classifies.
static INSTALL_DETECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"apt-get\s+install|apt\s+install|apk\s+add|yum\s+install|dnf\s+install|pip[23]?\s+install|npm\s+install|yarn\s+add|gem\s+install",
    )
    .unwrap()
});

static SHELL_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/bin/sh\s+-c\s+").unwrap());
static SET_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^set\s+-[eux]+;\s*").unwrap());

/// Whether a shell command looks like a package installation.
pub fn is_package_install(command: &str) -> bool {
    INSTALL_DETECT.is_match(&command.to_lowercase())
}

/// Split a compound shell command into atomic commands, respecting quotes.
pub fn split_shell_commands(command: &str) -> Vec<String> {
    let command = SHELL_PREFIX.replace(command, "");
    let command = SET_PREFIX.replace(&command, "");

    let tokens = match shell_words::split(&command) {
        Ok(tokens) => tokens,
        Err(_) => command.split_whitespace().map(str::to_string).collect(),
    };

    let mut commands = Vec::new();
    let mut current: Vec<String> = Vec::new();
    for token in tokens {
        if matches!(token.as_str(), "&&" | "||" | ";" | "|") {
            if !current.is_empty() {
                commands.push(current.join(" "));
                current.clear();
            }
        } else if let Some(stripped) = token.strip_suffix(';') {
            if !stripped.is_empty() {
                current.push(stripped.to_string());
            }
            if !current.is_empty() {
                commands.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(token);
        }
    }
    if !current.is_empty() {
        commands.push(current.join(" "));
    }

    commands
        .iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

/// Trim leading non-digits from a raw version token (`=1.2.3-1` -> `1.2.3-1`).
fn clean_version_string(version: &str) -> &str {
    match version.find(|c: char| c.is_ascii_digit()) {
        Some(idx) => &version[idx..],
        None => version,
    }
}

static SPEC_NPM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([^@]+)@(.+)$").unwrap());
static SPEC_PIP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^=<>!~]+)(==|>=|<=|!=|~=)(\d.*)$").unwrap());
static SPEC_APT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([^=]+)=(.+)$").unwrap());
static SPEC_DNF: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([^-]+)-(\d.*)$").unwrap());

/// Parse a package specification into `(name, version constraint)`.
///
/// The constraint is empty when the token carries no version.
pub fn parse_version_constraint(package: &str, manager: Option<PackageManager>) -> (String, String) {
    use PackageManager::*;

    if let Some(manager) = manager {
        match manager {
            Npm | Yarn => {
                if let Some(caps) = SPEC_NPM.captures(package) {
                    return (caps[1].to_string(), caps[2].to_string());
                }
            }
            Pip | Pip3 => {
                if let Some(caps) = SPEC_PIP.captures(package) {
                    return pip_constraint(&caps);
                }
            }
            Apt | AptGet | Apk => {
                if let Some(caps) = SPEC_APT.captures(package) {
                    return (
                        caps[1].to_string(),
                        clean_version_string(&caps[2]).to_string(),
                    );
                }
            }
            Dnf | Yum => {
                if let Some(caps) = SPEC_DNF.captures(package) {
                    return (caps[1].to_string(), caps[2].to_string());
                }
            }
        }
        return (package.to_string(), String::new());
    }

    // No manager known: try the grammars from most to least specific.
    if let Some(caps) = SPEC_PIP.captures(package) {
        return pip_constraint(&caps);
    }
    if let Some(caps) = SPEC_APT.captures(package) {
        return (
            caps[1].to_string(),
            clean_version_string(&caps[2]).to_string(),
        );
    }
    if let Some(caps) = SPEC_DNF.captures(package) {
        return (caps[1].to_string(), caps[2].to_string());
    }
    (package.to_string(), String::new())
}

fn pip_constraint(caps: &regex::Captures) -> (String, String) {
    let name = caps[1].to_string();
    let op = &caps[2];
    let version = &caps[3];
    if op == "==" {
        (name, version.to_string())
    } else {
        (name, format!("{}{}", op, version))
    }
}

/// Extract the first package-manager invocation from a shell command.
///
/// Returns `None` when the command installs nothing (or only flags and
/// sub-verbs remain after cleanup).
pub fn parse_package_command(command: &str) -> Option<PackageCommand> {
    for atomic in split_shell_commands(command) {
        for (manager, verb, pattern) in PACKAGE_PATTERNS.iter() {
            let Some(caps) = pattern.captures(&atomic) else {
                continue;
            };
            let region = caps[1].trim();
            let tokens = match shell_words::split(region) {
                Ok(tokens) => tokens,
                Err(_) => region.split_whitespace().map(str::to_string).collect(),
            };
            let packages: Vec<String> = tokens
                .into_iter()
                .filter(|t| !t.starts_with('-'))
                .filter(|t| {
                    let lower = t.to_lowercase();
                    !["install", "update", "remove", "purge"]
                        .iter()
                        .any(|verb| lower.contains(verb))
                })
                .collect();
            if packages.is_empty() {
                continue;
            }
            return Some(build_command(*manager, verb, packages));
        }
    }

    // Fallback: exact prefix matching against each manager name.
    parse_by_prefix(&command.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn parse_by_prefix(command: &str) -> Option<PackageCommand> {
    for manager in PackageManager::all() {
        let prefix = format!("{} ", manager);
        let Some(remaining) = command.strip_prefix(&prefix) else {
            continue;
        };
        let mut parts = remaining.split_whitespace();
        let raw_verb = parts.next()?;

        let verb = match raw_verb {
            "add" if matches!(manager, PackageManager::Apk | PackageManager::Yarn) => "add",
            "add" => "install",
            "install" | "i" => "install",
            "update" | "up" => "update",
            "upgrade" => "upgrade",
            _ => continue,
        };

        let region = parts.collect::<Vec<_>>().join(" ");
        let tokens = match shell_words::split(&region) {
            Ok(tokens) => tokens,
            Err(_) => region.split_whitespace().map(str::to_string).collect(),
        };
        let packages: Vec<String> = tokens.into_iter().filter(|t| !t.starts_with('-')).collect();
        if packages.is_empty() {
            return None;
        }
        return Some(build_command(*manager, verb, packages));
    }
    None
}

fn build_command(manager: PackageManager, verb: &str, packages: Vec<String>) -> PackageCommand {
    let mut version_constraints = BTreeMap::new();
    let mut names = Vec::with_capacity(packages.len());
    for package in &packages {
        let (name, constraint) = parse_version_constraint(package, Some(manager));
        if !constraint.is_empty() {
            version_constraints.insert(name.clone(), constraint);
        }
        names.push(name);
    }
    PackageCommand {
        manager,
        verb: verb.to_string(),
        packages: names,
        version_constraints,
    }
}
