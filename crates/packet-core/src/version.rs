//! Version token extraction and constraint matching.
//!
//! Stored archives carry their version in the file name
//! (`app-1.2.3.zip`, `tool_v2.0.tar.gz`). Extraction never fails: a name
//! without a recognizable token yields an empty string, which callers treat
//! as "unverifiable" rather than as version zero.

use once_cell::sync::Lazy;
use regex::Regex;
use semver::{Version, VersionReq};

use crate::archive::ArchiveFormat;
use crate::error::{PacketError, PacketResult};

static VERSION_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[-_v]?(\d+\.\d+(?:\.\d+)?(?:-[a-zA-Z0-9]+)?)$").expect("version token regex")
});

static OPERATOR_SPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([<>=!~^]+)\s+").expect("operator whitespace regex"));

static HYPHEN_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\S+)\s+-\s+(\S+)").expect("hyphen range regex"));

/// Extract the version token from an archive file name.
///
/// One recognized archive suffix is stripped first; the token must sit at the
/// very end of what remains.
pub fn extract_version(file_name: &str) -> String {
    locate_version(strip_archive_suffix(file_name))
        .map(|(_, token)| token.to_string())
        .unwrap_or_default()
}

/// A remote file name split into its package prefix and version token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedName<'a> {
    /// Everything before the version token, separator included (`app-`).
    pub prefix: &'a str,
    /// Version token (`1.2.3`), empty when none was found.
    pub version: &'a str,
    pub format: ArchiveFormat,
}

impl<'a> VersionedName<'a> {
    /// Split `file_name`; returns `None` when it is not a recognized archive.
    pub fn parse(file_name: &'a str) -> Option<Self> {
        let (stem, format) = ArchiveFormat::split_file_name(file_name)?;
        let (prefix, version) = match locate_version(stem) {
            Some((start, token)) => (&stem[..start], token),
            None => (stem, ""),
        };
        Some(Self {
            prefix,
            version,
            format,
        })
    }

    /// Whether this archive belongs to package `name`.
    pub fn belongs_to(&self, name: &str) -> bool {
        self.prefix.starts_with(&format!("{name}-"))
    }
}

fn strip_archive_suffix(file_name: &str) -> &str {
    ArchiveFormat::split_file_name(file_name)
        .map(|(stem, _)| stem)
        .unwrap_or(file_name)
}

/// Byte offset and text of the trailing version token.
fn locate_version(stem: &str) -> Option<(usize, &str)> {
    VERSION_TOKEN
        .captures(stem)
        .and_then(|caps| caps.get(1))
        .map(|token| (token.start(), token.as_str()))
}

/// Parse a version leniently: an optional leading `v`, and a missing minor or
/// patch component defaults to zero (`2.0` is `2.0.0`).
pub fn parse_version(raw: &str) -> Result<Version, semver::Error> {
    let raw = raw.trim();
    let raw = raw
        .strip_prefix('v')
        .or_else(|| raw.strip_prefix('V'))
        .unwrap_or(raw);

    let core_end = raw.find(|c: char| c == '-' || c == '+').unwrap_or(raw.len());
    let (core, rest) = raw.split_at(core_end);
    let padded = match core.split('.').count() {
        1 if !core.is_empty() => format!("{core}.0.0{rest}"),
        2 => format!("{core}.0{rest}"),
        _ => raw.to_string(),
    };
    Version::parse(&padded)
}

/// A normalized semantic-version range.
///
/// Alternatives are separated by `||`; comparators inside one alternative are
/// joined by commas or whitespace and must all hold. `A - B` is the inclusive
/// range `>=A, <=B`, and `!=X` splits its alternative into `<X` or `>X`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    raw: String,
    alternatives: Vec<VersionReq>,
}

impl Constraint {
    /// Parse a constraint expression. An empty expression matches everything.
    pub fn parse(expr: &str) -> PacketResult<Self> {
        let raw = expr.trim().to_string();
        if raw.is_empty() {
            return Ok(Self {
                raw,
                alternatives: Vec::new(),
            });
        }

        let mut alternatives = Vec::new();
        for alternative in raw.split("||") {
            let expanded = normalize(alternative);
            if expanded.is_empty() {
                return Err(PacketError::version("", raw.as_str(), None));
            }
            for normalized in expanded {
                let req = VersionReq::parse(&normalized)
                    .map_err(|e| PacketError::version("", raw.as_str(), Some(e)))?;
                alternatives.push(req);
            }
        }

        Ok(Self { raw, alternatives })
    }

    /// The expression as given by the caller, trimmed.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether this constraint accepts every version.
    pub fn is_any(&self) -> bool {
        self.alternatives.is_empty()
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.is_any() || self.alternatives.iter().any(|req| req.matches(version))
    }

    /// Parse `version` and check it. Parse failures carry both raw strings.
    pub fn check(&self, version: &str) -> PacketResult<bool> {
        if self.is_any() {
            return Ok(true);
        }
        let parsed = parse_version(version)
            .map_err(|e| PacketError::version(version.trim(), self.raw.as_str(), Some(e)))?;
        Ok(self.matches(&parsed))
    }
}

impl std::fmt::Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_any() {
            f.write_str("*")
        } else {
            f.write_str(&self.raw)
        }
    }
}

/// Check `version` against `constraint`. An empty constraint always matches.
pub fn matches(version: &str, constraint: &str) -> PacketResult<bool> {
    let version = version.trim();
    let constraint = constraint.trim();
    if constraint.is_empty() {
        return Ok(true);
    }

    let parsed = parse_version(version)
        .map_err(|e| PacketError::version(version, constraint, Some(e)))?;
    let parsed_constraint = Constraint::parse(constraint).map_err(|e| match e {
        PacketError::Version { source, .. } => PacketError::version(version, constraint, source),
        other => other,
    })?;
    Ok(parsed_constraint.matches(&parsed))
}

/// Rewrite one `||` alternative into `VersionReq` syntax.
///
/// Hyphen ranges become a bound pair, whitespace after operators collapses,
/// bare versions get an explicit `=`. Each `!=X` doubles the result, one copy
/// with `<X` and one with `>X`. Empty input yields no requirement at all.
fn normalize(alternative: &str) -> Vec<String> {
    let ranged = HYPHEN_RANGE.replace_all(alternative.trim(), ">=$1 <=$2");
    let collapsed = OPERATOR_SPACE.replace_all(&ranged, "$1");

    let mut branches: Vec<Vec<String>> = vec![Vec::new()];
    let mut any = false;
    for part in collapsed
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
    {
        any = true;
        let comparator = normalize_comparator(part);
        match comparator.strip_prefix("!=") {
            Some(version) => {
                branches = branches
                    .into_iter()
                    .flat_map(|branch| {
                        ["<", ">"].map(|op| {
                            let mut next = branch.clone();
                            next.push(format!("{op}{version}"));
                            next
                        })
                    })
                    .collect();
            }
            None => branches.iter_mut().for_each(|b| b.push(comparator.clone())),
        }
    }

    if !any {
        return Vec::new();
    }
    branches.into_iter().map(|b| b.join(", ")).collect()
}

fn normalize_comparator(comparator: &str) -> String {
    let op_len = comparator
        .find(|c: char| !matches!(c, '<' | '>' | '=' | '!' | '~' | '^'))
        .unwrap_or(comparator.len());
    let (op, version) = comparator.split_at(op_len);
    let version = version
        .strip_prefix('v')
        .or_else(|| version.strip_prefix('V'))
        .unwrap_or(version);

    let wildcard = version
        .split('.')
        .any(|part| matches!(part, "*" | "x" | "X"));
    if op.is_empty() && !wildcard && version.starts_with(|c: char| c.is_ascii_digit()) {
        format!("={version}")
    } else {
        format!("{op}{version}")
    }
}
