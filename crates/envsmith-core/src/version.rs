//! Semantic version algebra for component compatibility checking.
//!
//! Versions follow `major.minor.patch[-prerelease][+build]` with two
//! parser relaxations the component catalogue relies on:
//!
//! - an optional leading `v` (`v1.2.3`)
//! - partial versions (`1`, `1.2`) with missing fields defaulting to zero
//!
//! Constraints supported:
//! - Exact: `==1.0.0` (a bare version is treated as exact)
//! - Bounds: `>1.0.0`, `>=1.0.0`, `<2.0.0`, `<=2.0.0`
//! - Caret: `^1.2.3` (same-major compatible range)
//! - Tilde: `~1.2.3` (same-minor compatible range)
//! - Range: `1.0.0 - 2.0.0` (inclusive on both ends)
//! - Wildcard: `1.2.*` (same major and minor)

use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::{Error, Result};

static SEMVER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d+)\.(\d+)\.(\d+)(?:-([0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*))?(?:\+([0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*))?$",
    )
    .expect("semver regex is valid")
});

static PARTIAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)(?:\.(\d+))?(?:\.(\d+))?$").expect("partial regex is valid"));

/// A semantic version.
///
/// Ordering is lexicographic over `(major, minor, patch)`; at an equal
/// triple a version carrying a prerelease sorts strictly below the bare
/// version. Build metadata never participates in ordering or equality.
#[derive(Debug, Clone)]
pub struct Version {
    /// Major version component.
    pub major: u64,
    /// Minor version component.
    pub minor: u64,
    /// Patch version component.
    pub patch: u64,
    /// Pre-release identifier (e.g. `alpha`, `beta.1`).
    pub prerelease: Option<String>,
    /// Build metadata (ignored in comparisons).
    pub build: Option<String>,
}

impl Version {
    /// Create a plain release version.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            prerelease: None,
            build: None,
        }
    }

    /// Parse a version string.
    ///
    /// Accepts a leading `v`, full semver, and partial `major[.minor[.patch]]`
    /// forms with missing fields defaulting to zero.
    ///
    /// # Errors
    /// Returns [`Error::VersionParse`] when the input matches neither form.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim().trim_start_matches('v');

        if let Some(caps) = SEMVER_RE.captures(trimmed) {
            return Ok(Self {
                major: caps[1].parse().unwrap_or(0),
                minor: caps[2].parse().unwrap_or(0),
                patch: caps[3].parse().unwrap_or(0),
                prerelease: caps.get(4).map(|m| m.as_str().to_string()),
                build: caps.get(5).map(|m| m.as_str().to_string()),
            });
        }

        if let Some(caps) = PARTIAL_RE.captures(trimmed) {
            return Ok(Self {
                major: caps[1].parse().unwrap_or(0),
                minor: caps.get(2).map_or(0, |m| m.as_str().parse().unwrap_or(0)),
                patch: caps.get(3).map_or(0, |m| m.as_str().parse().unwrap_or(0)),
                prerelease: None,
                build: None,
            });
        }

        Err(Error::VersionParse {
            input: input.to_string(),
        })
    }

    /// The next major release boundary (`(major+1).0.0`).
    #[must_use]
    pub const fn next_major(&self) -> Self {
        Self::new(self.major + 1, 0, 0)
    }

    /// The next minor release boundary (`major.(minor+1).0`).
    #[must_use]
    pub const fn next_minor(&self) -> Self {
        Self::new(self.major, self.minor + 1, 0)
    }

    /// The next patch release boundary (`major.minor.(patch+1)`).
    #[must_use]
    pub const fn next_patch(&self) -> Self {
        Self::new(self.major, self.minor, self.patch + 1)
    }

    /// Whether this is a pre-release version.
    #[must_use]
    pub const fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(ref pre) = self.prerelease {
            write!(f, "-{pre}")?;
        }
        if let Some(ref build) = self.build {
            write!(f, "+{build}")?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.major == other.major
            && self.minor == other.minor
            && self.patch == other.patch
            && self.prerelease == other.prerelease
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.major.hash(state);
        self.minor.hash(state);
        self.patch.hash(state);
        self.prerelease.hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let triple = (self.major, self.minor, self.patch).cmp(&(
            other.major,
            other.minor,
            other.patch,
        ));
        if triple != Ordering::Equal {
            return triple;
        }

        // A prerelease sorts below the corresponding release.
        match (&self.prerelease, &other.prerelease) {
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A predicate over versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constraint {
    /// Exactly this version (`==1.0.0`).
    Exact(Version),
    /// Strictly newer (`>1.0.0`).
    GreaterThan(Version),
    /// At least (`>=1.0.0`).
    GreaterEqual(Version),
    /// Strictly older (`<1.0.0`).
    LessThan(Version),
    /// At most (`<=1.0.0`).
    LessEqual(Version),
    /// Same-major compatible range (`^1.2.3`).
    Caret(Version),
    /// Same-minor compatible range (`~1.2.3`).
    Tilde(Version),
    /// Inclusive range (`1.0.0 - 2.0.0`).
    Range(Version, Version),
    /// Same major and minor (`1.2.*`).
    Wildcard(Version),
}

impl Constraint {
    /// Parse a constraint string.
    ///
    /// A bare version is treated as an exact constraint, matching the way
    /// catalogue files declare pinned dependencies.
    ///
    /// # Errors
    /// Returns [`Error::ConstraintParse`] on unrecognised syntax.
    pub fn parse(input: &str) -> Result<Self> {
        let s = input.trim();

        let parse_rest = |rest: &str| {
            Version::parse(rest).map_err(|_| Error::ConstraintParse {
                input: input.to_string(),
            })
        };

        if let Some(rest) = s.strip_prefix("==") {
            return Ok(Self::Exact(parse_rest(rest)?));
        }
        if let Some(rest) = s.strip_prefix(">=") {
            return Ok(Self::GreaterEqual(parse_rest(rest)?));
        }
        if let Some(rest) = s.strip_prefix("<=") {
            return Ok(Self::LessEqual(parse_rest(rest)?));
        }
        if let Some(rest) = s.strip_prefix('>') {
            return Ok(Self::GreaterThan(parse_rest(rest)?));
        }
        if let Some(rest) = s.strip_prefix('<') {
            return Ok(Self::LessThan(parse_rest(rest)?));
        }
        if let Some(rest) = s.strip_prefix('^') {
            return Ok(Self::Caret(parse_rest(rest)?));
        }
        if let Some(rest) = s.strip_prefix('~') {
            return Ok(Self::Tilde(parse_rest(rest)?));
        }
        if let Some((lo, hi)) = s.split_once(" - ") {
            return Ok(Self::Range(parse_rest(lo.trim())?, parse_rest(hi.trim())?));
        }
        if s.contains('*') {
            let base = s.replace('*', "0");
            return Ok(Self::Wildcard(parse_rest(&base)?));
        }

        Ok(Self::Exact(parse_rest(s)?))
    }

    /// Check whether `version` satisfies this constraint.
    #[must_use]
    pub fn satisfies(&self, version: &Version) -> bool {
        match self {
            Self::Exact(v) => version == v,
            Self::GreaterThan(v) => version > v,
            Self::GreaterEqual(v) => version >= v,
            Self::LessThan(v) => version < v,
            Self::LessEqual(v) => version <= v,
            Self::Caret(v) => {
                let upper = if v.major >= 1 {
                    v.next_major()
                } else if v.minor >= 1 {
                    v.next_minor()
                } else {
                    v.next_patch()
                };
                version >= v && *version < upper
            }
            Self::Tilde(v) => version >= v && *version < v.next_minor(),
            Self::Range(lo, hi) => version >= lo && version <= hi,
            Self::Wildcard(v) => version.major == v.major && version.minor == v.minor,
        }
    }

    /// The reference version the constraint pivots on.
    #[must_use]
    pub const fn reference(&self) -> &Version {
        match self {
            Self::Exact(v)
            | Self::GreaterThan(v)
            | Self::GreaterEqual(v)
            | Self::LessThan(v)
            | Self::LessEqual(v)
            | Self::Caret(v)
            | Self::Tilde(v)
            | Self::Range(v, _)
            | Self::Wildcard(v) => v,
        }
    }

    /// Inclusive lower edge of the versions this constraint can accept,
    /// if it has one.
    #[must_use]
    pub fn lower_bound(&self) -> Option<Version> {
        match self {
            Self::Exact(v)
            | Self::GreaterEqual(v)
            | Self::Caret(v)
            | Self::Tilde(v)
            | Self::Range(v, _) => Some(v.clone()),
            Self::GreaterThan(v) => Some(v.next_patch()),
            Self::Wildcard(v) => Some(Version::new(v.major, v.minor, 0)),
            Self::LessThan(_) | Self::LessEqual(_) => None,
        }
    }

    /// Inclusive upper edge of the versions this constraint can accept,
    /// if it has one. Exclusive native bounds are tightened to the last
    /// patch below them.
    #[must_use]
    pub fn upper_bound(&self) -> Option<Version> {
        let below = |v: &Version| {
            if v.patch > 0 {
                Some(Version::new(v.major, v.minor, v.patch - 1))
            } else if v.minor > 0 {
                Some(Version::new(v.major, v.minor - 1, u64::MAX))
            } else if v.major > 0 {
                Some(Version::new(v.major - 1, u64::MAX, u64::MAX))
            } else {
                None
            }
        };
        match self {
            Self::Exact(v) | Self::LessEqual(v) | Self::Range(_, v) => Some(v.clone()),
            Self::LessThan(v) => below(v),
            Self::Caret(v) => {
                let upper = if v.major >= 1 {
                    v.next_major()
                } else if v.minor >= 1 {
                    v.next_minor()
                } else {
                    v.next_patch()
                };
                below(&upper)
            }
            Self::Tilde(v) => below(&v.next_minor()),
            Self::Wildcard(v) => Some(Version {
                major: v.major,
                minor: v.minor,
                patch: u64::MAX,
                prerelease: None,
                build: None,
            }),
            Self::GreaterThan(_) | Self::GreaterEqual(_) => None,
        }
    }

    /// Check whether two constraints can be satisfied by one version.
    ///
    /// This is the simplified pairwise test used by conflict detection:
    /// constraints are projected onto `[lower, upper]` ranges and the
    /// ranges intersected. Distinct exact pins always conflict.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        if let (Self::Exact(a), Self::Exact(b)) = (self, other) {
            return a == b;
        }

        let lo = match (self.lower_bound(), other.lower_bound()) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let hi = match (self.upper_bound(), other.upper_bound()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        match (lo, hi) {
            (Some(lo), Some(hi)) => lo <= hi,
            _ => true,
        }
    }

    const fn op_str(&self) -> &'static str {
        match self {
            Self::Exact(_) => "==",
            Self::GreaterThan(_) => ">",
            Self::GreaterEqual(_) => ">=",
            Self::LessThan(_) => "<",
            Self::LessEqual(_) => "<=",
            Self::Caret(_) => "^",
            Self::Tilde(_) => "~",
            Self::Range(..) | Self::Wildcard(_) => "",
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Range(lo, hi) => write!(f, "{lo} - {hi}"),
            Self::Wildcard(v) => write!(f, "{}.{}.*", v.major, v.minor),
            other => write!(f, "{}{}", other.op_str(), other.reference()),
        }
    }
}

impl FromStr for Constraint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Constraint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Constraint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Compatibility classification derived from a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompatibilityLevel {
    /// Exact match (score 1.0).
    Perfect,
    /// Score ≥ 0.8.
    High,
    /// Score ≥ 0.6.
    Medium,
    /// Score ≥ 0.4; still compatible.
    Low,
    /// Below 0.4.
    Incompatible,
}

impl CompatibilityLevel {
    /// Classify a score in `[0, 1]`.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 1.0 {
            Self::Perfect
        } else if score >= 0.8 {
            Self::High
        } else if score >= 0.6 {
            Self::Medium
        } else if score >= 0.4 {
            Self::Low
        } else {
            Self::Incompatible
        }
    }
}

impl fmt::Display for CompatibilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Perfect => "perfect",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Incompatible => "incompatible",
        };
        write!(f, "{s}")
    }
}

/// Result of scoring a version against a set of constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityScore {
    /// Aggregate score in `[0, 1]`.
    pub score: f64,
    /// Whether the version is considered compatible (level above incompatible).
    pub is_compatible: bool,
    /// Classification of the score.
    pub level: CompatibilityLevel,
    /// Per-constraint explanations.
    pub reasons: Vec<String>,
    /// Recommended follow-up, when one applies.
    pub suggested_action: Option<String>,
}

impl CompatibilityScore {
    /// Build a score with the level derived automatically.
    #[must_use]
    pub fn from_raw(score: f64, reasons: Vec<String>) -> Self {
        let level = CompatibilityLevel::from_score(score);
        Self {
            score,
            is_compatible: level != CompatibilityLevel::Incompatible,
            level,
            reasons,
            suggested_action: None,
        }
    }

    /// A zero score for unparseable input.
    #[must_use]
    pub fn parse_failure(detail: &str) -> Self {
        Self::from_raw(0.0, vec![format!("version parsing error: {detail}")])
    }
}

/// How a conflicting constraint set could be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionKind {
    /// All bounds intersect; pin the intersection's lower edge.
    Intersection,
    /// A listed available version scores best.
    BestMatch,
    /// No automatic resolution found.
    Manual,
}

/// Feasibility of a suggested resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feasibility {
    /// Straightforward to apply.
    High,
    /// Requires picking among imperfect candidates.
    Medium,
    /// Needs human judgement.
    Low,
}

/// Suggested resolution for a set of (possibly conflicting) constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionSuggestion {
    /// Strategy that produced the suggestion.
    pub kind: ResolutionKind,
    /// Version to pin, when one was found.
    pub recommended: Option<Version>,
    /// Runner-up candidates (best-match strategy only).
    pub alternatives: Vec<Version>,
    /// Actions the caller should take.
    pub actions: Vec<String>,
    /// Confidence in the suggestion.
    pub feasibility: Feasibility,
}

/// Compatibility scorer with memoised results.
///
/// Scoring the same `(version, constraints)` pair is common during graph
/// analysis; results are cached until [`VersionScorer::clear_cache`] is
/// called (e.g. after the component catalogue changes).
#[derive(Debug, Default)]
pub struct VersionScorer {
    cache: RwLock<ahash::AHashMap<String, CompatibilityScore>>,
}

impl VersionScorer {
    /// Create an empty scorer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `version` satisfies `constraint`, both given as strings.
    ///
    /// Malformed input yields `false`, never an error.
    #[must_use]
    pub fn validate(&self, version: &str, constraint: &str) -> bool {
        match (Version::parse(version), Constraint::parse(constraint)) {
            (Ok(v), Ok(c)) => c.satisfies(&v),
            _ => false,
        }
    }

    /// Score an installed version against a set of required constraints.
    ///
    /// Per-constraint scores are 0 on violation and otherwise decay with
    /// semantic distance from the constraint's reference version, floored
    /// at 0.5. The aggregate is the mean, with a 10% bonus (capped at 1.0)
    /// when every constraint is satisfied. Malformed input yields a zero
    /// score with a parsing-error reason.
    #[must_use]
    pub fn score(&self, installed: &str, constraints: &[String]) -> CompatibilityScore {
        let mut sorted: Vec<&str> = constraints.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        let cache_key = format!("{installed}:{}", sorted.join(":"));

        if let Some(hit) = self.cache.read().get(&cache_key) {
            return hit.clone();
        }

        let result = self.score_uncached(installed, constraints);
        self.cache.write().insert(cache_key, result.clone());
        result
    }

    fn score_uncached(&self, installed: &str, constraints: &[String]) -> CompatibilityScore {
        let version = match Version::parse(installed) {
            Ok(v) => v,
            Err(e) => return CompatibilityScore::parse_failure(&e.to_string()),
        };

        let mut parsed = Vec::with_capacity(constraints.len());
        for raw in constraints {
            match Constraint::parse(raw) {
                Ok(c) => parsed.push(c),
                Err(e) => return CompatibilityScore::parse_failure(&e.to_string()),
            }
        }

        let mut total = 0.0;
        let mut satisfied = 0usize;
        let mut reasons = Vec::with_capacity(parsed.len());

        for constraint in &parsed {
            if constraint.satisfies(&version) {
                satisfied += 1;
                total += constraint_score(&version, constraint);
                reasons.push(format!("satisfies {constraint}"));
            } else {
                reasons.push(format!("violates {constraint}"));
            }
        }

        let mut score = if parsed.is_empty() {
            1.0
        } else {
            total / parsed.len() as f64
        };

        if satisfied > 0 && satisfied == parsed.len() {
            score = (score * 1.1).min(1.0);
        } else if satisfied == 0 && !parsed.is_empty() {
            score = 0.0;
        }

        let mut result = CompatibilityScore::from_raw(score, reasons);
        result.suggested_action = Some(suggest_action(&version, &parsed, &result));
        result
    }

    /// Find all compatible versions among `available`, best first.
    #[must_use]
    pub fn find_compatible(
        &self,
        available: &[String],
        constraints: &[String],
    ) -> Vec<(String, CompatibilityScore)> {
        let mut compatible: Vec<(String, CompatibilityScore)> = available
            .iter()
            .map(|v| (v.clone(), self.score(v, constraints)))
            .filter(|(_, s)| s.is_compatible)
            .collect();

        compatible.sort_by(|a, b| {
            b.1.score
                .partial_cmp(&a.1.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        compatible
    }

    /// Suggest a resolution for a set of constraints.
    ///
    /// Tries, in order: the lower edge of the intersection of all bounds;
    /// the best-scoring candidate from `available`; manual resolution.
    #[must_use]
    pub fn suggest_resolution(
        &self,
        constraints: &[String],
        available: Option<&[String]>,
    ) -> ResolutionSuggestion {
        let parsed: Vec<Constraint> = constraints
            .iter()
            .filter_map(|c| Constraint::parse(c).ok())
            .collect();

        if parsed.len() == constraints.len()
            && let Some(candidate) = constraint_intersection(&parsed)
        {
            return ResolutionSuggestion {
                kind: ResolutionKind::Intersection,
                recommended: Some(candidate),
                alternatives: Vec::new(),
                actions: vec!["update to the recommended version".to_string()],
                feasibility: Feasibility::High,
            };
        }

        if let Some(available) = available {
            let mut matches: Vec<(String, CompatibilityScore)> = available
                .iter()
                .map(|v| (v.clone(), self.score(v, constraints)))
                .filter(|(_, s)| s.score > 0.5)
                .collect();
            matches.sort_by(|a, b| b.1.score.partial_cmp(&a.1.score).unwrap_or(Ordering::Equal));

            if let Some((best, _)) = matches.first().cloned()
                && let Ok(version) = Version::parse(&best)
            {
                let alternatives = matches
                    .iter()
                    .skip(1)
                    .take(2)
                    .filter_map(|(v, _)| Version::parse(v).ok())
                    .collect();
                return ResolutionSuggestion {
                    kind: ResolutionKind::BestMatch,
                    recommended: Some(version),
                    alternatives,
                    actions: vec!["update to the best matching version".to_string()],
                    feasibility: Feasibility::Medium,
                };
            }
        }

        ResolutionSuggestion {
            kind: ResolutionKind::Manual,
            recommended: None,
            alternatives: Vec::new(),
            actions: vec![
                "manual resolution required".to_string(),
                "consider relaxing version constraints".to_string(),
                "check for alternative components".to_string(),
            ],
            feasibility: Feasibility::Low,
        }
    }

    /// Drop all memoised scores.
    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }

    /// Number of memoised entries, for diagnostics.
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.read().len()
    }
}

/// Score a satisfied constraint by semantic distance from its reference.
fn constraint_score(version: &Version, constraint: &Constraint) -> f64 {
    if matches!(constraint, Constraint::Exact(_)) {
        return 1.0;
    }

    let reference = constraint.reference();
    let distance = 10.0 * version.major.abs_diff(reference.major) as f64
        + 5.0 * version.minor.abs_diff(reference.minor) as f64
        + 0.1 * version.patch.abs_diff(reference.patch) as f64;

    (1.0 - distance / 10.0).max(0.5)
}

fn suggest_action(
    installed: &Version,
    constraints: &[Constraint],
    score: &CompatibilityScore,
) -> String {
    if score.is_compatible {
        if score.score >= 0.9 {
            return "no action required".to_string();
        }
        return "consider updating to the latest compatible version".to_string();
    }

    let needs_major = constraints.iter().any(|c| {
        matches!(c, Constraint::GreaterThan(v) | Constraint::GreaterEqual(v)
            if v.major > installed.major)
    });

    if needs_major {
        "major version update required - review breaking changes".to_string()
    } else {
        "minor or patch update required".to_string()
    }
}

/// Lower edge of the intersection of all bounds, when non-empty.
fn constraint_intersection(constraints: &[Constraint]) -> Option<Version> {
    if constraints.is_empty() {
        return None;
    }

    // An exact pin wins if it satisfies everything else.
    for constraint in constraints {
        if let Constraint::Exact(candidate) = constraint
            && constraints.iter().all(|c| c.satisfies(candidate))
        {
            return Some(candidate.clone());
        }
    }

    let lower = constraints
        .iter()
        .filter_map(Constraint::lower_bound)
        .max()?;

    let upper = constraints.iter().filter_map(Constraint::upper_bound).min();
    if let Some(upper) = upper
        && lower > upper
    {
        return None;
    }

    constraints
        .iter()
        .all(|c| c.satisfies(&lower))
        .then_some(lower)
}
