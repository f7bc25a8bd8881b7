#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Check definitions and the suite file they are read from.

use std::{collections::HashSet, fs, path::Path, sync::LazyLock};

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::HarnessError;

/// Weight given to a check that does not declare one.
pub const DEFAULT_POINT_WEIGHT: u32 = 1;

/// Legacy `points=<int>` annotation embedded in check descriptions.
static POINTS_ANNOTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"points=(\d+)").expect("static regex"));

/// Reads the first `points=<int>` annotation out of free text.
///
/// An annotation too large for a point weight is an error rather than a
/// silent fallback to the default.
pub fn points_from_description(description: &str) -> Result<Option<u32>, HarnessError> {
    let Some(m) = POINTS_ANNOTATION.captures(description).and_then(|caps| caps.get(1)) else {
        return Ok(None);
    };
    m.as_str()
        .parse()
        .map(Some)
        .map_err(|_| HarnessError::InvalidPoints(m.as_str().to_string()))
}

/// A single named, weighted check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckDefinition {
    /// Unique name within the suite.
    name:         String,
    /// Points awarded when the check passes.
    point_weight: u32,
    /// Free-form description shown in feedback.
    description:  String,
    /// Command the process-backed loader runs for this check.
    #[serde(default)]
    command:      Vec<String>,
}

impl CheckDefinition {
    /// Creates a check, taking its weight from a `points=` annotation in the
    /// description when present.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self, HarnessError> {
        let description = description.into();
        Ok(Self {
            name: name.into(),
            point_weight: points_from_description(&description)?.unwrap_or(DEFAULT_POINT_WEIGHT),
            description,
            command: Vec::new(),
        })
    }

    /// Returns a copy with an explicit weight, overriding any annotation.
    pub fn with_points(mut self, points: u32) -> Self {
        self.point_weight = points;
        self
    }

    /// Returns a copy with the command used to execute it.
    pub fn with_command(mut self, command: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    /// Unique name within the suite.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Points awarded when the check passes.
    pub fn point_weight(&self) -> u32 {
        self.point_weight
    }

    /// Full description text.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// First non-blank line of the description.
    pub fn summary(&self) -> &str {
        self.description
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
    }

    /// Command the process-backed loader runs for this check.
    pub fn command(&self) -> &[String] {
        &self.command
    }
}

/// On-disk shape of one suite entry.
#[derive(Debug, Deserialize)]
struct SuiteEntry {
    /// Check name.
    name:        String,
    /// Description, possibly carrying `points=`.
    #[serde(default)]
    description: String,
    /// Explicit weight; wins over the annotation.
    points:      Option<u32>,
    /// Command to execute.
    #[serde(default)]
    command:     Vec<String>,
}

/// An ordered set of checks, read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckSuite {
    /// Checks in execution order.
    checks: Vec<CheckDefinition>,
}

impl CheckSuite {
    /// Builds a suite, rejecting duplicate names and totals that do not fit a
    /// point count.
    pub fn new(checks: impl IntoIterator<Item = CheckDefinition>) -> Result<Self, HarnessError> {
        let checks: Vec<CheckDefinition> = checks.into_iter().collect();
        let mut seen = HashSet::new();
        let mut total: u32 = 0;
        for check in &checks {
            if !seen.insert(check.name()) {
                return Err(HarnessError::DuplicateCheck(check.name().to_string()));
            }
            total = total.checked_add(check.point_weight()).ok_or_else(|| {
                HarnessError::InvalidPoints(format!("suite total at `{}`", check.name()))
            })?;
        }
        Ok(Self { checks })
    }

    /// Parses a JSON array of suite entries.
    pub fn from_json(text: &str) -> Result<Self> {
        let entries: Vec<SuiteEntry> =
            serde_json::from_str(text).context("Could not parse check suite JSON")?;

        let mut checks = Vec::with_capacity(entries.len());
        for entry in entries {
            let mut check =
                CheckDefinition::new(entry.name, entry.description)?.with_command(entry.command);
            if let Some(points) = entry.points {
                check = check.with_points(points);
            }
            if check.point_weight() == 0 {
                bail!("Check `{}` must be worth at least one point", check.name());
            }
            checks.push(check);
        }

        Ok(Self::new(checks)?)
    }

    /// Reads and parses a suite file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Could not read check suite {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Invalid check suite {}", path.display()))
    }

    /// Checks in execution order.
    pub fn iter(&self) -> std::slice::Iter<'_, CheckDefinition> {
        self.checks.iter()
    }

    /// Looks up a check by name.
    pub fn get(&self, name: &str) -> Option<&CheckDefinition> {
        self.checks.iter().find(|c| c.name() == name)
    }

    /// Number of checks.
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// True for a suite with no checks.
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Sum of every check's weight. Construction guarantees it fits.
    pub fn total_points(&self) -> u32 {
        self.checks.iter().map(CheckDefinition::point_weight).sum()
    }
}

impl<'a> IntoIterator for &'a CheckSuite {
    type IntoIter = std::slice::Iter<'a, CheckDefinition>;
    type Item = &'a CheckDefinition;

    fn into_iter(self) -> Self::IntoIter {
        self.checks.iter()
    }
}
