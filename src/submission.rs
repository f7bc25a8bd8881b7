#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Submission file names: normalization, filtering, and discovery.

use std::{
    collections::{BTreeSet, HashMap, HashSet},
    fmt::Display,
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use anyhow::{Context, Result};
use glob::{Pattern, glob};
use itertools::Itertools;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

/// Matches the `-<digits>` marker an LMS appends to resubmitted files.
static RESUBMISSION_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-\d+$").expect("static regex"));

/// A class of symbol that had to be rewritten to make a file name loadable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Violation {
    /// `-` replaced by `_`.
    Hyphen,
    /// `#` removed.
    Hash,
    /// `+` removed.
    Plus,
    /// ` ` replaced by `_`.
    Space,
    /// `.` in the name body replaced by `_`.
    Period,
}

impl Violation {
    /// The offending character.
    pub fn symbol(self) -> char {
        match self {
            Violation::Hyphen => '-',
            Violation::Hash => '#',
            Violation::Plus => '+',
            Violation::Space => ' ',
            Violation::Period => '.',
        }
    }
}

impl Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Violation::Hyphen => "hyphen",
            Violation::Hash => "hash",
            Violation::Plus => "plus",
            Violation::Space => "space",
            Violation::Period => "period",
        };
        write!(f, "{name} ({:?})", self.symbol())
    }
}

/// Output of [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    /// The rewritten file name, extension included.
    pub name:       String,
    /// Symbol classes that had to be rewritten.
    pub violations: BTreeSet<Violation>,
}

/// Splits `name` at its final `.`, treating a leading dot as part of the body.
fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((body, ext)) if !body.is_empty() => (body, Some(ext)),
        _ => (name, None),
    }
}

/// Rewrites a raw submission file name into something usable as a module
/// identifier, recording every symbol class that had to change.
///
/// Steps run in a fixed order: resubmission suffix, hyphens, `#`, `+`,
/// spaces, then periods in the body. Only the first step is not a violation.
/// An already-normalized name is a fixed point.
pub fn normalize(raw: &str) -> Normalized {
    let mut violations = BTreeSet::new();

    let (body, ext) = split_extension(raw);
    let body = RESUBMISSION_SUFFIX.replace(body, "");
    let mut name = match ext {
        Some(ext) => format!("{body}.{ext}"),
        None => body.into_owned(),
    };

    let mut rewrite = |name: &mut String, from: char, to: &str, class: Violation| {
        if name.contains(from) {
            *name = name.replace(from, to);
            violations.insert(class);
        }
    };
    rewrite(&mut name, '-', "_", Violation::Hyphen);
    rewrite(&mut name, '#', "", Violation::Hash);
    rewrite(&mut name, '+', "", Violation::Plus);
    rewrite(&mut name, ' ', "_", Violation::Space);

    if let (body, Some(ext)) = split_extension(&name)
        && body.contains('.')
    {
        name = format!("{}.{ext}", body.replace('.', "_"));
        violations.insert(Violation::Period);
    }

    Normalized { name, violations }
}

/// Pulls the roster join key out of a normalized file name.
///
/// The id is the second `_`-separated field, or the third when the name
/// carries a `late` marker that shifts the fields by one.
pub fn student_id(normalized: &str) -> Option<String> {
    let index = if normalized.contains("late") { 2 } else { 1 };
    normalized
        .split('_')
        .nth(index)
        .filter(|field| !field.is_empty())
        .map(str::to_owned)
}

/// Strips the extension from a file name.
fn module_name(file_name: &str) -> String {
    split_extension(file_name).0.to_string()
}

/// One participant's artifact plus its identifying metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    /// File name as it was found on disk.
    original_filename: String,
    /// Loadable module identifier (no extension).
    normalized_name:   String,
    /// File name the loader should read, extension included.
    file_name:         String,
    /// Roster join key, when one could be extracted.
    student_id:        Option<String>,
    /// Symbol classes that had to be rewritten.
    violations:        BTreeSet<Violation>,
    /// Human-readable description of `violations`.
    violation_reason:  Option<String>,
    /// Whether a renamed copy was written next to the original.
    was_renamed:       bool,
}

impl Submission {
    /// Builds a submission from its parts, deriving the naughty reason.
    pub fn new(
        original_filename: impl Into<String>,
        file_name: impl Into<String>,
        violations: BTreeSet<Violation>,
    ) -> Self {
        let original_filename = original_filename.into();
        let file_name = file_name.into();
        let violation_reason = (!violations.is_empty()).then(|| {
            format!(
                "Submitted file name contained one or more of the following: {}",
                violations.iter().join(", ")
            )
        });

        Self {
            was_renamed: original_filename != file_name,
            normalized_name: module_name(&file_name),
            student_id: student_id(&file_name),
            original_filename,
            file_name,
            violations,
            violation_reason,
        }
    }

    /// A submission addressed directly by module name, bypassing discovery.
    pub fn single(module: impl Into<String>, extension: &str) -> Self {
        let module = module.into();
        let file_name = format!("{module}.{extension}");
        Self::new(file_name.clone(), file_name, BTreeSet::new())
    }

    /// File name as it was found on disk.
    pub fn original_filename(&self) -> &str {
        &self.original_filename
    }

    /// Loadable module identifier.
    pub fn name(&self) -> &str {
        &self.normalized_name
    }

    /// File name the loader reads.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Roster join key.
    pub fn student_id(&self) -> Option<&str> {
        self.student_id.as_deref()
    }

    /// Symbol classes that had to be rewritten.
    pub fn violations(&self) -> &BTreeSet<Violation> {
        &self.violations
    }

    /// True when the file name did not follow the naming rules.
    pub fn is_naughty(&self) -> bool {
        !self.violations.is_empty()
    }

    /// Why the submission is naughty, if it is.
    pub fn violation_reason(&self) -> Option<&str> {
        self.violation_reason.as_deref()
    }

    /// Whether a renamed copy backs this submission.
    pub fn was_renamed(&self) -> bool {
        self.was_renamed
    }
}

/// Which normalized file names count as submissions.
#[derive(Debug, Clone)]
pub struct NameFilter {
    /// A submission must contain a match; the match becomes its file name.
    pattern: Regex,
    /// Any match disqualifies the file.
    exclude: Regex,
}

impl NameFilter {
    /// Compiles the include and exclude patterns.
    pub fn new(pattern: &str, exclude: &str) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)
                .with_context(|| format!("Invalid submission pattern `{pattern}`"))?,
            exclude: Regex::new(exclude)
                .with_context(|| format!("Invalid exclude pattern `{exclude}`"))?,
        })
    }

    /// Returns the accepted file name for a normalized name, if any.
    fn accept<'a>(&self, normalized: &'a str) -> Option<&'a str> {
        if self.exclude.is_match(normalized) {
            return None;
        }
        self.pattern.find(normalized).map(|m| m.as_str())
    }
}

/// What [`SubmissionSet::register`] decided about one raw file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Module identifier the file was registered under.
    pub module:     String,
    /// File name the loader will read.
    pub file_name:  String,
    /// Whether the original must be copied to `file_name`.
    pub needs_copy: bool,
    /// False when the module had already been registered.
    pub is_new:     bool,
}

/// The batch of submissions found in one directory.
#[derive(Debug, Clone)]
pub struct SubmissionSet {
    /// Directory the submissions live in.
    dir:         PathBuf,
    /// Registered submissions in discovery order.
    submissions: Vec<Submission>,
    /// Student id to module identifier.
    student_ids: HashMap<String, String>,
    /// Renamed copies written by [`discover`].
    copies:      Vec<PathBuf>,
}

impl SubmissionSet {
    /// An empty set rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir:         dir.into(),
            submissions: Vec::new(),
            student_ids: HashMap::new(),
            copies:      Vec::new(),
        }
    }

    /// Normalizes `raw` and registers it if the filter accepts it.
    ///
    /// Registration is idempotent per module: a second raw file normalizing
    /// to the same module still reports whether a copy is needed, but does not
    /// create another submission.
    pub fn register(&mut self, raw: &str, filter: &NameFilter) -> Option<Registration> {
        let normalized = normalize(raw);
        let file_name = filter.accept(&normalized.name)?.to_string();
        let module = module_name(&file_name);

        if let Some(id) = student_id(&file_name) {
            self.student_ids.insert(id, module.clone());
        }

        let is_new = self.get(&module).is_none();
        if is_new {
            let submission = Submission::new(raw, file_name.clone(), normalized.violations);
            if let Some(reason) = submission.violation_reason() {
                warn!("{raw}: {reason}");
            }
            self.submissions.push(submission);
        } else {
            debug!("{raw} normalizes to already registered module {module}");
        }

        Some(Registration {
            needs_copy: file_name != raw,
            module,
            file_name,
            is_new,
        })
    }

    /// Directory the submissions live in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Registered submissions in discovery order.
    pub fn submissions(&self) -> &[Submission] {
        &self.submissions
    }

    /// Looks up a submission by module identifier.
    pub fn get(&self, module: &str) -> Option<&Submission> {
        self.submissions.iter().find(|s| s.name() == module)
    }

    /// Module identifiers in discovery order.
    pub fn names(&self) -> Vec<String> {
        self.submissions.iter().map(|s| s.name().to_string()).collect()
    }

    /// Student id to module identifier, the gradebook join table.
    pub fn student_ids(&self) -> &HashMap<String, String> {
        &self.student_ids
    }

    /// Deletes the renamed copies written during discovery. Files that were
    /// already in the directory are never touched.
    pub fn remove_renamed_copies(&self) -> Result<()> {
        for path in self.copies.iter().filter(|p| p.exists()) {
            fs::remove_file(path)
                .with_context(|| format!("Could not delete {}", path.display()))?;
        }
        Ok(())
    }
}

/// Lists `dir`, registering every file the filter accepts and writing renamed
/// copies for names that had to change.
///
/// Files already named correctly register first, so a module with both an
/// original and a resubmission is backed by the original. A renamed copy is
/// only written for the submission that owns the module, and never over a
/// file that was present in `dir`.
pub fn discover(dir: &Path, filter: &NameFilter) -> Result<SubmissionSet> {
    let root = dir
        .to_str()
        .context("Could not convert submissions directory to string")?;
    let pattern = format!("{}/*", Pattern::escape(root));

    let mut found = Vec::new();
    for path in glob(&pattern).context("Could not create glob")?.filter_map(Result::ok) {
        if !path.is_file() {
            continue;
        }
        match path.file_name().and_then(|n| n.to_str()) {
            Some(raw) => found.push((raw.to_string(), path.clone())),
            None => warn!("Skipping non UTF-8 file name {}", path.display()),
        }
    }

    let on_disk: HashSet<String> = found.iter().map(|(raw, _)| raw.clone()).collect();
    found.sort_by_key(|(raw, _)| filter.accept(&normalize(raw).name) != Some(raw.as_str()));

    let mut set = SubmissionSet::new(dir);
    for (raw, path) in &found {
        let Some(registration) = set.register(raw, filter) else {
            continue;
        };
        if !registration.needs_copy {
            continue;
        }
        if !registration.is_new || on_disk.contains(&registration.file_name) {
            debug!("{raw}: keeping existing {}", registration.file_name);
            continue;
        }

        let target = dir.join(&registration.file_name);
        fs::copy(path, &target).with_context(|| {
            format!("Could not copy {} to {}", path.display(), target.display())
        })?;
        set.copies.push(target);
    }

    Ok(set)
}
