use crate::matcher::PatternFilter;
use crate::types::{ProfileId, ValidationError};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};

/// A CSS output directory mapped to a profile.
///
/// Two directories are equal when their lexically normalized paths are equal,
/// so `css/./out` and `css/out` collapse into a single entry.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CssDirectory {
    path: PathBuf,
}

impl CssDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PartialEq for CssDirectory {
    fn eq(&self, other: &Self) -> bool {
        normalize_lexically(&self.path) == normalize_lexically(&other.path)
    }
}

impl Hash for CssDirectory {
    fn hash<H: Hasher>(&self, state: &mut H) {
        normalize_lexically(&self.path).hash(state);
    }
}

/// Collapse `.` and `..` components without touching the file system.
/// A `..` that cannot be resolved is kept.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Resolve `raw` against `root` and normalize it into an absolute path.
///
/// Fails for empty input, embedded NUL bytes and `..` climbing above the
/// file system root.
pub fn normalize_path(root: &Path, raw: &Path) -> Result<PathBuf, ValidationError> {
    let display = raw.to_string_lossy();
    if display.trim().is_empty() || display.contains('\0') {
        return Err(ValidationError::MalformedPath(display.into_owned()));
    }

    let joined = if raw.is_absolute() { raw.to_path_buf() } else { root.join(raw) };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component),
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    return Err(ValidationError::MalformedPath(display.into_owned()));
                }
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    Ok(out)
}

/// Editable, uncommitted profile settings.
///
/// Drafts are plain values: editing one never affects the committed
/// [`Profile`] it was taken from. [`crate::ProfileStore::put_profile`] is the
/// only way to turn a draft into a profile the compiler sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileDraft {
    pub name: String,
    pub less_dir: PathBuf,
    pub include_pattern: String,
    pub exclude_pattern: String,
    pub css_dirs: Vec<CssDirectory>,
    pub compile_automatically: bool,
    pub compress_output: bool,
}

impl Default for ProfileDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            less_dir: PathBuf::new(),
            include_pattern: String::new(),
            exclude_pattern: String::new(),
            css_dirs: Vec::new(),
            compile_automatically: true,
            compress_output: false,
        }
    }
}

impl ProfileDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn less_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.less_dir = path.into();
        self
    }

    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.include_pattern = pattern.into();
        self
    }

    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_pattern = pattern.into();
        self
    }

    pub fn css_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.add_css_dir(path);
        self
    }

    pub fn compile_automatically(mut self, enabled: bool) -> Self {
        self.compile_automatically = enabled;
        self
    }

    pub fn compress_output(mut self, enabled: bool) -> Self {
        self.compress_output = enabled;
        self
    }

    /// Append an output directory. Returns false if an equal one is already mapped.
    pub fn add_css_dir(&mut self, path: impl Into<PathBuf>) -> bool {
        let dir = CssDirectory::new(path);
        if self.css_dirs.contains(&dir) {
            return false;
        }
        self.css_dirs.push(dir);
        true
    }

    /// Point the output directory at `index` somewhere else, dropping any
    /// entry that becomes a duplicate. Returns false if `index` is out of range.
    pub fn edit_css_dir(&mut self, index: usize, path: impl Into<PathBuf>) -> bool {
        let Some(slot) = self.css_dirs.get_mut(index) else {
            return false;
        };
        *slot = CssDirectory::new(path);
        self.css_dirs = dedup_css_dirs(std::mem::take(&mut self.css_dirs));
        true
    }

    pub fn remove_css_dir(&mut self, index: usize) -> Option<CssDirectory> {
        (index < self.css_dirs.len()).then(|| self.css_dirs.remove(index))
    }
}

/// Drop repeated directories, keeping the first occurrence of each.
fn dedup_css_dirs(dirs: Vec<CssDirectory>) -> Vec<CssDirectory> {
    let mut seen = FxHashSet::default();
    dirs.into_iter().filter(|dir| seen.insert(dir.clone())).collect()
}

/// A committed, validated compile profile.
///
/// Paths are absolute and normalized, output directories are unique and the
/// include/exclude patterns are compiled. Profiles are immutable; the store
/// replaces them wholesale on every commit.
#[derive(Debug, Clone)]
pub struct Profile {
    id: ProfileId,
    name: String,
    less_dir: PathBuf,
    include_pattern: String,
    exclude_pattern: String,
    css_dirs: Vec<CssDirectory>,
    compile_automatically: bool,
    compress_output: bool,
    filter: PatternFilter,
}

impl Profile {
    /// Validate `draft` and build the profile stored under `id`.
    /// Name uniqueness is checked by the store, which sees every profile.
    pub(crate) fn commit(
        id: ProfileId,
        draft: &ProfileDraft,
        root: &Path,
    ) -> Result<Self, ValidationError> {
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }

        // An empty LESS directory means "not configured yet"
        let less_dir = if draft.less_dir.as_os_str().is_empty() {
            PathBuf::new()
        } else {
            normalize_path(root, &draft.less_dir)?
        };

        let css_dirs = draft
            .css_dirs
            .iter()
            .map(|dir| normalize_path(root, dir.path()).map(CssDirectory::new))
            .collect::<Result<Vec<_>, _>>()?;

        let filter = PatternFilter::new(&draft.include_pattern, &draft.exclude_pattern)?;

        Ok(Self {
            id,
            name: name.to_string(),
            less_dir,
            include_pattern: draft.include_pattern.clone(),
            exclude_pattern: draft.exclude_pattern.clone(),
            css_dirs: dedup_css_dirs(css_dirs),
            compile_automatically: draft.compile_automatically,
            compress_output: draft.compress_output,
            filter,
        })
    }

    pub fn id(&self) -> ProfileId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// LESS source directory; empty when the profile is not configured yet
    pub fn less_dir(&self) -> &Path {
        &self.less_dir
    }

    pub fn include_pattern(&self) -> &str {
        &self.include_pattern
    }

    pub fn exclude_pattern(&self) -> &str {
        &self.exclude_pattern
    }

    pub fn css_dirs(&self) -> &[CssDirectory] {
        &self.css_dirs
    }

    pub fn has_css_directories(&self) -> bool {
        !self.css_dirs.is_empty()
    }

    pub fn compile_automatically(&self) -> bool {
        self.compile_automatically
    }

    pub fn compress_output(&self) -> bool {
        self.compress_output
    }

    pub(crate) fn filter(&self) -> &PatternFilter {
        &self.filter
    }

    /// Start a new editing session from the committed state
    pub fn to_draft(&self) -> ProfileDraft {
        ProfileDraft {
            name: self.name.clone(),
            less_dir: self.less_dir.clone(),
            include_pattern: self.include_pattern.clone(),
            exclude_pattern: self.exclude_pattern.clone(),
            css_dirs: self.css_dirs.clone(),
            compile_automatically: self.compile_automatically,
            compress_output: self.compress_output,
        }
    }
}

impl PartialEq for Profile {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.to_draft() == other.to_draft()
    }
}
