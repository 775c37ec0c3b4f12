use crate::profile::Profile;
use crate::types::ValidationError;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use std::sync::Arc;

/// Expand brace patterns like `**/*.{less,css}` into multiple patterns
fn expand_brace_pattern(pattern: &str) -> Vec<String> {
    if let Some(start) = pattern.find('{') {
        if let Some(end) = pattern[start..].find('}') {
            let end = start + end;
            let prefix = &pattern[..start];
            let suffix = &pattern[end + 1..];
            let alternatives = &pattern[start + 1..end];

            return alternatives
                .split(',')
                .flat_map(|alt| {
                    let expanded = format!("{prefix}{alt}{suffix}");
                    expand_brace_pattern(&expanded)
                })
                .collect();
        }
    }
    vec![pattern.to_string()]
}

/// Compile one user pattern into a GlobSet. Empty patterns compile to `None`.
fn compile_pattern(field: &'static str, pattern: &str) -> Result<Option<GlobSet>, ValidationError> {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return Ok(None);
    }

    let invalid = |reason: String| ValidationError::InvalidPattern {
        field,
        pattern: pattern.to_string(),
        reason,
    };

    let mut builder = GlobSetBuilder::new();
    for expanded in expand_brace_pattern(pattern) {
        let glob = Glob::new(&expanded).map_err(|e| invalid(e.to_string()))?;
        builder.add(glob);
    }
    builder.build().map(Some).map_err(|e| invalid(e.to_string()))
}

/// Precompiled include/exclude matchers of one profile
#[derive(Debug, Clone, Default)]
pub struct PatternFilter {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

impl PatternFilter {
    pub fn new(include: &str, exclude: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            include: compile_pattern("include", include)?,
            exclude: compile_pattern("exclude", exclude)?,
        })
    }

    /// Exclude wins over include; a missing include matches everything
    pub fn is_match(&self, relative: &Path) -> bool {
        let included = self.include.as_ref().map_or(true, |set| set.is_match(relative));
        let excluded = self.exclude.as_ref().is_some_and(|set| set.is_match(relative));
        included && !excluded
    }
}

/// Find the profile owning `source`: the one whose LESS directory is the
/// nearest ancestor of the file. Equally deep candidates resolve to the
/// lowest profile id.
pub fn resolve_profile<'a>(profiles: &'a [Arc<Profile>], source: &Path) -> Option<&'a Arc<Profile>> {
    profiles
        .iter()
        .filter(|profile| {
            let dir = profile.less_dir();
            !dir.as_os_str().is_empty() && source != dir && source.starts_with(dir)
        })
        .max_by(|a, b| {
            let depth_a = a.less_dir().components().count();
            let depth_b = b.less_dir().components().count();
            // Reverse id order so that max_by picks the lowest id on equal depth
            depth_a.cmp(&depth_b).then_with(|| b.id().cmp(&a.id()))
        })
}

/// Check `source` against the include/exclude patterns of `profile`.
/// Patterns are matched against the path relative to the profile's LESS directory.
pub fn is_included(source: &Path, profile: &Profile) -> bool {
    let relative = source.strip_prefix(profile.less_dir()).unwrap_or(source);
    profile.filter().is_match(relative)
}
