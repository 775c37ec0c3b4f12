use crate::profile::normalize_path;
use crate::store::ProfileStore;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Remembered answers to the notifications shown while compiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromptSettings {
    /// Report successful compiles, not only failures
    pub notify_success: bool,

    /// Report files that have no CSS output directory
    pub notify_missing_output_dirs: bool,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self { notify_success: true, notify_missing_output_dirs: true }
    }
}

/// Everything the compiler needs to know about one open project.
///
/// Each project gets its own context, so several projects can be served
/// from one process without sharing state.
pub struct ProjectContext {
    root: PathBuf,
    store: ProfileStore,
    prompts: RwLock<PromptSettings>,
}

impl ProjectContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            store: ProfileStore::new(root.clone()),
            root,
            prompts: RwLock::new(PromptSettings::default()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    pub fn prompts(&self) -> PromptSettings {
        *self.prompts.read()
    }

    pub fn set_prompts(&self, prompts: PromptSettings) {
        *self.prompts.write() = prompts;
    }

    pub fn reset_prompts(&self) {
        self.set_prompts(PromptSettings::default());
    }

    pub fn has_default_prompt_settings(&self) -> bool {
        self.prompts() == PromptSettings::default()
    }

    /// Absolute, normalized form of a source path given by a front end.
    /// Returns `None` for paths that cannot name a file.
    pub fn normalize_source(&self, path: &Path) -> Option<PathBuf> {
        normalize_path(&self.root, path).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_reset_to_defaults() {
        let ctx = ProjectContext::new("/project");
        assert!(ctx.has_default_prompt_settings());

        ctx.set_prompts(PromptSettings { notify_success: false, ..Default::default() });
        assert!(!ctx.has_default_prompt_settings());

        ctx.reset_prompts();
        assert!(ctx.has_default_prompt_settings());
    }

    #[test]
    fn test_normalize_source_against_root() {
        let ctx = ProjectContext::new("/project");
        assert_eq!(
            ctx.normalize_source(Path::new("less/../less/a.less")),
            Some(PathBuf::from("/project/less/a.less"))
        );
        assert_eq!(ctx.normalize_source(Path::new("")), None);
    }
}
