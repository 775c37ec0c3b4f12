use crate::context::{ProjectContext, PromptSettings};
use crate::fs::write_file_atomic;
use crate::profile::ProfileDraft;
use crate::types::{DEFAULT_CONFIG_FILES, ProfileId, ValidationError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read config file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to strip comments from '{}': {reason}", .path.display())]
    Comments { path: PathBuf, reason: String },

    #[error("Failed to parse config file '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid profiles in '{}': {source}", .path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: ValidationError,
    },
}

/// One profile as stored in the settings file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub id: ProfileId,

    #[serde(flatten)]
    pub draft: ProfileDraft,
}

/// Configuration loaded from lesswatch.json or lesswatch.jsonc
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileConfig {
    pub profiles: Vec<ProfileEntry>,

    pub prompts: PromptSettings,

    /// Number of compile workers; defaults to the number of CPUs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Path to the lessc executable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lessc: Option<String>,
}

impl FileConfig {
    /// Capture the committed profiles and prompt settings of `context`,
    /// keeping `workers` and `lessc` from `self`
    pub fn with_context(&self, context: &ProjectContext) -> Self {
        let root = context.root();
        let profiles = context
            .store()
            .all_profiles()
            .iter()
            .map(|profile| {
                let mut draft = profile.to_draft();
                relativize(&mut draft, root);
                ProfileEntry { id: profile.id(), draft }
            })
            .collect();

        Self { profiles, prompts: context.prompts(), workers: self.workers, lessc: self.lessc.clone() }
    }

    /// Commit the profiles and prompt settings into `context`.
    /// On a validation error the context is left untouched.
    pub fn apply_to(&self, context: &ProjectContext) -> Result<(), ValidationError> {
        let entries: Vec<_> = self.profiles.iter().map(|e| (e.id, e.draft.clone())).collect();
        context.store().replace_all(&entries)?;
        context.set_prompts(self.prompts);
        Ok(())
    }
}

/// Store project paths relative to the root so the settings file stays portable
fn relativize(draft: &mut ProfileDraft, root: &Path) {
    if let Ok(relative) = draft.less_dir.strip_prefix(root) {
        draft.less_dir = relative.to_path_buf();
    }
    for dir in &mut draft.css_dirs {
        if let Ok(relative) = dir.path().strip_prefix(root) {
            *dir = crate::profile::CssDirectory::new(relative);
        }
    }
}

/// Find default config file in directory
pub fn find_default_config(dir: &Path) -> Option<PathBuf> {
    DEFAULT_CONFIG_FILES.iter().map(|name| dir.join(name)).find(|path| path.exists())
}

/// Load config from file path, supporting .json and .jsonc
pub fn load_config_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let mut content = fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
        _ => ConfigError::Io { path: path.to_path_buf(), source: e },
    })?;
    json_strip_comments::strip(&mut content)
        .map_err(|e| ConfigError::Comments { path: path.to_path_buf(), reason: e.to_string() })?;
    serde_json::from_str(&content).map_err(|e| ConfigError::Parse { path: path.to_path_buf(), source: e })
}

/// Load a config file and commit it into `context`
pub fn load_into(path: &Path, context: &ProjectContext) -> Result<FileConfig, ConfigError> {
    let config = load_config_file(path)?;
    config
        .apply_to(context)
        .map_err(|e| ConfigError::Invalid { path: path.to_path_buf(), source: e })?;
    tracing::debug!(path = %path.display(), profiles = config.profiles.len(), "loaded settings");
    Ok(config)
}

/// Write `config` as pretty JSON, replacing the file atomically.
/// Comments in an existing .jsonc file are not preserved.
pub fn save_config_file(path: &Path, config: &FileConfig) -> Result<(), ConfigError> {
    let mut json = serde_json::to_string_pretty(config)
        .map_err(|e| ConfigError::Parse { path: path.to_path_buf(), source: e })?;
    json.push('\n');
    write_file_atomic(path, json.as_bytes()).map_err(|e| ConfigError::Io { path: path.to_path_buf(), source: e })?;
    tracing::debug!(path = %path.display(), "saved settings");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"{
        // site styles
        "profiles": [
            {
                "id": 3,
                "name": "site",
                "lessDir": "less",
                "excludePattern": "*-min.less",
                "cssDirs": ["public/css", "public/css/", "dist"],
                "compressOutput": true
            }
        ],
        "prompts": { "notifySuccess": false },
        "workers": 2
    }"#;

    #[test]
    fn test_find_default_config_prefers_json() {
        let dir = tempdir().unwrap();
        assert_eq!(find_default_config(dir.path()), None);

        fs::write(dir.path().join("lesswatch.jsonc"), "{}").unwrap();
        assert_eq!(find_default_config(dir.path()), Some(dir.path().join("lesswatch.jsonc")));

        fs::write(dir.path().join("lesswatch.json"), "{}").unwrap();
        assert_eq!(find_default_config(dir.path()), Some(dir.path().join("lesswatch.json")));
    }

    #[test]
    fn test_load_jsonc_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lesswatch.jsonc");
        fs::write(&path, SAMPLE).unwrap();

        let config = load_config_file(&path).unwrap();

        assert_eq!(config.workers, Some(2));
        assert_eq!(config.lessc, None);
        assert!(!config.prompts.notify_success);
        assert!(config.prompts.notify_missing_output_dirs);

        let entry = &config.profiles[0];
        assert_eq!(entry.id, 3);
        assert_eq!(entry.draft.name, "site");
        assert!(entry.draft.compile_automatically);
        assert!(entry.draft.compress_output);
        assert_eq!(entry.draft.css_dirs.len(), 3);
    }

    #[test]
    fn test_load_into_context_dedups_css_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lesswatch.json");
        fs::write(&path, SAMPLE).unwrap();
        let context = ProjectContext::new(dir.path());

        load_into(&path, &context).unwrap();

        let profile = context.store().profile(3).unwrap();
        let dirs: Vec<_> = profile.css_dirs().iter().map(|d| d.path().to_path_buf()).collect();
        assert_eq!(dirs, vec![dir.path().join("public/css"), dir.path().join("dist")]);
        assert!(!context.prompts().notify_success);

        // New profiles continue after the highest loaded id
        assert_eq!(context.store().create_profile("admin").unwrap().id(), 4);
    }

    #[test]
    fn test_invalid_profiles_leave_context_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lesswatch.json");
        fs::write(&path, r#"{ "profiles": [ { "id": 1, "name": "a" }, { "id": 2, "name": "a" } ] }"#).unwrap();
        let context = ProjectContext::new(dir.path());
        context.store().create_profile("existing").unwrap();

        let err = load_into(&path, &context).unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { source: ValidationError::DuplicateName(_), .. }));
        assert_eq!(context.store().len(), 1);
    }

    #[test]
    fn test_missing_and_malformed_files() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("lesswatch.json");
        assert!(matches!(load_config_file(&missing), Err(ConfigError::NotFound(_))));

        fs::write(&missing, "{ not json").unwrap();
        assert!(matches!(load_config_file(&missing), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_save_writes_relative_paths_and_reloads() {
        let dir = tempdir().unwrap();
        let context = ProjectContext::new(dir.path());
        context
            .store()
            .put_profile(1, &ProfileDraft::new("site").less_dir("less").css_dir("public/css"))
            .unwrap();

        let path = dir.path().join("lesswatch.json");
        let config = FileConfig { lessc: Some("node_modules/.bin/lessc".to_string()), ..Default::default() };
        save_config_file(&path, &config.with_context(&context)).unwrap();

        let saved = fs::read_to_string(&path).unwrap();
        assert!(saved.contains(r#""lessDir": "less""#), "unexpected file: {saved}");
        assert!(saved.contains(r#""lessc": "node_modules/.bin/lessc""#));
        assert!(!saved.contains("workers"));

        let reloaded = ProjectContext::new(dir.path());
        load_into(&path, &reloaded).unwrap();
        assert_eq!(reloaded.store().profile(1), context.store().profile(1));
    }
}
