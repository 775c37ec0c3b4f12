pub mod cli;
pub mod collector;
pub mod compiler;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod fs;
pub mod matcher;
pub mod profile;
pub mod reporter;
pub mod store;
pub mod targets;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use compiler::{CompileError, CompileOptions, Compiler, LesscCompiler};
pub use config::{ConfigError, FileConfig};
pub use context::{ProjectContext, PromptSettings};
pub use coordinator::{ChangeEvent, Coordinator, SubmitOutcome, TargetPhase, Trigger};
pub use profile::{CssDirectory, Profile, ProfileDraft};
pub use reporter::{CompileResult, CompileStatus, Notification, Reporter};
pub use store::ProfileStore;
pub use targets::CompileTarget;
pub use types::{DEFAULT_CONFIG_FILES, LesswatchError, ProfileId, ValidationError};

/// A project whose settings have been loaded
pub struct Project {
    pub context: Arc<ProjectContext>,

    /// Settings as read from disk (empty when there was no settings file)
    pub config: FileConfig,

    /// Where the settings were read from, or where they will be saved
    pub config_path: PathBuf,
}

impl Project {
    /// Write the current profiles and prompt settings back to the settings file
    pub fn save(&self) -> Result<(), LesswatchError> {
        config::save_config_file(&self.config_path, &self.config.with_context(&self.context))?;
        Ok(())
    }
}

/// Open the project rooted at `cwd` and load its settings
///
/// # Arguments
/// * `cwd` - Project root
/// * `config_path` - Explicit settings file; when `None`, `lesswatch.json` and
///   then `lesswatch.jsonc` are looked up in the root
///
/// # Returns
/// * `Ok(Project)` - Context with every profile committed
/// * `Err(LesswatchError)` - Invalid root, unreadable settings or invalid profiles
///
/// # Example
/// ```no_run
/// use lesswatch::{open_project, Coordinator, LesscCompiler};
/// use std::path::Path;
/// use std::sync::Arc;
///
/// let project = open_project(Path::new("."), None).unwrap();
/// let coordinator = Coordinator::builder(project.context.clone(), Arc::new(LesscCompiler::new()))
///     .build()
///     .unwrap();
///
/// let batch = coordinator.submit_batch(&[Path::new("less/site.less").to_path_buf()]);
/// coordinator.wait_idle();
/// println!("{} files submitted", batch.outcomes.len());
/// ```
pub fn open_project(cwd: &Path, config_path: Option<&Path>) -> Result<Project, LesswatchError> {
    let root = cwd.canonicalize()?;
    let context = Arc::new(ProjectContext::new(&root));

    let found = match config_path {
        Some(path) => Some(root.join(path)),
        None => config::find_default_config(&root),
    };

    let (config, config_path) = match found {
        Some(path) => (config::load_into(&path, &context)?, path),
        None => {
            tracing::debug!(root = %root.display(), "no settings file, starting without profiles");
            (FileConfig::default(), root.join(DEFAULT_CONFIG_FILES[0]))
        }
    };

    Ok(Project { context, config, config_path })
}
