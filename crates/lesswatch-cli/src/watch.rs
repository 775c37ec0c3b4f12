use lesswatch::Profile;
use lesswatch::collector::is_less_file;
use lesswatch::coordinator::{Coordinator, SubmitOutcome, Trigger};
use notify::{Config, Event, EventKind, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::channel;

/// Directories to watch: every existing profile LESS directory, without
/// directories already covered by a watched ancestor
fn watch_roots(profiles: &[Arc<Profile>]) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = profiles
        .iter()
        .map(|p| p.less_dir().to_path_buf())
        .filter(|dir| !dir.as_os_str().is_empty() && dir.is_dir())
        .collect();
    dirs.sort();
    dirs.dedup();

    let mut roots: Vec<PathBuf> = Vec::new();
    for dir in dirs {
        if !roots.iter().any(|root| dir.starts_with(root)) {
            roots.push(dir);
        }
    }
    roots
}

fn is_save(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

/// Submit a save event for every LESS file written under a profile's
/// LESS directory. Runs until the watcher shuts down.
pub fn watch(coordinator: &Coordinator) -> Result<(), Box<dyn std::error::Error>> {
    let roots = watch_roots(&coordinator.context().store().all_profiles());
    if roots.is_empty() {
        return Err("No profile has an existing LESS directory to watch".into());
    }

    let (tx, rx) = channel::<notify::Result<Event>>();
    let mut watcher = notify::RecommendedWatcher::new(tx, Config::default())?;
    for root in &roots {
        watcher.watch(root, RecursiveMode::Recursive)?;
        eprintln!("Watching {}", root.display());
    }

    for result in rx {
        let event = match result {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("watch error: {e}");
                continue;
            }
        };
        tracing::trace!(?event, "file system event");
        if !is_save(&event.kind) {
            continue;
        }

        for path in event.paths.iter().filter(|p| is_less_file(p)) {
            let outcome = coordinator.submit(coordinator.event(path.clone(), Trigger::Save));
            if let SubmitOutcome::Scheduled(targets) = &outcome {
                tracing::debug!(source = %path.display(), targets = targets.len(), "scheduled");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesswatch::{ProfileDraft, ProjectContext};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_watch_roots_collapse_nested_and_skip_unusable_dirs() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        for sub in ["site/less/admin", "shop/less"] {
            fs::create_dir_all(root.join(sub)).unwrap();
        }

        let context = ProjectContext::new(&root);
        let store = context.store();
        store.put_profile(1, &ProfileDraft::new("admin").less_dir("site/less/admin")).unwrap();
        store.put_profile(2, &ProfileDraft::new("site").less_dir("site/less")).unwrap();
        store.put_profile(3, &ProfileDraft::new("shop").less_dir("shop/less")).unwrap();
        store.put_profile(4, &ProfileDraft::new("gone").less_dir("missing/less")).unwrap();
        store.put_profile(5, &ProfileDraft::new("new")).unwrap();
        store.put_profile(6, &ProfileDraft::new("twin").less_dir("shop/less")).unwrap();

        let roots = watch_roots(&store.all_profiles());

        assert_eq!(roots, vec![root.join("shop/less"), root.join("site/less")]);
    }

    #[test]
    fn test_watch_roots_empty_without_profiles() {
        let context = ProjectContext::new("/project");
        assert!(watch_roots(&context.store().all_profiles()).is_empty());
    }
}
