use crate::types::{LESS_EXTENSION, SKIPPED_DIRECTORIES};
use ignore::WalkBuilder;
use ignore::overrides::OverrideBuilder;
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};

/// Whether `path` names a LESS source by extension
pub fn is_less_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case(LESS_EXTENSION))
}

/// Expand a user selection into the LESS files it contains.
///
/// Files are kept when they are LESS sources; directories are walked
/// recursively, honouring `.gitignore` and skipping `node_modules`.
/// The result is canonical, sorted and free of duplicates.
pub fn collect_less_files(selection: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = FxHashSet::default();

    for path in selection {
        if path.is_dir() {
            for file in walk_dir(path) {
                files.insert(file);
            }
        } else if is_less_file(path) {
            if let Ok(canonical) = path.canonicalize() {
                files.insert(canonical);
            }
        }
    }

    let mut files: Vec<_> = files.into_iter().collect();
    files.sort();
    files
}

fn walk_dir(dir: &Path) -> Vec<PathBuf> {
    let mut walker_builder = WalkBuilder::new(dir);
    walker_builder.hidden(false).git_ignore(true);

    let mut overrides = OverrideBuilder::new(dir);
    for skipped in SKIPPED_DIRECTORIES {
        overrides.add(&format!("!**/{skipped}/")).ok();
    }
    if let Ok(built) = overrides.build() {
        walker_builder.overrides(built);
    }

    walker_builder
        .build()
        .flatten()
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .filter(|entry| is_less_file(entry.path()))
        .filter_map(|entry| entry.path().canonicalize().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(root: &Path, relative: &str) -> PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "").unwrap();
        path
    }

    #[test]
    fn test_is_less_file() {
        assert!(is_less_file(Path::new("a/site.less")));
        assert!(is_less_file(Path::new("SITE.LESS")));
        assert!(!is_less_file(Path::new("site.css")));
        assert!(!is_less_file(Path::new("less")));
    }

    #[test]
    fn test_collect_walks_directories_and_skips_node_modules() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(root, "less/site.less");
        touch(root, "less/parts/_vars.less");
        touch(root, "less/readme.md");
        touch(root, "less/node_modules/bootstrap/bootstrap.less");

        let files = collect_less_files(&[root.join("less")]);

        let root = root.canonicalize().unwrap();
        assert_eq!(files, vec![root.join("less/parts/_vars.less"), root.join("less/site.less")]);
    }

    #[test]
    fn test_collect_mixed_selection_dedups() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let site = touch(root, "less/site.less");
        let css = touch(root, "css/site.css");

        let files = collect_less_files(&[site.clone(), root.join("less"), css]);

        assert_eq!(files, vec![site.canonicalize().unwrap()]);
    }
}
