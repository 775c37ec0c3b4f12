use crate::matcher::resolve_profile;
use crate::profile::{Profile, ProfileDraft};
use crate::types::{ProfileId, ValidationError};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Immutable view of every committed profile at one point in time
pub type ProfileSnapshot = Arc<Vec<Arc<Profile>>>;

/// Holds the committed profiles of one project.
///
/// Readers load the current snapshot without locking. Every commit builds a
/// new vector and swaps it in, so a reader holding a snapshot keeps seeing a
/// consistent set of profiles while writers move on. Writers are serialized
/// among themselves so concurrent commits cannot lose each other's updates.
pub struct ProfileStore {
    root: PathBuf,
    profiles: ArcSwap<Vec<Arc<Profile>>>,
    /// Writer lock; guards the highest id ever committed
    last_id: Mutex<ProfileId>,
}

impl ProfileStore {
    /// Create an empty store. Relative profile paths resolve against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            profiles: ArcSwap::from_pointee(Vec::new()),
            last_id: Mutex::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn snapshot(&self) -> ProfileSnapshot {
        self.profiles.load_full()
    }

    /// All committed profiles in insertion order
    pub fn all_profiles(&self) -> Vec<Arc<Profile>> {
        self.profiles.load().iter().cloned().collect()
    }

    pub fn profile(&self, id: ProfileId) -> Option<Arc<Profile>> {
        self.profiles.load().iter().find(|p| p.id() == id).cloned()
    }

    /// Profile owning `source` (nearest ancestor LESS directory)
    pub fn get_profile_for(&self, source: &Path) -> Option<Arc<Profile>> {
        let snapshot = self.profiles.load();
        resolve_profile(&snapshot, source).cloned()
    }

    pub fn len(&self) -> usize {
        self.profiles.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.load().is_empty()
    }

    /// Insert or replace the profile stored under `id`.
    ///
    /// The draft is validated and normalized first; nothing is published if
    /// validation fails.
    pub fn put_profile(&self, id: ProfileId, draft: &ProfileDraft) -> Result<Arc<Profile>, ValidationError> {
        let mut last_id = self.last_id.lock();
        self.commit(&mut last_id, id, draft)
    }

    /// Commit a new, empty profile under the next unused id
    pub fn create_profile(&self, name: &str) -> Result<Arc<Profile>, ValidationError> {
        let mut last_id = self.last_id.lock();
        let id = *last_id + 1;
        self.commit(&mut last_id, id, &ProfileDraft::new(name))
    }

    fn commit(
        &self,
        last_id: &mut ProfileId,
        id: ProfileId,
        draft: &ProfileDraft,
    ) -> Result<Arc<Profile>, ValidationError> {
        let current = self.profiles.load_full();

        let profile = Arc::new(Profile::commit(id, draft, &self.root)?);
        if current.iter().any(|p| p.id() != id && p.name() == profile.name()) {
            return Err(ValidationError::DuplicateName(profile.name().to_string()));
        }

        let mut next: Vec<Arc<Profile>> = current.as_ref().clone();
        match next.iter_mut().find(|p| p.id() == id) {
            Some(slot) => *slot = Arc::clone(&profile),
            None => next.push(Arc::clone(&profile)),
        }
        self.profiles.store(Arc::new(next));
        *last_id = (*last_id).max(id);

        tracing::debug!(profile = profile.name(), id, "committed profile");
        Ok(profile)
    }

    pub fn remove_profile(&self, id: ProfileId) -> Option<Arc<Profile>> {
        let _last_id = self.last_id.lock();
        let current = self.profiles.load_full();
        let removed = current.iter().find(|p| p.id() == id).cloned()?;

        let next: Vec<Arc<Profile>> = current.iter().filter(|p| p.id() != id).cloned().collect();
        self.profiles.store(Arc::new(next));

        tracing::debug!(profile = removed.name(), id, "removed profile");
        Some(removed)
    }

    /// Fresh draft of the committed profile, for editing
    pub fn draft(&self, id: ProfileId) -> Option<ProfileDraft> {
        self.profile(id).map(|p| p.to_draft())
    }

    /// Whether `draft` differs from what is committed under `id`
    pub fn is_modified(&self, id: ProfileId, draft: &ProfileDraft) -> bool {
        self.draft(id).as_ref() != Some(draft)
    }

    /// Replace every profile at once, e.g. when settings are loaded.
    /// Either all entries are committed or none are.
    pub fn replace_all(&self, entries: &[(ProfileId, ProfileDraft)]) -> Result<(), ValidationError> {
        let mut last_id = self.last_id.lock();

        let mut ids = FxHashSet::default();
        let mut names = FxHashSet::default();
        let mut next = Vec::with_capacity(entries.len());

        for (id, draft) in entries {
            if !ids.insert(*id) {
                return Err(ValidationError::DuplicateId(*id));
            }
            let profile = Profile::commit(*id, draft, &self.root)?;
            if !names.insert(profile.name().to_string()) {
                return Err(ValidationError::DuplicateName(profile.name().to_string()));
            }
            next.push(Arc::new(profile));
        }

        *last_id = ids.iter().copied().fold(*last_id, ProfileId::max);
        self.profiles.store(Arc::new(next));
        tracing::debug!(count = entries.len(), "replaced all profiles");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::CssDirectory;

    fn store() -> ProfileStore {
        ProfileStore::new("/project")
    }

    #[test]
    fn test_put_profile_dedups_css_dirs_in_first_seen_order() {
        let store = store();
        let mut draft = ProfileDraft::new("site").less_dir("less");
        draft.css_dirs = vec![
            CssDirectory::new("b"),
            CssDirectory::new("a"),
            CssDirectory::new("./b"),
            CssDirectory::new("/project/a"),
            CssDirectory::new("c"),
        ];

        let profile = store.put_profile(1, &draft).unwrap();

        let dirs: Vec<_> = profile.css_dirs().iter().map(|d| d.path().to_path_buf()).collect();
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("/project/b"),
                PathBuf::from("/project/a"),
                PathBuf::from("/project/c")
            ]
        );
    }

    #[test]
    fn test_put_profile_upserts_in_place() {
        let store = store();
        store.put_profile(1, &ProfileDraft::new("first")).unwrap();
        store.put_profile(2, &ProfileDraft::new("second")).unwrap();
        store.put_profile(1, &ProfileDraft::new("renamed")).unwrap();

        let names: Vec<_> = store.all_profiles().iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names, vec!["renamed", "second"]);
    }

    #[test]
    fn test_put_profile_rejects_duplicate_name() {
        let store = store();
        store.put_profile(1, &ProfileDraft::new("site")).unwrap();

        let err = store.put_profile(2, &ProfileDraft::new("site")).unwrap_err();
        assert_eq!(err, ValidationError::DuplicateName("site".to_string()));
        assert_eq!(store.len(), 1);

        // Re-committing the same profile under its own name is fine
        assert!(store.put_profile(1, &ProfileDraft::new("site")).is_ok());
    }

    #[test]
    fn test_failed_put_leaves_previous_state() {
        let store = store();
        store.put_profile(1, &ProfileDraft::new("site").css_dir("css")).unwrap();

        let bad = ProfileDraft::new("site").include("[broken");
        assert!(store.put_profile(1, &bad).is_err());

        let profile = store.profile(1).unwrap();
        assert_eq!(profile.include_pattern(), "");
        assert!(profile.has_css_directories());
    }

    #[test]
    fn test_snapshot_is_unaffected_by_later_commits() {
        let store = store();
        store.put_profile(1, &ProfileDraft::new("site").css_dir("css")).unwrap();
        let before = store.snapshot();

        store.put_profile(1, &ProfileDraft::new("site")).unwrap();

        assert!(before[0].has_css_directories());
        assert!(!store.profile(1).unwrap().has_css_directories());
    }

    #[test]
    fn test_create_and_remove_profile() {
        let store = store();
        let first = store.create_profile("one").unwrap();
        let second = store.create_profile("two").unwrap();
        assert_eq!((first.id(), second.id()), (1, 2));

        assert_eq!(store.remove_profile(2).map(|p| p.id()), Some(2));
        assert!(store.remove_profile(2).is_none());

        // Ids of removed profiles are never handed out again
        assert_eq!(store.create_profile("three").unwrap().id(), 3);
    }

    #[test]
    fn test_is_modified_tracks_draft_edits() {
        let store = store();
        store.put_profile(1, &ProfileDraft::new("site").less_dir("/project/less")).unwrap();

        let mut draft = store.draft(1).unwrap();
        assert!(!store.is_modified(1, &draft));

        draft.compress_output = true;
        assert!(store.is_modified(1, &draft));
        assert!(!store.profile(1).unwrap().compress_output());
    }

    #[test]
    fn test_get_profile_for_source() {
        let store = store();
        store.put_profile(1, &ProfileDraft::new("site").less_dir("less")).unwrap();

        let found = store.get_profile_for(Path::new("/project/less/main.less"));
        assert_eq!(found.map(|p| p.id()), Some(1));
        assert!(store.get_profile_for(Path::new("/elsewhere/main.less")).is_none());
    }

    #[test]
    fn test_replace_all_is_all_or_nothing() {
        let store = store();
        store.put_profile(1, &ProfileDraft::new("keep")).unwrap();

        let entries = vec![(1, ProfileDraft::new("a")), (2, ProfileDraft::new("a"))];
        assert_eq!(store.replace_all(&entries), Err(ValidationError::DuplicateName("a".to_string())));
        assert_eq!(store.profile(1).unwrap().name(), "keep");

        let entries = vec![(3, ProfileDraft::new("x")), (3, ProfileDraft::new("y"))];
        assert_eq!(store.replace_all(&entries), Err(ValidationError::DuplicateId(3)));

        let entries = vec![(5, ProfileDraft::new("x")), (2, ProfileDraft::new("y"))];
        store.replace_all(&entries).unwrap();
        let ids: Vec<_> = store.all_profiles().iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec![5, 2]);
    }
}
