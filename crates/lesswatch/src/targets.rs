use crate::profile::Profile;
use crate::types::{CSS_EXTENSION, ProfileId};
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Scheduling key: one output file written from one source
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetKey {
    pub source: PathBuf,
    pub output_dir: PathBuf,
}

/// One unit of compilation work: a source file compiled into one output directory
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CompileTarget {
    source: PathBuf,
    output_dir: PathBuf,
    output_file: PathBuf,
    profile_id: ProfileId,
}

impl CompileTarget {
    pub fn new(source: impl Into<PathBuf>, output_dir: impl Into<PathBuf>, profile_id: ProfileId) -> Self {
        let source = source.into();
        let output_dir = output_dir.into();
        let output_file = output_dir.join(output_file_name(&source));
        Self { source, output_dir, output_file, profile_id }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `<output_dir>/<source stem>.css`
    pub fn output_file(&self) -> &Path {
        &self.output_file
    }

    pub fn profile_id(&self) -> ProfileId {
        self.profile_id
    }

    pub fn key(&self) -> TargetKey {
        TargetKey { source: self.source.clone(), output_dir: self.output_dir.clone() }
    }
}

/// File name of the compiled output: the source's base name with a `.css`
/// extension. Source subdirectories are not mirrored into the output directory.
pub fn output_file_name(source: &Path) -> OsString {
    let mut name = source.file_stem().map(OsString::from).unwrap_or_default();
    name.push(".");
    name.push(CSS_EXTENSION);
    name
}

/// One target per CSS output directory of `profile`, in profile order.
/// An empty result means the profile has nowhere to write to.
pub fn expand_targets(source: &Path, profile: &Profile) -> Vec<CompileTarget> {
    profile
        .css_dirs()
        .iter()
        .map(|dir| CompileTarget::new(source, dir.path(), profile.id()))
        .collect()
}
