use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::{Collection, ExtractTarget};
use crate::error::FetchError;

pub const DEFAULT_STAGING_DIR: &str = "downloads";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_RUNS_DIR: &str = "runs";

/// The three filesystem roots the fetcher works with.
///
/// The staging root is owned by the fetcher: archives are written there and
/// removed once extracted. The data and runs roots only ever receive new
/// directories.
#[derive(Debug, Clone)]
pub struct Store {
    staging_root: Utf8PathBuf,
    data_root: Utf8PathBuf,
    runs_root: Utf8PathBuf,
}

impl Store {
    pub fn new(base: &Utf8Path) -> Self {
        Self::new_with_paths(
            base.join(DEFAULT_STAGING_DIR),
            base.join(DEFAULT_DATA_DIR),
            base.join(DEFAULT_RUNS_DIR),
        )
    }

    pub fn new_with_paths(
        staging_root: Utf8PathBuf,
        data_root: Utf8PathBuf,
        runs_root: Utf8PathBuf,
    ) -> Self {
        Self {
            staging_root,
            data_root,
            runs_root,
        }
    }

    pub fn staging_root(&self) -> &Utf8Path {
        &self.staging_root
    }

    pub fn data_root(&self) -> &Utf8Path {
        &self.data_root
    }

    pub fn runs_root(&self) -> &Utf8Path {
        &self.runs_root
    }

    /// Root a collection is unpacked under.
    pub fn collection_root(&self, collection: Collection) -> &Utf8Path {
        match collection {
            Collection::Dataset(_) => &self.data_root,
            Collection::Run(_) => &self.runs_root,
        }
    }

    pub fn collection_dir(&self, collection: Collection) -> Utf8PathBuf {
        self.collection_root(collection).join(collection.name())
    }

    pub fn archive_path(&self, collection: Collection) -> Utf8PathBuf {
        self.staging_root.join(collection.archive_name())
    }

    pub fn staging_path(&self, file_name: &str) -> Utf8PathBuf {
        self.staging_root.join(file_name)
    }

    pub fn extract_dir(&self, collection: Collection, target: ExtractTarget) -> Utf8PathBuf {
        match target {
            ExtractTarget::Subdirectory => self.collection_dir(collection),
            ExtractTarget::Root => self.collection_root(collection).to_path_buf(),
        }
    }

    /// Creates all three roots; existing directories are left alone.
    pub fn ensure_roots(&self) -> Result<(), FetchError> {
        for root in [&self.staging_root, &self.data_root, &self.runs_root] {
            fs::create_dir_all(root.as_std_path())
                .map_err(|err| FetchError::Filesystem(format!("create {root}: {err}")))?;
        }
        Ok(())
    }

    pub fn ensure_staging_root(&self) -> Result<(), FetchError> {
        fs::create_dir_all(self.staging_root.as_std_path())
            .map_err(|err| FetchError::Filesystem(format!("create {}: {err}", self.staging_root)))
    }

    pub fn exists(&self, path: &Utf8Path) -> bool {
        path.as_std_path().exists()
    }

    /// Removes the staging root and everything in it. A missing staging root
    /// is an error.
    pub fn clear_staging(&self) -> Result<(), FetchError> {
        fs::remove_dir_all(self.staging_root.as_std_path())
            .map_err(|err| FetchError::Filesystem(format!("remove {}: {err}", self.staging_root)))
    }
}
