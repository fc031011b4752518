use std::io::Write;

use camino::Utf8PathBuf;
use tracing::{debug, info};

use crate::domain::{Collection, ExtractTarget, ProjectId};
use crate::error::FetchError;
use crate::fs_util;
use crate::osf::{RemoteFile, Storage, StorageClient};
use crate::presence;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Every dataset and run directory was already on disk; nothing was fetched.
    AlreadyPresent,
    Downloaded {
        files: Vec<Utf8PathBuf>,
        extracted: Vec<Collection>,
    },
}

#[derive(Debug, Clone, Copy)]
pub enum ProgressEvent<'a> {
    Storages { total: usize },
    StorageStarted { storage: &'a Storage, files: usize },
    FileDownloaded { file: &'a RemoteFile, bytes: u64 },
    StorageFinished { storage: &'a Storage },
    Extracted { collection: Collection, files: usize },
    Finished,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent<'_>);
}

pub struct App<C: StorageClient> {
    store: Store,
    client: C,
    extract_target: ExtractTarget,
}

impl<C: StorageClient> App<C> {
    pub fn new(store: Store, client: C) -> Self {
        Self {
            store,
            client,
            extract_target: ExtractTarget::default(),
        }
    }

    pub fn with_extract_target(mut self, target: ExtractTarget) -> Self {
        self.extract_target = target;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Fetches every file of the project into staging and unpacks the
    /// archives, unless all collections are already on disk.
    pub fn download_project(
        &self,
        id: &ProjectId,
        sink: &dyn ProgressSink,
    ) -> Result<FetchOutcome, FetchError> {
        if presence::check_downloaded(&self.store) {
            info!("All required files have already been downloaded.");
            return Ok(FetchOutcome::AlreadyPresent);
        }

        info!("Downloading project with OSF ID: {id}");
        let project = self.client.project(id)?;
        debug!("Resolved project {} ({})", project.id, project.title);
        self.store.ensure_staging_root()?;

        let storages = self.client.storages(&project)?;
        sink.event(ProgressEvent::Storages {
            total: storages.len(),
        });

        let mut downloaded = Vec::new();
        for storage in &storages {
            let files = self.client.files(storage)?;
            sink.event(ProgressEvent::StorageStarted {
                storage,
                files: files.len(),
            });
            for file in &files {
                let (destination, bytes) = self.download_file(file)?;
                debug!("Downloaded: {}", file.name);
                sink.event(ProgressEvent::FileDownloaded { file, bytes });
                downloaded.push(destination);
            }
            sink.event(ProgressEvent::StorageFinished { storage });
        }

        let extracted = self.move_downloads(sink)?;
        sink.event(ProgressEvent::Finished);
        info!("Project download and file movement completed.");

        Ok(FetchOutcome::Downloaded {
            files: downloaded,
            extracted,
        })
    }

    /// Unpacks each `<name>.zip` found in staging and removes it. Collections
    /// without an archive are skipped.
    pub fn move_downloads(&self, sink: &dyn ProgressSink) -> Result<Vec<Collection>, FetchError> {
        info!("Unzipping and moving downloaded files to their final locations");

        let mut extracted = Vec::new();
        for collection in Collection::all() {
            let archive = self.store.archive_path(collection);
            if !self.store.exists(&archive) {
                continue;
            }
            let target = self.store.extract_dir(collection, self.extract_target);
            let files = fs_util::extract_zip(archive.as_std_path(), target.as_std_path())?;
            fs_util::remove_file(archive.as_std_path())?;
            debug!(
                "Unzipped and moved {}: {} ({files} files)",
                collection.kind(),
                collection.name()
            );
            sink.event(ProgressEvent::Extracted { collection, files });
            extracted.push(collection);
        }

        info!("File unzipping and movement completed");
        Ok(extracted)
    }

    pub fn clean_up(&self) -> Result<(), FetchError> {
        info!("Cleaning up temporary download directory");
        self.store.clear_staging()
    }

    fn download_file(&self, file: &RemoteFile) -> Result<(Utf8PathBuf, u64), FetchError> {
        if !is_plain_file_name(&file.name) {
            return Err(FetchError::OsfResponse(format!(
                "refusing to write remote file with unsafe name: {}",
                file.name
            )));
        }
        let destination = self.store.staging_path(&file.name);

        let mut temp = tempfile::Builder::new()
            .prefix(".osf-fetch")
            .tempfile_in(self.store.staging_root().as_std_path())
            .map_err(|err| FetchError::Filesystem(err.to_string()))?;
        let bytes = self.client.download(file, &mut temp)?;
        temp.flush()
            .map_err(|err| FetchError::Filesystem(err.to_string()))?;
        temp.persist(destination.as_std_path())
            .map_err(|err| FetchError::Filesystem(format!("write {destination}: {}", err.error)))?;

        Ok((destination, bytes))
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
}
