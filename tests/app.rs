use std::fs;
use std::io::{Cursor, Write};
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use osf_fetch::app::{App, FetchOutcome};
use osf_fetch::domain::{Collection, Dataset, ExtractTarget, ProjectId, Run};
use osf_fetch::error::FetchError;
use osf_fetch::osf::{Project, RemoteFile, Storage, StorageClient};
use osf_fetch::output::Silent;
use osf_fetch::store::Store;

#[derive(Default)]
struct MockOsf {
    storages: Vec<(Storage, Vec<(RemoteFile, Vec<u8>)>)>,
    calls: Mutex<usize>,
    fail_project: bool,
}

impl MockOsf {
    fn with_files(files: Vec<(&str, Vec<u8>)>) -> Self {
        let storage = Storage {
            name: "osfstorage".to_string(),
            files_url: "mock://files".to_string(),
        };
        let files = files
            .into_iter()
            .map(|(name, body)| {
                let file = RemoteFile {
                    name: name.to_string(),
                    download_url: format!("mock://download/{name}"),
                };
                (file, body)
            })
            .collect();
        Self {
            storages: vec![(storage, files)],
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    fn record(&self) {
        *self.calls.lock().unwrap() += 1;
    }
}

impl StorageClient for MockOsf {
    fn project(&self, id: &ProjectId) -> Result<Project, FetchError> {
        self.record();
        if self.fail_project {
            return Err(FetchError::ProjectNotFound(id.to_string()));
        }
        Ok(Project {
            id: id.to_string(),
            title: "mock".to_string(),
            storages_url: "mock://storages".to_string(),
        })
    }

    fn storages(&self, _project: &Project) -> Result<Vec<Storage>, FetchError> {
        self.record();
        Ok(self.storages.iter().map(|(s, _)| s.clone()).collect())
    }

    fn files(&self, storage: &Storage) -> Result<Vec<RemoteFile>, FetchError> {
        self.record();
        Ok(self
            .storages
            .iter()
            .filter(|(s, _)| s == storage)
            .flat_map(|(_, files)| files.iter().map(|(f, _)| f.clone()))
            .collect())
    }

    fn download(&self, file: &RemoteFile, sink: &mut dyn Write) -> Result<u64, FetchError> {
        self.record();
        let body = self
            .storages
            .iter()
            .flat_map(|(_, files)| files.iter())
            .find(|(f, _)| f == file)
            .map(|(_, body)| body.clone())
            .ok_or_else(|| FetchError::OsfStatus {
                status: 404,
                message: file.name.clone(),
            })?;
        sink.write_all(&body)
            .map_err(|err| FetchError::Filesystem(err.to_string()))?;
        Ok(body.len() as u64)
    }
}

fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in entries {
        writer
            .start_file(name.to_string(), SimpleFileOptions::default())
            .unwrap();
        writer.write_all(body).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn temp_store() -> (tempfile::TempDir, Store) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let store = Store::new(&root);
    store.ensure_roots().unwrap();
    (temp, store)
}

fn populate_all(store: &Store) {
    for collection in Collection::all() {
        fs::create_dir_all(store.collection_dir(collection).as_std_path()).unwrap();
    }
}

fn full_bundle() -> Vec<(&'static str, Vec<u8>)> {
    Collection::all()
        .map(|collection| {
            let name: &'static str = match collection {
                Collection::Dataset(Dataset::Airline) => "airline.zip",
                Collection::Dataset(Dataset::Imdb) => "imdb.zip",
                Collection::Dataset(Dataset::Ssb) => "ssb.zip",
                Collection::Dataset(Dataset::TpcH) => "tpc_h.zip",
                Collection::Run(Run::DeepdbAugmented) => "deepdb_augmented.zip",
                Collection::Run(Run::ParsedPlans) => "parsed_plans.zip",
                Collection::Run(Run::Raw) => "raw.zip",
            };
            (name, zip_bytes(&[("part.csv", b"1,2,3\n")]))
        })
        .collect()
}

#[test]
fn already_downloaded_skips_network_and_writes() {
    let (_temp, store) = temp_store();
    populate_all(&store);
    let app = App::new(store.clone(), MockOsf::with_files(full_bundle()));

    let outcome = app
        .download_project(&ProjectId::default(), &Silent)
        .unwrap();

    assert_eq!(outcome, FetchOutcome::AlreadyPresent);
    assert_eq!(app.client().calls(), 0);
    let staged = fs::read_dir(store.staging_root().as_std_path()).unwrap().count();
    assert_eq!(staged, 0);
}

#[test]
fn full_run_populates_every_collection_and_clears_archives() {
    let (_temp, store) = temp_store();
    let app = App::new(store.clone(), MockOsf::with_files(full_bundle()));

    let outcome = app
        .download_project(&ProjectId::default(), &Silent)
        .unwrap();

    let FetchOutcome::Downloaded { files, extracted } = outcome else {
        panic!("expected a download");
    };
    assert_eq!(files.len(), 7);
    assert_eq!(extracted, Collection::all().collect::<Vec<_>>());
    for collection in Collection::all() {
        let dir = store.collection_dir(collection);
        assert!(dir.join("part.csv").as_std_path().is_file(), "{dir}");
        assert!(!store.archive_path(collection).as_std_path().exists());
    }
    // project, storages, files, then one download per file
    assert_eq!(app.client().calls(), 3 + 7);
}

#[test]
fn non_archive_files_stay_in_staging() {
    let (_temp, store) = temp_store();
    let mut bundle = full_bundle();
    bundle.push(("README.md", b"# bundle".to_vec()));
    let app = App::new(store.clone(), MockOsf::with_files(bundle));

    app.download_project(&ProjectId::default(), &Silent)
        .unwrap();

    let readme = store.staging_path("README.md");
    assert_eq!(fs::read(readme.as_std_path()).unwrap(), b"# bundle");
}

#[test]
fn stale_staged_files_are_overwritten() {
    let (_temp, store) = temp_store();
    let airline = store.archive_path(Collection::Dataset(Dataset::Airline));
    fs::write(airline.as_std_path(), b"junk from an interrupted run").unwrap();
    let readme = store.staging_path("README.md");
    fs::write(readme.as_std_path(), b"old readme, longer than the new one").unwrap();
    let mut bundle = full_bundle();
    bundle.push(("README.md", b"# bundle".to_vec()));
    let app = App::new(store.clone(), MockOsf::with_files(bundle));

    app.download_project(&ProjectId::default(), &Silent)
        .unwrap();

    // the junk archive would have failed extraction had it survived
    let csv = store.data_root().join("airline/part.csv");
    assert_eq!(fs::read(csv.as_std_path()).unwrap(), b"1,2,3\n");
    assert!(!airline.as_std_path().exists());
    assert_eq!(fs::read(readme.as_std_path()).unwrap(), b"# bundle");
    let staged = fs::read_dir(store.staging_root().as_std_path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(staged, vec!["README.md".to_string()]);
}

#[test]
fn extract_airline_into_subdirectory() {
    let (_temp, store) = temp_store();
    let archive = store.archive_path(Collection::Dataset(Dataset::Airline));
    fs::write(
        archive.as_std_path(),
        zip_bytes(&[("a.csv", b"a"), ("b.csv", b"b")]),
    )
    .unwrap();
    let app = App::new(store.clone(), MockOsf::default());

    let extracted = app.move_downloads(&Silent).unwrap();

    assert_eq!(extracted, vec![Collection::Dataset(Dataset::Airline)]);
    assert!(store.data_root().join("airline/a.csv").as_std_path().is_file());
    assert!(store.data_root().join("airline/b.csv").as_std_path().is_file());
    assert!(!archive.as_std_path().exists());
}

#[test]
fn extract_airline_into_root() {
    let (_temp, store) = temp_store();
    let archive = store.archive_path(Collection::Dataset(Dataset::Airline));
    fs::write(
        archive.as_std_path(),
        zip_bytes(&[("a.csv", b"a"), ("b.csv", b"b")]),
    )
    .unwrap();
    let app = App::new(store.clone(), MockOsf::default()).with_extract_target(ExtractTarget::Root);

    app.move_downloads(&Silent).unwrap();

    assert!(store.data_root().join("a.csv").as_std_path().is_file());
    assert!(store.data_root().join("b.csv").as_std_path().is_file());
    assert!(!archive.as_std_path().exists());
}

#[test]
fn runs_extract_under_runs_root() {
    let (_temp, store) = temp_store();
    let archive = store.archive_path(Collection::Run(Run::ParsedPlans));
    fs::write(archive.as_std_path(), zip_bytes(&[("plans/q1.json", b"{}")])).unwrap();
    let app = App::new(store.clone(), MockOsf::default());

    app.move_downloads(&Silent).unwrap();

    assert!(
        store
            .runs_root()
            .join("parsed_plans/plans/q1.json")
            .as_std_path()
            .is_file()
    );
    assert!(!store.data_root().join("parsed_plans").as_std_path().exists());
}

#[test]
fn extraction_without_archives_is_a_no_op() {
    let (_temp, store) = temp_store();
    let app = App::new(store.clone(), MockOsf::default());

    let extracted = app.move_downloads(&Silent).unwrap();

    assert!(extracted.is_empty());
    assert_eq!(fs::read_dir(store.data_root().as_std_path()).unwrap().count(), 0);
    assert_eq!(fs::read_dir(store.runs_root().as_std_path()).unwrap().count(), 0);
}

#[test]
fn corrupt_archive_aborts_and_is_kept() {
    let (_temp, store) = temp_store();
    let archive = store.archive_path(Collection::Dataset(Dataset::Imdb));
    fs::write(archive.as_std_path(), b"definitely not a zip").unwrap();
    let app = App::new(store.clone(), MockOsf::default());

    let err = app.move_downloads(&Silent).unwrap_err();

    assert_matches!(err, FetchError::Archive(_));
    assert!(archive.as_std_path().exists());
}

#[test]
fn project_errors_propagate() {
    let (_temp, store) = temp_store();
    let client = MockOsf {
        fail_project: true,
        ..MockOsf::default()
    };
    let app = App::new(store, client);

    let err = app
        .download_project(&ProjectId::default(), &Silent)
        .unwrap_err();

    assert_matches!(err, FetchError::ProjectNotFound(id) if id == "ga2xj");
    assert_eq!(app.client().calls(), 1);
}

#[test]
fn clean_up_removes_staging() {
    let (_temp, store) = temp_store();
    fs::write(store.staging_path("leftover.bin").as_std_path(), b"x").unwrap();
    let app = App::new(store.clone(), MockOsf::default());

    app.clean_up().unwrap();

    assert!(!store.staging_root().as_std_path().exists());
}

#[test]
fn clean_up_without_staging_fails() {
    let (_temp, store) = temp_store();
    fs::remove_dir_all(store.staging_root().as_std_path()).unwrap();
    let app = App::new(store, MockOsf::default());

    let err = app.clean_up().unwrap_err();

    assert_matches!(err, FetchError::Filesystem(_));
}
