use std::io::Write;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::domain::ProjectId;
use crate::error::FetchError;

pub const DEFAULT_API_URL: &str = "https://api.osf.io/v2";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: String,
    pub title: String,
    pub storages_url: String,
}

/// A storage provider attached to a project, e.g. `osfstorage`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Storage {
    pub name: String,
    pub files_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub name: String,
    pub download_url: String,
}

/// The slice of a hosted-storage service the fetcher needs: resolve a
/// project, list its storages, list their files, stream a file.
pub trait StorageClient {
    fn project(&self, id: &ProjectId) -> Result<Project, FetchError>;
    fn storages(&self, project: &Project) -> Result<Vec<Storage>, FetchError>;
    /// Every file in the storage, folders walked recursively.
    fn files(&self, storage: &Storage) -> Result<Vec<RemoteFile>, FetchError>;
    /// Streams the file body into `sink`, returning the number of bytes written.
    fn download(&self, file: &RemoteFile, sink: &mut dyn Write) -> Result<u64, FetchError>;
}

#[derive(Clone)]
pub struct OsfHttpClient {
    client: Client,
    base_url: String,
}

impl OsfHttpClient {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_base_url(DEFAULT_API_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("osf-fetch/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| FetchError::OsfHttp(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.api+json"));

        // No overall timeout: archive bodies can take minutes to stream.
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(30))
            .timeout(None)
            .build()
            .map_err(|err| FetchError::OsfHttp(err.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn get(&self, url: &str) -> Result<Response, FetchError> {
        debug!("GET {url}");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| FetchError::OsfHttp(err.to_string()))?;
        check_status(response)
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        self.get(url)?
            .json::<T>()
            .map_err(|err| FetchError::OsfResponse(format!("{url}: {err}")))
    }
}

impl StorageClient for OsfHttpClient {
    fn project(&self, id: &ProjectId) -> Result<Project, FetchError> {
        let url = format!("{}/nodes/{}/", self.base_url, id.as_str());
        let document: Document<ProjectNode> = self.get_json(&url).map_err(|err| match err {
            FetchError::OsfStatus { status, .. } if is_not_found(status) => {
                FetchError::ProjectNotFound(id.to_string())
            }
            other => other,
        })?;
        Ok(Project {
            id: document.data.id,
            title: document.data.attributes.title,
            storages_url: format!("{}/nodes/{}/files/", self.base_url, id.as_str()),
        })
    }

    fn storages(&self, project: &Project) -> Result<Vec<Storage>, FetchError> {
        collect_pages(&project.storages_url, &mut |url| self.get_json(url))
            .map(|nodes: Vec<StorageNode>| nodes.into_iter().map(Storage::from).collect())
    }

    fn files(&self, storage: &Storage) -> Result<Vec<RemoteFile>, FetchError> {
        let mut files = Vec::new();
        walk_folder(&storage.files_url, &mut |url| self.get_json(url), &mut files)?;
        Ok(files)
    }

    fn download(&self, file: &RemoteFile, sink: &mut dyn Write) -> Result<u64, FetchError> {
        let mut response = self.get(&file.download_url)?;
        response
            .copy_to(sink)
            .map_err(|err| FetchError::OsfHttp(format!("{}: {err}", file.name)))
    }
}

/// Follows `links.next` until the listing is exhausted.
fn collect_pages<T, F>(url: &str, fetch: &mut F) -> Result<Vec<T>, FetchError>
where
    F: FnMut(&str) -> Result<Page<T>, FetchError>,
{
    let mut items = Vec::new();
    let mut next = Some(url.to_string());
    while let Some(url) = next {
        let page = fetch(&url)?;
        items.extend(page.data);
        next = page.links.next;
    }
    Ok(items)
}

/// Collects every file below `url`, descending into folders.
fn walk_folder<F>(
    url: &str,
    fetch: &mut F,
    files: &mut Vec<RemoteFile>,
) -> Result<(), FetchError>
where
    F: FnMut(&str) -> Result<Page<FileNode>, FetchError>,
{
    for entry in collect_pages(url, fetch)? {
        if !entry.is_folder() {
            files.push(entry.into_remote_file()?);
            continue;
        }
        let name = entry.attributes.name;
        let href = entry
            .relationships
            .and_then(|rel| rel.files)
            .map(|files| files.links.related.href)
            .ok_or_else(|| FetchError::OsfResponse(format!("folder {name} has no files link")))?;
        walk_folder(&href, fetch, files)?;
    }
    Ok(())
}

fn check_status(response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .ok()
        .filter(|body| !body.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("OSF request failed")
                .to_string()
        });
    Err(FetchError::OsfStatus {
        status: status.as_u16(),
        message: truncate(&message, 512),
    })
}

fn truncate(message: &str, max: usize) -> String {
    match message.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &message[..idx]),
        None => message.to_string(),
    }
}

fn is_not_found(status: u16) -> bool {
    matches!(status, 404 | 410)
}

#[derive(Debug, Deserialize)]
struct Document<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    data: Vec<T>,
    #[serde(default)]
    links: PageLinks,
}

#[derive(Debug, Default, Deserialize)]
struct PageLinks {
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProjectNode {
    id: String,
    attributes: ProjectAttributes,
}

#[derive(Debug, Deserialize)]
struct ProjectAttributes {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct StorageNode {
    attributes: StorageAttributes,
    relationships: FilesRelationship,
}

#[derive(Debug, Deserialize)]
struct StorageAttributes {
    name: String,
}

#[derive(Debug, Deserialize)]
struct FilesRelationship {
    files: Related,
}

#[derive(Debug, Deserialize)]
struct OptionalFilesRelationship {
    #[serde(default)]
    files: Option<Related>,
}

#[derive(Debug, Deserialize)]
struct Related {
    links: RelatedLinks,
}

#[derive(Debug, Deserialize)]
struct RelatedLinks {
    related: Href,
}

#[derive(Debug, Deserialize)]
struct Href {
    href: String,
}

#[derive(Debug, Deserialize)]
struct FileNode {
    attributes: FileAttributes,
    #[serde(default)]
    links: FileLinks,
    #[serde(default)]
    relationships: Option<OptionalFilesRelationship>,
}

#[derive(Debug, Deserialize)]
struct FileAttributes {
    kind: String,
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct FileLinks {
    #[serde(default)]
    download: Option<String>,
}

impl From<StorageNode> for Storage {
    fn from(node: StorageNode) -> Self {
        Storage {
            name: node.attributes.name,
            files_url: node.relationships.files.links.related.href,
        }
    }
}

impl FileNode {
    fn is_folder(&self) -> bool {
        self.attributes.kind == "folder"
    }

    fn into_remote_file(self) -> Result<RemoteFile, FetchError> {
        let download_url = self.links.download.ok_or_else(|| {
            FetchError::OsfResponse(format!("file {} has no download link", self.attributes.name))
        })?;
        Ok(RemoteFile {
            name: self.attributes.name,
            download_url,
        })
    }
}
