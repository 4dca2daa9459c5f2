//! Datasets: lookup, creation from a local file or a remote URL, and export.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::client::Tq42Client;
use crate::error::{Result, SdkError};
use crate::models::{DatasetData, DatasetSensitivity};
use crate::proto::storage::upload_storage_chunk::Payload;
use crate::proto::storage::{
    CreateStorageFromUrlRequest, ExportStorageRequest, GetStorageRequest, ListStoragesRequest,
    StorageProto, UploadStorageChunk, UploadStorageHeader,
};

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Where the content of a new dataset comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource {
    File(PathBuf),
    Url(String),
}

impl DatasetSource {
    /// Exactly one of `file` and `url` must be set; empty values count as unset.
    pub fn resolve(file: Option<&Path>, url: Option<&str>) -> Result<Self> {
        let file = file.filter(|p| !p.as_os_str().is_empty());
        let url = url.filter(|u| !u.is_empty());

        match (file, url) {
            (Some(_), Some(_)) => Err(SdkError::Usage(
                "only one of file or url may be provided".to_string(),
            )),
            (None, None) => Err(SdkError::Usage(
                "one of file or url must be provided".to_string(),
            )),
            (None, Some(url)) => Ok(DatasetSource::Url(url.to_string())),
            (Some(path), None) => {
                if !path.exists() {
                    return Err(SdkError::FileNotFound(path.to_path_buf()));
                }
                if !path.is_file() {
                    return Err(SdkError::Usage(format!(
                        "{} is not a regular file",
                        path.display()
                    )));
                }
                Ok(DatasetSource::File(path.to_path_buf()))
            }
        }
    }
}

/// Parameters for [`Dataset::create`].
#[derive(Debug, Clone, Default)]
pub struct NewDataset {
    /// Falls back to the client's default project when unset.
    pub project_id: Option<String>,
    pub name: String,
    pub description: String,
    pub sensitivity: DatasetSensitivity,
    pub file: Option<PathBuf>,
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Dataset {
    client: Tq42Client,
    id: String,
    data: DatasetData,
}

impl Dataset {
    #[instrument(skip(client))]
    pub async fn get(client: &Tq42Client, id: &str) -> Result<Self> {
        let data = fetch(client, id).await?;
        Ok(Self::from_data(client, data))
    }

    pub fn from_data(client: &Tq42Client, data: DatasetData) -> Self {
        Self {
            client: client.clone(),
            id: data.id.clone(),
            data,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn data(&self) -> &DatasetData {
        &self.data
    }

    #[instrument(skip(self), fields(dataset_id = %self.id))]
    pub async fn refresh(&mut self) -> Result<&mut Self> {
        self.data = fetch(&self.client, &self.id).await?;
        Ok(self)
    }

    /// Create a dataset from either a local file or a remote URL.
    ///
    /// The source is validated before anything is sent. A local file is
    /// streamed to the platform in chunks.
    #[instrument(skip(client, new), fields(name = %new.name))]
    pub async fn create(client: &Tq42Client, new: NewDataset) -> Result<Self> {
        let source = DatasetSource::resolve(new.file.as_deref(), new.url.as_deref())?;
        let project_id = client.config().resolve_project(new.project_id.as_deref())?;
        let sensitivity = new.sensitivity.to_proto() as i32;

        let resp = match source {
            DatasetSource::Url(url) => {
                debug!(%url, "sending CreateStorageFromUrl");
                client
                    .storage()
                    .create_storage_from_url(CreateStorageFromUrlRequest {
                        project_id,
                        name: new.name,
                        description: new.description,
                        sensitivity,
                        url,
                    })
                    .await?
                    .into_inner()
            }
            DatasetSource::File(path) => {
                let header = UploadStorageHeader {
                    project_id,
                    name: new.name,
                    description: new.description,
                    sensitivity,
                    file_name: String::new(),
                    size_bytes: 0,
                };
                upload_file(client, &path, header).await?
            }
        };

        Ok(Self::from_data(client, resp.into()))
    }

    /// Download the dataset into an existing directory, returning the written path.
    #[instrument(skip(self, directory), fields(dataset_id = %self.id))]
    pub async fn export(&self, directory: impl AsRef<Path>) -> Result<PathBuf> {
        let directory = directory.as_ref();
        if !directory.is_dir() {
            return Err(SdkError::Usage(format!(
                "{} is not an existing directory",
                directory.display()
            )));
        }

        let resp = self
            .client
            .storage()
            .export_storage(ExportStorageRequest {
                id: self.id.clone(),
            })
            .await?
            .into_inner();

        let file_name = file_name_from_signed_url(&resp.signed_url)?;
        let target = directory.join(file_name);
        let written = download(self.client.http(), &resp.signed_url, &target).await?;
        info!(path = %target.display(), bytes = written, "dataset exported");
        Ok(target)
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string_pretty(&self.data).map_err(|_| fmt::Error)?;
        write!(f, "Dataset: {json}")
    }
}

async fn fetch(client: &Tq42Client, id: &str) -> Result<DatasetData> {
    debug!(dataset_id = %id, "sending GetStorage");
    let resp = client
        .storage()
        .get_storage(GetStorageRequest { id: id.to_string() })
        .await?
        .into_inner();
    Ok(resp.into())
}

/// List all datasets in a project, defaulting to the client's default project.
#[instrument(skip(client))]
pub async fn list_all(client: &Tq42Client, project_id: Option<&str>) -> Result<Vec<Dataset>> {
    let project_id = client.config().resolve_project(project_id)?;
    let resp = client
        .storage()
        .list_storages(ListStoragesRequest { project_id })
        .await?
        .into_inner();
    Ok(resp
        .storages
        .into_iter()
        .map(|s| Dataset::from_data(client, s.into()))
        .collect())
}

async fn upload_file(
    client: &Tq42Client,
    path: &Path,
    mut header: UploadStorageHeader,
) -> Result<StorageProto> {
    header.file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| SdkError::Usage(format!("{} has no file name", path.display())))?;

    let file = File::open(path).await?;
    header.size_bytes = file.metadata().await?.len();
    debug!(file_name = %header.file_name, size = header.size_bytes, "streaming CreateStorageFromFile");

    let read_error = ReadErrorSlot::default();
    let header = UploadStorageChunk {
        payload: Some(Payload::Header(header)),
    };
    let outbound =
        stream::iter(std::iter::once(header)).chain(data_chunks(file, Arc::clone(&read_error)));

    let result = client.storage().create_storage_from_file(outbound).await;
    if let Some(e) = read_error.lock().await.take() {
        return Err(e.into());
    }
    Ok(result?.into_inner())
}

type ReadErrorSlot = Arc<Mutex<Option<std::io::Error>>>;

/// Chunk `reader` into upload messages.
///
/// A read failure ends the stream early and is parked in `read_error`, to be
/// reported once the call returns.
fn data_chunks<R>(reader: R, read_error: ReadErrorSlot) -> impl Stream<Item = UploadStorageChunk>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    stream::unfold(reader, move |mut reader| {
        let read_error = Arc::clone(&read_error);
        async move {
            let mut buf = vec![0u8; UPLOAD_CHUNK_SIZE];
            match reader.read(&mut buf).await {
                Ok(0) => None,
                Ok(n) => {
                    buf.truncate(n);
                    let chunk = UploadStorageChunk {
                        payload: Some(Payload::Data(buf)),
                    };
                    Some((chunk, reader))
                }
                Err(e) => {
                    *read_error.lock().await = Some(e);
                    None
                }
            }
        }
    })
}

/// Stream `url` into `target`.
///
/// Bytes land in a temporary sibling of `target` that is renamed over it only
/// once the whole body is on disk, so a failed download never touches an
/// existing file.
async fn download(http: &reqwest::Client, url: &str, target: &Path) -> Result<u64> {
    let mut response = http.get(url).send().await?.error_for_status()?;

    let directory = target.parent().unwrap_or_else(|| Path::new("."));
    let partial = tempfile::Builder::new()
        .prefix(".tq42-export-")
        .suffix(".part")
        .tempfile_in(directory)?;
    let mut file = File::from_std(partial.reopen()?);

    let copied = async {
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok::<u64, SdkError>(written)
    }
    .await;
    drop(file);

    match copied {
        Ok(written) => {
            partial.persist(target).map_err(|e| e.error)?;
            Ok(written)
        }
        Err(e) => {
            // Dropping `partial` removes the temporary file.
            warn!(path = %target.display(), error = %e, "download failed, discarding partial file");
            Err(e)
        }
    }
}

/// Extract the object's file name from a signed storage URL.
///
/// The query string is ignored and the last path segment is returned as it
/// appears in the URL, extension included if present.
pub fn file_name_from_signed_url(signed_url: &str) -> Result<String> {
    let url = Url::parse(signed_url)
        .map_err(|e| SdkError::InvalidArgument(format!("invalid url {signed_url:?}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(SdkError::InvalidArgument(format!(
            "not an http(s) storage url: {signed_url:?}"
        )));
    }

    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| SdkError::InvalidArgument(format!("url has no file name: {signed_url:?}")))
}
