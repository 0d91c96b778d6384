//! Persisting records: a local JSON file and, optionally, an object-store copy.

use async_trait::async_trait;
use std::{
    fmt::Debug,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    WeatherRecord,
    error::{BoxError, LocalWriteError, RemoteWriteError},
};

pub mod s3;

pub use s3::S3ObjectStore;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Remote destination for record bytes.
#[async_trait]
pub trait ObjectStore: Send + Sync + Debug {
    fn bucket(&self) -> &str;

    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), BoxError>;
}

#[async_trait]
impl<T: ObjectStore + ?Sized> ObjectStore for Arc<T> {
    fn bucket(&self) -> &str {
        (**self).bucket()
    }

    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), BoxError> {
        (**self).put_object(key, body, content_type).await
    }
}

/// What happened to the remote copy of a record.
#[derive(Debug)]
pub enum RemoteOutcome {
    /// No bucket configured.
    Disabled,
    Uploaded { key: String },
    Failed(RemoteWriteError),
}

/// Result of persisting one record. Both destinations are reported separately.
#[derive(Debug)]
pub struct PersistResult {
    pub file_name: String,
    pub local: Result<PathBuf, LocalWriteError>,
    pub remote: RemoteOutcome,
}

/// Writes records to the output directory and, if configured, to an object store.
#[derive(Debug)]
pub struct RecordWriter {
    output_dir: PathBuf,
    remote: Option<Box<dyn ObjectStore>>,
}

impl RecordWriter {
    pub fn new(output_dir: impl Into<PathBuf>, remote: Option<Box<dyn ObjectStore>>) -> Self {
        Self { output_dir: output_dir.into(), remote }
    }

    pub fn local_only(output_dir: impl Into<PathBuf>) -> Self {
        Self::new(output_dir, None)
    }

    /// Serialize once, then write the same bytes locally and remotely.
    ///
    /// A failure on one side never prevents the attempt on the other.
    pub async fn persist(&self, record: &WeatherRecord) -> PersistResult {
        let file_name = record.file_name();

        let body = match serde_json::to_vec_pretty(record) {
            Ok(body) => body,
            Err(source) => {
                return PersistResult {
                    file_name,
                    local: Err(LocalWriteError::Encode { city: record.city.clone(), source }),
                    remote: RemoteOutcome::Disabled,
                };
            }
        };

        let local = self.write_local(record, &file_name, &body).await;
        let remote = self.write_remote(record, body).await;

        PersistResult { file_name, local, remote }
    }

    async fn write_local(
        &self,
        record: &WeatherRecord,
        file_name: &str,
        body: &[u8],
    ) -> Result<PathBuf, LocalWriteError> {
        tokio::fs::create_dir_all(&self.output_dir).await.map_err(|source| {
            LocalWriteError::CreateDir {
                city: record.city.clone(),
                path: self.output_dir.clone(),
                source,
            }
        })?;

        let path = self.output_dir.join(file_name);
        write_new_file(&path, body).await.map_err(|source| LocalWriteError::Write {
            city: record.city.clone(),
            path: path.clone(),
            source,
        })?;

        tracing::info!(city = %record.city, path = %path.display(), "saved record locally");
        Ok(path)
    }

    async fn write_remote(&self, record: &WeatherRecord, body: Vec<u8>) -> RemoteOutcome {
        let Some(store) = &self.remote else {
            return RemoteOutcome::Disabled;
        };

        let key = record.object_key();
        match store.put_object(&key, body, JSON_CONTENT_TYPE).await {
            Ok(()) => {
                tracing::info!(
                    city = %record.city,
                    "uploaded record to s3://{}/{}",
                    store.bucket(),
                    key
                );
                RemoteOutcome::Uploaded { key }
            }
            Err(source) => RemoteOutcome::Failed(RemoteWriteError {
                city: record.city.clone(),
                bucket: store.bucket().to_string(),
                key,
                source,
            }),
        }
    }
}

/// Write `body` to `path`, which must not exist yet.
///
/// The name is claimed with `create_new`, the bytes go to a sibling `.part`
/// file that is renamed over the claim. On error neither file is left behind.
async fn write_new_file(path: &Path, body: &[u8]) -> io::Result<()> {
    tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;

    let part = part_path(path);
    let written = match tokio::fs::write(&part, body).await {
        Ok(()) => tokio::fs::rename(&part, path).await,
        Err(err) => Err(err),
    };

    if written.is_err() {
        let _ = tokio::fs::remove_file(&part).await;
        let _ = tokio::fs::remove_file(path).await;
    }
    written
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}
