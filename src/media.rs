//! Local media hosting.
//!
//! Uploaded files are first written to a temp directory as [`TempUpload`]s,
//! then moved into the media directory by [`MediaHost::upload`], which hands
//! back the public URL. A temp upload that is never hosted deletes itself
//! when dropped.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Upload exceeds {0} bytes")]
    TooLarge(usize),
    #[error("{0}")]
    Multipart(String),
}

/// A file received from a client, held on local disk until hosted.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
    extension: Option<String>,
    size: usize,
    duration: Option<f64>,
    persisted: bool,
}

impl TempUpload {
    /// Start streaming an uploaded file into `upload_dir`, refusing more than `max_bytes`.
    pub async fn create(
        upload_dir: &Path,
        file_name: Option<&str>,
        max_bytes: usize,
    ) -> Result<TempUploadWriter, MediaError> {
        tokio::fs::create_dir_all(upload_dir).await?;
        // Constructed before the file so a failed create or write still cleans up
        let upload = Self {
            path: upload_dir.join(format!("{}.part", uuid::Uuid::new_v4())),
            extension: file_name.and_then(sanitize_extension),
            size: 0,
            duration: None,
            persisted: false,
        };
        let file = tokio::fs::File::create(&upload.path).await?;
        Ok(TempUploadWriter {
            upload,
            file,
            max_bytes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// An upload being written to disk chunk by chunk.
pub struct TempUploadWriter {
    upload: TempUpload,
    file: tokio::fs::File,
    max_bytes: usize,
}

impl TempUploadWriter {
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), MediaError> {
        let size = self.upload.size + chunk.len();
        if size > self.max_bytes {
            return Err(MediaError::TooLarge(self.max_bytes));
        }
        self.file.write_all(chunk).await?;
        self.upload.size = size;
        Ok(())
    }

    /// Flush the file and probe it. Empty uploads are discarded.
    pub async fn finish(self) -> Result<Option<TempUpload>, MediaError> {
        let Self {
            mut upload,
            mut file,
            ..
        } = self;
        file.flush().await?;
        drop(file);

        if upload.size == 0 {
            return Ok(None);
        }
        upload.duration = probe_mp4_file(&upload.path).await;
        Ok(Some(upload))
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if !self.persisted {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %self.path.display(), error = %e, "Failed to remove temp upload");
                }
            }
        }
    }
}

/// Result of hosting a file.
#[derive(Debug, Clone)]
pub struct UploadedMedia {
    pub url: String,
    /// Playback length in seconds, when the file is a recognizable MP4.
    pub duration: Option<f64>,
}

/// Hosts files from a local directory under a public base URL.
#[derive(Debug, Clone)]
pub struct MediaHost {
    media_dir: PathBuf,
    base_url: String,
}

impl MediaHost {
    pub fn new(media_dir: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            media_dir: media_dir.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    /// Move a temp upload into the media directory and return its public URL.
    pub async fn upload(&self, mut upload: TempUpload) -> Result<UploadedMedia, MediaError> {
        tokio::fs::create_dir_all(&self.media_dir).await?;

        let name = match &upload.extension {
            Some(ext) => format!("{}.{}", uuid::Uuid::new_v4(), ext),
            None => uuid::Uuid::new_v4().to_string(),
        };
        let target = self.media_dir.join(&name);

        if tokio::fs::rename(&upload.path, &target).await.is_err() {
            // Different filesystems: fall back to copying
            tokio::fs::copy(&upload.path, &target).await?;
            tokio::fs::remove_file(&upload.path).await.ok();
        }
        upload.persisted = true;

        debug!(name = %name, size = upload.size, "Hosted upload");

        Ok(UploadedMedia {
            url: format!("{}/{}", self.base_url, name),
            duration: upload.duration,
        })
    }

    /// Delete a previously hosted file. URLs this host did not issue are ignored.
    pub async fn remove(&self, url: &str) {
        let Some(name) = self.hosted_name(url) else {
            return;
        };
        if let Err(e) = tokio::fs::remove_file(self.media_dir.join(name)).await {
            warn!(url = %url, error = %e, "Failed to remove hosted media");
        }
    }

    fn hosted_name<'a>(&self, url: &'a str) -> Option<&'a str> {
        let name = url.strip_prefix(&self.base_url)?.strip_prefix('/')?;
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
            && !name.starts_with('.');
        valid.then_some(name)
    }
}

fn sanitize_extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let valid = !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| ext.to_ascii_lowercase())
}

/// Largest `moov` box read into memory when probing.
const MAX_MOOV_BYTES: u64 = 16 * 1024 * 1024;

/// Read the movie duration of an MP4/QuickTime file from its `moov/mvhd` box.
/// Only box headers are read until `moov` is found, so `mdat` is skipped.
async fn probe_mp4_file(path: &Path) -> Option<f64> {
    let mut file = tokio::fs::File::open(path).await.ok()?;
    let len = file.metadata().await.ok()?.len();
    let mut offset = 0u64;

    while len - offset >= 8 {
        file.seek(SeekFrom::Start(offset)).await.ok()?;
        let mut header = [0u8; 16];
        file.read_exact(&mut header[..8]).await.ok()?;

        let size = u64::from(u32::from_be_bytes(header[0..4].try_into().ok()?));
        let (header_len, size) = match size {
            0 => (8, len - offset),
            1 => {
                file.read_exact(&mut header[8..16]).await.ok()?;
                (16, u64::from_be_bytes(header[8..16].try_into().ok()?))
            }
            n => (8, n),
        };
        if size < header_len || size > len - offset {
            return None;
        }

        if &header[4..8] == b"moov" {
            let payload_len = size - header_len;
            if payload_len > MAX_MOOV_BYTES {
                return None;
            }
            let mut moov = vec![0u8; usize::try_from(payload_len).ok()?];
            file.read_exact(&mut moov).await.ok()?;
            return mvhd_duration(find_box(&moov, b"mvhd")?);
        }
        offset += size;
    }
    None
}

fn mvhd_duration(mvhd: &[u8]) -> Option<f64> {
    let version = *mvhd.first()?;

    let (timescale, duration) = if version == 1 {
        // version/flags, creation (8), modification (8)
        let timescale = u32::from_be_bytes(mvhd.get(20..24)?.try_into().ok()?);
        let duration = u64::from_be_bytes(mvhd.get(24..32)?.try_into().ok()?);
        (timescale, duration)
    } else {
        // version/flags, creation (4), modification (4)
        let timescale = u32::from_be_bytes(mvhd.get(12..16)?.try_into().ok()?);
        let duration = u32::from_be_bytes(mvhd.get(16..20)?.try_into().ok()?) as u64;
        (timescale, duration)
    };

    if timescale == 0 {
        return None;
    }
    Some(duration as f64 / timescale as f64)
}

/// Find the payload of the first box with the given type at this level.
fn find_box<'a>(mut data: &'a [u8], kind: &[u8; 4]) -> Option<&'a [u8]> {
    while data.len() >= 8 {
        let size = u32::from_be_bytes(data[0..4].try_into().ok()?) as usize;
        let (header, size) = match size {
            0 => (8, data.len()),
            1 => {
                let large = u64::from_be_bytes(data.get(8..16)?.try_into().ok()?);
                (16, usize::try_from(large).ok()?)
            }
            n => (8, n),
        };
        if size < header || size > data.len() {
            return None;
        }
        if &data[4..8] == kind {
            return Some(&data[header..size]);
        }
        data = &data[size..];
    }
    None
}
