use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::{StorageUploader, UploadError, UploadedFile};
use crate::credentials::Credential;

/// Highest numbered variant tried before giving up on a name.
const MAX_CONFLICT_SUFFIX: u32 = 1000;

/// Saves documents under a local root, one directory per folder id. The
/// returned file id is the path relative to the root.
pub struct FilesystemUploader {
    root: PathBuf,
}

impl FilesystemUploader {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `content` into `folder_id`, picking `name_2.ext`, `name_3.ext`
    /// and so on when the name is taken.
    pub async fn store(&self, folder_id: &str, filename: &str, content: &[u8]) -> Result<PathBuf, UploadError> {
        let folder = checked_relative(folder_id)?;
        let file = checked_relative(filename)?;
        if file.components().count() != 1 {
            return Err(UploadError::InvalidDestination(filename.to_string()));
        }

        let dir_path = self.root.join(folder);
        tokio::fs::create_dir_all(&dir_path).await.map_err(|e| UploadError::Io {
            path: dir_path.clone(),
            source: e,
        })?;

        self.store_with_atomic_creation(&dir_path, filename, content).await
    }

    async fn store_with_atomic_creation(
        &self,
        dir_path: &Path,
        filename: &str,
        content: &[u8],
    ) -> Result<PathBuf, UploadError> {
        let (base, ext) = match filename.rfind('.') {
            Some(dot_pos) if dot_pos > 0 => (&filename[..dot_pos], Some(&filename[dot_pos..])),
            _ => (filename, None),
        };

        for counter in 1..=MAX_CONFLICT_SUFFIX {
            let try_filename = if counter == 1 {
                filename.to_string()
            } else {
                match ext {
                    Some(ext) => format!("{}_{}{}", base, counter, ext),
                    None => format!("{}_{}", base, counter),
                }
            };
            let try_path = dir_path.join(&try_filename);

            // create_new is the atomic check-and-create
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&try_path)
                .await
            {
                Ok(file) => {
                    write_or_discard(file, &try_path, content).await?;
                    return Ok(try_path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(UploadError::Io {
                        path: try_path,
                        source: e,
                    })
                }
            }
        }

        Err(UploadError::Io {
            path: dir_path.join(filename),
            source: std::io::Error::new(std::io::ErrorKind::AlreadyExists, "no free file name"),
        })
    }
}

/// Writes `content` and flushes. On failure the partial file at `path` is
/// removed so a name never points at a truncated document.
async fn write_or_discard<W>(mut writer: W, path: &Path, content: &[u8]) -> Result<(), UploadError>
where
    W: AsyncWrite + Unpin,
{
    let written = async {
        writer.write_all(content).await?;
        writer.flush().await
    }
    .await;
    drop(writer);

    match written {
        Ok(()) => Ok(()),
        Err(source) => {
            if let Err(e) = tokio::fs::remove_file(path).await {
                log::warn!("Failed to remove partial file {:?}: {}", path, e);
            }
            Err(UploadError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    }
}

/// Only plain relative paths may name a folder or file.
fn checked_relative(value: &str) -> Result<&Path, UploadError> {
    let path = Path::new(value);
    let plain = !value.trim().is_empty()
        && path.components().all(|c| matches!(c, Component::Normal(_)));
    if plain {
        Ok(path)
    } else {
        Err(UploadError::InvalidDestination(value.to_string()))
    }
}

#[async_trait]
impl StorageUploader for FilesystemUploader {
    async fn upload(
        &self,
        _credential: &Credential,
        folder_id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedFile, UploadError> {
        let path = self.store(folder_id, filename, &bytes).await?;
        let file_id = path
            .strip_prefix(&self.root)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        Ok(UploadedFile {
            file_id,
            web_view_link: None,
        })
    }
}
