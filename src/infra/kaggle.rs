use async_trait::async_trait;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};
use zip::ZipArchive;

use crate::app::ports::DatasetProvider;
use crate::constants::KAGGLE_API_BASE;
use crate::error::{IngestError, Result};

/// Dataset provider backed by the Kaggle REST API.
///
/// Credentials follow the Kaggle CLI convention: a `kaggle.json` file inside
/// the configured directory holding `{"username": ..., "key": ...}`.
pub struct KaggleClient {
    client: reqwest::Client,
    config_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct KaggleCredentials {
    username: String,
    key: String,
}

impl KaggleClient {
    pub fn new(config_dir: PathBuf) -> Self {
        Self {
            client: reqwest::Client::new(),
            config_dir,
        }
    }

    fn credentials(&self) -> Result<KaggleCredentials> {
        let path = self.config_dir.join("kaggle.json");
        let raw = fs::read_to_string(&path).map_err(|_| {
            IngestError::Authentication(format!(
                "credentials file not found at {}",
                path.display()
            ))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            IngestError::Authentication(format!(
                "invalid credentials file {}: {e}",
                path.display()
            ))
        })
    }

    /// Extracts every file entry into `destination` and returns the resulting
    /// paths, sorted so callers see a stable order.
    fn unpack_archive(archive_path: &Path, destination: &Path) -> Result<Vec<PathBuf>> {
        let file = fs::File::open(archive_path)?;
        let mut archive = ZipArchive::new(file)?;
        let mut extracted = Vec::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if !entry.is_file() {
                continue;
            }
            // Skip entries whose names would escape the destination folder.
            let Some(relative) = entry.enclosed_name() else {
                continue;
            };
            let outpath = destination.join(relative);
            if let Some(parent) = outpath.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = fs::File::create(&outpath)?;
            std::io::copy(&mut entry, &mut out)?;
            extracted.push(outpath);
        }
        extracted.sort();
        Ok(extracted)
    }
}

#[async_trait]
impl DatasetProvider for KaggleClient {
    async fn authenticate(&self) -> Result<()> {
        let credentials = self.credentials()?;
        if credentials.username.is_empty() || credentials.key.is_empty() {
            return Err(IngestError::Authentication(
                "kaggle.json is missing a username or key".to_string(),
            ));
        }
        debug!("Kaggle credentials loaded for user {}", credentials.username);
        Ok(())
    }

    #[instrument(skip(self, destination))]
    async fn fetch(
        &self,
        dataset: &str,
        destination: &Path,
        unpack: bool,
    ) -> Result<Vec<PathBuf>> {
        let credentials = self.credentials()?;
        let url = format!("{KAGGLE_API_BASE}/datasets/download/{dataset}");
        info!("Requesting {}", url);

        let response = self
            .client
            .get(&url)
            .basic_auth(&credentials.username, Some(&credentials.key))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(IngestError::Transport(format!(
                "dataset download returned HTTP {}",
                response.status().as_u16()
            )));
        }
        let bytes = response.bytes().await?;

        let slug = dataset.rsplit('/').next().unwrap_or(dataset);
        let archive_path = destination.join(format!("{slug}.zip"));
        fs::write(&archive_path, &bytes)?;
        debug!(
            "Archive of {} bytes written to {}",
            bytes.len(),
            archive_path.display()
        );

        if !unpack {
            return Ok(vec![archive_path]);
        }
        let extracted = Self::unpack_archive(&archive_path, destination)?;
        fs::remove_file(&archive_path)?;
        info!("Unpacked {} file(s) into {}", extracted.len(), destination.display());
        Ok(extracted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_zip(dir: &Path, entries: &[(&str, &str)]) -> PathBuf {
        let mut buf = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            for (name, content) in entries {
                let options = zip::write::SimpleFileOptions::default()
                    .compression_method(zip::CompressionMethod::Stored);
                writer.start_file(*name, options).unwrap();
                writer.write_all(content.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        let path = dir.join("dataset.zip");
        fs::write(&path, &buf).unwrap();
        path
    }

    #[test]
    fn unpack_extracts_files_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_zip(
            dir.path(),
            &[("train.csv", "a,b\n1,2\n"), ("META.txt", "about")],
        );
        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();

        let extracted = KaggleClient::unpack_archive(&archive, &out).unwrap();
        assert_eq!(
            extracted,
            vec![out.join("META.txt"), out.join("train.csv")]
        );
        assert_eq!(fs::read_to_string(out.join("train.csv")).unwrap(), "a,b\n1,2\n");
    }

    #[test]
    fn unpack_preserves_nested_entries() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_zip(dir.path(), &[("data/orders.csv", "x\n1\n")]);
        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();

        let extracted = KaggleClient::unpack_archive(&archive, &out).unwrap();
        assert_eq!(extracted, vec![out.join("data/orders.csv")]);
    }

    #[tokio::test]
    async fn authenticate_fails_without_credentials_file() {
        let dir = tempfile::tempdir().unwrap();
        let client = KaggleClient::new(dir.path().to_path_buf());
        let err = client.authenticate().await.unwrap_err();
        assert!(matches!(err, IngestError::Authentication(_)));
    }

    #[tokio::test]
    async fn authenticate_rejects_malformed_credentials() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("kaggle.json"), "{oops").unwrap();
        let client = KaggleClient::new(dir.path().to_path_buf());
        assert!(client.authenticate().await.is_err());
    }

    #[tokio::test]
    async fn authenticate_accepts_well_formed_credentials() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("kaggle.json"),
            r#"{"username": "someone", "key": "k3y"}"#,
        )
        .unwrap();
        let client = KaggleClient::new(dir.path().to_path_buf());
        assert!(client.authenticate().await.is_ok());
    }
}
