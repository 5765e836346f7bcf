//! Local-disk storage for course materials attached to posts.

use crate::config::{FileConfig, ForumPaths};
use crate::error::{ForumError, ForumResult};
use anyhow::Context;
use bytes::Bytes;
use chrono::Utc;
use regex::Regex;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::OnceLock;
use tokio::fs;
use uuid::Uuid;

const PDF_MIME: &str = "application/pdf";
const FALLBACK_MIME: &str = "application/octet-stream";

/// One uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct MaterialFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMaterial {
    pub name: String,
    pub url: String,
    pub mime: String,
    pub size_bytes: u64,
}

#[derive(Debug)]
pub struct MaterialDownload {
    pub name: String,
    pub mime: String,
    pub data: Vec<u8>,
}

#[derive(Clone)]
pub struct MaterialUploader {
    materials_dir: PathBuf,
    config: FileConfig,
}

impl MaterialUploader {
    pub fn new(paths: &ForumPaths, config: FileConfig) -> Self {
        Self {
            materials_dir: paths.materials_dir.clone(),
            config,
        }
    }

    pub fn url_for(&self, name: &str) -> String {
        format!("{}/materials/{name}", self.config.public_base_url)
    }

    /// Writes the file under the materials directory and returns its public
    /// URL. Stored names are `<unix millis>-<short id>-<cleaned name>`.
    pub async fn upload(&self, file: MaterialFile) -> ForumResult<StoredMaterial> {
        if file.data.is_empty() {
            return Err(ForumError::invalid("material file may not be empty"));
        }
        let size_bytes = file.data.len() as u64;
        if size_bytes > self.config.max_upload_bytes {
            return Err(ForumError::invalid(format!(
                "material exceeds the {} byte limit",
                self.config.max_upload_bytes
            )));
        }

        let mime = file
            .content_type
            .as_deref()
            .map(str::trim)
            .filter(|mime| !mime.is_empty())
            .map(str::to_string)
            .or_else(|| infer::get(&file.data).map(|kind| kind.mime_type().to_string()))
            .unwrap_or_else(|| FALLBACK_MIME.to_string());

        let clean = clean_file_name(file.file_name.as_deref().unwrap_or_default());
        let display_name = if mime == PDF_MIME {
            pdf_name(&clean)
        } else if clean.is_empty() {
            "material".to_string()
        } else {
            clean
        };
        let short_id: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
        let name = format!("{}-{short_id}-{display_name}", Utc::now().timestamp_millis());

        fs::create_dir_all(&self.materials_dir)
            .await
            .with_context(|| {
                format!(
                    "failed to create materials directory {}",
                    self.materials_dir.display()
                )
            })?;
        let path = self.materials_dir.join(&name);
        fs::write(&path, &file.data)
            .await
            .with_context(|| format!("failed to write material to {}", path.display()))?;

        tracing::info!(name = %name, mime = %mime, size_bytes, "material stored");
        Ok(StoredMaterial {
            url: self.url_for(&name),
            name,
            mime,
            size_bytes,
        })
    }

    /// Removes materials written for a submission that did not go through.
    /// Failures are logged and otherwise ignored.
    pub async fn discard(&self, materials: &[StoredMaterial]) {
        for material in materials {
            let path = self.materials_dir.join(&material.name);
            if let Err(err) = fs::remove_file(&path).await {
                tracing::warn!(name = %material.name, error = %err, "failed to remove orphaned material");
            }
        }
    }

    /// Reads a stored material back. Names that could escape the materials
    /// directory are rejected.
    pub async fn read(&self, name: &str) -> ForumResult<MaterialDownload> {
        if name.is_empty() || name.starts_with('.') || clean_file_name(name) != name {
            return Err(ForumError::invalid(format!("invalid material name {name:?}")));
        }
        let path = self.materials_dir.join(name);
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ForumError::not_found(format!("material {name} not found")));
            }
            Err(err) => {
                return Err(anyhow::Error::new(err)
                    .context(format!("failed to read {}", path.display()))
                    .into());
            }
        };
        let mime = infer::get(&data)
            .map(|kind| kind.mime_type().to_string())
            .unwrap_or_else(|| FALLBACK_MIME.to_string());
        Ok(MaterialDownload {
            name: name.to_string(),
            mime,
            data,
        })
    }
}

fn file_name_patterns() -> &'static (Regex, Regex) {
    static PATTERNS: OnceLock<(Regex, Regex)> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        (
            Regex::new(r"\s+").expect("whitespace pattern"),
            Regex::new(r"[^A-Za-z0-9._-]").expect("file name pattern"),
        )
    })
}

/// Whitespace runs become `_`; anything outside `[A-Za-z0-9._-]` is dropped.
pub fn clean_file_name(name: &str) -> String {
    let (whitespace, disallowed) = file_name_patterns();
    let underscored = whitespace.replace_all(name.trim(), "_");
    disallowed.replace_all(&underscored, "").into_owned()
}

fn pdf_name(clean: &str) -> String {
    let stem = if clean.to_ascii_lowercase().ends_with(".pdf") {
        &clean[..clean.len() - 4]
    } else {
        clean
    };
    if stem.is_empty() {
        "material.pdf".to_string()
    } else {
        format!("{stem}.pdf")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn uploader(base: &std::path::Path, max_upload_bytes: u64) -> MaterialUploader {
        let paths = ForumPaths::from_base_dir(base).expect("paths");
        MaterialUploader::new(
            &paths,
            FileConfig {
                max_upload_bytes,
                public_base_url: "https://forum.example".into(),
            },
        )
    }

    #[test]
    fn file_names_are_cleaned() {
        assert_eq!(clean_file_name("  Lecture 3 notes (final).PDF "), "Lecture_3_notes_final.PDF");
        assert_eq!(clean_file_name("../../etc/passwd"), "....etcpasswd");
        assert_eq!(pdf_name("Lecture_3.PDF"), "Lecture_3.pdf");
        assert_eq!(pdf_name("slides"), "slides.pdf");
        assert_eq!(pdf_name(""), "material.pdf");
    }

    #[tokio::test]
    async fn upload_then_read_back() {
        let temp = tempdir().expect("tempdir");
        let store = uploader(temp.path(), 1024);

        let stored = store
            .upload(MaterialFile {
                file_name: Some("week 1 slides".into()),
                content_type: Some(PDF_MIME.into()),
                data: Bytes::from_static(b"%PDF-1.4 minimal"),
            })
            .await
            .expect("upload");
        assert!(stored.name.ends_with("-week_1_slides.pdf"), "{}", stored.name);
        assert_eq!(
            stored.url,
            format!("https://forum.example/materials/{}", stored.name)
        );

        let download = store.read(&stored.name).await.expect("read");
        assert_eq!(download.data, b"%PDF-1.4 minimal");
        assert_eq!(download.mime, PDF_MIME);
    }

    #[tokio::test]
    async fn mime_is_sniffed_when_missing() {
        let temp = tempdir().expect("tempdir");
        let store = uploader(temp.path(), 1024);
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        let stored = store
            .upload(MaterialFile {
                file_name: Some("diagram.png".into()),
                content_type: None,
                data: Bytes::copy_from_slice(&png),
            })
            .await
            .expect("upload");
        assert_eq!(stored.mime, "image/png");
        assert!(stored.name.ends_with("-diagram.png"));
    }

    #[tokio::test]
    async fn empty_oversized_and_unsafe_names_are_rejected() {
        let temp = tempdir().expect("tempdir");
        let store = uploader(temp.path(), 4);

        let empty = store
            .upload(MaterialFile {
                file_name: None,
                content_type: None,
                data: Bytes::new(),
            })
            .await;
        assert!(matches!(empty, Err(ForumError::InvalidArgument(_))));

        let large = store
            .upload(MaterialFile {
                file_name: None,
                content_type: None,
                data: Bytes::from_static(b"too large"),
            })
            .await;
        assert!(matches!(large, Err(ForumError::InvalidArgument(_))));

        assert!(matches!(
            store.read("../secret").await,
            Err(ForumError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.read("missing.pdf").await,
            Err(ForumError::NotFound(_))
        ));
    }
}
