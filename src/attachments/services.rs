use std::path::{Path, PathBuf};

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("unrecognized attachment format")]
    UnrecognizedFormat,
    #[error("attachment payload is not valid base64: {0}")]
    InvalidPayload(#[from] base64::DecodeError),
    #[error("attachment i/o failure: {0}")]
    IoFailure(#[from] std::io::Error),
}

// Browsers pad their data URIs, hand-built payloads often don't.
const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub struct DecodedImage {
    pub body: Bytes,
    pub content_type: String,
}

/// Splits a `data:image/<subtype>;base64,<payload>` string and decodes the payload.
pub fn parse_data_uri(data: &str) -> Result<DecodedImage, AttachmentError> {
    lazy_static! {
        static ref DATA_URI_RE: Regex = Regex::new(r"^data:(image/\w+);base64,(.+)$").unwrap();
    }
    let caps = DATA_URI_RE
        .captures(data.trim())
        .ok_or(AttachmentError::UnrecognizedFormat)?;
    let body = LENIENT_STANDARD.decode(caps[2].trim())?;
    Ok(DecodedImage {
        body: Bytes::from(body),
        content_type: caps[1].to_ascii_lowercase(),
    })
}

fn ext_from_mime(ct: &str) -> &str {
    match ct {
        "image/jpeg" | "image/jpg" => "jpg",
        other => other.strip_prefix("image/").unwrap_or("bin"),
    }
}

/// Writes complaint photos into a single directory as `<reference>.<ext>`.
#[derive(Debug, Clone)]
pub struct AttachmentSaver {
    dir: PathBuf,
}

impl AttachmentSaver {
    pub async fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// Saves the image under the reference code. Never overwrites an
    /// existing file.
    pub async fn save(&self, data_uri: &str, reference: &str) -> Result<PathBuf, AttachmentError> {
        let image = parse_data_uri(data_uri)?;
        let path = self
            .dir
            .join(format!("{}.{}", reference, ext_from_mime(&image.content_type)));

        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        self.fill(&path, file, &image.body).await?;

        debug!(path = %path.display(), bytes = image.body.len(), content_type = %image.content_type, "attachment saved");
        Ok(path)
    }

    /// Writes `body` into a freshly created `path`, removing it again if the
    /// write does not complete.
    async fn fill<W>(&self, path: &Path, mut out: W, body: &[u8]) -> Result<(), AttachmentError>
    where
        W: AsyncWrite + Unpin,
    {
        let written = async {
            out.write_all(body).await?;
            out.flush().await
        }
        .await;
        drop(out);
        if let Err(e) = written {
            self.discard(path).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Like [`save`](Self::save), but a failure only costs the photo.
    pub async fn save_best_effort(&self, data_uri: &str, reference: &str) -> Option<PathBuf> {
        match self.save(data_uri, reference).await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, %reference, "attachment not saved");
                None
            }
        }
    }

    pub async fn discard(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(error = %e, path = %path.display(), "could not remove orphaned attachment");
        }
    }
}
