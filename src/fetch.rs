use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ImageFormat, ImageReader};
use std::{fmt, io::Cursor, time::Duration};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed data URL: {0}")]
    DataUrl(String),
    #[error("empty image body")]
    Empty,
    #[error("cannot decode image: {0}")]
    Decode(String),
}

/// Downloads image bytes for display and saving.
pub struct ImageFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl ImageFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self { client: reqwest::Client::new(), timeout }
    }

    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if url.starts_with("data:") {
            return decode_data_url(url);
        }
        let resp = self.client.get(url).timeout(self.timeout).send().await?;
        if !resp.status().is_success() {
            return Err(FetchError::Status(resp.status()));
        }
        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            return Err(FetchError::Empty);
        }
        Ok(bytes.to_vec())
    }
}

/// Only base64 payloads are accepted; that is all providers hand out.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>, FetchError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| FetchError::DataUrl("missing data: prefix".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| FetchError::DataUrl("missing ','".into()))?;
    if !meta.ends_with(";base64") {
        return Err(FetchError::DataUrl("only base64 payloads are supported".into()));
    }
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| FetchError::DataUrl(e.to_string()))?;
    if bytes.is_empty() {
        return Err(FetchError::Empty);
    }
    Ok(bytes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub size: usize,
}

impl fmt::Display for ImageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} {}, {} KiB",
            self.width,
            self.height,
            self.format.extensions_str().first().copied().unwrap_or("image"),
            self.size.div_ceil(1024)
        )
    }
}

/// Reads format and dimensions; the terminal's stand-in for rendering.
pub fn inspect(bytes: &[u8]) -> Result<ImageInfo, FetchError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| FetchError::Decode(e.to_string()))?;
    let format = reader
        .format()
        .ok_or_else(|| FetchError::Decode("unknown image format".into()))?;
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| FetchError::Decode(e.to_string()))?;
    Ok(ImageInfo { format, width, height, size: bytes.len() })
}
