use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::{fs, io::AsyncWriteExt, sync::Mutex};

/// One saved image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub phrase: String,
    pub style: String,
    pub prompt: String,
    pub timestamp: String,
    pub filename: String,
}

impl LogRecord {
    pub fn new(phrase: &str, style: &str, prompt: &str, filename: &str) -> Self {
        Self {
            phrase: phrase.to_string(),
            style: style.to_string(),
            prompt: prompt.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            filename: filename.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("generation log i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("generation log {path} is not a JSON array of records: {source}")]
    Malformed { path: PathBuf, source: serde_json::Error },
    #[error("encoding generation log: {0}")]
    Encode(serde_json::Error),
}

/// Append-only JSON array on disk. Appends rewrite the whole array through a
/// temp file so a crash never leaves half a document behind.
pub struct GenerationLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl GenerationLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path, lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read_all(&self) -> Result<Vec<LogRecord>, LogError> {
        let bytes = match fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&bytes)
            .map_err(|source| LogError::Malformed { path: self.path.clone(), source })
    }

    /// Returns the number of records after the append.
    pub async fn append(&self, rec: &LogRecord) -> Result<usize, LogError> {
        let _guard = self.lock.lock().await;
        let mut records = self.read_all().await?;
        records.push(rec.clone());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec_pretty(&records).map_err(LogError::Encode)?;
        let mut tmp_name = self.path.clone().into_os_string();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);
        {
            let mut f = fs::File::create(&tmp).await?;
            f.write_all(&body).await?;
            f.flush().await?;
            let _ = f.sync_all().await;
        }
        fs::rename(&tmp, &self.path).await?;
        Ok(records.len())
    }
}
