use anyhow::Context;
use std::path::{Path, PathBuf};
use tokio::{fs, io::AsyncWriteExt};

/// Whitespace and underscores become `_`, anything other than ASCII
/// alphanumerics and `-` is dropped, runs of `_` collapse.
pub fn sanitize_component(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' {
            out.push(ch);
        } else if (ch.is_whitespace() || ch == '_') && !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

/// `<phrase>_<style>_<NNNN>.jpg`
pub fn image_filename(phrase: &str, style: &str, counter: u32) -> String {
    let phrase = match sanitize_component(phrase) {
        p if p.is_empty() => "image".to_string(),
        p => p,
    };
    let style = sanitize_component(style);
    if style.is_empty() {
        format!("{phrase}_{counter:04}.jpg")
    } else {
        format!("{phrase}_{style}_{counter:04}.jpg")
    }
}

/// Writes the bytes untouched through a temp file and rename.
pub async fn write_image(out_dir: &Path, filename: &str, bytes: &[u8]) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    let path = out_dir.join(filename);
    let tmp = out_dir.join(format!("{filename}.tmp"));
    {
        let mut f = fs::File::create(&tmp)
            .await
            .with_context(|| format!("creating {}", tmp.display()))?;
        f.write_all(bytes).await?;
        let _ = f.sync_all().await; // best-effort
    }
    fs::rename(&tmp, &path).await?;
    Ok(path)
}
