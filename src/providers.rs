use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ImageBuffer, Rgba};
use regex::Regex;
use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    redirect, StatusCode,
};
use serde::{Deserialize, Serialize};
use std::{
    sync::{Arc, OnceLock},
    time::{Duration, Instant},
};

use crate::config::{BingCfg, Credentials, ProviderKind};

pub const MAX_IMAGES: u8 = 4;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("both U_COOKIE and SRCHHPGUSR are required")]
    MissingCredentials,
    #[error("cookie {0} contains characters that are not valid in an HTTP header")]
    InvalidCookie(&'static str),
    #[error("the prompt has been blocked by the content policy")]
    Blocked,
    #[error("the prompt is being reviewed")]
    UnderReview,
    #[error("the prompt language is not supported")]
    UnsupportedLanguage,
    #[error("no redirect from the create endpoint; the cookies may be invalid or expired")]
    NoRedirect,
    #[error("timed out after {0:?} waiting for results")]
    Timeout(Duration),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Fatal(String),
}

/// One entry from a provider: a bare URL or an object carrying `url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeneratedItem {
    Url(String),
    Object { url: String },
    Other(serde_json::Value),
}

impl GeneratedItem {
    pub fn url(&self) -> Option<&str> {
        match self {
            GeneratedItem::Url(u) | GeneratedItem::Object { url: u } => {
                let u = u.trim();
                (!u.is_empty()).then_some(u)
            }
            GeneratedItem::Other(_) => None,
        }
    }
}

/// Keeps every item that carries a URL, in order.
pub fn collect_urls(items: &[GeneratedItem]) -> Vec<String> {
    items.iter().filter_map(|i| i.url()).map(str::to_string).collect()
}

pub fn clamp_count(count: u8) -> u8 {
    count.clamp(1, MAX_IMAGES)
}

#[async_trait]
pub trait ImageProvider: Send + Sync {
    async fn generate(&self, prompt: &str, count: u8) -> Result<Vec<GeneratedItem>, ProviderError>;
    fn name(&self) -> &'static str;
}

/// Building a provider doubles as credential validation.
pub fn build_provider(
    kind: ProviderKind,
    creds: &Credentials,
    bing: &BingCfg,
) -> Result<Arc<dyn ImageProvider>, ProviderError> {
    match kind {
        ProviderKind::Bing => Ok(Arc::new(BingProvider::new(creds, bing)?)),
        ProviderKind::Mock => Ok(Arc::new(MockProvider)),
    }
}

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0";

/// Placeholder images Bing serves instead of real results.
const BAD_IMAGES: [&str; 2] = [
    "https://r.bing.com/rp/in-2zU3AJUdkgFe7ZKv19yPBHVs.png",
    "https://r.bing.com/rp/TX9QuO3WzcCJz1uaaSwQAz39Kb0.jpg",
];

pub struct BingProvider {
    client: reqwest::Client,
    base_url: String,
    poll_timeout: Duration,
    poll_interval: Duration,
}

impl BingProvider {
    pub fn new(creds: &Credentials, cfg: &BingCfg) -> Result<Self, ProviderError> {
        if !creds.is_complete() {
            return Err(ProviderError::MissingCredentials);
        }
        // Validate each value on its own so the error names the bad one.
        HeaderValue::from_str(&creds.u_cookie).map_err(|_| ProviderError::InvalidCookie("_U"))?;
        HeaderValue::from_str(&creds.srchhpgusr)
            .map_err(|_| ProviderError::InvalidCookie("SRCHHPGUSR"))?;
        let cookie = format!("_U={}; SRCHHPGUSR={}", creds.u_cookie, creds.srchhpgusr);

        let base_url = cfg.base_url.trim_end_matches('/').to_string();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&cookie).map_err(|_| ProviderError::InvalidCookie("_U"))?,
        );
        headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        if let Ok(referer) = HeaderValue::from_str(&format!("{base_url}/images/create/")) {
            headers.insert(header::REFERER, referer);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(redirect::Policy::none())
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url,
            poll_timeout: Duration::from_secs(cfg.poll_timeout_secs),
            poll_interval: Duration::from_millis(cfg.poll_interval_ms),
        })
    }

    /// Submits the prompt and returns the redirect location.
    async fn submit(&self, prompt: &str) -> Result<String, ProviderError> {
        let url = format!("{}/images/create", self.base_url);
        for rt in ["4", "3"] {
            let resp = self
                .client
                .post(&url)
                .query(&[("q", prompt), ("rt", rt), ("FORM", "GENCRE")])
                .form(&[("q", prompt), ("qs", "ds")])
                .send()
                .await?;
            if resp.status() == StatusCode::FOUND {
                if let Some(loc) = resp.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()) {
                    return Ok(loc.replace("&nfy=1", ""));
                }
            }
            let body = resp.text().await?;
            check_body(&body)?;
            tracing::debug!(rt, "create endpoint did not redirect, retrying with next mode");
        }
        Err(ProviderError::NoRedirect)
    }

    async fn poll_results(&self, request_id: &str, prompt: &str) -> Result<String, ProviderError> {
        let url = format!("{}/images/create/async/results/{request_id}", self.base_url);
        let started = Instant::now();
        loop {
            if started.elapsed() > self.poll_timeout {
                return Err(ProviderError::Timeout(self.poll_timeout));
            }
            let resp = self.client.get(&url).query(&[("q", prompt)]).send().await?;
            if !resp.status().is_success() {
                return Err(ProviderError::Fatal(format!(
                    "could not get results: status {}",
                    resp.status()
                )));
            }
            let body = resp.text().await?;
            if !body.trim().is_empty() && !body.contains("errorMessage") {
                return Ok(body);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl ImageProvider for BingProvider {
    fn name(&self) -> &'static str {
        "bing"
    }

    async fn generate(&self, prompt: &str, count: u8) -> Result<Vec<GeneratedItem>, ProviderError> {
        let location = self.submit(prompt).await?;
        let request_id = extract_request_id(&location)
            .ok_or_else(|| ProviderError::Fatal(format!("no request id in redirect {location}")))?;
        tracing::debug!(request_id = %request_id, "prompt accepted");

        // The redirect page has to be visited before results are served.
        let landing = if location.starts_with("http") {
            location.clone()
        } else {
            format!("{}{}", self.base_url, location)
        };
        self.client.get(&landing).send().await?;

        let body = self.poll_results(&request_id, prompt).await?;
        let links = parse_image_links(&body);
        if links.iter().any(|l| BAD_IMAGES.contains(&l.as_str())) {
            return Err(ProviderError::Fatal("bad images returned".into()));
        }
        if links.is_empty() {
            return Err(ProviderError::Fatal("no images in results".into()));
        }
        Ok(links
            .into_iter()
            .take(clamp_count(count) as usize)
            .map(GeneratedItem::Url)
            .collect())
    }
}

pub fn extract_request_id(location: &str) -> Option<String> {
    let (_, rest) = location.rsplit_once("id=")?;
    let id = rest.split('&').next().unwrap_or_default();
    (!id.is_empty()).then(|| id.to_string())
}

/// Errors Bing reports in the body of a non-redirect response.
pub fn check_body(body: &str) -> Result<(), ProviderError> {
    let lower = body.to_lowercase();
    if lower.contains("this prompt has been blocked") {
        return Err(ProviderError::Blocked);
    }
    if lower.contains("this prompt is being reviewed") {
        return Err(ProviderError::UnderReview);
    }
    if lower.contains("we're working hard to offer image creator in more languages") {
        return Err(ProviderError::UnsupportedLanguage);
    }
    Ok(())
}

fn src_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"src="([^"]+)""#).expect("static regex"))
}

/// Absolute `src` links with size parameters stripped, first occurrence kept.
pub fn parse_image_links(body: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for cap in src_re().captures_iter(body) {
        let link = cap[1].split("?w=").next().unwrap_or_default();
        if !link.starts_with("http") {
            continue;
        }
        if !out.iter().any(|l| l == link) {
            out.push(link.to_string());
        }
    }
    out
}

/// Offline provider: synthesizes PNGs and hands them back as `data:` URLs.
pub struct MockProvider;

#[async_trait]
impl ImageProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn generate(&self, prompt: &str, count: u8) -> Result<Vec<GeneratedItem>, ProviderError> {
        let count = clamp_count(count);
        let mut items = Vec::with_capacity(count as usize);
        for n in 0..count {
            let png = mock_png(prompt, n)?;
            items.push(GeneratedItem::Object {
                url: format!("data:image/png;base64,{}", STANDARD.encode(png)),
            });
        }
        Ok(items)
    }
}

fn mock_png(prompt: &str, n: u8) -> Result<Vec<u8>, ProviderError> {
    // Small and fast enough to do inline.
    let w = 256u32;
    let h = 256u32;
    let tint = ((prompt.len() * 37 + n as usize * 61) % 255) as u8;
    let mut img = ImageBuffer::<Rgba<u8>, Vec<u8>>::new(w, h);
    for (x, y, p) in img.enumerate_pixels_mut() {
        let v = ((x ^ y) & 0xFF) as u8;
        *p = Rgba([v, 255 - v, tint, 255]);
    }
    let mut png_bytes: Vec<u8> = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut png_bytes), image::ImageFormat::Png)
        .map_err(|e| ProviderError::Fatal(format!("encode error: {e}")))?;
    Ok(png_bytes)
}
