//! Image store: the prompt being worked on, the chosen artist and the
//! images produced for the active job.
//!
//! Generated images live outside the chain. Their URLs follow a fixed
//! convention, so the store learns about new images by sending `HEAD` to those URLs
//! rather than by asking the contract.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::{AppConfig, IMAGE_COUNT};
use crate::error::{ImageError, ImageResult};
use crate::models::Artist;

/// Length of the prompt prefix used in download file names.
const FILE_PROMPT_CHARS: usize = 20;

/// Folder used when no artist is selected.
const DEFAULT_FOLDER: &str = "Waterlily";

/// Everything the image views read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageState {
    pub prompt: String,
    pub artist: Option<Artist>,
    /// Job id of the active job, once known
    pub image_id: Option<u64>,
    /// URLs of images already produced for `image_id`
    pub quick_images: Vec<String>,
}

/// Shared image store. Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct ImageStore {
    state: Arc<RwLock<ImageState>>,
    http: reqwest::Client,
    base_url: String,
    download_dir: PathBuf,
}

impl ImageStore {
    pub fn new(base_url: impl Into<String>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            state: Arc::new(RwLock::new(ImageState::default())),
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            download_dir: download_dir.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.image_base_url.clone(), config.download_dir.clone())
    }

    pub fn snapshot(&self) -> ImageState {
        self.state.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_prompt(&self, prompt: impl Into<String>) {
        let prompt = prompt.into();
        self.update(|s| s.prompt = prompt);
    }

    pub fn set_artist(&self, artist: Artist) {
        self.update(|s| s.artist = Some(artist));
    }

    /// Switch to a new job; previously observed images are dropped.
    pub fn set_image_id(&self, id: u64) {
        self.update(|s| {
            s.image_id = Some(id);
            s.quick_images.clear();
        });
    }

    pub fn image_id(&self) -> Option<u64> {
        self.snapshot().image_id
    }

    pub fn quick_images(&self) -> Vec<String> {
        self.snapshot().quick_images
    }

    /// URL of image `index` of job `job_id`.
    pub fn quick_image_url(&self, job_id: u64, index: usize) -> String {
        quick_image_url(&self.base_url, job_id, index)
    }

    /// All image URLs of a job, present or not.
    pub fn job_image_urls(&self, job_id: u64) -> Vec<String> {
        (0..IMAGE_COUNT)
            .map(|index| self.quick_image_url(job_id, index))
            .collect()
    }

    /// Check the active job's image URLs and record the ones that exist.
    ///
    /// Returns the number of images available. Without an active job this
    /// is zero and no request is made.
    pub async fn refresh_quick_images(&self) -> ImageResult<usize> {
        let Some(job_id) = self.image_id() else {
            return Ok(0);
        };

        let found = self.available_images(job_id).await?;
        let count = found.len();
        self.update(|s| {
            // Ignore results for a job that was replaced meanwhile
            if s.image_id == Some(job_id) {
                s.quick_images = found;
            }
        });
        log::debug!("job {}: {}/{} images available", job_id, count, IMAGE_COUNT);
        Ok(count)
    }

    /// URLs of the images of `job_id` that already exist on the host.
    pub async fn available_images(&self, job_id: u64) -> ImageResult<Vec<String>> {
        let mut found = Vec::with_capacity(IMAGE_COUNT);
        for url in self.job_image_urls(job_id) {
            let response = self.http.head(&url).send().await?;
            if response.status().is_success() {
                found.push(url);
            }
        }
        Ok(found)
    }

    /// Folder and file name for image `index` of the current prompt.
    pub fn download_names(&self, index: usize) -> (String, String) {
        let state = self.snapshot();
        let folder = state
            .artist
            .as_ref()
            .map(|a| strip_whitespace(&a.name))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_FOLDER.to_string());
        (folder, download_file_name(&state.prompt, index))
    }

    /// Fetch `link` and save it as `<download_dir>/<folder>/<filename>.png`.
    pub async fn download_image(&self, link: &str, folder: &str, filename: &str) -> ImageResult<PathBuf> {
        let response = self.http.get(link).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::Status {
                url: link.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await?;

        let dir = self.download_dir.join(folder);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("{}.png", filename));
        tokio::fs::write(&path, &bytes).await?;

        log::info!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    fn update(&self, f: impl FnOnce(&mut ImageState)) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state);
    }
}

/// `<base_url>/<job_id>/image_<index>.png`
pub fn quick_image_url(base_url: &str, job_id: u64, index: usize) -> String {
    format!("{}/{}/image_{}.png", base_url.trim_end_matches('/'), job_id, index)
}

/// First characters of the whitespace-free prompt plus the image index.
pub fn download_file_name(prompt: &str, index: usize) -> String {
    let compact: String = strip_whitespace(prompt).chars().take(FILE_PROMPT_CHARS).collect();
    format!("{}-Image_{}", compact, index)
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}
