//! Upload handling: one independent read → decode → compress → download pipeline per
//! selected file.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{Cursor, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use image::{DynamicImage, ImageDecoder, ImageReader};
use rayon::prelude::*;

use crate::compressor::{compress, OutputBlob};
use crate::data_url::DataUrl;
use crate::error::{CompressError, UploadError};
use crate::settings::Settings;
use crate::status::Status;

pub const OUTPUT_PREFIX: &str = "compressed_";

/// Where the content of an [`InputFile`] comes from.
#[derive(Debug, Clone)]
pub enum FileSource {
    Bytes(Vec<u8>),
    Path(PathBuf),
    DataUrl(String),
}

/// A file selected by the user.
#[derive(Debug, Clone)]
pub struct InputFile {
    name: String,
    media_type: String,
    source: FileSource,
}

impl InputFile {
    pub fn from_bytes(
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            source: FileSource::Bytes(bytes),
        }
    }

    /// The declared media type is derived from the extension, the way a browser fills
    /// in `File.type`. The file is not opened here.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        let media_type = media_type_for_path(&path).to_string();
        Self {
            name,
            media_type,
            source: FileSource::Path(path),
        }
    }

    /// The declared media type is taken from the URL header. A URL without a header
    /// gets an empty type; a bad payload fails on read.
    pub fn from_data_url(name: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        let media_type = DataUrl::declared_type(&url).unwrap_or_default();
        Self {
            name: name.into(),
            media_type,
            source: FileSource::DataUrl(url),
        }
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = media_type.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }

    /// Name of the download produced for this file.
    pub fn output_name(&self) -> String {
        format!("{}{}", OUTPUT_PREFIX, self.name)
    }

    fn read(self) -> Result<Vec<u8>> {
        match self.source {
            FileSource::Bytes(bytes) => Ok(bytes),
            FileSource::Path(path) => {
                fs::read(&path).with_context(|| format!("reading {}", path.display()))
            }
            FileSource::DataUrl(url) => Ok(DataUrl::parse(&url)?.into_data()),
        }
    }
}

fn media_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" | "jpe" | "jfif" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "ico" => "image/x-icon",
        "avif" => "image/avif",
        "svg" => "image/svg+xml",
        "txt" => "text/plain",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// What a sink reports back after starting a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub file_name: String,
    pub location: Option<PathBuf>,
    pub size: usize,
}

/// Receives finished blobs. Shared by every pipeline of a batch.
pub trait DownloadSink: Sync {
    fn deliver(&self, file_name: &str, blob: &OutputBlob) -> Result<Delivery>;
}

/// Writes each download into a directory.
///
/// A name that is already taken, by this batch or by a file on disk, gets a
/// ` (1)`, ` (2)`, ... suffix before the extension, like a browser's download folder.
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    taken: Mutex<HashSet<String>>,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
        Ok(Self {
            dir,
            taken: Mutex::new(HashSet::new()),
        })
    }

    fn reserve(&self, file_name: &str) -> Result<String> {
        let mut taken = self
            .taken
            .lock()
            .map_err(|_| anyhow!("output name registry poisoned"))?;
        let name = (0..)
            .map(|n| numbered_name(file_name, n))
            .find(|name| !taken.contains(name) && !self.dir.join(name).exists())
            .ok_or_else(|| anyhow!("no free name for {}", file_name))?;
        taken.insert(name.clone());
        Ok(name)
    }
}

/// `name` for 0, otherwise `stem (n).ext`.
fn numbered_name(file_name: &str, n: u32) -> String {
    if n == 0 {
        return file_name.to_string();
    }
    match file_name.rfind('.').filter(|&i| i > 0) {
        Some(i) => format!("{} ({}){}", &file_name[..i], n, &file_name[i..]),
        None => format!("{} ({})", file_name, n),
    }
}

impl DownloadSink for DirectorySink {
    fn deliver(&self, file_name: &str, blob: &OutputBlob) -> Result<Delivery> {
        let name = self.reserve(file_name)?;
        let path = self.dir.join(&name);
        let mut out = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        out.write_all(blob.bytes())
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(Delivery {
            file_name: name,
            location: Some(path),
            size: blob.len(),
        })
    }
}

/// Result of one file's pipeline.
#[derive(Debug)]
pub struct FileOutcome {
    pub name: String,
    pub result: Result<Delivery, UploadError>,
}

impl FileOutcome {
    pub fn status(&self) -> Status {
        match &self.result {
            Ok(_) => Status::Success,
            Err(e) => e.status(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-file outcomes of one upload, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
}

impl BatchReport {
    /// The single status line a status field would end up showing.
    pub fn status(&self) -> Status {
        self.outcomes
            .last()
            .map(FileOutcome::status)
            .unwrap_or(Status::Processing)
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Runs every file through its own pipeline in parallel and collects the outcomes.
pub fn handle_upload<S: DownloadSink>(
    files: Vec<InputFile>,
    settings: &Settings,
    sink: &S,
) -> BatchReport {
    if files.is_empty() {
        return BatchReport::default();
    }

    log::info!("{} ({} files)", Status::Processing, files.len());

    let outcomes = files
        .into_par_iter()
        .map(|file| {
            let name = file.name().to_string();
            let result = process_file(file, settings, sink);
            match &result {
                Ok(delivery) => log::info!("{}: {} ({} bytes)", name, Status::Success, delivery.size),
                Err(e) => log::error!("{}: {} ({})", name, e.status(), e),
            }
            FileOutcome { name, result }
        })
        .collect();

    BatchReport { outcomes }
}

/// Pipeline for a single file. Never panics: a panic while compressing is a
/// [`UploadError::CompressionFailure`], one while delivering a
/// [`UploadError::CompressionProcess`].
pub fn process_file<S: DownloadSink + ?Sized>(
    file: InputFile,
    settings: &Settings,
    sink: &S,
) -> Result<Delivery, UploadError> {
    if !file.media_type().starts_with("image/") {
        return Err(UploadError::UnsupportedFormat {
            media_type: file.media_type().to_string(),
        });
    }

    let media_type = file.media_type().to_string();
    let output_name = file.output_name();
    let bytes = file.read().map_err(UploadError::ReadFailure)?;
    let image = decode_image(&bytes).map_err(UploadError::DecodeFailure)?;
    drop(bytes);

    let blob = compress_step(|| compress(&image, settings, &media_type))?;
    drop(image);

    deliver_step(|| sink.deliver(&output_name, &blob))
}

/// Scale, draw and encode. A panic in there counts as a failed compression.
fn compress_step(
    f: impl FnOnce() -> Result<OutputBlob, CompressError>,
) -> Result<OutputBlob, UploadError> {
    match guarded(f) {
        Ok(result) => Ok(result?),
        Err(msg) => Err(CompressError::Panicked(msg).into()),
    }
}

/// Hand-off to the sink. Errors and panics here fail the whole process step.
fn deliver_step(f: impl FnOnce() -> Result<Delivery>) -> Result<Delivery, UploadError> {
    match guarded(f) {
        Ok(result) => result.map_err(UploadError::CompressionProcess),
        Err(msg) => Err(UploadError::CompressionProcess(anyhow!(
            "panicked while delivering: {msg}"
        ))),
    }
}

/// Runs `f`, turning a panic into its message.
fn guarded<T>(f: impl FnOnce() -> T) -> std::result::Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string())
    })
}

/// Decodes image data of any supported format, applying EXIF orientation.
pub fn decode_image(bytes: &[u8]) -> image::ImageResult<DynamicImage> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?
        .into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut image = DynamicImage::from_decoder(decoder)?;
    image.apply_orientation(orientation);
    Ok(image)
}
