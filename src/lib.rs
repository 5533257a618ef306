//! Downscale images to a maximum dimension and re-encode them at a chosen quality.
//!
//! The same pipeline backs the `image-compressor` CLI and the wasm-bindgen functions
//! below, which a browser page calls with the files picked by the user.

use anyhow::{Context, Result};
use wasm_bindgen::prelude::*;

pub mod browser;
pub mod compressor;
pub mod data_url;
pub mod error;
pub mod settings;
pub mod status;
pub mod upload;

pub use browser::BrowserDownload;
pub use compressor::{compress, scaled_dimensions, OutputBlob, OutputFormat};
pub use data_url::DataUrl;
pub use error::{CompressError, SettingsError, UploadError};
pub use settings::{ResizeFilter, Settings};
pub use status::Status;
pub use upload::{
    decode_image, handle_upload, process_file, BatchReport, Delivery, DirectorySink,
    DownloadSink, FileOutcome, FileSource, InputFile,
};

/// Decodes `input` and compresses it, choosing the output format from `media_type`.
pub fn compress_bytes(input: &[u8], media_type: &str, settings: &Settings) -> Result<OutputBlob> {
    let image = decode_image(input).context("Failed to load image")?;
    let blob = compress(&image, settings, media_type).context("Failed to compress image")?;
    Ok(blob)
}

fn settings_from_js(quality: f64, max_dim: i32) -> Result<Settings, JsError> {
    Settings::new(quality as f32, i64::from(max_dim)).map_err(|e| JsError::new(&e.to_string()))
}

fn report_in_console(name: &str, result: &Result<Delivery, UploadError>) -> String {
    match result {
        Ok(_) => Status::Success.to_string(),
        Err(e) => {
            web_sys::console::error_1(&format!("{}: {}", name, e).into());
            e.status().to_string()
        }
    }
}

/// Returns the encoded bytes; the media type is given by [`output_media_type`].
#[wasm_bindgen]
pub fn compress_image(
    input: &[u8],
    media_type: &str,
    quality: f64,
    max_dim: i32,
) -> Result<Vec<u8>, JsError> {
    let settings = settings_from_js(quality, max_dim)?;
    compress_bytes(input, media_type, &settings)
        .map(OutputBlob::into_bytes)
        .map_err(|e| JsError::new(&format!("{:#}", e)))
}

#[wasm_bindgen]
pub fn output_media_type(media_type: &str) -> String {
    OutputFormat::for_media_type(media_type)
        .media_type()
        .to_string()
}

/// Runs the full pipeline for one picked file and triggers the download.
/// Returns the status text to show.
#[wasm_bindgen]
pub fn compress_and_download(
    input: &[u8],
    media_type: &str,
    file_name: &str,
    quality: f64,
    max_dim: i32,
) -> Result<String, JsError> {
    let settings = settings_from_js(quality, max_dim)?;
    let file = InputFile::from_bytes(file_name, media_type, input.to_vec());
    let result = process_file(file, &settings, &BrowserDownload);
    Ok(report_in_console(file_name, &result))
}

/// Same as [`compress_and_download`] for the `data:` URL a file reader produced.
#[wasm_bindgen]
pub fn compress_data_url_and_download(
    data_url: &str,
    file_name: &str,
    quality: f64,
    max_dim: i32,
) -> Result<String, JsError> {
    let settings = settings_from_js(quality, max_dim)?;
    let file = InputFile::from_data_url(file_name, data_url);
    let result = process_file(file, &settings, &BrowserDownload);
    Ok(report_in_console(file_name, &result))
}
