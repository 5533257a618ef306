use anyhow::{anyhow, Context, Result};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Blob, BlobPropertyBag, HtmlAnchorElement, Url};

use crate::compressor::OutputBlob;
use crate::upload::{Delivery, DownloadSink};

fn js_err(e: JsValue) -> anyhow::Error {
    anyhow!("{:?}", e)
}

/// Starts a browser download through a temporary object URL.
///
/// The URL is revoked as soon as the click has been dispatched.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserDownload;

impl DownloadSink for BrowserDownload {
    fn deliver(&self, file_name: &str, blob: &OutputBlob) -> Result<Delivery> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| anyhow!("no document available"))?;

        let parts = js_sys::Array::new();
        parts.push(&js_sys::Uint8Array::from(blob.bytes()));
        let options = BlobPropertyBag::new();
        options.set_type(blob.media_type());
        let js_blob = Blob::new_with_u8_array_sequence_and_options(&parts, &options)
            .map_err(js_err)
            .context("creating blob")?;

        let url = Url::create_object_url_with_blob(&js_blob)
            .map_err(js_err)
            .context("creating object URL")?;

        let clicked = document
            .create_element("a")
            .map_err(js_err)
            .and_then(|el| {
                el.dyn_into::<HtmlAnchorElement>()
                    .map_err(|_| anyhow!("created element is not an anchor"))
            })
            .map(|anchor| {
                anchor.set_href(&url);
                anchor.set_download(file_name);
                anchor.click();
            });

        // Released whether or not the click went through.
        Url::revoke_object_url(&url).map_err(js_err)?;
        clicked?;

        Ok(Delivery {
            file_name: file_name.to_string(),
            location: None,
            size: blob.len(),
        })
    }
}
