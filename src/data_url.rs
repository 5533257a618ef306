//! `data:` URLs, the textual form a browser file reader hands back.

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DATA_URL: Regex =
        Regex::new(r"(?s)^data:([^;,]*)((?:;[^;,]*)*?)(;base64)?,(.*)$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    media_type: String,
    data: Vec<u8>,
}

impl DataUrl {
    pub fn new(media_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            media_type: media_type.into(),
            data,
        }
    }

    /// Parses `data:[<media type>][;params][;base64],<payload>`.
    ///
    /// A missing media type defaults to `text/plain`. Payloads without the `;base64`
    /// marker are taken verbatim.
    pub fn parse(url: &str) -> Result<Self> {
        let caps = DATA_URL
            .captures(url.trim())
            .ok_or_else(|| anyhow!("not a data URL"))?;

        let media_type = header_type(&caps[1]);
        let payload = &caps[4];
        let data = if caps.get(3).is_some() {
            let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
            STANDARD
                .decode(compact)
                .context("invalid base64 payload")?
        } else {
            payload.as_bytes().to_vec()
        };

        Ok(Self { media_type, data })
    }

    /// Media type declared in the URL header, without decoding the payload.
    pub fn declared_type(url: &str) -> Option<String> {
        DATA_URL.captures(url.trim()).map(|caps| header_type(&caps[1]))
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn to_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, STANDARD.encode(&self.data))
    }
}

fn header_type(raw: &str) -> String {
    match raw.trim() {
        "" => "text/plain".to_string(),
        t => t.to_ascii_lowercase(),
    }
}
