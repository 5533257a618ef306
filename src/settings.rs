//! Compression settings, captured once per upload and shared by every file in it.

use std::str::FromStr;

use image::imageops::FilterType;
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::SettingsError;

pub const DEFAULT_QUALITY: f32 = 0.8;
pub const DEFAULT_MAX_DIMENSION: u32 = 1920;

lazy_static! {
    // Leading float, same prefix rule as JavaScript's parseFloat.
    static ref FLOAT_PREFIX: Regex =
        Regex::new(r"^\s*([+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)").unwrap();
    // Leading decimal integer, same prefix rule as parseInt(value).
    static ref INT_PREFIX: Regex = Regex::new(r"^\s*([+-]?\d+)").unwrap();
}

/// Resampling filter used when drawing the image at its output size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeFilter {
    Nearest,
    /// Bilinear, closest to what a browser canvas does.
    Triangle,
    CatmullRom,
    Gaussian,
    #[default]
    Lanczos3,
}

impl ResizeFilter {
    pub fn as_filter_type(self) -> FilterType {
        match self {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl FromStr for ResizeFilter {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(ResizeFilter::Nearest),
            "triangle" | "bilinear" => Ok(ResizeFilter::Triangle),
            "catmull-rom" | "catmullrom" => Ok(ResizeFilter::CatmullRom),
            "gaussian" => Ok(ResizeFilter::Gaussian),
            "lanczos3" => Ok(ResizeFilter::Lanczos3),
            other => Err(SettingsError::Filter(other.to_string())),
        }
    }
}

/// Validated quality / max-dimension pair plus the resize filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    quality: f32,
    max_dimension: u32,
    filter: ResizeFilter,
}

impl Settings {
    /// Builds settings, rejecting a quality outside `[0.0, 1.0]` and a non-positive
    /// max dimension.
    pub fn new(quality: f32, max_dimension: i64) -> Result<Self, SettingsError> {
        if !quality.is_finite() || !(0.0..=1.0).contains(&quality) {
            return Err(SettingsError::Quality(quality.to_string()));
        }
        let max_dimension = u32::try_from(max_dimension)
            .ok()
            .filter(|&d| d > 0)
            .ok_or_else(|| SettingsError::MaxDimension(max_dimension.to_string()))?;

        Ok(Self {
            quality,
            max_dimension,
            filter: ResizeFilter::default(),
        })
    }

    /// Builds settings from the raw text of the quality and max-dimension controls.
    pub fn from_controls(quality: &str, max_dimension: &str) -> Result<Self, SettingsError> {
        Self::new(parse_quality(quality)?, parse_max_dimension(max_dimension)?)
    }

    pub fn with_filter(mut self, filter: ResizeFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn quality(&self) -> f32 {
        self.quality
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    pub fn filter(&self) -> ResizeFilter {
        self.filter
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            max_dimension: DEFAULT_MAX_DIMENSION,
            filter: ResizeFilter::default(),
        }
    }
}

/// Parses the leading number of a quality control's text. Trailing garbage is ignored.
pub fn parse_quality(raw: &str) -> Result<f32, SettingsError> {
    FLOAT_PREFIX
        .captures(raw)
        .and_then(|c| c[1].parse::<f32>().ok())
        .ok_or_else(|| SettingsError::Quality(raw.to_string()))
}

/// Parses the leading integer of a max-dimension control's text.
pub fn parse_max_dimension(raw: &str) -> Result<i64, SettingsError> {
    INT_PREFIX
        .captures(raw)
        .and_then(|c| c[1].parse::<i64>().ok())
        .ok_or_else(|| SettingsError::MaxDimension(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_control_values_like_the_browser() {
        assert_eq!(parse_quality("0.7").unwrap(), 0.7);
        assert_eq!(parse_quality("  .5abc").unwrap(), 0.5);
        assert_eq!(parse_quality("1e-1").unwrap(), 0.1);
        assert_eq!(parse_max_dimension("1024px").unwrap(), 1024);
        assert_eq!(parse_max_dimension("800.9").unwrap(), 800);
        assert!(parse_quality("high").is_err());
        assert!(parse_max_dimension("").is_err());
    }

    #[test]
    fn rejects_out_of_range_settings() {
        assert!(matches!(
            Settings::new(1.5, 100),
            Err(SettingsError::Quality(_))
        ));
        assert!(matches!(
            Settings::new(f32::NAN, 100),
            Err(SettingsError::Quality(_))
        ));
        assert!(matches!(
            Settings::new(0.5, 0),
            Err(SettingsError::MaxDimension(_))
        ));
        assert!(matches!(
            Settings::new(0.5, -20),
            Err(SettingsError::MaxDimension(_))
        ));
        assert!(Settings::from_controls("0.8", "abc").is_err());
    }

    #[test]
    fn accepts_boundaries() {
        let s = Settings::from_controls("0", "1").unwrap();
        assert_eq!(s.quality(), 0.0);
        assert_eq!(s.max_dimension(), 1);
        assert!(Settings::new(1.0, i64::from(u32::MAX)).is_ok());
        assert!(Settings::new(1.0, i64::from(u32::MAX) + 1).is_err());
    }

    #[test]
    fn filter_names() {
        assert_eq!("Lanczos3".parse::<ResizeFilter>().unwrap(), ResizeFilter::Lanczos3);
        assert_eq!("bilinear".parse::<ResizeFilter>().unwrap(), ResizeFilter::Triangle);
        assert!("box".parse::<ResizeFilter>().is_err());
        assert_eq!(ResizeFilter::default(), ResizeFilter::Lanczos3);
    }
}
