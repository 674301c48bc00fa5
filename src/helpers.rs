//! Input transformations applied before a capture starts
//!
//! - Reader URL rewriting (single-page read mode plus image quality)
//! - Output filename normalization
//! - Validation of the raw answers collected from the user
//!
//! # Examples
//!
//! ```
//! use comic_capture::helpers::{normalize_filename, transform_url, Quality};
//!
//! let url = transform_url("https://example.com/Comic/Issue-1?id=7", Quality::High).unwrap();
//! assert_eq!(url, "https://example.com/Comic/Issue-1?id=7&readType=1&quality=hq");
//!
//! assert_eq!(normalize_filename("issue-1"), "issue-1.pdf");
//! ```

use std::fmt;
use std::str::FromStr;
use url::Url;

pub const PDF_EXTENSION: &str = ".pdf";

/// Image quality requested from the reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Low,
    High,
}

impl Quality {
    /// Value of the `quality` query parameter
    pub fn as_param(self) -> &'static str {
        match self {
            Quality::Low => "lq",
            Quality::High => "hq",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Quality::Low => "Low",
            Quality::High => "High",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param())
    }
}

impl FromStr for Quality {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lq" | "low" | "1" => Ok(Quality::Low),
            "hq" | "high" | "2" => Ok(Quality::High),
            other => Err(InputError::InvalidQuality(other.to_string())),
        }
    }
}

/// Problems with user supplied input
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InputError {
    #[error("Please, enter a valid url")]
    InvalidUrl(String),

    #[error("Please, enter a valid name")]
    EmptyFilename,

    #[error("Please, pick Low or High quality (got {0:?})")]
    InvalidQuality(String),

    #[error("Input closed before all answers were given")]
    Closed,

    #[error("Cannot read input: {0}")]
    Io(String),
}

pub fn validate_url(raw: &str) -> Result<Url, InputError> {
    Url::parse(raw.trim()).map_err(|_| InputError::InvalidUrl(raw.to_string()))
}

pub fn validate_filename(raw: &str) -> Result<String, InputError> {
    if raw.is_empty() {
        return Err(InputError::EmptyFilename);
    }
    Ok(raw.to_string())
}

/// Switch the reader to all-pages mode and request the chosen quality.
///
/// `readType` and `quality` are overwritten where they already appear and
/// appended otherwise; repeats of either are dropped. Other parameters are
/// left untouched.
pub fn transform_url(raw: &str, quality: Quality) -> Result<String, InputError> {
    let mut url = validate_url(raw)?;
    let overrides = [("readType", "1"), ("quality", quality.as_param())];

    let mut seen = [false; 2];
    let mut pairs: Vec<(String, String)> = Vec::new();
    for (key, value) in url.query_pairs() {
        match overrides.iter().position(|(name, _)| key == *name) {
            Some(i) if seen[i] => {}
            Some(i) => {
                seen[i] = true;
                pairs.push((key.into_owned(), overrides[i].1.to_string()));
            }
            None => pairs.push((key.into_owned(), value.into_owned())),
        }
    }
    for (i, (name, value)) in overrides.iter().enumerate() {
        if !seen[i] {
            pairs.push((name.to_string(), value.to_string()));
        }
    }

    url.query_pairs_mut().clear().extend_pairs(pairs);
    Ok(url.to_string())
}

/// Append `.pdf` unless the name already ends with it
pub fn normalize_filename(name: &str) -> String {
    if name.ends_with(PDF_EXTENSION) {
        name.to_string()
    } else {
        format!("{}{}", name, PDF_EXTENSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_url_adds_params() {
        let url = transform_url("https://example.com/Comic/Issue-1", Quality::Low).unwrap();
        assert_eq!(url, "https://example.com/Comic/Issue-1?readType=1&quality=lq");
    }

    #[test]
    fn test_transform_url_replaces_existing_params() {
        let url = transform_url(
            "https://example.com/Comic/Issue-1?quality=lq&id=3&readType=0",
            Quality::High,
        )
        .unwrap();
        assert_eq!(url, "https://example.com/Comic/Issue-1?quality=hq&id=3&readType=1");
    }

    #[test]
    fn test_transform_url_keeps_positions_and_drops_repeats() {
        let url = transform_url(
            "https://example.com/Comic/Issue-1?readType=0&id=3&readType=2",
            Quality::Low,
        )
        .unwrap();
        assert_eq!(url, "https://example.com/Comic/Issue-1?readType=1&id=3&quality=lq");
    }

    #[test]
    fn test_transform_url_rejects_garbage() {
        assert!(matches!(
            transform_url("not a url", Quality::Low),
            Err(InputError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_normalize_filename() {
        assert_eq!(normalize_filename("issue"), "issue.pdf");
        assert_eq!(normalize_filename("issue.pdf"), "issue.pdf");
        assert_eq!(normalize_filename("issue.PDF"), "issue.PDF.pdf");
    }

    #[test]
    fn test_validate_filename() {
        assert_eq!(validate_filename(""), Err(InputError::EmptyFilename));
        assert_eq!(validate_filename("a").unwrap(), "a");
    }

    #[test]
    fn test_quality_parse() {
        assert_eq!("hq".parse::<Quality>().unwrap(), Quality::High);
        assert_eq!("Low".parse::<Quality>().unwrap(), Quality::Low);
        assert_eq!("2".parse::<Quality>().unwrap(), Quality::High);
        assert!("best".parse::<Quality>().is_err());
    }
}
