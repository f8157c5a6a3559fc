//! Output format of a generated visualization

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::VizgenError;

/// Kind of code the model is asked to produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Svg,
    Html,
}

impl OutputFormat {
    /// Lowercase tag, also used as the fenced code block language.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Svg => "svg",
            OutputFormat::Html => "html",
        }
    }

    /// File extension for saved output.
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    /// MIME type of the generated document.
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Svg => "image/svg+xml",
            OutputFormat::Html => "text/html",
        }
    }

    /// Multiplier applied to the request timeout. Full HTML pages take
    /// noticeably longer to generate than a single SVG.
    pub(crate) fn timeout_factor(&self) -> f64 {
        match self {
            OutputFormat::Svg => 1.0,
            OutputFormat::Html => 1.5,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = VizgenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "svg" => Ok(OutputFormat::Svg),
            "html" => Ok(OutputFormat::Html),
            other => Err(VizgenError::Configuration(format!(
                "unsupported output format '{other}' (expected svg or html)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("SVG".parse::<OutputFormat>().unwrap(), OutputFormat::Svg);
        assert_eq!(" html ".parse::<OutputFormat>().unwrap(), OutputFormat::Html);
        assert!("png".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&OutputFormat::Html).unwrap();
        assert_eq!(json, "\"html\"");
    }
}
