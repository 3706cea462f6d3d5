use anyhow::{Context, Result};
use glimpse::{Dims, Options, ToolConfig};
use serde::Deserialize;
use std::path::Path;

/// Contents of the `--config` file. Every field is optional.
///
/// ```json
/// {
///   "tools": { "ffmpeg": "/opt/ffmpeg/bin/ffmpeg" },
///   "options": { "thumb_dims": { "width": 256, "height": 256 }, "jpeg_quality": 85 }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub tools: ToolConfig,
    pub options: Options,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        serde_json::from_slice(&raw)
            .with_context(|| format!("Invalid config: {}", path.display()))
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub thumb_width: Option<u32>,
    pub thumb_height: Option<u32>,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub quality: Option<u8>,
    pub accept: Vec<String>,
}

impl Overrides {
    pub fn apply(&self, mut options: Options) -> Options {
        options.thumb_dims = Dims::new(
            self.thumb_width.unwrap_or(options.thumb_dims.width),
            self.thumb_height.unwrap_or(options.thumb_dims.height),
        );
        options.max_source_dims = Dims::new(
            self.max_width.unwrap_or(options.max_source_dims.width),
            self.max_height.unwrap_or(options.max_source_dims.height),
        );
        if let Some(quality) = self.quality {
            options.jpeg_quality = quality;
        }
        if !self.accept.is_empty() {
            options = options.accept(self.accept.iter().cloned());
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_partial_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"tools": {{"unrar": "/usr/local/bin/unrar"}}, "options": {{"jpeg_quality": 90}}}}"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.tools.unrar, "/usr/local/bin/unrar");
        assert_eq!(config.tools.ffmpeg, ToolConfig::default().ffmpeg);
        assert_eq!(config.options.jpeg_quality, 90);
        assert_eq!(config.options.thumb_dims, Dims::default());
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"tool": {{}}}}"#).unwrap();
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_overrides_win() {
        let base = Options {
            thumb_dims: Dims::new(200, 200),
            jpeg_quality: 60,
            ..Options::default()
        };
        let overrides = Overrides {
            thumb_height: Some(100),
            max_width: Some(4000),
            accept: vec!["image/png".into()],
            ..Overrides::default()
        };

        let options = overrides.apply(base);
        assert_eq!(options.thumb_dims, Dims::new(200, 100));
        assert_eq!(options.max_source_dims, Dims::new(4000, 0));
        assert_eq!(options.jpeg_quality, 60);
        assert!(options.accepted_mime_types.unwrap().contains("image/png"));
    }
}
