//! Command-line and environment configuration

use crate::upload::{CloudinaryAccount, DEFAULT_API_BASE};
use crate::{Error, RenderConfig, Result, Viewport};
use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Render templated slides to PNG and publish them to Cloudinary
#[derive(Parser, Debug, Clone)]
#[command(name = "slideshot", version, about)]
pub struct Cli {
    /// Address to bind the HTTP server to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Directory holding the `carousel/` and `quote/` templates
    #[arg(long, env = "TEMPLATES_DIR", default_value = "templates")]
    pub templates_dir: PathBuf,

    /// Chrome/Chromium executable (auto-detected when unset)
    #[arg(long, env = "CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,

    /// Network-idle budget per slide, in milliseconds
    #[arg(long, env = "RENDER_TIMEOUT_MS", default_value_t = 30000)]
    pub render_timeout_ms: u64,

    /// How long to wait for web fonts, in milliseconds
    #[arg(long, env = "FONT_WAIT_MS", default_value_t = 5000)]
    pub font_wait_ms: u64,

    /// Cloud name used when a request does not name one
    #[arg(long, env = "CLOUDINARY_CLOUD_NAME", default_value = "dpptdb3sr")]
    pub cloudinary_cloud_name: String,

    /// Unsigned upload preset used when a request does not name one
    #[arg(long, env = "CLOUDINARY_UPLOAD_PRESET", default_value = "eevdbifs")]
    pub cloudinary_preset: String,

    /// Base URL of the Cloudinary upload API
    #[arg(long, env = "CLOUDINARY_API_BASE", default_value = DEFAULT_API_BASE)]
    pub cloudinary_api_base: String,

    /// Largest accepted request body, in bytes
    #[arg(long, env = "MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    /// Launch Chrome at startup instead of on the first request
    #[arg(long, env = "EAGER_BROWSER")]
    pub eager_browser: bool,
}

impl Cli {
    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.render_timeout_ms == 0 {
            return Err(Error::ConfigError("render timeout must be greater than zero".into()));
        }
        if self.max_body_bytes == 0 {
            return Err(Error::ConfigError("max body size must be greater than zero".into()));
        }
        if !self.templates_dir.is_dir() {
            return Err(Error::ConfigError(format!(
                "templates directory {} does not exist",
                self.templates_dir.display()
            )));
        }
        if let Some(path) = &self.chrome_path {
            if !path.exists() {
                return Err(Error::ConfigError(format!("Chrome executable {} not found", path.display())));
            }
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn render_config(&self) -> RenderConfig {
        RenderConfig {
            viewport: Viewport::default(),
            timeout_ms: self.render_timeout_ms,
            font_wait_ms: self.font_wait_ms,
            chrome_path: self.chrome_path.clone(),
        }
    }

    pub fn default_account(&self) -> CloudinaryAccount {
        CloudinaryAccount {
            cloud_name: self.cloudinary_cloud_name.clone(),
            upload_preset: self.cloudinary_preset.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["slideshot"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = parse(&[
            "--port",
            "8080",
            "--render-timeout-ms",
            "1000",
            "--cloudinary-preset",
            "mine",
            "--templates-dir",
            env!("CARGO_MANIFEST_DIR"),
        ]);
        assert_eq!(cli.bind_addr(), format!("{}:8080", cli.host));
        assert_eq!(cli.render_config().timeout_ms, 1000);
        assert_eq!(cli.default_account().upload_preset, "mine");
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let cli = parse(&["--render-timeout-ms", "0", "--templates-dir", env!("CARGO_MANIFEST_DIR")]);
        assert!(matches!(cli.validate(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_validate_rejects_missing_templates_dir() {
        let cli = parse(&["--templates-dir", "/nonexistent/slideshot-templates"]);
        let err = cli.validate().unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
