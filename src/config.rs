use crate::bridge::annotation::{Palette, Rgb};
use crate::error::Error;
use crate::{muted_error, sync_warn, weak_error};
use serde::Deserialize;
use std::fs::read_to_string;
use std::path::Path;

/// Highlight colors section.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ColorsConfig {
    pub breakpoint: Rgb,
    pub current_instruction: Rgb,
}

impl Default for ColorsConfig {
    fn default() -> Self {
        let palette = Palette::default();
        Self {
            breakpoint: palette.breakpoint,
            current_instruction: palette.current_instruction,
        }
    }
}

/// Bridge configuration, read once at startup.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listen host.
    pub host: String,
    pub port: u16,
    /// Page size used for base address computation.
    pub page_size: u64,
    pub verbose: bool,
    pub colors: ColorsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1337,
            page_size: 0x1000,
            verbose: false,
            colors: ColorsConfig::default(),
        }
    }
}

impl Config {
    const DEFAULT_PATH: &'static str = ".config/dbgsync/config.toml";

    /// Load config from the file at `path` or from the default location in the home directory.
    /// Fall back to defaults if file is absent or invalid.
    pub fn from_file(path: Option<&Path>) -> Self {
        let data = match path {
            None => {
                let Some(home) = home::home_dir() else {
                    return Self::default();
                };
                match muted_error!(read_to_string(home.join(Self::DEFAULT_PATH))) {
                    Some(data) => data,
                    None => return Self::default(),
                }
            }
            Some(path) => match read_to_string(path) {
                Ok(data) => data,
                Err(err) => {
                    sync_warn!(
                        target: "sync",
                        "error while load config file {}: {err}",
                        path.display()
                    );
                    return Self::default();
                }
            },
        };

        weak_error!(Self::parse(&data), "invalid config, defaults are used:").unwrap_or_default()
    }

    pub fn parse(data: &str) -> Result<Self, Error> {
        Ok(toml::from_str(data)?)
    }

    /// Listen address in `host:port` form.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn palette(&self) -> Palette {
        Palette {
            breakpoint: self.colors.breakpoint,
            current_instruction: self.colors.current_instruction,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_config() {
        struct TestCase {
            data: &'static str,
            expected: Config,
        }
        let test_cases = vec![
            TestCase {
                data: "",
                expected: Config::default(),
            },
            TestCase {
                data: r#"
                    port = 4242
                    page_size = 0x10000
                    verbose = true
                "#,
                expected: Config {
                    port: 4242,
                    page_size: 0x10000,
                    verbose: true,
                    ..Config::default()
                },
            },
            TestCase {
                data: r#"
                    host = "0.0.0.0"
                    [colors]
                    current_instruction = "0x0000ff"
                "#,
                expected: Config {
                    host: "0.0.0.0".to_string(),
                    colors: ColorsConfig {
                        breakpoint: Rgb::RED,
                        current_instruction: Rgb::from_packed(0xff),
                    },
                    ..Config::default()
                },
            },
        ];

        for tc in test_cases {
            assert_eq!(Config::parse(tc.data).unwrap(), tc.expected);
        }

        assert!(matches!(
            Config::parse("port = \"nope\""),
            Err(Error::Config(_))
        ));
        assert!(Config::parse("[colors]\nbreakpoint = \"0x1000000\"").is_err());
    }

    #[test]
    fn test_from_file_fallback() {
        let dir = std::env::temp_dir().join(format!("dbgsync-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let valid = dir.join("valid.toml");
        writeln!(std::fs::File::create(&valid).unwrap(), "port = 31337").unwrap();
        let cfg = Config::from_file(Some(&valid));
        assert_eq!(cfg.port, 31337);
        assert_eq!(cfg.listen_addr(), "127.0.0.1:31337");
        assert_eq!(cfg.palette(), Palette::default());

        let invalid = dir.join("invalid.toml");
        writeln!(std::fs::File::create(&invalid).unwrap(), "port = [").unwrap();
        assert_eq!(Config::from_file(Some(&invalid)), Config::default());

        assert_eq!(
            Config::from_file(Some(&dir.join("missing.toml"))),
            Config::default()
        );

        std::fs::remove_dir_all(dir).unwrap();
    }
}
