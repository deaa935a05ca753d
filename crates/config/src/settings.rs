// Application settings
// Loaded from ~/.config/listmerge/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Overrides the settings file location when set.
pub const CONFIG_ENV: &str = "LISTMERGE_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Pipeline
    /// Sources read at once. 0 = available parallelism.
    #[serde(rename = "pipeline.workers")]
    pub workers: usize,

    /// Per-source deadline in seconds. 0 = no deadline.
    #[serde(rename = "pipeline.sourceTimeoutSecs")]
    pub source_timeout_secs: u64,

    #[serde(rename = "pipeline.channelCapacity")]
    pub channel_capacity: usize,

    // Output
    #[serde(rename = "output.logFileName")]
    pub log_file_name: String,

    // Input
    /// Forced field delimiter for delimited text, None = sniff
    #[serde(rename = "input.delimiter")]
    pub delimiter: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workers: 0,
            source_timeout_secs: 300,
            channel_capacity: 1,
            log_file_name: "process_log.txt".to_string(),
            delimiter: None,
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("listmerge");
        config_dir.join("settings.json")
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        let path = Self::config_path();

        if !path.exists() {
            let settings = Self::default();
            settings.create_default_file(&path);
            return settings;
        }

        Self::load_from(&path)
    }

    /// Load from an explicit path. Missing or malformed files yield defaults.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    tracing::warn!("Error parsing {}: {}; using default settings", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Error reading {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse settings JSON, tolerating `//` comment lines.
    pub fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");
        serde_json::from_str(&cleaned)
    }

    /// Create default settings file with comments
    fn create_default_file(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                tracing::warn!("Error creating config directory: {}", e);
                return;
            }
        }

        let default_config = r#"{
    // Sources read concurrently (0 = one per CPU)
    "pipeline.workers": 0,
    // Give up on a single source after this many seconds (0 = never)
    "pipeline.sourceTimeoutSecs": 300,
    "pipeline.channelCapacity": 1,

    // Written next to the output file, truncated on every run
    "output.logFileName": "process_log.txt",

    // Force a field delimiter such as ";" or "\t" (null = detect)
    "input.delimiter": null
}
"#;

        if let Err(e) = fs::write(path, default_config) {
            tracing::warn!("Error writing default settings.json: {}", e);
        }
    }

    /// Get the config file path for display/opening
    pub fn config_path_display() -> String {
        Self::config_path().to_string_lossy().to_string()
    }

    pub fn source_timeout(&self) -> Option<Duration> {
        (self.source_timeout_secs > 0).then(|| Duration::from_secs(self.source_timeout_secs))
    }

    /// Configured delimiter as a byte. Only single-byte delimiters are usable;
    /// `\t` and `tab` both mean a tab.
    pub fn delimiter_byte(&self) -> Option<u8> {
        parse_delimiter(self.delimiter.as_deref()?)
    }
}

/// Parse a user-supplied delimiter: one ASCII character, `\t` or `tab`.
pub fn parse_delimiter(raw: &str) -> Option<u8> {
    match raw {
        "\\t" | "tab" => Some(b'\t'),
        s if s.len() == 1 && s.is_ascii() => s.bytes().next(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(s.workers, 0);
        assert_eq!(s.source_timeout(), Some(Duration::from_secs(300)));
        assert_eq!(s.channel_capacity, 1);
        assert_eq!(s.log_file_name, "process_log.txt");
        assert_eq!(s.delimiter_byte(), None);
    }

    #[test]
    fn parse_with_comments_and_partial_keys() {
        let json = r#"{
    // only override a couple
    "pipeline.workers": 3,
    "input.delimiter": ";"
}"#;
        let s = Settings::parse(json).unwrap();
        assert_eq!(s.workers, 3);
        assert_eq!(s.delimiter_byte(), Some(b';'));
        assert_eq!(s.source_timeout_secs, 300);
    }

    #[test]
    fn zero_timeout_disables_deadline() {
        let s = Settings {
            source_timeout_secs: 0,
            ..Settings::default()
        };
        assert_eq!(s.source_timeout(), None);
    }

    #[test]
    fn delimiter_parsing() {
        assert_eq!(parse_delimiter(","), Some(b','));
        assert_eq!(parse_delimiter("\t"), Some(b'\t'));
        assert_eq!(parse_delimiter("\\t"), Some(b'\t'));
        assert_eq!(parse_delimiter("tab"), Some(b'\t'));
        assert_eq!(parse_delimiter(";;"), None);
        assert_eq!(parse_delimiter("§"), None);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
    }

    #[test]
    fn default_file_loads_as_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        Settings::default().create_default_file(&path);

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("// Sources read concurrently"));
        assert_eq!(Settings::load_from(&path), Settings::default());
    }
}
