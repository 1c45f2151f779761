use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Config, ConfigError};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub search: Option<SearchConfig>,
    pub matching: Option<MatchingConfig>,
    pub columns: Option<ColumnsConfig>,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    pub base_url: Option<String>,
    pub query_param: Option<String>,
    pub user_agent: Option<String>,
    pub timeout_secs: Option<u64>,
    pub throttle_ms: Option<u64>,
    pub selectors: Option<SelectorsConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectorsConfig {
    pub container: Option<String>,
    pub heading: Option<String>,
    pub anchor: Option<String>,
    /// Empty string disables snippet extraction.
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchingConfig {
    pub threshold: Option<f64>,
    pub top_n: Option<usize>,
    pub require_containment: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnsConfig {
    pub id: Option<String>,
    pub title: Option<String>,
    pub authors: Option<String>,
    pub manuscript_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    pub console: Option<bool>,
    pub spreadsheet: Option<bool>,
    pub directory: Option<String>,
    pub prefix: Option<String>,
    pub include_details: Option<bool>,
}

/// Platform config directory path: `<config_dir>/pubcheck/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pubcheck").join("config.toml"))
}

/// Name of the per-directory config file.
pub const LOCAL_CONFIG_FILE: &str = ".pubcheck.toml";

/// Load config by cascading CWD `.pubcheck.toml` over the platform config.
/// CWD values override platform values. Missing files are skipped; a file
/// that exists but does not parse is an error.
pub fn load_config() -> Result<ConfigFile, ConfigError> {
    let platform = match config_path() {
        Some(p) => load_from_path(&p)?,
        None => None,
    };
    let cwd = load_from_path(Path::new(LOCAL_CONFIG_FILE))?;

    Ok(match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    })
}

/// Load a config from a specific path. Returns `Ok(None)` if the file doesn't exist.
pub fn load_from_path(path: &Path) -> Result<Option<ConfigFile>, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let parsed = toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(Some(parsed))
}

/// Load a config file the user named explicitly; a missing file is an error.
pub fn load_required(path: &Path) -> Result<ConfigFile, ConfigError> {
    load_from_path(path)?.ok_or_else(|| ConfigError::Read {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
    })
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        search: merge_section(base.search, overlay.search, |b, o| SearchConfig {
            base_url: o.base_url.or(b.base_url),
            query_param: o.query_param.or(b.query_param),
            user_agent: o.user_agent.or(b.user_agent),
            timeout_secs: o.timeout_secs.or(b.timeout_secs),
            throttle_ms: o.throttle_ms.or(b.throttle_ms),
            selectors: merge_section(b.selectors, o.selectors, |b, o| SelectorsConfig {
                container: o.container.or(b.container),
                heading: o.heading.or(b.heading),
                anchor: o.anchor.or(b.anchor),
                snippet: o.snippet.or(b.snippet),
            }),
        }),
        matching: merge_section(base.matching, overlay.matching, |b, o| MatchingConfig {
            threshold: o.threshold.or(b.threshold),
            top_n: o.top_n.or(b.top_n),
            require_containment: o.require_containment.or(b.require_containment),
        }),
        columns: merge_section(base.columns, overlay.columns, |b, o| ColumnsConfig {
            id: o.id.or(b.id),
            title: o.title.or(b.title),
            authors: o.authors.or(b.authors),
            manuscript_type: o.manuscript_type.or(b.manuscript_type),
        }),
        output: merge_section(base.output, overlay.output, |b, o| OutputConfig {
            console: o.console.or(b.console),
            spreadsheet: o.spreadsheet.or(b.spreadsheet),
            directory: o.directory.or(b.directory),
            prefix: o.prefix.or(b.prefix),
            include_details: o.include_details.or(b.include_details),
        }),
    }
}

fn merge_section<T>(base: Option<T>, overlay: Option<T>, f: impl FnOnce(T, T) -> T) -> Option<T> {
    match (base, overlay) {
        (Some(b), Some(o)) => Some(f(b, o)),
        (b, o) => o.or(b),
    }
}

impl ConfigFile {
    /// Overwrite the fields of `config` that this file sets.
    pub fn apply(&self, config: &mut Config) {
        if let Some(search) = &self.search {
            set(&mut config.search.base_url, &search.base_url);
            set(&mut config.search.query_param, &search.query_param);
            set(&mut config.search.user_agent, &search.user_agent);
            if let Some(secs) = search.timeout_secs {
                config.search.timeout = Duration::from_secs(secs);
            }
            if let Some(ms) = search.throttle_ms {
                config.throttle = Duration::from_millis(ms);
            }
            if let Some(sel) = &search.selectors {
                let target = &mut config.search.selectors;
                set(&mut target.container, &sel.container);
                set(&mut target.heading, &sel.heading);
                set(&mut target.anchor, &sel.anchor);
                if let Some(snippet) = &sel.snippet {
                    target.snippet = (!snippet.trim().is_empty()).then(|| snippet.clone());
                }
            }
        }

        if let Some(matching) = &self.matching {
            set(&mut config.matching.threshold, &matching.threshold);
            if matching.top_n.is_some() {
                config.matching.top_n = matching.top_n;
            }
            set(
                &mut config.matching.require_containment,
                &matching.require_containment,
            );
        }

        if let Some(columns) = &self.columns {
            set(&mut config.columns.id, &columns.id);
            set(&mut config.columns.title, &columns.title);
            set(&mut config.columns.authors, &columns.authors);
            set(&mut config.columns.manuscript_type, &columns.manuscript_type);
        }

        if let Some(output) = &self.output {
            set(&mut config.output.console, &output.console);
            set(&mut config.output.spreadsheet, &output.spreadsheet);
            if let Some(dir) = &output.directory {
                config.output.directory = PathBuf::from(dir);
            }
            set(&mut config.output.prefix, &output.prefix);
            set(&mut config.output.include_details, &output.include_details);
        }
    }
}

fn set<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(v) = value {
        *target = v.clone();
    }
}
