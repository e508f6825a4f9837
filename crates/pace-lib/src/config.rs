//! The engine-facing configuration model.
//!
//! The curly-brace DSL and its resolver live outside the engine; what the
//! engine consumes is this already-validated value object. `Config::load`
//! reads the resolved JSON projection of a config file, which is also what
//! the tests construct directly.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read config {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Positional argument schema for a task.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArgsSpec {
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub optional: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    #[serde(skip)]
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub before: Vec<String>,
    #[serde(default)]
    pub after: Vec<String>,
    #[serde(default)]
    pub on_success: Vec<String>,
    #[serde(default)]
    pub on_failure: Vec<String>,
    #[serde(default)]
    pub cache: bool,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub continue_on_error: bool,
    #[serde(default)]
    pub silent: bool,
    #[serde(default, deserialize_with = "duration::option")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub retry: u32,
    #[serde(default, deserialize_with = "duration::option")]
    pub retry_delay: Option<Duration>,
    #[serde(default)]
    pub args: Option<ArgsSpec>,
}

/// A lifecycle command: no dependencies, no caching.
#[derive(Debug, Clone, Deserialize)]
pub struct Hook {
    #[serde(skip)]
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tasks: BTreeMap<String, Task>,
    #[serde(default)]
    pub hooks: BTreeMap<String, Hook>,
    #[serde(default)]
    pub globals: BTreeMap<String, String>,
    #[serde(default)]
    pub default_task: Option<String>,
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let data = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Config =
            serde_json::from_str(&data).map_err(|source| Error::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.link_names();
        Ok(config)
    }

    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        let mut config: Config = serde_json::from_str(data)?;
        config.link_names();
        Ok(config)
    }

    // Names live as map keys in the serialized form; copy them into the
    // values so a Task can travel on its own.
    fn link_names(&mut self) {
        for (name, task) in &mut self.tasks {
            task.name = name.clone();
        }
        for (name, hook) in &mut self.hooks {
            hook.name = name.clone();
        }
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn hook(&self, name: &str) -> Option<&Hook> {
        self.hooks.get(name)
    }

    /// Canonical name for a requested task: an empty name selects the
    /// default task, then aliases are followed one step.
    pub fn resolve_name<'a>(&'a self, name: &'a str) -> &'a str {
        let name = match (name.is_empty(), &self.default_task) {
            (true, Some(default)) => default.as_str(),
            _ => name,
        };
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn resolve_task(&self, name: &str) -> Option<&Task> {
        self.task(self.resolve_name(name))
    }
}

mod duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn option<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample() -> Config {
        Config::from_json(
            r#"{
                "tasks": {
                    "build": {
                        "command": "cargo build",
                        "inputs": ["src/**/*.rs"],
                        "outputs": ["target/debug/app"],
                        "cache": true,
                        "timeout": "30s",
                        "retry": 2,
                        "retry_delay": "500ms"
                    },
                    "test": {
                        "command": "cargo test",
                        "dependencies": ["build"]
                    }
                },
                "hooks": {
                    "notify": { "command": "echo done" }
                },
                "default_task": "build",
                "aliases": { "b": "build" },
                "globals": { "SHELL": "bash" }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_names_are_linked() {
        let config = sample();
        assert_eq!(config.task("build").unwrap().name, "build");
        assert_eq!(config.hook("notify").unwrap().name, "notify");
    }

    #[test]
    fn test_durations_parse_from_humantime_strings() {
        let build = sample().task("build").cloned().unwrap();
        assert_eq!(build.timeout, Some(Duration::from_secs(30)));
        assert_eq!(build.retry_delay, Some(Duration::from_millis(500)));
        assert_eq!(build.retry, 2);
    }

    #[test]
    fn test_booleans_default_off() {
        let test = sample().task("test").cloned().unwrap();
        assert!(!test.cache);
        assert!(!test.parallel);
        assert!(!test.silent);
        assert!(!test.continue_on_error);
    }

    #[test]
    fn test_resolve_follows_default_and_aliases() {
        let config = sample();
        assert_eq!(config.resolve_name(""), "build");
        assert_eq!(config.resolve_name("b"), "build");
        assert_eq!(config.resolve_name("test"), "test");
        assert_eq!(config.resolve_name("unknown"), "unknown");
        assert!(config.resolve_task("b").is_some());
        assert!(config.resolve_task("unknown").is_none());
    }

    #[test]
    fn test_bad_duration_is_a_parse_error() {
        let result = Config::from_json(
            r#"{ "tasks": { "t": { "command": "true", "timeout": "soon" } } }"#,
        );
        assert!(result.is_err());
    }
}
