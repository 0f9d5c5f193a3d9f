use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::{ArchiveFormat, Classifier};
use crate::error::FetchError;
use crate::request::FetchRequestBuilder;

pub const DEFAULT_CONFIG_FILE: &str = "platfetch.json";

/// On-disk request description. Every field is optional so a file can be
/// layered under command-line flags.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub modules: Vec<String>,
    #[serde(default)]
    pub classifiers: Vec<Classifier>,
    /// Also fetch the host platform. Defaults to true.
    #[serde(default)]
    pub detect: Option<bool>,
    #[serde(default)]
    pub format: Option<ArchiveFormat>,
    #[serde(default)]
    pub output: Option<Utf8PathBuf>,
}

impl Config {
    /// Values from `overrides` win; module and classifier lists are merged.
    pub fn merge(self, overrides: Config) -> Config {
        let mut modules = self.modules;
        modules.extend(overrides.modules);
        let mut classifiers = self.classifiers;
        classifiers.extend(overrides.classifiers);
        Config {
            repository: overrides.repository.or(self.repository),
            group: overrides.group.or(self.group),
            project: overrides.project.or(self.project),
            version: overrides.version.or(self.version),
            modules,
            classifiers,
            detect: overrides.detect.or(self.detect),
            format: overrides.format.or(self.format),
            output: overrides.output.or(self.output),
        }
    }

    pub fn into_builder(self) -> Result<FetchRequestBuilder, FetchError> {
        let version = self.version.ok_or(FetchError::MissingVersion)?;
        let mut builder = FetchRequestBuilder::new(version)
            .modules(self.modules)
            .classifiers(self.classifiers);
        if let Some(repository) = self.repository {
            builder = builder.repository(repository);
        }
        if let Some(group) = self.group {
            builder = builder.group(group);
        }
        if let Some(project) = self.project {
            builder = builder.project(project);
        }
        if let Some(format) = self.format {
            builder = builder.format(format);
        }
        if let Some(output) = self.output {
            builder = builder.output(output);
        }
        if self.detect == Some(false) {
            builder = builder.dont_detect();
        }
        Ok(builder)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `platfetch.json` from the working directory.
    ///
    /// With no explicit path a missing default file yields an empty config,
    /// so flags alone can describe a request.
    pub fn resolve(path: Option<&str>) -> Result<Config, FetchError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| FetchError::ConfigRead(config_path.clone()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Config, FetchError> {
        serde_json::from_str(content).map_err(|err| FetchError::ConfigParse(err.to_string()))
    }
}
