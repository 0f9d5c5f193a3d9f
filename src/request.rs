use std::collections::BTreeSet;
use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use url::Url;

use crate::coordinate::{ArtifactLocation, parse_repository, resolve};
use crate::domain::{ArchiveFormat, Classifier, validate_group, validate_segment};
use crate::error::FetchError;
use crate::orchestrator::FetchReport;

pub const DEFAULT_REPOSITORY: &str = "https://repo.maven.apache.org/maven2/";
pub const DEFAULT_GROUP: &str = "org.openjfx";
pub const DEFAULT_PROJECT: &str = "javafx";

pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Runs once after every artifact of a request has settled.
pub type FinalizeCallback = Box<dyn FnOnce(&FetchReport) -> Result<(), CallbackError> + Send>;

/// A validated, immutable fetch request. Built with [`FetchRequestBuilder`].
pub struct FetchRequest {
    pub(crate) repository: Url,
    pub(crate) group: String,
    pub(crate) project: String,
    pub(crate) version: String,
    pub(crate) modules: BTreeSet<String>,
    pub(crate) classifiers: BTreeSet<Classifier>,
    pub(crate) format: ArchiveFormat,
    pub(crate) output: Utf8PathBuf,
    pub(crate) callback: Option<FinalizeCallback>,
}

impl FetchRequest {
    pub fn builder(version: impl Into<String>) -> FetchRequestBuilder {
        FetchRequestBuilder::new(version)
    }

    pub fn repository(&self) -> &Url {
        &self.repository
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(String::as_str)
    }

    pub fn classifiers(&self) -> impl Iterator<Item = &Classifier> {
        self.classifiers.iter()
    }

    pub fn format(&self) -> ArchiveFormat {
        self.format
    }

    pub fn output(&self) -> &Utf8Path {
        &self.output
    }

    /// Every distinct (module, classifier) pair, ordered by module then
    /// classifier token.
    pub fn pairs(&self) -> Vec<(&str, &Classifier)> {
        self.modules
            .iter()
            .flat_map(|module| {
                self.classifiers
                    .iter()
                    .map(move |classifier| (module.as_str(), classifier))
            })
            .collect()
    }

    pub fn locate(&self, module: &str, classifier: &Classifier) -> Result<ArtifactLocation, FetchError> {
        resolve(
            &self.repository,
            &self.group,
            &self.project,
            &self.version,
            module,
            classifier,
            self.format,
        )
    }
}

impl fmt::Debug for FetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchRequest")
            .field("repository", &self.repository.as_str())
            .field("group", &self.group)
            .field("project", &self.project)
            .field("version", &self.version)
            .field("modules", &self.modules)
            .field("classifiers", &self.classifiers)
            .field("format", &self.format)
            .field("output", &self.output)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Collects request options. `build` consumes the builder, so a builder
/// can only ever produce one request.
pub struct FetchRequestBuilder {
    repository: String,
    group: String,
    project: String,
    version: String,
    modules: Vec<String>,
    classifiers: Vec<Classifier>,
    detect: bool,
    format: ArchiveFormat,
    output: Option<Utf8PathBuf>,
    callback: Option<FinalizeCallback>,
}

impl FetchRequestBuilder {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            repository: DEFAULT_REPOSITORY.to_string(),
            group: DEFAULT_GROUP.to_string(),
            project: DEFAULT_PROJECT.to_string(),
            version: version.into(),
            modules: Vec::new(),
            classifiers: Vec::new(),
            detect: true,
            format: ArchiveFormat::default(),
            output: None,
            callback: None,
        }
    }

    pub fn repository(mut self, location: impl Into<String>) -> Self {
        self.repository = location.into();
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    pub fn module(mut self, name: impl Into<String>) -> Self {
        self.modules.push(name.into());
        self
    }

    pub fn modules<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modules.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn classifier(mut self, classifier: Classifier) -> Self {
        self.classifiers.push(classifier);
        self
    }

    pub fn classifiers<I>(mut self, classifiers: I) -> Self
    where
        I: IntoIterator<Item = Classifier>,
    {
        self.classifiers.extend(classifiers);
        self
    }

    /// Drops the host platform that is requested by default.
    pub fn dont_detect(mut self) -> Self {
        self.detect = false;
        self
    }

    pub fn format(mut self, format: ArchiveFormat) -> Self {
        self.format = format;
        self
    }

    pub fn output(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.output = Some(dir.into());
        self
    }

    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&FetchReport) -> Result<(), CallbackError> + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    pub fn build(self) -> Result<FetchRequest, FetchError> {
        let repository = parse_repository(&self.repository)?;
        let version = self.version.trim().to_string();
        if version.is_empty() {
            return Err(FetchError::MissingVersion);
        }
        validate_group(&self.group)?;
        validate_segment("project", &self.project)?;
        validate_segment("version", &version)?;

        let mut modules = BTreeSet::new();
        for module in self.modules {
            let module = module.trim().to_string();
            if !module.is_empty() {
                validate_segment("module", &module)?;
            }
            modules.insert(module);
        }

        let mut classifiers: BTreeSet<Classifier> = BTreeSet::new();
        if self.detect {
            classifiers.insert(Classifier::Detect);
        }
        for classifier in self.classifiers {
            validate_segment("classifier", &classifier.token())
                .map_err(|_| FetchError::InvalidClassifier(classifier.to_string()))?;
            classifiers.insert(classifier);
        }

        let output = match self.output {
            Some(output) => output,
            None => default_output_dir()?,
        };

        Ok(FetchRequest {
            repository,
            group: self.group,
            project: self.project,
            version,
            modules,
            classifiers,
            format: self.format,
            output,
            callback: self.callback,
        })
    }
}

/// `<user cache dir>/platfetch`, or the system temp dir when the platform
/// has no cache dir.
pub fn default_output_dir() -> Result<Utf8PathBuf, FetchError> {
    let base = BaseDirs::new()
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(std::env::temp_dir);
    Utf8PathBuf::from_path_buf(base.join("platfetch"))
        .map_err(|_| FetchError::Filesystem("non-utf8 cache directory".to_string()))
}
