use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use url::Url;

use crate::domain::{ArchiveFormat, Classifier, validate_group, validate_segment};
use crate::error::FetchError;

/// Remote locators for one (module, classifier) artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactLocation {
    pub group: Url,
    pub project: Url,
    pub version: Url,
    pub artifact: Url,
}

impl ArtifactLocation {
    /// Artifact path relative to its version directory, i.e. the file name
    /// the artifact is cached under.
    pub fn relative_name(&self) -> Result<String, FetchError> {
        let relative = self
            .version
            .make_relative(&self.artifact)
            .ok_or_else(|| FetchError::InvalidRepository {
                location: self.artifact.to_string(),
                reason: "artifact is not under its version directory".to_string(),
            })?;
        if relative.is_empty() || relative.contains('/') {
            return Err(FetchError::InvalidRepository {
                location: self.artifact.to_string(),
                reason: format!("unexpected relative artifact path {relative:?}"),
            });
        }
        Ok(relative)
    }

    pub fn cache_path(&self, output: &Utf8Path) -> Result<Utf8PathBuf, FetchError> {
        Ok(output.join(self.relative_name()?))
    }
}

/// Parses a repository base location, normalizing it to a directory URL.
pub fn parse_repository(location: &str) -> Result<Url, FetchError> {
    let invalid = |reason: String| FetchError::InvalidRepository {
        location: location.to_string(),
        reason,
    };
    let mut url = Url::parse(location.trim()).map_err(|err| invalid(err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https" | "file") {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("not a hierarchical URL".to_string()));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("query and fragment are not allowed".to_string()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// `project` or `project-module` when a module is given.
pub fn subproject(project: &str, module: &str) -> String {
    if module.is_empty() {
        project.to_string()
    } else {
        format!("{project}-{module}")
    }
}

/// Resolves one artifact coordinate against a repository base.
///
/// ```text
/// {base}/{group/as/path}/{project[-module]}/{version}/{project[-module]}-{version}-{classifier}.{ext}
/// ```
pub fn resolve(
    base: &Url,
    group: &str,
    project: &str,
    version: &str,
    module: &str,
    classifier: &Classifier,
    format: ArchiveFormat,
) -> Result<ArtifactLocation, FetchError> {
    validate_group(group)?;
    validate_segment("project", project)?;
    validate_segment("version", version)?;
    if !module.is_empty() {
        validate_segment("module", module)?;
    }
    let classifier = classifier.token();
    validate_segment("classifier", &classifier)?;

    let join = |from: &Url, segment: &str| {
        from.join(segment).map_err(|err| FetchError::InvalidRepository {
            location: from.to_string(),
            reason: err.to_string(),
        })
    };

    let subproject = subproject(project, module);
    let group = join(base, &format!("{}/", group.replace('.', "/")))?;
    let project = join(&group, &format!("{subproject}/"))?;
    let version_url = join(&project, &format!("{version}/"))?;
    let artifact = join(
        &version_url,
        &format!("{subproject}-{version}-{classifier}.{}", format.extension()),
    )?;

    Ok(ArtifactLocation {
        group,
        project,
        version: version_url,
        artifact,
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn central() -> Url {
        parse_repository("https://repo.maven.apache.org/maven2/").unwrap()
    }

    #[test]
    fn resolves_maven_layout() {
        let location = resolve(
            &central(),
            "org.openjfx",
            "javafx",
            "18-ea+3",
            "graphics",
            &Classifier::Linux,
            ArchiveFormat::Jar,
        )
        .unwrap();

        assert_eq!(
            location.group.as_str(),
            "https://repo.maven.apache.org/maven2/org/openjfx/"
        );
        assert_eq!(
            location.project.as_str(),
            "https://repo.maven.apache.org/maven2/org/openjfx/javafx-graphics/"
        );
        assert_eq!(
            location.version.as_str(),
            "https://repo.maven.apache.org/maven2/org/openjfx/javafx-graphics/18-ea+3/"
        );
        assert_eq!(
            location.artifact.as_str(),
            "https://repo.maven.apache.org/maven2/org/openjfx/javafx-graphics/18-ea+3/javafx-graphics-18-ea+3-linux.jar"
        );
    }

    #[test]
    fn empty_module_drops_suffix() {
        let location = resolve(
            &central(),
            "org.openjfx",
            "javafx",
            "17",
            "",
            &Classifier::Mac,
            ArchiveFormat::Jar,
        )
        .unwrap();
        assert!(location.artifact.as_str().ends_with("/javafx/17/javafx-17-mac.jar"));
        assert_eq!(location.relative_name().unwrap(), "javafx-17-mac.jar");
    }

    #[test]
    fn base_without_trailing_slash_is_kept() {
        let base = parse_repository("https://example.com/repo").unwrap();
        assert_eq!(base.as_str(), "https://example.com/repo/");
    }

    #[test]
    fn rejects_unsupported_repository() {
        assert_matches!(
            parse_repository("ftp://example.com/"),
            Err(FetchError::InvalidRepository { .. })
        );
        assert_matches!(
            parse_repository("not a url"),
            Err(FetchError::InvalidRepository { .. })
        );
    }

    #[test]
    fn rejects_absolute_segments() {
        let err = resolve(
            &central(),
            "org.openjfx",
            "javafx",
            "//evil.example/x",
            "base",
            &Classifier::Linux,
            ArchiveFormat::Jar,
        )
        .unwrap_err();
        assert_matches!(err, FetchError::InvalidSegment { kind: "version", .. });
    }

    #[test]
    fn cache_path_lands_under_output() {
        let location = resolve(
            &central(),
            "org.openjfx",
            "javafx",
            "17",
            "base",
            &Classifier::Windows,
            ArchiveFormat::Zip,
        )
        .unwrap();
        let path = location.cache_path(Utf8Path::new("/tmp/cache")).unwrap();
        assert_eq!(path, Utf8Path::new("/tmp/cache/javafx-base-17-win.zip"));
    }
}
