use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use platfetch::config::ConfigLoader;
use platfetch::coordinate::{parse_repository, resolve};
use platfetch::domain::{ArchiveFormat, Classifier};
use platfetch::error::FetchError;
use platfetch::request::{DEFAULT_GROUP, DEFAULT_PROJECT, DEFAULT_REPOSITORY, FetchRequest};

#[test]
fn resolve_is_deterministic() {
    let base = parse_repository(DEFAULT_REPOSITORY).unwrap();
    let first = resolve(
        &base,
        DEFAULT_GROUP,
        DEFAULT_PROJECT,
        "17.0.2",
        "controls",
        &Classifier::Mac,
        ArchiveFormat::Jar,
    )
    .unwrap();
    let second = resolve(
        &base,
        DEFAULT_GROUP,
        DEFAULT_PROJECT,
        "17.0.2",
        "controls",
        &Classifier::Mac,
        ArchiveFormat::Jar,
    )
    .unwrap();

    assert_eq!(first, second);
    assert_eq!(first.artifact.as_str(), second.artifact.as_str());
}

#[test]
fn module_suffix_only_when_named() {
    let request = FetchRequest::builder("17.0.2")
        .modules(["", "base"])
        .dont_detect()
        .classifier(Classifier::Linux)
        .output(Utf8PathBuf::from("/tmp/platfetch-test"))
        .build()
        .unwrap();

    let bare = request.locate("", &Classifier::Linux).unwrap();
    assert_eq!(
        bare.artifact.as_str(),
        "https://repo.maven.apache.org/maven2/org/openjfx/javafx/17.0.2/javafx-17.0.2-linux.jar"
    );

    let named = request.locate("base", &Classifier::Linux).unwrap();
    assert_eq!(
        named.artifact.as_str(),
        "https://repo.maven.apache.org/maven2/org/openjfx/javafx-base/17.0.2/javafx-base-17.0.2-linux.jar"
    );
    assert_eq!(request.pairs().len(), 2);
}

#[test]
fn cache_names_do_not_collide() {
    let request = FetchRequest::builder("21")
        .modules(["base", "graphics"])
        .dont_detect()
        .classifiers(Classifier::all())
        .output(Utf8PathBuf::from("/tmp/platfetch-test"))
        .build()
        .unwrap();

    let mut paths: Vec<_> = request
        .pairs()
        .into_iter()
        .map(|(module, classifier)| {
            request
                .locate(module, classifier)
                .unwrap()
                .cache_path(request.output())
                .unwrap()
        })
        .collect();
    assert_eq!(paths.len(), 6);
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), 6);
}

#[test]
fn config_file_drives_request() {
    let temp = tempfile::tempdir().unwrap();
    let config_path = temp.path().join("platfetch.json");
    let output = temp.path().join("out");
    fs::write(
        &config_path,
        format!(
            r#"{{
                "repository": "file:///srv/mirror",
                "version": "17.0.2",
                "modules": ["base", "base", "media"],
                "classifiers": ["win"],
                "detect": false,
                "format": "zip",
                "output": {:?}
            }}"#,
            output.to_str().unwrap()
        ),
    )
    .unwrap();

    let config = ConfigLoader::resolve(config_path.to_str()).unwrap();
    let request = config.into_builder().unwrap().build().unwrap();

    assert_eq!(request.repository().as_str(), "file:///srv/mirror/");
    assert_eq!(request.modules().collect::<Vec<_>>(), vec!["base", "media"]);
    assert_eq!(
        request.classifiers().cloned().collect::<Vec<_>>(),
        vec![Classifier::Windows]
    );
    assert_eq!(request.format(), ArchiveFormat::Zip);
    assert_eq!(request.output().as_std_path(), output.as_path());
}

#[test]
fn missing_explicit_config_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let missing = temp.path().join("nope.json");
    let err = ConfigLoader::resolve(missing.to_str()).unwrap_err();
    assert_matches!(err, FetchError::ConfigRead(_));
    assert!(err.is_fatal());
}

#[test]
fn unsupported_repository_scheme_is_fatal() {
    let err = FetchRequest::builder("17")
        .repository("ftp://mirror.example/maven2")
        .output(Utf8PathBuf::from("/tmp/platfetch-test"))
        .build()
        .unwrap_err();
    assert_matches!(err, FetchError::InvalidRepository { .. });
    assert!(err.is_fatal());
}
