//! Fetches platform-specific library artifacts from a Maven-style
//! repository into a local cache.
//!
//! A [`request::FetchRequest`] names a library (group, project, version),
//! the modules to fetch and the platform [`domain::Classifier`]s wanted.
//! The [`orchestrator::Orchestrator`] resolves every (module, classifier)
//! pair, reuses cached copies that still open as archives, downloads the
//! rest on a caller-owned worker pool and hands each ready file to an
//! [`loader::ArtifactLoader`].

pub mod config;
pub mod coordinate;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod loader;
pub mod orchestrator;
pub mod output;
pub mod pool;
pub mod request;
pub mod transfer;
