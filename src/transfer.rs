use std::fs::File;
use std::io::{self, Read, Write};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use url::Url;

use crate::error::FetchError;

pub const CHUNK_SIZE: usize = 65535;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Snapshot of one transfer. `total` is `None` when the remote did not
/// declare a length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub transferred: u64,
    pub total: Option<u64>,
}

impl Progress {
    pub fn fraction(&self) -> Option<f64> {
        match self.total {
            Some(0) => Some(1.0),
            Some(total) => Some(self.transferred as f64 / total as f64),
            None => None,
        }
    }
}

/// An opened remote resource.
pub struct Source {
    pub reader: Box<dyn Read + Send>,
    pub total: Option<u64>,
}

pub trait Transport: Send + Sync {
    fn open(&self, url: &Url) -> Result<Source, FetchError>;
}

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("platfetch/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| FetchError::transfer("http client", err))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| FetchError::transfer("http client", err))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn open(&self, url: &Url) -> Result<Source, FetchError> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .map_err(|err| FetchError::transfer(url, err))?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let total = response.content_length();
        Ok(Source {
            reader: Box::new(response),
            total,
        })
    }
}

/// Reads `file://` repositories, e.g. a local mirror.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTransport;

impl Transport for FileTransport {
    fn open(&self, url: &Url) -> Result<Source, FetchError> {
        let path = url
            .to_file_path()
            .map_err(|_| FetchError::transfer(url, "not a local file path"))?;
        let file = File::open(&path).map_err(|err| FetchError::transfer(url, err))?;
        let total = file.metadata().ok().map(|meta| meta.len());
        Ok(Source {
            reader: Box::new(file),
            total,
        })
    }
}

/// Picks the transport by URL scheme.
#[derive(Clone)]
pub struct RepositoryTransport {
    http: HttpTransport,
    file: FileTransport,
}

impl RepositoryTransport {
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            http: HttpTransport::with_timeout(timeout)?,
            file: FileTransport,
        })
    }
}

impl Transport for RepositoryTransport {
    fn open(&self, url: &Url) -> Result<Source, FetchError> {
        match url.scheme() {
            "http" | "https" => self.http.open(url),
            "file" => self.file.open(url),
            other => Err(FetchError::UnsupportedScheme(other.to_string())),
        }
    }
}

/// Copies `url` into `sink` in fixed-size chunks.
///
/// `on_progress` sees `(0, total)` first and then one snapshot per chunk.
/// The sink is flushed but stays owned by the caller. Returns the number of
/// bytes written. With a declared length the body must match it exactly;
/// bytes past the declared length are never written.
pub fn fetch(
    transport: &dyn Transport,
    url: &Url,
    sink: &mut dyn Write,
    on_progress: &mut dyn FnMut(Progress),
) -> Result<u64, FetchError> {
    let Source { mut reader, total } = transport.open(url)?;
    let mut transferred = 0u64;
    on_progress(Progress { transferred, total });

    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(FetchError::transfer(url, err)),
        };
        if let Some(total) = total {
            if transferred + read as u64 > total {
                return Err(FetchError::LengthMismatch {
                    url: url.to_string(),
                    transferred: transferred + read as u64,
                    total,
                });
            }
        }
        sink.write_all(&buffer[..read])
            .map_err(|err| FetchError::sink(format!("download of {url}"), err))?;
        transferred += read as u64;
        on_progress(Progress { transferred, total });
    }
    sink.flush()
        .map_err(|err| FetchError::sink(format!("download of {url}"), err))?;

    if let Some(total) = total {
        if transferred != total {
            return Err(FetchError::LengthMismatch {
                url: url.to_string(),
                transferred,
                total,
            });
        }
    }
    Ok(transferred)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use assert_matches::assert_matches;

    use super::*;

    struct Fixed {
        body: Vec<u8>,
        declared: Option<u64>,
    }

    impl Transport for Fixed {
        fn open(&self, _url: &Url) -> Result<Source, FetchError> {
            Ok(Source {
                reader: Box::new(Cursor::new(self.body.clone())),
                total: self.declared,
            })
        }
    }

    fn url() -> Url {
        Url::parse("https://example.com/a.jar").unwrap()
    }

    #[test]
    fn progress_is_monotonic_and_complete() {
        let body = vec![7u8; CHUNK_SIZE * 3 + 17];
        let transport = Fixed {
            declared: Some(body.len() as u64),
            body: body.clone(),
        };
        let mut sink = Vec::new();
        let mut seen = Vec::new();
        let written = fetch(&transport, &url(), &mut sink, &mut |p| seen.push(p)).unwrap();

        assert_eq!(written, body.len() as u64);
        assert_eq!(sink, body);
        assert!(seen.windows(2).all(|w| w[0].transferred <= w[1].transferred));
        let last = seen.last().unwrap();
        assert_eq!(Some(last.transferred), last.total);
    }

    #[test]
    fn unknown_length_is_accepted() {
        let transport = Fixed {
            body: b"abc".to_vec(),
            declared: None,
        };
        let mut sink = Vec::new();
        let mut last = None;
        fetch(&transport, &url(), &mut sink, &mut |p| last = Some(p)).unwrap();
        assert_eq!(
            last,
            Some(Progress {
                transferred: 3,
                total: None
            })
        );
    }

    #[test]
    fn short_body_fails() {
        let transport = Fixed {
            body: b"abc".to_vec(),
            declared: Some(10),
        };
        let mut sink = Vec::new();
        let err = fetch(&transport, &url(), &mut sink, &mut |_| {}).unwrap_err();
        assert_matches!(
            err,
            FetchError::LengthMismatch {
                transferred: 3,
                total: 10,
                ..
            }
        );
    }

    #[test]
    fn long_body_fails_without_writing_extra_bytes() {
        let transport = Fixed {
            body: vec![1u8; 20],
            declared: Some(10),
        };
        let mut sink = Vec::new();
        let mut last = None;
        let err = fetch(&transport, &url(), &mut sink, &mut |p| last = Some(p)).unwrap_err();
        assert_matches!(
            err,
            FetchError::LengthMismatch {
                transferred: 20,
                total: 10,
                ..
            }
        );
        assert!(sink.is_empty());
        assert!(last.is_some_and(|p| p.transferred <= 10));
    }

    #[test]
    fn fraction_tracks_declared_total() {
        let half = Progress {
            transferred: 5,
            total: Some(10),
        };
        assert_eq!(half.fraction(), Some(0.5));
        let empty = Progress {
            transferred: 0,
            total: Some(0),
        };
        assert_eq!(empty.fraction(), Some(1.0));
        let unknown = Progress {
            transferred: 5,
            total: None,
        };
        assert_eq!(unknown.fraction(), None);
    }

    #[test]
    fn file_transport_reads_local_files() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("x.jar");
        std::fs::write(&path, b"0123456789").unwrap();
        let url = Url::from_file_path(&path).unwrap();

        let mut sink = Vec::new();
        fetch(&FileTransport, &url, &mut sink, &mut |_| {}).unwrap();
        assert_eq!(sink, b"0123456789");
    }

    #[test]
    fn repository_transport_rejects_unknown_scheme() {
        let transport = RepositoryTransport::with_timeout(Duration::from_secs(5)).unwrap();
        let url = Url::parse("ftp://mirror.example/a.jar").unwrap();
        let err = fetch(&transport, &url, &mut Vec::new(), &mut |_| {}).unwrap_err();
        assert_matches!(err, FetchError::UnsupportedScheme(scheme) if scheme == "ftp");
    }

    #[test]
    fn missing_local_file_is_a_transfer_error() {
        let temp = tempfile::tempdir().unwrap();
        let url = Url::from_file_path(temp.path().join("missing.jar")).unwrap();
        let err = fetch(&FileTransport, &url, &mut Vec::new(), &mut |_| {}).unwrap_err();
        assert_matches!(err, FetchError::Transfer { .. });
    }
}
