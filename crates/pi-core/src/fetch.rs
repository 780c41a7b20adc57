//! Artifact retrieval.
//!
//! Remote artifacts are fetched with a blocking HTTP GET and streamed into
//! the scratch directory. Local paths are passed through untouched.

use std::fmt;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use pi_common::{Error, FileSystem, Result};
use pi_config::HttpSettings;
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

const COPY_BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// ArtifactReference
// ---------------------------------------------------------------------------

/// Where an artifact comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "location", rename_all = "snake_case")]
pub enum ArtifactReference {
    Url(Url),
    Local(PathBuf),
}

impl ArtifactReference {
    /// Parse a reference. `http://` and `https://` are URLs; anything else
    /// is a local path.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidArtifact("empty artifact reference".to_string()));
        }
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            let url = Url::parse(trimmed)
                .map_err(|e| Error::InvalidArtifact(format!("{trimmed}: {e}")))?;
            return Ok(ArtifactReference::Url(url));
        }
        Ok(ArtifactReference::Local(PathBuf::from(s)))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, ArtifactReference::Url(_))
    }
}

impl FromStr for ArtifactReference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ArtifactReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactReference::Url(url) => write!(f, "{url}"),
            ArtifactReference::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// File name for a downloaded artifact: the final URL path segment.
pub fn artifact_file_name(url: &Url) -> Result<String> {
    let name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    if name.is_empty() || name == "." || name == ".." || name.contains('\\') {
        return Err(Error::InvalidArtifact(format!(
            "{url}: no file name in URL path"
        )));
    }
    Ok(name.to_string())
}

// ---------------------------------------------------------------------------
// ArtifactFetcher
// ---------------------------------------------------------------------------

/// Resolves artifact references to local archive files.
#[derive(Debug, Clone)]
pub struct ArtifactFetcher {
    agent: ureq::Agent,
}

impl ArtifactFetcher {
    pub fn new(settings: &HttpSettings) -> Self {
        let mut builder = ureq::AgentBuilder::new().user_agent(&settings.user_agent);
        if let Some(timeout) = settings.connect_timeout() {
            builder = builder.timeout_connect(timeout);
        }
        if let Some(timeout) = settings.timeout() {
            builder = builder.timeout(timeout);
        }
        Self {
            agent: builder.build(),
        }
    }

    /// Produce a local path for `reference`, downloading into `dest` if it
    /// is remote.
    pub fn fetch<F>(&self, fs: &F, reference: &ArtifactReference, dest: &Path) -> Result<PathBuf>
    where
        F: FileSystem + ?Sized,
    {
        match reference {
            ArtifactReference::Url(url) => self.download(fs, url, dest),
            ArtifactReference::Local(path) => {
                debug!(path = %path.display(), "using local artifact");
                Ok(path.clone())
            }
        }
    }

    /// Download `url` into `dest/<final path segment>`.
    ///
    /// A non-2xx response creates no file. A body that fails midway leaves
    /// no partial file behind.
    pub fn download<F>(&self, fs: &F, url: &Url, dest: &Path) -> Result<PathBuf>
    where
        F: FileSystem + ?Sized,
    {
        let target = dest.join(artifact_file_name(url)?);

        let response = match self.agent.get(url.as_str()).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(status, response)) => {
                return Err(Error::Download {
                    status,
                    status_text: response.status_text().to_string(),
                    url: url.to_string(),
                });
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(Error::Transport {
                    url: url.to_string(),
                    message: transport.to_string(),
                });
            }
        };
        if !(200..300).contains(&response.status()) {
            return Err(Error::Download {
                status: response.status(),
                status_text: response.status_text().to_string(),
                url: url.to_string(),
            });
        }

        let mut body = response.into_reader();
        let written = match stream_to(fs, &mut body, &target, url) {
            Ok(written) => written,
            Err(err) => {
                if let Err(e) = fs.remove_file(&target) {
                    if e.kind() != io::ErrorKind::NotFound {
                        warn!(path = %target.display(), error = %e, "failed to remove partial download");
                    }
                }
                return Err(err);
            }
        };

        info!(url = %url, path = %target.display(), bytes = written, "downloaded artifact");
        Ok(target)
    }
}

fn stream_to<F, R>(fs: &F, body: &mut R, target: &Path, url: &Url) -> Result<u64>
where
    F: FileSystem + ?Sized,
    R: Read + ?Sized,
{
    let mut out = fs.create(target).map_err(|e| Error::io(target, e))?;
    let mut buf = vec![0u8; COPY_BUF_SIZE];
    let mut written = 0u64;
    loop {
        let n = match body.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(Error::Transport {
                    url: url.to_string(),
                    message: format!("reading response body: {e}"),
                });
            }
        };
        out.write_all(&buf[..n]).map_err(|e| Error::io(target, e))?;
        written += n as u64;
    }
    out.flush().map_err(|e| Error::io(target, e))?;
    Ok(written)
}
