// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Remote file retrieval.
//!
//! Fontsync never talks to a remote host directly from its merge or install
//! logic. Instead those layers depend on two small capabilities:
//!
//! - [`Retrieve`] downloads one file from a source repository to a local
//!   destination path.
//! - [`Credentials`] yields an optional bearer token for those downloads.
//!
//! [`GithubRaw`] is the production retrieval capability, reading files off
//! the raw content host of GitHub. [`StagedFetcher`] builds the descriptor
//! fetcher on top of any retrieval capability by downloading each descriptor
//! into a staging directory and parsing it.
//!
//! Retrieval never retries. A failed download is reported once, and the
//! caller decides whether to skip the source for this cycle.

use crate::{config::Settings, descriptor::Descriptor, registry::Source};

use reqwest::{blocking::Client, header::AUTHORIZATION, StatusCode};
use std::{
    fs::{read_to_string, write},
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, instrument};

/// Capability to download a single file from a source repository.
pub trait Retrieve {
    /// Download `path` of `owner/repo` into `destination`.
    ///
    /// Parent directories of `destination` are created when missing.
    fn fetch_file(&self, owner: &str, repo: &str, path: &str, destination: &Path) -> Result<()>;
}

impl<R> Retrieve for &R
where
    R: Retrieve + ?Sized,
{
    fn fetch_file(&self, owner: &str, repo: &str, path: &str, destination: &Path) -> Result<()> {
        (**self).fetch_file(owner, repo, path, destination)
    }
}

/// Read-only provider of an access token.
pub trait Credentials {
    /// Current token, if any.
    fn token(&self) -> Option<String>;
}

/// Fixed token, or none at all.
impl Credentials for Option<String> {
    fn token(&self) -> Option<String> {
        self.clone()
    }
}

/// Token read from an environment variable.
///
/// An unset or empty variable means no token.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    var: String,
}

impl EnvCredentials {
    /// Construct new environment credential provider.
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Credentials for EnvCredentials {
    fn token(&self) -> Option<String> {
        std::env::var(&self.var)
            .ok()
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    }
}

/// Retrieval through the raw content host of GitHub.
#[derive(Debug)]
pub struct GithubRaw<C = EnvCredentials>
where
    C: Credentials,
{
    client: Client,
    base_url: String,
    branch: String,
    credentials: C,
}

impl<C> GithubRaw<C>
where
    C: Credentials,
{
    /// Construct new retrieval capability from settings.
    ///
    /// # Errors
    ///
    /// - Return [`FetchError::Transport`] if the HTTP client cannot be built.
    pub fn new(settings: &Settings, credentials: C) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(concat!("fontsync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.raw_base_url.clone(),
            branch: settings.branch.clone(),
            credentials,
        })
    }
}

impl<C> Retrieve for GithubRaw<C>
where
    C: Credentials,
{
    #[instrument(skip(self, destination), level = "debug")]
    fn fetch_file(&self, owner: &str, repo: &str, path: &str, destination: &Path) -> Result<()> {
        let url = raw_url(&self.base_url, owner, repo, &self.branch, path);
        let mut request = self.client.get(&url);
        if let Some(token) = self.credentials.token() {
            request = request.header(AUTHORIZATION, format!("token {token}"));
        }

        let response = request.send()?;
        match response.status() {
            StatusCode::NOT_FOUND => return Err(FetchError::NotFound { url }),
            status @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                return Err(FetchError::Unauthorized {
                    url,
                    status: status.as_u16(),
                })
            }
            status if !status.is_success() => {
                return Err(FetchError::Status {
                    url,
                    status: status.as_u16(),
                })
            }
            _ => {}
        }

        let body = response.bytes()?;
        write_staged(destination, &body)?;
        debug!("downloaded {url} to {:?}", destination.display());

        Ok(())
    }
}

/// Compose download URL for a file on the raw content host.
pub fn raw_url(base_url: &str, owner: &str, repo: &str, branch: &str, path: &str) -> String {
    format!(
        "{}/{owner}/{repo}/{branch}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Write downloaded bytes, creating parent directories.
pub(crate) fn write_staged(destination: &Path, body: &[u8]) -> Result<()> {
    let io_error = |source| FetchError::Io {
        source,
        path: destination.into(),
    };
    if let Some(parent) = destination.parent() {
        mkdirp::mkdirp(parent).map_err(io_error)?;
    }
    write(destination, body).map_err(io_error)
}

/// Capability to obtain the current descriptor of a source.
pub trait DescriptorFetcher {
    /// Fetch and parse descriptor of target source.
    ///
    /// # Errors
    ///
    /// - Return [`FetchError`] on any transport, authorization, or parse
    ///   failure.
    fn fetch(&self, source: &Source) -> Result<Descriptor>;
}

/// Descriptor fetcher that stages each descriptor on disk before parsing.
///
/// Descriptors land at `<staging>/<owner>_<repo>/_descriptor.json` and are
/// overwritten on every fetch.
#[derive(Debug)]
pub struct StagedFetcher<R>
where
    R: Retrieve,
{
    retriever: R,
    staging_dir: PathBuf,
}

impl<R> StagedFetcher<R>
where
    R: Retrieve,
{
    /// Construct new staged descriptor fetcher.
    pub fn new(retriever: R, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            retriever,
            staging_dir: staging_dir.into(),
        }
    }

    /// Staging path of descriptor for target source.
    pub fn staged_path(&self, source: &Source) -> PathBuf {
        self.staging_dir
            .join(format!("{}_{}", source.owner, source.repo))
            .join("_descriptor.json")
    }
}

impl<R> DescriptorFetcher for StagedFetcher<R>
where
    R: Retrieve,
{
    #[instrument(skip(self, source), fields(source = %source.key), level = "debug")]
    fn fetch(&self, source: &Source) -> Result<Descriptor> {
        let staged = self.staged_path(source);
        self.retriever
            .fetch_file(&source.owner, &source.repo, &source.descriptor, &staged)?;
        let data = read_to_string(&staged).map_err(|source| FetchError::Io {
            source,
            path: staged.clone(),
        })?;

        Ok(data.parse()?)
    }
}

/// All possible error types for remote retrieval.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Remote file does not exist.
    #[error("{url} not found")]
    NotFound { url: String },

    /// Remote host refused the credentials, or lack thereof.
    #[error("access to {url} denied with status {status}")]
    Unauthorized { url: String, status: u16 },

    /// Remote host answered with an unexpected status.
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    /// Request could not be completed, e.g., timeout or refused connection.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// Downloaded file cannot be staged on disk.
    #[error("failed to stage download at {:?}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Downloaded descriptor is not valid structured data.
    #[error("malformed descriptor: {0}")]
    Parse(#[from] serde_json::Error),
}

impl FetchError {
    /// Whether retrying later is pointless without user intervention.
    ///
    /// Missing files, refused credentials, client errors, and malformed
    /// documents are permanent. Everything else is transient.
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::NotFound { .. } | Self::Unauthorized { .. } | Self::Parse(..) => true,
            Self::Status { status, .. } => (400..500).contains(status),
            Self::Transport(..) | Self::Io { .. } => false,
        }
    }

    /// Short label of error kind for logs.
    pub fn kind(&self) -> &'static str {
        if self.is_permanent() {
            "permanent"
        } else {
            "transient"
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = FetchError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use simple_test_case::test_case;
    use std::{
        cell::RefCell,
        collections::HashMap,
        io::{BufRead, BufReader, Write},
        net::TcpListener,
        thread::{self, JoinHandle},
    };

    #[test_case("https://raw.githubusercontent.com", "fonts.json", "https://raw.githubusercontent.com/acme/fonts/main/fonts.json"; "plain")]
    #[test_case("http://localhost:8080/", "/meta/index.json", "http://localhost:8080/acme/fonts/main/meta/index.json"; "stray slashes")]
    #[test]
    fn raw_url_composition(base: &str, path: &str, expect: &str) {
        pretty_assertions::assert_eq!(raw_url(base, "acme", "fonts", "main", path), expect);
    }

    #[sealed_test(env = [("FONTSYNC_TEST_TOKEN", " ghp_secret \n")])]
    fn env_credentials_trims_token() {
        let credentials = EnvCredentials::new("FONTSYNC_TEST_TOKEN");
        assert_eq!(credentials.token(), Some("ghp_secret".to_string()));
    }

    #[sealed_test(env = [("FONTSYNC_TEST_TOKEN", "")])]
    fn env_credentials_empty_is_absent() {
        let credentials = EnvCredentials::new("FONTSYNC_TEST_TOKEN");
        assert_eq!(credentials.token(), None);
        assert_eq!(EnvCredentials::new("FONTSYNC_SURELY_UNSET").token(), None);
    }

    #[test_case(FetchError::NotFound { url: "u".into() }, true; "not found")]
    #[test_case(FetchError::Unauthorized { url: "u".into(), status: 401 }, true; "unauthorized")]
    #[test_case(FetchError::Status { url: "u".into(), status: 429 }, true; "client error")]
    #[test_case(FetchError::Status { url: "u".into(), status: 503 }, false; "server error")]
    #[test_case(FetchError::Io { source: std::io::Error::other("disk"), path: "p".into() }, false; "staging io")]
    #[test]
    fn fetch_error_permanence(error: FetchError, expect: bool) {
        pretty_assertions::assert_eq!(error.is_permanent(), expect);
    }

    /// Serves canned file contents keyed by `owner/repo/path`.
    #[derive(Default)]
    struct CannedFiles {
        files: HashMap<String, String>,
        requests: RefCell<Vec<String>>,
    }

    impl Retrieve for CannedFiles {
        fn fetch_file(&self, owner: &str, repo: &str, path: &str, destination: &Path) -> Result<()> {
            let key = format!("{owner}/{repo}/{path}");
            self.requests.borrow_mut().push(key.clone());
            let body = self
                .files
                .get(&key)
                .ok_or(FetchError::NotFound { url: key.clone() })?;
            write_staged(destination, body.as_bytes())
        }
    }

    #[test]
    fn staged_fetcher_reads_descriptor_path() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let retriever = CannedFiles {
            files: HashMap::from([(
                "acme/fonts/meta/index.json".to_string(),
                r#"{"fonts":[{"family":"Inter","name":"Regular"}]}"#.to_string(),
            )]),
            ..Default::default()
        };
        let fetcher = StagedFetcher::new(&retriever, dir.path());
        let source = Source::new("acme", "fonts", "meta/index.json");

        let descriptor = fetcher.fetch(&source)?;

        assert_eq!(descriptor.fonts.len(), 1);
        assert_eq!(descriptor.fonts[0].identity(), "Inter_Regular");
        assert_eq!(*retriever.requests.borrow(), vec!["acme/fonts/meta/index.json"]);
        assert!(dir.path().join("acme_fonts").join("_descriptor.json").exists());

        Ok(())
    }

    #[test]
    fn staged_fetcher_distinguishes_failures() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let retriever = CannedFiles {
            files: HashMap::from([("bad/json/fonts.json".to_string(), "not json".to_string())]),
            ..Default::default()
        };
        let fetcher = StagedFetcher::new(&retriever, dir.path());

        let missing = fetcher.fetch(&Source::new("gone", "away", "fonts.json"));
        let malformed = fetcher.fetch(&Source::new("bad", "json", "fonts.json"));

        assert!(matches!(missing, Err(FetchError::NotFound { .. })));
        assert!(matches!(malformed, Err(FetchError::Parse(..))));

        Ok(())
    }

    /// Serve exactly one HTTP request from a local port.
    ///
    /// Answers with `status` and `body` after `delay`, and hands back the
    /// request head it received.
    fn serve_once(status: u16, body: &'static str, delay: Duration) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut head = String::new();
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                    break;
                }
                head.push_str(&line);
            }

            thread::sleep(delay);
            let mut stream = reader.into_inner();
            let response = format!(
                "HTTP/1.1 {status} Whatever\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).ok();
            head
        });

        (base_url, server)
    }

    fn github(base_url: String, timeout_secs: u64, token: Option<String>) -> GithubRaw<Option<String>> {
        let settings = Settings {
            raw_base_url: base_url,
            timeout_secs,
            ..Settings::default()
        };
        GithubRaw::new(&settings, token).unwrap()
    }

    #[test]
    fn github_raw_downloads_file_with_token() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let destination = dir.path().join("staged").join("fonts.json");
        let (base_url, server) = serve_once(200, r#"{"fonts":[]}"#, Duration::ZERO);
        let github = github(base_url, 5, Some("ghp_secret".into()));

        github.fetch_file("acme", "fonts", "meta/fonts.json", &destination)?;

        let head = server.join().unwrap();
        assert!(head.starts_with("GET /acme/fonts/main/meta/fonts.json HTTP/1.1\r\n"));
        assert!(head.to_lowercase().contains("authorization: token ghp_secret\r\n"));
        assert_eq!(std::fs::read_to_string(&destination)?, r#"{"fonts":[]}"#);

        Ok(())
    }

    #[test]
    fn github_raw_without_token_sends_no_authorization() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let (base_url, server) = serve_once(200, "{}", Duration::ZERO);
        let github = github(base_url, 5, None);

        github.fetch_file("acme", "fonts", "fonts.json", &dir.path().join("fonts.json"))?;

        let head = server.join().unwrap();
        assert!(!head.to_lowercase().contains("authorization"));

        Ok(())
    }

    fn status_label(result: Result<()>) -> String {
        match result {
            Ok(()) => "ok".into(),
            Err(FetchError::NotFound { .. }) => "not found".into(),
            Err(FetchError::Unauthorized { status, .. }) => format!("unauthorized {status}"),
            Err(FetchError::Status { status, .. }) => format!("status {status}"),
            Err(error) => format!("other: {error}"),
        }
    }

    #[test_case(404, "not found"; "missing file")]
    #[test_case(401, "unauthorized 401"; "bad token")]
    #[test_case(403, "unauthorized 403"; "forbidden")]
    #[test_case(500, "status 500"; "server error")]
    #[test_case(429, "status 429"; "rate limited")]
    #[test]
    fn github_raw_maps_error_statuses(status: u16, expect: &str) {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("fonts.json");
        let (base_url, server) = serve_once(status, "nope", Duration::ZERO);
        let github = github(base_url, 5, None);

        let result = github.fetch_file("acme", "fonts", "fonts.json", &destination);

        server.join().unwrap();
        pretty_assertions::assert_eq!(status_label(result), expect);
        assert!(!destination.exists());
    }

    #[test]
    fn github_raw_gives_up_after_timeout() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let (base_url, _server) = serve_once(200, "{}", Duration::from_secs(4));
        let github = github(base_url, 1, None);

        let result = github.fetch_file("acme", "fonts", "fonts.json", &dir.path().join("fonts.json"));

        assert!(matches!(result, Err(FetchError::Transport(..))));
        assert!(result.is_err_and(|error| !error.is_permanent()));

        Ok(())
    }
}
