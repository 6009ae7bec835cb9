//! HTTP registry client for rubygems-compatible servers
//!
//! Serves the compact index (`/names`, `/versions`, `/info/NAME`), gemspec and
//! gem downloads, and the JSON dependency API. The legacy full and prerelease
//! indexes are Marshal encoded and are reported as unsupported.
//!
//! # Example
//!
//! ```no_run
//! use gem_await::core::RegistryClient;
//! use gem_await::registry::HttpRegistryClient;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = HttpRegistryClient::builder("https://rubygems.org")
//!     .request_timeout(Duration::from_secs(10))
//!     .build()?;
//! let versions = client.list_versions("rack").await?;
//! println!("{} versions of rack", versions.len());
//! # Ok(())
//! # }
//! ```

use super::compact_index;
use crate::core::error::ClientError;
use crate::core::package::PackageIdentifier;
use crate::core::traits::{Presence, RegistryClient};
use crate::security::credentials::filter_uri;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CACHE_CONTROL};
use reqwest::{StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Marshal format version used in gemspec paths
const MARSHAL_SPEC_DIR: &str = "quick/Marshal.4.8/";

/// Entry of the JSON dependency API
#[derive(Debug, Deserialize)]
struct DependencyEntry {
    name: String,
    number: String,
    #[serde(default)]
    platform: Option<String>,
}

/// Last downloaded versions file and the names already answered from it
///
/// The versions awaiter asks for each missing name once per poll. Asking for
/// a name a second time means a new poll has started, so the file is
/// downloaded again.
struct VersionsSnapshot {
    body: Arc<String>,
    served: HashSet<String>,
}

/// Builder for [`HttpRegistryClient`]
pub struct HttpRegistryClientBuilder {
    source: String,
    api_key: Option<SecretString>,
    bypass_cache: bool,
    request_timeout: Duration,
    cache_dir: Option<PathBuf>,
}

impl HttpRegistryClientBuilder {
    /// API key sent as the `Authorization` header
    pub fn api_key(mut self, api_key: Option<SecretString>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Ask intermediaries for fresh responses (default: on)
    pub fn bypass_cache(mut self, bypass_cache: bool) -> Self {
        self.bypass_cache = bypass_cache;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Directory downloaded `.gem` files are written to
    pub fn cache_dir(mut self, cache_dir: Option<PathBuf>) -> Self {
        self.cache_dir = cache_dir;
        self
    }

    pub fn build(self) -> Result<HttpRegistryClient, ClientError> {
        let mut source = self.source;
        if !source.ends_with('/') {
            source.push('/');
        }
        let source = Url::parse(&source).map_err(|e| ClientError::Parse {
            what: "source URL".to_string(),
            message: e.to_string(),
        })?;

        let http = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .user_agent(concat!("gem-await/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(HttpRegistryClient {
            http,
            source,
            api_key: self.api_key,
            bypass_cache: self.bypass_cache,
            cache_dir: self.cache_dir,
            versions: Mutex::new(None),
        })
    }
}

/// [`RegistryClient`] talking to a rubygems-compatible HTTP server
pub struct HttpRegistryClient {
    http: reqwest::Client,
    source: Url,
    api_key: Option<SecretString>,
    bypass_cache: bool,
    cache_dir: Option<PathBuf>,
    versions: Mutex<Option<VersionsSnapshot>>,
}

impl HttpRegistryClient {
    pub fn builder(source: impl Into<String>) -> HttpRegistryClientBuilder {
        HttpRegistryClientBuilder {
            source: source.into(),
            api_key: None,
            bypass_cache: true,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            cache_dir: None,
        }
    }

    pub fn source(&self) -> &Url {
        &self.source
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.source.join(path).map_err(|e| ClientError::Parse {
            what: format!("URL for {}", path),
            message: e.to_string(),
        })
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response, ClientError> {
        debug!(uri = %filter_uri(&url), "GET");
        let mut request = self.http.get(url);
        if self.bypass_cache {
            request = request.header(CACHE_CONTROL, "no-cache");
        }
        if let Some(api_key) = &self.api_key {
            request = request.header(AUTHORIZATION, api_key.expose_secret());
        }
        Ok(request.send().await?)
    }

    /// GET a document that must exist
    async fn get_text(&self, path: &str) -> Result<String, ClientError> {
        let url = self.url(path)?;
        let response = self.get(url.clone()).await?;
        match classify(&url, response.status())? {
            Presence::Found => Ok(response.text().await?),
            Presence::NotFound => Err(ClientError::Status {
                uri: filter_uri(&url),
                status: response.status().as_u16(),
            }),
        }
    }

    /// Versions file for looking up `name`, downloaded at most once per poll
    async fn versions_body(&self, name: &str) -> Result<Arc<String>, ClientError> {
        let mut cached = self.versions.lock().await;
        if let Some(snapshot) = cached.as_mut()
            && snapshot.served.insert(name.to_string())
        {
            return Ok(Arc::clone(&snapshot.body));
        }

        let body = Arc::new(self.get_text("versions").await?);
        *cached = Some(VersionsSnapshot {
            body: Arc::clone(&body),
            served: HashSet::from([name.to_string()]),
        });
        Ok(body)
    }

    async fn fetch_file(&self, path: &str) -> Result<(reqwest::Response, Presence), ClientError> {
        let url = self.url(path)?;
        let response = self.get(url.clone()).await?;
        let presence = classify(&url, response.status())?;
        Ok((response, presence))
    }
}

/// Map an HTTP status to presence, or to an error for anything unexpected
fn classify(url: &Url, status: StatusCode) -> Result<Presence, ClientError> {
    match status {
        s if s.is_success() => Ok(Presence::Found),
        StatusCode::NOT_FOUND | StatusCode::GONE => Ok(Presence::NotFound),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ClientError::Forbidden {
            uri: filter_uri(url),
        }),
        s => Err(ClientError::Status {
            uri: filter_uri(url),
            status: s.as_u16(),
        }),
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn list_names(&self) -> Result<Vec<String>, ClientError> {
        let body = self.get_text("names").await?;
        Ok(compact_index::parse_names(&body))
    }

    async fn list_versions(&self, name: &str) -> Result<Vec<PackageIdentifier>, ClientError> {
        let body = self.versions_body(name).await?;
        Ok(compact_index::parse_versions(&body, name))
    }

    async fn fetch_dependency_info(
        &self,
        name: &str,
    ) -> Result<Vec<PackageIdentifier>, ClientError> {
        let (response, presence) = self.fetch_file(&format!("info/{}", name)).await?;
        match presence {
            Presence::Found => Ok(compact_index::parse_info(&response.text().await?, name)),
            // no version of this gem is visible yet
            Presence::NotFound => Ok(Vec::new()),
        }
    }

    async fn fetch_metadata_file(&self, id: &PackageIdentifier) -> Result<Presence, ClientError> {
        let path = format!("{}{}.gemspec.rz", MARSHAL_SPEC_DIR, id.full_name());
        let (_, presence) = self.fetch_file(&path).await?;
        Ok(presence)
    }

    async fn fetch_archive_file(&self, id: &PackageIdentifier) -> Result<Presence, ClientError> {
        let file_name = format!("{}.gem", id.full_name());
        let (response, presence) = self.fetch_file(&format!("gems/{}", file_name)).await?;

        if let (Presence::Found, Some(cache_dir)) = (presence, &self.cache_dir) {
            let bytes = response.bytes().await?;
            tokio::fs::create_dir_all(cache_dir).await?;
            let local_path = cache_dir.join(&file_name);
            tokio::fs::write(&local_path, &bytes).await?;
            debug!(path = %local_path.display(), "cached");
        }

        Ok(presence)
    }

    async fn fetch_dependency_api(
        &self,
        names: &[String],
    ) -> Result<Vec<PackageIdentifier>, ClientError> {
        let mut url = self.url("api/v1/dependencies.json")?;
        url.query_pairs_mut().append_pair("gems", &names.join(","));

        let response = self.get(url.clone()).await?;
        if classify(&url, response.status())? == Presence::NotFound {
            return Err(ClientError::Status {
                uri: filter_uri(&url),
                status: response.status().as_u16(),
            });
        }

        let entries: Vec<DependencyEntry> = response.json().await?;
        Ok(entries
            .iter()
            .map(|e| PackageIdentifier::new(&e.name, &e.number, e.platform.as_deref()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn id(name: &str, version: &str) -> PackageIdentifier {
        PackageIdentifier::new(name, version, None)
    }

    async fn client_for(server: &MockServer) -> HttpRegistryClient {
        HttpRegistryClient::builder(server.uri()).build().unwrap()
    }

    #[tokio::test]
    async fn test_list_names_bypasses_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/names"))
            .and(header("cache-control", "no-cache"))
            .respond_with(ResponseTemplate::new(200).set_body_string("---\nrack\nrails\n"))
            .expect(1)
            .mount(&server)
            .await;

        let names = client_for(&server).await.list_names().await.unwrap();

        assert_eq!(names, vec!["rack".to_string(), "rails".to_string()]);
    }

    #[tokio::test]
    async fn test_list_versions_downloads_once_per_poll() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/versions"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "created_at: 2024-01-01T00:00:00Z\n---\nrack 3.0.0 abc\nrails 7.1.0 def\n",
            ))
            .expect(1)
            .mount(&server)
            .await;
        let client = client_for(&server).await;

        let rack = client.list_versions("rack").await.unwrap();
        let rails = client.list_versions("rails").await.unwrap();

        assert_eq!(rack, vec![id("rack", "3.0.0")]);
        assert_eq!(rails, vec![id("rails", "7.1.0")]);
    }

    #[tokio::test]
    async fn test_list_versions_refetches_on_next_poll() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/versions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("---\nrails 7.1.0 def\n"),
            )
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/versions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("---\nrails 7.1.0 def\nfoo 1.0.0 abc\n"),
            )
            .expect(1)
            .mount(&server)
            .await;
        let client = client_for(&server).await;

        let first = client.list_versions("foo").await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        let second = client.list_versions("foo").await.unwrap();

        assert!(first.is_empty());
        assert_eq!(second, vec![id("foo", "1.0.0")]);
    }

    #[tokio::test]
    async fn test_info_not_found_is_an_empty_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/info/brand-new"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let listed = client_for(&server)
            .await
            .fetch_dependency_info("brand-new")
            .await
            .unwrap();

        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_info_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/info/rack"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .fetch_dependency_info("rack")
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Status { status: 503, .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_gemspec_presence() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quick/Marshal.4.8/foo-1.0.0.gemspec.rz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x78, 0x9c]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/quick/Marshal.4.8/foo-1.1.0.gemspec.rz"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/quick/Marshal.4.8/foo-1.2.0-java.gemspec.rz"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        let client = client_for(&server).await;

        assert_eq!(
            client.fetch_metadata_file(&id("foo", "1.0.0")).await.unwrap(),
            Presence::Found
        );
        assert_eq!(
            client.fetch_metadata_file(&id("foo", "1.1.0")).await.unwrap(),
            Presence::NotFound
        );
        let err = client
            .fetch_metadata_file(&PackageIdentifier::new("foo", "1.2.0", Some("java")))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Forbidden { ref uri } if uri.ends_with("foo-1.2.0-java.gemspec.rz")));
    }

    #[tokio::test]
    async fn test_gem_is_written_to_cache_dir() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gems/foo-1.0.0.gem"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"gem-bytes".to_vec()))
            .mount(&server)
            .await;
        let cache = tempfile::TempDir::new().unwrap();
        let client = HttpRegistryClient::builder(server.uri())
            .cache_dir(Some(cache.path().join("cache")))
            .build()
            .unwrap();

        let presence = client.fetch_archive_file(&id("foo", "1.0.0")).await.unwrap();

        assert_eq!(presence, Presence::Found);
        let cached = std::fs::read(cache.path().join("cache").join("foo-1.0.0.gem")).unwrap();
        assert_eq!(cached, b"gem-bytes");
    }

    #[tokio::test]
    async fn test_dependency_api_query_and_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/dependencies.json"))
            .and(query_param("gems", "bar,foo"))
            .and(header("authorization", "rubygems_key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "bar", "number": "1.0.0", "platform": "ruby", "dependencies": []},
                {"name": "foo", "number": "2.0.0", "platform": "java", "dependencies": []}
            ])))
            .expect(1)
            .mount(&server)
            .await;
        let client = HttpRegistryClient::builder(server.uri())
            .api_key(Some(SecretString::new("rubygems_key".into())))
            .build()
            .unwrap();

        let found = client
            .fetch_dependency_api(&["bar".to_string(), "foo".to_string()])
            .await
            .unwrap();

        assert_eq!(
            found,
            vec![
                id("bar", "1.0.0"),
                PackageIdentifier::new("foo", "2.0.0", Some("java")),
            ]
        );
    }

    #[tokio::test]
    async fn test_marshal_indexes_are_unsupported() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;

        let err = client.fetch_full_index().await.unwrap_err();
        assert!(!err.is_transient());
        let err = client.fetch_prerelease_index().await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn test_invalid_source_url() {
        let result = HttpRegistryClient::builder("not a url").build();

        assert!(matches!(result, Err(ClientError::Parse { .. })));
    }

    #[test]
    fn test_source_gets_trailing_slash() {
        let client = HttpRegistryClient::builder("https://gems.example.com/private")
            .build()
            .unwrap();

        assert_eq!(client.source().as_str(), "https://gems.example.com/private/");
        assert_eq!(
            client.url("names").unwrap().as_str(),
            "https://gems.example.com/private/names"
        );
    }
}
