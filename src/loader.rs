//! Schema document loading.
//!
//! The engine never performs I/O itself: documents referenced by `$ref` are
//! obtained through a [`SchemaLoader`] supplied by the caller. This module
//! provides the loader trait, a few ready-made loaders, and helpers for
//! reading JSON from files, strings and HTTP URLs.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;
use url::Url;

use crate::error::LoadError;

#[cfg(feature = "remote")]
use once_cell::sync::OnceCell;
#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Capability to fetch a JSON document by absolute URI.
///
/// The URI never carries a fragment. Implementations may block; the engine
/// calls them only while building a validator, never during validation.
pub trait SchemaLoader: Send + Sync {
    fn load(&self, uri: &Url) -> Result<Value, LoadError>;
}

impl<F> SchemaLoader for F
where
    F: Fn(&Url) -> Result<Value, LoadError> + Send + Sync,
{
    fn load(&self, uri: &Url) -> Result<Value, LoadError> {
        self(uri)
    }
}

/// Loader that refuses every URI. Use it for self-contained schemas.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLoader;

impl SchemaLoader for NoLoader {
    fn load(&self, uri: &Url) -> Result<Value, LoadError> {
        Err(LoadError::Unavailable {
            uri: uri.to_string(),
        })
    }
}

/// In-memory documents keyed by URI.
#[derive(Debug, Clone, Default)]
pub struct MapLoader {
    documents: HashMap<String, Value>,
}

impl MapLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `document` under `uri`. A trailing empty fragment is ignored.
    pub fn insert(&mut self, uri: &str, document: Value) -> &mut Self {
        self.documents
            .insert(uri.trim_end_matches('#').to_string(), document);
        self
    }

    /// Builder-style variant of [`insert`](Self::insert).
    pub fn with(mut self, uri: &str, document: Value) -> Self {
        self.insert(uri, document);
        self
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl SchemaLoader for MapLoader {
    fn load(&self, uri: &Url) -> Result<Value, LoadError> {
        self.documents
            .get(uri.as_str())
            .cloned()
            .ok_or_else(|| LoadError::Unavailable {
                uri: uri.to_string(),
            })
    }
}

/// Loads `file://` URIs from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLoader;

impl SchemaLoader for FileLoader {
    fn load(&self, uri: &Url) -> Result<Value, LoadError> {
        if uri.scheme() != "file" {
            return Err(LoadError::Unavailable {
                uri: uri.to_string(),
            });
        }
        let path = uri.to_file_path().map_err(|()| LoadError::Unavailable {
            uri: uri.to_string(),
        })?;
        load_schema(&path)
    }
}

/// Loads `http://` and `https://` URIs with a blocking client.
///
/// Requires the `remote` feature (enabled by default).
#[cfg(feature = "remote")]
#[derive(Debug, Clone)]
pub struct HttpLoader {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "remote")]
impl HttpLoader {
    /// Build a loader with the default 10 second timeout.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::NetworkError` if the HTTP client cannot be built.
    pub fn new() -> Result<Self, LoadError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|source| LoadError::NetworkError {
                url: String::new(),
                source,
            })?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

#[cfg(feature = "remote")]
impl SchemaLoader for HttpLoader {
    fn load(&self, uri: &Url) -> Result<Value, LoadError> {
        if !is_url(uri.as_str()) {
            return Err(LoadError::Unavailable {
                uri: uri.to_string(),
            });
        }
        fetch_json(&self.client, uri.as_str())
    }
}

/// Dispatches by scheme: `file` to [`FileLoader`], `http(s)` to the HTTP
/// loader when the `remote` feature is enabled.
///
/// The HTTP client is built on the first remote load.
#[derive(Debug, Clone, Default)]
pub struct DefaultLoader {
    file: FileLoader,
    #[cfg(feature = "remote")]
    http: OnceCell<Option<HttpLoader>>,
}

impl DefaultLoader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SchemaLoader for DefaultLoader {
    fn load(&self, uri: &Url) -> Result<Value, LoadError> {
        match uri.scheme() {
            "file" => self.file.load(uri),
            #[cfg(feature = "remote")]
            "http" | "https" => match self.http.get_or_init(|| HttpLoader::new().ok()) {
                Some(http) => http.load(uri),
                None => load_schema_url(uri.as_str()),
            },
            _ => Err(LoadError::Unavailable {
                uri: uri.to_string(),
            }),
        }
    }
}

/// Load a schema from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidJson` if the file isn't valid JSON.
pub fn load_schema(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| LoadError::InvalidJson { source })
}

/// Load a schema from a JSON string.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` if the string isn't valid JSON.
pub fn load_schema_str(content: &str) -> Result<Value, LoadError> {
    serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })
}

/// Load a schema from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails or the response
/// isn't valid JSON.
#[cfg(feature = "remote")]
pub fn load_schema_url(url: &str) -> Result<Value, LoadError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|source| LoadError::NetworkError {
            url: url.to_string(),
            source,
        })?;
    fetch_json(&client, url)
}

#[cfg(feature = "remote")]
fn fetch_json(client: &reqwest::blocking::Client, url: &str) -> Result<Value, LoadError> {
    let response = client
        .get(url)
        .send()
        .map_err(|source| LoadError::NetworkError {
            url: url.to_string(),
            source,
        })?;

    // Check for HTTP errors before parsing
    let response = response
        .error_for_status()
        .map_err(|source| LoadError::NetworkError {
            url: url.to_string(),
            source,
        })?;

    response.json().map_err(|source| LoadError::NetworkError {
        url: url.to_string(),
        source,
    })
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load a schema from a file path or URL.
///
/// Automatically detects whether the source is a URL or file path.
/// URL loading requires the `remote` feature.
///
/// # Errors
///
/// Returns appropriate errors based on the source type.
pub fn load_schema_auto(source: &str) -> Result<Value, LoadError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_schema_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(LoadError::Unavailable {
                uri: source.to_string(),
            })
        }
    } else {
        load_schema(Path::new(source))
    }
}

/// Base URI for a schema source: the URL itself, or a `file://` URL for the
/// absolute form of a path. Returns `None` if no URI can be formed.
pub fn source_uri(source: &str) -> Option<Url> {
    if is_url(source) {
        return Url::parse(source).ok();
    }
    let path = Path::new(source);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };
    Url::from_file_path(absolute).ok()
}
