//! Directory-backed object store implementation.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::blob::{ObjectStore, StoredObject, public_url, validate_key};
use crate::error::{NearbyError, Result};

fn default_directory() -> PathBuf {
    PathBuf::from("media")
}

fn default_public_base_url() -> String {
    "/media".to_string()
}

/// Configuration specific to file-based object storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileObjectStoreConfig {
    /// Bucket directory, created on startup if missing.
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// Prefix of the public URLs handed out for stored objects.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Absolute `http(s)` URL other services fetch objects from, usually
    /// this server's `/media` route, e.g. `http://nearby.internal:8080/media`.
    /// Falls back to `public_base_url` when that is absolute. Without either,
    /// storage URIs are local `file://` paths.
    #[serde(default)]
    pub fetch_base_url: Option<String>,
}

impl FileObjectStoreConfig {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        FileObjectStoreConfig {
            directory: directory.as_ref().to_path_buf(),
            public_base_url: default_public_base_url(),
            fetch_base_url: None,
        }
    }

    /// Set the absolute URL objects are fetched from.
    pub fn with_fetch_base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.fetch_base_url = Some(url.into());
        self
    }

    /// The absolute base URL storage URIs are built on, if any.
    pub fn remote_base_url(&self) -> Option<&str> {
        self.fetch_base_url
            .as_deref()
            .or_else(|| Some(self.public_base_url.as_str()).filter(|base| is_http_url(base)))
    }
}

fn is_http_url(candidate: &str) -> bool {
    Url::parse(candidate).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

impl Default for FileObjectStoreConfig {
    fn default() -> Self {
        Self::new(default_directory())
    }
}

/// An object store that keeps one file per key in a single directory.
///
/// Writes land in a temp file that is renamed into place, so readers never
/// see a partial object. On unix every object is made world-readable.
#[derive(Debug)]
pub struct FileObjectStore {
    /// The bucket directory, absolute.
    directory: PathBuf,
    public_base_url: String,
    remote_base_url: Option<String>,
}

impl FileObjectStore {
    /// Open the bucket directory, creating it if needed.
    pub fn new(config: FileObjectStoreConfig) -> Result<Self> {
        if let Some(url) = config.fetch_base_url.as_deref().filter(|url| !is_http_url(url)) {
            return Err(NearbyError::config(format!(
                "fetch_base_url '{url}' is not an absolute http(s) URL"
            )));
        }
        let remote_base_url = config.remote_base_url().map(str::to_string);
        let directory = config.directory;

        if !directory.exists() {
            std::fs::create_dir_all(&directory).map_err(|e| {
                NearbyError::object_store(format!("Failed to create directory: {e}"))
            })?;
        }

        if !directory.is_dir() {
            return Err(NearbyError::object_store(format!(
                "Path is not a directory: {}",
                directory.display()
            )));
        }

        let directory = std::fs::canonicalize(&directory)?;

        Ok(FileObjectStore {
            directory,
            public_base_url: config.public_base_url,
            remote_base_url,
        })
    }

    /// The bucket directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Get the full path for a key.
    fn object_path(&self, key: &str) -> PathBuf {
        self.directory.join(key)
    }
}

#[async_trait]
impl ObjectStore for FileObjectStore {
    async fn put(&self, key: &str, bytes: Bytes) -> Result<StoredObject> {
        validate_key(key)?;

        let path = self.object_path(key);
        let temp = self
            .directory
            .join(format!(".{key}.{}.tmp", uuid::Uuid::new_v4().simple()));

        let written = async {
            tokio::fs::write(&temp, &bytes).await?;
            make_public(&temp).await?;
            tokio::fs::rename(&temp, &path).await
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(NearbyError::object_store(format!(
                "Failed to write object {key}: {e}"
            )));
        }

        Ok(StoredObject {
            key: key.to_string(),
            url: public_url(&self.public_base_url, key),
            uri: self.location_uri(key),
        })
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        validate_key(key)?;

        match tokio::fs::remove_file(self.object_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(NearbyError::object_store(format!(
                "Failed to delete object {key}: {e}"
            ))),
        }
    }

    fn location_uri(&self, key: &str) -> String {
        match &self.remote_base_url {
            Some(base) => public_url(base, key),
            None => format!("file://{}", self.object_path(key).display()),
        }
    }
}

#[cfg(unix)]
async fn make_public(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644)).await
}

#[cfg(not(unix))]
async fn make_public(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> FileObjectStore {
        FileObjectStore::new(FileObjectStoreConfig::new(dir.path().join("bucket"))).unwrap()
    }

    #[tokio::test]
    async fn test_put_writes_file() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let stored = store.put("abc", Bytes::from_static(b"jpeg")).await.unwrap();
        let path = store.directory().join("abc");
        assert_eq!(std::fs::read(&path).unwrap(), b"jpeg");
        assert_eq!(stored.url, "/media/abc");
        assert_eq!(stored.uri, format!("file://{}", path.display()));

        // no temp files left behind
        let entries = std::fs::read_dir(store.directory()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_objects_are_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.put("abc", Bytes::from_static(b"x")).await.unwrap();

        let mode = std::fs::metadata(store.directory().join("abc"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.put("abc", Bytes::from_static(b"x")).await.unwrap();

        assert!(store.delete("abc").await.unwrap());
        assert!(!store.delete("abc").await.unwrap());
        assert!(!store.directory().join("abc").exists());
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(store.put("../outside", Bytes::new()).await.is_err());
        assert!(store.put("", Bytes::new()).await.is_err());
        assert!(!dir.path().join("outside").exists());
    }

    #[test]
    fn test_rejects_file_as_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("plain");
        std::fs::write(&file, b"").unwrap();
        assert!(FileObjectStore::new(FileObjectStoreConfig::new(&file)).is_err());
    }

    #[tokio::test]
    async fn test_fetch_base_url_makes_http_uris() {
        let dir = TempDir::new().unwrap();
        let config = FileObjectStoreConfig::new(dir.path().join("bucket"))
            .with_fetch_base_url("http://nearby.internal:8080/media/");
        let store = FileObjectStore::new(config).unwrap();

        let stored = store.put("abc", Bytes::from_static(b"x")).await.unwrap();
        assert_eq!(stored.uri, "http://nearby.internal:8080/media/abc");
        assert_eq!(stored.url, "/media/abc");
        assert_eq!(store.location_uri("abc"), stored.uri);
    }

    #[test]
    fn test_absolute_public_url_doubles_as_fetch_url() {
        let mut config = FileObjectStoreConfig::new("media");
        assert_eq!(config.remote_base_url(), None);

        config.public_base_url = "https://cdn.example.com/m".to_string();
        assert_eq!(config.remote_base_url(), Some("https://cdn.example.com/m"));

        config.fetch_base_url = Some("http://10.0.0.5:8080/media".to_string());
        assert_eq!(config.remote_base_url(), Some("http://10.0.0.5:8080/media"));
    }

    #[test]
    fn test_relative_fetch_base_url_is_rejected() {
        let dir = TempDir::new().unwrap();
        for url in ["/media", "file:///srv/media", "not a url"] {
            let config = FileObjectStoreConfig::new(dir.path()).with_fetch_base_url(url);
            let err = FileObjectStore::new(config).unwrap_err();
            assert!(matches!(err, NearbyError::Config(_)), "{url}");
        }
    }
}
