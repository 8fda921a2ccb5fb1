use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use crate::beautify::{self, BeautifyOptions};

/// Separator between the source URL and the page body in a cache artifact.
pub const SEPARATOR: &str = "\n---\n";

/// Number of hex characters of the MD5 digest kept as the key.
pub const KEY_LEN: usize = 8;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Malformed cache artifact at {0}: missing separator")]
    MalformedArtifact(PathBuf),
}

pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub cache_dir: PathBuf,
    pub extension: String,
    pub beautify: Option<BeautifyOptions>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".urlCache/"),
            extension: "cache".to_string(),
            beautify: None,
        }
    }
}

impl CacheConfig {

    pub fn in_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self { cache_dir: cache_dir.into(), ..Self::default() }
    }

    pub fn with_beautify(mut self, options: BeautifyOptions) -> Self {
        self.beautify = Some(options);
        self
    }
}

/// One snapshot as laid out on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub source_url: String,
    pub body: String,
    pub path: PathBuf,
}

impl CacheEntry {

    pub fn parse(key: &str, path: &Path, content: &str) -> Result<Self> {

        let (source_url, body) = content
            .split_once(SEPARATOR)
            .ok_or_else(|| CacheError::MalformedArtifact(path.to_path_buf()))?;

        Ok(Self {
            key: key.to_string(),
            source_url: source_url.to_string(),
            body: body.to_string(),
            path: path.to_path_buf(),
        })
    }

    fn render(&self) -> String {
        format!("{}{}{}", self.source_url, SEPARATOR, self.body)
    }
}

/// First line of an artifact, if the second line is the `---` marker.
pub fn source_url_of(content: &str) -> Option<&str> {
    let mut lines = content.split('\n');
    let first = lines.next()?;
    match lines.next() {
        Some(marker) if marker.trim() == "---" => Some(first),
        _ => None,
    }
}

/// First eight lowercase hex characters of the MD5 digest of `url`.
pub fn cache_key(url: &str) -> String {
    let digest = format!("{:x}", md5::compute(url.as_bytes()));
    digest[..KEY_LEN].to_string()
}

pub struct SnapshotCache {
    config: CacheConfig,
}

impl SnapshotCache {

    pub fn new(config: CacheConfig) -> Self {
        Self { config }
    }

    pub fn key_for(&self, url: &str) -> String {
        cache_key(url)
    }

    pub fn path_for(&self, url: &str) -> PathBuf {
        let filename = format!("{}.{}", self.key_for(url), self.config.extension);
        self.config.cache_dir.join(filename)
    }

    /// Writes `html` for `url`, replacing whatever sat at the derived path.
    ///
    /// Two URLs sharing a key overwrite each other; the artifact reflects the
    /// last store. The write is not atomic.
    pub fn store(&self, url: &str, html: &str) -> Result<PathBuf> {

        fs::create_dir_all(&self.config.cache_dir)?;

        let body = match &self.config.beautify {
            Some(options) => beautify::beautify_with(html, options),
            None => html.to_string(),
        };

        let entry = CacheEntry {
            key: self.key_for(url),
            source_url: url.to_string(),
            body,
            path: self.path_for(url),
        };

        fs::write(&entry.path, entry.render())?;

        info!(url, key = %entry.key, path = %entry.path.display(), bytes = entry.body.len(), "stored snapshot");

        Ok(entry.path)
    }

    pub fn load(&self, url: &str) -> Result<CacheEntry> {

        let key = self.key_for(url);
        let path = self.path_for(url);
        let content = fs::read_to_string(&path)?;

        let entry = CacheEntry::parse(&key, &path, &content)?;
        if entry.source_url != url {
            debug!(requested = url, found = %entry.source_url, %key, "cache key collision");
        }

        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cache_in(dir: &TempDir) -> SnapshotCache {
        SnapshotCache::new(CacheConfig::in_dir(dir.path().join(".urlCache")))
    }

    #[test]
    fn test_key_is_stable() {
        assert_eq!(cache_key("https://example.com"), cache_key("https://example.com"));
        assert_ne!(cache_key("https://example.com"), cache_key("https://example.org"));
    }

    #[test]
    fn test_key_format() {
        for url in ["https://example.com", "", "http://ünïcödé.example/ä?q=1"] {
            let key = cache_key(url);
            assert_eq!(key.len(), 8);
            assert!(key.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        }
    }

    #[test]
    fn test_key_matches_md5_prefix() {
        // md5("") = d41d8cd98f00b204e9800998ecf8427e
        assert_eq!(cache_key(""), "d41d8cd9");
        let full = format!("{:x}", md5::compute("https://example.com"));
        assert_eq!(cache_key("https://example.com"), &full[..8]);
    }

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.cache_dir, PathBuf::from(".urlCache/"));
        assert_eq!(config.extension, "cache");
        assert!(config.beautify.is_none());
    }

    #[test]
    fn test_store_example_scenario() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        let path = cache.store("https://example.com", "<html>hi</html>").unwrap();

        let expected = dir
            .path()
            .join(".urlCache")
            .join(format!("{}.cache", cache_key("https://example.com")));
        assert_eq!(path, expected);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "https://example.com\n---\n<html>hi</html>"
        );
    }

    #[test]
    fn test_store_creates_missing_directories() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b").join("c");
        let cache = SnapshotCache::new(CacheConfig::in_dir(&nested));
        assert!(!nested.exists());

        let path = cache.store("https://example.com", "x").unwrap();
        assert!(nested.is_dir());

        // existing directory is fine too and yields the same artifact
        let again = cache.store("https://example.com", "x").unwrap();
        assert_eq!(path, again);
        assert_eq!(fs::read_to_string(&again).unwrap(), "https://example.com\n---\nx");
    }

    #[test]
    fn test_store_overwrites() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        cache.store("https://example.com", "<p>first version, long body</p>").unwrap();
        let path = cache.store("https://example.com", "<p>2</p>").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "https://example.com\n---\n<p>2</p>");
        assert!(!content.contains("first"));
    }

    #[test]
    fn test_round_trip_splits_on_first_separator() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        let html = "<pre>\n---\n</pre>";

        let path = cache.store("https://example.com/a", html).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let (url, body) = content.split_once(SEPARATOR).unwrap();
        assert_eq!(url, "https://example.com/a");
        assert_eq!(body, html);

        let entry = cache.load("https://example.com/a").unwrap();
        assert_eq!(entry.source_url, "https://example.com/a");
        assert_eq!(entry.body, html);
        assert_eq!(entry.key, cache_key("https://example.com/a"));
        assert_eq!(entry.path, path);
    }

    #[test]
    fn test_empty_body() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);

        let path = cache.store("https://example.com", "").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "https://example.com\n---\n");
        assert_eq!(cache.load("https://example.com").unwrap().body, "");
    }

    #[test]
    fn test_store_beautified() {
        let dir = TempDir::new().unwrap();
        let config = CacheConfig::in_dir(dir.path()).with_beautify(BeautifyOptions::default());
        let cache = SnapshotCache::new(config);

        let html = "<div>\n<script>\nf();\n</script>\n</div>";
        let path = cache.store("https://example.com", html).unwrap();

        let entry = cache.load("https://example.com").unwrap();
        assert_eq!(entry.path, path);
        assert_eq!(entry.body, "<div>\n    <script>\n        f( );\n    </script>\n</div>");
    }

    #[test]
    fn test_load_missing() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        assert!(matches!(cache.load("https://example.com"), Err(CacheError::IoError(_))));
    }

    #[test]
    fn test_load_malformed() {
        let dir = TempDir::new().unwrap();
        let cache = SnapshotCache::new(CacheConfig::in_dir(dir.path()));
        fs::write(cache.path_for("https://example.com"), "no separator here").unwrap();

        assert!(matches!(
            cache.load("https://example.com"),
            Err(CacheError::MalformedArtifact(_))
        ));
    }

    #[test]
    fn test_store_into_file_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let cache = SnapshotCache::new(CacheConfig::in_dir(&blocker));

        assert!(matches!(cache.store("https://example.com", "x"), Err(CacheError::IoError(_))));
    }

    #[test]
    fn test_source_url_of() {
        assert_eq!(source_url_of("https://a.b\n---\n<html>"), Some("https://a.b"));
        assert_eq!(source_url_of("https://a.b\n --- \nbody"), Some("https://a.b"));
        assert_eq!(source_url_of("https://a.b\nbody"), None);
        assert_eq!(source_url_of("only one line"), None);
    }
}
