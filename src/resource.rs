//! Resource loading seam
//!
//! The compiler never touches the filesystem itself; it asks a
//! [`ResourceLoader`] for bytes by location string and for relative
//! resolution of import targets.

use crate::error::ResourceError;
use std::path::{Path, PathBuf};
use url::Url;

#[cfg(feature = "logging")]
use tracing::trace;

/// Prefix that marks a multi-match search path
pub const ALL_MATCHES_PREFIX: &str = "classpath*:";

/// Prefix of file URLs
pub const FILE_URL_PREFIX: &str = "file:";

/// Raw content of one loaded document together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    location: String,
    bytes: Vec<u8>,
}

impl Resource {
    pub fn new(location: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            location: location.into(),
            bytes: bytes.into(),
        }
    }

    #[inline]
    pub fn location(&self) -> &str {
        &self.location
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The content as UTF-8 text
    pub fn text(&self) -> Result<&str, ResourceError> {
        std::str::from_utf8(&self.bytes).map_err(|e| ResourceError::Unreadable {
            location: self.location.clone(),
            reason: e.to_string(),
        })
    }
}

/// Loads document bytes by location string.
///
/// Implementations must be shareable across threads; the compiler itself only
/// calls them from the loading thread.
pub trait ResourceLoader: Send + Sync {
    /// Load the resource at `location`.
    fn load(&self, location: &str) -> Result<Resource, ResourceError>;

    /// Candidate location for `relative` as seen from the document at `base`.
    fn resolve_relative(&self, base: &str, relative: &str) -> String {
        clean_path(&apply_relative_path(base, relative))
    }

    /// Whether something loadable exists at `location`.
    fn exists(&self, location: &str) -> bool {
        self.load(location).is_ok()
    }
}

/// Whether an import target is absolute: a URL, a `classpath*:` pattern or an
/// absolute filesystem path.
pub fn is_absolute_location(location: &str) -> bool {
    if location.starts_with(ALL_MATCHES_PREFIX) {
        return true;
    }
    // a single-letter scheme is a drive letter, not a URL
    if let Ok(url) = Url::parse(location) {
        if url.scheme().len() > 1 {
            return true;
        }
    }
    Path::new(location).is_absolute() || location.starts_with('/')
}

/// Replace the last path segment of `path` with `relative`.
///
/// `apply_relative_path("conf/app.xml", "db.xml") == "conf/db.xml"`
pub fn apply_relative_path(path: &str, relative: &str) -> String {
    match path.rfind('/') {
        Some(separator) => {
            let mut joined = String::with_capacity(separator + relative.len() + 1);
            joined.push_str(&path[..separator]);
            if !relative.starts_with('/') {
                joined.push('/');
            }
            joined.push_str(relative);
            joined
        }
        None => relative.to_string(),
    }
}

/// Normalize a path by collapsing `.` and `..` segments.
///
/// A leading `scheme:` prefix and leading slashes are preserved; `..` that
/// climbs above the start is kept as is.
pub fn clean_path(path: &str) -> String {
    let normalized = path.replace('\\', "/");

    let (prefix, rest) = match normalized.find(':') {
        Some(colon) if !normalized[..colon].contains('/') => normalized.split_at(colon + 1),
        _ => ("", normalized.as_str()),
    };
    let body = rest.trim_start_matches('/');
    let root = &rest[..rest.len() - body.len()];

    let mut segments: Vec<&str> = Vec::new();
    for segment in body.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let mut cleaned = String::with_capacity(path.len());
    cleaned.push_str(prefix);
    cleaned.push_str(root);
    cleaned.push_str(&segments.join("/"));
    cleaned
}

/// Loads resources from the filesystem.
///
/// Plain locations are resolved against a root directory; a leading `/` is
/// stripped so `/conf/app.xml` and `conf/app.xml` name the same file. `file:`
/// URLs are used as absolute paths.
#[derive(Debug, Clone)]
pub struct FileSystemLoader {
    root: PathBuf,
}

impl FileSystemLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Loader rooted at the process working directory
    pub fn current_dir() -> Result<Self, ResourceError> {
        std::env::current_dir()
            .map(Self::new)
            .map_err(|e| ResourceError::Unreadable {
                location: ".".into(),
                reason: e.to_string(),
            })
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path a location string maps to
    pub fn path_for(&self, location: &str) -> Result<PathBuf, ResourceError> {
        if location.starts_with(FILE_URL_PREFIX) {
            let url = Url::parse(location).map_err(|e| ResourceError::Unreadable {
                location: location.to_string(),
                reason: e.to_string(),
            })?;
            return url.to_file_path().map_err(|()| ResourceError::Unreadable {
                location: location.to_string(),
                reason: "not a local file URL".into(),
            });
        }
        if location.starts_with(ALL_MATCHES_PREFIX) {
            return Err(ResourceError::Unreadable {
                location: location.to_string(),
                reason: "search patterns are not supported by the filesystem loader".into(),
            });
        }
        Ok(self.root.join(location.trim_start_matches('/')))
    }
}

impl ResourceLoader for FileSystemLoader {
    fn load(&self, location: &str) -> Result<Resource, ResourceError> {
        let path = self.path_for(location)?;

        #[cfg(feature = "logging")]
        trace!(
            target: "component_registry",
            location = location,
            path = %path.display(),
            "Loading resource from filesystem"
        );

        match std::fs::read(&path) {
            Ok(bytes) => Ok(Resource::new(location, bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ResourceError::NotFound {
                location: location.to_string(),
            }),
            Err(e) => Err(ResourceError::Unreadable {
                location: location.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn exists(&self, location: &str) -> bool {
        self.path_for(location).is_ok_and(|path| path.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_relative_path() {
        assert_eq!(apply_relative_path("conf/app.xml", "db.xml"), "conf/db.xml");
        assert_eq!(apply_relative_path("conf/app.xml", "/db.xml"), "conf/db.xml");
        assert_eq!(apply_relative_path("app.xml", "db.xml"), "db.xml");
        assert_eq!(
            apply_relative_path("file:/srv/conf/app.xml", "../shared/db.xml"),
            "file:/srv/conf/../shared/db.xml"
        );
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path("conf/./env/../db.xml"), "conf/db.xml");
        assert_eq!(clean_path("/srv/conf/../shared/db.xml"), "/srv/shared/db.xml");
        assert_eq!(clean_path("file:/srv/conf/../db.xml"), "file:/srv/db.xml");
        assert_eq!(clean_path("../up/x.xml"), "../up/x.xml");
        assert_eq!(clean_path("a\\b\\..\\c.xml"), "a/c.xml");
    }

    #[test]
    fn test_absolute_locations() {
        assert!(is_absolute_location("file:/srv/app.xml"));
        assert!(is_absolute_location("https://example.com/app.xml"));
        assert!(is_absolute_location("classpath*:conf/*.xml"));
        assert!(is_absolute_location("/srv/app.xml"));
        assert!(!is_absolute_location("app.xml"));
        assert!(!is_absolute_location("conf/../db.xml"));
    }

    #[test]
    fn test_filesystem_loader_reads_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("conf")).unwrap();
        std::fs::write(dir.path().join("conf/app.xml"), "<components/>").unwrap();

        let loader = FileSystemLoader::new(dir.path());
        let resource = loader.load("conf/app.xml").unwrap();
        assert_eq!(resource.text().unwrap(), "<components/>");
        assert_eq!(resource.location(), "conf/app.xml");

        assert!(loader.exists("/conf/app.xml"));
        assert!(!loader.exists("conf/missing.xml"));
        assert!(matches!(
            loader.load("conf/missing.xml"),
            Err(ResourceError::NotFound { .. })
        ));
    }

    #[test]
    fn test_filesystem_loader_file_urls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.xml");
        std::fs::write(&path, "db").unwrap();

        let url = Url::from_file_path(&path).unwrap().to_string();
        let loader = FileSystemLoader::new("/nonexistent-root");
        assert_eq!(loader.load(&url).unwrap().bytes(), b"db");
        assert!(loader.exists(&url));
    }

    #[test]
    fn test_filesystem_loader_resolves_siblings() {
        let loader = FileSystemLoader::new(".");
        assert_eq!(
            loader.resolve_relative("conf/app.xml", "../shared/db.xml"),
            "shared/db.xml"
        );
    }
}
