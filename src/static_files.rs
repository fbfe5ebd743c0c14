use crate::server::response::ContentType;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// File served for a directory request, when present.
pub const INDEX_FILE: &str = "index.html";

#[derive(Debug, thiserror::Error)]
pub enum StaticError {
    #[error("file not found")]
    NotFound,
    /// Directory without an index file. Listings are never generated.
    #[error("Not allowed")]
    DirectoryListing,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Serves files below a base directory. Directory listings are refused.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    base_dir: PathBuf,
}

impl StaticFiles {
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self {
            base_dir: base.into(),
        }
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn map_path(&self, url_path: &str) -> Option<PathBuf> {
        let mut pb = self.base_dir.clone();
        for comp in Path::new(url_path.trim_start_matches('/')).components() {
            match comp {
                Component::Normal(s) => pb.push(s),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(pb)
    }

    /// Read the file for `url_path`.
    ///
    /// # Errors
    ///
    /// - [`StaticError::NotFound`] for missing files and paths escaping the
    ///   base directory
    /// - [`StaticError::DirectoryListing`] for directories without an index
    /// - [`StaticError::Io`] if the file can't be read
    pub fn load(&self, url_path: &str) -> Result<(Vec<u8>, ContentType), StaticError> {
        let mut path = self.map_path(url_path).ok_or(StaticError::NotFound)?;
        if path.is_dir() {
            path.push(INDEX_FILE);
            if !path.is_file() {
                return Err(StaticError::DirectoryListing);
            }
        }
        if !path.is_file() {
            return Err(StaticError::NotFound);
        }
        let content_type = path
            .extension()
            .and_then(|s| s.to_str())
            .map_or(ContentType::OctetStream, ContentType::from_extension);
        let bytes = fs::read(&path)?;
        Ok((bytes, content_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("hello.txt"), "Hello\n").unwrap();
        fs::create_dir(dir.path().join("empty")).unwrap();
        fs::create_dir(dir.path().join("site")).unwrap();
        fs::write(dir.path().join("site").join(INDEX_FILE), "<h1>Hi</h1>").unwrap();
        dir
    }

    #[test]
    fn test_map_path_prevents_traversal() {
        let sf = StaticFiles::new("/srv/static");
        assert!(sf.map_path("../Cargo.toml").is_none());
        assert!(sf.map_path("/a/../../etc/passwd").is_none());
        assert_eq!(
            sf.map_path("/css/./site.css"),
            Some(PathBuf::from("/srv/static/css/site.css"))
        );
    }

    #[test]
    fn test_load_plain_file() {
        let dir = fixture();
        let sf = StaticFiles::new(dir.path());
        let (bytes, ct) = sf.load("/hello.txt").unwrap();
        assert_eq!(ct, ContentType::PlainText);
        assert_eq!(bytes, b"Hello\n");
    }

    #[test]
    fn test_directory_listing_refused() {
        let dir = fixture();
        let sf = StaticFiles::new(dir.path());
        assert!(matches!(sf.load("/empty"), Err(StaticError::DirectoryListing)));
        assert!(matches!(sf.load("/"), Err(StaticError::DirectoryListing)));
    }

    #[test]
    fn test_directory_index_served() {
        let dir = fixture();
        let sf = StaticFiles::new(dir.path());
        let (bytes, ct) = sf.load("/site/").unwrap();
        assert_eq!(ct, ContentType::Html);
        assert_eq!(bytes, b"<h1>Hi</h1>");
    }

    #[test]
    fn test_missing_file() {
        let dir = fixture();
        let sf = StaticFiles::new(dir.path());
        assert!(matches!(sf.load("/nope.txt"), Err(StaticError::NotFound)));
    }
}
