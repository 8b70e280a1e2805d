use std::fmt;
use std::io;
use std::path::PathBuf;

use hdftree_format::FormatError;

/// Failure to open a file as an HDF5 container.
#[derive(Debug)]
pub enum OpenError {
    /// No file exists at the path.
    NotFound(PathBuf),
    /// The file exists but could not be read.
    Io { path: PathBuf, source: io::Error },
    /// The file was read but is not a supported HDF5 container.
    Format { path: PathBuf, source: FormatError },
}

impl OpenError {
    pub fn path(&self) -> &std::path::Path {
        match self {
            OpenError::NotFound(path)
            | OpenError::Io { path, .. }
            | OpenError::Format { path, .. } => path,
        }
    }
}

impl fmt::Display for OpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenError::NotFound(path) => write!(f, "file not found: {}", path.display()),
            OpenError::Io { path, source } => {
                write!(f, "cannot read {}: {source}", path.display())
            }
            OpenError::Format { path, source } => {
                write!(f, "{} is not a readable HDF5 file: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for OpenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OpenError::NotFound(_) => None,
            OpenError::Io { source, .. } => Some(source),
            OpenError::Format { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_path() {
        let err = OpenError::NotFound(PathBuf::from("/data/scan.h5"));
        assert_eq!(err.to_string(), "file not found: /data/scan.h5");
        assert_eq!(err.path(), std::path::Path::new("/data/scan.h5"));
    }

    #[test]
    fn format_error_is_source() {
        use std::error::Error;
        let err = OpenError::Format {
            path: PathBuf::from("x.h5"),
            source: FormatError::SignatureNotFound,
        };
        assert!(err.source().is_some());
    }
}
