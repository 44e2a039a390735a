//! Destination validation for results folders.
//!
//! A store empties its destination before writing, so a destination must
//! stay inside the store root: absolute paths and `..` segments are refused.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathSecurityError {
    #[error("destination is empty")]
    Empty,
    #[error("path traversal detected in destination '{0}'")]
    PathTraversal(String),
    #[error("destination '{0}' must be relative to the results root")]
    Absolute(String),
}

/// Join `destination` onto `root` after checking it cannot escape `root`.
pub fn resolve_destination(root: &Path, destination: &str) -> Result<PathBuf, PathSecurityError> {
    let relative = Path::new(destination);
    if destination.trim().is_empty() {
        return Err(PathSecurityError::Empty);
    }
    let mut normal_segments = 0;
    for component in relative.components() {
        match component {
            Component::Normal(_) => normal_segments += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(PathSecurityError::PathTraversal(destination.to_string()))
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(PathSecurityError::Absolute(destination.to_string()))
            }
        }
    }
    if normal_segments == 0 {
        return Err(PathSecurityError::Empty);
    }
    Ok(root.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_destination_is_joined() {
        let path = resolve_destination(Path::new("/results"), "elec_s_6/market_model").unwrap();
        assert_eq!(path, PathBuf::from("/results/elec_s_6/market_model"));
    }

    #[test]
    fn traversal_is_refused() {
        assert!(matches!(
            resolve_destination(Path::new("/results"), "../etc"),
            Err(PathSecurityError::PathTraversal(_))
        ));
        assert!(matches!(
            resolve_destination(Path::new("/results"), "/tmp/x"),
            Err(PathSecurityError::Absolute(_))
        ));
        assert_eq!(
            resolve_destination(Path::new("/results"), "."),
            Err(PathSecurityError::Empty)
        );
    }
}
