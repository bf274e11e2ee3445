// src/services/proxy.rs

use std::{collections::HashSet, path::PathBuf};

use crate::error::AppError;

/// Serves static files from one directory, restricted to an exact-name allowlist.
#[derive(Debug, Clone)]
pub struct FileProxy {
    dir: PathBuf,
    allowlist: HashSet<String>,
}

impl FileProxy {
    pub fn new(dir: impl Into<PathBuf>, allowlist: impl IntoIterator<Item = String>) -> Self {
        Self {
            dir: dir.into(),
            allowlist: allowlist.into_iter().collect(),
        }
    }

    /// Path of an allowlisted file. Any other name is `Forbidden`, so nothing
    /// outside `dir` is reachable.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, AppError> {
        if !self.allowlist.contains(name) {
            tracing::warn!(file = name, "proxy request for non-allowlisted file");
            return Err(AppError::Forbidden);
        }
        Ok(self.dir.join(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_allowlisted_names_resolve() {
        let proxy = FileProxy::new("/srv/proxy", ["feed.json".to_string()]);
        assert_eq!(
            proxy.resolve("feed.json").unwrap(),
            PathBuf::from("/srv/proxy/feed.json")
        );
        assert_eq!(proxy.resolve("../etc/passwd").unwrap_err(), AppError::Forbidden);
        assert_eq!(proxy.resolve("FEED.json").unwrap_err(), AppError::Forbidden);
    }
}
