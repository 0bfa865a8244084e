//! Location of `config.redb`, `index.redb` and the default docs directory.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use crate::error::{Error, Result};

pub const DATA_DIR_ENV: &str = "CDPQA_DATA_DIR";

/// Which rule picked the data directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Flag,
    Env,
    Xdg,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Origin::Flag => "--data-dir",
            Origin::Env => DATA_DIR_ENV,
            Origin::Xdg => "XDG data home",
        })
    }
}

#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
    origin: Origin,
}

impl DataDir {
    /// `--data-dir`, then `CDPQA_DATA_DIR`, then `~/.local/share/cdpqa`.
    /// The directory is created when missing.
    pub fn resolve(flag: Option<&Path>) -> Result<Self> {
        Self::resolve_with(flag, std::env::var_os(DATA_DIR_ENV).map(PathBuf::from))
    }

    fn resolve_with(flag: Option<&Path>, env: Option<PathBuf>) -> Result<Self> {
        let (root, origin) = match (flag, env) {
            (Some(path), _) => (path.to_path_buf(), Origin::Flag),
            (None, Some(path)) if !path.as_os_str().is_empty() => {
                (path, Origin::Env)
            }
            _ => {
                let home = xdg::BaseDirectories::with_prefix("cdpqa")
                    .get_data_home()
                    .ok_or_else(|| {
                        Error::Config("no XDG data home for cdpqa".into())
                    })?;
                (home, Origin::Xdg)
            }
        };

        if !root.is_dir() {
            std::fs::create_dir_all(&root)
                .map_err(|_| Error::DataDir(root.clone()))?;
            tracing::debug!(path = %root.display(), "created data directory");
        }

        Ok(Self { root, origin })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn config_db(&self) -> PathBuf {
        self.root.join("config.redb")
    }

    pub fn index_db(&self) -> PathBuf {
        self.root.join("index.redb")
    }

    /// Where `rebuild` looks for `*_docs.json` files without `--docs`.
    pub fn docs_dir(&self) -> PathBuf {
        self.root.join("docs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_wins_over_env() {
        let flag = tempfile::tempdir().unwrap();
        let env = tempfile::tempdir().unwrap();
        let dir = DataDir::resolve_with(
            Some(flag.path()),
            Some(env.path().to_path_buf()),
        )
        .unwrap();

        assert_eq!(dir.root(), flag.path());
        assert_eq!(dir.origin(), Origin::Flag);
        assert_eq!(dir.index_db(), flag.path().join("index.redb"));
        assert_eq!(dir.config_db(), flag.path().join("config.redb"));
        assert_eq!(dir.docs_dir(), flag.path().join("docs"));
    }

    #[test]
    fn env_used_without_flag() {
        let env = tempfile::tempdir().unwrap();
        let dir =
            DataDir::resolve_with(None, Some(env.path().to_path_buf())).unwrap();
        assert_eq!(dir.root(), env.path());
        assert_eq!(dir.origin(), Origin::Env);
    }

    #[test]
    fn nested_directory_is_created() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        let dir = DataDir::resolve_with(Some(&nested), None).unwrap();
        assert!(dir.root().is_dir());
    }

    #[test]
    fn unusable_path_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("plain-file");
        std::fs::write(&file, "x").unwrap();

        let err = DataDir::resolve_with(Some(&file.join("sub")), None)
            .unwrap_err();
        assert!(matches!(err, Error::DataDir(_)));
    }
}
