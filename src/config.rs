//! Resolve command line arguments into a validated job configuration
//!
//! Defaults are applied once here and the resulting [`JobConfig`] is passed explicitly to
//! everything that renders scripts or builds job requests.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use log::{debug, info};

use crate::Args;

/// Everything needed to render scripts and build job requests for one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobConfig {
    pub function: String,
    /// Absolute search paths, in the order they were given
    pub paths: Vec<String>,
    pub cores: u32,
    pub walltime: Option<String>,
    pub flags: Option<String>,
    pub tmp_path: PathBuf,
    pub matlab: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidFunctionName(String),
    EmptySearchPath,
    NonUtf8Path(PathBuf),
    ZeroCores,
    InvalidWalltime(String),
    EmptyFlags,
    EmptyExecutable,
    TempDirectory { path: PathBuf, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ConfigError::*;
        match self {
            InvalidFunctionName(s) => write!(f, "'{}' is not a valid MATLAB function name", s),
            EmptySearchPath => write!(f, "--path contains an empty entry"),
            NonUtf8Path(p) => write!(f, "search path {} is not valid UTF-8", p.display()),
            ZeroCores => write!(f, "--cores must be at least 1"),
            InvalidWalltime(s) => write!(f, "walltime '{}' must look like [[DD:]HH:]MM:SS", s),
            EmptyFlags => write!(f, "--pbs_flags must not be empty"),
            EmptyExecutable => write!(f, "--matlab must not be empty"),
            TempDirectory { path, reason } => {
                write!(f, "can't use temp directory {}: {}", path.display(), reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl JobConfig {
    /// Validate arguments and resolve relative paths against `cwd`
    pub fn resolve(args: &Args, cwd: &Path) -> Result<JobConfig, ConfigError> {
        let function = validate_function(&args.function)?;

        let paths = match &args.path {
            Some(list) => split_paths(list, cwd)?,
            None => Vec::new(),
        };

        if args.cores == 0 {
            return Err(ConfigError::ZeroCores);
        }

        let walltime = match &args.walltime {
            Some(w) => Some(validate_walltime(w)?),
            None => None,
        };

        let flags = match &args.pbs_flags {
            Some(f) if f.trim().is_empty() => return Err(ConfigError::EmptyFlags),
            Some(f) => Some(f.trim().to_string()),
            None => None,
        };

        if args.matlab.trim().is_empty() {
            return Err(ConfigError::EmptyExecutable);
        }

        let tmp_path = temp_directory(args.tmp_path.as_deref(), cwd)?;
        info!("Writing temporary scripts to {}", tmp_path.display());

        let config = JobConfig {
            function,
            paths,
            cores: args.cores,
            walltime,
            flags,
            tmp_path,
            matlab: args.matlab.clone(),
        };
        debug!("Resolved configuration: {:?}", &config);
        Ok(config)
    }
}

/// MATLAB identifiers start with a letter and continue with letters, digits or underscores
fn validate_function(name: &str) -> Result<String, ConfigError> {
    let name = name.trim();
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            first.is_ascii_alphabetic() && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    match valid {
        true => Ok(name.to_string()),
        false => Err(ConfigError::InvalidFunctionName(name.to_string())),
    }
}

fn split_paths(list: &str, cwd: &Path) -> Result<Vec<String>, ConfigError> {
    list.split(',')
        .map(|p| {
            let p = p.trim();
            if p.is_empty() {
                return Err(ConfigError::EmptySearchPath);
            }
            let abs = absolute(cwd, Path::new(p));
            abs.to_str()
                .map(String::from)
                .ok_or_else(|| ConfigError::NonUtf8Path(abs.clone()))
        })
        .collect()
}

fn validate_walltime(walltime: &str) -> Result<String, ConfigError> {
    let w = walltime.trim();
    let fields: Vec<&str> = w.split(':').collect();
    let valid = !w.is_empty()
        && fields.len() <= 4
        && fields
            .iter()
            .all(|f| !f.is_empty() && f.chars().all(|c| c.is_ascii_digit()));

    match valid {
        true => Ok(w.to_string()),
        false => Err(ConfigError::InvalidWalltime(walltime.to_string())),
    }
}

fn temp_directory(tmp_path: Option<&Path>, cwd: &Path) -> Result<PathBuf, ConfigError> {
    let requested = match tmp_path {
        Some(p) => cwd.join(p),
        None => cwd.to_path_buf(),
    };

    let fail = |reason: String| ConfigError::TempDirectory { path: requested.clone(), reason };

    let path = requested
        .canonicalize()
        .map_err(|err| fail(err.to_string()))?;
    if !path.is_dir() {
        return Err(fail("not a directory".to_string()));
    }
    Ok(path)
}

/// Lexically make `path` absolute, like `os.path.abspath`: no symlinks are resolved and the
/// path doesn't have to exist
pub fn absolute(cwd: &Path, path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in cwd.join(path).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            c => out.push(c.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["matbatch"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).expect("valid arguments")
    }

    #[test]
    fn defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = JobConfig::resolve(&args(&["foo"]), dir.path()).unwrap();

        assert_eq!(config.function, "foo");
        assert!(config.paths.is_empty());
        assert_eq!(config.cores, 1);
        assert_eq!(config.walltime, None);
        assert_eq!(config.flags, None);
        assert_eq!(config.tmp_path, dir.path().canonicalize().unwrap());
        assert_eq!(config.matlab, "matlab");
    }

    #[test]
    fn paths_keep_order_and_become_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let config = JobConfig::resolve(&args(&["-p", "/x,lib,../up", "foo"]), Path::new("/work/sub"));
        // the default temp directory is the fake cwd, which doesn't exist
        assert!(matches!(config, Err(ConfigError::TempDirectory { .. })));

        let tmp = dir.path().to_str().unwrap();
        let config =
            JobConfig::resolve(&args(&["-p", "/x,lib,../up", "-t", tmp, "foo"]), Path::new("/work/sub"))
                .unwrap();
        assert_eq!(config.paths, vec!["/x", "/work/sub/lib", "/work/up"]);
    }

    #[test]
    fn empty_path_entries_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for list in ["", "a,,b", "a,"] {
            let result = JobConfig::resolve(&args(&["--path", list, "foo"]), dir.path());
            assert_eq!(result, Err(ConfigError::EmptySearchPath), "{:?}", list);
        }
    }

    #[test]
    fn resources_are_copied() {
        let dir = tempfile::tempdir().unwrap();
        let config = JobConfig::resolve(
            &args(&["--cores", "4", "--walltime", "2:00:00", "--pbs_flags", "-q long ", "foo"]),
            dir.path(),
        )
        .unwrap();

        assert_eq!(config.cores, 4);
        assert_eq!(config.walltime.as_deref(), Some("2:00:00"));
        assert_eq!(config.flags.as_deref(), Some("-q long"));
    }

    #[test]
    fn invalid_settings() {
        let dir = tempfile::tempdir().unwrap();
        let resolve = |extra: &[&str]| JobConfig::resolve(&args(extra), dir.path());

        assert_eq!(resolve(&["--cores", "0", "foo"]), Err(ConfigError::ZeroCores));
        assert_eq!(
            resolve(&["--walltime", "two hours", "foo"]),
            Err(ConfigError::InvalidWalltime("two hours".to_string()))
        );
        assert!(resolve(&["--walltime", "1:2:3:4:5", "foo"]).is_err());
        assert!(resolve(&["--walltime", "1::00", "foo"]).is_err());
        assert_eq!(resolve(&["--pbs_flags", " ", "foo"]), Err(ConfigError::EmptyFlags));
        assert_eq!(resolve(&["--matlab", "", "foo"]), Err(ConfigError::EmptyExecutable));
        assert_eq!(
            resolve(&["2fast"]),
            Err(ConfigError::InvalidFunctionName("2fast".to_string()))
        );
        assert!(resolve(&["my-func"]).is_err());
        assert!(resolve(&["run_sim2"]).is_ok());
    }

    #[test]
    fn temp_directory_must_be_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();

        let result = JobConfig::resolve(&args(&["-t", file.to_str().unwrap(), "foo"]), dir.path());
        assert!(matches!(result, Err(ConfigError::TempDirectory { .. })));

        let result = JobConfig::resolve(&args(&["-t", "missing", "foo"]), dir.path());
        assert!(matches!(result, Err(ConfigError::TempDirectory { .. })));
    }

    #[test]
    fn absolute_is_lexical() {
        let cwd = Path::new("/home/user");
        assert_eq!(absolute(cwd, Path::new("./a/../b")), PathBuf::from("/home/user/b"));
        assert_eq!(absolute(cwd, Path::new("/opt/./lib")), PathBuf::from("/opt/lib"));
        assert_eq!(absolute(cwd, Path::new("../../../..")), PathBuf::from("/"));
    }
}
