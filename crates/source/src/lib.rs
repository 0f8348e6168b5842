//! Image-source enumeration
//!
//! An ingestion or query source is given as a single string:
//!
//! - ending in `.csv`: a manifest. The header row is skipped and the second
//!   column of each row is an image path, yielded in row order.
//! - anything else: a glob pattern such as `./train/*/*.JPEG`. The literal
//!   directory prefix is walked and matching files are yielded in sorted
//!   order.
//!
//! `ImageSource::paths` opens a fresh lazy iterator on every call, so one
//! source can be enumerated any number of times.

#![warn(missing_docs)]
#![warn(clippy::all)]

use globset::{GlobBuilder, GlobMatcher};
use std::fs::File;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Result type for source enumeration
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Errors raised while enumerating a source
#[derive(Debug, Error)]
pub enum SourceError {
    /// Manifest or directory could not be read
    #[error("cannot read '{path}': {source}")]
    Io {
        /// Offending path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Manifest is not valid CSV
    #[error("manifest '{manifest}': {message}")]
    Csv {
        /// Manifest path
        manifest: PathBuf,
        /// Parser message
        message: String,
    },

    /// A manifest row has no path column
    #[error("manifest '{manifest}' row {row}: missing path column")]
    MissingColumn {
        /// Manifest path
        manifest: PathBuf,
        /// 1-based data row number (header excluded)
        row: usize,
    },

    /// Glob pattern does not compile
    #[error("invalid pattern '{pattern}': {message}")]
    Pattern {
        /// The pattern as given
        pattern: String,
        /// Compiler message
        message: String,
    },

    /// Directory walk failed part way
    #[error("walking '{root}': {message}")]
    Walk {
        /// Walk root
        root: PathBuf,
        /// What went wrong
        message: String,
    },
}

/// Manifest column holding the image path
const PATH_COLUMN: usize = 1;

/// Where image paths come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// CSV manifest, second column = path
    Manifest(PathBuf),
    /// Glob pattern over the filesystem
    Glob(String),
}

/// Lazy iterator over the paths of a source
pub type PathIter = Box<dyn Iterator<Item = SourceResult<PathBuf>> + Send>;

impl ImageSource {
    /// Classify a source string by its suffix
    pub fn from_spec(spec: &str) -> Self {
        if spec.ends_with(".csv") {
            ImageSource::Manifest(PathBuf::from(spec))
        } else {
            ImageSource::Glob(spec.to_string())
        }
    }

    /// Fresh lazy iterator over the source's paths
    ///
    /// Opening errors (unreadable manifest, bad pattern) are returned here;
    /// per-item errors are yielded by the iterator.
    pub fn paths(&self) -> SourceResult<PathIter> {
        match self {
            ImageSource::Manifest(path) => manifest_paths(path),
            ImageSource::Glob(pattern) => glob_paths(pattern),
        }
    }

    /// Collect every path, stopping at the first error
    pub fn collect_paths(&self) -> SourceResult<Vec<PathBuf>> {
        self.paths()?.collect()
    }
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageSource::Manifest(path) => write!(f, "manifest {}", path.display()),
            ImageSource::Glob(pattern) => write!(f, "glob {}", pattern),
        }
    }
}

fn manifest_paths(manifest: &Path) -> SourceResult<PathIter> {
    let file = File::open(manifest).map_err(|e| SourceError::Io {
        path: manifest.to_path_buf(),
        source: e,
    })?;
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let manifest = manifest.to_path_buf();
    tracing::debug!(target: "annlink::source", manifest = %manifest.display(), "Reading manifest");

    let iter = reader
        .into_records()
        .enumerate()
        .map(move |(idx, result)| {
            let row = idx + 1;
            let record = result.map_err(|e| SourceError::Csv {
                manifest: manifest.clone(),
                message: format!("row {}: {}", row, e),
            })?;
            match record.get(PATH_COLUMN).map(str::trim) {
                Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
                _ => Err(SourceError::MissingColumn {
                    manifest: manifest.clone(),
                    row,
                }),
            }
        });
    Ok(Box::new(iter))
}

fn is_glob_component(s: &str) -> bool {
    s.contains(['*', '?', '[', '{'])
}

/// Split a pattern into the literal directory to walk and the number of
/// components below it the pattern can reach (`None` = unbounded)
fn split_pattern(pattern: &str) -> (PathBuf, Option<usize>) {
    let mut root = PathBuf::new();
    let mut components = Path::new(pattern).components().peekable();

    while let Some(component) = components.peek() {
        let text = component.as_os_str().to_string_lossy();
        if is_glob_component(&text) {
            break;
        }
        root.push(component.as_os_str());
        components.next();
    }

    let rest: Vec<Component<'_>> = components.collect();
    let unbounded = rest.iter().any(|c| c.as_os_str() == "**");
    let depth = if unbounded { None } else { Some(rest.len()) };
    (root, depth)
}

fn glob_paths(pattern: &str) -> SourceResult<PathIter> {
    let matcher: GlobMatcher = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| SourceError::Pattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?
        .compile_matcher();

    let (root, depth) = split_pattern(pattern);
    let relative_to_cwd = root.as_os_str().is_empty();
    let walk_root = if relative_to_cwd {
        PathBuf::from(".")
    } else {
        root
    };

    // Like shell globbing, a pattern under a missing directory matches nothing
    if !walk_root.exists() {
        return Ok(Box::new(std::iter::empty()));
    }

    let mut walker = WalkDir::new(&walk_root)
        .follow_links(true)
        .sort_by_file_name();
    if let Some(depth) = depth {
        walker = walker.max_depth(depth);
    }

    tracing::debug!(
        target: "annlink::source",
        pattern,
        root = %walk_root.display(),
        "Walking for glob matches"
    );

    let iter = walker.into_iter().filter_map(move |entry| {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                return Some(Err(SourceError::Walk {
                    root: walk_root.clone(),
                    message: e.to_string(),
                }))
            }
        };
        if !entry.file_type().is_file() {
            return None;
        }
        let path = if relative_to_cwd {
            entry
                .path()
                .strip_prefix(".")
                .unwrap_or(entry.path())
                .to_path_buf()
        } else {
            entry.into_path()
        };
        matcher.is_match(&path).then_some(Ok(path))
    });
    Ok(Box::new(iter))
}
