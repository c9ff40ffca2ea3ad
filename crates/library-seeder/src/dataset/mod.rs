//! Book dataset loading.
//!
//! The dataset is a CSV with `Book-Title` and `Book-Author` columns somewhere
//! under a directory, either given locally or fetched through the dataset hub.

mod encoding;
pub mod hub;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};
use walkdir::WalkDir;

pub use encoding::{DecodingReader, TextEncoding};
pub use hub::DatasetHub;

pub const TITLE_COLUMN: &str = "Book-Title";
pub const AUTHOR_COLUMN: &str = "Book-Author";

/// Longest title sent to the service, in characters.
pub const MAX_TITLE_CHARS: usize = 240;
/// Longest author name sent to the service, in characters.
pub const MAX_AUTHOR_CHARS: usize = 150;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error(
        "--dataset-path does not exist or is not a directory: {}",
        .0.display()
    )]
    InvalidPath(PathBuf),
    #[error("Couldn't find Books.csv in {}", .0.display())]
    NotFound(PathBuf),
    #[error(
        "Couldn't resolve dataset directory. Provide --dataset-path (recommended) \
         or ensure the dataset hub can download '{dataset_id}'. Original error: {message}"
    )]
    Download { dataset_id: String, message: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Unknown dataset encoding: {0}")]
    UnknownEncoding(String),
}

/// One usable row of the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatasetBook {
    pub title: String,
    pub author: String,
}

/// Returns the dataset directory, preferring an explicit local path.
pub async fn resolve_dataset_dir(
    dataset_id: &str,
    dataset_path: Option<&Path>,
) -> Result<PathBuf, DatasetError> {
    match dataset_path {
        Some(path) => {
            let expanded = expand_home(path);
            match expanded.canonicalize() {
                Ok(dir) if dir.is_dir() => Ok(dir),
                _ => Err(DatasetError::InvalidPath(expanded)),
            }
        }
        None => DatasetHub::from_env().resolve(dataset_id).await,
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

/// Opens the dataset's book CSV and returns its usable rows.
///
/// The file is streamed as the iterator advances; iterate again by calling
/// again.
pub fn iter_books(
    dataset_dir: &Path,
    encoding: TextEncoding,
) -> Result<DatasetBooks, DatasetError> {
    let books_csv = find_books_csv(dataset_dir, encoding)?;
    info!("Using dataset file: {}", books_csv.display());

    let file = BufReader::new(File::open(&books_csv)?);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(DecodingReader::new(file, encoding));

    let headers = reader.headers()?.clone();
    let title_idx = headers.iter().position(|h| h.trim() == TITLE_COLUMN);
    let author_idx = headers.iter().position(|h| h.trim() == AUTHOR_COLUMN);
    if title_idx.is_none() || author_idx.is_none() {
        warn!(
            "{} lacks {} or {} columns, no books will be read",
            books_csv.display(),
            TITLE_COLUMN,
            AUTHOR_COLUMN
        );
    }

    Ok(DatasetBooks {
        records: reader.into_records(),
        title_idx,
        author_idx,
        remaining: None,
    })
}

/// Lazy sequence of normalized [`DatasetBook`]s.
///
/// Rows missing a title or an author are skipped, as are rows the CSV parser
/// rejects.
pub struct DatasetBooks {
    records: csv::StringRecordsIntoIter<DecodingReader<BufReader<File>>>,
    title_idx: Option<usize>,
    author_idx: Option<usize>,
    remaining: Option<usize>,
}

impl DatasetBooks {
    /// Stops after `limit` CSV rows, skipped rows included.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.remaining = limit;
        self
    }
}

impl Iterator for DatasetBooks {
    type Item = DatasetBook;

    fn next(&mut self) -> Option<DatasetBook> {
        loop {
            if let Some(remaining) = self.remaining.as_mut() {
                if *remaining == 0 {
                    return None;
                }
                *remaining -= 1;
            }

            let record = match self.records.next()? {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping malformed dataset row: {}", e);
                    continue;
                }
            };

            let field = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("").trim();
            let title = field(self.title_idx);
            let author = field(self.author_idx);
            if title.is_empty() || author.is_empty() {
                continue;
            }

            return Some(DatasetBook {
                title: normalize_title(title),
                author: normalize_name(author),
            });
        }
    }
}

/// Finds `Books.csv` under `dataset_dir`, falling back to any CSV whose
/// header names both book columns.
pub fn find_books_csv(dataset_dir: &Path, encoding: TextEncoding) -> Result<PathBuf, DatasetError> {
    let candidates: Vec<PathBuf> = WalkDir::new(dataset_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();

    if let Some(named) = candidates.iter().find(|path| is_books_csv(path)) {
        return Ok(named.clone());
    }

    for path in candidates {
        match read_header_line(&path, encoding) {
            Ok(header) if header.contains(TITLE_COLUMN) && header.contains(AUTHOR_COLUMN) => {
                return Ok(path);
            }
            _ => continue,
        }
    }

    Err(DatasetError::NotFound(dataset_dir.to_path_buf()))
}

fn is_books_csv(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.eq_ignore_ascii_case("books.csv"))
}

fn read_header_line(path: &Path, encoding: TextEncoding) -> std::io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut line = Vec::new();
    reader.read_until(b'\n', &mut line)?;
    Ok(encoding.decode(&line))
}

/// Collapses whitespace (non-breaking spaces included) and truncates.
pub fn normalize_name(name: &str) -> String {
    collapse_whitespace(name, MAX_AUTHOR_CHARS)
}

/// Like [`normalize_name`] with the longer title limit.
pub fn normalize_title(title: &str) -> String {
    collapse_whitespace(title, MAX_TITLE_CHARS)
}

fn collapse_whitespace(raw: &str, max_chars: usize) -> String {
    let joined = raw
        .replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    joined.chars().take(max_chars).collect()
}
