// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::cell::OnceCell;
use std::fs::File;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;

/// Source of raw map data, customary an HTTP client of an
/// [Overpass API](https://wiki.openstreetmap.org/wiki/Overpass_API) server.
pub trait GeodataTransport {
    /// Executes a textual (Overpass QL) query and returns its parsed JSON result,
    /// or `None` if the query failed or timed out.
    ///
    /// Retrying against mirror servers is the responsibility of the implementor.
    fn query(&self, query: &str, timeout: Option<Duration>) -> impl Future<Output = Option<Value>>;
}

/// Format of a map data dump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Unknown format - guess the format based on the file extension
    Unknown,

    /// Force uncompressed [Overpass JSON](https://wiki.openstreetmap.org/wiki/OSM_JSON)
    Json,

    /// Force [Overpass JSON](https://wiki.openstreetmap.org/wiki/OSM_JSON)
    /// with [gzip](https://en.wikipedia.org/wiki/Gzip) compression
    JsonGz,

    /// Force [Overpass JSON](https://wiki.openstreetmap.org/wiki/OSM_JSON)
    /// with [bzip2](https://en.wikipedia.org/wiki/Bzip2) compression
    JsonBz2,
}

impl FileFormat {
    fn detect(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("gz") => Self::JsonGz,
            Some("bz2") => Self::JsonBz2,
            _ => Self::Json,
        }
    }
}

/// Parses an Overpass JSON document from a reader, decompressing it as per the [FileFormat].
///
/// The provided stream will be automatically wrapped in a buffered reader.
pub fn read_json<R: io::Read>(reader: R, format: FileFormat) -> Result<Value, crate::Error> {
    let value = match format {
        FileFormat::Unknown | FileFormat::Json => {
            serde_json::from_reader(io::BufReader::new(reader))?
        }

        FileFormat::JsonGz => {
            let d = flate2::read::MultiGzDecoder::new(reader);
            serde_json::from_reader(io::BufReader::new(d))?
        }

        FileFormat::JsonBz2 => {
            let d = bzip2::read::MultiBzDecoder::new(reader);
            serde_json::from_reader(io::BufReader::new(d))?
        }
    };
    Ok(value)
}

/// [GeodataTransport] serving a map data dump from disk.
///
/// The query is not interpreted - every query returns the whole dump.
/// The file is read on the first query, and kept in memory afterwards.
#[derive(Debug)]
pub struct FileTransport {
    path: PathBuf,
    format: FileFormat,
    data: OnceCell<Option<Value>>,
}

impl FileTransport {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self::with_format(path, FileFormat::Unknown)
    }

    pub fn with_format<P: Into<PathBuf>>(path: P, format: FileFormat) -> Self {
        let path = path.into();
        let format = match format {
            FileFormat::Unknown => FileFormat::detect(&path),
            f => f,
        };

        Self {
            path,
            format,
            data: OnceCell::new(),
        }
    }

    fn load(&self) -> Result<Value, crate::Error> {
        let f = File::open(&self.path)?;
        read_json(f, self.format)
    }
}

impl GeodataTransport for FileTransport {
    async fn query(&self, query: &str, _: Option<Duration>) -> Option<Value> {
        log::debug!("answering query of {} bytes from {}", query.len(), self.path.display());

        self.data
            .get_or_init(|| match self.load() {
                Ok(value) => Some(value),
                Err(e) => {
                    log::error!("failed to read {}: {}", self.path.display(), e);
                    None
                }
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_lite::future::block_on;
    use std::io::Write;

    const FIXTURE: &[u8] = include_bytes!("../osm/test_fixtures/junction.json");

    fn element_count(v: &Value) -> usize {
        v["elements"].as_array().map_or(0, |a| a.len())
    }

    #[test]
    fn read_plain() {
        let v = read_json(FIXTURE, FileFormat::Json).unwrap();
        assert_eq!(element_count(&v), 21);
    }

    #[test]
    fn read_gz() {
        let mut e = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
        e.write_all(FIXTURE).unwrap();
        let compressed = e.finish().unwrap();

        let v = read_json(compressed.as_slice(), FileFormat::JsonGz).unwrap();
        assert_eq!(element_count(&v), 21);
    }

    #[test]
    fn read_bz2() {
        let mut e = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::fast());
        e.write_all(FIXTURE).unwrap();
        let compressed = e.finish().unwrap();

        let v = read_json(compressed.as_slice(), FileFormat::JsonBz2).unwrap();
        assert_eq!(element_count(&v), 21);
    }

    #[test]
    fn read_malformed() {
        assert!(read_json(&b"{\"elements\": ["[..], FileFormat::Json).is_err());
    }

    #[test]
    fn detect_format() {
        assert_eq!(FileFormat::detect(Path::new("a/b.json")), FileFormat::Json);
        assert_eq!(FileFormat::detect(Path::new("a/b.json.gz")), FileFormat::JsonGz);
        assert_eq!(FileFormat::detect(Path::new("a/b.json.bz2")), FileFormat::JsonBz2);
    }

    #[test]
    fn file_transport_missing_file() {
        let t = FileTransport::new("/nonexistent/freeride/dump.json");
        assert_eq!(block_on(t.query("", None)), None);
    }

    #[test]
    fn file_transport() {
        let t = FileTransport::new(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/src/osm/test_fixtures/junction.json"
        ));
        let v = block_on(t.query("[out:json];", None)).unwrap();
        assert_eq!(element_count(&v), 21);
    }
}
