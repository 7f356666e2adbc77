// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;

pub mod model;
pub mod pbf;
pub mod xml;

#[cfg(test)]
pub(crate) mod test_fixtures;

/// Error which can occur during OSM reading and parsing.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] Arc<io::Error>),

    #[error("xml: {0}")]
    Xml(quick_xml::Error),

    #[error("pbf: {0}")]
    Pbf(pbf::Error),

    #[error("unknown file format: data does not look like .osm/.osm.gz/.osm.bz2/.osm.pbf")]
    UnknownFileFormat,
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(Arc::new(e))
    }
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        match e {
            quick_xml::Error::Io(ioe) => Error::Io(ioe),
            _ => Error::Xml(e),
        }
    }
}

impl From<pbf::Error> for Error {
    fn from(e: pbf::Error) -> Self {
        match e {
            pbf::Error::Io(ioe) => Error::Io(ioe),
            _ => Error::Pbf(e),
        }
    }
}

/// Format of an input OSM file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Unknown format - guess the format based on the content
    Unknown,

    /// Force uncompressed [OSM XML](https://wiki.openstreetmap.org/wiki/OSM_XML)
    Xml,

    /// Force [OSM XML](https://wiki.openstreetmap.org/wiki/OSM_XML)
    /// with [gzip](https://en.wikipedia.org/wiki/Gzip) compression
    XmlGz,

    /// Force [OSM XML](https://wiki.openstreetmap.org/wiki/OSM_XML)
    /// with [bzip2](https://en.wikipedia.org/wiki/Bzip2) compression
    XmlBz2,

    /// Force [OSM PBF](https://wiki.openstreetmap.org/wiki/PBF_Format)
    Pbf,
}

impl FileFormat {
    /// Attempts to detect the file format based on the initial bytes of the file.
    /// At least 8 bytes should be provided.
    pub fn detect(b: &[u8]) -> FileFormat {
        if b.starts_with(b"<?xml") || b.starts_with(b"<osm") {
            FileFormat::Xml
        } else if b.starts_with(b"\x1F\x8B") {
            FileFormat::XmlGz // Gzip magic bytes
        } else if b.starts_with(b"BZh") {
            FileFormat::XmlBz2 // Bzip2 magic bytes
        } else if b.len() >= 8 && &b[4..8] == b"\x0A\x09OS" {
            // OSM PBF always starts with the first 4 bytes encoding the BlobHeader length - we ignore this,
            // rather, we check the first field of the first BlobHeader, which should be:
            // field 1, type string, "OSMHeader" (length 9). - ? ? ? ? 0x0A 0x09 O S M H e a d e r
            FileFormat::Pbf
        } else {
            FileFormat::Unknown
        }
    }
}

/// Trait alias for objects which can stream [osm features](model::Feature)
/// from an underlying source - alias for `IntoIterator<Item=Result<model::Feature, Error>>`.
pub trait FeatureReader: IntoIterator<Item = Result<model::Feature, Self::Error>> {
    type Error: std::error::Error;
}

impl<E: std::error::Error, I> FeatureReader for I
where
    I: IntoIterator<Item = Result<model::Feature, E>>,
{
    type Error = E;
}

/// Streaming iterator over [OSM features](model::Feature) of a file in any
/// supported [FileFormat], returned by [read_features].
pub enum Features<R: io::BufRead> {
    Xml(xml::XmlReader<R>),
    XmlGz(xml::XmlReader<io::BufReader<flate2::bufread::MultiGzDecoder<R>>>),
    XmlBz2(xml::XmlReader<io::BufReader<bzip2::bufread::MultiBzDecoder<R>>>),
    Pbf(pbf::PbfReader<R>),
}

impl<R: io::BufRead> Iterator for Features<R> {
    type Item = Result<model::Feature, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Features::Xml(inner) => inner.next().map(|r| r.map_err(Error::from)),
            Features::XmlGz(inner) => inner.next().map(|r| r.map_err(Error::from)),
            Features::XmlBz2(inner) => inner.next().map(|r| r.map_err(Error::from)),
            Features::Pbf(inner) => inner.next().map(|r| r.map_err(Error::from)),
        }
    }
}

/// Lazily parses OSM features from a reader. Records are decoded
/// one at a time, so memory usage stays bounded regardless of input size.
///
/// With [FileFormat::Unknown] the format is sniffed from the first bytes
/// of the stream, see [FileFormat::detect].
pub fn read_features<R: io::BufRead>(
    mut reader: R,
    format: FileFormat,
) -> Result<Features<R>, Error> {
    let format = if format == FileFormat::Unknown {
        FileFormat::detect(reader.fill_buf()?)
    } else {
        format
    };

    match format {
        FileFormat::Unknown => Err(Error::UnknownFileFormat),
        FileFormat::Xml => Ok(Features::Xml(xml::XmlReader::new(reader))),
        FileFormat::XmlGz => Ok(Features::XmlGz(xml::XmlReader::new(io::BufReader::new(
            flate2::bufread::MultiGzDecoder::new(reader),
        )))),
        FileFormat::XmlBz2 => Ok(Features::XmlBz2(xml::XmlReader::new(io::BufReader::new(
            bzip2::bufread::MultiBzDecoder::new(reader),
        )))),
        FileFormat::Pbf => Ok(Features::Pbf(pbf::PbfReader::new(reader))),
    }
}

/// Lazily parses OSM features from a file at the provided path.
pub fn read_features_from_file<P: AsRef<Path>>(
    path: P,
    format: FileFormat,
) -> Result<Features<io::BufReader<File>>, Error> {
    let f = File::open(path)?;
    read_features(io::BufReader::new(f), format)
}
