// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

mod fileformat;
mod osmformat;

use std::collections::HashMap;
use std::io;
use std::io::Read;
use std::sync::Arc;

use prost::Message;

use super::model::{Feature, FeatureType, Node, Relation, RelationMember, Way};
use crate::Position;

/// Max permitted size for a serialized [blob header](https://wiki.openstreetmap.org/wiki/PBF_Format#File_format) -
/// 64 KiB.
const MAX_BLOB_HEADER_SIZE: u32 = 64 * 1024;

/// Max permitted size for a serialized & decompressed [blob](https://wiki.openstreetmap.org/wiki/PBF_Format#File_format) -
/// 32 MiB.
const MAX_BLOB_SIZE: u32 = 32 * 1024 * 1024;

/// Error which can occur when reading a PBF file.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("protobuf: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("io: {0}")]
    Io(#[from] Arc<io::Error>),

    #[error("unexpected end of file inside a {0}")]
    Truncated(&'static str),

    #[error("OSMHeader blob missing - is the file empty?")]
    MissingHeader,

    #[error("OSMData blob before the OSMHeader blob")]
    DataBeforeHeader,

    #[error("BlobHeader too large: {0} > {MAX_BLOB_HEADER_SIZE}")]
    BlobHeaderTooLarge(u32),

    #[error("Blob too large: {0} > {MAX_BLOB_SIZE}")]
    BlobTooLarge(u32),

    #[error("BlobHeader.datasize is negative")]
    NegativeBlobSize,

    #[error("Blob has no data")]
    NoBlobData,

    #[error("Blob.raw_size mismatch: expected {expected}, got {got}")]
    RawSizeMismatch { expected: i32, got: usize },

    #[error("unsupported compression: {0} (supported: raw, zlib and bzip2)")]
    UnsupportedCompression(&'static str),

    #[error("file requires unsupported features: {0:?}")]
    UnsupportedFeatures(Vec<String>),
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(Arc::new(e))
    }
}

/// PbfReader streams OSM [Features](Feature) from an
/// [OSM PBF](https://wiki.openstreetmap.org/wiki/PBF_Format) file.
///
/// The file is processed one blob at a time, so memory usage stays bounded
/// regardless of the input size.
pub struct PbfReader<R: io::Read> {
    blocks: FileBlocks<R>,
    current: std::vec::IntoIter<Feature>,
}

impl<R: io::Read> PbfReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            blocks: FileBlocks {
                reader,
                read_header: false,
                done: false,
            },
            current: Vec::new().into_iter(),
        }
    }
}

impl<R: io::Read> Iterator for PbfReader<R> {
    type Item = Result<Feature, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(f) = self.current.next() {
                return Some(Ok(f));
            }

            match self.blocks.next()? {
                Ok(block) => self.current = block.into_features(),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Iterator over [PrimitiveBlocks](Block) of an OSM PBF file:
/// a sequence of 4-byte big-endian length prefixes, [fileformat::BlobHeader]
/// messages and [fileformat::Blob] messages of exactly
/// `BlobHeader.datasize` bytes.
///
/// The first blob must be an `OSMHeader` advertising only supported
/// required features; `OSMData` blobs yield blocks, and blobs of any
/// other type are skipped with a warning.
struct FileBlocks<R: io::Read> {
    reader: R,
    read_header: bool,
    done: bool,
}

impl<R: io::Read> Iterator for FileBlocks<R> {
    type Item = Result<Block, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = self.read_next_block().transpose();
        if !matches!(result, Some(Ok(_))) {
            self.done = true;
        }
        result
    }
}

impl<R: io::Read> FileBlocks<R> {
    fn read_next_block(&mut self) -> Result<Option<Block>, Error> {
        loop {
            let blob_header_size = match self.read_blob_header_size()? {
                Some(size) => size,
                None if self.read_header => return Ok(None),
                None => return Err(Error::MissingHeader),
            };

            let blob_header = self.read_blob_header(blob_header_size)?;
            match blob_header.r#type.as_str() {
                "OSMHeader" => {
                    let data = self.read_blob(blob_header.datasize)?;
                    if self.read_header {
                        log::warn!(target: "osmroute.osm", "extra OSMHeader blob - ignoring");
                        continue;
                    }
                    Self::check_header(&osmformat::HeaderBlock::decode(data.as_slice())?)?;
                    self.read_header = true;
                }

                "OSMData" => {
                    if !self.read_header {
                        return Err(Error::DataBeforeHeader);
                    }
                    let data = self.read_blob(blob_header.datasize)?;
                    let block = osmformat::PrimitiveBlock::decode(data.as_slice())?;
                    return Ok(Some(Block(block)));
                }

                other => {
                    log::warn!(target: "osmroute.osm", "unknown blob type {:?} - skipping", other);
                    self.skip_blob(blob_header.datasize)?;
                }
            }
        }
    }

    /// Verifies that all `required_features` of the file are supported.
    fn check_header(header: &osmformat::HeaderBlock) -> Result<(), Error> {
        let unknown: Vec<String> = header
            .required_features
            .iter()
            .filter(|feature| !matches!(feature.as_str(), "OsmSchema-V0.6" | "DenseNodes"))
            .cloned()
            .collect();

        if unknown.is_empty() {
            Ok(())
        } else {
            Err(Error::UnsupportedFeatures(unknown))
        }
    }

    /// Reads the next 4-byte big-endian [fileformat::BlobHeader] size.
    ///
    /// Returns `Ok(None)` on a clean EOF (no more blobs).
    fn read_blob_header_size(&mut self) -> Result<Option<u32>, Error> {
        let mut buf = [0u8; 4];
        match self.reader.read_exact(&mut buf) {
            Ok(_) => Ok(Some(u32::from_be_bytes(buf))),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Reads the next [fileformat::BlobHeader] of a given size.
    fn read_blob_header(&mut self, size: u32) -> Result<fileformat::BlobHeader, Error> {
        if size > MAX_BLOB_HEADER_SIZE {
            return Err(Error::BlobHeaderTooLarge(size));
        }

        let mut buf = vec![0u8; size as usize];
        self.reader
            .read_exact(&mut buf)
            .map_err(|e| truncated(e, "BlobHeader"))?;
        Ok(fileformat::BlobHeader::decode(buf.as_slice())?)
    }

    /// Reads the next [fileformat::Blob] and returns its decompressed contents.
    fn read_blob(&mut self, size: i32) -> Result<Vec<u8>, Error> {
        let mut buf = vec![0u8; Self::checked_blob_size(size)?];
        self.reader
            .read_exact(&mut buf)
            .map_err(|e| truncated(e, "Blob"))?;

        let blob = fileformat::Blob::decode(buf.as_slice())?;

        if let Some(raw_size) = blob.raw_size {
            if raw_size < 0 {
                return Err(Error::NegativeBlobSize);
            } else if raw_size as u32 > MAX_BLOB_SIZE {
                return Err(Error::BlobTooLarge(raw_size as u32));
            }
        }

        let decompressed = match blob.data.ok_or(Error::NoBlobData)? {
            fileformat::blob::Data::Raw(data) => data,

            fileformat::blob::Data::ZlibData(data) => {
                let mut d = flate2::read::ZlibDecoder::new(data.as_slice());
                let mut decompressed = Vec::with_capacity(blob.raw_size.unwrap_or(0) as usize);
                d.read_to_end(&mut decompressed)?;
                decompressed
            }

            fileformat::blob::Data::ObsoleteBzip2Data(data) => {
                let mut d = bzip2::read::BzDecoder::new(data.as_slice());
                let mut decompressed = Vec::with_capacity(blob.raw_size.unwrap_or(0) as usize);
                d.read_to_end(&mut decompressed)?;
                decompressed
            }

            fileformat::blob::Data::LzmaData(_) => {
                return Err(Error::UnsupportedCompression("lzma"))
            }
            fileformat::blob::Data::Lz4Data(_) => return Err(Error::UnsupportedCompression("lz4")),
            fileformat::blob::Data::ZstdData(_) => {
                return Err(Error::UnsupportedCompression("zstd"))
            }
        };

        match blob.raw_size {
            Some(expected) if expected as usize != decompressed.len() => {
                Err(Error::RawSizeMismatch {
                    expected,
                    got: decompressed.len(),
                })
            }
            _ => Ok(decompressed),
        }
    }

    /// Consumes and discards a [fileformat::Blob] of a given size.
    fn skip_blob(&mut self, size: i32) -> Result<(), Error> {
        let size = Self::checked_blob_size(size)? as u64;
        let copied = io::copy(&mut self.reader.by_ref().take(size), &mut io::sink())?;
        if copied != size {
            return Err(Error::Truncated("Blob"));
        }
        Ok(())
    }

    fn checked_blob_size(size: i32) -> Result<usize, Error> {
        if size < 0 {
            Err(Error::NegativeBlobSize)
        } else if size as u32 > MAX_BLOB_SIZE {
            Err(Error::BlobTooLarge(size as u32))
        } else {
            Ok(size as usize)
        }
    }
}

fn truncated(e: io::Error, what: &'static str) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::Truncated(what)
    } else {
        e.into()
    }
}

/// Block abstracts away an [osmformat::PrimitiveBlock] into a friendly interface.
struct Block(osmformat::PrimitiveBlock);

impl Block {
    /// Decodes all [Features](Feature) from all groups in this block,
    /// applying string table indirection, the block's coordinate granularity
    /// and offsets, and delta decoding.
    fn into_features(self) -> std::vec::IntoIter<Feature> {
        let converter = CoordinateConverter {
            lat_offset: self.0.lat_offset(),
            lon_offset: self.0.lon_offset(),
            granularity: i64::from(self.0.granularity()),
        };
        let string_table = self.build_string_table();

        let mut features = Vec::new();
        for group in self.0.primitivegroup {
            collect_nodes(&mut features, group.nodes, converter, &string_table);
            if let Some(dense) = group.dense {
                collect_dense_nodes(&mut features, dense, converter, &string_table);
            }
            collect_ways(&mut features, group.ways, &string_table);
            collect_relations(&mut features, group.relations, &string_table);
        }
        features.into_iter()
    }

    /// Converts the [osmformat::StringTable] into a simpler `Vec<String>`.
    fn build_string_table(&self) -> Vec<String> {
        self.0
            .stringtable
            .s
            .iter()
            .map(|bytes| String::from_utf8_lossy(bytes).to_string())
            .collect()
    }
}

/// Converts latitudes and longitudes from OSM PBF representation
/// to standard `f64` degrees.
#[derive(Clone, Copy)]
struct CoordinateConverter {
    lat_offset: i64,
    lon_offset: i64,
    granularity: i64,
}

impl CoordinateConverter {
    fn position(&self, raw_lat: i64, raw_lon: i64) -> Position {
        Position::new(
            1e-9 * (self.lat_offset + self.granularity * raw_lat) as f64,
            1e-9 * (self.lon_offset + self.granularity * raw_lon) as f64,
        )
    }
}

fn collect_nodes(
    out: &mut Vec<Feature>,
    raw_nodes: Vec<osmformat::Node>,
    converter: CoordinateConverter,
    string_table: &[String],
) {
    out.extend(raw_nodes.into_iter().map(|node| {
        Feature::Node(Node {
            id: node.id,
            position: converter.position(node.lat, node.lon),
            tags: collect_tags(&node.keys, &node.vals, string_table),
        })
    }));
}

fn collect_dense_nodes(
    out: &mut Vec<Feature>,
    dense: osmformat::DenseNodes,
    converter: CoordinateConverter,
    string_table: &[String],
) {
    let count = dense.id.len();
    if dense.lat.len() != count || dense.lon.len() != count {
        log::warn!(target: "osmroute.osm", "DenseNodes with unbalanced id/lat/lon arrays - skipping");
        return;
    }

    let mut tags_per_node = parse_dense_tags(&dense.keys_vals, string_table);

    let mut id: i64 = 0;
    let mut lat: i64 = 0;
    let mut lon: i64 = 0;
    for i in 0..count {
        id += dense.id[i];
        lat += dense.lat[i];
        lon += dense.lon[i];
        out.push(Feature::Node(Node {
            id,
            position: converter.position(lat, lon),
            tags: tags_per_node.get_mut(i).map(std::mem::take).unwrap_or_default(),
        }));
    }
}

/// Splits the flat `(key_sid, val_sid, ..., 0, ...)` stream into per-node
/// tag mappings. Each `0` terminates one node's tag list; an empty stream
/// means no tags on any node of the group.
fn parse_dense_tags(keys_vals: &[i32], string_table: &[String]) -> Vec<HashMap<String, String>> {
    let mut all = Vec::new();
    let mut current = HashMap::new();

    let mut i = 0;
    while i < keys_vals.len() {
        if keys_vals[i] == 0 {
            all.push(std::mem::take(&mut current));
            i += 1;
        } else if i + 1 < keys_vals.len() {
            current.insert(
                get_string(string_table, keys_vals[i] as u32),
                get_string(string_table, keys_vals[i + 1] as u32),
            );
            i += 2;
        } else {
            log::warn!(target: "osmroute.osm", "DenseNodes.keys_vals with a dangling key - ignoring it");
            break;
        }
    }

    all
}

fn collect_ways(out: &mut Vec<Feature>, raw_ways: Vec<osmformat::Way>, string_table: &[String]) {
    out.extend(raw_ways.into_iter().map(|way| {
        Feature::Way(Way {
            id: way.id,
            nodes: decode_deltas(&way.refs),
            tags: collect_tags(&way.keys, &way.vals, string_table),
        })
    }));
}

fn collect_relations(
    out: &mut Vec<Feature>,
    raw_relations: Vec<osmformat::Relation>,
    string_table: &[String],
) {
    out.extend(raw_relations.into_iter().map(|relation| {
        Feature::Relation(Relation {
            id: relation.id,
            members: collect_relation_members(
                &relation.memids,
                &relation.roles_sid,
                &relation.types,
                string_table,
            ),
            tags: collect_tags(&relation.keys, &relation.vals, string_table),
        })
    }));
}

fn collect_relation_members(
    member_id_deltas: &[i64],
    roles: &[i32],
    types: &[i32],
    string_table: &[String],
) -> Vec<RelationMember> {
    decode_deltas(member_id_deltas)
        .into_iter()
        .zip(roles.iter().zip(types.iter()))
        .filter_map(|(ref_, (&role_idx, &type_))| {
            let type_ = match osmformat::relation::MemberType::try_from(type_) {
                Ok(osmformat::relation::MemberType::Node) => FeatureType::Node,
                Ok(osmformat::relation::MemberType::Way) => FeatureType::Way,
                Ok(osmformat::relation::MemberType::Relation) => FeatureType::Relation,
                Err(_) => {
                    log::warn!(target: "osmroute.osm", "relation member of unknown type {} - skipping", type_);
                    return None;
                }
            };
            Some(RelationMember {
                type_,
                ref_,
                role: get_string(string_table, role_idx as u32),
            })
        })
        .collect()
}

fn collect_tags(keys: &[u32], values: &[u32], string_table: &[String]) -> HashMap<String, String> {
    keys.iter()
        .zip(values.iter())
        .map(|(&key_idx, &value_idx)| {
            (
                get_string(string_table, key_idx),
                get_string(string_table, value_idx),
            )
        })
        .collect()
}

fn decode_deltas(deltas: &[i64]) -> Vec<i64> {
    deltas
        .iter()
        .scan(0, |acc, &delta| {
            *acc += delta;
            Some(*acc)
        })
        .collect()
}

#[inline]
fn get_string(table: &[String], idx: u32) -> String {
    table.get(idx as usize).cloned().unwrap_or_default()
}
