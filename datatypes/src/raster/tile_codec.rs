//! Self-delimiting binary records of tiles.
//!
//! A tile record is laid out little-endian as
//! `u16 tag_len | tag (utf-8) | u32 cols | u32 rows | cells`,
//! so the size of a record can be computed from its header alone.
//! Multiband records prefix the band records with a `u16` band count, tile feature records
//! append a `u32` length-prefixed metadata blob to the tile record.

use super::{CellType, MetadataCodec, MultibandTile, Tile, TileFeature};
use crate::error::{self, Error};
use crate::util::Result;
use snafu::ensure;
use tracing::debug;

const TAG_LEN_WIDTH: usize = 2;
const DIMENSION_WIDTH: usize = 4;

/// Encodes a tile into a new buffer
pub fn encode_tile(tile: &Tile) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(TAG_LEN_WIDTH + 2 * DIMENSION_WIDTH + tile.cells().len());
    encode_tile_into(tile, &mut buffer);
    buffer
}

/// Appends the record of `tile` to `buffer`
#[allow(clippy::cast_possible_truncation)]
pub fn encode_tile_into(tile: &Tile, buffer: &mut Vec<u8>) {
    let tag = tile.cell_type().to_string();

    // tags are short and tiles are at most `u32::MAX` cells wide and high
    buffer.extend_from_slice(&(tag.len() as u16).to_le_bytes());
    buffer.extend_from_slice(tag.as_bytes());
    buffer.extend_from_slice(&(tile.cols() as u32).to_le_bytes());
    buffer.extend_from_slice(&(tile.rows() as u32).to_le_bytes());
    buffer.extend_from_slice(tile.cells());
}

/// The number of bytes the tile record at the start of `buffer` occupies.
///
/// Only the header is inspected, the cells do not need to be present.
///
/// # Errors
///
/// Fails with `CorruptTileEncoding` if the header is truncated or malformed.
///
pub fn encoded_tile_len(buffer: &[u8]) -> Result<usize> {
    let mut reader = RecordReader::new(buffer);
    let header = reader.read_header()?;
    Ok(reader.position + header.cells_len)
}

/// Decodes the tile record at the start of `buffer` and returns it with the number of consumed bytes.
///
/// # Errors
///
/// Fails with `CorruptTileEncoding` if the record is malformed or truncated.
///
pub fn decode_tile_prefix(buffer: &[u8]) -> Result<(Tile, usize)> {
    let mut reader = RecordReader::new(buffer);
    let tile = reader.read_tile()?;
    Ok((tile, reader.position))
}

/// Decodes a buffer holding exactly one tile record.
///
/// # Errors
///
/// Fails with `CorruptTileEncoding` if the record is malformed, truncated or followed by trailing bytes.
///
pub fn decode_tile(buffer: &[u8]) -> Result<Tile> {
    let mut reader = RecordReader::new(buffer);
    let tile = reader.read_tile()?;
    reader.finish()?;
    Ok(tile)
}

#[allow(clippy::cast_possible_truncation)]
pub fn encode_multiband_tile(tile: &MultibandTile) -> Vec<u8> {
    let mut buffer = Vec::new();

    // the band count is bounded by `MultibandTile::new`
    buffer.extend_from_slice(&(tile.band_count() as u16).to_le_bytes());
    for band in tile.bands() {
        encode_tile_into(band, &mut buffer);
    }

    buffer
}

/// Decodes a buffer holding exactly one multiband tile record.
///
/// # Errors
///
/// Fails with `CorruptTileEncoding` if the record is malformed or describes an invalid multiband tile.
///
pub fn decode_multiband_tile(buffer: &[u8]) -> Result<MultibandTile> {
    let mut reader = RecordReader::new(buffer);

    let band_count = reader.read_u16()?;
    let mut bands = Vec::with_capacity(band_count.into());
    for _ in 0..band_count {
        bands.push(reader.read_tile()?);
    }
    reader.finish()?;

    MultibandTile::new(bands).map_err(|source| corrupt(source.to_string()))
}

/// Encodes a tile feature, using the metadata's own codec for the metadata part.
///
/// # Errors
///
/// Fails if the metadata cannot be encoded or if it exceeds `u32::MAX` bytes.
///
pub fn encode_tile_feature<M: MetadataCodec>(feature: &TileFeature<M>) -> Result<Vec<u8>> {
    let metadata = feature.metadata.encode_metadata()?;
    let metadata_len = u32::try_from(metadata.len())
        .map_err(|_| corrupt(format!("metadata of {} bytes is too large", metadata.len())))?;

    let mut buffer = encode_tile(&feature.tile);
    buffer.extend_from_slice(&metadata_len.to_le_bytes());
    buffer.extend_from_slice(&metadata);

    Ok(buffer)
}

/// Decodes a buffer holding exactly one tile feature record.
///
/// # Errors
///
/// Fails if the record is malformed or if the metadata codec rejects the metadata bytes.
///
pub fn decode_tile_feature<M: MetadataCodec>(buffer: &[u8]) -> Result<TileFeature<M>> {
    let mut reader = RecordReader::new(buffer);

    let tile = reader.read_tile()?;
    let metadata_len = reader.read_u32()? as usize;
    let metadata = reader.take(metadata_len)?;
    reader.finish()?;

    Ok(TileFeature::new(tile, M::decode_metadata(metadata)?))
}

fn corrupt(reason: String) -> Error {
    debug!(%reason, "rejecting corrupt tile record");
    Error::CorruptTileEncoding { reason }
}

struct TileHeader {
    cell_type: CellType,
    cols: usize,
    rows: usize,
    cells_len: usize,
}

/// Cursor over a record buffer
struct RecordReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> RecordReader<'a> {
    fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .position
            .checked_add(len)
            .filter(|end| *end <= self.buffer.len())
            .ok_or_else(|| {
                corrupt(format!(
                    "expected {len} bytes at offset {}, but the record has {} bytes",
                    self.position,
                    self.buffer.len()
                ))
            })?;

        let bytes = &self.buffer[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    fn read_u16(&mut self) -> Result<u16> {
        let mut bytes = [0; 2];
        bytes.copy_from_slice(self.take(2)?);
        Ok(u16::from_le_bytes(bytes))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut bytes = [0; 4];
        bytes.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(bytes))
    }

    fn read_header(&mut self) -> Result<TileHeader> {
        let tag_len = self.read_u16()?;
        let tag = std::str::from_utf8(self.take(tag_len.into())?)
            .map_err(|_| corrupt("cell type tag is not valid utf-8".to_string()))?;
        let cell_type: CellType = tag
            .parse()
            .map_err(|_| corrupt(format!("unknown cell type tag `{tag}`")))?;

        let cols = self.read_u32()? as usize;
        let rows = self.read_u32()? as usize;

        let cells_len = cols
            .checked_mul(rows)
            .and_then(|cells| cells.checked_mul(cell_type.byte_width()))
            .ok_or_else(|| corrupt(format!("{cols}x{rows} cells overflow the address space")))?;

        Ok(TileHeader {
            cell_type,
            cols,
            rows,
            cells_len,
        })
    }

    fn read_tile(&mut self) -> Result<Tile> {
        let header = self.read_header()?;
        let cells = self.take(header.cells_len)?;

        Tile::new(header.cell_type, header.cols, header.rows, cells.to_vec())
            .map_err(|source| corrupt(source.to_string()))
    }

    fn finish(&self) -> Result<()> {
        ensure!(
            self.position == self.buffer.len(),
            error::CorruptTileEncoding {
                reason: format!(
                    "{} trailing bytes after the record",
                    self.buffer.len() - self.position
                )
            }
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{NoData, RasterDataType};
    use crate::util::test::checkerboard_tile;

    #[test]
    fn layout() {
        let tile = Tile::from_cells(
            CellType::raw(RasterDataType::I16),
            2,
            1,
            [Some(1.), Some(-2.)],
        )
        .unwrap();

        let bytes = encode_tile(&tile);

        assert_eq!(
            bytes,
            [
                8, 0, // tag length
                b'i', b'n', b't', b'1', b'6', b'r', b'a', b'w', //
                2, 0, 0, 0, // cols
                1, 0, 0, 0, // rows
                1, 0, 0xFE, 0xFF, // cells
            ]
        );
        assert_eq!(encoded_tile_len(&bytes).unwrap(), bytes.len());
        assert_eq!(encoded_tile_len(&bytes[..18]).unwrap(), bytes.len());
    }

    #[test]
    fn round_trips_every_cell_type() {
        let mut cell_types = CellType::all();
        cell_types.push(CellType::new(RasterDataType::I16, NoData::UserDefined(-999.)).unwrap());
        cell_types.push(CellType::new(RasterDataType::F32, NoData::UserDefined(-1.5)).unwrap());

        for cell_type in cell_types {
            for (cols, rows) in [(1, 1), (3, 2), (16, 16)] {
                let tile = checkerboard_tile(cell_type, cols, rows);
                let decoded = decode_tile(&encode_tile(&tile)).unwrap();

                assert_eq!(decoded, tile);
                assert_eq!(decoded.cell_type(), cell_type);
            }
        }
    }

    #[test]
    fn records_are_self_delimiting() {
        let a = checkerboard_tile(CellType::raw(RasterDataType::U8), 3, 3);
        let b = checkerboard_tile(CellType::with_default_no_data(RasterDataType::F64), 2, 5);

        let mut buffer = Vec::new();
        encode_tile_into(&a, &mut buffer);
        encode_tile_into(&b, &mut buffer);

        let (first, consumed) = decode_tile_prefix(&buffer).unwrap();
        assert_eq!(first, a);
        assert_eq!(consumed, encoded_tile_len(&buffer).unwrap());

        let (second, rest) = decode_tile_prefix(&buffer[consumed..]).unwrap();
        assert_eq!(second, b);
        assert_eq!(consumed + rest, buffer.len());

        assert!(matches!(
            decode_tile(&buffer),
            Err(Error::CorruptTileEncoding { .. })
        ));
    }

    #[test]
    fn rejects_corrupt_records() {
        let tile = checkerboard_tile(CellType::raw(RasterDataType::U16), 4, 4);
        let bytes = encode_tile(&tile);

        // truncated cells
        assert!(matches!(
            decode_tile(&bytes[..bytes.len() - 1]),
            Err(Error::CorruptTileEncoding { .. })
        ));

        // truncated header
        assert!(matches!(
            encoded_tile_len(&bytes[..5]),
            Err(Error::CorruptTileEncoding { .. })
        ));

        // unknown tag
        let mut unknown = bytes.clone();
        unknown[2] = b'x';
        assert!(matches!(
            decode_tile(&unknown),
            Err(Error::CorruptTileEncoding { .. })
        ));

        // zero columns
        let mut empty = Vec::new();
        empty.extend_from_slice(&5_u16.to_le_bytes());
        empty.extend_from_slice(b"uint8");
        empty.extend_from_slice(&0_u32.to_le_bytes());
        empty.extend_from_slice(&3_u32.to_le_bytes());
        assert!(matches!(
            decode_tile(&empty),
            Err(Error::CorruptTileEncoding { .. })
        ));
    }

    #[test]
    fn multiband() {
        let tile = MultibandTile::new(vec![
            checkerboard_tile(CellType::raw(RasterDataType::U8), 3, 2),
            checkerboard_tile(CellType::with_default_no_data(RasterDataType::F32), 3, 2),
            checkerboard_tile(CellType::with_default_no_data(RasterDataType::I32), 3, 2),
        ])
        .unwrap();

        let bytes = encode_multiband_tile(&tile);
        assert_eq!(&bytes[..2], &[3, 0]);
        assert_eq!(decode_multiband_tile(&bytes).unwrap(), tile);

        let mut no_bands = bytes.clone();
        no_bands.truncate(2);
        no_bands[0] = 0;
        assert!(matches!(
            decode_multiband_tile(&no_bands),
            Err(Error::CorruptTileEncoding { .. })
        ));
    }

    #[test]
    fn tile_feature() {
        let feature = TileFeature::new(
            checkerboard_tile(CellType::raw(RasterDataType::I8), 2, 2),
            "opaque metadata".to_string(),
        );

        let bytes = encode_tile_feature(&feature).unwrap();
        let decoded: TileFeature<String> = decode_tile_feature(&bytes).unwrap();
        assert_eq!(decoded, feature);

        let raw: TileFeature<Vec<u8>> = decode_tile_feature(&bytes).unwrap();
        assert_eq!(raw.metadata, b"opaque metadata".to_vec());

        assert!(matches!(
            decode_tile_feature::<String>(&bytes[..bytes.len() - 1]),
            Err(Error::CorruptTileEncoding { .. })
        ));
    }
}
