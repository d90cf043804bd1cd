//! Parameter types for raster operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the pipelines (which decide the stage order) and the
//! [`backend`](super::backend) (which runs GDAL or touches pixels). This
//! separation allows swapping backends (e.g. for testing with a mock)
//! without changing pipeline logic.

use crate::color::ColorCorrect;
use crate::geo::Bounds;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// GeoTiff compression codec, passed as a `COMPRESS=` creation option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Lzw,
    Deflate,
    None,
}

impl Compression {
    /// The `-co` value for this codec, or `None` for uncompressed output.
    pub fn creation_option(self) -> Option<&'static str> {
        match self {
            Compression::Lzw => Some("COMPRESS=LZW"),
            Compression::Deflate => Some("COMPRESS=DEFLATE"),
            Compression::None => None,
        }
    }
}

/// Raster sample type, as named by GDAL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Byte,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
    Other(String),
}

impl DataType {
    /// Parse a GDAL type name (`"Byte"`, `"UInt16"`, ...).
    pub fn from_gdal(name: &str) -> Self {
        match name {
            "Byte" => DataType::Byte,
            "UInt16" => DataType::UInt16,
            "Int16" => DataType::Int16,
            "UInt32" => DataType::UInt32,
            "Int32" => DataType::Int32,
            "Float32" => DataType::Float32,
            "Float64" => DataType::Float64,
            other => DataType::Other(other.to_string()),
        }
    }

    /// Bits per sample, when known.
    pub fn bits(&self) -> Option<u32> {
        match self {
            DataType::Byte => Some(8),
            DataType::UInt16 | DataType::Int16 => Some(16),
            DataType::UInt32 | DataType::Int32 | DataType::Float32 => Some(32),
            DataType::Float64 => Some(64),
            DataType::Other(_) => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Byte => f.write_str("Byte"),
            DataType::UInt16 => f.write_str("UInt16"),
            DataType::Int16 => f.write_str("Int16"),
            DataType::UInt32 => f.write_str("UInt32"),
            DataType::Int32 => f.write_str("Int32"),
            DataType::Float32 => f.write_str("Float32"),
            DataType::Float64 => f.write_str("Float64"),
            DataType::Other(name) => f.write_str(name),
        }
    }
}

/// What `probe` learns about a raster.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterInfo {
    pub width: u32,
    pub height: u32,
    /// Data type of each band, in band order.
    pub bands: Vec<DataType>,
    /// GDAL affine geotransform, absent for plain images.
    pub geo_transform: Option<[f64; 6]>,
    /// Coordinate system as WKT.
    pub srs: Option<String>,
}

impl RasterInfo {
    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Data type of the first band.
    pub fn data_type(&self) -> Option<&DataType> {
        self.bands.first()
    }

    /// Upper-left and lower-right corners as `[ulx, uly, lrx, lry]`, the
    /// order `-a_ullr` takes.
    pub fn corners(&self) -> Option<[f64; 4]> {
        let gt = self.geo_transform?;
        let (w, h) = (f64::from(self.width), f64::from(self.height));
        Some([
            gt[0],
            gt[3],
            gt[0] + w * gt[1] + h * gt[2],
            gt[3] + w * gt[4] + h * gt[5],
        ])
    }
}

/// Linear rescale `[src_min, src_max] → [dst_min, dst_max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScaleRange {
    pub src_min: u32,
    pub src_max: u32,
    pub dst_min: u32,
    pub dst_max: u32,
}

impl ScaleRange {
    /// Rescale `[0, src_max]` onto the full 8-bit range.
    pub fn to_byte(src_max: u32) -> Self {
        Self {
            src_min: 0,
            src_max,
            dst_min: 0,
            dst_max: 255,
        }
    }
}

/// Mosaic any number of tiles into one raster.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeParams {
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    pub nodata: Option<i32>,
}

/// A single `gdal_translate` invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslateParams {
    pub source: PathBuf,
    pub output: PathBuf,
    /// 1-based bands to keep, in output order. Empty keeps all bands.
    pub bands: Vec<u32>,
    pub output_type: Option<DataType>,
    pub scale: Option<ScaleRange>,
    /// Tag the three output bands as red, green, blue.
    pub rgb: bool,
    /// Crop window in EPSG:4326.
    pub projwin: Option<Bounds>,
    pub compression: Compression,
    /// Copy corner coordinates and SRS from this raster onto the output.
    pub georef_from: Option<PathBuf>,
}

impl TranslateParams {
    /// A plain copy of `source` to `output` with no options set.
    pub fn copy(source: PathBuf, output: PathBuf) -> Self {
        Self {
            source,
            output,
            bands: Vec::new(),
            output_type: None,
            scale: None,
            rgb: false,
            projwin: None,
            compression: Compression::None,
            georef_from: None,
        }
    }
}

/// Stack inputs into a virtual raster.
#[derive(Debug, Clone, PartialEq)]
pub struct VrtParams {
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    /// Each input becomes its own band instead of being mosaicked.
    pub separate: bool,
    pub nodata: Option<i32>,
}

/// In-process color correction of an 8-bit RGB raster.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorCorrectParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub correction: ColorCorrect,
    /// Include per-channel color balance (not reversible by hand).
    pub balance: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_creation_options() {
        assert_eq!(Compression::Lzw.creation_option(), Some("COMPRESS=LZW"));
        assert_eq!(
            Compression::Deflate.creation_option(),
            Some("COMPRESS=DEFLATE")
        );
        assert_eq!(Compression::None.creation_option(), None);
    }

    #[test]
    fn data_type_parses_gdal_names() {
        assert_eq!(DataType::from_gdal("UInt16"), DataType::UInt16);
        assert_eq!(DataType::from_gdal("Byte"), DataType::Byte);
        assert_eq!(
            DataType::from_gdal("CInt16"),
            DataType::Other("CInt16".to_string())
        );
    }

    #[test]
    fn data_type_bits() {
        assert_eq!(DataType::Byte.bits(), Some(8));
        assert_eq!(DataType::UInt16.bits(), Some(16));
        assert_eq!(DataType::Other("CFloat64".into()).bits(), None);
    }

    #[test]
    fn data_type_display_matches_gdal() {
        assert_eq!(DataType::UInt16.to_string(), "UInt16");
        assert_eq!(DataType::Other("CInt32".into()).to_string(), "CInt32");
    }

    #[test]
    fn scale_to_byte() {
        let s = ScaleRange::to_byte(3500);
        assert_eq!((s.src_min, s.src_max, s.dst_min, s.dst_max), (0, 3500, 0, 255));
    }

    #[test]
    fn raster_info_band_count() {
        let info = RasterInfo {
            width: 10,
            height: 10,
            bands: vec![DataType::UInt16; 4],
            geo_transform: None,
            srs: None,
        };
        assert_eq!(info.band_count(), 4);
        assert_eq!(info.data_type(), Some(&DataType::UInt16));
        assert_eq!(info.corners(), None);
    }

    #[test]
    fn raster_info_corners_from_geotransform() {
        let info = RasterInfo {
            width: 100,
            height: 50,
            bands: vec![DataType::Byte; 3],
            geo_transform: Some([500000.0, 3.0, 0.0, 4200000.0, 0.0, -3.0]),
            srs: None,
        };
        assert_eq!(
            info.corners(),
            Some([500000.0, 4200000.0, 500300.0, 4199850.0])
        );
    }
}
