//! GDAL command-line backend.
//!
//! ## Tool mapping
//!
//! | Operation | Tool / crate |
//! |---|---|
//! | Probe | `gdalinfo -json`, parsed with `serde_json` |
//! | Merge | `gdal_merge.py -o <out> [-n nodata] <inputs...>` |
//! | Translate | `gdal_translate [-a_ullr ... -a_srs WKT] [-b N]... [-ot T] [-scale ...] [-co ...] <in> <out>` |
//! | Build VRT | `gdalbuildvrt [-separate] [-srcnodata N] <out.vrt> <inputs...>` |
//! | Color correct | `image` crate decode → [`crate::color`] → TIFF/PNG/JPEG encode |
//!
//! Argument vectors are built by pure functions ([`merge_args`],
//! [`translate_args`], [`georef_args`], [`vrt_args`]) so they can be checked
//! without GDAL installed. A translate with `georef_from` set first probes
//! that raster and assigns its corners and SRS to the output. Each tool blocks until it exits; stderr is captured and
//! returned in [`BackendError::ToolFailed`] on a non-zero exit.

use super::backend::{BackendError, RasterBackend};
use super::params::{
    ColorCorrectParams, DataType, MergeParams, RasterInfo, TranslateParams, VrtParams,
};
use crate::config::ToolsConfig;
use image::{DynamicImage, ImageReader};
use serde::Deserialize;
use std::ffi::OsString;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Backend that shells out to the GDAL utilities named in [`ToolsConfig`].
pub struct GdalBackend {
    tools: ToolsConfig,
}

impl GdalBackend {
    pub fn new(tools: ToolsConfig) -> Self {
        Self { tools }
    }
}

impl Default for GdalBackend {
    fn default() -> Self {
        Self::new(ToolsConfig::default())
    }
}

/// `gdal_merge.py` arguments.
pub fn merge_args(params: &MergeParams) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-o".into(), params.output.clone().into()];
    if let Some(nodata) = params.nodata {
        args.push("-n".into());
        args.push(nodata.to_string().into());
    }
    args.extend(params.inputs.iter().map(|p| p.clone().into_os_string()));
    args
}

/// `gdal_translate` arguments.
pub fn translate_args(params: &TranslateParams) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    for band in &params.bands {
        args.push("-b".into());
        args.push(band.to_string().into());
    }
    if let Some(data_type) = &params.output_type {
        args.push("-ot".into());
        args.push(data_type.to_string().into());
    }
    if let Some(scale) = params.scale {
        args.push("-scale".into());
        for v in [scale.src_min, scale.src_max, scale.dst_min, scale.dst_max] {
            args.push(v.to_string().into());
        }
    }
    if params.rgb {
        args.push("-colorinterp".into());
        args.push("red,green,blue".into());
        args.push("-co".into());
        args.push("PHOTOMETRIC=RGB".into());
    }
    if let Some(bounds) = params.projwin {
        args.push("-projwin_srs".into());
        args.push("EPSG:4326".into());
        args.push("-projwin".into());
        args.extend(bounds.projwin().iter().map(|c| OsString::from(c.to_string())));
    }
    if let Some(option) = params.compression.creation_option() {
        args.push("-co".into());
        args.push(option.into());
    }
    args.push(params.source.clone().into_os_string());
    args.push(params.output.clone().into_os_string());
    args
}

/// `gdal_translate` arguments that assign the georeferencing of `info`.
///
/// Empty when `info` has no geotransform.
pub fn georef_args(info: &RasterInfo) -> Vec<OsString> {
    let Some(corners) = info.corners() else {
        return Vec::new();
    };
    let mut args: Vec<OsString> = vec!["-a_ullr".into()];
    args.extend(corners.iter().map(|c| OsString::from(c.to_string())));
    if let Some(srs) = info.srs.as_deref().filter(|s| !s.is_empty()) {
        args.push("-a_srs".into());
        args.push(srs.into());
    }
    args
}

/// `gdalbuildvrt` arguments.
pub fn vrt_args(params: &VrtParams) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    if params.separate {
        args.push("-separate".into());
    }
    if let Some(nodata) = params.nodata {
        args.push("-srcnodata".into());
        args.push(nodata.to_string().into());
    }
    args.push(params.output.clone().into_os_string());
    args.extend(params.inputs.iter().map(|p| p.clone().into_os_string()));
    args
}

/// Run a tool to completion and return its stdout.
fn run_tool(tool: &str, args: &[OsString]) -> Result<Vec<u8>, BackendError> {
    debug!(
        "{} {}",
        tool,
        args.iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    );
    let output = Command::new(tool).args(args).output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            BackendError::ToolNotFound(tool.to_string())
        } else {
            BackendError::Io(e)
        }
    })?;
    if !output.status.success() {
        return Err(BackendError::ToolFailed {
            tool: tool.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}

/// The subset of `gdalinfo -json` this backend reads.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GdalInfo {
    size: [u32; 2],
    #[serde(default)]
    bands: Vec<GdalBand>,
    geo_transform: Option<[f64; 6]>,
    coordinate_system: Option<GdalCoordinateSystem>,
}

#[derive(Debug, Deserialize)]
struct GdalCoordinateSystem {
    #[serde(default)]
    wkt: String,
}

#[derive(Debug, Deserialize)]
struct GdalBand {
    #[serde(rename = "type")]
    data_type: String,
}

/// Parse `gdalinfo -json` output.
pub fn parse_gdalinfo(json: &[u8]) -> Result<RasterInfo, BackendError> {
    let info: GdalInfo =
        serde_json::from_slice(json).map_err(|e| BackendError::InvalidOutput {
            tool: "gdalinfo".to_string(),
            message: e.to_string(),
        })?;
    Ok(RasterInfo {
        width: info.size[0],
        height: info.size[1],
        bands: info
            .bands
            .iter()
            .map(|b| DataType::from_gdal(&b.data_type))
            .collect(),
        geo_transform: info.geo_transform,
        srs: info
            .coordinate_system
            .map(|cs| cs.wkt)
            .filter(|wkt| !wkt.is_empty()),
    })
}

/// Decode an image and reduce it to 8-bit RGB.
///
/// 16-bit rasters are rejected: the pipelines rescale to 8 bits before
/// color correction, and silently truncating here would hide a missed step.
fn load_rgb8(path: &Path) -> Result<image::RgbImage, BackendError> {
    let img = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    match img {
        DynamicImage::ImageRgb8(rgb) => Ok(rgb),
        DynamicImage::ImageRgba8(_) | DynamicImage::ImageLuma8(_) | DynamicImage::ImageLumaA8(_) => {
            Ok(img.to_rgb8())
        }
        other => Err(BackendError::ProcessingFailed(format!(
            "{} is {:?}; color correction expects 8-bit RGB",
            path.display(),
            other.color()
        ))),
    }
}

impl RasterBackend for GdalBackend {
    fn probe(&self, path: &Path) -> Result<RasterInfo, BackendError> {
        let stdout = run_tool(
            &self.tools.info,
            &["-json".into(), path.as_os_str().to_os_string()],
        )?;
        parse_gdalinfo(&stdout)
    }

    fn merge(&self, params: &MergeParams) -> Result<(), BackendError> {
        run_tool(&self.tools.merge, &merge_args(params)).map(|_| ())
    }

    fn translate(&self, params: &TranslateParams) -> Result<(), BackendError> {
        let mut args = match &params.georef_from {
            Some(reference) => georef_args(&self.probe(reference)?),
            None => Vec::new(),
        };
        args.extend(translate_args(params));
        run_tool(&self.tools.translate, &args).map(|_| ())
    }

    fn build_vrt(&self, params: &VrtParams) -> Result<(), BackendError> {
        run_tool(&self.tools.build_vrt, &vrt_args(params)).map(|_| ())
    }

    fn color_correct(&self, params: &ColorCorrectParams) -> Result<(), BackendError> {
        let mut img = load_rgb8(&params.source)?;
        let report = if params.balance {
            params.correction.correct(&mut img)
        } else {
            params.correction.brightness_and_contrast(&mut img)
        };
        debug!(?report, "color corrected {}", params.source.display());
        img.save(&params.output)?;
        Ok(())
    }
}
