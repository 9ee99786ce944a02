//! Native GeoTIFF reading/writing on top of the `tiff` crate.
//!
//! Georeferencing is limited to ModelPixelScale + ModelTiepoint (north-up)
//! and the EPSG code stored in the GeoKey directory.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, ImageStack, Raster, RasterElement};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{ColorType as EncoderColorType, Gray32Float, Gray8};
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;
use tiff::ColorType;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

fn tiff_err(context: &str) -> impl Fn(tiff::TiffError) -> Error + '_ {
    move |e| Error::Other(format!("{context}: {e}"))
}

/// Decoded interleaved samples plus the full-scale value of integer formats.
struct Samples {
    values: Vec<f64>,
    bands: usize,
    rows: usize,
    cols: usize,
    full_scale: Option<f64>,
    transform: Option<GeoTransform>,
    crs: Option<CRS>,
}

fn bands_of(color: ColorType) -> Result<usize> {
    match color {
        ColorType::Gray(_) => Ok(1),
        ColorType::GrayA(_) => Ok(2),
        ColorType::RGB(_) => Ok(3),
        ColorType::RGBA(_) | ColorType::CMYK(_) => Ok(4),
        other => Err(Error::UnsupportedDataType(format!(
            "TIFF color type {other:?}"
        ))),
    }
}

fn decode<R: Read + Seek>(reader: R) -> Result<Samples> {
    let mut decoder = Decoder::new(reader).map_err(tiff_err("TIFF decode error"))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(tiff_err("Cannot read dimensions"))?;
    let bands = bands_of(decoder.colortype().map_err(tiff_err("Cannot read color type"))?)?;
    let rows = height as usize;
    let cols = width as usize;

    let transform = read_geotransform(&mut decoder).ok();
    let crs = read_crs(&mut decoder);

    let result = decoder
        .read_image()
        .map_err(tiff_err("Cannot read image data"))?;

    let (values, full_scale): (Vec<f64>, Option<f64>) = match result {
        DecodingResult::U8(buf) => (
            buf.into_iter().map(f64::from).collect(),
            Some(u8::MAX as f64),
        ),
        DecodingResult::U16(buf) => (
            buf.into_iter().map(f64::from).collect(),
            Some(u16::MAX as f64),
        ),
        DecodingResult::U32(buf) => (buf.into_iter().map(f64::from).collect(), None),
        DecodingResult::I8(buf) => (buf.into_iter().map(f64::from).collect(), None),
        DecodingResult::I16(buf) => (buf.into_iter().map(f64::from).collect(), None),
        DecodingResult::I32(buf) => (buf.into_iter().map(f64::from).collect(), None),
        DecodingResult::F32(buf) => (buf.into_iter().map(f64::from).collect(), None),
        DecodingResult::F64(buf) => (buf, None),
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    if values.len() != rows * cols * bands {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    Ok(Samples {
        values,
        bands,
        rows,
        cols,
        full_scale,
        transform,
        crs,
    })
}

/// Read one band of a GeoTIFF file into a Raster (band 0 when `None`).
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let samples = decode(BufReader::new(File::open(path.as_ref())?))?;
    let band = band.unwrap_or(0);
    if band >= samples.bands {
        return Err(Error::InvalidParameter {
            name: "band",
            value: band.to_string(),
            reason: format!("file has {} band(s)", samples.bands),
        });
    }

    let data: Vec<T> = samples
        .values
        .iter()
        .skip(band)
        .step_by(samples.bands)
        .map(|&v| T::from_f64_saturating(v))
        .collect();

    let raster = Raster::from_vec(data, samples.rows, samples.cols)?;
    Ok(raster.with_georef(samples.transform.unwrap_or_default(), samples.crs))
}

/// Read every band of a GeoTIFF into an [`ImageStack`].
///
/// 8- and 16-bit samples are scaled to `[0, 1]`; float samples are kept as is.
pub fn read_image_stack<P: AsRef<Path>>(path: P) -> Result<ImageStack> {
    let samples = decode(BufReader::new(File::open(path.as_ref())?))?;
    let scale = samples.full_scale.unwrap_or(1.0) as f32;
    let stack = ImageStack::from_interleaved(
        &samples.values,
        samples.rows,
        samples.cols,
        samples.bands,
        scale,
    )?;
    Ok(stack.with_georef(samples.transform.unwrap_or_default(), samples.crs))
}

/// Attempt to read GeoTransform from TIFF tags
fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform> {
    let scale = decoder
        .get_tag_f64_vec(tag(MODEL_PIXEL_SCALE))
        .map_err(|_| Error::Other("No pixel scale tag".into()))?;

    let tiepoint = decoder
        .get_tag_f64_vec(tag(MODEL_TIEPOINT))
        .map_err(|_| Error::Other("No tiepoint tag".into()))?;

    if scale.len() >= 2 && tiepoint.len() >= 6 {
        // tiepoint: [I, J, K, X, Y, Z]; scale: [ScaleX, ScaleY, ScaleZ]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        return Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
    }

    Err(Error::Other("Cannot determine geotransform".into()))
}

/// EPSG code from the projected or geographic GeoKey, if present.
fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u16_vec(tag(GEO_KEY_DIRECTORY)).ok()?;
    let count = *keys.get(3)? as usize;

    let mut geographic = None;
    for entry in keys[4..].chunks_exact(4).take(count) {
        // [key id, tag location, count, value]; location 0 means inline value
        if entry[1] != 0 {
            continue;
        }
        match entry[0] {
            PROJECTED_CS_TYPE_KEY => return Some(CRS::from_epsg(entry[3] as u32)),
            GEOGRAPHIC_TYPE_KEY => geographic = Some(CRS::from_epsg(entry[3] as u32)),
            _ => {}
        }
    }
    geographic
}

fn geo_keys(crs: Option<&CRS>) -> Vec<u16> {
    let code = crs
        .and_then(CRS::epsg)
        .and_then(|c| u16::try_from(c).ok());

    let mut keys: Vec<u16> = vec![1, 1, 0, 2];
    match code {
        Some(code @ (4326 | 4258)) => {
            keys.extend_from_slice(&[GT_MODEL_TYPE_KEY, 0, 1, 2]);
            keys.extend_from_slice(&[GT_RASTER_TYPE_KEY, 0, 1, 1]);
            keys.extend_from_slice(&[GEOGRAPHIC_TYPE_KEY, 0, 1, code]);
        }
        Some(code) => {
            keys.extend_from_slice(&[GT_MODEL_TYPE_KEY, 0, 1, 1]);
            keys.extend_from_slice(&[GT_RASTER_TYPE_KEY, 0, 1, 1]);
            keys.extend_from_slice(&[PROJECTED_CS_TYPE_KEY, 0, 1, code]);
        }
        None => {
            keys.extend_from_slice(&[GT_MODEL_TYPE_KEY, 0, 1, 1]);
            keys.extend_from_slice(&[GT_RASTER_TYPE_KEY, 0, 1, 1]);
        }
    }
    keys[3] = ((keys.len() - 4) / 4) as u16;
    keys
}

/// Encode one image of colour type `C` with georeferencing tags.
fn encode<C, W>(
    writer: W,
    cols: usize,
    rows: usize,
    data: &[C::Inner],
    transform: &GeoTransform,
    crs: Option<&CRS>,
) -> Result<()>
where
    C: EncoderColorType,
    [C::Inner]: tiff::encoder::TiffValue,
    W: Write + Seek,
{
    let mut encoder = TiffEncoder::new(writer).map_err(tiff_err("TIFF encoder error"))?;
    let mut image = encoder
        .new_image::<C>(cols as u32, rows as u32)
        .map_err(tiff_err("Cannot create TIFF image"))?;

    let scale = [transform.pixel_width, transform.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(tag(MODEL_PIXEL_SCALE), &scale[..])
        .map_err(tiff_err("Cannot write scale tag"))?;

    let tiepoint = [0.0, 0.0, 0.0, transform.origin_x, transform.origin_y, 0.0];
    image
        .encoder()
        .write_tag(tag(MODEL_TIEPOINT), &tiepoint[..])
        .map_err(tiff_err("Cannot write tiepoint tag"))?;

    let keys = geo_keys(crs);
    image
        .encoder()
        .write_tag(tag(GEO_KEY_DIRECTORY), keys.as_slice())
        .map_err(tiff_err("Cannot write geokey tag"))?;

    image
        .write_data(data)
        .map_err(tiff_err("Cannot write image data"))?;
    Ok(())
}

/// Write a Raster to a GeoTIFF file as 32-bit float.
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| v.to_f64().map_or(f32::NAN, |v| v as f32))
        .collect();

    let (rows, cols) = raster.shape();
    let writer = BufWriter::new(File::create(path.as_ref())?);
    encode::<Gray32Float, _>(writer, cols, rows, &data, raster.transform(), raster.crs())
}

/// Write a {0, 255} change mask as an 8-bit GeoTIFF.
pub fn write_mask_geotiff<P: AsRef<Path>>(mask: &Raster<u8>, path: P) -> Result<()> {
    let data: Vec<u8> = mask.data().iter().copied().collect();
    let (rows, cols) = mask.shape();
    let writer = BufWriter::new(File::create(path.as_ref())?);
    encode::<Gray8, _>(writer, cols, rows, &data, mask.transform(), mask.crs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mask_roundtrip_keeps_georef() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.tif");

        let mut mask: Raster<u8> = Raster::new(8, 12);
        mask.set(3, 4, 255).unwrap();
        mask.set(7, 11, 255).unwrap();
        let mask = mask.with_georef(
            GeoTransform::new(565_000.0, 5_933_000.0, 0.5, -0.5),
            Some(CRS::etrs89_utm32n()),
        );
        write_mask_geotiff(&mask, &path).unwrap();

        let back: Raster<u8> = read_geotiff(&path, None).unwrap();
        assert_eq!(back.shape(), (8, 12));
        assert_eq!(back.get(3, 4).unwrap(), 255);
        assert_eq!(back.count_nonzero(), 2);
        assert_relative_eq!(back.transform().origin_x, 565_000.0);
        assert_relative_eq!(back.transform().pixel_height, -0.5);
        assert_eq!(back.crs().and_then(CRS::epsg), Some(25832));
    }

    #[test]
    fn float_raster_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prob.tif");

        let mut prob: Raster<f32> = Raster::new(4, 4);
        prob.set(1, 2, 0.75).unwrap();
        write_geotiff(&prob, &path).unwrap();

        let back: Raster<f32> = read_geotiff(&path, None).unwrap();
        assert_relative_eq!(back.get(1, 2).unwrap(), 0.75);
        assert!(back.crs().is_none());
        assert!(read_geotiff::<f32, _>(&path, Some(1)).is_err());
    }

    #[test]
    fn gray_file_reads_as_single_band_stack() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.tif");

        let mask = Raster::<u8>::from_vec(vec![0, 255, 51, 0], 2, 2).unwrap();
        write_mask_geotiff(&mask, &path).unwrap();

        let stack = read_image_stack(&path).unwrap();
        assert_eq!(stack.shape(), (2, 2));
        assert_eq!(stack.bands(), 1);
        assert_relative_eq!(stack.view()[[0, 1, 0]], 1.0);
        assert_relative_eq!(stack.view()[[1, 0, 0]], 0.2);
    }

    #[test]
    fn geo_keys_layout() {
        let keys = geo_keys(Some(&CRS::wgs84()));
        assert_eq!(keys[3], 3);
        assert_eq!(&keys[12..16], &[GEOGRAPHIC_TYPE_KEY, 0, 1, 4326]);

        let keys = geo_keys(None);
        assert_eq!(keys[3], 2);
        assert_eq!(keys.len(), 12);
    }
}
