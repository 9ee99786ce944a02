//! GeoTIFF reading and writing

mod native;

pub use native::{read_geotiff, read_image_stack, write_geotiff, write_mask_geotiff};
