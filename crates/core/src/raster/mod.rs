//! Raster grids, image stacks and georeferencing

mod bbox;
mod element;
mod geotransform;
mod grid;
mod stack;

pub use bbox::BBox;
pub use element::RasterElement;
pub use geotransform::GeoTransform;
pub use grid::Raster;
pub use stack::ImageStack;
