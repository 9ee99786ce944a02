//! Run the pipeline on a synthetic image pair and print the polygons.
//!
//! cargo run -p geochange-algorithms --example synthetic_change

use geochange_algorithms::prelude::*;
use ndarray::{s, Array3};

fn main() -> Result<()> {
    let (rows, cols) = (1500, 2200);
    let before = ImageStack::from_array(Array3::from_elem((rows, cols, 3), 0.2))?;

    let mut changed = Array3::from_elem((rows, cols, 3), 0.2);
    changed.slice_mut(s![300..520, 400..900, ..]).fill(0.9);
    changed.slice_mut(s![1000..1010, 2000..2008, ..]).fill(0.9);
    let after = ImageStack::from_array(changed)?;

    let params = ChangeDetectionParams {
        want_polygons: true,
        mode: ProcessingMode::Parallel,
        ..ChangeDetectionParams::default()
    };
    // 0.2 m orthophoto pixels in ETRS89 / UTM 32N
    let geo = GeoContext::from_bbox(BBox::new(565_000.0, 5_932_000.0, 565_440.0, 5_932_300.0));

    let result = predict_change(
        &SpectralDifferenceModel::default(),
        &before,
        &after,
        &params,
        Some(&geo),
    )?;

    println!(
        "{} tiles, {} changed pixels, {} polygons",
        result.tiles,
        result.changed_pixels(),
        result.polygons.len()
    );
    for (i, polygon) in result.polygons.iter().enumerate() {
        println!("  #{i}: {:.1} m², {} vertices", polygon.area(), polygon.vertices().len());
    }
    Ok(())
}
