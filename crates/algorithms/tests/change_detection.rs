//! End-to-end properties of the tiled change-detection pipeline.

use geochange_algorithms::prelude::*;
use geochange_algorithms::stitch::CHANGE_VALUE;
use ndarray::{s, Array2, Array3, ArrayView3};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Returns all zeros and counts how often it was called.
#[derive(Default)]
struct CountingModel {
    calls: AtomicUsize,
}

impl ChangeModel for CountingModel {
    fn name(&self) -> &str {
        "counting"
    }

    fn infer(&self, before: ArrayView3<'_, f32>, _after: ArrayView3<'_, f32>) -> Result<Array2<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (rows, cols, _) = before.dim();
        Ok(Array2::zeros((rows, cols)))
    }
}

/// Fails on the n-th call (0-based).
struct FailingModel {
    fail_at: usize,
    calls: AtomicUsize,
}

impl ChangeModel for FailingModel {
    fn name(&self) -> &str {
        "failing"
    }

    fn infer(&self, before: ArrayView3<'_, f32>, _after: ArrayView3<'_, f32>) -> Result<Array2<f32>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == self.fail_at {
            return Err(Error::Other("device lost".into()));
        }
        let (rows, cols, _) = before.dim();
        Ok(Array2::zeros((rows, cols)))
    }
}

fn zeros(rows: usize, cols: usize, bands: usize) -> ImageStack {
    ImageStack::from_array(Array3::zeros((rows, cols, bands))).unwrap()
}

/// `after` image with a bright block at the given window.
fn with_block(rows: usize, cols: usize, block: (usize, usize, usize, usize)) -> ImageStack {
    let (r, c, h, w) = block;
    let mut data = Array3::<f32>::zeros((rows, cols, 3));
    data.slice_mut(s![r..r + h, c..c + w, ..]).fill(1.0);
    ImageStack::from_array(data).unwrap()
}

fn textured(rows: usize, cols: usize, seed: usize) -> ImageStack {
    let data = Array3::from_shape_fn((rows, cols, 3), |(r, c, b)| {
        ((r * 31 + c * 17 + b * 7 + seed) % 23) as f32 / 23.0
    });
    ImageStack::from_array(data).unwrap()
}

#[test]
fn every_pixel_is_covered_by_some_tile() {
    for &(rows, cols, th, tw) in &[
        (1000, 1000, 256, 256),
        (1025, 1023, 512, 512),
        (97, 301, 32, 64),
        (64, 64, 64, 64),
        (40, 700, 64, 64),
    ] {
        let tiles = generate_tiles(rows, cols, th, tw).unwrap();
        let mut acc = Accumulator::new(rows, cols);
        for spec in &tiles {
            acc.add(&TilePrediction::new(*spec, Array2::zeros((spec.height, spec.width))))
                .unwrap();
        }
        assert_eq!(acc.uncovered(), 0, "{rows}x{cols} with {th}x{tw} tiles");
    }
}

#[test]
fn zero_predictions_stitch_to_zero_mask() {
    let (rows, cols) = (300, 250);
    let predictions: Vec<TilePrediction> = generate_tiles(rows, cols, 128, 96)
        .unwrap()
        .into_iter()
        .map(|spec| TilePrediction::new(spec, Array2::zeros((spec.height, spec.width))))
        .collect();

    let mask = stitch(&predictions, rows, cols).unwrap();
    assert_eq!(mask.shape(), (rows, cols));
    assert_eq!(mask.count_nonzero(), 0);
}

#[test]
fn overlap_is_averaged_not_overwritten() {
    // 4x6 raster, 4x4 tiles: tiles start at columns 0 and 2, overlap columns 2..4
    let tiles = generate_tiles(4, 6, 4, 4).unwrap();
    assert_eq!(tiles.len(), 2);
    assert_eq!((tiles[0].start_col, tiles[1].start_col), (0, 2));

    let predict = |a: f32, b: f32| {
        vec![
            TilePrediction::new(tiles[0], Array2::from_elem((4, 4), a)),
            TilePrediction::new(tiles[1], Array2::from_elem((4, 4), b)),
        ]
    };

    // change vs no change: average 0.5 does not cross the threshold
    let mask = stitch(&predict(1.0, 0.0), 4, 6).unwrap();
    assert_eq!(mask.get(2, 1).unwrap(), CHANGE_VALUE);
    assert_eq!(mask.get(2, 2).unwrap(), 0);
    assert_eq!(mask.get(2, 3).unwrap(), 0);
    assert_eq!(mask.get(2, 4).unwrap(), 0);

    // last write would give 0.4; the average 0.6 is change
    let mask = stitch(&predict(0.8, 0.4), 4, 6).unwrap();
    assert_eq!(mask.get(0, 2).unwrap(), CHANGE_VALUE);
    assert_eq!(mask.get(3, 3).unwrap(), CHANGE_VALUE);
    assert_eq!(mask.get(0, 4).unwrap(), 0);

    // order of the tiles does not matter
    let mut reversed = predict(0.8, 0.4);
    reversed.reverse();
    assert_eq!(stitch(&reversed, 4, 6).unwrap().data(), mask.data());
}

#[test]
fn small_raster_tiled_and_direct_paths_agree() {
    let tiles = generate_tiles(40, 50, 64, 64).unwrap();
    assert_eq!(tiles, vec![TileSpec::full(40, 50)]);

    let before = textured(40, 50, 0);
    let after = textured(40, 50, 5);
    let model = SpectralDifferenceModel::new(DifferenceModelParams {
        threshold: 0.3,
        gain: 10.0,
    });

    let params = ChangeDetectionParams::default().with_tile_size(64);
    let direct = predict_change(&model, &before, &after, &params, None).unwrap();
    assert_eq!(direct.tiles, 1);

    let predictions: Vec<TilePrediction> = tiles
        .iter()
        .map(|spec| {
            let b = before.window(spec.start_row, spec.start_col, spec.height, spec.width).unwrap();
            let a = after.window(spec.start_row, spec.start_col, spec.height, spec.width).unwrap();
            TilePrediction::new(*spec, run_tile(&model, b, a, true).unwrap()).binarized(0.5)
        })
        .collect();
    let tiled = stitch(&predictions, 40, 50).unwrap();

    assert_eq!(direct.mask.data(), tiled.data());
    assert!(direct.changed_pixels() > 0);
}

#[test]
fn rectangle_area_survives_vectorization() {
    let mut mask = Raster::<u8>::new(40, 40);
    mask.view_mut().slice_mut(s![10..20, 5..25]).fill(255);

    let params = VectorizeParams {
        transform: Some(GeoTransform::identity()),
        min_area: 0.0,
        ..Default::default()
    };
    let polygons = mask_to_polygons(&mask, &params).unwrap();

    assert_eq!(polygons.len(), 1);
    assert!((polygons[0].area() - 200.0).abs() <= 1.0, "area {}", polygons[0].area());
}

#[test]
fn min_area_drops_small_blobs() {
    let mut mask = Raster::<u8>::new(80, 80);
    mask.view_mut().slice_mut(s![2..4, 2..4]).fill(255);
    mask.view_mut().slice_mut(s![20..70, 20..70]).fill(255);

    let all = mask_to_polygons(&mask, &VectorizeParams::default()).unwrap();
    assert_eq!(all.len(), 2);

    let params = VectorizeParams {
        min_area: 100.0,
        ..Default::default()
    };
    let kept = mask_to_polygons(&mask, &params).unwrap();
    assert_eq!(kept.len(), 1);
    assert!((kept[0].area() - 2500.0).abs() <= 1.0);
}

#[test]
fn missing_geo_context_fails_before_inference() {
    let model = CountingModel::default();
    let params = ChangeDetectionParams {
        want_polygons: true,
        ..Default::default()
    };

    let result = predict_change(&model, &zeros(32, 32, 3), &zeros(32, 32, 3), &params, None);
    assert!(matches!(result, Err(Error::MissingGeoContext)));
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn dimension_mismatch_fails_before_inference() {
    let model = CountingModel::default();
    let result = predict_change(
        &model,
        &zeros(32, 32, 3),
        &zeros(32, 31, 3),
        &ChangeDetectionParams::default(),
        None,
    );
    assert!(matches!(
        result,
        Err(Error::DimensionMismatch { er: 32, ec: 32, ar: 32, ac: 31 })
    ));
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn unsupported_reprojection_fails_before_inference() {
    let model = CountingModel::default();
    let params = ChangeDetectionParams {
        want_polygons: true,
        target_crs: Some(CRS::from_epsg(2154)),
        ..Default::default()
    };
    let geo = GeoContext::from_bbox(BBox::new(0.0, 0.0, 32.0, 32.0));

    let result = predict_change(&model, &zeros(32, 32, 1), &zeros(32, 32, 1), &params, Some(&geo));
    assert!(matches!(result, Err(Error::UnsupportedCrs { .. })));
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn tta_calls_model_four_times_per_tile() {
    let model = CountingModel::default();
    let params = ChangeDetectionParams::default().with_tile_size(16);
    let result = predict_change(&model, &zeros(40, 20, 2), &zeros(40, 20, 2), &params, None).unwrap();

    // 3 x 2 grid
    assert_eq!(result.tiles, 6);
    assert_eq!(model.calls.load(Ordering::SeqCst), 24);

    let model = CountingModel::default();
    let params = ChangeDetectionParams {
        use_tta: false,
        ..params
    };
    predict_change(&model, &zeros(40, 20, 2), &zeros(40, 20, 2), &params, None).unwrap();
    assert_eq!(model.calls.load(Ordering::SeqCst), 6);
}

#[test]
fn inference_failure_aborts_the_run() {
    let model = FailingModel {
        fail_at: 2,
        calls: AtomicUsize::new(0),
    };
    let params = ChangeDetectionParams {
        use_tta: false,
        ..ChangeDetectionParams::default().with_tile_size(16)
    };

    let result = predict_change(&model, &zeros(40, 40, 1), &zeros(40, 40, 1), &params, None);
    match result {
        Err(Error::InferenceFailure { tile, reason }) => {
            assert_eq!(tile, 2);
            assert!(reason.contains("device lost"));
        }
        other => panic!("expected inference failure, got {other:?}"),
    }
    // no retry, no further tiles
    assert_eq!(model.calls.load(Ordering::SeqCst), 3);
}

#[test]
fn parallel_dispatch_is_bit_identical() {
    let before = textured(100, 90, 0);
    let after = textured(100, 90, 11);
    let model = SpectralDifferenceModel::new(DifferenceModelParams {
        threshold: 0.25,
        gain: 8.0,
    });

    let base = ChangeDetectionParams {
        binarize_tiles: false,
        ..ChangeDetectionParams::default().with_tile_size(32)
    };
    let sequential = predict_change(&model, &before, &after, &base, None).unwrap();

    for mode in [ProcessingMode::Parallel, ProcessingMode::ParallelWith(3)] {
        let params = ChangeDetectionParams { mode, ..base.clone() };
        let parallel = predict_change(&model, &before, &after, &params, None).unwrap();
        assert_eq!(parallel.mask.data(), sequential.mask.data());
        assert_eq!(parallel.probability.data(), sequential.probability.data());
    }
}

#[test]
fn block_change_becomes_one_georeferenced_polygon() {
    let (rows, cols) = (200, 300);
    let before = zeros(rows, cols, 3);
    let after = with_block(rows, cols, (50, 80, 50, 70));

    let params = ChangeDetectionParams {
        want_polygons: true,
        ..ChangeDetectionParams::default().with_tile_size(128)
    };
    let geo = GeoContext::from_bbox(BBox::new(565_000.0, 5_932_000.0, 565_300.0, 5_932_200.0));
    let model = SpectralDifferenceModel::default();

    let result = predict_change(&model, &before, &after, &params, Some(&geo)).unwrap();

    assert_eq!(result.tiles, 6);
    assert_eq!(result.changed_pixels(), 50 * 70);
    assert_eq!(result.mask.get(50, 80).unwrap(), CHANGE_VALUE);
    assert_eq!(result.mask.get(49, 80).unwrap(), 0);

    assert_eq!(result.polygons.len(), 1);
    let polygon = &result.polygons[0];
    assert_eq!(polygon.crs().and_then(CRS::epsg), Some(25832));
    assert!((polygon.area() - 3500.0).abs() <= 1.0);
    for c in polygon.vertices() {
        assert!((565_079.0..=565_151.0).contains(&c.x));
        assert!((5_932_049.0..=5_932_151.0).contains(&c.y));
    }

    let features = result.feature_collection();
    assert_eq!(features.len(), 1);
}

#[test]
fn polygons_can_be_reprojected_to_wgs84() {
    let (rows, cols) = (64, 64);
    let after = with_block(rows, cols, (10, 10, 20, 20));
    let params = ChangeDetectionParams {
        want_polygons: true,
        target_crs: Some(CRS::wgs84()),
        min_area: 0.0,
        ..ChangeDetectionParams::default()
    };
    let geo = GeoContext::from_bbox(BBox::new(565_000.0, 5_932_000.0, 565_064.0, 5_932_064.0));

    let result = predict_change(
        &SpectralDifferenceModel::default(),
        &zeros(rows, cols, 3),
        &after,
        &params,
        Some(&geo),
    )
    .unwrap();

    assert_eq!(result.polygons.len(), 1);
    assert_eq!(result.polygons[0].crs().and_then(CRS::epsg), Some(4326));
    let c = result.polygons[0].vertices()[0];
    // UTM 32N, ~565 km easting and ~5932 km northing: around Hamburg
    assert!((9.9..10.1).contains(&c.x), "lon {}", c.x);
    assert!((53.4..53.6).contains(&c.y), "lat {}", c.y);
}
