//! Marching-squares boundary tracing for binary masks
//!
//! The mask is treated as if surrounded by a one-pixel background border,
//! so every boundary comes out as a closed ring. Contours run through the
//! midpoints between pixel centres (the 0.5 iso-line of a {0, 1} grid).
//! Foreground is 4-connected: diagonal neighbours get separate rings.

use geo::Coord;
use ndarray::ArrayView2;
use std::collections::HashMap;

/// Point in doubled padded-grid coordinates `(2x, 2y)`, exact for midpoints.
type Key = (i64, i64);

#[derive(Clone, Copy)]
enum Edge {
    Top,
    Right,
    Bottom,
    Left,
}

#[derive(Clone, Copy)]
enum Corner {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

use Corner::*;
use Edge::*;

/// Segments per cell case (bits: tl=8, tr=4, br=2, bl=1), each with one
/// foreground corner on the segment's foreground side. Saddles (5, 10)
/// cut off the foreground corners.
fn cell_segments(case: u8) -> &'static [(Edge, Edge, Corner)] {
    match case {
        1 => &[(Left, Bottom, BottomLeft)],
        2 => &[(Bottom, Right, BottomRight)],
        3 => &[(Left, Right, BottomLeft)],
        4 => &[(Top, Right, TopRight)],
        5 => &[(Top, Right, TopRight), (Left, Bottom, BottomLeft)],
        6 => &[(Top, Bottom, TopRight)],
        7 => &[(Left, Top, BottomRight)],
        8 => &[(Left, Top, TopLeft)],
        9 => &[(Top, Bottom, TopLeft)],
        10 => &[(Left, Top, TopLeft), (Bottom, Right, BottomRight)],
        11 => &[(Top, Right, BottomLeft)],
        12 => &[(Left, Right, TopLeft)],
        13 => &[(Bottom, Right, TopLeft)],
        14 => &[(Left, Bottom, TopRight)],
        _ => &[],
    }
}

fn edge_key(row: i64, col: i64, edge: Edge) -> Key {
    match edge {
        Top => (2 * col + 1, 2 * row),
        Right => (2 * col + 2, 2 * row + 1),
        Bottom => (2 * col + 1, 2 * row + 2),
        Left => (2 * col, 2 * row + 1),
    }
}

fn corner_key(row: i64, col: i64, corner: Corner) -> Key {
    match corner {
        TopLeft => (2 * col, 2 * row),
        TopRight => (2 * col + 2, 2 * row),
        BottomRight => (2 * col + 2, 2 * row + 2),
        BottomLeft => (2 * col, 2 * row + 2),
    }
}

fn cross(o: Key, a: Key, b: Key) -> i64 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}

/// Foreground test in padded coordinates (row/col 0 is the border).
fn is_foreground(mask: &ArrayView2<'_, u8>, row: usize, col: usize) -> bool {
    row >= 1
        && col >= 1
        && mask
            .get((row - 1, col - 1))
            .is_some_and(|&v| v != 0)
}

/// Directed segments in row-major cell order, foreground on a fixed side.
fn segments(mask: &ArrayView2<'_, u8>) -> Vec<(Key, Key)> {
    let (rows, cols) = mask.dim();
    let mut out = Vec::new();

    for i in 0..=rows {
        for j in 0..=cols {
            let case = (is_foreground(mask, i, j) as u8) << 3
                | (is_foreground(mask, i, j + 1) as u8) << 2
                | (is_foreground(mask, i + 1, j + 1) as u8) << 1
                | is_foreground(mask, i + 1, j) as u8;

            let (r, c) = (i as i64, j as i64);
            for &(a, b, corner) in cell_segments(case) {
                let (p, q) = (edge_key(r, c, a), edge_key(r, c, b));
                if cross(p, q, corner_key(r, c, corner)) > 0 {
                    out.push((p, q));
                } else {
                    out.push((q, p));
                }
            }
        }
    }
    out
}

/// Drop vertices lying on the straight line through their neighbours.
fn remove_collinear(ring: &[Key]) -> Vec<Key> {
    let n = ring.len();
    (0..n)
        .filter(|&i| cross(ring[(i + n - 1) % n], ring[i], ring[(i + 1) % n]) != 0)
        .map(|i| ring[i])
        .collect()
}

/// Closed boundaries of the nonzero region, in discovery order.
///
/// Each ring is returned open (no repeated closing vertex) in pixel-centre
/// coordinates: `x` is the column, `y` the row, and pixel `(row, col)` has
/// its centre at `(col, row)`.
pub fn trace_contours(mask: ArrayView2<'_, u8>) -> Vec<Vec<Coord<f64>>> {
    let segs = segments(&mask);
    let starts: HashMap<Key, usize> = segs.iter().enumerate().map(|(i, s)| (s.0, i)).collect();
    let mut visited = vec![false; segs.len()];
    let mut rings = Vec::new();

    for first in 0..segs.len() {
        if visited[first] {
            continue;
        }
        let mut ring = Vec::new();
        let mut current = first;
        let closed = loop {
            visited[current] = true;
            ring.push(segs[current].0);
            match starts.get(&segs[current].1) {
                Some(&next) if next == first => break true,
                Some(&next) if !visited[next] => current = next,
                _ => break false,
            }
        };
        if !closed {
            continue;
        }

        rings.push(
            remove_collinear(&ring)
                .into_iter()
                .map(|(x2, y2)| Coord {
                    x: x2 as f64 / 2.0 - 1.0,
                    y: y2 as f64 / 2.0 - 1.0,
                })
                .collect(),
        );
    }
    rings
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn shoelace(ring: &[Coord<f64>]) -> f64 {
        let n = ring.len();
        (0..n)
            .map(|i| {
                let (a, b) = (ring[i], ring[(i + 1) % n]);
                a.x * b.y - b.x * a.y
            })
            .sum::<f64>()
            / 2.0
    }

    #[test]
    fn single_pixel_is_a_diamond() {
        let mut mask = Array2::<u8>::zeros((3, 3));
        mask[[1, 2]] = 255;

        let rings = trace_contours(mask.view());
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].len(), 4);
        assert!((shoelace(&rings[0]).abs() - 0.5).abs() < 1e-12);

        let cx = rings[0].iter().map(|c| c.x).sum::<f64>() / 4.0;
        let cy = rings[0].iter().map(|c| c.y).sum::<f64>() / 4.0;
        assert_eq!((cx, cy), (2.0, 1.0));
    }

    #[test]
    fn rectangle_has_cut_corners() {
        let mut mask = Array2::<u8>::zeros((8, 10));
        mask.slice_mut(ndarray::s![2..5, 3..7]).fill(1);

        let rings = trace_contours(mask.view());
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].len(), 8);
        // 3x4 pixels minus four half-pixel corner triangles
        assert!((shoelace(&rings[0]).abs() - 11.5).abs() < 1e-12);
    }

    #[test]
    fn edge_touching_blob_is_closed() {
        let mask = Array2::<u8>::from_elem((2, 2), 1);
        let rings = trace_contours(mask.view());
        assert_eq!(rings.len(), 1);
        assert!((shoelace(&rings[0]).abs() - 3.5).abs() < 1e-12);
        assert!(rings[0].iter().all(|c| c.x >= -0.5 && c.y <= 1.5));
    }

    #[test]
    fn diagonal_pixels_are_separate() {
        let mut mask = Array2::<u8>::zeros((2, 2));
        mask[[0, 0]] = 1;
        mask[[1, 1]] = 1;
        assert_eq!(trace_contours(mask.view()).len(), 2);
    }

    #[test]
    fn hole_gives_inner_ring_with_opposite_orientation() {
        let mut mask = Array2::<u8>::from_elem((3, 3), 1);
        mask[[1, 1]] = 0;

        let rings = trace_contours(mask.view());
        assert_eq!(rings.len(), 2);
        let signs: Vec<f64> = rings.iter().map(|r| shoelace(r).signum()).collect();
        assert_eq!(signs[0], -signs[1]);
    }

    #[test]
    fn empty_mask_has_no_contours() {
        assert!(trace_contours(Array2::<u8>::zeros((4, 4)).view()).is_empty());
    }
}
