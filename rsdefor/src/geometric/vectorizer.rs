//! Raster-to-vector conversion of the change mask.
//!
//! Changed pixels are grouped into 8-connected regions (4-connected when
//! `eight_connected` is off). Each region's boundary is traced along pixel
//! edges into one exterior ring (counter-clockwise) and zero or more holes
//! (clockwise), so every region is a single `Polygon`.
//!
//! At a saddle vertex, where two changed pixels meet only diagonally, the
//! tracer turns right in 8-connected mode and crosses to the diagonal pixel;
//! the exterior then touches itself at that vertex. In 4-connected mode it
//! turns left and each pass through the vertex becomes its own ring, so
//! holes meeting there come out as separate rings touching at a point.

use geo::{Coord, LineString, Polygon};
use geojson::JsonObject;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use tracing::debug;

use crate::collect::global_variables::{LABEL_PROPERTY, MAX_PIXELS, RESOLUTION_M};
use crate::commons::basic_functions::signed_ring_area;
use crate::config::PipelineConfig;
use crate::error::{Result, ServiceError, ServiceErrorKind};
use crate::geo_core::PixelGrid;
use crate::geometric::change_detector::ChangeMask;
use crate::geometric::features::{ChangeFeature, ChangeFeatureCollection};

pub const PIXEL_COUNT_PROPERTY: &str = "pixel_count";
pub const AREA_PROPERTY: &str = "area_m2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryType {
    #[default]
    Polygon,
}

/// Reduce-to-vectors parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorizeSpec {
    /// Pixel size in metres
    pub scale_m: f64,
    pub geometry_type: GeometryType,
    /// Property set to 1 on every feature
    pub label_property: String,
    /// Hard ceiling on processed pixels
    pub max_pixels: f64,
    pub eight_connected: bool,
    pub min_area_m2: f64,
}

impl Default for VectorizeSpec {
    fn default() -> Self {
        VectorizeSpec {
            scale_m: RESOLUTION_M,
            geometry_type: GeometryType::Polygon,
            label_property: LABEL_PROPERTY.to_string(),
            max_pixels: MAX_PIXELS,
            eight_connected: true,
            min_area_m2: 0.0,
        }
    }
}

impl VectorizeSpec {
    pub fn from_config(config: &PipelineConfig) -> Self {
        VectorizeSpec {
            scale_m: config.resolution_m,
            label_property: config.label_property.clone(),
            max_pixels: config.max_pixels,
            eight_connected: config.eight_connected,
            min_area_m2: config.min_area_m2,
            ..VectorizeSpec::default()
        }
    }

    /// Fail with `PixelLimitExceeded` when the grid is over the ceiling
    pub fn check_pixel_limit(&self, grid: &PixelGrid) -> Result<()> {
        let count = grid.pixel_count();
        if count > self.max_pixels {
            return Err(ServiceError::new(
                ServiceErrorKind::PixelLimitExceeded,
                format!(
                    "{}x{} grid is {} pixels, limit is {}",
                    grid.width, grid.height, count, self.max_pixels
                ),
            )
            .with_code("PIXEL_LIMIT_EXCEEDED")
            .into());
        }
        Ok(())
    }

    pub fn vectorize(&self, mask: &ChangeMask) -> Result<ChangeFeatureCollection> {
        let grid = mask.grid;
        self.check_pixel_limit(&grid)?;

        let regions = label_regions(mask, self.eight_connected);
        let labels = labels_of(&regions, &grid);
        let mut features = Vec::with_capacity(regions.len());
        for (label, pixels) in regions.iter().enumerate() {
            let polygon = trace_region(&grid, &labels, label, pixels, self.eight_connected);
            let mut properties = JsonObject::new();
            properties.insert(self.label_property.clone(), json!(1));
            properties.insert(PIXEL_COUNT_PROPERTY.to_string(), json!(pixels.len()));

            let mut feature = ChangeFeature::new(polygon, properties);
            let area = feature.area_m2();
            if area < self.min_area_m2 {
                continue;
            }
            feature
                .properties
                .insert(AREA_PROPERTY.to_string(), json!(area));
            features.push(feature);
        }

        debug!(
            regions = regions.len(),
            kept = features.len(),
            "vectorized change mask"
        );
        Ok(ChangeFeatureCollection { features })
    }
}

/// Connected regions of set pixels, each a list of (col, row) in discovery
/// order; regions are ordered by their first pixel in row-major scan order
fn label_regions(mask: &ChangeMask, eight_connected: bool) -> Vec<Vec<(usize, usize)>> {
    let grid = mask.grid;
    let mut seen = vec![false; grid.len()];
    let mut regions = Vec::new();
    let mut stack = Vec::new();

    for row in 0..grid.height {
        for col in 0..grid.width {
            let idx = grid.index(col, row);
            if seen[idx] || !mask.is_set(col, row) {
                continue;
            }
            seen[idx] = true;
            stack.push((col, row));
            let mut pixels = Vec::new();
            while let Some((c, r)) = stack.pop() {
                pixels.push((c, r));
                for (nc, nr) in neighbours(&grid, c, r, eight_connected) {
                    let nidx = grid.index(nc, nr);
                    if !seen[nidx] && mask.is_set(nc, nr) {
                        seen[nidx] = true;
                        stack.push((nc, nr));
                    }
                }
            }
            regions.push(pixels);
        }
    }
    regions
}

static EDGE_OFFSETS: [(i64, i64); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
static CORNER_OFFSETS: [(i64, i64); 4] = [(-1, -1), (1, -1), (-1, 1), (1, 1)];

fn neighbours(
    grid: &PixelGrid,
    c: usize,
    r: usize,
    eight_connected: bool,
) -> impl Iterator<Item = (usize, usize)> {
    let (w, h) = (grid.width as i64, grid.height as i64);
    let corners: &[(i64, i64)] = if eight_connected { &CORNER_OFFSETS } else { &[] };
    EDGE_OFFSETS
        .iter()
        .chain(corners)
        .map(move |&(dc, dr)| (c as i64 + dc, r as i64 + dr))
        .filter(move |&(nc, nr)| nc >= 0 && nr >= 0 && nc < w && nr < h)
        .map(|(nc, nr)| (nc as usize, nr as usize))
}

/// Region index per pixel, `usize::MAX` for background
fn labels_of(regions: &[Vec<(usize, usize)>], grid: &PixelGrid) -> Vec<usize> {
    let mut labels = vec![usize::MAX; grid.len()];
    for (label, pixels) in regions.iter().enumerate() {
        for &(c, r) in pixels {
            labels[grid.index(c, r)] = label;
        }
    }
    labels
}

type Vertex = (usize, usize);

/// Direction of travel in lattice coordinates; row grows southwards
fn step(from: Vertex, to: Vertex) -> (i64, i64) {
    (
        to.0 as i64 - from.0 as i64,
        to.1 as i64 - from.1 as i64,
    )
}

/// Left turn with north up: east -> north -> west -> south -> east
fn left_of(d: (i64, i64)) -> (i64, i64) {
    (d.1, -d.0)
}

fn trace_region(
    grid: &PixelGrid,
    labels: &[usize],
    label: usize,
    pixels: &[(usize, usize)],
    eight_connected: bool,
) -> Polygon<f64> {
    let inside = |c: i64, r: i64| -> bool {
        c >= 0
            && r >= 0
            && (c as usize) < grid.width
            && (r as usize) < grid.height
            && labels[grid.index(c as usize, r as usize)] == label
    };

    // Directed boundary edges with the region on the left (geographic frame)
    let mut edges: Vec<(Vertex, Vertex)> = Vec::new();
    let mut outgoing: HashMap<Vertex, Vec<usize>> = HashMap::new();
    for &(col, row) in pixels {
        let (c, r) = (col as i64, row as i64);
        let mut add = |from: Vertex, to: Vertex| {
            outgoing.entry(from).or_default().push(edges.len());
            edges.push((from, to));
        };
        if !inside(c, r + 1) {
            add((col, row + 1), (col + 1, row + 1));
        }
        if !inside(c + 1, r) {
            add((col + 1, row + 1), (col + 1, row));
        }
        if !inside(c, r - 1) {
            add((col + 1, row), (col, row));
        }
        if !inside(c - 1, r) {
            add((col, row), (col, row + 1));
        }
    }

    // The turn rule pairs every incoming edge with exactly one outgoing edge
    // at its end vertex, so following it from any edge closes a cycle.
    let mut used = vec![false; edges.len()];
    let mut rings: Vec<Vec<Vertex>> = Vec::new();
    for first in 0..edges.len() {
        if used[first] {
            continue;
        }
        let mut ring = Vec::new();
        let mut e = first;
        loop {
            used[e] = true;
            let (from, to) = edges[e];
            ring.push(from);
            match next_edge(&edges, &outgoing, to, step(from, to), eight_connected) {
                Some(next) if next != first => e = next,
                _ => break,
            }
        }
        if eight_connected {
            rings.push(ring);
        } else {
            rings.extend(split_pinches(&ring));
        }
    }

    let mut exterior: Option<Vec<(f64, f64)>> = None;
    let mut holes = Vec::new();
    for ring in rings {
        let coords: Vec<(f64, f64)> = drop_collinear(&ring)
            .into_iter()
            .map(|(c, r)| grid.vertex(c, r))
            .collect();
        if exterior.is_none() && signed_ring_area(&coords) > 0.0 {
            exterior = Some(coords);
        } else {
            holes.push(coords);
        }
    }

    let to_line = |coords: Vec<(f64, f64)>| {
        LineString::from(
            coords
                .into_iter()
                .map(|(x, y)| Coord { x, y })
                .collect::<Vec<_>>(),
        )
    };
    Polygon::new(
        to_line(exterior.unwrap_or_default()),
        holes.into_iter().map(to_line).collect(),
    )
}

/// Outgoing edge at `at` for a walk arriving with `heading`. Only saddle
/// vertices offer a choice: right joins the diagonal pixel, left keeps it
/// apart.
fn next_edge(
    edges: &[(Vertex, Vertex)],
    outgoing: &HashMap<Vertex, Vec<usize>>,
    at: Vertex,
    heading: (i64, i64),
    turn_right: bool,
) -> Option<usize> {
    let candidates = outgoing.get(&at)?;
    let left = left_of(heading);
    let right = (-left.0, -left.1);
    let order = if turn_right {
        [right, heading, left]
    } else {
        [left, heading, right]
    };
    order.into_iter().find_map(|wanted| {
        candidates
            .iter()
            .copied()
            .find(|&e| step(at, edges[e].1) == wanted)
    })
}

/// Split a closed walk at every vertex it visits twice
fn split_pinches(ring: &[Vertex]) -> Vec<Vec<Vertex>> {
    let mut pieces = Vec::new();
    let mut open: Vec<Vertex> = Vec::with_capacity(ring.len());
    let mut position: HashMap<Vertex, usize> = HashMap::new();
    for &v in ring {
        if let Some(&start) = position.get(&v) {
            let piece = open.split_off(start);
            for u in &piece[1..] {
                position.remove(u);
            }
            pieces.push(piece);
        }
        position.insert(v, open.len());
        open.push(v);
    }
    pieces.push(open);
    pieces
}

/// Keep only the vertices where the ring changes direction
fn drop_collinear(ring: &[Vertex]) -> Vec<Vertex> {
    let n = ring.len();
    (0..n)
        .filter(|&i| {
            let prev = ring[(i + n - 1) % n];
            let next = ring[(i + 1) % n];
            step(prev, ring[i]) != step(ring[i], next)
        })
        .map(|i| ring[i])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_core::BoundingBox;

    fn mask_from(rows: &[&str]) -> ChangeMask {
        let height = rows.len();
        let width = rows[0].len();
        let bbox = BoundingBox::new(0.0, 0.0, width as f64 * 0.001, height as f64 * 0.001);
        let grid = PixelGrid::with_dims(bbox, width, height).unwrap();
        let flags: Vec<bool> = rows
            .iter()
            .flat_map(|r| r.chars().map(|ch| ch == '#'))
            .collect();
        ChangeMask::from_flags(grid, &flags)
    }

    fn vectorize(rows: &[&str]) -> ChangeFeatureCollection {
        VectorizeSpec::default().vectorize(&mask_from(rows)).unwrap()
    }

    fn vectorize_4(rows: &[&str]) -> ChangeFeatureCollection {
        let spec = VectorizeSpec {
            eight_connected: false,
            ..VectorizeSpec::default()
        };
        spec.vectorize(&mask_from(rows)).unwrap()
    }

    fn coords(ring: &LineString<f64>) -> Vec<(f64, f64)> {
        ring.0.iter().map(|c| (c.x, c.y)).collect()
    }

    #[test]
    fn test_single_pixel_is_closed_ccw_square() {
        let fc = vectorize(&["...", ".#.", "..."]);
        assert_eq!(fc.len(), 1);
        let ring = fc.features[0].polygon.exterior();
        assert!(ring.is_closed());
        assert_eq!(ring.0.len(), 5);
        let pts: Vec<(f64, f64)> = ring.0.iter().map(|c| (c.x, c.y)).collect();
        assert!(signed_ring_area(&pts[..4]) > 0.0);
        assert_eq!(fc.features[0].property_i64("deforestation"), Some(1));
        assert_eq!(fc.features[0].property_i64("pixel_count"), Some(1));
    }

    #[test]
    fn test_separate_regions() {
        let fc = vectorize(&["#..#", "#..#", "...."]);
        assert_eq!(fc.len(), 2);
        for f in &fc.features {
            assert_eq!(f.property_i64("pixel_count"), Some(2));
            // 1x2 rectangle after collinear removal
            assert_eq!(f.polygon.exterior().0.len(), 5);
        }
    }

    #[test]
    fn test_diagonal_pixels_join_by_default() {
        let fc = vectorize(&["#.", ".#"]);
        assert_eq!(fc.len(), 1);
        let polygon = &fc.features[0].polygon;
        assert_eq!(fc.features[0].property_i64("pixel_count"), Some(2));
        assert!(polygon.interiors().is_empty());
        // both squares, meeting once at the shared corner
        let ring = coords(polygon.exterior());
        assert_eq!(ring.len(), 9);
        assert!(signed_ring_area(&ring[..8]) > 0.0);
        let corner = mask_from(&["#.", ".#"]).grid.vertex(1, 1);
        assert_eq!(ring[..8].iter().filter(|&&p| p == corner).count(), 2);
    }

    #[test]
    fn test_diagonal_pixels_stay_separate_when_4_connected() {
        let fc = vectorize_4(&["#.", ".#"]);
        assert_eq!(fc.len(), 2);
        for f in &fc.features {
            assert_eq!(f.property_i64("pixel_count"), Some(1));
            assert_eq!(f.polygon.exterior().0.len(), 5);
        }
    }

    #[test]
    fn test_diagonal_chain_is_one_region() {
        let rows = ["#...", ".#..", "..#.", "...#"];
        assert_eq!(vectorize(&rows).len(), 1);
        assert_eq!(vectorize_4(&rows).len(), 4);
    }

    #[test]
    fn test_ring_with_hole() {
        let fc = vectorize(&["###", "#.#", "###"]);
        assert_eq!(fc.len(), 1);
        let polygon = &fc.features[0].polygon;
        assert_eq!(polygon.interiors().len(), 1);
        assert_eq!(polygon.exterior().0.len(), 5);
        let hole: Vec<(f64, f64)> = polygon.interiors()[0].0.iter().map(|c| (c.x, c.y)).collect();
        assert!(signed_ring_area(&hole[..hole.len() - 1]) < 0.0);
        assert_eq!(fc.features[0].property_i64("pixel_count"), Some(8));
    }

    #[test]
    fn test_holes_touching_at_saddle_are_separate_rings() {
        // the two gaps meet at a single vertex
        let rows = ["####", "#.##", "##.#", "####"];
        for fc in [vectorize(&rows), vectorize_4(&rows)] {
            assert_eq!(fc.len(), 1);
            let polygon = &fc.features[0].polygon;
            assert_eq!(polygon.exterior().0.len(), 5);
            assert_eq!(polygon.interiors().len(), 2);
            for hole in polygon.interiors() {
                let ring = coords(hole);
                assert_eq!(ring.len(), 5);
                assert!(signed_ring_area(&ring[..4]) < 0.0);
            }
        }
    }

    #[test]
    fn test_gap_reaching_out_diagonally_is_a_hole() {
        // the gap at (1,1) touches the outside only at one corner
        let rows = ["###.", "#.#.", "##.#", "...."];

        let fc = vectorize_4(&rows);
        assert_eq!(fc.len(), 2);
        let region = &fc.features[0].polygon;
        assert_eq!(fc.features[0].property_i64("pixel_count"), Some(7));
        assert_eq!(region.interiors().len(), 1);
        let ring = coords(region.exterior());
        assert!(signed_ring_area(&ring[..ring.len() - 1]) > 0.0);
        let hole = coords(&region.interiors()[0]);
        assert_eq!(hole.len(), 5);
        assert!(signed_ring_area(&hole[..4]) < 0.0);

        let fc = vectorize(&rows);
        assert_eq!(fc.len(), 1);
        assert_eq!(fc.features[0].property_i64("pixel_count"), Some(8));
        assert_eq!(fc.features[0].polygon.interiors().len(), 1);
    }


    #[test]
    fn test_l_shape_vertex_count() {
        let fc = vectorize(&["#..", "#..", "###"]);
        assert_eq!(fc.len(), 1);
        // six corners plus the closing point
        assert_eq!(fc.features[0].polygon.exterior().0.len(), 7);
    }

    #[test]
    fn test_empty_mask_gives_no_features() {
        let fc = vectorize(&["...", "..."]);
        assert!(fc.is_empty());
    }

    #[test]
    fn test_pixel_limit_is_hard_failure() {
        let spec = VectorizeSpec {
            max_pixels: 5.0,
            ..VectorizeSpec::default()
        };
        let err = spec.vectorize(&mask_from(&["###", "###"])).unwrap_err();
        assert_eq!(err.service_kind(), Some(ServiceErrorKind::PixelLimitExceeded));
    }

    #[test]
    fn test_min_area_filter() {
        let spec = VectorizeSpec {
            min_area_m2: 20_000.0,
            ..VectorizeSpec::default()
        };
        // each pixel is ~111 m x ~111 m, so one pixel is under 20 000 m2
        let fc = spec.vectorize(&mask_from(&["#...", "..##", "..##"])).unwrap();
        assert_eq!(fc.len(), 1);
        assert_eq!(fc.features[0].property_i64("pixel_count"), Some(4));
    }

    #[test]
    fn test_clipped_to_bbox() {
        let bbox = BoundingBox::new(-111.361, 57.36, -111.36, 57.44);
        let grid = PixelGrid::new(bbox, 10.0).unwrap();
        let flags = vec![true; grid.len()];
        let fc = VectorizeSpec::default()
            .vectorize(&ChangeMask::from_flags(grid, &flags))
            .unwrap();
        assert_eq!(fc.len(), 1);
        assert!(fc.within(&bbox));
        let ext = fc.features[0].polygon.exterior();
        assert_eq!(ext.0.len(), 5);
    }
}
