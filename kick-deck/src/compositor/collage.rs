//! Multi-channel collage geometry.
//!
//! Layouts by tile count:
//!
//! - 2: vertical halves
//! - 3: inverted Y, one top wedge and two lower wedges
//! - 4: quadrants
//!
//! Clip paths meet exactly on shared edges. Border paths are pulled back by
//! [`BORDER_GAP`] from every shared edge so neighbouring strokes do not bleed
//! into each other, and follow the outer corners with radius [`CORNER_RADIUS`].

use super::svg::{
    FLASH_COLOR, GRAYSCALE_ID, BORDER_WIDTH, background, border_color, grayscale_filter_def,
    open_svg,
};
use super::text::{TextOverlay, escape_xml, overlay_svg, shadow_filter_def};

pub const MAX_TILES: usize = 4;
pub const CORNER_RADIUS: u32 = 15;
pub const BORDER_GAP: f64 = 0.5;

const MID: f64 = 72.0;
/// Where the inverted-Y arms meet the outer edge, below the top corner arcs.
const Y_JUNCTION: f64 = 17.0;

/// One prepared collage tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    /// Embeddable image URI; `None` leaves the tile dark.
    pub image: Option<String>,
    pub live: bool,
    pub flashing: bool,
}

/// Outline of tile `index` out of `count`, shrunk by `gap` along shared edges.
pub fn tile_path(count: usize, index: usize, gap: f64) -> Option<String> {
    let l = MID - gap;
    let r = MID + gap;
    let path = match (count, index) {
        (2, 0) => format!("M {l} 1 H 16 A 15 15 0 0 0 1 16 V 128 A 15 15 0 0 0 16 143 H {l} Z"),
        (2, 1) => {
            format!("M {r} 1 H 128 A 15 15 0 0 1 143 16 V 128 A 15 15 0 0 1 128 143 H {r} Z")
        }
        (3, 0) => format!(
            "M 1 {jt} L 72 {l} L 143 {jt} V 16 A 15 15 0 0 0 128 1 H 16 A 15 15 0 0 0 1 16 Z",
            jt = Y_JUNCTION - gap,
        ),
        (3, 1) => format!(
            "M 1 {jb} L {l} {r} V 143 H 16 A 15 15 0 0 1 1 128 Z",
            jb = Y_JUNCTION + gap,
        ),
        (3, 2) => format!(
            "M 143 {jb} L {r} {r} V 143 H 128 A 15 15 0 0 0 143 128 Z",
            jb = Y_JUNCTION + gap,
        ),
        (4, 0) => format!("M {l} 1 H 16 A 15 15 0 0 0 1 16 V {l} H {l} Z"),
        (4, 1) => format!("M {r} 1 H 128 A 15 15 0 0 1 143 16 V {l} H {r} Z"),
        (4, 2) => format!("M 1 {r} V 128 A 15 15 0 0 0 16 143 H {l} V {r} Z"),
        (4, 3) => format!("M 143 {r} V 128 A 15 15 0 0 1 128 143 H {r} V {r} Z"),
        _ => return None,
    };
    Some(path)
}

/// Bounding box `(x, y, width, height)` the tile's picture is fitted into.
fn tile_bounds(count: usize, index: usize) -> (f64, f64, f64, f64) {
    match (count, index) {
        (2, 0) => (1.0, 1.0, 71.0, 142.0),
        (2, 1) => (72.0, 1.0, 71.0, 142.0),
        (3, 0) => (1.0, 1.0, 142.0, 71.0),
        (3, 1) => (1.0, Y_JUNCTION, 71.0, 143.0 - Y_JUNCTION),
        (3, 2) => (72.0, Y_JUNCTION, 71.0, 143.0 - Y_JUNCTION),
        (4, 0) => (1.0, 1.0, 71.0, 71.0),
        (4, 1) => (72.0, 1.0, 71.0, 71.0),
        (4, 2) => (1.0, 72.0, 71.0, 71.0),
        (4, 3) => (72.0, 72.0, 71.0, 71.0),
        _ => (1.0, 1.0, 142.0, 142.0),
    }
}

/// Compose 2 to 4 tiles into one SVG document.
///
/// Extra tiles beyond [`MAX_TILES`] are ignored. Callers route the
/// single-tile case to the single-image renderer.
pub fn collage_svg(tiles: &[Tile], overlay: Option<&TextOverlay>) -> String {
    let tiles = &tiles[..tiles.len().min(MAX_TILES)];
    let count = tiles.len();
    let overlay = overlay.filter(|o| !o.is_empty());

    let mut defs = String::new();
    if tiles.iter().any(|t| !t.live && !t.flashing && t.image.is_some()) {
        defs.push_str(&grayscale_filter_def());
    }
    if overlay.is_some() {
        defs.push_str(&shadow_filter_def());
    }

    let mut fills = String::new();
    let mut borders = String::new();

    for (i, tile) in tiles.iter().enumerate() {
        let (Some(clip), Some(border)) = (tile_path(count, i, 0.0), tile_path(count, i, BORDER_GAP))
        else {
            continue;
        };

        defs.push_str(&format!(
            r#"<clipPath id="tile-clip-{i}"><path d="{clip}"/></clipPath>"#
        ));

        let fill = match (&tile.image, tile.flashing) {
            (_, true) => FLASH_COLOR.to_string(),
            (Some(image), false) => {
                let (x, y, w, h) = tile_bounds(count, i);
                let filter = if tile.live {
                    String::new()
                } else {
                    format!(r#" filter="url(#{GRAYSCALE_ID})""#)
                };
                defs.push_str(&format!(
                    r#"<pattern id="tile-fill-{i}" patternUnits="userSpaceOnUse" x="0" y="0" width="144" height="144"><image href="{href}" x="{x}" y="{y}" width="{w}" height="{h}" preserveAspectRatio="xMidYMid slice"{filter}/></pattern>"#,
                    href = escape_xml(image),
                ));
                format!("url(#tile-fill-{i})")
            }
            (None, false) => "#1a1a1a".to_string(),
        };

        fills.push_str(&format!(
            r#"<rect width="144" height="144" fill="{fill}" clip-path="url(#tile-clip-{i})"/>"#
        ));
        borders.push_str(&format!(
            r#"<path class="tile-border" d="{border}" fill="none" stroke="{color}" stroke-width="{BORDER_WIDTH}" stroke-linejoin="round"/>"#,
            color = border_color(tile.live),
        ));
    }

    let mut svg = open_svg();
    svg.push_str(&format!("<defs>{defs}</defs>"));
    svg.push_str(&background());
    svg.push_str(&fills);
    if let Some(overlay) = overlay {
        svg.push_str(&overlay_svg(overlay));
    }
    svg.push_str(&borders);
    svg.push_str("</svg>");
    svg
}
