//! Single-image and indicator SVG documents.

use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::text::{TextOverlay, escape_xml, overlay_svg, shadow_filter_def};

pub const CANVAS: u32 = 144;
pub const LIVE_COLOR: &str = "#53fc18";
pub const OFFLINE_COLOR: &str = "#ff0000";
pub const FLASH_COLOR: &str = LIVE_COLOR;
pub const BACKGROUND_COLOR: &str = "#000000";
pub const BORDER_WIDTH: u32 = 2;
pub const BORDER_RADIUS: u32 = 16;

pub const GRAYSCALE_ID: &str = "grayscale";

pub fn border_color(live: bool) -> &'static str {
    if live { LIVE_COLOR } else { OFFLINE_COLOR }
}

pub fn grayscale_filter_def() -> String {
    format!(
        r#"<filter id="{GRAYSCALE_ID}"><feColorMatrix type="saturate" values="0"/></filter>"#
    )
}

pub(crate) fn open_svg() -> String {
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{CANVAS}" height="{CANVAS}" viewBox="0 0 {CANVAS} {CANVAS}">"#
    )
}

pub(crate) fn background() -> String {
    format!(r#"<rect width="{CANVAS}" height="{CANVAS}" fill="{BACKGROUND_COLOR}"/>"#)
}

/// Base64 `data:image/svg+xml` URI for an SVG document.
pub fn svg_data_uri(svg: &str) -> String {
    format!("data:image/svg+xml;base64,{}", STANDARD.encode(svg))
}

/// Bordered square with the image clipped to a rounded rect.
///
/// `image` must already be an embeddable URI. Offline images are desaturated.
pub fn single_svg(image: &str, live: bool, overlay: Option<&TextOverlay>) -> String {
    let overlay = overlay.filter(|o| !o.is_empty());
    let inset = BORDER_WIDTH;
    let inner = CANVAS - 2 * inset;
    let inner_radius = BORDER_RADIUS - 1;

    let mut defs = format!(
        r#"<clipPath id="image-clip"><rect x="{inset}" y="{inset}" width="{inner}" height="{inner}" rx="{inner_radius}" ry="{inner_radius}"/></clipPath>"#
    );
    if !live {
        defs.push_str(&grayscale_filter_def());
    }
    if overlay.is_some() {
        defs.push_str(&shadow_filter_def());
    }

    let filter = if live {
        String::new()
    } else {
        format!(r#" filter="url(#{GRAYSCALE_ID})""#)
    };

    let mut svg = open_svg();
    svg.push_str(&format!("<defs>{defs}</defs>"));
    svg.push_str(&background());
    svg.push_str(&format!(
        r#"<image href="{href}" x="{inset}" y="{inset}" width="{inner}" height="{inner}" preserveAspectRatio="xMidYMid slice" clip-path="url(#image-clip)"{filter}/>"#,
        href = escape_xml(image),
    ));

    if let Some(overlay) = overlay {
        // Dim the picture so white text stays legible.
        svg.push_str(&format!(
            r##"<rect x="{inset}" y="{inset}" width="{inner}" height="{inner}" fill="#000000" fill-opacity="0.35" clip-path="url(#image-clip)"/>"##
        ));
        svg.push_str(&overlay_svg(overlay));
    }

    svg.push_str(&format!(
        r#"<rect x="1" y="1" width="{size}" height="{size}" rx="{BORDER_RADIUS}" ry="{BORDER_RADIUS}" fill="none" stroke="{color}" stroke-width="{BORDER_WIDTH}"/>"#,
        size = CANVAS - 2,
        color = border_color(live),
    ));
    svg.push_str("</svg>");
    svg
}

fn indicator_svg(color: &str) -> String {
    format!(
        r#"{open}{bg}<rect x="1" y="1" width="{size}" height="{size}" rx="{BORDER_RADIUS}" ry="{BORDER_RADIUS}" fill="none" stroke="{color}" stroke-width="{BORDER_WIDTH}"/><circle cx="72" cy="72" r="24" fill="{color}"/></svg>"#,
        open = open_svg(),
        bg = background(),
        size = CANVAS - 2,
    )
}

fn solid_square_svg(color: &str) -> String {
    format!(
        r#"{open}<rect x="1" y="1" width="{size}" height="{size}" rx="{BORDER_RADIUS}" ry="{BORDER_RADIUS}" fill="{color}"/></svg>"#,
        open = open_svg(),
        size = CANVAS - 2,
    )
}

static LIVE_INDICATOR: LazyLock<String> =
    LazyLock::new(|| svg_data_uri(&indicator_svg(LIVE_COLOR)));
static OFFLINE_INDICATOR: LazyLock<String> =
    LazyLock::new(|| svg_data_uri(&indicator_svg(OFFLINE_COLOR)));
static FLASH_SQUARE: LazyLock<String> =
    LazyLock::new(|| svg_data_uri(&solid_square_svg(FLASH_COLOR)));

/// Static green image for a live button without a picture.
pub fn live_indicator() -> &'static str {
    LIVE_INDICATOR.as_str()
}

/// Static red image for offline, error and not-found states.
pub fn offline_indicator() -> &'static str {
    OFFLINE_INDICATOR.as_str()
}

pub fn indicator(live: bool) -> &'static str {
    if live {
        live_indicator()
    } else {
        offline_indicator()
    }
}

/// Solid rounded square shown on the "on" frames of an alert.
pub fn flash_square() -> &'static str {
    FLASH_SQUARE.as_str()
}

#[cfg(test)]
pub(crate) fn decode_data_uri(uri: &str) -> String {
    let encoded = uri
        .strip_prefix("data:image/svg+xml;base64,")
        .expect("svg data uri");
    String::from_utf8(STANDARD.decode(encoded).expect("valid base64")).expect("utf8 svg")
}
