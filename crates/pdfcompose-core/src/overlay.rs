//! Overlay specifications and placement
//!
//! The UI describes overlays with a top-left origin and percentages of the
//! page size; PDF pages use a bottom-left origin in points. [`place`] is the
//! one place where that conversion happens.

use crate::error::{ComposeError, Result};
use crate::metrics::StandardFont;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Text appearance for text overlays.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TextStyle {
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    #[serde(default = "default_color")]
    pub color: String,
    /// UI font family; mapped onto the standard-14 fonts.
    #[serde(default)]
    pub font_name: Option<String>,
    #[serde(default)]
    pub is_bold: bool,
    #[serde(default)]
    pub is_italic: bool,
}

fn default_font_size() -> f64 {
    12.0
}

fn default_color() -> String {
    "#000000".to_string()
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: default_font_size(),
            color: default_color(),
            font_name: None,
            is_bold: false,
            is_italic: false,
        }
    }
}

impl TextStyle {
    pub fn font(&self) -> StandardFont {
        StandardFont::resolve(self.font_name.as_deref(), self.is_bold, self.is_italic)
    }

    /// Fill colour as RGB components in 0-1.
    pub fn rgb(&self) -> Result<(f32, f32, f32)> {
        parse_hex_color(&self.color)
            .ok_or_else(|| ComposeError::InvalidOverlay(format!("invalid color {}", self.color)))
    }
}

/// Parse `#RRGGBB` (or `RRGGBB`) into RGB floats in 0-1.
pub fn parse_hex_color(color: &str) -> Option<(f32, f32, f32)> {
    let hex = color.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16)
            .ok()
            .map(|v| v as f32 / 255.0)
    };
    Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// What an overlay draws.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind")]
pub enum OverlayContent {
    Text {
        text: String,
        #[serde(default)]
        style: TextStyle,
    },
    Image {
        /// PNG or JPEG container bytes (base64 in JSON).
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
        width: f64,
        height: f64,
    },
}

impl OverlayContent {
    /// Size of the content box in points.
    pub fn size(&self) -> (f64, f64) {
        match self {
            OverlayContent::Text { text, style } => {
                let font = style.font();
                (
                    font.text_width(text, style.font_size),
                    font.text_height(style.font_size),
                )
            }
            OverlayContent::Image { width, height, .. } => (*width, *height),
        }
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.trim())
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Align {
    #[default]
    Start,
    Center,
    End,
}

impl Align {
    fn factor(self) -> f64 {
        match self {
            Align::Start => 0.0,
            Align::Center => 0.5,
            Align::End => 1.0,
        }
    }

    fn margin_sign(self) -> f64 {
        match self {
            Align::Start => 1.0,
            Align::Center => 0.0,
            Align::End => -1.0,
        }
    }
}

/// Where the content box sits relative to the anchor.
///
/// Horizontal `Start` puts the box's left edge on the anchor; vertical
/// `Start` puts its top edge there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Alignment {
    #[serde(default)]
    pub horizontal: Align,
    #[serde(default)]
    pub vertical: Align,
}

/// Named anchor presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    TopLeft,
    TopCenter,
    TopRight,
    CenterLeft,
    Center,
    CenterRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl Anchor {
    pub const ALL: [Anchor; 9] = [
        Anchor::TopLeft,
        Anchor::TopCenter,
        Anchor::TopRight,
        Anchor::CenterLeft,
        Anchor::Center,
        Anchor::CenterRight,
        Anchor::BottomLeft,
        Anchor::BottomCenter,
        Anchor::BottomRight,
    ];

    fn axes(self) -> (Align, Align) {
        match self {
            Anchor::TopLeft => (Align::Start, Align::Start),
            Anchor::TopCenter => (Align::Center, Align::Start),
            Anchor::TopRight => (Align::End, Align::Start),
            Anchor::CenterLeft => (Align::Start, Align::Center),
            Anchor::Center => (Align::Center, Align::Center),
            Anchor::CenterRight => (Align::End, Align::Center),
            Anchor::BottomLeft => (Align::Start, Align::End),
            Anchor::BottomCenter => (Align::Center, Align::End),
            Anchor::BottomRight => (Align::End, Align::End),
        }
    }

    /// Percentages (top-left origin) and alignment for this preset.
    pub fn resolve(self) -> (f64, f64, Alignment) {
        let (horizontal, vertical) = self.axes();
        (
            horizontal.factor() * 100.0,
            vertical.factor() * 100.0,
            Alignment {
                horizontal,
                vertical,
            },
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Anchor::TopLeft => "top-left",
            Anchor::TopCenter => "top-center",
            Anchor::TopRight => "top-right",
            Anchor::CenterLeft => "center-left",
            Anchor::Center => "center",
            Anchor::CenterRight => "center-right",
            Anchor::BottomLeft => "bottom-left",
            Anchor::BottomCenter => "bottom-center",
            Anchor::BottomRight => "bottom-right",
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Anchor {
    type Err = ComposeError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Anchor::ALL
            .into_iter()
            .find(|a| a.as_str() == wanted)
            .ok_or_else(|| ComposeError::InvalidOverlay(format!("unknown anchor {}", s)))
    }
}

/// A validated overlay description.
///
/// Deserialisation accepts either explicit percentages or a named `anchor`
/// and runs [`OverlaySpec::validate`], so a deserialised spec is always clamped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "RawOverlaySpec")]
pub struct OverlaySpec {
    pub content: OverlayContent,
    pub anchor_x_percent: f64,
    pub anchor_y_percent: f64,
    pub rotation_degrees: f64,
    pub opacity: f64,
    pub alignment: Alignment,
    /// Inset in points applied away from the anchor for Start/End alignment.
    pub margin: f64,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOverlaySpec {
    content: OverlayContent,
    #[serde(default)]
    anchor: Option<Anchor>,
    #[serde(default)]
    anchor_x_percent: Option<f64>,
    #[serde(default)]
    anchor_y_percent: Option<f64>,
    #[serde(default)]
    rotation_degrees: f64,
    #[serde(default = "default_opacity")]
    opacity: f64,
    #[serde(default)]
    alignment: Option<Alignment>,
    #[serde(default)]
    margin: f64,
}

fn default_opacity() -> f64 {
    1.0
}

impl TryFrom<RawOverlaySpec> for OverlaySpec {
    type Error = ComposeError;

    fn try_from(raw: RawOverlaySpec) -> Result<Self> {
        let (x, y, alignment) = match (raw.anchor, raw.anchor_x_percent, raw.anchor_y_percent) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                return Err(ComposeError::InvalidOverlay(
                    "give either a named anchor or percentages, not both".into(),
                ))
            }
            (Some(anchor), None, None) => {
                let (x, y, alignment) = anchor.resolve();
                (x, y, raw.alignment.unwrap_or(alignment))
            }
            (None, x, y) => (
                x.unwrap_or(0.0),
                y.unwrap_or(0.0),
                raw.alignment.unwrap_or_default(),
            ),
        };

        OverlaySpec {
            content: raw.content,
            anchor_x_percent: x,
            anchor_y_percent: y,
            rotation_degrees: raw.rotation_degrees,
            opacity: raw.opacity,
            alignment,
            margin: raw.margin,
        }
        .validate()
    }
}

impl OverlaySpec {
    /// Overlay at explicit top-left-origin percentages.
    pub fn new(content: OverlayContent, anchor_x_percent: f64, anchor_y_percent: f64) -> Self {
        Self {
            content,
            anchor_x_percent,
            anchor_y_percent,
            rotation_degrees: 0.0,
            opacity: 1.0,
            alignment: Alignment::default(),
            margin: 0.0,
        }
    }

    /// Overlay at a named preset.
    pub fn at_anchor(content: OverlayContent, anchor: Anchor) -> Self {
        let (x, y, alignment) = anchor.resolve();
        Self {
            alignment,
            ..Self::new(content, x, y)
        }
    }

    pub fn with_rotation(mut self, degrees: f64) -> Self {
        self.rotation_degrees = degrees;
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Clamp percentages and opacity, reject non-finite values and empty content.
    pub fn validate(mut self) -> Result<Self> {
        let finite = |name: &str, value: f64| {
            if value.is_finite() {
                Ok(value)
            } else {
                Err(ComposeError::InvalidOverlay(format!("{} must be a number", name)))
            }
        };

        self.anchor_x_percent = finite("anchor_x_percent", self.anchor_x_percent)?.clamp(0.0, 100.0);
        self.anchor_y_percent = finite("anchor_y_percent", self.anchor_y_percent)?.clamp(0.0, 100.0);
        self.opacity = finite("opacity", self.opacity)?.clamp(0.0, 1.0);
        self.rotation_degrees = finite("rotation_degrees", self.rotation_degrees)?;
        self.margin = finite("margin", self.margin)?;
        if self.margin < 0.0 {
            return Err(ComposeError::InvalidOverlay("margin must not be negative".into()));
        }

        match &self.content {
            OverlayContent::Text { text, style } => {
                if text.is_empty() {
                    return Err(ComposeError::InvalidOverlay("text is empty".into()));
                }
                if !(style.font_size.is_finite() && style.font_size > 0.0) {
                    return Err(ComposeError::InvalidOverlay(format!(
                        "font size must be positive, got {}",
                        style.font_size
                    )));
                }
                style.rgb()?;
            }
            OverlayContent::Image {
                data,
                width,
                height,
            } => {
                if data.is_empty() {
                    return Err(ComposeError::InvalidOverlay("image data is empty".into()));
                }
                if !(width.is_finite() && *width > 0.0 && height.is_finite() && *height > 0.0) {
                    return Err(ComposeError::InvalidOverlay(format!(
                        "image size must be positive, got {}x{}",
                        width, height
                    )));
                }
            }
        }

        Ok(self)
    }
}

/// Placement in the page's native coordinate space (points, bottom-left origin).
///
/// `(x, y)` is the lower-left corner of the unrotated content box and the
/// pivot for `rotation`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AbsolutePosition {
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub width: f64,
    pub height: f64,
}

/// Convert a validated overlay spec into absolute placement on a page.
///
/// `page_width` and `page_height` are the page as displayed, with any
/// `/Rotate` already applied.
pub fn place(spec: &OverlaySpec, page_width: f64, page_height: f64) -> AbsolutePosition {
    let (width, height) = spec.content.size();
    let anchor_x = spec.anchor_x_percent.clamp(0.0, 100.0) / 100.0 * page_width;
    let anchor_y = spec.anchor_y_percent.clamp(0.0, 100.0) / 100.0 * page_height;

    let horizontal = spec.alignment.horizontal;
    let x = anchor_x - width * horizontal.factor() + spec.margin * horizontal.margin_sign();

    // Vertical alignment is measured downwards from the top edge
    let vertical = spec.alignment.vertical;
    let top = page_height - anchor_y;
    let y = top - height * (1.0 - vertical.factor()) - spec.margin * vertical.margin_sign();

    AbsolutePosition {
        x,
        y,
        rotation: spec.rotation_degrees,
        width,
        height,
    }
}
