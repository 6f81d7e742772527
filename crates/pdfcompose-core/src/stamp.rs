//! Overlay drawing
//!
//! Each overlay is drawn as a Form XObject that carries its own font, opacity
//! state and image. A stamped page gains one XObject name per overlay and two
//! content streams: a leading `q` and a trailing `Q` followed by the overlay
//! draws, so whatever graphics state the original content leaves behind never
//! leaks into the overlays.

use crate::error::{ComposeError, Result};
use crate::image::EmbeddedImage;
use crate::overlay::{place, AbsolutePosition, OverlayContent, OverlaySpec};
use crate::rotation::Rotation;
use crate::source::PageGeometry;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

/// An overlay that has been validated, decoded and placed on one page.
///
/// `position` is in the page's displayed frame, after `/Rotate`. `anchor` is
/// the same pivot in unrotated page space, relative to the crop box origin.
#[derive(Debug, Clone)]
pub struct PreparedOverlay {
    pub spec: OverlaySpec,
    pub position: AbsolutePosition,
    pub anchor: (f64, f64),
    pub page_rotation: Rotation,
    pub image: Option<EmbeddedImage>,
}

impl PreparedOverlay {
    /// Validate `spec` for output page `page` (1-based) and place it on
    /// `geometry` as the page is shown with `rotation` applied.
    pub fn prepare(
        spec: &OverlaySpec,
        geometry: &PageGeometry,
        rotation: Rotation,
        page: usize,
    ) -> Result<Self> {
        let spec = spec.clone().validate()?;
        let image = match &spec.content {
            OverlayContent::Image { data, .. } => Some(EmbeddedImage::decode(data, page)?),
            OverlayContent::Text { .. } => None,
        };

        let (w, h) = (geometry.width, geometry.height);
        let position = if rotation.is_quarter_turn() {
            place(&spec, h, w)
        } else {
            place(&spec, w, h)
        };
        // Viewers turn the page clockwise by `rotation` for display
        let (x, y) = (position.x, position.y);
        let anchor = match rotation {
            Rotation::R0 => (x, y),
            Rotation::R90 => (w - y, x),
            Rotation::R180 => (w - x, h - y),
            Rotation::R270 => (y, h - x),
        };

        Ok(Self {
            spec,
            position,
            anchor,
            page_rotation: rotation,
            image,
        })
    }

    /// `cm` operands taking form space to page space: translate to the
    /// anchor (offset by the crop box origin), then rotate about it so the
    /// overlay reads upright once the page rotation is applied.
    pub fn matrix(&self, origin: (f64, f64)) -> [f64; 6] {
        let degrees = self.position.rotation + self.page_rotation.degrees() as f64;
        let (sin, cos) = degrees.to_radians().sin_cos();
        [
            cos,
            sin,
            -sin,
            cos,
            self.anchor.0 + origin.0,
            self.anchor.1 + origin.1,
        ]
    }
}

/// Replace characters the standard fonts cannot show, and escape delimiters.
fn escape_pdf_string(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '(' => "\\(".to_string(),
            ')' => "\\)".to_string(),
            '\\' => "\\\\".to_string(),
            ' '..='~' => c.to_string(),
            _ => "?".to_string(),
        })
        .collect()
}

/// Compact number formatting for content streams.
fn num(value: f64) -> String {
    let text = format!("{:.4}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    match text {
        "" | "-0" => "0".to_string(),
        _ => text.to_string(),
    }
}

fn name(value: &str) -> Object {
    Object::Name(value.as_bytes().to_vec())
}

/// Write the overlay's Form XObject into `doc`.
pub fn add_overlay_form(doc: &mut Document, overlay: &PreparedOverlay) -> Result<ObjectId> {
    let width = overlay.position.width;
    let height = overlay.position.height;
    let opacity = overlay.spec.opacity as f32;

    let mut gs = Dictionary::new();
    gs.set("Type", name("ExtGState"));
    gs.set("ca", Object::Real(opacity));
    gs.set("CA", Object::Real(opacity));
    let mut ext_g_state = Dictionary::new();
    ext_g_state.set("GS0", Object::Dictionary(gs));

    let mut resources = Dictionary::new();
    resources.set("ExtGState", Object::Dictionary(ext_g_state));

    let content = match (&overlay.spec.content, &overlay.image) {
        (OverlayContent::Text { text, style }, _) => {
            let font = style.font();
            let (r, g, b) = style.rgb()?;

            let mut font_dict = Dictionary::new();
            font_dict.set("Type", name("Font"));
            font_dict.set("Subtype", name("Type1"));
            font_dict.set("BaseFont", name(font.base_font()));
            font_dict.set("Encoding", name("WinAnsiEncoding"));
            let mut fonts = Dictionary::new();
            fonts.set("F1", Object::Dictionary(font_dict));
            resources.set("Font", Object::Dictionary(fonts));

            format!(
                "/GS0 gs\n{r} {g} {b} rg\nBT\n/F1 {fs} Tf\n0 {ty} Td\n({text}) Tj\nET\n",
                r = num(r as f64),
                g = num(g as f64),
                b = num(b as f64),
                fs = num(style.font_size),
                ty = num(font.baseline_offset(style.font_size)),
                text = escape_pdf_string(text),
            )
        }
        (OverlayContent::Image { .. }, Some(image)) => {
            let image_id = image.add_to(doc);
            let mut xobjects = Dictionary::new();
            xobjects.set("Im0", Object::Reference(image_id));
            resources.set("XObject", Object::Dictionary(xobjects));

            format!(
                "/GS0 gs\nq\n{w} 0 0 {h} 0 0 cm\n/Im0 Do\nQ\n",
                w = num(width),
                h = num(height),
            )
        }
        (OverlayContent::Image { .. }, None) => {
            return Err(ComposeError::InvalidOverlay(
                "image overlay was not decoded".into(),
            ))
        }
    };

    let mut stream_dict = Dictionary::new();
    stream_dict.set("Type", name("XObject"));
    stream_dict.set("Subtype", name("Form"));
    stream_dict.set(
        "BBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(width as f32),
            Object::Real(height as f32),
        ]),
    );
    stream_dict.set("Resources", Object::Dictionary(resources));

    Ok(doc.add_object(Stream::new(stream_dict, content.into_bytes())))
}

/// A dictionary value as an owned, inline dictionary.
fn inline_dict(doc: &Document, value: Option<&Object>) -> Dictionary {
    match value {
        Some(Object::Dictionary(dict)) => dict.clone(),
        Some(Object::Reference(id)) => doc
            .get_dictionary(*id)
            .cloned()
            .unwrap_or_else(|_| Dictionary::new()),
        _ => Dictionary::new(),
    }
}

/// Existing content stream references of a page, in drawing order.
fn content_refs(doc: &Document, page: &Dictionary) -> Vec<Object> {
    match page.get(b"Contents") {
        Ok(Object::Array(items)) => items.clone(),
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        _ => Vec::new(),
    }
}

fn unused_name(xobjects: &Dictionary, start: usize) -> String {
    (start..)
        .map(|i| format!("PcOv{}", i))
        .find(|candidate| !xobjects.has(candidate.as_bytes()))
        .unwrap_or_else(|| format!("PcOv{}", start))
}

/// Draw `overlays` on top of the page `page_id` in `doc`.
///
/// The page's `/Resources` and `/XObject` dictionaries are made inline first,
/// since they may be shared with other pages.
pub fn stamp_page(
    doc: &mut Document,
    page_id: ObjectId,
    overlays: &[PreparedOverlay],
    origin: (f64, f64),
) -> Result<()> {
    if overlays.is_empty() {
        return Ok(());
    }

    let mut page = doc
        .get_dictionary(page_id)
        .map_err(|e| ComposeError::Serialization(e.to_string()))?
        .clone();

    let mut resources = inline_dict(doc, page.get(b"Resources").ok());
    let mut xobjects = inline_dict(doc, resources.get(b"XObject").ok());

    let mut draw = String::from("Q\n");
    for (i, overlay) in overlays.iter().enumerate() {
        let form_id = add_overlay_form(doc, overlay)?;
        let form_name = unused_name(&xobjects, i);
        let m = overlay.matrix(origin);
        draw.push_str(&format!(
            "q\n{} {} {} {} {} {} cm\n/{} Do\nQ\n",
            num(m[0]),
            num(m[1]),
            num(m[2]),
            num(m[3]),
            num(m[4]),
            num(m[5]),
            form_name
        ));
        xobjects.set(form_name, Object::Reference(form_id));
    }

    resources.set("XObject", Object::Dictionary(xobjects));
    page.set("Resources", Object::Dictionary(resources));

    let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let close_id = doc.add_object(Stream::new(Dictionary::new(), draw.into_bytes()));

    let mut contents = vec![Object::Reference(open_id)];
    contents.extend(content_refs(doc, &page));
    contents.push(Object::Reference(close_id));
    page.set("Contents", Object::Array(contents));

    doc.objects.insert(page_id, Object::Dictionary(page));
    Ok(())
}
