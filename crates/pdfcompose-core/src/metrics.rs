//! Standard-14 font metrics used to size text overlays
//!
//! Widths are in thousandths of the font size for the printable ASCII range
//! (space through tilde). Anything outside that range is written as `?`.

use serde::{Deserialize, Serialize};

#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[rustfmt::skip]
const TIMES_ROMAN: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

const COURIER_WIDTH: u16 = 600;

/// The standard-14 text fonts every PDF reader provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StandardFont {
    #[default]
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Helvetica,
    Times,
    Courier,
}

impl StandardFont {
    /// PostScript name used for `/BaseFont`.
    pub fn base_font(self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
            StandardFont::HelveticaOblique => "Helvetica-Oblique",
            StandardFont::HelveticaBoldOblique => "Helvetica-BoldOblique",
            StandardFont::TimesRoman => "Times-Roman",
            StandardFont::TimesBold => "Times-Bold",
            StandardFont::TimesItalic => "Times-Italic",
            StandardFont::TimesBoldItalic => "Times-BoldItalic",
            StandardFont::Courier => "Courier",
            StandardFont::CourierBold => "Courier-Bold",
            StandardFont::CourierOblique => "Courier-Oblique",
            StandardFont::CourierBoldOblique => "Courier-BoldOblique",
        }
    }

    fn family(self) -> Family {
        match self {
            StandardFont::Helvetica
            | StandardFont::HelveticaBold
            | StandardFont::HelveticaOblique
            | StandardFont::HelveticaBoldOblique => Family::Helvetica,
            StandardFont::TimesRoman
            | StandardFont::TimesBold
            | StandardFont::TimesItalic
            | StandardFont::TimesBoldItalic => Family::Times,
            _ => Family::Courier,
        }
    }

    fn is_bold(self) -> bool {
        matches!(
            self,
            StandardFont::HelveticaBold
                | StandardFont::HelveticaBoldOblique
                | StandardFont::TimesBold
                | StandardFont::TimesBoldItalic
                | StandardFont::CourierBold
                | StandardFont::CourierBoldOblique
        )
    }

    /// Pick a standard font from a UI font family name and style flags.
    ///
    /// CSS generic families and common system fonts map onto the closest
    /// standard family; anything unknown falls back to Helvetica.
    pub fn resolve(family: Option<&str>, bold: bool, italic: bool) -> Self {
        let lower = family.unwrap_or("").to_lowercase();
        let bold = bold || lower.contains("bold");
        let italic = italic || lower.contains("italic") || lower.contains("oblique");

        let family = if lower == "serif"
            || lower.contains("times")
            || lower.contains("georgia")
            || lower.contains("garamond")
        {
            Family::Times
        } else if lower == "monospace"
            || lower.contains("courier")
            || lower.contains("mono")
            || lower.contains("consolas")
            || lower.contains("monaco")
        {
            Family::Courier
        } else {
            Family::Helvetica
        };

        match (family, bold, italic) {
            (Family::Times, true, true) => StandardFont::TimesBoldItalic,
            (Family::Times, true, false) => StandardFont::TimesBold,
            (Family::Times, false, true) => StandardFont::TimesItalic,
            (Family::Times, false, false) => StandardFont::TimesRoman,
            (Family::Courier, true, true) => StandardFont::CourierBoldOblique,
            (Family::Courier, true, false) => StandardFont::CourierBold,
            (Family::Courier, false, true) => StandardFont::CourierOblique,
            (Family::Courier, false, false) => StandardFont::Courier,
            (Family::Helvetica, true, true) => StandardFont::HelveticaBoldOblique,
            (Family::Helvetica, true, false) => StandardFont::HelveticaBold,
            (Family::Helvetica, false, true) => StandardFont::HelveticaOblique,
            (Family::Helvetica, false, false) => StandardFont::Helvetica,
        }
    }

    /// Advance width of one character in thousandths of the font size.
    pub fn char_width(self, c: char) -> u16 {
        let c = if (' '..='~').contains(&c) { c } else { '?' };
        let index = c as usize - ' ' as usize;
        match self.family() {
            // Times variants share the roman widths
            Family::Times => TIMES_ROMAN[index],
            Family::Courier => COURIER_WIDTH,
            Family::Helvetica if self.is_bold() => HELVETICA_BOLD[index],
            Family::Helvetica => HELVETICA[index],
        }
    }

    /// Ascender and descender in thousandths of the font size.
    pub fn ascent_descent(self) -> (i32, i32) {
        match self.family() {
            Family::Helvetica => (718, -207),
            Family::Times => (683, -217),
            Family::Courier => (629, -157),
        }
    }

    /// Width of `text` set at `size` points.
    pub fn text_width(self, text: &str, size: f64) -> f64 {
        let units: u32 = text.chars().map(|c| self.char_width(c) as u32).sum();
        units as f64 * size / 1000.0
    }

    /// Height from descender to ascender at `size` points.
    pub fn text_height(self, size: f64) -> f64 {
        let (ascent, descent) = self.ascent_descent();
        (ascent - descent) as f64 * size / 1000.0
    }

    /// Distance from the bottom of the text box up to the baseline.
    pub fn baseline_offset(self, size: f64) -> f64 {
        let (_, descent) = self.ascent_descent();
        -(descent as f64) * size / 1000.0
    }
}
