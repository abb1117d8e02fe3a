//! Token extraction: the page's text layer → word tokens in raster pixel space.
//!
//! pdfium exposes the text layer one character at a time, each with its own
//! bounding box in PDF user space (points, bottom-left origin), interleaved
//! with characters it generates itself: spaces between words and `\r\n` at
//! line ends. This module turns that stream into words (one token per run of
//! non-whitespace characters), annotates each with block / line / position
//! hints, and rescales its box into the pixel grid of a page rendered at the
//! same [`Dpi`]. Boxes are taken relative to the crop box and turned by the
//! page's `/Rotate`, as pdfium renders it ([`PageFrame`]).
//!
//! Whitespace, generated or not, only separates words; it never becomes a
//! token. A page without a text layer yields no tokens.

use crate::config::Dpi;
use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};

/// A positioned word handed to the recognizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// `[x0, y0, x1, y1]` in pixels, top-left origin, same grid as the page image.
    pub bbox: [i32; 4],
    pub text: String,
    /// Reserved for semantic markers; always 0.
    pub flags: u32,
    pub block_num: u32,
    pub line_num: u32,
    pub span_num: u32,
}

/// A rectangle in PDF points with a top-left origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointRect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl PointRect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    fn union(self, other: PointRect) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    fn height(self) -> f32 {
        self.y1 - self.y0
    }

    fn center_y(self) -> f32 {
        (self.y0 + self.y1) / 2.0
    }

    /// Scale into the pixel grid of a page rendered at `dpi`.
    pub fn to_pixels(self, dpi: Dpi) -> [i32; 4] {
        [
            dpi.to_pixels(self.x0),
            dpi.to_pixels(self.y0),
            dpi.to_pixels(self.x1),
            dpi.to_pixels(self.y1),
        ]
    }
}

/// The visible area of a page and how it is turned for display.
///
/// pdfium reports character bounds in PDF user space, but renders only the
/// crop box, turned clockwise by the page's `/Rotate`. Words are grouped in
/// [`upright`](Self::upright) space (crop-relative, top-left origin, not yet
/// turned) so that reading order stays horizontal, then
/// [`orient`](Self::orient)ed into the rendered image's frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageFrame {
    left: f32,
    bottom: f32,
    width: f32,
    height: f32,
    quarter_turns: u8,
}

impl PageFrame {
    /// `left`/`bottom`/`right`/`top` is the crop box in user space;
    /// `rotation_degrees` is the page's `/Rotate`, rounded down to a quarter turn.
    pub fn new(left: f32, bottom: f32, right: f32, top: f32, rotation_degrees: i32) -> Self {
        let rect = PointRect::new(left, bottom, right, top);
        Self {
            left: rect.x0,
            bottom: rect.y0,
            width: rect.x1 - rect.x0,
            height: rect.y1 - rect.y0,
            quarter_turns: rotation_degrees.div_euclid(90).rem_euclid(4) as u8,
        }
    }

    /// Read the crop box (clipped to the media box) and rotation of `page`.
    pub fn of_page(page: &PdfPage) -> Self {
        let boundaries = page.boundaries();
        let media = boundaries.media().ok().map(|b| b.bounds);
        let crop = boundaries.crop().ok().map(|b| b.bounds);
        let rotation = match page.rotation() {
            Ok(PdfPageRenderRotation::Degrees90) => 90,
            Ok(PdfPageRenderRotation::Degrees180) => 180,
            Ok(PdfPageRenderRotation::Degrees270) => 270,
            _ => 0,
        };

        let edges = |r: PdfRect| (r.left().value, r.bottom().value, r.right().value, r.top().value);
        let (left, bottom, right, top) = match (crop.map(edges), media.map(edges)) {
            (Some(c), Some(m)) => (c.0.max(m.0), c.1.max(m.1), c.2.min(m.2), c.3.min(m.3)),
            (Some(r), None) | (None, Some(r)) => r,
            // Width and height are already turned; nothing left to undo.
            (None, None) => return Self::new(0.0, 0.0, page.width().value, page.height().value, 0),
        };
        Self::new(left, bottom, right, top, rotation)
    }

    /// Size of the displayed page in points, after rotation.
    pub fn size(&self) -> (f32, f32) {
        if self.quarter_turns % 2 == 1 {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }

    /// pdfium bounds (bottom-left origin) → crop-relative, top-left origin, unturned.
    pub fn upright(&self, left: f32, top: f32, right: f32, bottom: f32) -> PointRect {
        PointRect::new(
            left - self.left,
            self.bottom + self.height - top,
            right - self.left,
            self.bottom + self.height - bottom,
        )
    }

    /// Turn an [`upright`](Self::upright) rect clockwise into display space.
    pub fn orient(&self, rect: PointRect) -> PointRect {
        let (w, h) = (self.width, self.height);
        let turn = |x: f32, y: f32| match self.quarter_turns {
            1 => (h - y, x),
            2 => (w - x, h - y),
            3 => (y, w - x),
            _ => (x, y),
        };
        let (ax, ay) = turn(rect.x0, rect.y0);
        let (bx, by) = turn(rect.x1, rect.y1);
        PointRect::new(ax, ay, bx, by)
    }
}

/// One character of the text layer.
///
/// `rect` is `None` when pdfium cannot report bounds, which happens for the
/// whitespace it synthesises.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextChar {
    pub ch: char,
    pub rect: Option<PointRect>,
}

impl TextChar {
    pub fn new(ch: char, rect: PointRect) -> Self {
        Self { ch, rect: Some(rect) }
    }
}

/// A word in point space with its grouping hints.
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub rect: PointRect,
    pub text: String,
    pub block_num: u32,
    pub line_num: u32,
    /// Position of the word within its line.
    pub span_num: u32,
}

impl Word {
    pub fn to_token(&self, dpi: Dpi) -> Token {
        Token {
            bbox: self.rect.to_pixels(dpi),
            text: self.text.clone(),
            flags: 0,
            block_num: self.block_num,
            line_num: self.line_num,
            span_num: self.span_num,
        }
    }
}

#[derive(Default)]
struct WordGrouper {
    words: Vec<Word>,
    text: String,
    rect: Option<PointRect>,
    line_band: Option<PointRect>,
    line_break_pending: bool,
    block_num: u32,
    line_num: u32,
    span_num: u32,
}

impl WordGrouper {
    fn push(&mut self, c: TextChar) {
        if c.ch == '\n' || c.ch == '\r' {
            self.flush();
            self.line_break_pending = true;
            return;
        }
        if c.ch.is_whitespace() || c.ch.is_control() {
            self.flush();
            return;
        }
        let Some(rect) = c.rect else {
            return;
        };

        match self.line_band {
            None => self.line_band = Some(rect),
            Some(band) => {
                let leaves_band = rect.center_y() < band.y0 || rect.center_y() > band.y1;
                if self.line_break_pending || leaves_band {
                    self.flush();
                    self.start_line(band, rect);
                } else {
                    self.line_band = Some(band.union(rect));
                }
            }
        }
        self.line_break_pending = false;

        self.text.push(c.ch);
        self.rect = Some(match self.rect {
            Some(r) => r.union(rect),
            None => rect,
        });
    }

    /// Move to a new line; a large gap or an upward jump also opens a new block.
    fn start_line(&mut self, previous: PointRect, first: PointRect) {
        let above = first.y1 <= previous.y0;
        let gap = first.y0 - previous.y1;
        if above || gap > previous.height() {
            self.block_num += 1;
            self.line_num = 0;
        } else {
            self.line_num += 1;
        }
        self.span_num = 0;
        self.line_band = Some(first);
    }

    fn flush(&mut self) {
        if let Some(rect) = self.rect.take() {
            if !self.text.is_empty() {
                self.words.push(Word {
                    rect,
                    text: std::mem::take(&mut self.text),
                    block_num: self.block_num,
                    line_num: self.line_num,
                    span_num: self.span_num,
                });
                self.span_num += 1;
            }
        }
        self.text.clear();
    }

    fn finish(mut self) -> Vec<Word> {
        self.flush();
        self.words
    }
}

/// Group a character stream into words, in text-layer order.
pub fn group_words(chars: impl IntoIterator<Item = TextChar>) -> Vec<Word> {
    let mut grouper = WordGrouper::default();
    for c in chars {
        grouper.push(c);
    }
    grouper.finish()
}

/// Read one page's text layer and return its word tokens scaled to `dpi`.
pub fn extract_tokens(page: &PdfPage, dpi: Dpi) -> Result<Vec<Token>, PdfiumError> {
    let frame = PageFrame::of_page(page);
    let text = page.text()?;
    let chars = text.chars();

    let words = group_words(chars.iter().filter_map(|c| {
        let ch = c.unicode_char()?;
        let rect = c.loose_bounds().ok().map(|b| {
            frame.upright(b.left().value, b.top().value, b.right().value, b.bottom().value)
        });
        Some(TextChar { ch, rect })
    }));

    Ok(tokens_in_frame(words, &frame, dpi))
}

/// Turn upright words into display space and scale them to `dpi`.
pub fn tokens_in_frame(words: Vec<Word>, frame: &PageFrame, dpi: Dpi) -> Vec<Token> {
    words
        .into_iter()
        .map(|w| {
            Word {
                rect: frame.orient(w.rect),
                ..w
            }
            .to_token(dpi)
        })
        .collect()
}
