use sha2::Digest as _;

use crate::color::Rgba;
use crate::error::FolioResult;
use crate::model::Align;

/// Options for a text paint operation.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TextOptions {
    pub align: Align,
    /// Extra gap between lines, derived from the element's line height.
    pub line_gap: f64,
    /// Flow width of the text box.
    pub width: f64,
    pub underline: bool,
}

/// Target box of an image or vector paint operation.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BoxSize {
    pub width: f64,
    pub height: f64,
}

/// Abstract output sink accepting ordered drawing operations that compose
/// into the final document.
///
/// The scene compiler is written against this interface only; concrete
/// writers (the PDF backend, the recording surface) implement it. Calls
/// arrive strictly in document order and are never revisited. The
/// transform stack (`save`/`translate`/`rotate`/`restore`) brackets every
/// element, including ones whose paint step fails.
pub trait PaintSurface {
    fn begin_document(&mut self, width: f64, height: f64) -> FolioResult<()>;
    fn begin_page(&mut self) -> FolioResult<()>;
    fn end_page(&mut self) -> FolioResult<()>;

    fn register_font(&mut self, family: &str, bytes: &[u8]) -> FolioResult<()>;
    fn set_font(&mut self, family: &str, size: f64) -> FolioResult<()>;
    fn set_fill_color(&mut self, color: Rgba) -> FolioResult<()>;

    fn draw_text(&mut self, text: &str, x: f64, y: f64, options: &TextOptions) -> FolioResult<()>;
    fn draw_image(&mut self, bytes: &[u8], x: f64, y: f64, size: BoxSize) -> FolioResult<()>;
    fn draw_vector(&mut self, markup: &str, x: f64, y: f64, size: BoxSize) -> FolioResult<()>;

    fn translate(&mut self, x: f64, y: f64) -> FolioResult<()>;
    fn rotate(&mut self, degrees: f64) -> FolioResult<()>;
    fn save(&mut self) -> FolioResult<()>;
    fn restore(&mut self) -> FolioResult<()>;

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: Rgba)
    -> FolioResult<()>;
    fn stroke_line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, width: f64) -> FolioResult<()>;

    fn end(&mut self) -> FolioResult<()>;
}

/// One recorded paint operation. Asset payloads are captured as length +
/// SHA-256 so op streams stay compact but remain content-sensitive.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PaintOp {
    BeginDocument {
        width: f64,
        height: f64,
    },
    BeginPage,
    EndPage,
    RegisterFont {
        family: String,
        bytes_len: usize,
        bytes_sha256: String,
    },
    SetFont {
        family: String,
        size: f64,
    },
    SetFillColor {
        color: Rgba,
    },
    DrawText {
        text: String,
        x: f64,
        y: f64,
        options: TextOptions,
    },
    DrawImage {
        bytes_len: usize,
        bytes_sha256: String,
        x: f64,
        y: f64,
        size: BoxSize,
    },
    DrawVector {
        markup: String,
        x: f64,
        y: f64,
        size: BoxSize,
    },
    Translate {
        x: f64,
        y: f64,
    },
    Rotate {
        degrees: f64,
    },
    Save,
    Restore,
    FillRect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: Rgba,
    },
    StrokeLine {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        width: f64,
    },
    End,
}

/// Paint surface that records every call. Backs the compiler tests, the
/// determinism fingerprint and the CLI op dump.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    ops: Vec<PaintOp>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[PaintOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<PaintOp> {
        self.ops
    }
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let digest = sha2::Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

impl PaintSurface for RecordingSurface {
    fn begin_document(&mut self, width: f64, height: f64) -> FolioResult<()> {
        self.ops.push(PaintOp::BeginDocument { width, height });
        Ok(())
    }

    fn begin_page(&mut self) -> FolioResult<()> {
        self.ops.push(PaintOp::BeginPage);
        Ok(())
    }

    fn end_page(&mut self) -> FolioResult<()> {
        self.ops.push(PaintOp::EndPage);
        Ok(())
    }

    fn register_font(&mut self, family: &str, bytes: &[u8]) -> FolioResult<()> {
        self.ops.push(PaintOp::RegisterFont {
            family: family.to_string(),
            bytes_len: bytes.len(),
            bytes_sha256: sha256_hex(bytes),
        });
        Ok(())
    }

    fn set_font(&mut self, family: &str, size: f64) -> FolioResult<()> {
        self.ops.push(PaintOp::SetFont {
            family: family.to_string(),
            size,
        });
        Ok(())
    }

    fn set_fill_color(&mut self, color: Rgba) -> FolioResult<()> {
        self.ops.push(PaintOp::SetFillColor { color });
        Ok(())
    }

    fn draw_text(&mut self, text: &str, x: f64, y: f64, options: &TextOptions) -> FolioResult<()> {
        self.ops.push(PaintOp::DrawText {
            text: text.to_string(),
            x,
            y,
            options: options.clone(),
        });
        Ok(())
    }

    fn draw_image(&mut self, bytes: &[u8], x: f64, y: f64, size: BoxSize) -> FolioResult<()> {
        self.ops.push(PaintOp::DrawImage {
            bytes_len: bytes.len(),
            bytes_sha256: sha256_hex(bytes),
            x,
            y,
            size,
        });
        Ok(())
    }

    fn draw_vector(&mut self, markup: &str, x: f64, y: f64, size: BoxSize) -> FolioResult<()> {
        self.ops.push(PaintOp::DrawVector {
            markup: markup.to_string(),
            x,
            y,
            size,
        });
        Ok(())
    }

    fn translate(&mut self, x: f64, y: f64) -> FolioResult<()> {
        self.ops.push(PaintOp::Translate { x, y });
        Ok(())
    }

    fn rotate(&mut self, degrees: f64) -> FolioResult<()> {
        self.ops.push(PaintOp::Rotate { degrees });
        Ok(())
    }

    fn save(&mut self) -> FolioResult<()> {
        self.ops.push(PaintOp::Save);
        Ok(())
    }

    fn restore(&mut self) -> FolioResult<()> {
        self.ops.push(PaintOp::Restore);
        Ok(())
    }

    fn fill_rect(
        &mut self,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: Rgba,
    ) -> FolioResult<()> {
        self.ops.push(PaintOp::FillRect {
            x,
            y,
            width,
            height,
            color,
        });
        Ok(())
    }

    fn stroke_line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, width: f64) -> FolioResult<()> {
        self.ops.push(PaintOp::StrokeLine {
            x1,
            y1,
            x2,
            y2,
            width,
        });
        Ok(())
    }

    fn end(&mut self) -> FolioResult<()> {
        self.ops.push(PaintOp::End);
        Ok(())
    }
}
