// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Test fixtures: in-memory PDFs, an in-memory page source and a scripted OCR
// backend. Compiled for tests and behind the `fixtures` feature.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use image::{DynamicImage, GrayImage, Luma};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use rentroll_core::error::{RentrollError, Result};

use crate::scan::backend::{OcrBackend, OcrOutput, OcrRequest};
use crate::source::PageSource;

// -- PDFs ------------------------------------------------------------------

enum FixturePage {
    Text(Vec<String>),
    Gray { width: u32, height: u32, value: u8 },
}

/// Builds small PDFs with either text-layer pages or single-image pages.
pub struct PdfBuilder {
    pages: Vec<FixturePage>,
    media_box: (i64, i64),
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self {
            pages: Vec::new(),
            media_box: (612, 792),
        }
    }

    /// Page size in points for every page. Small sizes keep rasters cheap.
    pub fn page_size(mut self, width: i64, height: i64) -> Self {
        self.media_box = (width, height);
        self
    }

    /// A page whose text layer holds `lines`, one text object per line.
    pub fn text_page(mut self, lines: &[&str]) -> Self {
        self.pages
            .push(FixturePage::Text(lines.iter().map(|l| l.to_string()).collect()));
        self
    }

    /// A scanned-style page: one uncompressed DeviceGray image, no text.
    pub fn gray_image_page(mut self, width: u32, height: u32, value: u8) -> Self {
        self.pages.push(FixturePage::Gray { width, height, value });
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id: ObjectId = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let (mw, mh) = self.media_box;
        let mut kids: Vec<Object> = Vec::new();
        for page in &self.pages {
            let (content, resources) = match page {
                FixturePage::Text(lines) => {
                    let mut ops = String::new();
                    for (i, line) in lines.iter().enumerate() {
                        let y = mh - 40 - 14 * i as i64;
                        ops.push_str(&format!(
                            "BT /F1 10 Tf 20 {} Td ({}) Tj ET\n",
                            y,
                            escape_pdf_string(line)
                        ));
                    }
                    let resources = dictionary! {
                        "Font" => Object::Dictionary(dictionary! { "F1" => font_id }),
                    };
                    (ops.into_bytes(), resources)
                }
                FixturePage::Gray { width, height, value } => {
                    let pixels = vec![*value; (*width * *height) as usize];
                    let image_id = doc.add_object(Object::Stream(Stream::new(
                        dictionary! {
                            "Type" => "XObject",
                            "Subtype" => "Image",
                            "Width" => *width as i64,
                            "Height" => *height as i64,
                            "ColorSpace" => "DeviceGray",
                            "BitsPerComponent" => 8i64,
                        },
                        pixels,
                    )));
                    let ops = format!("q {} 0 0 {} 0 0 cm /Im0 Do Q", mw, mh);
                    let resources = dictionary! {
                        "XObject" => Object::Dictionary(dictionary! { "Im0" => image_id }),
                    };
                    (ops.into_bytes(), resources)
                }
            };

            let content_id =
                doc.add_object(Object::Stream(Stream::new(lopdf::Dictionary::new(), content)));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), mw.into(), mh.into()],
                "Contents" => content_id,
                "Resources" => Object::Dictionary(resources),
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).expect("failed to save fixture PDF");
        buf
    }
}

fn escape_pdf_string(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}

/// One text-layer page per entry.
pub fn text_pdf(pages: &[&[&str]]) -> Vec<u8> {
    pages
        .iter()
        .fold(PdfBuilder::new(), |builder, lines| builder.text_page(lines))
        .build()
}

/// One uniform gray image page per `(width, height, value)`.
pub fn gray_image_pdf(pages: &[(u32, u32, u8)]) -> Vec<u8> {
    pages
        .iter()
        .fold(PdfBuilder::new(), |builder, &(w, h, v)| {
            builder.gray_image_page(w, h, v)
        })
        .build()
}

// -- Page source -----------------------------------------------------------

/// In-memory pages: a text layer and whether a raster exists.
pub struct MemorySource {
    pages: Vec<(String, bool)>,
    broken_text: HashSet<usize>,
}

impl MemorySource {
    pub fn new(pages: Vec<(String, bool)>) -> Self {
        Self {
            pages,
            broken_text: HashSet::new(),
        }
    }

    /// Text-only pages.
    pub fn text(pages: &[&str]) -> Self {
        Self::new(pages.iter().map(|t| (t.to_string(), false)).collect())
    }

    /// `count` image-only pages.
    pub fn scanned(count: usize) -> Self {
        Self::new(vec![(String::new(), true); count])
    }

    pub fn with_broken_text_layer(mut self, page: usize) -> Self {
        self.broken_text.insert(page);
        self
    }
}

impl PageSource for MemorySource {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn text_layer(&self, page: usize) -> Result<String> {
        if self.broken_text.contains(&page) {
            return Err(RentrollError::PdfError(format!("corrupt content stream on page {page}")));
        }
        self.pages
            .get(page)
            .map(|(text, _)| text.clone())
            .ok_or_else(|| RentrollError::PdfError(format!("page {page} out of range")))
    }

    /// A small white raster whose side grows with `dpi`.
    fn rasterize(&self, page: usize, dpi: u32) -> Result<DynamicImage> {
        match self.pages.get(page) {
            Some((_, true)) => {
                let side = (dpi / 4).max(8);
                Ok(DynamicImage::ImageLuma8(GrayImage::from_pixel(side, side, Luma([255]))))
            }
            _ => Err(RentrollError::ImageError(format!("page {page} has no raster image"))),
        }
    }
}

// -- OCR -------------------------------------------------------------------

#[derive(Clone)]
enum Script {
    Respond {
        text: String,
        confidence: f32,
        delay: Duration,
    },
    Fail(String),
}

/// OCR backend answering from a script keyed by (page, resolution).
#[derive(Default)]
pub struct ScriptedOcr {
    scripts: HashMap<(usize, u32), Script>,
    fallback: Option<Script>,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedOcr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, page: usize, resolution: u32, text: &str, confidence: f32) -> Self {
        self.respond_slowly(page, resolution, text, confidence, Duration::ZERO)
    }

    pub fn respond_slowly(
        mut self,
        page: usize,
        resolution: u32,
        text: &str,
        confidence: f32,
        delay: Duration,
    ) -> Self {
        self.scripts.insert(
            (page, resolution),
            Script::Respond {
                text: text.to_string(),
                confidence,
                delay,
            },
        );
        self
    }

    pub fn fail(mut self, page: usize, resolution: u32, reason: &str) -> Self {
        self.scripts
            .insert((page, resolution), Script::Fail(reason.to_string()));
        self
    }

    /// Answer for every unscripted (page, resolution).
    pub fn fallback(mut self, text: &str, confidence: f32) -> Self {
        self.fallback = Some(Script::Respond {
            text: text.to_string(),
            confidence,
            delay: Duration::ZERO,
        });
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most calls that were ever running at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl OcrBackend for ScriptedOcr {
    fn recognize(&self, _image: &DynamicImage, request: OcrRequest) -> Result<OcrOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        let output = self.answer(request);
        self.active.fetch_sub(1, Ordering::SeqCst);
        output
    }
}

impl ScriptedOcr {
    fn answer(&self, request: OcrRequest) -> Result<OcrOutput> {
        let script = self
            .scripts
            .get(&(request.page, request.resolution))
            .or(self.fallback.as_ref())
            .cloned();
        match script {
            Some(Script::Respond {
                text,
                confidence,
                delay,
            }) => {
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                Ok(OcrOutput { text, confidence })
            }
            Some(Script::Fail(reason)) => Err(RentrollError::OcrError(reason)),
            None => Err(RentrollError::OcrError(format!(
                "no scripted response for page {} at {} dpi",
                request.page, request.resolution
            ))),
        }
    }
}
