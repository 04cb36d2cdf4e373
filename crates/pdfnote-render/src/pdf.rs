//! PDF assembly for flattened pages.

use crate::callout::CalloutLayout;
use kurbo::Size;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, StringFormat, dictionary};

const IMAGE_NAME: &str = "Im0";
const FONT_NAME: &str = "F1";

/// WinAnsiEncoding code for a character outside Latin-1.
fn win_ansi_extra(c: char) -> Option<u8> {
    Some(match c {
        '\u{20ac}' => 0x80,
        '\u{201a}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201e}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02c6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8a,
        '\u{2039}' => 0x8b,
        '\u{0152}' => 0x8c,
        '\u{017d}' => 0x8e,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201c}' => 0x93,
        '\u{201d}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02dc}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9a,
        '\u{203a}' => 0x9b,
        '\u{0153}' => 0x9c,
        '\u{017e}' => 0x9e,
        '\u{0178}' => 0x9f,
        _ => return None,
    })
}

/// Encode text for Helvetica with WinAnsiEncoding. Unmappable characters
/// become `?`; the flag is false when that happened.
fn win_ansi(text: &str) -> (Vec<u8>, bool) {
    let mut lossless = true;
    let bytes = text
        .chars()
        .map(|c| match c as u32 {
            0x20..=0x7e | 0xa0..=0xff => c as u8,
            _ => win_ansi_extra(c).unwrap_or_else(|| {
                lossless = false;
                b'?'
            }),
        })
        .collect();
    (bytes, lossless)
}

/// UTF-16BE with a byte order mark, for PDF text strings.
fn utf16_text(text: &str) -> Vec<u8> {
    let mut bytes = vec![0xfe, 0xff];
    bytes.extend(text.encode_utf16().flat_map(u16::to_be_bytes));
    bytes
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

/// Builds a PDF of full-page JPEG images with callout text on top.
pub struct PdfWriter {
    doc: Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    kids: Vec<Object>,
}

impl PdfWriter {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        Self {
            doc,
            pages_id,
            font_id,
            kids: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Append a page of `size` points showing `jpeg` (`pixels` wide and high)
    /// stretched over the whole page.
    ///
    /// Callouts are in raster pixels; `scale` maps them back to points.
    /// When the text is already painted into the image, pass
    /// `text_visible = false` to keep it as an invisible, searchable layer.
    /// Lines Helvetica cannot show carry their real text as `ActualText`.
    pub fn add_page(
        &mut self,
        size: Size,
        pixels: (u32, u32),
        jpeg: Vec<u8>,
        callouts: &[CalloutLayout],
        scale: f64,
        text_visible: bool,
    ) -> Result<(), lopdf::Error> {
        let image_id = self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => pixels.0 as i64,
                "Height" => pixels.1 as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8_i64,
                "Filter" => "DCTDecode",
            },
            jpeg,
        ));

        let mut operations = vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    real(size.width),
                    Object::Integer(0),
                    Object::Integer(0),
                    real(size.height),
                    Object::Integer(0),
                    Object::Integer(0),
                ],
            ),
            Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ];
        for callout in callouts {
            let color = callout.callout.text_color;
            let font_size = callout.callout.font_size / scale;
            for (origin, line) in callout.baselines() {
                if line.is_empty() {
                    continue;
                }
                let (encoded, lossless) = win_ansi(line);
                if !lossless {
                    operations.push(Operation::new(
                        "BDC",
                        vec![
                            Object::Name(b"Span".to_vec()),
                            Object::Dictionary(dictionary! {
                                "ActualText" => Object::String(utf16_text(line), StringFormat::Hexadecimal),
                            }),
                        ],
                    ));
                }
                operations.extend([
                    Operation::new("BT", vec![]),
                    Operation::new(
                        "Tf",
                        vec![Object::Name(FONT_NAME.as_bytes().to_vec()), real(font_size)],
                    ),
                    Operation::new("Tr", vec![Object::Integer(if text_visible { 0 } else { 3 })]),
                    Operation::new(
                        "rg",
                        vec![
                            real(color.r as f64 / 255.0),
                            real(color.g as f64 / 255.0),
                            real(color.b as f64 / 255.0),
                        ],
                    ),
                    Operation::new(
                        "Td",
                        vec![real(origin.x / scale), real(size.height - origin.y / scale)],
                    ),
                    Operation::new("Tj", vec![Object::String(encoded, StringFormat::Literal)]),
                    Operation::new("ET", vec![]),
                ]);
                if !lossless {
                    operations.push(Operation::new("EMC", vec![]));
                }
            }
        }
        let content = Content { operations }.encode()?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), real(size.width), real(size.height)],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { IMAGE_NAME => image_id },
                "Font" => dictionary! { FONT_NAME => self.font_id },
            },
        });
        self.kids.push(page_id.into());
        Ok(())
    }

    /// Serialize the document.
    pub fn finish(mut self) -> Result<Vec<u8>, lopdf::Error> {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        self.doc.save_to(&mut bytes)?;
        Ok(bytes)
    }
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_win_ansi_replaces_unmappable() {
        assert_eq!(win_ansi("Caf\u{e9} \u{2713}"), (b"Caf\xe9 ?".to_vec(), false));
    }

    #[test]
    fn test_win_ansi_maps_typographic_punctuation() {
        let (bytes, lossless) = win_ansi("\u{201c}Fix\u{201d} \u{2014} \u{20ac}5 \u{2026} it\u{2019}s \u{2122}");
        assert!(lossless);
        assert_eq!(bytes, b"\x93Fix\x94 \x97 \x805 \x85 it\x92s \x99".to_vec());
    }

    fn callout(text: &str) -> CalloutLayout {
        CalloutLayout::new(pdfnote_core::projection::Callout::above(
            kurbo::Rect::new(20.0, 100.0, 400.0, 150.0),
            1.0,
            text.to_string(),
            pdfnote_core::shapes::SerializableColor::black(),
        ))
    }

    fn page_operations(callouts: &[CalloutLayout], text_visible: bool) -> Vec<Operation> {
        let mut writer = PdfWriter::new();
        writer
            .add_page(Size::new(612.0, 792.0), (2, 2), vec![0xff, 0xd8], callouts, 1.0, text_visible)
            .unwrap();
        let doc = Document::load_mem(&writer.finish().unwrap()).unwrap();
        let page = doc.get_pages()[&1];
        Content::decode(&doc.get_page_content(page).unwrap()).unwrap().operations
    }

    #[test]
    fn test_unmappable_line_keeps_actual_text() {
        let ops = page_operations(&[callout("\u{8bf7}\u{68c0}\u{67e5} ok")], true);
        let marked = ops.iter().find(|op| op.operator == "BDC").unwrap();
        let properties = marked.operands[1].as_dict().unwrap();
        let Object::String(actual, _) = properties.get(b"ActualText").unwrap() else {
            panic!("ActualText is not a string");
        };
        assert_eq!(actual, &utf16_text("\u{8bf7}\u{68c0}\u{67e5} ok"));
        assert!(ops.iter().any(|op| op.operator == "EMC"));
    }

    #[test]
    fn test_mappable_line_has_no_marked_content() {
        let ops = page_operations(&[callout("plain \u{2014} text")], true);
        assert!(!ops.iter().any(|op| op.operator == "BDC"));
    }

    #[test]
    fn test_painted_text_is_invisible() {
        let mode = |ops: Vec<Operation>| {
            ops.into_iter()
                .find(|op| op.operator == "Tr")
                .and_then(|op| op.operands[0].as_i64().ok())
        };
        assert_eq!(mode(page_operations(&[callout("note")], false)), Some(3));
        assert_eq!(mode(page_operations(&[callout("note")], true)), Some(0));
    }

    #[test]
    fn test_pages_keep_point_size() {
        let mut writer = PdfWriter::new();
        writer
            .add_page(Size::new(792.0, 612.0), (2, 2), vec![0xff, 0xd8], &[], 2.0, true)
            .unwrap();
        assert_eq!(writer.page_count(), 1);
        let bytes = writer.finish().unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);
        let page = doc.get_dictionary(pages[&1]).unwrap();
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        let width = media_box[2].as_float().unwrap();
        let height = media_box[3].as_float().unwrap();
        assert!(width > height);
    }
}
