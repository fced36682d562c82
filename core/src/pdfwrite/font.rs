//! Font embedding: unsubsetted TTF regular (required) and bold (optional),
//! each exposed as a lopdf Type0/CIDFontType2 font with an Identity-H
//! encoding and an Identity CIDToGIDMap, so a glyph id doubles as its own
//! character code. Falls back to the standard Helvetica font if either
//! embed fails.

use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::warn;
use ttf_parser::Face;

pub struct LoadedFont {
    pub resource_name: String,
    data: Vec<u8>,
    is_embedded: bool,
}

impl LoadedFont {
    /// Glyph ids for each character, used both to measure text with
    /// [`super::wrap::char_width`] and to build the hex-encoded Tj operand.
    pub fn face(&self) -> Option<Face<'_>> {
        if self.is_embedded {
            Face::parse(&self.data, 0).ok()
        } else {
            None
        }
    }

    /// Encodes `text` as the 2-byte-per-glyph hex string a Type0/Identity-H
    /// font expects. Characters missing from the face are skipped.
    pub fn encode_hex(&self, text: &str) -> String {
        let Some(face) = self.face() else {
            // Helvetica fallback: Latin-1 code points as single-byte codes.
            return text.chars().map(|c| format!("{:02x}", c as u32 & 0xff)).collect();
        };
        let mut hex = String::new();
        for ch in text.chars() {
            if let Some(glyph_id) = face.glyph_index(ch) {
                hex.push_str(&format!("{:04x}", glyph_id.0));
            }
        }
        hex
    }

    fn embed(
        &self,
        doc: &mut Document,
        resource_name: &str,
        base_font: &str,
    ) -> anyhow::Result<ObjectId> {
        if !self.is_embedded {
            let font_dict = Dictionary::from_iter([
                ("Type", Object::Name(b"Font".to_vec())),
                ("Subtype", Object::Name(b"Type1".to_vec())),
                ("BaseFont", Object::Name(base_font.as_bytes().to_vec())),
            ]);
            return Ok(doc.add_object(Object::Dictionary(font_dict)));
        }

        let font_file = Stream::new(
            Dictionary::from_iter([("Length1", Object::Integer(self.data.len() as i64))]),
            self.data.clone(),
        );
        let font_file_id = doc.add_object(Object::Stream(font_file));

        let descriptor = Dictionary::from_iter([
            ("Type", Object::Name(b"FontDescriptor".to_vec())),
            ("FontName", Object::Name(base_font.as_bytes().to_vec())),
            ("Flags", Object::Integer(4)),
            ("FontBBox", Object::Array(vec![(-1000).into(), (-1000).into(), 2000.into(), 2000.into()])),
            ("ItalicAngle", Object::Integer(0)),
            ("Ascent", Object::Integer(1000)),
            ("Descent", Object::Integer(-200)),
            ("CapHeight", Object::Integer(1000)),
            ("StemV", Object::Integer(80)),
            ("FontFile2", Object::Reference(font_file_id)),
        ]);
        let descriptor_id = doc.add_object(Object::Dictionary(descriptor));

        let cid_font = Dictionary::from_iter([
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"CIDFontType2".to_vec())),
            ("BaseFont", Object::Name(base_font.as_bytes().to_vec())),
            (
                "CIDSystemInfo",
                Object::Dictionary(Dictionary::from_iter([
                    ("Registry", Object::string_literal("Adobe")),
                    ("Ordering", Object::string_literal("Identity")),
                    ("Supplement", Object::Integer(0)),
                ])),
            ),
            ("FontDescriptor", Object::Reference(descriptor_id)),
            ("CIDToGIDMap", Object::Name(b"Identity".to_vec())),
            ("DW", Object::Integer(1000)),
        ]);
        let cid_font_id = doc.add_object(Object::Dictionary(cid_font));

        let type0 = Dictionary::from_iter([
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type0".to_vec())),
            ("BaseFont", Object::Name(base_font.as_bytes().to_vec())),
            ("Encoding", Object::Name(b"Identity-H".to_vec())),
            ("DescendantFonts", Object::Array(vec![Object::Reference(cid_font_id)])),
        ]);
        Ok(doc.add_object(Object::Dictionary(type0)))
    }
}

/// Loads a TTF from disk for embedding. The returned font is marked
/// not-embedded (Helvetica) if the file cannot be read or parsed, so
/// callers always get a usable font rather than a propagated error.
pub fn load_or_fallback(path: Option<&Path>, resource_name: &str) -> LoadedFont {
    match path.map(std::fs::read) {
        Some(Ok(data)) if Face::parse(&data, 0).is_ok() => LoadedFont {
            resource_name: resource_name.to_string(),
            data,
            is_embedded: true,
        },
        Some(Ok(_)) => {
            warn!(path = ?path, "font file is not a valid TTF, falling back to Helvetica");
            helvetica(resource_name)
        }
        Some(Err(err)) => {
            warn!(path = ?path, %err, "failed to read font file, falling back to Helvetica");
            helvetica(resource_name)
        }
        None => helvetica(resource_name),
    }
}

fn helvetica(resource_name: &str) -> LoadedFont {
    LoadedFont {
        resource_name: resource_name.to_string(),
        data: Vec::new(),
        is_embedded: false,
    }
}

/// Registers the font in the document and returns its object id, to be
/// wired into a page's `/Resources /Font` dictionary by the caller.
pub fn embed_in_document(
    font: &LoadedFont,
    doc: &mut Document,
    base_font_name: &str,
) -> anyhow::Result<ObjectId> {
    font.embed(doc, &font.resource_name, base_font_name)
}
