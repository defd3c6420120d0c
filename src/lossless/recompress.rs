//! Lopdf structural recompressor
//!
//! Parses the PDF with lopdf, rewrites its streams according to the profile
//! directives and re-saves it, optionally with object streams.

use std::collections::BTreeSet;
use std::io::{Cursor, Read, Write};

use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use image::ExtendedColorType;
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId, SaveOptions, Stream};

use super::{Directive, Recompressor};
use crate::config::defaults::{DEFAULT_COMPRESSION_LEVEL, OPTIMIZED_IMAGE_QUALITY};
use crate::error::RecompressError;
use crate::lossy::encoder::encode_jpeg;

/// Directives folded into flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RewritePlan {
    compress_streams: bool,
    recompress_flate: bool,
    level: u8,
    object_streams: bool,
    normalize_content: bool,
    optimize_images: bool,
}

impl RewritePlan {
    fn from_directives(directives: &[Directive]) -> Self {
        let mut plan = Self {
            compress_streams: false,
            recompress_flate: false,
            level: DEFAULT_COMPRESSION_LEVEL,
            object_streams: false,
            normalize_content: false,
            optimize_images: false,
        };

        for directive in directives {
            match *directive {
                Directive::CompressStreams => plan.compress_streams = true,
                Directive::RecompressFlate => plan.recompress_flate = true,
                Directive::CompressionLevel(level) => plan.level = level.min(9),
                Directive::GenerateObjectStreams => plan.object_streams = true,
                Directive::NormalizeContent => plan.normalize_content = true,
                Directive::OptimizeImages => plan.optimize_images = true,
            }
        }

        plan
    }
}

/// Recompressor backed by lopdf and flate2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LopdfRecompressor {
    /// JPEG quality for the optimize-images directive
    pub image_quality: u8,
}

impl Default for LopdfRecompressor {
    fn default() -> Self {
        Self {
            image_quality: OPTIMIZED_IMAGE_QUALITY,
        }
    }
}

impl Recompressor for LopdfRecompressor {
    fn run(&self, input: &[u8], directives: &[Directive]) -> Result<Vec<u8>, RecompressError> {
        let plan = RewritePlan::from_directives(directives);

        let mut doc =
            Document::load_mem(input).map_err(|e| RecompressError::Load(e.to_string()))?;

        doc.prune_objects();
        doc.delete_zero_length_streams();

        if plan.normalize_content {
            let count = normalize_page_content(&mut doc);
            log::debug!("Normalized {} content streams", count);
        }

        if plan.optimize_images {
            let count = optimize_images(&mut doc, self.image_quality);
            log::debug!("Re-encoded {} images as JPEG", count);
        }

        let level = Compression::new(u32::from(plan.level));
        let mut rewritten = 0;
        for object in doc.objects.values_mut() {
            if let Object::Stream(stream) = object {
                if rewrite_stream(stream, &plan, level)? {
                    rewritten += 1;
                }
            }
        }
        log::debug!("Rewrote {} streams at level {}", rewritten, plan.level);

        save(&mut doc, &plan)
    }
}

/// Filter names of a stream; `None` when the Filter entry is not a plain name list
fn stream_filters(dict: &Dictionary) -> Option<Vec<Vec<u8>>> {
    match dict.get(b"Filter") {
        Err(_) => Some(Vec::new()),
        Ok(Object::Name(name)) => Some(vec![name.clone()]),
        Ok(Object::Array(items)) => items
            .iter()
            .map(|item| item.as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        Ok(_) => None,
    }
}

fn deflate(data: &[u8], level: Compression) -> Result<Vec<u8>, RecompressError> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), level);
    encoder
        .write_all(data)
        .map_err(|e| RecompressError::Rewrite(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| RecompressError::Rewrite(e.to_string()))
}

fn inflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut plain = Vec::new();
    ZlibDecoder::new(data).read_to_end(&mut plain)?;
    Ok(plain)
}

/// Deflate or re-deflate one stream, keeping the new encoding only when smaller
fn rewrite_stream(
    stream: &mut Stream,
    plan: &RewritePlan,
    level: Compression,
) -> Result<bool, RecompressError> {
    if !stream.allows_compression {
        return Ok(false);
    }

    let Some(filters) = stream_filters(&stream.dict) else {
        return Ok(false);
    };

    match filters.as_slice() {
        [] if plan.compress_streams => {
            let deflated = deflate(&stream.content, level)?;
            if deflated.len() < stream.content.len() {
                stream
                    .dict
                    .set("Filter", Object::Name(b"FlateDecode".to_vec()));
                stream.set_content(deflated);
                return Ok(true);
            }
        }
        [name]
            if plan.recompress_flate
                && name.as_slice() == b"FlateDecode"
                && !stream.dict.has(b"DecodeParms") =>
        {
            // Corrupt Flate data is left alone
            let Ok(plain) = inflate(&stream.content) else {
                return Ok(false);
            };
            let deflated = deflate(&plain, level)?;
            if deflated.len() < stream.content.len() {
                stream.set_content(deflated);
                return Ok(true);
            }
        }
        _ => {}
    }

    Ok(false)
}

/// True if the content carries an inline image (BI ... ID ... EI)
fn has_inline_image(data: &[u8]) -> bool {
    data.windows(4).any(|w| {
        w[0].is_ascii_whitespace() && &w[1..3] == b"BI" && w[3].is_ascii_whitespace()
    }) || data.starts_with(b"BI")
}

/// Re-encode single-stream page contents through the lopdf content parser.
///
/// Pages with several content streams are skipped: operands may be split
/// across stream boundaries.
fn normalize_page_content(doc: &mut Document) -> usize {
    let content_ids: BTreeSet<ObjectId> = doc
        .get_pages()
        .values()
        .filter_map(|page_id| {
            let contents = doc.get_page_contents(*page_id);
            match contents.as_slice() {
                [single] => Some(*single),
                _ => None,
            }
        })
        .collect();

    let mut normalized = 0;
    for id in content_ids {
        let Ok(stream) = doc.get_object_mut(id).and_then(Object::as_stream_mut) else {
            continue;
        };
        if normalize_stream(stream) {
            normalized += 1;
        }
    }
    normalized
}

fn normalize_stream(stream: &mut Stream) -> bool {
    let data = if stream.dict.has(b"Filter") {
        match stream.decompressed_content() {
            Ok(data) => data,
            Err(_) => return false,
        }
    } else {
        stream.content.clone()
    };

    if has_inline_image(&data) {
        return false;
    }

    let Ok(content) = Content::decode(&data) else {
        return false;
    };
    // The parser stops quietly at tokens it cannot read; a short parse would
    // drop the rest of the page
    if count_operators(&data) != Some(content.operations.len()) {
        return false;
    }
    let Ok(encoded) = content.encode() else {
        return false;
    };

    stream.dict.remove(b"Filter");
    stream.dict.remove(b"DecodeParms");
    stream.set_content(encoded);
    true
}

fn is_delimiter(byte: u8) -> bool {
    matches!(byte, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn is_pdf_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | b'\x0C' | b'\0')
}

/// Count operator keywords in a content stream, skipping comments, strings,
/// names, numbers and the keywords `true`, `false` and `null`.
///
/// `None` when a string or hex string is left unterminated.
fn count_operators(data: &[u8]) -> Option<usize> {
    let mut operators = 0;
    let mut pos = 0;

    while pos < data.len() {
        let byte = data[pos];
        match byte {
            _ if is_pdf_whitespace(byte) => pos += 1,
            b'%' => {
                while pos < data.len() && data[pos] != b'\n' && data[pos] != b'\r' {
                    pos += 1;
                }
            }
            b'(' => {
                let mut depth = 0usize;
                loop {
                    let &c = data.get(pos)?;
                    pos += 1;
                    match c {
                        b'\\' => pos += 1,
                        b'(' => depth += 1,
                        b')' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                }
            }
            b'<' if data.get(pos + 1) == Some(&b'<') => pos += 2,
            b'>' if data.get(pos + 1) == Some(&b'>') => pos += 2,
            b'<' => {
                let end = data[pos..].iter().position(|&c| c == b'>')?;
                pos += end + 1;
            }
            b'[' | b']' | b'{' | b'}' | b')' | b'>' => pos += 1,
            _ => {
                let start = pos;
                pos += 1;
                while pos < data.len() && !is_pdf_whitespace(data[pos]) && !is_delimiter(data[pos]) {
                    pos += 1;
                }
                let token = &data[start..pos];
                let is_operand = matches!(token[0], b'/' | b'0'..=b'9' | b'+' | b'-' | b'.')
                    || matches!(token, b"true" | b"false" | b"null");
                if !is_operand {
                    operators += 1;
                }
            }
        }
    }

    Some(operators)
}

/// Image entries that rule out a plain JPEG re-encode
const MASK_KEYS: &[&[u8]] = &[b"SMask", b"Mask", b"DecodeParms", b"Decode", b"ImageMask"];

fn dict_int(dict: &Dictionary, key: &[u8]) -> Option<i64> {
    dict.get(key).and_then(Object::as_i64).ok()
}

fn dict_name<'a>(dict: &'a Dictionary, key: &[u8]) -> Option<&'a [u8]> {
    dict.get(key).and_then(Object::as_name).ok()
}

/// JPEG bytes for a raw 8-bit RGB/gray Flate image, if that encoding is smaller
fn jpeg_replacement(stream: &Stream, quality: u8) -> Option<Vec<u8>> {
    let dict = &stream.dict;

    if dict_name(dict, b"Subtype")? != b"Image".as_slice() {
        return None;
    }
    if MASK_KEYS.iter().any(|key| dict.has(key)) {
        return None;
    }
    if dict_int(dict, b"BitsPerComponent")? != 8 {
        return None;
    }
    if stream_filters(dict)? != [b"FlateDecode".to_vec()] {
        return None;
    }

    let (color, channels) = match dict_name(dict, b"ColorSpace")? {
        b"DeviceRGB" => (ExtendedColorType::Rgb8, 3),
        b"DeviceGray" => (ExtendedColorType::L8, 1),
        _ => return None,
    };

    let width = u32::try_from(dict_int(dict, b"Width")?).ok()?;
    let height = u32::try_from(dict_int(dict, b"Height")?).ok()?;
    if width == 0 || height == 0 || width > u32::from(u16::MAX) || height > u32::from(u16::MAX) {
        return None;
    }

    let expected = width as usize * height as usize * channels;
    let pixels = inflate(&stream.content).ok()?;
    if pixels.len() < expected {
        return None;
    }

    let jpeg = encode_jpeg(&pixels[..expected], width, height, color, quality).ok()?;
    (jpeg.len() < stream.content.len()).then_some(jpeg)
}

fn optimize_images(doc: &mut Document, quality: u8) -> usize {
    let mut replaced = 0;
    for object in doc.objects.values_mut() {
        let Object::Stream(stream) = object else {
            continue;
        };
        if let Some(jpeg) = jpeg_replacement(stream, quality) {
            stream.dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
            stream.set_content(jpeg);
            replaced += 1;
        }
    }
    replaced
}

fn save(doc: &mut Document, plan: &RewritePlan) -> Result<Vec<u8>, RecompressError> {
    if plan.object_streams {
        // Object streams need PDF 1.5
        if doc.version.as_str() < "1.5" {
            doc.version = "1.5".to_string();
        }

        let options = SaveOptions::builder()
            .use_object_streams(true)
            .use_xref_streams(true)
            .build();

        let mut buffer = Vec::new();
        doc.save_with_options(&mut buffer, options)
            .map_err(|e| RecompressError::Save(e.to_string()))?;
        Ok(buffer)
    } else {
        let mut output = Cursor::new(Vec::new());
        doc.save_to(&mut output)
            .map_err(|e| RecompressError::Save(e.to_string()))?;
        Ok(output.into_inner())
    }
}
