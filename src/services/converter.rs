use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use image::{io::Reader as ImageReader, DynamicImage, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use crate::error::{AppError, AppResult};
use crate::models::{PageRange, PdfInfo};
use crate::services::storage::Storage;

/// Nominal resolution used to size image pages.
pub const IMAGE_DPI: f32 = 100.0;

const PDF_VERSION: &str = "1.5";
const IMAGE_XOBJECT: &str = "Im0";
const INHERITABLE_PAGE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];
const MAX_PAGE_TREE_DEPTH: usize = 64;

/// Stateless conversion operations. Every output lands in the storage area
/// under the caller-supplied name; inputs are never modified.
#[derive(Debug, Clone)]
pub struct DocumentConverter {
    storage: Storage,
}

impl DocumentConverter {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// One page per image, in input order.
    pub fn images_to_pdf(&self, inputs: &[PathBuf], output_name: &str) -> AppResult<PathBuf> {
        if inputs.is_empty() {
            return Err(AppError::invalid_input("no images were provided for conversion"));
        }
        let start = Instant::now();
        let output_path = self.storage.output_path(output_name)?;

        let mut doc = Document::with_version(PDF_VERSION);
        let pages_id = doc.new_object_id();
        let mut kids = Vec::with_capacity(inputs.len());

        for path in inputs {
            let rgb = load_rgb_image(path)?;
            let page_id = add_image_page(&mut doc, pages_id, rgb)?;
            kids.push(Object::Reference(page_id));
        }

        finish_document(&mut doc, pages_id, kids);
        self.write_document(doc, &output_path)?;

        tracing::info!(
            images = inputs.len(),
            output = %output_name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Converted images to PDF"
        );
        Ok(output_path)
    }

    /// Concatenate every page of every input, in input order.
    pub fn merge_pdfs(&self, inputs: &[PathBuf], output_name: &str) -> AppResult<PathBuf> {
        if inputs.is_empty() {
            return Err(AppError::invalid_input("no PDFs were provided for merging"));
        }
        let start = Instant::now();
        let output_path = self.storage.output_path(output_name)?;

        let mut sources = Vec::with_capacity(inputs.len());
        for path in inputs {
            let doc = load_pdf(path)?;
            let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
            sources.push((doc, pages));
        }

        let page_count: usize = sources.iter().map(|(_, pages)| pages.len()).sum();
        let merged = assemble(sources);
        self.write_document(merged, &output_path)?;

        tracing::info!(
            documents = inputs.len(),
            pages = page_count,
            output = %output_name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Merged PDFs"
        );
        Ok(output_path)
    }

    /// Extract an inclusive 1-indexed page range. Out-of-range or inverted
    /// bounds are clamped, never rejected.
    pub fn split_pdf(
        &self,
        input: &Path,
        range: PageRange,
        output_name: &str,
    ) -> AppResult<PathBuf> {
        let output_path = self.storage.output_path(output_name)?;
        let doc = load_pdf(input)?;
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();

        let (first, last) = range
            .clamp(pages.len() as u32)
            .ok_or_else(|| AppError::invalid_input("document has no pages"))?;
        let selected = pages[(first - 1) as usize..last as usize].to_vec();

        tracing::debug!(
            requested_start = ?range.start_page,
            requested_end = ?range.end_page,
            first,
            last,
            total = pages.len(),
            "Resolved split range"
        );

        let split = assemble(vec![(doc, selected)]);
        self.write_document(split, &output_path)?;

        tracing::info!(first, last, output = %output_name, "Split PDF");
        Ok(output_path)
    }

    pub fn get_pdf_info(&self, input: &Path) -> AppResult<PdfInfo> {
        let doc = load_pdf(input)?;
        let size_bytes = fs::metadata(input)?.len();
        Ok(PdfInfo::new(
            doc.get_pages().len(),
            read_metadata(&doc),
            size_bytes,
        ))
    }

    fn write_document(&self, mut doc: Document, path: &Path) -> AppResult<()> {
        doc.compress();
        self.storage.write_atomic(path, |file| {
            doc.save_to(file)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
        })
    }
}

fn load_pdf(path: &Path) -> AppResult<Document> {
    Document::load(path).map_err(|e| {
        AppError::corrupt(format!("{} could not be parsed as PDF: {}", display_name(path), e))
    })
}

fn load_rgb_image(path: &Path) -> AppResult<RgbImage> {
    let decoded = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| AppError::invalid_input(format!("{}: {}", display_name(path), e)))?
        .decode()
        .map_err(|e| {
            AppError::invalid_input(format!(
                "{} could not be decoded as an image: {}",
                display_name(path),
                e
            ))
        })?;
    Ok(flatten_to_rgb(decoded))
}

/// Three-channel copy of `image`, compositing any transparency onto white.
pub fn flatten_to_rgb(image: DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut rgb = RgbImage::new(width, height);
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u16::from(a);
        let blend = |c: u8| ((u16::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        rgb.put_pixel(x, y, image::Rgb([blend(r), blend(g), blend(b)]));
    }
    rgb
}

fn add_image_page(doc: &mut Document, pages_id: ObjectId, rgb: RgbImage) -> AppResult<ObjectId> {
    let (width, height) = rgb.dimensions();
    let page_width = width as f32 * 72.0 / IMAGE_DPI;
    let page_height = height as f32 * 72.0 / IMAGE_DPI;

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(width),
            "Height" => i64::from(height),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        rgb.into_raw(),
    ));

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    page_width.into(),
                    0.into(),
                    0.into(),
                    page_height.into(),
                    0.into(),
                    0.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(IMAGE_XOBJECT.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let encoded = content
        .encode()
        .map_err(|e| AppError::internal(format!("failed to encode page content: {}", e)))?;
    let content_id = doc.add_object(Stream::new(Dictionary::new(), encoded));

    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), page_width.into(), page_height.into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                IMAGE_XOBJECT => image_id,
            },
        },
    }))
}

/// Build a fresh document holding `pages` of each source, in order.
///
/// Source object ids are shifted past everything already imported so they
/// cannot collide, each selected page is re-parented onto a single flat page
/// tree, and anything no longer reachable from the new catalog is pruned.
fn assemble(sources: Vec<(Document, Vec<ObjectId>)>) -> Document {
    let mut out = Document::with_version(PDF_VERSION);
    let pages_id = out.new_object_id();
    let mut kids = Vec::new();

    for (mut source, pages) in sources {
        for &page_id in &pages {
            inherit_page_attributes(&mut source, page_id);
        }

        let offset = out.max_id;
        let source_max = source
            .objects
            .keys()
            .map(|id| id.0)
            .max()
            .unwrap_or(0)
            .max(source.max_id);

        for (id, object) in std::mem::take(&mut source.objects) {
            out.objects
                .insert((id.0 + offset, id.1), shift_references(object, offset));
        }
        out.max_id = offset + source_max;

        for page_id in pages {
            let shifted = (page_id.0 + offset, page_id.1);
            if let Ok(page) = out.get_object_mut(shifted).and_then(Object::as_dict_mut) {
                page.set("Parent", pages_id);
            }
            kids.push(Object::Reference(shifted));
        }
    }

    finish_document(&mut out, pages_id, kids);
    out.prune_objects();
    out
}

fn finish_document(doc: &mut Document, pages_id: ObjectId, kids: Vec<Object>) {
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
}

/// Copy attributes a page inherits from its ancestors onto the page itself.
fn inherit_page_attributes(doc: &mut Document, page_id: ObjectId) {
    let mut inherited = Vec::new();
    {
        let page = match doc.get_object(page_id).and_then(Object::as_dict) {
            Ok(page) => page,
            Err(_) => return,
        };
        let mut missing: Vec<&[u8]> = INHERITABLE_PAGE_KEYS
            .iter()
            .copied()
            .filter(|key| !page.has(key))
            .collect();

        let mut visited = HashSet::new();
        let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
        while let Some(node_id) = parent {
            if missing.is_empty() || !visited.insert(node_id) || visited.len() > MAX_PAGE_TREE_DEPTH {
                break;
            }
            let node = match doc.get_object(node_id).and_then(Object::as_dict) {
                Ok(node) => node,
                Err(_) => break,
            };
            missing.retain(|key| match node.get(key) {
                Ok(value) => {
                    inherited.push((key.to_vec(), value.clone()));
                    false
                }
                Err(_) => true,
            });
            parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        }
    }

    if inherited.is_empty() {
        return;
    }
    if let Ok(page) = doc.get_object_mut(page_id).and_then(Object::as_dict_mut) {
        for (key, value) in inherited {
            page.set(key, value);
        }
    }
}

fn shift_references(object: Object, offset: u32) -> Object {
    match object {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(items) => Object::Array(
            items
                .into_iter()
                .map(|item| shift_references(item, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            shift_dictionary(&mut dict, offset);
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            shift_dictionary(&mut stream.dict, offset);
            Object::Stream(stream)
        }
        other => other,
    }
}

fn shift_dictionary(dict: &mut Dictionary, offset: u32) {
    for (_, value) in dict.iter_mut() {
        let taken = std::mem::replace(value, Object::Null);
        *value = shift_references(taken, offset);
    }
}

/// Document information dictionary as text, keyed by PDF name (`/Title`, ...).
fn read_metadata(doc: &Document) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();

    let info = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => doc.get_object(*id).and_then(Object::as_dict).ok(),
        Ok(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    };
    let Some(info) = info else {
        return metadata;
    };

    for (key, value) in info.iter() {
        let value = match value {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(resolved) => resolved,
                Err(_) => continue,
            },
            direct => direct,
        };
        if let Some(text) = object_to_text(value) {
            metadata.insert(format!("/{}", String::from_utf8_lossy(key)), text);
        }
    }
    metadata
}

fn object_to_text(object: &Object) -> Option<String> {
    let text = match object {
        Object::String(bytes, _) => decode_pdf_string(bytes),
        Object::Name(name) => String::from_utf8_lossy(name).into_owned(),
        Object::Integer(value) => value.to_string(),
        Object::Real(value) => value.to_string(),
        Object::Boolean(value) => value.to_string(),
        _ => return None,
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        decode_utf16_be(&bytes[2..])
    } else if bytes.starts_with(&[0xFF, 0xFE]) {
        decode_utf16_le(&bytes[2..])
    } else if looks_like_utf16(bytes) {
        decode_utf16_be(bytes)
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

// Many null bytes in alternating positions
fn looks_like_utf16(bytes: &[u8]) -> bool {
    if bytes.len() < 2 {
        return false;
    }
    let null_count = bytes.iter().filter(|&&b| b == 0).count();
    null_count > bytes.len() / 3
}

fn decode_utf16_be(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    decode_utf16_units(&units)
}

fn decode_utf16_le(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    decode_utf16_units(&units)
}

fn decode_utf16_units(units: &[u16]) -> String {
    char::decode_utf16(units.iter().copied())
        .filter_map(Result::ok)
        .filter(|&c| c != '\0')
        .collect()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
