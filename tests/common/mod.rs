//! Fixture builders shared by the test binaries.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use image::{Rgb, RgbImage, Rgba, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};

/// A PDF whose page `i` draws the text `{label}-Page-{i}`.
pub fn pdf_with_pages(num_pages: u32, label: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for i in 1..=num_pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![100.into(), 700.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(format!("{}-Page-{}", label, i))],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            Dictionary::new(),
            content.encode().unwrap(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => num_pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    save(&mut doc)
}

/// Two pages under an intermediate page-tree node that carries the
/// MediaBox and Resources the pages inherit.
pub fn pdf_with_inherited_attributes(label: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let root_pages_id = doc.new_object_id();
    let inner_pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });

    let mut kids = Vec::new();
    for i in 1..=2 {
        let content = format!("BT /F1 10 Tf 20 20 Td ({}-Page-{}) Tj ET", label, i);
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => inner_pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        inner_pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Parent" => root_pages_id,
            "Kids" => kids,
            "Count" => 2,
            "MediaBox" => vec![0.into(), 0.into(), 300.into(), 400.into()],
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        }),
    );
    doc.objects.insert(
        root_pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(inner_pages_id)],
            "Count" => 2,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => root_pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    save(&mut doc)
}

/// A one-page PDF with a document information dictionary.
pub fn pdf_with_metadata(title: &str, author_utf16: &str) -> Vec<u8> {
    let mut doc = Document::load_mem(&pdf_with_pages(1, "Meta")).unwrap();

    let mut author = vec![0xFE, 0xFF];
    for unit in author_utf16.encode_utf16() {
        author.extend_from_slice(&unit.to_be_bytes());
    }

    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(title),
        "Author" => Object::String(author, lopdf::StringFormat::Hexadecimal),
        "Producer" => Object::string_literal("docconvert tests"),
    });
    doc.trailer.set("Info", info_id);

    save(&mut doc)
}

pub fn write_pdf(dir: &Path, name: &str, num_pages: u32, label: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, pdf_with_pages(num_pages, label)).unwrap();
    path
}

/// Solid-colour RGB image; the format follows the file extension.
pub fn write_image(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_pixel(width, height, Rgb([200, 30, 30]))
        .save(&path)
        .unwrap();
    path
}

/// Fully transparent RGBA PNG.
pub fn write_transparent_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]))
        .save(&path)
        .unwrap();
    path
}

pub fn encode_jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut buffer = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([10, 120, 200])))
        .write_to(&mut buffer, image::ImageOutputFormat::Jpeg(90))
        .unwrap();
    buffer.into_inner()
}

/// The `Label-Page-N` marker drawn on each page, in page order.
pub fn page_labels(doc: &Document) -> Vec<String> {
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let content = doc.get_page_content(page_id).unwrap();
            let text = String::from_utf8_lossy(&content);
            let start = text.find('(').unwrap() + 1;
            let end = text[start..].find(')').unwrap() + start;
            text[start..end].to_string()
        })
        .collect()
}

/// Page widths in points, in page order, read from each page's own MediaBox.
pub fn page_widths(doc: &Document) -> Vec<f32> {
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let page = doc.get_object(page_id).and_then(Object::as_dict).unwrap();
            let media_box = page.get(b"MediaBox").and_then(Object::as_array).unwrap();
            media_box[2].as_float().unwrap()
        })
        .collect()
}

/// Backdate a file's modification time by `age`.
pub fn set_age(path: &Path, age: Duration) {
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - age).unwrap();
}

fn save(doc: &mut Document) -> Vec<u8> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}
