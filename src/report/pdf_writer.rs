//! Reassembles page images into a PDF, one page per image

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use tracing::debug;

use crate::error::SealError;

const IMAGE_NAME: &str = "Im0";

fn assemble_error(e: impl std::fmt::Display) -> SealError {
    SealError::Assemble(e.to_string())
}

/// Page edge in points for `pixels` rendered at `dpi`
pub fn page_points(pixels: u32, dpi: u32) -> f32 {
    pixels as f32 * 72.0 / dpi as f32
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, SealError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(assemble_error)?;
    encoder.finish().map_err(assemble_error)
}

/// Build an unencrypted document whose pages are exactly `pages`
pub fn images_to_document(pages: &[RgbImage], dpi: u32, title: &str) -> Result<Document, SealError> {
    if pages.is_empty() {
        return Err(SealError::NoPages);
    }
    if dpi == 0 {
        return Err(SealError::Assemble("dpi must be positive".into()));
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::with_capacity(pages.len());

    for image in pages {
        let (width_px, height_px) = image.dimensions();
        let image_stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width_px as i64,
                "Height" => height_px as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            deflate(image.as_raw())?,
        );
        let image_id = doc.add_object(image_stream);

        let width = page_points(width_px, dpi);
        let height = page_points(height_px, dpi);
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![width.into(), 0.into(), 0.into(), height.into(), 0.into(), 0.into()],
                ),
                Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().map_err(assemble_error)?));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { IMAGE_NAME => image_id },
            },
        });
        kids.push(Object::Reference(page_id));
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
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::String(title.as_bytes().to_vec(), StringFormat::Literal),
        "Producer" => Object::String(b"ffx-evidence".to_vec(), StringFormat::Literal),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    debug!(pages = count, dpi, "Pages reassembled");
    Ok(doc)
}

/// Serialize `doc` to bytes
pub fn document_bytes(doc: &mut Document) -> Result<Vec<u8>, SealError> {
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).map_err(assemble_error)?;
    Ok(bytes)
}
