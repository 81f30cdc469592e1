//! Receipt PDFs. A template with an AcroForm is filled when one exists for
//! the receipt kind; otherwise a plain one-page A4 document is written.
//!
//! All text goes out as WinAnsi (Windows-1252). Characters outside that code
//! page are replaced by `encoding_rs` with numeric character references.

use crate::domain::error::{AppError, Result};
use crate::domain::receipt::IssuanceReceipt;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 56;
const TITLE_SIZE: i64 = 16;
const BODY_SIZE: i64 = 11;
const LEADING: i64 = 16;

fn pdf_error(context: &str) -> impl Fn(lopdf::Error) -> AppError + '_ {
    move |e| AppError::PdfError(format!("{context}: {e}"))
}

pub fn win_ansi(text: &str) -> Vec<u8> {
    let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode(text);
    bytes.into_owned()
}

fn text(value: &str) -> Object {
    Object::String(win_ansi(value), StringFormat::Literal)
}

pub struct ReceiptPdfRenderer {
    template_dir: Option<PathBuf>,
}

impl ReceiptPdfRenderer {
    pub fn new(template_dir: Option<PathBuf>) -> Self {
        Self { template_dir }
    }

    fn template_for(&self, receipt: &IssuanceReceipt) -> Option<PathBuf> {
        let dir = self.template_dir.as_deref()?;
        let kind = receipt.kind.as_str();
        template_exists(dir, kind).then(|| dir.join(format!("{kind}.pdf")))
    }

    pub fn render(&self, receipt: &IssuanceReceipt) -> Result<Vec<u8>> {
        match self.template_for(receipt) {
            Some(path) => {
                info!(template = %path.display(), "Filling receipt template");
                let template = std::fs::read(&path)?;
                fill_form(&template, &receipt.form_fields())
            }
            None => generate_document(receipt.kind.title(), &receipt.lines()),
        }
    }
}

/// Writes a single A4 page: `title` in bold, then one line per entry.
pub fn generate_document(title: &str, lines: &[String]) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
            "F2" => bold_id,
        },
    });

    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F2".into(), Object::Integer(TITLE_SIZE)]),
        Operation::new(
            "Td",
            vec![Object::Integer(MARGIN), Object::Integer(PAGE_HEIGHT - MARGIN)],
        ),
        Operation::new("Tj", vec![text(title)]),
        Operation::new("Tf", vec!["F1".into(), Object::Integer(BODY_SIZE)]),
        Operation::new("TL", vec![Object::Integer(LEADING)]),
        Operation::new("T*", vec![]),
    ];
    for line in lines {
        operations.push(Operation::new("T*", vec![]));
        operations.push(Operation::new("Tj", vec![text(line)]));
    }
    operations.push(Operation::new("ET", vec![]));

    let content = Content { operations };
    let encoded = content.encode().map_err(pdf_error("Failed to encode page"))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), Object::Integer(PAGE_WIDTH), Object::Integer(PAGE_HEIGHT)],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| AppError::PdfError(format!("Failed to write PDF: {e}")))?;
    Ok(buffer)
}

/// Terminal and intermediate fields with their fully qualified names
/// ("parent.child").
fn collect_fields(
    doc: &Document,
    ids: &[ObjectId],
    prefix: &str,
    out: &mut Vec<(ObjectId, String)>,
) -> Result<()> {
    for id in ids {
        let dict = doc
            .get_dictionary(*id)
            .map_err(pdf_error("Invalid form field"))?;
        let partial = dict
            .get(b"T")
            .and_then(Object::as_str)
            .ok()
            .map(|t| String::from_utf8_lossy(t).into_owned());

        let name = match (&partial, prefix.is_empty()) {
            (Some(p), true) => p.clone(),
            (Some(p), false) => format!("{prefix}.{p}"),
            (None, _) => prefix.to_string(),
        };
        if partial.is_some() {
            out.push((*id, name.clone()));
        }

        if let Ok(kids) = dict.get(b"Kids").and_then(Object::as_array) {
            let kid_ids: Vec<ObjectId> = kids
                .iter()
                .filter_map(|k| k.as_reference().ok())
                .collect();
            collect_fields(doc, &kid_ids, &name, out)?;
        }
    }
    Ok(())
}

/// Sets `/V` on every AcroForm field whose full or partial name matches and
/// asks viewers to regenerate appearances.
pub fn fill_form(template: &[u8], values: &[(String, String)]) -> Result<Vec<u8>> {
    let mut doc = Document::load_mem(template).map_err(pdf_error("Failed to load template"))?;

    let root_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(pdf_error("Template has no catalog"))?;
    let acroform = doc
        .get_dictionary(root_id)
        .and_then(|catalog| catalog.get(b"AcroForm"))
        .map_err(pdf_error("Template has no AcroForm"))?
        .clone();
    let acroform_id = acroform.as_reference().ok();
    let acroform_dict = match acroform_id {
        Some(id) => doc
            .get_dictionary(id)
            .map_err(pdf_error("Invalid AcroForm"))?
            .clone(),
        None => acroform
            .as_dict()
            .map_err(pdf_error("Invalid AcroForm"))?
            .clone(),
    };

    let field_ids: Vec<ObjectId> = acroform_dict
        .get(b"Fields")
        .and_then(Object::as_array)
        .map_err(pdf_error("AcroForm has no fields"))?
        .iter()
        .filter_map(|f| f.as_reference().ok())
        .collect();
    let mut fields = Vec::new();
    collect_fields(&doc, &field_ids, "", &mut fields)?;

    let mut filled = 0usize;
    for (name, value) in values {
        let targets: Vec<ObjectId> = fields
            .iter()
            .filter(|(_, full)| full == name || full.rsplit('.').next() == Some(name.as_str()))
            .map(|(id, _)| *id)
            .collect();
        if targets.is_empty() {
            debug!(field = %name, "No form field for receipt value");
            continue;
        }
        for id in targets {
            doc.get_object_mut(id)
                .and_then(Object::as_dict_mut)
                .map_err(pdf_error("Invalid form field"))?
                .set("V", text(value));
            filled += 1;
        }
    }

    let acroform_mut = match acroform_id {
        Some(id) => doc.get_object_mut(id).and_then(Object::as_dict_mut),
        None => doc
            .get_object_mut(root_id)
            .and_then(Object::as_dict_mut)
            .and_then(|catalog| catalog.get_mut(b"AcroForm"))
            .and_then(Object::as_dict_mut),
    }
    .map_err(pdf_error("Invalid AcroForm"))?;
    acroform_mut.set("NeedAppearances", Object::Boolean(true));

    debug!(filled, "Filled receipt form fields");
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| AppError::PdfError(format!("Failed to write PDF: {e}")))?;
    Ok(buffer)
}

pub fn template_exists(dir: &Path, kind: &str) -> bool {
    dir.join(format!("{kind}.pdf")).is_file()
}
