//! Text extraction and image encoding for chat attachments.
//!
//! Extraction never fails: unsupported or unreadable files produce a
//! descriptive sentinel string so the chat turn can carry on.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::NaiveTime;
use shared::indices::{DATE_FORMAT, TIME_FORMAT};
use std::path::Path;

const UNSUPPORTED_MARKER: &str = "is not supported for text extraction";
const UNREADABLE_MARKER: &str = "Could not read file";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    PlainText,
    Pdf,
    Docx,
    Spreadsheet,
    Image,
    Unsupported,
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn detect_kind(path: &Path) -> DocumentKind {
    match extension(path).as_str() {
        "txt" | "md" | "markdown" => DocumentKind::PlainText,
        "pdf" => DocumentKind::Pdf,
        "docx" => DocumentKind::Docx,
        "xlsx" | "xls" | "xlsm" | "ods" => DocumentKind::Spreadsheet,
        "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" | "heic" => DocumentKind::Image,
        _ => DocumentKind::Unsupported,
    }
}

pub fn is_image(path: &Path) -> bool {
    detect_kind(path) == DocumentKind::Image
}

pub fn is_spreadsheet(path: &Path) -> bool {
    detect_kind(path) == DocumentKind::Spreadsheet
}

/// True for the sentinel strings returned by [`extract_text`].
pub fn is_extraction_failure(text: &str) -> bool {
    text.contains(UNSUPPORTED_MARKER) || text.starts_with(UNREADABLE_MARKER)
}

fn unsupported(path: &Path) -> String {
    let ext = extension(path);
    let ext = if ext.is_empty() { "(none)".to_string() } else { format!(".{}", ext) };
    format!("File type '{}' {}.", ext, UNSUPPORTED_MARKER)
}

fn unreadable(path: &Path, detail: impl std::fmt::Display) -> String {
    format!("{} '{}': {}", UNREADABLE_MARKER, file_name(path), detail)
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    ExtractionFailed(String),
}

/// Plain text of a document, or a sentinel describing why there is none.
pub fn extract_text(path: &Path) -> String {
    match try_extract_text(path) {
        Ok(text) => text,
        Err(ExtractError::UnsupportedFormat(_)) => unsupported(path),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "text extraction failed");
            unreadable(path, e)
        }
    }
}

pub fn try_extract_text(path: &Path) -> Result<String, ExtractError> {
    match detect_kind(path) {
        DocumentKind::PlainText => extract_plaintext(path),
        DocumentKind::Pdf => extract_pdf(path),
        DocumentKind::Docx => extract_docx(path),
        DocumentKind::Spreadsheet => extract_spreadsheet(path),
        DocumentKind::Image | DocumentKind::Unsupported => {
            Err(ExtractError::UnsupportedFormat(extension(path)))
        }
    }
}

fn extract_plaintext(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn extract_pdf(path: &Path) -> Result<String, ExtractError> {
    // pdf-extract may panic on malformed files.
    let path_buf = path.to_path_buf();
    match std::panic::catch_unwind(move || pdf_extract::extract_text(&path_buf)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(ExtractError::ExtractionFailed(format!("PDF: {}", e))),
        Err(_) => Err(ExtractError::ExtractionFailed("PDF: malformed file".to_string())),
    }
}

fn extract_docx(path: &Path) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    let docx_err = |e: &dyn std::fmt::Display| ExtractError::ExtractionFailed(format!("DOCX: {}", e));

    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| docx_err(&e))?;
    let doc = archive
        .by_name("word/document.xml")
        .map_err(|e| docx_err(&e))?;

    let mut reader = quick_xml::Reader::from_reader(std::io::BufReader::new(doc));
    let mut buf = Vec::new();
    let mut text = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(ref e)) if in_text => {
                if let Ok(s) = e.unescape() {
                    text.push_str(&s);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(docx_err(&e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(text.trim_end().to_string())
}

fn extract_spreadsheet(path: &Path) -> Result<String, ExtractError> {
    use calamine::{open_workbook_auto, Reader};

    let mut workbook = open_workbook_auto(path)
        .map_err(|e| ExtractError::ExtractionFailed(format!("spreadsheet: {}", e)))?;
    let mut output = String::new();

    for sheet_name in workbook.sheet_names().to_vec() {
        let Ok(range) = workbook.worksheet_range(&sheet_name) else {
            continue;
        };
        if !output.is_empty() {
            output.push_str("\n\n");
        }
        output.push_str(&format!("## {}\n\n", sheet_name));

        let mut rows = range.rows();
        if let Some(header) = rows.next() {
            let header: Vec<String> = header.iter().map(cell_to_string).collect();
            output.push_str(&table_row(&header));
            output.push_str(&table_row(&vec!["---".to_string(); header.len()]));
            for row in rows {
                let cells: Vec<String> = row.iter().map(cell_to_string).collect();
                output.push_str(&table_row(&cells));
            }
        }
    }
    Ok(output)
}

fn table_row(cells: &[String]) -> String {
    format!("| {} |\n", cells.join(" | "))
}

fn cell_to_string(cell: &calamine::Data) -> String {
    use calamine::Data;
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.replace('|', "/"),
        Data::Int(n) => n.to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::Error(e) => format!("#ERR({:?})", e),
        Data::DateTime(dt) => excel_datetime_to_string(dt),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

/// Date-styled cells in the same layout the export writes. Serials below 1
/// carry no date part and print as a time of day.
fn excel_datetime_to_string(dt: &calamine::ExcelDateTime) -> String {
    if dt.is_duration() {
        return dt.as_f64().to_string();
    }
    match dt.as_datetime() {
        Some(value) if dt.as_f64() < 1.0 => value.format(TIME_FORMAT).to_string(),
        Some(value) if value.time() == NaiveTime::MIN => value.format(DATE_FORMAT).to_string(),
        Some(value) => value.format(&format!("{} {}", DATE_FORMAT, TIME_FORMAT)).to_string(),
        None => dt.as_f64().to_string(),
    }
}

/// Base64 payload ready to be sent inline to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

pub fn encode_image(path: &Path) -> std::io::Result<InlineImage> {
    let bytes = std::fs::read(path)?;
    let mime_type = mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());
    Ok(InlineImage {
        mime_type,
        data: STANDARD.encode(bytes),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    /// One data row whose date and time are numeric cells styled as
    /// `d/m/yyyy` (format 14) and `h:mm` (format 20), as spreadsheet apps save them.
    pub(crate) fn write_typed_workbook(path: &Path) {
        let parts: [(&str, &str); 5] = [
            (
                "[Content_Types].xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#,
            ),
            (
                "_rels/.rels",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#,
            ),
            (
                "xl/workbook.xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Herd" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
            ),
            (
                "xl/_rels/workbook.xml.rels",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#,
            ),
            (
                "xl/styles.xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="1"><fill><patternFill patternType="none"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="3"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="14" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/><xf numFmtId="20" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/></cellXfs></styleSheet>"#,
            ),
        ];
        let sheet = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>Index Name</t></is></c><c r="B1" t="inlineStr"><is><t>Index (Value and Unit)</t></is></c><c r="C1" t="inlineStr"><is><t>Time</t></is></c><c r="D1" t="inlineStr"><is><t>Date</t></is></c></row><row r="2"><c r="A2" t="inlineStr"><is><t>Birth Rate</t></is></c><c r="B2" t="inlineStr"><is><t>90.00 %</t></is></c><c r="C2" s="2"><v>0.34375</v></c><c r="D2" s="1"><v>45292</v></c></row></sheetData></worksheet>"#;

        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, body) in parts.iter().chain(std::iter::once(&("xl/worksheets/sheet1.xml", sheet))) {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn detects_kinds() {
        assert_eq!(detect_kind(Path::new("notes.MD")), DocumentKind::PlainText);
        assert_eq!(detect_kind(Path::new("r.pdf")), DocumentKind::Pdf);
        assert_eq!(detect_kind(Path::new("r.docx")), DocumentKind::Docx);
        assert!(is_spreadsheet(Path::new("herd.xlsx")));
        assert!(is_spreadsheet(Path::new("herd.xls")));
        assert!(is_image(Path::new("cow.JPG")));
        assert_eq!(detect_kind(Path::new("data.csv")), DocumentKind::Unsupported);
    }

    #[test]
    fn reads_plain_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "weaned 40 calves").unwrap();
        assert_eq!(extract_text(&path), "weaned 40 calves");
    }

    #[test]
    fn csv_is_not_supported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "a,b").unwrap();
        let text = extract_text(&path);
        assert_eq!(text, "File type '.csv' is not supported for text extraction.");
        assert!(is_extraction_failure(&text));
    }

    #[test]
    fn missing_file_yields_sentinel() {
        let text = extract_text(Path::new("/definitely/not/here.txt"));
        assert!(text.starts_with("Could not read file 'here.txt'"));
        assert!(is_extraction_failure(&text));
    }

    #[test]
    fn errors_keep_their_kind() {
        assert!(matches!(
            try_extract_text(Path::new("data.csv")),
            Err(ExtractError::UnsupportedFormat(ext)) if ext == "csv"
        ));
        assert!(matches!(
            try_extract_text(Path::new("/definitely/not/here.txt")),
            Err(ExtractError::Io(_))
        ));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, "not a workbook").unwrap();
        assert!(matches!(
            try_extract_text(&path),
            Err(ExtractError::ExtractionFailed(_))
        ));
    }

    #[test]
    fn date_styled_cells_read_as_calendar_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("herd.xlsx");
        write_typed_workbook(&path);

        let text = extract_text(&path);
        assert!(!is_extraction_failure(&text), "{}", text);
        assert!(text.contains("| Birth Rate | 90.00 % | 08:15 | 01/01/2024 |"), "{}", text);
        assert!(!text.contains("45292"));
    }

    #[test]
    fn broken_docx_yields_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.docx");
        std::fs::write(&path, "not a zip").unwrap();
        assert!(is_extraction_failure(&extract_text(&path)));
    }

    #[test]
    fn reads_docx_paragraphs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.docx");
        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(
            br#"<?xml version="1.0"?><w:document xmlns:w="w"><w:body><w:p><w:r><w:t>First</w:t></w:r><w:r><w:t> line</w:t></w:r></w:p><w:p><w:r><w:t>Second &amp; last</w:t></w:r></w:p></w:body></w:document>"#,
        )
        .unwrap();
        zip.finish().unwrap();

        assert_eq!(extract_text(&path), "First line\nSecond & last");
    }

    #[test]
    fn encodes_images_with_guessed_mime() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("cow.png");
        std::fs::write(&png, [1u8, 2, 3]).unwrap();
        let image = encode_image(&png).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, "AQID");

        let unknown = dir.path().join("blob.zzzq");
        std::fs::write(&unknown, [0u8]).unwrap();
        assert_eq!(encode_image(&unknown).unwrap().mime_type, "application/octet-stream");
    }
}
