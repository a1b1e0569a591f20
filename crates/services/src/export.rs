//! Spreadsheet export of calculation history as a minimal `.xlsx` workbook.

use chrono::NaiveDate;
use quick_xml::escape::escape;
use shared::indices::CalculatedIndices;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const SHEET_TITLE: &str = "Index Data";
pub const HEADERS: [&str; 4] = ["Index Name", "Index (Value and Unit)", "Time", "Date"];

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("select at least one index to export")]
    NothingSelected,

    #[error("none of the selected indices has data")]
    NoData,

    #[error("could not build workbook: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("could not write workbook: {0}")]
    Io(#[from] std::io::Error),
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

// Style 1 is the bold, centred header.
const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="2"><font><sz val="11"/><name val="Calibri"/></font><font><b/><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1" applyAlignment="1"><alignment horizontal="center"/></xf></cellXfs></styleSheet>"#;

fn workbook_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        escape(SHEET_TITLE)
    )
}

fn column_letter(col: usize) -> char {
    (b'A' + col as u8) as char
}

fn sheet_xml(rows: &[[String; 4]]) -> String {
    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in rows {
        for (col, cell) in row.iter().enumerate() {
            widths[col] = widths[col].max(cell.chars().count());
        }
    }

    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><cols>"#,
    );
    for (col, width) in widths.iter().enumerate() {
        xml.push_str(&format!(
            r#"<col min="{n}" max="{n}" width="{w}" customWidth="1"/>"#,
            n = col + 1,
            w = width + 2
        ));
    }
    xml.push_str("</cols><sheetData>");

    let header = HEADERS.map(String::from);
    for (row_idx, row) in std::iter::once(&header).chain(rows.iter()).enumerate() {
        let style = if row_idx == 0 { r#" s="1""# } else { "" };
        xml.push_str(&format!(r#"<row r="{}">"#, row_idx + 1));
        for (col, cell) in row.iter().enumerate() {
            xml.push_str(&format!(
                r#"<c r="{}{}" t="inlineStr"{}><is><t>{}</t></is></c>"#,
                column_letter(col),
                row_idx + 1,
                style,
                escape(cell.as_str())
            ));
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

/// One row per record: index name, result, time, date. Sorted by index name.
pub fn export_rows<S: AsRef<str>>(indices: &CalculatedIndices, selected: &[S]) -> Vec<[String; 4]> {
    let mut names: Vec<&str> = selected.iter().map(|s| s.as_ref()).collect();
    names.sort_unstable();
    names.dedup();
    names
        .into_iter()
        .filter_map(|name| indices.get(name).map(|records| (name, records)))
        .flat_map(|(name, records)| {
            records.iter().map(move |r| {
                [
                    name.to_string(),
                    r.result_text.clone(),
                    r.time.clone(),
                    r.date.clone(),
                ]
            })
        })
        .collect()
}

/// Builds the workbook bytes for the selected indices.
pub fn export_spreadsheet<S: AsRef<str>>(
    indices: &CalculatedIndices,
    selected: &[S],
) -> Result<Vec<u8>, ExportError> {
    if selected.is_empty() {
        return Err(ExportError::NothingSelected);
    }
    let rows = export_rows(indices, selected);
    if rows.is_empty() {
        return Err(ExportError::NoData);
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let parts: [(&str, String); 6] = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", ROOT_RELS.to_string()),
        ("xl/workbook.xml", workbook_xml()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
        ("xl/styles.xml", STYLES.to_string()),
        ("xl/worksheets/sheet1.xml", sheet_xml(&rows)),
    ];
    for (name, body) in parts {
        zip.start_file(name, options)?;
        zip.write_all(body.as_bytes())?;
    }
    Ok(zip.finish()?.into_inner())
}

pub fn spreadsheet_file_name(day: NaiveDate) -> String {
    format!("bovicheck_spreadsheet_{}.xlsx", day.format("%Y%m%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::indices::CalculationRecord;
    use std::io::Read;

    fn rec(result: &str, date: &str) -> CalculationRecord {
        CalculationRecord {
            id: format!("{}-{}", result, date),
            result_text: result.into(),
            date: date.into(),
            time: "08:15".into(),
            raw_inputs: vec![],
        }
    }

    fn sample() -> CalculatedIndices {
        let mut map = CalculatedIndices::new();
        map.insert("Weaning Rate".into(), vec![rec("88.00 %", "02/02/2024")]);
        map.insert(
            "Birth Rate".into(),
            vec![rec("90.00 %", "01/01/2024"), rec("92.00 %", "01/02/2024")],
        );
        map
    }

    #[test]
    fn rows_sorted_by_index_name() {
        let rows = export_rows(&sample(), &["Weaning Rate", "Birth Rate"]);
        let names: Vec<_> = rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(names, vec!["Birth Rate", "Birth Rate", "Weaning Rate"]);
        assert_eq!(rows[0][1], "90.00 %");
        assert_eq!(rows[0][2], "08:15");
        assert_eq!(rows[0][3], "01/01/2024");
    }

    #[test]
    fn workbook_has_styled_header_and_widths() {
        let bytes = export_spreadsheet(&sample(), &["Birth Rate"]).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut sheet = String::new();
        archive
            .by_name("xl/worksheets/sheet1.xml")
            .unwrap()
            .read_to_string(&mut sheet)
            .unwrap();
        assert!(sheet.contains(r#"<c r="A1" t="inlineStr" s="1"><is><t>Index Name</t></is></c>"#));
        assert!(sheet.contains("<t>92.00 %</t>"));
        assert!(!sheet.contains("Weaning Rate"));
        // "Index (Value and Unit)" is the widest cell in column B.
        assert!(sheet.contains(r#"<col min="2" max="2" width="24" customWidth="1"/>"#));
        assert!(archive.by_name("xl/styles.xml").is_ok());
    }

    #[test]
    fn cells_are_xml_escaped() {
        let mut map = CalculatedIndices::new();
        map.insert("A & B".into(), vec![rec("<1>", "01/01/2024")]);
        let xml = sheet_xml(&export_rows(&map, &["A & B"]));
        assert!(xml.contains("A &amp; B"));
        assert!(xml.contains("&lt;1&gt;"));
    }

    #[test]
    fn empty_selection_is_an_error() {
        let none: [&str; 0] = [];
        assert!(matches!(
            export_spreadsheet(&sample(), &none),
            Err(ExportError::NothingSelected)
        ));
        assert!(matches!(
            export_spreadsheet(&sample(), &["Mortality Rate"]),
            Err(ExportError::NoData)
        ));
    }
}
