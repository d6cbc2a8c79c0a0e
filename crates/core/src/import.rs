//! Reference catalog import and export.
//!
//! The text layout is one template per row:
//!
//! ```text
//! No;Kode;Deskripsi;Tarif;Dokumen;Severity
//! 1;J45.9;Asthma, unspecified;Rp 2.114.700;SEP, Resume Medis, Hasil Spirometri;I
//! ```
//!
//! - The separator is detected from the first non-empty line: whichever of `;`, tab, `|`
//!   or `,` occurs most often outside quotes. Ties go to the earlier candidate.
//! - A first row whose first field holds no digit is a header and is skipped.
//! - Tariff text is stripped to its digits before parsing; no digits means no tariff.
//! - The document list is comma-separated inside its field. A document name that itself
//!   holds a comma is double-quoted, with inner quotes doubled.
//! - The severity column is optional and defaults to `I`. In a comma-separated file an
//!   unquoted document list spills over into the following fields; those are folded back
//!   into the list, and only a last field that parses as a severity is taken as one.
//!
//! Rows that cannot become a template are skipped and reported. They never abort the
//! import.

use crate::catalog::{ReferenceCatalog, ReferenceTemplate};
use crate::constants::{EXPORT_SEPARATOR, IMPORT_SEPARATORS};
use crate::{ClaimError, ClaimResult, Severity};
use klaim_types::{DiagnosisCode, NonEmptyText};

/// A row that was skipped during import.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MalformedImportRow {
    /// 1-based line number in the source text.
    pub line: u64,
    pub reason: String,
}

/// Outcome of a catalog import.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Parsed templates in source order.
    pub templates: Vec<ReferenceTemplate>,
    pub skipped: Vec<MalformedImportRow>,
}

impl ImportReport {
    pub fn imported_count(&self) -> usize {
        self.templates.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Picks the field separator from the first non-empty line.
pub fn detect_separator(text: &str) -> u8 {
    let Some(first_line) = text.lines().find(|l| !l.trim().is_empty()) else {
        return EXPORT_SEPARATOR;
    };

    let mut counts = [0usize; 4];
    let mut in_quotes = false;
    for b in first_line.bytes() {
        if b == b'"' {
            in_quotes = !in_quotes;
            continue;
        }
        if in_quotes {
            continue;
        }
        if let Some(i) = IMPORT_SEPARATORS.iter().position(|s| *s == b) {
            counts[i] += 1;
        }
    }

    // max_by_key keeps the last maximum, so walk candidates in reverse to favour earlier ones
    IMPORT_SEPARATORS
        .iter()
        .zip(counts)
        .rev()
        .filter(|(_, count)| *count > 0)
        .max_by_key(|(_, count)| *count)
        .map(|(sep, _)| *sep)
        .unwrap_or(EXPORT_SEPARATOR)
}

fn is_header(record: &csv::StringRecord) -> bool {
    record
        .get(0)
        .map(|first| !first.bytes().any(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

fn parse_tariff(raw: &str) -> Result<Option<u64>, String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Ok(None);
    }
    digits
        .parse::<u64>()
        .map(Some)
        .map_err(|_| format!("tariff '{raw}' is out of range"))
}

fn parse_documents(raw: &str) -> Vec<String> {
    let mut documents = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => documents.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    documents.push(current);

    documents
        .into_iter()
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .collect()
}

fn format_documents(documents: &[String]) -> String {
    documents
        .iter()
        .map(|d| {
            if d.contains(',') || d.contains('"') {
                format!("\"{}\"", d.replace('"', "\"\""))
            } else {
                d.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Splits the trailing fields into the document list and an optional severity.
fn documents_and_severity(
    record: &csv::StringRecord,
    separator: u8,
) -> Result<(Vec<String>, Severity), String> {
    let trailing: Vec<&str> = record.iter().skip(4).collect();

    if separator != b',' {
        let documents = parse_documents(trailing.first().copied().unwrap_or(""));
        let severity = match trailing.get(1).map(|s| s.trim()).unwrap_or("") {
            "" => Severity::default(),
            raw => raw.parse::<Severity>().map_err(|e| e.to_string())?,
        };
        return Ok((documents, severity));
    }

    let (document_fields, severity) = match trailing.split_last() {
        Some((last, rest)) if !rest.is_empty() => match last.trim() {
            "" => (rest, Severity::default()),
            raw => match raw.parse::<Severity>() {
                Ok(severity) => (rest, severity),
                Err(_) => (trailing.as_slice(), Severity::default()),
            },
        },
        _ => (trailing.as_slice(), Severity::default()),
    };

    let documents = document_fields
        .iter()
        .flat_map(|field| parse_documents(field))
        .collect();
    Ok((documents, severity))
}

fn parse_row(record: &csv::StringRecord, separator: u8) -> Result<ReferenceTemplate, String> {
    let field = |i: usize| record.get(i).unwrap_or("").trim();

    if record.len() < 3 {
        return Err(format!("expected at least 3 fields, found {}", record.len()));
    }

    let code = match field(1) {
        "" => return Err("missing code".into()),
        raw => DiagnosisCode::parse(raw).map_err(|e| e.to_string())?,
    };
    let description =
        NonEmptyText::new(field(2)).map_err(|_| "missing description".to_string())?;
    let tariff = parse_tariff(field(3))?;
    let (required_documents, severity) = documents_and_severity(record, separator)?;

    Ok(ReferenceTemplate {
        code,
        description,
        severity,
        tariff,
        required_documents,
    })
}

/// Parses catalog rows from delimited text.
pub fn import_catalog(text: &str) -> ImportReport {
    let separator = detect_separator(text);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(separator)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut report = ImportReport::default();
    let mut first = true;

    for (index, result) in reader.records().enumerate() {
        let line_of = |record: Option<&csv::StringRecord>| {
            record
                .and_then(|r| r.position())
                .map(|p| p.line())
                .unwrap_or(index as u64 + 1)
        };

        let record = match result {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(index as u64 + 1);
                report.skipped.push(MalformedImportRow {
                    line,
                    reason: e.to_string(),
                });
                first = false;
                continue;
            }
        };

        if std::mem::take(&mut first) && is_header(&record) {
            continue;
        }

        match parse_row(&record, separator) {
            Ok(template) => report.templates.push(template),
            Err(reason) => {
                let line = line_of(Some(&record));
                tracing::warn!("skipping catalog import row at line {}: {}", line, reason);
                report.skipped.push(MalformedImportRow { line, reason });
            }
        }
    }

    tracing::info!(
        "catalog import: {} templates parsed, {} rows skipped",
        report.imported_count(),
        report.skipped_count()
    );
    report
}

/// Writes the catalog in the import layout, `;` separated with a header row.
///
/// # Errors
///
/// Returns [`ClaimError::CatalogExport`] if the CSV writer fails.
pub fn export_catalog(catalog: &ReferenceCatalog) -> ClaimResult<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(EXPORT_SEPARATOR)
        .from_writer(Vec::new());

    let to_export_err = |e: csv::Error| ClaimError::CatalogExport(e.to_string());

    writer
        .write_record(["No", "Kode", "Deskripsi", "Tarif", "Dokumen", "Severity"])
        .map_err(to_export_err)?;

    for (index, template) in catalog.templates().iter().enumerate() {
        writer
            .write_record([
                (index + 1).to_string(),
                template.code.to_string(),
                template.description.to_string(),
                template.tariff.map(|t| t.to_string()).unwrap_or_default(),
                format_documents(&template.required_documents),
                template.severity.to_string(),
            ])
            .map_err(to_export_err)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ClaimError::CatalogExport(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ClaimError::CatalogExport(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_separator_prefers_most_frequent_outside_quotes() {
        assert_eq!(detect_separator("1;J45.9;Asthma;100;SEP, Resume"), b';');
        assert_eq!(detect_separator("1\tJ45.9\tAsthma\t100\tSEP, Resume"), b'\t');
        assert_eq!(detect_separator("1|I10|Hipertensi|100|SEP"), b'|');
        assert_eq!(
            detect_separator("1,J45.9,Asthma,\"2,114,700\",\"SEP, Resume\""),
            b','
        );
        assert_eq!(detect_separator("\n\n"), EXPORT_SEPARATOR);
    }

    #[test]
    fn test_import_semicolon_file_with_header() {
        let text = "No;Kode;Deskripsi;Tarif;Dokumen\n\
                    1;j45.9;Asthma, unspecified;Rp 2.114.700;SEP, Resume Medis, Hasil Spirometri\n\
                    2;I10;Essential hypertension;;SEP\n";

        let report = import_catalog(text);
        assert_eq!(report.skipped_count(), 0);
        assert_eq!(report.imported_count(), 2);

        let asthma = &report.templates[0];
        assert_eq!(asthma.code.as_str(), "J45.9");
        assert_eq!(asthma.description.as_str(), "Asthma, unspecified");
        assert_eq!(asthma.tariff, Some(2_114_700));
        assert_eq!(asthma.severity, Severity::I);
        assert_eq!(
            asthma.required_documents,
            vec!["SEP", "Resume Medis", "Hasil Spirometri"]
        );
        assert_eq!(report.templates[1].tariff, None);
    }

    #[test]
    fn test_import_skips_rows_without_code_or_description() {
        let text = "1\tA09\tDiare\t2352600\tSEP\n\
                    2\t\tNo code\t100\tSEP\n\
                    3\tI10\t\t100\tSEP\n\
                    4\tJ18.9\tPneumonia\t4685200\tSEP, Rontgen\tII\n";

        let report = import_catalog(text);
        assert_eq!(report.imported_count(), 2);
        assert_eq!(report.skipped_count(), 2);
        assert_eq!(report.skipped[0].line, 2);
        assert_eq!(report.skipped[0].reason, "missing code");
        assert_eq!(report.skipped[1].line, 3);
        assert_eq!(report.skipped[1].reason, "missing description");
        assert_eq!(report.templates[1].severity, Severity::II);
    }

    #[test]
    fn test_import_reports_bad_severity_and_short_rows() {
        let text = "1;A09;Diare;100;SEP;IV\n2;I10\n";

        let report = import_catalog(text);
        assert_eq!(report.imported_count(), 0);
        assert_eq!(report.skipped_count(), 2);
        assert!(report.skipped[0].reason.contains("IV"));
        assert!(report.skipped[1].reason.contains("at least 3 fields"));
    }

    #[test]
    fn test_export_then_import_preserves_templates() {
        let catalog = ReferenceCatalog::sample();

        let text = export_catalog(&catalog).expect("export should succeed");
        assert!(text.starts_with("No;Kode;Deskripsi;Tarif;Dokumen;Severity"));

        let report = import_catalog(&text);
        assert_eq!(report.skipped_count(), 0);
        assert_eq!(report.templates, catalog.templates());
    }

    #[test]
    fn test_comma_file_folds_unquoted_documents_back_into_list() {
        let text = "1,J45.9,Asthma,2114700,SEP, Resume Medis\n\
                    2,A91,Dengue,5000000,SEP, Trombosit, Resume Medis,II\n";

        let report = import_catalog(text);
        assert_eq!(report.skipped_count(), 0);
        assert_eq!(report.imported_count(), 2);

        let asthma = &report.templates[0];
        assert_eq!(asthma.required_documents, vec!["SEP", "Resume Medis"]);
        assert_eq!(asthma.severity, Severity::I);

        let dengue = &report.templates[1];
        assert_eq!(
            dengue.required_documents,
            vec!["SEP", "Trombosit", "Resume Medis"]
        );
        assert_eq!(dengue.severity, Severity::II);
    }

    #[test]
    fn test_document_names_with_commas_survive_export() {
        let mut template = crate::catalog::tests::template("A91", "Dengue", Some(5_000_000));
        template.required_documents = vec![
            "Hasil Lab (Hb, Trombosit)".into(),
            "SEP".into(),
            "Surat \"Rujukan\", FKTP".into(),
        ];
        let catalog = ReferenceCatalog::new(vec![template]);

        let text = export_catalog(&catalog).expect("export should succeed");
        let report = import_catalog(&text);

        assert_eq!(report.skipped_count(), 0);
        assert_eq!(report.templates, catalog.templates());
    }
}
