// src/services/file_ingestor.rs

use std::borrow::Cow;
use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use csv::{ReaderBuilder, Trim};

use crate::{common::error::AppError, models::import::ParsedFile};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Spreadsheet,
}

impl FileKind {
    /// A extensão decide; o tipo declarado só é usado quando não há extensão conhecida.
    pub fn detect(file_name: Option<&str>, content_type: Option<&str>) -> Result<Self, AppError> {
        let extension = file_name
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("csv") => return Ok(FileKind::Csv),
            Some("xlsx") | Some("xls") => return Ok(FileKind::Spreadsheet),
            _ => {}
        }

        let media_type = content_type
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase());

        match media_type.as_deref() {
            Some("text/csv") | Some("application/csv") => Ok(FileKind::Csv),
            Some("application/vnd.ms-excel")
            | Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet") => {
                Ok(FileKind::Spreadsheet)
            }
            _ => Err(AppError::UnsupportedFileType(
                extension
                    .or(media_type)
                    .unwrap_or_else(|| "inconnu".to_string()),
            )),
        }
    }
}

/// Decodifica o upload em cabeçalho + linhas. Transformação pura, sem efeitos.
pub fn ingest(
    file_name: Option<&str>,
    content_type: Option<&str>,
    bytes: &[u8],
) -> Result<ParsedFile, AppError> {
    let records = match FileKind::detect(file_name, content_type)? {
        FileKind::Csv => read_csv(bytes)?,
        FileKind::Spreadsheet => read_spreadsheet(bytes)?,
    };

    let parsed = into_parsed_file(records)?;
    tracing::debug!(
        columns = parsed.headers.len(),
        rows = parsed.row_count(),
        "Arquivo decodificado"
    );
    Ok(parsed)
}

// =============================================================================
//  CSV
// =============================================================================

fn read_csv(bytes: &[u8]) -> Result<Vec<Vec<String>>, AppError> {
    let text = decode_text(bytes);
    let delimiter = detect_delimiter(&text);

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .trim(Trim::All)
        .flexible(true) // Linhas com quantidade diferente de colunas
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result
            .map_err(|e| AppError::MalformedFile(format!("ligne {}: {}", index + 1, e)))?;
        records.push(record.iter().map(str::to_string).collect());
    }

    Ok(records)
}

/// UTF-8 (sem BOM) e, se inválido, Windows-1252, o formato dos exports do Excel.
fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            text
        }
    }
}

/// Vírgula por padrão; ponto e vírgula quando domina a linha de cabeçalho.
fn detect_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or("");
    let commas = header.matches(',').count();
    let semicolons = header.matches(';').count();
    if semicolons > commas { b';' } else { b',' }
}

// =============================================================================
//  PLANILHA
// =============================================================================

fn read_spreadsheet(bytes: &[u8]) -> Result<Vec<Vec<String>>, AppError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| AppError::MalformedFile(e.to_string()))?;

    // Apenas a primeira aba
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::MalformedFile("aucune feuille dans le classeur".to_string()))?
        .map_err(|e| AppError::MalformedFile(e.to_string()))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect())
}

/// Células vazias viram "", nunca ausência de valor.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        // Telefones e CEPs chegam como float: 612345678.0 -> "612345678"
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string().trim().to_string(),
    }
}

// =============================================================================
//  NORMALIZAÇÃO
// =============================================================================

fn into_parsed_file(records: Vec<Vec<String>>) -> Result<ParsedFile, AppError> {
    let mut rows = records
        .into_iter()
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()));

    let headers: Vec<String> = rows
        .next()
        .ok_or(AppError::FileTooShort)?
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect();

    let width = headers.len();
    let rows: Vec<Vec<String>> = rows
        .map(|mut row| {
            row.resize(width, String::new());
            row
        })
        .collect();

    if rows.is_empty() {
        return Err(AppError::FileTooShort);
    }

    Ok(ParsedFile { headers, rows })
}
