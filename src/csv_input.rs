use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf8Sig,
    Latin1,
}

impl TextEncoding {
    pub fn parse(label: &str) -> AppResult<Self> {
        match label.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "utf-8-sig" | "utf8-sig" => Ok(TextEncoding::Utf8Sig),
            "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" => Ok(TextEncoding::Latin1),
            other => Err(AppError::Config(format!("unsupported encoding: {other}"))),
        }
    }

    fn decode(self, bytes: Vec<u8>) -> AppResult<String> {
        match self {
            TextEncoding::Utf8 | TextEncoding::Utf8Sig => {
                let text = String::from_utf8(bytes)
                    .map_err(|err| AppError::Encoding(format!("invalid UTF-8: {err}")))?;
                Ok(text
                    .strip_prefix('\u{feff}')
                    .map(str::to_string)
                    .unwrap_or(text))
            }
            TextEncoding::Latin1 => Ok(bytes.into_iter().map(char::from).collect()),
        }
    }
}

pub fn parse_delimiter(value: &str) -> AppResult<u8> {
    match value {
        "\\t" | "tab" | "\t" => Ok(b'\t'),
        other => {
            let bytes = other.as_bytes();
            if bytes.len() == 1 && bytes[0].is_ascii() {
                Ok(bytes[0])
            } else {
                Err(AppError::Config(format!(
                    "delimiter must be a single ASCII character, got {other:?}"
                )))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub encoding: TextEncoding,
    pub delimiter: u8,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            encoding: TextEncoding::Utf8,
            delimiter: b',',
        }
    }
}

/// A required input column and the header spellings accepted for it.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub canonical: &'static str,
    pub aliases: &'static [&'static str],
}

impl ColumnSpec {
    fn matches(&self, header: &str) -> bool {
        let wanted = header_key(header);
        header_key(self.canonical) == wanted || self.aliases.iter().any(|a| header_key(a) == wanted)
    }
}

/// Header comparison key: trimmed, lower-cased, inner whitespace collapsed.
pub fn header_key(header: &str) -> String {
    header
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// A parsed CSV file whose required columns have been located.
pub struct CsvTable {
    headers: Vec<String>,
    columns: Vec<usize>,
    records: Vec<Result<StringRecord, csv::Error>>,
}

impl CsvTable {
    /// Reads `path`. Fails before any record is looked at when the file is
    /// missing or a required column cannot be found.
    pub fn open(path: &Path, options: &CsvOptions, required: &[ColumnSpec]) -> AppResult<Self> {
        if !path.is_file() {
            return Err(AppError::InputNotFound(path.to_path_buf()));
        }
        let bytes = fs::read(path)?;
        let text = options.encoding.decode(bytes)?;
        Self::from_text(&text, options.delimiter, required)
    }

    pub fn from_text(text: &str, delimiter: u8, required: &[ColumnSpec]) -> AppResult<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut columns = Vec::with_capacity(required.len());
        for spec in required {
            let index = headers
                .iter()
                .position(|h| spec.matches(h))
                .ok_or_else(|| AppError::MissingColumn {
                    column: spec.canonical.to_string(),
                    found: headers.clone(),
                })?;
            columns.push(index);
        }
        debug!(?headers, ?columns, "resolved CSV columns");

        let records = reader.records().collect();
        Ok(Self {
            headers,
            columns,
            records,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows in file order, each projected onto the required columns.
    /// Missing trailing fields read as empty strings.
    pub fn rows(self) -> impl Iterator<Item = Result<Vec<String>, csv::Error>> {
        let columns = self.columns;
        self.records.into_iter().map(move |record| {
            record.map(|record| {
                columns
                    .iter()
                    .map(|&index| record.get(index).unwrap_or_default().to_string())
                    .collect()
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    const COLUMNS: &[ColumnSpec] = &[
        ColumnSpec {
            canonical: "Venue",
            aliases: &["name"],
        },
        ColumnSpec {
            canonical: "Instgram link",
            aliases: &["instagram link"],
        },
    ];

    #[test]
    fn resolves_columns_across_spelling_variants() {
        let table = CsvTable::from_text(
            "Address, Instagram  Link ,VENUE\nsomewhere,https://x.test,Twice Bar\n",
            b',',
            COLUMNS,
        )
        .unwrap();
        let rows: Vec<_> = table.rows().map(Result::unwrap).collect();
        assert_eq!(rows, vec![vec!["Twice Bar".to_string(), "https://x.test".to_string()]]);
    }

    #[test]
    fn reports_missing_columns_with_found_headers() {
        let err = CsvTable::from_text("Venue,Address\n", b',', COLUMNS)
            .err()
            .unwrap();
        match err {
            AppError::MissingColumn { column, found } => {
                assert_eq!(column, "Instgram link");
                assert_eq!(found, vec!["Venue".to_string(), "Address".to_string()]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn short_rows_read_as_empty_fields() {
        let table =
            CsvTable::from_text("Venue;Instgram link\nTwice Bar\n", b';', COLUMNS).unwrap();
        let rows: Vec<_> = table.rows().map(Result::unwrap).collect();
        assert_eq!(rows, vec![vec!["Twice Bar".to_string(), String::new()]]);
    }

    #[test]
    fn missing_file_is_input_not_found() {
        let dir = tempdir().unwrap();
        let err = CsvTable::open(&dir.path().join("nope.csv"), &CsvOptions::default(), COLUMNS)
            .err()
            .unwrap();
        assert!(matches!(err, AppError::InputNotFound(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn decodes_latin1_and_strips_bom() {
        let dir = tempdir().unwrap();
        let latin = dir.path().join("latin.csv");
        fs::write(&latin, b"Venue,Instgram link\nCaf\xe9 Del Mar,\n").unwrap();
        let options = CsvOptions {
            encoding: TextEncoding::parse("latin-1").unwrap(),
            delimiter: b',',
        };
        let rows: Vec<_> = CsvTable::open(&latin, &options, COLUMNS)
            .unwrap()
            .rows()
            .map(Result::unwrap)
            .collect();
        assert_eq!(rows[0][0], "Café Del Mar");

        let bom = dir.path().join("bom.csv");
        fs::write(&bom, "\u{feff}Venue,Instgram link\nTwice Bar,\n").unwrap();
        let table = CsvTable::open(&bom, &CsvOptions::default(), COLUMNS).unwrap();
        assert_eq!(table.headers()[0], "Venue");
    }

    #[test]
    fn parses_delimiters_and_encodings() {
        assert_eq!(parse_delimiter(";").unwrap(), b';');
        assert_eq!(parse_delimiter("\\t").unwrap(), b'\t');
        assert!(parse_delimiter(",,").is_err());
        assert_eq!(TextEncoding::parse("UTF_8").unwrap(), TextEncoding::Utf8);
        assert!(TextEncoding::parse("shift-jis").is_err());
    }
}
