use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

const WRAP_WIDTH: usize = 60;

/// One '>'-delimited record: header-derived identifier plus the
/// concatenated sequence lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    pub id: String,
    pub sequence: String,
}

#[derive(Error, Debug)]
pub enum FastaError {
    #[error("failed to read {path}: {error}")]
    Io {
        path: String,
        error: std::io::Error,
    },
    #[error("{path} contains no records")]
    Empty { path: String },
    #[error("{path}: sequence data on line {line} before any '>' header")]
    SequenceBeforeHeader { path: String, line: usize },
}

/// How to derive a record identifier from the raw header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderFormat {
    /// The whole header after '>', trimmed.
    #[default]
    Plain,
    /// UniProt convention: `sp|Q6GZX4|001R_FRG3G` yields accession `Q6GZX4`.
    Uniprot,
}

impl HeaderFormat {
    /// None when the header does not follow the format; callers log and
    /// skip that record rather than failing the file.
    pub fn identifier(&self, header: &str) -> Option<String> {
        match self {
            HeaderFormat::Plain => {
                let id = header.trim();
                (!id.is_empty()).then(|| id.to_owned())
            }
            HeaderFormat::Uniprot => {
                let parts: Vec<&str> = header.split('|').collect();
                if parts.len() > 2 {
                    let accession = parts[1].trim();
                    (!accession.is_empty()).then(|| accession.to_owned())
                } else {
                    None
                }
            }
        }
    }
}

#[derive(Error, Debug, Clone)]
#[error("{format:?} is not a header format (expected plain or uniprot)")]
pub struct HeaderFormatParseError {
    pub format: String,
}

impl FromStr for HeaderFormat {
    type Err = HeaderFormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" => Ok(HeaderFormat::Plain),
            "uniprot" => Ok(HeaderFormat::Uniprot),
            other => Err(HeaderFormatParseError {
                format: other.to_owned(),
            }),
        }
    }
}

/// Reads every record from a FASTA file, in file order. Re-reading the same
/// file yields the same records; a trailing record with no following header
/// is still emitted.
pub fn read_fasta(path: impl AsRef<Path>) -> Result<Vec<FastaRecord>, FastaError> {
    let path = path.as_ref();
    let display = path.display().to_string();
    let file = File::open(path).map_err(|error| FastaError::Io {
        path: display.clone(),
        error,
    })?;
    parse_reader(BufReader::new(file), &display)
}

pub fn parse_reader(reader: impl BufRead, path: &str) -> Result<Vec<FastaRecord>, FastaError> {
    let mut records = Vec::new();
    let mut header: Option<String> = None;
    let mut sequence = String::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|error| FastaError::Io {
            path: path.to_owned(),
            error,
        })?;
        if let Some(rest) = line.strip_prefix('>') {
            if let Some(id) = header.take() {
                records.push(FastaRecord {
                    id,
                    sequence: std::mem::take(&mut sequence),
                });
            }
            header = Some(rest.trim().to_owned());
        } else {
            let data = line.trim();
            if data.is_empty() {
                continue;
            }
            if header.is_none() {
                return Err(FastaError::SequenceBeforeHeader {
                    path: path.to_owned(),
                    line: index + 1,
                });
            }
            sequence.push_str(data);
        }
    }

    if let Some(id) = header {
        records.push(FastaRecord { id, sequence });
    }

    if records.is_empty() {
        return Err(FastaError::Empty {
            path: path.to_owned(),
        });
    }

    Ok(records)
}

/// Serializes records back to FASTA text, sequences wrapped at 60 columns.
pub fn to_fasta(records: &[FastaRecord]) -> String {
    let mut out = String::new();
    for record in records {
        writeln!(out, ">{}", record.id).expect("writing to a String cannot fail");
        let bytes = record.sequence.as_bytes();
        if bytes.is_empty() {
            out.push('\n');
            continue;
        }
        for chunk in bytes.chunks(WRAP_WIDTH) {
            // sequences are ASCII amino-acid symbols, chunking is safe
            out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(text: &str) -> Result<Vec<FastaRecord>, FastaError> {
        parse_reader(Cursor::new(text.to_owned()), "test.fasta")
    }

    #[test]
    fn test_parses_multiple_records() {
        let records = parse(">A\nMKV\n>B\nMKT\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], FastaRecord { id: "A".into(), sequence: "MKV".into() });
        assert_eq!(records[1], FastaRecord { id: "B".into(), sequence: "MKT".into() });
    }

    #[test]
    fn test_concatenates_wrapped_sequence_lines() {
        let records = parse(">A\nMKV\nLAT\nRE\n").unwrap();
        assert_eq!(records[0].sequence, "MKVLATRE");
    }

    #[test]
    fn test_trailing_record_without_newline_is_emitted() {
        let records = parse(">A\nMKV\n>B\nMKT").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].sequence, "MKT");
    }

    #[test]
    fn test_empty_file_is_an_error() {
        assert!(matches!(parse(""), Err(FastaError::Empty { .. })));
    }

    #[test]
    fn test_sequence_before_header_is_an_error() {
        match parse("MKV\n>A\nMKT\n") {
            Err(FastaError::SequenceBeforeHeader { line, .. }) => assert_eq!(line, 1),
            other => panic!("expected SequenceBeforeHeader, got {other:?}"),
        }
    }

    #[test]
    fn test_blank_lines_and_crlf_are_tolerated() {
        let records = parse(">A\r\nMKV\r\n\r\n>B\r\nMKT\r\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sequence, "MKV");
    }

    #[test]
    fn test_round_trip_preserves_records() {
        let original = parse(">A\nMKVLATRE\n>B\nMKT\n").unwrap();
        let reparsed = parse(&to_fasta(&original)).unwrap();
        assert_eq!(original, reparsed);
    }

    #[test]
    fn test_writer_wraps_long_sequences() {
        let records = vec![FastaRecord {
            id: "A".into(),
            sequence: "M".repeat(130),
        }];
        let text = to_fasta(&records);
        let longest = text.lines().map(str::len).max().unwrap();
        assert!(longest <= 60);
        assert_eq!(parse(&text).unwrap(), records);
    }

    #[test]
    fn test_uniprot_accession_extraction() {
        let format = HeaderFormat::Uniprot;
        assert_eq!(
            format.identifier("sp|Q6GZX4|001R_FRG3G").as_deref(),
            Some("Q6GZX4")
        );
        assert_eq!(format.identifier("sp|Q6GZX4"), None);
        assert_eq!(format.identifier("plain header"), None);
    }

    #[test]
    fn test_plain_identifier_is_whole_header() {
        assert_eq!(
            HeaderFormat::Plain.identifier(" seq_1 lipase ").as_deref(),
            Some("seq_1 lipase")
        );
        assert_eq!(HeaderFormat::Plain.identifier("   "), None);
    }
}
