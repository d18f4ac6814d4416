//! Named-array files for bulk embedding input: a zip archive holding one
//! little-endian NPY array per sequence identifier (the `.npz` convention).
//! Supports f4/f8, 1-D vectors and 2-D C-order matrices; f8 is narrowed to
//! f32, the width the rest of the pipeline works in.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const MAGIC: &[u8] = b"\x93NUMPY";

#[derive(Debug, Clone, PartialEq)]
pub struct NamedArray {
    pub name: String,
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl NamedArray {
    pub fn vector(name: impl Into<String>, data: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            shape: vec![data.len()],
            data,
        }
    }

    pub fn matrix(name: impl Into<String>, rows: Vec<Vec<f32>>) -> Self {
        let width = rows.first().map_or(0, Vec::len);
        Self {
            name: name.into(),
            shape: vec![rows.len(), width],
            data: rows.into_iter().flatten().collect(),
        }
    }

    pub fn is_matrix(&self) -> bool {
        self.shape.len() == 2
    }

    /// 2-D arrays as rows; 1-D arrays come back as a single row.
    pub fn rows(&self) -> Vec<Vec<f32>> {
        match self.shape.as_slice() {
            [_, width] if *width > 0 => self.data.chunks(*width).map(<[f32]>::to_vec).collect(),
            _ => vec![self.data.clone()],
        }
    }
}

#[derive(Error, Debug)]
pub enum ArrayFileError {
    #[error("failed to read {path}: {error}")]
    Io {
        path: String,
        error: std::io::Error,
    },
    #[error("{path} is not a readable archive: {error}")]
    Archive {
        path: String,
        error: zip::result::ZipError,
    },
    #[error("{name}: not an NPY array")]
    BadMagic { name: String },
    #[error("{name}: malformed NPY header")]
    BadHeader { name: String },
    #[error("{name}: unsupported dtype {descr:?}, expected <f4 or <f8")]
    UnsupportedDtype { name: String, descr: String },
    #[error("{name}: fortran-order arrays are not supported")]
    FortranOrder { name: String },
    #[error("{name}: array data shorter than its shape")]
    Truncated { name: String },
}

/// Reads every named array from an archive, in archive order. Entry names
/// have their `.npy` suffix stripped, leaving the sequence identifier.
pub fn read_named_arrays(path: impl AsRef<Path>) -> Result<Vec<NamedArray>, ArrayFileError> {
    let path = path.as_ref();
    let display = path.display().to_string();
    let file = File::open(path).map_err(|error| ArrayFileError::Io {
        path: display.clone(),
        error,
    })?;
    let mut archive =
        ZipArchive::new(BufReader::new(file)).map_err(|error| ArrayFileError::Archive {
            path: display.clone(),
            error,
        })?;

    let mut arrays = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|error| ArrayFileError::Archive {
                path: display.clone(),
                error,
            })?;
        let name = entry
            .name()
            .strip_suffix(".npy")
            .unwrap_or(entry.name())
            .to_owned();
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut bytes)
            .map_err(|error| ArrayFileError::Io {
                path: display.clone(),
                error,
            })?;
        let (shape, data) = parse_npy(&name, &bytes)?;
        arrays.push(NamedArray { name, shape, data });
    }
    Ok(arrays)
}

/// Writes arrays as `<name>.npy` archive entries, f4 little-endian.
pub fn write_named_arrays(
    path: impl AsRef<Path>,
    arrays: &[NamedArray],
) -> Result<(), ArrayFileError> {
    let path = path.as_ref();
    let display = path.display().to_string();
    let file = File::create(path).map_err(|error| ArrayFileError::Io {
        path: display.clone(),
        error,
    })?;
    let mut writer = ZipWriter::new(file);
    for array in arrays {
        writer
            .start_file(format!("{}.npy", array.name), SimpleFileOptions::default())
            .map_err(|error| ArrayFileError::Archive {
                path: display.clone(),
                error,
            })?;
        writer
            .write_all(&encode_npy(&array.shape, &array.data))
            .map_err(|error| ArrayFileError::Io {
                path: display.clone(),
                error,
            })?;
    }
    writer.finish().map_err(|error| ArrayFileError::Archive {
        path: display,
        error,
    })?;
    Ok(())
}

fn parse_npy(name: &str, bytes: &[u8]) -> Result<(Vec<usize>, Vec<f32>), ArrayFileError> {
    let bad_header = || ArrayFileError::BadHeader {
        name: name.to_owned(),
    };

    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        return Err(ArrayFileError::BadMagic {
            name: name.to_owned(),
        });
    }
    let (header_len, header_start) = match bytes[6] {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err(bad_header());
            }
            (
                u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
                12,
            )
        }
        _ => return Err(bad_header()),
    };
    let data_start = header_start + header_len;
    if bytes.len() < data_start {
        return Err(bad_header());
    }
    let header = std::str::from_utf8(&bytes[header_start..data_start]).map_err(|_| bad_header())?;

    if header.contains("'fortran_order': True") {
        return Err(ArrayFileError::FortranOrder {
            name: name.to_owned(),
        });
    }
    let descr = quoted_value(header, "descr").ok_or_else(bad_header)?;
    let item_size = match descr {
        "<f4" => 4,
        "<f8" => 8,
        other => {
            return Err(ArrayFileError::UnsupportedDtype {
                name: name.to_owned(),
                descr: other.to_owned(),
            })
        }
    };
    let shape = parse_shape(header).ok_or_else(bad_header)?;
    if shape.len() > 2 {
        return Err(bad_header());
    }

    let count: usize = shape.iter().product();
    let data = &bytes[data_start..];
    if data.len() < count * item_size {
        return Err(ArrayFileError::Truncated {
            name: name.to_owned(),
        });
    }

    let mut values = Vec::with_capacity(count);
    match item_size {
        4 => {
            for chunk in data[..count * 4].chunks_exact(4) {
                values.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
            }
        }
        _ => {
            for chunk in data[..count * 8].chunks_exact(8) {
                let wide = f64::from_le_bytes([
                    chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
                ]);
                values.push(wide as f32);
            }
        }
    }
    Ok((shape, values))
}

/// Pulls `'<key>': '<value>'` out of the NPY header dict.
fn quoted_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let rest = &header[header.find(&format!("'{key}'"))? + key.len() + 2..];
    let rest = &rest[rest.find('\'')? + 1..];
    let end = rest.find('\'')?;
    Some(&rest[..end])
}

fn parse_shape(header: &str) -> Option<Vec<usize>> {
    let rest = &header[header.find("'shape'")?..];
    let open = rest.find('(')?;
    let close = rest.find(')')?;
    rest[open + 1..close]
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<usize>().ok())
        .collect()
}

fn encode_npy(shape: &[usize], data: &[f32]) -> Vec<u8> {
    let shape_text = match shape {
        [len] => format!("({len},)"),
        dims => format!(
            "({})",
            dims.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    };
    let mut header = format!("{{'descr': '<f4', 'fortran_order': False, 'shape': {shape_text}, }}");
    let unpadded = MAGIC.len() + 4 + header.len() + 1;
    header.push_str(&" ".repeat((64 - unpadded % 64) % 64));
    header.push('\n');

    let mut out = Vec::with_capacity(MAGIC.len() + 4 + header.len() + data.len() * 4);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    for value in data {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embeddings.npz");
        let arrays = vec![
            NamedArray::vector("P0A7G6", vec![1.0, -2.5, 3.25]),
            NamedArray::vector("Q6GZX4", vec![0.0; 8]),
        ];
        write_named_arrays(&path, &arrays).unwrap();

        let read = read_named_arrays(&path).unwrap();
        assert_eq!(read, arrays);
    }

    #[test]
    fn test_matrix_round_trip_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embeddings.npz");
        let matrix = NamedArray::matrix("A", vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        write_named_arrays(&path, std::slice::from_ref(&matrix)).unwrap();

        let read = read_named_arrays(&path).unwrap();
        assert_eq!(read.len(), 1);
        assert!(read[0].is_matrix());
        assert_eq!(read[0].shape, vec![2, 2]);
        assert_eq!(read[0].rows(), vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn test_f8_arrays_are_narrowed() {
        // hand-encoded <f8 NPY with two values
        let mut header =
            String::from("{'descr': '<f8', 'fortran_order': False, 'shape': (2,), }");
        let unpadded = 10 + header.len() + 1;
        header.push_str(&" ".repeat((64 - unpadded % 64) % 64));
        header.push('\n');
        let mut npy = Vec::new();
        npy.extend_from_slice(MAGIC);
        npy.extend_from_slice(&[1, 0]);
        npy.extend_from_slice(&(header.len() as u16).to_le_bytes());
        npy.extend_from_slice(header.as_bytes());
        npy.extend_from_slice(&1.5f64.to_le_bytes());
        npy.extend_from_slice(&(-0.25f64).to_le_bytes());

        let (shape, data) = parse_npy("A", &npy).unwrap();
        assert_eq!(shape, vec![2]);
        assert_eq!(data, vec![1.5, -0.25]);
    }

    #[test]
    fn test_rejects_non_npy_entries() {
        assert!(matches!(
            parse_npy("A", b"not an array"),
            Err(ArrayFileError::BadMagic { .. })
        ));
    }

    #[test]
    fn test_rejects_truncated_data() {
        let encoded = encode_npy(&[4], &[1.0, 2.0, 3.0, 4.0]);
        let cut = &encoded[..encoded.len() - 4];
        assert!(matches!(
            parse_npy("A", cut),
            Err(ArrayFileError::Truncated { .. })
        ));
    }

    #[test]
    fn test_entry_names_lose_npy_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embeddings.npz");
        write_named_arrays(&path, &[NamedArray::vector("sp|P1|X", vec![1.0])]).unwrap();
        let read = read_named_arrays(&path).unwrap();
        assert_eq!(read[0].name, "sp|P1|X");
    }
}
