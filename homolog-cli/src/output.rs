use std::fs;
use std::path::Path;

use common_fasta::FastaRecord;
use common_types::HomologBundle;

use crate::error::PipelineError;

/// Writes `<id>.fasta` and `<id>_homologs.json` for one query. Names are
/// deterministic from the query identifier so re-runs overwrite in place.
/// Each file is staged next to its target and renamed, so a failure never
/// leaves a half-written output behind.
pub fn write_query_outputs(
    output_dir: &Path,
    query_id: &str,
    bundles: &[HomologBundle],
) -> Result<(), PipelineError> {
    fs::create_dir_all(output_dir).map_err(|error| PipelineError::Output {
        path: output_dir.display().to_string(),
        error,
    })?;
    let stem = file_stem(query_id);

    let records: Vec<FastaRecord> = bundles
        .iter()
        .map(|bundle| FastaRecord {
            id: bundle
                .identifier
                .clone()
                .unwrap_or_else(|| "unknown".to_owned()),
            sequence: bundle.sequence.clone(),
        })
        .collect();
    write_atomic(
        &output_dir.join(format!("{stem}.fasta")),
        common_fasta::to_fasta(&records).as_bytes(),
    )?;

    let json = serde_json::to_vec_pretty(bundles)?;
    write_atomic(&output_dir.join(format!("{stem}_homologs.json")), &json)?;
    Ok(())
}

/// Query identifiers come straight from FASTA headers; keep them out of
/// trouble as filenames.
pub fn file_stem(query_id: &str) -> String {
    let cleaned: String = query_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "query".to_owned()
    } else {
        cleaned
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
    let display = path.display().to_string();
    let staged = path.with_extension("tmp");
    fs::write(&staged, bytes).map_err(|error| PipelineError::Output {
        path: display.clone(),
        error,
    })?;
    fs::rename(&staged, path).map_err(|error| PipelineError::Output {
        path: display,
        error,
    })
}
