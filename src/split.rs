/*!
 * Repartitioning of oversized input files
 *
 * Cuts one CSV file into `<stem>_<n>.csv` pieces of bounded row count, each
 * repeating the source header, so the pieces can be fed to the partitioner
 * as independent units of work.
 */

use std::path::{Path, PathBuf};

use csv::{ByteRecord, ReaderBuilder, Writer, WriterBuilder};
use tracing::{debug, info};

use crate::{PartitionError, Result};

fn open_piece(output_dir: &Path, stem: &str, n: usize, header: &ByteRecord) -> Result<(PathBuf, Writer<std::fs::File>)> {
    let path = output_dir.join(format!("{}_{}.csv", stem, n));
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_path(&path)
        .map_err(|e| PartitionError::from(e).with_file(&path))?;
    writer.write_byte_record(header)?;
    Ok((path, writer))
}

/// Split `input` into pieces of at most `rows_per_chunk` data rows
///
/// Returns the written paths in order. A header-only input yields one
/// header-only piece.
pub fn split_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output_dir: Q,
    rows_per_chunk: usize,
) -> Result<Vec<PathBuf>> {
    let input = input.as_ref();
    let output_dir = output_dir.as_ref();

    if rows_per_chunk == 0 {
        return Err(PartitionError::configuration(
            "rows per chunk must be greater than zero",
            Some("The default of 250000 rows keeps pieces small enough for a worker"),
        ));
    }
    if !input.exists() {
        return Err(PartitionError::file_not_found_with_suggestion(input.to_path_buf()));
    }
    std::fs::create_dir_all(output_dir).map_err(|e| PartitionError::from(e).with_file(output_dir))?;

    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "chunk".to_string());

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(input)
        .map_err(|e| PartitionError::from(e).with_file(input))?;
    let header = reader
        .byte_headers()
        .map_err(|e| PartitionError::from(e).with_file(input))?
        .clone();

    let mut written = Vec::new();
    let (path, mut writer) = open_piece(output_dir, &stem, 1, &header)?;
    written.push(path);
    let mut rows_in_piece = 0;
    let mut record = ByteRecord::new();

    while reader
        .read_byte_record(&mut record)
        .map_err(|e| PartitionError::from(e).with_file(input))?
    {
        if rows_in_piece == rows_per_chunk {
            writer.flush()?;
            debug!(piece = written.len(), rows = rows_in_piece, "Finished piece");
            let (path, next) = open_piece(output_dir, &stem, written.len() + 1, &header)?;
            written.push(path);
            writer = next;
            rows_in_piece = 0;
        }
        writer.write_byte_record(&record)?;
        rows_in_piece += 1;
    }
    writer.flush()?;

    info!(
        input = %input.display(),
        pieces = written.len(),
        "Split input file"
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn data_rows(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_split_into_bounded_pieces() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("chunk_3.csv");
        std::fs::write(&input, "a,b\n1,x\n2,y\n3,z\n4,w\n5,v\n").unwrap();

        let out = dir.path().join("chunk_3");
        let pieces = split_file(&input, &out, 2).unwrap();
        let names: Vec<_> = pieces
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["chunk_3_1.csv", "chunk_3_2.csv", "chunk_3_3.csv"]);
        assert_eq!(data_rows(&pieces[0]), ["a,b", "1,x", "2,y"]);
        assert_eq!(data_rows(&pieces[2]), ["a,b", "5,v"]);
    }

    #[test]
    fn test_exact_multiple_has_no_empty_piece() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.csv");
        std::fs::write(&input, "a\n1\n2\n").unwrap();
        assert_eq!(split_file(&input, dir.path().join("o"), 2).unwrap().len(), 1);
    }

    #[test]
    fn test_header_only_and_invalid_rows() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.csv");
        std::fs::write(&input, "a,b\n").unwrap();

        let pieces = split_file(&input, dir.path().join("o"), 10).unwrap();
        assert_eq!(pieces.len(), 1);
        assert_eq!(data_rows(&pieces[0]), ["a,b"]);

        assert!(matches!(
            split_file(&input, dir.path().join("o"), 0),
            Err(PartitionError::Configuration { .. })
        ));
    }
}
