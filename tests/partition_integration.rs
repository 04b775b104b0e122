/*!
 * End-to-end tests for state partitioning
 *
 * Input files are generated in scratch directories with the full NPPES
 * header layout, partitioned with several workers, and the per-state output
 * files are read back.
 */

use nppes_states::constants::PRACTICE_STATE_COLUMN;
use nppes_states::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::TempDir;

/// One generated input row
struct Row<'a> {
    npi: String,
    state: &'a str,
    taxonomies: &'a [(usize, &'a str)],
}

fn row(npi: impl ToString, state: &str) -> Row<'_> {
    Row {
        npi: npi.to_string(),
        state,
        taxonomies: &[],
    }
}

/// Write an input file whose header carries an extra unrelated column first
fn write_input(path: &Path, rows: &[Row]) {
    let mut headers = vec!["Certification Date".to_string()];
    headers.extend(InputSchema::required_columns());
    let idx = |name: &str| headers.iter().position(|h| h == name).unwrap();
    let npi = idx("NPI");
    let state = idx(PRACTICE_STATE_COLUMN);

    let mut writer = csv::Writer::from_path(path).unwrap();
    writer.write_record(&headers).unwrap();
    for r in rows {
        let mut fields = vec![String::new(); headers.len()];
        fields[0] = "ignored".to_string();
        fields[npi] = r.npi.clone();
        fields[state] = r.state.to_string();
        for (n, code) in r.taxonomies {
            fields[idx(&format!("Healthcare Provider Taxonomy Code_{}", n))] = code.to_string();
        }
        writer.write_record(&fields).unwrap();
    }
    writer.flush().unwrap();
}

fn config(input: &Path, output: &Path, threads: usize, chunk_size: usize) -> PartitionConfig {
    ConfigBuilder::new()
        .input_dir(input)
        .output_dir(output)
        .parallel_threads(Some(threads))
        .chunk_size(chunk_size)
        .progress_bar(false)
        .build()
        .unwrap()
}

fn read_state_file(path: &Path) -> Vec<csv::StringRecord> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .unwrap()
        .records()
        .map(|r| r.unwrap())
        .collect()
}

fn header_count(rows: &[csv::StringRecord]) -> usize {
    rows.iter().filter(|r| &r[0] == "NPI").count()
}

fn sorted_npis(rows: &[csv::StringRecord]) -> Vec<String> {
    let mut npis: Vec<String> = rows
        .iter()
        .filter(|r| &r[0] != "NPI")
        .map(|r| r[0].to_string())
        .collect();
    npis.sort();
    npis
}

#[test]
fn test_single_row_routed_with_reduced_taxonomies() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in");
    std::fs::create_dir(&input).unwrap();
    write_input(
        &input.join("chunk_1.csv"),
        &[Row {
            npi: "1234567893".to_string(),
            state: "CA",
            taxonomies: &[(1, "207Q00000X"), (2, "  "), (3, "208D00000X")],
        }],
    );

    let output = dir.path().join("states");
    let summary = partition_states(config(&input, &output, 2, 100)).unwrap();
    assert!(summary.is_success());
    assert_eq!(summary.rows_written, 1);
    assert_eq!(summary.rows_by_state, vec![(StateKey::CA, 1)]);

    let rows = read_state_file(&output.join("CA.csv"));
    assert_eq!(rows.len(), 2);
    let header: Vec<&str> = rows[0].iter().collect();
    assert_eq!(header, OutputSchema::column_names());
    assert_eq!(&rows[1][0], "1234567893");
    assert_eq!(&rows[1][47], "207Q00000X,208D00000X");
    assert_eq!(rows[1].len(), OutputSchema::column_count());
    assert!(rows[1].iter().all(|field| field != "ignored"));
    assert_eq!(std::fs::read_dir(&output).unwrap().count(), 1);
}

#[test]
fn test_rows_outside_state_set_are_excluded() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in");
    std::fs::create_dir(&input).unwrap();
    write_input(
        &input.join("a.csv"),
        &[row(1, "ZZ"), row(2, "PR"), row(3, ""), row(4, "ca"), row(5, "NY")],
    );

    let output = dir.path().join("out");
    let summary = partition_states(config(&input, &output, 1, 2)).unwrap();
    assert_eq!(summary.rows_read, 5);
    assert_eq!(summary.rows_excluded, 4);
    assert_eq!(summary.rows_written, 1);

    let files: Vec<_> = std::fs::read_dir(&output)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(files, ["NY.csv"]);
}

#[test]
fn test_concurrent_first_writes_produce_one_header() {
    const FILES: usize = 24;
    const ROWS_PER_FILE: usize = 40;

    for round in 0..3 {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        std::fs::create_dir(&input).unwrap();

        let mut expected_ca = Vec::new();
        let mut expected_ny = Vec::new();
        for f in 0..FILES {
            let mut rows = Vec::new();
            for r in 0..ROWS_PER_FILE {
                let npi = format!("{:03}{:04}", f, r);
                let state = if r % 4 == 0 { "NY" } else { "CA" };
                if state == "CA" {
                    expected_ca.push(npi.clone());
                } else {
                    expected_ny.push(npi.clone());
                }
                rows.push(Row { npi, state, taxonomies: &[] });
            }
            write_input(&input.join(format!("chunk_{}.csv", f)), &rows);
        }
        expected_ca.sort();
        expected_ny.sort();

        let output = dir.path().join("out");
        let summary = partition_states(config(&input, &output, 8, 7)).unwrap();
        assert!(summary.is_success(), "round {round}: {:?}", summary.files_failed);
        assert_eq!(summary.files_processed, FILES);
        assert_eq!(summary.rows_written, FILES * ROWS_PER_FILE);

        let ca = read_state_file(&output.join("CA.csv"));
        let ny = read_state_file(&output.join("NY.csv"));
        assert_eq!(header_count(&ca), 1, "round {round}");
        assert_eq!(header_count(&ny), 1, "round {round}");
        assert_eq!(&ca[0][0], "NPI");
        assert_eq!(sorted_npis(&ca), expected_ca);
        assert_eq!(sorted_npis(&ny), expected_ny);
    }
}

#[test]
fn test_file_rows_stay_contiguous_and_ordered() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in");
    std::fs::create_dir(&input).unwrap();
    for f in 0..6 {
        let rows: Vec<Row> = (0..25).map(|r| row(format!("{}-{:02}", f, r), "TX")).collect();
        write_input(&input.join(format!("f{}.csv", f)), &rows);
    }

    let output = dir.path().join("out");
    partition_states(config(&input, &output, 4, 3)).unwrap();

    let tx = read_state_file(&output.join("TX.csv"));
    let npis: Vec<String> = tx[1..].iter().map(|r| r[0].to_string()).collect();
    for block in npis.chunks(25) {
        let file = &block[0][..1];
        let expected: Vec<String> = (0..25).map(|r| format!("{}-{:02}", file, r)).collect();
        assert_eq!(block, expected.as_slice());
    }
}

#[test]
fn test_bad_file_is_reported_and_leaves_no_rows() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in");
    std::fs::create_dir(&input).unwrap();
    write_input(&input.join("good_1.csv"), &[row(1, "WA"), row(2, "WA")]);
    write_input(&input.join("good_2.csv"), &[row(3, "OR")]);
    std::fs::write(input.join("bad.csv"), "NPI,Entity Type Code\n9,1\n").unwrap();

    let output = dir.path().join("out");
    let summary = partition_states(config(&input, &output, 3, 10)).unwrap();
    assert!(!summary.is_success());
    assert_eq!(summary.files_discovered, 3);
    assert_eq!(summary.files_processed, 2);
    assert_eq!(summary.files_failed.len(), 1);
    assert!(summary.files_failed[0].path.ends_with("bad.csv"));
    assert!(summary.files_failed[0].rows_by_state.is_empty());
    assert_eq!(summary.rows_written, 3);

    assert_eq!(sorted_npis(&read_state_file(&output.join("WA.csv"))), ["1", "2"]);
    assert_eq!(sorted_npis(&read_state_file(&output.join("OR.csv"))), ["3"]);

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["files_failed"].as_array().unwrap().len(), 1);
    assert!(json["elapsed_ms"].is_number());
}

#[test]
fn test_commit_failure_counts_rows_already_appended() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in");
    std::fs::create_dir(&input).unwrap();
    write_input(&input.join("a.csv"), &[row(1, "AL"), row(2, "WY")]);

    // A directory where the WY artifact should go makes its append fail
    let output = dir.path().join("out");
    std::fs::create_dir_all(output.join("WY.csv")).unwrap();

    let summary = partition_states(config(&input, &output, 1, 10)).unwrap();
    assert!(!summary.is_success());
    assert_eq!(summary.files_processed, 0);
    assert_eq!(summary.files_failed.len(), 1);
    assert_eq!(summary.files_failed[0].rows_by_state, vec![(StateKey::AL, 1)]);
    assert!(summary.files_failed[0].error.contains("I/O error"));
    assert_eq!(summary.rows_written, 1);
    assert_eq!(summary.rows_by_state, vec![(StateKey::AL, 1)]);

    let al = read_state_file(&output.join("AL.csv"));
    assert_eq!(al.len(), 2);
    assert_eq!(sorted_npis(&al), ["1"]);
}

#[test]
fn test_output_independent_of_worker_count() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in");
    std::fs::create_dir(&input).unwrap();
    let states = ["CA", "NY", "TX", "FL", "ZZ"];
    for f in 0..10 {
        let rows: Vec<Row> = (0..30).map(|r| row(f * 100 + r, states[r % states.len()])).collect();
        write_input(&input.join(format!("c{}.csv", f)), &rows);
    }

    let mut per_run: Vec<BTreeMap<String, Vec<String>>> = Vec::new();
    for (threads, chunk) in [(1, 1000), (6, 4)] {
        let output = dir.path().join(format!("out_{}", threads));
        partition_states(config(&input, &output, threads, chunk)).unwrap();
        let mut files = BTreeMap::new();
        for entry in std::fs::read_dir(&output).unwrap() {
            let path = entry.unwrap().path();
            let rows = read_state_file(&path);
            assert_eq!(header_count(&rows), 1);
            files.insert(path.file_name().unwrap().to_string_lossy().into_owned(), sorted_npis(&rows));
        }
        per_run.push(files);
    }
    assert_eq!(per_run[0], per_run[1]);
    assert_eq!(per_run[0].len(), 4);
}

#[test]
fn test_reruns_append_unless_cleaned() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in");
    std::fs::create_dir(&input).unwrap();
    write_input(&input.join("a.csv"), &[row(1, "VT"), row(2, "VT")]);
    let output = dir.path().join("out");

    partition_states(config(&input, &output, 1, 10)).unwrap();
    partition_states(config(&input, &output, 1, 10)).unwrap();
    let vt = read_state_file(&output.join("VT.csv"));
    assert_eq!(header_count(&vt), 1);
    assert_eq!(vt.len(), 5);

    let cleaned = ConfigBuilder::from_config(config(&input, &output, 1, 10))
        .clean_output(true)
        .build()
        .unwrap();
    partition_states(cleaned).unwrap();
    assert_eq!(read_state_file(&output.join("VT.csv")).len(), 3);
}

#[test]
fn test_empty_input_dir_is_configuration_error() {
    let dir = TempDir::new().unwrap();
    let err = partition_states(config(dir.path(), &dir.path().join("out"), 1, 10)).unwrap_err();
    assert!(matches!(err, PartitionError::Configuration { .. }));
}
