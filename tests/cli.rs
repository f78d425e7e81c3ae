use std::{io::Write, path::Path, process::{Command, Output}};
use tempfile::NamedTempFile;

fn kmeans_par(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_kmeans-par"))
        .args(args)
        .output()
        .expect("failed to run kmeans-par")
}

fn dataset(values: &[i32], dims: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for row in values.chunks(dims) {
        let row: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        writeln!(file, "{}", row.join(" ")).unwrap();
    }
    file
}

/// Returns the (elapsed, checksum) lines of a successful run.
fn result_lines(out: &Output) -> (f64, i64) {
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8(out.stdout.clone()).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2, "stdout: {}", stdout);
    (lines[0].parse().unwrap(), lines[1].parse().unwrap())
}

fn path(file: &NamedTempFile) -> &str {
    file.path().to_str().unwrap()
}

#[test]
fn every_point_its_own_cluster() {
    let file = dataset(&[0, 0, 1, 0, 0, 5, 1, 5], 2);
    for strategy in ["threads", "parallel-for"] {
        let (elapsed, checksum) = result_lines(&kmeans_par(&[strategy, path(&file), "4", "2", "4", "3", "2"]));
        assert!(elapsed >= 0.0);
        assert_eq!(checksum, 12);
    }
}

#[test]
fn strategies_print_the_same_checksum() {
    let values: Vec<i32> = (0..3000i32).map(|i| (i * 7919 + 13) % 2003 - 1000).collect();
    let file = dataset(&values, 3);
    let shape = [path(&file), "1000", "3", "6", "8"];

    let mut checksums = Vec::new();
    for (strategy, workers) in [("threads", "1"), ("threads", "5"), ("parallel-for", "3")] {
        let mut args = vec![strategy];
        args.extend_from_slice(&shape);
        args.push(workers);
        checksums.push(result_lines(&kmeans_par(&args)).1);
    }
    for processes in ["1", "3"] {
        let mut args = vec!["distributed"];
        args.extend_from_slice(&shape);
        args.extend_from_slice(&["--processes", processes]);
        checksums.push(result_lines(&kmeans_par(&args)).1);
    }
    assert!(checksums.windows(2).all(|w| w[0] == w[1]), "checksums: {:?}", checksums);
}

#[test]
fn centroid_listing_follows_the_result_lines() {
    let file = dataset(&[0, 0, 1, 0, 0, 5, 1, 5], 2);
    let out = kmeans_par(&["--centroids", "threads", path(&file), "4", "2", "2", "1", "1"]);
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.contains("--- Final centroids ---"));
    assert!(stdout.contains("Centroid 1: ["));
}

#[test]
fn invalid_runs_exit_with_one() {
    let file = dataset(&[1, 2, 3, 4], 2);
    let missing = Path::new(path(&file)).with_extension("missing");
    let cases: Vec<Vec<&str>> = vec![
        vec!["threads", path(&file), "2", "2", "3", "1", "1"],
        vec!["threads", path(&file), "2", "2", "1", "1", "0"],
        vec!["parallel-for", path(&file), "3", "2", "1", "1", "1"],
        vec!["threads", missing.to_str().unwrap(), "2", "2", "1", "1", "1"],
        vec!["threads", path(&file), "two", "2", "1", "1", "1"],
        vec!["distributed", path(&file), "2", "2", "1", "1", "--processes", "0"],
    ];
    for args in cases {
        let out = kmeans_par(&args);
        assert_eq!(out.status.code(), Some(1), "args: {:?}", args);
        assert!(out.stdout.is_empty());
        assert!(!out.stderr.is_empty());
    }
}
