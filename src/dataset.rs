use crate::{memory::*, KMeansError, Result};
use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};
use tracing::debug;

/// Read `sample_cnt` points of `sample_dims` coordinates from the text file at `path`.
///
/// ## Errors
/// - [`KMeansError::Io`] if the file can not be opened or read
/// - [`KMeansError::Format`] if the file is not text, a token is not an integer in range of `T`,
///   or if the file holds fewer than `sample_cnt * sample_dims` values
pub fn read_dataset<T: Primitive>(path: impl AsRef<Path>, sample_cnt: usize, sample_dims: usize) -> Result<Matrix<T>> {
    let path = path.as_ref();
    let io_error = |source| KMeansError::Io { path: path.to_path_buf(), source };
    let file = File::open(path).map_err(io_error)?;
    let samples = parse_dataset(BufReader::new(file), sample_cnt, sample_dims).map_err(|e| match e {
        KMeansError::Io { source, .. } => io_error(source),
        other => other,
    })?;
    debug!(path = %path.display(), points = sample_cnt, dims = sample_dims, "dataset read");
    Ok(samples)
}

/// Parse whitespace separated integers, row-major. Tokens past the first
/// `sample_cnt * sample_dims` values are not looked at.
pub fn parse_dataset<T: Primitive, R: BufRead>(reader: R, sample_cnt: usize, sample_dims: usize) -> Result<Matrix<T>> {
    let expected = sample_cnt * sample_dims;
    let mut values = Vec::with_capacity(expected);

    for (line_nr, line) in reader.lines().enumerate() {
        if values.len() == expected { break; }
        let line = line.map_err(|source| match source.kind() {
            io::ErrorKind::InvalidData => KMeansError::Format(format!("line {}: not valid UTF-8 text", line_nr + 1)),
            _ => KMeansError::Io { path: Default::default(), source },
        })?;
        for token in line.split_whitespace() {
            if values.len() == expected { break; }
            let value = token.parse::<i64>().ok()
                .and_then(num::cast::<i64, T>)
                .ok_or_else(|| KMeansError::Format(format!(
                    "line {}: '{}' is not a valid {}-bit integer coordinate", line_nr + 1, token, std::mem::size_of::<T>() * 8)))?;
            values.push(value);
        }
    }

    if values.len() < expected {
        return Err(KMeansError::Format(format!(
            "expected {} values ({} points x {} dimensions), found only {}", expected, sample_cnt, sample_dims, values.len())));
    }
    Matrix::from_vec(values, sample_cnt, sample_dims)
}
