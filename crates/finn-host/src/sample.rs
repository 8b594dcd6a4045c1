// SPDX-License-Identifier: AGPL-3.0-only

//! Input vectors and the sources that produce them

use crate::error::{HarnessError, Result};
use crate::rng::Xoshiro;
use std::path::Path;

/// Immutable input vector for one round
#[derive(Debug, Clone, PartialEq)]
pub struct InputVector(Vec<f32>);

impl InputVector {
    /// Wrap values
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    /// Number of values
    pub fn width(&self) -> usize {
        self.0.len()
    }

    /// Values in wire order
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

impl From<Vec<f32>> for InputVector {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

/// Provider of fixed-width input vectors
pub trait SampleSource {
    /// Width of every vector this source yields
    fn width(&self) -> usize;

    /// Next input vector
    ///
    /// # Errors
    ///
    /// Returns error if the source is exhausted or unreadable.
    fn next_sample(&mut self) -> Result<InputVector>;
}

/// Standard-normal random vectors from a seeded generator
pub struct RandomSource {
    width: usize,
    rng: Xoshiro,
}

impl RandomSource {
    /// Create a source of `width`-value vectors
    pub fn new(width: usize, seed: u64) -> Self {
        Self {
            width,
            rng: Xoshiro::new(seed),
        }
    }
}

impl SampleSource for RandomSource {
    fn width(&self) -> usize {
        self.width
    }

    fn next_sample(&mut self) -> Result<InputVector> {
        Ok(InputVector::new(
            (0..self.width).map(|_| self.rng.next_normal_f32()).collect(),
        ))
    }
}

/// Feature vectors read from a text file
///
/// One vector per line, values separated by commas and/or whitespace.
/// Blank lines and lines starting with `#` are skipped.
#[derive(Debug)]
pub struct FileSource {
    width: usize,
    rows: std::vec::IntoIter<InputVector>,
}

impl FileSource {
    /// Load every vector from `path`
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, a value does not parse, or a
    /// line does not have exactly `width` values.
    pub fn open(path: impl AsRef<Path>, width: usize) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| HarnessError::sample(format!("cannot read {}: {e}", path.display())))?;
        let rows = Self::parse(&text, width)?;
        tracing::debug!("Loaded {} samples from {}", rows.len(), path.display());
        Ok(Self {
            width,
            rows: rows.into_iter(),
        })
    }

    /// Parse vectors from text
    ///
    /// # Errors
    ///
    /// Same conditions as [`open`](Self::open), minus I/O.
    pub fn from_text(text: &str, width: usize) -> Result<Self> {
        Ok(Self {
            width,
            rows: Self::parse(text, width)?.into_iter(),
        })
    }

    fn parse(text: &str, width: usize) -> Result<Vec<InputVector>> {
        let mut rows = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let values = line
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|t| !t.is_empty())
                .map(|t| {
                    t.parse::<f32>().map_err(|e| {
                        HarnessError::sample(format!("line {}: bad value {t:?}: {e}", lineno + 1))
                    })
                })
                .collect::<Result<Vec<f32>>>()?;
            if values.len() != width {
                return Err(HarnessError::configuration(format!(
                    "line {}: {} values, contract width is {width}",
                    lineno + 1,
                    values.len()
                )));
            }
            rows.push(InputVector::new(values));
        }
        Ok(rows)
    }
}

impl SampleSource for FileSource {
    fn width(&self) -> usize {
        self.width
    }

    fn next_sample(&mut self) -> Result<InputVector> {
        self.rows
            .next()
            .ok_or_else(|| HarnessError::sample("sample file exhausted"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;

    #[test]
    fn random_source_has_width_and_is_seeded() {
        let mut a = RandomSource::new(10, 5);
        let mut b = RandomSource::new(10, 5);
        let x = a.next_sample().unwrap();
        assert_eq!(x.width(), 10);
        assert_eq!(x, b.next_sample().unwrap());
        assert_ne!(x, a.next_sample().unwrap());
    }

    #[test]
    fn file_source_parses_mixed_separators() {
        let text = "# header\n1.0, 2.0,3.0\n\n  4 5\t6\n";
        let mut s = FileSource::from_text(text, 3).unwrap();
        assert_eq!(s.next_sample().unwrap().as_slice(), &[1.0, 2.0, 3.0]);
        assert_eq!(s.next_sample().unwrap().as_slice(), &[4.0, 5.0, 6.0]);
        let err = s.next_sample().unwrap_err();
        assert_eq!(err.stage(), Stage::Sample);
    }

    #[test]
    fn file_source_rejects_wrong_width() {
        let err = FileSource::from_text("1,2,3\n1,2\n", 3).unwrap_err();
        assert_eq!(err.stage(), Stage::Configuration);
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn file_source_rejects_garbage() {
        let err = FileSource::from_text("1,abc\n", 2).unwrap_err();
        assert_eq!(err.stage(), Stage::Sample);
    }

    #[test]
    fn file_source_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.csv");
        std::fs::write(&path, "0.5,0.5\n").unwrap();
        let mut s = FileSource::open(&path, 2).unwrap();
        assert_eq!(s.width(), 2);
        assert_eq!(s.next_sample().unwrap().width(), 2);
    }
}
