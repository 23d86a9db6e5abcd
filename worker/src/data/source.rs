use std::io::{self, BufRead};

use ndarray::Array1;

use super::Sample;
use crate::Result;

/// Anything able to produce a worker's samples once.
pub trait DataSource {
    fn samples(&mut self) -> Result<Vec<Sample>>;
}

impl DataSource for Vec<Sample> {
    fn samples(&mut self) -> Result<Vec<Sample>> {
        Ok(std::mem::take(self))
    }
}

/// Reads samples from a plain text stream, one per line:
///
/// ```text
/// <train|valid> <label> <value> <value> ...
/// ```
///
/// Blank lines and lines starting with `#` are skipped.
pub struct TextSource<R: BufRead> {
    reader: R,
}

impl<R: BufRead> TextSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> DataSource for TextSource<R> {
    fn samples(&mut self) -> Result<Vec<Sample>> {
        let mut samples = Vec::new();

        for (n, line) in (&mut self.reader).lines().enumerate() {
            let line = line?;
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            samples.push(parse_line(line).map_err(|detail| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("line {}: {detail}", n + 1),
                )
            })?);
        }

        Ok(samples)
    }
}

fn parse_line(line: &str) -> std::result::Result<Sample, String> {
    let mut tokens = line.split_whitespace();

    let validation = match tokens.next() {
        Some("train") => false,
        Some("valid") => true,
        other => return Err(format!("expected train or valid, got {other:?}")),
    };

    let label = tokens
        .next()
        .ok_or("missing label")?
        .parse::<usize>()
        .map_err(|e| format!("invalid label: {e}"))?;

    let input = tokens
        .map(|t| t.parse::<f32>().map_err(|e| format!("invalid value {t:?}: {e}")))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if input.is_empty() {
        return Err("a sample needs at least one value".into());
    }

    Ok(Sample::new(Array1::from(input), label, validation))
}
