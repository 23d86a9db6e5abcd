//! Big-endian, length-prefixed encodings of the values exchanged during training.
//!
//! * `Tensor2D`: `i32 rows, i32 cols, rows * cols × f32` in row-major order.
//! * Parameter array: `i32 count`, then `count` pairs of `weight, bias` tensors.
//! * Gradient batch: `i32 arrays`, then `arrays` parameter arrays.
//! * Stats pair: `i32 total, i32 correct` for the training and validation records.

use std::io;

use bytes::{Buf, BufMut};

use crate::{Deserialize, Serialize};

const I32_SIZE: usize = size_of::<i32>();
const F32_SIZE: usize = size_of::<f32>();

/// A dense row-major matrix as it travels on the wire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tensor2D {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f32>,
}

impl Tensor2D {
    /// Creates a new `Tensor2D`.
    ///
    /// # Arguments
    /// * `rows` - The amount of rows.
    /// * `cols` - The amount of columns.
    /// * `data` - The row-major values, must hold `rows * cols` numbers.
    ///
    /// # Returns
    /// A new `Tensor2D` or an `InvalidData` error if the sizes don't add up.
    pub fn new(rows: usize, cols: usize, data: Vec<f32>) -> io::Result<Self> {
        if rows.checked_mul(cols) != Some(data.len()) {
            return invalid(format!(
                "a {rows}x{cols} tensor can't hold {} values",
                data.len()
            ));
        }

        Ok(Self { rows, cols, data })
    }
}

/// The weight and bias tensors of one layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WireParameter {
    pub weight: Tensor2D,
    pub bias: Tensor2D,
}

/// Total and correctly classified sample counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsRecord {
    pub total: usize,
    pub correct: usize,
}

/// The pair of records a worker reports at the end of a logical iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsPair {
    pub training: StatsRecord,
    pub validation: StatsRecord,
}

fn invalid<T>(detail: String) -> io::Result<T> {
    Err(io::Error::new(io::ErrorKind::InvalidData, detail))
}

fn ensure(buf: &[u8], needed: usize, what: &str) -> io::Result<()> {
    if buf.len() < needed {
        return invalid(format!(
            "truncated {what}: needed {needed} bytes, {} left",
            buf.len()
        ));
    }

    Ok(())
}

fn get_len(buf: &mut &[u8], what: &str) -> io::Result<usize> {
    ensure(buf, I32_SIZE, what)?;
    let raw = buf.get_i32();

    usize::try_from(raw).or_else(|_| invalid(format!("negative {what}: {raw}")))
}

fn put_len<B: BufMut>(buf: &mut B, len: usize, what: &str) -> io::Result<()> {
    let Ok(raw) = i32::try_from(len) else {
        return invalid(format!("{what} {len} doesn't fit in an i32"));
    };

    buf.put_i32(raw);
    Ok(())
}

impl Serialize for Tensor2D {
    fn serialize<B: BufMut>(&self, buf: &mut B) -> io::Result<()> {
        put_len(buf, self.rows, "rows")?;
        put_len(buf, self.cols, "cols")?;

        for &x in &self.data {
            buf.put_f32(x);
        }

        Ok(())
    }
}

impl Deserialize for Tensor2D {
    fn deserialize(buf: &mut &[u8]) -> io::Result<Self> {
        let rows = get_len(buf, "rows")?;
        let cols = get_len(buf, "cols")?;

        let Some(len) = rows.checked_mul(cols) else {
            return invalid(format!("tensor shape {rows}x{cols} overflows"));
        };

        ensure(buf, len.saturating_mul(F32_SIZE), "tensor data")?;
        let data = (0..len).map(|_| buf.get_f32()).collect();

        Ok(Self { rows, cols, data })
    }
}

impl Serialize for WireParameter {
    fn serialize<B: BufMut>(&self, buf: &mut B) -> io::Result<()> {
        self.weight.serialize(buf)?;
        self.bias.serialize(buf)
    }
}

impl Deserialize for WireParameter {
    fn deserialize(buf: &mut &[u8]) -> io::Result<Self> {
        let weight = Tensor2D::deserialize(buf)?;
        let bias = Tensor2D::deserialize(buf)?;
        Ok(Self { weight, bias })
    }
}

impl Serialize for Vec<WireParameter> {
    fn serialize<B: BufMut>(&self, buf: &mut B) -> io::Result<()> {
        put_len(buf, self.len(), "parameter count")?;
        self.iter().try_for_each(|param| param.serialize(buf))
    }
}

impl Deserialize for Vec<WireParameter> {
    fn deserialize(buf: &mut &[u8]) -> io::Result<Self> {
        let count = get_len(buf, "parameter count")?;

        // Every parameter takes at least four i32 shape fields.
        ensure(buf, count.saturating_mul(4 * I32_SIZE), "parameter array")?;
        (0..count).map(|_| WireParameter::deserialize(buf)).collect()
    }
}

impl Serialize for Vec<Vec<WireParameter>> {
    fn serialize<B: BufMut>(&self, buf: &mut B) -> io::Result<()> {
        put_len(buf, self.len(), "gradient count")?;
        self.iter().try_for_each(|grad| grad.serialize(buf))
    }
}

impl Deserialize for Vec<Vec<WireParameter>> {
    fn deserialize(buf: &mut &[u8]) -> io::Result<Self> {
        let count = get_len(buf, "gradient count")?;

        ensure(buf, count.saturating_mul(I32_SIZE), "gradient batch")?;
        (0..count).map(|_| Vec::<WireParameter>::deserialize(buf)).collect()
    }
}

impl Serialize for StatsPair {
    fn serialize<B: BufMut>(&self, buf: &mut B) -> io::Result<()> {
        for record in [self.training, self.validation] {
            put_len(buf, record.total, "total")?;
            put_len(buf, record.correct, "correct")?;
        }

        Ok(())
    }
}

impl Deserialize for StatsPair {
    fn deserialize(buf: &mut &[u8]) -> io::Result<Self> {
        let mut record = || -> io::Result<StatsRecord> {
            let total = get_len(buf, "total")?;
            let correct = get_len(buf, "correct")?;
            Ok(StatsRecord { total, correct })
        };

        let training = record()?;
        let validation = record()?;
        Ok(Self {
            training,
            validation,
        })
    }
}
