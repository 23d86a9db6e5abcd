use std::io;

use bytes::BufMut;

pub trait Serialize {
    /// Writes the wire representation of `self` at the end of `buf`.
    ///
    /// # Arguments
    /// * `buf` - The buffer to write into.
    ///
    /// # Returns
    /// An io error if `self` can't be represented on the wire.
    fn serialize<B: BufMut>(&self, buf: &mut B) -> io::Result<()>;
}
