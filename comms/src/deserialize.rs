use std::io;

pub trait Deserialize: Sized {
    /// Reads a `Self` from the front of `buf`, advancing it past the consumed bytes.
    ///
    /// # Arguments
    /// * `buf` - The bytes to read from.
    ///
    /// # Returns
    /// The decoded value or an `InvalidData` io error if `buf` is malformed.
    fn deserialize(buf: &mut &[u8]) -> io::Result<Self>;
}
