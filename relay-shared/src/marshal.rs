//! The `Marshal`/`Unmarshal` pair used by every wire-format type in
//! `relay-rtp` and `relay-rtcp` (RTP headers, RTCP packets): a byte-exact,
//! allocation-aware encode/decode split rather than `serde`, since these
//! formats are bit-packed rather than self-describing.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{Error, Result};

pub trait MarshalSize {
    /// Exact number of bytes a call to `marshal_to` will write.
    fn marshal_size(&self) -> usize;
}

pub trait Marshal: MarshalSize {
    /// Encode into `buf`, which must already have room for
    /// [`MarshalSize::marshal_size`] bytes; returns the number written.
    fn marshal_to(&self, buf: &mut [u8]) -> Result<usize>;

    fn marshal(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.marshal_size());
        buf.resize(self.marshal_size(), 0);
        let n = self.marshal_to(&mut buf)?;
        buf.truncate(n);
        Ok(buf.freeze())
    }
}

pub trait Unmarshal: Sized {
    fn unmarshal<B>(buf: &mut B) -> Result<Self>
    where
        B: Buf;
}

/// Helper for the common "need at least N more bytes" check, used by every
/// hand-rolled `unmarshal` implementation in this workspace.
pub fn require(buf_remaining: usize, need: usize, what: &'static str) -> Result<()> {
    if buf_remaining < need {
        return Err(Error::Other(format!(
            "{what}: need {need} bytes, have {buf_remaining}"
        )));
    }
    Ok(())
}
