//! Framed transport
//!
//! Frames are prefixed with a 4-byte big-endian length. Partial reads and
//! writes never reach the protocol layer: a reader yields whole frames or an
//! error, a writer sends whole frames or fails.

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, FramedRead, FramedWrite, LengthDelimitedCodec};

/// Read half of a framed connection
pub type FrameReader = FramedRead<OwnedReadHalf, LengthDelimitedCodec>;

/// Write half of a framed connection
pub type FrameWriter = FramedWrite<OwnedWriteHalf, LengthDelimitedCodec>;

/// Build the length-delimited codec shared by server and client
pub fn codec(max_frame_length: usize) -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(4)
        .max_frame_length(max_frame_length)
        .new_codec()
}

/// Split a stream into independently owned frame reader and writer
pub fn split(stream: TcpStream, max_frame_length: usize) -> (FrameReader, FrameWriter) {
    let (reader, writer) = stream.into_split();
    (
        FramedRead::new(reader, codec(max_frame_length)),
        FramedWrite::new(writer, codec(max_frame_length)),
    )
}

/// Wrap a whole stream, used on the client side
pub fn framed(stream: TcpStream, max_frame_length: usize) -> Framed<TcpStream, LengthDelimitedCodec> {
    Framed::new(stream, codec(max_frame_length))
}
