/// Largest serialized object accepted from disk or the wire.
///
/// Payload length prefixes in the block files are validated against this
/// before any payload bytes are read.
pub const MAX_BLOCK_SIZE: u32 = 0x0200_0000;
