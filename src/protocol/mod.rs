//! Wire protocol: frame codec and the request/response code tables.

mod codes;
mod frame;

pub use codes::{RequestType, ResponseCode};
pub use frame::{
  decode_json, decode_length, encode_frame, encode_json, LEN_PREFIX_BYTES, MAX_FRAME_SIZE,
};
