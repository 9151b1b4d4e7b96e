// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Wire codec between playback programs and the board.
//!
//! Outbound: an instruction stream becomes a checksummed packet, pushed in
//! fixed-size transfer blocks. Inbound: result memory holds tagged records,
//! which [`demultiplex`] splits into response words and events.

mod response;
mod wire;

pub use response::{demultiplex, ResponseEncoder};
pub use wire::{
    decode_program, encode_program, transfer_blocks, ProgramFlags, WireError, CHECKSUM_SIZE,
    HEADER_SIZE, MAGIC, TRANSFER_BLOCK_SIZE, VERSION,
};
