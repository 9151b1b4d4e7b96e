// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used)]
use proptest::prelude::*;
use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};

use spindle_core::containers::{Chip, Timer};
use spindle_core::{
    Address, Barrier, IndexedCoordinate, Instruction, JtagAddress, JtagWord, OmnibusAddress,
    OmnibusWord, PlaybackProgramBuilder, TimerOnChip, TimerValue, Unique, WriteAccess,
};
use spindle_proto::{
    decode_program, demultiplex, encode_program, transfer_blocks, ProgramFlags, WireError,
    TRANSFER_BLOCK_SIZE,
};

fn instruction() -> impl Strategy<Value = Instruction> {
    prop_oneof![
        (any::<u32>(), any::<u32>()).prop_map(|(a, w)| Instruction::Write(WriteAccess::Omnibus(
            OmnibusAddress(a),
            OmnibusWord(w)
        ))),
        (any::<u16>(), any::<u64>()).prop_map(|(a, w)| Instruction::Write(WriteAccess::Jtag(
            JtagAddress(a),
            JtagWord(w)
        ))),
        any::<u32>().prop_map(|a| Instruction::ReadRequest(Address::Omnibus(OmnibusAddress(a)))),
        any::<u16>().prop_map(|a| Instruction::ReadRequest(Address::Jtag(JtagAddress(a)))),
        (0..TimerOnChip::SIZE, any::<u32>()).prop_map(|(t, v)| Instruction::WaitUntil {
            timer: TimerOnChip::from_index(t).unwrap(),
            value: TimerValue(v),
        }),
        prop_oneof![
            Just(Barrier::Omnibus),
            Just(Barrier::Jtag),
            Just(Barrier::Systime),
            Just(Barrier::All)
        ]
        .prop_map(Instruction::Barrier),
    ]
}

proptest! {
    #[test]
    fn any_stream_survives_the_packet(
        stream in prop::collection::vec(instruction(), 0..200),
        annotate in any::<bool>(),
    ) {
        let flags = ProgramFlags::with_time_annotation(annotate);
        let bytes = encode_program(&stream, flags).unwrap();
        let (decoded, decoded_flags) = decode_program(&bytes).unwrap();
        prop_assert_eq!(decoded, stream);
        prop_assert_eq!(decoded_flags.time_annotation(), annotate);
    }
}

#[test]
fn builder_output_spans_several_transfer_blocks() {
    let mut builder = PlaybackProgramBuilder::new();
    builder.write(TimerOnChip::MIN, &Timer::default()).unwrap();
    builder.write(Unique, &Chip::default()).unwrap();
    let tickets: Vec<_> = (0..64)
        .map(|_| builder.read::<Chip>(Unique).unwrap())
        .collect();
    builder.wait_until(TimerOnChip::MIN, TimerValue(1000)).unwrap();
    let program = builder.done();
    assert_eq!(program.ticket_count(), tickets.len());

    let bytes = encode_program(program.instructions(), ProgramFlags::default()).unwrap();
    let blocks: Vec<&[u8]> = transfer_blocks(&bytes).collect();
    assert!(blocks.len() > 1, "{} bytes fit one block", bytes.len());
    assert!(blocks[..blocks.len() - 1]
        .iter()
        .all(|b| b.len() == TRANSFER_BLOCK_SIZE));
    let reassembled: Vec<u8> = blocks.concat();
    assert_eq!(reassembled, bytes);
    let (decoded, _) = decode_program(&reassembled).unwrap();
    assert_eq!(decoded.as_slice(), program.instructions());
}

#[test]
fn count_mismatch_is_reported() {
    let mut bytes = encode_program(&[Instruction::Barrier(Barrier::All)], ProgramFlags::default())
        .unwrap();
    bytes[11] = 2;
    // Re-sign so only the count is wrong.
    let body_end = bytes.len() - 32;
    let digest = blake3::hash(&bytes[..body_end]);
    bytes[body_end..].copy_from_slice(digest.as_bytes());
    assert_eq!(
        decode_program(&bytes),
        Err(WireError::CountMismatch {
            declared: 2,
            actual: 1
        })
    );
}

#[test]
fn random_bytes_never_panic() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..1000 {
        let len = rng.gen_range(0..512);
        let mut data = vec![0u8; len];
        rng.fill_bytes(&mut data);
        let _ = decode_program(&data);
        let _ = demultiplex(&data);
    }
}
