//! Fixed opcode tapes that drive the on-chain verifier.
//!
//! These tables are protocol data. Any change to them is a protocol change:
//! bump `TAPE_VERSION` and regenerate the golden traces alongside.

use crate::instruction::Opcode;

pub const TAPE_VERSION: u32 = 1;

/// Miller-loop tape entries in this range get coefficient steps injected
/// before them.
pub const COEFFICIENT_RANGE: core::ops::Range<u8> = 20..224;
/// Rounds (`entry - 20`) whose combo is the addition-step variant.
pub const ADDITION_STEP_ROUNDS: [u8; 5] = [3, 12, 24, 54, 153];

const COEFFICIENT_COMBO: [u8; 3] = [
    Opcode::CoefficientCombo1.code(),
    Opcode::CoefficientCombo2.code(),
    Opcode::CoefficientCombo3.code(),
];
const ADDITION_STEP_COMBO: [u8; 3] = [
    Opcode::AdditionStep1.code(),
    Opcode::AdditionStep2.code(),
    Opcode::AdditionStep3.code(),
];
const COEFFICIENT_PRIMARY: [u8; 1] = [Opcode::CoefficientPrimary.code()];
const COEFFICIENT_SECONDARY: [u8; 1] = [Opcode::CoefficientSecondary.code()];

/// Steps injected ahead of one Miller-loop tape entry.
///
///   v = entry - 20
///   v % 3 == 0  ->  [234, 235, 236] on an addition round, else [231, 232, 233]
///   v % 3 == 1  ->  [225]
///   v % 3 == 2  ->  [226]
///
/// Entries outside `COEFFICIENT_RANGE` get nothing.
pub fn coefficient_combo(entry: u8) -> &'static [u8] {
    if !COEFFICIENT_RANGE.contains(&entry) {
        return &[];
    }
    let round = entry - COEFFICIENT_RANGE.start;
    match round % 3 {
        0 if ADDITION_STEP_ROUNDS.contains(&round) => &ADDITION_STEP_COMBO,
        0 => &COEFFICIENT_COMBO,
        1 => &COEFFICIENT_PRIMARY,
        _ => &COEFFICIENT_SECONDARY,
    }
}

/// Final-exponentiation entries replayed last, in this order, by their own
/// transaction. `103` withdraws.
pub const FINAL_EXP_TERMINAL: [u8; 5] = [
    Opcode::Verify1.code(),
    Opcode::Verify2.code(),
    Opcode::Verify3.code(),
    Opcode::Verify4.code(),
    Opcode::Withdraw.code(),
];

// =============================================================================
//                           MERKLE INSERT TAPE
// =============================================================================

/// Opens the insert tape; sent with the deposit itself, so replay skips it.
pub const INSERT_OPEN: u8 = 24;
pub const INSERT_CLOSE: u8 = 26;
/// Hashing steps for one tree level.
pub const INSERT_LEVEL_SEGMENT: [u8; 28] = [
    25, 27, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 30, 31, 32, 33, 19, 20,
    21, 23,
];

/// `[24] ++ segment × levels ++ [26]`
pub fn insert_tape(levels: usize) -> Vec<u8> {
    let mut tape = Vec::with_capacity(2 + INSERT_LEVEL_SEGMENT.len() * levels);
    tape.push(INSERT_OPEN);
    for _ in 0..levels {
        tape.extend_from_slice(&INSERT_LEVEL_SEGMENT);
    }
    tape.push(INSERT_CLOSE);
    tape
}

// =============================================================================
//                         PREPARE-INPUTS TRACE
// =============================================================================

/// Run-length encoded `(opcode, count)` sequence the prepare-inputs account
/// receives: the init instruction with its 51 follow-up steps, four rounds of
/// `1, (round + 2) × 256, 6`, then `7, 8`.
pub const PREPARE_INPUTS_TRACE_RLE: [(u8, u16); 15] = [
    // Init instruction plus its 51 init steps, all opcode 0.
    (0, 52),
    (1, 1),
    (2, 256),
    (6, 1),
    (1, 1),
    (3, 256),
    (6, 1),
    (1, 1),
    (4, 256),
    (6, 1),
    (1, 1),
    (5, 256),
    (6, 1),
    (7, 1),
    (8, 1),
];

pub fn prepare_inputs_trace() -> Vec<u8> {
    PREPARE_INPUTS_TRACE_RLE
        .iter()
        .flat_map(|&(op, n)| core::iter::repeat(op).take(usize::from(n)))
        .collect()
}

// =============================================================================
//                              RAW TAPES
// =============================================================================

/// Miller-loop micro-steps, before coefficient injection.
pub const MILLER_LOOP_TAPE: [u8; 1477] = [
    3, 17, 4, 5, 20, 7, 8, 9, 18, 10, 21, 7, 8, 9, 18, 10, 22, 7, 8, 9,
    18, 10, 23, 7, 8, 9, 18, 10, 24, 7, 8, 9, 18, 10, 25, 7, 8, 9, 18, 10,
    3, 17, 4, 5, 26, 7, 8, 9, 18, 10, 27, 7, 8, 9, 18, 10, 28, 7, 8, 9,
    18, 10, 3, 17, 4, 5, 29, 7, 8, 9, 18, 10, 30, 7, 8, 9, 18, 10, 31, 7,
    8, 9, 18, 10, 32, 7, 8, 9, 18, 10, 33, 7, 8, 9, 18, 10, 34, 7, 8, 9,
    18, 10, 3, 17, 4, 5, 35, 7, 8, 9, 18, 10, 36, 7, 8, 9, 18, 10, 37, 7,
    8, 9, 18, 10, 3, 17, 4, 5, 38, 7, 8, 9, 18, 10, 39, 7, 8, 9, 18, 10,
    40, 7, 8, 9, 18, 10, 3, 17, 4, 5, 41, 7, 8, 9, 18, 10, 42, 7, 8, 9,
    18, 10, 43, 7, 8, 9, 18, 10, 44, 7, 8, 9, 18, 10, 45, 7, 8, 9, 18, 10,
    46, 7, 8, 9, 18, 10, 3, 17, 4, 5, 47, 7, 8, 9, 18, 10, 48, 7, 8, 9,
    18, 10, 49, 7, 8, 9, 18, 10, 3, 17, 4, 5, 50, 7, 8, 9, 18, 10, 51, 7,
    8, 9, 18, 10, 52, 7, 8, 9, 18, 10, 3, 17, 4, 5, 53, 7, 8, 9, 18, 10,
    54, 7, 8, 9, 18, 10, 55, 7, 8, 9, 18, 10, 3, 17, 4, 5, 56, 7, 8, 9,
    18, 10, 57, 7, 8, 9, 18, 10, 58, 7, 8, 9, 18, 10, 3, 17, 4, 5, 59, 7,
    8, 9, 18, 10, 60, 7, 8, 9, 18, 10, 61, 7, 8, 9, 18, 10, 3, 17, 4, 5,
    62, 7, 8, 9, 18, 10, 63, 7, 8, 9, 18, 10, 64, 7, 8, 9, 18, 10, 3, 17,
    4, 5, 65, 7, 8, 9, 18, 10, 66, 7, 8, 9, 18, 10, 67, 7, 8, 9, 18, 10,
    3, 17, 4, 5, 68, 7, 8, 9, 18, 10, 69, 7, 8, 9, 18, 10, 70, 7, 8, 9,
    18, 10, 3, 17, 4, 5, 71, 7, 8, 9, 18, 10, 72, 7, 8, 9, 18, 10, 73, 7,
    8, 9, 18, 10, 74, 7, 8, 9, 18, 10, 75, 7, 8, 9, 18, 10, 76, 7, 8, 9,
    18, 10, 3, 17, 4, 5, 77, 7, 8, 9, 18, 10, 78, 7, 8, 9, 18, 10, 79, 7,
    8, 9, 18, 10, 3, 17, 4, 5, 80, 7, 8, 9, 18, 10, 81, 7, 8, 9, 18, 10,
    82, 7, 8, 9, 18, 10, 3, 17, 4, 5, 83, 7, 8, 9, 18, 10, 84, 7, 8, 9,
    18, 10, 85, 7, 8, 9, 18, 10, 3, 17, 4, 5, 86, 7, 8, 9, 18, 10, 87, 7,
    8, 9, 18, 10, 88, 7, 8, 9, 18, 10, 3, 17, 4, 5, 89, 7, 8, 9, 18, 10,
    90, 7, 8, 9, 18, 10, 91, 7, 8, 9, 18, 10, 3, 17, 4, 5, 92, 7, 8, 9,
    18, 10, 93, 7, 8, 9, 18, 10, 94, 7, 8, 9, 18, 10, 3, 17, 4, 5, 95, 7,
    8, 9, 18, 10, 96, 7, 8, 9, 18, 10, 97, 7, 8, 9, 18, 10, 3, 17, 4, 5,
    98, 7, 8, 9, 18, 10, 99, 7, 8, 9, 18, 10, 100, 7, 8, 9, 18, 10, 3, 17,
    4, 5, 101, 7, 8, 9, 18, 10, 102, 7, 8, 9, 18, 10, 103, 7, 8, 9, 18, 10,
    3, 17, 4, 5, 104, 7, 8, 9, 18, 10, 105, 7, 8, 9, 18, 10, 106, 7, 8, 9,
    18, 10, 3, 17, 4, 5, 107, 7, 8, 9, 18, 10, 108, 7, 8, 9, 18, 10, 109, 7,
    8, 9, 18, 10, 3, 17, 4, 5, 110, 7, 8, 9, 18, 10, 111, 7, 8, 9, 18, 10,
    112, 7, 8, 9, 18, 10, 3, 17, 4, 5, 113, 7, 8, 9, 18, 10, 114, 7, 8, 9,
    18, 10, 115, 7, 8, 9, 18, 10, 3, 17, 4, 5, 116, 7, 8, 9, 18, 10, 117, 7,
    8, 9, 18, 10, 118, 7, 8, 9, 18, 10, 3, 17, 4, 5, 119, 7, 8, 9, 18, 10,
    120, 7, 8, 9, 18, 10, 121, 7, 8, 9, 18, 10, 3, 17, 4, 5, 122, 7, 8, 9,
    18, 10, 123, 7, 8, 9, 18, 10, 124, 7, 8, 9, 18, 10, 3, 17, 4, 5, 125, 7,
    8, 9, 18, 10, 126, 7, 8, 9, 18, 10, 127, 7, 8, 9, 18, 10, 3, 17, 4, 5,
    128, 7, 8, 9, 18, 10, 129, 7, 8, 9, 18, 10, 130, 7, 8, 9, 18, 10, 3, 17,
    4, 5, 131, 7, 8, 9, 18, 10, 132, 7, 8, 9, 18, 10, 133, 7, 8, 9, 18, 10,
    3, 17, 4, 5, 134, 7, 8, 9, 18, 10, 135, 7, 8, 9, 18, 10, 136, 7, 8, 9,
    18, 10, 3, 17, 4, 5, 137, 7, 8, 9, 18, 10, 138, 7, 8, 9, 18, 10, 139, 7,
    8, 9, 18, 10, 3, 17, 4, 5, 140, 7, 8, 9, 18, 10, 141, 7, 8, 9, 18, 10,
    142, 7, 8, 9, 18, 10, 3, 17, 4, 5, 143, 7, 8, 9, 18, 10, 144, 7, 8, 9,
    18, 10, 145, 7, 8, 9, 18, 10, 3, 17, 4, 5, 146, 7, 8, 9, 18, 10, 147, 7,
    8, 9, 18, 10, 148, 7, 8, 9, 18, 10, 3, 17, 4, 5, 149, 7, 8, 9, 18, 10,
    150, 7, 8, 9, 18, 10, 151, 7, 8, 9, 18, 10, 3, 17, 4, 5, 152, 7, 8, 9,
    18, 10, 153, 7, 8, 9, 18, 10, 154, 7, 8, 9, 18, 10, 3, 17, 4, 5, 155, 7,
    8, 9, 18, 10, 156, 7, 8, 9, 18, 10, 157, 7, 8, 9, 18, 10, 3, 17, 4, 5,
    158, 7, 8, 9, 18, 10, 159, 7, 8, 9, 18, 10, 160, 7, 8, 9, 18, 10, 3, 17,
    4, 5, 161, 7, 8, 9, 18, 10, 162, 7, 8, 9, 18, 10, 163, 7, 8, 9, 18, 10,
    3, 17, 4, 5, 164, 7, 8, 9, 18, 10, 165, 7, 8, 9, 18, 10, 166, 7, 8, 9,
    18, 10, 3, 17, 4, 5, 167, 7, 8, 9, 18, 10, 168, 7, 8, 9, 18, 10, 169, 7,
    8, 9, 18, 10, 3, 17, 4, 5, 170, 7, 8, 9, 18, 10, 171, 7, 8, 9, 18, 10,
    172, 7, 8, 9, 18, 10, 173, 7, 8, 9, 18, 10, 174, 7, 8, 9, 18, 10, 175, 7,
    8, 9, 18, 10, 3, 17, 4, 5, 176, 7, 8, 9, 18, 10, 177, 7, 8, 9, 18, 10,
    178, 7, 8, 9, 18, 10, 3, 17, 4, 5, 179, 7, 8, 9, 18, 10, 180, 7, 8, 9,
    18, 10, 181, 7, 8, 9, 18, 10, 3, 17, 4, 5, 182, 7, 8, 9, 18, 10, 183, 7,
    8, 9, 18, 10, 184, 7, 8, 9, 18, 10, 3, 17, 4, 5, 185, 7, 8, 9, 18, 10,
    186, 7, 8, 9, 18, 10, 187, 7, 8, 9, 18, 10, 3, 17, 4, 5, 188, 7, 8, 9,
    18, 10, 189, 7, 8, 9, 18, 10, 190, 7, 8, 9, 18, 10, 3, 17, 4, 5, 191, 7,
    8, 9, 18, 10, 192, 7, 8, 9, 18, 10, 193, 7, 8, 9, 18, 10, 3, 17, 4, 5,
    194, 7, 8, 9, 18, 10, 195, 7, 8, 9, 18, 10, 196, 7, 8, 9, 18, 10, 3, 17,
    4, 5, 197, 7, 8, 9, 18, 10, 198, 7, 8, 9, 18, 10, 199, 7, 8, 9, 18, 10,
    3, 17, 4, 5, 200, 7, 8, 9, 18, 10, 201, 7, 8, 9, 18, 10, 202, 7, 8, 9,
    18, 10, 3, 17, 4, 5, 203, 7, 8, 9, 18, 10, 204, 7, 8, 9, 18, 10, 205, 7,
    8, 9, 18, 10, 3, 17, 4, 5, 206, 7, 8, 9, 18, 10, 207, 7, 8, 9, 18, 10,
    208, 7, 8, 9, 18, 10, 3, 17, 4, 5, 209, 7, 8, 9, 18, 10, 210, 7, 8, 9,
    18, 10, 211, 7, 8, 9, 18, 10, 3, 17, 4, 5, 212, 7, 8, 9, 18, 10, 213, 7,
    8, 9, 18, 10, 214, 7, 8, 9, 18, 10, 3, 17, 4, 5, 215, 7, 8, 9, 18, 10,
    216, 7, 8, 9, 18, 10, 217, 7, 8, 9, 18, 10, 3, 17, 4, 5, 218, 7, 8, 9,
    18, 10, 219, 7, 8, 9, 18, 10, 220, 7, 8, 9, 18, 10, 3, 17, 4, 5, 221, 7,
    8, 9, 18, 10, 222, 7, 8, 9, 18, 10, 223, 7, 8, 9, 18, 10, 16,
];

/// Final-exponentiation micro-steps. The trailing verification and
/// withdraw steps are replayed in a batch of their own.
pub const FINAL_EXP_TAPE: [u8; 1533] = [
    0, 1, 2, 3, 4, 5, 120, 6, 7, 101, 102, 8, 9, 10, 11, 104, 12, 13, 14, 15,
    8, 9, 10, 11, 104, 12, 16, 17, 18, 19, 20, 105, 21, 22, 20, 105, 21, 22, 28, 29,
    30, 31, 107, 32, 20, 105, 21, 22, 20, 105, 21, 22, 23, 24, 25, 26, 106, 27, 20, 105,
    21, 22, 20, 105, 21, 22, 20, 105, 21, 22, 23, 24, 25, 26, 106, 27, 20, 105, 21, 22,
    20, 105, 21, 22, 20, 105, 21, 22, 20, 105, 21, 22, 20, 105, 21, 22, 20, 105, 21, 22,
    20, 105, 21, 22, 20, 105, 21, 22, 20, 105, 21, 22, 23, 24, 25, 26, 106, 27, 20, 105,
    21, 22, 20, 105, 21, 22, 20, 105, 21, 22, 20, 105, 21, 22, 20, 105, 21, 22, 20, 105,
    21, 22, 20, 105, 21, 22, 20, 105, 21, 22, 20, 105, 21, 22, 20, 105, 21, 22, 20, 105,
    21, 22, 20, 105, 21, 22, 20, 105, 21, 22, 20, 105, 21, 22, 20, 105, 21, 22, 20, 105,
    21, 22, 20, 105, 21, 22, 20, 105, 21, 22, 20, 105, 21, 22, 20, 105, 21, 22, 20, 105,
    21, 22, 20, 105, 21, 22, 20, 105, 21, 22, 20, 105, 21, 22, 20, 105, 21, 22, 20, 105,
    21, 22, 20, 105, 21, 22, 20, 105, 21, 22, 20, 105, 21, 22, 20, 105, 21, 22, 20, 105,
    21, 22, 20, 105, 21, 22, 23, 24, 25, 26, 106, 27, 20, 105, 21, 22, 20, 105, 21, 22,
    20, 105, 21, 22, 20, 105, 21, 22, 20, 105, 21, 22, 20, 105, 21, 22, 20, 105, 21, 22,
    20, 105, 21, 22, 20, 105, 21, 22, 20, 105, 21, 22, 20, 105, 21, 22, 20, 105, 21, 22,
    20, 105, 21, 22, 20, 105, 21, 22, 20, 105, 21, 22, 20, 105, 21, 22, 33, 34, 35, 36,
    37, 38, 39, 108, 40, 41, 18, 42, 43, 109, 44, 45, 43, 109, 44, 45, 51, 52, 53, 54,
    111, 55, 43, 109, 44, 45, 43, 109, 44, 45, 46, 47, 48, 49, 110, 50, 43, 109, 44, 45,
    43, 109, 44, 45, 43, 109, 44, 45, 46, 47, 48, 49, 110, 50, 43, 109, 44, 45, 43, 109,
    44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109,
    44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 46, 47, 48, 49, 110, 50, 43, 109, 44, 45,
    43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45,
    43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45,
    43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45,
    43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45,
    43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45,
    43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45,
    43, 109, 44, 45, 46, 47, 48, 49, 110, 50, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109,
    44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109,
    44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109,
    44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 56, 57, 36, 37, 38, 39,
    108, 40, 41, 18, 42, 43, 109, 44, 45, 43, 109, 44, 45, 51, 52, 53, 54, 111, 55, 43,
    109, 44, 45, 43, 109, 44, 45, 46, 47, 48, 49, 110, 50, 43, 109, 44, 45, 43, 109, 44,
    45, 43, 109, 44, 45, 46, 47, 48, 49, 110, 50, 43, 109, 44, 45, 43, 109, 44, 45, 43,
    109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43,
    109, 44, 45, 43, 109, 44, 45, 46, 47, 48, 49, 110, 50, 43, 109, 44, 45, 43, 109, 44,
    45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44,
    45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44,
    45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44,
    45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44,
    45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44,
    45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44,
    45, 46, 47, 48, 49, 110, 50, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43,
    109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43,
    109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43,
    109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 56, 58, 59, 36, 37, 38, 39, 108, 40,
    61, 62, 63, 64, 112, 65, 41, 18, 66, 67, 113, 68, 69, 67, 113, 68, 69, 75, 76, 77,
    78, 115, 79, 67, 113, 68, 69, 67, 113, 68, 69, 70, 71, 72, 73, 114, 74, 67, 113, 68,
    69, 67, 113, 68, 69, 67, 113, 68, 69, 70, 71, 72, 73, 114, 74, 67, 113, 68, 69, 67,
    113, 68, 69, 67, 113, 68, 69, 67, 113, 68, 69, 67, 113, 68, 69, 67, 113, 68, 69, 67,
    113, 68, 69, 67, 113, 68, 69, 67, 113, 68, 69, 70, 71, 72, 73, 114, 74, 67, 113, 68,
    69, 67, 113, 68, 69, 67, 113, 68, 69, 67, 113, 68, 69, 67, 113, 68, 69, 67, 113, 68,
    69, 67, 113, 68, 69, 67, 113, 68, 69, 67, 113, 68, 69, 67, 113, 68, 69, 67, 113, 68,
    69, 67, 113, 68, 69, 67, 113, 68, 69, 67, 113, 68, 69, 67, 113, 68, 69, 67, 113, 68,
    69, 67, 113, 68, 69, 67, 113, 68, 69, 67, 113, 68, 69, 67, 113, 68, 69, 67, 113, 68,
    69, 67, 113, 68, 69, 67, 113, 68, 69, 67, 113, 68, 69, 67, 113, 68, 69, 67, 113, 68,
    69, 67, 113, 68, 69, 67, 113, 68, 69, 67, 113, 68, 69, 67, 113, 68, 69, 67, 113, 68,
    69, 67, 113, 68, 69, 70, 71, 72, 73, 114, 74, 67, 113, 68, 69, 67, 113, 68, 69, 67,
    113, 68, 69, 67, 113, 68, 69, 67, 113, 68, 69, 67, 113, 68, 69, 67, 113, 68, 69, 67,
    113, 68, 69, 67, 113, 68, 69, 67, 113, 68, 69, 67, 113, 68, 69, 67, 113, 68, 69, 67,
    113, 68, 69, 67, 113, 68, 69, 67, 113, 68, 69, 67, 113, 68, 69, 80, 81, 18, 82, 43,
    109, 44, 45, 43, 109, 44, 45, 51, 52, 53, 54, 111, 55, 43, 109, 44, 45, 43, 109, 44,
    45, 83, 84, 85, 86, 116, 87, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 83,
    84, 85, 86, 116, 87, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44,
    45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44,
    45, 83, 84, 85, 86, 116, 87, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43,
    109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43,
    109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43,
    109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43,
    109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43,
    109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43,
    109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 83, 84, 85, 86, 116,
    87, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44,
    45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44,
    45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44, 45, 43, 109, 44,
    45, 43, 109, 44, 45, 56, 88, 89, 90, 57, 36, 37, 38, 39, 108, 40, 91, 92, 93, 94,
    117, 95, 96, 97, 98, 99, 118, 100, 121, 122, 123, 124, 103,
];

/// Exact opcode sequence the Miller-loop account must receive, including
/// the prepared-inputs pull, the proof loads, every injected coefficient
/// step, and the closing read.
pub const MILLER_LOOP_TRACE: [u8; 1821] = [
    251, 230, 237, 3, 17, 4, 5, 231, 232, 233, 20, 7, 8, 9, 18, 10, 225, 21, 7, 8,
    9, 18, 10, 226, 22, 7, 8, 9, 18, 10, 234, 235, 236, 23, 7, 8, 9, 18, 10, 225,
    24, 7, 8, 9, 18, 10, 226, 25, 7, 8, 9, 18, 10, 3, 17, 4, 5, 231, 232, 233,
    26, 7, 8, 9, 18, 10, 225, 27, 7, 8, 9, 18, 10, 226, 28, 7, 8, 9, 18, 10,
    3, 17, 4, 5, 231, 232, 233, 29, 7, 8, 9, 18, 10, 225, 30, 7, 8, 9, 18, 10,
    226, 31, 7, 8, 9, 18, 10, 234, 235, 236, 32, 7, 8, 9, 18, 10, 225, 33, 7, 8,
    9, 18, 10, 226, 34, 7, 8, 9, 18, 10, 3, 17, 4, 5, 231, 232, 233, 35, 7, 8,
    9, 18, 10, 225, 36, 7, 8, 9, 18, 10, 226, 37, 7, 8, 9, 18, 10, 3, 17, 4,
    5, 231, 232, 233, 38, 7, 8, 9, 18, 10, 225, 39, 7, 8, 9, 18, 10, 226, 40, 7,
    8, 9, 18, 10, 3, 17, 4, 5, 231, 232, 233, 41, 7, 8, 9, 18, 10, 225, 42, 7,
    8, 9, 18, 10, 226, 43, 7, 8, 9, 18, 10, 234, 235, 236, 44, 7, 8, 9, 18, 10,
    225, 45, 7, 8, 9, 18, 10, 226, 46, 7, 8, 9, 18, 10, 3, 17, 4, 5, 231, 232,
    233, 47, 7, 8, 9, 18, 10, 225, 48, 7, 8, 9, 18, 10, 226, 49, 7, 8, 9, 18,
    10, 3, 17, 4, 5, 231, 232, 233, 50, 7, 8, 9, 18, 10, 225, 51, 7, 8, 9, 18,
    10, 226, 52, 7, 8, 9, 18, 10, 3, 17, 4, 5, 231, 232, 233, 53, 7, 8, 9, 18,
    10, 225, 54, 7, 8, 9, 18, 10, 226, 55, 7, 8, 9, 18, 10, 3, 17, 4, 5, 231,
    232, 233, 56, 7, 8, 9, 18, 10, 225, 57, 7, 8, 9, 18, 10, 226, 58, 7, 8, 9,
    18, 10, 3, 17, 4, 5, 231, 232, 233, 59, 7, 8, 9, 18, 10, 225, 60, 7, 8, 9,
    18, 10, 226, 61, 7, 8, 9, 18, 10, 3, 17, 4, 5, 231, 232, 233, 62, 7, 8, 9,
    18, 10, 225, 63, 7, 8, 9, 18, 10, 226, 64, 7, 8, 9, 18, 10, 3, 17, 4, 5,
    231, 232, 233, 65, 7, 8, 9, 18, 10, 225, 66, 7, 8, 9, 18, 10, 226, 67, 7, 8,
    9, 18, 10, 3, 17, 4, 5, 231, 232, 233, 68, 7, 8, 9, 18, 10, 225, 69, 7, 8,
    9, 18, 10, 226, 70, 7, 8, 9, 18, 10, 3, 17, 4, 5, 231, 232, 233, 71, 7, 8,
    9, 18, 10, 225, 72, 7, 8, 9, 18, 10, 226, 73, 7, 8, 9, 18, 10, 234, 235, 236,
    74, 7, 8, 9, 18, 10, 225, 75, 7, 8, 9, 18, 10, 226, 76, 7, 8, 9, 18, 10,
    3, 17, 4, 5, 231, 232, 233, 77, 7, 8, 9, 18, 10, 225, 78, 7, 8, 9, 18, 10,
    226, 79, 7, 8, 9, 18, 10, 3, 17, 4, 5, 231, 232, 233, 80, 7, 8, 9, 18, 10,
    225, 81, 7, 8, 9, 18, 10, 226, 82, 7, 8, 9, 18, 10, 3, 17, 4, 5, 231, 232,
    233, 83, 7, 8, 9, 18, 10, 225, 84, 7, 8, 9, 18, 10, 226, 85, 7, 8, 9, 18,
    10, 3, 17, 4, 5, 231, 232, 233, 86, 7, 8, 9, 18, 10, 225, 87, 7, 8, 9, 18,
    10, 226, 88, 7, 8, 9, 18, 10, 3, 17, 4, 5, 231, 232, 233, 89, 7, 8, 9, 18,
    10, 225, 90, 7, 8, 9, 18, 10, 226, 91, 7, 8, 9, 18, 10, 3, 17, 4, 5, 231,
    232, 233, 92, 7, 8, 9, 18, 10, 225, 93, 7, 8, 9, 18, 10, 226, 94, 7, 8, 9,
    18, 10, 3, 17, 4, 5, 231, 232, 233, 95, 7, 8, 9, 18, 10, 225, 96, 7, 8, 9,
    18, 10, 226, 97, 7, 8, 9, 18, 10, 3, 17, 4, 5, 231, 232, 233, 98, 7, 8, 9,
    18, 10, 225, 99, 7, 8, 9, 18, 10, 226, 100, 7, 8, 9, 18, 10, 3, 17, 4, 5,
    231, 232, 233, 101, 7, 8, 9, 18, 10, 225, 102, 7, 8, 9, 18, 10, 226, 103, 7, 8,
    9, 18, 10, 3, 17, 4, 5, 231, 232, 233, 104, 7, 8, 9, 18, 10, 225, 105, 7, 8,
    9, 18, 10, 226, 106, 7, 8, 9, 18, 10, 3, 17, 4, 5, 231, 232, 233, 107, 7, 8,
    9, 18, 10, 225, 108, 7, 8, 9, 18, 10, 226, 109, 7, 8, 9, 18, 10, 3, 17, 4,
    5, 231, 232, 233, 110, 7, 8, 9, 18, 10, 225, 111, 7, 8, 9, 18, 10, 226, 112, 7,
    8, 9, 18, 10, 3, 17, 4, 5, 231, 232, 233, 113, 7, 8, 9, 18, 10, 225, 114, 7,
    8, 9, 18, 10, 226, 115, 7, 8, 9, 18, 10, 3, 17, 4, 5, 231, 232, 233, 116, 7,
    8, 9, 18, 10, 225, 117, 7, 8, 9, 18, 10, 226, 118, 7, 8, 9, 18, 10, 3, 17,
    4, 5, 231, 232, 233, 119, 7, 8, 9, 18, 10, 225, 120, 7, 8, 9, 18, 10, 226, 121,
    7, 8, 9, 18, 10, 3, 17, 4, 5, 231, 232, 233, 122, 7, 8, 9, 18, 10, 225, 123,
    7, 8, 9, 18, 10, 226, 124, 7, 8, 9, 18, 10, 3, 17, 4, 5, 231, 232, 233, 125,
    7, 8, 9, 18, 10, 225, 126, 7, 8, 9, 18, 10, 226, 127, 7, 8, 9, 18, 10, 3,
    17, 4, 5, 231, 232, 233, 128, 7, 8, 9, 18, 10, 225, 129, 7, 8, 9, 18, 10, 226,
    130, 7, 8, 9, 18, 10, 3, 17, 4, 5, 231, 232, 233, 131, 7, 8, 9, 18, 10, 225,
    132, 7, 8, 9, 18, 10, 226, 133, 7, 8, 9, 18, 10, 3, 17, 4, 5, 231, 232, 233,
    134, 7, 8, 9, 18, 10, 225, 135, 7, 8, 9, 18, 10, 226, 136, 7, 8, 9, 18, 10,
    3, 17, 4, 5, 231, 232, 233, 137, 7, 8, 9, 18, 10, 225, 138, 7, 8, 9, 18, 10,
    226, 139, 7, 8, 9, 18, 10, 3, 17, 4, 5, 231, 232, 233, 140, 7, 8, 9, 18, 10,
    225, 141, 7, 8, 9, 18, 10, 226, 142, 7, 8, 9, 18, 10, 3, 17, 4, 5, 231, 232,
    233, 143, 7, 8, 9, 18, 10, 225, 144, 7, 8, 9, 18, 10, 226, 145, 7, 8, 9, 18,
    10, 3, 17, 4, 5, 231, 232, 233, 146, 7, 8, 9, 18, 10, 225, 147, 7, 8, 9, 18,
    10, 226, 148, 7, 8, 9, 18, 10, 3, 17, 4, 5, 231, 232, 233, 149, 7, 8, 9, 18,
    10, 225, 150, 7, 8, 9, 18, 10, 226, 151, 7, 8, 9, 18, 10, 3, 17, 4, 5, 231,
    232, 233, 152, 7, 8, 9, 18, 10, 225, 153, 7, 8, 9, 18, 10, 226, 154, 7, 8, 9,
    18, 10, 3, 17, 4, 5, 231, 232, 233, 155, 7, 8, 9, 18, 10, 225, 156, 7, 8, 9,
    18, 10, 226, 157, 7, 8, 9, 18, 10, 3, 17, 4, 5, 231, 232, 233, 158, 7, 8, 9,
    18, 10, 225, 159, 7, 8, 9, 18, 10, 226, 160, 7, 8, 9, 18, 10, 3, 17, 4, 5,
    231, 232, 233, 161, 7, 8, 9, 18, 10, 225, 162, 7, 8, 9, 18, 10, 226, 163, 7, 8,
    9, 18, 10, 3, 17, 4, 5, 231, 232, 233, 164, 7, 8, 9, 18, 10, 225, 165, 7, 8,
    9, 18, 10, 226, 166, 7, 8, 9, 18, 10, 3, 17, 4, 5, 231, 232, 233, 167, 7, 8,
    9, 18, 10, 225, 168, 7, 8, 9, 18, 10, 226, 169, 7, 8, 9, 18, 10, 3, 17, 4,
    5, 231, 232, 233, 170, 7, 8, 9, 18, 10, 225, 171, 7, 8, 9, 18, 10, 226, 172, 7,
    8, 9, 18, 10, 234, 235, 236, 173, 7, 8, 9, 18, 10, 225, 174, 7, 8, 9, 18, 10,
    226, 175, 7, 8, 9, 18, 10, 3, 17, 4, 5, 231, 232, 233, 176, 7, 8, 9, 18, 10,
    225, 177, 7, 8, 9, 18, 10, 226, 178, 7, 8, 9, 18, 10, 3, 17, 4, 5, 231, 232,
    233, 179, 7, 8, 9, 18, 10, 225, 180, 7, 8, 9, 18, 10, 226, 181, 7, 8, 9, 18,
    10, 3, 17, 4, 5, 231, 232, 233, 182, 7, 8, 9, 18, 10, 225, 183, 7, 8, 9, 18,
    10, 226, 184, 7, 8, 9, 18, 10, 3, 17, 4, 5, 231, 232, 233, 185, 7, 8, 9, 18,
    10, 225, 186, 7, 8, 9, 18, 10, 226, 187, 7, 8, 9, 18, 10, 3, 17, 4, 5, 231,
    232, 233, 188, 7, 8, 9, 18, 10, 225, 189, 7, 8, 9, 18, 10, 226, 190, 7, 8, 9,
    18, 10, 3, 17, 4, 5, 231, 232, 233, 191, 7, 8, 9, 18, 10, 225, 192, 7, 8, 9,
    18, 10, 226, 193, 7, 8, 9, 18, 10, 3, 17, 4, 5, 231, 232, 233, 194, 7, 8, 9,
    18, 10, 225, 195, 7, 8, 9, 18, 10, 226, 196, 7, 8, 9, 18, 10, 3, 17, 4, 5,
    231, 232, 233, 197, 7, 8, 9, 18, 10, 225, 198, 7, 8, 9, 18, 10, 226, 199, 7, 8,
    9, 18, 10, 3, 17, 4, 5, 231, 232, 233, 200, 7, 8, 9, 18, 10, 225, 201, 7, 8,
    9, 18, 10, 226, 202, 7, 8, 9, 18, 10, 3, 17, 4, 5, 231, 232, 233, 203, 7, 8,
    9, 18, 10, 225, 204, 7, 8, 9, 18, 10, 226, 205, 7, 8, 9, 18, 10, 3, 17, 4,
    5, 231, 232, 233, 206, 7, 8, 9, 18, 10, 225, 207, 7, 8, 9, 18, 10, 226, 208, 7,
    8, 9, 18, 10, 3, 17, 4, 5, 231, 232, 233, 209, 7, 8, 9, 18, 10, 225, 210, 7,
    8, 9, 18, 10, 226, 211, 7, 8, 9, 18, 10, 3, 17, 4, 5, 231, 232, 233, 212, 7,
    8, 9, 18, 10, 225, 213, 7, 8, 9, 18, 10, 226, 214, 7, 8, 9, 18, 10, 3, 17,
    4, 5, 231, 232, 233, 215, 7, 8, 9, 18, 10, 225, 216, 7, 8, 9, 18, 10, 226, 217,
    7, 8, 9, 18, 10, 3, 17, 4, 5, 231, 232, 233, 218, 7, 8, 9, 18, 10, 225, 219,
    7, 8, 9, 18, 10, 226, 220, 7, 8, 9, 18, 10, 3, 17, 4, 5, 231, 232, 233, 221,
    7, 8, 9, 18, 10, 225, 222, 7, 8, 9, 18, 10, 226, 223, 7, 8, 9, 18, 10, 16,
    255,
];
