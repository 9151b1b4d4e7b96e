// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used)]
use spindle_exec::{available_board_ids, BOARD_IDS_ENV};

// One test per binary: the environment is process-global.
#[test]
fn board_ids_follow_the_environment() {
    std::env::remove_var(BOARD_IDS_ENV);
    assert!(available_board_ids().is_empty());

    std::env::set_var(BOARD_IDS_ENV, "B201, B202,,B204 ");
    assert_eq!(available_board_ids(), vec!["B201", "B202", "B204"]);

    std::env::set_var(BOARD_IDS_ENV, " , ");
    assert!(available_board_ids().is_empty());

    std::env::remove_var(BOARD_IDS_ENV);
    assert!(available_board_ids().is_empty());
}
