// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Board discovery.

/// Environment variable listing the boards reserved for this process.
pub const BOARD_IDS_ENV: &str = "SPINDLE_BOARD_IDS";

/// Board identifiers from [`BOARD_IDS_ENV`], in listed order.
///
/// An unset or non-UTF-8 variable yields no boards.
pub fn available_board_ids() -> Vec<String> {
    std::env::var(BOARD_IDS_ENV)
        .map(|raw| parse_board_ids(&raw))
        .unwrap_or_default()
}

/// Splits a comma-separated board list. Surrounding whitespace is trimmed and
/// empty entries are skipped.
pub fn parse_board_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
        .collect()
}
