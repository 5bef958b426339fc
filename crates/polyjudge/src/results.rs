//! Result channel parsing
//!
//! Generated drivers print their machine-readable results between two fixed
//! marker lines. Everything else on stdout is user output and is ignored here.

use crate::types::TestCaseResult;

/// Printed on its own line right before the JSON results array
pub const RESULTS_START_MARKER: &str = "__POLYJUDGE_RESULTS_BEGIN_7f3a91c2__";

/// Printed on its own line right after the JSON results array
pub const RESULTS_END_MARKER: &str = "__POLYJUDGE_RESULTS_END_7f3a91c2__";

/// Byte range of the text strictly between the markers
fn block_bounds(raw: &str, start: &str, end: &str) -> Option<(usize, usize, usize)> {
    let start_at = raw.find(start)?;
    let body_from = start_at + start.len();
    let body_to = body_from + raw[body_from..].find(end)?;
    Some((start_at, body_from, body_to))
}

/// Extract the results block from raw output
///
/// Uses the first `start` marker and the first `end` marker after it. Returns
/// `None` when either marker is missing or the enclosed text is not a JSON
/// array of results.
pub fn extract_results(raw: &str, start: &str, end: &str) -> Option<Vec<TestCaseResult>> {
    let (_, body_from, body_to) = block_bounds(raw, start, end)?;
    serde_json::from_str(raw[body_from..body_to].trim()).ok()
}

/// Extract using the standard markers
pub fn extract(raw: &str) -> Option<Vec<TestCaseResult>> {
    extract_results(raw, RESULTS_START_MARKER, RESULTS_END_MARKER)
}

/// Remove the results block, markers included, leaving the user's output
pub fn strip_result_block(raw: &str) -> String {
    match block_bounds(raw, RESULTS_START_MARKER, RESULTS_END_MARKER) {
        Some((start_at, _, body_to)) => {
            let before = raw[..start_at].trim_end_matches('\n');
            let after = raw[body_to + RESULTS_END_MARKER.len()..].trim_start_matches('\n');
            match (before.is_empty(), after.is_empty()) {
                (true, _) => after.to_owned(),
                (false, true) => before.to_owned(),
                (false, false) => format!("{before}\n{after}"),
            }
        }
        None => raw.to_owned(),
    }
}

/// Whether a single output line belongs to the results block protocol
pub(crate) fn is_marker_line(line: &str) -> bool {
    line.contains(RESULTS_START_MARKER) || line.contains(RESULTS_END_MARKER)
}
