//! Metric line extraction
//!
//! Runners report their throughput on a line such as `Emulated 600 frames in 1.02s (588fps)`. The harness does not
//! parse the numbers; it surfaces the last line mentioning the marker.

/// Case-sensitive substring identifying the metric line.
pub const METRIC_MARKER: &str = "frames";

/// Return the last line of `output` containing [`METRIC_MARKER`], or `""` if none does.
pub fn extract_metric_line(output: &str) -> &str {
    output
        .lines()
        .rev()
        .find(|line| line.contains(METRIC_MARKER))
        .unwrap_or("")
}
