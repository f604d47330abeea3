// rust/arc-data-core/src/progress.rs

//! Progress bars for downloads and shard reads.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

const BYTES_TEMPLATE: &str =
    "{msg} [{elapsed_precise}] {wide_bar} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";
const COUNT_TEMPLATE: &str = "{msg} [{elapsed_precise}] {wide_bar} {pos}/{len} ({eta})";

/// Byte counter for a single download. A zero `total` means the server did
/// not advertise a length.
pub fn bytes_bar(total: u64, label: &str, visible: bool) -> ProgressBar {
    styled(ProgressBar::new(total), BYTES_TEMPLATE, label, visible)
}

/// Item counter for shards or rows.
pub fn count_bar(len: u64, label: &str, visible: bool) -> ProgressBar {
    styled(ProgressBar::new(len), COUNT_TEMPLATE, label, visible)
}

/// Shard counter with a row counter drawn beneath it. The row bar is
/// reset for every shard.
pub fn shard_and_row_bars(shards: u64, visible: bool) -> (ProgressBar, ProgressBar) {
    let shard_bar = count_bar(shards, "shards", visible);
    let row_bar = count_bar(0, "rows", visible);
    if !visible {
        return (shard_bar, row_bar);
    }
    let multi = MultiProgress::new();
    let shard_bar = multi.add(shard_bar);
    let row_bar = multi.add(row_bar);
    (shard_bar, row_bar)
}

fn styled(bar: ProgressBar, template: &str, label: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let style = ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
    bar.set_style(style);
    bar.set_message(label.to_string());
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_bars_still_count() {
        let bar = count_bar(10, "rows", false);
        bar.inc(3);
        assert_eq!(bar.position(), 3);
        assert!(bar.is_hidden());

        let bar = bytes_bar(0, "file", false);
        bar.inc(1024);
        assert_eq!(bar.position(), 1024);
    }

    #[test]
    fn test_hidden_nested_bars() {
        let (shards, rows) = shard_and_row_bars(2, false);
        assert!(shards.is_hidden());
        assert!(rows.is_hidden());
        assert_eq!(shards.length(), Some(2));

        rows.set_length(7);
        rows.inc(7);
        assert_eq!(rows.position(), 7);
    }
}
