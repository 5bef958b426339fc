use std::sync::atomic::{AtomicBool, Ordering};

use crate::results::{RESULTS_END_MARKER, RESULTS_START_MARKER};
use crate::types::{LogEntry, RunEvent, RunObserver};

/// Tracks whether output is inside a results block
///
/// The block may arrive as one message holding both markers (the local
/// harness) or as separate lines (native drivers).
#[derive(Debug, Default)]
pub struct ResultBlockFilter {
    inside: AtomicBool,
}

impl ResultBlockFilter {
    /// Whether `content` is user output rather than part of the block
    pub fn admits(&self, content: &str) -> bool {
        let starts = content.contains(RESULTS_START_MARKER);
        let ends = content.contains(RESULTS_END_MARKER);
        if starts && !ends {
            self.inside.store(true, Ordering::Relaxed);
            return false;
        }
        if ends {
            self.inside.store(false, Ordering::Relaxed);
            return false;
        }
        !self.inside.load(Ordering::Relaxed)
    }
}

/// Remove results block lines, and the blank line printed before the block
pub fn strip_block_lines(lines: Vec<String>) -> Vec<String> {
    let filter = ResultBlockFilter::default();
    let mut kept: Vec<String> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.contains(RESULTS_START_MARKER) && kept.last().is_some_and(String::is_empty) {
            kept.pop();
        }
        if filter.admits(&line) {
            kept.push(line);
        }
    }
    kept
}

/// Observer wrapper that drops results block output
pub struct FilteredObserver<'a> {
    inner: &'a dyn RunObserver,
    filter: ResultBlockFilter,
}

impl<'a> FilteredObserver<'a> {
    pub fn new(inner: &'a dyn RunObserver) -> Self {
        Self {
            inner,
            filter: ResultBlockFilter::default(),
        }
    }

    /// Forward a finished run's output as log events
    pub fn replay(&self, stdout: &[String], stderr: &[String]) {
        for line in stdout {
            self.on_log(LogEntry::log(line.clone()));
        }
        for line in stderr {
            self.on_log(LogEntry::error(line.clone()));
        }
    }
}

impl RunObserver for FilteredObserver<'_> {
    fn on_event(&self, event: RunEvent) {
        match event {
            RunEvent::Log(entry) if !self.filter.admits(&entry.content) => {}
            event => self.inner.on_event(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Recorder;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn single_message_block_is_dropped() {
        let filter = ResultBlockFilter::default();
        assert!(filter.admits("before"));
        assert!(!filter.admits(&format!(
            "\n{RESULTS_START_MARKER}\n[]\n{RESULTS_END_MARKER}"
        )));
        assert!(filter.admits("after"));
    }

    #[test]
    fn multi_line_block_is_dropped() {
        let filter = ResultBlockFilter::default();
        assert!(!filter.admits(RESULTS_START_MARKER));
        assert!(!filter.admits("[{\"name\":\"a\"}]"));
        assert!(!filter.admits(RESULTS_END_MARKER));
        assert!(filter.admits("user output"));
    }

    #[test]
    fn strip_removes_block_and_leading_blank() {
        let out = strip_block_lines(lines(&[
            "debug 1",
            "",
            RESULTS_START_MARKER,
            "[]",
            RESULTS_END_MARKER,
            "tail",
        ]));
        assert_eq!(out, lines(&["debug 1", "tail"]));
    }

    #[test]
    fn strip_keeps_unrelated_blank_lines() {
        let out = strip_block_lines(lines(&["", "a", "", "b"]));
        assert_eq!(out, lines(&["", "a", "", "b"]));
    }

    #[test]
    fn filtered_observer_forwards_renders_and_user_logs() {
        let recorder = Recorder::default();
        let observer = FilteredObserver::new(&recorder);
        observer.replay(
            &lines(&["hello", RESULTS_START_MARKER, "[]", RESULTS_END_MARKER]),
            &lines(&["oops"]),
        );
        observer.on_event(RunEvent::Render("<html></html>".to_owned()));

        assert_eq!(recorder.log_lines(), lines(&["hello", "oops"]));
        assert_eq!(recorder.events().len(), 3);
    }
}
