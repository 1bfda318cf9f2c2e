use std::sync::{Arc, Mutex};

const TRUNCATION_MARKER: &str = "\n... [output truncated]";

/// The byte allowance shared by a worker's stdout and stderr buffers —
/// §4.6 calls for "a combined byte cap equal to `context.output-kb`", not
/// one cap per stream, so a script that floods stdout leaves proportionally
/// less room for stderr rather than getting `output_kb` of each for free.
#[derive(Debug)]
pub struct SharedBudget {
    remaining: Mutex<usize>,
}

impl SharedBudget {
    #[must_use]
    pub fn new(total_bytes: usize) -> Arc<Self> {
        Arc::new(Self { remaining: Mutex::new(total_bytes) })
    }

    /// Reserves up to `want` bytes from the shared pool, returning how many
    /// were actually granted. Never blocks and never grants more than what
    /// remains.
    fn take(&self, want: usize) -> usize {
        let mut remaining = self.remaining.lock().unwrap_or_else(|e| e.into_inner());
        let granted = want.min(*remaining);
        *remaining -= granted;
        granted
    }
}

impl Default for SharedBudget {
    fn default() -> Self {
        Self { remaining: Mutex::new(0) }
    }
}

/// A byte-capped append buffer for a child's stdout/stderr. Once the
/// stream's share of the combined budget is exhausted, further writes are
/// dropped and the marker is appended exactly once — matching the
/// "truncate with marker, return success" behavior for output-size overflow
/// (§4.6 edge case).
#[derive(Debug)]
pub struct BoundedBuffer {
    data: String,
    budget: Arc<SharedBudget>,
    truncated: bool,
}

impl BoundedBuffer {
    #[must_use]
    pub fn new(budget: Arc<SharedBudget>) -> Self {
        Self { data: String::new(), budget, truncated: false }
    }

    pub fn push(&mut self, chunk: &str) {
        if self.truncated {
            return;
        }
        let granted = self.budget.take(chunk.len());
        if chunk.len() <= granted {
            self.data.push_str(chunk);
        } else {
            let boundary = floor_char_boundary(chunk, granted);
            self.data.push_str(&chunk[..boundary]);
            self.data.push_str(TRUNCATION_MARKER);
            self.truncated = true;
        }
    }

    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.data
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.data
    }
}

impl Default for BoundedBuffer {
    fn default() -> Self {
        Self { data: String::new(), budget: Arc::new(SharedBudget::default()), truncated: false }
    }
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut boundary = index;
    while boundary > 0 && !s.is_char_boundary(boundary) {
        boundary -= 1;
    }
    boundary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_under_cap_are_preserved() {
        let mut buf = BoundedBuffer::new(SharedBudget::new(1024));
        buf.push("hello");
        assert_eq!(buf.as_str(), "hello");
        assert!(!buf.is_truncated());
    }

    #[test]
    fn writes_over_cap_are_truncated_with_marker() {
        let mut buf = BoundedBuffer::new(SharedBudget::new(5));
        buf.push("hello world");
        assert!(buf.is_truncated());
        assert!(buf.as_str().ends_with(TRUNCATION_MARKER));
        assert!(buf.as_str().starts_with("hello"));
    }

    #[test]
    fn writes_after_truncation_are_dropped() {
        let mut buf = BoundedBuffer::new(SharedBudget::new(5));
        buf.push("hello world");
        let marked = buf.as_str().to_string();
        buf.push("more");
        assert_eq!(buf.as_str(), marked);
    }

    #[test]
    fn truncation_boundary_respects_utf8_char_boundaries() {
        let mut buf = BoundedBuffer::new(SharedBudget::new(3));
        buf.push("héllo");
        assert!(buf.as_str().ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn two_buffers_share_one_combined_budget() {
        let budget = SharedBudget::new(10);
        let mut stdout_buf = BoundedBuffer::new(budget.clone());
        let mut stderr_buf = BoundedBuffer::new(budget);

        stdout_buf.push("0123456789");
        assert!(!stdout_buf.is_truncated());

        stderr_buf.push("x");
        assert!(stderr_buf.is_truncated());
        assert!(stderr_buf.as_str().ends_with(TRUNCATION_MARKER));
    }
}
