//! Sentinel-delimited output capture.
//!
//! [`OutputCapture`] is the pure core of the command read loop: it is fed
//! raw channel chunks and tracks where the command's real output starts
//! and stops. The command is sent bracketed by a fresh random sentinel
//! token, with an exit-status trailer and a working-directory probe
//! between the output and the trailing sentinel:
//!
//! ```text
//! echo <token>; <cmd>; echo "__RC_"$?"__"; echo "__CWD_"$PWD"__"; echo <token>
//! ```
//!
//! The PTY echoes the submitted line back before any output; because the
//! echo carries the whole wrapper on one line it can never equal the bare
//! token line, so capture starts only at the genuine leading sentinel.
//! Marker lines are consumed, not surfaced.
//!
//! Caps are enforced between chunks: the byte cap fills the capture to
//! exactly `max_bytes` and switches to drain mode (discard until the
//! trailing sentinel); the line cap is checked after, on newline-terminated
//! lines only. Exit status is withheld whenever a cap fired.

use std::sync::LazyLock;

use regex::Regex;

static RC_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^__RC_(\d+)__$").expect("exit-status marker regex"));
static CWD_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^__CWD_(.*)__$").expect("cwd marker regex"));

/// How many trailing bytes of an unterminated line are held back so a
/// split sentinel can still be recognised once its newline arrives.
const PARTIAL_TAIL: usize = 64;

/// Everything recovered from one captured command.
#[derive(Debug, Clone)]
pub struct CaptureResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: Option<i32>,
    pub cwd: Option<String>,
    pub truncated: bool,
}

/// Streaming capture state for one command execution.
pub struct OutputCapture {
    token: String,
    max_bytes: usize,
    max_lines: usize,
    started: bool,
    finished: bool,
    truncated: bool,
    draining: bool,
    buf: Vec<u8>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    lines: usize,
    exit_status: Option<i32>,
    cwd: Option<String>,
}

impl OutputCapture {
    pub fn new(token: impl Into<String>, max_bytes: usize, max_lines: usize) -> Self {
        Self {
            token: token.into(),
            max_bytes,
            max_lines,
            started: false,
            finished: false,
            truncated: false,
            draining: false,
            buf: Vec::new(),
            stdout: Vec::new(),
            stderr: Vec::new(),
            lines: 0,
            exit_status: None,
            cwd: None,
        }
    }

    /// Whether the leading sentinel has been seen.
    pub fn started(&self) -> bool {
        self.started
    }

    /// Whether the trailing sentinel has been seen.
    pub fn finished(&self) -> bool {
        self.finished
    }

    /// Whether a byte or line cap has fired.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Whether any real command output (not echo, banner, or marker
    /// lines) has been seen. Drives the proactive sudo watchdog: a sudo
    /// that blocks silently produces nothing after the leading sentinel.
    pub fn has_command_output(&self) -> bool {
        self.started && (!self.stdout.is_empty() || !self.stderr.is_empty() || !self.buf.is_empty())
    }

    /// Feed one chunk of interactive-channel data.
    pub fn feed(&mut self, chunk: &[u8]) {
        if self.finished {
            return;
        }
        self.buf.extend_from_slice(chunk);

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            self.handle_line(&line);
            if self.finished {
                self.buf.clear();
                return;
            }
        }

        // A long unterminated line must still count against the byte cap;
        // spill all but a tail large enough to hold a split sentinel.
        if self.started && !self.draining && self.buf.len() > PARTIAL_TAIL {
            let spill: Vec<u8> = self.buf.drain(..self.buf.len() - PARTIAL_TAIL).collect();
            self.append_stdout(&spill, false);
        }
    }

    /// Feed one chunk of extended (stderr) data. Extended data carries no
    /// sentinels; it is captured verbatim under the shared byte cap.
    pub fn feed_stderr(&mut self, chunk: &[u8]) {
        if self.finished || self.draining {
            return;
        }
        let remaining = self.remaining_bytes();
        if chunk.len() >= remaining {
            self.stderr.extend_from_slice(&chunk[..remaining]);
            self.truncated = true;
            self.draining = true;
        } else {
            self.stderr.extend_from_slice(chunk);
        }
    }

    fn handle_line(&mut self, line: &[u8]) {
        let text = String::from_utf8_lossy(line);
        let trimmed = text.trim_end_matches(['\n', '\r']);

        if !self.started {
            if trimmed == self.token {
                self.started = true;
            }
            // Everything before the leading sentinel is shell banner or
            // command echo.
            return;
        }

        if trimmed == self.token {
            self.finished = true;
            return;
        }
        if let Some(caps) = RC_LINE.captures(trimmed) {
            self.exit_status = caps[1].parse::<i32>().ok();
            return;
        }
        if let Some(caps) = CWD_LINE.captures(trimmed) {
            let path = &caps[1];
            if path.starts_with('/') {
                self.cwd = Some(path.to_string());
            }
            return;
        }
        if !self.draining {
            self.append_stdout(line, true);
        }
    }

    fn append_stdout(&mut self, bytes: &[u8], complete_line: bool) {
        let remaining = self.remaining_bytes();
        if bytes.len() >= remaining {
            self.stdout.extend_from_slice(&bytes[..remaining]);
            self.truncated = true;
            self.draining = true;
            return;
        }
        self.stdout.extend_from_slice(bytes);
        if complete_line {
            self.lines += 1;
            if self.lines >= self.max_lines {
                self.truncated = true;
                self.draining = true;
            }
        }
    }

    fn remaining_bytes(&self) -> usize {
        self.max_bytes
            .saturating_sub(self.stdout.len() + self.stderr.len())
    }

    /// Finalize the capture.
    ///
    /// The exit status is withheld when a cap fired, even if the trailer
    /// happened to be parsed: a capped run has no trustworthy status.
    pub fn into_result(self) -> CaptureResult {
        let exit_status = if self.truncated { None } else { self.exit_status };
        CaptureResult {
            stdout: String::from_utf8_lossy(&self.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&self.stderr).into_owned(),
            exit_status,
            cwd: self.cwd,
            truncated: self.truncated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "a3f09c11d2e84b67a3f09c11d2e84b67";

    fn capture() -> OutputCapture {
        OutputCapture::new(TOKEN, 131_072, 1_000)
    }

    #[test]
    fn echo_of_the_wrapper_line_does_not_start_capture() {
        let mut cap = capture();
        cap.feed(format!("echo {TOKEN}; ls; echo \"__RC_\"$?\"__\"; echo {TOKEN}\r\n").as_bytes());
        assert!(!cap.started());
        cap.feed(format!("{TOKEN}\r\n").as_bytes());
        assert!(cap.started());
    }

    #[test]
    fn captures_between_sentinels_and_parses_markers() {
        let mut cap = capture();
        cap.feed(format!("{TOKEN}\r\n").as_bytes());
        cap.feed(b"total 12\r\nfile-a\r\n");
        cap.feed(b"__RC_0__\r\n__CWD_/var/log__\r\n");
        cap.feed(format!("{TOKEN}\r\n").as_bytes());

        assert!(cap.finished());
        let result = cap.into_result();
        assert_eq!(result.stdout, "total 12\r\nfile-a\r\n");
        assert_eq!(result.exit_status, Some(0));
        assert_eq!(result.cwd.as_deref(), Some("/var/log"));
        assert!(!result.truncated);
    }

    #[test]
    fn markers_split_across_chunks_still_parse() {
        let mut cap = capture();
        cap.feed(format!("{TOKEN}\n").as_bytes());
        cap.feed(b"out\n__RC_");
        cap.feed(b"17__\n");
        cap.feed(format!("{TOKEN}\n").as_bytes());
        let result = cap.into_result();
        assert_eq!(result.exit_status, Some(17));
        assert_eq!(result.stdout, "out\n");
    }

    #[test]
    fn byte_cap_fills_exactly_and_drains_to_sentinel() {
        let mut cap = OutputCapture::new(TOKEN, 1_024, 1_000_000);
        cap.feed(format!("{TOKEN}\n").as_bytes());
        cap.feed(&vec![b'x'; 4_000]);
        assert!(cap.truncated());
        assert!(!cap.finished());

        // Late data is discarded; the trailing sentinel still terminates.
        cap.feed(b"\nmore output\n__RC_0__\n");
        cap.feed(format!("{TOKEN}\n").as_bytes());
        assert!(cap.finished());

        let result = cap.into_result();
        assert_eq!(result.stdout.len(), 1_024);
        assert!(result.truncated);
        assert_eq!(result.exit_status, None, "capped runs have no exit status");
    }

    #[test]
    fn line_cap_fires_on_newline_terminated_lines() {
        let mut cap = OutputCapture::new(TOKEN, 1 << 20, 10);
        cap.feed(format!("{TOKEN}\n").as_bytes());
        for i in 0..12 {
            cap.feed(format!("line {i}\n").as_bytes());
        }
        assert!(cap.truncated());
        let result = cap.into_result();
        assert_eq!(result.stdout.lines().count(), 10);
        assert_eq!(result.exit_status, None);
    }

    #[test]
    fn stderr_shares_the_byte_cap() {
        let mut cap = OutputCapture::new(TOKEN, 100, 1_000);
        cap.feed(format!("{TOKEN}\n").as_bytes());
        let mut line = vec![b'o'; 60];
        line.push(b'\n');
        cap.feed(&line);
        cap.feed_stderr(&vec![b'e'; 60]);
        assert!(cap.truncated());
        let result = cap.into_result();
        assert_eq!(result.stdout.len() + result.stderr.len(), 100);
    }

    #[test]
    fn unterminated_output_is_spilled_but_sentinel_survives_splits() {
        let mut cap = OutputCapture::new(TOKEN, 1 << 20, 1_000_000);
        cap.feed(format!("{TOKEN}\n").as_bytes());
        // 5000 bytes with no newline, then the sentinel delivered byte-split.
        cap.feed(&vec![b'z'; 5_000]);
        cap.feed(b"\n");
        let (head, tail) = TOKEN.as_bytes().split_at(10);
        cap.feed(head);
        cap.feed(tail);
        cap.feed(b"\n");
        assert!(cap.finished());
        let result = cap.into_result();
        assert_eq!(result.stdout.len(), 5_001);
    }

    #[test]
    fn command_output_detection_ignores_echo_and_markers() {
        let mut cap = capture();
        cap.feed(b"echo wrapper line echoed by the pty\r\n");
        assert!(!cap.has_command_output());
        cap.feed(format!("{TOKEN}\r\n").as_bytes());
        assert!(!cap.has_command_output());
        // A waiting prompt with no newline still counts as output.
        cap.feed(b"[sudo] password for deploy: ");
        assert!(cap.has_command_output());
    }

    #[test]
    fn output_resembling_markers_inline_is_kept_verbatim() {
        let mut cap = capture();
        cap.feed(format!("{TOKEN}\n").as_bytes());
        cap.feed(b"grep __RC_1__ somewhere in text\n");
        cap.feed(b"__RC_3__\n");
        cap.feed(format!("{TOKEN}\n").as_bytes());
        let result = cap.into_result();
        // Only the exact marker line is consumed.
        assert!(result.stdout.contains("grep __RC_1__"));
        assert_eq!(result.exit_status, Some(3));
    }
}
