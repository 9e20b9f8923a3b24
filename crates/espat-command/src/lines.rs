//! Reassembly of co-processor output into lines.
//!
//! The receive path hands over arbitrary chunks; this splits them on CRLF
//! and surfaces the bare `>` prompt that precedes a `CIPSEND` payload.

use bytes::{Buf, Bytes, BytesMut};

/// Lines longer than this are cut and emitted in pieces.
pub const MAX_LINE_LEN: usize = 1024;

/// One unit of co-processor output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseLine {
    /// A complete line without its terminator.
    Line(Bytes),
    /// `> ` (or `>` alone on a line): ready for payload bytes.
    Prompt,
}

impl ResponseLine {
    /// Line text with invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        match self {
            ResponseLine::Line(line) => String::from_utf8_lossy(line).into_owned(),
            ResponseLine::Prompt => ">".to_string(),
        }
    }

    /// `OK` or `SEND OK`.
    pub fn is_ok(&self) -> bool {
        matches!(self, ResponseLine::Line(l) if l.as_ref() == b"OK" || l.as_ref() == b"SEND OK")
    }

    /// `ERROR`, `FAIL`, or `SEND FAIL`.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            ResponseLine::Line(l)
                if l.as_ref() == b"ERROR" || l.as_ref() == b"FAIL" || l.as_ref() == b"SEND FAIL"
        )
    }
}

/// Accumulates received bytes and yields complete lines.
#[derive(Debug, Default)]
pub struct LineAccumulator {
    buf: BytesMut,
}

impl LineAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Bytes held back waiting for a terminator.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Next complete line, or `None` until more bytes arrive.
    ///
    /// Empty lines are skipped. A lone `\n` also ends a line. A trailing
    /// `>` is held back until the next byte shows whether it starts a line.
    pub fn next_line(&mut self) -> Option<ResponseLine> {
        loop {
            if self.buf.starts_with(b"> ") {
                self.buf.advance(2);
                return Some(ResponseLine::Prompt);
            }

            let Some(pos) = self.buf.iter().position(|b| *b == b'\n') else {
                if self.buf.len() >= MAX_LINE_LEN {
                    let line = self.buf.split_to(MAX_LINE_LEN).freeze();
                    return Some(ResponseLine::Line(line));
                }
                return None;
            };

            let mut line = self.buf.split_to(pos + 1);
            line.truncate(pos);
            if line.last() == Some(&b'\r') {
                line.truncate(pos - 1);
            }
            if !line.is_empty() {
                return Some(classify(line.freeze()));
            }
        }
    }

    /// Flush the held-back remainder at end of stream. Call once
    /// [`next_line`](Self::next_line) returns `None`.
    pub fn finish(&mut self) -> Option<ResponseLine> {
        let mut rest = self.buf.split();
        if rest.last() == Some(&b'\r') {
            rest.truncate(rest.len() - 1);
        }
        (!rest.is_empty()).then(|| classify(rest.freeze()))
    }
}

fn classify(line: Bytes) -> ResponseLine {
    if line.as_ref() == b">" {
        ResponseLine::Prompt
    } else {
        ResponseLine::Line(line)
    }
}

impl Iterator for LineAccumulator {
    type Item = ResponseLine;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str) -> ResponseLine {
        ResponseLine::Line(Bytes::copy_from_slice(text.as_bytes()))
    }

    #[test]
    fn splits_on_crlf_across_chunks() {
        let mut acc = LineAccumulator::new();
        acc.push(b"AT+GMR\r\r\nAT ver");
        assert_eq!(acc.next_line(), Some(line("AT+GMR\r")));
        assert_eq!(acc.next_line(), None);
        acc.push(b"sion:1.7\r\n\r\nOK\r\n");
        assert_eq!(acc.next_line(), Some(line("AT version:1.7")));
        assert_eq!(acc.next_line(), Some(line("OK")));
        assert_eq!(acc.next_line(), None);
        assert_eq!(acc.pending(), 0);
    }

    #[test]
    fn prompt_without_terminator() {
        let mut acc = LineAccumulator::new();
        acc.push(b"OK\r\n> ");
        let items: Vec<_> = acc.by_ref().collect();
        assert_eq!(items, vec![line("OK"), ResponseLine::Prompt]);

        acc.push(b">\r\n");
        assert_eq!(acc.next_line(), Some(ResponseLine::Prompt));

        acc.push(b">");
        assert_eq!(acc.next_line(), None);
        assert_eq!(acc.finish(), Some(ResponseLine::Prompt));
        assert_eq!(acc.pending(), 0);
    }

    #[test]
    fn line_starting_with_gt_is_not_a_prompt() {
        let mut acc = LineAccumulator::new();
        acc.push(b">x\r\n");
        assert_eq!(acc.next_line(), Some(line(">x")));
    }

    #[test]
    fn gt_split_across_bursts_stays_one_line() {
        let mut acc = LineAccumulator::new();
        acc.push(b"OK\r\n>");
        assert_eq!(acc.next_line(), Some(line("OK")));
        assert_eq!(acc.next_line(), None);
        acc.push(b"x\r\n");
        assert_eq!(acc.next_line(), Some(line(">x")));
        assert_eq!(acc.next_line(), None);

        acc.push(b">");
        acc.push(b" ");
        assert_eq!(acc.next_line(), Some(ResponseLine::Prompt));
    }

    #[test]
    fn finish_flushes_partial_line() {
        let mut acc = LineAccumulator::new();
        acc.push(b"Recv 5 by");
        assert_eq!(acc.next_line(), None);
        assert_eq!(acc.finish(), Some(line("Recv 5 by")));
        assert_eq!(acc.finish(), None);
    }

    #[test]
    fn overlong_line_is_cut() {
        let mut acc = LineAccumulator::new();
        acc.push(&vec![b'a'; MAX_LINE_LEN + 3]);
        match acc.next_line() {
            Some(ResponseLine::Line(l)) => assert_eq!(l.len(), MAX_LINE_LEN),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(acc.next_line(), None);
        assert_eq!(acc.pending(), 3);
    }

    #[test]
    fn status_classification() {
        assert!(line("OK").is_ok());
        assert!(line("SEND OK").is_ok());
        assert!(line("ERROR").is_error());
        assert!(!line("OK ").is_ok());
        assert!(!ResponseLine::Prompt.is_error());
        assert_eq!(ResponseLine::Prompt.text(), ">");
    }
}
