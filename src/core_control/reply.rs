//! Assembly of FTP control-channel replies from individual lines.
//!
//! Kept free of I/O so the state machine can be exercised (and fuzzed)
//! against raw line sequences; `codec.rs` feeds it from the socket.

/// One complete server reply.
///
/// `text` is the terminator line only; continuation lines of a multi-line
/// reply are dropped after logging. `rtype` is `code / 100`, or 0 when the
/// reply carried no digits at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub code: u32,
    pub rtype: u32,
    pub text: String,
}

impl Reply {
    /// The reply text with `n` leading characters skipped, clamped at the
    /// end of the text. Used to step over the "NNN " prefix.
    pub fn text_after(&self, n: usize) -> &str {
        let n = n.min(self.text.len());
        &self.text[n..]
    }
}

/// State machine assembling one reply from successive control lines.
///
/// A reply is `line+`; a single-line reply is `NNN<space>text`. A multi-line
/// reply opens with `NNN-text` and runs until a `NNN<space>text` terminator
/// with the same code. Two quirks are accepted:
/// - continuation lines with arbitrary prefixes (anything that is not the
///   terminator),
/// - the OpenBSD form where continuation lines start with a space.
pub struct ReplyAssembler {
    code: u32,
    more: u32,
}

impl ReplyAssembler {
    pub fn new() -> Self {
        Self { code: 0, more: 0 }
    }

    /// Feed one line (CR/LF already stripped or not, both fine). Returns the
    /// finished reply once the terminator is seen, `None` while more lines
    /// are expected.
    pub fn feed(&mut self, line: &str) -> Option<Reply> {
        let line = line.trim_end_matches(['\r', '\n']);
        let code = leading_digits(line);
        if code > 0 {
            self.code = code;
        }

        let bytes = line.as_bytes();
        if self.more != 0 && bytes.first() == Some(&b' ') {
            // OpenBSD: space-prefixed filler inside a multi-line reply.
        } else if bytes.len() < 4 || code < 100 {
            self.more = 0;
        } else if self.more == 0 && bytes[3] == b'-' {
            self.more = code;
        } else if self.more != 0 && (self.more != code || bytes[3] != b'-') {
            self.more = 0;
        }

        if self.more == 0 {
            let code = self.code;
            Some(Reply {
                code,
                rtype: if code > 0 { code / 100 } else { 0 },
                text: line.to_string(),
            })
        } else {
            None
        }
    }
}

impl Default for ReplyAssembler {
    fn default() -> Self {
        Self::new()
    }
}

// atoi semantics: skip leading whitespace, then take decimal digits.
fn leading_digits(line: &str) -> u32 {
    let digits: String = line
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assemble(lines: &[&str]) -> Reply {
        let mut asm = ReplyAssembler::new();
        for (i, line) in lines.iter().enumerate() {
            match asm.feed(line) {
                Some(reply) => {
                    assert_eq!(i, lines.len() - 1, "terminated early at line {}", i);
                    return reply;
                }
                None => assert!(i < lines.len() - 1, "never terminated"),
            }
        }
        unreachable!()
    }

    #[test]
    fn test_single_line() {
        let r = assemble(&["200 Command okay.\r\n"]);
        assert_eq!(r.code, 200);
        assert_eq!(r.rtype, 2);
        assert_eq!(r.text, "200 Command okay.");
    }

    #[test]
    fn test_multiline_greeting() {
        let r = assemble(&["220-hello\r\n", " text\r\n", "220 ready\r\n"]);
        assert_eq!(r.code, 220);
        assert_eq!(r.rtype, 2);
        assert_eq!(r.text, "220 ready");
    }

    #[test]
    fn test_multiline_with_coded_continuations() {
        let r = assemble(&[
            "211-Features:\r\n",
            "211-SIZE\r\n",
            "211-MDTM\r\n",
            "211 End\r\n",
        ]);
        assert_eq!(r.code, 211);
        assert_eq!(r.text, "211 End");
    }

    #[test]
    fn test_openbsd_space_continuations() {
        let r = assemble(&[
            "220-\r\n",
            " Welcome to this here server.\r\n",
            " Mind the gap.\r\n",
            "220 ftp ready\r\n",
        ]);
        assert_eq!(r.code, 220);
        assert_eq!(r.text, "220 ftp ready");
    }

    #[test]
    fn test_no_digits_is_code_zero() {
        let r = assemble(&["garbage\r\n"]);
        assert_eq!(r.code, 0);
        assert_eq!(r.rtype, 0);
    }

    #[test]
    fn test_terminator_without_dash_ends_multiline() {
        let r = assemble(&["226-About done\r\n", "226 Transfer complete.\r\n"]);
        assert_eq!(r.code, 226);
        assert_eq!(r.text, "226 Transfer complete.");
    }

    #[test]
    fn test_text_after() {
        let r = assemble(&["257 \"/home/user\" is current directory\r\n"]);
        assert_eq!(r.text_after(4), "\"/home/user\" is current directory");
        assert_eq!(r.text_after(1000), "");
    }
}
