//! Parser for one line of `LIST` output.
//!
//! Handles the Unix `ls -l` family and its field-level quirks:
//!
//! ```text
//! -rw-r--r--   1 dfaure   dfaure        102 Nov  9 12:30 log
//! d [RWCEAFMS] Admin                    512 Oct 13  2004 PSI       (Netware)
//! crw-rw-rw-   1 root     root       1,   5 Jun 29  1997 zero      (/dev)
//! -rw-r--r--   1 ftp             543 May 13  1999 no-group-here
//! ```
//!
//! Windows servers are steered towards this format at login time
//! (`SITE DIRSTYLE`), so no DOS-style parser exists here.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use log::warn;

use crate::core_list::{mode, EntryKind, FtpEntry};

static MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Space-run tokenizer that can hand out the untokenized remainder, since
/// the trailing file name may itself contain spaces.
struct Tokens<'a> {
    s: &'a str,
    pos: usize,
}

impl<'a> Tokens<'a> {
    fn new(s: &'a str) -> Self {
        Self { s, pos: 0 }
    }

    fn next(&mut self) -> Option<&'a str> {
        let bytes = self.s.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos] == b' ' {
            self.pos += 1;
        }
        if self.pos >= bytes.len() {
            return None;
        }
        let start = self.pos;
        while self.pos < bytes.len() && bytes[self.pos] != b' ' {
            self.pos += 1;
        }
        Some(&self.s[start..self.pos])
    }

    fn rest(&self) -> &'a str {
        &self.s[self.pos.min(self.s.len())..]
    }
}

/// Parse one listing line. Returns `None` for lines that are malformed or
/// must be skipped (the caller ignores those silently).
///
/// `now` feeds the implicit-year rule and is injected for testability.
pub fn parse_list_line(line: &str, now: DateTime<Utc>) -> Option<FtpEntry> {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut tok = Tokens::new(line);

    // We should always get the following five fields.
    let p_access = tok.next()?;
    let p_junk = tok.next()?;
    let p_owner = tok.next()?;
    let mut p_group = Some(tok.next()?);
    let mut p_size = tok.next()?;

    let mut access = 0u32;
    if p_access.len() == 1 && p_junk.starts_with('[') {
        // Netware bracket-access row: permissions unknown, grant everything.
        access = mode::S_IRWXALL;
    }

    // "/dev" rows carry "major,   minor"; skip the major and take the next
    // token as size.
    if p_size.contains(',') {
        p_size = tok.next()?;
    }

    // Some servers list no group; the size slot then holds the first date
    // token, and the size is in the group slot.
    let p_date_1 = if !p_size.starts_with(|c: char| c.is_ascii_digit()) {
        let date_1 = p_size;
        p_size = p_group.take().unwrap_or_default();
        date_1
    } else {
        tok.next()?
    };

    let p_date_2 = tok.next()?;
    let p_date_3 = tok.next()?;

    let mut name = tok.rest().trim_start();
    let mut link_target = None;
    if p_access.starts_with('l') {
        if let Some(i) = name.rfind(" -> ") {
            link_target = Some(name[i + 4..].trim_end().to_string());
            name = &name[..i];
        }
    }

    // A listing on some servers starts each name with '/'.
    let name = name.strip_prefix('/').unwrap_or(name);
    if name.contains('/') {
        return None; // don't trick us
    }
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let kind = match p_access.as_bytes()[0] {
        b'd' => EntryKind::Dir,
        b's' => EntryKind::Socket,
        b'b' => EntryKind::Block,
        b'c' => EntryKind::Char,
        b'p' => EntryKind::Fifo,
        b'l' => EntryKind::Symlink,
        _ => EntryKind::File,
    };

    if p_access.len() >= 10 {
        let a = p_access.as_bytes();
        if a[1] == b'r' {
            access |= mode::S_IRUSR;
        }
        if a[2] == b'w' {
            access |= mode::S_IWUSR;
        }
        if a[3] == b'x' || a[3] == b's' {
            access |= mode::S_IXUSR;
        }
        if a[4] == b'r' {
            access |= mode::S_IRGRP;
        }
        if a[5] == b'w' {
            access |= mode::S_IWGRP;
        }
        if a[6] == b'x' || a[6] == b's' {
            access |= mode::S_IXGRP;
        }
        if a[7] == b'r' {
            access |= mode::S_IROTH;
        }
        if a[8] == b'w' {
            access |= mode::S_IWOTH;
        }
        if a[9] == b'x' || a[9] == b't' {
            access |= mode::S_IXOTH;
        }
        if a[3] == b's' || a[3] == b'S' {
            access |= mode::S_ISUID;
        }
        if a[6] == b's' || a[6] == b'S' {
            access |= mode::S_ISGID;
        }
        if a[9] == b't' || a[9] == b'T' {
            access |= mode::S_ISVTX;
        }
    }

    Some(FtpEntry {
        name: name.to_string(),
        kind,
        access,
        owner: p_owner.to_string(),
        group: p_group.map(str::to_string),
        size: parse_long(p_size),
        mtime: parse_date(p_date_1, p_date_2, p_date_3, now),
        link_target,
    })
}

/// Parse the three date tokens, e.g. "Oct  6 22:49" or "May 13  1999".
///
/// All FTP servers use the English month names regardless of locale. When
/// the third token is a time, the year is implicit: current year unless the
/// month lies more than one month in the future, then last year (the +1 is
/// slack for the "one hour into the future" allowance of `ls`).
fn parse_date(
    p_date_1: &str,
    p_date_2: &str,
    p_date_3: &str,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let day = parse_long(p_date_2) as u32;
    let month = MONTHS
        .iter()
        .position(|m| *m == p_date_1)
        .map(|i| i as u32 + 1)
        .unwrap_or_else(|| now.month());

    let mut hour = 0u32;
    let mut minute = 0u32;
    let year;
    if p_date_3.len() == 4 && p_date_3.chars().all(|c| c.is_ascii_digit()) {
        year = parse_long(p_date_3) as i32;
    } else {
        year = if month > now.month() + 1 {
            now.year() - 1
        } else {
            now.year()
        };
        if let Some((h, m)) = p_date_3.split_once(':') {
            hour = parse_long(h) as u32;
            minute = parse_long(m) as u32;
        } else {
            warn!("Can't parse third date field {}", p_date_3);
        }
    }

    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
}

/// `strtoll` behavior: leading decimal digits, 0 when there are none.
fn parse_long(s: &str) -> i64 {
    let digits: &str = {
        let end = s
            .char_indices()
            .take_while(|(i, c)| c.is_ascii_digit() || (*i == 0 && *c == '-'))
            .map(|(i, c)| i + c.len_utf8())
            .last()
            .unwrap_or(0);
        &s[..end]
    };
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn nov_2020() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 11, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_plain_file() {
        let e = parse_list_line(
            "-rw-r--r--   1 root     root       102 Nov  9 12:30 log",
            nov_2020(),
        )
        .unwrap();
        assert_eq!(e.name, "log");
        assert_eq!(e.kind, EntryKind::File);
        assert_eq!(e.access, 0o644);
        assert_eq!(e.owner, "root");
        assert_eq!(e.group.as_deref(), Some("root"));
        assert_eq!(e.size, 102);
        assert_eq!(
            e.mtime,
            Some(Utc.with_ymd_and_hms(2020, 11, 9, 12, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_dev_major_minor() {
        let e = parse_list_line(
            "crw-rw-rw-   1 root     root       1,   5 Jun 29  1997 zero",
            nov_2020(),
        )
        .unwrap();
        assert_eq!(e.name, "zero");
        assert_eq!(e.kind, EntryKind::Char);
        assert_eq!(e.size, 5);
        assert_eq!(e.access, 0o666);
        assert_eq!(
            e.mtime,
            Some(Utc.with_ymd_and_hms(1997, 6, 29, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_netware_bracket_access() {
        let e = parse_list_line(
            "d [RWCEAFMS] Admin                     512 Oct 13  2004 PSI",
            nov_2020(),
        )
        .unwrap();
        assert_eq!(e.name, "PSI");
        assert_eq!(e.kind, EntryKind::Dir);
        assert_eq!(e.access, 0o777);
        assert_eq!(e.owner, "Admin");
        assert_eq!(e.group, None);
        assert_eq!(e.size, 512);
        assert_eq!(
            e.mtime,
            Some(Utc.with_ymd_and_hms(2004, 10, 13, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_symlink_target_split() {
        let e = parse_list_line("lrwxrwxrwx 1 u g 4 Jan 2 2020 link -> /tmp/x", nov_2020())
            .unwrap();
        assert_eq!(e.name, "link");
        assert_eq!(e.kind, EntryKind::Symlink);
        assert_eq!(e.link_target.as_deref(), Some("/tmp/x"));
        assert_eq!(e.access, 0o777);
    }

    #[test]
    fn test_symlink_splits_on_last_arrow() {
        let e = parse_list_line(
            "lrwxrwxrwx 1 u g 4 Jan 2 2020 a -> b -> /real",
            nov_2020(),
        )
        .unwrap();
        assert_eq!(e.name, "a -> b");
        assert_eq!(e.link_target.as_deref(), Some("/real"));
    }

    #[test]
    fn test_missing_group() {
        let e = parse_list_line(
            "-rw-r--r--   1 ftp             543 May 13  1999 no-group",
            nov_2020(),
        )
        .unwrap();
        assert_eq!(e.name, "no-group");
        assert_eq!(e.owner, "ftp");
        assert_eq!(e.group, None);
        assert_eq!(e.size, 543);
    }

    #[test]
    fn test_name_with_spaces() {
        let e = parse_list_line(
            "-rw-r--r--   1 u g 10 Nov  9 12:30 a name with spaces",
            nov_2020(),
        )
        .unwrap();
        assert_eq!(e.name, "a name with spaces");
    }

    #[test]
    fn test_leading_slash_stripped() {
        let e = parse_list_line("-rw-r--r-- 1 u g 10 Nov  9 12:30 /welcome.msg", nov_2020())
            .unwrap();
        assert_eq!(e.name, "welcome.msg");
    }

    #[test]
    fn test_embedded_slash_skipped() {
        assert!(
            parse_list_line("-rw-r--r-- 1 u g 10 Nov  9 12:30 ../escape", nov_2020()).is_none()
        );
    }

    #[test]
    fn test_too_few_fields_skipped() {
        assert!(parse_list_line("total 123", nov_2020()).is_none());
        assert!(parse_list_line("", nov_2020()).is_none());
    }

    #[test]
    fn test_setuid_sticky_bits() {
        let e = parse_list_line(
            "-rwsr-sr-t 1 root root 99 Nov  9 12:30 oddball",
            nov_2020(),
        )
        .unwrap();
        assert_eq!(
            e.access,
            0o755 | mode::S_ISUID | mode::S_ISGID | mode::S_ISVTX
        );
    }

    #[test]
    fn test_implicit_year_current() {
        // November listing in November: current year.
        let e = parse_list_line("-rw-r--r-- 1 u g 1 Nov  9 12:30 f", nov_2020()).unwrap();
        assert_eq!(e.mtime.unwrap().year(), 2020);
    }

    #[test]
    fn test_implicit_year_future_slack() {
        // December in November: one month ahead is within slack.
        let e = parse_list_line("-rw-r--r-- 1 u g 1 Dec  1 08:00 f", nov_2020()).unwrap();
        assert_eq!(e.mtime.unwrap().year(), 2020);
    }

    #[test]
    fn test_implicit_year_wraps_backwards() {
        // An October date seen in February is from last year.
        let feb_2021 = Utc.with_ymd_and_hms(2021, 2, 1, 0, 0, 0).unwrap();
        let e = parse_list_line("-rw-r--r-- 1 u g 1 Oct  6 22:49 f", feb_2021).unwrap();
        assert_eq!(e.mtime.unwrap().year(), 2020);
        assert_eq!(e.mtime.unwrap().month(), 10);
    }

    #[test]
    fn test_explicit_year_zeroes_time() {
        let e = parse_list_line("-rw-r--r-- 1 u g 1 May 13  1999 f", nov_2020()).unwrap();
        let t = e.mtime.unwrap();
        assert_eq!((t.year(), t.hour(), t.minute()), (1999, 0, 0));
    }

    #[test]
    fn test_large_size() {
        let e = parse_list_line(
            "-rw-r--r-- 1 u g 5368709120 Nov  9 12:30 big.iso",
            nov_2020(),
        )
        .unwrap();
        assert_eq!(e.size, 5_368_709_120);
    }

    #[test]
    fn test_directory_kind() {
        let e = parse_list_line("drwxr-xr-x 2 u g 4096 Nov  9 12:30 pub", nov_2020()).unwrap();
        assert_eq!(e.kind, EntryKind::Dir);
        assert_eq!(e.access, 0o755);
    }
}
