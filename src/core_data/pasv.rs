//! Parsing of PASV and EPSV reply payloads.
//!
//! The advertised host part of a PASV reply is ignored by the caller on
//! purpose: it is wrong behind misconfigured NATs, and honoring it would
//! make us connect to attacker-chosen addresses.

/// Extract the data port from a 227 reply.
///
/// The usual answer is `227 Entering Passive Mode. (160,39,200,55,6,245)`,
/// but anonftpd gives `227 =160,39,200,55,6,245`.
pub fn parse_pasv_reply(text: &str) -> Option<u16> {
    let start = text.find('(').or_else(|| text.find('='))?;
    let nums = parse_six(&text[start + 1..])?;
    Some(((nums[4] << 8) | (nums[5] & 0xff)) as u16)
}

/// Extract the data port from a 229 reply: `(|||54321|)`.
pub fn parse_epsv_reply(text: &str) -> Option<u16> {
    let start = text.find('|')?;
    let rest = text[start..].strip_prefix("|||")?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn parse_six(s: &str) -> Option<[i64; 6]> {
    let mut nums = [0i64; 6];
    let mut fields = s.split(',');
    for num in nums.iter_mut() {
        let tok = fields.next()?;
        let digits: String = tok
            .trim_start()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if digits.is_empty() {
            return None;
        }
        *num = digits.parse().ok()?;
    }
    Some(nums)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_pasv() {
        let port = parse_pasv_reply("Entering Passive Mode. (160,39,200,55,6,245)").unwrap();
        assert_eq!(port, 6 * 256 + 245);
    }

    #[test]
    fn test_anonftpd_equals_form() {
        // The host field is ignored either way; only the port matters.
        let port = parse_pasv_reply("=160,39,200,55,6,245").unwrap();
        assert_eq!(port, 1781);
    }

    #[test]
    fn test_pasv_garbage() {
        assert_eq!(parse_pasv_reply("Entering Passive Mode."), None);
        assert_eq!(parse_pasv_reply("(1,2,3)"), None);
        assert_eq!(parse_pasv_reply("(a,b,c,d,e,f)"), None);
    }

    #[test]
    fn test_epsv() {
        let port = parse_epsv_reply("Entering Extended Passive Mode (|||54321|)").unwrap();
        assert_eq!(port, 54321);
    }

    #[test]
    fn test_epsv_garbage() {
        assert_eq!(parse_epsv_reply("Entering Extended Passive Mode"), None);
        assert_eq!(parse_epsv_reply("(|12|34|56|)"), None);
    }
}
