pub mod parser;

pub use parser::parse_list_line;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Unix permission bits as produced by the LIST parser.
pub mod mode {
    pub const S_IRUSR: u32 = 0o400;
    pub const S_IWUSR: u32 = 0o200;
    pub const S_IXUSR: u32 = 0o100;
    pub const S_IRGRP: u32 = 0o040;
    pub const S_IWGRP: u32 = 0o020;
    pub const S_IXGRP: u32 = 0o010;
    pub const S_IROTH: u32 = 0o004;
    pub const S_IWOTH: u32 = 0o002;
    pub const S_IXOTH: u32 = 0o001;
    pub const S_ISUID: u32 = 0o4000;
    pub const S_ISGID: u32 = 0o2000;
    pub const S_ISVTX: u32 = 0o1000;

    pub const S_IRWXALL: u32 = 0o777;
    /// r-xr-xr-x, used for synthetic entries where the server told us nothing.
    pub const S_IRX_ALL: u32 = 0o555;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Socket,
    Block,
    Char,
    Fifo,
}

/// One remote directory entry, as parsed from a LIST line or synthesised
/// for short stat answers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FtpEntry {
    pub name: String,
    pub kind: EntryKind,
    /// Unix permission bits (`mode::*`).
    pub access: u32,
    pub owner: String,
    pub group: Option<String>,
    pub size: i64,
    pub mtime: Option<DateTime<Utc>>,
    pub link_target: Option<String>,
}

impl FtpEntry {
    /// Minimal entry for a name whose kind is known but nothing else is.
    pub fn short(name: &str, is_dir: bool) -> Self {
        Self {
            name: name.to_string(),
            kind: if is_dir { EntryKind::Dir } else { EntryKind::File },
            access: mode::S_IRX_ALL,
            owner: String::new(),
            group: None,
            size: 0,
            mtime: None,
            link_target: None,
        }
    }

    /// The synthetic root entry: we cannot stat "/", but we know it's a dir.
    pub fn root() -> Self {
        Self {
            name: ".".to_string(),
            kind: EntryKind::Dir,
            access: mode::S_IRX_ALL,
            owner: "root".to_string(),
            group: Some("root".to_string()),
            size: 0,
            mtime: None,
            link_target: None,
        }
    }
}
