use thiserror::Error;

/// Errors surfaced to the host process through the `error(code, msg)` upcall.
///
/// The payload is the path, the host, or a "host: reason" string, depending
/// on what the failing operation was touching. Passwords never end up here.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkerError {
    #[error("unknown host: {0}")]
    UnknownHost(String),

    #[error("could not connect: {0}")]
    CouldNotConnect(String),

    #[error("operation canceled by user: {0}")]
    UserCanceled(String),

    #[error("could not login: {0}")]
    CouldNotLogin(String),

    #[error("{0}")]
    SlaveDefined(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("cannot resume: {0}")]
    CannotResume(String),

    #[error("is a directory: {0}")]
    IsDirectory(String),

    #[error("is a file: {0}")]
    IsFile(String),

    #[error("does not exist: {0}")]
    DoesNotExist(String),

    #[error("cannot enter directory: {0}")]
    CannotEnterDirectory(String),

    #[error("directory already exists: {0}")]
    DirAlreadyExist(String),

    #[error("could not make directory: {0}")]
    CouldNotMkdir(String),

    #[error("cannot rename: {0}")]
    CannotRename(String),

    #[error("cannot delete: {0}")]
    CannotDelete(String),

    #[error("cannot change permissions: {0}")]
    CannotChmod(String),

    #[error("cannot open for reading: {0}")]
    CannotOpenForReading(String),

    #[error("cannot open for writing: {0}")]
    CannotOpenForWriting(String),

    #[error("could not read: {0}")]
    CouldNotRead(String),

    #[error("could not write: {0}")]
    CouldNotWrite(String),

    #[error("disk full: {0}")]
    DiskFull(String),

    #[error("connection broken: {0}")]
    ConnectionBroken(String),

    #[error("cyclic link: {0}")]
    CyclicLink(String),

    #[error("file already exists: {0}")]
    FileAlreadyExist(String),

    #[error("cannot delete partial file: {0}")]
    CannotDeletePartial(String),

    #[error("cannot rename partial file: {0}")]
    CannotRenamePartial(String),

    #[error("unsupported action: {0}")]
    UnsupportedAction(String),

    #[error("write access denied: {0}")]
    WriteAccessDenied(String),
}

impl WorkerError {
    /// Stable symbolic name, used on the wire towards the host process.
    pub fn name(&self) -> &'static str {
        match self {
            WorkerError::UnknownHost(_) => "ERR_UNKNOWN_HOST",
            WorkerError::CouldNotConnect(_) => "ERR_COULD_NOT_CONNECT",
            WorkerError::UserCanceled(_) => "ERR_USER_CANCELED",
            WorkerError::CouldNotLogin(_) => "ERR_COULD_NOT_LOGIN",
            WorkerError::SlaveDefined(_) => "ERR_SLAVE_DEFINED",
            WorkerError::Internal(_) => "ERR_INTERNAL",
            WorkerError::CannotResume(_) => "ERR_CANNOT_RESUME",
            WorkerError::IsDirectory(_) => "ERR_IS_DIRECTORY",
            WorkerError::IsFile(_) => "ERR_IS_FILE",
            WorkerError::DoesNotExist(_) => "ERR_DOES_NOT_EXIST",
            WorkerError::CannotEnterDirectory(_) => "ERR_CANNOT_ENTER_DIRECTORY",
            WorkerError::DirAlreadyExist(_) => "ERR_DIR_ALREADY_EXIST",
            WorkerError::CouldNotMkdir(_) => "ERR_COULD_NOT_MKDIR",
            WorkerError::CannotRename(_) => "ERR_CANNOT_RENAME",
            WorkerError::CannotDelete(_) => "ERR_CANNOT_DELETE",
            WorkerError::CannotChmod(_) => "ERR_CANNOT_CHMOD",
            WorkerError::CannotOpenForReading(_) => "ERR_CANNOT_OPEN_FOR_READING",
            WorkerError::CannotOpenForWriting(_) => "ERR_CANNOT_OPEN_FOR_WRITING",
            WorkerError::CouldNotRead(_) => "ERR_COULD_NOT_READ",
            WorkerError::CouldNotWrite(_) => "ERR_COULD_NOT_WRITE",
            WorkerError::DiskFull(_) => "ERR_DISK_FULL",
            WorkerError::ConnectionBroken(_) => "ERR_CONNECTION_BROKEN",
            WorkerError::CyclicLink(_) => "ERR_CYCLIC_LINK",
            WorkerError::FileAlreadyExist(_) => "ERR_FILE_ALREADY_EXIST",
            WorkerError::CannotDeletePartial(_) => "ERR_CANNOT_DELETE_PARTIAL",
            WorkerError::CannotRenamePartial(_) => "ERR_CANNOT_RENAME_PARTIAL",
            WorkerError::UnsupportedAction(_) => "ERR_UNSUPPORTED_ACTION",
            WorkerError::WriteAccessDenied(_) => "ERR_WRITE_ACCESS_DENIED",
        }
    }

    /// The textual payload shown to the user.
    pub fn payload(&self) -> &str {
        match self {
            WorkerError::UnknownHost(s)
            | WorkerError::CouldNotConnect(s)
            | WorkerError::UserCanceled(s)
            | WorkerError::CouldNotLogin(s)
            | WorkerError::SlaveDefined(s)
            | WorkerError::Internal(s)
            | WorkerError::CannotResume(s)
            | WorkerError::IsDirectory(s)
            | WorkerError::IsFile(s)
            | WorkerError::DoesNotExist(s)
            | WorkerError::CannotEnterDirectory(s)
            | WorkerError::DirAlreadyExist(s)
            | WorkerError::CouldNotMkdir(s)
            | WorkerError::CannotRename(s)
            | WorkerError::CannotDelete(s)
            | WorkerError::CannotChmod(s)
            | WorkerError::CannotOpenForReading(s)
            | WorkerError::CannotOpenForWriting(s)
            | WorkerError::CouldNotRead(s)
            | WorkerError::CouldNotWrite(s)
            | WorkerError::DiskFull(s)
            | WorkerError::ConnectionBroken(s)
            | WorkerError::CyclicLink(s)
            | WorkerError::FileAlreadyExist(s)
            | WorkerError::CannotDeletePartial(s)
            | WorkerError::CannotRenamePartial(s)
            | WorkerError::UnsupportedAction(s)
            | WorkerError::WriteAccessDenied(s) => s,
        }
    }
}

pub type WorkerResult<T> = Result<T, WorkerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_mapping() {
        assert_eq!(
            WorkerError::UnknownHost("x".into()).name(),
            "ERR_UNKNOWN_HOST"
        );
        assert_eq!(
            WorkerError::WriteAccessDenied("/tmp/f".into()).name(),
            "ERR_WRITE_ACCESS_DENIED"
        );
    }

    #[test]
    fn test_payload_passthrough() {
        let e = WorkerError::CouldNotConnect("ftp.example: refused".into());
        assert_eq!(e.payload(), "ftp.example: refused");
    }
}
