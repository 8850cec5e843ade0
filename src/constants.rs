use core::time::Duration;

use bytes_utils::Str;

pub(crate) const LF: u8 = b'\n';
pub(crate) const CR: u8 = b'\r';

const BOM_CHAR: char = '\u{FEFF}';
const BOM_LEN: usize = BOM_CHAR.len_utf8();
// bom           = %xFEFF ; U+FEFF BYTE ORDER MARK
pub(crate) const BOM: &[u8; BOM_LEN] = &{
    let mut buf = [0u8; BOM_LEN];
    BOM_CHAR.encode_utf8(&mut buf);
    buf
};

pub(crate) const EMPTY_STR: Str = Str::from_static("");
pub(crate) const MESSAGE_STR: Str = Str::from_static("message");

pub(crate) const ACCEPT_EVENT_STREAM: &str = "text/event-stream, text/plain;q=0.9, text/*;q=0.5";
pub(crate) const ACCEPT_URI_LIST: &str = "text/uri-list, text/plain;q=0.9, text/*;q=0.5";
pub(crate) const ACCEPT_ENCODING_IDENTITY: &str = "identity";
pub(crate) const CACHE_CONTROL_NO_STORE: &str = "no-store";
pub(crate) const LAST_EVENT_ID: &str = "last-event-id";

/// Reconnect delay used until the caller or the server says otherwise
pub const DEFAULT_RETRY: Duration = Duration::from_secs(30);
/// Connect and read timeout used until the caller says otherwise
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

pub(crate) const READ_CHUNK: usize = 8 * 1024;
