//! Utility functions shared across RavenHost crates

use if_addrs::IfAddr;

/// Get the local non-loopback IPv4 address, or "127.0.0.1" as fallback.
pub fn local_ip() -> String {
    if_addrs::get_if_addrs()
        .ok()
        .and_then(|addrs| {
            addrs
                .into_iter()
                .find(|iface| !iface.is_loopback() && matches!(iface.addr, IfAddr::V4(_)))
                .and_then(|iface| match iface.addr {
                    IfAddr::V4(addr) => Some(addr.ip.to_string()),
                    _ => None,
                })
        })
        .unwrap_or_else(|| "127.0.0.1".to_string())
}

/// Append the platform path separator to `path` if it is not already there.
///
/// The data directory handed to the storage engine always ends with the
/// separator so that callers can concatenate file names directly.
pub fn ensure_trailing_separator(path: &str) -> String {
    if path.ends_with(std::path::MAIN_SEPARATOR) {
        path.to_string()
    } else {
        let mut owned = path.to_string();
        owned.push(std::path::MAIN_SEPARATOR);
        owned
    }
}
