use std::io;
use std::sync::Arc;

/// Hostname reported in build info when resolution fails.
pub const UNKNOWN_HOSTNAME: &str = "__unknown__";

/// Resolves the hostname reported in build info.
pub type HostnameResolver = Arc<dyn Fn() -> io::Result<String> + Send + Sync>;

/// Best-effort lookup of the machine hostname.
///
/// Checks `HOSTNAME` and `COMPUTERNAME`, then the kernel and `/etc` hostname
/// files.
///
/// # Errors
///
/// Returns [`io::ErrorKind::NotFound`] if none of them yields a non-empty
/// name.
pub fn system_hostname() -> io::Result<String> {
    for var in ["HOSTNAME", "COMPUTERNAME"] {
        if let Ok(value) = std::env::var(var) {
            let value = value.trim();
            if !value.is_empty() {
                return Ok(value.to_string());
            }
        }
    }

    for path in ["/proc/sys/kernel/hostname", "/etc/hostname"] {
        if let Ok(contents) = std::fs::read_to_string(path) {
            let contents = contents.trim();
            if !contents.is_empty() {
                return Ok(contents.to_string());
            }
        }
    }

    Err(io::Error::new(
        io::ErrorKind::NotFound,
        "hostname not available from environment or system files",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_hostname_is_trimmed() {
        if let Ok(name) = system_hostname() {
            assert!(!name.is_empty());
            assert_eq!(name, name.trim());
        }
    }
}
