//! `host:port` address validation.

use crate::error::PreflightError;

/// Splits a `host:port` address. IPv6 literals must be bracketed
/// (`[::1]:9092`).
///
/// # Errors
/// Returns `Configuration` when the host is empty, is an unbracketed IPv6
/// literal, or the port is not a non-zero integer.
pub fn split_host_port(address: &str) -> crate::Result<(&str, u16)> {
    let address = address.trim();
    let invalid = || {
        PreflightError::configuration(format!(
            "address '{}' is not in host:port form",
            address
        ))
    };

    let (host, port) = if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
        let port = tail.strip_prefix(':').ok_or_else(invalid)?;
        (host, port)
    } else {
        let (host, port) = address.rsplit_once(':').ok_or_else(invalid)?;
        if host.contains(':') {
            return Err(PreflightError::configuration(format!(
                "address '{}' is ambiguous; write IPv6 hosts as [host]:port",
                address
            )));
        }
        (host, port)
    };

    if host.is_empty() || host.contains(char::is_whitespace) {
        return Err(invalid());
    }

    match port.parse::<u16>() {
        Ok(port) if port > 0 => Ok((host, port)),
        _ => Err(invalid()),
    }
}

/// Validates an ordered address list and returns it normalized (trimmed).
///
/// # Errors
/// Returns `Configuration` for an empty list or any malformed entry.
pub fn validate_addresses(addresses: &[String]) -> crate::Result<Vec<String>> {
    if addresses.is_empty() {
        return Err(PreflightError::configuration("address list cannot be empty"));
    }

    addresses
        .iter()
        .map(|address| split_host_port(address).map(|_| address.trim().to_string()))
        .collect()
}
