//! Well-known service names for diagnostic annotation.

/// Map a destination port to its canonical service name.
///
/// Total function: ports outside the table map to "Unknown".
pub fn service_name(port: u16) -> &'static str {
    match port {
        20 => "FTP Data",
        21 => "FTP Control",
        22 => "SSH",
        23 => "Telnet",
        25 => "SMTP",
        53 => "DNS",
        80 => "HTTP",
        110 => "POP3",
        143 => "IMAP",
        443 => "HTTPS",
        3306 => "MySQL",
        3389 => "RDP",
        5432 => "PostgreSQL",
        8080 => "HTTP Proxy",
        _ => "Unknown",
    }
}
