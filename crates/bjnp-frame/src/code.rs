//! Command codes, device types and well-known ports.
//!
//! A response carries the code of the command it answers; the device type
//! byte tells the two directions apart.

/// Discover printers listening on the print port.
pub const DISCOVER: u8 = 0x01;

/// Send print job owner details, opening a session.
pub const JOB_DETAILS: u8 = 0x10;

/// Close the session.
pub const CLOSE: u8 = 0x11;

/// Query printer status.
pub const GET_STATUS: u8 = 0x20;

/// Print data (TCP only).
pub const PRINT: u8 = 0x21;

/// Query printer identity (IEEE1284 id).
pub const GET_IDENTITY: u8 = 0x30;

/// Device type: printer command.
pub const DEVICE_PRINTER: u8 = 0x01;

/// Device type: scanner command.
pub const DEVICE_SCANNER: u8 = 0x02;

/// Device type: printer response.
pub const RESPONSE_PRINTER: u8 = 0x81;

/// Device type: scanner response.
pub const RESPONSE_SCANNER: u8 = 0x82;

/// Print service port (UDP control exchanges and TCP print data).
pub const PORT_PRINT: u16 = 8611;

/// Scanner service port.
pub const PORT_SCAN: u16 = 8612;

/// Reserved service ports.
pub const PORT_RESERVED_3: u16 = 8613;
pub const PORT_RESERVED_4: u16 = 8614;

/// Returns a human-readable name for a command/response code.
pub fn code_name(code: u8) -> &'static str {
    match code {
        DISCOVER => "DISCOVER",
        JOB_DETAILS => "JOB_DETAILS",
        CLOSE => "CLOSE",
        GET_STATUS => "GET_STATUS",
        PRINT => "PRINT",
        GET_IDENTITY => "GET_IDENTITY",
        _ => "UNKNOWN",
    }
}

/// Returns true if the code is one this codec can encode and decode.
pub fn is_known(code: u8) -> bool {
    matches!(
        code,
        DISCOVER | JOB_DETAILS | CLOSE | GET_STATUS | PRINT | GET_IDENTITY
    )
}

/// Returns true if the device type byte marks a response.
pub fn is_response(device_type: u8) -> bool {
    device_type & 0x80 != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_cover_known_codes() {
        for code in [DISCOVER, JOB_DETAILS, CLOSE, GET_STATUS, PRINT, GET_IDENTITY] {
            assert!(is_known(code));
            assert_ne!(code_name(code), "UNKNOWN");
        }
        assert!(!is_known(0x32));
        assert_eq!(code_name(0x32), "UNKNOWN");
    }

    #[test]
    fn response_bit() {
        assert!(is_response(RESPONSE_PRINTER));
        assert!(is_response(RESPONSE_SCANNER));
        assert!(!is_response(DEVICE_PRINTER));
        assert!(!is_response(DEVICE_SCANNER));
    }
}
