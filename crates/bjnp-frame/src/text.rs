//! Parsers for the semicolon-delimited identity and status strings.

use tracing::{debug, warn};

/// Token carrying make and model in an IEEE1284 id.
pub const MODEL_TOKEN: &str = "DES:";

/// Token carrying the 2-hex-digit status bitfield.
pub const STATUS_TOKEN: &str = "BST:";

/// Status bit: printer is printing.
pub const BST_PRINTING: u8 = 0x80;
/// Status bit: printer is busy.
pub const BST_BUSY: u8 = 0x20;
/// Status bit: operator call (paper out).
pub const BST_OPERATOR_CALL: u8 = 0x08;

/// Model reported when the identity carries no model token.
pub const UNIDENTIFIED_MODEL: &str = "Unidentified printer";

/// Paper condition derived from a status string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaperStatus {
    Ok,
    PaperOut,
    Unknown,
}

/// Decoded `BST:` bitfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusFlags {
    pub raw: u8,
}

impl StatusFlags {
    pub fn printing(self) -> bool {
        self.raw & BST_PRINTING != 0
    }

    pub fn busy(self) -> bool {
        self.raw & BST_BUSY != 0
    }

    pub fn operator_call(self) -> bool {
        self.raw & BST_OPERATOR_CALL != 0
    }

    /// Operator call means paper out unless the printer is still busy
    /// working through data it already accepted.
    ///
    /// The busy bit masks the operator call even while printing, so `BST:a8`
    /// reads as [`PaperStatus::Ok`]. Checking the operator call bit alone
    /// would report that status as paper out.
    pub fn paper_status(self) -> PaperStatus {
        if self.operator_call() && !self.busy() {
            PaperStatus::PaperOut
        } else {
            PaperStatus::Ok
        }
    }
}

/// Printer identity: the raw IEEE1284 id and the make/model taken from it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceIdentity {
    pub ieee1284_id: String,
    pub model: String,
}

impl DeviceIdentity {
    /// Build an identity from a raw IEEE1284 id string.
    pub fn from_ieee1284(id: impl Into<String>) -> Self {
        let ieee1284_id = id.into();
        let model = parse_model(&ieee1284_id)
            .unwrap_or(UNIDENTIFIED_MODEL)
            .to_string();
        Self { ieee1284_id, model }
    }

    /// Identity used when the printer could not be asked.
    pub fn unidentified() -> Self {
        Self {
            ieee1284_id: String::new(),
            model: UNIDENTIFIED_MODEL.to_string(),
        }
    }

    /// True when neither an id nor a real model is known.
    pub fn is_unknown(&self) -> bool {
        self.ieee1284_id.is_empty() && (self.model.is_empty() || self.model == UNIDENTIFIED_MODEL)
    }
}

fn find_token<'a>(text: &'a str, token: &str) -> Option<&'a str> {
    text.split(';')
        .map(str::trim_start)
        .find_map(|item| item.strip_prefix(token))
}

/// Extract the make/model from an IEEE1284 id.
pub fn parse_model(ieee1284_id: &str) -> Option<&str> {
    find_token(ieee1284_id, MODEL_TOKEN)
}

/// Parse the `BST:` bitfield. At most two leading hex digits are read.
pub fn parse_status_flags(status: &str) -> Option<StatusFlags> {
    let value = find_token(status, STATUS_TOKEN)?;
    let digits: String = value
        .chars()
        .take(2)
        .take_while(char::is_ascii_hexdigit)
        .collect();
    match u8::from_str_radix(&digits, 16) {
        Ok(raw) => {
            let flags = StatusFlags { raw };
            debug!(
                raw,
                printing = flags.printing(),
                busy = flags.busy(),
                operator_call = flags.operator_call(),
                "read printer status"
            );
            Some(flags)
        }
        Err(_) => {
            warn!(token = value, "could not parse paper status tag");
            None
        }
    }
}

/// Map a status string to a paper condition.
pub fn parse_paper_status(status: &str) -> PaperStatus {
    parse_status_flags(status).map_or(PaperStatus::Unknown, StatusFlags::paper_status)
}
