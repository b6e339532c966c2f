//! # Hex Validator Actor
//!
//! Decodes hex-encoded text and replies with the result on its out route.
//! Input that is not valid hex gets an `"Invalid: ..."` reply; a bad input is
//! an answer, not a fault.

use silo_bus::{ActorContext, Frame, Workload, WorkloadResult};

pub const ODD_LENGTH: &str = "Invalid: odd number of characters";
pub const NON_HEX: &str = "Invalid: non-hex character";

pub fn workload() -> Workload {
    Workload::text(validate)
}

fn validate(text: String, _raw: &Frame, _address: &str, ctx: &mut ActorContext) -> WorkloadResult {
    let reply = match decode_hex(text.trim()) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(reason) => reason.to_string(),
    };
    ctx.reply_text(&reply)?;
    Ok(())
}

/// Decodes a hex string, upper or lower case.
pub fn decode_hex(text: &str) -> Result<Vec<u8>, &'static str> {
    if !text.is_ascii() {
        return Err(NON_HEX);
    }
    if text.len() % 2 != 0 {
        return Err(ODD_LENGTH);
    }
    text.as_bytes()
        .chunks_exact(2)
        .map(|pair| match (nibble(pair[0]), nibble(pair[1])) {
            (Some(high), Some(low)) => Ok((high << 4) | low),
            _ => Err(NON_HEX),
        })
        .collect()
}

fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}
