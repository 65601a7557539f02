//! ELM327 command framing and response parsing

use crate::error::ObdError;
use crate::mode;

/// Prompt character the adapter prints when it is ready for the next command
pub const PROMPT: u8 = b'>';

/// AT commands sent once after opening the port, before the protocol is selected
pub const INIT_COMMANDS: [&str; 5] = [
    // Reset
    "ATZ",
    // Echo off
    "ATE0",
    // Linefeeds off
    "ATL0",
    // Spaces on
    "ATS1",
    // Headers off
    "ATH0",
];

/// Format a Mode 01 query for `code`, without the trailing carriage return
pub fn format_query(code: u8) -> String {
    format!("{:02X}{:02X}", mode::CURRENT_DATA, code)
}

/// Map adapter error sentinels onto [`ObdError`]
fn check_sentinels(code: u8, text: &str) -> Result<(), ObdError> {
    let upper = text.to_ascii_uppercase();
    if upper.contains("NO DATA") {
        return Err(ObdError::NoData(code));
    }
    let bus_init_failed = upper.contains("BUS INIT") && upper.contains("ERROR");
    if upper.contains("UNABLE TO CONNECT") || bus_init_failed {
        return Err(ObdError::VehicleNotConnected);
    }
    if upper.contains("CAN ERROR") || upper.contains("STOPPED") || upper.contains("BUFFER FULL") {
        return Err(ObdError::InvalidResponse(text.trim().to_string()));
    }
    if upper
        .split(['\r', '\n'])
        .any(|line| line.trim().trim_end_matches(PROMPT as char).trim() == "?")
    {
        return Err(ObdError::InvalidResponse(format!(
            "adapter rejected command {}",
            format_query(code)
        )));
    }
    Ok(())
}

/// Decode one response line of hex pairs into bytes
fn hex_bytes(line: &str) -> Option<Vec<u8>> {
    let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() || compact.len() % 2 != 0 || !compact.is_ascii() {
        return None;
    }
    (0..compact.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&compact[i..i + 2], 16).ok())
        .collect()
}

/// Extract the data bytes of the first `41 <code>` frame in a raw adapter reply
///
/// Echoed commands, `SEARCHING...` banners and the `>` prompt are skipped.
/// When several ECUs answer, the first matching frame wins.
pub fn parse_response(code: u8, raw: &str) -> Result<Vec<u8>, ObdError> {
    check_sentinels(code, raw)?;

    let header = [mode::CURRENT_DATA + mode::RESPONSE_OFFSET, code];
    raw.split(['\r', '\n'])
        .map(|line| line.trim().trim_end_matches('>').trim())
        .filter(|line| !line.is_empty())
        .filter_map(hex_bytes)
        .find(|bytes| bytes.len() >= 2 && bytes[..2] == header)
        .map(|bytes| bytes[2..].to_vec())
        .ok_or_else(|| {
            ObdError::InvalidResponse(format!("no 41 {:02X} frame in {:?}", code, raw.trim()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_query() {
        assert_eq!(format_query(0x0C), "010C");
        assert_eq!(format_query(0x5C), "015C");
    }

    #[test]
    fn test_parse_plain_response() {
        let bytes = parse_response(0x0C, "41 0C 1A F8 \r\r>").unwrap();
        assert_eq!(bytes, vec![0x1A, 0xF8]);
    }

    #[test]
    fn test_parse_skips_echo_and_searching() {
        let raw = "010D\rSEARCHING...\r41 0D 37\r\r>";
        assert_eq!(parse_response(0x0D, raw).unwrap(), vec![0x37]);
    }

    #[test]
    fn test_parse_without_spaces() {
        assert_eq!(parse_response(0x11, "411133\r>").unwrap(), vec![0x33]);
    }

    #[test]
    fn test_parse_first_ecu_wins() {
        let raw = "41 05 7B\r41 05 80\r>";
        assert_eq!(parse_response(0x05, raw).unwrap(), vec![0x7B]);
    }

    #[test]
    fn test_no_data_sentinel() {
        let err = parse_response(0x5C, "NO DATA\r\r>").unwrap_err();
        assert!(matches!(err, ObdError::NoData(0x5C)));
    }

    #[test]
    fn test_unable_to_connect() {
        let err = parse_response(0x00, "SEARCHING...\rUNABLE TO CONNECT\r>").unwrap_err();
        assert!(matches!(err, ObdError::VehicleNotConnected));
    }

    #[test]
    fn test_question_mark_rejected() {
        assert!(matches!(
            parse_response(0x0C, "?\r>"),
            Err(ObdError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_wrong_pid_frame() {
        assert!(parse_response(0x0C, "41 0D 20\r>").is_err());
    }
}
