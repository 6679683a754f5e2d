//! Bidirectional value coercions between wire text and typed values.
//!
//! Two transforms live here: date-time text ↔ [`chrono`] values and
//! URL-safe base64 text ↔ byte payloads. Both directions are used by the
//! parser and the builder so that a value written by one side is always
//! readable by the other.

use base64::Engine;
use base64::alphabet;
use base64::engine::DecodePaddingMode;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use chrono::{DateTime, FixedOffset};

/// URL-safe base64: `-`/`_` alphabet, no padding on encode, padding
/// accepted but not required on decode.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Parses timestamp text across the profiles produced by common feeds.
///
/// Accepted, in order: RFC 3339 (`2003-12-13T18:30:02Z`, offset forms),
/// RFC 2822 (`Tue, 29 Aug 2006 09:00:00 -0400`, the RSS `pubDate`
/// profile), and partial ISO-8601 forms (`YYYY`, `YYYY-MM`, `YYYY-MM-DD`,
/// offset-less `T` forms) normalized to UTC. Input is trimmed first;
/// feeds routinely carry stray whitespace around dates.
///
/// Returns `None` when no profile matches. The caller decides whether
/// that is fatal; for a matched non-empty node it is.
pub fn parse_datetime(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt);
    }

    // Partial dates carry no offset; a full offset form would have
    // parsed above. Normalize to UTC and retry.
    let normalized = if text.contains('T') {
        format!("{}+00:00", text)
    } else if text.len() == 10 {
        format!("{}T00:00:00+00:00", text)
    } else if text.len() == 7 {
        format!("{}-01T00:00:00+00:00", text)
    } else if text.len() == 4 {
        format!("{}-01-01T00:00:00+00:00", text)
    } else {
        return None;
    };

    DateTime::parse_from_rfc3339(&normalized).ok()
}

/// Renders a date-time as RFC 3339 with offset, the form every emitted
/// document uses regardless of the profile it was parsed from.
pub fn format_datetime(dt: &DateTime<FixedOffset>) -> String {
    dt.to_rfc3339()
}

/// Encodes bytes as URL-safe base64: no `+`/`/`, no padding, no line
/// breaks.
pub fn base64_encode(payload: &[u8]) -> String {
    URL_SAFE_LENIENT.encode(payload)
}

/// Decodes URL-safe base64 text, tolerating missing padding.
pub fn base64_decode(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_LENIENT.decode(text.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn parses_rfc3339() {
        let dt = parse_datetime("2003-12-13T18:30:02Z").unwrap();
        assert_eq!(dt.with_timezone(&Utc).to_rfc3339(), "2003-12-13T18:30:02+00:00");
    }

    #[test]
    fn parses_rfc2822_with_stray_whitespace() {
        let dt = parse_datetime("Mon, 28 Aug 2006 11:12:55 -0400 ").unwrap();
        assert_eq!(dt.to_rfc3339(), "2006-08-28T11:12:55-04:00");
    }

    #[test]
    fn parses_partial_dates() {
        assert_eq!(
            parse_datetime("2006-08-28").unwrap().to_rfc3339(),
            "2006-08-28T00:00:00+00:00"
        );
        assert_eq!(
            parse_datetime("2006-08").unwrap().to_rfc3339(),
            "2006-08-01T00:00:00+00:00"
        );
        assert_eq!(
            parse_datetime("2006").unwrap().to_rfc3339(),
            "2006-01-01T00:00:00+00:00"
        );
        assert_eq!(
            parse_datetime("2006-08-28T10:15:00").unwrap().to_rfc3339(),
            "2006-08-28T10:15:00+00:00"
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_datetime("not a date").is_none());
        assert!(parse_datetime("20").is_none());
    }

    #[test]
    fn base64_round_trip() {
        let payload: Vec<u8> = (0u8..=255).collect();
        let encoded = base64_encode(&payload);
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        assert!(!encoded.contains('='));
        assert!(!encoded.contains('\n'));
        assert_eq!(base64_decode(&encoded).unwrap(), payload);
    }

    #[test]
    fn base64_decode_accepts_padding() {
        assert_eq!(base64_decode("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(base64_decode("aGVsbG8").unwrap(), b"hello");
    }
}
