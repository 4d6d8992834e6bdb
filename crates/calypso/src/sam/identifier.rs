//! SAM identification from the ATR, and allocation filters

use std::fmt;

use crate::revision::SamRevision;
use crate::sam::PoolError;

/// Tag announcing the Calypso application data in a SAM ATR historical bytes
const ATR_APPLICATION_TAG: [u8; 2] = [0x80, 0x5A];
/// Status bytes closing the application data
const ATR_APPLICATION_STATUS: [u8; 3] = [0x82, 0x90, 0x00];
/// Length of the application data following the tag
const ATR_APPLICATION_LENGTH: usize = 10;

/// What a SAM tells about itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamIdentifier {
    /// SAM revision
    pub revision: SamRevision,
    /// Serial number, when the SAM announces one
    pub serial_number: Option<[u8; 4]>,
}

impl SamIdentifier {
    /// Identifier for a SAM of the given revision
    pub const fn new(revision: SamRevision, serial_number: Option<[u8; 4]>) -> Self {
        Self {
            revision,
            serial_number,
        }
    }

    /// Identify a SAM from its ATR
    ///
    /// The historical bytes carry `80 5A`, ten bytes of application data
    /// (platform, application type, subtype, issuer, version, revision,
    /// serial number) and `82 90 00`. Returns `None` for anything else.
    pub fn from_atr(atr: &[u8]) -> Option<Self> {
        let start = atr
            .windows(ATR_APPLICATION_TAG.len())
            .position(|window| window == ATR_APPLICATION_TAG)?
            + ATR_APPLICATION_TAG.len();
        let data = atr.get(start..start + ATR_APPLICATION_LENGTH)?;
        let status = atr.get(start + ATR_APPLICATION_LENGTH..)?;
        if !status.starts_with(&ATR_APPLICATION_STATUS) {
            return None;
        }

        let revision = SamRevision::from_application_subtype(data[2])?;
        let serial_number = data[6..10].try_into().ok();
        Some(Self {
            revision,
            serial_number,
        })
    }
}

impl fmt::Display for SamIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.serial_number {
            Some(serial) => write!(f, "SAM {} #{}", self.revision, hex::encode_upper(serial)),
            None => write!(f, "SAM {}", self.revision),
        }
    }
}

/// Criteria a SAM must meet to be allocated
///
/// The serial number pattern is 8 hex digits where `.` matches any digit,
/// e.g. `"1234...."`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SamFilter {
    revision: Option<SamRevision>,
    /// One entry per nibble, `None` for a wildcard
    pattern: Option<[Option<u8>; 8]>,
}

impl SamFilter {
    /// Filter matching any SAM
    pub const fn any() -> Self {
        Self {
            revision: None,
            pattern: None,
        }
    }

    /// Filter on the SAM revision
    pub const fn revision(revision: SamRevision) -> Self {
        Self {
            revision: Some(revision),
            pattern: None,
        }
    }

    /// Also require the serial number to match a pattern
    pub fn with_serial_pattern(mut self, pattern: &str) -> Result<Self, PoolError> {
        let invalid = || PoolError::InvalidPattern(pattern.to_owned());
        if pattern.len() != 8 {
            return Err(invalid());
        }

        let mut nibbles = [None; 8];
        for (nibble, c) in nibbles.iter_mut().zip(pattern.chars()) {
            *nibble = match c {
                '.' => None,
                c => Some(c.to_digit(16).ok_or_else(invalid)? as u8),
            };
        }
        self.pattern = Some(nibbles);
        Ok(self)
    }

    /// Whether a SAM meets this filter
    pub fn matches(&self, identifier: &SamIdentifier) -> bool {
        if self.revision.is_some_and(|revision| revision != identifier.revision) {
            return false;
        }
        let Some(pattern) = &self.pattern else {
            return true;
        };
        let Some(serial) = identifier.serial_number else {
            return false;
        };

        serial
            .iter()
            .flat_map(|byte| [byte >> 4, byte & 0x0F])
            .zip(pattern)
            .all(|(nibble, expected)| expected.is_none_or(|expected| expected == nibble))
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    const SAM_C1_ATR: [u8; 22] = hex!("3B3F9600805A0080C120000012345678829000AABBCC");

    #[test]
    fn test_identify_from_atr() {
        let identifier = SamIdentifier::from_atr(&SAM_C1_ATR).unwrap();
        assert_eq!(identifier.revision, SamRevision::C1);
        assert_eq!(identifier.serial_number, Some(hex!("12345678")));
        assert_eq!(identifier.to_string(), "SAM C1 #12345678");

        let s1d = hex!("3B3F9600805A0080D220000087654321829000");
        assert_eq!(
            SamIdentifier::from_atr(&s1d).unwrap().revision,
            SamRevision::S1D
        );
    }

    #[test]
    fn test_identify_rejects_other_atrs() {
        // Not a SAM at all
        assert_eq!(SamIdentifier::from_atr(&hex!("3B8F8001804F0CA0")), None);
        // Unknown subtype
        assert_eq!(
            SamIdentifier::from_atr(&hex!("3B3F9600805A0080A120000012345678829000")),
            None
        );
        // Missing status
        assert_eq!(
            SamIdentifier::from_atr(&hex!("3B3F9600805A0080C12000001234567882")),
            None
        );
    }

    #[test]
    fn test_filter_matching() {
        let c1 = SamIdentifier::new(SamRevision::C1, Some(hex!("12345678")));
        let anonymous = SamIdentifier::new(SamRevision::C1, None);

        assert!(SamFilter::any().matches(&c1));
        assert!(SamFilter::revision(SamRevision::C1).matches(&c1));
        assert!(!SamFilter::revision(SamRevision::S1E).matches(&c1));

        let filter = SamFilter::any().with_serial_pattern("1234....").unwrap();
        assert!(filter.matches(&c1));
        assert!(!filter.matches(&anonymous));
        let filter = SamFilter::any().with_serial_pattern("12345679").unwrap();
        assert!(!filter.matches(&c1));
        let filter = SamFilter::any().with_serial_pattern("........").unwrap();
        assert!(filter.matches(&c1));
        let filter = SamFilter::any().with_serial_pattern("1234abcd").unwrap();
        assert!(!filter.matches(&c1));
    }

    #[test]
    fn test_filter_pattern_validation() {
        assert!(SamFilter::any().with_serial_pattern("1234").is_err());
        assert!(SamFilter::any().with_serial_pattern("1234567g").is_err());
        assert_eq!(
            SamFilter::any().with_serial_pattern("123456789"),
            Err(PoolError::InvalidPattern("123456789".to_owned()))
        );
    }
}
