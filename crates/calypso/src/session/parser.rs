//! Decoding of Open and Close Secure Session responses
//!
//! Lengths below exclude the status word.

use bytes::Bytes;
use calypso_apdu_core::response::utils::read_be_uint;
use tracing::trace;

use super::{CloseSessionData, SecureSessionData};
use crate::constants::KIF_UNDEFINED;
use crate::error::{Error, Result};
use crate::revision::PoRevision;
use crate::status::CommandKind;

const BAD_OPEN_LENGTH: &str = "bad response length to Open Secure Session";
const BAD_CLOSE_LENGTH: &str = "bad response length to Close Secure Session";

/// Record content returned at opening by revision 1 and 2 cards
const LEGACY_RECORD_LENGTH: usize = 29;

/// Decode an Open Secure Session response payload
///
/// `layout` is the revision whose response format the card used; a revision
/// 3.2 card opened without the extended mode answers in the 3.1 format.
pub fn parse_open_session(layout: PoRevision, payload: &Bytes) -> Result<SecureSessionData> {
    trace!(%layout, payload = %hex::encode_upper(payload), "Decoding Open Secure Session response");
    match layout {
        PoRevision::Rev1_0 => parse_legacy(payload, 0, None),
        PoRevision::Rev2_4 => match payload.first() {
            Some(&kvc) => parse_legacy(payload, 1, Some(kvc)),
            None => Err(bad_open_length(payload)),
        },
        PoRevision::Rev3_1 => parse_rev3(payload, 1),
        PoRevision::Rev3_2 => parse_rev3(payload, 5),
    }
}

/// Revision 1.0 and 2.4 layout:
/// `[kvc] counter(3) challenge(1) [ratification(2)] [record(29)]`
fn parse_legacy(payload: &Bytes, offset: usize, kvc: Option<u8>) -> Result<SecureSessionData> {
    let (ratified, record_start) = match payload.len().checked_sub(offset) {
        Some(4) => (true, None),
        Some(6) => (false, None),
        Some(33) => (true, Some(4)),
        Some(35) => (false, Some(6)),
        _ => return Err(bad_open_length(payload)),
    };

    let record_data = match record_start {
        Some(start) => {
            let start = offset + start;
            payload.slice(start..start + LEGACY_RECORD_LENGTH)
        }
        None => Bytes::new(),
    };

    Ok(SecureSessionData {
        card_challenge: payload.slice(offset + 3..offset + 4),
        transaction_counter: read_be_uint(&payload[offset..offset + 3]) as u32,
        previous_session_ratified: ratified,
        session_management_authorized: false,
        kif: KIF_UNDEFINED,
        kvc,
        record_data,
        raw_payload: payload.clone(),
    })
}

/// Revision 3 layout:
/// `counter(3) challenge(n) flags(1) kif(1) kvc(1) length(1) record(length)`
///
/// Revision 3.1 uses the flags byte only for ratification (`0x00` when
/// ratified). Revision 3.2 uses bit 0 (clear when ratified) and bit 1 (set
/// when session management is authorized).
fn parse_rev3(payload: &Bytes, challenge_length: usize) -> Result<SecureSessionData> {
    let flags_at = 3 + challenge_length;
    let header_length = flags_at + 4;
    if payload.len() < header_length {
        return Err(bad_open_length(payload));
    }

    let record_length = payload[flags_at + 3] as usize;
    if payload.len() != header_length + record_length {
        return Err(bad_open_length(payload));
    }

    let flags = payload[flags_at];
    let (ratified, authorized) = if challenge_length == 1 {
        (flags == 0x00, false)
    } else {
        (flags & 0x01 == 0, flags & 0x02 != 0)
    };

    Ok(SecureSessionData {
        card_challenge: payload.slice(3..flags_at),
        transaction_counter: read_be_uint(&payload[..3]) as u32,
        previous_session_ratified: ratified,
        session_management_authorized: authorized,
        kif: payload[flags_at + 1],
        kvc: Some(payload[flags_at + 2]),
        record_data: payload.slice(header_length..),
        raw_payload: payload.clone(),
    })
}

fn bad_open_length(payload: &Bytes) -> Error {
    Error::decode(CommandKind::OpenSession, BAD_OPEN_LENGTH, payload.len())
}

/// Decode a Close Secure Session response payload
///
/// - 8 bytes: postponed data length, postponed data (3), card signature (4)
/// - 4 bytes: card signature
/// - empty: the session was aborted
pub fn parse_close_session(payload: &Bytes) -> Result<CloseSessionData> {
    match payload.len() {
        8 => Ok(CloseSessionData {
            signature_lo: payload.slice(4..8),
            postponed_data: payload.slice(1..4),
        }),
        4 => Ok(CloseSessionData {
            signature_lo: payload.clone(),
            postponed_data: Bytes::new(),
        }),
        0 => Ok(CloseSessionData::default()),
        length => Err(Error::decode(
            CommandKind::CloseSession,
            BAD_CLOSE_LENGTH,
            length,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn open(layout: PoRevision, payload: &[u8]) -> Result<SecureSessionData> {
        parse_open_session(layout, &Bytes::copy_from_slice(payload))
    }

    #[test]
    fn test_rev1_lengths() {
        let data = open(PoRevision::Rev1_0, &hex!("00007E C1")).unwrap();
        assert_eq!(data.transaction_counter(), 0x7E);
        assert_eq!(data.card_challenge().as_ref(), &[0xC1]);
        assert!(data.previous_session_ratified());
        assert!(!data.session_management_authorized());
        assert_eq!(data.kif(), 0xFF);
        assert!(!data.has_kif());
        assert_eq!(data.kvc(), None);
        assert!(data.record_data().is_empty());

        let data = open(PoRevision::Rev1_0, &hex!("00007E C1 1234")).unwrap();
        assert!(!data.previous_session_ratified());
        assert!(data.record_data().is_empty());

        let record = [0xA5; 29];
        let mut payload = hex!("01020304").to_vec();
        payload.extend_from_slice(&record);
        let data = open(PoRevision::Rev1_0, &payload).unwrap();
        assert_eq!(data.transaction_counter(), 0x010203);
        assert!(data.previous_session_ratified());
        assert_eq!(data.record_data().as_ref(), &record);

        let mut payload = hex!("01020304 5566").to_vec();
        payload.extend_from_slice(&record);
        let data = open(PoRevision::Rev1_0, &payload).unwrap();
        assert!(!data.previous_session_ratified());
        assert_eq!(data.record_data().as_ref(), &record);
        assert_eq!(data.raw_payload().len(), 35);
    }

    #[test]
    fn test_rev2_lengths() {
        let data = open(PoRevision::Rev2_4, &hex!("7E 000001 C1")).unwrap();
        assert_eq!(data.kvc(), Some(0x7E));
        assert_eq!(data.kif(), 0xFF);
        assert_eq!(data.transaction_counter(), 1);
        assert_eq!(data.card_challenge().as_ref(), &[0xC1]);
        assert!(data.previous_session_ratified());

        let data = open(PoRevision::Rev2_4, &hex!("7E 000001 C1 0000")).unwrap();
        assert!(!data.previous_session_ratified());

        let record = [0x5A; 29];
        let mut payload = hex!("7E 000001 C1").to_vec();
        payload.extend_from_slice(&record);
        let data = open(PoRevision::Rev2_4, &payload).unwrap();
        assert!(data.previous_session_ratified());
        assert_eq!(data.record_data().as_ref(), &record);

        let mut payload = hex!("7E 000001 C1 0000").to_vec();
        payload.extend_from_slice(&record);
        let data = open(PoRevision::Rev2_4, &payload).unwrap();
        assert!(!data.previous_session_ratified());
        assert_eq!(data.record_data().as_ref(), &record);
    }

    #[test]
    fn test_rev31() {
        let data = open(PoRevision::Rev3_1, &hex!("00007E C1 00 12 34 00")).unwrap();
        assert_eq!(data.transaction_counter(), 0x7E);
        assert_eq!(data.card_challenge().as_ref(), &[0xC1]);
        assert!(data.previous_session_ratified());
        assert!(!data.session_management_authorized());
        assert_eq!(data.kif(), 0x12);
        assert_eq!(data.kvc(), Some(0x34));
        assert!(data.record_data().is_empty());

        let data = open(PoRevision::Rev3_1, &hex!("00007E C1 01 12 34 03 AABBCC")).unwrap();
        assert!(!data.previous_session_ratified());
        assert_eq!(data.record_data().as_ref(), &hex!("AABBCC"));
    }

    #[test]
    fn test_rev32_flags() {
        let data = open(
            PoRevision::Rev3_2,
            &hex!("00007E C1C2C3C4C5 02 30 79 02 AABB"),
        )
        .unwrap();
        assert_eq!(data.card_challenge().as_ref(), &hex!("C1C2C3C4C5"));
        assert!(data.previous_session_ratified());
        assert!(data.session_management_authorized());
        assert_eq!(data.kif(), 0x30);
        assert_eq!(data.kvc(), Some(0x79));
        assert_eq!(data.record_data().as_ref(), &hex!("AABB"));

        let data = open(PoRevision::Rev3_2, &hex!("00007E C1C2C3C4C5 01 30 79 00")).unwrap();
        assert!(!data.previous_session_ratified());
        assert!(!data.session_management_authorized());
    }

    #[test]
    fn test_illegal_open_lengths() {
        for (layout, payload) in [
            (PoRevision::Rev1_0, &hex!("00007E C1 12")[..]),
            (PoRevision::Rev1_0, &[][..]),
            (PoRevision::Rev2_4, &hex!("7E 000001")[..]),
            (PoRevision::Rev2_4, &[][..]),
            (PoRevision::Rev3_1, &hex!("00007E C1 00")[..]),
            // Declared record length longer than the payload
            (PoRevision::Rev3_1, &hex!("00007E C1 00 12 34 02 AA")[..]),
            (PoRevision::Rev3_2, &hex!("00007E C1 00 12 34 00")[..]),
        ] {
            let err = open(layout, payload).unwrap_err();
            assert!(
                matches!(
                    err,
                    Error::Decode {
                        command: CommandKind::OpenSession,
                        reason: BAD_OPEN_LENGTH,
                        ..
                    }
                ),
                "{layout} {payload:02X?}"
            );
        }
    }

    #[test]
    fn test_close_session() {
        let data = parse_close_session(&Bytes::from_static(&hex!("4DBDC960"))).unwrap();
        assert_eq!(data.signature_lo().as_ref(), &hex!("4DBDC960"));
        assert!(data.postponed_data().is_empty());

        let data = parse_close_session(&Bytes::from_static(&hex!("04345678 FEDCBA98"))).unwrap();
        assert_eq!(data.signature_lo().as_ref(), &hex!("FEDCBA98"));
        assert_eq!(data.postponed_data().as_ref(), &hex!("345678"));

        let data = parse_close_session(&Bytes::new()).unwrap();
        assert!(data.is_abort());
        assert!(data.postponed_data().is_empty());
    }

    #[test]
    fn test_illegal_close_length() {
        let err = parse_close_session(&Bytes::from_static(&hex!("4DBDC96000"))).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                command: CommandKind::CloseSession,
                length: 5,
                ..
            }
        ));
    }
}
