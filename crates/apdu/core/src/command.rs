//! Short APDU commands (ISO/IEC 7816-4)
//!
//! Calypso cards and SAMs never use extended length, so `Lc` and `Le` are
//! always a single byte.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Error, Response};

/// Maximum data length of a short APDU
pub const MAX_DATA_LENGTH: usize = 255;

/// An APDU command able to decode its own response
///
/// Implementors provide the header, data and `Le`; encoding is shared.
pub trait ApduCommand {
    /// Decoded response
    type Success;

    /// Error returned by decoding
    type Error: fmt::Debug;

    /// Map a codec error into [`Self::Error`]
    fn convert_error(error: Error) -> Self::Error;

    /// Class byte (CLA)
    fn class(&self) -> u8;

    /// Instruction byte (INS)
    fn instruction(&self) -> u8;

    /// First parameter (P1)
    fn p1(&self) -> u8;

    /// Second parameter (P2)
    fn p2(&self) -> u8;

    /// Command data, if any
    fn data(&self) -> Option<&[u8]>;

    /// Expected response length (`Le`), if any
    fn expected_length(&self) -> Option<u8>;

    /// Encode as `CLA INS P1 P2 [Lc data] [Le]`
    fn to_bytes(&self) -> Bytes {
        let data = self.data().unwrap_or_default();
        let mut buffer = BytesMut::with_capacity(6 + data.len());
        buffer.put_slice(&[self.class(), self.instruction(), self.p1(), self.p2()]);
        if !data.is_empty() {
            buffer.put_u8(data.len() as u8);
            buffer.put_slice(data);
        }
        if let Some(le) = self.expected_length() {
            buffer.put_u8(le);
        }
        buffer.freeze()
    }

    /// Decode the response
    ///
    /// Takes `&self` because several responses can only be decoded knowing
    /// how the command was built (read mode, card revision).
    fn parse_response(&self, response: Response) -> Result<Self::Success, Self::Error>;

    /// Decode a raw response, status word included
    fn parse_response_raw(&self, bytes: &[u8]) -> Result<Self::Success, Self::Error> {
        let response = Response::from_bytes(bytes).map_err(Self::convert_error)?;
        self.parse_response(response)
    }
}

/// A command known only by its bytes, answered with the raw [`Response`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    header: [u8; 4],
    data: Bytes,
    le: Option<u8>,
}

impl Command {
    /// Command made of a header only
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            header: [cla, ins, p1, p2],
            data: Bytes::new(),
            le: None,
        }
    }

    /// Attach command data, 1 to 255 bytes
    pub fn with_data(mut self, data: impl Into<Bytes>) -> Result<Self, Error> {
        let data = data.into();
        match data.len() {
            0 => return Err(Error::EmptyData),
            len if len > MAX_DATA_LENGTH => return Err(Error::DataTooLong(len)),
            _ => {}
        }
        self.data = data;
        Ok(self)
    }

    /// Attach an expected response length
    pub const fn with_le(mut self, le: u8) -> Self {
        self.le = Some(le);
        self
    }

    /// Decode a raw short APDU
    pub fn from_bytes(raw: &[u8]) -> Result<Self, Error> {
        let invalid = || Error::InvalidCommandLength(raw.len());
        let (header, body) = raw.split_first_chunk::<4>().ok_or_else(invalid)?;
        let mut command = Self {
            header: *header,
            data: Bytes::new(),
            le: None,
        };

        match body {
            [] => {}
            [le] => command.le = Some(*le),
            [lc, rest @ ..] => {
                let lc = *lc as usize;
                if lc == 0 || rest.len() < lc {
                    return Err(invalid());
                }
                let (data, trailer) = rest.split_at(lc);
                command.data = Bytes::copy_from_slice(data);
                command.le = match trailer {
                    [] => None,
                    [le] => Some(*le),
                    _ => return Err(invalid()),
                };
            }
        }
        Ok(command)
    }
}

impl ApduCommand for Command {
    type Success = Response;
    type Error = Error;

    fn convert_error(error: Error) -> Self::Error {
        error
    }

    fn class(&self) -> u8 {
        self.header[0]
    }

    fn instruction(&self) -> u8 {
        self.header[1]
    }

    fn p1(&self) -> u8 {
        self.header[2]
    }

    fn p2(&self) -> u8 {
        self.header[3]
    }

    fn data(&self) -> Option<&[u8]> {
        (!self.data.is_empty()).then_some(&self.data[..])
    }

    fn expected_length(&self) -> Option<u8> {
        self.le
    }

    fn parse_response(&self, response: Response) -> Result<Self::Success, Self::Error> {
        Ok(response)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.to_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_encoding() {
        let cmd = Command::new(0x00, 0xB2, 0x01, 0x3C).with_le(0x00);
        assert_eq!(cmd.to_bytes().as_ref(), hex!("00B2013C00"));

        let cmd = Command::new(0x80, 0x8C, 0x00, 0x00)
            .with_data(Bytes::from_static(&hex!("00B2013C00")))
            .unwrap();
        assert_eq!(cmd.to_string(), "808C00000500B2013C00");

        assert_eq!(Command::new(0x00, 0x8E, 0x00, 0x00).to_string(), "008E0000");
    }

    #[test]
    fn test_data_limits() {
        let cmd = Command::new(0x80, 0x8C, 0x00, 0x00);
        assert_eq!(cmd.clone().with_data(vec![0u8; 256]), Err(Error::DataTooLong(256)));
        assert_eq!(cmd.clone().with_data(Vec::new()), Err(Error::EmptyData));
        assert!(cmd.with_data(vec![0u8; 255]).is_ok());
    }

    #[test]
    fn test_decoding() {
        let cmd = Command::from_bytes(&hex!("008A0B3904C1C2C3C400")).unwrap();
        assert_eq!(
            (cmd.class(), cmd.instruction(), cmd.p1(), cmd.p2()),
            (0x00, 0x8A, 0x0B, 0x39)
        );
        assert_eq!(cmd.data(), Some(&hex!("C1C2C3C4")[..]));
        assert_eq!(cmd.expected_length(), Some(0x00));

        let cmd = Command::from_bytes(&hex!("94B2000000")).unwrap();
        assert_eq!(cmd.data(), None);
        assert_eq!(cmd.expected_length(), Some(0x00));

        let cmd = Command::from_bytes(&hex!("008E0000")).unwrap();
        assert_eq!((cmd.data(), cmd.expected_length()), (None, None));

        assert!(Command::from_bytes(&hex!("00A4040001010203")).is_err());
        assert!(Command::from_bytes(&hex!("00A40400000102")).is_err());
        assert!(Command::from_bytes(&hex!("00A404")).is_err());
    }
}
