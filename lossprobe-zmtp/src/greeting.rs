use crate::codec::ZmtpError;
use bytes::BufMut;

/// ZMTP Greeting is always exactly 64 bytes
pub const GREETING_SIZE: usize = 64;

const SIGNATURE_HEAD: u8 = 0xFF;
const SIGNATURE_TAIL: u8 = 0x7F;
const VERSION_MAJOR: u8 = 3;
const VERSION_MINOR: u8 = 0;
const MECHANISM_LEN: usize = 20;

/// Security mechanisms a peer may announce.
///
/// Only NULL is spoken here; anything else fails the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mechanism {
    Null,
    Other(String),
}

/// Parsed greeting information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZmtpGreeting {
    pub major: u8,
    pub minor: u8,
    pub mechanism: Mechanism,
    pub as_server: bool,
}

impl ZmtpGreeting {
    /// Parse a 64-byte ZMTP greeting
    ///
    /// Layout (ZMTP 3.x):
    /// ```text
    /// [0]      0xFF
    /// [1..9]   Padding
    /// [9]      0x7F
    /// [10]     Major version
    /// [11]     Minor version
    /// [12..32] Mechanism (ASCII, null-padded)
    /// [32]     As-Server flag
    /// [33..64] Padding
    /// ```
    ///
    /// Any 3.x minor version is accepted (libzmq 4.1 speaks 3.0, 4.2+ speaks 3.1).
    pub fn parse(src: &[u8]) -> crate::codec::Result<Self> {
        if src.len() < GREETING_SIZE {
            return Err(ZmtpError::Greeting("short greeting"));
        }

        if src[0] != SIGNATURE_HEAD || src[9] != SIGNATURE_TAIL {
            return Err(ZmtpError::Greeting("bad signature"));
        }

        let major = src[10];
        let minor = src[11];
        if major < VERSION_MAJOR {
            return Err(ZmtpError::Greeting("ZMTP version below 3.0"));
        }

        let mech_raw = &src[12..12 + MECHANISM_LEN];
        let mech_str = std::str::from_utf8(mech_raw)
            .map_err(|_| ZmtpError::Greeting("mechanism is not ASCII"))?
            .trim_end_matches(char::from(0));

        let mechanism = match mech_str {
            "NULL" => Mechanism::Null,
            other => Mechanism::Other(other.to_string()),
        };

        Ok(Self {
            major,
            minor,
            mechanism,
            as_server: (src[32] & 0x01) != 0,
        })
    }
}

/// Append our ZMTP 3.0 NULL greeting to `dst`.
pub fn write_greeting<B: BufMut>(as_server: bool, dst: &mut B) {
    // Signature
    dst.put_u8(SIGNATURE_HEAD);
    dst.put_bytes(0, 8);
    dst.put_u8(SIGNATURE_TAIL);

    dst.put_u8(VERSION_MAJOR);
    dst.put_u8(VERSION_MINOR);

    dst.put_slice(b"NULL");
    dst.put_bytes(0, MECHANISM_LEN - 4);

    dst.put_u8(u8::from(as_server));
    dst.put_bytes(0, 31);
}
