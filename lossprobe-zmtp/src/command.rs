use crate::codec::ZmtpError;
use crate::socket_type::SocketType;
use bytes::{BufMut, Bytes};

const READY: &[u8] = b"READY";
const PROP_SOCKET_TYPE: &[u8] = b"Socket-Type";
const PROP_IDENTITY: &[u8] = b"Identity";

/// Parsed ZMTP command (borrowed views into the payload).
#[derive(Debug, Clone)]
pub struct ZmtpCommand<'a> {
    pub name: &'a [u8],
    pub props: Vec<(&'a [u8], &'a [u8])>,
}

impl<'a> ZmtpCommand<'a> {
    pub fn get(&self, prop: &[u8]) -> Option<&'a [u8]> {
        self.props
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(prop))
            .map(|(_, value)| *value)
    }
}

/// Split a command frame body into its name and properties.
pub fn parse_command(body: &[u8]) -> Result<ZmtpCommand<'_>, ZmtpError> {
    let (&name_len, mut rest) = body
        .split_first()
        .ok_or(ZmtpError::Command("empty command body"))?;
    let name_len = name_len as usize;
    if rest.len() < name_len {
        return Err(ZmtpError::Command("truncated command name"));
    }
    let name = &rest[..name_len];
    rest = &rest[name_len..];

    let mut props = Vec::new();
    while let Some((&key_len, tail)) = rest.split_first() {
        let key_len = key_len as usize;
        if tail.len() < key_len + 4 {
            return Err(ZmtpError::Command("truncated property"));
        }
        let key = &tail[..key_len];
        let mut len = [0u8; 4];
        len.copy_from_slice(&tail[key_len..key_len + 4]);
        let value_len = u32::from_be_bytes(len) as usize;

        let tail = &tail[key_len + 4..];
        if tail.len() < value_len {
            return Err(ZmtpError::Command("truncated property value"));
        }
        props.push((key, &tail[..value_len]));
        rest = &tail[value_len..];
    }

    Ok(ZmtpCommand { name, props })
}

/// What the peer told us in its READY command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerReady {
    pub socket_type: SocketType,
    pub identity: Option<Bytes>,
}

/// Append a READY command body to `dst`.
pub fn write_ready<B: BufMut>(socket_type: SocketType, identity: Option<&[u8]>, dst: &mut B) {
    dst.put_u8(READY.len() as u8);
    dst.put_slice(READY);
    write_property(PROP_SOCKET_TYPE, socket_type.as_str().as_bytes(), dst);
    if let Some(id) = identity {
        write_property(PROP_IDENTITY, id, dst);
    }
}

fn write_property<B: BufMut>(name: &[u8], value: &[u8], dst: &mut B) {
    dst.put_u8(name.len() as u8);
    dst.put_slice(name);
    dst.put_u32(value.len() as u32);
    dst.put_slice(value);
}

/// Parse a READY command body.
pub fn parse_ready(body: &[u8]) -> Result<PeerReady, ZmtpError> {
    let cmd = parse_command(body)?;
    if cmd.name != READY {
        return Err(ZmtpError::Command("expected READY"));
    }

    let raw_type = cmd
        .get(PROP_SOCKET_TYPE)
        .ok_or(ZmtpError::Command("READY without Socket-Type"))?;
    let socket_type = SocketType::from_wire(raw_type)
        .ok_or_else(|| ZmtpError::IncompatiblePeer(String::from_utf8_lossy(raw_type).into()))?;

    let identity = cmd
        .get(PROP_IDENTITY)
        .filter(|id| !id.is_empty())
        .map(Bytes::copy_from_slice);

    Ok(PeerReady {
        socket_type,
        identity,
    })
}
