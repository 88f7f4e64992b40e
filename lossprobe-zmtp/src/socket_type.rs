/// ZMQ socket types as announced in the READY `Socket-Type` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketType {
    Pair,
    Dealer,
    Router,
    Pub,
    Sub,
    Req,
    Rep,
    Push,
    Pull,
}

impl SocketType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pair => "PAIR",
            Self::Dealer => "DEALER",
            Self::Router => "ROUTER",
            Self::Pub => "PUB",
            Self::Sub => "SUB",
            Self::Req => "REQ",
            Self::Rep => "REP",
            Self::Push => "PUSH",
            Self::Pull => "PULL",
        }
    }

    /// Map a `Socket-Type` property value back to a socket type.
    pub fn from_wire(name: &[u8]) -> Option<Self> {
        Some(match name {
            b"PAIR" => Self::Pair,
            b"DEALER" => Self::Dealer,
            b"ROUTER" => Self::Router,
            b"PUB" => Self::Pub,
            b"SUB" => Self::Sub,
            b"REQ" => Self::Req,
            b"REP" => Self::Rep,
            b"PUSH" => Self::Push,
            b"PULL" => Self::Pull,
            _ => return None,
        })
    }

    /// Whether a peer of type `peer` may talk to a socket of this type
    /// (ZMTP 3.1 compatibility table).
    pub const fn is_compatible(&self, peer: Self) -> bool {
        match self {
            Self::Pair => matches!(peer, Self::Pair),
            Self::Dealer => matches!(peer, Self::Dealer | Self::Router | Self::Rep),
            Self::Router => matches!(peer, Self::Dealer | Self::Router | Self::Req),
            Self::Req => matches!(peer, Self::Rep | Self::Router),
            Self::Rep => matches!(peer, Self::Req | Self::Dealer),
            Self::Pub => matches!(peer, Self::Sub),
            Self::Sub => matches!(peer, Self::Pub),
            Self::Push => matches!(peer, Self::Pull),
            Self::Pull => matches!(peer, Self::Push),
        }
    }
}

impl std::fmt::Display for SocketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
