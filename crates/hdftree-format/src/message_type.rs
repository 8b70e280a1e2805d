//! Object header message type identifiers.

macro_rules! message_types {
    ($($name:ident = $id:expr),* $(,)?) => {
        /// Header message types the tree reader looks at. Everything else is
        /// carried as [`MessageType::Unknown`] and skipped.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum MessageType {
            $($name,)*
            Unknown(u16),
        }

        impl MessageType {
            pub fn from_u16(id: u16) -> MessageType {
                match id {
                    $($id => MessageType::$name,)*
                    other => MessageType::Unknown(other),
                }
            }

            pub fn to_u16(self) -> u16 {
                match self {
                    $(MessageType::$name => $id,)*
                    MessageType::Unknown(id) => id,
                }
            }
        }
    };
}

message_types! {
    Nil = 0x00,
    Dataspace = 0x01,
    LinkInfo = 0x02,
    Datatype = 0x03,
    Link = 0x06,
    DataLayout = 0x08,
    GroupInfo = 0x0A,
    Attribute = 0x0C,
    ObjectHeaderContinuation = 0x10,
    // v1 group storage; only detected, never walked
    SymbolTable = 0x11,
}
