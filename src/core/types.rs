//! # Wire Types
//!
//! Fixed-width little-endian integers and fixed-size byte arrays.
//!
//! Every field of the protocol has a width known at compile time. The width is part of the
//! type: `encode` returns a `[u8; N]` and `decode` takes a `[u8; N]`, so a field can never be
//! framed with the wrong size.
//!
//! | Type          | Width | Inner |
//! |---------------|-------|-------|
//! | `Version`     | 1     | `u8`  |
//! | `Code`        | 2     | `u16` |
//! | `PayloadSize` | 4     | `u32` |
//! | `MessageId`   | 4     | `u32` |
//! | `RawMessageType` | 1  | `u8`  |
//! | `ContentSize` | 4     | `u32` |

use std::fmt;
use std::ops::{Sub, SubAssign};

/// Size of the blocks streamed between the socket and content storage.
pub const BLOCK_SIZE: usize = 1024;

macro_rules! wire_int {
    ($(#[$meta:meta])* $name:ident, $inner:ty, $width:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name($inner);

        impl $name {
            /// Encoded width in bytes.
            pub const SIZE: usize = $width;

            /// Largest encodable value.
            pub const MAX: Self = Self(<$inner>::MAX);

            pub const fn new(value: $inner) -> Self {
                Self(value)
            }

            pub const fn value(self) -> $inner {
                self.0
            }

            /// Little-endian encoding, always exactly `SIZE` bytes.
            pub fn encode(self) -> [u8; $width] {
                self.0.to_le_bytes()
            }

            pub fn decode(bytes: [u8; $width]) -> Self {
                Self(<$inner>::from_le_bytes(bytes))
            }

            pub fn checked_sub(self, rhs: Self) -> Option<Self> {
                self.0.checked_sub(rhs.0).map(Self)
            }
        }

        impl From<$inner> for $name {
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }

        impl From<$name> for $inner {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl Sub for $name {
            type Output = Self;

            fn sub(self, rhs: Self) -> Self {
                Self(self.0 - rhs.0)
            }
        }

        impl SubAssign for $name {
            fn sub_assign(&mut self, rhs: Self) {
                self.0 -= rhs.0;
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

wire_int!(
    /// Protocol version byte.
    Version,
    u8,
    1
);
wire_int!(
    /// Request or response code.
    Code,
    u16,
    2
);
wire_int!(
    /// Size of everything following a header.
    PayloadSize,
    u32,
    4
);
wire_int!(
    /// Server-assigned message identifier.
    MessageId,
    u32,
    4
);
wire_int!(
    /// Message type byte as it appears on the wire, see [`crate::protocol::message::MessageType`].
    RawMessageType,
    u8,
    1
);
wire_int!(
    /// Size of a message's content.
    ContentSize,
    u32,
    4
);

impl PayloadSize {
    /// Payload size covering `bytes` bytes of fixed-width fields.
    ///
    /// Only meant for compile-time known layouts, which always fit.
    pub(crate) const fn fixed(bytes: usize) -> Self {
        Self(bytes as u32)
    }
}

pub const CLIENT_ID_SIZE: usize = 16;
pub const USERNAME_SIZE: usize = 255;
pub const PUBLIC_KEY_SIZE: usize = 160;

/// 16-byte identifier assigned by the server on registration.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId([u8; CLIENT_ID_SIZE]);

impl ClientId {
    pub const SIZE: usize = CLIENT_ID_SIZE;

    /// The id sent before registration.
    pub const UNREGISTERED: Self = Self([0; CLIENT_ID_SIZE]);

    pub const fn new(bytes: [u8; CLIENT_ID_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn encode(&self) -> [u8; CLIENT_ID_SIZE] {
        self.0
    }

    pub fn decode(bytes: [u8; CLIENT_ID_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; CLIENT_ID_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(value: &str) -> Option<Self> {
        let raw = hex::decode(value).ok()?;
        let bytes: [u8; CLIENT_ID_SIZE] = raw.try_into().ok()?;
        Some(Self(bytes))
    }
}

impl fmt::Debug for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientId({})", self.to_hex())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A username as carried in its 255-byte NUL-padded wire slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    pub const SIZE: usize = USERNAME_SIZE;

    /// Validates that `name` fits in the wire slot.
    ///
    /// Returns the name back as the error when it is longer than [`Username::SIZE`] bytes.
    pub fn new(name: impl Into<String>) -> std::result::Result<Self, String> {
        let name = name.into();
        if name.len() > USERNAME_SIZE {
            return Err(name);
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn encode(&self) -> [u8; USERNAME_SIZE] {
        let mut slot = [0u8; USERNAME_SIZE];
        slot[..self.0.len()].copy_from_slice(self.0.as_bytes());
        slot
    }

    /// Logical value is everything before the first NUL byte. `None` when those bytes are
    /// not valid UTF-8.
    pub fn decode(slot: [u8; USERNAME_SIZE]) -> Option<Self> {
        let end = slot.iter().position(|&b| b == 0).unwrap_or(USERNAME_SIZE);
        std::str::from_utf8(&slot[..end])
            .ok()
            .map(|name| Self(name.to_string()))
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Exported public key blob, opaque to the codec.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKeyBlob([u8; PUBLIC_KEY_SIZE]);

impl PublicKeyBlob {
    pub const SIZE: usize = PUBLIC_KEY_SIZE;

    pub const fn new(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn encode(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.0
    }

    pub fn decode(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for PublicKeyBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKeyBlob({}..)", hex::encode(&self.0[..8]))
    }
}
