// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA status codes used by the session layer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A 32-bit OPC UA status code.
///
/// The top two bits carry the severity: `00` good, `01` uncertain, `10` bad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct StatusCode(pub u32);

macro_rules! status_codes {
    ($($(#[$doc:meta])* $name:ident = $value:literal;)*) => {
        #[allow(non_upper_case_globals)]
        impl StatusCode {
            $(
                $(#[$doc])*
                pub const $name: StatusCode = StatusCode($value);
            )*

            /// Symbolic name of a known code.
            pub fn name(&self) -> Option<&'static str> {
                match self.0 & 0xFFFF_0000 {
                    $($value => Some(stringify!($name)),)*
                    _ => None,
                }
            }
        }
    };
}

status_codes! {
    /// The operation succeeded.
    Good = 0x0000_0000;
    /// An unexpected error occurred.
    Bad_UnexpectedError = 0x8001_0000;
    /// The operation timed out.
    Bad_Timeout = 0x800A_0000;
    /// The server does not support the requested service.
    Bad_ServiceUnsupported = 0x800B_0000;
    /// An error occurred verifying security.
    Bad_SecurityChecksFailed = 0x8013_0000;
    /// The specified secure channel is no longer valid.
    Bad_SecureChannelIdInvalid = 0x8022_0000;
    /// The session id is not valid.
    Bad_SessionIdInvalid = 0x8025_0000;
    /// The session was closed by the client.
    Bad_SessionClosed = 0x8026_0000;
    /// The session cannot be used because ActivateSession has not been called.
    Bad_SessionNotActivated = 0x8027_0000;
    /// The operation is not supported.
    Bad_NotSupported = 0x803D_0000;
    /// Requested operation is not implemented.
    Bad_NotImplemented = 0x8040_0000;
    /// The security token request type is not valid.
    Bad_RequestTypeInvalid = 0x8053_0000;
    /// The token has expired or is not recognized.
    Bad_TcpSecureChannelUnknown = 0x807F_0000;
    /// The network connection has been closed.
    Bad_ConnectionClosed = 0x80AE_0000;
    /// The source of the data is not operational.
    Bad_OutOfService = 0x808D_0000;
}

impl StatusCode {
    /// Returns `true` when the severity bits are good.
    pub fn is_good(&self) -> bool {
        self.0 & 0xC000_0000 == 0
    }

    /// Returns `true` when the severity bits are uncertain.
    pub fn is_uncertain(&self) -> bool {
        self.0 & 0xC000_0000 == 0x4000_0000
    }

    /// Returns `true` when the severity bits are bad.
    pub fn is_bad(&self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    /// The code with its info bits cleared.
    pub fn sub_code(&self) -> StatusCode {
        StatusCode(self.0 & 0xFFFF_0000)
    }
}

impl From<u32> for StatusCode {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}(0x{:08X})", name, self.0),
            None => write!(f, "0x{:08X}", self.0),
        }
    }
}
