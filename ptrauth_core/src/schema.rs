//! The signing schema of a single pointer category.
//!
//! A schema is a small `Copy` value threaded through every code-generation
//! decision. The kind-independent fields live in every enabled variant, so
//! only the key vocabulary differs between software and hardware signing.
//!
//! Accessors that only make sense for an enabled schema (or for one
//! particular kind) panic on misuse. Each has a `try_` twin returning
//! [`SchemaError`] for callers that would rather branch than trap.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::keys::{DiscriminationMode, HardwareKeyId, SigningKind, SoftwareKeyId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("called {accessor}() on a disabled pointer-auth schema")]
    Disabled { accessor: &'static str },

    #[error("called {accessor}() on a {found} schema, expected a {expected} schema")]
    KindMismatch {
        accessor: &'static str,
        expected: SigningKind,
        found: SigningKind,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigningSchema {
    #[default]
    Disabled,
    Software {
        key: SoftwareKeyId,
        address_discriminated: bool,
        discrimination: DiscriminationMode,
    },
    Hardware {
        key: HardwareKeyId,
        address_discriminated: bool,
        discrimination: DiscriminationMode,
    },
}

impl SigningSchema {
    pub const fn disabled() -> Self {
        SigningSchema::Disabled
    }

    pub const fn software(
        key: SoftwareKeyId,
        address_discriminated: bool,
        discrimination: DiscriminationMode,
    ) -> Self {
        SigningSchema::Software {
            key,
            address_discriminated,
            discrimination,
        }
    }

    pub const fn hardware(
        key: HardwareKeyId,
        address_discriminated: bool,
        discrimination: DiscriminationMode,
    ) -> Self {
        SigningSchema::Hardware {
            key,
            address_discriminated,
            discrimination,
        }
    }

    pub fn kind(&self) -> SigningKind {
        match self {
            SigningSchema::Disabled => SigningKind::Disabled,
            SigningSchema::Software { .. } => SigningKind::SoftwareKey,
            SigningSchema::Hardware { .. } => SigningKind::HardwareKey,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, SigningSchema::Disabled)
    }

    /// Whether the storage address of the pointer is mixed into the signature.
    ///
    /// # Panics
    ///
    /// Panics if the schema is disabled.
    pub fn is_address_discriminated(&self) -> bool {
        unwrap_query(self.try_is_address_discriminated())
    }

    pub fn try_is_address_discriminated(&self) -> Result<bool, SchemaError> {
        match self {
            SigningSchema::Disabled => Err(SchemaError::Disabled {
                accessor: "is_address_discriminated",
            }),
            SigningSchema::Software {
                address_discriminated,
                ..
            }
            | SigningSchema::Hardware {
                address_discriminated,
                ..
            } => Ok(*address_discriminated),
        }
    }

    /// # Panics
    ///
    /// Panics if the schema is disabled.
    pub fn discrimination_mode(&self) -> DiscriminationMode {
        unwrap_query(self.try_discrimination_mode())
    }

    pub fn try_discrimination_mode(&self) -> Result<DiscriminationMode, SchemaError> {
        match self {
            SigningSchema::Disabled => Err(SchemaError::Disabled {
                accessor: "discrimination_mode",
            }),
            SigningSchema::Software { discrimination, .. }
            | SigningSchema::Hardware { discrimination, .. } => Ok(*discrimination),
        }
    }

    /// # Panics
    ///
    /// Panics if the schema is disabled.
    pub fn has_extra_discrimination(&self) -> bool {
        self.discrimination_mode() != DiscriminationMode::None
    }

    /// # Panics
    ///
    /// Panics unless the schema uses a software key.
    pub fn software_key(&self) -> SoftwareKeyId {
        unwrap_query(self.try_software_key())
    }

    pub fn try_software_key(&self) -> Result<SoftwareKeyId, SchemaError> {
        match self {
            SigningSchema::Software { key, .. } => Ok(*key),
            other => Err(other.key_error("software_key", SigningKind::SoftwareKey)),
        }
    }

    /// # Panics
    ///
    /// Panics unless the schema uses a hardware key.
    pub fn hardware_key(&self) -> HardwareKeyId {
        unwrap_query(self.try_hardware_key())
    }

    pub fn try_hardware_key(&self) -> Result<HardwareKeyId, SchemaError> {
        match self {
            SigningSchema::Hardware { key, .. } => Ok(*key),
            other => Err(other.key_error("hardware_key", SigningKind::HardwareKey)),
        }
    }

    /// Numeric identity of the active key, whichever vocabulary it comes from.
    ///
    /// # Panics
    ///
    /// Panics if the schema is disabled.
    pub fn raw_key_index(&self) -> u8 {
        unwrap_query(self.try_raw_key_index())
    }

    pub fn try_raw_key_index(&self) -> Result<u8, SchemaError> {
        match self {
            SigningSchema::Disabled => Err(SchemaError::Disabled {
                accessor: "raw_key_index",
            }),
            SigningSchema::Software { key, .. } => Ok(key.index()),
            SigningSchema::Hardware { key, .. } => Ok(key.index()),
        }
    }

    fn key_error(&self, accessor: &'static str, expected: SigningKind) -> SchemaError {
        match self.kind() {
            SigningKind::Disabled => SchemaError::Disabled { accessor },
            found => SchemaError::KindMismatch {
                accessor,
                expected,
                found,
            },
        }
    }
}

#[track_caller]
fn unwrap_query<T>(result: Result<T, SchemaError>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic!("pointer-auth schema precondition violated: {err}"),
    }
}

impl fmt::Display for SigningSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (key, address_discriminated, discrimination) = match self {
            SigningSchema::Disabled => return f.write_str("disabled"),
            SigningSchema::Software {
                key,
                address_discriminated,
                discrimination,
            } => (key.name(), *address_discriminated, *discrimination),
            SigningSchema::Hardware {
                key,
                address_discriminated,
                discrimination,
            } => (key.name(), *address_discriminated, *discrimination),
        };
        write!(f, "{}({key}", self.kind())?;
        if address_discriminated {
            f.write_str(", addr")?;
        }
        write!(f, ", {discrimination})")
    }
}
