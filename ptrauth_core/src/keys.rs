//! Closed key and discrimination vocabularies shared by every schema.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::ConfigError;

/// Which signing technology a schema uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigningKind {
    #[default]
    Disabled,
    SoftwareKey,
    HardwareKey,
}

impl SigningKind {
    pub const ALL: [SigningKind; 3] = [
        SigningKind::Disabled,
        SigningKind::SoftwareKey,
        SigningKind::HardwareKey,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SigningKind::Disabled => "disabled",
            SigningKind::SoftwareKey => "software",
            SigningKind::HardwareKey => "hardware",
        }
    }
}

impl fmt::Display for SigningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Software pointer-signing "keys".
///
/// Each key names the pointer category it is conventionally used for. The
/// numeric values are stable identifiers, not flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum SoftwareKeyId {
    FunctionPointers = 0,
    BlockInvocationFunctionPointers = 1,
    BlockHelperFunctionPointers = 2,
    ObjCMethodListFunctionPointers = 3,
    CXXVTablePointers = 4,
    CXXVirtualFunctionPointers = 5,
    CXXMemberFunctionPointers = 6,
}

impl SoftwareKeyId {
    pub const ALL: [SoftwareKeyId; 7] = [
        SoftwareKeyId::FunctionPointers,
        SoftwareKeyId::BlockInvocationFunctionPointers,
        SoftwareKeyId::BlockHelperFunctionPointers,
        SoftwareKeyId::ObjCMethodListFunctionPointers,
        SoftwareKeyId::CXXVTablePointers,
        SoftwareKeyId::CXXVirtualFunctionPointers,
        SoftwareKeyId::CXXMemberFunctionPointers,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            SoftwareKeyId::FunctionPointers => "FunctionPointers",
            SoftwareKeyId::BlockInvocationFunctionPointers => "BlockInvocationFunctionPointers",
            SoftwareKeyId::BlockHelperFunctionPointers => "BlockHelperFunctionPointers",
            SoftwareKeyId::ObjCMethodListFunctionPointers => "ObjCMethodListFunctionPointers",
            SoftwareKeyId::CXXVTablePointers => "CXXVTablePointers",
            SoftwareKeyId::CXXVirtualFunctionPointers => "CXXVirtualFunctionPointers",
            SoftwareKeyId::CXXMemberFunctionPointers => "CXXMemberFunctionPointers",
        }
    }
}

impl fmt::Display for SoftwareKeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SoftwareKeyId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.name() == s)
            .ok_or_else(|| ConfigError::unknown_name("software key", s))
    }
}

/// Hardware pointer-signing keys of the ARMv8.3 key register file.
///
/// These values are the same used in `<ptrauth.h>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum HardwareKeyId {
    ASIA = 0,
    ASIB = 1,
    ASDA = 2,
    ASDB = 3,
}

impl HardwareKeyId {
    pub const ALL: [HardwareKeyId; 4] = [
        HardwareKeyId::ASIA,
        HardwareKeyId::ASIB,
        HardwareKeyId::ASDA,
        HardwareKeyId::ASDB,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            HardwareKeyId::ASIA => "ASIA",
            HardwareKeyId::ASIB => "ASIB",
            HardwareKeyId::ASDA => "ASDA",
            HardwareKeyId::ASDB => "ASDB",
        }
    }

    /// Keys used for code pointers.
    pub fn is_instruction_key(self) -> bool {
        matches!(self, HardwareKeyId::ASIA | HardwareKeyId::ASIB)
    }

    /// Keys used for data pointers.
    pub fn is_data_key(self) -> bool {
        !self.is_instruction_key()
    }
}

impl fmt::Display for HardwareKeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HardwareKeyId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.name() == s)
            .ok_or_else(|| ConfigError::unknown_name("hardware key", s))
    }
}

/// Forms of extra discrimination. At most one is active per schema.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiscriminationMode {
    /// No additional discrimination.
    #[default]
    None,
    /// Include a hash of the entity's type.
    TypeHash,
    /// Include a hash of the entity's identity.
    DeclHash,
}

impl DiscriminationMode {
    pub const ALL: [DiscriminationMode; 3] = [
        DiscriminationMode::None,
        DiscriminationMode::TypeHash,
        DiscriminationMode::DeclHash,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DiscriminationMode::None => "none",
            DiscriminationMode::TypeHash => "type",
            DiscriminationMode::DeclHash => "decl",
        }
    }
}

impl fmt::Display for DiscriminationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DiscriminationMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.name() == s)
            .ok_or_else(|| ConfigError::unknown_name("discrimination mode", s))
    }
}
