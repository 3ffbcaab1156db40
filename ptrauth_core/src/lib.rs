//! Pointer-authentication signing schemas and the per-compilation ABI
//! options built from them.
//!
//! A [`SigningSchema`] describes how one category of pointer is signed;
//! [`PointerAuthOptions`] collects one schema per category plus the
//! independent ABI toggles. Both are plain `Copy` data, frozen after the
//! [`OptionsBuilder`] produces them and safe to share across threads.

pub mod config;
pub mod hash;
pub mod keys;
pub mod material;
pub mod options;
pub mod schema;

pub use crate::config::{
    ConfigError, OptionsBuilder, PointerAuthFeatures, SigningTechnology, TargetArch,
};
pub use crate::hash::{stable_string_hash, string_discriminator};
pub use crate::keys::{DiscriminationMode, HardwareKeyId, SigningKind, SoftwareKeyId};
pub use crate::material::{EntityIdentity, MaterialError, SigningMaterial, blend_discriminator};
pub use crate::options::{PointerAuthCategory, PointerAuthFlag, PointerAuthOptions};
pub use crate::schema::{SchemaError, SigningSchema};
