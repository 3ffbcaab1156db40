//! Signature inputs derived from a schema at a single use site.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hash::string_discriminator;
use crate::keys::{DiscriminationMode, SigningKind};
use crate::schema::{SchemaError, SigningSchema};

/// Bits of a pointer left untouched when an extra discriminator is blended in.
pub const BLEND_ADDRESS_MASK: u64 = 0x0000_FFFF_FFFF_FFFF;
const BLEND_SHIFT: u32 = 48;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum MaterialError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("schema {schema} is address discriminated but no storage address was given")]
    MissingStorageAddress { schema: SigningSchema },
}

/// Identity strings of the entity whose pointer is being signed, typically
/// the mangled type and the mangled declaration name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntityIdentity<'a> {
    pub type_identity: &'a str,
    pub decl_identity: &'a str,
}

impl<'a> EntityIdentity<'a> {
    pub const fn new(type_identity: &'a str, decl_identity: &'a str) -> Self {
        Self {
            type_identity,
            decl_identity,
        }
    }
}

/// Operands of one sign or auth operation. `kind` tells which key
/// vocabulary `key` indexes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SigningMaterial {
    pub kind: SigningKind,
    pub key: u8,
    pub storage_address: Option<u64>,
    pub extra_discriminator: u16,
}

impl SigningMaterial {
    /// Fails for a disabled schema, and for an address-discriminated schema
    /// without a storage address. A storage address passed for a schema
    /// that is not address discriminated is ignored.
    pub fn new(
        schema: &SigningSchema,
        storage_address: Option<u64>,
        entity: EntityIdentity<'_>,
    ) -> Result<Self, MaterialError> {
        let key = schema.try_raw_key_index()?;
        let storage_address = match (schema.try_is_address_discriminated()?, storage_address) {
            (true, Some(address)) => Some(address),
            (true, None) => return Err(MaterialError::MissingStorageAddress { schema: *schema }),
            (false, _) => None,
        };
        let extra_discriminator = match schema.try_discrimination_mode()? {
            DiscriminationMode::None => 0,
            DiscriminationMode::TypeHash => string_discriminator(entity.type_identity),
            DiscriminationMode::DeclHash => string_discriminator(entity.decl_identity),
        };
        Ok(Self {
            kind: schema.kind(),
            key,
            storage_address,
            extra_discriminator,
        })
    }

    /// The single 64-bit discriminator operand.
    pub fn discriminator(&self) -> u64 {
        match (self.storage_address, self.extra_discriminator) {
            (Some(address), 0) => address,
            (Some(address), extra) => blend_discriminator(address, extra),
            (None, extra) => u64::from(extra),
        }
    }
}

/// Replaces the top 16 bits of `address` with `extra`.
pub fn blend_discriminator(address: u64, extra: u16) -> u64 {
    (address & BLEND_ADDRESS_MASK) | (u64::from(extra) << BLEND_SHIFT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{HardwareKeyId, SoftwareKeyId};

    const ENTITY: EntityIdentity<'static> = EntityIdentity::new("FvPvE", "_ZN4Base3runEv");

    #[test]
    fn disabled_schema_has_no_material() {
        assert_eq!(
            SigningMaterial::new(&SigningSchema::disabled(), Some(0x1000), ENTITY),
            Err(MaterialError::Schema(SchemaError::Disabled {
                accessor: "raw_key_index"
            }))
        );
    }

    #[test]
    fn address_discriminated_schema_requires_storage_address() {
        let schema =
            SigningSchema::hardware(HardwareKeyId::ASIA, true, DiscriminationMode::DeclHash);
        let err = SigningMaterial::new(&schema, None, ENTITY).unwrap_err();
        assert_eq!(err, MaterialError::MissingStorageAddress { schema });
        assert!(err.to_string().contains("no storage address"));

        let soft = SigningSchema::software(
            SoftwareKeyId::BlockHelperFunctionPointers,
            true,
            DiscriminationMode::None,
        );
        assert!(matches!(
            SigningMaterial::new(&soft, None, ENTITY),
            Err(MaterialError::MissingStorageAddress { .. })
        ));
    }

    #[test]
    fn material_distinguishes_key_vocabularies() {
        let soft = SigningSchema::software(
            SoftwareKeyId::FunctionPointers,
            false,
            DiscriminationMode::None,
        );
        let hard = SigningSchema::hardware(HardwareKeyId::ASIA, false, DiscriminationMode::None);
        let soft_material = SigningMaterial::new(&soft, None, ENTITY).unwrap();
        let hard_material = SigningMaterial::new(&hard, None, ENTITY).unwrap();
        assert_eq!(soft_material.key, hard_material.key);
        assert_eq!(soft_material.kind, SigningKind::SoftwareKey);
        assert_eq!(hard_material.kind, SigningKind::HardwareKey);
        assert_ne!(soft_material, hard_material);
    }

    #[test]
    fn plain_schema_discriminates_with_zero() {
        let schema = SigningSchema::hardware(HardwareKeyId::ASIA, false, DiscriminationMode::None);
        let material = SigningMaterial::new(&schema, Some(0x1000), ENTITY).unwrap();
        assert_eq!(material.key, 0);
        assert_eq!(material.storage_address, None);
        assert_eq!(material.discriminator(), 0);
    }

    #[test]
    fn address_only_uses_address() {
        let schema = SigningSchema::hardware(HardwareKeyId::ASDA, true, DiscriminationMode::None);
        let material = SigningMaterial::new(&schema, Some(0x7fff_0000_1230), ENTITY).unwrap();
        assert_eq!(material.kind, SigningKind::HardwareKey);
        assert_eq!(material.key, 2);
        assert_eq!(material.discriminator(), 0x7fff_0000_1230);
    }

    #[test]
    fn extra_only_uses_hash() {
        let schema = SigningSchema::software(
            SoftwareKeyId::CXXMemberFunctionPointers,
            false,
            DiscriminationMode::TypeHash,
        );
        let material = SigningMaterial::new(&schema, None, ENTITY).unwrap();
        assert_eq!(material.key, 6);
        assert_eq!(
            material.extra_discriminator,
            string_discriminator(ENTITY.type_identity)
        );
        assert_eq!(material.discriminator(), u64::from(material.extra_discriminator));
    }

    #[test]
    fn decl_hash_blends_with_address() {
        let schema =
            SigningSchema::hardware(HardwareKeyId::ASIA, true, DiscriminationMode::DeclHash);
        let address = 0x0000_1234_5678_9abc;
        let material = SigningMaterial::new(&schema, Some(address), ENTITY).unwrap();
        let extra = string_discriminator(ENTITY.decl_identity);
        assert_eq!(material.extra_discriminator, extra);
        assert_eq!(material.discriminator(), blend_discriminator(address, extra));
        assert_eq!(material.discriminator() >> 48, u64::from(extra));
    }

    #[test]
    fn blend_keeps_low_address_bits() {
        let blended = blend_discriminator(0xffff_aaaa_bbbb_cccc, 0x1234);
        assert_eq!(blended, 0x1234_aaaa_bbbb_cccc);
        assert_eq!(blended & BLEND_ADDRESS_MASK, 0xaaaa_bbbb_cccc);
    }
}
