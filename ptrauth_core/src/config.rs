//! Populates [`PointerAuthOptions`] from target defaults and driver flags.
//!
//! This is the only place that knows which schema each category gets. It
//! does not check whether a combination is legal for the target; explicit
//! overrides are applied exactly as given.

use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::keys::{DiscriminationMode, HardwareKeyId};
use crate::options::{PointerAuthCategory, PointerAuthFlag, PointerAuthOptions};
use crate::schema::SigningSchema;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown pointer-auth category '{0}'")]
    UnknownCategory(String),

    #[error("unknown pointer-auth flag '{0}'")]
    UnknownFlag(String),

    #[error("unknown driver flag '{0}'")]
    UnknownDriverFlag(String),

    #[error("unknown {vocabulary} '{name}'")]
    UnknownName {
        vocabulary: &'static str,
        name: String,
    },

    #[error("unknown target architecture '{0}'")]
    UnknownArch(String),
}

impl ConfigError {
    pub(crate) fn unknown_name(vocabulary: &'static str, name: &str) -> Self {
        ConfigError::UnknownName {
            vocabulary,
            name: name.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetArch {
    Arm64,
    Arm64e,
}

impl TargetArch {
    pub fn name(self) -> &'static str {
        match self {
            TargetArch::Arm64 => "arm64",
            TargetArch::Arm64e => "arm64e",
        }
    }
}

impl fmt::Display for TargetArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TargetArch {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "arm64" => Ok(TargetArch::Arm64),
            "arm64e" => Ok(TargetArch::Arm64e),
            other => Err(ConfigError::UnknownArch(other.to_string())),
        }
    }
}

/// Whether schemas installed by the builder use hardware keys or the
/// software emulation keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigningTechnology {
    #[default]
    Hardware,
    Software,
}

/// Language-level pointer-auth features, as toggled by `-fptrauth-*`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerAuthFeatures {
    pub intrinsics: bool,
    pub calls: bool,
    pub returns: bool,
    pub indirect_gotos: bool,
    pub auth_traps: bool,
    pub technology: SigningTechnology,
}

const FLAG_PREFIX: &str = "-fptrauth-";
const NEGATED_FLAG_PREFIX: &str = "-fno-ptrauth-";

impl PointerAuthFeatures {
    pub fn for_arch(arch: TargetArch) -> Self {
        match arch {
            TargetArch::Arm64 => PointerAuthFeatures::default(),
            TargetArch::Arm64e => PointerAuthFeatures {
                intrinsics: true,
                calls: true,
                returns: true,
                indirect_gotos: true,
                auth_traps: true,
                technology: SigningTechnology::Hardware,
            },
        }
    }

    pub fn with_technology(mut self, technology: SigningTechnology) -> Self {
        self.technology = technology;
        self
    }

    /// Applies one `-fptrauth-<feature>` or `-fno-ptrauth-<feature>` flag.
    pub fn apply_flag(&mut self, flag: &str) -> Result<(), ConfigError> {
        let (feature, enabled) = if let Some(rest) = flag.strip_prefix(NEGATED_FLAG_PREFIX) {
            (rest, false)
        } else if let Some(rest) = flag.strip_prefix(FLAG_PREFIX) {
            (rest, true)
        } else {
            return Err(ConfigError::UnknownDriverFlag(flag.to_string()));
        };
        let slot = match feature {
            "intrinsics" => &mut self.intrinsics,
            "calls" => &mut self.calls,
            "returns" => &mut self.returns,
            "indirect-gotos" => &mut self.indirect_gotos,
            "auth-traps" => &mut self.auth_traps,
            _ => return Err(ConfigError::UnknownDriverFlag(flag.to_string())),
        };
        *slot = enabled;
        Ok(())
    }

    /// The enabled features as the flags forwarded to the compiler proper.
    pub fn driver_flags(&self) -> Vec<&'static str> {
        [
            (self.returns, "-fptrauth-returns"),
            (self.intrinsics, "-fptrauth-intrinsics"),
            (self.calls, "-fptrauth-calls"),
            (self.indirect_gotos, "-fptrauth-indirect-gotos"),
            (self.auth_traps, "-fptrauth-auth-traps"),
        ]
        .into_iter()
        .filter_map(|(enabled, flag)| enabled.then_some(flag))
        .collect()
    }
}

/// Builds a frozen [`PointerAuthOptions`] from features plus explicit
/// per-category overrides.
#[derive(Clone, Debug, Default)]
pub struct OptionsBuilder {
    features: PointerAuthFeatures,
    schema_overrides: Vec<(PointerAuthCategory, SigningSchema)>,
    flag_overrides: Vec<(PointerAuthFlag, bool)>,
}

impl OptionsBuilder {
    pub fn new(features: PointerAuthFeatures) -> Self {
        Self {
            features,
            schema_overrides: Vec::new(),
            flag_overrides: Vec::new(),
        }
    }

    pub fn features(&self) -> &PointerAuthFeatures {
        &self.features
    }

    pub fn with_schema(mut self, category: PointerAuthCategory, schema: SigningSchema) -> Self {
        self.schema_overrides.push((category, schema));
        self
    }

    pub fn with_schema_named(
        self,
        category: &str,
        schema: SigningSchema,
    ) -> Result<Self, ConfigError> {
        let category = category.parse()?;
        Ok(self.with_schema(category, schema))
    }

    pub fn with_flag(mut self, flag: PointerAuthFlag, value: bool) -> Self {
        self.flag_overrides.push((flag, value));
        self
    }

    pub fn with_flag_named(self, flag: &str, value: bool) -> Result<Self, ConfigError> {
        let flag = flag.parse()?;
        Ok(self.with_flag(flag, value))
    }

    pub fn build(&self) -> PointerAuthOptions {
        let mut options = PointerAuthOptions::default();
        if self.features.calls {
            for category in PointerAuthCategory::ALL {
                let schema = standard_schema(category, self.features.technology);
                debug!("ptrauth default {category} = {schema}");
                options.set_schema(category, schema);
            }
            options.thunk_cxx_virtual_member_pointers = false;
        }
        options.return_addresses = self.features.returns;
        options.indirect_gotos = self.features.indirect_gotos;
        options.auth_traps = self.features.auth_traps;

        for &(category, schema) in &self.schema_overrides {
            debug!("ptrauth override {category} = {schema}");
            options.set_schema(category, schema);
        }
        for &(flag, value) in &self.flag_overrides {
            debug!("ptrauth override {flag} = {value}");
            options.set_flag(flag, value);
        }
        options
    }
}

/// The ABI installed when `-fptrauth-calls` is on.
fn standard_schema(category: PointerAuthCategory, technology: SigningTechnology) -> SigningSchema {
    use DiscriminationMode::{DeclHash, TypeHash};
    use PointerAuthCategory::*;
    const PLAIN: DiscriminationMode = DiscriminationMode::None;

    let (hardware_key, address_discriminated, discrimination) = match category {
        FunctionPointers => (HardwareKeyId::ASIA, false, PLAIN),
        BlockInvocationFunctionPointers
        | BlockHelperFunctionPointers
        | BlockByrefHelperFunctionPointers
        | ObjCMethodListFunctionPointers => (HardwareKeyId::ASIA, true, PLAIN),
        CXXVTablePointers | CXXVTTVTablePointers => (HardwareKeyId::ASDA, false, PLAIN),
        CXXVirtualFunctionPointers | CXXVirtualVariadicFunctionPointers => {
            (HardwareKeyId::ASIA, true, DeclHash)
        }
        CXXMemberFunctionPointers => (HardwareKeyId::ASIA, false, TypeHash),
    };
    match technology {
        SigningTechnology::Hardware => {
            SigningSchema::hardware(hardware_key, address_discriminated, discrimination)
        }
        SigningTechnology::Software => SigningSchema::software(
            category.default_software_key(),
            address_discriminated,
            discrimination,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{SigningKind, SoftwareKeyId};

    #[test]
    fn arm64_has_no_features() {
        let features = PointerAuthFeatures::for_arch(TargetArch::Arm64);
        assert!(features.driver_flags().is_empty());
        let options = OptionsBuilder::new(features).build();
        assert_eq!(options, PointerAuthOptions::default());
    }

    #[test]
    fn arm64e_defaults_enable_everything() {
        let features = PointerAuthFeatures::for_arch(TargetArch::Arm64e);
        assert_eq!(
            features.driver_flags(),
            vec![
                "-fptrauth-returns",
                "-fptrauth-intrinsics",
                "-fptrauth-calls",
                "-fptrauth-indirect-gotos",
                "-fptrauth-auth-traps",
            ]
        );
        let options = OptionsBuilder::new(features).build();
        assert!(options.return_addresses);
        assert!(options.indirect_gotos);
        assert!(options.auth_traps);
        assert!(!options.thunk_cxx_virtual_member_pointers);
        assert_eq!(options.enabled_categories().count(), 10);
    }

    #[test]
    fn negated_flag_drops_feature() {
        let mut features = PointerAuthFeatures::for_arch(TargetArch::Arm64e);
        features.apply_flag("-fno-ptrauth-calls").unwrap();
        assert_eq!(
            features.driver_flags(),
            vec![
                "-fptrauth-returns",
                "-fptrauth-intrinsics",
                "-fptrauth-indirect-gotos",
                "-fptrauth-auth-traps",
            ]
        );
        let options = OptionsBuilder::new(features).build();
        assert!(!options.any_enabled());
        assert!(options.return_addresses);
    }

    #[test]
    fn single_flag_on_plain_arm64() {
        let mut features = PointerAuthFeatures::for_arch(TargetArch::Arm64);
        features.apply_flag("-fptrauth-auth-traps").unwrap();
        assert_eq!(features.driver_flags(), vec!["-fptrauth-auth-traps"]);
    }

    #[test]
    fn unknown_flags_rejected() {
        let mut features = PointerAuthFeatures::default();
        assert_eq!(
            features.apply_flag("-fptrauth-everything"),
            Err(ConfigError::UnknownDriverFlag(
                "-fptrauth-everything".to_string()
            ))
        );
        assert_eq!(
            features.apply_flag("-mcpu=vortex"),
            Err(ConfigError::UnknownDriverFlag("-mcpu=vortex".to_string()))
        );
        let err = features.apply_flag("ReturnAddresses").unwrap_err();
        assert_eq!(err.to_string(), "unknown driver flag 'ReturnAddresses'");
        assert_eq!(features, PointerAuthFeatures::default());
    }

    #[test]
    fn hardware_standard_abi() {
        let options = OptionsBuilder::new(PointerAuthFeatures::for_arch(TargetArch::Arm64e)).build();
        assert_eq!(
            options.function_pointers,
            SigningSchema::hardware(HardwareKeyId::ASIA, false, DiscriminationMode::None)
        );
        assert_eq!(
            options.cxx_vtable_pointers,
            SigningSchema::hardware(HardwareKeyId::ASDA, false, DiscriminationMode::None)
        );
        assert_eq!(options.cxx_vtt_vtable_pointers, options.cxx_vtable_pointers);
        assert_eq!(
            options.cxx_virtual_function_pointers,
            SigningSchema::hardware(HardwareKeyId::ASIA, true, DiscriminationMode::DeclHash)
        );
        assert_eq!(
            options.cxx_member_function_pointers,
            SigningSchema::hardware(HardwareKeyId::ASIA, false, DiscriminationMode::TypeHash)
        );
        assert!(options.block_byref_helper_function_pointers.is_address_discriminated());
    }

    #[test]
    fn software_technology_uses_category_keys() {
        let features = PointerAuthFeatures::for_arch(TargetArch::Arm64e)
            .with_technology(SigningTechnology::Software);
        let options = OptionsBuilder::new(features).build();
        for (category, schema) in options.schemas() {
            assert_eq!(schema.kind(), SigningKind::SoftwareKey);
            assert_eq!(schema.software_key(), category.default_software_key());
        }
        assert_eq!(
            options.objc_method_list_function_pointers,
            SigningSchema::software(
                SoftwareKeyId::ObjCMethodListFunctionPointers,
                true,
                DiscriminationMode::None
            )
        );
    }

    #[test]
    fn overrides_apply_after_defaults() {
        let disabled_vtables = OptionsBuilder::new(PointerAuthFeatures::for_arch(TargetArch::Arm64e))
            .with_schema_named("CXXVTablePointers", SigningSchema::disabled())
            .unwrap()
            .with_flag_named("ThunkCXXVirtualMemberPointers", true)
            .unwrap()
            .build();
        assert!(!disabled_vtables.cxx_vtable_pointers.is_enabled());
        assert!(disabled_vtables.cxx_vtt_vtable_pointers.is_enabled());
        assert!(disabled_vtables.thunk_cxx_virtual_member_pointers);
    }

    #[test]
    fn builder_rejects_unknown_names() {
        let builder = OptionsBuilder::default();
        assert!(matches!(
            builder
                .clone()
                .with_schema_named("SwiftClassPointers", SigningSchema::disabled()),
            Err(ConfigError::UnknownCategory(_))
        ));
        let err = builder.with_flag_named("Returns", true).unwrap_err();
        assert_eq!(err, ConfigError::UnknownFlag("Returns".to_string()));
        assert_eq!(err.to_string(), "unknown pointer-auth flag 'Returns'");
    }

    #[test]
    fn builder_skips_legality_checks() {
        let options = OptionsBuilder::default()
            .with_flag(PointerAuthFlag::ThunkCXXVirtualMemberPointers, true)
            .build();
        assert!(options.thunk_cxx_virtual_member_pointers);
        assert!(!options.cxx_member_function_pointers.is_enabled());
    }

    #[test]
    fn arch_names_parse() {
        assert_eq!("arm64e".parse::<TargetArch>().unwrap(), TargetArch::Arm64e);
        assert_eq!(TargetArch::Arm64.to_string(), "arm64");
        assert_eq!(
            "x86_64".parse::<TargetArch>(),
            Err(ConfigError::UnknownArch("x86_64".to_string()))
        );
    }
}
