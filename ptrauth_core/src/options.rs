//! The per-compilation pointer-authentication ABI.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::ConfigError;
use crate::keys::SoftwareKeyId;
use crate::schema::SigningSchema;

/// One schema per recognised pointer category plus the independent ABI
/// toggles. Every slot starts disabled and every flag false.
///
/// No cross-field validation happens here: a thunk flag without a
/// member-function schema is stored as given.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointerAuthOptions {
    /// Do member function pointers to virtual functions need to be built
    /// as thunks?
    pub thunk_cxx_virtual_member_pointers: bool,
    /// Should return addresses be authenticated?
    pub return_addresses: bool,
    /// Do indirect goto label addresses need to be authenticated?
    pub indirect_gotos: bool,
    /// Do authentication failures cause a trap?
    pub auth_traps: bool,
    /// C function pointers.
    pub function_pointers: SigningSchema,
    /// Block invocation function pointers.
    pub block_invocation_function_pointers: SigningSchema,
    /// Block object copy/destroy function pointers.
    pub block_helper_function_pointers: SigningSchema,
    /// `__block` variable copy/destroy function pointers.
    pub block_byref_helper_function_pointers: SigningSchema,
    /// Objective-C method lists.
    pub objc_method_list_function_pointers: SigningSchema,
    /// C++ virtual table pointers as installed in a class instance.
    pub cxx_vtable_pointers: SigningSchema,
    /// C++ virtual table pointers as installed in a VTT.
    pub cxx_vtt_vtable_pointers: SigningSchema,
    /// Most C++ virtual function pointers, i.e. v-table entries.
    pub cxx_virtual_function_pointers: SigningSchema,
    /// Variadic C++ virtual function pointers.
    pub cxx_virtual_variadic_function_pointers: SigningSchema,
    /// C++ member function pointers.
    pub cxx_member_function_pointers: SigningSchema,
}

impl PointerAuthOptions {
    pub fn schema(&self, category: PointerAuthCategory) -> SigningSchema {
        match category {
            PointerAuthCategory::FunctionPointers => self.function_pointers,
            PointerAuthCategory::BlockInvocationFunctionPointers => {
                self.block_invocation_function_pointers
            }
            PointerAuthCategory::BlockHelperFunctionPointers => self.block_helper_function_pointers,
            PointerAuthCategory::BlockByrefHelperFunctionPointers => {
                self.block_byref_helper_function_pointers
            }
            PointerAuthCategory::ObjCMethodListFunctionPointers => {
                self.objc_method_list_function_pointers
            }
            PointerAuthCategory::CXXVTablePointers => self.cxx_vtable_pointers,
            PointerAuthCategory::CXXVTTVTablePointers => self.cxx_vtt_vtable_pointers,
            PointerAuthCategory::CXXVirtualFunctionPointers => self.cxx_virtual_function_pointers,
            PointerAuthCategory::CXXVirtualVariadicFunctionPointers => {
                self.cxx_virtual_variadic_function_pointers
            }
            PointerAuthCategory::CXXMemberFunctionPointers => self.cxx_member_function_pointers,
        }
    }

    pub fn schema_mut(&mut self, category: PointerAuthCategory) -> &mut SigningSchema {
        match category {
            PointerAuthCategory::FunctionPointers => &mut self.function_pointers,
            PointerAuthCategory::BlockInvocationFunctionPointers => {
                &mut self.block_invocation_function_pointers
            }
            PointerAuthCategory::BlockHelperFunctionPointers => {
                &mut self.block_helper_function_pointers
            }
            PointerAuthCategory::BlockByrefHelperFunctionPointers => {
                &mut self.block_byref_helper_function_pointers
            }
            PointerAuthCategory::ObjCMethodListFunctionPointers => {
                &mut self.objc_method_list_function_pointers
            }
            PointerAuthCategory::CXXVTablePointers => &mut self.cxx_vtable_pointers,
            PointerAuthCategory::CXXVTTVTablePointers => &mut self.cxx_vtt_vtable_pointers,
            PointerAuthCategory::CXXVirtualFunctionPointers => {
                &mut self.cxx_virtual_function_pointers
            }
            PointerAuthCategory::CXXVirtualVariadicFunctionPointers => {
                &mut self.cxx_virtual_variadic_function_pointers
            }
            PointerAuthCategory::CXXMemberFunctionPointers => &mut self.cxx_member_function_pointers,
        }
    }

    pub fn set_schema(&mut self, category: PointerAuthCategory, schema: SigningSchema) {
        *self.schema_mut(category) = schema;
    }

    /// All slots in [`PointerAuthCategory::ALL`] order.
    pub fn schemas(&self) -> impl Iterator<Item = (PointerAuthCategory, SigningSchema)> + '_ {
        PointerAuthCategory::ALL
            .into_iter()
            .map(move |category| (category, self.schema(category)))
    }

    pub fn enabled_categories(&self) -> impl Iterator<Item = PointerAuthCategory> + '_ {
        self.schemas()
            .filter(|(_, schema)| schema.is_enabled())
            .map(|(category, _)| category)
    }

    pub fn any_enabled(&self) -> bool {
        self.enabled_categories().next().is_some()
    }

    pub fn flag(&self, flag: PointerAuthFlag) -> bool {
        match flag {
            PointerAuthFlag::ThunkCXXVirtualMemberPointers => self.thunk_cxx_virtual_member_pointers,
            PointerAuthFlag::ReturnAddresses => self.return_addresses,
            PointerAuthFlag::IndirectGotos => self.indirect_gotos,
            PointerAuthFlag::AuthTraps => self.auth_traps,
        }
    }

    pub fn set_flag(&mut self, flag: PointerAuthFlag, value: bool) {
        let slot = match flag {
            PointerAuthFlag::ThunkCXXVirtualMemberPointers => {
                &mut self.thunk_cxx_virtual_member_pointers
            }
            PointerAuthFlag::ReturnAddresses => &mut self.return_addresses,
            PointerAuthFlag::IndirectGotos => &mut self.indirect_gotos,
            PointerAuthFlag::AuthTraps => &mut self.auth_traps,
        };
        *slot = value;
    }
}

/// The closed set of pointer categories with their own schema slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PointerAuthCategory {
    FunctionPointers,
    BlockInvocationFunctionPointers,
    BlockHelperFunctionPointers,
    BlockByrefHelperFunctionPointers,
    ObjCMethodListFunctionPointers,
    CXXVTablePointers,
    CXXVTTVTablePointers,
    CXXVirtualFunctionPointers,
    CXXVirtualVariadicFunctionPointers,
    CXXMemberFunctionPointers,
}

impl PointerAuthCategory {
    pub const ALL: [PointerAuthCategory; 10] = [
        PointerAuthCategory::FunctionPointers,
        PointerAuthCategory::BlockInvocationFunctionPointers,
        PointerAuthCategory::BlockHelperFunctionPointers,
        PointerAuthCategory::BlockByrefHelperFunctionPointers,
        PointerAuthCategory::ObjCMethodListFunctionPointers,
        PointerAuthCategory::CXXVTablePointers,
        PointerAuthCategory::CXXVTTVTablePointers,
        PointerAuthCategory::CXXVirtualFunctionPointers,
        PointerAuthCategory::CXXVirtualVariadicFunctionPointers,
        PointerAuthCategory::CXXMemberFunctionPointers,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PointerAuthCategory::FunctionPointers => "FunctionPointers",
            PointerAuthCategory::BlockInvocationFunctionPointers => {
                "BlockInvocationFunctionPointers"
            }
            PointerAuthCategory::BlockHelperFunctionPointers => "BlockHelperFunctionPointers",
            PointerAuthCategory::BlockByrefHelperFunctionPointers => {
                "BlockByrefHelperFunctionPointers"
            }
            PointerAuthCategory::ObjCMethodListFunctionPointers => "ObjCMethodListFunctionPointers",
            PointerAuthCategory::CXXVTablePointers => "CXXVTablePointers",
            PointerAuthCategory::CXXVTTVTablePointers => "CXXVTTVTablePointers",
            PointerAuthCategory::CXXVirtualFunctionPointers => "CXXVirtualFunctionPointers",
            PointerAuthCategory::CXXVirtualVariadicFunctionPointers => {
                "CXXVirtualVariadicFunctionPointers"
            }
            PointerAuthCategory::CXXMemberFunctionPointers => "CXXMemberFunctionPointers",
        }
    }

    /// The software key conventionally used for this category. Categories
    /// that share a signing convention (VTT entries, byref helpers, variadic
    /// virtual functions) share their sibling's key.
    pub fn default_software_key(self) -> SoftwareKeyId {
        match self {
            PointerAuthCategory::FunctionPointers => SoftwareKeyId::FunctionPointers,
            PointerAuthCategory::BlockInvocationFunctionPointers => {
                SoftwareKeyId::BlockInvocationFunctionPointers
            }
            PointerAuthCategory::BlockHelperFunctionPointers
            | PointerAuthCategory::BlockByrefHelperFunctionPointers => {
                SoftwareKeyId::BlockHelperFunctionPointers
            }
            PointerAuthCategory::ObjCMethodListFunctionPointers => {
                SoftwareKeyId::ObjCMethodListFunctionPointers
            }
            PointerAuthCategory::CXXVTablePointers | PointerAuthCategory::CXXVTTVTablePointers => {
                SoftwareKeyId::CXXVTablePointers
            }
            PointerAuthCategory::CXXVirtualFunctionPointers
            | PointerAuthCategory::CXXVirtualVariadicFunctionPointers => {
                SoftwareKeyId::CXXVirtualFunctionPointers
            }
            PointerAuthCategory::CXXMemberFunctionPointers => {
                SoftwareKeyId::CXXMemberFunctionPointers
            }
        }
    }
}

impl fmt::Display for PointerAuthCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PointerAuthCategory {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.name() == s)
            .ok_or_else(|| ConfigError::UnknownCategory(s.to_string()))
    }
}

/// The closed set of boolean ABI toggles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointerAuthFlag {
    ThunkCXXVirtualMemberPointers,
    ReturnAddresses,
    IndirectGotos,
    AuthTraps,
}

impl PointerAuthFlag {
    pub const ALL: [PointerAuthFlag; 4] = [
        PointerAuthFlag::ThunkCXXVirtualMemberPointers,
        PointerAuthFlag::ReturnAddresses,
        PointerAuthFlag::IndirectGotos,
        PointerAuthFlag::AuthTraps,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PointerAuthFlag::ThunkCXXVirtualMemberPointers => "ThunkCXXVirtualMemberPointers",
            PointerAuthFlag::ReturnAddresses => "ReturnAddresses",
            PointerAuthFlag::IndirectGotos => "IndirectGotos",
            PointerAuthFlag::AuthTraps => "AuthTraps",
        }
    }
}

impl fmt::Display for PointerAuthFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PointerAuthFlag {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|flag| flag.name() == s)
            .ok_or_else(|| ConfigError::UnknownFlag(s.to_string()))
    }
}
