//! Script value kinds and the small value types shared by every layer.

use std::ffi::c_void;
use std::fmt;

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Kind of a value held in a stack slot, as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ValueKind {
    Nil = 0,
    Boolean = 1,
    Integer = 2,
    Number = 3,
    String = 4,
    Table = 5,
    LightUserData = 6,
    Function = 7,
}

impl ValueKind {
    /// Name used in diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            ValueKind::Nil => "nil",
            ValueKind::Boolean => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Table => "table",
            ValueKind::LightUserData => "userdata",
            ValueKind::Function => "function",
        }
    }

    /// Integers and floats both count as numbers for numeric reads.
    pub const fn is_numeric(self) -> bool {
        matches!(self, ValueKind::Integer | ValueKind::Number)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque native address carried by a script value.
///
/// The host never dereferences it. Whoever pushes one is responsible for
/// keeping the referent alive for as long as script code may hand it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct LightUserData(pub *mut c_void);

impl LightUserData {
    /// The null pointer.
    pub const NULL: LightUserData = LightUserData(std::ptr::null_mut());

    pub fn from_ptr<T>(ptr: *mut T) -> Self {
        LightUserData(ptr.cast())
    }

    /// Address-only handle, used for identity keys.
    pub fn from_address(address: usize) -> Self {
        LightUserData(std::ptr::without_provenance_mut(address))
    }

    pub fn address(self) -> usize {
        self.0 as usize
    }

    pub fn cast<T>(self) -> *mut T {
        self.0.cast()
    }

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

/// Value-kind tag inferred from a property getter's return type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum PropertyKind {
    Boolean = 0,
    Integer = 1,
    Number = 2,
    String = 3,
    Other = 4,
}

bitflags! {
    /// Which directions a property supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PropertyAccess: u8 {
        const READ = 0b01;
        const WRITE = 0b10;
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
    }
}
