//! Binding-layer configuration.

use crate::error::NativeError;

/// What happens when script code touches a property key a class never declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UnknownKeyPolicy {
    /// Reads yield nil, writes are dropped.
    #[default]
    Ignore,
    /// Same as `Ignore`, with a warning through `log`.
    Warn,
    /// Raise [`NativeError::UnknownAccessor`].
    Error,
}

impl UnknownKeyPolicy {
    /// Apply the policy to one missed lookup.
    pub fn apply(self, access: &str, class: &str, key: &str) -> Result<(), NativeError> {
        match self {
            UnknownKeyPolicy::Ignore => Ok(()),
            UnknownKeyPolicy::Warn => {
                log::warn!("{access} of undeclared property '{key}' on '{class}'");
                Ok(())
            }
            UnknownKeyPolicy::Error => Err(NativeError::UnknownAccessor {
                class: class.to_owned(),
                key: key.to_owned(),
            }),
        }
    }
}

/// Settings shared by every binding registered into one state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindConfig {
    /// Policy for reads of undeclared properties.
    pub unknown_get: UnknownKeyPolicy,
    /// Policy for writes of undeclared properties.
    pub unknown_set: UnknownKeyPolicy,
    /// Field holding the class name in every class table.
    pub class_name_key: String,
    /// Exported name of constructors registered without one.
    pub default_constructor: String,
    /// Record-size hint for namespace and wrapper tables.
    pub table_hint: usize,
}

impl BindConfig {
    pub const DEFAULT_CLASS_NAME_KEY: &'static str = "__classname";
    pub const DEFAULT_CONSTRUCTOR: &'static str = "new";
    pub const DEFAULT_TABLE_HINT: usize = 10;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unknown_get(mut self, policy: UnknownKeyPolicy) -> Self {
        self.unknown_get = policy;
        self
    }

    pub fn with_unknown_set(mut self, policy: UnknownKeyPolicy) -> Self {
        self.unknown_set = policy;
        self
    }

    /// Use one policy for both directions.
    pub fn with_unknown_keys(self, policy: UnknownKeyPolicy) -> Self {
        self.with_unknown_get(policy).with_unknown_set(policy)
    }

    pub fn with_class_name_key(mut self, key: impl Into<String>) -> Self {
        self.class_name_key = key.into();
        self
    }

    pub fn with_default_constructor(mut self, name: impl Into<String>) -> Self {
        self.default_constructor = name.into();
        self
    }

    pub fn with_table_hint(mut self, hint: usize) -> Self {
        self.table_hint = hint;
        self
    }
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            unknown_get: UnknownKeyPolicy::Ignore,
            unknown_set: UnknownKeyPolicy::Ignore,
            class_name_key: Self::DEFAULT_CLASS_NAME_KEY.to_owned(),
            default_constructor: Self::DEFAULT_CONSTRUCTOR.to_owned(),
            table_hint: Self::DEFAULT_TABLE_HINT,
        }
    }
}
