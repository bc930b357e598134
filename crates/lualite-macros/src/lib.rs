//! lualite proc macros
//!
//! # Macros
//!
//! - `#[derive(NativeClass)]` - Implement `NativeClass`, exporting annotated
//!   fields as properties
//!
//! # Example
//!
//! ```ignore
//! use lualite_macros::NativeClass;
//!
//! #[derive(Default, NativeClass)]
//! #[lualite(name = "Player")]
//! pub struct Player {
//!     #[lualite(get, set)]
//!     pub health: i32,
//! }
//! ```

use proc_macro::TokenStream;

mod attrs;
mod derive_native_class;

/// Derive `NativeClass` for a struct.
///
/// # Attributes
///
/// - `#[lualite(name = "...")]` - Override the class name
///
/// # Field Attributes
///
/// - `#[lualite(get)]` - Read-only property (field type must be `Clone`)
/// - `#[lualite(get, set)]` - Read-write property
/// - `#[lualite(name = "...")]` - Override the property name
///
/// Constructors, methods and bases are not derived; add them with a
/// `ClassBuilder` after `ClassBuilder::native()`.
#[proc_macro_derive(NativeClass, attributes(lualite))]
pub fn derive_native_class(input: TokenStream) -> TokenStream {
    derive_native_class::derive_native_class_impl(input)
}
