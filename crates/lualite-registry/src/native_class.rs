//! Types that describe their own class binding.

use crate::class::ClassBuilder;

/// A native type with a canonical class binding.
///
/// Usually derived with `#[derive(NativeClass)]`, which exports annotated
/// fields as properties. Hand-written impls can add anything a
/// [`ClassBuilder`] supports.
///
/// ```ignore
/// impl NativeClass for Vec2 {
///     const CLASS_NAME: &'static str = "Vec2";
///
///     fn register(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
///         class
///             .default_constructor()
///             .property_rw("x", |v: &Vec2| v.x, |v: &mut Vec2, x: f64| v.x = x)
///     }
/// }
/// ```
pub trait NativeClass: Sized + 'static {
    const CLASS_NAME: &'static str;

    fn register(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
    }
}
