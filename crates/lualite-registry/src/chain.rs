//! Ownership-adjustment chains.
//!
//! A [`Chain`] turns a view of an instance at one class level into a view
//! at a base-class level. Each [`Upcast`] step knows one derived type and
//! one of its direct bases; a chain applies its steps in order, so the
//! first step must accept the most-derived type.

use std::any::{Any, type_name};
use std::fmt;

/// Access to a base-class part embedded in `Self`.
///
/// Implement once per direct base declared with
/// [`ClassBuilder::inherits`](crate::ClassBuilder::inherits).
pub trait AsBase<B: 'static>: 'static {
    fn as_base(&self) -> &B;
    fn as_base_mut(&mut self) -> &mut B;
}

pub type ViewFn = for<'a> fn(&'a (dyn Any + 'static)) -> Option<&'a (dyn Any + 'static)>;
pub type ViewMutFn =
    for<'a> fn(&'a mut (dyn Any + 'static)) -> Option<&'a mut (dyn Any + 'static)>;

/// One derived-to-base step.
#[derive(Clone, Copy)]
pub struct Upcast {
    view: ViewFn,
    view_mut: ViewMutFn,
    from: &'static str,
    to: &'static str,
}

fn view<'a, D: AsBase<B>, B: 'static>(
    object: &'a (dyn Any + 'static),
) -> Option<&'a (dyn Any + 'static)> {
    object
        .downcast_ref::<D>()
        .map(|derived| derived.as_base() as &(dyn Any + 'static))
}

fn view_mut<'a, D: AsBase<B>, B: 'static>(
    object: &'a mut (dyn Any + 'static),
) -> Option<&'a mut (dyn Any + 'static)> {
    object
        .downcast_mut::<D>()
        .map(|derived| derived.as_base_mut() as &mut (dyn Any + 'static))
}

impl Upcast {
    /// Step from `D` to its base `B`.
    pub fn of<D: AsBase<B>, B: 'static>() -> Self {
        Self {
            view: view::<D, B>,
            view_mut: view_mut::<D, B>,
            from: type_name::<D>(),
            to: type_name::<B>(),
        }
    }

    pub fn from_type(&self) -> &'static str {
        self.from
    }

    pub fn to_type(&self) -> &'static str {
        self.to
    }
}

impl fmt::Debug for Upcast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Upcast({} -> {})", self.from, self.to)
    }
}

/// Ordered sequence of upcasts, most-derived step first.
#[derive(Debug, Clone, Default)]
pub struct Chain {
    steps: Vec<Upcast>,
}

impl Chain {
    /// The empty chain: members declared directly on the class.
    pub fn identity() -> Self {
        Self::default()
    }

    /// A chain that first applies `step`, then `self`.
    pub fn prepend(&self, step: Upcast) -> Self {
        let mut steps = Vec::with_capacity(self.steps.len() + 1);
        steps.push(step);
        steps.extend_from_slice(&self.steps);
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[Upcast] {
        &self.steps
    }

    /// Walk `object` down the chain. `None` if a step does not accept the
    /// view it receives.
    pub fn apply<'a>(&self, mut object: &'a (dyn Any + 'static)) -> Option<&'a (dyn Any + 'static)> {
        for step in &self.steps {
            object = (step.view)(object)?;
        }
        Some(object)
    }

    pub fn apply_mut<'a>(
        &self,
        mut object: &'a mut (dyn Any + 'static),
    ) -> Option<&'a mut (dyn Any + 'static)> {
        for step in &self.steps {
            object = (step.view_mut)(object)?;
        }
        Some(object)
    }
}
