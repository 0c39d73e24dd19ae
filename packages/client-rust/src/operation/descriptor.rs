//! Typed operation identifiers.

use std::fmt;
use std::marker::PhantomData;

/// Identifies "an operation taking `I` and producing `O`".
///
/// Descriptors are plain constants declared next to their handler:
///
/// ```
/// use ledgerkit_client::OperationDescriptor;
///
/// pub const DOUBLE: OperationDescriptor<u64, u64> = OperationDescriptor::new("Double");
/// assert_eq!(DOUBLE.key(), "Double");
/// ```
///
/// The key must be unique within a client; the registry rejects a second
/// handler for the same key.
pub struct OperationDescriptor<I, O> {
    key: &'static str,
    _types: PhantomData<fn(I) -> O>,
}

impl<I, O> OperationDescriptor<I, O> {
    #[must_use]
    pub const fn new(key: &'static str) -> Self {
        Self {
            key,
            _types: PhantomData,
        }
    }

    #[must_use]
    pub const fn key(&self) -> &'static str {
        self.key
    }

    /// Pairs the descriptor with an input, ready to be run once.
    #[must_use]
    pub fn with(self, input: I) -> OperationInstance<I, O> {
        OperationInstance {
            descriptor: self,
            input,
        }
    }
}

// Manual impls: `I` and `O` need not be `Clone`/`Debug`.
impl<I, O> Clone for OperationDescriptor<I, O> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<I, O> Copy for OperationDescriptor<I, O> {}

impl<I, O> fmt::Debug for OperationDescriptor<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OperationDescriptor").field(&self.key).finish()
    }
}

impl<I, O> PartialEq for OperationDescriptor<I, O> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<I, O> Eq for OperationDescriptor<I, O> {}

/// A descriptor plus the input for one call. Consumed by the run.
pub struct OperationInstance<I, O> {
    descriptor: OperationDescriptor<I, O>,
    input: I,
}

impl<I, O> OperationInstance<I, O> {
    #[must_use]
    pub fn descriptor(&self) -> OperationDescriptor<I, O> {
        self.descriptor
    }

    #[must_use]
    pub fn key(&self) -> &'static str {
        self.descriptor.key
    }

    #[must_use]
    pub fn input(&self) -> &I {
        &self.input
    }

    #[must_use]
    pub fn into_parts(self) -> (OperationDescriptor<I, O>, I) {
        (self.descriptor, self.input)
    }
}

impl<I: fmt::Debug, O> fmt::Debug for OperationInstance<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationInstance")
            .field("key", &self.descriptor.key)
            .field("input", &self.input)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NotClone;

    const LEAF: OperationDescriptor<NotClone, NotClone> = OperationDescriptor::new("Leaf");

    #[test]
    fn descriptor_is_copy_without_bounds_on_types() {
        let a = LEAF;
        let b = a;
        assert_eq!(a, b);
        assert_eq!(format!("{a:?}"), "OperationDescriptor(\"Leaf\")");
    }

    #[test]
    fn instance_carries_key_and_input() {
        let op = OperationDescriptor::<u64, u64>::new("Double").with(21);
        assert_eq!(op.key(), "Double");
        assert_eq!(*op.input(), 21);
        let (descriptor, input) = op.into_parts();
        assert_eq!(descriptor.key(), "Double");
        assert_eq!(input, 21);
    }
}
