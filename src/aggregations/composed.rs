//! Validation adapter around every value object held in an aggregation cache.
//!
//! A [`Composed`] value starts out mutable in the validation sense: each
//! validity query runs the type's validations again. The write path runs one
//! validation pass and then freezes the value; from then on the outcome of that
//! pass is the answer to every validity query.

use std::cell::{Ref, RefCell};
use std::fmt;
use std::ops::Deref;

use super::value_object::{ValidationErrors, ValueObject};

#[derive(Debug, Default)]
struct ValidationState {
    frozen: bool,
    valid: Option<bool>,
    errors: ValidationErrors,
    context: Option<String>,
}

pub struct Composed<V> {
    value: V,
    state: RefCell<ValidationState>,
}

/// Puts the previous validation context back when dropped, including on unwind.
struct ContextGuard<'a> {
    state: &'a RefCell<ValidationState>,
    previous: Option<String>,
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        if !state.frozen {
            state.context = self.previous.take();
        }
    }
}

impl<V: ValueObject> Composed<V> {
    pub fn new(value: V) -> Self {
        Self {
            value,
            state: RefCell::new(ValidationState::default()),
        }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn is_validatable(&self) -> bool {
        self.value.validation().is_some()
    }

    pub fn is_frozen(&self) -> bool {
        self.state.borrow().frozen
    }

    /// Runs one validation pass under `context` and records the outcome.
    ///
    /// Frozen values are not revalidated; the recorded outcome is returned.
    pub fn validate(&self, context: Option<&str>) -> bool {
        let Some(validation) = self.value.validation() else {
            return true;
        };

        {
            let state = self.state.borrow();
            if state.frozen {
                return state.valid.unwrap_or(true);
            }
        }

        let previous = std::mem::replace(
            &mut self.state.borrow_mut().context,
            context.map(str::to_string),
        );
        let _guard = ContextGuard {
            state: &self.state,
            previous,
        };

        let mut errors = ValidationErrors::new();
        validation.validate(context, &mut errors);
        let valid = errors.is_empty();

        let mut state = self.state.borrow_mut();
        state.errors = errors;
        state.valid = Some(valid);
        valid
    }

    /// Runs one validation pass under the current context and marks the value
    /// immutable. Validity queries after this point return that outcome.
    pub fn freeze(&self) {
        let context = self.validation_context();
        self.freeze_in(context.as_deref());
    }

    /// Like [`freeze`](Self::freeze), validating under `context`.
    pub fn freeze_in(&self, context: Option<&str>) {
        if self.is_frozen() {
            return;
        }
        self.validate(context);
        self.state.borrow_mut().frozen = true;
    }

    /// Validity under the current context.
    pub fn is_valid(&self) -> bool {
        let context = self.validation_context();
        self.is_valid_in(context.as_deref())
    }

    pub fn is_valid_in(&self, context: Option<&str>) -> bool {
        if !self.is_validatable() {
            return true;
        }
        {
            let state = self.state.borrow();
            if state.frozen {
                return state.valid.unwrap_or(true);
            }
        }
        self.validate(context)
    }

    /// Errors recorded by the last validation pass.
    pub fn errors(&self) -> Ref<'_, ValidationErrors> {
        Ref::map(self.state.borrow(), |state| &state.errors)
    }

    /// Context of the running pass, otherwise the one set with
    /// [`set_validation_context`](Self::set_validation_context).
    pub fn validation_context(&self) -> Option<String> {
        self.state.borrow().context.clone()
    }

    /// Sets the context used by passes that do not name one. Ignored once frozen.
    pub fn set_validation_context(&self, context: Option<&str>) {
        let mut state = self.state.borrow_mut();
        if !state.frozen {
            state.context = context.map(str::to_string);
        }
    }
}

impl<V> Deref for Composed<V> {
    type Target = V;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<V: PartialEq> PartialEq for Composed<V> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<V: PartialEq> PartialEq<V> for Composed<V> {
    fn eq(&self, other: &V) -> bool {
        self.value == *other
    }
}

impl<V: fmt::Debug> fmt::Debug for Composed<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Composed")
            .field("value", &self.value)
            .field("frozen", &state.frozen)
            .field("valid", &state.valid)
            .finish()
    }
}
