/// Declares a struct and implements [`ValueObject`](crate::aggregations::ValueObject) for it.
///
/// Field order is the order of the generated positional constructor. Every
/// field type must implement [`ColumnValue`](crate::core::ColumnValue).
/// Prefix `struct` with `validated` to opt into the type's
/// [`Validate`](crate::aggregations::Validate) implementation, which must be
/// written separately.
///
/// ```
/// use memodb_aggregations::aggregations::{Validate, ValidationErrors, ValueObject, presence_of};
/// use memodb_aggregations::value_object;
///
/// value_object! {
///     #[derive(Debug, Clone, PartialEq)]
///     validated pub struct Address {
///         pub street: Option<String>,
///         pub city: Option<String>,
///     }
/// }
///
/// impl Validate for Address {
///     fn validate(&self, _context: Option<&str>, errors: &mut ValidationErrors) {
///         presence_of(self, &["street", "city"], errors);
///     }
/// }
///
/// assert_eq!(Address::field_names(), &["street", "city"]);
/// assert!(Address::new(None, Some("Atlanta".into())).validation().is_some());
/// ```
#[macro_export]
macro_rules! value_object {
    (@validation) => {};
    (@validation validated) => {
        fn validation(&self) -> Option<&dyn $crate::aggregations::Validate> {
            Some(self)
        }
    };
    (
        @impl [$($validated:ident)?]
        $(#[$meta:meta])*
        $vis:vis $name:ident {
            $($(#[$field_meta:meta])* $field_vis:vis $field:ident : $field_ty:ty),+
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( $(#[$field_meta])* $field_vis $field: $field_ty, )+
        }

        impl $name {
            #[allow(clippy::too_many_arguments)]
            pub fn new($($field: $field_ty),+) -> Self {
                Self { $($field),+ }
            }
        }

        impl $crate::aggregations::ValueObject for $name {
            const TYPE_NAME: &'static str = stringify!($name);

            fn field_names() -> &'static [&'static str] {
                &[$(stringify!($field)),+]
            }

            fn field(&self, name: &str) -> Option<$crate::core::Value> {
                match name {
                    $(
                        stringify!($field) => Some($crate::core::ColumnValue::into_value(
                            ::std::clone::Clone::clone(&self.$field),
                        )),
                    )+
                    _ => None,
                }
            }

            fn from_fields(values: Vec<$crate::core::Value>) -> $crate::core::Result<Self> {
                let expected = <Self as $crate::aggregations::ValueObject>::field_names().len();
                if values.len() != expected {
                    return Err($crate::core::AggregateError::Construction(format!(
                        "{} takes {} values, got {}",
                        stringify!($name),
                        expected,
                        values.len()
                    )));
                }
                let mut values = values.into_iter();
                Ok(Self {
                    $(
                        $field: <$field_ty as $crate::core::ColumnValue>::from_value(
                            values.next().unwrap_or_default(),
                        )?,
                    )+
                })
            }

            $crate::value_object!(@validation $($validated)?);
        }
    };
    (
        $(#[$meta:meta])*
        validated $vis:vis struct $name:ident {
            $($(#[$field_meta:meta])* $field_vis:vis $field:ident : $field_ty:ty),+ $(,)?
        }
    ) => {
        $crate::value_object!(
            @impl [validated]
            $(#[$meta])*
            $vis $name { $($(#[$field_meta])* $field_vis $field : $field_ty),+ }
        );
    };
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $($(#[$field_meta:meta])* $field_vis:vis $field:ident : $field_ty:ty),+ $(,)?
        }
    ) => {
        $crate::value_object!(
            @impl []
            $(#[$meta])*
            $vis $name { $($(#[$field_meta])* $field_vis $field : $field_ty),+ }
        );
    };
}
