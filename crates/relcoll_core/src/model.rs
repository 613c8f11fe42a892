//! Model descriptors.
//!
//! A model is the row-side representation of a record type. It names its
//! table, declares its fields once, and converts between itself, a
//! [`Row`], and the opaque wire message callers exchange with views.
//!
//! ```rust,ignore
//! use relcoll_core::{fields, CollResult, FieldSpec, Model, Row};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct File {
//!     name: String,
//!     size: i64,
//! }
//!
//! impl Model for File {
//!     type Message = Self;
//!
//!     fn table_name() -> &'static str {
//!         "File"
//!     }
//!
//!     fn fields() -> Vec<FieldSpec> {
//!         fields![Name: String => primary_key, Size: i64]
//!     }
//!
//!     fn to_row(&self) -> Row {
//!         Row::new().with("Name", &self.name).with("Size", self.size)
//!     }
//!
//!     fn from_row(row: &Row) -> CollResult<Self> {
//!         Ok(Self { name: row.text("Name")?, size: row.integer("Size")? })
//!     }
//!
//!     fn write_message(&self) -> CollResult<Self> {
//!         Ok(self.clone())
//!     }
//!
//!     fn load_message(message: &Self) -> CollResult<Self> {
//!         Ok(message.clone())
//!     }
//! }
//! ```

use relcoll_codec::Row;

use crate::error::CollResult;

/// Declaration of one model field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// In-memory field name. Also the key used in the model's [`Row`].
    pub name: &'static str,
    /// Textual name of the declared Rust type.
    pub rust_type: &'static str,
    /// Whether this field is the primary key.
    pub primary_key: bool,
    /// Whether this field carries a secondary index.
    pub indexed: bool,
}

impl FieldSpec {
    /// Declares a plain field.
    #[must_use]
    pub const fn new(name: &'static str, rust_type: &'static str) -> Self {
        Self {
            name,
            rust_type,
            primary_key: false,
            indexed: false,
        }
    }

    /// Marks the field as the primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Marks the field as participating in a secondary index.
    #[must_use]
    pub const fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }
}

/// Declares a model's field list.
///
/// Each entry is `Name: Type`, optionally followed by `=> flag, ...` where
/// the flags are [`FieldSpec`] builder methods (`primary_key`, `indexed`).
///
/// ```
/// use relcoll_core::fields;
///
/// let specs = fields![Name: String => primary_key, Owner: String => indexed, Size: i64];
/// assert_eq!(specs.len(), 3);
/// assert!(specs[0].primary_key);
/// assert!(specs[1].indexed);
/// assert_eq!(specs[2].rust_type, "i64");
/// ```
#[macro_export]
macro_rules! fields {
    (@field [$($out:expr),*]) => {
        ::std::vec::Vec::<$crate::FieldSpec>::from([$($out),*])
    };
    (@field [$($out:expr),*] $name:ident : $ty:ty => $($rest:tt)+) => {
        $crate::fields!(
            @flag [$($out),*] [$crate::FieldSpec::new(stringify!($name), stringify!($ty))] $($rest)+
        )
    };
    (@field [$($out:expr),*] $name:ident : $ty:ty $(, $($rest:tt)*)?) => {
        $crate::fields!(
            @field [$($out,)* $crate::FieldSpec::new(stringify!($name), stringify!($ty))] $($($rest)*)?
        )
    };
    // An ident followed by `:` after a flag starts the next field.
    (@flag [$($out:expr),*] [$spec:expr] $flag:ident , $next:ident : $($rest:tt)+) => {
        $crate::fields!(@field [$($out,)* $spec.$flag()] $next : $($rest)+)
    };
    (@flag [$($out:expr),*] [$spec:expr] $flag:ident $(,)?) => {
        $crate::fields!(@field [$($out,)* $spec.$flag()])
    };
    (@flag [$($out:expr),*] [$spec:expr] $flag:ident , $($rest:tt)+) => {
        $crate::fields!(@flag [$($out),*] [$spec.$flag()] $($rest)+)
    };
    ($($body:tt)*) => {
        $crate::fields!(@field [] $($body)*)
    };
}

/// A record type stored in a collection.
///
/// `Message` is the wire type callers hand to and receive from views; the
/// collection never looks inside it.
pub trait Model: Clone + Send + Sync + Sized + 'static {
    /// Wire message this model converts to and from.
    type Message: Clone + Send + 'static;

    /// Table name. Stored lower-cased.
    fn table_name() -> &'static str;

    /// Field declarations in definition order.
    fn fields() -> Vec<FieldSpec>;

    /// Flattens the model into a row keyed by field name.
    fn to_row(&self) -> Row;

    /// Rebuilds the model from a row keyed by field name.
    fn from_row(row: &Row) -> CollResult<Self>;

    /// Writes this model into a wire message.
    fn write_message(&self) -> CollResult<Self::Message>;

    /// Loads a model from a wire message.
    fn load_message(message: &Self::Message) -> CollResult<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macro_records_flags_and_types() {
        let specs = fields![
            Id: String => primary_key,
            Owner: String => indexed,
            Due: DateTime<Utc>,
            Done: bool,
        ];
        assert_eq!(
            specs[0],
            FieldSpec {
                name: "Id",
                rust_type: "String",
                primary_key: true,
                indexed: false,
            }
        );
        assert!(specs[1].indexed && !specs[1].primary_key);
        assert_eq!(specs[2].name, "Due");
        assert!(specs[2].rust_type.contains("DateTime"));
        assert_eq!(specs[3].rust_type, "bool");
    }

    #[test]
    fn macro_separates_flags_from_following_fields() {
        let specs = fields![Name: String => primary_key, Size: i64];
        assert_eq!(specs.len(), 2);
        assert!(specs[0].primary_key);
        assert_eq!(specs[1].name, "Size");
        assert!(!specs[1].primary_key && !specs[1].indexed);

        let specs = fields![Key: String => primary_key, indexed, Tags: Vec<String> => indexed];
        assert_eq!(specs.len(), 2);
        assert!(specs[0].primary_key && specs[0].indexed);
        assert_eq!(specs[1].rust_type, "Vec<String>");
        assert!(specs[1].indexed);

        assert!(fields![].is_empty());
    }

    #[test]
    fn builder_chains() {
        let spec = FieldSpec::new("Key", "String").primary_key().indexed();
        assert!(spec.primary_key);
        assert!(spec.indexed);
    }
}
