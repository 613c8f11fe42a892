//! Listing options and capability flags.

use std::fmt;

use crate::error::{CollError, CollResult};

/// Direction of an ordered listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Backend order; no ordering clause is generated.
    #[default]
    None,
    /// Oldest first.
    Ascending,
    /// Newest first.
    Descending,
}

/// What an ordered listing sorts by.
///
/// Only [`SortTarget::CreateRevision`] and [`SortTarget::ModRevision`] are
/// backed by storage; the remaining targets exist so that requests written
/// against a key/value log can be expressed, and are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortTarget {
    /// Key order.
    #[default]
    Key,
    /// Per-key version counter.
    Version,
    /// When the row was created.
    CreateRevision,
    /// When the row was last modified.
    ModRevision,
    /// Stored value.
    Value,
}

impl fmt::Display for SortTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Key => "key",
            Self::Version => "version",
            Self::CreateRevision => "create-revision",
            Self::ModRevision => "mod-revision",
            Self::Value => "value",
        };
        f.write_str(name)
    }
}

/// A supported ordering after validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOrder {
    /// By creation time.
    Created {
        /// True for newest first.
        descending: bool,
    },
    /// By last modification time.
    Modified {
        /// True for newest first.
        descending: bool,
    },
}

impl RowOrder {
    /// Whether the ordering is newest first.
    #[must_use]
    pub const fn is_descending(self) -> bool {
        match self {
            Self::Created { descending } | Self::Modified { descending } => descending,
        }
    }
}

/// Options for `list`, `list_prefix` and `list_by_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListOptions {
    /// Sort direction.
    pub order: SortOrder,
    /// Sort key.
    pub target: SortTarget,
}

impl ListOptions {
    /// Creates options with an explicit order and target.
    #[must_use]
    pub const fn new(order: SortOrder, target: SortTarget) -> Self {
        Self { order, target }
    }

    /// Oldest-first by `target`.
    #[must_use]
    pub const fn ascending(target: SortTarget) -> Self {
        Self::new(SortOrder::Ascending, target)
    }

    /// Newest-first by `target`.
    #[must_use]
    pub const fn descending(target: SortTarget) -> Self {
        Self::new(SortOrder::Descending, target)
    }

    /// Validates the options, yielding `None` for unordered listings.
    pub fn ordering(&self) -> CollResult<Option<RowOrder>> {
        let descending = match self.order {
            SortOrder::None => return Ok(None),
            SortOrder::Ascending => false,
            SortOrder::Descending => true,
        };
        match self.target {
            SortTarget::CreateRevision => Ok(Some(RowOrder::Created { descending })),
            SortTarget::ModRevision => Ok(Some(RowOrder::Modified { descending })),
            other => Err(CollError::configuration(format!(
                "unsupported sort target: {other}"
            ))),
        }
    }
}

/// Optional capabilities a backend may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// `watch`, `watch_one` and `watch_by_index`.
    pub watch: bool,
    /// `claim`.
    pub claim: bool,
}

impl Capabilities {
    /// No optional capabilities.
    pub const NONE: Self = Self {
        watch: false,
        claim: false,
    };

    /// Every optional capability.
    pub const ALL: Self = Self {
        watch: true,
        claim: true,
    };
}
