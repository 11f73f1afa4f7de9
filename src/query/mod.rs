//! Query-side types: match classification, sort ordering, and the scoped
//! file-map cache.

mod scope;

pub use scope::QueryScope;

use crate::types::Location;
use crate::symbol::SymbolKind;
use bitflags::bitflags;
use std::path::PathBuf;

/// How a symbol name matched the query pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Exact,
    Wildcard,
    StartsWith,
}

bitflags! {
    /// Options for name queries.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct QueryFlags: u8 {
        /// Also report names the pattern is a prefix of.
        const STARTS_WITH = 1 << 0;
        /// Case-insensitive comparison.
        const CASE_INSENSITIVE = 1 << 1;
    }
}

bitflags! {
    /// Options for [`sort_symbols`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SortFlags: u8 {
        const REVERSE = 1 << 0;
        /// Compare file names only, ignoring directories.
        const STRIP_PATH = 1 << 1;
    }
}

/// A query result row, carrying enough to order and print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortedSymbol {
    pub location: Location,
    pub kind: SymbolKind,
    pub is_definition: bool,
    pub path: PathBuf,
}

/// Order: kind priority, then definitions first, then path, line, column.
pub fn sort_symbols(mut symbols: Vec<SortedSymbol>, flags: SortFlags) -> Vec<SortedSymbol> {
    symbols.sort_by(|a, b| {
        let path_a = sort_path(a, flags);
        let path_b = sort_path(b, flags);
        (a.kind.priority(), !a.is_definition, path_a, a.location.line, a.location.column).cmp(&(
            b.kind.priority(),
            !b.is_definition,
            path_b,
            b.location.line,
            b.location.column,
        ))
    });
    if flags.contains(SortFlags::REVERSE) {
        symbols.reverse();
    }
    symbols
}

fn sort_path(symbol: &SortedSymbol, flags: SortFlags) -> &std::path::Path {
    if flags.contains(SortFlags::STRIP_PATH) {
        symbol
            .path
            .file_name()
            .map(std::path::Path::new)
            .unwrap_or(&symbol.path)
    } else {
        &symbol.path
    }
}
