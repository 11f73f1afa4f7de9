use crate::types::{CompactString, Location};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

bitflags! {
    /// Properties of a symbol occurrence.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct SymbolFlags: u16 {
        const DEFINITION  = 1 << 0;
        const DECLARATION = 1 << 1;
        const REFERENCE   = 1 << 2;
        const VIRTUAL     = 1 << 3;
        const CONST       = 1 << 4;
        const STATIC      = 1 << 5;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SymbolKind {
    Namespace,
    Class,
    Struct,
    Union,
    Enum,
    EnumConstant,
    Typedef,
    Function,
    Method,
    Constructor,
    Destructor,
    Field,
    Variable,
    Parameter,
    Macro,
}

impl SymbolKind {
    /// True for kinds that can enclose call sites.
    pub fn is_function_like(self) -> bool {
        matches!(
            self,
            Self::Function | Self::Method | Self::Constructor | Self::Destructor
        )
    }

    /// True for kinds that participate in class hierarchies.
    pub fn is_class_like(self) -> bool {
        matches!(self, Self::Class | Self::Struct | Self::Union)
    }

    /// Rank used by [`crate::query::sort_symbols`]; lower sorts first.
    pub fn priority(self) -> u8 {
        match self {
            Self::Namespace => 0,
            Self::Class | Self::Struct | Self::Union => 1,
            Self::Enum => 2,
            Self::Typedef => 3,
            Self::Function | Self::Constructor | Self::Destructor => 4,
            Self::Method => 5,
            Self::EnumConstant => 6,
            Self::Field => 7,
            Self::Variable => 8,
            Self::Parameter => 9,
            Self::Macro => 10,
        }
    }
}

/// One symbol occurrence, keyed by its [`Location`] in the per-file symbols map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub location: Location,
    pub kind: SymbolKind,
    /// Unified symbol resolution string; names the symbol across translation units.
    pub usr: CompactString,
    /// Qualified name.
    pub name: CompactString,
    pub flags: SymbolFlags,
    /// Token length in columns; the occurrence spans
    /// `[column, column + length)` on its line.
    pub length: u32,
    pub signature: Option<CompactString>,
    /// Locations this occurrence points at: the definition a reference
    /// resolves to, the definition of a declaration, and so on.
    pub targets: BTreeSet<Location>,
    /// For a class: USRs of its direct base classes.
    /// For a virtual method: USRs of the methods it overrides.
    pub base_usrs: Vec<CompactString>,
}

impl Symbol {
    pub fn new(
        location: Location,
        kind: SymbolKind,
        usr: impl Into<CompactString>,
        name: impl Into<CompactString>,
        flags: SymbolFlags,
        length: u32,
    ) -> Self {
        Self {
            location,
            kind,
            usr: usr.into(),
            name: name.into(),
            flags,
            length,
            signature: None,
            targets: BTreeSet::new(),
            base_usrs: Vec::new(),
        }
    }

    pub fn with_signature(mut self, signature: impl Into<CompactString>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn with_targets(mut self, targets: impl IntoIterator<Item = Location>) -> Self {
        self.targets = targets.into_iter().collect();
        self
    }

    pub fn with_base_usrs(mut self, usrs: impl IntoIterator<Item = CompactString>) -> Self {
        self.base_usrs = usrs.into_iter().collect();
        self
    }

    pub fn is_definition(&self) -> bool {
        self.flags.contains(SymbolFlags::DEFINITION)
    }

    pub fn is_declaration(&self) -> bool {
        self.flags.contains(SymbolFlags::DECLARATION)
    }

    pub fn is_reference(&self) -> bool {
        self.flags.contains(SymbolFlags::REFERENCE)
    }

    pub fn is_virtual(&self) -> bool {
        self.flags.contains(SymbolFlags::VIRTUAL)
    }

    /// Whether this occurrence's token span covers `loc`.
    ///
    /// Occurrences are single tokens, so the span never crosses a line.
    pub fn covers(&self, loc: Location) -> bool {
        self.location.file_id == loc.file_id
            && self.location.line == loc.line
            && self.location.column <= loc.column
            && loc.column < self.location.column + self.length
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiagnosticLevel {
    Note,
    Warning,
    Error,
    FixIt,
}

/// A compiler diagnostic attributed to one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub location: Location,
    pub message: CompactString,
}

impl Diagnostic {
    pub fn new(level: DiagnosticLevel, location: Location, message: impl Into<CompactString>) -> Self {
        Self {
            level,
            location,
            message: message.into(),
        }
    }
}

/// A suggested textual replacement emitted by the indexer backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixIt {
    pub line: u32,
    pub column: u32,
    pub length: u32,
    pub replacement: CompactString,
}

impl FixIt {
    pub fn new(line: u32, column: u32, length: u32, replacement: impl Into<CompactString>) -> Self {
        Self {
            line,
            column,
            length,
            replacement: replacement.into(),
        }
    }
}
