//! Query operations over the indexed data.
//!
//! Every public entry point opens a [`QueryScope`] for its lifetime and
//! drains the scope's load failures into the dirty set on the way out, so a
//! corrupt map heals itself on the next debounce. The `_in` variants share a
//! caller's scope for multi-step queries.

use crate::graph::DependencyMode;
use crate::query::{MatchType, QueryFlags, QueryScope, SortFlags, SortedSymbol, sort_symbols};
use crate::symbol::Symbol;
use crate::types::{FileId, Location};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use super::Project;

impl Project {
    /// Run `f` inside a fresh query scope, then feed any map-load failures
    /// back into the dirty set.
    fn scoped<R>(&mut self, f: impl FnOnce(&Project, &mut QueryScope<'_>) -> R) -> R {
        let mut scope = QueryScope::new(&self.store, self.settings.query.max_open_maps.max(1));
        let result = f(self, &mut scope);
        let failed = scope.take_failed();
        drop(scope);
        if !failed.is_empty() {
            self.mark_load_failures(failed);
        }
        result
    }

    /// The symbol at `location`: an exact hit, or the closest preceding
    /// occurrence whose token span covers the point. Also yields the index
    /// within the file's symbol list.
    pub fn find_symbol(&mut self, location: Location) -> Option<(Symbol, usize)> {
        self.scoped(|project, scope| project.find_symbol_in(scope, location))
    }

    pub(crate) fn find_symbol_in(
        &self,
        scope: &mut QueryScope<'_>,
        location: Location,
    ) -> Option<(Symbol, usize)> {
        let map = scope.open_symbols(location.file_id)?;
        if let Ok(Some(index)) = map.find(&location) {
            return map.value_at(index).ok().map(|s| (s, index));
        }
        let index = map.lower_bound(&location).ok().flatten()?;
        let symbol = map.value_at(index).ok()?;
        symbol.covers(location).then_some((symbol, index))
    }

    /// Declarations and definitions of the symbol's USR across the files
    /// that can see it, definitions first.
    pub fn find_targets(&mut self, symbol: &Symbol) -> Vec<Symbol> {
        self.scoped(|project, scope| project.find_targets_in(scope, symbol))
    }

    pub(crate) fn find_targets_in(
        &self,
        scope: &mut QueryScope<'_>,
        symbol: &Symbol,
    ) -> Vec<Symbol> {
        let usr = symbol.usr.to_string();
        let mut out = Vec::new();
        // The occurrence's recorded targets resolve directly, wherever they
        // live.
        for &location in &symbol.targets {
            if let Some((target, _)) = self.find_symbol_in(scope, location) {
                out.push(target);
            }
        }
        for file_id in self.candidate_files(symbol.location.file_id) {
            let Some(usrs) = scope.open_usrs(file_id) else {
                continue;
            };
            let Ok(Some(locations)) = usrs.get(&usr) else {
                continue;
            };
            for location in locations {
                if location == symbol.location {
                    continue;
                }
                if let Some((target, _)) = self.find_symbol_in(scope, location) {
                    if target.usr == symbol.usr && (target.is_definition() || target.is_declaration())
                    {
                        out.push(target);
                    }
                }
            }
        }
        out.sort_by_key(|s| (!s.is_definition(), s.location));
        out.dedup_by_key(|s| s.location);
        out
    }

    /// Pick the target to jump to: same-USR definition beats same-USR
    /// declaration beats a signature match on another function-like symbol.
    pub fn best_target(&self, reference: &Symbol, candidates: &[Symbol]) -> Option<Symbol> {
        candidates
            .iter()
            .min_by_key(|c| (Self::target_rank(reference, c), c.location))
            .cloned()
    }

    fn target_rank(reference: &Symbol, candidate: &Symbol) -> u8 {
        if candidate.usr == reference.usr {
            if candidate.is_definition() {
                0
            } else if candidate.is_declaration() {
                1
            } else {
                3
            }
        } else if candidate.kind.is_function_like()
            && candidate.signature.is_some()
            && candidate.signature == reference.signature
        {
            2
        } else {
            4
        }
    }

    /// Every occurrence referencing the symbol's USR, confirmed against its
    /// symbol record.
    pub fn find_all_references(&mut self, symbol: &Symbol) -> Vec<Symbol> {
        self.scoped(|project, scope| project.find_all_references_in(scope, symbol))
    }

    pub(crate) fn find_all_references_in(
        &self,
        scope: &mut QueryScope<'_>,
        symbol: &Symbol,
    ) -> Vec<Symbol> {
        let usr = symbol.usr.to_string();
        let mut out = Vec::new();
        for file_id in self.candidate_files(symbol.location.file_id) {
            let Some(targets) = scope.open_targets(file_id) else {
                continue;
            };
            let Ok(Some(locations)) = targets.get(&usr) else {
                continue;
            };
            for location in locations {
                if let Some((occurrence, _)) = self.find_symbol_in(scope, location) {
                    if occurrence.is_reference() || occurrence.kind == symbol.kind {
                        out.push(occurrence);
                    }
                }
            }
        }
        out.sort_by_key(|s| s.location);
        out.dedup_by_key(|s| s.location);
        out
    }

    /// References whose enclosing symbol is a function or method.
    pub fn find_callers(&mut self, symbol: &Symbol) -> Vec<Symbol> {
        self.scoped(|project, scope| project.find_callers_in(scope, symbol))
    }

    pub(crate) fn find_callers_in(
        &self,
        scope: &mut QueryScope<'_>,
        symbol: &Symbol,
    ) -> Vec<Symbol> {
        let references = self.find_all_references_in(scope, symbol);
        references
            .into_iter()
            .filter(|r| r.is_reference())
            .filter(|r| self.enclosing_function_in(scope, r.location).is_some())
            .collect()
    }

    /// Nearest function-like definition at or before `location` in the same
    /// file. Symbol records carry no end-of-body marker, so this is the
    /// preceding-definition heuristic.
    fn enclosing_function_in(
        &self,
        scope: &mut QueryScope<'_>,
        location: Location,
    ) -> Option<Symbol> {
        let map = scope.open_symbols(location.file_id)?;
        let mut index = map.lower_bound(&location).ok().flatten()?;
        loop {
            let symbol = map.value_at(index).ok()?;
            if symbol.is_definition() && symbol.kind.is_function_like() {
                return Some(symbol);
            }
            if index == 0 {
                return None;
            }
            index -= 1;
        }
    }

    /// For a virtual method: the methods it overrides (walking base USRs up)
    /// and the methods overriding it (walking dependent files down), both
    /// transitive.
    pub fn find_virtuals(&mut self, symbol: &Symbol) -> Vec<Symbol> {
        self.scoped(|project, scope| project.find_virtuals_in(scope, symbol))
    }

    pub(crate) fn find_virtuals_in(
        &self,
        scope: &mut QueryScope<'_>,
        symbol: &Symbol,
    ) -> Vec<Symbol> {
        if !symbol.is_virtual() {
            return Vec::new();
        }
        let mut results: BTreeMap<Location, Symbol> = BTreeMap::new();

        // Up: overridden methods live in files this one can see.
        let mut frontier: Vec<String> = symbol.base_usrs.iter().map(|u| u.to_string()).collect();
        let mut seen: BTreeSet<String> = frontier.iter().cloned().collect();
        while let Some(usr) = frontier.pop() {
            for overridden in self.find_by_usr_in(
                scope,
                &usr,
                symbol.location.file_id,
                DependencyMode::ArgDependsOn,
                None,
            ) {
                for base in &overridden.base_usrs {
                    if seen.insert(base.to_string()) {
                        frontier.push(base.to_string());
                    }
                }
                results.insert(overridden.location, overridden);
            }
        }

        // Down: overriders can only be in files that include this one.
        let mut override_usrs: BTreeSet<String> = BTreeSet::from([symbol.usr.to_string()]);
        let files = self.candidate_files(symbol.location.file_id);
        let mut grew = true;
        while grew {
            grew = false;
            for &file_id in &files {
                let Some(map) = scope.open_symbols(file_id) else {
                    continue;
                };
                for entry in map.iter() {
                    let Ok((_, candidate)) = entry else {
                        continue;
                    };
                    if !candidate.kind.is_function_like() || candidate.is_reference() {
                        continue;
                    }
                    let overrides_one = candidate
                        .base_usrs
                        .iter()
                        .any(|base| override_usrs.contains(&**base));
                    if overrides_one {
                        if override_usrs.insert(candidate.usr.to_string()) {
                            grew = true;
                        }
                        results.insert(candidate.location, candidate);
                    }
                }
            }
        }

        results.remove(&symbol.location);
        results.into_values().collect()
    }

    /// Classes deriving from the class, transitively.
    pub fn find_subclasses(&mut self, symbol: &Symbol) -> Vec<Symbol> {
        self.scoped(|project, scope| project.find_subclasses_in(scope, symbol))
    }

    pub(crate) fn find_subclasses_in(
        &self,
        scope: &mut QueryScope<'_>,
        symbol: &Symbol,
    ) -> Vec<Symbol> {
        if !symbol.kind.is_class_like() {
            return Vec::new();
        }
        let mut results: BTreeMap<Location, Symbol> = BTreeMap::new();
        let mut base_usrs: BTreeSet<String> = BTreeSet::from([symbol.usr.to_string()]);
        let files = self.candidate_files(symbol.location.file_id);
        let mut grew = true;
        while grew {
            grew = false;
            for &file_id in &files {
                let Some(map) = scope.open_symbols(file_id) else {
                    continue;
                };
                for entry in map.iter() {
                    let Ok((_, candidate)) = entry else {
                        continue;
                    };
                    if !candidate.kind.is_class_like() || candidate.is_reference() {
                        continue;
                    }
                    let derives = candidate
                        .base_usrs
                        .iter()
                        .any(|base| base_usrs.contains(&**base));
                    if derives {
                        if base_usrs.insert(candidate.usr.to_string()) {
                            grew = true;
                        }
                        results.insert(candidate.location, candidate);
                    }
                }
            }
        }
        results.remove(&symbol.location);
        results.into_values().collect()
    }

    /// Symbols carrying `usr` in the files `dependencies(file_id, mode)`
    /// selects, optionally excluding one location.
    pub fn find_by_usr(
        &mut self,
        usr: &str,
        file_id: FileId,
        mode: DependencyMode,
        filtered: Option<Location>,
    ) -> Vec<Symbol> {
        self.scoped(|project, scope| project.find_by_usr_in(scope, usr, file_id, mode, filtered))
    }

    pub(crate) fn find_by_usr_in(
        &self,
        scope: &mut QueryScope<'_>,
        usr: &str,
        file_id: FileId,
        mode: DependencyMode,
        filtered: Option<Location>,
    ) -> Vec<Symbol> {
        let mut files = self.dependencies.dependencies(file_id, mode);
        files.insert(file_id);
        let usr_key = usr.to_string();
        let mut out = Vec::new();
        for file_id in files {
            let Some(usrs) = scope.open_usrs(file_id) else {
                continue;
            };
            let Ok(Some(locations)) = usrs.get(&usr_key) else {
                continue;
            };
            for location in locations {
                if Some(location) == filtered {
                    continue;
                }
                if let Some((symbol, _)) = self.find_symbol_in(scope, location) {
                    out.push(symbol);
                }
            }
        }
        out.sort_by_key(|s| s.location);
        out.dedup_by_key(|s| s.location);
        out
    }

    /// Walk symbol names, invoking `cb` per matching name per file. A
    /// pattern with `*`/`?` glob-matches; otherwise names compare for
    /// equality, or prefix when the flag asks for it.
    pub fn find_symbols(
        &mut self,
        pattern: &str,
        cb: &mut dyn FnMut(MatchType, &str, &BTreeSet<Location>),
        flags: QueryFlags,
        file_filter: Option<FileId>,
    ) {
        self.scoped(|project, scope| {
            project.find_symbols_in(scope, pattern, cb, flags, file_filter)
        })
    }

    pub(crate) fn find_symbols_in(
        &self,
        scope: &mut QueryScope<'_>,
        pattern: &str,
        cb: &mut dyn FnMut(MatchType, &str, &BTreeSet<Location>),
        flags: QueryFlags,
        file_filter: Option<FileId>,
    ) {
        let case_insensitive = flags.contains(QueryFlags::CASE_INSENSITIVE);
        let pattern_cmp = if case_insensitive {
            pattern.to_lowercase()
        } else {
            pattern.to_string()
        };
        let wildcard = pattern.contains(['*', '?']);
        let glob = wildcard
            .then(|| glob::Pattern::new(&pattern_cmp).ok())
            .flatten();

        let files: BTreeSet<FileId> = match file_filter {
            Some(file_id) => BTreeSet::from([file_id]),
            None => self.indexed_files(),
        };
        for file_id in files {
            let Some(names) = scope.open_names(file_id) else {
                continue;
            };
            for entry in names.iter() {
                let Ok((name, locations)) = entry else {
                    continue;
                };
                let name_cmp = if case_insensitive {
                    name.to_lowercase()
                } else {
                    name.clone()
                };
                let match_type = if wildcard {
                    match &glob {
                        Some(pattern) if pattern.matches(&name_cmp) => Some(MatchType::Wildcard),
                        _ => None,
                    }
                } else if name_cmp == pattern_cmp {
                    Some(MatchType::Exact)
                } else if flags.contains(QueryFlags::STARTS_WITH)
                    && name_cmp.starts_with(&pattern_cmp)
                {
                    Some(MatchType::StartsWith)
                } else {
                    None
                };
                if let Some(match_type) = match_type {
                    cb(match_type, &name, &locations);
                }
            }
        }
    }

    /// Order a result set for presentation.
    pub fn sort(
        &self,
        symbols: impl IntoIterator<Item = Symbol>,
        flags: SortFlags,
    ) -> Vec<SortedSymbol> {
        let rows = symbols
            .into_iter()
            .map(|s| SortedSymbol {
                location: s.location,
                kind: s.kind,
                is_definition: s.is_definition(),
                path: self.registry.path(s.location.file_id).unwrap_or_default(),
            })
            .collect();
        sort_symbols(rows, flags)
    }

    /// Open every map of a file once, warming the page cache ahead of a
    /// burst of queries.
    pub fn prepare(&mut self, file_id: FileId) {
        self.scoped(|_, scope| {
            let _ = scope.open_symbols(file_id);
            let _ = scope.open_names(file_id);
            let _ = scope.open_targets(file_id);
            let _ = scope.open_usrs(file_id);
        });
    }

    /// Human-readable listing of one file's four maps.
    pub fn dump_file_maps(&mut self, file_id: FileId) -> String {
        self.scoped(|project, scope| {
            let mut out = String::new();
            let path = project
                .registry
                .path(file_id)
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<unknown>".to_string());
            let _ = writeln!(out, "file {file_id}: {path}");

            if let Some(map) = scope.open_symbols(file_id) {
                let _ = writeln!(out, "symbols ({}):", map.len());
                for (location, symbol) in map.iter().flatten() {
                    let _ = writeln!(
                        out,
                        "  {location} {:?} {} {}",
                        symbol.kind, symbol.name, symbol.usr
                    );
                }
            }
            for (label, map) in [
                ("symnames", scope.open_names(file_id)),
                ("targets", scope.open_targets(file_id)),
                ("usrs", scope.open_usrs(file_id)),
            ] {
                let Some(map) = map else { continue };
                let _ = writeln!(out, "{label} ({}):", map.len());
                for (key, locations) in map.iter().flatten() {
                    let rendered: Vec<String> =
                        locations.iter().map(Location::to_string).collect();
                    let _ = writeln!(out, "  {key} -> [{}]", rendered.join(", "));
                }
            }
            out
        })
    }

    /// The file plus everything that transitively includes it.
    fn candidate_files(&self, file_id: FileId) -> BTreeSet<FileId> {
        let mut files = self
            .dependencies
            .dependencies(file_id, DependencyMode::DependsOnArg);
        files.insert(file_id);
        files
    }
}
