//! Tests for the query surface: symbol lookup, targets, references,
//! callers, hierarchy walks, and name matching.

use refdex::project::{IndexReason, IndexerJob, JobContext, JobOutcome};
use refdex::{
    DependencyMode, FileId, FileSystemWatcher, IndexResult, IndexerBackend, Location, MatchType,
    PathRegistry, Project, QueryFlags, Settings, SortFlags, Source, Symbol, SymbolFlags,
    SymbolKind, WatchError,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Default)]
struct MockBackend {
    jobs: Mutex<Vec<JobContext>>,
}

impl IndexerBackend for MockBackend {
    fn run(&self, ctx: JobContext) {
        self.jobs.lock().unwrap().push(ctx);
    }
}

impl MockBackend {
    fn take_jobs(&self) -> Vec<JobContext> {
        std::mem::take(&mut *self.jobs.lock().unwrap())
    }
}

struct NullWatcher;

impl FileSystemWatcher for NullWatcher {
    fn watch(&mut self, _dir: &Path) -> Result<(), WatchError> {
        Ok(())
    }

    fn unwatch(&mut self, _dir: &Path) -> Result<(), WatchError> {
        Ok(())
    }
}

const FOO_USR: &str = "c:@F@foo#";
const BASE_VF_USR: &str = "c:@S@Base@F@vf#";
const DERIVED_VF_USR: &str = "c:@S@Derived@F@vf#";
const BASE_USR: &str = "c:@S@Base";
const DERIVED_USR: &str = "c:@S@Derived";

/// A small indexed tree, maps written straight to disk:
///
/// - `h.h`: definition of `foo`, class `Base` with virtual `Base::vf`.
/// - `a.c`: includes h.h; `main` calls `foo`; `Derived : Base` overrides
///   `vf`.
/// - `b.c`: includes h.h; one file-scope reference to `foo`.
struct Tree {
    _temp: TempDir,
    project: Project,
    _results: tokio::sync::mpsc::UnboundedReceiver<JobOutcome>,
    h: FileId,
    a: FileId,
    b: FileId,
}

fn loc(file: FileId, line: u32, column: u32) -> Location {
    Location::new(file, line, column)
}

fn write_maps(project: &Project, file: FileId, symbols: Vec<Symbol>) {
    let mut by_location = BTreeMap::new();
    let mut names: BTreeMap<String, BTreeSet<Location>> = BTreeMap::new();
    let mut targets: BTreeMap<String, BTreeSet<Location>> = BTreeMap::new();
    let mut usrs: BTreeMap<String, BTreeSet<Location>> = BTreeMap::new();

    for symbol in symbols {
        names
            .entry(symbol.name.to_string())
            .or_default()
            .insert(symbol.location);
        if symbol.is_reference() {
            targets
                .entry(symbol.usr.to_string())
                .or_default()
                .insert(symbol.location);
        } else {
            usrs.entry(symbol.usr.to_string())
                .or_default()
                .insert(symbol.location);
        }
        by_location.insert(symbol.location, symbol);
    }

    let store = project.store();
    store.write_symbols(file, &by_location).unwrap();
    store.write_names(file, &names).unwrap();
    store.write_targets(file, &targets).unwrap();
    store.write_usrs(file, &usrs).unwrap();
}

fn tree() -> Tree {
    tree_with(|_| {})
}

fn tree_with(tweak: impl FnOnce(&mut Settings)) -> Tree {
    let temp = TempDir::new().unwrap();
    let mut settings = Settings::default();
    settings.data_dir = temp.path().join("data");
    settings.indexing.save_on_idle = false;
    tweak(&mut settings);

    let (results_tx, results_rx) = tokio::sync::mpsc::unbounded_channel();
    let backend = Arc::new(MockBackend::default());
    let mut project = Project::new(
        temp.path(),
        Arc::new(settings),
        Arc::new(PathRegistry::new()),
        backend.clone(),
        Box::new(NullWatcher),
        results_tx,
    );

    let src_dir = temp.path().join("src");
    std::fs::create_dir_all(&src_dir).unwrap();
    for name in ["a.c", "b.c", "h.h"] {
        std::fs::write(src_dir.join(name), "// test fixture").unwrap();
    }

    let h = project.registry().insert_file(src_dir.join("h.h"));
    let src_a = Source::new(
        project.registry().insert_file(src_dir.join("a.c")),
        src_dir.join("a.c"),
        "/usr/bin/cc",
        vec![],
    );
    let src_b = Source::new(
        project.registry().insert_file(src_dir.join("b.c")),
        src_dir.join("b.c"),
        "/usr/bin/cc",
        vec![],
    );
    let (a, b) = (src_a.file_id, src_b.file_id);

    // Both translation units include h.h.
    project.index(IndexerJob::new(src_a, IndexReason::Startup));
    project.index(IndexerJob::new(src_b, IndexReason::Startup));
    for ctx in backend.take_jobs() {
        let file_id = ctx.source.file_id;
        let mut result = IndexResult::new(ctx.source.key(), file_id);
        result.visited = [file_id, h].into();
        result.dependencies.insert(file_id, [h].into());
        project.on_job_finished(JobOutcome {
            job_id: ctx.job_id,
            source_key: ctx.source.key(),
            result: Some(result),
        });
    }

    // h.h: foo's definition, Base and its virtual method.
    write_maps(
        &project,
        h,
        vec![
            Symbol::new(
                loc(h, 3, 4),
                SymbolKind::Function,
                FOO_USR,
                "foo",
                SymbolFlags::DEFINITION,
                3,
            )
            .with_signature("int foo(int)"),
            Symbol::new(
                loc(h, 10, 6),
                SymbolKind::Class,
                BASE_USR,
                "Base",
                SymbolFlags::DEFINITION,
                4,
            ),
            Symbol::new(
                loc(h, 11, 16),
                SymbolKind::Method,
                BASE_VF_USR,
                "Base::vf",
                SymbolFlags::DEFINITION | SymbolFlags::VIRTUAL,
                2,
            ),
        ],
    );

    // a.c: main() with a call to foo, Derived overriding vf.
    write_maps(
        &project,
        a,
        vec![
            Symbol::new(
                loc(a, 5, 4),
                SymbolKind::Function,
                "c:@F@main#",
                "main",
                SymbolFlags::DEFINITION,
                4,
            ),
            Symbol::new(
                loc(a, 10, 8),
                SymbolKind::Function,
                FOO_USR,
                "foo",
                SymbolFlags::REFERENCE,
                3,
            )
            .with_targets([loc(h, 3, 4)]),
            Symbol::new(
                loc(a, 20, 6),
                SymbolKind::Class,
                DERIVED_USR,
                "Derived",
                SymbolFlags::DEFINITION,
                7,
            )
            .with_base_usrs(vec![BASE_USR.into()]),
            Symbol::new(
                loc(a, 21, 8),
                SymbolKind::Method,
                DERIVED_VF_USR,
                "Derived::vf",
                SymbolFlags::DEFINITION | SymbolFlags::VIRTUAL,
                2,
            )
            .with_base_usrs(vec![BASE_VF_USR.into()]),
        ],
    );

    // b.c: a file-scope reference to foo (no enclosing function).
    write_maps(
        &project,
        b,
        vec![
            Symbol::new(
                loc(b, 2, 0),
                SymbolKind::Function,
                FOO_USR,
                "foo",
                SymbolFlags::REFERENCE,
                3,
            )
            .with_targets([loc(h, 3, 4)]),
        ],
    );

    Tree {
        _temp: temp,
        project,
        _results: results_rx,
        h,
        a,
        b,
    }
}

#[test]
fn test_find_symbol_exact_and_covering() {
    let mut tree = tree();
    let (a, h) = (tree.a, tree.h);

    // Exact hit.
    let (symbol, _) = tree.project.find_symbol(loc(a, 10, 8)).unwrap();
    assert_eq!(&*symbol.usr, FOO_USR);
    assert!(symbol.is_reference());

    // Inside the token span.
    let (symbol, _) = tree.project.find_symbol(loc(a, 10, 10)).unwrap();
    assert_eq!(&*symbol.usr, FOO_USR);

    // One past the end of the token: no symbol there.
    assert!(tree.project.find_symbol(loc(a, 10, 11)).is_none());

    // The definition in the header, with its index.
    let (symbol, index) = tree.project.find_symbol(loc(h, 3, 4)).unwrap();
    assert!(symbol.is_definition());
    assert_eq!(index, 0, "foo is the first symbol in h.h");
}

#[test]
fn test_find_targets_resolves_reference_to_definition() {
    let mut tree = tree();
    let (reference, _) = tree.project.find_symbol(loc(tree.a, 10, 8)).unwrap();

    let targets = tree.project.find_targets(&reference);
    assert_eq!(targets.len(), 1);
    assert!(targets[0].is_definition());
    assert_eq!(targets[0].location, loc(tree.h, 3, 4));

    let best = tree.project.best_target(&reference, &targets).unwrap();
    assert_eq!(best.location, loc(tree.h, 3, 4));
}

#[test]
fn test_find_all_references_spans_dependents() {
    let mut tree = tree();
    let (definition, _) = tree.project.find_symbol(loc(tree.h, 3, 4)).unwrap();

    let references = tree.project.find_all_references(&definition);
    let locations: Vec<Location> = references.iter().map(|r| r.location).collect();
    assert_eq!(locations, vec![loc(tree.a, 10, 8), loc(tree.b, 2, 0)]);
    assert!(references.iter().all(Symbol::is_reference));
}

#[test]
fn test_find_callers_requires_enclosing_function() {
    let mut tree = tree();
    let (definition, _) = tree.project.find_symbol(loc(tree.h, 3, 4)).unwrap();

    let callers = tree.project.find_callers(&definition);
    // a.c's reference sits inside main; b.c's is at file scope.
    assert_eq!(callers.len(), 1);
    assert_eq!(callers[0].location, loc(tree.a, 10, 8));
}

#[test]
fn test_find_virtuals_walks_both_directions() {
    let mut tree = tree();

    let (base_vf, _) = tree.project.find_symbol(loc(tree.h, 11, 16)).unwrap();
    let overriders = tree.project.find_virtuals(&base_vf);
    assert_eq!(overriders.len(), 1);
    assert_eq!(&*overriders[0].usr, DERIVED_VF_USR);

    let (derived_vf, _) = tree.project.find_symbol(loc(tree.a, 21, 8)).unwrap();
    let overridden = tree.project.find_virtuals(&derived_vf);
    assert_eq!(overridden.len(), 1);
    assert_eq!(&*overridden[0].usr, BASE_VF_USR);

    // A non-virtual symbol has no virtual relatives.
    let (foo, _) = tree.project.find_symbol(loc(tree.h, 3, 4)).unwrap();
    assert!(tree.project.find_virtuals(&foo).is_empty());
}

#[test]
fn test_find_subclasses() {
    let mut tree = tree();
    let (base, _) = tree.project.find_symbol(loc(tree.h, 10, 6)).unwrap();

    let subclasses = tree.project.find_subclasses(&base);
    assert_eq!(subclasses.len(), 1);
    assert_eq!(&*subclasses[0].usr, DERIVED_USR);
}

#[test]
fn test_find_by_usr_modes_and_filter() {
    let mut tree = tree();

    // From a.c looking through its includes, foo's definition is visible.
    let found = tree
        .project
        .find_by_usr(FOO_USR, tree.a, DependencyMode::ArgDependsOn, None);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].location, loc(tree.h, 3, 4));

    // Filtering that location out leaves nothing.
    let found = tree.project.find_by_usr(
        FOO_USR,
        tree.a,
        DependencyMode::ArgDependsOn,
        Some(loc(tree.h, 3, 4)),
    );
    assert!(found.is_empty());

    // An unknown USR is an empty result, not an error.
    assert!(tree
        .project
        .find_by_usr("c:@F@nonesuch#", tree.a, DependencyMode::ArgDependsOn, None)
        .is_empty());
}

#[test]
fn test_find_symbols_wildcard_classification() {
    let temp = TempDir::new().unwrap();
    let mut settings = Settings::default();
    settings.data_dir = temp.path().join("data");
    let (results_tx, _results_rx) = tokio::sync::mpsc::unbounded_channel();
    let mut project = Project::new(
        temp.path(),
        Arc::new(settings),
        Arc::new(PathRegistry::new()),
        Arc::new(MockBackend::default()),
        Box::new(NullWatcher),
        results_tx,
    );

    let file = project.registry().insert_file("/tree/n.c");
    let symbols = ["foobar", "fooXbar", "foo", "bar"]
        .iter()
        .enumerate()
        .map(|(i, name)| {
            Symbol::new(
                loc(file, i as u32 + 1, 0),
                SymbolKind::Function,
                format!("c:@F@{name}#"),
                *name,
                SymbolFlags::DEFINITION,
                name.len() as u32,
            )
        })
        .collect();
    write_maps(&project, file, symbols);

    let mut matches: Vec<(MatchType, String)> = Vec::new();
    project.find_symbols(
        "foo*bar",
        &mut |match_type, name, _| matches.push((match_type, name.to_string())),
        QueryFlags::empty(),
        Some(file),
    );
    matches.sort_by(|x, y| x.1.cmp(&y.1));
    assert_eq!(
        matches,
        vec![
            (MatchType::Wildcard, "fooXbar".to_string()),
            (MatchType::Wildcard, "foobar".to_string()),
        ]
    );

    // Exact match.
    let mut matches = Vec::new();
    project.find_symbols(
        "foo",
        &mut |match_type, name, _| matches.push((match_type, name.to_string())),
        QueryFlags::empty(),
        Some(file),
    );
    assert_eq!(matches, vec![(MatchType::Exact, "foo".to_string())]);

    // Prefix matching on request.
    let mut matches = Vec::new();
    project.find_symbols(
        "foo",
        &mut |match_type, name, _| matches.push((match_type, name.to_string())),
        QueryFlags::STARTS_WITH,
        Some(file),
    );
    matches.sort_by(|x, y| x.1.cmp(&y.1));
    assert_eq!(
        matches,
        vec![
            (MatchType::Exact, "foo".to_string()),
            (MatchType::StartsWith, "fooXbar".to_string()),
            (MatchType::StartsWith, "foobar".to_string()),
        ]
    );
}

#[test]
fn test_queries_survive_a_tight_map_budget() {
    // max_open_maps = 2 forces constant eviction across the three files.
    let mut tree = tree_with(|settings| settings.query.max_open_maps = 2);
    let (definition, _) = tree.project.find_symbol(loc(tree.h, 3, 4)).unwrap();

    let references = tree.project.find_all_references(&definition);
    assert_eq!(references.len(), 2);
}

#[test]
fn test_missing_maps_schedule_reindex() {
    let mut tree = tree();

    // A file that is in the graph but lost its maps on disk.
    tree.project.store().remove_file_maps(tree.b).unwrap();
    let (definition, _) = tree.project.find_symbol(loc(tree.h, 3, 4)).unwrap();
    let references = tree.project.find_all_references(&definition);

    // The query degrades to what is readable and b.c goes dirty.
    assert_eq!(references.len(), 1);
    assert!(tree.project.is_dirty(tree.b));
}

#[test]
fn test_sort_orders_kinds_and_definitions() {
    let mut tree = tree();
    let (foo_def, _) = tree.project.find_symbol(loc(tree.h, 3, 4)).unwrap();
    let (base, _) = tree.project.find_symbol(loc(tree.h, 10, 6)).unwrap();
    let (foo_ref, _) = tree.project.find_symbol(loc(tree.a, 10, 8)).unwrap();

    let sorted = tree
        .project
        .sort([foo_def.clone(), base.clone(), foo_ref], SortFlags::empty());
    // The class outranks the functions; the definition precedes the
    // reference.
    assert_eq!(sorted[0].kind, SymbolKind::Class);
    assert_eq!(sorted[1].location, foo_def.location);

    let reversed = tree.project.sort([foo_def, base], SortFlags::REVERSE);
    assert_eq!(reversed[0].kind, SymbolKind::Function);
}

#[test]
fn test_prepare_and_dump_file_maps() {
    let mut tree = tree();

    // Prepare on a file with maps leaves nothing dirty.
    tree.project.prepare(tree.h);
    assert!(!tree.project.is_dirty(tree.h));

    let dump = tree.project.dump_file_maps(tree.h);
    assert!(dump.contains("symbols (3)"));
    assert!(dump.contains("foo"));
    assert!(dump.contains(BASE_VF_USR));

    // Prepare on a file without maps schedules its re-index.
    tree.project.store().remove_file_maps(tree.a).unwrap();
    tree.project.prepare(tree.a);
    assert!(tree.project.is_dirty(tree.a));
}

#[test]
fn test_estimate_memory_counts_tables() {
    let tree = tree();
    let estimate = tree.project.estimate_memory();
    assert!(estimate.sources > 0);
    assert!(estimate.dependencies > 0);
    assert!(estimate.total() >= estimate.sources + estimate.dependencies);
}
