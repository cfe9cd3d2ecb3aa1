//! Analysis pipeline
//!
//! Runs every stage over one project in order:
//!
//! 1. discover files under the scan roots and parse declaration files
//! 2. build the module index and the module load order
//! 3. parse PHP sources in parallel (optionally through the outline cache)
//! 4. build the typed module graph, coupling and architectural debt
//! 5. resolve scoped overrides, delegation chains and plugin seams
//! 6. gather change history and rank hotspots
//!
//! Nothing here is fatal except failing to set up the worker pool: every
//! stage's problems are collected as warnings on the [`AnalysisReport`].

pub mod discover;
pub mod scan;

pub use discover::{discover_files, load_declarations, DeclarationFile, DiscoveredFile, Discovery};
pub use scan::scan_sources;

use crate::cache::{outlines_path, CacheStats, OutlineCache};
use crate::config::ProjectConfig;
use crate::declarations::{merge_observers, merge_plugins, Declaration, MergedObserver, MergedPlugin};
use crate::detectors::{analyze_debt, ArchitecturalDebt};
use crate::errors::{Extraction, Warning};
use crate::git::change_frequency;
use crate::graph::{DependencyGraph, GraphBuilder};
use crate::modules::{load_order, ModuleIndex};
use crate::parsers::FileOutline;
use crate::plugins::{analyze_seams, ClassIndex, PluginSeam, RegexHeuristics};
use crate::resolution::{
    resolve_entry_points, DelegationChain, EntryPoint, OverrideDeclaration, OverrideSet,
    ResolutionMap, ScopeList,
};
use crate::scoring::{compute_coupling, score_hotspots, CouplingReport, HotspotReport};
use anyhow::{Context, Result};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Scope that webapi.xml routes are resolved in.
pub const WEBAPI_SCOPE: &str = "webapi_rest";

/// Run-time knobs that are not part of the project configuration.
#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    /// Worker threads for parsing (None = rayon default)
    pub workers: Option<usize>,
    /// Output directory whose `cache/` holds the outline cache (None = no cache)
    pub cache_root: Option<PathBuf>,
    /// Draw spinners and progress bars on stderr
    pub show_progress: bool,
}

/// Counts describing what the scan saw.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanStats {
    pub roots_scanned: usize,
    pub declaration_files: usize,
    pub source_files: usize,
    pub parsed_files: usize,
    pub declarations: usize,
    pub cache: CacheStats,
}

/// Everything one analysis run produces.
#[derive(Debug)]
pub struct AnalysisReport {
    pub project_root: PathBuf,
    pub modules: ModuleIndex,
    pub load_order: Vec<String>,
    pub graph: DependencyGraph,
    pub coupling: CouplingReport,
    pub resolutions: ResolutionMap,
    pub delegation_chains: Vec<DelegationChain>,
    pub plugin_seams: Vec<PluginSeam>,
    pub debt: ArchitecturalDebt,
    pub hotspots: HotspotReport,
    pub stats: ScanStats,
    pub warnings: Vec<Warning>,
}

fn create_spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.green} {msg}")
        .expect("valid template")
}

fn spinner(multi: &MultiProgress, message: &'static str) -> ProgressBar {
    let bar = multi.add(ProgressBar::new_spinner());
    bar.set_style(create_spinner_style());
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Analyze the project at `project_root`.
pub fn run_analysis(
    project_root: &Path,
    config: &ProjectConfig,
    options: &AnalysisOptions,
) -> Result<AnalysisReport> {
    let multi = if options.show_progress {
        MultiProgress::new()
    } else {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    };

    let mut pool = rayon::ThreadPoolBuilder::new();
    if let Some(workers) = options.workers.filter(|w| *w > 0) {
        pool = pool.num_threads(workers);
    }
    let pool = pool.build().context("Failed to start worker pool")?;

    pool.install(|| analyze(project_root, config, options, &multi))
}

fn analyze(
    project_root: &Path,
    config: &ProjectConfig,
    options: &AnalysisOptions,
    multi: &MultiProgress,
) -> Result<AnalysisReport> {
    let mut run = Extraction::new(());
    let scopes = config.scope_list();

    // Discovery and declarations
    let walk = spinner(multi, "Discovering files...");
    let discovery = run.absorb(discover_files(project_root, config));
    let declaration_files = run.absorb(load_declarations(&discovery.declaration_files, &scopes));
    walk.finish_with_message(format!(
        "{}Found {} declaration files and {} PHP sources",
        style("✓ ").green(),
        style(discovery.declaration_files.len()).cyan(),
        style(discovery.source_files.len()).cyan()
    ));

    let mut modules = run.absorb(ModuleIndex::from_declarations(
        declaration_files.iter().flat_map(|f| f.declarations.iter()),
    ));
    let attributed = attribute_declarations(&declaration_files, &mut modules, &scopes);
    let order = run.absorb(load_order(&modules));
    let ordered = in_load_order(attributed, &order);
    info!(
        "{} modules, {} scoped declarations in load order",
        modules.len(),
        ordered.len()
    );

    // Sources
    let cache = options.cache_root.as_deref().map(|dir| OutlineCache::load(&outlines_path(dir)));
    let outlines = run.absorb(scan_sources(&discovery.source_files, cache.as_ref(), multi));
    if let (Some(cache), Some(dir)) = (&cache, &options.cache_root) {
        if let Err(e) = cache.save(&outlines_path(dir)) {
            warn!("Could not save outline cache: {}", e);
        }
    }

    // Graph and merge
    let graph_spinner = spinner(multi, "Building dependency graph...");
    let plugins = run.absorb(merge_plugins(
        ordered.iter().filter_map(|(module, decl)| match decl {
            Declaration::Plugin(p) => Some((module.as_str(), p)),
            _ => None,
        }),
        scopes.global(),
    ));
    let observers = run.absorb(merge_observers(
        ordered.iter().filter_map(|(module, decl)| match decl {
            Declaration::Observer(o) => Some((module.as_str(), o)),
            _ => None,
        }),
        scopes.global(),
    ));
    let graph = build_graph(config, &modules, &outlines, &ordered, &plugins, &observers);
    let coupling = compute_coupling(&graph);
    let debt = analyze_debt(&graph, &config.cycles, &config.centrality);
    graph_spinner.finish_with_message(format!(
        "{}Built graph: {} modules, {} edges, {} cycles",
        style("✓ ").green(),
        style(graph.modules.len()).cyan(),
        style(graph.edges.len()).cyan(),
        style(debt.cycles.len()).cyan()
    ));

    // Resolution, delegation and seams
    let resolve_spinner = spinner(multi, "Resolving overrides and plugin seams...");
    let resolutions = ResolutionMap::build(&build_overrides(&ordered), &scopes);
    let entries = entry_points(&declaration_files, config, &scopes);
    let delegation_chains = run.absorb(resolve_entry_points(&entries, &resolutions, &scopes));
    let classes = ClassIndex::build(&outlines);
    let plugin_seams = run.absorb(analyze_seams(
        &plugins,
        &classes,
        &resolutions,
        &scopes,
        &RegexHeuristics,
    ));
    resolve_spinner.finish_with_message(format!(
        "{}Resolved {} override targets, {} delegation chains, {} plugin seams",
        style("✓ ").green(),
        style(resolutions.targets.len()).cyan(),
        style(delegation_chains.len()).cyan(),
        style(plugin_seams.len()).cyan()
    ));

    // Change history
    let git_spinner = spinner(multi, "Reading change history...");
    let churn = run.absorb(change_frequency(project_root, &modules, &config.git));
    let centrality: BTreeMap<String, f64> = debt
        .centrality
        .iter()
        .map(|c| (c.module.clone(), c.total))
        .collect();
    let hotspots = score_hotspots(&centrality, churn.as_ref(), &config.hotspots);
    git_spinner.finish_with_message(if hotspots.change_signal_available {
        format!(
            "{}Ranked hotspots ({} high risk)",
            style("✓ ").green(),
            style(hotspots.high_risk_count).cyan()
        )
    } else {
        format!(
            "{}Ranked hotspots {}",
            style("✓ ").green(),
            style("(no change history)").dim()
        )
    });

    let stats = ScanStats {
        roots_scanned: discovery.roots_scanned,
        declaration_files: discovery.declaration_files.len(),
        source_files: discovery.source_files.len(),
        parsed_files: outlines.len(),
        declarations: declaration_files.iter().map(|f| f.declarations.len()).sum(),
        cache: cache.as_ref().map(OutlineCache::stats).unwrap_or_default(),
    };
    let (_, warnings) = run.into_parts();
    debug!("Analysis finished with {} warnings", warnings.len());

    Ok(AnalysisReport {
        project_root: project_root.to_path_buf(),
        modules,
        load_order: order,
        graph,
        coupling,
        resolutions,
        delegation_chains,
        plugin_seams,
        debt,
        hotspots,
        stats,
        warnings,
    })
}

/// Pair scoped declarations with the module whose tree they sit in.
///
/// Records the module's scope presence and registers its virtual types.
/// Declarations outside every module cannot be attributed and are dropped.
fn attribute_declarations<'a>(
    files: &'a [DeclarationFile],
    modules: &mut ModuleIndex,
    scopes: &ScopeList,
) -> Vec<(String, &'a Declaration)> {
    let mut attributed = Vec::new();
    for file in files.iter().filter(|f| f.placement.kind.is_scoped()) {
        let Some(module) = modules.module_for_locator(&file.locator).map(String::from) else {
            debug!("{} is outside every module; skipping", file.locator);
            continue;
        };
        if !file.declarations.is_empty() && !scopes.is_global(&file.scope) {
            modules.note_scope(&module, &file.scope);
        }
        for declaration in &file.declarations {
            if let Declaration::VirtualType(v) = declaration {
                modules.register_virtual_type(&v.name, &module);
            }
            attributed.push((module.clone(), declaration));
        }
    }
    attributed
}

/// Stable sort of attributed declarations by their module's load position.
fn in_load_order<'a>(
    mut attributed: Vec<(String, &'a Declaration)>,
    order: &[String],
) -> Vec<(String, &'a Declaration)> {
    let rank: BTreeMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();
    attributed.retain(|(module, _)| rank.contains_key(module.as_str()));
    attributed.sort_by_key(|(module, _)| rank.get(module.as_str()).copied());
    attributed
}

fn build_graph(
    config: &ProjectConfig,
    modules: &ModuleIndex,
    outlines: &[FileOutline],
    ordered: &[(String, &Declaration)],
    plugins: &[MergedPlugin],
    observers: &[MergedObserver],
) -> DependencyGraph {
    let mut builder = GraphBuilder::new(modules);
    for outline in outlines {
        builder.add_outline(outline);
    }
    builder.add_module_edges(modules);
    for (module, declaration) in ordered {
        builder.add_declaration(module, declaration);
    }
    for plugin in plugins {
        builder.add_plugin(plugin);
    }
    for observer in observers {
        builder.add_observer(observer);
    }
    builder.build(modules, &config.subset_map(), config.graph.max_evidence_per_edge)
}

/// Preferences and virtual types, in load order, as override declarations.
fn build_overrides(ordered: &[(String, &Declaration)]) -> OverrideSet {
    let mut overrides = OverrideSet::new();
    for (module, declaration) in ordered {
        match declaration {
            Declaration::Preference(p) => overrides.push(
                p.target.clone(),
                p.scope.clone(),
                OverrideDeclaration {
                    resolved_type: p.implementation.clone(),
                    module: module.to_string(),
                    evidence: p.evidence.clone(),
                },
            ),
            Declaration::VirtualType(v) => overrides.push(
                v.name.clone(),
                v.scope.clone(),
                OverrideDeclaration {
                    resolved_type: v.base_type.clone(),
                    module: module.to_string(),
                    evidence: v.evidence.clone(),
                },
            ),
            _ => {}
        }
    }
    overrides
}

/// Web API routes plus the configured entry points.
fn entry_points(files: &[DeclarationFile], config: &ProjectConfig, scopes: &ScopeList) -> Vec<EntryPoint> {
    let routes = files
        .iter()
        .flat_map(|f| f.declarations.iter())
        .filter_map(|d| match d {
            Declaration::Route(r) => Some(EntryPoint {
                id: format!("{} {}", r.http_method, r.url),
                interface: r.service_class.clone(),
                scope: WEBAPI_SCOPE.to_string(),
                method: Some(r.service_method.clone()),
                evidence: Some(r.evidence.clone()),
            }),
            _ => None,
        });
    let configured = config.entry_points.iter().map(|e| EntryPoint {
        id: e.id.clone(),
        interface: e.interface.clone(),
        scope: e.scope.clone().unwrap_or_else(|| scopes.global().to_string()),
        method: e.method.clone(),
        evidence: None,
    });
    routes.chain(configured).collect()
}
