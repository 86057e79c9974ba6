//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api::{self, AppState};
use crate::config::AppConfig;
use crate::viewer;
use std::path::{Path, PathBuf};
use trimline_core::{
    CascadeReport, ControlKey, Effect, NavCommand, OptionRegistry, ProductData, QueryString,
    RestoreReport, Session, SessionCache, TrimlineError,
    primitives::{MAX_CACHED_PRODUCT_SIZE, PRODUCT_ID_PARAM},
};

// =============================================================================
// COMMAND CONTEXT
// =============================================================================

/// Global options shared by every command.
#[derive(Debug, Clone, Default)]
pub struct CommandContext {
    pub config: AppConfig,
    pub product: Option<PathBuf>,
    pub cache: Option<PathBuf>,
    pub query: String,
    pub json_mode: bool,
    pub verbose: bool,
}

// =============================================================================
// PRODUCT LOADING
// =============================================================================

/// Validate an input path: it must resolve to an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, TrimlineError> {
    let canonical = path.canonicalize().map_err(|e| {
        TrimlineError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(TrimlineError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Read product JSON from disk, bounded by the cache size limit.
fn read_product_file(path: &Path) -> Result<Vec<u8>, TrimlineError> {
    let path = validate_file_path(path)?;
    let metadata = std::fs::metadata(&path)
        .map_err(|e| TrimlineError::IoError(format!("Cannot read file metadata: {}", e)))?;
    if metadata.len() > MAX_CACHED_PRODUCT_SIZE as u64 {
        return Err(TrimlineError::IoError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_CACHED_PRODUCT_SIZE
        )));
    }
    std::fs::read(&path).map_err(|e| TrimlineError::IoError(format!("Cannot read product: {}", e)))
}

/// Product data plus the initial keys to replay when the query is silent.
#[derive(Debug, Clone)]
pub struct LoadedProduct {
    pub product: ProductData,
    pub initial_keys: Vec<ControlKey>,
}

/// Cached initial keys of a product, seeding the cache from the preset.
fn cached_initial_keys(
    cache: &SessionCache,
    product_id: &str,
    product: &ProductData,
) -> Result<Vec<ControlKey>, TrimlineError> {
    let keys = cache.initial_keys(product_id)?;
    if !keys.is_empty() {
        return Ok(keys);
    }
    let keys = product.initial_keys();
    cache.store_initial_keys(product_id, &keys)?;
    Ok(keys)
}

/// Load the product for the current page.
///
/// With a session cache and an `id` query parameter, a cached product is
/// served without touching the product file. Switching to another product
/// drops every cached entry.
pub fn load_product(ctx: &CommandContext) -> Result<LoadedProduct, TrimlineError> {
    let query = QueryString::parse(&ctx.query);
    let wanted = query.get(PRODUCT_ID_PARAM).map(str::to_string);
    let cache = ctx.cache.as_ref().map(SessionCache::open).transpose()?;

    if let (Some(cache), Some(id)) = (&cache, &wanted) {
        if cache.switch_product(id)? {
            tracing::info!(product = %id, "Product changed, session cache cleared");
        }
        if let Some(product) = cache.load_product(id)? {
            tracing::debug!(product = %id, "Product served from session cache");
            let initial_keys = cached_initial_keys(cache, id, &product)?;
            return Ok(LoadedProduct {
                product,
                initial_keys,
            });
        }
    }

    let path = ctx.product.as_deref().ok_or_else(|| {
        TrimlineError::InvalidProduct("No product data (use --product)".to_string())
    })?;
    let bytes = read_product_file(path)?;
    let product = ProductData::from_slice(&bytes).inspect_err(|e| {
        tracing::error!(path = %path.display(), "Product data rejected: {}", e);
    })?;

    let cache_id = wanted.or_else(|| product.id.clone());
    let initial_keys = match (&cache, cache_id) {
        (Some(cache), Some(id)) => {
            cache.switch_product(&id)?;
            cache.store_product(&id, &bytes)?;
            cached_initial_keys(cache, &id, &product)?
        }
        _ => product.initial_keys(),
    };

    Ok(LoadedProduct {
        product,
        initial_keys,
    })
}

/// Log edges that could not be resolved.
fn log_unresolved(registry: &OptionRegistry) {
    for edge in registry.unresolved() {
        tracing::warn!(
            source = %edge.source,
            relation = %edge.relation,
            target = %edge.target,
            reason = ?edge.reason,
            "Dropped unresolved edge"
        );
    }
}

/// Build a session for the loaded product and the page query.
pub fn build_session(ctx: &CommandContext) -> Result<(Session, Vec<ControlKey>), TrimlineError> {
    let loaded = load_product(ctx)?;
    let session = Session::from_product(
        &loaded.product,
        QueryString::parse(&ctx.query),
        ctx.config.session_options(),
    )?;
    log_unresolved(session.configurator().registry());
    tracing::debug!(
        controls = session.configurator().registry().len(),
        pages = session.pager().total(),
        "Session ready"
    );
    Ok((session, loaded.initial_keys))
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

/// One line per effect.
fn describe_effect(registry: &OptionRegistry, effect: &Effect) -> String {
    let key = |id| registry.control(id).key.to_string();
    match effect {
        Effect::Activated { control } => format!("+ {}", key(*control)),
        Effect::Released { control } => format!("- {}", key(*control)),
        Effect::Locked { control, reason } => format!("# {} ({:?})", key(*control), reason),
        Effect::Unlocked { control } => format!("  {} unlocked", key(*control)),
        Effect::Marked { control } => format!("~ {}", key(*control)),
        Effect::Unmarked { control } => format!("  {} unmarked", key(*control)),
        Effect::SecondCodeSwitched { control, second } => {
            format!("  {} second code {}", key(*control), if *second { "on" } else { "off" })
        }
        Effect::SkippedByGuard { control } => format!("  {} (already clicked)", key(*control)),
        Effect::RefusedLocked { control } => format!("! {} is locked", key(*control)),
    }
}

fn print_cascade(registry: &OptionRegistry, report: &CascadeReport, verbose: bool) {
    println!("Click {}", registry.control(report.origin).key);
    for effect in &report.effects {
        if verbose || !matches!(effect, Effect::SkippedByGuard { .. }) {
            println!("  {}", describe_effect(registry, effect));
        }
    }
    for change in &report.field_changes {
        println!("  {} = {:?} (was {:?})", change.field, change.after, change.before);
    }
}

fn print_restore(registry: &OptionRegistry, report: &RestoreReport, verbose: bool) {
    println!("Restored from {:?}", report.source);
    for cascade in &report.cascades {
        print_cascade(registry, cascade, verbose);
    }
    for id in &report.refused {
        println!("  still locked: {}", registry.control(*id).key);
    }
    for code in &report.unmatched {
        println!("  no control for: {}", code);
    }
}

fn print_selection(session: &Session) {
    let outputs = session.configurator().outputs();
    println!();
    println!("Form:");
    for (field, value) in outputs.form() {
        println!("  {:<20} {}", field, value);
    }
    println!("Query: ?{}", outputs.query());
}

// =============================================================================
// INSPECT COMMAND
// =============================================================================

/// Show pages, groups, controls and unresolved edges.
pub fn cmd_inspect(ctx: &CommandContext) -> Result<(), TrimlineError> {
    let (session, initial_keys) = build_session(ctx)?;
    let registry = session.configurator().registry();

    if ctx.json_mode {
        let pages: Vec<serde_json::Value> = registry
            .pages()
            .iter()
            .map(|page| {
                let groups: Vec<serde_json::Value> = page
                    .groups
                    .iter()
                    .map(|&g| {
                        let group = &registry.groups()[g.0];
                        let controls: Vec<serde_json::Value> = group
                            .members
                            .iter()
                            .map(|&id| {
                                let c = registry.control(id);
                                let edges: serde_json::Map<String, serde_json::Value> = c
                                    .all_edges()
                                    .map(|(relation, targets)| {
                                        let keys: Vec<String> = targets
                                            .iter()
                                            .map(|&t| registry.control(t).key.to_string())
                                            .collect();
                                        (relation.to_string(), serde_json::json!(keys))
                                    })
                                    .collect();
                                serde_json::json!({
                                    "key": c.key,
                                    "kind": c.kind,
                                    "label": c.label,
                                    "field": c.binding.field,
                                    "value": c.binding.value,
                                    "code": c.code,
                                    "edges": edges
                                })
                            })
                            .collect();
                        serde_json::json!({
                            "label": group.label,
                            "mode": group.mode,
                            "controls": controls
                        })
                    })
                    .collect();
                serde_json::json!({ "label": page.label, "kind": page.kind, "groups": groups })
            })
            .collect();

        print_json(&serde_json::json!({
            "product_id": session.product_id(),
            "controls": registry.len(),
            "pages": pages,
            "initial_keys": initial_keys,
            "nav_links": session.nav_links(),
            "technical_data": session.technical_data(),
            "unresolved": registry.unresolved()
        }));
        return Ok(());
    }

    println!("Trimline Product");
    println!("================");
    println!("Product:  {}", session.product_id().unwrap_or("-"));
    println!("Controls: {}", registry.len());
    println!();

    for page in registry.pages() {
        println!("[{}]", page.label);
        for &g in &page.groups {
            let group = &registry.groups()[g.0];
            println!("  {} ({:?})", group.label, group.mode);
            for &id in &group.members {
                let c = registry.control(id);
                println!(
                    "    {:<16} {:<28} {}",
                    c.key,
                    c.label,
                    c.code.as_deref().unwrap_or("")
                );
                if ctx.verbose {
                    for (relation, targets) in c.all_edges() {
                        let keys: Vec<String> = targets
                            .iter()
                            .map(|&t| registry.control(t).key.to_string())
                            .collect();
                        println!("      {} -> {}", relation, keys.join(", "));
                    }
                }
            }
        }
    }

    if !initial_keys.is_empty() {
        println!();
        let keys: Vec<&str> = initial_keys.iter().map(ControlKey::as_str).collect();
        println!("Initial selection: {}", keys.join(", "));
    }

    if let Some(text) = session.technical_data() {
        println!();
        println!("Technical data:");
        for line in text.lines() {
            println!("  {}", line.trim());
        }
    }

    if !registry.unresolved().is_empty() {
        println!();
        println!("Unresolved edges:");
        for edge in registry.unresolved() {
            println!(
                "  {} {} {} ({:?})",
                edge.source, edge.relation, edge.target, edge.reason
            );
        }
    }

    Ok(())
}

// =============================================================================
// CLICK COMMAND
// =============================================================================

/// Click controls in order and show every cascade.
pub fn cmd_click(
    ctx: &CommandContext,
    keys: &[String],
    restore: bool,
) -> Result<(), TrimlineError> {
    let (mut session, initial_keys) = build_session(ctx)?;

    let restored = if restore {
        session.apply_initial_state(&initial_keys)
    } else {
        None
    };

    let mut reports = Vec::with_capacity(keys.len());
    for key in keys {
        reports.push(session.click(&ControlKey::new(key.as_str()))?);
    }

    let configurator = session.configurator();
    if ctx.json_mode {
        print_json(&serde_json::json!({
            "restore": restored,
            "cascades": reports,
            "snapshot": configurator.snapshot(),
            "query": configurator.outputs().query().to_string()
        }));
        return Ok(());
    }

    if let Some(report) = &restored {
        print_restore(configurator.registry(), report, ctx.verbose);
    }
    for report in &reports {
        print_cascade(configurator.registry(), report, ctx.verbose);
    }
    print_selection(&session);

    Ok(())
}

// =============================================================================
// RESTORE COMMAND
// =============================================================================

/// Replay the initial selection from the query or the cached keys.
pub fn cmd_restore(ctx: &CommandContext) -> Result<(), TrimlineError> {
    let (mut session, initial_keys) = build_session(ctx)?;
    let report = session.apply_initial_state(&initial_keys);

    if ctx.json_mode {
        print_json(&serde_json::json!({
            "restore": report,
            "snapshot": session.configurator().snapshot(),
            "query": session.configurator().outputs().query().to_string()
        }));
        return Ok(());
    }

    if let Some(report) = &report {
        print_restore(session.configurator().registry(), report, ctx.verbose);
    }
    print_selection(&session);

    Ok(())
}

// =============================================================================
// NAV COMMAND
// =============================================================================

/// Drive the page navigation and show where it ends up.
pub fn cmd_nav(
    ctx: &CommandContext,
    steps: &[String],
    jump: Option<usize>,
    page: Option<&str>,
) -> Result<(), TrimlineError> {
    let (mut session, _) = build_session(ctx)?;

    if let Some(label) = page {
        session.navigate_to_label(label)?;
    }

    let mut commands = Vec::with_capacity(steps.len() + 1);
    if let Some(index) = jump {
        commands.push(NavCommand::Jump(index));
    }
    for step in steps {
        commands.push(match step.as_str() {
            "prev" => NavCommand::Prev,
            _ => NavCommand::Next,
        });
    }

    for command in commands {
        let moved = session.navigate(command)?;
        if !moved {
            tracing::debug!(?command, "Navigation did not move");
        }
    }

    let view = session.pager_view();
    if ctx.json_mode {
        print_json(&serde_json::json!({
            "view": view,
            "entries": session.pager().entries()
        }));
        return Ok(());
    }

    for (i, entry) in session.pager().entries().iter().enumerate() {
        let marker = if i == view.current { ">" } else { " " };
        println!("{} {}", marker, entry.label);
    }
    println!();
    println!(
        "{}  {}  {}",
        if view.prev_hidden { " " } else { "<" },
        view.indicator,
        if view.next_hidden { " " } else { ">" }
    );

    Ok(())
}

// =============================================================================
// CACHE COMMAND
// =============================================================================

/// Show what the session cache holds.
pub fn cmd_cache(ctx: &CommandContext) -> Result<(), TrimlineError> {
    let path = ctx.cache.as_deref().ok_or_else(|| {
        TrimlineError::CacheError("No session cache given (use --cache)".to_string())
    })?;
    let cache = SessionCache::open(path)?;
    let current = cache.current_product()?;
    let (cached, keys) = match current.as_deref() {
        Some(id) => (
            cache.load_product(id)?.is_some(),
            cache.initial_keys(id)?,
        ),
        None => (false, Vec::new()),
    };

    if ctx.json_mode {
        print_json(&serde_json::json!({
            "cache": path.to_string_lossy(),
            "current_product": current,
            "product_cached": cached,
            "initial_keys": keys
        }));
        return Ok(());
    }

    println!("Trimline Session Cache");
    println!("======================");
    println!("Cache:   {}", path.display());
    println!("Product: {}", current.as_deref().unwrap_or("-"));
    println!("Data:    {}", if cached { "cached" } else { "absent" });
    let keys: Vec<&str> = keys.iter().map(ControlKey::as_str).collect();
    println!("Initial: {}", keys.join(", "));

    Ok(())
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the session server and replay the initial selection once the
/// viewer is ready.
pub async fn cmd_server(
    ctx: &CommandContext,
    host: Option<String>,
    port: Option<u16>,
    page_url: String,
) -> Result<(), TrimlineError> {
    let (session, initial_keys) = build_session(ctx)?;
    let host = host.unwrap_or_else(|| ctx.config.server.host.clone());
    let port = port.unwrap_or(ctx.config.server.port);
    let timeout = ctx.config.viewer.timeout_for(&page_url);

    println!("Trimline Session Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    println!("  Product:  {}", session.product_id().unwrap_or("-"));
    println!("  Page:     {}", page_url);
    println!("  Viewer:   {} ms timeout", timeout.as_millis());
    println!();
    println!("Endpoints:");
    println!("  GET  /state         - Form, query and navigation");
    println!("  GET  /controls      - Control states");
    println!("  POST /click         - Click a control");
    println!("  POST /nav           - Navigate pages");
    println!("  POST /viewer/ready  - Report viewer readiness");
    println!("  GET  /lead          - Lead form payload");
    println!("  GET  /health        - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let state = AppState::new(session, page_url.clone());
    tokio::spawn(viewer::restore_when_ready(
        state.session.clone(),
        state.viewer.clone(),
        ctx.config.viewer.clone(),
        page_url,
        initial_keys,
    ));

    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, state).await
}
