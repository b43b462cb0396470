//! Command implementations

use crate::cli::OutputFormat;
use anyhow::{bail, Context, Result};
use maple_core::ast::source::ModuleSource;
use maple_core::ast::AstPool;
use maple_core::cfg::{CfgBuilder, CfgModule, FuncId};
use maple_core::dfa::{AstDfa, DefUseReport};
use maple_core::{DfaConfig, StringTable};
use rayon::prelude::*;
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name used for module-level code.
pub const MODULE_FUNCTION: &str = "<module>";

/// A parsed, lowered and validated input file.
struct LoadedModule {
    strings: StringTable,
    pool: AstPool,
    cfg: CfgModule,
}

fn load_module(path: &Path) -> Result<LoadedModule> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let source = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => ModuleSource::from_json(&text),
        Some("yaml") | Some("yml") => ModuleSource::from_yaml(&text),
        _ => bail!(
            "{}: unknown input format (expected .json, .yaml or .yml)",
            path.display()
        ),
    }
    .with_context(|| format!("failed to parse {}", path.display()))?;

    let strings = StringTable::new();
    let (pool, module) = source
        .lower(&strings)
        .with_context(|| format!("failed to lower {}", path.display()))?;
    let cfg = CfgBuilder::build(&pool, module)
        .with_context(|| format!("failed to build CFG for {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid CFG for {}", path.display()))?;
    debug!(
        path = %path.display(),
        nodes = pool.len(),
        functions = cfg.functions().len(),
        "loaded module"
    );
    Ok(LoadedModule { strings, pool, cfg })
}

pub fn load_config(path: Option<&Path>) -> Result<DfaConfig> {
    let Some(path) = path else {
        return Ok(DfaConfig::default());
    };
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
}

fn function_name(module: &LoadedModule, func: FuncId) -> String {
    let node = module.pool.node(module.cfg.func(func).func_node);
    if node.str_idx().is_empty() {
        MODULE_FUNCTION.to_string()
    } else {
        module.strings.get_string(node.str_idx()).to_string()
    }
}

struct FunctionResult {
    name: String,
    report: DefUseReport,
    text: String,
}

fn analyse_function(
    module: &LoadedModule,
    func: FuncId,
    config: &DfaConfig,
    dump_bits: bool,
) -> FunctionResult {
    let mut dfa = AstDfa::with_config(&module.pool, &module.cfg, config.clone());
    dfa.data_flow_analysis(func);
    let mut text = dfa.dump_def_use(&module.strings);
    if dump_bits {
        text.push_str(&dfa.dump_bit_vectors());
    }
    FunctionResult {
        name: function_name(module, func),
        report: dfa.report(&module.strings),
        text,
    }
}

#[derive(Serialize)]
struct FileReport {
    file: PathBuf,
    functions: Vec<DefUseReport>,
}

pub struct DfaArgs {
    pub input: Vec<PathBuf>,
    pub function: Option<String>,
    pub format: OutputFormat,
    pub jobs: Option<usize>,
    pub dump_bits: bool,
}

/// Runs the dataflow analysis and renders the results.
pub fn dfa(args: &DfaArgs, config: &DfaConfig) -> Result<String> {
    let pool = match args.jobs {
        Some(0) => bail!("--jobs must be at least 1"),
        Some(n) => Some(
            rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .context("failed to start worker threads")?,
        ),
        None => None,
    };

    let mut out = String::new();
    let mut file_reports = Vec::new();
    for path in &args.input {
        let module = load_module(path)?;
        let funcs: Vec<FuncId> = module
            .cfg
            .functions()
            .iter()
            .map(|f| f.id)
            .filter(|&f| {
                args.function
                    .as_deref()
                    .map_or(true, |wanted| function_name(&module, f) == wanted)
            })
            .collect();
        if funcs.is_empty() {
            if let Some(wanted) = &args.function {
                bail!("{}: no function named `{}`", path.display(), wanted);
            }
        }

        let run = || -> Vec<FunctionResult> {
            funcs
                .par_iter()
                .map(|&f| analyse_function(&module, f, config, args.dump_bits))
                .collect()
        };
        let results = match &pool {
            Some(pool) => pool.install(run),
            None => run(),
        };
        info!(
            path = %path.display(),
            functions = results.len(),
            "analysed module"
        );

        match args.format {
            OutputFormat::Text => {
                let _ = writeln!(out, "# {}", path.display());
                for result in &results {
                    let _ = writeln!(
                        out,
                        "== {} ({} defs, {} iterations) ==",
                        result.name,
                        result.report.defs.len(),
                        result.report.iterations
                    );
                    out.push_str(&result.text);
                }
            }
            OutputFormat::Json => file_reports.push(FileReport {
                file: path.clone(),
                functions: results.into_iter().map(|r| r.report).collect(),
            }),
        }
    }

    if args.format == OutputFormat::Json {
        out = serde_json::to_string_pretty(&file_reports)?;
        out.push('\n');
    }
    Ok(out)
}

#[derive(Serialize)]
struct BlockJson {
    id: u32,
    kind: String,
    attrs: String,
    stmts: Vec<u32>,
    succs: Vec<u32>,
    preds: Vec<u32>,
}

#[derive(Serialize)]
struct FunctionJson {
    name: String,
    entry: u32,
    exit: u32,
    blocks: Vec<BlockJson>,
}

/// Renders the CFG of one module.
pub fn cfg(input: &Path, format: OutputFormat) -> Result<String> {
    let module = load_module(input)?;
    match format {
        OutputFormat::Text => Ok(module.cfg.to_string()),
        OutputFormat::Json => {
            let functions: Vec<FunctionJson> = module
                .cfg
                .functions()
                .iter()
                .map(|f| FunctionJson {
                    name: function_name(&module, f.id),
                    entry: f.entry.0,
                    exit: f.exit.0,
                    blocks: f
                        .blocks()
                        .iter()
                        .map(|&id| {
                            let bb = module.cfg.bb(id);
                            BlockJson {
                                id: id.0,
                                kind: format!("{:?}", bb.kind),
                                attrs: format!("{:?}", bb.attrs),
                                stmts: bb.statements().iter().map(|s| s.0).collect(),
                                succs: bb.successors().iter().map(|s| s.0).collect(),
                                preds: bb.predecessors().iter().map(|s| s.0).collect(),
                            }
                        })
                        .collect(),
                })
                .collect();
            let mut out = serde_json::to_string_pretty(&functions)?;
            out.push('\n');
            Ok(out)
        }
    }
}
