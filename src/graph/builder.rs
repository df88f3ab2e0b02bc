//! Frame-Graph Builder
//!
//! Orchestrates a full build: loads and compiles the three grammars at
//! construction, then per build scans the frame-graph directory, runs
//! the preprocessor, parses the pass sources in frame-graph order,
//! validates resources program-wide, compiles each pass's pipeline,
//! lowers root parameters into routed arguments and emplaces the typed
//! pass variants.
//!
//! A build is atomic: any failure leaves the previously built graph
//! untouched. The hot-reload entry point drains in-flight frames before
//! discarding the old graph.

use std::path::Path;

use rustc_hash::FxHashMap;

use crate::config::{
    FRAMEGRAPH_GRAMMAR_FILE, PASS_GRAMMAR_FILE, PREPROCESSOR_GRAMMAR_FILE, RendererConfig,
};
use crate::errors::{CinderError, Result};
use crate::frontend::framegraph_source::parse_frame_graph_source;
use crate::frontend::grammar::Grammar;
use crate::frontend::pass_source::{PassParametersSource, parse_pass_source};
use crate::frontend::preprocessor::Preprocessor;
use crate::graph::passes::{PassParameters, ScenePass};
use crate::graph::pipeline::compile_pass;
use crate::graph::resources::validate_resources;
use crate::graph::rootsig::lower_root_params;
use crate::rhi::device::RenderDevice;

use super::{FrameGraph, RendererHost};
use super::watcher::FrameGraphWatcher;

/// Compiles frame graphs from the configured source directory.
pub struct FrameGraphBuilder {
    config: RendererConfig,
    preprocessor_grammar: Grammar,
    pass_grammar: Grammar,
    framegraph_grammar: Grammar,
}

impl FrameGraphBuilder {
    /// Loads and compiles the three grammar files.
    pub fn new(config: RendererConfig) -> Result<Self> {
        let preprocessor_grammar = load_grammar(&config, PREPROCESSOR_GRAMMAR_FILE)?;
        let pass_grammar = load_grammar(&config, PASS_GRAMMAR_FILE)?;
        let framegraph_grammar = load_grammar(&config, FRAMEGRAPH_GRAMMAR_FILE)?;
        Ok(Self {
            config,
            preprocessor_grammar,
            pass_grammar,
            framegraph_grammar,
        })
    }

    #[must_use]
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Builds a frame graph from the current on-disk sources.
    pub fn build(&self, device: &dyn RenderDevice, draw_area: (u32, u32)) -> Result<FrameGraph> {
        let dir = self.config.checked_frame_graph_dir()?;
        let (pass_files, frame_graph_file) = scan_sources(dir, &self.config)?;

        let Some((frame_graph_name, frame_graph_text)) = frame_graph_file else {
            return Err(CinderError::ConfigMissing(format!(
                "frame-graph file (*.{}) in {}",
                self.config.frame_graph_ext,
                dir.display()
            )));
        };

        let pass_names = parse_frame_graph_source(
            &self.framegraph_grammar,
            &frame_graph_name,
            &frame_graph_text,
        )?;

        // Preprocess and parse every listed pass, in frame-graph order.
        let preprocessor = Preprocessor::new(&self.preprocessor_grammar);
        let mut sources: Vec<PassParametersSource> = Vec::with_capacity(pass_names.len());
        for pass_name in &pass_names {
            let raw = pass_files.get(pass_name).ok_or_else(|| {
                CinderError::ConfigMissing(format!(
                    "pass file '{pass_name}.{}' in {}",
                    self.config.pass_ext,
                    dir.display()
                ))
            })?;
            let expanded = preprocessor.substitute(pass_name, raw, |include| {
                let path = dir.join(include);
                std::fs::read_to_string(&path).map_err(|e| {
                    CinderError::ConfigMissing(format!("included file {}: {e}", path.display()))
                })
            })?;
            sources.push(parse_pass_source(&self.pass_grammar, pass_name, &expanded)?);
        }

        validate_resources(
            sources
                .iter()
                .map(|s| (s.name.as_str(), s.input, s.resources.as_slice())),
        )?;

        let mut graph = FrameGraph::new();
        for source in sources {
            // The source is consumed by this iteration: pipeline compile
            // reads it, lowering routes its root parameters, and the rest
            // moves into the pass parameters.
            let compiled = compile_pass(device, &source, draw_area)?;
            let routed = lower_root_params(
                &source.name,
                &source.root_sig,
                &source.resources,
                &mut graph.passes_global_res,
                &mut graph.obj_global_res_template[source.input.index()],
            )?;
            let params = PassParameters {
                name: source.name,
                input: source.input,
                topology: source.topology,
                viewport: compiled.viewport,
                color_target: source.color_target,
                depth_target: source.depth_target,
                input_layout: compiled.input_layout,
                pipeline: compiled.pipeline,
                root_signature: compiled.root_signature,
                pass_local: routed.pass_local,
                per_object_local_template: routed.per_object_local_template,
                pass_global_indices: routed.pass_global_indices,
                per_object_global_indices_template: routed.per_object_global_indices_template,
            };
            graph.passes.push(ScenePass::init(params));
        }

        log::info!(
            "built frame graph: {} passes, {} pass-global arguments",
            graph.passes.len(),
            graph.passes_global_res.len()
        );
        Ok(graph)
    }

    /// Hot-reload entry point. If the watcher saw a change, drains all
    /// in-flight frames, rebuilds and swaps the graph. Returns whether a
    /// rebuild happened; on failure the previous graph stays live and the
    /// error is propagated.
    pub fn rebuild_if_dirty(
        &self,
        watcher: &mut FrameGraphWatcher,
        device: &dyn RenderDevice,
        host: &mut dyn RendererHost,
        current: &mut FrameGraph,
    ) -> Result<bool> {
        watcher.poll()?;
        if !watcher.take_dirty() {
            return Ok(false);
        }
        host.flush_all_frames();
        match self.build(device, host.draw_area_size()) {
            Ok(graph) => {
                *current = graph;
                Ok(true)
            }
            Err(error) => {
                log::error!("frame-graph rebuild failed, keeping previous graph: {error}");
                Err(error)
            }
        }
    }
}

fn load_grammar(config: &RendererConfig, file_name: &str) -> Result<Grammar> {
    let path = config.grammar_path(file_name)?;
    let text = std::fs::read_to_string(&path)?;
    Grammar::compile(&text).map_err(|e| {
        CinderError::ConfigMissing(format!(
            "grammar file {} is malformed at offset {}: {}",
            path.display(),
            e.offset,
            e.message
        ))
    })
}

type PassFiles = FxHashMap<String, String>;

/// Scans the frame-graph directory: pass sources keyed by stem, plus the
/// single frame-graph file.
fn scan_sources(
    dir: &Path,
    config: &RendererConfig,
) -> Result<(PassFiles, Option<(String, String)>)> {
    let mut pass_files = PassFiles::default();
    let mut frame_graph_file: Option<(String, String)> = None;

    // read_dir enumeration order is filesystem-dependent; sort so that
    // "the first frame-graph file wins" names the same file everywhere.
    let mut paths: Vec<_> = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    paths.sort();

    for path in paths {
        if !path.is_file() {
            continue;
        }
        let (Some(stem), Some(ext)) = (
            path.file_stem().and_then(|s| s.to_str()),
            path.extension().and_then(|s| s.to_str()),
        ) else {
            continue;
        };
        if ext == config.pass_ext {
            pass_files.insert(stem.to_string(), std::fs::read_to_string(&path)?);
        } else if ext == config.frame_graph_ext {
            if frame_graph_file.is_some() {
                log::warn!(
                    "multiple frame-graph files in {}; using the first, ignoring {}",
                    dir.display(),
                    path.display()
                );
                continue;
            }
            frame_graph_file = Some((
                path.file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or(stem)
                    .to_string(),
                std::fs::read_to_string(&path)?,
            ));
        }
    }
    Ok((pass_files, frame_graph_file))
}
