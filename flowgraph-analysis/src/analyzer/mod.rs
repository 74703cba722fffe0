//! Analysis driver.
//!
//! Owns the klass table and configuration, runs the passes in order —
//! declare, load, link overrides, frame/scope pass, cross-method effect
//! fixpoint — and then materializes per-method graphs on demand.

use tracing::{debug, info, warn};

use flowgraph_core::config::AnalysisConfig;
use flowgraph_core::errors::{AnalysisError, AnalysisReport, ParseError};
use flowgraph_core::traits::Cancellable;
use flowgraph_core::types::collections::FxHashMap;

use crate::ast::CompilationUnit;
use crate::frames::{FrameBuilder, FramePass, FrameTree};
use crate::frontend::JavaFrontend;
use crate::graph::{Graph, GraphBuilder};
use crate::klass::{KlassTable, LibraryResolver, MethodId};
use crate::scopes::RefSet;
use crate::summary::{summarize, MethodSummary};

/// The per-method result of the first pass, kept for the graph pass.
pub type MethodAnalysis = FramePass;

/// Facade over the whole pipeline.
pub struct Analyzer {
    config: AnalysisConfig,
    table: KlassTable,
    analyses: FxHashMap<MethodId, MethodAnalysis>,
    built: bool,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            table: KlassTable::new(),
            analyses: FxHashMap::default(),
            built: false,
        }
    }

    pub fn table(&self) -> &KlassTable {
        &self.table
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Install a library resolver ahead of the built-ins.
    pub fn install_library(&mut self, resolver: Box<dyn LibraryResolver>) {
        self.table.install_library(resolver);
    }

    /// Register an already-normalized compilation unit.
    pub fn add_source(&mut self, unit: &CompilationUnit) {
        let declared = self.table.declare_unit(unit);
        debug!(count = declared.len(), "declared klasses");
        self.built = false;
    }

    /// Parse Java source through the front end and register it.
    pub fn add_java(&mut self, name: &str, source: &str) -> Result<(), ParseError> {
        let unit = JavaFrontend::new()?.parse_unit(name, source)?;
        self.add_source(&unit);
        Ok(())
    }

    /// Run everything up to (but not including) graph construction:
    /// load all klasses, link overrides, build frames and scopes, and
    /// iterate method effects to fixpoint. Per-klass and per-method
    /// failures are collected, not fatal.
    pub fn build(&mut self) -> AnalysisReport<()> {
        let mut report = AnalysisReport::new(());

        let klass_ids: Vec<_> = self.table.klass_ids().collect();
        for id in klass_ids {
            if let Err(e) = self.table.load(id) {
                report.add_error(e.into());
            }
        }
        self.table.link_overrides();

        let methods: Vec<MethodId> = self
            .table
            .method_ids()
            .filter(|&m| self.table.method(m).has_body)
            .collect();
        for &m in &methods {
            match FrameBuilder::run(&mut self.table, &self.config, m) {
                Ok(analysis) => {
                    self.analyses.insert(m, analysis);
                }
                Err(e) => {
                    warn!(
                        method = %self.table.method(m).signature,
                        error = %e,
                        "frame pass failed; skipping method"
                    );
                    report.add_error(e);
                }
            }
        }

        self.fixpoint_effects(&methods);

        for &m in &methods {
            if let Some(analysis) = self.analyses.get_mut(&m) {
                analysis.frames.seal(&self.table, &analysis.scopes);
            }
        }
        self.built = true;
        info!(
            methods = self.analyses.len(),
            errors = report.error_count(),
            "analysis build complete"
        );
        report
    }

    /// Aggregate method effect sets transitively over the call graph
    /// with override closure. Monotone on finite ref sets, so the
    /// iteration terminates.
    fn fixpoint_effects(&mut self, methods: &[MethodId]) {
        // Direct (own-body) effects never change across rounds.
        let mut direct: FxHashMap<MethodId, (RefSet, RefSet)> = FxHashMap::default();
        for &m in methods {
            let Some(analysis) = self.analyses.get(&m) else {
                continue;
            };
            let mut ins = RefSet::new();
            let mut outs = RefSet::new();
            for frame in analysis.frames.all_frames() {
                ins.extend(frame.inputs.iter().filter(|r| r.is_exported_effect()).cloned());
                outs.extend(
                    frame
                        .outputs
                        .iter()
                        .filter(|r| r.is_exported_effect())
                        .cloned(),
                );
            }
            direct.insert(m, (ins, outs));
        }

        loop {
            let mut changed = false;
            for &m in methods {
                let Some((mut ins, mut outs)) = direct.get(&m).cloned() else {
                    continue;
                };
                for callee in self.table.method(m).call_sites.clone() {
                    for o in self.table.override_closure(callee) {
                        let callee_m = self.table.method(o);
                        ins.extend(callee_m.input_refs.iter().cloned());
                        outs.extend(callee_m.output_refs.iter().cloned());
                    }
                }
                let record = self.table.method(m);
                if record.input_refs != ins || record.output_refs != outs {
                    let record = self.table.method_mut(m);
                    record.input_refs = ins;
                    record.output_refs = outs;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }

    /// Build the dataflow graph of one method.
    pub fn analyze_method(&mut self, method: MethodId) -> Result<Graph, AnalysisError> {
        if !self.built {
            let _ = self.build();
        }
        let signature = self.table.method(method).signature.clone();
        let analysis = self.analyses.get(&method).ok_or_else(|| {
            AnalysisError::from(flowgraph_core::errors::ResolveError::KlassNotLoaded {
                name: signature.clone(),
            })
            .in_method(signature.clone())
        })?;
        let decl = self
            .table
            .source_method_decl(method)
            .ok_or_else(|| {
                AnalysisError::from(flowgraph_core::errors::ResolveError::KlassNotLoaded {
                    name: signature.clone(),
                })
            })?;
        GraphBuilder::build(
            &self.table,
            &analysis.scopes,
            &analysis.frames,
            &analysis.res,
            &self.config,
            method,
            &decl,
        )
    }

    /// Analyze every source method, collecting per-method failures.
    /// The cancellation token is checked between methods only.
    pub fn analyze_all(
        &mut self,
        cancel: Option<&dyn Cancellable>,
    ) -> AnalysisReport<Vec<MethodSummary>> {
        if !self.built {
            let _ = self.build();
        }
        let mut report = AnalysisReport::new(Vec::new());
        let mut methods: Vec<MethodId> = self.analyses.keys().copied().collect();
        methods.sort();
        for m in methods {
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    report.add_error(AnalysisError::Cancelled);
                    break;
                }
            }
            match self.analyze_method(m) {
                Ok(graph) => report.data.push(summarize(&self.table, &graph)),
                Err(e) => {
                    warn!(error = %e, "method analysis failed");
                    report.add_error(e);
                }
            }
        }
        report
    }

    /// Convenience lookup for drivers and tests.
    pub fn find_method(&self, klass: &str, name: &str) -> Option<MethodId> {
        let k = self.table.by_qualified_name(klass)?;
        self.table.method_named(k, name)
    }

    /// Direct access to a finished frame tree (diagnostics, tests).
    pub fn frames_of(&self, method: MethodId) -> Option<&FrameTree> {
        self.analyses.get(&method).map(|a| &a.frames)
    }

    /// Direct access to the first pass's resolution facts.
    pub fn resolutions_of(&self, method: MethodId) -> Option<&crate::frames::Resolutions> {
        self.analyses.get(&method).map(|a| &a.res)
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}
