pub mod config;
pub mod metrics;

pub use config::{
    AnalysisConfig, BuildConfig, LinkPredictionConfig, MergeConfig, OperationMode, PipelineConfig,
};
pub use metrics::{StageTiming, StageTimings, TimedOperation};

use analytics::{
    CentralityReport, ConnectivitySummary, LinkCandidate, LinkPredictor, TraversalReport,
    compute_both, connectivity_summary, traverse,
};
use anyhow::{Context, Result, bail};
use communities::{CommunityResult, ConsensusDetector};
use eval::{NodePropertyPredictor, NodePropertyReport, StatisticalValidator, ValidationReport};
use extract::{NoopMatcher, TermMatcher, load_ontology_dir, matcher_for};
use graph::{BuildStats, GraphBuilder, GraphConfig, KnowledgeGraph, write_node_link};
use ingest::{LoadOptions, SkippedFile, SourceWeights, load_documents};
use merge::{MergeOutcome, RecordMerger};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Everything the analyses produce for one graph.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub build: BuildStats,
    pub connectivity: ConnectivitySummary,
    pub communities: CommunityResult,
    pub centrality: CentralityReport,
    pub link_predictions: Vec<LinkCandidate>,
    pub node_property: Option<NodePropertyReport>,
    pub traversal: TraversalReport,
    pub validation: Option<ValidationReport>,
    pub skipped: Vec<SkippedFile>,
    pub timings: StageTimings,
}

pub struct PipelineOutcome {
    pub merge: MergeOutcome,
    pub graph: Arc<KnowledgeGraph>,
    pub report: AnalysisReport,
}

/// Optional inputs resolved from the configuration before a run.
struct Resources {
    weights: SourceWeights,
    matcher: Box<dyn TermMatcher>,
    graph_config: GraphConfig,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    async fn resources(&self) -> Resources {
        let merge = &self.config.merge;

        let weights = match &merge.source_weights {
            Some(path) => SourceWeights::load(path).await,
            None => SourceWeights::default(),
        };

        let matcher: Box<dyn TermMatcher> = match &merge.ontology_dir {
            Some(dir) => match load_ontology_dir(dir).await {
                Ok(dict) => matcher_for(Some(dict), merge.fuzzy_cutoff),
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Ontology load failed; normalization disabled");
                    Box::new(NoopMatcher)
                }
            },
            None => Box::new(NoopMatcher),
        };

        let graph_config = match &self.config.build.graph_config_dir {
            Some(dir) => GraphConfig::load(dir).await,
            None => GraphConfig::default(),
        };

        Resources {
            weights,
            matcher,
            graph_config,
        }
    }

    /// Load, merge, build, then analyse the documents under `input`.
    pub async fn run(&self, input: &Path) -> Result<PipelineOutcome> {
        let total = TimedOperation::start();
        let mut timings = StageTimings::default();
        let resources = self.resources().await;

        let timer = TimedOperation::start();
        let loaded = load_documents(
            input,
            &LoadOptions {
                schema: &self.config.build.flat_schema,
                weights: &resources.weights,
                max_documents: self.config.build.max_documents,
            },
        )
        .await
        .with_context(|| format!("Failed to load documents from {:?}", input))?;
        timings.record("load", timer.elapsed());

        if loaded.documents.is_empty() {
            bail!(
                "No usable documents in {:?} ({} skipped)",
                input,
                loaded.skipped.len()
            );
        }
        info!(
            documents = loaded.documents.len(),
            skipped = loaded.skipped.len(),
            "Loaded documents"
        );

        let merger = RecordMerger::new(resources.weights, resources.matcher);
        let (merged, elapsed) = TimedOperation::measure(|| merger.merge(&loaded.documents));
        timings.record("merge", elapsed);

        let builder = GraphBuilder::new(
            self.config.build.flat_schema.clone(),
            resources.graph_config.clone(),
        );
        let ((graph, build), elapsed) = TimedOperation::measure(|| builder.build(&merged.documents()));
        timings.record("build", elapsed);
        info!(
            nodes = build.n_nodes,
            edges = build.n_edges,
            "Graph built"
        );

        let graph = Arc::new(graph);
        let mut report = self
            .analyse(Arc::clone(&graph), build, &resources.graph_config, timings)
            .await?;
        report.skipped = loaded.skipped;
        report.timings.finish(total.elapsed());

        Ok(PipelineOutcome {
            merge: merged,
            graph,
            report,
        })
    }

    /// Runs every analysis over a built graph. Connectivity, communities and
    /// centrality only read the graph and run concurrently.
    pub async fn analyse(
        &self,
        graph: Arc<KnowledgeGraph>,
        build: BuildStats,
        graph_config: &GraphConfig,
        mut timings: StageTimings,
    ) -> Result<AnalysisReport> {
        let analysis = &self.config.analysis;

        let connectivity_task = {
            let graph = Arc::clone(&graph);
            let preview = analysis.isolate_preview;
            tokio::task::spawn_blocking(move || {
                TimedOperation::measure(|| connectivity_summary(&graph, preview))
            })
        };
        let communities_task = {
            let graph = Arc::clone(&graph);
            let random_state = analysis.random_state;
            tokio::task::spawn_blocking(move || {
                TimedOperation::measure(|| ConsensusDetector::new(random_state).detect(&graph))
            })
        };
        let centrality_task = {
            let graph = Arc::clone(&graph);
            let sample = analysis.betweenness_sample;
            tokio::task::spawn_blocking(move || TimedOperation::measure(|| compute_both(&graph, sample)))
        };

        let ((connectivity, t_conn), (communities, t_comm), (centrality, t_cent)) =
            tokio::try_join!(connectivity_task, communities_task, centrality_task)
                .context("Analysis task failed")?;
        timings.record("connectivity", t_conn);
        timings.record("communities", t_comm);
        timings.record("centrality", t_cent);

        let predictor = LinkPredictor::new(
            analysis.link_prediction.mode,
            analysis.link_prediction.limit,
            Some(graph_config.plausible_edge_types()),
        );
        let (link_predictions, elapsed) = TimedOperation::measure(|| predictor.predict(&graph));
        timings.record("link_prediction", elapsed);

        let (node_property, elapsed) = TimedOperation::measure(|| {
            NodePropertyPredictor::new(analysis.holdout_fraction, analysis.holdout_seed)
                .evaluate(&graph)
        });
        timings.record("node_property", elapsed);

        let (traversal, elapsed) = TimedOperation::measure(|| traverse(&graph, &analysis.seeds));
        timings.record("traversal", elapsed);

        let validation = if analysis.validation {
            let (report, elapsed) = TimedOperation::measure(|| {
                StatisticalValidator::default().validate(
                    &graph,
                    &communities.node_to_community,
                    &centrality,
                )
            });
            timings.record("validation", elapsed);
            Some(report)
        } else {
            None
        };

        info!(
            components = connectivity.n_components,
            communities = communities.communities.len(),
            link_candidates = link_predictions.len(),
            node_property_accuracy = node_property.as_ref().map(|r| r.accuracy),
            "Analysis finished"
        );

        Ok(AnalysisReport {
            build,
            connectivity,
            communities,
            centrality,
            link_predictions,
            node_property,
            traversal,
            validation,
            skipped: Vec::new(),
            timings,
        })
    }
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let body = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {:?}", path))?;
    tokio::fs::write(path, body)
        .await
        .with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}

/// Writes `merged.json`, `graph.json`, `analysis.json` and, when
/// normalization ran, `normalization_stats.json` and `ontology_mapping.json`.
pub async fn write_outputs(outcome: &PipelineOutcome, out_dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("Failed to create output directory: {:?}", out_dir))?;

    write_json(&out_dir.join("merged.json"), &outcome.merge).await?;
    if let Some(summary) = &outcome.merge.normalization {
        write_json(&out_dir.join("normalization_stats.json"), summary).await?;
        write_json(&out_dir.join("ontology_mapping.json"), &outcome.merge.mapping).await?;
    }
    write_node_link(&outcome.graph, &out_dir.join("graph.json")).await?;
    write_json(&out_dir.join("analysis.json"), &outcome.report).await?;

    info!(dir = %out_dir.display(), "Wrote pipeline outputs");
    Ok(())
}
