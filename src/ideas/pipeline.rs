// Ideaflow - The blog idea DAG: get_products -> generate_blog_idea (mapped) -> display_blog_ideas

use super::display::{self, display_blog_ideas, IdeaRow};
use super::generate::{self, IdeaGenerator};
use super::products::{self, get_products};
use crate::config::Config;
use crate::metrics::{Metrics, MetricsReport};
use crate::provider::LLMProvider;
use crate::workflow::{
    collect_successes, expand, DagRun, InstanceSummary, MappedInstance, TaskState, Upstream,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    #[serde(flatten)]
    pub run: DagRun,
    pub finished_at: DateTime<Utc>,
    /// State of `display_blog_ideas`: `success`, or `skipped` when any
    /// mapped instance was skipped.
    pub display: TaskState,
    /// Empty when the display step was skipped.
    pub rows: Vec<IdeaRow>,
    /// One entry per mapped `generate_blog_idea` instance, in map-index order.
    pub instances: Vec<InstanceSummary>,
    pub metrics: MetricsReport,
}

pub struct IdeaPipeline {
    config: Config,
    generator: IdeaGenerator,
}

impl IdeaPipeline {
    pub fn new(provider: Arc<dyn LLMProvider>, config: Config) -> Self {
        let generator = IdeaGenerator::new(provider, &config);
        Self { config, generator }
    }

    /// Execute one DAG run, writing the displayed rows to `out`.
    ///
    /// Fails without displaying anything if any mapped instance failed. If
    /// none failed but some were skipped, the display step is skipped and
    /// nothing is written.
    pub async fn run<W: Write>(&self, out: &mut W) -> anyhow::Result<RunReport> {
        self.run_with_metrics(&Metrics::new(), out).await
    }

    async fn run_with_metrics<W: Write>(
        &self,
        metrics: &Metrics,
        out: &mut W,
    ) -> anyhow::Result<RunReport> {
        let run = DagRun::start(&self.config.workflow.dag_id);

        let products = get_products(&self.config.workflow);
        tracing::info!(task_id = products::TASK_ID, count = products.len(), "Products loaded");

        let instances = expand(
            generate::TASK_ID,
            products,
            self.config.workflow.max_active_tasks,
            |_, product| self.generator.generate(product, metrics),
        )
        .await;

        let summaries: Vec<InstanceSummary> =
            instances.iter().map(MappedInstance::summary).collect();
        for instance in &instances {
            metrics.record_instance(instance.state()).await;
        }

        let (display_state, rows) = match collect_successes(generate::TASK_ID, instances) {
            Ok(Upstream::Ready(ideas)) => {
                let rows = display_blog_ideas(&ideas, out)?;
                tracing::info!(task_id = display::TASK_ID, rows = rows.len(), "Blog ideas displayed");
                (TaskState::Success, rows)
            }
            Ok(Upstream::Skipped { skipped, total }) => {
                tracing::warn!(
                    dag_id = %run.dag_id,
                    run_id = %run.run_id,
                    task_id = display::TASK_ID,
                    skipped = skipped,
                    total = total,
                    "Upstream instances skipped, skipping display"
                );
                (TaskState::Skipped, Vec::new())
            }
            Err(e) => {
                tracing::error!(
                    dag_id = %run.dag_id,
                    run_id = %run.run_id,
                    task_id = display::TASK_ID,
                    "Upstream failed, DAG run failed: {}",
                    e
                );
                return Err(e.into());
            }
        };

        let metrics = metrics.report().await;
        tracing::info!(
            dag_id = %run.dag_id,
            run_id = %run.run_id,
            display = %display_state,
            succeeded = metrics.succeeded,
            skipped = metrics.skipped,
            llm_requests = metrics.llm_requests,
            total_tokens = metrics.total_tokens,
            "DAG run succeeded"
        );

        Ok(RunReport {
            run,
            finished_at: Utc::now(),
            display: display_state,
            rows,
            instances: summaries,
            metrics,
        })
    }
}
