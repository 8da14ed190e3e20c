//! End-to-end report run.
//!
//! A run resolves the tenants and periods, aggregates every (tenant, period) pair with bounded
//! concurrency, writes one HTML report per pair plus an optional consolidated Markdown report,
//! and emails each report to its tenant. Every job is isolated: a failed aggregation, render,
//! write or delivery is logged, recorded in the [`RunSummary`] and the batch moves on.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDateTime;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{Config, TenantConfig};
use crate::db::handlers::RecordStore;
use crate::email::{EmailService, ReportAttachment, ReportEmail};
use crate::errors::{Error, Result};
use crate::kpi::{KpiResult, compute_kpis};
use crate::periods::{ReportPeriod, resolve_all};
use crate::report::ReportRenderer;

/// File name of the consolidated Markdown report
pub const CONSOLIDATED_REPORT_FILE: &str = "rapport_consolide.md";

/// A job that did not complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub tenant_id: String,
    /// Period slug, or `consolidated` for the consolidated report
    pub period: String,
    /// [`Error::kind`] of the failure
    pub kind: &'static str,
    pub message: String,
}

impl JobFailure {
    fn new(tenant_id: &str, period: &str, error: &Error) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            period: period.to_string(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Outcome of a run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports_written: Vec<PathBuf>,
    /// Reports emailed
    pub sent: usize,
    /// Reports not emailed: no recipient configured, or nothing to report
    pub skipped: usize,
    pub failures: Vec<JobFailure>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Connectivity diagnostics for `--test`
#[derive(Debug)]
pub struct SelfCheck {
    pub tenants: Result<Vec<String>>,
    pub date_range: Result<Option<(NaiveDateTime, NaiveDateTime)>>,
    pub mail_transport: Result<bool>,
}

impl SelfCheck {
    pub fn is_healthy(&self) -> bool {
        self.tenants.is_ok() && self.date_range.is_ok() && matches!(self.mail_transport, Ok(true))
    }
}

/// File stem for a tenant's reports: whitespace and path separators become `_`
pub fn report_file_stem(tenant_id: &str) -> String {
    tenant_id
        .chars()
        .map(|c| if c.is_whitespace() || c == '/' || c == '\\' { '_' } else { c })
        .collect()
}

enum Delivery {
    Sent,
    Skipped,
    Disabled,
}

pub struct ReportRunner {
    config: Config,
    store: Arc<dyn RecordStore>,
    renderer: ReportRenderer,
    email: Option<EmailService>,
}

impl ReportRunner {
    /// `email` is `None` when delivery is disabled
    pub fn new(config: Config, store: Arc<dyn RecordStore>, email: Option<EmailService>) -> Result<Self> {
        Ok(Self {
            config,
            store,
            renderer: ReportRenderer::new()?,
            email,
        })
    }

    /// Run with the current local time as the reference for rolling periods
    pub async fn run(&self, cancel: CancellationToken) -> Result<RunSummary> {
        self.run_at(chrono::Local::now().naive_local(), cancel).await
    }

    /// Run every (tenant, period) job. Only failing to resolve the tenants or to create the
    /// output directory aborts the run; everything else is recorded per job.
    #[instrument(skip(self, cancel), err)]
    pub async fn run_at(&self, now: NaiveDateTime, cancel: CancellationToken) -> Result<RunSummary> {
        let tenants = self.resolve_tenants().await?;
        let periods = resolve_all(&self.config.periods, now);
        let mut summary = RunSummary::default();

        if tenants.is_empty() {
            warn!("No tenants to report on");
            return Ok(summary);
        }

        let output_dir = &self.config.output_dir;
        tokio::fs::create_dir_all(output_dir).await.map_err(|e| Error::Io {
            path: output_dir.display().to_string(),
            source: e,
        })?;

        info!(
            tenants = tenants.len(),
            periods = periods.len(),
            concurrency = self.config.concurrency,
            "Generating KPI reports"
        );

        let jobs: Vec<(usize, usize)> = (0..tenants.len())
            .flat_map(|t| (0..periods.len()).map(move |p| (t, p)))
            .collect();

        let mut results: Vec<((usize, usize), Result<KpiResult>)> = stream::iter(jobs)
            .map(|(t, p)| {
                let cancel = &cancel;
                let (tenant, period) = (&tenants[t], &periods[p]);
                async move { ((t, p), self.aggregate(tenant, period, cancel).await) }
            })
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;

        // Publish in tenant then period order so files and the consolidated report are stable
        results.sort_by_key(|(job, _)| *job);

        let mut sections = Vec::new();
        for ((t, p), result) in results {
            let (tenant, period) = (&tenants[t], &periods[p]);
            let kpis = match result {
                Ok(kpis) => kpis,
                Err(e) => {
                    error!(tenant = %tenant.id, period = %period.slug, kind = e.kind(), error = %e, "KPI aggregation failed");
                    summary.failures.push(JobFailure::new(&tenant.id, &period.slug, &e));
                    continue;
                }
            };

            info!(
                tenant = %tenant.id,
                period = %period.slug,
                calls = kpis.total_calls,
                messages = kpis.total_messages,
                "KPIs computed"
            );

            let attachment = match self.write_report(tenant, period, &kpis, now).await {
                Ok((path, markdown, attachment)) => {
                    summary.reports_written.push(path);
                    sections.push(markdown);
                    attachment
                }
                Err(e) => {
                    error!(tenant = %tenant.id, period = %period.slug, kind = e.kind(), error = %e, "Failed to write report");
                    summary.failures.push(JobFailure::new(&tenant.id, &period.slug, &e));
                    continue;
                }
            };

            match self.deliver(tenant, period, &kpis, &attachment, now, &cancel).await {
                Ok(Delivery::Sent) => summary.sent += 1,
                Ok(Delivery::Skipped) => summary.skipped += 1,
                Ok(Delivery::Disabled) => {}
                Err(e) => {
                    error!(tenant = %tenant.id, period = %period.slug, kind = e.kind(), error = %e, "Failed to send report");
                    summary.failures.push(JobFailure::new(&tenant.id, &period.slug, &e));
                }
            }
        }

        if self.config.consolidated_report && !sections.is_empty() {
            match self.write_consolidated(&sections, now).await {
                Ok(path) => summary.reports_written.push(path),
                Err(e) => {
                    error!(error = %e, "Failed to write consolidated report");
                    summary.failures.push(JobFailure::new("*", "consolidated", &e));
                }
            }
        }

        info!(
            written = summary.reports_written.len(),
            sent = summary.sent,
            skipped = summary.skipped,
            failed = summary.failures.len(),
            "Report run finished"
        );

        Ok(summary)
    }

    /// Configured tenants, or every tenant in the store when none are configured
    async fn resolve_tenants(&self) -> Result<Vec<TenantConfig>> {
        if !self.config.tenants.is_empty() {
            return Ok(self.config.tenants.clone());
        }

        let discovered = self.store.list_tenants().await?;
        info!(count = discovered.len(), "No tenants configured, reporting on every tenant in the store");
        Ok(discovered.into_iter().map(TenantConfig::discovered).collect())
    }

    async fn aggregate(&self, tenant: &TenantConfig, period: &ReportPeriod, cancel: &CancellationToken) -> Result<KpiResult> {
        let operation = || format!("aggregating {} for {}", tenant.id, period.slug);
        let timeout = self.config.fetch_timeout;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled { operation: operation() }),
            result = tokio::time::timeout(
                timeout,
                compute_kpis(self.store.as_ref(), &tenant.id, period.start, period.end),
            ) => match result {
                Ok(kpis) => kpis,
                Err(_) => Err(Error::Timeout { operation: operation(), elapsed: timeout }),
            },
        }
    }

    /// Render and write the HTML report. Returns the written path, the Markdown section and the
    /// report as an attachment.
    async fn write_report(
        &self,
        tenant: &TenantConfig,
        period: &ReportPeriod,
        kpis: &KpiResult,
        now: NaiveDateTime,
    ) -> Result<(PathBuf, String, ReportAttachment)> {
        let display_name = tenant.display_name();
        let html = self.renderer.render_html(kpis, &period.label, display_name, now)?;
        let markdown = self.renderer.render_markdown(kpis, &period.label, display_name)?;

        let filename = format!("{}_{}.html", report_file_stem(&tenant.id), period.slug);
        let path = self.config.output_dir.join(&filename);
        write_file(&path, &html).await?;
        debug!(path = %path.display(), "Report written");

        Ok((path, markdown, ReportAttachment { filename, content: html }))
    }

    async fn deliver(
        &self,
        tenant: &TenantConfig,
        period: &ReportPeriod,
        kpis: &KpiResult,
        attachment: &ReportAttachment,
        now: NaiveDateTime,
        cancel: &CancellationToken,
    ) -> Result<Delivery> {
        let Some(email) = &self.email else {
            return Ok(Delivery::Disabled);
        };

        let Some(to_email) = tenant.to_email.as_deref() else {
            debug!(tenant = %tenant.id, "No recipient configured, report not sent");
            return Ok(Delivery::Skipped);
        };

        if kpis.is_empty() {
            info!(tenant = %tenant.id, period = %period.slug, "No activity over the period, report not sent");
            return Ok(Delivery::Skipped);
        }

        if cancel.is_cancelled() {
            return Err(Error::Cancelled {
                operation: format!("sending {}", attachment.filename),
            });
        }

        let display_name = tenant.display_name();
        let body = self.renderer.render_email_body(&period.label, email.from_name(), now)?;
        let subject = email.subject(display_name, &period.label);

        email
            .send_report(&ReportEmail {
                to_email,
                to_name: Some(display_name),
                from_email: tenant.from_email.as_deref(),
                subject: &subject,
                html_body: &body,
                attachment,
            })
            .await?;

        info!(tenant = %tenant.id, period = %period.slug, to = %to_email, "Report sent");
        Ok(Delivery::Sent)
    }

    async fn write_consolidated(&self, sections: &[String], now: NaiveDateTime) -> Result<PathBuf> {
        let markdown = self.renderer.render_consolidated_markdown(sections, now)?;
        let path = self.config.output_dir.join(CONSOLIDATED_REPORT_FILE);
        write_file(&path, &markdown).await?;
        Ok(path)
    }

    /// Store diagnostics (tenants, date range) and the mail transport check
    pub async fn self_check(&self) -> SelfCheck {
        let tenants = self.store.list_tenants().await.map_err(Error::from);
        let date_range = self.store.date_range().await.map_err(Error::from);

        let mail_transport = match &self.email {
            Some(email) => email.test_connection().await,
            None => match EmailService::new(&self.config) {
                Ok(email) => email.test_connection().await,
                Err(e) => Err(e),
            },
        };

        SelfCheck {
            tenants,
            date_range,
            mail_transport,
        }
    }
}

async fn write_file(path: &Path, contents: &str) -> Result<()> {
    tokio::fs::write(path, contents).await.map_err(|e| Error::Io {
        path: path.display().to_string(),
        source: e,
    })
}
