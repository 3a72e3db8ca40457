//! The suite coordinator.
//!
//! Discovers fixtures, launches one case per fixture on a [`JoinSet`], and
//! aggregates reports as they arrive. The failure count lives in the
//! [`SuiteSummary`] owned by [`SuiteCoordinator::run_with`] and is only touched
//! from its completion loop, which ends after the last launched case has
//! reported. Nothing is finalized before that.

use std::{panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use regex::Regex;
use serde::Serialize;
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{info, warn};

use crate::{
    compiler::{panic_message, CompilerAdapter},
    config::OracleConfig,
    err_msg,
    fixture::{discover_fixtures, Fixture, FixtureLayout, FixtureResolver},
    runner::{CaseReport, CaseRunner},
    Result,
};

/// Aggregate of all case reports of one suite run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SuiteSummary {
    pub total: usize,
    pub failed: usize,
    /// Sorted by fixture name once the suite has finished
    pub reports: Vec<CaseReport>,
}

impl SuiteSummary {
    fn record(&mut self, report: CaseReport) {
        self.total += 1;
        if !report.verdict.is_pass() {
            self.failed += 1;
        }
        self.reports.push(report);
    }

    pub fn passed(&self) -> usize {
        self.total - self.failed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseReport> {
        self.reports.iter().filter(|r| !r.verdict.is_pass())
    }

    pub fn report(&self, fixture: &str) -> Option<&CaseReport> {
        self.reports.iter().find(|r| r.fixture == fixture)
    }
}

/// Compiles the configured fixture-name filter.
pub fn fixture_filter(config: &OracleConfig) -> Result<Option<Regex>> {
    config
        .filter
        .as_deref()
        .map(Regex::new)
        .transpose()
        .map_err(|e| err_msg!(Config, "invalid filter: {}", e))
}

pub struct SuiteCoordinator {
    layout: FixtureLayout,
    runner: CaseRunner,
    max_concurrency: Option<usize>,
    filter: Option<Regex>,
}

impl SuiteCoordinator {
    pub fn new(config: &OracleConfig, compiler: CompilerAdapter) -> Result<Self> {
        config.validate()?;
        let filter = fixture_filter(config)?;
        let layout = FixtureLayout::from_config(config);
        let resolver = FixtureResolver::new(layout.clone());
        Ok(Self {
            runner: CaseRunner::new(compiler, resolver, config.clone()),
            layout,
            max_concurrency: config.max_concurrency,
            filter,
        })
    }

    /// Discovered fixtures that pass the name filter.
    pub fn fixtures(&self) -> Result<Vec<Fixture>> {
        let mut fixtures = discover_fixtures(&self.layout)?;
        if let Some(filter) = &self.filter {
            fixtures.retain(|f| filter.is_match(&f.name));
        }
        Ok(fixtures)
    }

    pub async fn run(&self) -> Result<SuiteSummary> {
        self.run_with(|_| {}).await
    }

    /// Runs every fixture concurrently, calling `on_report` once per case in
    /// arrival order.
    ///
    /// Fails without launching anything if discovery fails.
    pub async fn run_with<F>(&self, mut on_report: F) -> Result<SuiteSummary>
    where
        F: FnMut(&CaseReport),
    {
        let fixtures = self.fixtures()?;
        info!(
            fixtures = fixtures.len(),
            max_concurrency = ?self.max_concurrency,
            "launching suite"
        );

        let limiter = self.max_concurrency.map(|n| Arc::new(Semaphore::new(n)));
        let mut cases = JoinSet::new();
        for fixture in fixtures {
            let runner = self.runner.clone();
            let limiter = limiter.clone();
            cases.spawn(async move {
                let _permit = match limiter {
                    Some(limiter) => limiter.acquire_owned().await.ok(),
                    None => None,
                };
                run_isolated(&runner, fixture).await
            });
        }

        let mut summary = SuiteSummary::default();
        while let Some(joined) = cases.join_next().await {
            let report = joined.unwrap_or_else(|e| {
                warn!(error = %e, "case task did not complete");
                CaseReport::harness_fault("<unknown>", format!("case task did not complete: {}", e))
            });
            on_report(&report);
            summary.record(report);
        }

        summary.reports.sort_by(|a, b| a.fixture.cmp(&b.fixture));
        info!(total = summary.total, failed = summary.failed, "suite finished");
        Ok(summary)
    }
}

/// Runs one case, turning a panic into a harness verdict for that case alone.
async fn run_isolated(runner: &CaseRunner, fixture: Fixture) -> CaseReport {
    match AssertUnwindSafe(runner.run(&fixture)).catch_unwind().await {
        Ok(report) => report,
        Err(payload) => CaseReport::harness_fault(
            fixture.name.clone(),
            format!("case panicked: {}", panic_message(payload)),
        ),
    }
}
