use std::{
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};

use crate::{
    models::{OrderVariant, SettlementSource},
    processor,
    summary::Summary,
    traits::{ReportExport, TableLoad},
    writer::OutputFormat,
};
use anyhow::{Context, Result, anyhow};
use getset::Getters;
use serde::Serialize;
use tracing::info;

fn as_seconds<S>(d: &Duration, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_f64(d.as_secs_f64())
}

/// What a finished run did, for the console and `--json`.
#[derive(Debug, Clone, Serialize, Getters)]
pub struct RunReport {
    #[getset(get = "pub")]
    variant: OrderVariant,
    #[getset(get = "pub")]
    source: SettlementSource,
    #[getset(get = "pub")]
    summary: Summary,
    #[getset(get = "pub")]
    match_rate: f64,
    #[getset(get = "pub")]
    output: PathBuf,
    #[getset(get = "pub")]
    format: OutputFormat,
    #[getset(get = "pub")]
    #[serde(rename = "elapsed_secs", serialize_with = "as_seconds")]
    elapsed: Duration,
}

pub struct Engine<L, E> {
    loader: L,
    exporter: E,
    orders_dir: PathBuf,
    settlements_dir: PathBuf,
}

impl<L, E> Engine<L, E>
where
    L: TableLoad + Sync,
    E: ReportExport,
{
    pub fn new(loader: L, exporter: E, orders_dir: PathBuf, settlements_dir: PathBuf) -> Self {
        Self {
            loader,
            exporter,
            orders_dir,
            settlements_dir,
        }
    }

    /// Loads both input sets, reconciles them and exports the report.
    ///
    /// Nothing is written unless every step before the export succeeded.
    pub fn run(&self) -> Result<RunReport> {
        let started = Instant::now();
        info!(
            orders = %self.orders_dir.display(),
            settlements = %self.settlements_dir.display(),
            "starting reconciliation"
        );

        // the two input sets share nothing, so they load side by side
        let (loader, orders_dir) = (&self.loader, &self.orders_dir);
        let (orders, settlements) = thread::scope(|scope| {
            let orders = scope.spawn(move || loader.load(orders_dir));
            let settlements = loader.load(&self.settlements_dir);
            (orders.join(), settlements)
        });
        let orders = orders
            .map_err(|_| anyhow!("order loading thread panicked"))?
            .context("loading INSALÉS orders")?;
        let settlements = settlements.context("loading settlements")?;

        let reconciliation = processor::reconcile(orders, settlements)?;
        let (output, format) = self
            .exporter
            .export(reconciliation.result(), reconciliation.settlements())?;

        Ok(RunReport {
            variant: *reconciliation.variant(),
            source: *reconciliation.source(),
            summary: reconciliation.summary().clone(),
            match_rate: reconciliation.summary().match_rate(),
            output,
            format,
            elapsed: started.elapsed(),
        })
    }
}
