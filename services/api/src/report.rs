use crate::infra::{counter_service, parse_month, seed_from_csv};
use clap::Args;
use parcel_ops::config::AppConfig;
use parcel_ops::error::AppError;
use parcel_ops::packages::{ImportSummary, MonthlyReport, Period};
use std::fmt::Write;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct ReportArgs {
    /// Legacy CSV export to load before reporting
    #[arg(long)]
    pub(crate) legacy_csv: PathBuf,
    /// Month to report (YYYY-MM). Defaults to the current month.
    #[arg(long, value_parser = parse_month)]
    pub(crate) month: Option<Period>,
}

pub(crate) async fn run_monthly_report(args: ReportArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let service = counter_service(config.counter);
    let summary = seed_from_csv(&service, &args.legacy_csv).await?;

    let period = match args.month {
        Some(period) => period,
        None => service.current_period().await?,
    };
    let report = service.report(period).await?;

    print!("{}", render_report(&report, &summary));
    Ok(())
}

fn render_report(report: &MonthlyReport, summary: &ImportSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Monthly movement {} ({} to {})",
        report.month,
        report.period.start.format("%Y-%m-%d"),
        report.period.end.format("%Y-%m-%d"),
    );
    let _ = writeln!(
        out,
        "Loaded {} records ({} skipped)",
        summary.imported, summary.skipped
    );

    let _ = writeln!(out, "\nIntake: {}", report.intake.total);
    for entry in &report.intake.by_type {
        let _ = writeln!(out, "  {:<22} {:>5}", entry.tipo_label, entry.count);
    }

    let _ = writeln!(out, "\nOutcomes: {}", report.outcomes.total);
    for entry in &report.outcomes.by_disposition {
        let _ = writeln!(out, "  {:<22} {:>5}", entry.estado_label, entry.count);
    }

    if !report.anomalies.is_empty() {
        let _ = writeln!(out, "\nRecords with both outcomes:");
        for barcode in &report.anomalies {
            let _ = writeln!(out, "  - {barcode}");
        }
    }
    out
}
