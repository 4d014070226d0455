use std::process::ExitCode;

use anyhow::{Context, Result};

use blockscan_anvil::config::{PipelineConfig, flag_value};
use blockscan_anvil::parse_dimension;
use blockscan_engine::index::BlockIndex;
use blockscan_engine::pipeline::ScanSummary;
use blockscan_engine::scan::CancelToken;
use blockscan_engine::target::Pattern;

const USAGE: &str = "\
usage:
  blockscan scan --world DIR --find a,b[,*_ore] [--dimension D,..] [--index DIR]
                 [--cap N] [--workers N] [--structures] [--config FILE]
  blockscan query --index DIR --type PATTERN [--dimension D]";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let result = match args.get(1).map(String::as_str) {
        Some("scan") => scan(&args).await,
        Some("query") => query(&args),
        _ => {
            eprintln!("{USAGE}");
            return ExitCode::from(2);
        }
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(3),
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the scan ran to completion with a complete index.
async fn scan(args: &[String]) -> Result<bool> {
    let config = PipelineConfig::from_args(args)?;
    let cancel = CancelToken::new();

    tracing::info!("Scanning {} for {}", config.world.display(), config.find.join(", "));
    let mut task = tokio::task::spawn_blocking({
        let config = config.clone();
        let cancel = cancel.clone();
        move || blockscan_anvil::run_scan(&config, cancel)
    });

    let summary = tokio::select! {
        joined = &mut task => joined??,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received, finishing open containers...");
            cancel.cancel();
            task.await??
        }
    };

    print_summary(&summary);
    Ok(summary.is_complete())
}

fn print_summary(summary: &ScanSummary) {
    let report = &summary.report;
    println!(
        "{} matches in {} containers ({} absent, {} unreadable units, {:.1}s{})",
        report.matches,
        report.containers_scanned,
        report.containers_absent,
        report.skipped_units(),
        report.elapsed_secs,
        if report.cancelled { ", cancelled" } else { "" },
    );

    if let Some(index) = &summary.index {
        println!("index {} (cap {}):", index.dir.display(), index.cap);
        for ty in &index.types {
            println!(
                "  {}: {} found, {} indexed{}",
                ty.block,
                ty.total,
                ty.persisted,
                if ty.cap_reached { " (cap reached)" } else { "" },
            );
        }
        if !index.is_complete() {
            println!("  partial: {} positions lost", index.lost.len());
        }
    }
    if let Some(failure) = &summary.persistence_failure {
        println!("index write failed: {failure}");
    }

    for s in &summary.structures {
        let (width, height) = s.extents();
        println!(
            "{} {} axis={} at {} {}x{} ({} blocks, centre {:.1} {:.1} {:.1})",
            s.dimension,
            s.block,
            s.axis_label(),
            s.anchor,
            width,
            height,
            s.member_count(),
            s.centroid[0],
            s.centroid[1],
            s.centroid[2],
        );
    }
}

fn query(args: &[String]) -> Result<bool> {
    let dir = flag_value(args, "--index").context("query needs --index DIR")?;
    let pattern = flag_value(args, "--type").context("query needs --type PATTERN")?;
    let dimension = flag_value(args, "--dimension").map(|d| parse_dimension(&d));

    let index = BlockIndex::open(&dir).with_context(|| format!("opening index {dir}"))?;
    let query = Pattern::new(&pattern);

    for ty in index.summary().iter().filter(|t| query.matches(&t.block)) {
        println!(
            "# {}: {} found, {} indexed{}",
            ty.block,
            ty.total,
            ty.persisted,
            if ty.cap_reached { " (cap reached)" } else { "" },
        );
    }
    for found in index.query(&query, dimension.as_ref()) {
        println!("{}\t{}", found.block, found.address);
    }
    Ok(index.is_complete())
}
