//! CLI command implementations

use anyhow::{Context, Result};
use dialoguer::Confirm;
use std::path::Path;
use tracing::{info, warn};

use crate::acquisition::{self, MoralisClient};
use crate::config::Config;
use crate::engine::ClusterEngine;
use crate::pipeline;
use crate::table::{cluster_count, TableFormat, TableRow};

/// Stage snapshot file names, in pipeline order
pub const STAGE_FILES: [&str; 4] = [
    "1_rendered.csv",
    "2_sorted.csv",
    "3_deduped.csv",
    "4_final.csv",
];

/// Fetch wallet histories and write the input snapshot
pub async fn enrich(
    config: &Config,
    wallets_path: &Path,
    output: &Path,
    chain: Option<String>,
    force: bool,
) -> Result<()> {
    if !confirm_overwrite(output, force)? {
        return Ok(());
    }

    let format = TableFormat::new(&config.table);
    let wallets = format
        .read_wallet_list_file(wallets_path)
        .with_context(|| format!("Failed to read wallet list {}", wallets_path.display()))?;
    if wallets.is_empty() {
        anyhow::bail!("No wallets found in {}", wallets_path.display());
    }

    let mut acquisition_config = config.acquisition.clone();
    if let Some(chain) = chain {
        acquisition_config.chain = chain;
    }

    info!(
        wallets = wallets.len(),
        chain = %acquisition_config.chain,
        concurrency = acquisition_config.concurrency,
        "Enriching wallets"
    );

    let client = MoralisClient::new(&acquisition_config)?;
    let records = acquisition::enrich_wallets(&client, &wallets, &acquisition_config).await;

    format
        .write_records_file(output, &records)
        .with_context(|| format!("Failed to write snapshot {}", output.display()))?;

    let active = records.iter().filter(|r| !r.activation.is_unknown()).count();
    println!("\nEnriched {} wallets ({} with activity)", records.len(), active);
    println!("Snapshot written to {}", output.display());
    Ok(())
}

/// Cluster a snapshot and write the consolidated table
pub async fn cluster(
    config: &Config,
    input: &Path,
    output: &Path,
    stages_dir: Option<&Path>,
    force: bool,
) -> Result<()> {
    if !confirm_overwrite(output, force)? {
        return Ok(());
    }

    let format = TableFormat::new(&config.table);
    let records = format
        .read_records_file(input)
        .with_context(|| format!("Failed to read snapshot {}", input.display()))?;

    let engine = ClusterEngine::new(config.engine.clone());
    let report = engine.run(&records).await?;

    if let Some(dir) = stages_dir {
        let consolidation = &report.consolidation;
        let stages: [&[TableRow]; 4] = [
            &report.rendered,
            &consolidation.sorted,
            &consolidation.deduped,
            &consolidation.final_rows,
        ];
        write_stages(&format, dir, &stages)?;
    }

    format
        .write_table_file(output, report.final_rows())
        .with_context(|| format!("Failed to write table {}", output.display()))?;

    println!("\n=== CLUSTERING RUN {} ===\n", report.run_id);
    println!("Records:           {}", report.records);
    println!("Work units:        {} ({} partitions)", report.units, report.partitions);
    println!("Candidate clusters: {}", report.candidates);
    println!("Rendered clusters: {}", cluster_count(&report.rendered));
    println!("Final clusters:    {}", report.cluster_count());
    if !report.failures.is_empty() {
        println!("Failed units:      {}", report.failures.len());
        for failure in &report.failures {
            println!("  {:?}: {}", failure.tag, failure.reason);
        }
    }
    println!("Elapsed:           {:.2}s", report.elapsed.as_secs_f64());
    println!("\nTable written to {}", output.display());
    Ok(())
}

/// Replay consolidation on an already rendered table
pub async fn consolidate(config: &Config, input: &Path, output: &Path, force: bool) -> Result<()> {
    if !confirm_overwrite(output, force)? {
        return Ok(());
    }

    let format = TableFormat::new(&config.table);
    let rows = format
        .read_table_file(input)
        .with_context(|| format!("Failed to read table {}", input.display()))?;

    let consolidation = pipeline::consolidate(&rows, config.engine.min_cluster_size)?;
    format
        .write_table_file(output, &consolidation.final_rows)
        .with_context(|| format!("Failed to write table {}", output.display()))?;

    println!(
        "\nConsolidated {} clusters into {}",
        cluster_count(&rows),
        cluster_count(&consolidation.final_rows)
    );
    println!("Table written to {}", output.display());
    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

fn write_stages(format: &TableFormat, dir: &Path, stages: &[&[TableRow]; 4]) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create stages directory {}", dir.display()))?;

    for (name, rows) in STAGE_FILES.iter().zip(stages) {
        let path = dir.join(name);
        format
            .write_table_file(&path, rows)
            .with_context(|| format!("Failed to write stage {}", path.display()))?;
    }

    info!(dir = %dir.display(), "Stage snapshots written");
    Ok(())
}

/// Ask before replacing an existing output (unless --force)
fn confirm_overwrite(path: &Path, force: bool) -> Result<bool> {
    if force || !path.exists() {
        return Ok(true);
    }

    let confirmed = Confirm::new()
        .with_prompt(format!("{} already exists. Overwrite?", path.display()))
        .default(false)
        .interact()?;

    if !confirmed {
        warn!(path = %path.display(), "Output exists, command cancelled");
    }
    Ok(confirmed)
}
