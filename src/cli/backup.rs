use std::{path::PathBuf, time::Instant};

use chrono::Utc;
use tabled::Table;

use crate::{
    Res,
    backup::{BackupLayout, ExportOptions, ExportSummary, Exporter, healthcheck},
    config::Config,
    error, info,
    spotify::{SpotifyClient, auth},
    success,
    types::ExportTableRow,
    utils,
};

pub async fn backup(output: Option<PathBuf>, include_foreign_playlists: bool, dated: bool) {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => error!("Invalid configuration. Err: {}", e),
    };

    let started = Instant::now();
    let root = output.unwrap_or_else(|| config.output_dir.clone());
    let layout = if dated {
        BackupLayout::dated(root, Utc::now().date_naive())
    } else {
        BackupLayout::new(root)
    };
    let options = ExportOptions {
        include_foreign_playlists,
    };

    let result = run(&config, layout, options).await;

    if let Some(url) = &config.healthcheck_url {
        healthcheck::ping(url, result.is_ok()).await;
    }

    match result {
        Ok(summaries) => {
            println!("{}", Table::new(summaries.iter().map(table_row)));
            success!(
                "Backup finished in {}",
                utils::format_duration_ms(started.elapsed().as_millis() as u64)
            );
        }
        Err(e) => error!("Backup failed. Err: {}", e),
    }
}

async fn run(config: &Config, layout: BackupLayout, options: ExportOptions) -> Res<Vec<ExportSummary>> {
    let credential = auth::obtain_credential(config).await?;
    let client = SpotifyClient::new(credential, &config.api_url)?;

    info!("Writing backup to {}", layout.root().display());
    let exporter = Exporter::new(client, layout, options);
    Ok(exporter.run().await?)
}

fn table_row(summary: &ExportSummary) -> ExportTableRow {
    ExportTableRow {
        category: summary.category.clone(),
        records: summary.stats.written,
        skipped: summary.stats.skipped,
        file: summary.file.display().to_string(),
    }
}
