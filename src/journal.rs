// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Component G: per-serial JSON delta files plus the full-table snapshot
//! they're folded into, written the way `cfg::logger::perform_save_to_file`
//! writes the teacher crate's session logs — create the parent directory,
//! then write the whole buffer in one go.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::session::DeltaBuffer;
use crate::table::PrefixTable;

/// Root directory every journal file is written under (spec §6).
pub const DEFAULT_DATA_DIR: &str = "data";

/// Shape of one `data/YYYY-MM/<stamp>.routes.<session>.<serial>.json` file.
#[derive(Debug, Serialize)]
struct DeltaFile<'a> {
    serial: u32,
    session_id: u16,
    routes: &'a DeltaBuffer,
}

/// Writes the delta file for this serial and folds it into the full
/// snapshot, mirroring the original's "write the delta, then dump the
/// whole table" sequence. A no-op when `deltas` is empty: nothing changed,
/// nothing to persist (spec §6).
pub async fn record(
    data_dir: &Path,
    session_id: u16,
    serial: u32,
    deltas: &DeltaBuffer,
    table: &PrefixTable,
) -> Result<()> {
    if deltas.is_empty() {
        return Ok(());
    }

    let delta_path = delta_file_path(data_dir, session_id, serial);
    let payload = DeltaFile {
        serial,
        session_id,
        routes: deltas,
    };
    write_json(&delta_path, &payload).await?;
    info!(path = %delta_path.display(), "wrote route delta journal");

    let snapshot_path = data_dir.join("routingtable.json");
    write_json(&snapshot_path, &table.snapshot()).await?;
    info!(path = %snapshot_path.display(), "wrote routing table snapshot");

    Ok(())
}

fn delta_file_path(data_dir: &Path, session_id: u16, serial: u32) -> PathBuf {
    // The grounding source stamps journal filenames with UTC
    // (`now_in_utc`), not local time, so the YYYY-MM directory a delta
    // lands in doesn't depend on the host's timezone.
    let now = Utc::now();
    let month_dir = data_dir.join(now.format("%Y-%m").to_string());
    let file_name = format!(
        "{}.routes.{session_id:08}.{serial:08}.json",
        now.format("%Y-%m-%d-%H%M%S")
    );
    month_dir.join(file_name)
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let body =
        serde_json::to_vec_pretty(value).context("failed to serialize journal entry")?;
    let mut file = File::create(path)
        .await
        .with_context(|| format!("failed to create {}", path.display()))?;
    file.write_all(&body)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
