// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! MIST - Mask Inpainting State Tool
//!
//! Desktop core for mask-based image and video inpainting: file and
//! mask state management, session persistence, and delegation of pixel
//! processing to an external Python backend over HTTP. This binary is
//! the headless driver for folder batch jobs and mask interchange.

use anyhow::{bail, Result};
use mist::app::App;
use std::path::{Path, PathBuf};

const USAGE: &str = "\
Usage:
  mist                                            restore the session and report it
  mist batch <images> <masks> <output>            run folder batch inpainting
  mist export-masks <video> <file.yaml|json>      export a video's mask keyframes
  mist import-masks <file.yaml|json>              import a mask keyframe document";

/// The user-data directory holding config, session state, and drafts.
fn data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("MIST_DATA_DIR") {
        return PathBuf::from(dir);
    }
    match std::env::var_os("HOME") {
        Some(home) => Path::new(&home).join(".mist"),
        None => PathBuf::from(".mist"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut app = App::new(data_dir());
    app.initialize()?;

    match args.first().map(String::as_str) {
        Some("batch") => {
            if args.len() != 4 {
                bail!("batch needs image, mask, and output folders\n\n{}", USAGE);
            }

            let general = &app.config().config().general;
            if general.auto_start && !general.backend_project_path.is_empty() {
                if let Err(e) = app.start_backend().await {
                    log::warn!("Backend auto-start failed, assuming it is already up: {}", e);
                }
            }

            let response = app
                .run_folder_batch(
                    Path::new(&args[1]),
                    Path::new(&args[2]),
                    Path::new(&args[3]),
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            app.shutdown().await;
        }
        Some("export-masks") => {
            if args.len() != 3 {
                bail!("export-masks needs a video name and a target file\n\n{}", USAGE);
            }
            app.export_masks(&args[1], Path::new(&args[2]))?;
            println!("Exported masks for {} to {}", args[1], args[2]);
        }
        Some("import-masks") => {
            if args.len() != 2 {
                bail!("import-masks needs a document path\n\n{}", USAGE);
            }
            let video = app.import_masks(Path::new(&args[1]))?;
            println!(
                "Imported {} keyframe(s) for {}",
                app.video_masks().keyframe_count(&video),
                video
            );
        }
        None => {
            let state = app.app_state().state();
            println!(
                "Session: {:?} page, {} file(s) restored, backend at {}",
                state.active_page,
                app.file_manager().files().len(),
                app.config().config().general.backend_port
            );
            app.shutdown().await;
        }
        Some(other) => {
            bail!("unknown command {:?}\n\n{}", other, USAGE);
        }
    }

    Ok(())
}
