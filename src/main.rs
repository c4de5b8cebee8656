use anyhow::{bail, Context};
use redline_lib::config::load_config;
use redline_lib::logger;
use redline_lib::models::Document;
use redline_lib::{PanelTab, PanelViewModel, RevisionController};
use std::sync::Arc;

const USAGE: &str = "usage: redline <document.json> [--demo]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init_logging();
    tracing::info!("Redline starting...");

    let mut document_path = None;
    let mut demo = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--demo" => demo = true,
            "-h" | "--help" => {
                println!("{}", USAGE);
                return Ok(());
            }
            _ if document_path.is_none() => document_path = Some(arg),
            _ => bail!("unexpected argument {}\n{}", arg, USAGE),
        }
    }
    let Some(document_path) = document_path else {
        bail!(USAGE);
    };

    let mut config = load_config().context("failed to load config")?;
    config.demo_mode |= demo;

    let content = std::fs::read_to_string(&document_path)
        .with_context(|| format!("failed to read {}", document_path))?;
    let document: Document = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a valid document", document_path))?;

    let controller = Arc::new(RevisionController::from_config(&config)?);
    controller.set_document(Some(document.clone()));
    controller
        .load_revisions()
        .await
        .with_context(|| format!("failed to load revisions for {}", document.id))?;

    let mut panel = PanelViewModel::new(Arc::clone(&controller));
    let counts = panel.counts();
    println!(
        "{} ({}): {} pending, {} accepted, {} rejected",
        document.name, document.id, counts.pending, counts.accepted, counts.rejected
    );

    panel.set_tab(PanelTab::Pending);
    for group in panel.revision_groups() {
        println!(
            "\n[{}] {}",
            group.section_id,
            group.section_title.as_deref().unwrap_or("Untitled section")
        );
        for revision in &group.revisions {
            let origin = if revision.ai_generated { "AI" } else { "user" };
            let risk = revision.risk_level.map(|r| r.as_str()).unwrap_or("-");
            println!(
                "  {} ({}, risk {}, by {}): {}",
                revision.id, origin, risk, revision.created_by, revision.proposed_text
            );
        }
    }

    Ok(())
}
