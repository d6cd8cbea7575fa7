//! `render`: runs the agent over a saved host page against the live widget
//! API and prints what the page body looks like afterwards.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use prodigy_agent::coordinator::FetchRound;
use prodigy_agent::{AgentBuilder, AgentHandle, Category, Document, FileStore};
use prodigy_widgets::WidgetClient;
use tokio::time::{sleep, Instant};

/// Element id of the script tag that embeds the agent.
const SCRIPT_TAG_ID: &str = "prodigyButtonGroupAgent";

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub(crate) async fn run(page: &Path, messages: &[String], settle_ms: u64) -> anyhow::Result<()> {
    let html = std::fs::read_to_string(page)
        .with_context(|| format!("failed to read page {}", page.display()))?;
    let document = Document::from_html(&html);

    let config = match document.element_by_id(SCRIPT_TAG_ID) {
        Some(tag) => prodigy_core::load_page_config(
            |name| document.attr(tag, name).map(str::to_owned),
            document.attr(tag, "src"),
        )?,
        None => prodigy_core::load_agent_config()?,
    };
    super::init_tracing(&config.log_level)?;

    let store = FileStore::open(&config.storage_path).with_context(|| {
        format!(
            "failed to open storage at {}",
            config.storage_path.display()
        )
    })?;
    let client = WidgetClient::from_config(&config).context("failed to build widget client")?;
    let settle = Duration::from_millis(settle_ms);

    let handle = AgentBuilder::new(config, document, client)
        .storage(Box::new(store))
        .spawn();

    wait_idle(&handle, settle).await?;
    for message in messages {
        handle.post_message(message.as_str())?;
        wait_idle(&handle, settle).await?;
    }

    let body = handle
        .inspect(|state| {
            let doc = state.document();
            doc.outer_html(doc.body())
        })
        .await?;
    println!("{body}");

    handle.shutdown()?;
    Ok(())
}

/// Polls until every fetch round is idle, or `limit` has passed.
async fn wait_idle(handle: &AgentHandle, limit: Duration) -> anyhow::Result<()> {
    let deadline = Instant::now() + limit;
    loop {
        sleep(POLL_INTERVAL).await;
        let idle = handle
            .inspect(|state| {
                Category::ALL
                    .into_iter()
                    .all(|category| state.round(category).is_none_or(FetchRound::is_idle))
            })
            .await?;
        if idle {
            return Ok(());
        }
        if Instant::now() >= deadline {
            tracing::warn!(limit_ms = limit.as_millis(), "agent still busy, rendering anyway");
            return Ok(());
        }
    }
}
