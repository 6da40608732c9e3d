//! Element Removal Waiting Example
//!
//! Demonstrates the esperar wait pipeline end to end:
//! - Direct element targets (connectivity re-checks)
//! - Resolver targets (live `data-testid` queries)
//! - Timeout racing with a custom `on_timeout` hook
//! - Polling fallback on a document without mutation observers
//!
//! # Running
//!
//! ```bash
//! cargo run --example removal_demo -p jugar-esperar
//! ```
//!
//! Set `RUST_LOG=jugar_esperar=debug` to watch the engine subscribe,
//! re-check, and tear down.

use jugar_esperar::prelude::*;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> EsperarResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Esperar Element Removal Example ===\n");

    demo_direct_target().await?;
    demo_resolver_target().await?;
    demo_timeout_hook().await;
    demo_polling_fallback().await?;

    println!("\n=== Element Removal Example Complete ===");
    Ok(())
}

/// Wait on the element handle itself.
async fn demo_direct_target() -> EsperarResult<()> {
    println!("--- Demo 1: direct element target ---");

    let document = Document::new();
    let toast = document.root().append_new("div")?;
    toast.set_text("saved!");

    let handle = toast.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(40)).await;
        handle.remove();
    });

    let options = RemovalOptions::new().with_timeout(Duration::from_millis(500));
    wait_for_element_to_be_removed(&toast, &options).await?;
    println!(
        "toast removed; connected = {}, observers = {}\n",
        toast.is_connected(),
        document.observer_count()
    );
    Ok(())
}

/// Wait through a query that is re-run on every mutation.
async fn demo_resolver_target() -> EsperarResult<()> {
    println!("--- Demo 2: resolver target ---");

    let document = Document::new();
    let content = document.root().append_new("main")?;
    let spinner = content.append_new("div")?;
    spinner.set_attribute(TEST_ID_ATTRIBUTE, "spinner");
    spinner.set_text("loading…");

    let handle = spinner.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(80)).await;
        handle.remove();
    });

    let scope = content.clone();
    let options = RemovalOptions::new().with_timeout(Duration::from_millis(500));
    wait_for_element_to_be_removed(
        WaitTarget::resolver(move || query_by_test_id(&scope, "spinner")),
        &options,
    )
    .await?;
    println!(
        "spinner gone; remaining matches = {}\n",
        query_all_by_test_id(&content, "spinner").len()
    );
    Ok(())
}

/// Replace the timeout rejection with a domain error.
async fn demo_timeout_hook() {
    println!("--- Demo 3: timeout with on_timeout hook ---");

    let document = Document::new();
    let banner = document
        .root()
        .append_new("div")
        .expect("append under the root");

    let options = RemovalOptions::new()
        .with_timeout(Duration::from_millis(50))
        .with_on_timeout(|_| EsperarError::Dom {
            message: "banner never left the page".to_string(),
        });
    match wait_for_element_to_be_removed(&banner, &options).await {
        Ok(()) => println!("unexpected: banner was removed"),
        Err(error) => println!("wait rejected: {error}\n"),
    }
}

/// Documents without mutation observers are polled instead.
async fn demo_polling_fallback() -> EsperarResult<()> {
    println!("--- Demo 4: polling fallback ---");

    let document =
        Document::with_capabilities(DocumentCapabilities::without_mutation_observers());
    let widget = document.root().append_new("div")?;

    let handle = widget.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.remove();
    });

    let options = RemovalOptions::new()
        .with_timeout(Duration::from_millis(500))
        .with_interval(Duration::from_millis(10));
    wait_for_element_to_be_removed(&widget, &options).await?;
    println!(
        "widget removed via polling; observers ever registered = {}",
        document.observer_count()
    );
    Ok(())
}
