//! Contract tests that drive `CdpAdapter` against a real Chromium binary. Ignored by default
//! because they need Chrome/Chromium on the host.
//!
//! ```bash
//! PROMPTCAST_CDP_CONTRACT=1 cargo test -p cdp-adapter --test cdp_contract -- --ignored
//! ```

use std::env;
use std::sync::Arc;
use std::time::Duration;

use cdp_adapter::{event_bus, Cdp, CdpAdapter, CdpConfig, RawEvent, WaitGate};
use serde_json::json;
use tokio::time::timeout;

fn contract_enabled() -> bool {
    env::var("PROMPTCAST_CDP_CONTRACT")
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

fn contract_config() -> CdpConfig {
    let mut cfg = CdpConfig::default();
    cfg.headless = true;
    cfg
}

#[tokio::test]
#[ignore = "requires Chrome/Chromium; set PROMPTCAST_CDP_CONTRACT=1"]
async fn contract_query_and_call_function() {
    if !contract_enabled() {
        eprintln!("skipping CDP contract test (PROMPTCAST_CDP_CONTRACT not enabled)");
        return;
    }

    let (bus, _rx) = event_bus(32);
    let adapter = Arc::new(CdpAdapter::new(contract_config(), bus));
    Arc::clone(&adapter).start().await.expect("adapter start");

    let page = adapter.create_page("about:blank").await.expect("create page");
    adapter
        .wait_basic(page, WaitGate::Load, Duration::from_secs(15))
        .await
        .expect("page loads");
    adapter
        .evaluate_script(
            page,
            "document.body.innerHTML = '<textarea class=\"box\"></textarea><textarea class=\"box\"></textarea>'; true",
        )
        .await
        .expect("seed page");

    let handles = adapter
        .query_handles(page, "textarea.box", "contract")
        .await
        .expect("query handles");
    assert_eq!(handles.len(), 2);

    let value = adapter
        .call_function_on(
            page,
            &handles[1],
            "function (text) { this.value = text; return this.value.length; }",
            vec![json!("promptcast")],
        )
        .await
        .expect("call function");
    assert_eq!(value, json!(10));

    let err = adapter
        .query_handles(page, "textarea[", "contract")
        .await
        .expect_err("invalid selector");
    assert!(err.hint.unwrap_or_default().contains("querySelectorAll"));

    adapter
        .release_object_group(page, "contract")
        .await
        .expect("release group");
    let stale = adapter
        .call_function_on(page, &handles[0], "function () { return 1; }", Vec::new())
        .await
        .expect_err("released handle");
    assert!(stale.is_stale_object());

    adapter.shutdown().await;
}

#[tokio::test]
#[ignore = "requires Chrome/Chromium; set PROMPTCAST_CDP_CONTRACT=1"]
async fn contract_reports_page_lifecycle() {
    if !contract_enabled() {
        eprintln!("skipping CDP contract test (PROMPTCAST_CDP_CONTRACT not enabled)");
        return;
    }

    let (bus, mut rx) = event_bus(64);
    let adapter = Arc::new(CdpAdapter::new(contract_config(), bus));
    Arc::clone(&adapter).start().await.expect("adapter start");

    let page = adapter.create_page("about:blank").await.expect("create page");
    assert!(adapter.pages().iter().any(|info| info.page == page));
    adapter
        .evaluate_script(page, "window.close()")
        .await
        .expect("close page");

    let closed = timeout(Duration::from_secs(10), async {
        loop {
            match rx.recv().await {
                Ok(RawEvent::PageLifecycle { page: seen, phase, .. })
                    if seen == page && phase == "closed" =>
                {
                    return true
                }
                Ok(_) => continue,
                Err(_) => return false,
            }
        }
    })
    .await
    .unwrap_or(false);
    assert!(closed, "expected a closed lifecycle event");

    assert!(adapter.evaluate_script(page, "document.title").await.is_err());

    adapter.shutdown().await;
}
