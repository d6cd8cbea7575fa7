//! End-to-end flows through the agent event loop against a scripted API.
//!
//! Every test runs on a paused clock, so debounce, retry and fade timers
//! fire exactly when the test sleeps past them.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use prodigy_agent::markup;
use prodigy_agent::{
    AgentBuilder, AgentHandle, Category, Document, HostPlatform, LeadIntake, NodeId,
    OverlayPhase, PageLoadEvent, PageLoadPayload, SlotLocation, SlotMeta, WidgetApi,
};
use prodigy_core::{AgentConfig, ConfigType};
use prodigy_widgets::{
    ButtonGroupsQuery, ButtonGroupsResponse, StandaloneButtonsResponse, StandaloneQuery,
    TrackingEvent, WidgetError,
};
use serde_json::json;
use tokio::sync::oneshot;
use tokio::time::sleep;

// ---------------------------------------------------------------------------
// Scripted API
// ---------------------------------------------------------------------------

enum Reply<T> {
    Now(Result<T, WidgetError>),
    Gated(oneshot::Receiver<Result<T, WidgetError>>),
}

impl<T> Reply<T> {
    async fn resolve(self) -> Result<T, WidgetError> {
        match self {
            Reply::Now(result) => result,
            Reply::Gated(rx) => rx.await.unwrap_or_else(|_| Err(unavailable())),
        }
    }
}

#[derive(Default)]
struct Script {
    group_queries: Vec<ButtonGroupsQuery>,
    standalone_queries: Vec<StandaloneQuery>,
    tracked: Vec<TrackingEvent>,
    group_replies: VecDeque<Reply<ButtonGroupsResponse>>,
    standalone_replies: VecDeque<Reply<StandaloneButtonsResponse>>,
}

#[derive(Clone, Default)]
struct FakeApi {
    script: Arc<Mutex<Script>>,
}

impl FakeApi {
    fn reply_groups(&self, body: serde_json::Value) {
        let response = serde_json::from_value(body).unwrap();
        self.script
            .lock()
            .unwrap()
            .group_replies
            .push_back(Reply::Now(Ok(response)));
    }

    fn fail_groups(&self) {
        self.script
            .lock()
            .unwrap()
            .group_replies
            .push_back(Reply::Now(Err(unavailable())));
    }

    fn gate_groups(&self) -> oneshot::Sender<Result<ButtonGroupsResponse, WidgetError>> {
        let (tx, rx) = oneshot::channel();
        self.script
            .lock()
            .unwrap()
            .group_replies
            .push_back(Reply::Gated(rx));
        tx
    }

    fn reply_standalone(&self, body: serde_json::Value) {
        let response = serde_json::from_value(body).unwrap();
        self.script
            .lock()
            .unwrap()
            .standalone_replies
            .push_back(Reply::Now(Ok(response)));
    }

    fn fail_standalone(&self) {
        self.script
            .lock()
            .unwrap()
            .standalone_replies
            .push_back(Reply::Now(Err(unavailable())));
    }

    fn group_queries(&self) -> Vec<ButtonGroupsQuery> {
        self.script.lock().unwrap().group_queries.clone()
    }

    fn standalone_queries(&self) -> Vec<StandaloneQuery> {
        self.script.lock().unwrap().standalone_queries.clone()
    }

    fn tracked(&self) -> Vec<TrackingEvent> {
        self.script.lock().unwrap().tracked.clone()
    }
}

impl WidgetApi for FakeApi {
    fn button_groups(
        &self,
        query: ButtonGroupsQuery,
    ) -> impl Future<Output = Result<ButtonGroupsResponse, WidgetError>> + Send {
        let reply = {
            let mut script = self.script.lock().unwrap();
            script.group_queries.push(query);
            script.group_replies.pop_front()
        };
        async move {
            match reply {
                Some(reply) => reply.resolve().await,
                None => Ok(ButtonGroupsResponse::default()),
            }
        }
    }

    fn standalone_buttons(
        &self,
        query: StandaloneQuery,
    ) -> impl Future<Output = Result<StandaloneButtonsResponse, WidgetError>> + Send {
        let reply = {
            let mut script = self.script.lock().unwrap();
            script.standalone_queries.push(query);
            script.standalone_replies.pop_front()
        };
        async move {
            match reply {
                Some(reply) => reply.resolve().await,
                None => Ok(StandaloneButtonsResponse::default()),
            }
        }
    }

    fn track(&self, event: TrackingEvent) -> impl Future<Output = Result<(), WidgetError>> + Send {
        self.script.lock().unwrap().tracked.push(event);
        async { Ok(()) }
    }
}

fn unavailable() -> WidgetError {
    WidgetError::UnexpectedStatus {
        status: 503,
        url: "http://widgets.test/widgets/buttonGroups".to_owned(),
    }
}

// ---------------------------------------------------------------------------
// Host-side fakes
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct FakePlatform {
    inserted: Arc<Mutex<Vec<SlotLocation>>>,
}

impl HostPlatform for FakePlatform {
    fn insert(&mut self, location: SlotLocation) {
        self.inserted.lock().unwrap().push(location);
    }
}

#[derive(Clone, Default)]
struct FakeIntake {
    leads: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
}

impl LeadIntake for FakeIntake {
    fn post_lead(&mut self, source: &str, applicant: &serde_json::Value) {
        self.leads
            .lock()
            .unwrap()
            .push((source.to_owned(), applicant.clone()));
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const DEBOUNCE_PASSED: Duration = Duration::from_millis(250);
const FADE_PASSED: Duration = Duration::from_millis(700);

fn config() -> AgentConfig {
    AgentConfig::for_dealer("d1")
}

fn spawn(api: &FakeApi, html: &str) -> AgentHandle {
    AgentBuilder::new(config(), Document::from_html(html), api.clone()).spawn()
}

fn group(id: &str, config_type: &str, vin: &str) -> String {
    format!(
        r#"<div id="{id}" class="prodigy-pricing-button-group" data-config-type="{config_type}" data-vin="{vin}"></div>"#
    )
}

/// Lets spawned tasks and already-due events run.
async fn settle() {
    sleep(Duration::from_millis(1)).await;
}

async fn inner_html(handle: &AgentHandle, id: &str) -> String {
    let id = id.to_owned();
    handle
        .inspect(move |state| {
            let doc = state.document();
            doc.element_by_id(&id)
                .map(|node| doc.inner_html(node))
                .unwrap_or_default()
        })
        .await
        .unwrap()
}

async fn node(handle: &AgentHandle, id: &str) -> NodeId {
    let id = id.to_owned();
    handle
        .inspect(move |state| state.document().element_by_id(&id))
        .await
        .unwrap()
        .unwrap()
}

async fn registered(handle: &AgentHandle, category: Category) -> usize {
    handle
        .inspect(move |state| state.registry().count(category))
        .await
        .unwrap()
}

async fn phase(handle: &AgentHandle) -> OverlayPhase {
    handle
        .inspect(|state| state.overlay().phase())
        .await
        .unwrap()
}

async fn append_row(handle: &AgentHandle, list_id: &'static str, html: String) {
    handle
        .edit_page(move |doc| {
            let list = doc.element_by_id(list_id).unwrap();
            let row = doc.create_element("div");
            doc.set_inner_html(row, &html);
            doc.append_child(list, row);
        })
        .await
        .unwrap();
}

const VDP: Category = Category::Pricing(ConfigType::Vdp);
const SRP: Category = Category::Pricing(ConfigType::Srp);

// ---------------------------------------------------------------------------
// Pricing rounds
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn page_load_fetches_after_debounce_and_fills_group() {
    let api = FakeApi::default();
    api.reply_groups(json!({
        "buttonGroups": { "ABC123": "<button>Buy</button>" },
        "baseUrl": "https://x"
    }));
    let handle = spawn(&api, &group("g", "VDP", "ABC123"));

    settle().await;
    assert!(api.group_queries().is_empty(), "debounce has not elapsed");
    assert_eq!(inner_html(&handle, "g").await, markup::PRICING_LOADING);

    sleep(DEBOUNCE_PASSED).await;
    let queries = api.group_queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].config_type, ConfigType::Vdp);
    assert_eq!(queries[0].vehicle_ids, vec!["ABC123"]);
    assert!(!queries[0].standalone_config);

    assert_eq!(inner_html(&handle, "g").await, "<button>Buy</button>");
    assert_eq!(registered(&handle, VDP).await, 0);
    let base = handle
        .inspect(|state| state.base_url().map(str::to_owned))
        .await
        .unwrap();
    assert_eq!(base.as_deref(), Some("https://x"));
    assert!(api.tracked().iter().any(|e| e.action == "LOAD"));
}

#[tokio::test(start_paused = true)]
async fn group_added_mid_flight_keeps_placeholder_and_is_fetched_alone() {
    let api = FakeApi::default();
    let first = api.gate_groups();
    api.reply_groups(json!({ "buttonGroups": { "DEF456": "<b>def</b>" } }));
    let handle = spawn(
        &api,
        &format!(r#"<div id="list">{}</div>"#, group("a", "VDP", "ABC123")),
    );

    sleep(DEBOUNCE_PASSED).await;
    assert_eq!(api.group_queries().len(), 1, "first request in flight");

    append_row(&handle, "list", group("d", "VDP", "DEF456")).await;
    settle().await;
    assert_eq!(inner_html(&handle, "d").await, markup::PRICING_LOADING);

    let response = serde_json::from_value(json!({ "buttonGroups": { "ABC123": "<b>abc</b>" } }))
        .unwrap();
    first.send(Ok(response)).unwrap();
    settle().await;

    assert_eq!(inner_html(&handle, "a").await, "<b>abc</b>");
    assert_eq!(
        inner_html(&handle, "d").await,
        markup::PRICING_LOADING,
        "unrequested group untouched"
    );
    assert_eq!(registered(&handle, VDP).await, 1);

    sleep(DEBOUNCE_PASSED).await;
    let queries = api.group_queries();
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[1].vehicle_ids, vec!["DEF456"]);
    assert_eq!(inner_html(&handle, "d").await, "<b>def</b>");
    assert_eq!(registered(&handle, VDP).await, 0);
}

#[tokio::test(start_paused = true)]
async fn burst_of_additions_is_coalesced_into_one_request() {
    let api = FakeApi::default();
    let handle = spawn(&api, r#"<div id="list"></div>"#);
    settle().await;

    for i in 0..5 {
        append_row(&handle, "list", group(&format!("g{i}"), "SRP", &format!("VIN{i}"))).await;
        sleep(Duration::from_millis(50)).await;
    }
    assert!(api.group_queries().is_empty());

    sleep(DEBOUNCE_PASSED).await;
    let queries = api.group_queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(
        queries[0].vehicle_ids,
        vec!["VIN0", "VIN1", "VIN2", "VIN3", "VIN4"]
    );
}

#[tokio::test(start_paused = true)]
async fn cached_and_duplicate_vins_are_never_requested() {
    let api = FakeApi::default();
    api.reply_groups(json!({ "buttonGroups": { "V1": "<i>one</i>" } }));
    api.reply_groups(json!({ "buttonGroups": { "V2": "<i>two</i>" } }));
    let handle = spawn(
        &api,
        &format!(
            r#"<div id="list">{}{}</div>"#,
            group("a", "SRP", "V1"),
            group("b", "SRP", "V1")
        ),
    );

    sleep(DEBOUNCE_PASSED).await;
    assert_eq!(api.group_queries()[0].vehicle_ids, vec!["V1"]);
    assert_eq!(inner_html(&handle, "b").await, "<i>one</i>");

    append_row(&handle, "list", group("c", "SRP", "V1")).await;
    append_row(&handle, "list", group("d", "SRP", "V2")).await;
    settle().await;
    assert_eq!(
        inner_html(&handle, "c").await,
        "",
        "cached vin gets no placeholder"
    );

    sleep(DEBOUNCE_PASSED).await;
    let queries = api.group_queries();
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[1].vehicle_ids, vec!["V2"]);
    assert_eq!(inner_html(&handle, "c").await, "<i>one</i>");
    assert_eq!(inner_html(&handle, "d").await, "<i>two</i>");
}

#[tokio::test(start_paused = true)]
async fn fully_cached_round_is_served_without_request() {
    let api = FakeApi::default();
    api.reply_groups(json!({ "buttonGroups": { "V1": "<i>one</i>" } }));
    let handle = spawn(&api, &format!(r#"<div id="list">{}</div>"#, group("a", "SRP", "V1")));
    sleep(DEBOUNCE_PASSED).await;

    append_row(&handle, "list", group("b", "SRP", "V1")).await;
    sleep(DEBOUNCE_PASSED).await;

    assert_eq!(api.group_queries().len(), 1);
    assert_eq!(inner_html(&handle, "b").await, "<i>one</i>");
    assert_eq!(registered(&handle, SRP).await, 0);
}

#[tokio::test(start_paused = true)]
async fn vin_missing_from_response_is_cleared_and_kept() {
    let api = FakeApi::default();
    api.reply_groups(json!({ "buttonGroups": { "V1": "<i>one</i>" } }));
    let handle = spawn(
        &api,
        &format!("{}{}", group("a", "SRP", "V1"), group("b", "SRP", "V2")),
    );

    sleep(DEBOUNCE_PASSED).await;
    assert_eq!(inner_html(&handle, "a").await, "<i>one</i>");
    assert_eq!(inner_html(&handle, "b").await, "");
    assert_eq!(registered(&handle, SRP).await, 1);
}

#[tokio::test(start_paused = true)]
async fn invalid_config_type_is_skipped() {
    let api = FakeApi::default();
    let handle = spawn(
        &api,
        r#"
        <div id="bad" class="prodigy-pricing-button-group" data-config-type="FOO" data-vin="X1">keep me</div>
        <div id="good" class="prodigy-pricing-button-group" data-config-type="SRP" data-vin="X2"></div>
        "#,
    );

    sleep(DEBOUNCE_PASSED).await;
    let queries = api.group_queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].config_type, ConfigType::Srp);
    assert_eq!(queries[0].vehicle_ids, vec!["X2"]);
    assert_eq!(inner_html(&handle, "bad").await, "keep me");
}

#[tokio::test(start_paused = true)]
async fn failure_clears_placeholders_and_retries_with_backoff() {
    let api = FakeApi::default();
    api.fail_groups();
    api.reply_groups(json!({ "buttonGroups": { "V1": "<i>one</i>" } }));
    let handle = spawn(&api, &group("a", "SRP", "V1"));

    sleep(DEBOUNCE_PASSED).await;
    assert_eq!(api.group_queries().len(), 1);
    assert_eq!(inner_html(&handle, "a").await, "");
    assert_eq!(registered(&handle, SRP).await, 1, "failure keeps containers");
    let failures = handle
        .inspect(|state| state.round(SRP).map(|r| r.failures()))
        .await
        .unwrap();
    assert_eq!(failures, Some(1));

    sleep(Duration::from_millis(1_100)).await;
    assert_eq!(api.group_queries().len(), 2);
    assert_eq!(inner_html(&handle, "a").await, "<i>one</i>");
    assert_eq!(registered(&handle, SRP).await, 0);
}

#[tokio::test(start_paused = true)]
async fn retries_stop_at_the_limit() {
    let api = FakeApi::default();
    api.fail_groups();
    api.fail_groups();
    api.fail_groups();
    let handle = spawn(&api, &group("a", "SRP", "V1"));

    sleep(Duration::from_secs(30)).await;
    assert_eq!(api.group_queries().len(), 3, "first attempt plus two retries");
    assert_eq!(registered(&handle, SRP).await, 1);
}

#[tokio::test(start_paused = true)]
async fn removed_container_is_not_requested() {
    let api = FakeApi::default();
    let handle = spawn(
        &api,
        &format!(
            r#"<div id="list"><div id="row">{}</div>{}</div>"#,
            group("a", "SRP", "V1"),
            group("b", "SRP", "V2")
        ),
    );
    handle
        .edit_page(|doc| {
            let row = doc.element_by_id("row").unwrap();
            doc.remove(row);
        })
        .await
        .unwrap();

    sleep(DEBOUNCE_PASSED).await;
    assert_eq!(api.group_queries()[0].vehicle_ids, vec!["V2"]);
}

// ---------------------------------------------------------------------------
// Deal identity
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn first_deal_id_keeps_cache_and_rescans() {
    let api = FakeApi::default();
    api.reply_groups(json!({ "buttonGroups": { "ABC123": "<b>abc</b>" } }));
    let handle = spawn(&api, &group("a", "VDP", "ABC123"));
    sleep(DEBOUNCE_PASSED).await;
    assert_eq!(registered(&handle, VDP).await, 0);

    handle.post_message("dealId:XYZ").unwrap();
    settle().await;
    let (deal, cached, pending) = handle
        .inspect(|state| {
            (
                state.deal_id(),
                state.cache().len(),
                state.registry().count(VDP),
            )
        })
        .await
        .unwrap();
    assert_eq!(deal.as_deref(), Some("XYZ"));
    assert_eq!(cached, 1, "first deal id does not clear loaded buttons");
    assert_eq!(pending, 1, "full rescan re-registers satisfied groups");

    sleep(DEBOUNCE_PASSED).await;
    assert_eq!(api.group_queries().len(), 1, "served from cache");
    assert_eq!(inner_html(&handle, "a").await, "<b>abc</b>");
}

#[tokio::test(start_paused = true)]
async fn replacing_deal_id_refetches_with_new_deal() {
    let api = FakeApi::default();
    api.reply_groups(json!({ "buttonGroups": { "ABC123": "<b>locked</b>" } }));
    api.reply_groups(json!({ "buttonGroups": { "ABC123": "<b>unlocked</b>" } }));
    let handle = spawn(&api, &group("a", "VDP", "ABC123"));
    sleep(DEBOUNCE_PASSED).await;

    handle.post_message("dealId:first").unwrap();
    sleep(DEBOUNCE_PASSED).await;
    handle.post_message("dealId:second").unwrap();
    settle().await;
    assert_eq!(
        handle.inspect(|state| state.cache().len()).await.unwrap(),
        0
    );

    sleep(DEBOUNCE_PASSED).await;
    let queries = api.group_queries();
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[1].deal_id.as_deref(), Some("second"));
    assert_eq!(inner_html(&handle, "a").await, "<b>unlocked</b>");
}

#[tokio::test(start_paused = true)]
async fn response_for_replaced_deal_is_dropped_and_refetched() {
    let api = FakeApi::default();
    api.reply_groups(json!({ "buttonGroups": { "ABC123": "<b>abc-first</b>" } }));
    let stale = api.gate_groups();
    api.reply_groups(json!({
        "buttonGroups": { "ABC123": "<b>abc-second</b>", "DEF456": "<b>def-second</b>" }
    }));
    let handle = spawn(
        &api,
        &format!(r#"<div id="list">{}</div>"#, group("a", "VDP", "ABC123")),
    );
    handle.post_message("dealId:first").unwrap();
    sleep(DEBOUNCE_PASSED).await;
    assert_eq!(inner_html(&handle, "a").await, "<b>abc-first</b>");

    append_row(&handle, "list", group("d", "VDP", "DEF456")).await;
    sleep(DEBOUNCE_PASSED).await;
    let queries = api.group_queries();
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[1].vehicle_ids, vec!["DEF456"]);
    assert_eq!(queries[1].deal_id.as_deref(), Some("first"));

    handle.post_message("dealId:second").unwrap();
    settle().await;
    let reply = serde_json::from_value(json!({ "buttonGroups": { "DEF456": "<b>stale-first</b>" } }))
        .unwrap();
    stale.send(Ok(reply)).unwrap();
    settle().await;

    assert_ne!(inner_html(&handle, "d").await, "<b>stale-first</b>");
    let cached = handle
        .inspect(|state| state.cache().contains("DEF456"))
        .await
        .unwrap();
    assert!(!cached, "stale markup never reaches the cache");

    sleep(DEBOUNCE_PASSED).await;
    let queries = api.group_queries();
    assert_eq!(queries.len(), 3);
    let mut refetched = queries[2].vehicle_ids.clone();
    refetched.sort();
    assert_eq!(refetched, vec!["ABC123", "DEF456"]);
    assert_eq!(queries[2].deal_id.as_deref(), Some("second"));
    assert_eq!(inner_html(&handle, "a").await, "<b>abc-second</b>");
    assert_eq!(inner_html(&handle, "d").await, "<b>def-second</b>");
    assert_eq!(registered(&handle, VDP).await, 0);
}

// ---------------------------------------------------------------------------
// Standalone and API-triggered buttons
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn standalone_buttons_load_without_debounce_and_are_cached() {
    let api = FakeApi::default();
    api.reply_standalone(json!({
        "standaloneButtons": { "tradein": "<a class=\"prodigy-button\" data-action=\"tradeIn\">Trade</a>" },
        "baseUrl": "https://wizard.example.com",
        "CSS": "<style id=\"standalone-css\">.x{}</style>"
    }));
    let handle = spawn(
        &api,
        r#"<div id="list"><div id="t" class="prodigy-standalone-tradein-button"></div></div>"#,
    );

    settle().await;
    assert_eq!(api.standalone_queries().len(), 1);
    assert!(inner_html(&handle, "t").await.contains("Trade"));
    assert_eq!(registered(&handle, Category::Standalone).await, 0);

    append_row(
        &handle,
        "list",
        r#"<div id="t2" class="prodigy-standalone-tradein-button"></div>"#.to_owned(),
    )
    .await;
    settle().await;
    assert_eq!(api.standalone_queries().len(), 1, "served from cache");
    assert!(inner_html(&handle, "t2").await.contains("Trade"));

    let styles = handle
        .inspect(|state| {
            let doc = state.document();
            doc.query(doc.body(), "#standalone-css").unwrap().len()
        })
        .await
        .unwrap();
    assert_eq!(styles, 1, "stylesheet injected once");
}

#[tokio::test(start_paused = true)]
async fn standalone_failure_never_touches_api_buttons() {
    let api = FakeApi::default();
    api.fail_standalone();
    api.fail_standalone();
    let handle = spawn(
        &api,
        r#"
        <div id="t" class="prodigy-standalone-tradein-button"></div>
        <button id="api" class="prodigy-button" data-config-type="API">Host</button>
        "#,
    );

    settle().await;
    assert_eq!(api.standalone_queries().len(), 1);
    assert_eq!(inner_html(&handle, "t").await, "");
    assert_eq!(inner_html(&handle, "api").await, "Host");
    assert_eq!(registered(&handle, Category::Standalone).await, 1);
    assert_eq!(registered(&handle, Category::Api).await, 1);

    sleep(Duration::from_millis(1_100)).await;
    assert_eq!(api.standalone_queries().len(), 2, "one shared retry");
    assert_eq!(inner_html(&handle, "api").await, "Host");
}

#[tokio::test(start_paused = true)]
async fn standalone_and_api_buttons_share_one_request_on_load() {
    let api = FakeApi::default();
    api.reply_standalone(json!({
        "standaloneButtons": { "tradein": "<a class=\"prodigy-button\" data-action=\"tradeIn\">Trade</a>" },
        "baseUrl": "https://wizard.example.com"
    }));
    let handle = spawn(
        &api,
        r#"
        <div id="t" class="prodigy-standalone-tradein-button"></div>
        <button id="api" class="prodigy-button" data-config-type="API">Host</button>
        "#,
    );

    settle().await;
    assert_eq!(api.standalone_queries().len(), 1);
    assert!(inner_html(&handle, "t").await.contains("Trade"));
    assert_eq!(inner_html(&handle, "api").await, "Host");
    assert_eq!(registered(&handle, Category::Standalone).await, 0);
    assert_eq!(registered(&handle, Category::Api).await, 0);

    let idle = handle
        .inspect(|state| {
            [Category::Standalone, Category::Api]
                .into_iter()
                .all(|category| {
                    state
                        .round(category)
                        .is_some_and(prodigy_agent::coordinator::FetchRound::is_idle)
                })
        })
        .await
        .unwrap();
    assert!(idle);
}

#[tokio::test(start_paused = true)]
async fn api_buttons_are_bound_after_standalone_response() {
    let api = FakeApi::default();
    api.reply_standalone(json!({ "standaloneButtons": {}, "baseUrl": "https://wizard.example.com" }));
    let handle = spawn(
        &api,
        r#"<button id="api" class="prodigy-button" data-config-type="API" data-action="testDrive">Host</button>"#,
    );

    settle().await;
    let api_button = node(&handle, "api").await;
    let bound = handle
        .inspect(move |state| state.bound_buttons().contains(&api_button))
        .await
        .unwrap();
    assert!(bound);
    assert_eq!(registered(&handle, Category::Api).await, 0);
    assert_eq!(inner_html(&handle, "api").await, "Host");
}

// ---------------------------------------------------------------------------
// Overlay
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn button_click_opens_wizard_and_close_is_idempotent() {
    let api = FakeApi::default();
    api.reply_groups(json!({
        "buttonGroups": {
            "ABC123": "<span id=\"btn\" class=\"prodigy-button\" data-action=\"tradeIn\" data-vin=\"ABC123\"><em id=\"label\">Trade</em></span>"
        },
        "baseUrl": "https://wizard.example.com"
    }));
    let handle = spawn(&api, &group("g", "VDP", "ABC123"));
    sleep(DEBOUNCE_PASSED).await;

    let label = node(&handle, "label").await;
    handle.click(label).unwrap();
    settle().await;

    assert_eq!(phase(&handle).await, OverlayPhase::Showing);
    let src = handle
        .inspect(|state| {
            let frame = state.overlay().frame();
            state.document().attr(frame, "src").map(str::to_owned)
        })
        .await
        .unwrap();
    assert_eq!(
        src.as_deref(),
        Some(
            "https://wizard.example.com/tradeIn/d1/?source=dealerwebsite\
             &referrerDomain=localhost&iframe=true&vin=ABC123"
        )
    );
    assert!(api
        .tracked()
        .iter()
        .any(|e| e.action == "CLICK" && e.target.as_deref() == Some("TRADE_IN")));

    sleep(FADE_PASSED).await;
    assert_eq!(phase(&handle).await, OverlayPhase::Visible);

    handle.post_message("CLOSE_IFRAME").unwrap();
    handle.post_message("CLOSE_IFRAME").unwrap();
    settle().await;
    assert_eq!(phase(&handle).await, OverlayPhase::Hiding);

    sleep(FADE_PASSED).await;
    assert_eq!(phase(&handle).await, OverlayPhase::Hidden);
    handle.post_message("CLOSE_IFRAME").unwrap();
    settle().await;
    assert_eq!(phase(&handle).await, OverlayPhase::Hidden);
}

#[tokio::test(start_paused = true)]
async fn overlay_click_honours_frame_toggle() {
    let api = FakeApi::default();
    api.reply_standalone(json!({ "standaloneButtons": {}, "baseUrl": "https://wizard.example.com" }));
    let handle = spawn(&api, r#"<div class="prodigy-standalone-browse-button"></div>"#);
    settle().await;

    handle.open_frame(None).unwrap();
    handle.post_message("DISABLE_OVERLAY_CLICK").unwrap();
    handle.click_overlay().unwrap();
    settle().await;
    assert_eq!(phase(&handle).await, OverlayPhase::Showing);

    handle.post_message("ENABLE_OVERLAY_CLICK").unwrap();
    handle.click_overlay().unwrap();
    settle().await;
    assert_eq!(phase(&handle).await, OverlayPhase::Hiding);
}

#[tokio::test(start_paused = true)]
async fn open_frame_without_base_url_does_nothing() {
    let api = FakeApi::default();
    let handle = spawn(&api, "");
    handle.open_frame(Some("tradeIn")).unwrap();
    settle().await;
    assert_eq!(phase(&handle).await, OverlayPhase::Hidden);
}

#[tokio::test(start_paused = true)]
async fn open_frame_defaults_to_browse_pii_first() {
    let api = FakeApi::default();
    api.reply_standalone(json!({ "standaloneButtons": {}, "baseUrl": "https://wizard.example.com" }));
    let handle = spawn(&api, r#"<div class="prodigy-standalone-browse-button"></div>"#);
    settle().await;

    handle.open_frame(None).unwrap();
    settle().await;
    let src = handle
        .inspect(|state| {
            let frame = state.overlay().frame();
            state.document().attr(frame, "src").map(str::to_owned)
        })
        .await
        .unwrap()
        .unwrap();
    assert!(
        src.starts_with("https://wizard.example.com/d1/?action=browse&source=dealerwebsite"),
        "unexpected wizard url: {src}"
    );
}

// ---------------------------------------------------------------------------
// Host integrations
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn host_platform_slots_drive_pricing_and_banner() {
    let api = FakeApi::default();
    api.reply_groups(json!({
        "buttonGroups": { "V9": "<i>nine</i>" },
        "standaloneConfig": { "browse": true, "preapproval": false, "tradein": true }
    }));
    api.reply_standalone(json!({
        "standaloneButtons": { "browse": "<a>Browse</a>", "tradein": "<a>Trade</a>" }
    }));
    let platform = FakePlatform::default();
    let handle = spawn(&api, r#"<div id="slot"></div><div id="banner"></div>"#);

    handle
        .start_ddc(
            PageLoadEvent {
                payload: PageLoadPayload { search_page: true },
            },
            Box::new(platform.clone()),
        )
        .unwrap();
    settle().await;
    assert_eq!(
        *platform.inserted.lock().unwrap(),
        vec![SlotLocation::VehiclePricing]
    );

    let slot = node(&handle, "slot").await;
    handle
        .host_slot(
            SlotLocation::VehiclePricing,
            slot,
            SlotMeta {
                vin: Some("V9".to_owned()),
            },
        )
        .unwrap();
    sleep(DEBOUNCE_PASSED).await;

    let queries = api.group_queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].config_type, ConfigType::Srp);
    assert!(queries[0].standalone_config);
    assert!(inner_html(&handle, "slot").await.contains("<i>nine</i>"));
    assert_eq!(
        *platform.inserted.lock().unwrap(),
        vec![SlotLocation::VehiclePricing, SlotLocation::PrimaryBanner]
    );

    let banner = node(&handle, "banner").await;
    handle
        .host_slot(SlotLocation::PrimaryBanner, banner, SlotMeta::default())
        .unwrap();
    settle().await;

    let banner_html = inner_html(&handle, "banner").await;
    assert!(banner_html.contains(markup::DDC_STANDALONE_CONTAINER_CLASS));
    let browse = banner_html.find("Browse").unwrap();
    let trade = banner_html.find("Trade").unwrap();
    assert!(browse < trade, "banner renders browse before trade-in");
    assert_eq!(api.standalone_queries().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn applicant_info_is_forwarded_to_lead_intake() {
    let api = FakeApi::default();
    let intake = FakeIntake::default();
    let handle = AgentBuilder::new(config(), Document::new(), api.clone())
        .lead_intake(Box::new(intake.clone()))
        .spawn();

    handle
        .post_message(r#"applicantInfo: {"firstName":"Ada","email":"ada@example.com"}"#)
        .unwrap();
    handle.post_message("applicantInfo:{broken").unwrap();
    settle().await;

    let leads = intake.leads.lock().unwrap().clone();
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].0, "prodigy");
    assert_eq!(leads[0].1["firstName"], "Ada");
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_the_loop() {
    let api = FakeApi::default();
    let handle = spawn(&api, "");
    handle.shutdown().unwrap();
    settle().await;
    assert!(handle.open_frame(None).is_err());
}
