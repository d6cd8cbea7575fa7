//! The agent event loop.
//!
//! One task owns every piece of mutable state. Host commands, timer
//! expiries and request completions all arrive as [`AgentEvent`]s on a
//! single channel and are handled one at a time; after each event the
//! page's pending mutation records are fed through the watcher until the
//! page stops changing.

mod handle;
mod reconcile;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::Utc;
use prodigy_core::{infer_host_quirk, AgentConfig, ConfigType, HostQuirk, TrackAction};
use prodigy_widgets::{
    ButtonGroupsQuery, ButtonGroupsResponse, StandaloneButtonsResponse, StandaloneConfig,
    StandaloneQuery, TrackingEvent, WidgetError, WizardSource,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::WidgetApi;
use crate::coordinator::{FetchRound, RoundState, Step};
use crate::deal::{DealChange, DealStore};
use crate::dom::{Document, NodeId, Selector};
use crate::host::{self, HostPlatform, LeadIntake, PageLoadEvent, SlotLocation, SlotMeta};
use crate::markup;
use crate::message::FrameMessage;
use crate::overlay::{Layout, Overlay};
use crate::registry::{Category, LoadedButtonsCache, Registry};
use crate::storage::{KeyValueStore, MemoryStore};
use crate::watcher;

pub use handle::AgentHandle;
use handle::Command;

static BUTTONS: LazyLock<Selector> =
    LazyLock::new(|| markup::BUTTON_SELECTOR.parse().expect("valid selector"));

const DEFAULT_ACTION: &str = "browse";
const LEAD_SOURCE: &str = "prodigy";

pub(crate) enum AgentEvent {
    Command(Command),
    RoundTimer {
        category: Category,
        generation: u64,
    },
    PricingFetched {
        config_type: ConfigType,
        requested: Vec<String>,
        epoch: u64,
        result: Result<ButtonGroupsResponse, WidgetError>,
    },
    /// Answers every standalone-endpoint round in flight, not only the
    /// one that sent the request.
    StandaloneFetched {
        epoch: u64,
        result: Result<StandaloneButtonsResponse, WidgetError>,
    },
    FadeElapsed {
        generation: u64,
    },
}

/// Everything the agent owns apart from its tasks. Readable through
/// [`AgentHandle::inspect`].
pub struct AgentState {
    config: AgentConfig,
    document: Document,
    registry: Registry,
    cache: LoadedButtonsCache,
    standalone_cache: Option<StandaloneButtonsResponse>,
    deals: DealStore,
    /// Bumped whenever the deal id is replaced. Responses requested under
    /// an older epoch are never applied.
    deal_epoch: u64,
    overlay: Overlay,
    rounds: BTreeMap<Category, FetchRound>,
    base_url: Option<String>,
    is_group_website: bool,
    quirk: HostQuirk,
    platform: Option<Box<dyn HostPlatform>>,
    search_page: bool,
    banner_registered: bool,
    banner_config: Option<StandaloneConfig>,
    lead_intake: Option<Box<dyn LeadIntake>>,
    bound_buttons: BTreeSet<NodeId>,
}

impl AgentState {
    #[must_use]
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub fn cache(&self) -> &LoadedButtonsCache {
        &self.cache
    }

    #[must_use]
    pub fn standalone_cache(&self) -> Option<&StandaloneButtonsResponse> {
        self.standalone_cache.as_ref()
    }

    #[must_use]
    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    /// Wizard base URL from the most recent response that carried one.
    #[must_use]
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    #[must_use]
    pub fn is_group_website(&self) -> bool {
        self.is_group_website
    }

    #[must_use]
    pub fn quirk(&self) -> HostQuirk {
        self.quirk
    }

    #[must_use]
    pub fn deal_id(&self) -> Option<String> {
        self.deals.get(Utc::now())
    }

    #[must_use]
    pub fn round(&self, category: Category) -> Option<&FetchRound> {
        self.rounds.get(&category)
    }

    /// Buttons that currently open the wizard when clicked.
    #[must_use]
    pub fn bound_buttons(&self) -> &BTreeSet<NodeId> {
        &self.bound_buttons
    }

    fn in_flight(&self, category: Category) -> bool {
        self.rounds
            .get(&category)
            .is_some_and(|round| matches!(round.state(), RoundState::InFlight { .. }))
    }

    fn round_mut(&mut self, category: Category) -> &mut FetchRound {
        let config = &self.config;
        self.rounds
            .entry(category)
            .or_insert_with(|| new_round(config, category))
    }
}

fn new_round(config: &AgentConfig, category: Category) -> FetchRound {
    let debounce = match category {
        Category::Pricing(_) => Duration::from_millis(config.debounce_ms),
        Category::Standalone | Category::Api => Duration::ZERO,
    };
    FetchRound::new(
        category,
        debounce,
        config.fetch_retry_limit,
        Duration::from_millis(config.fetch_retry_backoff_ms),
    )
}

/// Configures and starts an agent on the current tokio runtime.
pub struct AgentBuilder<A: WidgetApi> {
    config: AgentConfig,
    document: Document,
    api: A,
    storage: Option<Box<dyn KeyValueStore>>,
    lead_intake: Option<Box<dyn LeadIntake>>,
}

impl<A: WidgetApi> AgentBuilder<A> {
    #[must_use]
    pub fn new(config: AgentConfig, document: Document, api: A) -> Self {
        Self {
            config,
            document,
            api,
            storage: None,
            lead_intake: None,
        }
    }

    /// Where the deal id persists. Defaults to an in-memory store.
    #[must_use]
    pub fn storage(mut self, storage: Box<dyn KeyValueStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    #[must_use]
    pub fn lead_intake(mut self, intake: Box<dyn LeadIntake>) -> Self {
        self.lead_intake = Some(intake);
        self
    }

    /// Spawns the event loop. The loop runs until [`AgentHandle::shutdown`]
    /// or until every handle is dropped.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn spawn(self) -> AgentHandle {
        let Self {
            config,
            mut document,
            api,
            storage,
            lead_intake,
        } = self;

        let overlay = Overlay::mount(&mut document);
        let rounds = Category::ALL
            .into_iter()
            .map(|category| (category, new_round(&config, category)))
            .collect();
        let storage: Box<dyn KeyValueStore> =
            storage.unwrap_or_else(|| Box::new(MemoryStore::new()));

        let state = AgentState {
            config,
            document,
            registry: Registry::new(),
            cache: LoadedButtonsCache::default(),
            standalone_cache: None,
            deals: DealStore::new(storage),
            deal_epoch: 0,
            overlay,
            rounds,
            base_url: None,
            is_group_website: false,
            quirk: HostQuirk::Default,
            platform: None,
            search_page: false,
            banner_registered: false,
            banner_config: None,
            lead_intake,
            bound_buttons: BTreeSet::new(),
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let agent = Agent {
            state,
            api: Arc::new(api),
            events: tx.downgrade(),
            timers: HashMap::new(),
            fade_timer: None,
        };
        tokio::spawn(agent.run(rx));
        AgentHandle::new(tx)
    }
}

struct Agent<A: WidgetApi> {
    state: AgentState,
    api: Arc<A>,
    /// Weak so that timers and requests never keep a dropped agent alive.
    events: mpsc::WeakUnboundedSender<AgentEvent>,
    timers: HashMap<Category, JoinHandle<()>>,
    fade_timer: Option<JoinHandle<()>>,
}

fn post(events: &mpsc::WeakUnboundedSender<AgentEvent>, event: AgentEvent) {
    if let Some(tx) = events.upgrade() {
        let _ = tx.send(event);
    }
}

impl<A: WidgetApi> Agent<A> {
    async fn run(mut self, mut events: mpsc::UnboundedReceiver<AgentEvent>) {
        self.start();
        while let Some(event) = events.recv().await {
            if !self.handle(event) {
                break;
            }
            self.flush_mutations();
        }
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
        if let Some(timer) = self.fade_timer.take() {
            timer.abort();
        }
        tracing::debug!("agent stopped");
    }

    fn start(&mut self) {
        let now = Utc::now();
        let state = &mut self.state;
        state.quirk = infer_host_quirk(state.document.head_link_hrefs());
        state.deals.touch_if_absent(now);

        let body = state.document.body();
        let scan = state.registry.scan(&state.document, body);
        Registry::placeholder(&mut state.document, &scan.added, &state.cache);
        // The initial scan covers everything already in the page.
        state.document.take_mutations();

        tracing::info!(
            env = %state.config.env,
            quirk = ?state.quirk,
            containers = state.registry.len(),
            invalid = scan.errors.len(),
            "agent started"
        );

        for category in Category::ALL {
            self.discover(category);
        }
        self.track("LOAD", None);
    }

    /// Returns `false` when the loop should stop.
    fn handle(&mut self, event: AgentEvent) -> bool {
        match event {
            AgentEvent::Command(command) => return self.command(command),
            AgentEvent::RoundTimer {
                category,
                generation,
            } => {
                let step = self.state.round_mut(category).timer_fired(generation);
                self.apply(category, step);
            }
            AgentEvent::PricingFetched {
                config_type,
                requested,
                epoch,
                result,
            } => self.pricing_fetched(config_type, &requested, epoch, result),
            AgentEvent::StandaloneFetched { epoch, result } => {
                self.standalone_fetched(epoch, result);
            }
            AgentEvent::FadeElapsed { generation } => {
                self.state
                    .overlay
                    .fade_complete(&mut self.state.document, generation);
            }
        }
        true
    }

    fn command(&mut self, command: Command) -> bool {
        match command {
            Command::OpenFrame(target) => self.open_frame(target.as_deref()),
            Command::PostMessage(raw) => self.message(&raw),
            Command::Click(node) => self.click(node),
            Command::ClickOverlay => {
                let state = &mut self.state;
                if let Some(generation) = state.overlay.click_overlay(&mut state.document) {
                    self.schedule_fade(generation);
                }
            }
            Command::EditPage(edit) => edit(&mut self.state.document),
            Command::StartDdc(page_load, platform) => self.start_ddc(&page_load, platform),
            Command::HostSlot {
                location,
                element,
                meta,
            } => self.host_slot(location, element, &meta),
            Command::Inspect(probe) => probe(&self.state),
            Command::Shutdown => return false,
        }
        true
    }

    fn flush_mutations(&mut self) {
        loop {
            let records = self.state.document.take_mutations();
            if records.is_empty() {
                return;
            }
            let state = &mut self.state;
            let gained = watcher::process(
                &mut state.document,
                &mut state.registry,
                &state.cache,
                &records,
                state.quirk,
            );
            for category in gained {
                self.discover(category);
            }
        }
    }

    // ---- fetch rounds ----------------------------------------------------

    fn discover(&mut self, category: Category) {
        if self.state.registry.count(category) == 0 {
            return;
        }
        let step = self.state.round_mut(category).discover();
        self.apply(category, step);
    }

    fn apply(&mut self, category: Category, step: Step) {
        match step {
            Step::Idle | Step::Wait => {}
            Step::Dispatch => {
                if let Some(timer) = self.timers.remove(&category) {
                    timer.abort();
                }
                self.dispatch(category);
            }
            Step::Schedule { generation, delay } => {
                let events = self.events.clone();
                let timer = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    post(
                        &events,
                        AgentEvent::RoundTimer {
                            category,
                            generation,
                        },
                    );
                });
                if let Some(previous) = self.timers.insert(category, timer) {
                    previous.abort();
                }
            }
        }
    }

    fn dispatch(&mut self, category: Category) {
        match category {
            Category::Pricing(config_type) => self.dispatch_pricing(config_type),
            Category::Standalone | Category::Api => self.dispatch_standalone(category),
        }
    }

    fn dispatch_pricing(&mut self, config_type: ConfigType) {
        let category = Category::Pricing(config_type);
        let state = &mut self.state;

        let mut vins: Vec<String> = Vec::new();
        let mut any = false;
        for container in state.registry.iter().filter(|c| c.category() == category) {
            any = true;
            if let Some(vin) = container.vin() {
                if !state.cache.contains(vin) && !vins.iter().any(|v| v == vin) {
                    vins.push(vin.to_owned());
                }
            }
        }

        if !any {
            state.round_mut(category).skip();
            return;
        }
        if vins.is_empty() {
            let filled = reconcile::fill_cached(state, config_type);
            reconcile::rebind(state);
            tracing::debug!(config_type = %config_type, filled, "button groups served from cache");
            state.round_mut(category).skip();
            return;
        }

        let config = &state.config;
        let query = ButtonGroupsQuery {
            config_type,
            dealer_id: config.dealer_id.clone(),
            website_id: config.website_id.clone(),
            vehicle_ids: vins.clone(),
            deal_id: state.deals.get(Utc::now()),
            sales_person_name: config.sales_person_name.clone(),
            standalone_config: state.platform.is_some(),
            cache_bust: config.bust_cache.then(|| Utc::now().timestamp_millis()),
        };
        tracing::info!(config_type = %config_type, vins = vins.len(), "requesting button groups");
        state.round_mut(category).begin();

        let epoch = state.deal_epoch;
        let api = Arc::clone(&self.api);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = api.button_groups(query).await;
            post(
                &events,
                AgentEvent::PricingFetched {
                    config_type,
                    requested: vins,
                    epoch,
                    result,
                },
            );
        });
    }

    fn dispatch_standalone(&mut self, category: Category) {
        let state = &mut self.state;
        if state.registry.count(category) == 0 {
            state.round_mut(category).skip();
            return;
        }
        if let Some(cached) = state.standalone_cache.take() {
            reconcile::standalone_success(state, category, &cached);
            state.standalone_cache = Some(cached);
            state.round_mut(category).skip();
            return;
        }

        // Standalone and API rounds hit the same endpoint; one request
        // answers both.
        let sibling = match category {
            Category::Api => Category::Standalone,
            _ => Category::Api,
        };
        if state.in_flight(sibling) {
            tracing::debug!(category = %category, "joining standalone request in flight");
            state.round_mut(category).begin();
            return;
        }

        let config = &state.config;
        let query = StandaloneQuery {
            dealer_id: config.dealer_id.clone(),
            website_id: config.website_id.clone(),
            sales_person_name: config.sales_person_name.clone(),
            deal_id: state.deals.get(Utc::now()),
        };
        tracing::info!(category = %category, "requesting standalone buttons");
        state.round_mut(category).begin();

        let epoch = state.deal_epoch;
        let api = Arc::clone(&self.api);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = api.standalone_buttons(query).await;
            post(&events, AgentEvent::StandaloneFetched { epoch, result });
        });
    }

    fn pricing_fetched(
        &mut self,
        config_type: ConfigType,
        requested: &[String],
        epoch: u64,
        result: Result<ButtonGroupsResponse, WidgetError>,
    ) {
        let category = Category::Pricing(config_type);
        if epoch != self.state.deal_epoch {
            tracing::debug!(
                config_type = %config_type,
                "dropping button groups fetched for a replaced deal"
            );
            reconcile::pricing_failure(&mut self.state, config_type);
            let step = self.state.round_mut(category).discard();
            self.apply(category, step);
            return;
        }
        let step = match result {
            Ok(response) => {
                reconcile::pricing_success(&mut self.state, config_type, requested, response);
                self.state.round_mut(category).succeed()
            }
            Err(e) => {
                tracing::warn!(config_type = %config_type, error = %e, "button groups request failed");
                reconcile::pricing_failure(&mut self.state, config_type);
                self.state.round_mut(category).fail()
            }
        };
        self.apply(category, step);
    }

    fn standalone_fetched(
        &mut self,
        epoch: u64,
        result: Result<StandaloneButtonsResponse, WidgetError>,
    ) {
        let waiting: Vec<Category> = [Category::Standalone, Category::Api]
            .into_iter()
            .filter(|category| self.state.in_flight(*category))
            .collect();

        let steps: Vec<(Category, Step)> = match result {
            _ if epoch != self.state.deal_epoch => {
                tracing::debug!("dropping standalone buttons fetched for a replaced deal");
                reconcile::standalone_failure(&mut self.state);
                waiting
                    .into_iter()
                    .map(|category| (category, self.state.round_mut(category).discard()))
                    .collect()
            }
            Ok(response) => {
                for category in &waiting {
                    reconcile::standalone_success(&mut self.state, *category, &response);
                }
                self.state.standalone_cache = Some(response);
                waiting
                    .into_iter()
                    .map(|category| (category, self.state.round_mut(category).succeed()))
                    .collect()
            }
            Err(e) => {
                tracing::warn!(error = %e, "standalone buttons request failed");
                reconcile::standalone_failure(&mut self.state);
                waiting
                    .into_iter()
                    .map(|category| (category, self.state.round_mut(category).fail()))
                    .collect()
            }
        };
        for (category, step) in steps {
            self.apply(category, step);
        }
    }

    // ---- overlay and frame ----------------------------------------------

    fn click(&mut self, node: NodeId) {
        let state = &self.state;
        let mut current = Some(node);
        let button = loop {
            match current {
                Some(n) if state.bound_buttons.contains(&n) => break n,
                Some(n) => current = state.document.parent(n),
                None => return,
            }
        };

        let doc = &state.document;
        let action = doc.attr(button, "data-action").unwrap_or_default().to_owned();
        let vin = doc.attr(button, "data-vin").map(str::to_owned);
        let dealer_id = doc
            .attr(button, "data-dealer-id")
            .map(str::to_owned)
            .or_else(|| state.config.dealer_id.clone());
        let sales_person_name = doc
            .attr(button, "data-sales-person-name")
            .map(str::to_owned)
            .or_else(|| state.config.sales_person_name.clone());
        let pii_first = doc
            .attr(button, "data-pii-first")
            .is_some_and(|v| !matches!(v.trim(), "" | "false" | "undefined"));

        let target = TrackAction::from_button_action(Some(action.as_str()));
        let opened = self.open_wizard(
            &action,
            vin.as_deref(),
            dealer_id.as_deref(),
            sales_person_name.as_deref(),
            pii_first,
        );
        if opened {
            self.track("CLICK", Some(target.id()));
        }
    }

    fn open_frame(&mut self, target: Option<&str>) {
        self.state.deals.touch_if_absent(Utc::now());
        let action = target.filter(|t| !t.is_empty()).unwrap_or(DEFAULT_ACTION);
        let dealer_id = self.state.config.dealer_id.clone();
        let sales_person_name = self.state.config.sales_person_name.clone();
        self.open_wizard(
            action,
            None,
            dealer_id.as_deref(),
            sales_person_name.as_deref(),
            true,
        );
    }

    /// Builds the wizard URL and shows the overlay. Returns whether it
    /// opened.
    fn open_wizard(
        &mut self,
        action: &str,
        vin: Option<&str>,
        dealer_id: Option<&str>,
        sales_person_name: Option<&str>,
        pii_first: bool,
    ) -> bool {
        let state = &mut self.state;
        let Some(base) = state.base_url.as_deref() else {
            tracing::warn!(action, "no wizard base url yet, ignoring open");
            return false;
        };
        let deal_id = state.deals.get(Utc::now());
        let dealer_code = state.platform.as_ref().and_then(|p| p.dealer_code());
        let source = WizardSource {
            base,
            action,
            vin,
            dealer_id,
            website_id: state.config.website_id.as_deref(),
            deal_id: deal_id.as_deref(),
            sales_person_name,
            pii_first,
            is_group_website: state.is_group_website,
            referrer_domain: &state.config.referrer_domain,
            page_url: state.config.page_url.as_deref(),
            dealer_code: dealer_code.as_deref(),
        };
        let Some(url) = source.build() else {
            tracing::warn!(action, "neither dealer id nor website id known, cannot open wizard");
            return false;
        };

        let layout = Layout::for_viewport(&state.document);
        let generation = state.overlay.open(&mut state.document, &url, layout);
        tracing::info!(action, url = %url, "wizard opened");
        self.schedule_fade(generation);
        true
    }

    fn schedule_fade(&mut self, generation: u64) {
        let delay = Duration::from_millis(self.state.config.fade_ms);
        let events = self.events.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            post(&events, AgentEvent::FadeElapsed { generation });
        });
        if let Some(previous) = self.fade_timer.replace(timer) {
            previous.abort();
        }
    }

    fn message(&mut self, raw: &str) {
        let message = match FrameMessage::parse(raw) {
            Ok(Some(message)) => message,
            Ok(None) => {
                tracing::debug!("ignoring unrelated frame message");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed frame message");
                return;
            }
        };

        match message {
            FrameMessage::CloseFrame => {
                let state = &mut self.state;
                if let Some(generation) = state.overlay.close(&mut state.document) {
                    self.schedule_fade(generation);
                }
            }
            FrameMessage::EnableOverlayClick => self.state.overlay.set_click_to_close(true),
            FrameMessage::DisableOverlayClick => self.state.overlay.set_click_to_close(false),
            FrameMessage::DealId(id) => self.apply_deal_id(&id),
            FrameMessage::ApplicantInfo(applicant) => match self.state.lead_intake.as_mut() {
                Some(intake) => intake.post_lead(LEAD_SOURCE, &applicant),
                None => tracing::debug!("no lead intake attached, dropping applicant info"),
            },
        }
    }

    fn apply_deal_id(&mut self, id: &str) {
        let state = &mut self.state;
        let change = state.deals.set(id, Utc::now());
        if let DealChange::Replaced { previous } = &change {
            tracing::info!(previous = %previous, "deal replaced, dropping loaded buttons");
            state.deal_epoch += 1;
            state.cache.clear();
            state.standalone_cache = None;
        }
        tracing::debug!(change = ?change, "deal id stored");

        let body = state.document.body();
        state.registry.scan(&state.document, body);
        for category in Category::ALL {
            self.discover(category);
        }
    }

    // ---- host platform ---------------------------------------------------

    fn start_ddc(&mut self, page_load: &PageLoadEvent, mut platform: Box<dyn HostPlatform>) {
        platform.insert(SlotLocation::VehiclePricing);
        self.state.search_page = page_load.payload.search_page;
        self.state.platform = Some(platform);
        tracing::info!(search_page = self.state.search_page, "host platform attached");
    }

    fn host_slot(&mut self, location: SlotLocation, element: NodeId, meta: &SlotMeta) {
        let state = &mut self.state;
        let Some(platform) = state.platform.as_mut() else {
            tracing::debug!(location = %location, "no host platform attached, ignoring slot");
            return;
        };
        let child = match location {
            SlotLocation::VehiclePricing => {
                match host::pricing_slot(&mut state.document, meta, state.search_page) {
                    Some(child) => child,
                    None => {
                        tracing::warn!("vehicle-pricing slot delivered without a vin");
                        return;
                    }
                }
            }
            SlotLocation::PrimaryBanner => match state.banner_config.as_ref() {
                Some(config) if state.banner_registered => {
                    host::standalone_slot(&mut state.document, config)
                }
                _ => {
                    tracing::debug!(location = %location, "slot not registered, ignoring");
                    return;
                }
            },
        };
        platform.append(&mut state.document, element, child);
    }

    fn track(&self, action: &'static str, target: Option<&'static str>) {
        let event = TrackingEvent {
            action: action.to_owned(),
            target: target.map(str::to_owned),
            deal_id: self.state.deals.get(Utc::now()),
            dealer_id: self.state.config.dealer_id.clone(),
            timestamp: Utc::now().timestamp_millis(),
        };
        let api = Arc::clone(&self.api);
        tokio::spawn(async move {
            if let Err(e) = api.track(event).await {
                tracing::warn!(action, error = %e, "tracking beacon failed");
            }
        });
    }
}
