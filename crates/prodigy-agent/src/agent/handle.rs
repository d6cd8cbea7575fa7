use tokio::sync::{mpsc, oneshot};

use crate::dom::{Document, NodeId};
use crate::error::AgentError;
use crate::host::{HostPlatform, PageLoadEvent, SlotLocation, SlotMeta};

use super::{AgentEvent, AgentState};

pub(crate) type PageEdit = Box<dyn FnOnce(&mut Document) + Send>;
pub(crate) type StateProbe = Box<dyn FnOnce(&AgentState) + Send>;

pub(crate) enum Command {
    OpenFrame(Option<String>),
    PostMessage(String),
    Click(NodeId),
    ClickOverlay,
    EditPage(PageEdit),
    StartDdc(PageLoadEvent, Box<dyn HostPlatform>),
    HostSlot {
        location: SlotLocation,
        element: NodeId,
        meta: SlotMeta,
    },
    Inspect(StateProbe),
    Shutdown,
}

/// Cheap, cloneable way to talk to a running agent.
///
/// Every call is queued and handled in order by the agent's event loop.
/// Calls fail with [`AgentError::Stopped`] once the loop has exited.
#[derive(Clone)]
pub struct AgentHandle {
    events: mpsc::UnboundedSender<AgentEvent>,
}

impl AgentHandle {
    pub(crate) fn new(events: mpsc::UnboundedSender<AgentEvent>) -> Self {
        Self { events }
    }

    fn send(&self, command: Command) -> Result<(), AgentError> {
        self.events
            .send(AgentEvent::Command(command))
            .map_err(|_| AgentError::Stopped)
    }

    /// Opens the wizard overlay directly, PII-first. `target` is the
    /// wizard action and defaults to `browse`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Stopped`] if the agent has exited.
    pub fn open_frame(&self, target: Option<&str>) -> Result<(), AgentError> {
        self.send(Command::OpenFrame(target.map(str::to_owned)))
    }

    /// Delivers a message posted by the wizard frame.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Stopped`] if the agent has exited.
    pub fn post_message(&self, message: impl Into<String>) -> Result<(), AgentError> {
        self.send(Command::PostMessage(message.into()))
    }

    /// A click on `node` or one of its descendants.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Stopped`] if the agent has exited.
    pub fn click(&self, node: NodeId) -> Result<(), AgentError> {
        self.send(Command::Click(node))
    }

    /// A click on the overlay background.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Stopped`] if the agent has exited.
    pub fn click_overlay(&self) -> Result<(), AgentError> {
        self.send(Command::ClickOverlay)
    }

    /// Runs `edit` against the page as the host site would, then lets the
    /// agent observe the resulting mutations.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Stopped`] if the agent has exited.
    pub async fn edit_page<T, F>(&self, edit: F) -> Result<T, AgentError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Document) -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.send(Command::EditPage(Box::new(move |doc| {
            let _ = tx.send(edit(doc));
        })))?;
        rx.await.map_err(|_| AgentError::Stopped)
    }

    /// Attaches a host platform and registers the `vehicle-pricing` slot.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Stopped`] if the agent has exited.
    pub fn start_ddc(
        &self,
        page_load: PageLoadEvent,
        platform: Box<dyn HostPlatform>,
    ) -> Result<(), AgentError> {
        self.send(Command::StartDdc(page_load, platform))
    }

    /// The host platform delivering `element` for a registered slot.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Stopped`] if the agent has exited.
    pub fn host_slot(
        &self,
        location: SlotLocation,
        element: NodeId,
        meta: SlotMeta,
    ) -> Result<(), AgentError> {
        self.send(Command::HostSlot {
            location,
            element,
            meta,
        })
    }

    /// Reads agent state between events.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Stopped`] if the agent has exited.
    pub async fn inspect<T, F>(&self, probe: F) -> Result<T, AgentError>
    where
        T: Send + 'static,
        F: FnOnce(&AgentState) -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Inspect(Box::new(move |state| {
            let _ = tx.send(probe(state));
        })))?;
        rx.await.map_err(|_| AgentError::Stopped)
    }

    /// Stops the event loop. Pending timers are cancelled; requests already
    /// in flight complete but their results are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Stopped`] if the agent has already exited.
    pub fn shutdown(&self) -> Result<(), AgentError> {
        self.send(Command::Shutdown)
    }
}
