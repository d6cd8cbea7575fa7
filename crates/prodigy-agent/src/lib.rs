//! The widget agent: discovers button markers in a host page, loads their
//! markup from the widget API, keeps it in step with page changes, and runs
//! the wizard overlay.

pub mod agent;
pub mod api;
pub mod coordinator;
pub mod deal;
pub mod dom;
pub mod error;
pub mod host;
pub mod markup;
pub mod message;
pub mod overlay;
pub mod registry;
pub mod storage;
pub mod watcher;

pub use agent::{AgentBuilder, AgentHandle, AgentState};
pub use api::WidgetApi;
pub use deal::{DealChange, DealStore};
pub use dom::{Document, MutationRecord, NodeId, Viewport};
pub use error::{AgentError, DiscoveryError, MessageError};
pub use host::{HostPlatform, LeadIntake, PageLoadEvent, PageLoadPayload, SlotLocation, SlotMeta};
pub use message::FrameMessage;
pub use overlay::{Layout, OverlayPhase};
pub use registry::{ButtonContainer, Category, LoadedButtonsCache, Registry};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
