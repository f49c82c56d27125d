//! Collaborators of the booking sagas: the inventory authority and the
//! notification transport.

pub mod http_inventory;
pub mod inventory;
pub mod publisher;

pub use http_inventory::HttpInventoryClient;
pub use inventory::{
    InMemoryInventoryClient, InventoryClient, InventoryError, ReservationRequest,
    ReservationResult,
};
pub use publisher::{
    ChannelEventPublisher, EventPublisher, InMemoryEventPublisher, PublishError,
    PublishedMessage,
};
