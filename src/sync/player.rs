//! Capability boundary toward the live game server.
//!
//! The engine never talks to the server directly; it receives a
//! [`PlayerDirectory`] and drives every live-state read or write through
//! these traits from the authority task. Implementations adapt whatever the
//! host server exposes (plugin API, test fake, remote shim).

use uuid::Uuid;

use crate::snapshot::{GameMode, Slot};

/// Carried inventory of a player as one unit: main grid, armor, off-hand.
/// Applied wholesale so a load can never leave a half-replaced inventory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventoryContents {
    pub main: Vec<Slot>,
    pub armor: Vec<Slot>,
    pub off_hand: Slot,
}

/// A live, mutable player handle. Only ever touched on the authority task.
pub trait LivePlayer: Send {
    fn id(&self) -> Uuid;
    fn name(&self) -> String;

    /// Identifier of the world the player currently occupies.
    fn world(&self) -> String;

    fn game_mode(&self) -> GameMode;
    fn is_online(&self) -> bool;

    fn inventory(&self) -> InventoryContents;
    fn ender_chest(&self) -> Vec<Slot>;

    fn set_inventory(&mut self, contents: InventoryContents);
    fn set_ender_chest(&mut self, slots: Vec<Slot>);

    /// User-visible feedback (chat line) after a completed operation.
    fn send_message(&mut self, text: &str);
}

/// Lookup of live players by id. Returning `None` means the player is not
/// available for live-state mutation (offline or mid-disconnect).
pub trait PlayerDirectory: Send {
    fn get(&mut self, id: Uuid) -> Option<&mut dyn LivePlayer>;
}
