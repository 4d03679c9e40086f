pub mod app;
pub mod backend;
pub mod character;
pub mod context;
pub mod error;
pub mod export;
pub mod health;
pub mod logging;
pub mod pending;
pub mod record;
pub mod session;
pub mod settings;
pub mod store;
pub mod tui;
pub mod ui;

// Re-export commonly used items for easier access
pub use backend::BackendClient;
pub use character::CharacterSheet;
pub use error::{Error, Result};
pub use health::{HealthLedger, Tier, compute_derived, derive_wound_tier, distribute_damage};
pub use session::{Identity, Role};
pub use settings::Settings;
pub use store::{CharacterStore, Repository};
