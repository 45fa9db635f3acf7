mod config;
mod context;
mod coordinator;
mod defaults;
mod error;
mod events;
mod flag;
mod flag_value;
mod provider;
mod record;
mod store;
mod test_common;

pub use config::*;
pub use context::*;
pub use coordinator::*;
pub use defaults::*;
pub use error::*;
pub use events::*;
pub use flag::*;
pub use flag_value::*;
pub use provider::*;
pub use record::*;
pub use store::*;
