pub mod buffer;
pub mod config;
pub mod controller;
pub mod error;
pub mod idle;
pub mod node;
pub mod output;
pub mod pixel;
pub mod protocol;
pub mod transport;

pub use controller::{Action, Controller, LED_COUNT};
pub use error::{Error, Result};
pub use node::LightNode;
pub use pixel::Pixel;
