//! Voice assistant widget
//!
//! An explicit state machine with three connection states:
//! - Disconnected: no session, the default
//! - Connecting: start requested, waiting for the provider to acknowledge
//! - Connected: session open; Speaking is a 1s substate after a user turn
//!
//! Sessions only start and end on user action. There is no automatic
//! reconnection, inactivity reconnection or heartbeat. Every visitor gets
//! a widget of their own through [`WidgetRegistry`].

mod elevenlabs;
mod machine;
mod provider;
mod registry;
mod transcript;

pub use elevenlabs::ElevenLabsProvider;
pub use machine::{command_channel, Command, StartOptions, StatusChange, VoiceWidget};
pub use registry::{WidgetRegistry, CLIENT_HEADER};
