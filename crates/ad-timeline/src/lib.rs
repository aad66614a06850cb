//! Ad insertion timeline state.
//!
//! An [`AdPlaybackState`] tracks where ad breaks sit in a content period, the
//! state of every ad in each break, and answers which break a playback
//! controller has to play next. Values are immutable: every edit returns a new
//! state and leaves the previous one usable.
#![doc = include_str!("../README.md")]

mod ad_group;
mod config;
mod error;
mod playback_state;
mod record;
mod resolver;
mod types;

pub use ad_group::AdGroup;
pub use config::{AdBreakConfig, AdScheduleConfig};
pub use error::{AdPlaybackError, Result};
pub use playback_state::AdPlaybackState;
pub use types::*;
pub use url::Url;
