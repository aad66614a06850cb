use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Time in microseconds within a period
pub type TimeUs = i64;

/// Opaque identifier correlating an ad playback state with its content
pub type AdsId = String;

/// Where an ad group sits in the content period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdGroupTime {
	/// A break at a fixed offset into the period
	At(TimeUs),
	/// A break anchored to the end of content, whatever its duration
	Postroll,
}

impl AdGroupTime {
	pub const fn is_postroll(self) -> bool {
		matches!(self, Self::Postroll)
	}

	/// Offset of the break, `None` for a postroll
	pub const fn as_us(self) -> Option<TimeUs> {
		match self {
			Self::At(time_us) => Some(time_us),
			Self::Postroll => None,
		}
	}
}

impl From<TimeUs> for AdGroupTime {
	fn from(time_us: TimeUs) -> Self {
		Self::At(time_us)
	}
}

/// Postroll sorts after every finite time.
impl Ord for AdGroupTime {
	fn cmp(&self, other: &Self) -> Ordering {
		match (self, other) {
			(Self::At(a), Self::At(b)) => a.cmp(b),
			(Self::At(_), Self::Postroll) => Ordering::Less,
			(Self::Postroll, Self::At(_)) => Ordering::Greater,
			(Self::Postroll, Self::Postroll) => Ordering::Equal,
		}
	}
}

impl PartialOrd for AdGroupTime {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl fmt::Display for AdGroupTime {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::At(time_us) => write!(f, "{time_us}"),
			Self::Postroll => f.write_str("postroll"),
		}
	}
}

/// A playback position used to query the resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackPosition {
	At(TimeUs),
	/// Playback has reached the end of the content
	EndOfSource,
}

impl From<TimeUs> for PlaybackPosition {
	fn from(position_us: TimeUs) -> Self {
		Self::At(position_us)
	}
}

/// Lifecycle of a single ad within a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AdState {
	/// Not yet loaded, no URI known
	#[default]
	Unavailable,
	/// URI known, ready to play
	Available,
	Skipped,
	Played,
	Error,
}

impl AdState {
	/// Played, skipped and errored ads never change state again.
	pub const fn is_terminal(self) -> bool {
		matches!(self, Self::Skipped | Self::Played | Self::Error)
	}

	/// Whether a non server-side-inserted ad in this state still needs playing
	pub const fn is_pending(self) -> bool {
		matches!(self, Self::Unavailable | Self::Available)
	}

	/// Stable wire code
	pub const fn code(self) -> u8 {
		match self {
			Self::Unavailable => 0,
			Self::Available => 1,
			Self::Skipped => 2,
			Self::Played => 3,
			Self::Error => 4,
		}
	}

	pub const fn from_code(code: u8) -> Option<Self> {
		match code {
			0 => Some(Self::Unavailable),
			1 => Some(Self::Available),
			2 => Some(Self::Skipped),
			3 => Some(Self::Played),
			4 => Some(Self::Error),
			_ => None,
		}
	}

	/// One-letter tag used in debug output
	pub(crate) const fn short_tag(self) -> char {
		match self {
			Self::Unavailable => 'U',
			Self::Available => 'A',
			Self::Skipped => 'S',
			Self::Played => 'P',
			Self::Error => 'E',
		}
	}
}

impl fmt::Display for AdState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::Unavailable => "unavailable",
			Self::Available => "available",
			Self::Skipped => "skipped",
			Self::Played => "played",
			Self::Error => "error",
		};
		f.write_str(name)
	}
}
