use crate::error::{AdPlaybackError, Result};
use crate::types::{AdGroupTime, AdState, TimeUs};
use std::fmt;
use url::Url;

/// State of a single ad break.
///
/// `states` and `uris` always have the same length. While the ad count is
/// unresolved they cover every ad seen so far; once it is resolved they hold
/// exactly `count` entries. `durations_us` is never shorter than `states`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdGroup {
	time: AdGroupTime,
	count: Option<usize>,
	states: Vec<AdState>,
	uris: Vec<Option<Url>>,
	durations_us: Vec<Option<TimeUs>>,
	content_resume_offset_us: TimeUs,
	is_server_side_inserted: bool,
}

impl AdGroup {
	/// An ad group with an unresolved ad count
	pub const fn new(time: AdGroupTime) -> Self {
		Self {
			time,
			count: None,
			states: Vec::new(),
			uris: Vec::new(),
			durations_us: Vec::new(),
			content_resume_offset_us: 0,
			is_server_side_inserted: false,
		}
	}

	/// Placeholder returned for groups compacted away from the front of a state
	pub(crate) const fn removed() -> Self {
		Self {
			time: AdGroupTime::At(0),
			count: Some(0),
			states: Vec::new(),
			uris: Vec::new(),
			durations_us: Vec::new(),
			content_resume_offset_us: 0,
			is_server_side_inserted: false,
		}
	}

	/// Rebuild a group from decoded parts, checking the length invariants
	pub(crate) fn from_parts(
		time: AdGroupTime,
		count: Option<usize>,
		states: Vec<AdState>,
		uris: Vec<Option<Url>>,
		durations_us: Vec<Option<TimeUs>>,
		content_resume_offset_us: TimeUs,
		is_server_side_inserted: bool,
	) -> Result<Self> {
		if states.len() != uris.len() {
			return Err(AdPlaybackError::InvalidRecord(format!("{} ad states but {} ad uris", states.len(), uris.len())));
		}
		if durations_us.len() < states.len() {
			return Err(AdPlaybackError::InvalidRecord(format!(
				"{} ad durations for {} ads",
				durations_us.len(),
				states.len()
			)));
		}
		if let Some(count) = count {
			if states.len() != count || durations_us.len() != count {
				return Err(AdPlaybackError::InvalidRecord(format!("ad count {count} does not match {} known ads", states.len())));
			}
		}
		Ok(Self {
			time,
			count,
			states,
			uris,
			durations_us,
			content_resume_offset_us,
			is_server_side_inserted,
		})
	}

	/// Position of the break in the content
	pub const fn time(&self) -> AdGroupTime {
		self.time
	}

	/// Number of ads, `None` while unresolved
	pub const fn count(&self) -> Option<usize> {
		self.count
	}

	/// Per-ad states, one entry per known ad
	pub fn states(&self) -> &[AdState] {
		&self.states
	}

	/// Per-ad media URIs, parallel to [`AdGroup::states`]
	pub fn uris(&self) -> &[Option<Url>] {
		&self.uris
	}

	/// Per-ad durations, `None` where unknown
	pub fn durations_us(&self) -> &[Option<TimeUs>] {
		&self.durations_us
	}

	/// How far content advances once the group has played
	pub const fn content_resume_offset_us(&self) -> TimeUs {
		self.content_resume_offset_us
	}

	/// Whether the ads are stitched into the content stream
	pub const fn is_server_side_inserted(&self) -> bool {
		self.is_server_side_inserted
	}

	/// State of one ad. Ads beyond the known range of an unresolved group are unavailable.
	pub fn ad_state(&self, ad_index: usize) -> Option<AdState> {
		match self.states.get(ad_index) {
			Some(state) => Some(*state),
			None if self.count.is_none() => Some(AdState::Unavailable),
			None => None,
		}
	}

	/// URI of one ad, if assigned
	pub fn ad_uri(&self, ad_index: usize) -> Option<&Url> {
		self.uris.get(ad_index).and_then(Option::as_ref)
	}

	/// Duration of one ad, if known
	pub fn ad_duration_us(&self, ad_index: usize) -> Option<TimeUs> {
		self.durations_us.get(ad_index).copied().flatten()
	}

	/// Index of the first ad to play, or the number of known ads if none is left.
	pub fn first_ad_index_to_play(&self) -> usize {
		self.ad_index_to_play_from(0)
	}

	/// Index of the next ad to play after `last_played`, or the number of known ads if none is left.
	pub fn next_ad_index_to_play(&self, last_played: usize) -> usize {
		self.ad_index_to_play_from(last_played.saturating_add(1))
	}

	fn ad_index_to_play_from(&self, start: usize) -> usize {
		// Server-side inserted ads are part of the stream, so their state never gates playback.
		(start..self.states.len())
			.find(|&index| self.is_server_side_inserted || self.states[index].is_pending())
			.unwrap_or_else(|| self.states.len().max(start))
	}

	/// Whether playback should enter this group at all
	pub fn should_play_ad_group(&self) -> bool {
		match self.count {
			None => true,
			Some(count) => self.first_ad_index_to_play() < count,
		}
	}

	/// Whether any ad still needs to be played, skipped or failed
	pub fn has_unplayed_ads(&self) -> bool {
		match self.count {
			None => true,
			Some(count) => self.states.iter().take(count).any(|state| state.is_pending()),
		}
	}

	#[must_use]
	pub fn with_time(&self, time: AdGroupTime) -> Self {
		Self { time, ..self.clone() }
	}

	/// Resolve the ad count, growing the per-ad arrays.
	///
	/// # Errors
	///
	/// Fails for a zero count and for a count below the number of ads already known.
	pub fn with_ad_count(&self, count: usize) -> Result<Self> {
		if count == 0 {
			return Err(AdPlaybackError::InvalidAdCount {
				requested: count,
				reason: "ad count must be positive",
			});
		}
		if count < self.states.len() {
			return Err(AdPlaybackError::InvalidAdCount {
				requested: count,
				reason: "ad count cannot drop below the number of known ads",
			});
		}

		let mut group = self.grown_to(count);
		group.durations_us.truncate(count);
		group.count = Some(count);
		Ok(group)
	}

	/// Set the URI of one ad and mark it available.
	///
	/// A URI may be replaced as long as the ad has not reached a terminal state.
	///
	/// # Errors
	///
	/// Fails if the index is beyond a resolved count or the ad is already played, skipped or failed.
	pub fn with_ad_uri(&self, uri: Url, ad_index: usize) -> Result<Self> {
		let len = self.check_ad_index(ad_index)?;
		let current = self.ad_state(ad_index).unwrap_or_default();
		if current.is_terminal() {
			return Err(AdPlaybackError::InvalidStateTransition {
				ad_index,
				from: current,
				to: AdState::Available,
			});
		}

		let mut group = self.grown_to(len);
		group.uris[ad_index] = Some(uri);
		group.states[ad_index] = AdState::Available;
		Ok(group)
	}

	/// Move one ad to a terminal state.
	///
	/// # Errors
	///
	/// Fails if `state` is not terminal, the index is beyond a resolved count, or
	/// the ad already reached a different terminal state.
	pub fn with_ad_state(&self, state: AdState, ad_index: usize) -> Result<Self> {
		let current = self.ad_state(ad_index).unwrap_or_default();
		if !state.is_terminal() {
			return Err(AdPlaybackError::InvalidStateTransition { ad_index, from: current, to: state });
		}
		let len = self.check_ad_index(ad_index)?;
		if current.is_terminal() && current != state {
			return Err(AdPlaybackError::InvalidStateTransition { ad_index, from: current, to: state });
		}

		let mut group = self.grown_to(len);
		group.states[ad_index] = state;
		Ok(group)
	}

	/// Replace per-ad durations, padding with unknown durations or trimming
	/// entries past a resolved count.
	#[must_use]
	pub fn with_ad_durations_us(&self, mut durations_us: Vec<Option<TimeUs>>) -> Self {
		let known = self.states.len();
		if durations_us.len() < known || self.count.is_some() {
			durations_us.resize(known, None);
		}
		Self { durations_us, ..self.clone() }
	}

	#[must_use]
	pub fn with_content_resume_offset_us(&self, content_resume_offset_us: TimeUs) -> Self {
		Self {
			content_resume_offset_us,
			..self.clone()
		}
	}

	#[must_use]
	pub fn with_is_server_side_inserted(&self, is_server_side_inserted: bool) -> Self {
		Self {
			is_server_side_inserted,
			..self.clone()
		}
	}

	/// Skip every ad that has not been played yet. A group whose count was
	/// never resolved becomes a permanently empty group.
	#[must_use]
	pub fn with_all_ads_skipped(&self) -> Self {
		if self.count.is_none() {
			return Self {
				count: Some(0),
				states: Vec::new(),
				uris: Vec::new(),
				durations_us: Vec::new(),
				..self.clone()
			};
		}

		let states = self
			.states
			.iter()
			.map(|state| if state.is_pending() { AdState::Skipped } else { *state })
			.collect();
		Self { states, ..self.clone() }
	}

	/// Number of ads the per-ad arrays must cover to address `ad_index`
	fn check_ad_index(&self, ad_index: usize) -> Result<usize> {
		let out_of_range = |ad_count| AdPlaybackError::AdIndexOutOfRange { index: ad_index, ad_count };
		match self.count {
			Some(count) if ad_index >= count => Err(out_of_range(count)),
			_ => ad_index.checked_add(1).ok_or_else(|| out_of_range(self.states.len())),
		}
	}

	/// Copy with per-ad arrays covering at least `len` ads. Known entries are kept.
	fn grown_to(&self, len: usize) -> Self {
		let mut group = self.clone();
		if group.states.len() < len {
			group.states.resize(len, AdState::Unavailable);
			group.uris.resize(len, None);
		}
		if group.durations_us.len() < len {
			group.durations_us.resize(len, None);
		}
		group
	}
}

impl fmt::Display for AdGroup {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "adGroup(timeUs={}, ads=[", self.time)?;
		for (index, state) in self.states.iter().enumerate() {
			if index > 0 {
				f.write_str(", ")?;
			}
			write!(f, "ad(state={}, durationUs=", state.short_tag())?;
			match self.ad_duration_us(index) {
				Some(duration_us) => write!(f, "{duration_us})")?,
				None => f.write_str("unset)")?,
			}
		}
		f.write_str("])")
	}
}
