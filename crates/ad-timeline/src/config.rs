use crate::error::{AdPlaybackError, Result};
use crate::playback_state::AdPlaybackState;
use crate::types::{AdGroupTime, AdsId, TimeUs};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One ad break as supplied by the ad break discovery layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdBreakConfig {
	pub time: AdGroupTime,
	/// Known ad count, if discovery already resolved it
	#[serde(default)]
	pub ad_count: Option<usize>,
	#[serde(default)]
	pub content_resume_offset_us: TimeUs,
	#[serde(default)]
	pub server_side_inserted: bool,
}

impl AdBreakConfig {
	pub const fn new(time: AdGroupTime) -> Self {
		Self {
			time,
			ad_count: None,
			content_resume_offset_us: 0,
			server_side_inserted: false,
		}
	}

	pub const fn postroll() -> Self {
		Self::new(AdGroupTime::Postroll)
	}

	#[must_use]
	pub const fn with_ad_count(mut self, ad_count: usize) -> Self {
		self.ad_count = Some(ad_count);
		self
	}

	#[must_use]
	pub const fn with_content_resume_offset_us(mut self, content_resume_offset_us: TimeUs) -> Self {
		self.content_resume_offset_us = content_resume_offset_us;
		self
	}

	#[must_use]
	pub const fn server_side_inserted(mut self) -> Self {
		self.server_side_inserted = true;
		self
	}
}

/// Ad schedule for one piece of content, the input for building an [`AdPlaybackState`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdScheduleConfig {
	#[serde(default)]
	pub ads_id: Option<AdsId>,
	pub breaks: Vec<AdBreakConfig>,
	#[serde(default)]
	pub content_duration_us: Option<TimeUs>,
}

impl AdScheduleConfig {
	pub const fn new(breaks: Vec<AdBreakConfig>) -> Self {
		Self {
			ads_id: None,
			breaks,
			content_duration_us: None,
		}
	}

	/// Schedule with a bare break at each time
	pub fn from_times(times: &[AdGroupTime]) -> Self {
		Self::new(times.iter().copied().map(AdBreakConfig::new).collect())
	}

	#[must_use]
	pub fn with_ads_id(mut self, ads_id: impl Into<AdsId>) -> Self {
		self.ads_id = Some(ads_id.into());
		self
	}

	#[must_use]
	pub fn with_content_duration_us(mut self, content_duration_us: TimeUs) -> Self {
		self.content_duration_us = Some(content_duration_us);
		self
	}

	/// # Errors
	///
	/// Fails on malformed JSON or an invalid schedule.
	pub fn from_json(json: &str) -> Result<Self> {
		let config: Self = serde_json::from_str(json)?;
		config.validate()?;
		Ok(config)
	}

	/// # Errors
	///
	/// Fails on zero ad counts, a negative content duration or more than one postroll.
	pub fn validate(&self) -> Result<()> {
		if let Some(duration_us) = self.content_duration_us {
			if duration_us < 0 {
				return Err(AdPlaybackError::InvalidConfig(format!("negative content duration {duration_us}")));
			}
		}
		for (index, ad_break) in self.breaks.iter().enumerate() {
			if ad_break.ad_count == Some(0) {
				return Err(AdPlaybackError::InvalidConfig(format!("ad break {index} has an ad count of zero")));
			}
		}
		let postrolls = self.breaks.iter().filter(|ad_break| ad_break.time.is_postroll()).count();
		if postrolls > 1 {
			return Err(AdPlaybackError::InvalidConfig(format!("{postrolls} postroll ad breaks configured")));
		}
		Ok(())
	}

	/// Build the initial playback state, one ad group per break in schedule order.
	///
	/// # Errors
	///
	/// Fails if the schedule does not validate.
	pub fn build(&self) -> Result<AdPlaybackState> {
		self.validate()?;

		let times: Vec<AdGroupTime> = self.breaks.iter().map(|ad_break| ad_break.time).collect();
		let mut state = AdPlaybackState::new(self.ads_id.clone(), &times).with_content_duration_us(self.content_duration_us);

		for (index, ad_break) in self.breaks.iter().enumerate() {
			if let Some(ad_count) = ad_break.ad_count {
				state = state.with_ad_count(index, ad_count)?;
			}
			state = state
				.with_content_resume_offset_us(index, ad_break.content_resume_offset_us)?
				.with_is_server_side_inserted(index, ad_break.server_side_inserted)?;
		}

		debug!(ads_id = ?self.ads_id, ad_group_count = state.ad_group_count(), "built ad playback state");
		Ok(state)
	}
}
