//! Wire form of [`AdPlaybackState`].
//!
//! Fields are keyed by small numbers rather than names. New fields must take
//! new keys and carry a serde default so older records keep decoding.

use crate::ad_group::AdGroup;
use crate::error::AdPlaybackError;
use crate::playback_state::AdPlaybackState;
use crate::types::{AdGroupTime, AdState, TimeUs};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct AdGroupRecord {
	#[serde(rename = "0")]
	time: AdGroupTime,
	#[serde(rename = "1")]
	count: Option<usize>,
	#[serde(rename = "2", default)]
	uris: Vec<Option<Url>>,
	#[serde(rename = "3", default)]
	states: Vec<u8>,
	#[serde(rename = "4", default)]
	durations_us: Vec<Option<TimeUs>>,
	#[serde(rename = "5", default)]
	content_resume_offset_us: TimeUs,
	#[serde(rename = "6", default)]
	is_server_side_inserted: bool,
}

/// The ads id is deliberately absent; it is re-associated out of band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct AdPlaybackStateRecord {
	#[serde(rename = "1", default)]
	ad_groups: Vec<AdGroupRecord>,
	#[serde(rename = "2", default)]
	ad_resume_position_us: TimeUs,
	#[serde(rename = "3", default)]
	content_duration_us: Option<TimeUs>,
	#[serde(rename = "4", default)]
	removed_ad_group_count: usize,
}

impl From<&AdGroup> for AdGroupRecord {
	fn from(group: &AdGroup) -> Self {
		Self {
			time: group.time(),
			count: group.count(),
			uris: group.uris().to_vec(),
			states: group.states().iter().map(|state| state.code()).collect(),
			durations_us: group.durations_us().to_vec(),
			content_resume_offset_us: group.content_resume_offset_us(),
			is_server_side_inserted: group.is_server_side_inserted(),
		}
	}
}

impl TryFrom<AdGroupRecord> for AdGroup {
	type Error = AdPlaybackError;

	fn try_from(record: AdGroupRecord) -> Result<Self, Self::Error> {
		let states = record
			.states
			.iter()
			.map(|&code| AdState::from_code(code).ok_or_else(|| AdPlaybackError::InvalidRecord(format!("unknown ad state code {code}"))))
			.collect::<Result<Vec<_>, _>>()?;

		Self::from_parts(
			record.time,
			record.count,
			states,
			record.uris,
			record.durations_us,
			record.content_resume_offset_us,
			record.is_server_side_inserted,
		)
	}
}

impl From<AdPlaybackState> for AdPlaybackStateRecord {
	fn from(state: AdPlaybackState) -> Self {
		Self {
			ad_groups: state.ad_groups().map(AdGroupRecord::from).collect(),
			ad_resume_position_us: state.ad_resume_position_us(),
			content_duration_us: state.content_duration_us(),
			removed_ad_group_count: state.removed_ad_group_count(),
		}
	}
}

impl TryFrom<AdPlaybackStateRecord> for AdPlaybackState {
	type Error = AdPlaybackError;

	fn try_from(record: AdPlaybackStateRecord) -> Result<Self, Self::Error> {
		let ad_groups = record
			.ad_groups
			.into_iter()
			.map(|group| AdGroup::try_from(group).map(Arc::new))
			.collect::<Result<Vec<_>, _>>()?;
		if ad_groups.len().checked_add(record.removed_ad_group_count).is_none() {
			return Err(AdPlaybackError::InvalidRecord(format!(
				"removed ad group count {} overflows the ad group count",
				record.removed_ad_group_count
			)));
		}

		Ok(Self::from_parts(
			None,
			ad_groups,
			record.ad_resume_position_us,
			record.content_duration_us,
			record.removed_ad_group_count,
		))
	}
}
