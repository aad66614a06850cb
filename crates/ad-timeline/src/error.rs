use crate::types::AdState;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AdPlaybackError>;

#[derive(Error, Debug)]
pub enum AdPlaybackError {
	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("Invalid ad count {requested}: {reason}")]
	InvalidAdCount { requested: usize, reason: &'static str },

	#[error("Invalid removed ad group count {requested}: must exceed current count {current}")]
	InvalidRemovedAdGroupCount { requested: usize, current: usize },

	#[error("Invalid state transition for ad {ad_index}: {from} -> {to}")]
	InvalidStateTransition { ad_index: usize, from: AdState, to: AdState },

	#[error("Ad group index {index} out of range (ad group count {ad_group_count})")]
	AdGroupIndexOutOfRange { index: usize, ad_group_count: usize },

	#[error("Ad index {index} out of range (ad count {ad_count})")]
	AdIndexOutOfRange { index: usize, ad_count: usize },

	#[error("Ad group {index} was removed (removed ad group count {removed_ad_group_count})")]
	RemovedAdGroup { index: usize, removed_ad_group_count: usize },

	#[error("Invalid config: {0}")]
	InvalidConfig(String),

	#[error("Invalid record: {0}")]
	InvalidRecord(String),
}

impl AdPlaybackError {
	/// True for errors caused by addressing a group or ad that cannot be written to.
	pub fn is_index_error(&self) -> bool {
		matches!(
			self,
			Self::AdGroupIndexOutOfRange { .. } | Self::AdIndexOutOfRange { .. } | Self::RemovedAdGroup { .. }
		)
	}
}
