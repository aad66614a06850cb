use crate::playback_state::AdPlaybackState;
use crate::types::{AdGroupTime, PlaybackPosition, TimeUs};

// Group times are not sorted (a postroll can sit anywhere in the array), so both
// queries scan linearly and special-case the postroll instead of bisecting.
impl AdPlaybackState {
	/// Index of the ad group that must play before content at `position`.
	///
	/// Picks the last group at or before the position and returns it only if it
	/// still has unplayed ads. Removed groups never qualify.
	pub fn ad_group_index_at_or_before(&self, position: PlaybackPosition, period_duration_us: Option<TimeUs>) -> Option<usize> {
		let index = (self.removed_ad_group_count()..self.ad_group_count())
			.rev()
			.find(|&index| !self.is_position_before_ad_group(position, period_duration_us, index))?;

		self.ad_group(index).filter(|group| group.has_unplayed_ads()).map(|_| index)
	}

	/// Index of the first playable ad group strictly after `position`.
	pub fn ad_group_index_after(&self, position: PlaybackPosition, period_duration_us: Option<TimeUs>) -> Option<usize> {
		let position_us = match position {
			PlaybackPosition::EndOfSource => return None,
			PlaybackPosition::At(position_us) => position_us,
		};
		if period_duration_us.is_some_and(|duration_us| position_us >= duration_us) {
			return None;
		}

		(self.removed_ad_group_count()..self.ad_group_count()).find(|&index| {
			self.ad_group(index).is_some_and(|group| {
				let after = match group.time() {
					AdGroupTime::Postroll => true,
					AdGroupTime::At(time_us) => time_us > position_us,
				};
				after && group.should_play_ad_group()
			})
		})
	}

	fn is_position_before_ad_group(&self, position: PlaybackPosition, period_duration_us: Option<TimeUs>, index: usize) -> bool {
		let PlaybackPosition::At(position_us) = position else {
			// The end of the content is at every postroll and after every other group.
			return false;
		};
		match self.ad_group(index).map(|group| group.time()) {
			Some(AdGroupTime::Postroll) => period_duration_us.is_none_or(|duration_us| position_us < duration_us),
			Some(AdGroupTime::At(time_us)) => position_us < time_us,
			None => true,
		}
	}
}
