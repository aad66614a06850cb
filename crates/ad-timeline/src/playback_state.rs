use crate::ad_group::AdGroup;
use crate::error::{AdPlaybackError, Result};
use crate::record::AdPlaybackStateRecord;
use crate::types::{AdGroupTime, AdState, AdsId, TimeUs};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};
use url::Url;

/// Shared "no ads" state
static NONE: Lazy<AdPlaybackState> = Lazy::new(|| AdPlaybackState::from_parts(None, Vec::new(), 0, None, 0));

/// Stand-in for every group below the removed ad group count
static REMOVED_AD_GROUP: AdGroup = AdGroup::removed();

/// Immutable ad playback state for one piece of content.
///
/// Every `with_*` method returns a new value and leaves `self` untouched. Clones
/// are cheap and unchanged ad groups are shared between old and new values.
/// Methods that change nothing return a value for which [`AdPlaybackState::ptr_eq`]
/// holds, so callers can detect edits by identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "AdPlaybackStateRecord", try_from = "AdPlaybackStateRecord")]
pub struct AdPlaybackState {
	inner: Arc<Inner>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Inner {
	ads_id: Option<AdsId>,
	/// Live groups, logically indexed from `removed_ad_group_count`
	ad_groups: Vec<Arc<AdGroup>>,
	ad_resume_position_us: TimeUs,
	content_duration_us: Option<TimeUs>,
	removed_ad_group_count: usize,
}

impl AdPlaybackState {
	/// New state with one unresolved ad group per break time, in the given order
	pub fn new(ads_id: Option<AdsId>, ad_group_times: &[AdGroupTime]) -> Self {
		let ad_groups = ad_group_times.iter().map(|time| Arc::new(AdGroup::new(*time))).collect();
		Self::from_parts(ads_id, ad_groups, 0, None, 0)
	}

	/// The shared state describing content without ads
	pub fn none() -> Self {
		NONE.clone()
	}

	pub(crate) fn from_parts(
		ads_id: Option<AdsId>,
		ad_groups: Vec<Arc<AdGroup>>,
		ad_resume_position_us: TimeUs,
		content_duration_us: Option<TimeUs>,
		removed_ad_group_count: usize,
	) -> Self {
		Self {
			inner: Arc::new(Inner {
				ads_id,
				ad_groups,
				ad_resume_position_us,
				content_duration_us,
				removed_ad_group_count,
			}),
		}
	}

	/// True if both values are the same instance
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}

	/// Identifier of the content the ads belong to
	pub fn ads_id(&self) -> Option<&str> {
		self.inner.ads_id.as_deref()
	}

	/// Total number of ad groups ever known, including removed ones
	pub fn ad_group_count(&self) -> usize {
		self.inner.ad_groups.len() + self.inner.removed_ad_group_count
	}

	/// Number of leading groups compacted away
	pub fn removed_ad_group_count(&self) -> usize {
		self.inner.removed_ad_group_count
	}

	/// Position within the current ad to resume from
	pub fn ad_resume_position_us(&self) -> TimeUs {
		self.inner.ad_resume_position_us
	}

	/// Content duration, `None` while unknown
	pub fn content_duration_us(&self) -> Option<TimeUs> {
		self.inner.content_duration_us
	}

	/// Groups that have not been removed, in logical order
	pub fn ad_groups(&self) -> impl ExactSizeIterator<Item = &AdGroup> + '_ {
		self.inner.ad_groups.iter().map(Arc::as_ref)
	}

	/// Group at a logical index. Removed indices yield an empty, fully skipped placeholder.
	pub fn ad_group(&self, index: usize) -> Option<&AdGroup> {
		let removed = self.inner.removed_ad_group_count;
		if index < removed {
			return Some(&REMOVED_AD_GROUP);
		}
		self.inner.ad_groups.get(index - removed).map(Arc::as_ref)
	}

	/// True if the ad failed to load
	pub fn is_ad_in_error_state(&self, ad_group_index: usize, ad_index: usize) -> bool {
		self.ad_group(ad_group_index)
			.and_then(|group| group.ad_state(ad_index))
			.is_some_and(|state| state == AdState::Error)
	}

	/// Same state re-associated with other content
	#[must_use]
	pub fn with_ads_id(&self, ads_id: Option<AdsId>) -> Self {
		if self.inner.ads_id == ads_id {
			return self.clone();
		}
		self.edited(|inner| inner.ads_id = ads_id)
	}

	/// # Errors
	///
	/// Fails if the group is removed or out of range.
	pub fn with_ad_group_time_us(&self, ad_group_index: usize, time: AdGroupTime) -> Result<Self> {
		self.update_group(ad_group_index, |group| Ok(group.with_time(time)))
	}

	/// Insert an empty group at a logical index, shifting later groups back by one.
	///
	/// # Errors
	///
	/// Fails if the index lies below the removed ad group count or past the end.
	pub fn with_new_ad_group(&self, ad_group_index: usize, time: AdGroupTime) -> Result<Self> {
		let removed = self.inner.removed_ad_group_count;
		let ad_group_count = self.ad_group_count();
		if ad_group_index < removed {
			return Err(self.rejected(
				ad_group_index,
				AdPlaybackError::RemovedAdGroup {
					index: ad_group_index,
					removed_ad_group_count: removed,
				},
			));
		}
		if ad_group_index > ad_group_count {
			return Err(self.rejected(
				ad_group_index,
				AdPlaybackError::AdGroupIndexOutOfRange {
					index: ad_group_index,
					ad_group_count,
				},
			));
		}

		debug!(ad_group_index, %time, "inserting ad group");
		Ok(self.edited(|inner| inner.ad_groups.insert(ad_group_index - removed, Arc::new(AdGroup::new(time)))))
	}

	/// # Errors
	///
	/// Fails for a zero count, a count below the ads already known, or an unwritable group.
	pub fn with_ad_count(&self, ad_group_index: usize, ad_count: usize) -> Result<Self> {
		self.update_group(ad_group_index, |group| {
			if group.count() == Some(ad_count) {
				return Ok(group.clone());
			}
			debug!(ad_group_index, ad_count, "resolved ad count");
			group.with_ad_count(ad_count)
		})
	}

	/// # Errors
	///
	/// Fails if the ad index is past a resolved count or the ad already finished.
	pub fn with_available_ad_uri(&self, ad_group_index: usize, ad_index: usize, uri: Url) -> Result<Self> {
		self.update_group(ad_group_index, |group| {
			trace!(ad_group_index, ad_index, %uri, "ad available");
			group.with_ad_uri(uri, ad_index)
		})
	}

	/// # Errors
	///
	/// Fails if the ad was already skipped or failed.
	pub fn with_played_ad(&self, ad_group_index: usize, ad_index: usize) -> Result<Self> {
		self.with_ad_state(ad_group_index, ad_index, AdState::Played)
	}

	/// # Errors
	///
	/// Fails if the ad was already played or failed.
	pub fn with_skipped_ad(&self, ad_group_index: usize, ad_index: usize) -> Result<Self> {
		self.with_ad_state(ad_group_index, ad_index, AdState::Skipped)
	}

	/// # Errors
	///
	/// Fails if the ad was already played or skipped.
	pub fn with_ad_load_error(&self, ad_group_index: usize, ad_index: usize) -> Result<Self> {
		self.with_ad_state(ad_group_index, ad_index, AdState::Error)
	}

	fn with_ad_state(&self, ad_group_index: usize, ad_index: usize, state: AdState) -> Result<Self> {
		self.update_group(ad_group_index, |group| {
			trace!(ad_group_index, ad_index, %state, "ad state");
			group.with_ad_state(state, ad_index)
		})
	}

	/// Skip every unplayed ad in a group.
	///
	/// # Errors
	///
	/// Fails if the group is removed or out of range.
	pub fn with_skipped_ad_group(&self, ad_group_index: usize) -> Result<Self> {
		self.update_group(ad_group_index, |group| {
			debug!(ad_group_index, "skipping ad group");
			Ok(group.with_all_ads_skipped())
		})
	}

	/// # Errors
	///
	/// Fails if the group is removed or out of range.
	pub fn with_ad_durations_us(&self, ad_group_index: usize, durations_us: Vec<Option<TimeUs>>) -> Result<Self> {
		self.update_group(ad_group_index, |group| Ok(group.with_ad_durations_us(durations_us)))
	}

	/// Set durations for many groups at once. Entry `i` applies to logical group `i`;
	/// entries for removed groups are ignored and groups without an entry are kept.
	#[must_use]
	pub fn with_all_ad_durations_us(&self, durations_us: &[Vec<Option<TimeUs>>]) -> Self {
		let removed = self.inner.removed_ad_group_count;
		let ad_groups: Vec<Arc<AdGroup>> = self
			.inner
			.ad_groups
			.iter()
			.enumerate()
			.map(|(live_index, group)| match durations_us.get(live_index + removed) {
				Some(durations) => Self::shared_if_equal(group, group.with_ad_durations_us(durations.clone())),
				None => Arc::clone(group),
			})
			.collect();

		if ad_groups.iter().zip(&self.inner.ad_groups).all(|(new, old)| Arc::ptr_eq(new, old)) {
			return self.clone();
		}
		self.edited(|inner| inner.ad_groups = ad_groups)
	}

	/// # Errors
	///
	/// Fails if the group is removed or out of range.
	pub fn with_content_resume_offset_us(&self, ad_group_index: usize, content_resume_offset_us: TimeUs) -> Result<Self> {
		self.update_group(ad_group_index, |group| Ok(group.with_content_resume_offset_us(content_resume_offset_us)))
	}

	/// # Errors
	///
	/// Fails if the group is removed or out of range.
	pub fn with_is_server_side_inserted(&self, ad_group_index: usize, is_server_side_inserted: bool) -> Result<Self> {
		self.update_group(ad_group_index, |group| Ok(group.with_is_server_side_inserted(is_server_side_inserted)))
	}

	/// Drop the leading groups below `removed_ad_group_count` from the live array.
	///
	/// # Errors
	///
	/// Fails unless the new count is strictly greater than the current one and
	/// no greater than the total ad group count.
	pub fn with_removed_ad_group_count(&self, removed_ad_group_count: usize) -> Result<Self> {
		let current = self.inner.removed_ad_group_count;
		if removed_ad_group_count <= current {
			return Err(self.rejected(
				removed_ad_group_count,
				AdPlaybackError::InvalidRemovedAdGroupCount {
					requested: removed_ad_group_count,
					current,
				},
			));
		}
		let ad_group_count = self.ad_group_count();
		if removed_ad_group_count > ad_group_count {
			return Err(self.rejected(
				removed_ad_group_count,
				AdPlaybackError::AdGroupIndexOutOfRange {
					index: removed_ad_group_count,
					ad_group_count,
				},
			));
		}

		debug!(from = current, to = removed_ad_group_count, "removing leading ad groups");
		Ok(self.edited(|inner| {
			inner.ad_groups.drain(..removed_ad_group_count - current);
			inner.removed_ad_group_count = removed_ad_group_count;
		}))
	}

	#[must_use]
	pub fn with_ad_resume_position_us(&self, ad_resume_position_us: TimeUs) -> Self {
		if self.inner.ad_resume_position_us == ad_resume_position_us {
			return self.clone();
		}
		self.edited(|inner| inner.ad_resume_position_us = ad_resume_position_us)
	}

	#[must_use]
	pub fn with_content_duration_us(&self, content_duration_us: Option<TimeUs>) -> Self {
		if self.inner.content_duration_us == content_duration_us {
			return self.clone();
		}
		self.edited(|inner| inner.content_duration_us = content_duration_us)
	}

	/// Encode as JSON using the compact numeric field keys.
	///
	/// # Errors
	///
	/// Fails if serialization fails.
	pub fn to_json(&self) -> Result<String> {
		Ok(serde_json::to_string(self)?)
	}

	/// Decode a state written by [`AdPlaybackState::to_json`]. The result has no ads id.
	///
	/// # Errors
	///
	/// Fails on malformed JSON or records that break the ad group invariants.
	pub fn from_json(json: &str) -> Result<Self> {
		Ok(serde_json::from_str(json)?)
	}

	/// Apply `edit` to one live group. An edit that changes nothing returns `self`.
	fn update_group<F>(&self, ad_group_index: usize, edit: F) -> Result<Self>
	where
		F: FnOnce(&AdGroup) -> Result<AdGroup>,
	{
		let live_index = self.live_index(ad_group_index).map_err(|err| self.rejected(ad_group_index, err))?;
		let current = &self.inner.ad_groups[live_index];
		let updated = edit(&**current).map_err(|err| self.rejected(ad_group_index, err))?;
		if updated == **current {
			return Ok(self.clone());
		}
		Ok(self.edited(|inner| inner.ad_groups[live_index] = Arc::new(updated)))
	}

	fn live_index(&self, ad_group_index: usize) -> Result<usize> {
		let removed = self.inner.removed_ad_group_count;
		if ad_group_index < removed {
			return Err(AdPlaybackError::RemovedAdGroup {
				index: ad_group_index,
				removed_ad_group_count: removed,
			});
		}
		let ad_group_count = self.ad_group_count();
		if ad_group_index >= ad_group_count {
			return Err(AdPlaybackError::AdGroupIndexOutOfRange {
				index: ad_group_index,
				ad_group_count,
			});
		}
		Ok(ad_group_index - removed)
	}

	fn shared_if_equal(current: &Arc<AdGroup>, updated: AdGroup) -> Arc<AdGroup> {
		if updated == **current {
			Arc::clone(current)
		} else {
			Arc::new(updated)
		}
	}

	/// Copy the top level, sharing every ad group, then apply `edit`.
	fn edited<F>(&self, edit: F) -> Self
	where
		F: FnOnce(&mut Inner),
	{
		let mut inner = (*self.inner).clone();
		edit(&mut inner);
		Self { inner: Arc::new(inner) }
	}

	fn rejected(&self, ad_group_index: usize, err: AdPlaybackError) -> AdPlaybackError {
		debug!(
			ads_id = self.ads_id().unwrap_or("none"),
			ad_group_index,
			error = %err,
			"rejected ad playback state edit"
		);
		err
	}
}

impl Default for AdPlaybackState {
	fn default() -> Self {
		Self::none()
	}
}

impl PartialEq for AdPlaybackState {
	fn eq(&self, other: &Self) -> bool {
		self.ptr_eq(other) || self.inner == other.inner
	}
}

impl Eq for AdPlaybackState {}

impl fmt::Display for AdPlaybackState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"AdPlaybackState(adsId={}, adResumePositionUs={}, adGroups=[",
			self.ads_id().unwrap_or("null"),
			self.inner.ad_resume_position_us
		)?;
		for (index, group) in self.ad_groups().enumerate() {
			if index > 0 {
				f.write_str(", ")?;
			}
			write!(f, "{group}")?;
		}
		f.write_str("])")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn uri(name: &str) -> Url {
		Url::parse(&format!("https://ads.example.com/{name}.mp4")).unwrap()
	}

	fn three_groups() -> AdPlaybackState {
		AdPlaybackState::new(
			Some("content".to_string()),
			&[AdGroupTime::At(0), AdGroupTime::At(10_000_000), AdGroupTime::Postroll],
		)
	}

	#[test]
	fn none_is_a_shared_constant() {
		let a = AdPlaybackState::none();
		let b = AdPlaybackState::default();
		assert!(a.ptr_eq(&b));
		assert_eq!(a.ad_group_count(), 0);
		assert_eq!(a.ads_id(), None);
		assert_eq!(a.content_duration_us(), None);
	}

	#[test]
	fn new_state_keeps_caller_order() {
		let state = AdPlaybackState::new(None, &[AdGroupTime::Postroll, AdGroupTime::At(5)]);
		let times: Vec<_> = state.ad_groups().map(AdGroup::time).collect();
		assert_eq!(times, vec![AdGroupTime::Postroll, AdGroupTime::At(5)]);
	}

	#[test]
	fn edits_leave_the_original_untouched() {
		let original = three_groups();
		let edited = original.with_ad_count(1, 2).unwrap();

		assert_eq!(original.ad_group(1).unwrap().count(), None);
		assert_eq!(edited.ad_group(1).unwrap().count(), Some(2));
		assert!(!original.ptr_eq(&edited));
	}

	#[test]
	fn unchanged_groups_are_shared() {
		let original = three_groups();
		let edited = original.with_ad_count(1, 2).unwrap();
		assert!(Arc::ptr_eq(&original.inner.ad_groups[0], &edited.inner.ad_groups[0]));
		assert!(Arc::ptr_eq(&original.inner.ad_groups[2], &edited.inner.ad_groups[2]));
	}

	#[test]
	fn no_op_edits_return_the_same_instance() {
		let state = three_groups().with_ad_count(0, 2).unwrap();

		assert!(state.with_ad_count(0, 2).unwrap().ptr_eq(&state));
		assert!(state.with_content_resume_offset_us(0, 0).unwrap().ptr_eq(&state));
		assert!(state.with_is_server_side_inserted(0, false).unwrap().ptr_eq(&state));
		assert!(state.with_ad_resume_position_us(0).ptr_eq(&state));
		assert!(state.with_content_duration_us(None).ptr_eq(&state));
		assert!(state.with_ads_id(Some("content".to_string())).ptr_eq(&state));
		assert!(state.with_ad_group_time_us(1, AdGroupTime::At(10_000_000)).unwrap().ptr_eq(&state));
	}

	#[test]
	fn repeated_terminal_state_is_idempotent() {
		let once = three_groups().with_ad_count(0, 1).unwrap().with_played_ad(0, 0).unwrap();
		let twice = once.with_played_ad(0, 0).unwrap();
		assert!(twice.ptr_eq(&once));
		assert!(matches!(once.with_skipped_ad(0, 0), Err(AdPlaybackError::InvalidStateTransition { .. })));
	}

	#[test]
	fn ad_load_error_is_reported() {
		let state = three_groups().with_ad_count(2, 2).unwrap().with_ad_load_error(2, 1).unwrap();
		assert!(state.is_ad_in_error_state(2, 1));
		assert!(!state.is_ad_in_error_state(2, 0));
		assert!(!state.is_ad_in_error_state(7, 0));
	}

	#[test]
	fn new_ad_group_shifts_later_groups() {
		let state = three_groups().with_new_ad_group(1, AdGroupTime::At(5_000_000)).unwrap();
		let times: Vec<_> = state.ad_groups().map(AdGroup::time).collect();
		assert_eq!(
			times,
			vec![AdGroupTime::At(0), AdGroupTime::At(5_000_000), AdGroupTime::At(10_000_000), AdGroupTime::Postroll]
		);

		let appended = three_groups().with_new_ad_group(3, AdGroupTime::At(20_000_000)).unwrap();
		assert_eq!(appended.ad_group_count(), 4);
		assert!(three_groups().with_new_ad_group(4, AdGroupTime::At(0)).is_err());
	}

	#[test]
	fn new_ad_group_after_compaction_uses_logical_index() {
		let state = three_groups().with_removed_ad_group_count(1).unwrap();
		assert!(matches!(state.with_new_ad_group(0, AdGroupTime::At(1)), Err(AdPlaybackError::RemovedAdGroup { .. })));

		let state = state.with_new_ad_group(1, AdGroupTime::At(1)).unwrap();
		assert_eq!(state.ad_group(1).unwrap().time(), AdGroupTime::At(1));
		assert_eq!(state.ad_group(2).unwrap().time(), AdGroupTime::At(10_000_000));
		assert_eq!(state.ad_group_count(), 4);
	}

	#[test]
	fn compaction_drops_leading_groups() {
		let state = three_groups().with_removed_ad_group_count(2).unwrap();
		assert_eq!(state.ad_group_count(), 3);
		assert_eq!(state.ad_groups().len(), 1);
		assert_eq!(state.ad_group(0), Some(&AdGroup::removed()));
		assert_eq!(state.ad_group(1), Some(&AdGroup::removed()));
		assert_eq!(state.ad_group(2).unwrap().time(), AdGroupTime::Postroll);
		assert_eq!(state.ad_group(3), None);
	}

	#[test]
	fn compaction_must_move_forward() {
		let state = three_groups().with_removed_ad_group_count(1).unwrap();
		assert!(matches!(
			state.with_removed_ad_group_count(1),
			Err(AdPlaybackError::InvalidRemovedAdGroupCount { requested: 1, current: 1 })
		));
		assert!(state.with_removed_ad_group_count(0).is_err());
		assert!(matches!(state.with_removed_ad_group_count(4), Err(AdPlaybackError::AdGroupIndexOutOfRange { .. })));
		assert_eq!(state.with_removed_ad_group_count(3).unwrap().ad_groups().len(), 0);
	}

	#[test]
	fn removed_groups_reject_edits() {
		let state = three_groups().with_removed_ad_group_count(2).unwrap();
		for result in [
			state.with_ad_count(0, 1),
			state.with_played_ad(1, 0),
			state.with_skipped_ad_group(0),
			state.with_available_ad_uri(1, 0, uri("x")),
			state.with_ad_group_time_us(0, AdGroupTime::At(1)),
		] {
			assert!(matches!(result, Err(AdPlaybackError::RemovedAdGroup { .. })));
		}
	}

	#[test]
	fn out_of_range_group_is_rejected() {
		let err = three_groups().with_ad_count(3, 1).unwrap_err();
		assert!(err.is_index_error());
		assert!(matches!(err, AdPlaybackError::AdGroupIndexOutOfRange { index: 3, ad_group_count: 3 }));
	}

	#[test]
	fn largest_ad_index_is_an_index_error() {
		let state = three_groups();
		let err = state.with_played_ad(0, usize::MAX).unwrap_err();
		assert!(err.is_index_error());
		assert!(state.with_available_ad_uri(0, usize::MAX, Url::parse("https://ads.example.com/x.mp4").unwrap()).is_err());
	}

	#[test]
	fn all_ad_durations_skip_removed_groups() {
		let state = three_groups()
			.with_ad_count(1, 1)
			.unwrap()
			.with_ad_count(2, 2)
			.unwrap()
			.with_removed_ad_group_count(1)
			.unwrap();
		let updated = state.with_all_ad_durations_us(&[vec![Some(1)], vec![Some(2)], vec![Some(3), Some(4)]]);
		assert_eq!(updated.ad_group(1).unwrap().durations_us(), &[Some(2)]);
		assert_eq!(updated.ad_group(2).unwrap().durations_us(), &[Some(3), Some(4)]);

		assert!(updated.with_all_ad_durations_us(&[vec![], vec![Some(2)]]).ptr_eq(&updated));
	}

	#[test]
	fn display_matches_debug_format() {
		let state = AdPlaybackState::new(Some("id".to_string()), &[AdGroupTime::Postroll])
			.with_ad_count(0, 1)
			.unwrap()
			.with_ad_resume_position_us(7);
		assert_eq!(
			state.to_string(),
			"AdPlaybackState(adsId=id, adResumePositionUs=7, adGroups=[adGroup(timeUs=postroll, ads=[ad(state=U, durationUs=unset)])])"
		);
	}
}
