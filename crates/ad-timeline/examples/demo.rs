// examples/demo.rs
use ad_timeline::*;
use uuid::Uuid;

const SECOND_US: TimeUs = 1_000_000;

fn main() -> Result<()> {
	tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

	let content_duration_us = 120 * SECOND_US;

	// Break discovery hands us a preroll, a midroll and a postroll; only the preroll count is known.
	let schedule = AdScheduleConfig::new(vec![
		AdBreakConfig::new(AdGroupTime::At(0)).with_ad_count(1),
		AdBreakConfig::new(AdGroupTime::At(60 * SECOND_US)),
		AdBreakConfig::postroll(),
	])
	.with_ads_id(Uuid::new_v4().to_string())
	.with_content_duration_us(content_duration_us);

	let mut state = schedule.build()?;
	println!("--- Initial ---");
	println!("{state}");

	// Preroll: one ad, loaded and played.
	let preroll = state.ad_group_index_at_or_before(PlaybackPosition::At(0), Some(content_duration_us));
	if let Some(group_index) = preroll {
		state = state
			.with_available_ad_uri(group_index, 0, creative("preroll"))?
			.with_ad_durations_us(group_index, vec![Some(15 * SECOND_US)])?
			.with_played_ad(group_index, 0)?;
	}
	println!("\n--- After preroll ---");
	println!("{state}");

	// Content plays up to the midroll; its ad count arrives late.
	let next = state.ad_group_index_after(PlaybackPosition::At(10 * SECOND_US), Some(content_duration_us));
	println!("\nNext ad group after 10s: {next:?}");
	if let Some(group_index) = next {
		state = state.with_ad_count(group_index, 2)?.with_available_ad_uri(group_index, 0, creative("midroll-a"))?;

		// The first midroll ad plays, the second one fails to load.
		state = state.with_played_ad(group_index, 0)?.with_ad_load_error(group_index, 1)?;
		println!("Ad 1 of group {group_index} in error: {}", state.is_ad_in_error_state(group_index, 1));
	}

	// The preroll and midroll can no longer be reached; drop them.
	state = state.with_removed_ad_group_count(2)?;
	println!("\n--- After compaction ---");
	println!("{state}");

	// The viewer reaches the end of the content and skips the postroll.
	let postroll = state.ad_group_index_at_or_before(PlaybackPosition::EndOfSource, Some(content_duration_us));
	if let Some(group_index) = postroll {
		state = state.with_skipped_ad_group(group_index)?;
	}
	println!("\n--- At end of content ---");
	println!("{state}");

	let saved = state.to_json()?;
	println!("\nSaved state: {saved}");
	let restored = AdPlaybackState::from_json(&saved)?.with_ads_id(state.ads_id().map(String::from));
	println!("Restored matches: {}", restored == state);

	Ok(())
}

fn creative(name: &str) -> Url {
	Url::parse(&format!("https://ads.example.com/{name}.mp4")).expect("static creative url")
}
