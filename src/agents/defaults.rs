//! Wiring of the built-in providers from configuration.

use reqwest::Client;
use std::sync::Arc;
use tracing::info;

use super::coverart::{self, CoverArtArchiveAgent};
use super::lastfm::{self, LastFmAgent};
use super::musicbrainz::{self, MusicBrainzAgent};
use super::wikipedia::{self, WikipediaAgent};
use super::{AgentRegistration, AgentRegistry};
use crate::config::AgentsSettings;

/// Register Last.fm, Wikipedia, MusicBrainz and the Cover Art Archive.
/// Last.fm is only registered when an API key is configured.
pub fn register_builtin_agents(registry: &AgentRegistry, settings: &AgentsSettings, client: &Client) {
    match settings.lastfm.api_key.as_deref() {
        Some(api_key) => {
            let agent = Arc::new(LastFmAgent::new(client.clone(), api_key));
            registry.register(
                AgentRegistration::new(lastfm::AGENT_NAME, settings.lastfm.agent_settings())
                    .with_artist_bio(agent.clone())
                    .with_artist_images(agent.clone())
                    .with_album_cover(agent),
            );
        }
        None => info!("No Last.fm API key configured, skipping {}", lastfm::AGENT_NAME),
    }

    let wikipedia = Arc::new(WikipediaAgent::new(client.clone()));
    registry.register(
        AgentRegistration::new(wikipedia::AGENT_NAME, settings.wikipedia.agent_settings())
            .with_artist_bio(wikipedia.clone())
            .with_artist_images(wikipedia),
    );

    registry.register(
        AgentRegistration::new(musicbrainz::AGENT_NAME, settings.musicbrainz.agent_settings())
            .with_canonical_id(Arc::new(MusicBrainzAgent::new(client.clone()))),
    );

    registry.register(
        AgentRegistration::new(coverart::AGENT_NAME, settings.coverartarchive.agent_settings())
            .with_album_cover(Arc::new(CoverArtArchiveAgent::new(client.clone()))),
    );
}
