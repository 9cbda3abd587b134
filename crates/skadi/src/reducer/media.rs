use serde::Serialize;
use skadi_payload::{MediaEvent, MediaEventKind, TrackInfo};

use super::Reducer;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MediaState {
    pub track: Option<TrackInfo>,
    pub cover_url: Option<String>,
    pub playing: bool,
}

/// A single observable change of the [`MediaState`].
///
/// `Cover` is only reported when the artwork url actually differs, so consumers can reload the image on every `Cover`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MediaChange {
    Track(Option<TrackInfo>),
    Cover(Option<String>),
    Playing(bool),
}

#[derive(Debug, Clone, Default)]
pub struct MediaReducer {
    state: MediaState,
}

impl MediaReducer {
    fn set_track(&mut self, track: &Option<TrackInfo>, changes: &mut Vec<MediaChange>) {
        if self.state.track != *track {
            self.state.track = track.clone();
            changes.push(MediaChange::Track(track.clone()));
        }
    }

    fn set_playing(&mut self, playing: bool, changes: &mut Vec<MediaChange>) {
        if self.state.playing != playing {
            self.state.playing = playing;
            changes.push(MediaChange::Playing(playing));
        }
    }
}

impl Reducer for MediaReducer {
    type Delta = Vec<MediaChange>;
    type Frame = MediaEvent;
    type Snapshot = MediaState;

    fn apply_frame(&mut self, event: &MediaEvent) -> Option<Vec<MediaChange>> {
        let mut changes = Vec::new();
        match event.kind {
            MediaEventKind::Playing => {
                let artwork_url = event.track_info.as_ref().and_then(|track| track.artwork_url.clone());
                if self.state.cover_url != artwork_url {
                    self.state.cover_url = artwork_url.clone();
                    changes.push(MediaChange::Cover(artwork_url));
                }
                self.set_playing(true, &mut changes);
                self.set_track(&event.track_info, &mut changes);
            }
            MediaEventKind::Paused | MediaEventKind::Stopped => self.set_playing(false, &mut changes),
            MediaEventKind::Request => self.set_track(&event.track_info, &mut changes),
        }
        if changes.is_empty() {
            None
        } else {
            Some(changes)
        }
    }

    fn snapshot(&self) -> MediaState {
        self.state.clone()
    }
}
