// Session - Track registry and the operations offered to the UI
//
// Owns the declarative tree, one live state per track and the shared output
// node. Every edit goes through here:
// - the declarative tree is updated first
// - the synchronizer pushes the edited module into its live node
// - the scheduler rebuilds its pattern if the composition inputs changed
//
// Recovered errors are logged and sent to the notification channel.

use crate::audio::{ModuleSynchronizer, SyncReport, TrackAudioState, builder};
use crate::composition::scale::{self, NOTE_NAMES};
use crate::composition::{PatternInputs, ScaleResolver};
use crate::config::{ScaleSpec, SessionConfig, clamp_volume};
use crate::engine::{AudioEngine, NodeRef};
use crate::error::{ParamError, SessionError, SessionResult};
use crate::messaging::{
    Notification, NotificationCategory, NotificationConsumer, Notifier, create_notification_channel,
};
use crate::params::bounds::{self, ParamBounds};
use crate::params::path;
use crate::params::persistence::{self, TracksTree};
use crate::params::{
    EffectKind, GlobalState, ModuleId, NodeOptions, NotesParams, ParamsState, TrackId, TrackParams,
};
use rand::seq::SliceRandom;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Live side of one track
struct TrackRuntime {
    audio: TrackAudioState,
    sync: ModuleSynchronizer,
}

pub struct Session {
    engine: Arc<dyn AudioEngine>,
    config: SessionConfig,
    scales: ScaleResolver,
    params: ParamsState,
    output: Option<NodeRef>,
    tracks: BTreeMap<TrackId, TrackRuntime>,
    next_track_id: u32,
    notifier: Notifier,
}

/// Inputs the track's pattern captures
fn pattern_inputs(params: &TrackParams) -> PatternInputs {
    let source = params.signal_chain.source();
    PatternInputs {
        composition: params.composition.state(),
        detune: source.options.detune,
        detune_rand_fraction: source.detune_rand_fraction,
    }
}

impl Session {
    /// Create a session and its notification channel
    ///
    /// A failure to create the output node is reported, not fatal: the
    /// session starts without output and graph operations are rejected.
    pub fn new(engine: Arc<dyn AudioEngine>, config: SessionConfig) -> (Self, NotificationConsumer) {
        Self::with_scales(engine, config, ScaleResolver::default())
    }

    pub fn with_scales(
        engine: Arc<dyn AudioEngine>,
        config: SessionConfig,
        scales: ScaleResolver,
    ) -> (Self, NotificationConsumer) {
        let (producer, consumer) = create_notification_channel(config.notification_capacity);
        let notifier = Notifier::new(producer);

        let volume = config.volume();
        let output = match engine.create_output(volume) {
            Ok(output) => Some(output),
            Err(e) => {
                tracing::error!(error = %e, "output node could not be created");
                notifier.send(Notification::error(
                    NotificationCategory::Routing,
                    format!("Output unavailable: {}", e),
                ));
                None
            }
        };

        let session = Self {
            engine,
            params: ParamsState::new(GlobalState {
                playing: false,
                volume,
            }),
            config,
            scales,
            output,
            tracks: BTreeMap::new(),
            next_track_id: 0,
            notifier,
        };
        (session, consumer)
    }

    pub fn params(&self) -> &ParamsState {
        &self.params
    }

    pub fn global(&self) -> GlobalState {
        self.params.global
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn scales(&self) -> &ScaleResolver {
        &self.scales
    }

    pub fn output(&self) -> Option<&NodeRef> {
        self.output.as_ref()
    }

    pub fn track_ids(&self) -> Vec<TrackId> {
        self.params.tracks.keys().copied().collect()
    }

    pub fn track(&self, id: TrackId) -> SessionResult<&TrackParams> {
        Ok(self.params.track(id)?)
    }

    pub fn audio(&self, id: TrackId) -> Option<&TrackAudioState> {
        self.tracks.get(&id).map(|runtime| &runtime.audio)
    }

    /// Root notes, octaves and scale types a track can pick from
    pub fn note_names(&self) -> &'static [&'static str] {
        scale::note_names()
    }

    pub fn octaves(&self) -> Vec<u8> {
        scale::octaves()
    }

    pub fn scale_types(&self) -> Vec<&'static str> {
        self.scales.scale_types()
    }

    /// Slider ranges of every editable numeric field of a module
    pub fn module_bounds(
        &self,
        track: TrackId,
        module: &ModuleId,
    ) -> SessionResult<&'static [(&'static str, ParamBounds)]> {
        let chain = &self.params.track(track)?.signal_chain;
        let name = if &chain.source().id == module {
            chain.source().name
        } else {
            chain
                .effect(module)
                .map(|effect| effect.kind().module_name())
                .ok_or_else(|| ParamError::UnknownModule {
                    track,
                    module: module.clone(),
                })?
        };
        Ok(bounds::module_bounds(name))
    }

    /// Add a track with the configured defaults; returns its new id
    pub fn add_track(&mut self) -> SessionResult<TrackId> {
        let id = TrackId(self.next_track_id);
        self.next_track_id += 1;

        let result = self.build_track(id);
        self.report(NotificationCategory::Routing, result)
    }

    fn build_track(&mut self, id: TrackId) -> SessionResult<TrackId> {
        let spec = match &self.config.initial_scale {
            Some(spec) => spec.clone(),
            None => self.random_scale(),
        };
        let notes = self.resolve_notes(&spec.root, spec.octave, &spec.scale_type)?;
        let params = TrackParams::new(
            self.config.source_module(),
            self.config.composition_params(notes),
        );

        let runtime = self.build_runtime(id, &params)?;
        self.params.tracks.insert(id, params);
        self.tracks.insert(id, runtime);

        tracing::info!(track = %id, "track added");
        Ok(id)
    }

    /// Create every live object of a track from its declarative state
    ///
    /// Nothing is left in the engine if this fails.
    fn build_runtime(&self, id: TrackId, params: &TrackParams) -> SessionResult<TrackRuntime> {
        let mut runtime = self.build_nodes(id, params)?;
        if let Err(e) = self.start_pattern(&mut runtime, params) {
            builder::teardown(&mut runtime.audio);
            return Err(e);
        }
        Ok(runtime)
    }

    /// Build and route the live nodes of a track; no pattern yet
    fn build_nodes(&self, id: TrackId, params: &TrackParams) -> SessionResult<TrackRuntime> {
        let engine = self.engine.as_ref();
        let output = self.output.as_ref();
        let mut audio = TrackAudioState::new(id, self.notifier.clone());

        let routed = builder::init_track(engine, output, params.signal_chain.source(), &mut audio)
            .and_then(|_| {
                params
                    .signal_chain
                    .effects()
                    .iter()
                    .try_for_each(|effect| builder::attach_effect(engine, output, &mut audio, effect))
            });
        if let Err(e) = routed {
            builder::teardown(&mut audio);
            return Err(e.into());
        }

        Ok(TrackRuntime {
            sync: ModuleSynchronizer::new(&params.signal_chain),
            audio,
        })
    }

    /// Create the track's pattern and start it if the session is playing
    fn start_pattern(&self, runtime: &mut TrackRuntime, params: &TrackParams) -> SessionResult<()> {
        let engine = self.engine.as_ref();
        runtime.audio.composition.rebuild(engine, pattern_inputs(params))?;
        if self.params.global.playing {
            runtime.audio.composition.start(engine.transport().as_ref())?;
        }
        Ok(())
    }

    /// Stop a track, dispose its live nodes, then forget it
    pub fn delete_track(&mut self, id: TrackId) -> SessionResult<()> {
        let mut runtime = self.tracks.remove(&id).ok_or(ParamError::UnknownTrack(id))?;
        builder::teardown(&mut runtime.audio);
        self.params.tracks.remove(&id);

        tracing::info!(track = %id, "track deleted");
        Ok(())
    }

    /// Edit one field of a module, e.g. `options.frequency`
    pub fn set_module_field(
        &mut self,
        track: TrackId,
        module: &ModuleId,
        field: &str,
        value: impl Into<Value>,
    ) -> SessionResult<SyncReport> {
        let result = self
            .params
            .set_module_field(track, module, field, value.into())
            .map_err(SessionError::from)
            .and_then(|_| self.reconcile(track));
        self.report(NotificationCategory::Params, result)
    }

    /// Edit one composition field of a track, e.g. `interval`
    ///
    /// Root, octave and scale type edits re-resolve the scale; the resolved
    /// scale and its name cannot be written directly.
    pub fn set_track_field(
        &mut self,
        track: TrackId,
        field: &str,
        value: impl Into<Value>,
    ) -> SessionResult<()> {
        let value = value.into();
        let result = match field.strip_prefix("notes.") {
            Some(notes_field @ ("root" | "octave" | "scaleType")) => {
                self.edit_notes(track, notes_field, value)
            }
            // scale and scaleName only change through the resolver
            Some(_) => Err(ParamError::ImmutableField(field.to_string()).into()),
            None if field == "notes" => Err(ParamError::ImmutableField(field.to_string()).into()),
            None => self
                .params
                .set_track_field(track, field, value)
                .map_err(SessionError::from)
                .and_then(|_| self.reconcile(track).map(|_| ())),
        };
        self.report(NotificationCategory::Params, result)
    }

    fn edit_notes(&mut self, track: TrackId, field: &str, value: Value) -> SessionResult<()> {
        let notes = &self.params.track(track)?.composition.notes;
        let edited: NotesParams = path::edit(notes, field, value, &[])?;
        self.apply_scale(track, &edited.root, edited.octave, &edited.scale_type)
    }

    /// Pick a new scale for a track
    pub fn set_scale(
        &mut self,
        track: TrackId,
        root: &str,
        octave: u8,
        scale_type: &str,
    ) -> SessionResult<()> {
        let result = self.apply_scale(track, root, octave, scale_type);
        self.report(NotificationCategory::Params, result)
    }

    fn apply_scale(
        &mut self,
        track: TrackId,
        root: &str,
        octave: u8,
        scale_type: &str,
    ) -> SessionResult<()> {
        self.params.track(track)?;
        let notes = self.resolve_notes(root, octave, scale_type)?;
        self.params.set_notes(track, notes)?;
        self.reconcile(track)?;
        Ok(())
    }

    /// Append an effect of `kind` to a track; returns the new module id
    pub fn add_effect(&mut self, track: TrackId, kind: EffectKind) -> SessionResult<ModuleId> {
        let result = self.attach_new_effect(track, kind);
        self.report(NotificationCategory::Routing, result)
    }

    fn attach_new_effect(&mut self, track: TrackId, kind: EffectKind) -> SessionResult<ModuleId> {
        let params = self
            .params
            .tracks
            .get_mut(&track)
            .ok_or(ParamError::UnknownTrack(track))?;
        let runtime = self
            .tracks
            .get_mut(&track)
            .ok_or(ParamError::UnknownTrack(track))?;

        let id = builder::add_effect(
            self.engine.as_ref(),
            self.output.as_ref(),
            &mut params.signal_chain,
            &mut runtime.audio,
            kind,
        )?;
        runtime.sync.rebase(&params.signal_chain);
        Ok(id)
    }

    /// Flip the global play state; returns the new state
    pub fn toggle_play(&mut self) -> SessionResult<bool> {
        let playing = !self.params.global.playing;
        self.set_playing(playing)?;
        Ok(playing)
    }

    pub fn set_playing(&mut self, playing: bool) -> SessionResult<()> {
        self.params.global.playing = playing;
        let transport = self.engine.transport();

        let mut first_error = None;
        for (id, runtime) in self.tracks.iter_mut() {
            if let Err(e) = runtime.audio.composition.set_playing(playing, transport.as_ref()) {
                tracing::warn!(track = %id, error = %e, "play state change failed");
                first_error.get_or_insert(e);
            }
        }

        tracing::info!(playing, tracks = self.tracks.len(), "play state changed");
        let result = match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        };
        self.report(NotificationCategory::Scheduling, result)
    }

    /// Set the output gain, clamped to 0..1
    pub fn set_volume(&mut self, volume: f64) -> SessionResult<()> {
        let volume = clamp_volume(volume);
        self.params.global.volume = volume;

        let result = match &self.output {
            Some(output) => output.set(&NodeOptions::Gain(volume)).map_err(SessionError::from),
            None => Ok(()),
        };
        self.report(NotificationCategory::Routing, result)
    }

    /// Encode every track for external storage
    pub fn encode_tracks(&self) -> SessionResult<String> {
        Ok(persistence::encode_tracks(&self.params.tracks)?)
    }

    /// Replace every track with a decoded tree
    ///
    /// The tree is validated and its nodes built before anything is
    /// replaced. Patterns are created only once the previous ones are
    /// disposed; if that step fails the previous tracks are rebuilt.
    pub fn load_tracks(&mut self, encoded: &str) -> SessionResult<()> {
        let result = persistence::decode_tracks(encoded)
            .map_err(SessionError::from)
            .and_then(|tree| self.replace_tracks(tree));
        self.report(NotificationCategory::Persistence, result)
    }

    fn replace_tracks(&mut self, tree: TracksTree) -> SessionResult<()> {
        // nodes first: a routing failure leaves the current tracks playing
        let mut built = BTreeMap::new();
        for (id, params) in &tree {
            match self.build_nodes(*id, params) {
                Ok(runtime) => {
                    built.insert(*id, runtime);
                }
                Err(e) => {
                    teardown_all(&mut built);
                    return Err(e);
                }
            }
        }

        // old patterns are disposed before any new one exists
        teardown_all(&mut self.tracks);

        let started = built.iter_mut().try_for_each(|(id, runtime)| match tree.get(id) {
            Some(params) => self.start_pattern(runtime, params),
            None => Ok(()),
        });
        if let Err(e) = started {
            teardown_all(&mut built);
            self.restore_tracks();
            return Err(e);
        }

        let highest = tree.keys().map(|id| id.0 + 1).max().unwrap_or(0);
        self.next_track_id = self.next_track_id.max(highest);
        self.tracks = built;
        self.params.tracks = tree;

        tracing::info!(tracks = self.tracks.len(), "tracks loaded");
        Ok(())
    }

    /// Rebuild every live track from the declarative tree after a failed load
    fn restore_tracks(&mut self) {
        let mut restored = BTreeMap::new();
        for (id, params) in &self.params.tracks {
            match self.build_runtime(*id, params) {
                Ok(runtime) => {
                    restored.insert(*id, runtime);
                }
                Err(e) => {
                    tracing::error!(track = %id, error = %e, "track could not be restored");
                    self.notifier.send(Notification::error(
                        NotificationCategory::Persistence,
                        format!("Track {} could not be restored: {}", id, e),
                    ));
                }
            }
        }
        self.tracks = restored;
    }

    /// Push a declarative edit of `track` into the live graph
    fn reconcile(&mut self, track: TrackId) -> SessionResult<SyncReport> {
        let params = self.params.track(track)?;
        let runtime = self
            .tracks
            .get_mut(&track)
            .ok_or(ParamError::UnknownTrack(track))?;

        let report = runtime.sync.sync(&params.signal_chain, &runtime.audio);
        for module in &report.dropped {
            self.notifier.send(Notification::warning(
                NotificationCategory::Params,
                format!("Track {}: live update of {} dropped", track, module),
            ));
        }

        runtime
            .audio
            .composition
            .refresh(self.engine.as_ref(), pattern_inputs(params))?;
        Ok(report)
    }

    fn resolve_notes(&self, root: &str, octave: u8, scale_type: &str) -> SessionResult<NotesParams> {
        let scale = self.scales.resolve(root, octave, scale_type);
        let scale_name = scale::scale_name(root, octave, scale_type);
        if scale.is_empty() {
            return Err(ParamError::UnknownScale(scale_name).into());
        }

        Ok(NotesParams {
            root: root.to_string(),
            octave,
            scale_type: scale_type.to_string(),
            scale_name,
            scale,
        })
    }

    fn random_scale(&self) -> ScaleSpec {
        let mut rng = rand::thread_rng();
        let octaves = scale::octaves();
        let scale_types = self.scales.scale_types();

        let default = ScaleSpec::default();
        ScaleSpec {
            root: NOTE_NAMES
                .choose(&mut rng)
                .map(|r| r.to_string())
                .unwrap_or(default.root),
            octave: octaves.choose(&mut rng).copied().unwrap_or(default.octave),
            scale_type: scale_types
                .choose(&mut rng)
                .map(|s| s.to_string())
                .unwrap_or(default.scale_type),
        }
    }

    /// Log and forward an error to the notification channel
    fn report<T>(&self, category: NotificationCategory, result: SessionResult<T>) -> SessionResult<T> {
        if let Err(e) = &result {
            tracing::warn!(error = %e, "operation rejected");
            self.notifier
                .send(Notification::error(category, e.to_string()));
        }
        result
    }
}

fn teardown_all(tracks: &mut BTreeMap<TrackId, TrackRuntime>) {
    for runtime in tracks.values_mut() {
        builder::teardown(&mut runtime.audio);
    }
    tracks.clear();
}

impl Drop for Session {
    fn drop(&mut self) {
        teardown_all(&mut self.tracks);
        if let Some(output) = self.output.take() {
            output.dispose();
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("global", &self.params.global)
            .field("tracks", &self.track_ids())
            .field("has_output", &self.output.is_some())
            .finish()
    }
}
