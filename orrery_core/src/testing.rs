//! In-memory collaborators for unit tests.

use orrery_env::{
    AnimationId, AnimationRunner, CameraAnimation, EnvError, LabelFactory, LabelHandle, LabelSpec,
    ViewerContext,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// One call received by [`MockLabels`].
#[derive(Debug, Clone, PartialEq)]
pub enum LabelCall {
    Create(String),
    ReleaseTexture(LabelHandle),
    ReleaseMaterial(LabelHandle),
    RemoveMesh(LabelHandle),
}

/// Label factory that records every call.
#[derive(Debug, Default)]
pub struct MockLabels {
    pub calls: Vec<LabelCall>,
    pub live: HashMap<LabelHandle, String>,
    /// Texts whose creation fails
    pub failing: Vec<String>,
    next: u64,
}

impl MockLabels {
    pub fn failing_on(texts: &[&str]) -> Self {
        Self {
            failing: texts.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn creations(&self) -> usize {
        self.calls.iter().filter(|c| matches!(c, LabelCall::Create(_))).count()
    }
}

impl LabelFactory for MockLabels {
    fn create_label(&mut self, spec: &LabelSpec) -> Result<LabelHandle, EnvError> {
        self.calls.push(LabelCall::Create(spec.text.clone()));
        if self.failing.contains(&spec.text) {
            return Err(EnvError::label("texture allocation failed"));
        }
        self.next += 1;
        let handle = LabelHandle(self.next);
        self.live.insert(handle, spec.text.clone());
        Ok(handle)
    }

    fn release_texture(&mut self, label: LabelHandle) {
        self.calls.push(LabelCall::ReleaseTexture(label));
    }

    fn release_material(&mut self, label: LabelHandle) {
        self.calls.push(LabelCall::ReleaseMaterial(label));
    }

    fn remove_mesh(&mut self, label: LabelHandle) {
        self.calls.push(LabelCall::RemoveMesh(label));
        self.live.remove(&label);
    }
}

/// Animation runner that only records starts and stops.
#[derive(Debug, Default)]
pub struct MockAnimator {
    pub started: Vec<(AnimationId, CameraAnimation)>,
    pub stopped: Vec<AnimationId>,
    next: u64,
}

impl AnimationRunner for MockAnimator {
    fn start(&mut self, animation: CameraAnimation) -> Result<AnimationId, EnvError> {
        self.next += 1;
        let id = AnimationId(self.next);
        self.started.push((id, animation));
        Ok(id)
    }

    fn stop(&mut self, id: AnimationId) {
        self.stopped.push(id);
    }
}

/// Context with a manually advanced clock.
#[derive(Debug)]
pub struct MockContext {
    pub seed: u64,
    micros: AtomicU64,
}

impl MockContext {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            micros: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.micros.fetch_add(by.as_micros() as u64, Ordering::SeqCst);
    }
}

impl ViewerContext for MockContext {
    fn now(&self) -> Duration {
        Duration::from_micros(self.micros.load(Ordering::SeqCst))
    }

    fn derive_rng(&self, stream: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.seed.wrapping_mul(0x9e3779b97f4a7c15) ^ stream)
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}
