//! Spin / win animation state machine
//!
//! ```text
//! idle → start → spin → [anticipation] → landing → stop → idle
//! ```
//!
//! Everything is driven by `tick(now_ms)`. Reel motion is a closed-form
//! function of time, so a tick that jumps far ahead still walks through every
//! reel stop in order and emits the same events as a 60 Hz cadence would.

use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::easing::Easing;
use crate::symbols::{GridPosition, SymbolCategory};

// ═══════════════════════════════════════════════════════════════════════════════
// TIMING
// ═══════════════════════════════════════════════════════════════════════════════

/// Timing profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimingProfile {
    /// Normal gameplay timing
    #[default]
    Normal,
    /// Fast/Turbo mode
    Turbo,
    /// Mobile optimized (slightly faster)
    Mobile,
    /// Design review: wider reel stop gaps
    Studio,
    /// Every phase completes on the next frame
    Instant,
    /// Hand-tuned or scaled values
    Custom,
}

/// Animation timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnimationTiming {
    pub profile: TimingProfile,
    /// Acceleration of each reel up to full speed (ms)
    pub start_duration_ms: f64,
    /// Delay between reel starts, left to right (ms)
    pub reel_start_stagger_ms: f64,
    /// Time the first reel spins before it lands (ms)
    pub reel_spin_duration_ms: f64,
    /// Delay between reel stops (ms)
    pub reel_stop_interval_ms: f64,
    /// Extra spin time for reels under anticipation (ms)
    pub anticipation_duration_ms: f64,
    /// Deceleration with overshoot (ms)
    pub landing_duration_ms: f64,
    /// Settle time after the last reel lands (ms)
    pub stop_settle_ms: f64,
    /// Win highlight pulse length (ms)
    pub win_highlight_ms: f64,
    /// Full speed in cells per second
    pub spin_velocity: f64,
    /// Special symbols on stopped reels that trigger anticipation
    pub anticipation_threshold: usize,
    /// Visible scatters needed for a win highlight
    pub scatter_win_count: usize,
}

impl AnimationTiming {
    pub fn normal() -> Self {
        Self {
            profile: TimingProfile::Normal,
            start_duration_ms: 200.0,
            reel_start_stagger_ms: 60.0,
            reel_spin_duration_ms: 800.0,
            reel_stop_interval_ms: 300.0,
            anticipation_duration_ms: 1500.0,
            landing_duration_ms: 250.0,
            stop_settle_ms: 300.0,
            win_highlight_ms: 1500.0,
            spin_velocity: 18.0,
            anticipation_threshold: 2,
            scatter_win_count: 3,
        }
    }

    pub fn turbo() -> Self {
        Self {
            profile: TimingProfile::Turbo,
            start_duration_ms: 100.0,
            reel_start_stagger_ms: 20.0,
            reel_spin_duration_ms: 400.0,
            reel_stop_interval_ms: 100.0,
            anticipation_duration_ms: 800.0,
            landing_duration_ms: 150.0,
            stop_settle_ms: 150.0,
            win_highlight_ms: 800.0,
            spin_velocity: 30.0,
            ..Self::normal()
        }
    }

    pub fn mobile() -> Self {
        Self {
            profile: TimingProfile::Mobile,
            start_duration_ms: 150.0,
            reel_start_stagger_ms: 40.0,
            reel_spin_duration_ms: 600.0,
            reel_stop_interval_ms: 200.0,
            anticipation_duration_ms: 1000.0,
            landing_duration_ms: 200.0,
            stop_settle_ms: 250.0,
            win_highlight_ms: 1200.0,
            spin_velocity: 22.0,
            ..Self::normal()
        }
    }

    pub fn studio() -> Self {
        Self {
            profile: TimingProfile::Studio,
            reel_spin_duration_ms: 600.0,
            reel_stop_interval_ms: 350.0,
            anticipation_duration_ms: 500.0,
            win_highlight_ms: 1000.0,
            ..Self::normal()
        }
    }

    pub fn instant() -> Self {
        Self {
            profile: TimingProfile::Instant,
            start_duration_ms: 0.0,
            reel_start_stagger_ms: 0.0,
            reel_spin_duration_ms: 0.0,
            reel_stop_interval_ms: 0.0,
            anticipation_duration_ms: 0.0,
            landing_duration_ms: 0.0,
            stop_settle_ms: 0.0,
            win_highlight_ms: 0.0,
            ..Self::normal()
        }
    }

    pub fn from_profile(profile: TimingProfile) -> Self {
        match profile {
            TimingProfile::Normal | TimingProfile::Custom => Self::normal(),
            TimingProfile::Turbo => Self::turbo(),
            TimingProfile::Mobile => Self::mobile(),
            TimingProfile::Studio => Self::studio(),
            TimingProfile::Instant => Self::instant(),
        }
    }

    /// Scale timing by factor (< 1.0 = faster)
    pub fn scaled(&self, factor: f64) -> Self {
        let factor = factor.max(0.0);
        Self {
            profile: TimingProfile::Custom,
            start_duration_ms: self.start_duration_ms * factor,
            reel_start_stagger_ms: self.reel_start_stagger_ms * factor,
            reel_spin_duration_ms: self.reel_spin_duration_ms * factor,
            reel_stop_interval_ms: self.reel_stop_interval_ms * factor,
            anticipation_duration_ms: self.anticipation_duration_ms * factor,
            landing_duration_ms: self.landing_duration_ms * factor,
            stop_settle_ms: self.stop_settle_ms * factor,
            win_highlight_ms: self.win_highlight_ms * factor,
            spin_velocity: if factor > 0.0 {
                self.spin_velocity / factor
            } else {
                self.spin_velocity
            },
            ..self.clone()
        }
    }

    /// Spin-start to last landing, without anticipation
    pub fn total_spin_duration(&self, reel_count: u8) -> f64 {
        let last = reel_count.saturating_sub(1) as f64;
        self.reel_spin_duration_ms + last * self.reel_stop_interval_ms + self.landing_duration_ms
    }
}

impl Default for AnimationTiming {
    fn default() -> Self {
        Self::normal()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATE / EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Spin phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnimationPhase {
    #[default]
    Idle,
    Start,
    Spin,
    Anticipation,
    Landing,
    Stop,
}

/// Snapshot of the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnimationState {
    pub phase: AnimationPhase,
    /// Leftmost reel still moving (last reel once all have landed)
    pub active_reel_index: usize,
    pub queued_spin: bool,
}

/// Landing symbols chosen by the host
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinOutcome {
    /// Symbol index per reel, per row
    pub stops: Vec<Vec<usize>>,
    /// Positions to highlight; empty = scatter rule
    #[serde(default)]
    pub win_positions: Vec<GridPosition>,
}

/// Lifecycle events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnimationEvent {
    SpinStarted { spin_id: u64 },
    ReelStopped { index: usize },
    WinDetected { positions: Vec<GridPosition> },
    SpinCompleted { spin_id: u64 },
}

#[derive(Debug, Clone)]
struct WinHighlight {
    positions: Vec<GridPosition>,
    started_at: f64,
}

#[derive(Debug, Clone)]
struct ReelPlan {
    start_at: f64,
    /// When deceleration begins (moves later under anticipation)
    stop_at: f64,
    landed_at: Option<f64>,
    anticipated: bool,
}

#[derive(Debug, Clone)]
struct SpinCycle {
    spin_id: u64,
    started_at: f64,
    reels: Vec<ReelPlan>,
    initial: Vec<Vec<usize>>,
    outcome: SpinOutcome,
    anticipation: bool,
    stop_entered: Option<f64>,
}

/// What the tick loop does next
enum Step {
    Land { reel: usize, at: f64 },
    EnterStop { at: f64 },
    Complete { at: f64 },
    Wait,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONTROLLER
// ═══════════════════════════════════════════════════════════════════════════════

/// Drives spin phases and win highlighting
pub struct AnimationController {
    timing: AnimationTiming,
    phase: AnimationPhase,
    queued_spin: bool,
    queued_outcome: Option<SpinOutcome>,
    cycle: Option<SpinCycle>,
    rows: usize,
    /// Symbols showing while idle, per reel per row
    grid: Vec<Vec<usize>>,
    categories: Vec<SymbolCategory>,
    rng: StdRng,
    next_spin_id: u64,
    highlight: Option<WinHighlight>,
    last_tick: f64,
}

impl AnimationController {
    pub fn new(timing: AnimationTiming, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            timing,
            phase: AnimationPhase::Idle,
            queued_spin: false,
            queued_outcome: None,
            cycle: None,
            rows: 0,
            grid: Vec::new(),
            categories: Vec::new(),
            rng,
            next_spin_id: 1,
            highlight: None,
            last_tick: 0.0,
        }
    }

    pub fn timing(&self) -> &AnimationTiming {
        &self.timing
    }

    /// Takes effect from the next spin
    pub fn set_timing(&mut self, timing: AnimationTiming) {
        self.timing = timing;
    }

    /// Symbols on the grid while idle, and the category of each symbol index
    pub fn set_grid(&mut self, grid: Vec<Vec<usize>>, categories: Vec<SymbolCategory>) {
        self.rows = grid.first().map_or(0, Vec::len);
        self.grid = grid;
        self.categories = categories;
    }

    pub fn state(&self) -> AnimationState {
        let reels = self.grid.len();
        let active_reel_index = match &self.cycle {
            Some(cycle) => cycle
                .reels
                .iter()
                .position(|r| r.landed_at.is_none())
                .unwrap_or(reels.saturating_sub(1)),
            None => 0,
        };
        AnimationState {
            phase: self.phase,
            active_reel_index,
            queued_spin: self.queued_spin,
        }
    }

    pub fn phase(&self) -> AnimationPhase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == AnimationPhase::Idle
    }

    pub fn current_spin_id(&self) -> Option<u64> {
        self.cycle.as_ref().map(|c| c.spin_id)
    }

    /// Start a spin, or queue one if a cycle is running
    pub fn spin(&mut self, now_ms: f64) -> Vec<AnimationEvent> {
        self.request(now_ms, None)
    }

    /// Spin landing on host-chosen symbols
    pub fn spin_with_outcome(&mut self, now_ms: f64, outcome: SpinOutcome) -> Vec<AnimationEvent> {
        self.request(now_ms, Some(outcome))
    }

    fn request(&mut self, now_ms: f64, outcome: Option<SpinOutcome>) -> Vec<AnimationEvent> {
        if !self.is_idle() {
            log::debug!("Spin requested during {:?}, queued", self.phase);
            self.queue_spin(outcome);
            return Vec::new();
        }
        self.start_cycle(now_ms, outcome)
    }

    /// Mark a spin as queued without starting it
    pub fn queue_spin(&mut self, outcome: Option<SpinOutcome>) {
        self.queued_spin = true;
        if outcome.is_some() {
            self.queued_outcome = outcome;
        }
    }

    /// Start a queued spin if idle
    pub fn start_queued(&mut self, now_ms: f64) -> Vec<AnimationEvent> {
        if !self.is_idle() || !self.queued_spin {
            return Vec::new();
        }
        self.queued_spin = false;
        let outcome = self.queued_outcome.take();
        self.start_cycle(now_ms, outcome)
    }

    fn start_cycle(&mut self, now_ms: f64, outcome: Option<SpinOutcome>) -> Vec<AnimationEvent> {
        let reels = self.grid.len();
        if reels == 0 || self.rows == 0 {
            log::warn!("Spin ignored: no grid");
            return Vec::new();
        }

        let outcome = match outcome {
            Some(outcome) if self.outcome_fits(&outcome) => outcome,
            Some(_) => {
                log::warn!("Spin outcome does not match the {}x{} grid, using preview stops", reels, self.rows);
                self.random_outcome()
            }
            None => self.random_outcome(),
        };

        let t = &self.timing;
        let plans = (0..reels)
            .map(|i| {
                let start_at = now_ms + i as f64 * t.reel_start_stagger_ms;
                let stop_at = (now_ms + t.reel_spin_duration_ms + i as f64 * t.reel_stop_interval_ms)
                    .max(start_at + t.start_duration_ms);
                ReelPlan {
                    start_at,
                    stop_at,
                    landed_at: None,
                    anticipated: false,
                }
            })
            .collect();

        let spin_id = self.next_spin_id;
        self.next_spin_id += 1;
        self.cycle = Some(SpinCycle {
            spin_id,
            started_at: now_ms,
            reels: plans,
            initial: self.grid.clone(),
            outcome,
            anticipation: false,
            stop_entered: None,
        });
        self.highlight = None;
        self.phase = AnimationPhase::Start;
        self.last_tick = self.last_tick.max(now_ms);
        log::debug!("Spin {} started at {:.1}ms", spin_id, now_ms);
        vec![AnimationEvent::SpinStarted { spin_id }]
    }

    fn outcome_fits(&self, outcome: &SpinOutcome) -> bool {
        let n = self.categories.len().max(1);
        outcome.stops.len() == self.grid.len()
            && outcome
                .stops
                .iter()
                .all(|reel| reel.len() == self.rows && reel.iter().all(|&s| s < n))
    }

    fn random_outcome(&mut self) -> SpinOutcome {
        let n = self.categories.len();
        let stops = (0..self.grid.len())
            .map(|_| {
                (0..self.rows)
                    .map(|_| if n > 0 { self.rng.random_range(0..n) } else { 0 })
                    .collect()
            })
            .collect();
        SpinOutcome {
            stops,
            win_positions: Vec::new(),
        }
    }

    /// Advance to `now_ms`, returning events in the order they happened
    pub fn tick(&mut self, now_ms: f64) -> Vec<AnimationEvent> {
        let mut events = Vec::new();
        self.last_tick = self.last_tick.max(now_ms);

        loop {
            match self.next_step(now_ms) {
                Step::Land { reel, at } => {
                    if let Some(cycle) = self.cycle.as_mut() {
                        cycle.reels[reel].landed_at = Some(at);
                    }
                    log::trace!("Reel {} landed at {:.1}ms", reel, at);
                    events.push(AnimationEvent::ReelStopped { index: reel });
                    self.check_anticipation(at);
                }
                Step::EnterStop { at } => {
                    self.phase = AnimationPhase::Stop;
                    let positions = self.cycle.as_mut().map(|cycle| {
                        cycle.stop_entered = Some(at);
                        detect_wins(&cycle.outcome, &self.categories, self.timing.scatter_win_count)
                    });
                    if let Some(positions) = positions.filter(|p| !p.is_empty()) {
                        self.highlight = Some(WinHighlight {
                            positions: positions.clone(),
                            started_at: at,
                        });
                        events.push(AnimationEvent::WinDetected { positions });
                    }
                }
                Step::Complete { at } => {
                    if let Some(cycle) = self.cycle.take() {
                        self.grid = cycle.outcome.stops;
                        self.phase = AnimationPhase::Idle;
                        log::debug!("Spin {} completed at {:.1}ms", cycle.spin_id, at);
                        events.push(AnimationEvent::SpinCompleted {
                            spin_id: cycle.spin_id,
                        });
                    }
                    if self.queued_spin {
                        self.queued_spin = false;
                        let outcome = self.queued_outcome.take();
                        events.extend(self.start_cycle(at, outcome));
                    }
                }
                Step::Wait => {
                    if let Some(phase) = self.running_phase(now_ms) {
                        self.phase = phase;
                    }
                    break;
                }
            }
        }

        if let Some(h) = &self.highlight {
            if now_ms - h.started_at >= self.timing.win_highlight_ms && self.is_idle() {
                self.highlight = None;
            }
        }
        events
    }

    fn next_step(&self, now_ms: f64) -> Step {
        let Some(cycle) = &self.cycle else {
            return Step::Wait;
        };
        if let Some(entered) = cycle.stop_entered {
            let done_at = entered + self.timing.stop_settle_ms;
            return if now_ms >= done_at {
                Step::Complete { at: done_at }
            } else {
                Step::Wait
            };
        }

        let landing = self.timing.landing_duration_ms.max(0.0);
        let next = cycle
            .reels
            .iter()
            .enumerate()
            .filter(|(_, r)| r.landed_at.is_none())
            .map(|(i, r)| (i, r.stop_at + landing))
            .min_by(|a, b| a.1.total_cmp(&b.1));

        match next {
            Some((reel, at)) if at <= now_ms => Step::Land { reel, at },
            Some(_) => Step::Wait,
            None => {
                let at = cycle
                    .reels
                    .iter()
                    .filter_map(|r| r.landed_at)
                    .fold(cycle.started_at, f64::max);
                Step::EnterStop { at }
            }
        }
    }

    fn check_anticipation(&mut self, at: f64) {
        let threshold = self.timing.anticipation_threshold;
        let extension = self.timing.anticipation_duration_ms;
        let categories = &self.categories;
        let Some(cycle) = self.cycle.as_mut() else {
            return;
        };
        if cycle.anticipation || threshold == 0 {
            return;
        }

        let specials: usize = cycle
            .reels
            .iter()
            .zip(&cycle.outcome.stops)
            .filter(|(plan, _)| plan.landed_at.is_some())
            .flat_map(|(_, stops)| stops.iter())
            .filter(|&&s| categories.get(s).is_some_and(SymbolCategory::is_special))
            .count();
        if specials < threshold {
            return;
        }

        let mut extended = 0;
        for plan in cycle.reels.iter_mut().filter(|p| p.landed_at.is_none() && p.stop_at > at) {
            plan.stop_at += extension;
            plan.anticipated = true;
            extended += 1;
        }
        if extended > 0 {
            cycle.anticipation = true;
            log::debug!(
                "Anticipation: {} special symbols landed, extending {} reels",
                specials,
                extended
            );
        }
    }

    fn running_phase(&self, now_ms: f64) -> Option<AnimationPhase> {
        let cycle = self.cycle.as_ref()?;
        if cycle.stop_entered.is_some() {
            return Some(AnimationPhase::Stop);
        }
        let last = cycle.reels.last()?;
        let accelerating_until = last.start_at + self.timing.start_duration_ms;
        let phase = if now_ms >= last.stop_at {
            AnimationPhase::Landing
        } else if cycle.anticipation && cycle.reels.iter().any(|r| r.anticipated && r.landed_at.is_none()) {
            AnimationPhase::Anticipation
        } else if now_ms < accelerating_until {
            AnimationPhase::Start
        } else {
            AnimationPhase::Spin
        };
        Some(phase)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // MOTION QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    fn cruise_position(&self, plan: &ReelPlan, t: f64) -> f64 {
        let elapsed = t - plan.start_at;
        if elapsed <= 0.0 {
            return 0.0;
        }
        let v = self.timing.spin_velocity / 1000.0;
        let d = self.timing.start_duration_ms;
        if d <= 0.0 {
            v * elapsed
        } else if elapsed < d {
            v * elapsed * elapsed / (2.0 * d)
        } else {
            v * d / 2.0 + v * (elapsed - d)
        }
    }

    /// Strip travel at which a reel comes to rest
    fn landing_target(&self, plan: &ReelPlan) -> f64 {
        let at_stop = self.cruise_position(plan, plan.stop_at);
        at_stop.floor() + self.rows as f64 + 1.0
    }

    fn position_of(&self, plan: &ReelPlan, t: f64) -> f64 {
        if t < plan.stop_at {
            return self.cruise_position(plan, t);
        }
        let from = self.cruise_position(plan, plan.stop_at);
        let target = self.landing_target(plan);
        let duration = self.timing.landing_duration_ms;
        if duration <= 0.0 || t >= plan.stop_at + duration {
            return target;
        }
        let u = Easing::BackOut.evaluate(((t - plan.stop_at) / duration) as f32) as f64;
        from + (target - from) * u
    }

    /// Strip travel of a reel in cells (0 while idle)
    pub fn reel_position(&self, reel: usize, now_ms: f64) -> f64 {
        match &self.cycle {
            Some(cycle) => cycle
                .reels
                .get(reel)
                .map_or(0.0, |plan| self.position_of(plan, now_ms.min(self.last_tick))),
            None => 0.0,
        }
    }

    /// Fraction of a cell the reel has scrolled past its current symbol
    pub fn reel_offset(&self, reel: usize, now_ms: f64) -> f32 {
        let pos = self.reel_position(reel, now_ms);
        (pos - pos.floor()) as f32
    }

    /// Symbol shown at `row` of `reel` (row -1 is the one scrolling in)
    pub fn displayed_symbol(&self, reel: usize, row: i64, now_ms: f64) -> usize {
        let Some(cycle) = &self.cycle else {
            return self
                .grid
                .get(reel)
                .and_then(|r| r.get(row.max(0) as usize))
                .copied()
                .unwrap_or(0);
        };
        let Some(plan) = cycle.reels.get(reel) else {
            return 0;
        };
        let t = now_ms.min(self.last_tick);
        let travel = self.position_of(plan, t).floor() as i64;
        let slot = row - travel;
        let rows = self.rows as i64;

        if (0..rows).contains(&slot) {
            return cycle.initial[reel][slot as usize];
        }
        if t >= plan.stop_at {
            let target = self.landing_target(plan) as i64;
            let outcome_slot = slot + target;
            if (0..rows).contains(&outcome_slot) {
                return cycle.outcome.stops[reel][outcome_slot as usize];
            }
        }
        filler_symbol(cycle.spin_id, reel, slot, self.categories.len())
    }

    /// Whether a reel is still moving
    pub fn reel_in_motion(&self, reel: usize, now_ms: f64) -> bool {
        match &self.cycle {
            Some(cycle) => cycle.reels.get(reel).is_some_and(|plan| {
                plan.landed_at.is_none() && now_ms.min(self.last_tick) > plan.start_at
            }),
            None => false,
        }
    }

    /// Highlighted positions and pulse intensity (0-1)
    pub fn highlight(&self, now_ms: f64) -> Option<(&[GridPosition], f32)> {
        let h = self.highlight.as_ref()?;
        let elapsed = now_ms - h.started_at;
        let duration = self.timing.win_highlight_ms;
        if duration <= 0.0 || elapsed >= duration {
            // Hold a steady highlight while the stop phase is still showing
            return (self.phase == AnimationPhase::Stop).then_some((h.positions.as_slice(), 1.0));
        }
        let pulse = 0.5 + 0.5 * (elapsed / 1000.0 * std::f64::consts::TAU * 2.0).cos();
        Some((h.positions.as_slice(), pulse as f32))
    }

    /// Grid shown while idle
    pub fn grid(&self) -> &[Vec<usize>] {
        &self.grid
    }

    /// Drop any cycle in progress and return to idle
    pub fn reset(&mut self) {
        self.cycle = None;
        self.phase = AnimationPhase::Idle;
        self.queued_spin = false;
        self.queued_outcome = None;
        self.highlight = None;
    }
}

/// Host positions, or every scatter when enough are visible
fn detect_wins(outcome: &SpinOutcome, categories: &[SymbolCategory], scatter_win_count: usize) -> Vec<GridPosition> {
    if !outcome.win_positions.is_empty() {
        return outcome.win_positions.clone();
    }
    let scatters: Vec<GridPosition> = outcome
        .stops
        .iter()
        .enumerate()
        .flat_map(|(col, reel)| {
            reel.iter()
                .enumerate()
                .filter(|(_, s)| categories.get(**s) == Some(&SymbolCategory::Scatter))
                .map(move |(row, _)| GridPosition::new(col as u8, row as u8))
        })
        .collect();
    if scatter_win_count > 0 && scatters.len() >= scatter_win_count {
        scatters
    } else {
        Vec::new()
    }
}

/// Deterministic strip filler between the start and landing windows
fn filler_symbol(spin_id: u64, reel: usize, slot: i64, symbol_count: usize) -> usize {
    if symbol_count == 0 {
        return 0;
    }
    // splitmix64
    let mut z = spin_id
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add((reel as u64) << 32)
        .wrapping_add(slot as u64);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^= z >> 31;
    (z % symbol_count as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOW: SymbolCategory = SymbolCategory::Low;
    const SCATTER: SymbolCategory = SymbolCategory::Scatter;

    fn controller(timing: AnimationTiming, reels: usize, rows: usize, categories: Vec<SymbolCategory>) -> AnimationController {
        let mut ctl = AnimationController::new(timing, Some(42));
        let grid = (0..reels).map(|c| (0..rows).map(|r| (c + r) % categories.len()).collect()).collect();
        ctl.set_grid(grid, categories);
        ctl
    }

    fn outcome(stops: Vec<Vec<usize>>) -> SpinOutcome {
        SpinOutcome {
            stops,
            win_positions: Vec::new(),
        }
    }

    fn run_until_idle(ctl: &mut AnimationController, from: f64, step: f64) -> (Vec<AnimationEvent>, f64) {
        let mut events = Vec::new();
        let mut now = from;
        for _ in 0..100_000 {
            now += step;
            events.extend(ctl.tick(now));
            if ctl.is_idle() && !ctl.state().queued_spin {
                break;
            }
        }
        (events, now)
    }

    #[test]
    fn test_timing_profiles() {
        let normal = AnimationTiming::normal();
        let turbo = AnimationTiming::turbo();
        let mobile = AnimationTiming::mobile();
        assert!(turbo.reel_spin_duration_ms < mobile.reel_spin_duration_ms);
        assert!(mobile.reel_spin_duration_ms < normal.reel_spin_duration_ms);
        assert!(AnimationTiming::studio().reel_stop_interval_ms > normal.reel_stop_interval_ms);
        assert_eq!(AnimationTiming::instant().total_spin_duration(5), 0.0);

        let half = normal.scaled(0.5);
        assert_eq!(half.profile, TimingProfile::Custom);
        assert_eq!(half.reel_spin_duration_ms, 400.0);
        assert_eq!(half.spin_velocity, 36.0);
    }

    #[test]
    fn test_full_cycle_event_order() {
        let mut ctl = controller(AnimationTiming::normal(), 5, 3, vec![LOW; 4]);
        let started = ctl.spin(0.0);
        assert_eq!(started, vec![AnimationEvent::SpinStarted { spin_id: 1 }]);
        assert_eq!(ctl.phase(), AnimationPhase::Start);

        let (events, _) = run_until_idle(&mut ctl, 0.0, 16.0);
        let stops: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                AnimationEvent::ReelStopped { index } => Some(*index),
                _ => None,
            })
            .collect();
        assert_eq!(stops, vec![0, 1, 2, 3, 4]);
        assert_eq!(events.last(), Some(&AnimationEvent::SpinCompleted { spin_id: 1 }));
        assert_eq!(ctl.phase(), AnimationPhase::Idle);
    }

    #[test]
    fn test_phases_progress_in_order() {
        let mut ctl = controller(AnimationTiming::normal(), 3, 3, vec![LOW; 4]);
        ctl.spin(0.0);
        let mut seen = vec![ctl.phase()];
        let mut now = 0.0;
        while !ctl.is_idle() {
            now += 16.0;
            ctl.tick(now);
            if seen.last() != Some(&ctl.phase()) {
                seen.push(ctl.phase());
            }
        }
        assert_eq!(
            seen,
            vec![
                AnimationPhase::Start,
                AnimationPhase::Spin,
                AnimationPhase::Landing,
                AnimationPhase::Stop,
                AnimationPhase::Idle
            ]
        );
    }

    #[test]
    fn test_second_spin_is_queued_not_restarted() {
        let mut ctl = controller(AnimationTiming::normal(), 5, 3, vec![LOW; 4]);
        ctl.spin(0.0);
        ctl.tick(300.0);
        assert_eq!(ctl.phase(), AnimationPhase::Spin);

        assert!(ctl.spin(310.0).is_empty());
        assert!(ctl.state().queued_spin);
        assert_eq!(ctl.current_spin_id(), Some(1));

        let (events, _) = run_until_idle(&mut ctl, 310.0, 16.0);
        let lifecycle: Vec<&AnimationEvent> = events
            .iter()
            .filter(|e| matches!(e, AnimationEvent::SpinStarted { .. } | AnimationEvent::SpinCompleted { .. }))
            .collect();
        assert_eq!(
            lifecycle,
            vec![
                &AnimationEvent::SpinCompleted { spin_id: 1 },
                &AnimationEvent::SpinStarted { spin_id: 2 },
                &AnimationEvent::SpinCompleted { spin_id: 2 },
            ]
        );
        assert!(!ctl.state().queued_spin);
    }

    #[test]
    fn test_large_tick_walks_every_stop() {
        let mut ctl = controller(AnimationTiming::normal(), 5, 3, vec![LOW; 4]);
        ctl.spin(0.0);
        let events = ctl.tick(60_000.0);
        let stopped = events
            .iter()
            .filter(|e| matches!(e, AnimationEvent::ReelStopped { .. }))
            .count();
        assert_eq!(stopped, 5);
        assert_eq!(events.last(), Some(&AnimationEvent::SpinCompleted { spin_id: 1 }));
    }

    #[test]
    fn test_anticipation_extends_remaining_reels() {
        let categories = vec![LOW, SCATTER];
        let stops = vec![vec![1, 0, 0], vec![0, 1, 0], vec![0, 0, 0], vec![0, 0, 0], vec![0, 0, 0]];

        let mut plain = controller(AnimationTiming::normal(), 5, 3, vec![LOW, LOW]);
        plain.spin_with_outcome(0.0, outcome(stops.clone()));
        let (_, plain_end) = run_until_idle(&mut plain, 0.0, 1.0);

        let mut ctl = controller(AnimationTiming::normal(), 5, 3, categories);
        ctl.spin_with_outcome(0.0, outcome(stops));
        let mut saw_anticipation = false;
        let mut now = 0.0;
        while !ctl.is_idle() {
            now += 1.0;
            ctl.tick(now);
            saw_anticipation |= ctl.phase() == AnimationPhase::Anticipation;
        }
        assert!(saw_anticipation);
        let extension = AnimationTiming::normal().anticipation_duration_ms;
        assert!((now - plain_end - extension).abs() <= 2.0, "{} vs {}", now, plain_end);
    }

    #[test]
    fn test_scatter_win_detected_in_stop() {
        let categories = vec![LOW, SCATTER];
        let stops = vec![vec![1, 0, 0], vec![0, 1, 0], vec![0, 0, 1]];
        let mut ctl = controller(AnimationTiming::instant(), 3, 3, categories);
        ctl.spin_with_outcome(0.0, outcome(stops));
        let events = ctl.tick(1.0);

        let wins: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                AnimationEvent::WinDetected { positions } => Some(positions.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            wins,
            vec![vec![GridPosition::new(0, 0), GridPosition::new(1, 1), GridPosition::new(2, 2)]]
        );
        let win_idx = events.iter().position(|e| matches!(e, AnimationEvent::WinDetected { .. }));
        let done_idx = events.iter().position(|e| matches!(e, AnimationEvent::SpinCompleted { .. }));
        assert!(win_idx < done_idx);
    }

    #[test]
    fn test_highlight_does_not_block_idle() {
        let categories = vec![SCATTER];
        let mut ctl = controller(AnimationTiming::normal(), 3, 3, categories);
        ctl.spin(0.0);
        let (_, end) = run_until_idle(&mut ctl, 0.0, 16.0);
        assert!(ctl.is_idle());
        assert!(ctl.highlight(end).is_some());
        ctl.tick(end + 10_000.0);
        assert!(ctl.highlight(end + 10_000.0).is_none());
    }

    #[test]
    fn test_landing_shows_outcome() {
        let stops = vec![vec![2, 1, 0], vec![0, 2, 1]];
        let mut ctl = controller(AnimationTiming::turbo(), 2, 3, vec![LOW; 3]);
        ctl.spin_with_outcome(0.0, outcome(stops.clone()));
        run_until_idle(&mut ctl, 0.0, 16.0);
        assert_eq!(ctl.grid(), stops.as_slice());
        for reel in 0..2 {
            for row in 0..3 {
                assert_eq!(ctl.displayed_symbol(reel, row as i64, 0.0), stops[reel][row]);
            }
        }
    }

    #[test]
    fn test_displayed_symbol_matches_outcome_after_last_landing() {
        let stops = vec![vec![1, 1, 1], vec![2, 2, 2]];
        let mut ctl = controller(AnimationTiming::normal(), 2, 3, vec![LOW; 3]);
        ctl.spin_with_outcome(0.0, outcome(stops.clone()));
        // Both reels landed, stop phase still running
        let landed = AnimationTiming::normal().total_spin_duration(2) + 1.0;
        ctl.tick(landed);
        assert_eq!(ctl.phase(), AnimationPhase::Stop);
        for row in 0..3 {
            assert_eq!(ctl.displayed_symbol(1, row, landed), 2);
        }
        assert_eq!(ctl.reel_position(1, landed).fract(), 0.0);
    }

    #[test]
    fn test_mismatched_outcome_falls_back() {
        let mut ctl = controller(AnimationTiming::instant(), 3, 3, vec![LOW; 2]);
        ctl.spin_with_outcome(0.0, outcome(vec![vec![0; 3]]));
        ctl.tick(1.0);
        assert_eq!(ctl.grid().len(), 3);
        assert!(ctl.grid().iter().flatten().all(|&s| s < 2));
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let mut ctl = controller(AnimationTiming::normal(), 3, 3, vec![LOW; 2]);
        ctl.spin(0.0);
        ctl.spin(10.0);
        ctl.reset();
        assert_eq!(ctl.state(), AnimationState::default());
    }
}
