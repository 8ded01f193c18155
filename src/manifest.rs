//! Per-compile diagnostics: statistics and the prompt manifest.
//!
//! DESIGN DECISION: the manifest is a pure diagnostic, never consulted by
//! the assembler
//! WHY: keeps "what got dropped and why" fully separate from "what the
//! prompt text is" — a caller can discard the manifest with zero effect on
//! the emitted prompt.

use crate::error::DropStage;
use crate::resolver::{OrderedAtom, RenderMode};

/// An atom dropped at some stage of the pipeline, with a human-readable
/// reason. Purely diagnostic.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DroppedAtom {
    pub atom_id: String,
    pub stage: DropStage,
    pub reason: String,
}

/// A record of one admitted atom: its final position, category, render
/// mode, and score.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AdmittedAtom {
    pub atom_id: String,
    pub category: String,
    pub render_mode: RenderModeDto,
    pub score: f64,
}

/// Serializable mirror of [`RenderMode`] (manifest/stats cross the FFI
/// boundary as plain data; `RenderMode` itself stays an internal enum).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum RenderModeDto {
    Standard,
    Concise,
    Min,
}

impl From<RenderMode> for RenderModeDto {
    fn from(mode: RenderMode) -> Self {
        match mode {
            RenderMode::Standard => RenderModeDto::Standard,
            RenderMode::Concise => RenderModeDto::Concise,
            RenderMode::Min => RenderModeDto::Min,
        }
    }
}

/// Per-compile diagnostic counters and timings.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CompilationStats {
    /// Unique identity for this compile run, for correlating stats with
    /// logs/traces emitted during the same call.
    pub compile_id: uuid::Uuid,
    pub compiled_at: chrono::DateTime<chrono::Utc>,
    pub wall_duration_ms: u64,
    pub atoms_in_skeleton: usize,
    pub atoms_in_flesh: usize,
    pub atoms_selected: usize,
    pub tokens_used: usize,
    pub tokens_available: usize,
    pub budget_utilization: f64,
    pub phase_timings_ms: PhaseTimings,
}

impl Default for CompilationStats {
    fn default() -> Self {
        CompilationStats {
            compile_id: uuid::Uuid::nil(),
            compiled_at: chrono::DateTime::<chrono::Utc>::from_timestamp(0, 0).unwrap(),
            wall_duration_ms: 0,
            atoms_in_skeleton: 0,
            atoms_in_flesh: 0,
            atoms_selected: 0,
            tokens_used: 0,
            tokens_available: 0,
            budget_utilization: 0.0,
            phase_timings_ms: PhaseTimings::default(),
        }
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct PhaseTimings {
    pub select_ms: u64,
    pub resolve_ms: u64,
    pub budget_ms: u64,
    pub assemble_ms: u64,
}

impl CompilationStats {
    pub fn compute_utilization(&mut self) {
        self.budget_utilization = if self.tokens_available == 0 {
            0.0
        } else {
            self.tokens_used as f64 / self.tokens_available as f64
        };
    }
}

/// Per-compile admitted/dropped record. Never affects the prompt text.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct PromptManifest {
    pub admitted: Vec<AdmittedAtom>,
    pub dropped: Vec<DroppedAtom>,
}

impl PromptManifest {
    pub fn from_ordered(ordered: &[OrderedAtom]) -> Vec<AdmittedAtom> {
        ordered
            .iter()
            .map(|o| AdmittedAtom {
                atom_id: o.atom.id().to_string(),
                category: o.atom.category().as_str().to_string(),
                render_mode: o.render_mode.into(),
                score: o.score,
            })
            .collect()
    }
}
