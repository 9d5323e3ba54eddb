//! Process phase models

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::UnknownPhase;

/// Stage of a process run through the dry mill
///
/// Declaration order is the canonical processing order, so the derived `Ord`
/// compares phases by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Hulling / milling, removes parchment and impurities
    Pilado,
    /// Size classification by mesh
    Clasificacion,
    /// Density separation, two passes
    Densidad,
    /// Color sorting
    Color,
    /// Packaging into the three output categories
    Empaque,
    /// Terminal stage, reached once packaging is finalized
    #[serde(alias = "COMPLETADO")]
    Finalizado,
}

impl Phase {
    /// The five working phases in canonical order
    pub const ORDERED: [Phase; 5] = [
        Phase::Pilado,
        Phase::Clasificacion,
        Phase::Densidad,
        Phase::Color,
        Phase::Empaque,
    ];

    /// Position in canonical order; `Finalizado` sits after every working phase
    pub fn position(&self) -> usize {
        match self {
            Phase::Pilado => 0,
            Phase::Clasificacion => 1,
            Phase::Densidad => 2,
            Phase::Color => 3,
            Phase::Empaque => 4,
            Phase::Finalizado => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Pilado => "PILADO",
            Phase::Clasificacion => "CLASIFICACION",
            Phase::Densidad => "DENSIDAD",
            Phase::Color => "COLOR",
            Phase::Empaque => "EMPAQUE",
            Phase::Finalizado => "FINALIZADO",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Finalizado)
    }

    /// Phase that follows this one, `Finalizado` after `Empaque`
    pub fn next(&self) -> Phase {
        match self {
            Phase::Pilado => Phase::Clasificacion,
            Phase::Clasificacion => Phase::Densidad,
            Phase::Densidad => Phase::Color,
            Phase::Color => Phase::Empaque,
            Phase::Empaque | Phase::Finalizado => Phase::Finalizado,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = UnknownPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PILADO" => Ok(Phase::Pilado),
            "CLASIFICACION" => Ok(Phase::Clasificacion),
            "DENSIDAD" => Ok(Phase::Densidad),
            "COLOR" => Ok(Phase::Color),
            "EMPAQUE" => Ok(Phase::Empaque),
            "FINALIZADO" | "COMPLETADO" => Ok(Phase::Finalizado),
            _ => Err(UnknownPhase(s.to_string())),
        }
    }
}

/// Sub-steps of the density phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DensityPass {
    #[serde(rename = "DENSITY_PASS_1", alias = "1")]
    First,
    #[serde(rename = "DENSITY_PASS_2", alias = "2")]
    Second,
}

impl DensityPass {
    pub const ALL: [DensityPass; 2] = [DensityPass::First, DensityPass::Second];

    pub fn number(&self) -> u8 {
        match self {
            DensityPass::First => 1,
            DensityPass::Second => 2,
        }
    }
}

impl std::fmt::Display for DensityPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DensityPass::First => write!(f, "DENSITY_PASS_1"),
            DensityPass::Second => write!(f, "DENSITY_PASS_2"),
        }
    }
}

/// Set of working phases already finalized for a process
///
/// `Finalizado` is never a member, including when read from JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeSet<Phase>", into = "BTreeSet<Phase>")]
pub struct CompletedPhases(BTreeSet<Phase>);

impl CompletedPhases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from any phases; `Finalizado` is not a working phase and is dropped
    pub fn from_phases<I>(phases: I) -> Self
    where
        I: IntoIterator<Item = Phase>,
    {
        Self(phases.into_iter().filter(|p| !p.is_terminal()).collect())
    }

    /// Every phase strictly before `phase` in canonical order
    pub fn before(phase: Phase) -> Self {
        Self::from_phases(
            Phase::ORDERED
                .into_iter()
                .filter(|p| p.position() < phase.position()),
        )
    }

    pub fn contains(&self, phase: Phase) -> bool {
        self.0.contains(&phase)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Phase> + '_ {
        self.0.iter().copied()
    }

    pub(crate) fn with(&self, phase: Phase) -> Self {
        let mut next = self.0.clone();
        if !phase.is_terminal() {
            next.insert(phase);
        }
        Self(next)
    }
}

impl From<BTreeSet<Phase>> for CompletedPhases {
    fn from(phases: BTreeSet<Phase>) -> Self {
        Self::from_phases(phases)
    }
}

impl From<CompletedPhases> for BTreeSet<Phase> {
    fn from(completed: CompletedPhases) -> Self {
        completed.0
    }
}

impl FromIterator<Phase> for CompletedPhases {
    fn from_iter<I: IntoIterator<Item = Phase>>(iter: I) -> Self {
        Self::from_phases(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_wire_names() {
        assert_eq!(serde_json::to_string(&Phase::Clasificacion).unwrap(), "\"CLASIFICACION\"");
        let done: Phase = serde_json::from_str("\"COMPLETADO\"").unwrap();
        assert_eq!(done, Phase::Finalizado);
    }

    #[test]
    fn test_phase_order_matches_position() {
        for pair in Phase::ORDERED.windows(2) {
            assert!(pair[0] < pair[1]);
            assert_eq!(pair[0].position() + 1, pair[1].position());
            assert_eq!(pair[0].next(), pair[1]);
        }
        assert_eq!(Phase::Empaque.next(), Phase::Finalizado);
    }

    #[test]
    fn test_parse_phase() {
        assert_eq!("color".parse::<Phase>().unwrap(), Phase::Color);
        assert_eq!(" Empaque ".parse::<Phase>().unwrap(), Phase::Empaque);
        assert!("TOSTADO".parse::<Phase>().is_err());
    }

    #[test]
    fn test_completed_phases_drop_terminal() {
        let set = CompletedPhases::from_phases([Phase::Pilado, Phase::Finalizado]);
        assert_eq!(set.len(), 1);
        assert!(!set.contains(Phase::Finalizado));
    }

    #[test]
    fn test_deserialized_set_drops_terminal() {
        let all: CompletedPhases = serde_json::from_str(
            r#"["PILADO","CLASIFICACION","DENSIDAD","COLOR","EMPAQUE","FINALIZADO"]"#,
        )
        .unwrap();
        assert_eq!(all.len(), 5);
        assert!(!all.contains(Phase::Finalizado));

        let only_terminal: CompletedPhases = serde_json::from_str(r#"["FINALIZADO"]"#).unwrap();
        assert!(only_terminal.is_empty());
        assert_eq!(serde_json::to_value(&all).unwrap().as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_completed_before() {
        let set = CompletedPhases::before(Phase::Color);
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![Phase::Pilado, Phase::Clasificacion, Phase::Densidad]
        );
        assert_eq!(CompletedPhases::before(Phase::Finalizado).len(), 5);
    }

    #[test]
    fn test_density_pass_wire_names() {
        assert_eq!(serde_json::to_string(&DensityPass::Second).unwrap(), "\"DENSITY_PASS_2\"");
        let first: DensityPass = serde_json::from_str("\"1\"").unwrap();
        assert_eq!(first, DensityPass::First);
    }
}
