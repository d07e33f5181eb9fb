// ─────────────────────────────────────────────────────────────────────
// MoBa Core — Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_FIELD_STRENGTH;
use crate::error::{MobaError, MobaResult};

/// How the Bloch equations are solved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SimulationType {
    /// Adaptive Dormand-Prince integration of the full equations, including
    /// relaxation during RF pulses.
    #[default]
    Ode,
    /// Hard-pulse approximation: instantaneous rotations at the pulse
    /// centre, exact relaxation in between.
    Rotation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SequenceType {
    Bssfp,
    #[default]
    IrBssfp,
    Flash,
    IrFlash,
}

impl SequenceType {
    pub fn has_inversion(self) -> bool {
        matches!(self, SequenceType::IrBssfp | SequenceType::IrFlash)
    }

    pub fn is_balanced(self) -> bool {
        matches!(self, SequenceType::Bssfp | SequenceType::IrBssfp)
    }
}

/// Sequence timing (seconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeqConfig {
    #[serde(default)]
    pub sim_type: SimulationType,
    #[serde(default)]
    pub seq_type: SequenceType,
    /// Repetition time (default: 0.0045)
    #[serde(default = "default_tr")]
    pub tr: f64,
    /// Echo time measured from the start of each repetition (default: 0.00225)
    #[serde(default = "default_te")]
    pub te: f64,
    /// Number of repetitions, i.e. signal samples (default: 1)
    #[serde(default = "default_rep_num")]
    pub rep_num: usize,
    /// Duration of the inversion block (default: 0.01)
    #[serde(default = "default_inversion_pulse_length")]
    pub inversion_pulse_length: f64,
    /// Spoiler delay after the inversion, transverse signal destroyed (default: 0)
    #[serde(default)]
    pub inversion_spoiler: f64,
    /// Duration of the α/2 preparation block of balanced sequences (default: 0.001)
    #[serde(default = "default_prep_pulse_length")]
    pub prep_pulse_length: f64,
    /// Replace the adiabatic inversion by an instantaneous Mz → -Mz flip
    #[serde(default)]
    pub perfect_inversion: bool,
}

fn default_tr() -> f64 {
    0.0045
}
fn default_te() -> f64 {
    0.00225
}
fn default_rep_num() -> usize {
    1
}
fn default_inversion_pulse_length() -> f64 {
    0.01
}
fn default_prep_pulse_length() -> f64 {
    0.001
}

impl Default for SeqConfig {
    fn default() -> Self {
        SeqConfig {
            sim_type: SimulationType::default(),
            seq_type: SequenceType::default(),
            tr: default_tr(),
            te: default_te(),
            rep_num: default_rep_num(),
            inversion_pulse_length: default_inversion_pulse_length(),
            inversion_spoiler: 0.0,
            prep_pulse_length: default_prep_pulse_length(),
            perfect_inversion: false,
        }
    }
}

impl SeqConfig {
    pub fn with_sim_type(mut self, sim_type: SimulationType) -> Self {
        self.sim_type = sim_type;
        self
    }

    pub fn with_seq_type(mut self, seq_type: SequenceType) -> Self {
        self.seq_type = seq_type;
        self
    }

    pub fn with_perfect_inversion(mut self, perfect: bool) -> Self {
        self.perfect_inversion = perfect;
        self
    }

    pub fn with_timing(mut self, tr: f64, te: f64) -> Self {
        self.tr = tr;
        self.te = te;
        self
    }

    pub fn with_rep_num(mut self, rep_num: usize) -> Self {
        self.rep_num = rep_num;
        self
    }
}

/// Hamming-windowed sinc excitation pulse.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SincPulse {
    /// Nominal flip angle in degrees (default: 45)
    pub flip_angle: f64,
    /// Pulse duration in seconds (default: 0.001)
    pub duration: f64,
    /// RF phase in radians (default: 0)
    pub phase: f64,
    /// Time-bandwidth product (default: 4)
    pub bwtp: f64,
    /// Window parameter, 0.46 gives a Hamming window (default: 0.46)
    pub alpha: f64,
}

impl Default for SincPulse {
    fn default() -> Self {
        SincPulse {
            flip_angle: 45.0,
            duration: 0.001,
            phase: 0.0,
            bwtp: 4.0,
            alpha: 0.46,
        }
    }
}

/// Hyperbolic-secant adiabatic inversion pulse.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct HypSecPulse {
    /// Peak amplitude in rad/s (default: 13000)
    pub a0: f64,
    /// Modulation angular frequency in rad/s (default: 800)
    pub beta: f64,
    /// Dimensionless sweep parameter (default: 4.9)
    pub mu: f64,
    /// Pulse duration in seconds (default: 0.01)
    pub duration: f64,
}

impl Default for HypSecPulse {
    fn default() -> Self {
        HypSecPulse {
            a0: 13000.0,
            beta: 800.0,
            mu: 4.9,
            duration: 0.01,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    pub sinc: SincPulse,
    pub hs: HypSecPulse,
}

/// Default tissue and voxel geometry for simulations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct VoxelConfig {
    /// Longitudinal relaxation rate in 1/s (default: 1.0)
    pub r1: f64,
    /// Transverse relaxation rate in 1/s (default: 10.0)
    pub r2: f64,
    /// Equilibrium magnetization (default: 1.0)
    pub m0: f64,
    /// Off-resonance in rad/s (default: 0)
    pub w: f64,
    /// Relative transmit field (default: 1.0)
    pub b1: f64,
    /// Isochromats across the slice (default: 1)
    pub spin_num: usize,
    /// Slice thickness in metres covered by the isochromats (default: 0.005)
    pub slice_thickness: f64,
}

impl Default for VoxelConfig {
    fn default() -> Self {
        VoxelConfig {
            r1: 1.0,
            r2: 10.0,
            m0: 1.0,
            w: 0.0,
            b1: 1.0,
            spin_num: 1,
            slice_thickness: 0.005,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GradConfig {
    /// Slice-select gradient active during excitation, T/m (default: 0)
    pub slice_select: f64,
}

/// Numerical settings of the Bloch solver.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Relative/absolute local error tolerance of the adaptive ODE solver (default: 1e-6)
    pub ode_tol: f64,
    /// Step budget per integration interval (default: 100000)
    pub max_steps: usize,
    /// Samples per second used to integrate pulse shapes (default: 1e6)
    pub sampling_rate: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            ode_tol: 1e-6,
            max_steps: 100_000,
            sampling_rate: 1e6,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub seq: SeqConfig,
    pub voxel: VoxelConfig,
    pub pulse: PulseConfig,
    pub grad: GradConfig,
    pub solver: SolverConfig,
}

/// Model-level options that are not part of the physical simulation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelOtherConfig {
    /// Sobolev weight `a` of the B0 field smoothing (default: 222)
    pub fb0_a: f64,
    /// Sobolev exponent `b` of the B0 field smoothing (default: 32)
    pub fb0_b: f64,
    /// Parameter scaling of the Bloch model [R1, M0, R2, B1] (default: ones)
    pub scale: [f64; 4],
    /// Main field strength in T, used by the fat spectrum (default: 3.0)
    pub field_strength: f64,
}

impl Default for ModelOtherConfig {
    fn default() -> Self {
        ModelOtherConfig {
            fb0_a: 222.0,
            fb0_b: 32.0,
            scale: [1.0; 4],
            field_strength: DEFAULT_FIELD_STRENGTH,
        }
    }
}

/// Complete configuration handed to the model constructors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MobaConfig {
    pub sim: SimConfig,
    pub other: ModelOtherConfig,
}

impl MobaConfig {
    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_file(path: &str) -> MobaResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_seq(mut self, seq: SeqConfig) -> Self {
        self.sim.seq = seq;
        self
    }

    pub fn with_voxel(mut self, voxel: VoxelConfig) -> Self {
        self.sim.voxel = voxel;
        self
    }

    pub fn with_pulse(mut self, pulse: PulseConfig) -> Self {
        self.sim.pulse = pulse;
        self
    }

    pub fn with_grad(mut self, grad: GradConfig) -> Self {
        self.sim.grad = grad;
        self
    }

    pub fn with_solver(mut self, solver: SolverConfig) -> Self {
        self.sim.solver = solver;
        self
    }

    pub fn with_other(mut self, other: ModelOtherConfig) -> Self {
        self.other = other;
        self
    }

    pub fn validate(&self) -> MobaResult<()> {
        self.sim.validate()?;
        if self.other.scale.iter().any(|s| !s.is_finite() || *s == 0.0) {
            return Err(MobaError::ConfigError(
                "other.scale entries must be finite and non-zero".to_string(),
            ));
        }
        if !(self.other.field_strength.is_finite() && self.other.field_strength > 0.0) {
            return Err(MobaError::ConfigError(
                "other.field_strength must be finite and > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn positive(name: &str, v: f64) -> MobaResult<()> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(MobaError::ConfigError(format!(
            "{name} must be finite and > 0, got {v}"
        )))
    }
}

impl SimConfig {
    pub fn validate(&self) -> MobaResult<()> {
        let seq = &self.seq;
        let sinc = &self.pulse.sinc;

        positive("seq.tr", seq.tr)?;
        positive("pulse.sinc.duration", sinc.duration)?;
        positive("pulse.sinc.bwtp", sinc.bwtp)?;
        positive("solver.ode_tol", self.solver.ode_tol)?;
        positive("solver.sampling_rate", self.solver.sampling_rate)?;

        if seq.rep_num == 0 {
            return Err(MobaError::ConfigError(
                "seq.rep_num must be >= 1".to_string(),
            ));
        }
        if !(seq.te >= sinc.duration && seq.te <= seq.tr) {
            return Err(MobaError::ConfigError(format!(
                "seq.te must lie in [pulse duration, tr] = [{}, {}], got {}",
                sinc.duration, seq.tr, seq.te
            )));
        }
        if seq.seq_type.is_balanced() && seq.prep_pulse_length < sinc.duration {
            return Err(MobaError::ConfigError(
                "seq.prep_pulse_length must cover the α/2 pulse".to_string(),
            ));
        }
        if seq.seq_type.has_inversion() {
            if !(seq.inversion_pulse_length.is_finite() && seq.inversion_pulse_length >= 0.0) {
                return Err(MobaError::ConfigError(
                    "seq.inversion_pulse_length must be finite and >= 0".to_string(),
                ));
            }
            if !seq.perfect_inversion {
                positive("pulse.hs.duration", self.pulse.hs.duration)?;
                if self.pulse.hs.duration > seq.inversion_pulse_length {
                    return Err(MobaError::ConfigError(
                        "pulse.hs.duration must not exceed seq.inversion_pulse_length"
                            .to_string(),
                    ));
                }
            }
        }
        if !(seq.inversion_spoiler.is_finite() && seq.inversion_spoiler >= 0.0) {
            return Err(MobaError::ConfigError(
                "seq.inversion_spoiler must be finite and >= 0".to_string(),
            ));
        }
        if self.voxel.spin_num == 0 {
            return Err(MobaError::ConfigError(
                "voxel.spin_num must be >= 1".to_string(),
            ));
        }
        if self.solver.max_steps == 0 {
            return Err(MobaError::ConfigError(
                "solver.max_steps must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let cfg = MobaConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.sim.seq.sim_type, SimulationType::Ode);
        assert_eq!(cfg.sim.seq.seq_type, SequenceType::IrBssfp);
        assert!(!cfg.sim.seq.perfect_inversion);
        assert!((cfg.sim.pulse.hs.a0 - 13000.0).abs() < 1e-12);
        assert!((cfg.other.fb0_a - 222.0).abs() < 1e-12);
        assert!((cfg.other.fb0_b - 32.0).abs() < 1e-12);
    }

    #[test]
    fn test_builders_override_flags() {
        let seq = SeqConfig::default()
            .with_perfect_inversion(true)
            .with_sim_type(SimulationType::Rotation)
            .with_rep_num(500);
        let cfg = MobaConfig::default().with_seq(seq);
        assert!(cfg.sim.seq.perfect_inversion);
        assert_eq!(cfg.sim.seq.sim_type, SimulationType::Rotation);
        assert_eq!(cfg.sim.seq.rep_num, 500);
        // untouched defaults survive
        assert!((cfg.sim.seq.tr - 0.0045).abs() < 1e-15);
    }

    #[test]
    fn test_validate_rejects_bad_timing() {
        let seq = SeqConfig::default().with_timing(0.004, 0.005);
        assert!(MobaConfig::default().with_seq(seq).validate().is_err());

        let seq = SeqConfig::default().with_timing(-1.0, 0.002);
        assert!(MobaConfig::default().with_seq(seq).validate().is_err());

        let seq = SeqConfig::default().with_rep_num(0);
        assert!(MobaConfig::default().with_seq(seq).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_scale() {
        let other = ModelOtherConfig {
            scale: [1.0, 0.0, 1.0, 1.0],
            ..ModelOtherConfig::default()
        };
        assert!(MobaConfig::default().with_other(other).validate().is_err());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let json = r#"{ "sim": { "seq": { "seq_type": "ir-flash", "perfect_inversion": true } } }"#;
        let cfg: MobaConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.sim.seq.seq_type, SequenceType::IrFlash);
        assert!(cfg.sim.seq.perfect_inversion);
        assert!((cfg.sim.seq.te - 0.00225).abs() < 1e-15);
        assert!((cfg.sim.pulse.sinc.flip_angle - 45.0).abs() < 1e-12);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_roundtrip_serialization() {
        let cfg = MobaConfig::default().with_seq(SeqConfig::default().with_rep_num(42));
        let json = serde_json::to_string_pretty(&cfg).unwrap();
        let cfg2: MobaConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg2.sim.seq.rep_num, 42);
        assert_eq!(cfg2.sim.seq.seq_type, cfg.sim.seq.seq_type);
    }

    #[test]
    fn test_from_file_missing_is_io_error() {
        let err = MobaConfig::from_file("/nonexistent/moba.json").unwrap_err();
        assert!(matches!(err, MobaError::Io(_)));
    }
}
