//! [`CommandVerifier`] – actuator safety interlock / rule engine.
//!
//! Before a [`RoverCommand`] is handed to the command sink, pass it through
//! [`CommandVerifier::verify`].  Every registered [`Rule`] is evaluated in
//! order; the first violation returns a [`RoverError::CommandRejected`] and
//! the command is **not** sent.
//!
//! Built-in rules:
//! - [`FiniteCommandRule`] – rejects NaN or infinite drive values.
//! - [`SteerLimitRule`] – rejects steering angles outside the rack limits.
//! - [`BrakeLimitRule`] – rejects negative or excessive brake.
//! - [`ThrottleLimitRule`] – rejects throttle outside `[-max, max]`.
//!
//! `Pickup` commands carry no values and pass every rule.

use rover_types::{RoverCommand, RoverError};

// ────────────────────────────────────────────────────────────────────────────
// Rule trait
// ────────────────────────────────────────────────────────────────────────────

/// A single actuator invariant that a command must satisfy.
pub trait Rule: Send + Sync {
    /// Human-readable name used in rejection messages.
    fn name(&self) -> &str;

    /// `Ok(())` when the command satisfies the invariant.
    fn check(&self, command: &RoverCommand) -> Result<(), RoverError>;
}

fn reject(rule: &dyn Rule, details: String) -> RoverError {
    RoverError::CommandRejected {
        rule: rule.name().to_string(),
        details,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// CommandVerifier
// ────────────────────────────────────────────────────────────────────────────

/// Rule engine validating each outgoing [`RoverCommand`].
///
/// # Example
///
/// ```
/// use rover_kernel::command_verifier::{CommandVerifier, SteerLimitRule};
/// use rover_types::RoverCommand;
///
/// let mut verifier = CommandVerifier::new();
/// verifier.add_rule(Box::new(SteerLimitRule { min_deg: -15.0, max_deg: 15.0 }));
///
/// let ok = RoverCommand::Drive { throttle: 0.8, brake: 0.0, steer: 10.0 };
/// assert!(verifier.verify(&ok).is_ok());
///
/// let hard_left = RoverCommand::Drive { throttle: 0.8, brake: 0.0, steer: 40.0 };
/// assert!(verifier.verify(&hard_left).is_err());
/// ```
#[derive(Default)]
pub struct CommandVerifier {
    rules: Vec<Box<dyn Rule>>,
}

impl CommandVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard rule set for a rover with the given limits.
    pub fn with_limits(max_throttle: f32, max_brake: f32, steer_min_deg: f32, steer_max_deg: f32) -> Self {
        let mut verifier = Self::new();
        verifier.add_rule(Box::new(FiniteCommandRule));
        verifier.add_rule(Box::new(ThrottleLimitRule { max: max_throttle }));
        verifier.add_rule(Box::new(BrakeLimitRule { max: max_brake }));
        verifier.add_rule(Box::new(SteerLimitRule {
            min_deg: steer_min_deg,
            max_deg: steer_max_deg,
        }));
        verifier
    }

    /// Register a new [`Rule`].  Rules are evaluated in insertion order.
    pub fn add_rule(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Returns the first rejection encountered, or `Ok(())`.
    pub fn verify(&self, command: &RoverCommand) -> Result<(), RoverError> {
        for rule in &self.rules {
            rule.check(command)?;
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Built-in rules
// ────────────────────────────────────────────────────────────────────────────

pub struct FiniteCommandRule;

impl Rule for FiniteCommandRule {
    fn name(&self) -> &str {
        "finite"
    }

    fn check(&self, command: &RoverCommand) -> Result<(), RoverError> {
        if let RoverCommand::Drive { throttle, brake, steer } = command {
            if !(throttle.is_finite() && brake.is_finite() && steer.is_finite()) {
                return Err(reject(
                    self,
                    format!("non-finite drive throttle={throttle} brake={brake} steer={steer}"),
                ));
            }
        }
        Ok(())
    }
}

/// Steering angle must lie in `[min_deg, max_deg]` (inclusive).
pub struct SteerLimitRule {
    pub min_deg: f32,
    pub max_deg: f32,
}

impl Rule for SteerLimitRule {
    fn name(&self) -> &str {
        "steer_limit"
    }

    fn check(&self, command: &RoverCommand) -> Result<(), RoverError> {
        if let RoverCommand::Drive { steer, .. } = command {
            if *steer < self.min_deg || *steer > self.max_deg {
                return Err(reject(
                    self,
                    format!("steer {steer} out of [{}, {}]", self.min_deg, self.max_deg),
                ));
            }
        }
        Ok(())
    }
}

/// Brake must lie in `[0, max]`.
pub struct BrakeLimitRule {
    pub max: f32,
}

impl Rule for BrakeLimitRule {
    fn name(&self) -> &str {
        "brake_limit"
    }

    fn check(&self, command: &RoverCommand) -> Result<(), RoverError> {
        if let RoverCommand::Drive { brake, .. } = command {
            if *brake < 0.0 || *brake > self.max {
                return Err(reject(self, format!("brake {brake} out of [0, {}]", self.max)));
            }
        }
        Ok(())
    }
}

/// Throttle magnitude must not exceed `max`.
pub struct ThrottleLimitRule {
    pub max: f32,
}

impl Rule for ThrottleLimitRule {
    fn name(&self) -> &str {
        "throttle_limit"
    }

    fn check(&self, command: &RoverCommand) -> Result<(), RoverError> {
        if let RoverCommand::Drive { throttle, .. } = command {
            if throttle.abs() > self.max {
                return Err(reject(self, format!("throttle {throttle} exceeds {}", self.max)));
            }
        }
        Ok(())
    }
}
