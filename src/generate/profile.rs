//! Machine behaviour over a production day

use rand::Rng;

/// Minutes after local midnight
pub type MinuteOfDay = u32;

/// Machine state as published on `state/state_code`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    /// Powered down
    Stopped,
    /// Producing parts
    Run,
    /// Powered but not producing
    Idle,
    /// Faulted
    Fault,
}

impl MachineState {
    /// Numeric code used in payloads
    pub fn code(self) -> u8 {
        match self {
            Self::Stopped => 0,
            Self::Run => 2,
            Self::Idle => 3,
            Self::Fault => 4,
        }
    }

    /// Whether parts are being produced
    pub fn is_running(self) -> bool {
        self == Self::Run
    }

    /// Mean and standard deviation of motor current, in amps
    pub fn motor_current(self) -> (f64, f64) {
        match self {
            Self::Run => (10.0, 0.6),
            Self::Idle => (1.2, 0.2),
            Self::Fault => (0.3, 0.1),
            Self::Stopped => (0.2, 0.1),
        }
    }
}

/// Planned idle windows, `[start, end)`
const PLANNED_IDLE: &[(MinuteOfDay, MinuteOfDay)] =
    &[(13 * 60, 13 * 60 + 30), (20 * 60, 20 * 60 + 15)];

/// Short faults as (start, duration in minutes)
const FAULTS: &[(MinuteOfDay, MinuteOfDay)] = &[(10 * 60 + 15, 3), (19 * 60 + 40, 4)];

/// Draw the unplanned state for a minute of the day.
///
/// Night shift is mostly stopped, day shift mostly running, late evening a
/// coin toss between running and idle.
pub fn random_state<R: Rng + ?Sized>(minute: MinuteOfDay, rng: &mut R) -> MachineState {
    let draw: f64 = rng.random();
    match minute {
        0..=359 => {
            if draw < 0.9 {
                MachineState::Stopped
            } else {
                MachineState::Idle
            }
        }
        360..=1319 => {
            if draw < 0.9 {
                MachineState::Run
            } else {
                MachineState::Idle
            }
        }
        _ => {
            if draw < 0.5 {
                MachineState::Run
            } else {
                MachineState::Idle
            }
        }
    }
}

/// Apply planned idle windows, then faults, on top of a drawn state
pub fn scheduled_state(minute: MinuteOfDay, drawn: MachineState) -> MachineState {
    if FAULTS
        .iter()
        .any(|(start, duration)| (*start..start + duration).contains(&minute))
    {
        return MachineState::Fault;
    }

    if PLANNED_IDLE
        .iter()
        .any(|(start, end)| (*start..*end).contains(&minute))
    {
        return MachineState::Idle;
    }

    drawn
}
