// src/forecast_message.rs
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::fmt;

/// Outcome of comparing the year-end prediction with the employee's target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ForecastMessage {
    /// Prediction meets or exceeds the target.
    OnTrack,
    /// Prediction falls short; `deficit` is whole percentage points.
    Behind { deficit: Decimal },
}

impl ForecastMessage {
    pub fn is_success(&self) -> bool {
        matches!(self, ForecastMessage::OnTrack)
    }
}

impl fmt::Display for ForecastMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForecastMessage::OnTrack => write!(f, "You're on track to meet your utilization!"),
            ForecastMessage::Behind { deficit } => {
                write!(f, "You're on track to miss your target by {}%", deficit)
            }
        }
    }
}

/// Compares predicted utilization with a target, both in percent.
///
/// A target of 0 means no target was set and yields no message. A prediction
/// exactly on target counts as on track.
pub fn evaluate(predicted_percent: Decimal, target_percent: u32) -> Option<ForecastMessage> {
    if target_percent == 0 {
        return None;
    }
    let target = Decimal::from(target_percent);
    if predicted_percent >= target {
        Some(ForecastMessage::OnTrack)
    } else {
        let deficit = (target - predicted_percent)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven);
        Some(ForecastMessage::Behind { deficit })
    }
}
