//! Delay recalibration after a resolution change

use crate::{
    descriptor::MAX_DELAY_STEPS,
    error::{ConnectionError, Result},
    time::StepConverter,
};

/// Convert a delay to the new resolution.
///
/// A delay can never be zero steps, so results below one step become one.
pub fn recalibrate_delay(old_steps: i64, converter: &dyn StepConverter) -> Result<u32> {
    let steps = converter.from_old_steps(old_steps);
    if steps > MAX_DELAY_STEPS {
        return Err(ConnectionError::configuration(format!(
            "delay of {} steps becomes {} steps, above the maximum of {}",
            old_steps, steps, MAX_DELAY_STEPS
        )));
    }
    Ok(steps.max(1) as u32)
}
