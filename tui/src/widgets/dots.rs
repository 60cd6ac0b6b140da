//! Animated pending-reply dots
//!
//! Three dots where one at a time is raised, then a rest beat with all
//! three down: four phases, advancing every [`DOTS_STEP`].

use std::time::Duration;

/// Time between animation phases
pub const DOTS_STEP: Duration = Duration::from_millis(300);

const PHASES: u128 = 4;

/// Text of the dots for the given time since the animation started
#[must_use]
pub fn dots_frame(elapsed: Duration) -> &'static str {
    match (elapsed.as_millis() / DOTS_STEP.as_millis()) % PHASES {
        0 => "•..",
        1 => ".•.",
        2 => "..•",
        _ => "...",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phases_cycle() {
        let frames: Vec<_> = (0..5)
            .map(|i| dots_frame(DOTS_STEP * i))
            .collect();
        assert_eq!(frames, vec!["•..", ".•.", "..•", "...", "•.."]);
    }

    #[test]
    fn test_phase_holds_within_step() {
        assert_eq!(dots_frame(Duration::from_millis(299)), "•..");
        assert_eq!(dots_frame(Duration::from_millis(300)), ".•.");
    }
}
