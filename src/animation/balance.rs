//! Count-up animation for balance displays.
//!
//! A [`BalanceAnimation`] is a lazy, finite iterator: every `next()` is one
//! frame. Values are computed with integer arithmetic as
//! `floor(target * k / steps)` for frame `k`, so the last frame lands exactly on
//! the target with no float overshoot and the sequence never decreases.

#![allow(missing_docs)]

use std::iter::FusedIterator;

/// Default number of frames a count-up takes.
pub const DEFAULT_STEPS: u32 = 50;

/// Displayed value against its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceProgress {
    pub displayed: u64,
    pub target: u64,
}

/// Factory for count-up animations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceAnimator {
    steps: u32,
}

impl BalanceAnimator {
    /// `steps` below 1 is treated as 1.
    #[must_use]
    pub fn new(steps: u32) -> Self {
        Self {
            steps: steps.max(1),
        }
    }

    #[must_use]
    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Start a count-up from zero to `target`.
    #[must_use]
    pub fn animate(&self, target: u64) -> BalanceAnimation {
        animate(target, self.steps)
    }
}

impl Default for BalanceAnimator {
    fn default() -> Self {
        Self::new(DEFAULT_STEPS)
    }
}

/// Count from zero to `target` in at most `steps` frames.
#[must_use]
pub fn animate(target: u64, steps: u32) -> BalanceAnimation {
    BalanceAnimation {
        target,
        steps: steps.max(1),
        frame: 0,
        displayed: 0,
        done: false,
    }
}

/// In-flight count-up. Not restartable; start a new one instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceAnimation {
    target: u64,
    steps: u32,
    frame: u32,
    displayed: u64,
    done: bool,
}

impl BalanceAnimation {
    #[must_use]
    pub fn progress(&self) -> BalanceProgress {
        BalanceProgress {
            displayed: self.displayed,
            target: self.target,
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.done
    }

    /// Frames emitted so far.
    #[must_use]
    pub fn frames(&self) -> u32 {
        self.frame
    }
}

impl Iterator for BalanceAnimation {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.done {
            return None;
        }
        self.frame += 1;
        let value = if self.frame >= self.steps {
            self.target
        } else {
            let scaled =
                u128::from(self.target) * u128::from(self.frame) / u128::from(self.steps);
            u64::try_from(scaled).unwrap_or(self.target).min(self.target)
        };
        self.displayed = value.max(self.displayed);
        if self.displayed == self.target {
            self.done = true;
        }
        Some(self.displayed)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        let remaining = (self.steps - self.frame) as usize;
        (1, Some(remaining))
    }
}

impl FusedIterator for BalanceAnimation {}

/// Render an integer with comma thousands separators: `2004` → `"2,004"`.
#[must_use]
pub fn format_grouped(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_count_up_ends_on_target() {
        let values: Vec<u64> = animate(1_337, DEFAULT_STEPS).collect();
        assert_eq!(values.len(), 50);
        assert_eq!(values.last(), Some(&1_337));
        assert_eq!(values[0], 26);
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        assert!(values.iter().all(|v| *v <= 1_337));
    }

    #[test]
    fn small_target_finishes_early() {
        // floor(1 * k / 50) stays 0 until the last frame.
        let values: Vec<u64> = animate(1, 50).collect();
        assert_eq!(values.len(), 50);
        assert_eq!(values.last(), Some(&1));

        let zero: Vec<u64> = animate(0, 50).collect();
        assert_eq!(zero, vec![0]);
    }

    #[test]
    fn single_step_jumps_to_target() {
        assert_eq!(animate(2_004, 1).collect::<Vec<_>>(), vec![2_004]);
        assert_eq!(animate(2_004, 0).collect::<Vec<_>>(), vec![2_004]);
    }

    #[test]
    fn huge_target_does_not_overflow() {
        let last = animate(u64::MAX, 7).last();
        assert_eq!(last, Some(u64::MAX));
    }

    #[test]
    fn progress_tracks_displayed_value() {
        let mut anim = BalanceAnimator::new(4).animate(100);
        assert_eq!(anim.next(), Some(25));
        assert_eq!(
            anim.progress(),
            BalanceProgress {
                displayed: 25,
                target: 100
            }
        );
        assert!(!anim.is_finished());
        assert_eq!(anim.by_ref().count(), 3);
        assert!(anim.is_finished());
        assert_eq!(anim.next(), None);
        assert_eq!(anim.frames(), 4);
    }

    #[test]
    fn grouping_matches_locale_style() {
        assert_eq!(format_grouped(0), "0");
        assert_eq!(format_grouped(999), "999");
        assert_eq!(format_grouped(1_337), "1,337");
        assert_eq!(format_grouped(2_004), "2,004");
        assert_eq!(format_grouped(1_000_000), "1,000,000");
    }
}
