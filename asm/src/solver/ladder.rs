//! Escalation policy across solver attempts.
//!
//! `Attempting(rung) -> Success | Attempting(next rung) | Exhausted`.
//! Bounded rungs raise the padding bound one step at a time up to the
//! ceiling; the last resort uses a wide bound and its own budget. A bound
//! already proven unsatisfiable is never attempted again.

use crate::config::Config;
use itertools::Itertools;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rung {
    pub buffer: u32,
    pub timeout: Option<Duration>,
    pub last_resort: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Solved,
    Unsatisfiable,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Attempting(Rung),
    Success,
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptRecord {
    pub rung: Rung,
    pub verdict: Verdict,
}

impl fmt::Display for AttemptRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = match self.verdict {
            Verdict::Solved => "solved",
            Verdict::Unsatisfiable => "unsatisfiable",
            Verdict::TimedOut => "timed out",
        };
        match self.rung.timeout {
            Some(t) => write!(f, "buffer {} / {} ms: {}", self.rung.buffer, t.as_millis(), verdict),
            None => write!(f, "buffer {} / no limit: {}", self.rung.buffer, verdict),
        }
    }
}

/// History of a ladder run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attempts(pub Vec<AttemptRecord>);

impl fmt::Display for Attempts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "no attempt made");
        }
        write!(f, "{}", self.0.iter().join(", "))
    }
}

#[derive(Debug, Clone)]
pub struct Ladder {
    state: State,
    ceiling: u32,
    timeout: Option<Duration>,
    last_resort: Rung,
    history: Attempts,
}

impl Ladder {
    pub fn new(config: &Config) -> Self {
        let last_resort = Rung {
            buffer: config.final_buffer,
            timeout: config.final_timeout(),
            last_resort: true,
        };
        let first = if config.buffer <= config.buffer_ceiling {
            Rung {
                buffer: config.buffer,
                timeout: config.timeout(),
                last_resort: false,
            }
        } else {
            last_resort
        };
        Self {
            state: State::Attempting(first),
            ceiling: config.buffer_ceiling,
            timeout: config.timeout(),
            last_resort,
            history: Attempts::default(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn history(&self) -> &Attempts {
        &self.history
    }

    pub fn into_history(self) -> Attempts {
        self.history
    }

    fn proven_unsat(&self, buffer: u32) -> bool {
        self.history
            .0
            .iter()
            .any(|a| a.verdict == Verdict::Unsatisfiable && a.rung.buffer == buffer)
    }

    /// Record the verdict of the current attempt and move on.
    pub fn record(&mut self, verdict: Verdict) -> State {
        let State::Attempting(rung) = self.state else {
            return self.state;
        };
        self.history.0.push(AttemptRecord { rung, verdict });

        self.state = match verdict {
            Verdict::Solved => State::Success,
            _ if rung.last_resort => State::Exhausted,
            _ if rung.buffer < self.ceiling => State::Attempting(Rung {
                buffer: rung.buffer + 1,
                timeout: self.timeout,
                last_resort: false,
            }),
            _ if self.proven_unsat(self.last_resort.buffer) => State::Exhausted,
            _ => State::Attempting(self.last_resort),
        };
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffers(config: &Config, verdicts: &[Verdict]) -> (Vec<u32>, State) {
        let mut ladder = Ladder::new(config);
        for verdict in verdicts {
            ladder.record(*verdict);
        }
        let tried = ladder.history().0.iter().map(|a| a.rung.buffer).collect();
        (tried, ladder.state())
    }

    #[test]
    fn default_ladder_climbs_then_falls_back() {
        let config = Config::default();
        let fail = [Verdict::TimedOut; 5];
        let (tried, state) = buffers(&config, &fail);
        assert_eq!(tried, vec![1, 2, 3, 4, 14]);
        assert_eq!(state, State::Exhausted);

        let mut ladder = Ladder::new(&config);
        for _ in 0..4 {
            ladder.record(Verdict::Unsatisfiable);
        }
        assert_eq!(
            ladder.state(),
            State::Attempting(Rung {
                buffer: 14,
                timeout: None,
                last_resort: true
            })
        );
    }

    #[test]
    fn success_stops_the_ladder() {
        let (tried, state) = buffers(&Config::default(), &[Verdict::TimedOut, Verdict::Solved]);
        assert_eq!(tried, vec![1, 2]);
        assert_eq!(state, State::Success);
    }

    #[test]
    fn proven_bound_is_not_retried() {
        let config = Config {
            buffer: 0,
            buffer_ceiling: 2,
            final_buffer: 2,
            ..Config::default()
        };
        let (tried, state) = buffers(&config, &[Verdict::Unsatisfiable; 3]);
        assert_eq!(tried, vec![0, 1, 2]);
        assert_eq!(state, State::Exhausted);

        // A timed-out bound still deserves the unlimited retry.
        let (tried, state) = buffers(
            &config,
            &[Verdict::Unsatisfiable, Verdict::Unsatisfiable, Verdict::TimedOut],
        );
        assert_eq!(tried, vec![0, 1, 2]);
        assert!(matches!(state, State::Attempting(r) if r.last_resort && r.buffer == 2));
    }

    #[test]
    fn attempts_read_well() {
        let attempts = Attempts(vec![AttemptRecord {
            rung: Rung {
                buffer: 1,
                timeout: Some(Duration::from_millis(2000)),
                last_resort: false,
            },
            verdict: Verdict::TimedOut,
        }]);
        assert_eq!(attempts.to_string(), "buffer 1 / 2000 ms: timed out");
    }
}
