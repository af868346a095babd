use crate::error::SchedError;
use crate::process::{ProcId, Process};
use regex::Regex;
use std::collections::VecDeque;
use std::fmt;

/// How one level of the feedback queue picks and runs its processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    RoundRobin { quantum: u64 },
    ShortestJobFirst,
    ShortestTimeToCompletionFirst,
}

impl Policy {
    /// Builds a policy from its short tag (`RR`, `SJF`, `STCF`).
    /// Round robin needs a positive quantum, the other two must not get one.
    pub fn from_tag(tag: &str, quantum: Option<u64>) -> Result<Policy, SchedError> {
        match (tag, quantum) {
            ("RR", Some(q)) if q > 0 => Ok(Policy::RoundRobin { quantum: q }),
            ("RR", Some(_)) => Err(SchedError::Configuration(
                "RR quantum must be positive".to_string(),
            )),
            ("RR", None) => Err(SchedError::Configuration(
                "RR needs a quantum".to_string(),
            )),
            ("SJF", None) => Ok(Policy::ShortestJobFirst),
            ("STCF", None) => Ok(Policy::ShortestTimeToCompletionFirst),
            ("SJF", Some(_)) | ("STCF", Some(_)) => Err(SchedError::Configuration(format!(
                "{} does not take a quantum",
                tag
            ))),
            _ => Err(SchedError::Configuration(format!(
                "unknown policy {}",
                tag
            ))),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Policy::RoundRobin { .. } => "RR",
            Policy::ShortestJobFirst => "SJF",
            Policy::ShortestTimeToCompletionFirst => "STCF",
        }
    }

    pub fn quantum(&self) -> Option<u64> {
        match self {
            Policy::RoundRobin { quantum } => Some(*quantum),
            _ => None,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), SchedError> {
        Policy::from_tag(self.tag(), self.quantum()).map(|_| ())
    }

    /// Round robin keeps strict arrival order, the shortest-first policies
    /// scan for the least remaining work.
    pub(crate) fn new_queue(&self) -> Box<dyn ReadyQueue> {
        match self {
            Policy::RoundRobin { .. } => Box::new(Fifo::new()),
            Policy::ShortestJobFirst | Policy::ShortestTimeToCompletionFirst => {
                Box::new(ShortestRemaining::new())
            }
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::RoundRobin { quantum } => write!(f, "RR{}", quantum),
            _ => write!(f, "{}", self.tag()),
        }
    }
}

pub trait ReadyQueue: fmt::Debug {
    fn add(&mut self, pid: ProcId);
    /// Removes and returns the process this queue would run next.
    fn next(&mut self, procs: &[Process]) -> Option<ProcId>;
    /// Queued processes in insertion order.
    fn queued(&self) -> Vec<ProcId>;

    fn len(&self) -> usize {
        self.queued().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
pub struct Fifo {
    queue: VecDeque<ProcId>,
}

impl Fifo {
    pub fn new() -> Self {
        Fifo {
            queue: VecDeque::new(),
        }
    }
}

impl ReadyQueue for Fifo {
    fn add(&mut self, pid: ProcId) {
        self.queue.push_back(pid);
    }

    fn next(&mut self, _: &[Process]) -> Option<ProcId> {
        self.queue.pop_front()
    }

    fn queued(&self) -> Vec<ProcId> {
        self.queue.iter().copied().collect()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}

#[derive(Debug, Default)]
pub struct ShortestRemaining {
    queue: VecDeque<ProcId>,
}

impl ShortestRemaining {
    pub fn new() -> Self {
        ShortestRemaining {
            queue: VecDeque::new(),
        }
    }
}

impl ReadyQueue for ShortestRemaining {
    fn add(&mut self, pid: ProcId) {
        self.queue.push_back(pid);
    }

    fn next(&mut self, procs: &[Process]) -> Option<ProcId> {
        // strict `<` so that on equal remaining time the earliest inserted wins
        let mut min_remaining = u64::MAX;
        let mut min_index = None;
        for (i, pid) in self.queue.iter().enumerate() {
            let remaining = procs[*pid].remaining_time;
            if min_index.is_none() || remaining < min_remaining {
                min_remaining = remaining;
                min_index = Some(i);
            }
        }

        let index = min_index?;
        if log::log_enabled!(log::Level::Trace) {
            let queue_string = self
                .queue
                .iter()
                .map(|pid| format!("{}:{}", procs[*pid].id, procs[*pid].remaining_time))
                .collect::<Vec<_>>()
                .join(" ");
            log::trace!(
                "\tGet: ({}) --> {}",
                queue_string,
                procs[self.queue[index]].id
            );
        }
        self.queue.remove(index)
    }

    fn queued(&self) -> Vec<ProcId> {
        self.queue.iter().copied().collect()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}

/// Named level layouts selectable from the command line.
pub fn preset(number: usize) -> Result<Vec<Policy>, SchedError> {
    use Policy::*;
    match number {
        1 => Ok(vec![
            RoundRobin { quantum: 1 },
            RoundRobin { quantum: 3 },
            RoundRobin { quantum: 4 },
            ShortestJobFirst,
        ]),
        2 => Ok(vec![
            RoundRobin { quantum: 2 },
            RoundRobin { quantum: 3 },
            RoundRobin { quantum: 4 },
            ShortestTimeToCompletionFirst,
        ]),
        3 => Ok(vec![
            RoundRobin { quantum: 3 },
            RoundRobin { quantum: 5 },
            RoundRobin { quantum: 6 },
            RoundRobin { quantum: 20 },
        ]),
        _ => Err(SchedError::Configuration(format!(
            "no preset scheme {}",
            number
        ))),
    }
}

/// Parses either a preset number (`1`, `2`, `3`) or a comma separated list
/// of levels such as `RR1,RR:3,SJF`, highest priority first.
pub fn parse_scheme(spec: &str) -> Result<Vec<Policy>, SchedError> {
    let spec = spec.trim();
    if let Ok(number) = spec.parse::<usize>() {
        return preset(number);
    }

    let re = Regex::new(r"^([A-Za-z]+):?(\d+)?$").expect("scheme token pattern");
    let mut levels = Vec::new();
    for token in spec.split(',') {
        let token = token.trim();
        let caps = re.captures(token).ok_or_else(|| {
            SchedError::Configuration(format!("cannot read level '{}'", token))
        })?;
        let tag = caps[1].to_ascii_uppercase();
        let quantum = match caps.get(2) {
            Some(m) => Some(m.as_str().parse::<u64>().map_err(|_| {
                SchedError::Configuration(format!("quantum too large in '{}'", token))
            })?),
            None => None,
        };
        levels.push(Policy::from_tag(&tag, quantum)?);
    }

    if levels.is_empty() {
        return Err(SchedError::Configuration("no levels".to_string()));
    }
    Ok(levels)
}

/// clap validator for `--scheme`.
pub fn valid_scheme(value: &str) -> Result<(), String> {
    parse_scheme(value).map(|_| ()).map_err(|e| {
        format!(
            "Invalid scheme specification: {}. {}. Must be 1, 2, 3 or a list like RR1,RR3,RR4,SJF",
            value, e
        )
    })
}
