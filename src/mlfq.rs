use crate::error::SchedError;
use crate::process::{ProcId, Process, ProcessDescriptor};
use crate::schedulers::{Policy, ReadyQueue};
use log::{debug, info, trace};
use std::collections::VecDeque;
use std::fmt;

/// One execution slice: `id` ran on the CPU from `start` to `end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    pub start: u64,
    pub end: u64,
    pub id: String,
}

impl Interval {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {} {}", self.start, self.end, self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Averages {
    pub waiting: f64,
    pub completion: f64,
    pub response: f64,
    pub turnaround: f64,
}

#[derive(Debug)]
struct Level {
    policy: Policy,
    queue: Box<dyn ReadyQueue>,
}

/// Multilevel feedback queue engine.
///
/// Processes live in an arena and every container (arrivals, level queues,
/// completed list) holds arena indices, so a process sits in exactly one of
/// them at any time.
#[derive(Debug)]
pub struct Mlfq {
    levels: Vec<Level>,
    procs: Vec<Process>,
    // sorted by arrival time, stable
    arrivals: VecDeque<ProcId>,
    clock: u64,
    // latest time the submitted work can finish
    horizon: u64,
    completed: Vec<ProcId>,
    timeline: Vec<Interval>,
}

impl Mlfq {
    /// `policies[0]` is the highest priority level.
    pub fn new(policies: Vec<Policy>) -> Result<Self, SchedError> {
        if policies.is_empty() {
            return Err(SchedError::Configuration("no levels".to_string()));
        }
        let mut levels = Vec::with_capacity(policies.len());
        for policy in policies {
            policy.validate()?;
            levels.push(Level {
                policy,
                queue: policy.new_queue(),
            });
        }

        Ok(Mlfq {
            levels,
            procs: Vec::new(),
            arrivals: VecDeque::new(),
            clock: 0,
            horizon: 0,
            completed: Vec::new(),
            timeline: Vec::new(),
        })
    }

    pub fn submit(&mut self, desc: ProcessDescriptor) -> Result<ProcId, SchedError> {
        if desc.burst_time == 0 {
            return Err(SchedError::InvalidBurst { id: desc.id });
        }
        if desc.queue_level >= self.levels.len() {
            return Err(SchedError::OutOfRangeLevel {
                id: desc.id,
                level: desc.queue_level,
                levels: self.levels.len(),
            });
        }

        // The CPU never idles while work is queued, so every slice ends by
        // max(previous horizon, arrival) + burst.
        let horizon = self
            .horizon
            .max(self.clock)
            .max(desc.arrival_time)
            .checked_add(desc.burst_time)
            .ok_or_else(|| SchedError::TimeOverflow { id: desc.id.clone() })?;
        self.horizon = horizon;

        let pid = self.procs.len();
        self.procs.push(Process::new(desc));
        let process = &self.procs[pid];

        if process.arrival_time > self.clock {
            // after every entry arriving at or before it
            let at = process.arrival_time;
            let pos = self
                .arrivals
                .iter()
                .position(|other| self.procs[*other].arrival_time > at)
                .unwrap_or(self.arrivals.len());
            self.arrivals.insert(pos, pid);
            trace!("{}: {} pending until {}", self.clock, process.id, at);
        } else {
            self.levels[process.queue_level].queue.add(pid);
            trace!(
                "{}: {} ready on level {}",
                self.clock,
                process.id,
                process.queue_level
            );
        }
        Ok(pid)
    }

    /// Takes the next process out of the highest non-empty level.
    pub fn select_next(&mut self) -> Option<(usize, ProcId)> {
        for (index, level) in self.levels.iter_mut().enumerate() {
            if let Some(pid) = level.queue.next(&self.procs) {
                return Some((index, pid));
            }
        }
        None
    }

    pub fn is_done(&self) -> bool {
        self.arrivals.is_empty() && self.levels.iter().all(|level| level.queue.is_empty())
    }

    /// One iteration of the simulation loop. Returns the slice it ran, or
    /// `None` when the CPU idled until the next arrival (or nothing is left).
    pub fn step(&mut self) -> Option<Interval> {
        if self.is_done() {
            return None;
        }

        self.admit_arrivals();

        let (level, pid) = match self.select_next() {
            Some(next) => next,
            None => {
                // nothing ready: jump straight to the next arrival
                if let Some(next) = self.arrivals.front() {
                    let at = self.procs[*next].arrival_time;
                    trace!("{}: idle until {}", self.clock, at);
                    self.clock = at;
                }
                return None;
            }
        };

        let policy = self.levels[level].policy;
        let next_arrival = self
            .arrivals
            .front()
            .map(|next| self.procs[*next].arrival_time);
        let clock = self.clock;

        let process = &mut self.procs[pid];
        if process.start_time.is_none() {
            process.start_time = Some(clock);
        }

        let slice = match policy {
            Policy::RoundRobin { quantum } => quantum.min(process.remaining_time),
            Policy::ShortestJobFirst => process.remaining_time,
            // preempted exactly at the next arrival
            Policy::ShortestTimeToCompletionFirst => match next_arrival {
                Some(at) => process.remaining_time.min(at - clock),
                None => process.remaining_time,
            },
        };

        let interval = Interval {
            start: clock,
            end: clock + slice,
            id: process.id.clone(),
        };
        debug!("{} [{} on level {}]", interval, policy, level);

        self.clock = interval.end;
        process.remaining_time -= slice;

        if process.remaining_time > 0 {
            let target = match policy {
                Policy::ShortestTimeToCompletionFirst => level,
                Policy::RoundRobin { .. } | Policy::ShortestJobFirst => {
                    (level + 1).min(self.levels.len() - 1)
                }
            };
            trace!(
                "{}: {} requeued on level {} ({} left)",
                self.clock,
                process.id,
                target,
                process.remaining_time
            );
            process.queue_level = target;
            self.levels[target].queue.add(pid);
        } else {
            process.finish_time = Some(self.clock);
            trace!("{}: {} finished", self.clock, process.id);
            self.completed.push(pid);
        }

        self.timeline.push(interval.clone());
        Some(interval)
    }

    /// Runs until every submitted process has completed.
    pub fn run(&mut self) {
        self.run_with(|_| {});
    }

    /// Like `run`, handing each slice to `observer` as it is executed.
    pub fn run_with<F>(&mut self, mut observer: F)
    where
        F: FnMut(&Interval),
    {
        while !self.is_done() {
            if let Some(interval) = self.step() {
                observer(&interval);
            }
        }
        info!(
            "simulation finished at {} with {} processes completed",
            self.clock,
            self.completed.len()
        );
    }

    fn admit_arrivals(&mut self) {
        while let Some(next) = self.arrivals.front() {
            let process = &self.procs[*next];
            if process.arrival_time > self.clock {
                break;
            }
            trace!(
                "{}: {} arrives on level {}",
                self.clock,
                process.id,
                process.queue_level
            );
            self.levels[process.queue_level].queue.add(*next);
            self.arrivals.pop_front();
        }
    }

    pub fn averages(&self) -> Result<Averages, SchedError> {
        if self.completed.is_empty() {
            return Err(SchedError::EmptyCompletionSet);
        }
        let count = self.completed.len() as f64;
        let mut sums = [0u64; 4];
        for process in self.completed() {
            sums[0] += process.waiting_time().unwrap_or(0);
            sums[1] += process.finish_time().unwrap_or(0);
            sums[2] += process.response_time().unwrap_or(0);
            sums[3] += process.turnaround_time().unwrap_or(0);
        }

        Ok(Averages {
            waiting: sums[0] as f64 / count,
            completion: sums[1] as f64 / count,
            response: sums[2] as f64 / count,
            turnaround: sums[3] as f64 / count,
        })
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn policies(&self) -> Vec<Policy> {
        self.levels.iter().map(|level| level.policy).collect()
    }

    pub fn process(&self, pid: ProcId) -> &Process {
        &self.procs[pid]
    }

    pub fn processes(&self) -> &[Process] {
        &self.procs
    }

    /// Completed processes in completion order.
    pub fn completed(&self) -> impl Iterator<Item = &Process> + '_ {
        self.completed.iter().map(move |pid| &self.procs[*pid])
    }

    pub fn timeline(&self) -> &[Interval] {
        &self.timeline
    }

    pub fn pending_arrivals(&self) -> Vec<ProcId> {
        self.arrivals.iter().copied().collect()
    }

    pub fn queued(&self, level: usize) -> Vec<ProcId> {
        self.levels[level].queue.queued()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedulers::{preset, Policy::*};

    fn engine(levels: Vec<Policy>, procs: &[(&str, u64, u64, usize)]) -> Mlfq {
        let mut mlfq = Mlfq::new(levels).unwrap();
        for (id, burst, arrival, level) in procs {
            mlfq.submit(ProcessDescriptor::new(id, *burst, *arrival, *level))
                .unwrap();
        }
        mlfq
    }

    fn slices(mlfq: &Mlfq) -> Vec<(u64, u64, &str)> {
        mlfq.timeline()
            .iter()
            .map(|iv| (iv.start, iv.end, iv.id.as_str()))
            .collect()
    }

    fn by_id<'a>(mlfq: &'a Mlfq, id: &str) -> &'a Process {
        mlfq.processes().iter().find(|p| p.id() == id).unwrap()
    }

    // every submitted process sits in exactly one container
    fn assert_partitioned(mlfq: &Mlfq) {
        let mut seen = mlfq.pending_arrivals();
        for level in 0..mlfq.policies().len() {
            seen.extend(mlfq.queued(level));
        }
        seen.extend(mlfq.completed.iter().copied());
        seen.sort();
        let all: Vec<ProcId> = (0..mlfq.processes().len()).collect();
        assert_eq!(seen, all);
    }

    #[test]
    fn new_rejects_bad_levels() {
        assert!(matches!(
            Mlfq::new(vec![]),
            Err(SchedError::Configuration(_))
        ));
        assert!(matches!(
            Mlfq::new(vec![RoundRobin { quantum: 0 }]),
            Err(SchedError::Configuration(_))
        ));
    }

    #[test]
    fn submit_rejects_bad_descriptors() {
        let mut mlfq = Mlfq::new(vec![RoundRobin { quantum: 2 }, ShortestJobFirst]).unwrap();
        assert_eq!(
            mlfq.submit(ProcessDescriptor::new("P1", 3, 0, 2)),
            Err(SchedError::OutOfRangeLevel {
                id: "P1".to_string(),
                level: 2,
                levels: 2
            })
        );
        assert_eq!(
            mlfq.submit(ProcessDescriptor::new("P2", 0, 0, 0)),
            Err(SchedError::InvalidBurst {
                id: "P2".to_string()
            })
        );
        assert!(mlfq.processes().is_empty());
        assert!(mlfq.is_done());
    }

    #[test]
    fn submit_sorts_future_arrivals_stably() {
        let mlfq = engine(
            vec![RoundRobin { quantum: 1 }],
            &[
                ("A", 1, 5, 0),
                ("B", 1, 0, 0),
                ("C", 1, 2, 0),
                ("D", 1, 5, 0),
                ("E", 1, 2, 0),
            ],
        );
        assert_eq!(mlfq.pending_arrivals(), vec![2, 4, 0, 3]);
        assert_eq!(mlfq.queued(0), vec![1]);
        assert_partitioned(&mlfq);
    }

    #[test]
    fn select_next_scans_levels_in_order() {
        let mut mlfq = engine(
            vec![RoundRobin { quantum: 1 }, ShortestJobFirst],
            &[("A", 4, 0, 1), ("B", 2, 0, 1), ("C", 9, 0, 0)],
        );
        assert_eq!(mlfq.select_next(), Some((0, 2)));
        assert_eq!(mlfq.select_next(), Some((1, 1)));
        assert_eq!(mlfq.select_next(), Some((1, 0)));
        assert_eq!(mlfq.select_next(), None);
    }

    #[test]
    fn single_round_robin_level_keeps_process_on_last_level() {
        let mut mlfq = engine(vec![RoundRobin { quantum: 4 }], &[("P1", 10, 0, 0)]);
        mlfq.run();

        assert_eq!(slices(&mlfq), vec![(0, 4, "P1"), (4, 8, "P1"), (8, 10, "P1")]);
        let p1 = by_id(&mlfq, "P1");
        assert_eq!(p1.finish_time(), Some(10));
        assert_eq!(p1.waiting_time(), Some(0));
        assert_eq!(p1.queue_level(), 0);
    }

    #[test]
    fn round_robin_demotes_into_sjf() {
        let mut mlfq = engine(
            vec![RoundRobin { quantum: 1 }, ShortestJobFirst],
            &[("P1", 5, 0, 0), ("P2", 1, 0, 0)],
        );
        mlfq.run();

        assert_eq!(slices(&mlfq), vec![(0, 1, "P1"), (1, 2, "P2"), (2, 6, "P1")]);
        let p1 = by_id(&mlfq, "P1");
        let p2 = by_id(&mlfq, "P2");
        assert_eq!(p1.queue_level(), 1);
        assert_eq!(p1.display_level(), 2);
        assert_eq!(p1.waiting_time(), Some(1));
        assert_eq!(p1.response_time(), Some(0));
        assert_eq!(p2.queue_level(), 0);
        assert_eq!(p2.finish_time(), Some(2));
        assert_eq!(p2.response_time(), Some(1));
    }

    #[test]
    fn sjf_orders_by_remaining_time() {
        let mut mlfq = engine(
            vec![ShortestJobFirst],
            &[("P1", 4, 0, 0), ("P2", 4, 0, 0), ("P3", 2, 0, 0)],
        );
        mlfq.run();
        assert_eq!(
            slices(&mlfq),
            vec![(0, 2, "P3"), (2, 6, "P1"), (6, 10, "P2")]
        );
    }

    #[test]
    fn sjf_is_not_preempted_by_arrivals() {
        let mut mlfq = engine(
            vec![ShortestJobFirst],
            &[("P1", 8, 0, 0), ("P2", 1, 2, 0)],
        );
        mlfq.run();
        assert_eq!(slices(&mlfq), vec![(0, 8, "P1"), (8, 9, "P2")]);
    }

    #[test]
    fn stcf_cuts_slice_at_arrival_and_keeps_level() {
        let mut mlfq = engine(
            vec![RoundRobin { quantum: 2 }, ShortestTimeToCompletionFirst],
            &[("P1", 8, 0, 1), ("P2", 2, 3, 1)],
        );

        let first = mlfq.step().unwrap();
        assert_eq!((first.start, first.end), (0, 3));
        assert_eq!(mlfq.queued(1), vec![0]);
        assert_eq!(mlfq.process(0).queue_level(), 1);
        assert_eq!(mlfq.process(0).remaining_time(), 5);

        mlfq.run();
        assert_eq!(
            slices(&mlfq),
            vec![(0, 3, "P1"), (3, 5, "P2"), (5, 10, "P1")]
        );
        assert_eq!(by_id(&mlfq, "P1").queue_level(), 1);
        assert_eq!(by_id(&mlfq, "P2").waiting_time(), Some(0));
    }

    #[test]
    fn stcf_preempted_process_runs_on_if_still_shortest() {
        let mut mlfq = engine(
            vec![ShortestTimeToCompletionFirst],
            &[("A", 6, 0, 0), ("B", 10, 2, 0)],
        );
        mlfq.run();
        assert_eq!(slices(&mlfq), vec![(0, 2, "A"), (2, 6, "A"), (6, 16, "B")]);
    }

    #[test]
    fn stcf_tie_goes_to_earlier_queued_process() {
        let mut mlfq = engine(
            vec![ShortestTimeToCompletionFirst],
            &[("A", 6, 0, 0), ("B", 4, 2, 0)],
        );
        mlfq.run();
        // A is requeued with 4 left before B is admitted with 4
        assert_eq!(slices(&mlfq), vec![(0, 2, "A"), (2, 6, "A"), (6, 10, "B")]);
    }

    #[test]
    fn arrival_at_current_clock_is_admitted_immediately() {
        let mut mlfq = engine(
            vec![RoundRobin { quantum: 3 }],
            &[("P1", 3, 0, 0), ("P2", 2, 3, 0)],
        );
        mlfq.run();
        assert_eq!(slices(&mlfq), vec![(0, 3, "P1"), (3, 5, "P2")]);
        assert_eq!(by_id(&mlfq, "P2").response_time(), Some(0));
    }

    #[test]
    fn idle_gap_jumps_clock_without_intervals() {
        let mut mlfq = engine(
            vec![RoundRobin { quantum: 2 }],
            &[("P1", 2, 0, 0), ("P2", 3, 10, 0)],
        );

        assert!(mlfq.step().is_some());
        assert_eq!(mlfq.clock(), 2);
        assert_eq!(mlfq.step(), None);
        assert_eq!(mlfq.clock(), 10);

        mlfq.run();
        assert_eq!(
            slices(&mlfq),
            vec![(0, 2, "P1"), (10, 12, "P2"), (12, 13, "P2")]
        );
        assert_eq!(by_id(&mlfq, "P2").response_time(), Some(0));
    }

    #[test]
    fn first_arrival_after_zero() {
        let mut mlfq = engine(vec![ShortestJobFirst], &[("P1", 2, 4, 0)]);
        mlfq.run();
        assert_eq!(slices(&mlfq), vec![(4, 6, "P1")]);
        assert_eq!(by_id(&mlfq, "P1").turnaround_time(), Some(2));
    }

    #[test]
    fn run_with_reports_each_slice() {
        let mut mlfq = engine(vec![RoundRobin { quantum: 4 }], &[("P1", 10, 0, 0)]);
        let mut seen = Vec::new();
        mlfq.run_with(|iv| seen.push(iv.clone()));
        assert_eq!(seen, mlfq.timeline());
    }

    #[test]
    fn averages_need_completed_processes() {
        let mlfq = Mlfq::new(vec![ShortestJobFirst]).unwrap();
        assert_eq!(mlfq.averages(), Err(SchedError::EmptyCompletionSet));

        let mut mlfq = engine(
            vec![RoundRobin { quantum: 1 }, ShortestJobFirst],
            &[("P1", 5, 0, 0), ("P2", 1, 0, 0)],
        );
        mlfq.run();
        let avg = mlfq.averages().unwrap();
        assert_eq!(avg.waiting, 1.0);
        assert_eq!(avg.completion, 4.0);
        assert_eq!(avg.response, 0.5);
        assert_eq!(avg.turnaround, 4.0);
    }

    fn mixed_workload() -> Mlfq {
        engine(
            preset(2).unwrap(),
            &[
                ("P1", 7, 0, 0),
                ("P2", 3, 1, 1),
                ("P3", 12, 1, 3),
                ("P4", 1, 6, 0),
                ("P5", 5, 6, 2),
                ("P6", 2, 30, 3),
                ("P7", 9, 31, 0),
            ],
        )
    }

    #[test]
    fn partition_holds_at_every_step() {
        let mut mlfq = mixed_workload();
        assert_partitioned(&mlfq);
        while !mlfq.is_done() {
            mlfq.step();
            assert_partitioned(&mlfq);
        }
        assert_eq!(mlfq.completed().count(), 7);
    }

    #[test]
    fn completed_metrics_are_consistent() {
        let mut mlfq = mixed_workload();
        mlfq.run();

        for p in mlfq.completed() {
            let start = p.start_time().unwrap();
            let finish = p.finish_time().unwrap();
            let waiting = p.waiting_time().unwrap();
            let response = p.response_time().unwrap();
            assert_eq!(p.remaining_time(), 0);
            assert!(finish - start >= p.burst_time());
            assert_eq!(p.turnaround_time().unwrap(), waiting + p.burst_time());
            assert!(response <= waiting);

            let ran: u64 = mlfq
                .timeline()
                .iter()
                .filter(|iv| iv.id == p.id())
                .map(|iv| iv.len())
                .sum();
            assert_eq!(ran, p.burst_time());
        }
    }

    #[test]
    fn finish_minus_start_equals_burst_only_without_interruption() {
        let mut mlfq = mixed_workload();
        mlfq.run();

        let mut uninterrupted = 0;
        let mut interrupted = 0;
        for p in mlfq.completed() {
            let start = p.start_time().unwrap();
            let finish = p.finish_time().unwrap();

            // slices of p chain end-to-start from its first dispatch
            let mut at = start;
            let mut contiguous = true;
            for iv in mlfq.timeline().iter().filter(|iv| iv.id == p.id()) {
                if iv.start != at {
                    contiguous = false;
                }
                at = iv.end;
            }

            assert_eq!(finish - start == p.burst_time(), contiguous, "{}", p.id());
            if contiguous {
                uninterrupted += 1;
            } else {
                interrupted += 1;
            }
        }
        assert!(uninterrupted > 0);
        assert!(interrupted > 0);

        // P4 runs its single tick in one piece, P1 is demoted twice and waits
        let p4 = by_id(&mlfq, "P4");
        assert_eq!(p4.finish_time().unwrap() - p4.start_time().unwrap(), 1);
        let p1 = by_id(&mlfq, "P1");
        assert!(p1.finish_time().unwrap() - p1.start_time().unwrap() > p1.burst_time());
    }

    #[test]
    fn submit_rejects_work_past_end_of_time() {
        let mut mlfq = Mlfq::new(vec![RoundRobin { quantum: 2 }]).unwrap();
        assert_eq!(
            mlfq.submit(ProcessDescriptor::new("P1", 2, u64::MAX - 1, 0)),
            Err(SchedError::TimeOverflow {
                id: "P1".to_string()
            })
        );
        assert!(mlfq.processes().is_empty());

        // each fits alone, but together they would run past u64::MAX
        mlfq.submit(ProcessDescriptor::new("P2", 5, u64::MAX - 10, 0))
            .unwrap();
        assert!(matches!(
            mlfq.submit(ProcessDescriptor::new("P3", 6, 0, 0)),
            Err(SchedError::TimeOverflow { .. })
        ));

        mlfq.run();
        assert_eq!(slices(&mlfq).last(), Some(&(u64::MAX - 6, u64::MAX - 5, "P2")));
    }

    #[test]
    fn timeline_never_overlaps() {
        let mut mlfq = mixed_workload();
        mlfq.run();
        for pair in mlfq.timeline().windows(2) {
            assert!(pair[0].start < pair[0].end);
            assert!(pair[0].end <= pair[1].start);
        }
    }

    #[test]
    fn identical_runs_give_identical_results() {
        let mut a = mixed_workload();
        let mut b = mixed_workload();
        a.run();
        b.run();
        assert_eq!(a.timeline(), b.timeline());
        assert_eq!(a.processes(), b.processes());
        assert_eq!(a.averages(), b.averages());
    }
}
