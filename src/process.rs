/// What a caller hands to the engine for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDescriptor {
    pub id: String,
    pub burst_time: u64,
    pub arrival_time: u64,
    /// zero-based
    pub queue_level: usize,
    pub priority: i64,
}

impl ProcessDescriptor {
    pub fn new(id: &str, burst_time: u64, arrival_time: u64, queue_level: usize) -> Self {
        ProcessDescriptor {
            id: id.to_owned(),
            burst_time,
            arrival_time,
            queue_level,
            priority: 0,
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }
}

/// Index of a process in the engine's arena.
pub type ProcId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Process {
    pub(crate) id: String,
    pub(crate) burst_time: u64,
    pub(crate) arrival_time: u64,
    pub(crate) priority: i64,

    pub(crate) remaining_time: u64,
    pub(crate) queue_level: usize,
    pub(crate) start_time: Option<u64>,
    pub(crate) finish_time: Option<u64>,
}

impl Process {
    pub fn new(desc: ProcessDescriptor) -> Process {
        Process {
            id: desc.id,
            burst_time: desc.burst_time,
            arrival_time: desc.arrival_time,
            priority: desc.priority,
            remaining_time: desc.burst_time,
            queue_level: desc.queue_level,
            start_time: None,
            finish_time: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn burst_time(&self) -> u64 {
        self.burst_time
    }

    pub fn arrival_time(&self) -> u64 {
        self.arrival_time
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    pub fn remaining_time(&self) -> u64 {
        self.remaining_time
    }

    pub fn queue_level(&self) -> usize {
        self.queue_level
    }

    /// Level as shown in reports, counting from 1.
    pub fn display_level(&self) -> usize {
        self.queue_level + 1
    }

    pub fn start_time(&self) -> Option<u64> {
        self.start_time
    }

    pub fn finish_time(&self) -> Option<u64> {
        self.finish_time
    }

    pub fn is_finished(&self) -> bool {
        self.finish_time.is_some()
    }

    // The metrics below are only defined once the matching timestamp is set.
    // A process that never ran reports None, not zero.

    pub fn waiting_time(&self) -> Option<u64> {
        self.finish_time
            .map(|finish| finish - self.arrival_time - self.burst_time)
    }

    pub fn turnaround_time(&self) -> Option<u64> {
        self.finish_time.map(|finish| finish - self.arrival_time)
    }

    pub fn response_time(&self) -> Option<u64> {
        self.start_time.map(|start| start - self.arrival_time)
    }
}
