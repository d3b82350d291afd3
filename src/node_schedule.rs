//! Per-node schedule with insertion-based slot search.

use crate::cluster::ClusterNode;
use crate::epsilon;
use crate::task::Task;

/// Execution of one scheduled task on one node.
///
/// `task_id` is the workflow task id; `scheduled_task_id` is a dense id
/// generated by the schedule, unique per placement, so that duplicated tasks
/// stay distinguishable.
#[derive(Debug, Clone, Copy)]
pub struct TimeInterval {
    pub start: f64,
    pub end: f64,
    pub task_id: usize,
    pub scheduled_task_id: usize,
    pub node_id: usize,
}

/// Slot found by the insertion search: the achievable finish time and the
/// position before which the new interval has to be inserted.
#[derive(Debug, Clone, Copy)]
pub struct TimeSlot {
    pub eft: f64,
    pub position: usize,
}

/// Ordered, gap-permitting sequence of non-overlapping intervals on a single
/// node, sorted by start time.
#[derive(Debug, Clone)]
pub struct NodeSchedule {
    node: ClusterNode,
    intervals: Vec<TimeInterval>,
}

impl NodeSchedule {
    pub fn new(node: ClusterNode) -> Self {
        Self {
            node,
            intervals: Vec::new(),
        }
    }

    pub fn node(&self) -> &ClusterNode {
        &self.node
    }

    pub fn intervals(&self) -> &Vec<TimeInterval> {
        &self.intervals
    }

    /// Time the node needs to execute the task.
    pub fn computation_time(&self, task: &Task) -> f64 {
        task.workload / self.node.performance()
    }

    /// Finds the earliest slot for the task at or after `ready_time`.
    ///
    /// Gaps between already placed intervals are reused when the task fits;
    /// otherwise the task goes after the last interval.
    pub fn earliest_finish_time(&self, ready_time: f64, task: &Task) -> TimeSlot {
        let computation_time = self.computation_time(task);

        // first interval that ends at or after the ready time
        let mut curr = self
            .intervals
            .partition_point(|interval| interval.end < ready_time);

        if curr == self.intervals.len() {
            // no insertion possible, schedule after the last interval
            let earliest_start_time = match self.intervals.last() {
                Some(last) => last.end.max(ready_time),
                None => ready_time,
            };
            return TimeSlot {
                eft: earliest_start_time + computation_time,
                position: self.intervals.len(),
            };
        }

        if curr == 0 && self.intervals[0].start >= ready_time + computation_time {
            // the task fits in front of every other task on this node
            return TimeSlot {
                eft: ready_time + computation_time,
                position: 0,
            };
        }

        loop {
            let next = curr + 1;
            if next == self.intervals.len()
                || self.intervals[next].start - self.intervals[curr].end >= computation_time
            {
                return TimeSlot {
                    eft: self.intervals[curr].end + computation_time,
                    position: next,
                };
            }
            curr = next;
        }
    }

    pub fn insert(&mut self, position: usize, interval: TimeInterval) {
        self.intervals.insert(position, interval);
    }

    /// End of the last interval, 0 when the node is empty.
    pub fn total_finish_time(&self) -> f64 {
        self.intervals.last().map_or(0., |interval| interval.end)
    }

    /// Checks that the intervals are non-overlapping and monotonically
    /// ordered in both start and end.
    pub fn is_valid(&self) -> bool {
        self.intervals.windows(2).all(|pair| {
            epsilon::less_or_eq(pair[0].end, pair[1].start)
                && pair[0].start <= pair[1].start
                && pair[0].end <= pair[1].end
        })
    }

    pub fn to_report_string(&self) -> String {
        let mut out = format!("[Node {}]", self.node.id);
        for interval in self.intervals.iter() {
            out.push_str(&format!(
                " ({}: {:.2} -> {:.2})",
                interval.task_id, interval.start, interval.end
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_schedule(performance: f64) -> NodeSchedule {
        NodeSchedule::new(ClusterNode {
            id: 0,
            memory: 0.,
            num_cores: 1,
            core_performance: performance,
            network_bandwidth: 1.,
        })
    }

    fn task(workload: f64) -> Task {
        Task {
            id: 0,
            workload,
            memory_requirement: 0.,
        }
    }

    fn place(s: &mut NodeSchedule, ready_time: f64, workload: f64) -> TimeSlot {
        let t = task(workload);
        let slot = s.earliest_finish_time(ready_time, &t);
        let start = slot.eft - s.computation_time(&t);
        s.insert(
            slot.position,
            TimeInterval {
                start,
                end: slot.eft,
                task_id: 0,
                scheduled_task_id: 0,
                node_id: 0,
            },
        );
        slot
    }

    #[test]
    fn empty_schedule_starts_at_ready_time() {
        let s = node_schedule(2.);
        let slot = s.earliest_finish_time(3., &task(10.));
        assert_eq!(slot.eft, 3. + 5.);
        assert_eq!(slot.position, 0);
    }

    #[test]
    fn task_is_appended_after_the_last_interval() {
        let mut s = node_schedule(1.);
        place(&mut s, 0., 10.);
        let slot = s.earliest_finish_time(0., &task(5.));
        assert_eq!(slot.eft, 15.);
        assert_eq!(slot.position, 1);
    }

    #[test]
    fn prefix_gap_is_reused() {
        let mut s = node_schedule(1.);
        place(&mut s, 10., 10.); // occupies [10, 20]
        let slot = s.earliest_finish_time(2., &task(5.));
        assert_eq!(slot.eft, 7.);
        assert_eq!(slot.position, 0);
    }

    #[test]
    fn inner_gap_is_reused_when_large_enough() {
        let mut s = node_schedule(1.);
        place(&mut s, 0., 10.); // [0, 10]
        place(&mut s, 30., 10.); // [30, 40]
        let slot = s.earliest_finish_time(0., &task(20.));
        assert_eq!(slot.eft, 30.);
        assert_eq!(slot.position, 1);

        // too large for the gap, goes to the tail
        let slot = s.earliest_finish_time(0., &task(25.));
        assert_eq!(slot.eft, 65.);
        assert_eq!(slot.position, 2);
    }

    #[test]
    fn search_starts_at_the_first_interval_ending_after_ready_time() {
        let mut s = node_schedule(1.);
        place(&mut s, 0., 10.); // [0, 10]
        place(&mut s, 40., 10.); // [40, 50]

        // ready inside the gap: the search starts at [40, 50], so the gap
        // before it is not considered
        let slot = s.earliest_finish_time(12., &task(5.));
        assert_eq!(slot.eft, 55.);
        assert_eq!(slot.position, 2);

        // ready at 0: [0, 10] occupies the front, so the task lands in the
        // gap right after it
        let slot = s.earliest_finish_time(0., &task(5.));
        assert_eq!(slot.eft, 15.);
        assert_eq!(slot.position, 1);
    }

    #[test]
    fn inserted_intervals_stay_sorted_and_valid() {
        let mut s = node_schedule(1.);
        place(&mut s, 0., 10.);
        place(&mut s, 40., 10.);
        place(&mut s, 0., 5.);
        assert!(s.is_valid());
        assert_eq!(s.intervals()[1].start, 10.);
        assert_eq!(s.total_finish_time(), 50.);
    }
}
