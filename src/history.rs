/*!
Every line the hub has broadcast, oldest first, for replay to newcomers.
*/
use std::collections::VecDeque;

use crate::message::Line;

/// Lines reserved up front, whether or not there's a limit.
const INITIAL_CAPACITY: usize = 100;

#[derive(Debug)]
pub struct HistoryLog {
    lines: VecDeque<Line>,
    /// When set, only the most recent `limit` lines are kept.
    limit: Option<usize>,
}

impl HistoryLog {
    pub fn new(limit: Option<usize>) -> HistoryLog {
        let capacity = match limit {
            Some(n) => n.min(INITIAL_CAPACITY),
            None => INITIAL_CAPACITY,
        };
        HistoryLog { lines: VecDeque::with_capacity(capacity), limit }
    }

    pub fn append(&mut self, line: Line) {
        if let Some(limit) = self.limit {
            if limit == 0 { return; }
            while self.lines.len() >= limit {
                self.lines.pop_front();
            }
        }
        self.lines.push_back(line);
    }

    /// Copy of the current log, in broadcast order.
    pub fn snapshot(&self) -> Vec<Line> {
        self.lines.iter().cloned().collect()
    }

    pub fn len(&self) -> usize { self.lines.len() }
}
