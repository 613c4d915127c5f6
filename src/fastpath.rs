// RXP Regex Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! Burst enqueue/dequeue over a [`Queue`].
//!
//! Operations carry an opaque 64-bit user id. The fast path assigns each one
//! an internal job id and maps responses back to the user id, so callers
//! never see job ids.

use crate::config::{MAX_SIZE_MATCH_RESP, RESPONSE_HEADER_SIZE};
use crate::descriptor::Job;
use crate::error::RxpResult;
use crate::port::Adapter;
use crate::queue::{Queue, Responses};
use std::collections::HashMap;

/// A regex search request.
#[derive(Debug, Clone, Copy)]
pub struct RegexOp<'a> {
    pub user_id: u64,
    pub data: &'a [u8],
    /// Rule subsets to match against.
    pub group_ids: [u16; 4],
    /// Application control word.
    pub ctrl: u16,
}

impl<'a> RegexOp<'a> {
    pub fn new(user_id: u64, data: &'a [u8]) -> Self {
        Self {
            user_id,
            data,
            group_ids: [1, 0, 0, 0],
            ctrl: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegexMatch {
    pub rule_id: u32,
    pub offset: u16,
    pub len: u16,
}

/// A completed [`RegexOp`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexResult {
    pub user_id: u64,
    /// Engine status word.
    pub status: u16,
    /// Matches found, including any beyond the reported list.
    pub nb_actual_matches: u8,
    pub matches: Vec<RegexMatch>,
}

/// Burst interface over one queue.
pub struct FastPath<'d, A: Adapter> {
    queue: Queue<'d, A>,
    pending: HashMap<u32, u64>,
    next_job_id: u32,
    buf: Vec<u8>,
}

impl<'d, A: Adapter> FastPath<'d, A> {
    pub fn new(queue: Queue<'d, A>) -> Self {
        let buf = vec![0u8; queue.slot_count() * (RESPONSE_HEADER_SIZE + MAX_SIZE_MATCH_RESP)];
        Self {
            queue,
            pending: HashMap::new(),
            next_job_id: 1,
            buf,
        }
    }

    pub fn queue(&self) -> &Queue<'d, A> {
        &self.queue
    }

    /// Operations enqueued and not yet dequeued.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    pub fn into_queue(self) -> Queue<'d, A> {
        self.queue
    }

    fn allocate_job_id(&mut self) -> u32 {
        let id = self.next_job_id;
        self.next_job_id = self.next_job_id.wrapping_add(1).max(1);
        id
    }

    /// Enqueue a burst. Returns how many leading ops were accepted.
    pub fn enqueue(&mut self, ops: &[RegexOp<'_>]) -> RxpResult<usize> {
        if ops.is_empty() {
            return Ok(0);
        }
        let first_id = self.next_job_id;
        let mut ids = Vec::with_capacity(ops.len());
        let jobs: Vec<Job<'_>> = ops
            .iter()
            .map(|op| {
                let id = self.allocate_job_id();
                ids.push(id);
                Job::new(id, op.data)
                    .with_subset(op.group_ids)
                    .with_ctrl(op.ctrl)
            })
            .collect();

        let sent = match self.queue.submit(&jobs) {
            Ok(sent) => sent,
            Err(e) => {
                self.next_job_id = first_id;
                return Err(e);
            }
        };
        for (id, op) in ids.iter().zip(ops).take(sent) {
            self.pending.insert(*id, op.user_id);
        }
        // Ids of rejected ops are reused by the next burst.
        if let Some(id) = ids.get(sent) {
            self.next_job_id = *id;
        }
        Ok(sent)
    }

    /// Dequeue up to `max` completed ops into `out`.
    ///
    /// Responses for jobs not enqueued through this fast path are logged and
    /// dropped.
    pub fn dequeue(&mut self, out: &mut Vec<RegexResult>, max: usize) -> RxpResult<usize> {
        if max == 0 || !self.queue.poll()?.rx_ready {
            return Ok(0);
        }
        let summary = self.queue.read_responses_max(&mut self.buf, max)?;
        let mut dequeued = 0;
        for response in Responses::new(&self.buf[..summary.bytes]) {
            let job_id = response.header.job_id;
            let Some(user_id) = self.pending.remove(&job_id) else {
                log::warn!(
                    "Queue {}: dropping response for unknown job {}",
                    self.queue.id(),
                    job_id
                );
                continue;
            };
            dequeued += 1;
            out.push(RegexResult {
                user_id,
                status: response.header.status,
                nb_actual_matches: response.header.detected_match_count,
                matches: response
                    .matches()
                    .map(|m| RegexMatch {
                        rule_id: m.rule_id,
                        offset: m.start_offset,
                        len: m.length,
                    })
                    .collect(),
            });
        }
        Ok(dequeued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::device::Device;
    use crate::poll::NoopClock;
    use crate::sim::SimAdapter;

    fn device(sim: &SimAdapter) -> Device<SimAdapter> {
        let mut config = DeviceConfig::default();
        config.set_slots_per_queue(3);
        config.set_database_size(1 << 16);
        config.set_huge_pages(false);
        Device::init_with_clock(vec![sim.clone()], config, Box::new(NoopClock)).unwrap()
    }

    #[test]
    fn test_enqueue_dequeue_maps_user_ids() {
        let sim = SimAdapter::new();
        sim.add_pattern(11, b"GET");
        sim.add_pattern(12, b"POST");
        let dev = device(&sim);
        let mut fp = FastPath::new(dev.open_queue().unwrap());

        let ops = [
            RegexOp::new(0xA, b"GET /index"),
            RegexOp::new(0xB, b"POST /form GET"),
        ];
        assert_eq!(fp.enqueue(&ops).unwrap(), 2);
        assert_eq!(fp.in_flight(), 2);

        let mut out = Vec::new();
        assert_eq!(fp.dequeue(&mut out, 8).unwrap(), 2);
        assert_eq!(fp.in_flight(), 0);
        out.sort_by_key(|r| r.user_id);
        assert_eq!(out[0].user_id, 0xA);
        assert_eq!(
            out[0].matches,
            vec![RegexMatch {
                rule_id: 11,
                offset: 0,
                len: 3
            }]
        );
        assert_eq!(out[1].matches.len(), 2);
        assert_eq!(out[1].matches[0].rule_id, 12);
        assert_eq!(out[1].matches[1].offset, 11);
    }

    #[test]
    fn test_enqueue_stops_when_full() {
        let sim = SimAdapter::new();
        let dev = device(&sim);
        let mut fp = FastPath::new(dev.open_queue().unwrap());
        let ops: Vec<_> = (0..5).map(|i| RegexOp::new(i, b"data")).collect();
        assert_eq!(fp.enqueue(&ops).unwrap(), 3);
        assert_eq!(fp.enqueue(&ops[3..]).unwrap(), 0);

        let mut out = Vec::new();
        assert_eq!(fp.dequeue(&mut out, 2).unwrap(), 2);
        assert_eq!(fp.enqueue(&ops[3..]).unwrap(), 2);
        assert_eq!(fp.dequeue(&mut out, 8).unwrap(), 3);

        let mut ids: Vec<_> = out.iter().map(|r| r.user_id).collect();
        ids.sort();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_dequeue_nothing_ready() {
        let sim = SimAdapter::new();
        let dev = device(&sim);
        let mut fp = FastPath::new(dev.open_queue().unwrap());
        let mut out = Vec::new();
        assert_eq!(fp.dequeue(&mut out, 4).unwrap(), 0);

        sim.hold_completions(true);
        fp.enqueue(&[RegexOp::new(1, b"x")]).unwrap();
        assert_eq!(fp.dequeue(&mut out, 4).unwrap(), 0);
        sim.release_all();
        assert_eq!(fp.dequeue(&mut out, 0).unwrap(), 0);
        assert_eq!(fp.dequeue(&mut out, 4).unwrap(), 1);
        assert_eq!(out[0].user_id, 1);
    }

    #[test]
    fn test_unknown_response_is_skipped() {
        let sim = SimAdapter::new();
        let dev = device(&sim);
        let mut fp = FastPath::new(dev.open_queue().unwrap());
        // A job posted behind the fast path's back.
        fp.queue.submit(&[Job::new(999, b"stray")]).unwrap();
        fp.enqueue(&[RegexOp::new(0x42, b"mine")]).unwrap();

        let mut out = Vec::new();
        assert_eq!(fp.dequeue(&mut out, 8).unwrap(), 1);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].user_id, 0x42);
        assert_eq!(fp.in_flight(), 0);
        assert_eq!(fp.queue().busy_slots(), 0);
    }

    #[test]
    fn test_job_ids_skip_zero() {
        let sim = SimAdapter::new();
        let dev = device(&sim);
        let mut fp = FastPath::new(dev.open_queue().unwrap());
        fp.next_job_id = u32::MAX;
        assert_eq!(fp.allocate_job_id(), u32::MAX);
        assert_eq!(fp.allocate_job_id(), 1);
    }
}
