// RXP Regex Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! Job submission and response collection.
//!
//! A [`Queue`] owns a fixed array of job slots, each bound to one send queue
//! of the queue's job context. A slot carries at most one job at a time: it
//! is busy from a successful post until its response has been copied out by
//! [`Queue::read_responses`]. Completions are correlated by the work id the
//! context returned for the post, so responses may arrive in any order.
//!
//! Queues are opened with [`Device::open_queue`] and release their buffers,
//! context and queue id on drop.

use crate::config::{MAX_SIZE_MATCH_RESP, RXP_MAX_JOB_LENGTH};
use crate::descriptor::{ControlSegment, DataSegment, Job, JobCtrl, MatchTuple, ResponseHeader, WorkDescriptor};
use crate::device::Device;
use crate::error::{RxpError, RxpResult};
use crate::port::{Adapter, Completion, JobContext, MemoryKey, WorkId};
use scopeguard::ScopeGuard;
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::mem::ManuallyDrop;
use std::ptr::NonNull;

/// Alignment of slot buffers.
const BUFFER_ALIGN: usize = 64;

/// Zeroed heap buffer with a stable address, handed to the adapter for DMA.
struct DmaBuffer {
    ptr: NonNull<u8>,
    layout: Layout,
}

// SAFETY: DmaBuffer uniquely owns its allocation; the adapter only touches it
// between registration and deregistration, both driven by the owning slot.
unsafe impl Send for DmaBuffer {}

impl DmaBuffer {
    fn zeroed(len: usize) -> RxpResult<Self> {
        let layout = Layout::from_size_align(len.max(1), BUFFER_ALIGN)
            .map_err(|e| RxpError::ResourceExhausted(format!("buffer layout: {}", e)))?;
        // SAFETY: layout has a non-zero size.
        let ptr = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or_else(|| {
            RxpError::ResourceExhausted(format!("failed to allocate {} byte buffer", len))
        })?;
        Ok(Self { ptr, layout })
    }

    #[inline]
    fn len(&self) -> usize {
        self.layout.size()
    }

    #[inline]
    fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is a live allocation of layout.size() initialized bytes.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len()) }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and &mut self guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len()) }
    }
}

impl Drop for DmaBuffer {
    fn drop(&mut self) {
        // SAFETY: allocated in `zeroed` with this layout.
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

/// One job slot and its registered buffers.
pub(crate) struct JobSlot {
    input: DmaBuffer,
    output: DmaBuffer,
    metadata: DmaBuffer,
    input_key: MemoryKey,
    output_key: MemoryKey,
    metadata_key: MemoryKey,
    busy: bool,
    response_ready: bool,
    job_id: u32,
    work_id: WorkId,
}

impl JobSlot {
    fn new<C: JobContext>(ctx: &C) -> RxpResult<Self> {
        let input = DmaBuffer::zeroed(RXP_MAX_JOB_LENGTH)?;
        let output = DmaBuffer::zeroed(MAX_SIZE_MATCH_RESP)?;
        let metadata = DmaBuffer::zeroed(ResponseHeader::SIZE)?;

        let register = |buf: &DmaBuffer| {
            // SAFETY: the buffer outlives its registration; every key is
            // deregistered before the slot's buffers are dropped.
            let key = unsafe { ctx.register_buffer(buf.as_ptr(), buf.len()) }?;
            Ok::<_, RxpError>(scopeguard::guard(key, move |key| {
                let _ = ctx.deregister_buffer(key);
            }))
        };
        let input_key = register(&input)?;
        let output_key = register(&output)?;
        let metadata_key = register(&metadata)?;

        Ok(Self {
            input_key: ScopeGuard::into_inner(input_key),
            output_key: ScopeGuard::into_inner(output_key),
            metadata_key: ScopeGuard::into_inner(metadata_key),
            input,
            output,
            metadata,
            busy: false,
            response_ready: false,
            job_id: 0,
            work_id: WorkId::default(),
        })
    }

    fn is_free(&self) -> bool {
        !self.busy && !self.response_ready
    }

    fn release<C: JobContext>(self, ctx: &C) {
        for key in [self.input_key, self.output_key, self.metadata_key] {
            if let Err(e) = ctx.deregister_buffer(key) {
                log::warn!("Failed to deregister job buffer {}: {}", key.0, e);
            }
        }
    }

    /// Response header of a completed job, if its metadata is usable.
    fn validated_header(&self) -> Result<ResponseHeader, String> {
        let header = ResponseHeader::read_from(self.metadata.as_slice())
            .ok_or_else(|| String::from("short response metadata"))?;
        if usize::from(header.match_count) * MatchTuple::SIZE > self.output.len() {
            return Err(format!(
                "match count {} exceeds output buffer",
                header.match_count
            ));
        }
        Ok(header)
    }

    fn descriptor(&self, job: &Job<'_>) -> WorkDescriptor {
        WorkDescriptor {
            ctrl: ControlSegment {
                subset: job.subset,
                ctrl: JobCtrl::from_app(job.ctrl),
            },
            input: DataSegment::new(self.input.as_ptr(), job.data.len(), self.input_key),
            output: DataSegment::new(self.output.as_ptr(), MAX_SIZE_MATCH_RESP, self.output_key),
            metadata_key: self.metadata_key,
        }
    }
}

/// Allocate and register `count` slots, unwinding all of them on failure.
pub(crate) fn open_slots<C: JobContext>(ctx: &C, count: usize) -> RxpResult<Vec<JobSlot>> {
    let mut slots = scopeguard::guard(Vec::new(), |slots: Vec<JobSlot>| {
        for slot in slots {
            slot.release(ctx);
        }
    });
    slots
        .try_reserve_exact(count)
        .map_err(|e| RxpError::ResourceExhausted(format!("slot array: {}", e)))?;
    for _ in 0..count {
        slots.push(JobSlot::new(ctx)?);
    }
    Ok(ScopeGuard::into_inner(slots))
}

pub(crate) fn release_slots<C: JobContext>(ctx: &C, slots: Vec<JobSlot>) {
    for slot in slots {
        slot.release(ctx);
    }
}

/// Readiness reported by [`Queue::poll`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStatus {
    /// At least one response is waiting to be read.
    pub rx_ready: bool,
    /// At least one slot can take a job.
    pub tx_ready: bool,
}

/// What [`Queue::read_responses`] copied out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadSummary {
    pub bytes: usize,
    pub responses: usize,
}

/// A job queue bound to a [`Device`].
pub struct Queue<'d, A: Adapter> {
    device: &'d Device<A>,
    id: usize,
    ctx: ManuallyDrop<A::Context>,
    slots: Vec<JobSlot>,
    unread: usize,
}

impl<'d, A: Adapter> Queue<'d, A> {
    pub(crate) fn new(
        device: &'d Device<A>,
        id: usize,
        ctx: A::Context,
        slots: Vec<JobSlot>,
    ) -> Self {
        Self {
            device,
            id,
            ctx: ManuallyDrop::new(ctx),
            slots,
            unread: 0,
        }
    }

    /// Queue id, unique among the device's open queues.
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Slots holding a job or an unread response.
    pub fn busy_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.busy).count()
    }

    /// Completed responses not yet read.
    #[inline]
    pub fn unread_responses(&self) -> usize {
        self.unread
    }

    /// Post jobs into free slots.
    ///
    /// Returns how many of `jobs` were posted, in order. Posting stops at the
    /// first job that finds no free slot or whose post fails; the remaining
    /// jobs are not queued.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `jobs` is empty or a payload exceeds
    /// [`RXP_MAX_JOB_LENGTH`]. Nothing is posted in that case.
    pub fn submit(&mut self, jobs: &[Job<'_>]) -> RxpResult<usize> {
        if jobs.is_empty() {
            return Err(RxpError::InvalidArgument("no jobs to submit".into()));
        }
        if let Some(job) = jobs.iter().find(|j| j.data.len() > RXP_MAX_JOB_LENGTH) {
            return Err(RxpError::InvalidArgument(format!(
                "job {} is {} bytes, max {}",
                job.job_id,
                job.data.len(),
                RXP_MAX_JOB_LENGTH
            )));
        }

        let mut sent = 0;
        for job in jobs {
            let Some(index) = self.slots.iter().position(JobSlot::is_free) else {
                break;
            };
            let slot = &mut self.slots[index];
            slot.input.as_mut_slice()[..job.data.len()].copy_from_slice(job.data);
            let desc = slot.descriptor(job);

            match self.ctx.send_work(index, &desc) {
                Ok(work) => {
                    slot.work_id = work;
                    slot.job_id = job.job_id;
                    slot.busy = true;
                    sent += 1;
                }
                Err(e) => {
                    log::warn!(
                        "Queue {}: failed to post job {} on slot {}: {}",
                        self.id,
                        job.job_id,
                        index,
                        e
                    );
                    break;
                }
            }
        }
        log::trace!("Queue {}: submitted {} of {} jobs", self.id, sent, jobs.len());
        Ok(sent)
    }

    /// Collect completions for every busy slot.
    pub fn poll(&mut self) -> RxpResult<QueueStatus> {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if !slot.busy {
                continue;
            }
            match self.ctx.poll(index, slot.work_id)? {
                Completion::Ready => {
                    if !slot.response_ready {
                        slot.response_ready = true;
                        self.unread += 1;
                    }
                }
                Completion::Pending => {
                    if slot.response_ready {
                        slot.response_ready = false;
                        self.unread -= 1;
                    }
                }
            }
        }
        Ok(QueueStatus {
            rx_ready: self.slots.iter().any(|s| s.response_ready),
            tx_ready: self.slots.iter().any(|s| !s.busy),
        })
    }

    /// Copy ready responses into `buf`, freeing their slots.
    ///
    /// Each response is written as its header, with `job_id` set to the
    /// submitting job's id, followed by its match tuples. Copying stops at
    /// the first response that does not fit; it stays ready for the next call.
    ///
    /// # Errors
    ///
    /// `CompletionError` when the first ready response has unusable metadata.
    /// Its slot is freed. A bad response found after others were copied ends
    /// the batch instead and is reported by the next call.
    pub fn read_responses(&mut self, buf: &mut [u8]) -> RxpResult<ReadSummary> {
        self.read_responses_max(buf, usize::MAX)
    }

    /// As [`Self::read_responses`], copying at most `max` responses.
    pub fn read_responses_max(&mut self, buf: &mut [u8], max: usize) -> RxpResult<ReadSummary> {
        let mut summary = ReadSummary::default();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if summary.responses == max {
                break;
            }
            if !slot.response_ready {
                continue;
            }

            let mut header = match slot.validated_header() {
                Ok(header) => header,
                // Hand back what was copied; the bad slot is reported next call.
                Err(_) if summary.responses > 0 => break,
                Err(reason) => {
                    slot.busy = false;
                    slot.response_ready = false;
                    self.unread -= 1;
                    log::warn!("Queue {}: dropping response on slot {}: {}", self.id, index, reason);
                    return Err(RxpError::CompletionError {
                        slot: index,
                        reason,
                    });
                }
            };
            let tuples = usize::from(header.match_count) * MatchTuple::SIZE;

            let needed = header.wire_len();
            let Some(out) = buf.get_mut(summary.bytes..summary.bytes + needed) else {
                break;
            };
            header.job_id = slot.job_id;
            header.write_to(out);
            out[ResponseHeader::SIZE..].copy_from_slice(&slot.output.as_slice()[..tuples]);

            slot.busy = false;
            slot.response_ready = false;
            self.unread -= 1;
            summary.bytes += needed;
            summary.responses += 1;
        }
        Ok(summary)
    }

    /// Close the queue. Equivalent to dropping it.
    pub fn close(self) {}
}

impl<A: Adapter> Drop for Queue<'_, A> {
    fn drop(&mut self) {
        release_slots(&*self.ctx, std::mem::take(&mut self.slots));
        // SAFETY: ctx is not touched after this point.
        unsafe { ManuallyDrop::drop(&mut self.ctx) };
        self.device.queue_closed(self.id);
    }
}

/// One response parsed from a [`Queue::read_responses`] buffer.
#[derive(Debug, Clone, Copy)]
pub struct Response<'a> {
    pub header: ResponseHeader,
    tuples: &'a [u8],
}

impl<'a> Response<'a> {
    pub fn matches(&self) -> impl Iterator<Item = MatchTuple> + 'a {
        self.tuples
            .chunks_exact(MatchTuple::SIZE)
            .filter_map(MatchTuple::read_from)
    }
}

/// Iterator over the responses packed in a buffer.
#[derive(Debug, Clone)]
pub struct Responses<'a> {
    buf: &'a [u8],
}

impl<'a> Responses<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }
}

impl<'a> Iterator for Responses<'a> {
    type Item = Response<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let header = ResponseHeader::read_from(self.buf)?;
        let tuples = self.buf.get(ResponseHeader::SIZE..header.wire_len())?;
        self.buf = &self.buf[header.wire_len()..];
        Some(Response { header, tuples })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::loader::ProgramMode;
    use crate::poll::NoopClock;
    use crate::port::EngineId;
    use crate::rof::{RofEntry, RofEntryType};
    use crate::sim::SimAdapter;

    fn device(sim: &SimAdapter, slots: usize) -> Device<SimAdapter> {
        let mut config = DeviceConfig::default();
        config.set_slots_per_queue(slots);
        config.set_database_size(1 << 16);
        config.set_huge_pages(false);
        let device = Device::init_with_clock(vec![sim.clone()], config, Box::new(NoopClock)).unwrap();
        let program = [RofEntry::new(RofEntryType::Instruction, 0, 1)];
        for engine in EngineId::ALL {
            device.program_rules(engine, &program, ProgramMode::Full).unwrap();
        }
        device
    }

    fn drain(queue: &mut Queue<'_, SimAdapter>) -> Vec<(u32, Vec<MatchTuple>)> {
        let mut buf = vec![0u8; 64 * 1024];
        queue.poll().unwrap();
        let summary = queue.read_responses(&mut buf).unwrap();
        Responses::new(&buf[..summary.bytes])
            .map(|r| (r.header.job_id, r.matches().collect()))
            .collect()
    }

    #[test]
    fn test_submit_fills_free_slots_only() {
        let sim = SimAdapter::new();
        let dev = device(&sim, 4);
        let mut q = dev.open_queue().unwrap();
        let data = [b"a".as_slice(); 6];
        let jobs: Vec<_> = data.iter().enumerate().map(|(i, d)| Job::new(i as u32, d)).collect();

        assert_eq!(q.submit(&jobs).unwrap(), 4);
        assert_eq!(q.busy_slots(), 4);
        assert_eq!(q.submit(&jobs[4..]).unwrap(), 0);
        assert_eq!(q.busy_slots(), 4);
    }

    #[test]
    fn test_tx_ready_tracks_free_slots() {
        let sim = SimAdapter::new();
        let dev = device(&sim, 2);
        let mut q = dev.open_queue().unwrap();
        let jobs = [Job::new(1, b"x"), Job::new(2, b"y")];
        assert_eq!(q.submit(&jobs).unwrap(), 2);

        let status = q.poll().unwrap();
        assert!(status.rx_ready);
        assert!(!status.tx_ready);

        let mut buf = [0u8; 16];
        let summary = q.read_responses(&mut buf).unwrap();
        assert_eq!(summary.responses, 1);
        assert!(q.poll().unwrap().tx_ready);
    }

    #[test]
    fn test_responses_carry_job_ids_and_matches() {
        let sim = SimAdapter::new();
        sim.add_pattern(3, b"needle");
        let dev = device(&sim, 4);
        let mut q = dev.open_queue().unwrap();
        let jobs = [
            Job::new(100, b"hay needle hay"),
            Job::new(200, b"nothing here"),
        ];
        assert_eq!(q.submit(&jobs).unwrap(), 2);

        let responses = drain(&mut q);
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].0, 100);
        assert_eq!(
            responses[0].1,
            vec![MatchTuple {
                rule_id: 3,
                start_offset: 4,
                length: 6
            }]
        );
        assert_eq!(responses[1], (200, vec![]));
        assert_eq!(q.busy_slots(), 0);
        assert_eq!(q.unread_responses(), 0);
    }

    #[test]
    fn test_read_never_overruns_buffer() {
        let sim = SimAdapter::new();
        sim.add_pattern(1, b"a");
        let dev = device(&sim, 3);
        let mut q = dev.open_queue().unwrap();
        // 16 + 8 * 2 bytes each.
        let jobs = [Job::new(1, b"aa"), Job::new(2, b"aa"), Job::new(3, b"aa")];
        q.submit(&jobs).unwrap();
        q.poll().unwrap();
        assert_eq!(q.unread_responses(), 3);

        let mut buf = [0xEEu8; 70];
        let first = q.read_responses(&mut buf).unwrap();
        assert_eq!(first, ReadSummary { bytes: 64, responses: 2 });
        assert_eq!(&buf[64..], &[0xEE; 6]);
        assert_eq!(q.unread_responses(), 1);

        // Still ready without another poll.
        let second = q.read_responses(&mut buf).unwrap();
        assert_eq!(second.responses, 1);
        let ids: Vec<_> = Responses::new(&buf[..second.bytes])
            .map(|r| r.header.job_id)
            .collect();
        assert_eq!(ids, vec![3]);
    }

    #[test]
    fn test_zero_capacity_read() {
        let sim = SimAdapter::new();
        let dev = device(&sim, 1);
        let mut q = dev.open_queue().unwrap();
        q.submit(&[Job::new(1, b"z")]).unwrap();
        q.poll().unwrap();
        assert_eq!(q.read_responses(&mut []).unwrap(), ReadSummary::default());
        assert_eq!(q.unread_responses(), 1);
    }

    #[test]
    fn test_out_of_order_completion() {
        let sim = SimAdapter::new();
        let dev = device(&sim, 3);
        let mut q = dev.open_queue().unwrap();
        sim.hold_completions(true);
        let jobs = [Job::new(10, b"a"), Job::new(20, b"b"), Job::new(30, b"c")];
        assert_eq!(q.submit(&jobs).unwrap(), 3);

        let held = sim.held();
        sim.release(held[2]);
        let status = q.poll().unwrap();
        assert!(status.rx_ready);
        assert_eq!(q.unread_responses(), 1);
        assert_eq!(drain(&mut q).iter().map(|r| r.0).collect::<Vec<_>>(), vec![30]);

        sim.release(held[0]);
        assert_eq!(drain(&mut q).iter().map(|r| r.0).collect::<Vec<_>>(), vec![10]);

        // The freed slots take new jobs while job 20 is still outstanding.
        sim.hold_completions(false);
        assert_eq!(q.submit(&[Job::new(40, b"d")]).unwrap(), 1);
        sim.release_all();
        let mut ids: Vec<_> = drain(&mut q).iter().map(|r| r.0).collect();
        ids.sort();
        assert_eq!(ids, vec![20, 40]);
    }

    #[test]
    fn test_repeated_poll_counts_once() {
        let sim = SimAdapter::new();
        let dev = device(&sim, 2);
        let mut q = dev.open_queue().unwrap();
        q.submit(&[Job::new(1, b"a")]).unwrap();
        q.poll().unwrap();
        q.poll().unwrap();
        q.poll().unwrap();
        assert_eq!(q.unread_responses(), 1);
    }

    #[test]
    fn test_submit_validation() {
        let sim = SimAdapter::new();
        let dev = device(&sim, 2);
        let mut q = dev.open_queue().unwrap();
        assert!(matches!(q.submit(&[]), Err(RxpError::InvalidArgument(_))));

        let big = vec![0u8; RXP_MAX_JOB_LENGTH + 1];
        let jobs = [Job::new(1, b"ok"), Job::new(2, &big)];
        assert!(matches!(q.submit(&jobs), Err(RxpError::InvalidArgument(_))));
        assert_eq!(q.busy_slots(), 0);

        let max = vec![0u8; RXP_MAX_JOB_LENGTH];
        assert_eq!(q.submit(&[Job::new(3, &max)]).unwrap(), 1);
    }

    #[test]
    fn test_send_failure_stops_submission() {
        let sim = SimAdapter::new();
        let dev = device(&sim, 4);
        let mut q = dev.open_queue().unwrap();
        sim.fail_send_after(Some(1));
        let jobs = [Job::new(1, b"a"), Job::new(2, b"b"), Job::new(3, b"c")];
        assert_eq!(q.submit(&jobs).unwrap(), 1);
        assert_eq!(q.busy_slots(), 1);

        sim.fail_send_after(None);
        assert_eq!(q.submit(&jobs[1..]).unwrap(), 2);
    }

    #[test]
    fn test_poll_error_propagates() {
        let sim = SimAdapter::new();
        let dev = device(&sim, 2);
        let mut q = dev.open_queue().unwrap();
        assert_eq!(q.poll().unwrap(), QueueStatus { rx_ready: false, tx_ready: true });
        q.submit(&[Job::new(1, b"a")]).unwrap();
        sim.fail_poll(true);
        assert!(matches!(q.poll(), Err(RxpError::CompletionError { .. })));
    }

    #[test]
    fn test_oversized_match_count() {
        let sim = SimAdapter::new();
        let dev = device(&sim, 1);
        let mut q = dev.open_queue().unwrap();
        sim.force_match_count(Some(255));
        q.submit(&[Job::new(1, b"a")]).unwrap();
        q.poll().unwrap();
        let mut buf = vec![0u8; 4096];
        assert!(matches!(
            q.read_responses(&mut buf),
            Err(RxpError::CompletionError { slot: 0, .. })
        ));
        assert_eq!(q.busy_slots(), 0);
        assert_eq!(q.unread_responses(), 0);

        sim.force_match_count(None);
        assert_eq!(q.submit(&[Job::new(2, b"a")]).unwrap(), 1);
        assert_eq!(drain(&mut q).len(), 1);
    }

    #[test]
    fn test_bad_response_does_not_lose_earlier_ones() {
        let sim = SimAdapter::new();
        sim.add_pattern(5, b"ok");
        let dev = device(&sim, 2);
        let mut q = dev.open_queue().unwrap();
        q.submit(&[Job::new(1, b"ok")]).unwrap();
        q.poll().unwrap();
        sim.force_match_count(Some(255));
        q.submit(&[Job::new(2, b"ok")]).unwrap();
        q.poll().unwrap();
        assert_eq!(q.unread_responses(), 2);

        let mut buf = vec![0u8; 4096];
        let summary = q.read_responses(&mut buf).unwrap();
        assert_eq!(summary.responses, 1);
        let ids: Vec<_> = Responses::new(&buf[..summary.bytes])
            .map(|r| r.header.job_id)
            .collect();
        assert_eq!(ids, vec![1]);
        assert_eq!(q.unread_responses(), 1);

        assert!(matches!(
            q.read_responses(&mut buf),
            Err(RxpError::CompletionError { slot: 1, .. })
        ));
        assert_eq!(q.unread_responses(), 0);
        assert_eq!(q.busy_slots(), 0);
        assert_eq!(q.read_responses(&mut buf).unwrap(), ReadSummary::default());
    }

    #[test]
    fn test_slots_released_on_close() {
        let sim = SimAdapter::new();
        let dev = device(&sim, 3);
        let q = dev.open_queue().unwrap();
        assert_eq!(sim.live_buffers(), 9);
        assert_eq!(sim.open_contexts(), 1);
        q.close();
        assert_eq!(sim.live_buffers(), 0);
        assert_eq!(sim.open_contexts(), 0);
        assert_eq!(dev.open_queues(), 0);
    }

    #[test]
    fn test_responses_iterator_stops_on_truncation() {
        let mut buf = vec![0u8; 16 + 8];
        let header = ResponseHeader {
            job_id: 5,
            match_count: 2,
            ..ResponseHeader::default()
        };
        header.write_to(&mut buf);
        assert_eq!(Responses::new(&buf).count(), 0);
        assert_eq!(Responses::new(&[]).count(), 0);
    }
}
