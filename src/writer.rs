//! Interleaving packet writer
//!
//! Sits between the stream pipelines and the container muxer. Packets are
//! rescaled from their encoder's time base into the container's, queued per
//! stream, and released in non-decreasing dts order across streams: a packet
//! is only written once every stream that is still producing has something
//! queued, so a stream that runs ahead waits for the slower one. Streams that
//! have finished draining stop holding the others back.
//!
//! An optional interleave delta lets a stream that ran far ahead be written
//! without waiting. Packets that later arrive below the last written dts are
//! dropped so the container never sees dts go backwards.

use crate::encoder::Packet;
use crate::muxer::Muxer;
use crate::{Error, Rational, Result};
use std::collections::VecDeque;

struct StreamSlot {
    codec_time_base: Rational,
    queue: VecDeque<Packet>,
    last_dts: Option<i64>,
    finished: bool,
}

/// Interleaving writer owning the container muxer
pub struct InterleavingWriter {
    muxer: Box<dyn Muxer>,
    time_base: Rational,
    streams: Vec<StreamSlot>,
    max_interleave_delta: i64,
    last_written_dts: Option<i64>,
    packets_written: u64,
    packets_dropped: u64,
}

impl InterleavingWriter {
    /// Wrap a muxer whose header is already written.
    ///
    /// `codec_time_bases[i]` is the time base of packets submitted for stream `i`.
    /// `max_interleave_delta_ms` bounds how far one stream may run ahead before
    /// its packets are written without waiting for the others (0 disables it).
    pub fn new(
        muxer: Box<dyn Muxer>,
        codec_time_bases: &[Rational],
        max_interleave_delta_ms: u64,
    ) -> Self {
        let time_base = muxer.time_base();
        let max_interleave_delta = Rational::rescale(
            max_interleave_delta_ms as i64,
            Rational::new(1, 1000),
            time_base,
        );

        Self {
            muxer,
            time_base,
            streams: codec_time_bases
                .iter()
                .map(|&tb| StreamSlot {
                    codec_time_base: tb,
                    queue: VecDeque::new(),
                    last_dts: None,
                    finished: false,
                })
                .collect(),
            max_interleave_delta,
            last_written_dts: None,
            packets_written: 0,
            packets_dropped: 0,
        }
    }

    /// Total packets handed to the muxer
    pub fn packets_written(&self) -> u64 {
        self.packets_written
    }

    /// Packets discarded because they arrived after later ones were written
    pub fn packets_dropped(&self) -> u64 {
        self.packets_dropped
    }

    /// Packets waiting for another stream to catch up
    pub fn queued(&self) -> usize {
        self.streams.iter().map(|s| s.queue.len()).sum()
    }

    /// Accept a packet in its encoder's time base
    pub fn write_packet(&mut self, stream_index: usize, mut packet: Packet) -> Result<()> {
        let time_base = self.time_base;
        let slot = self
            .streams
            .get_mut(stream_index)
            .ok_or_else(|| Error::Mux(format!("packet for unknown stream {}", stream_index)))?;
        if slot.finished {
            return Err(Error::Mux(format!(
                "packet for stream {} after it finished",
                stream_index
            )));
        }

        let from = slot.codec_time_base;
        packet.pts = Rational::rescale(packet.pts, from, time_base);
        packet.dts = Rational::rescale(packet.dts, from, time_base);
        packet.duration = Rational::rescale(packet.duration, from, time_base);
        packet.stream_index = stream_index;

        if let Some(last) = slot.last_dts {
            if packet.dts < last {
                return Err(Error::Mux(format!(
                    "non-monotonic dts on stream {}: {} after {}",
                    stream_index, packet.dts, last
                )));
            }
        }
        slot.last_dts = Some(packet.dts);

        if let Some(written) = self.last_written_dts {
            if packet.dts < written {
                tracing::warn!(
                    stream = stream_index,
                    dts = packet.dts,
                    last_written = written,
                    "dropping packet behind the interleave delta"
                );
                self.packets_dropped += 1;
                return Ok(());
            }
        }
        slot.queue.push_back(packet);

        self.interleave(false)
    }

    /// Mark a stream as drained; it no longer holds back the others
    pub fn finish_stream(&mut self, stream_index: usize) -> Result<()> {
        if let Some(slot) = self.streams.get_mut(stream_index) {
            slot.finished = true;
        }
        self.interleave(false)
    }

    /// Write everything still queued and finalize the container
    pub fn finalize(mut self) -> Result<u64> {
        self.interleave(true)?;
        let written = self.packets_written;
        self.muxer.finalize()?;
        Ok(written)
    }

    /// Stream whose queued head has the smallest dts, ties going to the lower index
    fn earliest_head(&self) -> Option<usize> {
        self.streams
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.queue.front().map(|p| (i, p.dts)))
            .min_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)))
            .map(|(i, _)| i)
    }

    fn latest_queued_dts(&self) -> Option<i64> {
        self.streams
            .iter()
            .filter_map(|s| s.queue.back().map(|p| p.dts))
            .max()
    }

    fn interleave(&mut self, flush: bool) -> Result<()> {
        while let Some(index) = self.earliest_head() {
            let all_ready = self
                .streams
                .iter()
                .all(|s| s.finished || !s.queue.is_empty());

            let head_dts = self.streams[index].queue.front().map_or(0, |p| p.dts);
            let overdue = self.max_interleave_delta > 0
                && self
                    .latest_queued_dts()
                    .is_some_and(|latest| latest > head_dts + self.max_interleave_delta);

            if !(flush || all_ready || overdue) {
                break;
            }
            if overdue && !all_ready && !flush {
                tracing::debug!(
                    stream = index,
                    dts = head_dts,
                    "interleave delta exceeded, writing without waiting"
                );
            }

            if let Some(packet) = self.streams[index].queue.pop_front() {
                tracing::trace!(
                    stream = index,
                    pts = packet.pts,
                    dts = packet.dts,
                    size = packet.data.len(),
                    "write packet"
                );
                self.muxer.write_packet(&packet)?;
                self.last_written_dts = Some(packet.dts);
                self.packets_written += 1;
            }
        }
        Ok(())
    }
}
