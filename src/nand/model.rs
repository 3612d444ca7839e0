//! Channel / die / block availability watermarks
//!
//! Every page of a request is issued to the die under the round-robin
//! cursor, then the cursor advances (channel first, die on wrap). A die
//! serves one operation at a time: an operation starts when both the request
//! and the die are ready and keeps the die busy for the operation delay.
//!
//! ```text
//!   start       = max(die.next_available, stime)
//!   next_avail  = start + delay
//!   latency     = next_avail - stime
//! ```

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::TimingConfig;

/// NAND operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NandOp {
    Read,
    Write,
    Erase,
}

/// Physical page address used for timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ppa {
    pub channel: u32,
    pub die: u32,
    /// Zone index; only blocks below `blocks_per_die` are tracked
    pub block: u32,
}

/// Round-robin channel/die cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WritePointerCursor {
    pub channel: u32,
    pub die: u32,
}

#[derive(Debug, Clone, Default)]
struct Block {
    next_available: u64,
}

#[derive(Debug, Clone)]
struct Die {
    next_available: u64,
    blocks: Vec<Block>,
}

#[derive(Debug, Clone)]
struct Channel {
    next_available: u64,
    dies: Vec<Die>,
}

/// NAND array timing state.
#[derive(Debug, Clone)]
pub struct NandModel {
    timing: TimingConfig,
    channels: Vec<Channel>,
    cursor: WritePointerCursor,
}

impl NandModel {
    /// Build an idle array shaped by `timing`.
    pub fn new(timing: &TimingConfig) -> Self {
        let die = Die {
            next_available: 0,
            blocks: vec![Block::default(); timing.blocks_per_die as usize],
        };
        let channel = Channel {
            next_available: 0,
            dies: vec![die; timing.dies_per_channel as usize],
        };
        Self {
            timing: timing.clone(),
            channels: vec![channel; timing.num_channels as usize],
            cursor: WritePointerCursor::default(),
        }
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    pub fn cursor(&self) -> WritePointerCursor {
        self.cursor
    }

    /// Page address for the next page of a request landing in `zone`.
    pub fn lpn_to_ppa(&self, zone: u32) -> Ppa {
        Ppa {
            channel: self.cursor.channel,
            die: self.cursor.die,
            block: zone,
        }
    }

    /// Move the cursor to the next channel, and the next die on wrap.
    pub fn advance_cursor(&mut self) {
        self.cursor.channel += 1;
        if self.cursor.channel < self.timing.num_channels {
            return;
        }
        self.cursor.channel = 0;
        self.cursor.die += 1;
        if self.cursor.die == self.timing.dies_per_channel {
            self.cursor.die = 0;
        }
    }

    fn delay(&self, op: NandOp) -> u64 {
        match op {
            NandOp::Read => self.timing.read_latency_ns,
            NandOp::Write => self.timing.write_latency_ns,
            NandOp::Erase => self.timing.erase_latency_ns,
        }
    }

    /// Issue one operation at `ppa` for a request that started at `stime`
    /// and return its latency relative to `stime`.
    pub fn advance_status(&mut self, op: NandOp, ppa: Ppa, stime: u64) -> u64 {
        let delay = self.delay(op);
        let channel = &mut self.channels[ppa.channel as usize];
        let die = &mut channel.dies[ppa.die as usize];

        let start = die.next_available.max(stime);
        die.next_available = start + delay;
        if let Some(block) = die.blocks.get_mut(ppa.block as usize) {
            block.next_available = die.next_available;
        }
        channel.next_available = channel.next_available.max(die.next_available);

        die.next_available - stime
    }

    /// Latency of a read or write of `nlb` blocks at `slba`: the slowest of
    /// its pages. `zone_of` maps an LBA to its zone index. `stime` must
    /// already be resolved to a concrete time.
    pub fn request_latency<F>(&mut self, op: NandOp, slba: u64, nlb: u64, stime: u64, zone_of: F) -> u64
    where
        F: Fn(u64) -> u32,
    {
        if nlb == 0 {
            return 0;
        }
        let lpp = self.timing.lbas_per_page;
        let first = slba / lpp;
        let last = (slba + nlb - 1) / lpp;

        let mut max_latency = 0;
        for lpn in first..=last {
            let ppa = self.lpn_to_ppa(zone_of(lpn * lpp));
            self.advance_cursor();
            max_latency = max_latency.max(self.advance_status(op, ppa, stime));
        }

        trace!(
            "{:?} lba {}+{}: {} pages, latency {}ns",
            op,
            slba,
            nlb,
            last - first + 1,
            max_latency
        );
        max_latency
    }

    /// Erase the block of `zone` on every die; returns the slowest erase.
    pub fn erase_zone(&mut self, zone: u32, now: u64) -> u64 {
        let mut max_latency = 0;
        for channel in 0..self.timing.num_channels {
            for die in 0..self.timing.dies_per_channel {
                let ppa = Ppa {
                    channel,
                    die,
                    block: zone,
                };
                max_latency = max_latency.max(self.advance_status(NandOp::Erase, ppa, now));
            }
        }
        max_latency
    }

    /// When the die at (`channel`, `die`) is next idle.
    pub fn die_available_at(&self, channel: u32, die: u32) -> Option<u64> {
        self.channels
            .get(channel as usize)?
            .dies
            .get(die as usize)
            .map(|d| d.next_available)
    }

    /// When every die of `channel` is next idle.
    pub fn channel_available_at(&self, channel: u32) -> Option<u64> {
        self.channels.get(channel as usize).map(|c| c.next_available)
    }

    /// When the tracked block `block` of (`channel`, `die`) was last busy
    /// until.
    pub fn block_available_at(&self, channel: u32, die: u32, block: u32) -> Option<u64> {
        self.channels
            .get(channel as usize)?
            .dies
            .get(die as usize)?
            .blocks
            .get(block as usize)
            .map(|b| b.next_available)
    }
}
