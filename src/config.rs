use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::common::Address;

const WRITE_DRAIN_LOW_WATERMARK: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Ddr3,
    Ddr4,
    Gddr5,
    Gddr5x,
    Gddr6,
    Lpddr,
    Lpddr3,
    Lpddr4,
    Hbm,
    Hbm2,
}

impl Protocol {
    fn parse(s: &str) -> Result<Self> {
        Ok(match s {
            "DDR3" => Protocol::Ddr3,
            "DDR4" => Protocol::Ddr4,
            "GDDR5" => Protocol::Gddr5,
            "GDDR5X" => Protocol::Gddr5x,
            "GDDR6" => Protocol::Gddr6,
            "LPDDR" => Protocol::Lpddr,
            "LPDDR3" => Protocol::Lpddr3,
            "LPDDR4" => Protocol::Lpddr4,
            "HBM" => Protocol::Hbm,
            "HBM2" => Protocol::Hbm2,
            _ => bail!("unknown/unsupported DRAM protocol: {}", s),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueStructure {
    PerBank,
    PerRank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowBufPolicy {
    OpenPage,
    ClosePage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPolicy {
    RankSimultaneous,
    RankStaggered,
    BankStaggered,
}

#[derive(Debug, Deserialize, Default)]
pub struct RawConfig {
    #[serde(default)]
    pub dram_structure: DramStructureConfig,

    #[serde(default)]
    pub system: SystemConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub power: PowerConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DramStructureConfig {
    pub protocol: String,
    pub bankgroups: usize,
    pub banks_per_group: usize,
    pub bankgroup_enable: bool,
    pub rows: usize,
    pub columns: usize,
    pub device_width: usize,
    #[serde(rename = "BL")]
    pub bl: usize,
    pub hbm_dual_cmd: bool,
}

impl Default for DramStructureConfig {
    fn default() -> Self {
        Self {
            protocol: "DDR3".to_string(),
            bankgroups: 2,
            banks_per_group: 2,
            bankgroup_enable: true,
            rows: 1 << 16,
            columns: 1 << 10,
            device_width: 8,
            bl: 8,
            hbm_dual_cmd: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub channel_size: u64,
    pub channels: usize,
    pub bus_width: usize,
    pub address_mapping: String,
    pub queue_structure: String,
    pub row_buf_policy: String,
    pub cmd_queue_size: usize,
    pub trans_queue_size: usize,
    pub unified_queue: bool,
    pub refresh_policy: String,
    pub enable_self_refresh: bool,
    pub sref_threshold: u64,
    pub ideal_memory: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            channel_size: 1024,
            channels: 1,
            bus_width: 64,
            address_mapping: "chrobabgraco".to_string(),
            queue_structure: "PER_BANK".to_string(),
            row_buf_policy: "OPEN_PAGE".to_string(),
            cmd_queue_size: 16,
            trans_queue_size: 32,
            unified_queue: false,
            refresh_policy: "RANK_LEVEL_STAGGERED".to_string(),
            enable_self_refresh: false,
            sref_threshold: 1000,
            ideal_memory: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    #[serde(rename = "tCK")]
    pub tck: f64,
    #[serde(rename = "AL")]
    pub al: u64,
    #[serde(rename = "CL")]
    pub cl: u64,
    #[serde(rename = "CWL")]
    pub cwl: u64,
    #[serde(rename = "tCCD_L")]
    pub tccd_l: u64,
    #[serde(rename = "tCCD_S")]
    pub tccd_s: u64,
    #[serde(rename = "tRTRS")]
    pub trtrs: u64,
    #[serde(rename = "tRTP")]
    pub trtp: u64,
    #[serde(rename = "tWTR_L")]
    pub twtr_l: u64,
    #[serde(rename = "tWTR_S")]
    pub twtr_s: u64,
    #[serde(rename = "tWR")]
    pub twr: u64,
    #[serde(rename = "tRP")]
    pub trp: u64,
    #[serde(rename = "tRRD_L")]
    pub trrd_l: u64,
    #[serde(rename = "tRRD_S")]
    pub trrd_s: u64,
    #[serde(rename = "tRAS")]
    pub tras: u64,
    #[serde(rename = "tRCD")]
    pub trcd: u64,
    #[serde(rename = "tRFC")]
    pub trfc: u64,
    #[serde(rename = "tCKE")]
    pub tcke: u64,
    #[serde(rename = "tCKESR")]
    pub tckesr: u64,
    #[serde(rename = "tXS")]
    pub txs: u64,
    #[serde(rename = "tXP")]
    pub txp: u64,
    #[serde(rename = "tRFCb")]
    pub trfcb: u64,
    #[serde(rename = "tREFI")]
    pub trefi: u64,
    #[serde(rename = "tREFIb")]
    pub trefib: u64,
    #[serde(rename = "tFAW")]
    pub tfaw: u64,
    #[serde(rename = "tRPRE")]
    pub trpre: u64,
    #[serde(rename = "tWPRE")]
    pub twpre: u64,
    #[serde(rename = "tPPD")]
    pub tppd: u64,
    #[serde(rename = "t32AW")]
    pub t32aw: u64,
    #[serde(rename = "tRCDRD")]
    pub trcdrd: u64,
    #[serde(rename = "tRCDWR")]
    pub trcdwr: u64,
    pub ideal_memory_latency: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tck: 1.0,
            al: 0,
            cl: 12,
            cwl: 12,
            tccd_l: 6,
            tccd_s: 4,
            trtrs: 2,
            trtp: 5,
            twtr_l: 5,
            twtr_s: 5,
            twr: 10,
            trp: 10,
            trrd_l: 4,
            trrd_s: 4,
            tras: 24,
            trcd: 10,
            trfc: 74,
            tcke: 6,
            tckesr: 12,
            txs: 432,
            txp: 8,
            trfcb: 20,
            trefi: 7800,
            trefib: 1950,
            tfaw: 50,
            trpre: 1,
            twpre: 1,
            tppd: 0,
            t32aw: 330,
            trcdrd: 24,
            trcdwr: 20,
            ideal_memory_latency: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PowerConfig {
    #[serde(rename = "VDD")]
    pub vdd: f64,
    #[serde(rename = "IDD0")]
    pub idd0: f64,
    #[serde(rename = "IDD2N")]
    pub idd2n: f64,
    #[serde(rename = "IDD3N")]
    pub idd3n: f64,
    #[serde(rename = "IDD4W")]
    pub idd4w: f64,
    #[serde(rename = "IDD4R")]
    pub idd4r: f64,
    #[serde(rename = "IDD5AB")]
    pub idd5ab: f64,
    #[serde(rename = "IDD5PB")]
    pub idd5pb: f64,
    #[serde(rename = "IDD6x")]
    pub idd6x: f64,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            vdd: 1.2,
            idd0: 48.0,
            idd2n: 34.0,
            idd3n: 43.0,
            idd4w: 123.0,
            idd4r: 135.0,
            idd5ab: 250.0,
            idd5pb: 5.0,
            idd6x: 31.0,
        }
    }
}

/// Fully derived simulator configuration.
///
/// Built once from a [`RawConfig`]; every cross-parameter derivation
/// (rank count, burst cycle, read/write delay, address bit-field
/// layout, energy increments) happens here so the rest of the
/// simulator reads plain fields.
#[derive(Debug, Clone)]
pub struct Config {
    pub protocol: Protocol,

    // physical structure
    pub channels: usize,
    pub channel_size: u64,
    pub ranks: usize,
    pub banks: usize,
    pub bankgroups: usize,
    pub banks_per_group: usize,
    pub rows: usize,
    pub columns: usize,
    pub device_width: usize,
    pub bus_width: usize,
    pub devices_per_rank: usize,
    pub bl: usize,

    // address mapping
    pub shift_bits: u32,
    pub ch_pos: u32,
    pub ra_pos: u32,
    pub bg_pos: u32,
    pub ba_pos: u32,
    pub ro_pos: u32,
    pub co_pos: u32,
    pub ch_mask: u64,
    pub ra_mask: u64,
    pub bg_mask: u64,
    pub ba_mask: u64,
    pub ro_mask: u64,
    pub co_mask: u64,

    // timing
    pub tck: f64,
    pub burst_cycle: u64,
    pub al: u64,
    pub cl: u64,
    pub cwl: u64,
    pub rl: u64,
    pub wl: u64,
    pub tccd_l: u64,
    pub tccd_s: u64,
    pub trtrs: u64,
    pub trtp: u64,
    pub twtr_l: u64,
    pub twtr_s: u64,
    pub twr: u64,
    pub trp: u64,
    pub trrd_l: u64,
    pub trrd_s: u64,
    pub tras: u64,
    pub trcd: u64,
    pub trfc: u64,
    pub trc: u64,
    pub tcke: u64,
    pub tckesr: u64,
    pub txs: u64,
    pub txp: u64,
    pub trfcb: u64,
    pub trefi: u64,
    pub trefib: u64,
    pub tfaw: u64,
    pub trpre: u64,
    pub twpre: u64,
    pub tppd: u64,
    pub t32aw: u64,
    pub trcdrd: u64,
    pub trcdwr: u64,
    pub read_delay: u64,
    pub write_delay: u64,
    pub ideal_memory_latency: u64,

    // scheduling
    pub queue_structure: QueueStructure,
    pub row_buf_policy: RowBufPolicy,
    pub refresh_policy: RefreshPolicy,
    pub cmd_queue_size: usize,
    pub trans_queue_size: usize,
    pub unified_queue: bool,
    pub write_drain_watermark: usize,
    pub enable_self_refresh: bool,
    pub sref_threshold: u64,
    pub enable_hbm_dual_cmd: bool,
    pub ideal_memory: bool,

    // energy increments (pJ per command, or per cycle for the
    // standby/self-refresh terms)
    pub act_energy_inc: f64,
    pub read_energy_inc: f64,
    pub write_energy_inc: f64,
    pub ref_energy_inc: f64,
    pub refb_energy_inc: f64,
    pub act_stb_energy_inc: f64,
    pub pre_stb_energy_inc: f64,
    pub sref_energy_inc: f64,
}

impl Config {
    /// Loads and derives a configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        let raw: RawConfig = toml::from_str(&text)
            .with_context(|| format!("cannot parse config file {}", path.display()))?;
        Self::from_raw(raw)
    }

    /// Derives a configuration from already-parsed sections.
    pub fn from_raw(raw: RawConfig) -> Result<Self> {
        let protocol = Protocol::parse(&raw.dram_structure.protocol)?;

        let mut bankgroups = raw.dram_structure.bankgroups;
        let mut banks_per_group = raw.dram_structure.banks_per_group;
        if !raw.dram_structure.bankgroup_enable {
            banks_per_group *= bankgroups;
            bankgroups = 1;
        }
        let banks = bankgroups * banks_per_group;

        let is_gddr = matches!(
            protocol,
            Protocol::Gddr5 | Protocol::Gddr5x | Protocol::Gddr6
        );
        let is_hbm = matches!(protocol, Protocol::Hbm | Protocol::Hbm2);

        // burst_cycle drives timing; BL is kept for capacity and the
        // low column bits. BL == 0 models perfect bandwidth.
        let raw_bl = raw.dram_structure.bl as u64;
        let (burst_cycle, bl) = match protocol {
            Protocol::Gddr5 => (raw_bl / 4, if raw_bl == 0 { 8 } else { raw_bl }),
            Protocol::Gddr5x => (raw_bl / 8, if raw_bl == 0 { 8 } else { raw_bl }),
            Protocol::Gddr6 => (raw_bl / 16, if raw_bl == 0 { 8 } else { raw_bl }),
            _ => {
                let default_bl = if is_hbm { 4 } else { 8 };
                (raw_bl / 2, if raw_bl == 0 { default_bl } else { raw_bl })
            }
        };
        let bl = bl as usize;

        // "column" always means a physical column of device_width bits
        let mut columns = raw.dram_structure.columns;
        if is_gddr {
            columns *= bl;
        } else if is_hbm {
            columns *= 2;
        }

        let device_width = raw.dram_structure.device_width;
        let bus_width = raw.system.bus_width;
        if device_width == 0 || bus_width % device_width != 0 {
            bail!(
                "bus_width {} is not a multiple of device_width {}",
                bus_width,
                device_width
            );
        }
        let devices_per_rank = bus_width / device_width;

        // rank count from channel capacity
        let page_bytes = (columns * device_width / 8) as u64;
        let bytes_per_rank = page_bytes
            * raw.dram_structure.rows as u64
            * banks as u64
            * devices_per_rank as u64;
        let megs_per_rank = bytes_per_rank >> 20;
        let mut channel_size = raw.system.channel_size;
        let ranks = if megs_per_rank == 0 || megs_per_rank > channel_size {
            eprintln!(
                "WARNING: cannot build a {} MB channel with this device; using one rank ({} MB)",
                channel_size, megs_per_rank
            );
            channel_size = megs_per_rank;
            1
        } else {
            let ranks = (channel_size / megs_per_rank) as usize;
            channel_size = ranks as u64 * megs_per_rank;
            ranks
        };

        let queue_structure = match raw.system.queue_structure.as_str() {
            "PER_BANK" => QueueStructure::PerBank,
            "PER_RANK" => QueueStructure::PerRank,
            other => bail!("unsupported queue structure: {}", other),
        };
        let row_buf_policy = match raw.system.row_buf_policy.as_str() {
            "OPEN_PAGE" => RowBufPolicy::OpenPage,
            "CLOSE_PAGE" => RowBufPolicy::ClosePage,
            other => bail!("unsupported row buffer policy: {}", other),
        };
        let refresh_policy = match raw.system.refresh_policy.as_str() {
            "RANK_LEVEL_SIMULTANEOUS" => RefreshPolicy::RankSimultaneous,
            "RANK_LEVEL_STAGGERED" => RefreshPolicy::RankStaggered,
            "BANK_LEVEL_STAGGERED" => RefreshPolicy::BankStaggered,
            other => bail!("unsupported refresh policy: {}", other),
        };

        let t = &raw.timing;
        let rl = t.al + t.cl;
        let wl = t.al + t.cwl;
        let read_delay = rl + burst_cycle;
        let write_delay = wl + burst_cycle;
        let trc = t.tras + t.trp;

        // energy increments: V * mA * cycles, which is pJ once cycles
        // are converted to ns; a command hits every device in the rank
        let p = &raw.power;
        let devices = devices_per_rank as f64;
        let act_energy_inc = p.vdd
            * (p.idd0 * trc as f64 - (p.idd3n * t.tras as f64 + p.idd2n * t.trp as f64))
            * devices;
        let read_energy_inc = p.vdd * (p.idd4r - p.idd3n) * burst_cycle as f64 * devices;
        let write_energy_inc = p.vdd * (p.idd4w - p.idd3n) * burst_cycle as f64 * devices;
        let ref_energy_inc = p.vdd * (p.idd5ab - p.idd3n) * t.trfc as f64 * devices;
        let refb_energy_inc = p.vdd * (p.idd5pb - p.idd3n) * t.trfcb as f64 * devices;
        let act_stb_energy_inc = p.vdd * p.idd3n * devices;
        let pre_stb_energy_inc = p.vdd * p.idd2n * devices;
        let sref_energy_inc = p.vdd * p.idd6x * devices;

        let mut config = Config {
            protocol,
            channels: raw.system.channels,
            channel_size,
            ranks,
            banks,
            bankgroups,
            banks_per_group,
            rows: raw.dram_structure.rows,
            columns,
            device_width,
            bus_width,
            devices_per_rank,
            bl,
            shift_bits: 0,
            ch_pos: 0,
            ra_pos: 0,
            bg_pos: 0,
            ba_pos: 0,
            ro_pos: 0,
            co_pos: 0,
            ch_mask: 0,
            ra_mask: 0,
            bg_mask: 0,
            ba_mask: 0,
            ro_mask: 0,
            co_mask: 0,
            tck: t.tck,
            burst_cycle,
            al: t.al,
            cl: t.cl,
            cwl: t.cwl,
            rl,
            wl,
            tccd_l: t.tccd_l,
            tccd_s: t.tccd_s,
            trtrs: t.trtrs,
            trtp: t.trtp,
            twtr_l: t.twtr_l,
            twtr_s: t.twtr_s,
            twr: t.twr,
            trp: t.trp,
            trrd_l: t.trrd_l,
            trrd_s: t.trrd_s,
            tras: t.tras,
            trcd: t.trcd,
            trfc: t.trfc,
            trc,
            tcke: t.tcke,
            tckesr: t.tckesr,
            txs: t.txs,
            txp: t.txp,
            trfcb: t.trfcb,
            trefi: t.trefi,
            trefib: t.trefib,
            tfaw: t.tfaw,
            trpre: t.trpre,
            twpre: t.twpre,
            tppd: t.tppd,
            t32aw: t.t32aw,
            trcdrd: t.trcdrd,
            trcdwr: t.trcdwr,
            read_delay,
            write_delay,
            ideal_memory_latency: t.ideal_memory_latency,
            queue_structure,
            row_buf_policy,
            refresh_policy,
            cmd_queue_size: raw.system.cmd_queue_size,
            trans_queue_size: raw.system.trans_queue_size,
            unified_queue: raw.system.unified_queue,
            write_drain_watermark: WRITE_DRAIN_LOW_WATERMARK,
            enable_self_refresh: raw.system.enable_self_refresh,
            sref_threshold: raw.system.sref_threshold,
            enable_hbm_dual_cmd: raw.dram_structure.hbm_dual_cmd && is_hbm,
            ideal_memory: raw.system.ideal_memory,
            act_energy_inc,
            read_energy_inc,
            write_energy_inc,
            ref_energy_inc,
            refb_energy_inc,
            act_stb_energy_inc,
            pre_stb_energy_inc,
            sref_energy_inc,
        };
        config.set_address_mapping(&raw.system.address_mapping)?;
        Ok(config)
    }

    pub fn is_gddr(&self) -> bool {
        matches!(
            self.protocol,
            Protocol::Gddr5 | Protocol::Gddr5x | Protocol::Gddr6
        )
    }

    pub fn is_hbm(&self) -> bool {
        matches!(self.protocol, Protocol::Hbm | Protocol::Hbm2)
    }

    /// Decodes a physical byte address into the device hierarchy.
    pub fn address_mapping(&self, hex_addr: u64) -> Address {
        let addr = hex_addr >> self.shift_bits;
        Address::new(
            ((addr >> self.ch_pos) & self.ch_mask) as usize,
            ((addr >> self.ra_pos) & self.ra_mask) as usize,
            ((addr >> self.bg_pos) & self.bg_mask) as usize,
            ((addr >> self.ba_pos) & self.ba_mask) as usize,
            ((addr >> self.ro_pos) & self.ro_mask) as usize,
            ((addr >> self.co_pos) & self.co_mask) as usize,
        )
    }

    /// Channel bits of a physical address; routes transactions to a
    /// controller before full decoding.
    pub fn channel_of(&self, hex_addr: u64) -> usize {
        (((hex_addr >> self.shift_bits) >> self.ch_pos) & self.ch_mask) as usize
    }

    fn set_address_mapping(&mut self, mapping: &str) -> Result<()> {
        // each request moves bus_width/8 * BL bytes, so that many low
        // address bits never reach the decoder
        let request_size_bytes = (self.bus_width / 8 * self.bl) as u64;
        self.shift_bits = floor_log2(request_size_bytes);

        let col_low_bits = floor_log2(self.bl as u64);
        let actual_col_bits = floor_log2(self.columns as u64) - col_low_bits;

        if mapping.len() != 12 {
            bail!("address mapping '{}' must be 6 two-letter fields", mapping);
        }

        let mut pos = 0u32;
        let mut seen: Vec<String> = Vec::new();
        // rightmost token occupies the lowest bits
        for i in (0..6).rev() {
            let token = &mapping[i * 2..i * 2 + 2];
            let width = match token {
                "ch" => floor_log2(self.channels as u64),
                "ra" => floor_log2(self.ranks as u64),
                "bg" => floor_log2(self.bankgroups as u64),
                "ba" => floor_log2(self.banks_per_group as u64),
                "ro" => floor_log2(self.rows as u64),
                "co" => actual_col_bits,
                _ => bail!("unrecognized address mapping field: {}", token),
            };
            if seen.iter().any(|s| s == token) {
                bail!("duplicate address mapping field: {}", token);
            }
            seen.push(token.to_string());
            let mask = (1u64 << width) - 1;
            match token {
                "ch" => (self.ch_pos, self.ch_mask) = (pos, mask),
                "ra" => (self.ra_pos, self.ra_mask) = (pos, mask),
                "bg" => (self.bg_pos, self.bg_mask) = (pos, mask),
                "ba" => (self.ba_pos, self.ba_mask) = (pos, mask),
                "ro" => (self.ro_pos, self.ro_mask) = (pos, mask),
                "co" => (self.co_pos, self.co_mask) = (pos, mask),
                _ => unreachable!(),
            }
            pos += width;
        }
        Ok(())
    }
}

fn floor_log2(value: u64) -> u32 {
    assert!(value > 0, "log2 of zero");
    63 - value.leading_zeros()
}
