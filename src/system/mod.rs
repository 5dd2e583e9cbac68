//! Memory-system front ends.
//!
//! [`DramSystem`] owns one controller per channel and routes
//! transactions by the address's channel bits; completions are
//! delivered through the registered callbacks before any controller
//! advances its clock. [`IdealDramSystem`] bypasses the controllers
//! entirely and completes everything after a fixed latency; it shares
//! only the public interface. [`MemorySystem`] is the facade the
//! traffic side talks to.

use std::sync::Arc;

use crate::config::Config;
use crate::core::controller::Controller;
use crate::core::timing::Timing;
use crate::common::Transaction;

pub type Callback = Box<dyn FnMut(u64)>;

pub struct DramSystem {
    config: Arc<Config>,
    controllers: Vec<Controller>,
    read_callback: Callback,
    write_callback: Callback,
    clk: u64,
}

impl DramSystem {
    pub fn new(config: Arc<Config>, read_callback: Callback, write_callback: Callback) -> Self {
        let timing = Arc::new(Timing::new(&config));
        let controllers = (0..config.channels)
            .map(|ch| Controller::new(ch, Arc::clone(&config), Arc::clone(&timing)))
            .collect();
        Self {
            controllers,
            read_callback,
            write_callback,
            clk: 0,
            config,
        }
    }

    fn channel_of(&self, hex_addr: u64) -> usize {
        self.config.channel_of(hex_addr)
    }

    pub fn will_accept_transaction(&self, hex_addr: u64, is_write: bool) -> bool {
        self.controllers[self.channel_of(hex_addr)].will_accept_transaction(hex_addr, is_write)
    }

    pub fn add_transaction(&mut self, hex_addr: u64, is_write: bool) -> bool {
        let channel = self.channel_of(hex_addr);
        let ok = self.controllers[channel].will_accept_transaction(hex_addr, is_write);
        if ok {
            self.controllers[channel].add_transaction(Transaction::new(hex_addr, is_write));
        }
        ok
    }

    pub fn clock_tick(&mut self) {
        // deliver every finished transaction before anything advances
        for ctrl in &mut self.controllers {
            while let Some((addr, is_write)) = ctrl.return_done_trans(self.clk) {
                if is_write {
                    (self.write_callback)(addr);
                } else {
                    (self.read_callback)(addr);
                }
            }
        }
        for ctrl in &mut self.controllers {
            ctrl.clock_tick();
        }
        self.clk += 1;
    }

    pub fn register_callbacks(&mut self, read_callback: Callback, write_callback: Callback) {
        self.read_callback = read_callback;
        self.write_callback = write_callback;
    }

    pub fn print_stats(&self) {
        for ctrl in &self.controllers {
            ctrl.print_stats();
        }
    }

    pub fn reset_stats(&mut self) {
        for ctrl in &mut self.controllers {
            ctrl.reset_stats();
        }
    }
}

/// Fixed-latency stand-in for the full controller stack.
pub struct IdealDramSystem {
    latency: u64,
    buffer: Vec<Transaction>,
    read_callback: Callback,
    write_callback: Callback,
    clk: u64,
}

impl IdealDramSystem {
    pub fn new(config: &Config, read_callback: Callback, write_callback: Callback) -> Self {
        Self {
            latency: config.ideal_memory_latency,
            buffer: Vec::new(),
            read_callback,
            write_callback,
            clk: 0,
        }
    }

    pub fn will_accept_transaction(&self, _hex_addr: u64, _is_write: bool) -> bool {
        true
    }

    pub fn add_transaction(&mut self, hex_addr: u64, is_write: bool) -> bool {
        let mut trans = Transaction::new(hex_addr, is_write);
        trans.added_cycle = self.clk;
        self.buffer.push(trans);
        true
    }

    pub fn clock_tick(&mut self) {
        let latency = self.latency;
        let clk = self.clk;
        let mut done = Vec::new();
        self.buffer.retain(|trans| {
            if clk - trans.added_cycle >= latency {
                done.push(*trans);
                false
            } else {
                true
            }
        });
        for trans in done {
            if trans.is_write {
                (self.write_callback)(trans.addr);
            } else {
                (self.read_callback)(trans.addr);
            }
        }
        self.clk += 1;
    }

    pub fn register_callbacks(&mut self, read_callback: Callback, write_callback: Callback) {
        self.read_callback = read_callback;
        self.write_callback = write_callback;
    }
}

enum Engine {
    Jedec(DramSystem),
    Ideal(IdealDramSystem),
}

/// Public facade over the JEDEC engine or the ideal model, selected by
/// the `ideal_memory` config switch.
pub struct MemorySystem {
    config: Arc<Config>,
    engine: Engine,
}

impl MemorySystem {
    pub fn new(config: Config, read_callback: Callback, write_callback: Callback) -> Self {
        let config = Arc::new(config);
        let engine = if config.ideal_memory {
            Engine::Ideal(IdealDramSystem::new(&config, read_callback, write_callback))
        } else {
            Engine::Jedec(DramSystem::new(
                Arc::clone(&config),
                read_callback,
                write_callback,
            ))
        };
        Self { config, engine }
    }

    pub fn will_accept_transaction(&self, hex_addr: u64, is_write: bool) -> bool {
        match &self.engine {
            Engine::Jedec(sys) => sys.will_accept_transaction(hex_addr, is_write),
            Engine::Ideal(sys) => sys.will_accept_transaction(hex_addr, is_write),
        }
    }

    pub fn add_transaction(&mut self, hex_addr: u64, is_write: bool) -> bool {
        match &mut self.engine {
            Engine::Jedec(sys) => sys.add_transaction(hex_addr, is_write),
            Engine::Ideal(sys) => sys.add_transaction(hex_addr, is_write),
        }
    }

    pub fn clock_tick(&mut self) {
        match &mut self.engine {
            Engine::Jedec(sys) => sys.clock_tick(),
            Engine::Ideal(sys) => sys.clock_tick(),
        }
    }

    pub fn register_callbacks(&mut self, read_callback: Callback, write_callback: Callback) {
        match &mut self.engine {
            Engine::Jedec(sys) => sys.register_callbacks(read_callback, write_callback),
            Engine::Ideal(sys) => sys.register_callbacks(read_callback, write_callback),
        }
    }

    pub fn tck(&self) -> f64 {
        self.config.tck
    }

    pub fn bus_bits(&self) -> usize {
        self.config.bus_width
    }

    pub fn burst_length(&self) -> usize {
        self.config.bl
    }

    pub fn queue_size(&self) -> usize {
        self.config.trans_queue_size
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn print_stats(&self) {
        if let Engine::Jedec(sys) = &self.engine {
            sys.print_stats();
        }
    }

    pub fn reset_stats(&mut self) {
        if let Engine::Jedec(sys) = &mut self.engine {
            sys.reset_stats();
        }
    }
}
