//! Discrete-event simulator for delay-tolerant networks with intermittent
//! wireless connectivity: mobile nodes meet opportunistically, exchange
//! messages over range-limited radio interfaces subject to interference,
//! buffer them under priority/subscription policy, and forward them through
//! pluggable routers.
//!
//! This crate is the simulation engine and wireless-link/routing substrate
//! (spec §1). Movement models, map parsing, GUI rendering, and report
//! writers are out of scope and reached only through the trait seams in
//! [`movement`] and [`reporting`].
//!
//! The batch driver binary (`src/main.rs`) wires [`settings::Settings`]
//! through [`factory::build_world`] into a running [`world::World`] and
//! drives it tick by tick to `Scenario.endTime`.

pub mod clock;
pub mod connection;
pub mod connectivity_optimizer;
pub mod context;
pub mod coord;
pub mod error;
pub mod events;
pub mod factory;
pub mod host;
pub mod interference;
pub mod message;
pub mod message_cache;
pub mod movement;
pub mod network_interface;
pub mod reporting;
pub mod router;
pub mod settings;
pub mod world;
