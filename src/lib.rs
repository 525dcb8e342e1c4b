//! `swarm_core`: a multi-agent swarm orchestrator. Decomposes an objective
//! into a task graph and an agent team, schedules tasks onto worker
//! processes under a configurable placement topology, and tracks the whole
//! run through a single shared coordination store.

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;
