// SPDX-License-Identifier: MIT

//! Database layer (SQLite warehouse).

pub mod warehouse;

pub use warehouse::Warehouse;
