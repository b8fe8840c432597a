//! Database entry types
//!
//! Database entries reference stored objects together with the mode they
//! were recorded under in a tree.

pub mod database_entry;
