//! Unit test modules.

mod calculator_test;
mod timestamp_test;
