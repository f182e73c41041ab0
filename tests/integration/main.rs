//! Integration test modules.

mod ride_lifecycle_test;
