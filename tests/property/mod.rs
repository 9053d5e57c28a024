//! Property-based tests
//!
//! Uses proptest to generate random inputs and verify properties

pub mod retry_proptest;
