//! Test suite for FieldSync
//!
//! This module organizes all tests

pub mod integration;
pub mod property;
