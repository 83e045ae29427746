//! Unit tests for the queue client against the in-memory broker

mod support;
mod transport_tests;
