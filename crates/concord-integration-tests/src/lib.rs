//! End-to-end episode tests for Concord live under `tests/`.
