//! End-to-end tests for the K-Line workspace. See `tests/`.
