//! Tests against a real board.
//!
//! ```bash
//! export BOARD_HARNESS_TEST_UART=/dev/ttyACM2   # UART link of a flashed board
//! export BOARD_HARNESS_TEST_TIMEOUT_MS=10000    # optional
//! cargo test -- --ignored
//! ```
//!
//! The board must already run a test suite firmware; nothing here flashes it.
