// Intentionally empty: this crate only exists to host integration tests.
